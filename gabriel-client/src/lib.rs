//! # gabriel-client
//!
//! Command-line front end for `gabriel-core`: file configuration and a
//! console presenter.

pub mod config;
pub mod presenter;
