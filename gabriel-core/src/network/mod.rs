//! TCP plumbing shared by the stream and receive units.

pub mod connection;

pub use connection::{ConnectionInfo, connect};
