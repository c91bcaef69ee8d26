//! Console presentation of results.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use gabriel_core::{ParsedResponse, Presenter};
use tracing::{debug, warn};

use crate::config::PresentationConfig;

/// Prints instructions to stdout and optionally saves guidance images as
/// `guidance-<n>.jpg`.
#[derive(Debug)]
pub struct ConsolePresenter {
    guidance_dir: Option<PathBuf>,
    print_results: bool,
    saved: AtomicU64,
}

impl ConsolePresenter {
    /// Build from config, creating the guidance directory if one is set.
    pub fn from_config(config: &PresentationConfig) -> std::io::Result<Self> {
        let guidance_dir = if config.guidance_dir.is_empty() {
            None
        } else {
            let dir = PathBuf::from(&config.guidance_dir);
            std::fs::create_dir_all(&dir)?;
            Some(dir)
        };
        Ok(Self {
            guidance_dir,
            print_results: config.print_results,
            saved: AtomicU64::new(0),
        })
    }

    /// Number of guidance images written.
    pub fn saved(&self) -> u64 {
        self.saved.load(Ordering::Relaxed)
    }
}

impl Presenter for ConsolePresenter {
    fn on_response(&self, response: &ParsedResponse) {
        if !self.print_results {
            return;
        }
        match response {
            ParsedResponse::Json(doc) => println!("{doc}"),
            ParsedResponse::Raw(data) => println!("<{} byte result>", data.len()),
        }
    }

    fn on_instruction(&self, instruction: &str) {
        // An empty instruction clears the display; nothing to print.
        if !instruction.is_empty() {
            println!(">> {instruction}");
        }
    }

    fn on_guidance(&self, image: &[u8]) {
        let Some(dir) = &self.guidance_dir else {
            return;
        };
        let n = self.saved.load(Ordering::Relaxed);
        let path = dir.join(format!("guidance-{n}.jpg"));
        match std::fs::write(&path, image) {
            Ok(()) => {
                self.saved.fetch_add(1, Ordering::Relaxed);
                debug!("saved guidance image to {}", path.display());
            }
            Err(e) => warn!("failed to save {}: {e}", path.display()),
        }
    }
}

/// Announce `secs` seconds of countdown as instructions, one per `step`,
/// then clear the instruction with an empty one.
pub async fn countdown(presenter: &dyn Presenter, secs: u32, step: Duration) {
    if secs == 0 {
        return;
    }
    for remaining in (1..=secs).rev() {
        presenter.on_instruction(&format!("Starting in {remaining}..."));
        tokio::time::sleep(step).await;
    }
    presenter.on_instruction("");
}

// ── Tests ────────────────────────────────────────────────────────
