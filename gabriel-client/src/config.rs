//! Client configuration file.

use std::path::Path;
use std::time::Duration;

use gabriel_core::pipeline::capture::MAX_CAPTURE_FPS;
use gabriel_core::pipeline::source::DEFAULT_INPUT;
use gabriel_core::{
    ClientConfig, DEFAULT_CAPTURE_FPS, DEFAULT_JPEG_QUALITY, DEFAULT_RESULT_PORT,
    DEFAULT_TOKEN_CAPACITY, DEFAULT_VIDEO_PORT,
};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the client binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Service endpoints.
    pub server: ServerConfig,
    /// Capture and send settings.
    pub stream: StreamConfig,
    /// What to do with results.
    pub presentation: PresentationConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Service endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Service host name or address.
    pub host: String,
    /// Video (frame) port.
    pub video_port: u16,
    /// Result port.
    pub result_port: u16,
    /// Results arrive inline in the response header.
    pub legacy: bool,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Deadline for a started response to complete, in milliseconds.
    /// 0 waits as long as the connection stays open.
    pub frame_timeout_ms: u64,
}

/// Capture and send settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// `synthetic`, `synthetic:<frames>`, an image file, or a directory of
    /// images.
    pub input: String,
    /// Capture rate (1..=60).
    pub fps: u32,
    /// JPEG quality (1..=100).
    pub jpeg_quality: u8,
    /// Frames in flight before waiting for results.
    pub token_capacity: usize,
    /// Delay between starting the receiver and the sender, in milliseconds.
    pub startup_delay_ms: u64,
    /// Wait for outstanding results after the input ends, in milliseconds.
    pub drain_timeout_ms: u64,
    /// Seconds of countdown before streaming starts. 0 disables it.
    pub countdown_secs: u32,
}

/// Result presentation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationConfig {
    /// Directory for guidance images. Empty disables saving.
    pub guidance_dir: String,
    /// Print every result to stdout.
    pub print_results: bool,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level, used when `RUST_LOG` is unset.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            video_port: DEFAULT_VIDEO_PORT,
            result_port: DEFAULT_RESULT_PORT,
            legacy: false,
            connect_timeout_ms: 5000,
            frame_timeout_ms: 0,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            input: DEFAULT_INPUT.into(),
            fps: DEFAULT_CAPTURE_FPS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            token_capacity: DEFAULT_TOKEN_CAPACITY,
            startup_delay_ms: 100,
            drain_timeout_ms: 5000,
            countdown_secs: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl FileConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Session parameters for the core client, with out-of-range values
    /// clamped.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            host: self.server.host.clone(),
            video_port: self.server.video_port,
            result_port: self.server.result_port,
            legacy: self.server.legacy,
            token_capacity: self.stream.token_capacity.max(1),
            capture_fps: self.stream.fps.clamp(1, MAX_CAPTURE_FPS),
            connect_timeout: Duration::from_millis(self.server.connect_timeout_ms),
            frame_timeout: (self.server.frame_timeout_ms > 0)
                .then(|| Duration::from_millis(self.server.frame_timeout_ms)),
            startup_delay: Duration::from_millis(self.stream.startup_delay_ms),
            drain_timeout: Duration::from_millis(self.stream.drain_timeout_ms),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&FileConfig::default()).unwrap();
        assert!(text.contains("[server]"));
        assert!(text.contains("video_port = 9098"));
        assert!(text.contains("guidance_dir"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "[server]\nhost = \"10.0.0.5\"\nlegacy = true\n").unwrap();

        let cfg = FileConfig::load(&path);
        assert_eq!(cfg.server.host, "10.0.0.5");
        assert!(cfg.server.legacy);
        assert_eq!(cfg.server.result_port, 9111);
        assert_eq!(cfg.stream.fps, 24);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn missing_or_invalid_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = FileConfig::load(&dir.path().join("absent.toml"));
        assert_eq!(cfg.server.host, "127.0.0.1");

        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[stream\nfps = ").unwrap();
        assert_eq!(FileConfig::load(&path).stream.fps, 24);
    }

    #[test]
    fn write_default_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.toml");
        FileConfig::write_default(&path).unwrap();
        let cfg = FileConfig::load(&path);
        assert_eq!(cfg.stream.input, "synthetic");
        assert_eq!(cfg.stream.token_capacity, 2);
    }

    #[test]
    fn client_config_is_clamped() {
        let mut cfg = FileConfig::default();
        cfg.stream.fps = 500;
        cfg.stream.token_capacity = 0;
        cfg.server.connect_timeout_ms = 250;

        let client = cfg.to_client_config();
        assert_eq!(client.frame_timeout, None);
        assert_eq!(client.capture_fps, 60);
        assert_eq!(client.token_capacity, 1);
        assert_eq!(client.connect_timeout, Duration::from_millis(250));
        assert_eq!(client.video_endpoint().to_string(), "127.0.0.1:9098");

        cfg.server.frame_timeout_ms = 2000;
        assert_eq!(
            cfg.to_client_config().frame_timeout,
            Some(Duration::from_secs(2))
        );
    }
}
