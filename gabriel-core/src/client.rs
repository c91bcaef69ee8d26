//! Session orchestration.
//!
//! A [`Client`] wires one capture unit, one stream unit, and one receive
//! unit around a shared [`TokenManager`], then consumes the reply queue
//! until the session ends:
//!
//! - the frame source runs dry and every sent frame has been answered
//!   (or the drain deadline passes),
//! - the stop handle is cancelled, or
//! - any unit reports an error, which tears the whole session down.
//!
//! Teardown always cancels every unit and closes the token pool, so a
//! stream unit blocked on `acquire` is released.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ClientError;
use crate::message::{Command, Reply};
use crate::network::ConnectionInfo;
use crate::pipeline::capture::{CaptureUnit, DEFAULT_CAPTURE_FPS};
use crate::pipeline::encoder::FrameEncoder;
use crate::pipeline::receive::ReceiveUnit;
use crate::pipeline::slot::frame_slot;
use crate::pipeline::source::FrameSource;
use crate::pipeline::stream::StreamUnit;
use crate::pipeline::COMMAND_QUEUE_DEPTH;
use crate::presenter::{NoopPresenter, Presenter};
use crate::protocol::{Guidance, Response, parse};
use crate::token::{DEFAULT_TOKEN_CAPACITY, TokenManager};

/// Default video endpoint port.
pub const DEFAULT_VIDEO_PORT: u16 = 9098;
/// Default result endpoint port.
pub const DEFAULT_RESULT_PORT: u16 = 9111;

/// Depth of the reply queue shared by both network units.
const REPLY_QUEUE_DEPTH: usize = 64;

// ── ClientConfig ─────────────────────────────────────────────────

/// Session parameters.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service host name or address.
    pub host: String,
    /// Port of the video (frame) endpoint.
    pub video_port: u16,
    /// Port of the result endpoint.
    pub result_port: u16,
    /// Expect results inline in the response header.
    pub legacy: bool,
    /// Maximum frames in flight.
    pub token_capacity: usize,
    /// Capture rate in frames per second.
    pub capture_fps: u32,
    /// Deadline for each TCP connect.
    pub connect_timeout: Duration,
    /// Deadline for a started response to finish arriving. `None` waits
    /// as long as the connection stays open.
    pub frame_timeout: Option<Duration>,
    /// Pause between starting the receive unit and the stream unit.
    pub startup_delay: Duration,
    /// How long to wait for outstanding responses once the source ends.
    pub drain_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            video_port: DEFAULT_VIDEO_PORT,
            result_port: DEFAULT_RESULT_PORT,
            legacy: false,
            token_capacity: DEFAULT_TOKEN_CAPACITY,
            capture_fps: DEFAULT_CAPTURE_FPS,
            connect_timeout: Duration::from_secs(5),
            frame_timeout: None,
            startup_delay: Duration::from_millis(100),
            drain_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    pub fn video_endpoint(&self) -> ConnectionInfo {
        ConnectionInfo::new(self.host.clone(), self.video_port)
    }

    pub fn result_endpoint(&self) -> ConnectionInfo {
        ConnectionInfo::new(self.host.clone(), self.result_port)
    }
}

// ── SessionSummary ───────────────────────────────────────────────

/// Why a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The frame source ran dry.
    Exhausted,
    /// The stop handle was cancelled.
    Cancelled,
}

/// What a finished session did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames_sent: u64,
    pub responses: u64,
    pub end: SessionEnd,
}

// ── Client ───────────────────────────────────────────────────────

/// Gabriel streaming client.
///
/// ```no_run
/// # use gabriel_core::{Client, ClientConfig, JpegEncoder, open_source};
/// # async fn example() -> Result<(), gabriel_core::ClientError> {
/// let client = Client::new(ClientConfig::default());
/// let stop = client.stop_handle();
/// tokio::spawn(async move {
///     let _ = tokio::signal::ctrl_c().await;
///     stop.cancel();
/// });
/// let summary = client
///     .run(open_source("synthetic")?, Box::new(JpegEncoder::default()))
///     .await?;
/// println!("{} frames sent", summary.frames_sent);
/// # Ok(())
/// # }
/// ```
pub struct Client {
    config: ClientConfig,
    presenter: Arc<dyn Presenter>,
    stop: CancellationToken,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            presenter: Arc::new(NoopPresenter),
            stop: CancellationToken::new(),
        }
    }

    /// Attach a presenter for frames, results, and guidance.
    pub fn with_presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = presenter;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// A cloneable handle; cancelling it ends the running session.
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// End the running session.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Run one session to completion.
    ///
    /// Returns after every unit has stopped. An error reply from any unit
    /// is returned once teardown is complete.
    pub async fn run(
        &self,
        source: Box<dyn FrameSource>,
        encoder: Box<dyn FrameEncoder>,
    ) -> Result<SessionSummary, ClientError> {
        let config = &self.config;
        info!(
            "starting session with {} (video {}, results {}, legacy: {})",
            config.host, config.video_port, config.result_port, config.legacy
        );

        let session = self.stop.child_token();
        let tokens = Arc::new(TokenManager::new(config.token_capacity));
        let (slot_writer, slot_reader) = frame_slot();
        let (reply_tx, mut reply_rx) = mpsc::channel(REPLY_QUEUE_DEPTH);

        // Capture and send.
        let capture = CaptureUnit::new(
            source,
            slot_writer,
            config.capture_fps,
            session.child_token(),
        )
        .with_presenter(Arc::clone(&self.presenter));
        let (stream_tx, stream_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let stream = StreamUnit::new(
            stream_rx,
            reply_tx.clone(),
            slot_reader,
            encoder,
            session.child_token(),
        )
        .with_connect_timeout(config.connect_timeout);
        let frames_sent = stream.sent_counter();
        stream_tx.send(Command::Connect(config.video_endpoint())).await?;
        stream_tx.send(Command::Stream(Arc::clone(&tokens))).await?;

        // Receive.
        let (receive_tx, receive_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let receive = ReceiveUnit::new(receive_rx, reply_tx, config.legacy, session.child_token())
            .with_connect_timeout(config.connect_timeout)
            .with_frame_timeout(config.frame_timeout);
        receive_tx.send(Command::Connect(config.result_endpoint())).await?;
        receive_tx.send(Command::Listen(Arc::clone(&tokens))).await?;

        let capture_handle = tokio::spawn(capture.run());
        let receive_handle = tokio::spawn(receive.run());
        tokio::select! {
            _ = session.cancelled() => {}
            _ = tokio::time::sleep(config.startup_delay) => {}
        }
        let stream_handle = tokio::spawn(stream.run());

        let mut responses: u64 = 0;
        let outcome = self.consume_replies(&mut reply_rx, &mut responses).await;

        // Teardown.
        session.cancel();
        tokens.close();
        drop(reply_rx);
        drop(stream_tx);
        drop(receive_tx);
        if let Err(e) = stream_handle.await {
            warn!("stream unit panicked: {e}");
        }
        if let Err(e) = receive_handle.await {
            warn!("receive unit panicked: {e}");
        }
        match capture_handle.await {
            Ok(captured) => debug!(captured, "capture unit joined"),
            Err(e) => warn!("capture unit panicked: {e}"),
        }

        let summary = SessionSummary {
            frames_sent: frames_sent.load(Ordering::Relaxed),
            responses,
            end: outcome?,
        };
        info!(
            frames_sent = summary.frames_sent,
            responses = summary.responses,
            "session ended: {:?}",
            summary.end
        );
        Ok(summary)
    }

    /// The reply loop. Returns how the session ended, or the first error.
    async fn consume_replies(
        &self,
        replies: &mut mpsc::Receiver<Reply>,
        responses: &mut u64,
    ) -> Result<SessionEnd, ClientError> {
        // Set once the source is exhausted: (frames sent, drain deadline).
        let mut draining: Option<(u64, Instant)> = None;

        loop {
            let deadline = draining.map(|(_, deadline)| deadline);
            let reply = tokio::select! {
                biased;
                _ = self.stop.cancelled() => return Ok(SessionEnd::Cancelled),
                _ = drain_expired(deadline) => {
                    warn!(responses = *responses, "drain timed out with responses outstanding");
                    return Ok(SessionEnd::Exhausted);
                }
                reply = replies.recv() => reply,
            };

            match reply.ok_or(ClientError::ChannelClosed)? {
                Reply::Success(Some(response)) => {
                    *responses += 1;
                    self.handle_response(response);
                }
                Reply::Success(None) => debug!("command acknowledged"),
                Reply::EndOfStream { frames_sent } => {
                    info!(frames_sent, "frame source exhausted; draining");
                    draining = Some((frames_sent, Instant::now() + self.config.drain_timeout));
                }
                Reply::Error(e) => {
                    error!("session failed: {e}");
                    return Err(e);
                }
            }

            if let Some((frames_sent, _)) = draining {
                if *responses >= frames_sent {
                    return Ok(SessionEnd::Exhausted);
                }
            }
        }
    }

    /// Log, parse, and present one response. Payload problems are logged
    /// and skipped; they never end the session.
    fn handle_response(&self, response: Response) {
        match response.header_json() {
            Ok(header) => debug!("response header: {}", serde_json::Value::Object(header)),
            Err(e) => warn!("undecodable response header: {e}"),
        }

        let parsed = match parse(response.payload, self.config.legacy) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("dropping unparseable result: {e}");
                return;
            }
        };
        self.presenter.on_response(&parsed);

        match Guidance::from_response(&parsed) {
            Ok(guidance) => {
                if let Some(instruction) = &guidance.instruction {
                    info!("instruction: {instruction}");
                    self.presenter.on_instruction(instruction);
                }
                if let Some(image) = &guidance.image {
                    self.presenter.on_guidance(image);
                }
            }
            Err(e) => warn!("malformed guidance: {e}"),
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("stopped", &self.stop.is_cancelled())
            .finish_non_exhaustive()
    }
}

async fn drain_expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.video_endpoint().to_string(), "127.0.0.1:9098");
        assert_eq!(config.result_endpoint().to_string(), "127.0.0.1:9111");
        assert_eq!(config.token_capacity, 2);
        assert_eq!(config.capture_fps, 24);
        assert_eq!(config.frame_timeout, None);
        assert!(!config.legacy);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let client = Client::new(ClientConfig {
            // Nothing listens here; the stop handle wins regardless.
            video_port: 1,
            result_port: 1,
            ..ClientConfig::default()
        });
        client.stop();
        let result = client
            .run(
                Box::new(crate::pipeline::source::SyntheticSource::new(4, 4)),
                Box::new(crate::pipeline::encoder::JpegEncoder::default()),
            )
            .await;
        assert_eq!(result.unwrap().end, SessionEnd::Cancelled);
    }
}
