//! Stream unit: sends captured frames to the video endpoint, one per
//! flow-control token.
//!
//! The unit owns the outbound TCP connection. It serves commands from its
//! queue one at a time; `Stream` turns it into a send loop that runs until
//! the frame source ends, the connection fails, or the session is
//! cancelled.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::codec::FrameCodec;
use crate::error::ClientError;
use crate::message::{Command, Reply};
use crate::network::connect;
use crate::pipeline::deliver;
use crate::pipeline::encoder::FrameEncoder;
use crate::pipeline::slot::SlotReader;
use crate::protocol::OutboundFrame;
use crate::token::TokenManager;

const UNIT: &str = "stream";

/// Default deadline for opening the video connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

type VideoSink = FramedWrite<TcpStream, FrameCodec>;

// ── StreamUnit ───────────────────────────────────────────────────

pub struct StreamUnit {
    commands: mpsc::Receiver<Command>,
    replies: mpsc::Sender<Reply>,
    frames: SlotReader,
    encoder: Box<dyn FrameEncoder>,
    connect_timeout: Duration,
    cancel: CancellationToken,
    conn: Option<VideoSink>,
    sent: Arc<AtomicU64>,
}

impl StreamUnit {
    pub fn new(
        commands: mpsc::Receiver<Command>,
        replies: mpsc::Sender<Reply>,
        frames: SlotReader,
        encoder: Box<dyn FrameEncoder>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            commands,
            replies,
            frames,
            encoder,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            cancel,
            conn: None,
            sent: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Shared count of frames written to the wire.
    pub fn sent_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.sent)
    }

    /// Serve commands until the queue closes, a command fails, or the unit
    /// is cancelled.
    ///
    /// A failed command is reported as [`Reply::Error`] and ends the unit.
    pub async fn run(mut self) {
        loop {
            let command = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                command = self.commands.recv() => command,
            };
            let Some(command) = command else { break };
            debug!("{UNIT} unit: {command}");

            match self.handle(command).await {
                Ok(Some(reply)) => {
                    if !deliver(&self.replies, &self.cancel, reply).await {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("{UNIT} unit failed: {e}");
                    deliver(&self.replies, &self.cancel, Reply::Error(e)).await;
                    break;
                }
            }
        }
        debug!("{UNIT} unit stopped");
    }

    /// Execute one command. `Ok(None)` means the unit was stopped while
    /// working and has nothing to report.
    async fn handle(&mut self, command: Command) -> Result<Option<Reply>, ClientError> {
        match command {
            Command::Connect(info) => {
                let stream = connect(&info, self.connect_timeout).await?;
                self.conn = Some(FramedWrite::new(stream, FrameCodec));
                Ok(Some(Reply::ack()))
            }
            Command::Send(data) => {
                self.send_raw(data).await?;
                Ok(Some(Reply::ack()))
            }
            Command::Stream(tokens) => self.stream(&tokens).await,
            Command::Close => {
                if let Some(mut conn) = self.conn.take() {
                    SinkExt::<Bytes>::close(&mut conn).await?;
                }
                Ok(Some(Reply::ack()))
            }
            other @ Command::Listen(_) => Err(ClientError::UnsupportedCommand {
                unit: UNIT,
                command: other.name(),
            }),
        }
    }

    fn connection(&mut self) -> Result<&mut VideoSink, ClientError> {
        self.conn
            .as_mut()
            .ok_or(ClientError::NotConnected { unit: UNIT })
    }

    async fn send_raw(&mut self, data: Bytes) -> Result<(), ClientError> {
        self.connection()?.send(data).await
    }

    /// The send loop: token, newest frame, encode, header + payload, repeat.
    ///
    /// Frame ids start at 0 and advance only after a frame is fully
    /// written. The stream ends when the frame slot closes, including while
    /// waiting for a token: a service that never answers the last frames
    /// must not keep the session alive. A token taken for a frame that
    /// never came is returned, so every outstanding token matches a frame
    /// on the wire.
    async fn stream(&mut self, tokens: &TokenManager) -> Result<Option<Reply>, ClientError> {
        self.connection()?;
        info!("{UNIT} unit sending frames");
        let mut frame_id: u64 = 0;

        loop {
            let acquired = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(None),
                acquired = tokens.acquire() => acquired,
                _ = self.frames.closed() => return Ok(Some(Self::end_of_stream(frame_id))),
            };
            if acquired.is_err() {
                // Pool closed; the session is tearing down.
                return Ok(None);
            }

            let frame = tokio::select! {
                _ = self.cancel.cancelled() => {
                    tokens.release();
                    return Ok(None);
                }
                frame = self.frames.next_frame() => frame,
            };
            let Some(frame) = frame else {
                tokens.release();
                return Ok(Some(Self::end_of_stream(frame_id)));
            };

            let payload = self.encoder.encode(&frame)?;
            let size = payload.len();
            self.connection()?
                .send(OutboundFrame { frame_id, payload })
                .await?;
            self.sent.fetch_add(1, Ordering::Relaxed);
            debug!(frame_id, size, "sent frame");
            frame_id += 1;
        }
    }

    fn end_of_stream(frames_sent: u64) -> Reply {
        info!(frames_sent, "frame source ended");
        Reply::EndOfStream { frames_sent }
    }
}

// ── Tests ────────────────────────────────────────────────────────
