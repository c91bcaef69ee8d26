//! Receive unit: reads `(header, payload)` responses from the result
//! endpoint and returns one flow-control token per response.
//!
//! Each complete response is published on the reply queue before its token
//! goes back, so the client never sees more tokens than answered frames.
//! A malformed length prefix, an oversized block, or a closed connection
//! ends the unit with [`Reply::Error`].

use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::codec::ResponseCodec;
use crate::error::ClientError;
use crate::message::{Command, Reply};
use crate::network::connect;
use crate::pipeline::deliver;
use crate::pipeline::stream::DEFAULT_CONNECT_TIMEOUT;
use crate::token::TokenManager;

const UNIT: &str = "receive";

type ResultSource = FramedRead<TcpStream, ResponseCodec>;

pub struct ReceiveUnit {
    commands: mpsc::Receiver<Command>,
    replies: mpsc::Sender<Reply>,
    legacy: bool,
    connect_timeout: Duration,
    frame_timeout: Option<Duration>,
    cancel: CancellationToken,
    conn: Option<ResultSource>,
}

impl ReceiveUnit {
    /// `legacy` selects the single-block response format, where the result
    /// document rides inside the header.
    pub fn new(
        commands: mpsc::Receiver<Command>,
        replies: mpsc::Sender<Reply>,
        legacy: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            commands,
            replies,
            legacy,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            frame_timeout: None,
            cancel,
            conn: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Fail with [`ClientError::Timeout`] when a response stays incomplete
    /// for longer than `timeout`. Checked once per `timeout`, so a stalled
    /// frame is reported within twice the deadline. `None` waits forever.
    pub fn with_frame_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.frame_timeout = timeout;
        self
    }

    /// Serve commands until the queue closes, a command fails, or the unit
    /// is cancelled.
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

    async fn handle(&mut self, command: Command) -> Result<Option<Reply>, ClientError> {
        match command {
            Command::Connect(info) => {
                let stream = connect(&info, self.connect_timeout).await?;
                self.conn = Some(FramedRead::new(stream, ResponseCodec::new(self.legacy)));
                Ok(Some(Reply::ack()))
            }
            Command::Listen(tokens) => self.listen(&tokens).await,
            Command::Close => {
                self.conn = None;
                Ok(Some(Reply::ack()))
            }
            other @ (Command::Send(_) | Command::Stream(_)) => {
                Err(ClientError::UnsupportedCommand {
                    unit: UNIT,
                    command: other.name(),
                })
            }
        }
    }

    /// Read responses until cancelled or the connection fails. Only returns
    /// `Ok` when stopped.
    async fn listen(&mut self, tokens: &TokenManager) -> Result<Option<Reply>, ClientError> {
        let conn = self
            .conn
            .as_mut()
            .ok_or(ClientError::NotConnected { unit: UNIT })?;
        info!("{UNIT} unit listening for results");
        let mut received: u64 = 0;
        let mut stalled_since: Option<Instant> = None;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(None),
                next = conn.next() => next,
                limit = stall_check(self.frame_timeout) => {
                    let partial = !conn.read_buffer().is_empty() || conn.decoder().is_mid_frame();
                    match stalled_since {
                        _ if !partial => stalled_since = None,
                        None => stalled_since = Some(Instant::now()),
                        Some(since) if since.elapsed() >= limit => {
                            return Err(ClientError::Timeout(limit));
                        }
                        Some(_) => {}
                    }
                    continue;
                }
            };
            let response = match next {
                Some(Ok(response)) => response,
                Some(Err(e)) => return Err(e),
                None => return Err(ClientError::ConnectionClosed),
            };
            stalled_since = None;
            received += 1;
            trace!(received, frame_id = ?response.frame_id(), "response received");

            if !deliver(&self.replies, &self.cancel, Reply::Success(Some(response))).await {
                return Ok(None);
            }
            tokens.release();
        }
    }
}

/// Wakes after `limit`, or never when there is no limit.
async fn stall_check(limit: Option<Duration>) -> Duration {
    match limit {
        Some(limit) => {
            tokio::time::sleep(limit).await;
            limit
        }
        None => std::future::pending().await,
    }
}

// ── Tests ────────────────────────────────────────────────────────
