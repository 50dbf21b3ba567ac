//! Line-delimited JSON control channel in front of an [`OverlayController`].
//!
//! Each input line is one command (`{"action": ..., "req_id"?: ...}`); each
//! output line is the matching response, echoing `req_id` when given.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use overlay_engine::{Command, CommandResponse, OverlayController};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Logical channel identifier.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub Uuid);

impl ChannelId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

/// One decoded input line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BridgeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_id: Option<Uuid>,
    #[serde(flatten)]
    pub command: Command,
}

impl BridgeRequest {
    pub fn parse(line: &str) -> Result<Self, BridgeError> {
        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|err| BridgeError::Malformed {
                req_id: None,
                reason: err.to_string(),
            })?;
        let req_id = value
            .get("req_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok());
        let command =
            serde_json::from_value::<Command>(value).map_err(|err| BridgeError::Malformed {
                req_id,
                reason: err.to_string(),
            })?;
        Ok(Self { req_id, command })
    }
}

/// One output line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_id: Option<Uuid>,
    #[serde(flatten)]
    pub response: CommandResponse,
}

#[derive(Clone, Debug, Error)]
pub enum BridgeError {
    #[error("malformed request: {reason}")]
    Malformed { req_id: Option<Uuid>, reason: String },
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Transport(err.to_string())
    }
}

pub type BridgeEventBus = broadcast::Sender<BridgeEvent>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum BridgeEvent {
    Ready {
        channel: ChannelId,
    },
    CommandOk {
        channel: ChannelId,
        action: String,
    },
    CommandFailed {
        channel: ChannelId,
        action: Option<String>,
        error: String,
    },
    Closed {
        channel: ChannelId,
        handled: u64,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServeSummary {
    pub channel: ChannelId,
    pub handled: u64,
    pub failed: u64,
}

pub struct ControlBridge {
    pub events: BridgeEventBus,
    controller: Arc<dyn OverlayController>,
    channels: DashMap<ChannelId, CancellationToken>,
    handled: AtomicU64,
}

impl ControlBridge {
    pub fn new(events: BridgeEventBus, controller: Arc<dyn OverlayController>) -> Arc<Self> {
        Arc::new(Self {
            events,
            controller,
            channels: DashMap::new(),
            handled: AtomicU64::new(0),
        })
    }

    pub fn open_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn total_handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    /// Ends every running `serve` loop.
    pub fn close_all(&self) {
        for entry in self.channels.iter() {
            entry.value().cancel();
        }
    }

    /// Runs one request against the controller.
    pub async fn dispatch(&self, channel: &ChannelId, request: BridgeRequest) -> BridgeResponse {
        let action = request.command.name();
        let response = self.controller.handle(request.command).await;
        self.handled.fetch_add(1, Ordering::Relaxed);
        let event = match &response.error {
            Some(error) => BridgeEvent::CommandFailed {
                channel: channel.clone(),
                action: Some(action.to_string()),
                error: error.clone(),
            },
            None => BridgeEvent::CommandOk {
                channel: channel.clone(),
                action: action.to_string(),
            },
        };
        let _ = self.events.send(event);
        BridgeResponse {
            req_id: request.req_id,
            response,
        }
    }

    /// Decodes and runs one line; malformed input becomes a failure response.
    pub async fn dispatch_line(&self, channel: &ChannelId, line: &str) -> BridgeResponse {
        match BridgeRequest::parse(line) {
            Ok(request) => self.dispatch(channel, request).await,
            Err(err) => {
                debug!(target: "control-bridge", %err, "rejecting line");
                let req_id = match &err {
                    BridgeError::Malformed { req_id, .. } => *req_id,
                    _ => None,
                };
                let _ = self.events.send(BridgeEvent::CommandFailed {
                    channel: channel.clone(),
                    action: None,
                    error: err.to_string(),
                });
                BridgeResponse {
                    req_id,
                    response: CommandResponse::rejected(err.to_string()),
                }
            }
        }
    }

    /// Serves commands until EOF, `cancel`, or [`ControlBridge::close_all`].
    pub async fn serve<R, W>(
        &self,
        reader: R,
        mut writer: W,
        cancel: CancellationToken,
    ) -> Result<ServeSummary, BridgeError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let channel = ChannelId::new();
        let token = cancel.child_token();
        self.channels.insert(channel.clone(), token.clone());
        let _ = self.events.send(BridgeEvent::Ready {
            channel: channel.clone(),
        });
        info!(target: "control-bridge", channel = %channel.0, "control channel ready");

        let result = self.pump(reader, &mut writer, &channel, &token).await;
        self.channels.remove(&channel);
        let handled = result.as_ref().map(|(handled, _)| *handled).unwrap_or(0);
        let _ = self.events.send(BridgeEvent::Closed {
            channel: channel.clone(),
            handled,
        });
        let (handled, failed) = result.map_err(|err| {
            warn!(target: "control-bridge", channel = %channel.0, %err, "control channel failed");
            err
        })?;
        debug!(target: "control-bridge", channel = %channel.0, handled, failed, "control channel closed");
        Ok(ServeSummary {
            channel,
            handled,
            failed,
        })
    }

    async fn pump<R, W>(
        &self,
        reader: R,
        writer: &mut W,
        channel: &ChannelId,
        token: &CancellationToken,
    ) -> Result<(u64, u64), BridgeError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut handled = 0u64;
        let mut failed = 0u64;
        loop {
            let line = tokio::select! {
                _ = token.cancelled() => break,
                line = lines.next_line() => line?,
            };
            let Some(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let reply = self.dispatch_line(channel, line).await;
            if reply.response.is_failure() {
                failed += 1;
            }
            handled += 1;
            let mut payload = serde_json::to_vec(&reply)
                .map_err(|err| BridgeError::Transport(err.to_string()))?;
            payload.push(b'\n');
            writer.write_all(&payload).await?;
            writer.flush().await?;
        }
        Ok((handled, failed))
    }
}
