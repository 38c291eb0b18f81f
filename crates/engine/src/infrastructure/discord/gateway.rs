//! Discord gateway client using tokio-tungstenite.
//!
//! Keeps one session open: Hello, Identify, then heartbeats on the interval
//! the gateway asked for while dispatching `!lucie` messages. Any session end
//! other than a fatal close code leads to a fresh connection after backoff.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::model::{
    self, intents, opcode, GatewayFrame, Hello, MessageCreate, Ready, FATAL_CLOSE_CODES,
};
use crate::infrastructure::ports::CommandEvent;
use crate::use_cases::draw::{CommandMatcher, LucieCommand};

const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);
const BACKOFF_MULTIPLIER: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Malformed gateway payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Gateway closed the session with code {code}: {reason}")]
    Fatal { code: u16, reason: String },
}

impl GatewayError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

/// Reconnection delay schedule. Never gives up; resets once a session is ready.
#[derive(Debug)]
pub struct BackoffState {
    attempts: u32,
    delay: Duration,
}

impl Default for BackoffState {
    fn default() -> Self {
        Self {
            attempts: 0,
            delay: INITIAL_RETRY_DELAY,
        }
    }
}

impl BackoffState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns the delay to wait before this attempt and doubles the next one.
    pub fn next_delay_and_advance(&mut self) -> Duration {
        let current = self.delay;
        self.attempts += 1;
        self.delay = (self.delay * BACKOFF_MULTIPLIER).min(MAX_RETRY_DELAY);
        current
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Closed,
    Reconnect,
    InvalidSession,
    /// Heartbeat went unacknowledged.
    Zombied,
}

#[derive(Debug)]
enum FrameAction {
    Dispatch(CommandEvent),
    Ready(Ready),
    HeartbeatRequested,
    HeartbeatAck,
    Reconnect,
    InvalidSession,
    Ignore,
}

pub struct DiscordGateway {
    url: String,
    token: String,
    matcher: CommandMatcher,
    command: Arc<LucieCommand>,
}

impl DiscordGateway {
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        matcher: CommandMatcher,
        command: Arc<LucieCommand>,
    ) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            matcher,
            command,
        }
    }

    /// Run sessions until the gateway refuses us for good.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let mut backoff = BackoffState::default();

        loop {
            match self.run_session(&mut backoff).await {
                Ok(end) => tracing::info!(?end, "Gateway session ended"),
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = %e, "Gateway refused the session");
                    return Err(e);
                }
                Err(e) => tracing::warn!(error = %e, "Gateway session failed"),
            }

            let delay = backoff.next_delay_and_advance();
            tracing::info!(
                attempt = backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting to gateway"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn run_session(&self, backoff: &mut BackoffState) -> Result<SessionEnd, GatewayError> {
        let (mut ws, _) = connect_async(self.url.as_str()).await?;
        tracing::info!(url = %self.url, "Connected to gateway");

        let hello = loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame: GatewayFrame = serde_json::from_str(&text)?;
                    if frame.op == opcode::HELLO {
                        break serde_json::from_value::<Hello>(frame.d)?;
                    }
                }
                Some(Ok(Message::Close(frame))) => return close_outcome(frame),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(SessionEnd::Closed),
            }
        };

        let identify = model::identify(&self.token, intents::BOT);
        ws.send(Message::Text(identify.to_string())).await?;

        let period = Duration::from_millis(hello.heartbeat_interval.max(1));
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        let mut sequence: Option<u64> = None;
        let mut awaiting_ack = false;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if awaiting_ack {
                        tracing::warn!("Heartbeat not acknowledged, dropping session");
                        return Ok(SessionEnd::Zombied);
                    }
                    ws.send(heartbeat_message(sequence)).await?;
                    awaiting_ack = true;
                }
                message = ws.next() => {
                    let text = match message {
                        Some(Ok(Message::Text(text))) => Some(text),
                        Some(Ok(Message::Close(frame))) => return close_outcome(frame),
                        Some(Ok(_)) => None,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(SessionEnd::Closed),
                    };
                    let action = match text {
                        Some(text) => interpret(&text, &self.matcher, &mut sequence)?,
                        None => FrameAction::Ignore,
                    };

                    match action {
                        FrameAction::Dispatch(event) => self.dispatch(event),
                        FrameAction::Ready(ready) => {
                            tracing::info!(
                                user = %ready.user.username,
                                session_id = %ready.session_id,
                                "Bot connected"
                            );
                            backoff.reset();
                        }
                        FrameAction::HeartbeatRequested => {
                            ws.send(heartbeat_message(sequence)).await?;
                        }
                        FrameAction::HeartbeatAck => awaiting_ack = false,
                        FrameAction::Reconnect => return Ok(SessionEnd::Reconnect),
                        FrameAction::InvalidSession => return Ok(SessionEnd::InvalidSession),
                        FrameAction::Ignore => {}
                    }
                }
            }
        }
    }

    // Each command runs on its own task so a slow reply never stalls the
    // heartbeat or other requesters.
    fn dispatch(&self, event: CommandEvent) {
        let command = Arc::clone(&self.command);
        tokio::spawn(async move {
            command.execute(event).await;
        });
    }
}

fn heartbeat_message(sequence: Option<u64>) -> Message {
    Message::Text(model::heartbeat(sequence).to_string())
}

fn close_outcome(frame: Option<CloseFrame<'_>>) -> Result<SessionEnd, GatewayError> {
    if let Some(frame) = frame {
        let code = u16::from(frame.code);
        if FATAL_CLOSE_CODES.contains(&code) {
            return Err(GatewayError::Fatal {
                code,
                reason: frame.reason.into_owned(),
            });
        }
        tracing::info!(code, reason = %frame.reason, "Gateway closed the connection");
    }
    Ok(SessionEnd::Closed)
}

fn interpret(
    text: &str,
    matcher: &CommandMatcher,
    sequence: &mut Option<u64>,
) -> Result<FrameAction, GatewayError> {
    let frame: GatewayFrame = serde_json::from_str(text)?;

    let action = match frame.op {
        opcode::DISPATCH => {
            if frame.s.is_some() {
                *sequence = frame.s;
            }
            match frame.t.as_deref() {
                Some("READY") => FrameAction::Ready(serde_json::from_value(frame.d)?),
                Some("MESSAGE_CREATE") => {
                    let message: MessageCreate = serde_json::from_value(frame.d)?;
                    if message.author.bot || !matcher.matches(&message.content) {
                        FrameAction::Ignore
                    } else {
                        FrameAction::Dispatch(message.into_command_event())
                    }
                }
                _ => FrameAction::Ignore,
            }
        }
        opcode::HEARTBEAT => FrameAction::HeartbeatRequested,
        opcode::HEARTBEAT_ACK => FrameAction::HeartbeatAck,
        opcode::RECONNECT => FrameAction::Reconnect,
        opcode::INVALID_SESSION => FrameAction::InvalidSession,
        _ => FrameAction::Ignore,
    };
    Ok(action)
}
