//! Draw command handler.
//!
//! Runs the serializer for one command event and delivers the reply. Every
//! failure ends here: the dispatcher that called us only gets a report.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use lucie_domain::{format_wait, Item};
use tracing::Instrument;

use super::serializer::{DrawResult, DrawSerializer};
use crate::infrastructure::correlation::CorrelationId;
use crate::infrastructure::ports::{ChatPort, CommandEvent};

pub const BUSY_MESSAGE: &str = "Une commande est déjà en cours pour vous. Veuillez attendre.";
pub const APOLOGY_MESSAGE: &str =
    "Une erreur s'est produite lors du tirage. Veuillez réessayer.";

/// How a command invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Ignored,
    NotInGuild,
    Busy,
    Drawn,
    CooldownActive,
    /// Unexpected failure: the draw panicked or the reply could not be sent.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandReport {
    pub outcome: CommandOutcome,
    /// Whether some message reached the channel.
    pub replied: bool,
}

/// Recognizes the command in a raw chat message, e.g. `!lucie`.
#[derive(Debug, Clone)]
pub struct CommandMatcher {
    prefix: String,
    name: String,
}

impl CommandMatcher {
    pub fn new(prefix: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            name: name.into(),
        }
    }

    /// Trailing arguments are accepted and ignored.
    pub fn matches(&self, content: &str) -> bool {
        let Some(rest) = content.trim_start().strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        let Some(rest) = rest.strip_prefix(self.name.as_str()) else {
            return false;
        };
        rest.is_empty() || rest.starts_with(char::is_whitespace)
    }
}

pub struct LucieCommand {
    serializer: Arc<DrawSerializer>,
    chat: Arc<dyn ChatPort>,
}

impl LucieCommand {
    pub fn new(serializer: Arc<DrawSerializer>, chat: Arc<dyn ChatPort>) -> Self {
        Self { serializer, chat }
    }

    pub async fn execute(&self, event: CommandEvent) -> CommandReport {
        let correlation_id = CorrelationId::new();
        let span = tracing::info_span!(
            "lucie",
            correlation_id = %correlation_id.short(),
            requester = %event.requester,
            event_id = %event.event_id,
        );
        self.run(event).instrument(span).await
    }

    async fn run(&self, event: CommandEvent) -> CommandReport {
        tracing::info!(name = %event.requester_name, "Draw command received");

        // Held until the reply is out, so a double click gets the busy message
        let guard = match self
            .serializer
            .admit(&event.requester, &event.event_id, &event.context)
        {
            Ok(guard) => guard,
            Err(DrawResult::Ignored) => return report(CommandOutcome::Ignored, false),
            Err(DrawResult::NotInGuild) => return report(CommandOutcome::NotInGuild, false),
            Err(_) => return self.reply(&event, CommandOutcome::Busy, BUSY_MESSAGE).await,
        };

        let result = catch_unwind(AssertUnwindSafe(|| self.serializer.draw(&guard)));

        let (outcome, reply) = match result {
            Ok(DrawResult::Success { trait_item, flaw }) => {
                (CommandOutcome::Drawn, success_message(&trait_item, &flaw))
            }
            Ok(DrawResult::CooldownActive { remaining, .. }) => {
                (CommandOutcome::CooldownActive, cooldown_message(remaining))
            }
            Ok(other) => {
                tracing::error!(result = ?other, "Draw returned a refusal after admission");
                (CommandOutcome::Failed, APOLOGY_MESSAGE.to_string())
            }
            Err(_) => {
                tracing::error!("Draw failed unexpectedly");
                (CommandOutcome::Failed, APOLOGY_MESSAGE.to_string())
            }
        };

        let report = self.reply(&event, outcome, &reply).await;
        drop(guard);
        report
    }

    async fn reply(
        &self,
        event: &CommandEvent,
        outcome: CommandOutcome,
        content: &str,
    ) -> CommandReport {
        match self.chat.send_message(&event.channel_id, content).await {
            Ok(()) => {
                if outcome == CommandOutcome::Drawn {
                    tracing::info!("Draw delivered");
                }
                report(outcome, true)
            }
            Err(e) if outcome == CommandOutcome::Failed => {
                tracing::error!(error = %e, "Failed to send apology");
                report(CommandOutcome::Failed, false)
            }
            Err(e) => {
                tracing::error!(error = %e, ?outcome, "Failed to send reply");
                let apologized = match self
                    .chat
                    .send_message(&event.channel_id, APOLOGY_MESSAGE)
                    .await
                {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to send apology");
                        false
                    }
                };
                report(CommandOutcome::Failed, apologized)
            }
        }
    }
}

fn report(outcome: CommandOutcome, replied: bool) -> CommandReport {
    CommandReport { outcome, replied }
}

fn success_message(trait_item: &Item, flaw: &Item) -> String {
    format!(
        "🎲 **Résultat du tirage :**\n🎭 **Atout :** {trait_item}\n⚠️ **Défaut :** {flaw}"
    )
}

fn cooldown_message(remaining: Duration) -> String {
    format!(
        "Tous les éléments sont en cooldown. Veuillez attendre {}.",
        format_wait(remaining)
    )
}
