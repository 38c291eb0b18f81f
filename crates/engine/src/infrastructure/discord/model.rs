//! Gateway and REST wire types.

use lucie_domain::{ChannelId, EventId, GuildId, RequesterId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::infrastructure::ports::{ChatContext, CommandEvent};

/// Gateway opcodes we send or react to.
pub mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Gateway intents bit flags.
pub mod intents {
    pub const GUILDS: u64 = 1 << 0;
    pub const GUILD_MESSAGES: u64 = 1 << 9;
    pub const DIRECT_MESSAGES: u64 = 1 << 12;
    pub const MESSAGE_CONTENT: u64 = 1 << 15;

    /// What the bot needs to see `!lucie` in channels and DMs.
    pub const BOT: u64 = GUILDS | GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT;
}

/// Close codes after which reconnecting cannot help: bad token, invalid
/// shard, sharding required, bad API version, bad or disallowed intents.
pub const FATAL_CLOSE_CODES: [u16; 6] = [4004, 4010, 4011, 4012, 4013, 4014];

/// Any gateway payload.
#[derive(Debug, Deserialize)]
pub struct GatewayFrame {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Hello {
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Deserialize)]
pub struct Ready {
    pub user: User,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageCreate {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    pub author: User,
    #[serde(default)]
    pub content: String,
}

impl MessageCreate {
    pub fn into_command_event(self) -> CommandEvent {
        let context = match self.guild_id {
            Some(guild_id) => ChatContext::Guild(GuildId::new(guild_id)),
            None => ChatContext::Direct,
        };
        CommandEvent {
            event_id: EventId::new(self.id),
            requester: RequesterId::new(self.author.id),
            requester_name: self.author.username,
            channel_id: ChannelId::new(self.channel_id),
            context,
        }
    }
}

/// Body of `POST /channels/{id}/messages`.
#[derive(Debug, Serialize)]
pub struct CreateMessage<'a> {
    pub content: &'a str,
}

pub fn identify(token: &str, intents: u64) -> Value {
    json!({
        "op": opcode::IDENTIFY,
        "d": {
            "token": token,
            "intents": intents,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "lucie-bot",
                "device": "lucie-bot",
            },
        },
    })
}

pub fn heartbeat(sequence: Option<u64>) -> Value {
    json!({ "op": opcode::HEARTBEAT, "d": sequence })
}
