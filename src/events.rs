//! Wire events exchanged with clients.
//!
//! Every event is a JSON object `{"type": ..., "data": ...}`. Outbound events
//! are encoded once into a [`Frame`] and the same frame is shared by every
//! recipient.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::board::Color;
use crate::clock::Clock;
use crate::game::{GameResult, MatchState, ResultStatus, TimeControl};

/// An encoded outbound event, cheap to clone into many client queues.
pub type Frame = Arc<str>;

/// Events sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Inbound {
    SeekGame { time_control: TimeControl },
    CancelSeekGame,
    GameAbort,
    GameOfferDraw,
    GameResign,
    GameDeclineDraw,
    GameAcceptDraw,
    GameChat { message: String },
    PlayMoveUci { uci: String },
}

impl Inbound {
    pub fn decode(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// Remaining time per side, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clocks {
    pub white_ms: u64,
    pub black_ms: u64,
}

impl Clocks {
    #[must_use]
    pub fn of(clock: &Clock) -> Self {
        let ms = |c| u64::try_from(clock.remaining(c).as_millis()).unwrap_or(u64::MAX);
        Self {
            white_ms: ms(Color::White),
            black_ms: ms(Color::Black),
        }
    }
}

/// One entry of a match's move history. The first entry describes the
/// starting position and carries no move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub fen: String,
    pub check: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub played: Option<PlayedMoveInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedMoveInfo {
    pub uci: String,
    pub san: String,
    pub lan: String,
    pub played_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentInfo {
    pub username: String,
    pub avatar_url: String,
    pub rating: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchFound {
    pub game_id: Uuid,
    pub client_id: Uuid,
    pub color: Color,
    pub fen: String,
    pub ply: u32,
    pub clocks: Clocks,
    pub legal_moves: Vec<String>,
    pub game_state: MatchState,
    pub time_control: TimeControl,
    pub reconnect_timeout_ms: u64,
    pub first_move_timeout_ms: u64,
    pub history: Vec<MoveRecord>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponent_info: Option<OpponentInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveMove {
    pub uci: String,
    pub lan: String,
    pub san: String,
    pub fen: String,
    pub ply: u32,
    pub legal_moves: Vec<String>,
    pub clocks: Clocks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub client_id: Uuid,
    pub message: String,
}

/// Events sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Outbound {
    MatchFound(Box<MatchFound>),
    ReceiveMove(ReceiveMove),
    GameFinished {
        result: GameResult,
        result_status: ResultStatus,
        state: MatchState,
    },
    ClientConnected { client_id: Uuid },
    ClientDisconnected { client_id: Uuid },
    GameChatReceive(ChatMessage),
    GameChatHistory { messages: Vec<ChatMessage> },
    HubInfo { lobby: usize, playing: usize },
    GameOfferDraw { client_id: Uuid },
    GameDeclineDraw { client_id: Uuid },
    Problem { message: String },
}

impl Outbound {
    pub fn encode(&self) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(self).map(Frame::from)
    }

    #[must_use]
    pub fn problem(message: impl Into<String>) -> Self {
        Outbound::Problem {
            message: message.into(),
        }
    }
}
