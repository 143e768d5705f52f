use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::HubError;

/// A broadcast group of clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Lobby,
    /// The two players of a match.
    Game(Uuid),
    /// Spectators of a match.
    GameTv(Uuid),
}

impl Channel {
    /// The match a game or spectator channel belongs to.
    #[must_use]
    pub fn match_id(&self) -> Option<Uuid> {
        match self {
            Channel::Lobby => None,
            Channel::Game(id) | Channel::GameTv(id) => Some(*id),
        }
    }

    /// Primary channels are the lobby and match channels; a client is in
    /// exactly one of them at a time.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        !matches!(self, Channel::GameTv(_))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Lobby => f.write_str("lobby"),
            Channel::Game(id) => write!(f, "game.{id}"),
            Channel::GameTv(id) => write!(f, "gametv.{id}"),
        }
    }
}

impl FromStr for Channel {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || HubError::MalformedTopic {
            topic: s.to_string(),
        };
        if s == "lobby" {
            return Ok(Channel::Lobby);
        }
        let (kind, id) = s.split_once('.').ok_or_else(malformed)?;
        let id = Uuid::parse_str(id).map_err(|_| malformed())?;
        match kind {
            "game" => Ok(Channel::Game(id)),
            "gametv" => Ok(Channel::GameTv(id)),
            _ => Err(malformed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names_round_trip() {
        let id = Uuid::new_v4();
        for channel in [Channel::Lobby, Channel::Game(id), Channel::GameTv(id)] {
            assert_eq!(channel.to_string().parse::<Channel>().unwrap(), channel);
        }
        assert_eq!(Channel::Game(id).to_string(), format!("game.{id}"));
    }

    #[test]
    fn test_rejects_unknown_channels() {
        assert!("lobby.1".parse::<Channel>().is_err());
        assert!("game.not-a-uuid".parse::<Channel>().is_err());
        assert!(format!("arena.{}", Uuid::new_v4()).parse::<Channel>().is_err());
    }

    #[test]
    fn test_spectator_channels_are_secondary() {
        let id = Uuid::new_v4();
        assert!(Channel::Lobby.is_primary());
        assert!(Channel::Game(id).is_primary());
        assert!(!Channel::GameTv(id).is_primary());
        assert_eq!(Channel::GameTv(id).match_id(), Some(id));
    }
}
