//! Injected collaborators used while starting a game.
//!
//! Bot strategy and the game engine live outside roomsync. The coordinator
//! only needs two things from them: synthetic participants to fill empty
//! seats ([`BotFactory`]) and a running game to send everyone to
//! ([`GameFactory`]). Both ship with a simple default.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use roomsync_protocol::{Membership, Room, UserId};

use crate::CollaboratorError;

/// Supplies synthetic participants.
pub trait BotFactory: Send + Sync + 'static {
    /// Returns exactly `count` bots for `room`. Bots must be connected and
    /// ready, with ids no human will ever hold.
    fn create_bots(
        &self,
        room: &Room,
        count: usize,
    ) -> impl Future<Output = Result<Vec<Membership>, CollaboratorError>> + Send;
}

/// Where a started game lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameHandle {
    pub game_id: String,
    /// Sent to clients in `game-starting`.
    pub redirect_target: String,
}

/// Hands a full, teamed room over to the game engine.
pub trait GameFactory: Send + Sync + 'static {
    fn create_game(
        &self,
        room: &Room,
    ) -> impl Future<Output = Result<GameHandle, CollaboratorError>> + Send;
}

/// First id handed out by [`SequentialBots`].
pub const BOT_ID_BASE: u64 = 1 << 48;

/// Bots with sequential ids starting at [`BOT_ID_BASE`].
#[derive(Debug)]
pub struct SequentialBots {
    next_id: AtomicU64,
}

impl SequentialBots {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(BOT_ID_BASE),
        }
    }
}

impl Default for SequentialBots {
    fn default() -> Self {
        Self::new()
    }
}

impl BotFactory for SequentialBots {
    async fn create_bots(&self, room: &Room, count: usize) -> Result<Vec<Membership>, CollaboratorError> {
        let now = Utc::now();
        let seated = room.members.iter().filter(|m| m.is_bot).count();
        Ok((0..count)
            .map(|i| {
                let id = UserId(self.next_id.fetch_add(1, Ordering::Relaxed));
                Membership::bot(id, format!("Bot {}", seated + i + 1), now)
            })
            .collect())
    }
}

/// Games addressed as `{base}/{game_id}`, with no engine behind them.
#[derive(Debug)]
pub struct RedirectGames {
    base: String,
    next_game: AtomicU64,
}

impl RedirectGames {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            next_game: AtomicU64::new(1),
        }
    }
}

impl Default for RedirectGames {
    fn default() -> Self {
        Self::new("/games")
    }
}

impl GameFactory for RedirectGames {
    async fn create_game(&self, room: &Room) -> Result<GameHandle, CollaboratorError> {
        if room.teams().is_none() {
            return Err(CollaboratorError::new(
                "game factory",
                format!("room {} has no teams", room.id),
            ));
        }
        let game_id = format!("G-{}-{}", room.id.0, self.next_game.fetch_add(1, Ordering::Relaxed));
        Ok(GameHandle {
            redirect_target: format!("{}/{game_id}", self.base),
            game_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use roomsync_protocol::{RoomId, RoomSettings, Team};

    use super::*;

    fn room() -> Room {
        Room::new(RoomId(4), "t", 4, RoomSettings::default(), Utc::now())
    }

    #[tokio::test]
    async fn test_create_bots_ready_with_reserved_ids() {
        let bots = SequentialBots::new().create_bots(&room(), 2).await.unwrap();
        assert_eq!(bots.len(), 2);
        assert!(bots.iter().all(|b| b.is_bot && b.is_ready()));
        assert!(bots.iter().all(|b| b.user_id.0 >= BOT_ID_BASE));
        assert_eq!(bots[1].display_name, "Bot 2");
        assert_ne!(bots[0].user_id, bots[1].user_id);
    }

    #[tokio::test]
    async fn test_create_game_requires_teams() {
        let games = RedirectGames::default();
        assert!(games.create_game(&room()).await.is_err());

        let mut room = room();
        let mut a = Membership::human(UserId(1), "a", Utc::now());
        a.team = Some(Team::One);
        let mut b = Membership::human(UserId(2), "b", Utc::now());
        b.team = Some(Team::Two);
        room.members = vec![a, b];

        let handle = games.create_game(&room).await.unwrap();
        assert_eq!(handle.redirect_target, format!("/games/{}", handle.game_id));
        assert!(handle.game_id.starts_with("G-4-"));
    }
}
