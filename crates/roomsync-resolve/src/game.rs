//! Game-session documents: lifecycle never regresses, counters only grow.

use std::collections::{BTreeMap, BTreeSet};

use crate::{DocumentKind, GameSessionDoc, ResolveError};

/// Merges two copies of the same game session.
///
/// `(round, trick)` is taken as a pair from the further-along side, since a
/// trick counter restarts every round.
pub fn merge_game_session(
    a: &GameSessionDoc,
    b: &GameSessionDoc,
) -> Result<GameSessionDoc, ResolveError> {
    if a.game_id != b.game_id {
        return Err(ResolveError::IdMismatch {
            kind: DocumentKind::GameSession,
            local: a.game_id.clone(),
            remote: b.game_id.clone(),
        });
    }

    let ahead = match a.progress().cmp(&b.progress()) {
        std::cmp::Ordering::Greater => Some(a),
        std::cmp::Ordering::Less => Some(b),
        std::cmp::Ordering::Equal => None,
    };
    let (round, trick) = (a.round, a.trick).max((b.round, b.trick));

    let mut scores = a.scores.clone();
    for (team, &score) in &b.scores {
        let entry = scores.entry(*team).or_insert(0);
        *entry = (*entry).max(score);
    }

    let seats: BTreeSet<u8> = a.hands.keys().chain(b.hands.keys()).copied().collect();
    let mut hands = BTreeMap::new();
    for seat in seats {
        let hand = prefer(
            a.hands.get(&seat).filter(|h| !h.is_empty()),
            b.hands.get(&seat).filter(|h| !h.is_empty()),
            ahead.map(|side| side.hands.get(&seat)),
        );
        hands.insert(seat, hand.cloned().unwrap_or_default());
    }

    let current_player = prefer(
        a.current_player.as_ref(),
        b.current_player.as_ref(),
        ahead.map(|side| side.current_player.as_ref()),
    )
    .copied();

    Ok(GameSessionDoc {
        game_id: a.game_id.clone(),
        status: a.status.max(b.status),
        round,
        trick,
        scores,
        hands,
        current_player,
        updated_at: a.updated_at.max(b.updated_at),
        version: a.version.max(b.version) + 1,
    })
}

/// Non-empty beats empty; with both present the further-along side's value
/// wins, and on equal progress the smaller value.
fn prefer<'a, T: Ord>(
    a: Option<&'a T>,
    b: Option<&'a T>,
    ahead: Option<Option<&'a T>>,
) -> Option<&'a T> {
    match (a, b) {
        (Some(x), Some(y)) => match ahead {
            Some(Some(winner)) => Some(winner),
            _ => Some(x.min(y)),
        },
        (x, y) => x.or(y),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::GameStatus;

    fn session(status: GameStatus, round: u32, trick: u32) -> GameSessionDoc {
        GameSessionDoc {
            game_id: "g-1".into(),
            status,
            round,
            trick,
            scores: BTreeMap::new(),
            hands: BTreeMap::new(),
            current_player: None,
            updated_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            version: 3,
        }
    }

    fn cards(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_merge_game_session_status_never_regresses() {
        let a = session(GameStatus::Completed, 5, 0);
        let b = session(GameStatus::InProgress, 5, 2);
        let merged = merge_game_session(&a, &b).unwrap();
        assert_eq!(merged.status, GameStatus::Completed);
    }

    #[test]
    fn test_merge_game_session_round_and_trick_move_together() {
        let a = session(GameStatus::InProgress, 3, 1);
        let b = session(GameStatus::InProgress, 2, 7);
        let merged = merge_game_session(&a, &b).unwrap();
        assert_eq!((merged.round, merged.trick), (3, 1));
    }

    #[test]
    fn test_merge_game_session_scores_take_maximum_per_team() {
        let mut a = session(GameStatus::InProgress, 1, 1);
        a.scores.insert(1, 40);
        a.scores.insert(2, 10);
        let mut b = session(GameStatus::InProgress, 1, 1);
        b.scores.insert(2, 25);

        let merged = merge_game_session(&a, &b).unwrap();
        assert_eq!(merged.scores[&1], 40);
        assert_eq!(merged.scores[&2], 25);
    }

    #[test]
    fn test_merge_game_session_prefers_non_empty_hand() {
        let mut a = session(GameStatus::InProgress, 1, 2);
        a.hands.insert(0, Vec::new());
        let mut b = session(GameStatus::InProgress, 1, 1);
        b.hands.insert(0, cards(&["AS", "KD"]));

        let merged = merge_game_session(&a, &b).unwrap();
        assert_eq!(merged.hands[&0], cards(&["AS", "KD"]));
    }

    #[test]
    fn test_merge_game_session_both_hands_present_takes_advanced_side() {
        let mut a = session(GameStatus::InProgress, 1, 3);
        a.hands.insert(0, cards(&["KD"]));
        a.current_player = Some(2);
        let mut b = session(GameStatus::InProgress, 1, 2);
        b.hands.insert(0, cards(&["AS", "KD"]));
        b.current_player = Some(1);

        let merged = merge_game_session(&a, &b).unwrap();
        assert_eq!(merged.hands[&0], cards(&["KD"]));
        assert_eq!(merged.current_player, Some(2));
    }

    #[test]
    fn test_merge_game_session_rejects_different_games() {
        let a = session(GameStatus::Waiting, 0, 0);
        let mut b = a.clone();
        b.game_id = "g-2".into();
        assert!(merge_game_session(&a, &b).is_err());
    }
}
