//! Random team formation.

use rand::Rng;
use rand::seq::SliceRandom;
use roomsync_protocol::{MIN_CAPACITY, Room, RoomStatus, Team, TeamPartition, UserId};

use crate::StoreError;

/// Shuffles `players` and splits them into two sides whose sizes differ by
/// at most one. On odd counts the first side is the larger.
pub fn partition<R: Rng + ?Sized>(
    players: &[UserId],
    rng: &mut R,
) -> Result<TeamPartition, StoreError> {
    if players.len() < MIN_CAPACITY {
        return Err(StoreError::Invalid(format!(
            "need at least {MIN_CAPACITY} connected players to form teams, have {}",
            players.len()
        )));
    }
    let mut team1 = players.to_vec();
    team1.shuffle(rng);
    let team2 = team1.split_off(players.len().div_ceil(2));
    Ok(TeamPartition { team1, team2 })
}

/// Replaces every team assignment in `room` with a fresh partition of its
/// connected members. Disconnected members end up with no team.
pub fn assign_teams<R: Rng + ?Sized>(
    room: &mut Room,
    rng: &mut R,
) -> Result<TeamPartition, StoreError> {
    if !matches!(room.status, RoomStatus::Waiting | RoomStatus::Starting) {
        return Err(StoreError::NotWaiting {
            room: room.id,
            status: room.status,
        });
    }
    let connected: Vec<UserId> = room.connected_members().map(|m| m.user_id).collect();
    let teams = partition(&connected, rng)?;

    for member in &mut room.members {
        member.team = if teams.team1.contains(&member.user_id) {
            Some(Team::One)
        } else if teams.team2.contains(&member.user_id) {
            Some(Team::Two)
        } else {
            None
        };
    }
    Ok(teams)
}
