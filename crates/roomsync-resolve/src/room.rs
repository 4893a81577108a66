//! Room documents: higher version wins, equal versions merge field-wise.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use roomsync_protocol::{
    ConnectionState, Membership, ReadyState, Room, RoomSettings, Team, UserId,
};

use crate::{DocumentKind, ResolveError};

/// Merges two copies of the same room.
///
/// A strictly newer version is taken whole. With equal versions the two
/// writers diverged from a common parent and their changes are combined:
///
/// | field | rule |
/// |---|---|
/// | members | union by user; shared users keep the "livelier" record |
/// | status | later lifecycle stage |
/// | host | side with the later write, if still a member |
/// | settings | longest turn limit; spectators if either allows; auto-start only if both |
/// | capacity | larger; members beyond it are dropped latest-joined first |
pub fn merge_room(a: &Room, b: &Room) -> Result<Room, ResolveError> {
    if a.id != b.id {
        return Err(ResolveError::IdMismatch {
            kind: DocumentKind::Room,
            local: a.id.to_string(),
            remote: b.id.to_string(),
        });
    }
    let version = a.version.max(b.version) + 1;

    if a.version != b.version {
        let winner = if a.version > b.version { a } else { b };
        return Ok(Room {
            version,
            ..winner.clone()
        });
    }

    let (lead, trail) = if write_key(a) >= write_key(b) { (a, b) } else { (b, a) };
    let capacity = a.capacity.max(b.capacity);

    let mut by_user: BTreeMap<UserId, &Membership> = BTreeMap::new();
    for member in a.members.iter().chain(&b.members) {
        by_user
            .entry(member.user_id)
            .and_modify(|kept| {
                if member_key(member) > member_key(kept) {
                    *kept = member;
                }
            })
            .or_insert(member);
    }
    let mut members: Vec<Membership> = by_user.into_values().cloned().collect();
    members.sort_by_key(|m| (m.joined_at, m.user_id));
    members.truncate(capacity);

    let mut merged = Room {
        id: a.id,
        name: lead.name.clone(),
        capacity,
        host_id: None,
        status: if a.status.rank() >= b.status.rank() { a.status } else { b.status },
        version,
        settings: merge_settings(&a.settings, &b.settings),
        members,
        created_at: a.created_at.min(b.created_at),
        updated_at: a.updated_at.max(b.updated_at),
        started_at: earliest(a.started_at, b.started_at),
        finished_at: earliest(a.finished_at, b.finished_at),
        game_ref: match (&a.game_ref, &b.game_ref) {
            (Some(x), Some(y)) => Some(x.min(y).clone()),
            (x, y) => x.clone().or_else(|| y.clone()),
        },
    };

    merged.host_id = [lead.host_id, trail.host_id]
        .into_iter()
        .flatten()
        .find(|host| merged.is_member(*host))
        .or_else(|| merged.successor_host());

    Ok(merged)
}

fn write_key(room: &Room) -> (DateTime<Utc>, Option<UserId>, &str) {
    (room.updated_at, room.host_id, &room.name)
}

// Connected beats disconnected, ready beats not, an assigned team beats
// none, then the earlier join.
#[allow(clippy::type_complexity)]
fn member_key(
    m: &Membership,
) -> (ConnectionState, ReadyState, Option<Team>, Reverse<DateTime<Utc>>, &str, bool) {
    (
        m.connection,
        m.ready,
        m.team,
        Reverse(m.joined_at),
        &m.display_name,
        m.is_bot,
    )
}

fn merge_settings(a: &RoomSettings, b: &RoomSettings) -> RoomSettings {
    RoomSettings {
        turn_time_limit_secs: a.turn_time_limit_secs.max(b.turn_time_limit_secs),
        allow_spectators: a.allow_spectators || b.allow_spectators,
        auto_start: a.auto_start && b.auto_start,
    }
}

fn earliest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    }
}
