//! Scoped transformations of a room document.
//!
//! Each function edits a `Room` in place and either succeeds or leaves a
//! reason. None of them touch `version` or `updated_at`; the store sets
//! both when the edited copy is committed. Pass them to
//! [`RoomStore::apply_mutation`](crate::RoomStore::apply_mutation) to
//! compose several into one atomic write.

use chrono::{DateTime, Utc};
use roomsync_protocol::{ConnectionState, Membership, ReadyState, Room, RoomStatus, UserId};

use crate::StoreError;

fn require_waiting(room: &Room) -> Result<(), StoreError> {
    if room.status != RoomStatus::Waiting {
        return Err(StoreError::NotWaiting {
            room: room.id,
            status: room.status,
        });
    }
    Ok(())
}

fn member_mut(room: &mut Room, user: UserId) -> Result<&mut Membership, StoreError> {
    let room_id = room.id;
    room.member_mut(user).ok_or(StoreError::MemberNotFound {
        room: room_id,
        user,
    })
}

/// Adds a participant. The first human to join becomes host.
pub fn add_member(room: &mut Room, member: Membership) -> Result<(), StoreError> {
    require_waiting(room)?;
    if room.is_member(member.user_id) {
        return Err(StoreError::AlreadyMember {
            room: room.id,
            user: member.user_id,
        });
    }
    if room.is_full() {
        return Err(StoreError::RoomFull {
            room: room.id,
            capacity: room.capacity,
        });
    }
    if room.host_id.is_none() && !member.is_bot {
        room.host_id = Some(member.user_id);
    }
    room.members.push(member);
    clear_teams(room);
    Ok(())
}

/// Removes a participant, handing the host role on if they held it.
///
/// A room that hasn't started and loses its last member is cancelled.
pub fn remove_member(room: &mut Room, user: UserId, now: DateTime<Utc>) -> Result<Membership, StoreError> {
    let index = room
        .members
        .iter()
        .position(|m| m.user_id == user)
        .ok_or(StoreError::MemberNotFound {
            room: room.id,
            user,
        })?;
    let removed = room.members.remove(index);
    clear_teams(room);

    if room.host_id == Some(user) {
        room.host_id = room.successor_host();
    }
    if room.members.is_empty() && room.status == RoomStatus::Waiting {
        room.status = RoomStatus::Cancelled;
        room.host_id = None;
        room.finished_at = Some(now);
    }
    Ok(removed)
}

/// Sets readiness. Only a connected member of a waiting room may change it.
pub fn set_ready(room: &mut Room, user: UserId, ready: ReadyState) -> Result<(), StoreError> {
    require_waiting(room)?;
    let member = member_mut(room, user)?;
    if !member.is_connected() {
        return Err(StoreError::Invalid(format!(
            "user {user} is disconnected and cannot change readiness"
        )));
    }
    member.ready = ready;
    Ok(())
}

/// Marks a member connected or disconnected. Disconnecting clears
/// readiness.
pub fn set_connection(room: &mut Room, user: UserId, state: ConnectionState) -> Result<(), StoreError> {
    let member = member_mut(room, user)?;
    member.connection = state;
    if state == ConnectionState::Disconnected {
        member.ready = ReadyState::NotReady;
    }
    Ok(())
}

pub fn clear_teams(room: &mut Room) {
    for member in &mut room.members {
        member.team = None;
    }
}

/// Moves the room along its lifecycle, stamping the matching timestamp.
pub fn set_status(room: &mut Room, to: RoomStatus, now: DateTime<Utc>) -> Result<(), StoreError> {
    if !room.status.can_transition_to(to) {
        return Err(StoreError::IllegalTransition {
            from: room.status,
            to,
        });
    }
    match to {
        RoomStatus::Playing => room.started_at = Some(now),
        RoomStatus::Finished | RoomStatus::Cancelled => room.finished_at = Some(now),
        RoomStatus::Waiting => {
            room.started_at = None;
            room.game_ref = None;
        }
        RoomStatus::Starting => {}
    }
    room.status = to;
    Ok(())
}

/// Drops every disconnected member, reassigning the host if needed.
/// Returns who was dropped.
pub fn drop_disconnected(room: &mut Room) -> Vec<UserId> {
    let dropped: Vec<UserId> = room
        .members
        .iter()
        .filter(|m| !m.is_connected())
        .map(|m| m.user_id)
        .collect();
    if dropped.is_empty() {
        return dropped;
    }
    room.members.retain(|m| m.is_connected());
    clear_teams(room);
    if room.host_id.is_some_and(|host| dropped.contains(&host)) {
        room.host_id = room.successor_host();
    }
    dropped
}

/// Seats synthetic participants. They never push the room past capacity.
pub fn add_bots(room: &mut Room, bots: Vec<Membership>) -> Result<(), StoreError> {
    let free = room.capacity.saturating_sub(room.members.len());
    if bots.len() > free {
        return Err(StoreError::RoomFull {
            room: room.id,
            capacity: room.capacity,
        });
    }
    for bot in bots {
        if room.is_member(bot.user_id) {
            return Err(StoreError::AlreadyMember {
                room: room.id,
                user: bot.user_id,
            });
        }
        room.members.push(bot);
    }
    Ok(())
}

/// Removes every synthetic participant and returns their ids.
pub fn remove_bots(room: &mut Room) -> Vec<UserId> {
    let bots: Vec<UserId> = room
        .members
        .iter()
        .filter(|m| m.is_bot)
        .map(|m| m.user_id)
        .collect();
    room.members.retain(|m| !m.is_bot);
    bots
}

#[cfg(test)]
mod tests {
    use roomsync_protocol::{RoomId, RoomSettings};

    use super::*;

    fn room(capacity: usize) -> Room {
        Room::new(RoomId(1), "t", capacity, RoomSettings::default(), Utc::now())
    }

    fn human(id: u64) -> Membership {
        Membership::human(UserId(id), format!("p{id}"), Utc::now())
    }

    fn seated(ids: &[u64]) -> Room {
        let mut room = room(4);
        for &id in ids {
            add_member(&mut room, human(id)).unwrap();
        }
        room
    }

    // --- add_member ---

    #[test]
    fn test_add_member_first_human_becomes_host() {
        let room = seated(&[1, 2]);
        assert_eq!(room.host_id, Some(UserId(1)));
    }

    #[test]
    fn test_add_member_full_room_rejected() {
        let mut room = room(2);
        add_member(&mut room, human(1)).unwrap();
        add_member(&mut room, human(2)).unwrap();
        assert!(matches!(
            add_member(&mut room, human(3)),
            Err(StoreError::RoomFull { capacity: 2, .. })
        ));
    }

    #[test]
    fn test_add_member_twice_rejected() {
        let mut room = seated(&[1]);
        assert!(matches!(
            add_member(&mut room, human(1)),
            Err(StoreError::AlreadyMember { .. })
        ));
    }

    #[test]
    fn test_add_member_not_waiting_rejected() {
        let mut room = seated(&[1]);
        room.status = RoomStatus::Playing;
        assert!(matches!(
            add_member(&mut room, human(2)),
            Err(StoreError::NotWaiting { .. })
        ));
    }

    #[test]
    fn test_add_member_clears_teams() {
        let mut room = seated(&[1, 2]);
        room.members[0].team = Some(roomsync_protocol::Team::One);
        add_member(&mut room, human(3)).unwrap();
        assert!(room.members.iter().all(|m| m.team.is_none()));
    }

    // --- remove_member ---

    #[test]
    fn test_remove_member_host_prefers_ready_connected() {
        let mut room = seated(&[1, 2, 3]);
        set_ready(&mut room, UserId(3), ReadyState::Ready).unwrap();

        remove_member(&mut room, UserId(1), Utc::now()).unwrap();
        assert_eq!(room.host_id, Some(UserId(3)));
    }

    #[test]
    fn test_remove_member_host_falls_back_to_disconnected() {
        let mut room = seated(&[1, 2]);
        set_connection(&mut room, UserId(2), ConnectionState::Disconnected).unwrap();

        remove_member(&mut room, UserId(1), Utc::now()).unwrap();
        assert_eq!(room.host_id, Some(UserId(2)));
    }

    #[test]
    fn test_remove_member_last_member_cancels_waiting_room() {
        let mut room = seated(&[1]);
        remove_member(&mut room, UserId(1), Utc::now()).unwrap();
        assert_eq!(room.status, RoomStatus::Cancelled);
        assert_eq!(room.host_id, None);
        assert!(room.finished_at.is_some());
    }

    #[test]
    fn test_remove_member_unknown_user_rejected() {
        let mut room = seated(&[1]);
        assert!(matches!(
            remove_member(&mut room, UserId(9), Utc::now()),
            Err(StoreError::MemberNotFound { .. })
        ));
    }

    // --- readiness and connection ---

    #[test]
    fn test_set_ready_disconnected_member_rejected() {
        let mut room = seated(&[1, 2]);
        set_connection(&mut room, UserId(2), ConnectionState::Disconnected).unwrap();
        assert!(matches!(
            set_ready(&mut room, UserId(2), ReadyState::Ready),
            Err(StoreError::Invalid(_))
        ));
    }

    #[test]
    fn test_set_connection_disconnect_clears_ready() {
        let mut room = seated(&[1]);
        set_ready(&mut room, UserId(1), ReadyState::Ready).unwrap();
        set_connection(&mut room, UserId(1), ConnectionState::Disconnected).unwrap();

        let member = room.member(UserId(1)).unwrap();
        assert_eq!(member.ready, ReadyState::NotReady);
        assert!(!member.is_connected());
    }

    // --- status ---

    #[test]
    fn test_set_status_stamps_start_and_rollback_clears_it() {
        let mut room = seated(&[1, 2]);
        let now = Utc::now();
        set_status(&mut room, RoomStatus::Starting, now).unwrap();
        set_status(&mut room, RoomStatus::Waiting, now).unwrap();
        assert_eq!(room.started_at, None);

        set_status(&mut room, RoomStatus::Starting, now).unwrap();
        set_status(&mut room, RoomStatus::Playing, now).unwrap();
        assert_eq!(room.started_at, Some(now));
    }

    #[test]
    fn test_set_status_illegal_edge_rejected() {
        let mut room = seated(&[1]);
        assert!(matches!(
            set_status(&mut room, RoomStatus::Finished, Utc::now()),
            Err(StoreError::IllegalTransition { .. })
        ));
        assert_eq!(room.status, RoomStatus::Waiting);
    }

    // --- start helpers ---

    #[test]
    fn test_drop_disconnected_reassigns_host() {
        let mut room = seated(&[1, 2, 3]);
        set_connection(&mut room, UserId(1), ConnectionState::Disconnected).unwrap();

        let dropped = drop_disconnected(&mut room);
        assert_eq!(dropped, vec![UserId(1)]);
        assert_eq!(room.host_id, Some(UserId(2)));
        assert_eq!(room.members.len(), 2);
    }

    #[test]
    fn test_add_bots_respects_capacity() {
        let mut room = seated(&[1, 2]);
        let bots = (10..13)
            .map(|id| Membership::bot(UserId(id), format!("Bot {id}"), Utc::now()))
            .collect();
        assert!(matches!(
            add_bots(&mut room, bots),
            Err(StoreError::RoomFull { .. })
        ));
        assert_eq!(room.members.len(), 2);
    }

    #[test]
    fn test_remove_bots_leaves_humans() {
        let mut room = seated(&[1]);
        add_bots(&mut room, vec![Membership::bot(UserId(10), "Bot", Utc::now())]).unwrap();
        assert_eq!(remove_bots(&mut room), vec![UserId(10)]);
        assert_eq!(room.members.len(), 1);
    }
}
