//! Identity documents: last-write-wins with immutable and cumulative fields.

use chrono::{DateTime, Utc};

use crate::{DocumentKind, ResolveError, UserProfile};

/// Merges two copies of the same profile.
///
/// - display name and avatar come from the later `updated_at`
/// - user id, creation time and credential hash come from the earliest
///   created side, or whichever side has them
/// - `games_played` / `games_won` take the maximum
pub fn merge_identity(a: &UserProfile, b: &UserProfile) -> Result<UserProfile, ResolveError> {
    if a.user_id != b.user_id {
        return Err(ResolveError::IdMismatch {
            kind: DocumentKind::Identity,
            local: a.user_id.to_string(),
            remote: b.user_id.to_string(),
        });
    }

    let newer = if last_write_key(a) >= last_write_key(b) { a } else { b };
    let (origin, other) = if origin_key(a) <= origin_key(b) { (a, b) } else { (b, a) };

    Ok(UserProfile {
        user_id: a.user_id,
        created_at: origin.created_at,
        credential_hash: origin
            .credential_hash
            .clone()
            .or_else(|| other.credential_hash.clone()),
        display_name: newer.display_name.clone(),
        avatar: newer.avatar.clone(),
        updated_at: newer.updated_at,
        games_played: a.games_played.max(b.games_played),
        games_won: a.games_won.max(b.games_won),
        version: a.version.max(b.version) + 1,
    })
}

// Equal timestamps fall through to the field values so both argument
// orders pick the same winner.
fn last_write_key(p: &UserProfile) -> (DateTime<Utc>, &str, Option<&str>) {
    (p.updated_at, &p.display_name, p.avatar.as_deref())
}

// Earliest creation first; a side holding the hash beats one without.
fn origin_key(p: &UserProfile) -> (DateTime<Utc>, bool, Option<&str>) {
    (p.created_at, p.credential_hash.is_none(), p.credential_hash.as_deref())
}
