#![forbid(unsafe_code)]

//! Per-team exclusive leases: the database-level lock that serializes edit
//! access across independent station processes.
//!
//! A claim never waits. If a live lease exists the claim fails with
//! [`StoreError::TeamLocked`] on the spot; the second judge gets an
//! immediate, actionable conflict instead of a hang. Expired leases are
//! treated as absent and garbage-collected by the next claim, so a crashed
//! station cannot pin a team forever.

use super::*;
use rusqlite::{OptionalExtension, Transaction, params};

pub const DEFAULT_LEASE_TTL_MS: i64 = 10 * 60 * 1000;
pub const MAX_LEASE_TTL_MS: i64 = 60 * 60 * 1000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TeamLease {
    pub team_id: TeamId,
    pub holder_station: String,
    pub acquired_at_ms: i64,
    pub expires_at_ms: i64,
}

pub(crate) fn load_team_lease_tx(
    tx: &Transaction<'_>,
    team_id: TeamId,
) -> Result<Option<(String, i64, i64)>, StoreError> {
    tx.query_row(
        "SELECT holder_station, acquired_at_ms, expires_at_ms FROM team_leases WHERE team_id = ?1",
        params![team_id.get()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        },
    )
    .optional()
    .map_err(StoreError::from)
}

/// Claim the team's lease or fail immediately. Re-entrant claims are
/// rejected too: a station already holding the lease must finish its
/// session before opening another.
pub(crate) fn claim_team_lease_tx(
    tx: &Transaction<'_>,
    team_id: TeamId,
    station: &str,
    ttl_ms: i64,
    now_ms: i64,
) -> Result<TeamLease, StoreError> {
    let ttl_ms = if ttl_ms <= 0 { DEFAULT_LEASE_TTL_MS } else { ttl_ms };
    if ttl_ms > MAX_LEASE_TTL_MS {
        return Err(StoreError::InvalidInput("lease ttl exceeds max_ttl_ms=3600000"));
    }

    let mut takeover_from: Option<String> = None;
    if let Some((holder, _acquired_at_ms, expires_at_ms)) = load_team_lease_tx(tx, team_id)? {
        if now_ms < expires_at_ms {
            return Err(StoreError::TeamLocked {
                team_id,
                holder_station: holder,
                expires_at_ms,
            });
        }
        takeover_from = Some(holder);
        tx.execute(
            "DELETE FROM team_leases WHERE team_id = ?1",
            params![team_id.get()],
        )?;
    }

    let expires_at_ms = now_ms + ttl_ms;
    tx.execute(
        "INSERT INTO team_leases(team_id, holder_station, acquired_at_ms, expires_at_ms) \
         VALUES (?1, ?2, ?3, ?4)",
        params![team_id.get(), station, now_ms, expires_at_ms],
    )?;

    let payload_json = serde_json::json!({
        "team_id": team_id.get(),
        "station": station,
        "ttl_ms": ttl_ms,
        "takeover_from": takeover_from
    })
    .to_string();
    append_event_tx(tx, now_ms, Some(team_id), "team_lease_claimed", &payload_json)?;

    Ok(TeamLease {
        team_id,
        holder_station: station.to_string(),
        acquired_at_ms: now_ms,
        expires_at_ms,
    })
}

/// Verify the lease is still held by this station and not expired.
pub(crate) fn enforce_team_lease_tx(
    tx: &Transaction<'_>,
    team_id: TeamId,
    station: &str,
    now_ms: i64,
) -> Result<(), StoreError> {
    match load_team_lease_tx(tx, team_id)? {
        None => Err(StoreError::LeaseNotHeld {
            team_id,
            holder_station: None,
        }),
        Some((_, _, expires_at_ms)) if now_ms >= expires_at_ms => Err(StoreError::LeaseNotHeld {
            team_id,
            holder_station: None,
        }),
        Some((holder, _, _)) if holder != station => Err(StoreError::LeaseNotHeld {
            team_id,
            holder_station: Some(holder),
        }),
        Some(_) => Ok(()),
    }
}

/// Push the expiry forward; called on every session mutation so a lease
/// outlives any session that is actually being worked on.
pub(crate) fn renew_team_lease_tx(
    tx: &Transaction<'_>,
    team_id: TeamId,
    station: &str,
    ttl_ms: i64,
    now_ms: i64,
) -> Result<i64, StoreError> {
    enforce_team_lease_tx(tx, team_id, station, now_ms)?;
    let expires_at_ms = now_ms + ttl_ms;
    tx.execute(
        "UPDATE team_leases SET expires_at_ms = ?3 WHERE team_id = ?1 AND holder_station = ?2",
        params![team_id.get(), station, expires_at_ms],
    )?;
    Ok(expires_at_ms)
}

pub(crate) fn release_team_lease_tx(
    tx: &Transaction<'_>,
    team_id: TeamId,
    station: &str,
    now_ms: i64,
) -> Result<(), StoreError> {
    enforce_team_lease_tx(tx, team_id, station, now_ms)?;
    tx.execute(
        "DELETE FROM team_leases WHERE team_id = ?1 AND holder_station = ?2",
        params![team_id.get(), station],
    )?;

    let payload_json = serde_json::json!({
        "team_id": team_id.get(),
        "station": station
    })
    .to_string();
    append_event_tx(tx, now_ms, Some(team_id), "team_lease_released", &payload_json)?;
    Ok(())
}

impl HomologationStore {
    /// The live lease on a team, if any. Expired leases read as absent.
    pub fn team_lease(&self, team_id: TeamId) -> Result<Option<TeamLease>, StoreError> {
        let now_ms = now_ms();
        let lease = self
            .conn
            .query_row(
                "SELECT holder_station, acquired_at_ms, expires_at_ms \
                 FROM team_leases WHERE team_id = ?1",
                params![team_id.get()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        Ok(lease.and_then(|(holder_station, acquired_at_ms, expires_at_ms)| {
            if now_ms < expires_at_ms {
                Some(TeamLease {
                    team_id,
                    holder_station,
                    acquired_at_ms,
                    expires_at_ms,
                })
            } else {
                None
            }
        }))
    }
}
