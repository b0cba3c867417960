#![forbid(unsafe_code)]

//! Edit sessions: the acquire → stage → commit/cancel protocol.
//!
//! `session_open` claims the team's lease and snapshots the checklist plus
//! the comment inside one transaction. Toggles and comment edits are
//! staged on the session; nothing is written to the store until
//! `session_commit`, which applies every staged change in one guarded
//! transaction and releases the lease. `session_cancel` releases without
//! writing, so the store is exactly as it was before the open.
//!
//! A long-held write transaction would serialize every station sharing the
//! database, so the lease row is what keeps edits exclusive per team for
//! the whole human-paced session.

use super::*;
use crate::store::lease::{
    claim_team_lease_tx, enforce_team_lease_tx, load_team_lease_tx, release_team_lease_tx,
    renew_team_lease_tx,
};
use hm_core::checklist;
use rusqlite::params;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Locked,
    Committed,
    Cancelled,
}

#[derive(Debug)]
pub struct EditSession {
    team_id: TeamId,
    zone_id: ZoneId,
    state: SessionState,
    lease: TeamLease,
    lease_ttl_ms: i64,
    items: Vec<ChecklistItem>,
    staged_values: BTreeMap<i64, i64>,
    comment: String,
    staged_comment: Option<String>,
}

impl EditSession {
    pub fn team_id(&self) -> TeamId {
        self.team_id
    }

    pub fn zone_id(&self) -> ZoneId {
        self.zone_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn started_at_ms(&self) -> i64 {
        self.lease.acquired_at_ms
    }

    pub fn lease(&self) -> &TeamLease {
        &self.lease
    }

    /// The checklist snapshot taken at open, in linearizer input order.
    /// Staged toggles do not rewrite it; see [`EditSession::value_of`].
    pub fn items(&self) -> &[ChecklistItem] {
        &self.items
    }

    /// Effective value of a point, staged toggles included.
    pub fn value_of(&self, point_id: PointId) -> Option<i64> {
        if let Some(value) = self.staged_values.get(&point_id.get()) {
            return Some(*value);
        }
        self.items
            .iter()
            .find(|item| item.point_id == point_id)
            .and_then(|item| item.value)
    }

    /// Effective comment, the staged text if one was set.
    pub fn comment(&self) -> &str {
        self.staged_comment.as_deref().unwrap_or(&self.comment)
    }

    /// Stage the comment text. Idempotent; the last staged text wins at
    /// commit.
    pub fn set_comment(&mut self, text: impl Into<String>) -> Result<(), StoreError> {
        self.ensure_locked()?;
        self.staged_comment = Some(text.into());
        Ok(())
    }

    pub fn staged_changes(&self) -> usize {
        self.staged_values.len() + usize::from(self.staged_comment.is_some())
    }

    fn ensure_locked(&self) -> Result<(), StoreError> {
        if self.state == SessionState::Locked {
            Ok(())
        } else {
            Err(StoreError::SessionClosed)
        }
    }
}

impl HomologationStore {
    /// Begin editing a team's checklist for one zone.
    ///
    /// Fails fast with [`StoreError::TeamLocked`] when any session holds
    /// the team (no queueing), with [`StoreError::NotRegistered`] when the
    /// registration gate is off, and with [`StoreError::Integrity`] when
    /// the (team, zone) rows are corrupt. On failure no lease and no
    /// session state is left behind.
    pub fn session_open(&mut self, request: SessionOpenRequest) -> Result<EditSession, StoreError> {
        let SessionOpenRequest {
            team_id,
            zone_id,
            lease_ttl_ms,
        } = request;

        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        if !team_registered_conn(&tx, team_id)? {
            return Err(StoreError::NotRegistered { team_id });
        }

        let lease = claim_team_lease_tx(&tx, team_id, self.station.as_str(), lease_ttl_ms, now_ms)?;

        let items = query_items_conn(&tx, team_id, zone_id)?;
        if items.is_empty() {
            return Err(StoreError::Integrity {
                team_id,
                detail: format!("no checklist rows for zone {}", zone_id.get()),
            });
        }
        let comment = comment_conn(&tx, team_id, zone_id)?;

        let payload_json = serde_json::json!({
            "team_id": team_id.get(),
            "zone_id": zone_id.get(),
            "station": self.station.as_str()
        })
        .to_string();
        append_event_tx(&tx, now_ms, Some(team_id), "session_opened", &payload_json)?;

        tx.commit()?;

        let lease_ttl_ms = lease.expires_at_ms - lease.acquired_at_ms;
        Ok(EditSession {
            team_id,
            zone_id,
            state: SessionState::Locked,
            lease,
            lease_ttl_ms,
            items,
            staged_values: BTreeMap::new(),
            comment,
            staged_comment: None,
        })
    }

    /// Flip one point's value inside the session and return the new
    /// value. The point must match exactly one checklist row.
    pub fn session_toggle_point(
        &mut self,
        session: &mut EditSession,
        point_id: PointId,
    ) -> Result<i64, StoreError> {
        session.ensure_locked()?;
        let team_id = session.team_id;

        let matches = session
            .items
            .iter()
            .filter(|item| item.point_id == point_id)
            .count();
        if matches == 0 {
            return Err(StoreError::UnknownPoint { team_id, point_id });
        }
        if matches > 1 {
            return Err(StoreError::Integrity {
                team_id,
                detail: format!(
                    "point {} matched {matches} checklist rows",
                    point_id.get()
                ),
            });
        }

        let now_ms = now_ms();
        let ttl_ms = session.lease_ttl_ms;
        let tx = self.conn.transaction()?;
        let expires_at_ms =
            renew_team_lease_tx(&tx, team_id, self.station.as_str(), ttl_ms, now_ms)?;
        tx.commit()?;
        session.lease.expires_at_ms = expires_at_ms;

        let next = checklist::toggled(session.value_of(point_id));
        session.staged_values.insert(point_id.get(), next);
        Ok(next)
    }

    /// Apply every staged change in one transaction and release the lock.
    pub fn session_commit(&mut self, session: &mut EditSession) -> Result<(), StoreError> {
        session.ensure_locked()?;
        let team_id = session.team_id;
        let zone_id = session.zone_id;

        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        enforce_team_lease_tx(&tx, team_id, self.station.as_str(), now_ms)?;

        for (&point_id, &value) in &session.staged_values {
            let affected = tx.execute(
                "UPDATE team_points SET value = ?1 \
                 WHERE team_id = ?2 AND zone_id = ?3 AND point_id = ?4",
                params![value, team_id.get(), zone_id.get(), point_id],
            )?;
            if affected != 1 {
                return Err(StoreError::Integrity {
                    team_id,
                    detail: format!(
                        "point {point_id}: expected one value row, update touched {affected}"
                    ),
                });
            }
        }

        let comment_changed = session.staged_comment.is_some();
        if let Some(text) = session.staged_comment.as_deref() {
            // Zero affected rows means the text did not change; more than
            // one means the comment table lost its one-row-per-zone shape.
            let affected = tx.execute(
                "UPDATE team_comments SET comment = ?1 WHERE team_id = ?2 AND zone_id = ?3",
                params![text, team_id.get(), zone_id.get()],
            )?;
            if affected > 1 {
                return Err(StoreError::Integrity {
                    team_id,
                    detail: format!("comment update touched {affected} rows"),
                });
            }
        }

        release_team_lease_tx(&tx, team_id, self.station.as_str(), now_ms)?;

        let payload_json = serde_json::json!({
            "team_id": team_id.get(),
            "zone_id": zone_id.get(),
            "station": self.station.as_str(),
            "points_changed": session.staged_values.len(),
            "comment_changed": comment_changed
        })
        .to_string();
        append_event_tx(&tx, now_ms, Some(team_id), "session_committed", &payload_json)?;

        tx.commit()?;
        session.state = SessionState::Committed;
        Ok(())
    }

    /// Discard every staged change and release the lock. The store is left
    /// exactly as it was before `session_open`.
    pub fn session_cancel(&mut self, session: &mut EditSession) -> Result<(), StoreError> {
        session.ensure_locked()?;
        let team_id = session.team_id;
        let zone_id = session.zone_id;

        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        // Release only a lease that is still ours; a lapsed one may have
        // been taken over by another station already.
        if let Some((holder, _, expires_at_ms)) = load_team_lease_tx(&tx, team_id)? {
            if holder == self.station.as_str() && now_ms < expires_at_ms {
                release_team_lease_tx(&tx, team_id, self.station.as_str(), now_ms)?;
            }
        }

        let payload_json = serde_json::json!({
            "team_id": team_id.get(),
            "zone_id": zone_id.get(),
            "station": self.station.as_str(),
            "points_discarded": session.staged_values.len()
        })
        .to_string();
        append_event_tx(&tx, now_ms, Some(team_id), "session_cancelled", &payload_json)?;

        tx.commit()?;
        session.state = SessionState::Cancelled;
        Ok(())
    }
}
