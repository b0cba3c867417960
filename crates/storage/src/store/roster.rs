#![forbid(unsafe_code)]

//! Roster listing, row resolution and registration toggling.
//!
//! Listings are lock-free reads: a refresh may be a refresh interval
//! stale, which is fine for a human-paced roster. Row positions are
//! recomputed on every call and never persisted; `resolve_row` re-runs
//! the query under the caller's current configuration so a position can
//! only map to the team actually displayed there right now, or fail.

use super::*;
use crate::store::lease::load_team_lease_tx;
use hm_core::checklist::PENDING;
use hm_core::ids::RowPosition;
use hm_core::roster::{ApprovalState, RosterQuery, RosterSort, RosterSummary, TeamRosterRow};
use rusqlite::{OptionalExtension, Transaction, params};
use std::collections::BTreeMap;

impl HomologationStore {
    /// The team list under `query`, with dense 1-based row positions.
    pub fn list_roster(&self, query: &RosterQuery) -> Result<Vec<TeamRosterRow>, StoreError> {
        let zones = self.zone_ids()?;
        let zone_values = self.zone_aggregates()?;

        let order_by = match query.sort {
            RosterSort::TeamNumber => "t.number ASC",
            RosterSort::Name => "t.name COLLATE NOCASE ASC, t.number ASC",
            RosterSort::Category => "t.category ASC, t.number ASC",
        };
        let sql = format!(
            "SELECT t.team_id, t.number, t.name, t.category, s.registered, \
                    NOT EXISTS (SELECT 1 FROM team_points v \
                                WHERE v.team_id = t.team_id AND v.value <> 0) \
             FROM teams t \
             JOIN team_state s ON s.team_id = t.team_id \
             ORDER BY {order_by}"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)? != 0,
                row.get::<_, i64>(5)? != 0,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (team_id, number, name, category, registered, all_cleared) = row?;
            let homologated = registered && all_cleared;
            if !query.filter.matches(registered, homologated) {
                continue;
            }
            if let Some(categories) = &query.categories {
                if !categories.contains(&category) {
                    continue;
                }
            }

            let per_zone_values = zones
                .iter()
                .map(|&zone_id| {
                    let value = if registered {
                        zone_values.get(&(team_id, zone_id)).copied().flatten()
                    } else {
                        None
                    };
                    (ZoneId::new(zone_id), value)
                })
                .collect();

            out.push(TeamRosterRow {
                team_id: TeamId::new(team_id),
                number,
                display_name: name,
                category,
                approval_state: ApprovalState::from_flags(registered, homologated),
                per_zone_values,
                // Assigned below once the filtered set is known.
                row_order: RowPosition::new(0),
            });
        }

        for (index, row) in out.iter_mut().enumerate() {
            row.row_order = RowPosition::new(index as i64 + 1);
        }
        Ok(out)
    }

    /// Map a displayed row position back to the stable team id under the
    /// *current* query. Call immediately before any mutating operation:
    /// the mapping changes whenever the filter, sort or data changes.
    pub fn resolve_row(
        &self,
        position: RowPosition,
        query: &RosterQuery,
    ) -> Result<TeamId, StoreError> {
        let rows = self.list_roster(query)?;
        rows.iter()
            .find(|row| row.row_order == position)
            .map(|row| row.team_id)
            .ok_or(StoreError::StaleRow {
                position,
                rows: rows.len(),
            })
    }

    /// Counts for the status bar, unaffected by the active filter.
    pub fn roster_summary(&self) -> Result<RosterSummary, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT s.registered, \
                    NOT EXISTS (SELECT 1 FROM team_points v \
                                WHERE v.team_id = t.team_id AND v.value <> 0) \
             FROM teams t \
             JOIN team_state s ON s.team_id = t.team_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)? != 0, row.get::<_, i64>(1)? != 0))
        })?;

        let mut summary = RosterSummary::default();
        for row in rows {
            let (registered, all_cleared) = row?;
            summary.total += 1;
            match ApprovalState::from_flags(registered, registered && all_cleared) {
                ApprovalState::NotRegistered => summary.not_registered += 1,
                ApprovalState::Registered => summary.registered += 1,
                ApprovalState::Homologated => summary.homologated += 1,
            }
        }
        Ok(summary)
    }

    pub fn registration_state(&self, team_id: TeamId) -> Result<bool, StoreError> {
        team_registered_conn(&self.conn, team_id)
    }

    pub fn team_info(&self, team_id: TeamId) -> Result<TeamInfo, StoreError> {
        self.conn
            .query_row(
                "SELECT number, name, category FROM teams WHERE team_id = ?1",
                params![team_id.get()],
                |row| {
                    Ok(TeamInfo {
                        team_id,
                        number: row.get(0)?,
                        name: row.get(1)?,
                        category: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or(StoreError::UnknownTeam { team_id })
    }

    /// Flip a team's registration gate and return the new state.
    ///
    /// Short-lived and auto-committing: it respects the same non-blocking
    /// lock discipline as edit sessions but never holds the team beyond
    /// this call. Registering (re-)derives the team's point and comment
    /// rows from the template, which is also the repair path for a team
    /// whose checklist rows were reported corrupt.
    pub fn toggle_registration(&mut self, team_id: TeamId) -> Result<bool, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        if let Some((holder, _, expires_at_ms)) = load_team_lease_tx(&tx, team_id)? {
            if now_ms < expires_at_ms {
                return Err(StoreError::TeamLocked {
                    team_id,
                    holder_station: holder,
                    expires_at_ms,
                });
            }
            tx.execute(
                "DELETE FROM team_leases WHERE team_id = ?1",
                params![team_id.get()],
            )?;
        }

        let registered = team_registered_conn(&tx, team_id)?;
        let next = !registered;
        let affected = tx.execute(
            "UPDATE team_state SET registered = ?1 WHERE team_id = ?2",
            params![next as i64, team_id.get()],
        )?;
        if affected != 1 {
            return Err(StoreError::Integrity {
                team_id,
                detail: format!("expected one state row, update touched {affected}"),
            });
        }

        if next {
            derive_team_checklist_tx(&tx, team_id)?;
        }

        let payload_json = serde_json::json!({
            "team_id": team_id.get(),
            "registered": next,
            "station": self.station.as_str()
        })
        .to_string();
        append_event_tx(&tx, now_ms, Some(team_id), "registration_toggled", &payload_json)?;

        tx.commit()?;
        Ok(next)
    }

    fn zone_ids(&self) -> Result<Vec<i64>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT zone_id FROM zones ORDER BY zone_id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Per (team, zone) aggregate: MAX over the zone's values. 1 while
    /// anything is pending, 0 once every point is cleared, NULL when the
    /// zone carries only not-applicable rows.
    fn zone_aggregates(&self) -> Result<BTreeMap<(i64, i64), Option<i64>>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT team_id, zone_id, MAX(value) FROM team_points GROUP BY team_id, zone_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<i64>>(2)?,
            ))
        })?;

        let mut out = BTreeMap::new();
        for row in rows {
            let (team_id, zone_id, value) = row?;
            out.insert((team_id, zone_id), value);
        }
        Ok(out)
    }
}

/// Derive missing value and comment rows from the checklist template.
/// Existing rows are kept, so re-registering repairs holes without
/// resetting anything a judge already recorded.
fn derive_team_checklist_tx(tx: &Transaction<'_>, team_id: TeamId) -> Result<(), StoreError> {
    tx.execute(
        "INSERT OR IGNORE INTO team_points(team_id, zone_id, point_id, value) \
         SELECT ?1, zone_id, point_id, ?2 FROM checklist_template",
        params![team_id.get(), PENDING],
    )?;
    tx.execute(
        "INSERT OR IGNORE INTO team_comments(team_id, zone_id, comment) \
         SELECT ?1, zone_id, '' FROM zones",
        params![team_id.get()],
    )?;
    Ok(())
}
