#![forbid(unsafe_code)]

//! The judging-station surface: everything a front end calls.
//!
//! The station owns the roster configuration (no globals), the connection
//! to the shared store and at most one open checklist. Row positions are
//! resolved to team ids immediately before every operation, because the
//! visible roster can change between the moment a judge looks at the
//! screen and the moment they click.

use crate::journal::StationJournal;
use crate::messages::{StationError, UserMessage, conflict_message};
use crate::view::RosterView;
use hm_core::checklist::CLEARED;
use hm_core::ids::{PointId, RowPosition, StationId, TeamId, ZoneId};
use hm_core::outline::{OutlineNode, linearize};
use hm_core::roster::{RosterFilter, RosterQuery, RosterSort};
use hm_storage::{EditSession, HomologationStore, SessionOpenRequest, StoreError, TeamInfo};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

#[cfg(test)]
mod tests;

/// How often the presentation layer should pull `refresh_roster`.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 500;

/// One checklist row, placed by `display_order`, hidden while an ancestor
/// section is cleared.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutlineRow {
    pub display_order: u32,
    pub label: String,
    /// Numbered text as shown, e.g. "2.1.-Emergency stop reachable".
    pub text: String,
    pub level: u32,
    pub is_section: bool,
    pub value: Option<i64>,
    pub descendant_display_orders: Vec<u32>,
    pub visible: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChecklistPage {
    pub team_id: i64,
    pub team_number: i64,
    pub team_name: String,
    pub zone_id: i64,
    pub header: String,
    pub comment: String,
    pub rows: Vec<OutlineRow>,
}

impl ChecklistPage {
    fn build(info: &TeamInfo, zone_id: ZoneId, nodes: &[OutlineNode], comment: &str) -> Self {
        let by_point: BTreeMap<i64, &OutlineNode> = nodes
            .iter()
            .map(|node| (node.item.point_id.get(), node))
            .collect();

        let mut rows: Vec<OutlineRow> = nodes
            .iter()
            .map(|node| OutlineRow {
                display_order: node.display_order,
                label: node.label.clone(),
                text: format!("{}-{}", node.label, node.item.description),
                level: node.item.level,
                is_section: node.item.is_section,
                value: node.item.value,
                descendant_display_orders: node.descendant_display_orders.clone(),
                visible: ancestors_expanded(node, &by_point),
            })
            .collect();
        rows.sort_by_key(|row| row.display_order);

        Self {
            team_id: info.team_id.get(),
            team_number: info.number,
            team_name: info.name.clone(),
            zone_id: zone_id.get(),
            header: format!("({}) {} - Zone {}", info.number, info.name, zone_id.get()),
            comment: comment.to_string(),
            rows,
        }
    }
}

/// Hidden exactly when some proper ancestor section is cleared; a cleared
/// section hides its whole subtree.
fn ancestors_expanded(node: &OutlineNode, by_point: &BTreeMap<i64, &OutlineNode>) -> bool {
    let mut cursor = node.item.parent_section_id;
    while let Some(parent) = cursor {
        let Some(parent_node) = by_point.get(&parent.get()) else {
            break;
        };
        if parent_node.item.value == Some(CLEARED) {
            return false;
        }
        cursor = parent_node.item.parent_section_id;
    }
    true
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToggleUpdate {
    pub point_id: i64,
    pub display_order: u32,
    pub new_value: i64,
    /// Rows whose visibility the renderer must re-derive; populated for
    /// section toggles, empty for leaf points.
    pub affected_display_orders: Vec<u32>,
}

/// What closed, and whether it was saved; the presentation layer
/// refreshes just this team's roster row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClosedChecklist {
    pub team_id: i64,
    pub zone_id: i64,
    pub saved: bool,
}

#[derive(Debug)]
pub enum OpenOutcome {
    Opened(ChecklistPage),
    /// The registration gate is off; the click is ignored, as at the
    /// original judging desks.
    NotRegistered,
    /// This station is already editing a team.
    EditInProgress,
    /// Another station holds the team.
    Locked(UserMessage),
    /// The row no longer exists under the current filter/sort.
    StaleRow,
}

#[derive(Debug)]
pub enum RegistrationOutcome {
    Updated { team_id: i64, registered: bool },
    EditInProgress,
    Locked(UserMessage),
    StaleRow,
}

pub struct Station {
    store: HomologationStore,
    query: RosterQuery,
    active: Option<ActiveChecklist>,
    journal: StationJournal,
}

struct ActiveChecklist {
    session: EditSession,
    nodes: Vec<OutlineNode>,
}

impl Station {
    pub fn open(storage_dir: impl AsRef<Path>, station_id: StationId) -> Result<Self, StationError> {
        let store = HomologationStore::open(storage_dir, station_id).map_err(StationError::Store)?;
        let journal = StationJournal::new(store.storage_dir(), store.station().as_str());
        Ok(Self {
            store,
            query: RosterQuery::default(),
            active: None,
            journal,
        })
    }

    pub fn store(&self) -> &HomologationStore {
        &self.store
    }

    /// Direct store access for roster import and checklist definition.
    pub fn store_mut(&mut self) -> &mut HomologationStore {
        &mut self.store
    }

    pub fn editing(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_team(&self) -> Option<(TeamId, ZoneId)> {
        self.active
            .as_ref()
            .map(|active| (active.session.team_id(), active.session.zone_id()))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(DEFAULT_REFRESH_INTERVAL_MS)
    }

    pub fn roster_query(&self) -> &RosterQuery {
        &self.query
    }

    /// Filter/sort/category changes are refused while a checklist is open,
    /// so the roster under the edit page cannot shift.
    pub fn set_filter(&mut self, filter: RosterFilter) -> bool {
        if self.active.is_some() {
            return false;
        }
        self.query.filter = filter;
        true
    }

    pub fn set_sort(&mut self, sort: RosterSort) -> bool {
        if self.active.is_some() {
            return false;
        }
        self.query.sort = sort;
        true
    }

    pub fn set_categories(&mut self, categories: Option<BTreeSet<i64>>) -> bool {
        if self.active.is_some() {
            return false;
        }
        self.query.categories = categories;
        true
    }

    /// Pull the current roster. Lock-free; called on a fixed interval and
    /// allowed to be one interval stale.
    pub fn refresh_roster(&self) -> Result<RosterView, StationError> {
        let rows = self.store.list_roster(&self.query)?;
        let summary = self.store.roster_summary()?;
        Ok(RosterView::build(rows, summary)?)
    }

    /// The team behind a displayed row, for confirmation dialogs.
    pub fn team_at(&self, position: RowPosition) -> Result<TeamInfo, StationError> {
        let team_id = self.store.resolve_row(position, &self.query)?;
        Ok(self.store.team_info(team_id)?)
    }

    /// Open a team's checklist for one zone, taking the exclusive edit
    /// lock. Every recoverable refusal is an [`OpenOutcome`]; hard
    /// failures are errors.
    pub fn open_checklist(
        &mut self,
        position: RowPosition,
        zone_id: ZoneId,
    ) -> Result<OpenOutcome, StationError> {
        if self.active.is_some() {
            return Ok(OpenOutcome::EditInProgress);
        }

        let team_id = match self.store.resolve_row(position, &self.query) {
            Ok(team_id) => team_id,
            Err(StoreError::StaleRow { .. }) => return Ok(OpenOutcome::StaleRow),
            Err(err) => return Err(self.fail(StationError::Store(err))),
        };
        let info = match self.store.team_info(team_id) {
            Ok(info) => info,
            Err(err) => return Err(self.fail(StationError::Store(err))),
        };

        let request = SessionOpenRequest {
            team_id,
            zone_id,
            lease_ttl_ms: 0,
        };
        let session = match self.store.session_open(request) {
            Ok(session) => session,
            Err(StoreError::NotRegistered { .. }) => return Ok(OpenOutcome::NotRegistered),
            Err(err @ StoreError::TeamLocked { .. }) => {
                return Ok(OpenOutcome::Locked(conflict_message(&err)));
            }
            Err(err) => return Err(self.fail(StationError::Store(err))),
        };

        let nodes = match linearize(session.items()) {
            Ok(nodes) => nodes,
            Err(err) => {
                // The snapshot cannot be rendered; give the lock back.
                let mut session = session;
                let _ = self.store.session_cancel(&mut session);
                return Err(self.fail(StationError::Outline(err)));
            }
        };

        let page = ChecklistPage::build(&info, zone_id, &nodes, session.comment());
        self.journal.note_operation(&format!(
            "open_checklist team={} zone={}",
            team_id.get(),
            zone_id.get()
        ));
        self.active = Some(ActiveChecklist { session, nodes });
        Ok(OpenOutcome::Opened(page))
    }

    /// Flip one point of the open checklist and report which rows the
    /// renderer must revisit.
    pub fn toggle(&mut self, point_id: PointId) -> Result<ToggleUpdate, StationError> {
        let Some(active) = self.active.as_mut() else {
            return Err(StationError::NoActiveChecklist);
        };

        let new_value = match self.store.session_toggle_point(&mut active.session, point_id) {
            Ok(value) => value,
            Err(err) => {
                let err = StationError::Store(err);
                self.journal.note_error(&err.to_string());
                return Err(err);
            }
        };

        let Some(node) = active
            .nodes
            .iter()
            .find(|node| node.item.point_id == point_id)
        else {
            return Err(StationError::Store(StoreError::UnknownPoint {
                team_id: active.session.team_id(),
                point_id,
            }));
        };

        let affected_display_orders = if node.item.is_section {
            node.descendant_display_orders.clone()
        } else {
            Vec::new()
        };
        Ok(ToggleUpdate {
            point_id: point_id.get(),
            display_order: node.display_order,
            new_value,
            affected_display_orders,
        })
    }

    /// Stage the comment text of the open checklist.
    pub fn set_comment(&mut self, text: &str) -> Result<(), StationError> {
        let Some(active) = self.active.as_mut() else {
            return Err(StationError::NoActiveChecklist);
        };
        active.session.set_comment(text).map_err(StationError::Store)
    }

    /// Commit the open checklist and release the team.
    pub fn save(&mut self) -> Result<ClosedChecklist, StationError> {
        self.close_active(true)
    }

    /// Discard every change of the open checklist and release the team.
    pub fn discard(&mut self) -> Result<ClosedChecklist, StationError> {
        self.close_active(false)
    }

    fn close_active(&mut self, save: bool) -> Result<ClosedChecklist, StationError> {
        let Some(mut active) = self.active.take() else {
            return Err(StationError::NoActiveChecklist);
        };

        let result = if save {
            self.store.session_commit(&mut active.session)
        } else {
            self.store.session_cancel(&mut active.session)
        };

        match result {
            Ok(()) => {
                let closed = ClosedChecklist {
                    team_id: active.session.team_id().get(),
                    zone_id: active.session.zone_id().get(),
                    saved: save,
                };
                self.journal.note_operation(&format!(
                    "{} team={}",
                    if save { "save" } else { "discard" },
                    closed.team_id
                ));
                Ok(closed)
            }
            Err(err @ (StoreError::Sql(_) | StoreError::Io(_))) => {
                // Transient; keep the session so the judge can retry.
                self.active = Some(active);
                Err(self.fail(StationError::Store(err)))
            }
            Err(err) => {
                // Fatal to the edit: abort it and give the lock back so
                // the team is not pinned until the lease expires.
                let _ = self.store.session_cancel(&mut active.session);
                Err(self.fail(StationError::Store(err)))
            }
        }
    }

    /// Flip a team's registration gate from its displayed row. Always a
    /// short operation; never queues behind an edit session.
    pub fn toggle_registration(
        &mut self,
        position: RowPosition,
    ) -> Result<RegistrationOutcome, StationError> {
        if self.active.is_some() {
            return Ok(RegistrationOutcome::EditInProgress);
        }

        let team_id = match self.store.resolve_row(position, &self.query) {
            Ok(team_id) => team_id,
            Err(StoreError::StaleRow { .. }) => return Ok(RegistrationOutcome::StaleRow),
            Err(err) => return Err(self.fail(StationError::Store(err))),
        };

        match self.store.toggle_registration(team_id) {
            Ok(registered) => {
                self.journal.note_operation(&format!(
                    "toggle_registration team={} registered={registered}",
                    team_id.get()
                ));
                Ok(RegistrationOutcome::Updated {
                    team_id: team_id.get(),
                    registered,
                })
            }
            Err(err @ StoreError::TeamLocked { .. }) => {
                Ok(RegistrationOutcome::Locked(conflict_message(&err)))
            }
            Err(err) => Err(self.fail(StationError::Store(err))),
        }
    }

    fn fail(&mut self, err: StationError) -> StationError {
        self.journal.note_error(&err.to_string());
        err
    }
}
