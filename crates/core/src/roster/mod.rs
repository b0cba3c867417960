#![forbid(unsafe_code)]

//! Team roster shapes: approval states, the state filter, sort criteria
//! and the caller-owned query configuration.
//!
//! The filter works as two independent membership tests on the
//! `registered` and `homologated` flags, which is how the backing view is
//! queried; [`RosterFilter::matches`] is the same predicate in memory.

use crate::ids::{RowPosition, TeamId, ZoneId};
use std::collections::BTreeSet;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalState {
    NotRegistered,
    Registered,
    Homologated,
}

impl ApprovalState {
    pub fn from_flags(registered: bool, homologated: bool) -> Self {
        match (registered, homologated) {
            (false, _) => Self::NotRegistered,
            (true, false) => Self::Registered,
            (true, true) => Self::Homologated,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotRegistered => "not_registered",
            Self::Registered => "registered",
            Self::Homologated => "homologated",
        }
    }
}

/// The roster tab selection: which approval states are listed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RosterFilter {
    All,
    NotRegistered,
    Registered,
    Homologated,
}

impl RosterFilter {
    /// Accepted values of the `registered` flag.
    pub fn registered_values(self) -> &'static [i64] {
        match self {
            Self::All => &[0, 1],
            Self::NotRegistered => &[0],
            Self::Registered | Self::Homologated => &[1],
        }
    }

    /// Accepted values of the `homologated` flag.
    pub fn homologated_values(self) -> &'static [i64] {
        match self {
            Self::All | Self::NotRegistered => &[0, 1],
            Self::Registered => &[0],
            Self::Homologated => &[1],
        }
    }

    pub fn matches(self, registered: bool, homologated: bool) -> bool {
        self.registered_values().contains(&i64::from(registered))
            && self.homologated_values().contains(&i64::from(homologated))
    }
}

/// Roster ordering criterion. Whatever the criterion, row positions are
/// recomputed on every listing and never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RosterSort {
    TeamNumber,
    Name,
    Category,
}

impl RosterSort {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TeamNumber => "team_number",
            Self::Name => "name",
            Self::Category => "category",
        }
    }
}

/// The active roster configuration, owned by the caller and passed
/// explicitly into every listing call. `categories: None` means all
/// competition categories are shown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterQuery {
    pub filter: RosterFilter,
    pub sort: RosterSort,
    pub categories: Option<BTreeSet<i64>>,
}

impl Default for RosterQuery {
    fn default() -> Self {
        Self {
            filter: RosterFilter::All,
            sort: RosterSort::TeamNumber,
            categories: None,
        }
    }
}

/// One roster line. `row_order` is only valid against the query that
/// produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TeamRosterRow {
    pub team_id: TeamId,
    pub number: i64,
    pub display_name: String,
    pub category: i64,
    pub approval_state: ApprovalState,
    /// Per-zone aggregate: 0 when every point in the zone is cleared,
    /// 1 when something is pending, None when the zone has no reviewable
    /// state (team not registered).
    pub per_zone_values: Vec<(ZoneId, Option<i64>)>,
    pub row_order: RowPosition,
}

/// Counts for the status bar, refreshed together with the roster.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RosterSummary {
    pub total: u64,
    pub not_registered: u64,
    pub registered: u64,
    pub homologated: u64,
}

impl RosterSummary {
    pub fn status_line(&self) -> String {
        format!(
            "Total: {} - Unregistered: {} - Registered: {} - Homologated: {}",
            self.total, self.not_registered, self.registered, self.homologated
        )
    }
}
