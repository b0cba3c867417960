#![forbid(unsafe_code)]

//! Roster rows shaped for a table widget, validated before display.
//! Shape violations (repeated positions, ragged zone columns) are
//! programming or data errors and fail loudly instead of rendering a
//! table that silently points at the wrong team.

use hm_core::roster::{RosterSummary, TeamRosterRow};
use serde::Serialize;

#[derive(Debug)]
pub struct ValidationError {
    pub detail: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "roster view invalid: {}", self.detail)
    }
}

impl std::error::Error for ValidationError {}

#[derive(Clone, Debug, Serialize)]
pub struct RosterRowView {
    pub row_order: i64,
    pub team_id: i64,
    pub number: i64,
    pub name: String,
    pub category: i64,
    pub state: &'static str,
    /// One cell per zone, aligned with [`RosterView::zone_ids`].
    pub zone_values: Vec<Option<i64>>,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct SummaryView {
    pub total: u64,
    pub not_registered: u64,
    pub registered: u64,
    pub homologated: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct RosterView {
    pub zone_ids: Vec<i64>,
    pub rows: Vec<RosterRowView>,
    pub summary: SummaryView,
    pub summary_line: String,
}

impl RosterView {
    pub fn build(
        rows: Vec<TeamRosterRow>,
        summary: RosterSummary,
    ) -> Result<Self, ValidationError> {
        let zone_ids: Vec<i64> = rows
            .first()
            .map(|row| {
                row.per_zone_values
                    .iter()
                    .map(|(zone_id, _)| zone_id.get())
                    .collect()
            })
            .unwrap_or_default();

        let mut out = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            // Dense 1..=n positions; this also rules out repeated rows.
            let expected = index as i64 + 1;
            let order = row.row_order.get();
            if order != expected {
                return Err(ValidationError {
                    detail: format!("row position {order} at index {index}, expected {expected}"),
                });
            }

            let row_zone_ids: Vec<i64> = row
                .per_zone_values
                .iter()
                .map(|(zone_id, _)| zone_id.get())
                .collect();
            if row_zone_ids != zone_ids {
                return Err(ValidationError {
                    detail: format!(
                        "zone column mismatch on row {order}: {row_zone_ids:?} vs {zone_ids:?}"
                    ),
                });
            }

            out.push(RosterRowView {
                row_order: order,
                team_id: row.team_id.get(),
                number: row.number,
                name: row.display_name,
                category: row.category,
                state: row.approval_state.as_str(),
                zone_values: row.per_zone_values.iter().map(|(_, value)| *value).collect(),
            });
        }

        Ok(Self {
            zone_ids,
            rows: out,
            summary: SummaryView {
                total: summary.total,
                not_registered: summary.not_registered,
                registered: summary.registered,
                homologated: summary.homologated,
            },
            summary_line: summary.status_line(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hm_core::ids::{RowPosition, TeamId, ZoneId};
    use hm_core::roster::ApprovalState;

    fn row(team_id: i64, order: i64, zones: &[i64]) -> TeamRosterRow {
        TeamRosterRow {
            team_id: TeamId::new(team_id),
            number: team_id * 10,
            display_name: format!("team {team_id}"),
            category: 1,
            approval_state: ApprovalState::Registered,
            per_zone_values: zones.iter().map(|&z| (ZoneId::new(z), Some(1))).collect(),
            row_order: RowPosition::new(order),
        }
    }

    #[test]
    fn build_accepts_dense_unique_rows() {
        let view = RosterView::build(
            vec![row(1, 1, &[1, 2]), row(2, 2, &[1, 2])],
            RosterSummary::default(),
        )
        .expect("valid view");
        assert_eq!(view.zone_ids, vec![1, 2]);
        assert_eq!(view.rows.len(), 2);
        assert_eq!(view.rows[1].team_id, 2);
    }

    #[test]
    fn build_rejects_non_dense_positions() {
        let err = RosterView::build(
            vec![row(1, 1, &[1]), row(2, 3, &[1])],
            RosterSummary::default(),
        )
        .unwrap_err();
        assert!(err.detail.contains("expected 2"));
    }

    #[test]
    fn build_rejects_ragged_zone_columns() {
        let err = RosterView::build(
            vec![row(1, 1, &[1, 2]), row(2, 2, &[1])],
            RosterSummary::default(),
        )
        .unwrap_err();
        assert!(err.detail.contains("zone column mismatch"));
    }
}
