#![forbid(unsafe_code)]

use hm_core::ids::{PointId, RowPosition, TeamId};

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    InvalidInput(&'static str),
    UnknownTeam {
        team_id: TeamId,
    },
    UnknownPoint {
        team_id: TeamId,
        point_id: PointId,
    },
    /// The registration gate is off; checklists cannot be edited yet.
    NotRegistered {
        team_id: TeamId,
    },
    /// Another session holds the team's lock. Expected and recoverable:
    /// retry once the holder finishes.
    TeamLocked {
        team_id: TeamId,
        holder_station: String,
        expires_at_ms: i64,
    },
    /// A session operation found its lock gone (expired, or held by
    /// someone else after a takeover).
    LeaseNotHeld {
        team_id: TeamId,
        holder_station: Option<String>,
    },
    /// The row position no longer resolves under the current filter/sort.
    StaleRow {
        position: RowPosition,
        rows: usize,
    },
    /// A row-count invariant failed; the team's checklist data is corrupt
    /// and only re-registration re-derives it.
    Integrity {
        team_id: TeamId,
        detail: String,
    },
    /// The edit session already committed or cancelled.
    SessionClosed,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::UnknownTeam { team_id } => {
                write!(f, "unknown team (team_id={})", team_id.get())
            }
            Self::UnknownPoint { team_id, point_id } => write!(
                f,
                "unknown checklist point (team_id={}, point_id={})",
                team_id.get(),
                point_id.get()
            ),
            Self::NotRegistered { team_id } => {
                write!(f, "team not registered (team_id={})", team_id.get())
            }
            Self::TeamLocked {
                team_id,
                holder_station,
                expires_at_ms,
            } => write!(
                f,
                "team locked (team_id={}, holder={holder_station}, expires_at_ms={expires_at_ms})",
                team_id.get()
            ),
            Self::LeaseNotHeld {
                team_id,
                holder_station,
            } => match holder_station {
                Some(holder) => write!(
                    f,
                    "team lease not held (team_id={}, holder={holder})",
                    team_id.get()
                ),
                None => write!(
                    f,
                    "team lease not held (team_id={}, no active lease)",
                    team_id.get()
                ),
            },
            Self::StaleRow { position, rows } => write!(
                f,
                "stale roster row (position={}, rows={rows})",
                position.get()
            ),
            Self::Integrity { team_id, detail } => write!(
                f,
                "integrity violation (team_id={}, {detail})",
                team_id.get()
            ),
            Self::SessionClosed => write!(f, "edit session already closed"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}
