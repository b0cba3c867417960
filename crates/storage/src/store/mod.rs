#![forbid(unsafe_code)]

mod error;
mod lease;
mod requests;
mod roster;
mod session;

pub use error::StoreError;
pub use lease::{DEFAULT_LEASE_TTL_MS, MAX_LEASE_TTL_MS, TeamLease};
pub use requests::*;
pub use session::{EditSession, SessionState};

use hm_core::checklist::ChecklistItem;
use hm_core::ids::{PointId, StationId, TeamId, ZoneId};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DB_FILE: &str = "homologation.db";

/// Driver-level safety net against a writer stalling mid-commit. Conflict
/// detection itself never relies on this: lease claims fail immediately.
const LOCK_SAFETY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed homologation store. Several station processes open the
/// same database file; all cross-station coordination happens through it.
#[derive(Debug)]
pub struct HomologationStore {
    conn: Connection,
    station: StationId,
    storage_dir: PathBuf,
}

impl HomologationStore {
    pub fn open(storage_dir: impl AsRef<Path>, station: StationId) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let conn = Connection::open(storage_dir.join(DB_FILE))?;
        conn.busy_timeout(LOCK_SAFETY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        install_schema(&conn)?;
        seed_team_state(&conn)?;

        Ok(Self {
            conn,
            station,
            storage_dir,
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn station(&self) -> &StationId {
        &self.station
    }

    /// Register a team from the administration roster. State starts
    /// unregistered; a missing state row is also repaired on every
    /// [`HomologationStore::open`].
    pub fn import_team(&mut self, request: ImportTeamRequest) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO teams(team_id, number, name, category) VALUES (?1, ?2, ?3, ?4)",
            params![
                request.team_id,
                request.number,
                request.name,
                request.category
            ],
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO team_state(team_id, registered) VALUES (?1, 0)",
            params![request.team_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn define_zone(&mut self, request: DefineZoneRequest) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO zones(zone_id, name) VALUES (?1, ?2)",
            params![request.zone_id, request.name],
        )?;
        Ok(())
    }

    pub fn define_point(&mut self, request: DefinePointRequest) -> Result<(), StoreError> {
        if request.level < 1 {
            return Err(StoreError::InvalidInput("point level must be >= 1"));
        }
        if request.level == 1 && request.parent_section_id.is_some() {
            return Err(StoreError::InvalidInput("level-1 points take no parent section"));
        }
        if request.level > 1 && request.parent_section_id.is_none() {
            return Err(StoreError::InvalidInput("nested points require a parent section"));
        }

        self.conn.execute(
            "INSERT INTO checklist_template(point_id, zone_id, parent_section_id, level, is_section, sort_key, description) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                request.point_id,
                request.zone_id,
                request.parent_section_id,
                i64::from(request.level),
                request.is_section as i64,
                request.sort_key,
                request.description
            ],
        )?;
        Ok(())
    }

    /// A team's checklist rows for one zone, in linearizer input order.
    pub fn query_items(
        &self,
        team_id: TeamId,
        zone_id: ZoneId,
    ) -> Result<Vec<ChecklistItem>, StoreError> {
        query_items_conn(&self.conn, team_id, zone_id)
    }

    /// The free-text comment for a (team, zone). Exactly one row must
    /// exist once the team is registered.
    pub fn get_comment(&self, team_id: TeamId, zone_id: ZoneId) -> Result<String, StoreError> {
        comment_conn(&self.conn, team_id, zone_id)
    }

    /// Audit trail, oldest first. `team_id: None` lists all teams.
    pub fn list_events(
        &self,
        team_id: Option<TeamId>,
        limit: usize,
    ) -> Result<Vec<EventRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, ts_ms, team_id, event_type, payload_json \
             FROM events \
             WHERE ?1 IS NULL OR team_id = ?1 \
             ORDER BY seq ASC \
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(
            params![team_id.map(TeamId::get), limit as i64],
            |row| {
                Ok(EventRow {
                    seq: row.get(0)?,
                    ts_ms: row.get(1)?,
                    team_id: row.get(2)?,
                    event_type: row.get(3)?,
                    payload_json: row.get(4)?,
                })
            },
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

pub(crate) fn now_ms() -> i64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    now.as_millis() as i64
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;

        CREATE TABLE IF NOT EXISTS teams (
          team_id INTEGER PRIMARY KEY,
          number INTEGER NOT NULL UNIQUE,
          name TEXT NOT NULL,
          category INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS team_state (
          team_id INTEGER PRIMARY KEY REFERENCES teams(team_id),
          registered INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS zones (
          zone_id INTEGER PRIMARY KEY,
          name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS checklist_template (
          point_id INTEGER PRIMARY KEY,
          zone_id INTEGER NOT NULL REFERENCES zones(zone_id),
          parent_section_id INTEGER REFERENCES checklist_template(point_id),
          level INTEGER NOT NULL,
          is_section INTEGER NOT NULL DEFAULT 0,
          sort_key INTEGER NOT NULL,
          description TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_template_zone_order
          ON checklist_template(zone_id, level, sort_key, point_id);

        CREATE TABLE IF NOT EXISTS team_points (
          team_id INTEGER NOT NULL REFERENCES teams(team_id),
          zone_id INTEGER NOT NULL REFERENCES zones(zone_id),
          point_id INTEGER NOT NULL REFERENCES checklist_template(point_id),
          value INTEGER,
          PRIMARY KEY (team_id, zone_id, point_id)
        );

        CREATE TABLE IF NOT EXISTS team_comments (
          team_id INTEGER NOT NULL REFERENCES teams(team_id),
          zone_id INTEGER NOT NULL REFERENCES zones(zone_id),
          comment TEXT NOT NULL DEFAULT '',
          PRIMARY KEY (team_id, zone_id)
        );

        CREATE TABLE IF NOT EXISTS team_leases (
          team_id INTEGER PRIMARY KEY REFERENCES teams(team_id),
          holder_station TEXT NOT NULL,
          acquired_at_ms INTEGER NOT NULL,
          expires_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          ts_ms INTEGER NOT NULL,
          team_id INTEGER,
          event_type TEXT NOT NULL,
          payload_json TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

/// Every imported team gets a state row, even if another station imported
/// it while this one was offline.
fn seed_team_state(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO team_state(team_id, registered) \
         SELECT team_id, 0 FROM teams \
         WHERE NOT EXISTS (SELECT 1 FROM team_state s WHERE s.team_id = teams.team_id)",
        [],
    )?;
    Ok(())
}

pub(crate) fn query_items_conn(
    conn: &Connection,
    team_id: TeamId,
    zone_id: ZoneId,
) -> Result<Vec<ChecklistItem>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT t.point_id, t.parent_section_id, t.level, t.is_section, v.value, t.description \
         FROM checklist_template t \
         JOIN team_points v ON v.point_id = t.point_id AND v.zone_id = t.zone_id \
         WHERE v.team_id = ?1 AND t.zone_id = ?2 \
         ORDER BY t.level ASC, t.sort_key ASC, t.point_id ASC",
    )?;
    let rows = stmt.query_map(params![team_id.get(), zone_id.get()], |row| {
        Ok(ChecklistItem {
            point_id: PointId::new(row.get(0)?),
            parent_section_id: row.get::<_, Option<i64>>(1)?.map(PointId::new),
            level: row.get::<_, i64>(2)? as u32,
            is_section: row.get::<_, i64>(3)? != 0,
            value: row.get(4)?,
            description: row.get(5)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub(crate) fn comment_conn(
    conn: &Connection,
    team_id: TeamId,
    zone_id: ZoneId,
) -> Result<String, StoreError> {
    let mut stmt =
        conn.prepare("SELECT comment FROM team_comments WHERE team_id = ?1 AND zone_id = ?2")?;
    let rows = stmt.query_map(params![team_id.get(), zone_id.get()], |row| {
        row.get::<_, String>(0)
    })?;
    let mut comments = rows.collect::<Result<Vec<_>, _>>()?;
    if comments.len() != 1 {
        return Err(StoreError::Integrity {
            team_id,
            detail: format!(
                "expected one comment row for zone {}, found {}",
                zone_id.get(),
                comments.len()
            ),
        });
    }
    Ok(comments.remove(0))
}

pub(crate) fn team_registered_conn(
    conn: &Connection,
    team_id: TeamId,
) -> Result<bool, StoreError> {
    conn.query_row(
        "SELECT registered FROM team_state WHERE team_id = ?1",
        params![team_id.get()],
        |row| row.get::<_, i64>(0),
    )
    .optional()?
    .map(|value| value != 0)
    .ok_or(StoreError::UnknownTeam { team_id })
}

pub(crate) fn append_event_tx(
    tx: &Transaction<'_>,
    ts_ms: i64,
    team_id: Option<TeamId>,
    event_type: &str,
    payload_json: &str,
) -> Result<i64, StoreError> {
    tx.execute(
        "INSERT INTO events(ts_ms, team_id, event_type, payload_json) VALUES (?1, ?2, ?3, ?4)",
        params![ts_ms, team_id.map(TeamId::get), event_type, payload_json],
    )?;
    Ok(tx.last_insert_rowid())
}
