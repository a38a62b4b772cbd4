//! Session Store.
//!
//! Persists finished sessions (their settings and full move ledger) to a
//! local SQLite database so they can be listed and replayed later.
//!
//! # Storage layout
//!
//! | table      | columns                                                              |
//! |------------|----------------------------------------------------------------------|
//! | `sessions` | `id` TEXT PK, `started_at` TEXT (RFC-3339), `grid_size` INTEGER, `limb_set` TEXT |
//! | `moves`    | `session_id` TEXT, `seq` INTEGER, `limb` TEXT, `row` INTEGER, `col` INTEGER, `created_at_ms` INTEGER, `duration_ms` INTEGER |
//!
//! Moves are keyed by `(session_id, seq)` and always read back in `seq`
//! order, which is the ledger's insertion order.
//!
//! # Example
//!
//! ```rust
//! use wallgrid_memory::store::{SessionRecord, SessionStore};
//! use wallgrid_types::{GridSize, LimbSet};
//!
//! let store = SessionStore::open_in_memory().unwrap();
//! let record = SessionRecord::new(GridSize::new(12).unwrap(), LimbSet::Hands, Vec::new());
//! store.save(&record).unwrap();
//!
//! let loaded = store.load(record.id).unwrap().unwrap();
//! assert_eq!(loaded.grid_size.get(), 12);
//! ```

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;
use wallgrid_types::{Cell, GridSize, Limb, LimbSet, Move};

use crate::ledger::{LedgerError, MoveLedger};

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from session persistence.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Stored ledger is inconsistent: {0}")]
    Ledger(#[from] LedgerError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// A complete session: its settings and every move in ledger order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub grid_size: GridSize,
    pub limb_set: LimbSet,
    pub moves: Vec<Move>,
}

impl SessionRecord {
    /// New record with a fresh id, started now.
    pub fn new(grid_size: GridSize, limb_set: LimbSet, moves: Vec<Move>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            grid_size,
            limb_set,
            moves,
        }
    }

    /// Rebuild the ledger for replay or continued recording.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the moves break the ledger invariants, or
    /// name a limb or cell the record's settings cannot hold.
    pub fn ledger(&self) -> Result<MoveLedger, LedgerError> {
        for m in &self.moves {
            if !self.limb_set.contains(m.limb) {
                return Err(LedgerError::LimbNotTracked {
                    limb: m.limb,
                    limb_set: self.limb_set,
                });
            }
            if !self.grid_size.contains(m.cell) {
                return Err(LedgerError::CellOutsideGrid {
                    limb: m.limb,
                    cell: m.cell,
                    grid: self.grid_size.get(),
                });
            }
        }
        MoveLedger::from_moves(self.moves.clone())
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a record and check its ledger invariants.
    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        let record: Self = serde_json::from_str(raw)?;
        record.ledger()?;
        Ok(record)
    }
}

/// One row of [`SessionStore::list`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub grid_size: GridSize,
    pub limb_set: LimbSet,
    pub move_count: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Column conversion helpers
// ─────────────────────────────────────────────────────────────────────────────

fn invalid_column(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(index, message, rusqlite::types::Type::Text)
}

fn parse_uuid(index: usize, raw: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| invalid_column(index, e.to_string()))
}

fn parse_timestamp(index: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .map_err(|e| invalid_column(index, e.to_string()))
}

fn parse_grid_size(index: usize, raw: u32) -> rusqlite::Result<GridSize> {
    GridSize::new(raw).map_err(|e| invalid_column(index, e.to_string()))
}

fn u64_to_sql(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn u64_from_sql(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionStore
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed store of [`SessionRecord`]s.
pub struct SessionStore {
    conn: Connection,
}

impl SessionStore {
    /// Open (or create) a persistent SQLite database at `path`.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open a temporary in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id         TEXT    NOT NULL PRIMARY KEY,
                started_at TEXT    NOT NULL,
                grid_size  INTEGER NOT NULL,
                limb_set   TEXT    NOT NULL
            );
            CREATE TABLE IF NOT EXISTS moves (
                session_id    TEXT    NOT NULL,
                seq           INTEGER NOT NULL,
                limb          TEXT    NOT NULL,
                row           INTEGER NOT NULL,
                col           INTEGER NOT NULL,
                created_at_ms INTEGER NOT NULL,
                duration_ms   INTEGER NOT NULL,
                PRIMARY KEY (session_id, seq)
            );",
        )?;
        Ok(())
    }

    /// Persist `record`, replacing any earlier save of the same session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Ledger`] without writing anything when the
    /// record's moves are inconsistent with its settings.
    pub fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        record.ledger()?;
        let tx = self.conn.unchecked_transaction()?;
        let id = record.id.to_string();
        tx.execute(
            "INSERT OR REPLACE INTO sessions (id, started_at, grid_size, limb_set)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                id,
                record.started_at.to_rfc3339(),
                record.grid_size.get(),
                record.limb_set.to_string(),
            ],
        )?;
        tx.execute("DELETE FROM moves WHERE session_id = ?1", params![id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO moves
                     (session_id, seq, limb, row, col, created_at_ms, duration_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for m in &record.moves {
                stmt.execute(params![
                    id,
                    u64_to_sql(m.seq),
                    m.limb.as_str(),
                    m.cell.row,
                    m.cell.col,
                    u64_to_sql(m.created_at_ms),
                    u64_to_sql(m.duration_ms),
                ])?;
            }
        }
        tx.commit()?;
        info!(session = %record.id, moves = record.moves.len(), "session saved");
        Ok(())
    }

    /// Load one session, or `None` if it was never saved.
    pub fn load(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError> {
        let id_str = id.to_string();
        let header = self
            .conn
            .query_row(
                "SELECT started_at, grid_size, limb_set FROM sessions WHERE id = ?1",
                params![id_str],
                |row| {
                    let started_at: String = row.get(0)?;
                    let grid_size: u32 = row.get(1)?;
                    let limb_set: String = row.get(2)?;
                    Ok((started_at, grid_size, limb_set))
                },
            )
            .optional()?;

        let Some((started_at, grid_size, limb_set)) = header else {
            return Ok(None);
        };

        let record = SessionRecord {
            id,
            started_at: parse_timestamp(0, &started_at)?,
            grid_size: parse_grid_size(1, grid_size)?,
            limb_set: limb_set
                .parse::<LimbSet>()
                .map_err(|e| invalid_column(2, e.to_string()))?,
            moves: self.load_moves(&id_str)?,
        };
        record.ledger()?;
        Ok(Some(record))
    }

    fn load_moves(&self, session_id: &str) -> Result<Vec<Move>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, limb, row, col, created_at_ms, duration_ms
             FROM moves
             WHERE session_id = ?1
             ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            let seq: i64 = row.get(0)?;
            let limb: String = row.get(1)?;
            let r: u32 = row.get(2)?;
            let c: u32 = row.get(3)?;
            let created: i64 = row.get(4)?;
            let duration: i64 = row.get(5)?;
            Ok((seq, limb, r, c, created, duration))
        })?;

        let mut moves = Vec::new();
        for row in rows {
            let (seq, limb, r, c, created, duration) = row?;
            let limb = limb
                .parse::<Limb>()
                .map_err(|e| invalid_column(1, e.to_string()))?;
            moves.push(Move {
                seq: u64_from_sql(seq),
                limb,
                cell: Cell::new(r, c),
                created_at_ms: u64_from_sql(created),
                duration_ms: u64_from_sql(duration),
            });
        }
        Ok(moves)
    }

    /// Summaries of all saved sessions, oldest first.
    pub fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.started_at, s.grid_size, s.limb_set,
                    (SELECT COUNT(*) FROM moves m WHERE m.session_id = s.id)
             FROM sessions s
             ORDER BY s.started_at ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let started_at: String = row.get(1)?;
            let grid_size: u32 = row.get(2)?;
            let limb_set: String = row.get(3)?;
            let count: i64 = row.get(4)?;
            Ok(SessionSummary {
                id: parse_uuid(0, &id)?,
                started_at: parse_timestamp(1, &started_at)?,
                grid_size: parse_grid_size(2, grid_size)?,
                limb_set: limb_set
                    .parse::<LimbSet>()
                    .map_err(|e| invalid_column(3, e.to_string()))?,
                move_count: usize::try_from(count).unwrap_or(0),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Remove a session and its moves.  Returns whether it existed.
    pub fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let id = id.to_string();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM moves WHERE session_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(removed > 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> SessionRecord {
        let mut ledger = MoveLedger::new();
        ledger.record_or_update(Limb::LeftHand, Cell::new(2, 3), 1000, 1_000);
        ledger.record_or_update(Limb::RightFoot, Cell::new(9, 0), 1400, 2_500);
        ledger.record_or_update(Limb::LeftHand, Cell::new(1, 3), 1000, 4_000);
        SessionRecord::new(
            GridSize::new(10).unwrap(),
            LimbSet::HandsAndFeet,
            ledger.moves().to_vec(),
        )
    }

    #[test]
    fn save_and_load_round_trip_preserves_order() {
        let store = SessionStore::open_in_memory().unwrap();
        let record = sample_record();
        store.save(&record).unwrap();

        let loaded = store.load(record.id).unwrap().unwrap();
        assert_eq!(loaded.moves, record.moves);
        assert_eq!(loaded.limb_set, LimbSet::HandsAndFeet);
        assert_eq!(loaded.grid_size, record.grid_size);
        // RFC-3339 keeps sub-second precision.
        assert_eq!(loaded.started_at, record.started_at);
    }

    #[test]
    fn load_unknown_session_returns_none() {
        let store = SessionStore::open_in_memory().unwrap();
        assert!(store.load(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn resave_replaces_moves() {
        let store = SessionStore::open_in_memory().unwrap();
        let mut record = sample_record();
        store.save(&record).unwrap();

        record.moves.truncate(1);
        record.moves[0].duration_ms = 5_000;
        store.save(&record).unwrap();

        let loaded = store.load(record.id).unwrap().unwrap();
        assert_eq!(loaded.moves.len(), 1);
        assert_eq!(loaded.moves[0].duration_ms, 5_000);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn list_orders_by_start_time_and_counts_moves() {
        let store = SessionStore::open_in_memory().unwrap();
        let mut late = sample_record();
        late.started_at = Utc.with_ymd_and_hms(2025, 3, 2, 10, 0, 0).unwrap();
        let mut early = SessionRecord::new(GridSize::new(4).unwrap(), LimbSet::Hands, vec![]);
        early.started_at = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        store.save(&late).unwrap();
        store.save(&early).unwrap();

        let list = store.list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, early.id);
        assert_eq!(list[0].move_count, 0);
        assert_eq!(list[1].move_count, 3);
    }

    #[test]
    fn delete_removes_session() {
        let store = SessionStore::open_in_memory().unwrap();
        let record = sample_record();
        store.save(&record).unwrap();
        assert!(store.delete(record.id).unwrap());
        assert!(!store.delete(record.id).unwrap());
        assert!(store.load(record.id).unwrap().is_none());
    }

    #[test]
    fn persistent_file_survives_reopen() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("sessions.db");
        let path = path.to_string_lossy().to_string();
        let record = sample_record();
        {
            let store = SessionStore::open(&path).unwrap();
            store.save(&record).unwrap();
        }
        let store = SessionStore::open(&path).unwrap();
        assert_eq!(store.load(record.id).unwrap().unwrap(), record);
    }

    #[test]
    fn ledger_rejects_moves_outside_record_settings() {
        let mut outside = sample_record();
        outside.grid_size = GridSize::new(5).unwrap();
        assert_eq!(
            outside.ledger().unwrap_err(),
            LedgerError::CellOutsideGrid {
                limb: Limb::RightFoot,
                cell: Cell::new(9, 0),
                grid: 5
            }
        );

        let mut hands_only = sample_record();
        hands_only.limb_set = LimbSet::Hands;
        assert_eq!(
            hands_only.ledger().unwrap_err(),
            LedgerError::LimbNotTracked {
                limb: Limb::RightFoot,
                limb_set: LimbSet::Hands
            }
        );

        let store = SessionStore::open_in_memory().unwrap();
        assert!(matches!(store.save(&hands_only), Err(StoreError::Ledger(_))));
    }

    #[test]
    fn json_round_trip_and_validation() {
        let record = sample_record();
        let json = record.to_json().unwrap();
        assert_eq!(SessionRecord::from_json(&json).unwrap(), record);

        let mut broken = record.clone();
        broken.moves.push(broken.moves[0]);
        let json = serde_json::to_string(&broken).unwrap();
        assert!(matches!(
            SessionRecord::from_json(&json),
            Err(StoreError::Ledger(_))
        ));
    }
}
