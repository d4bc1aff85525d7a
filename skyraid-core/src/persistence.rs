//! Territory persistence.
//!
//! [`TerritoryStore`] is the seam the host talks to. [`SqliteStore`] is the
//! bundled implementation:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS territories (
//!     territory_id TEXT PRIMARY KEY,
//!     data         BLOB NOT NULL,
//!     updated_at   TEXT NOT NULL,
//!     checksum     TEXT
//! );
//! CREATE TABLE IF NOT EXISTS memberships (
//!     actor_id     TEXT PRIMARY KEY,
//!     territory_id TEXT NOT NULL
//!         REFERENCES territories(territory_id) ON DELETE CASCADE
//! );
//! CREATE TABLE IF NOT EXISTS meta (
//!     key   TEXT PRIMARY KEY,
//!     value TEXT NOT NULL
//! );
//! ```
//!
//! Each territory is a JSON document so new fields only need a serde
//! default. The membership table is a denormalised index, rebuilt on every
//! save, and cross-checked on load.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PersistenceConfig;
use crate::error::{Result, SkyraidError};
use crate::territory::Territory;
use crate::types::{ActorId, TerritoryId};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS territories (
        territory_id TEXT PRIMARY KEY,
        data         BLOB NOT NULL,
        updated_at   TEXT NOT NULL,
        checksum     TEXT
    );
    CREATE TABLE IF NOT EXISTS memberships (
        actor_id     TEXT PRIMARY KEY,
        territory_id TEXT NOT NULL
            REFERENCES territories(territory_id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS memberships_by_territory ON memberships(territory_id);
    CREATE TABLE IF NOT EXISTS meta (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

const PLACEMENT_COUNTER_KEY: &str = "placement_counter";

// ---------------------------------------------------------------------------
// Store seam
// ---------------------------------------------------------------------------

/// Durable storage for territories.
pub trait TerritoryStore: Send {
    /// Every stored territory. Unreadable rows are skipped with a warning.
    ///
    /// # Errors
    /// Storage failures.
    fn load_all_territories(&self) -> Result<Vec<Territory>>;

    /// Every stored actor → territory row.
    ///
    /// # Errors
    /// Storage failures.
    fn load_all_memberships(&self) -> Result<Vec<(ActorId, TerritoryId)>>;

    /// Upsert a territory and replace its membership rows.
    ///
    /// # Errors
    /// Serialization or storage failures.
    fn save(&self, territory: &Territory) -> Result<()>;

    /// Remove a territory and its membership rows. Returns whether a row existed.
    ///
    /// # Errors
    /// Storage failures.
    fn delete(&self, id: TerritoryId) -> Result<bool>;

    /// Last persisted allocator counter.
    ///
    /// # Errors
    /// Storage failures or an unparsable value.
    fn load_placement_counter(&self) -> Result<Option<u64>>;

    /// Persist the allocator counter.
    ///
    /// # Errors
    /// Storage failures.
    fn save_placement_counter(&self, counter: u64) -> Result<()>;

    /// Periodic upkeep such as integrity checks and backups. Stores with
    /// nothing to do keep the default.
    ///
    /// # Errors
    /// Storage failures.
    fn checkpoint(&self) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CRC-32
// ---------------------------------------------------------------------------

/// CRC-32 (ISO 3309) of `data` as lowercase hex.
fn crc32_hex(data: &[u8]) -> String {
    format!("{:08x}", crc32(data))
}

fn crc32(data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ POLY } else { crc >> 1 };
        }
    }
    !crc
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// SQLite-backed [`TerritoryStore`].
pub struct SqliteStore {
    conn: Connection,
    config: PersistenceConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) a database at `path`.
    ///
    /// # Errors
    /// `Database` on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        Self::prepare(&conn)?;

        info!(path = %db_path.display(), wal = config.wal_mode, "Territory store opened");
        Ok(Self {
            conn,
            config: config.clone(),
            db_path,
        })
    }

    /// In-memory database, for tests and throwaway worlds.
    ///
    /// # Errors
    /// `Database` on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::prepare(&conn)?;
        Ok(Self {
            conn,
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    fn prepare(conn: &Connection) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn verify_checksum(&self, id: &str, data: &[u8], checksum: Option<&str>) {
        if !self.config.checksum_enabled {
            return;
        }
        if let Some(expected) = checksum {
            let actual = crc32_hex(data);
            if expected != actual {
                warn!(
                    territory = %id,
                    expected = %expected,
                    actual = %actual,
                    "Checksum mismatch, possible save corruption"
                );
            }
        }
    }

    /// Load one territory by id.
    ///
    /// # Errors
    /// `Serialization` on bad JSON, `Database` on SQLite failures.
    pub fn load(&self, id: TerritoryId) -> Result<Option<Territory>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT data, checksum FROM territories WHERE territory_id = ?1")?;
        let row: Option<(Vec<u8>, Option<String>)> = stmt
            .query_row(params![id.0.to_string()], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;
        let Some((data, checksum)) = row else {
            return Ok(None);
        };
        self.verify_checksum(&id.to_string(), &data, checksum.as_deref());
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| SkyraidError::Serialization(e.to_string()))
    }

    /// Number of stored territories.
    ///
    /// # Errors
    /// `Database` on SQLite failures.
    pub fn territory_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM territories", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // Backup
    // ------------------------------------------------------------------

    /// Copy the database to `dest_path` with SQLite's online-backup API.
    ///
    /// # Errors
    /// `Database` or `Io` on failure.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&self.conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;
        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Territory store backup completed"
        );
        Ok(())
    }

    /// Write `<db>.bak.1`, shifting older backups up and keeping at most
    /// `backup_count`. No-op for in-memory stores.
    ///
    /// # Errors
    /// `Database` or `Io` on failure.
    pub fn create_rotating_backup(&self) -> Result<()> {
        let max = self.config.backup_count;
        if self.db_path.as_os_str() == ":memory:" || max == 0 {
            return Ok(());
        }
        for i in (1..max).rev() {
            let src = self.backup_path(i);
            if src.exists() {
                std::fs::rename(&src, self.backup_path(i + 1))?;
            }
        }
        let overflow = self.backup_path(max + 1);
        if overflow.exists() {
            std::fs::remove_file(&overflow)?;
        }
        self.backup(self.backup_path(1))?;
        debug!(max_backups = max, "Rotating backup created");
        Ok(())
    }

    fn backup_path(&self, n: u32) -> PathBuf {
        let mut p = self.db_path.clone();
        let ext = format!(
            "{}.bak.{n}",
            p.extension()
                .map_or(String::new(), |e| e.to_string_lossy().into_owned())
        );
        p.set_extension(ext);
        p
    }

    /// Database location, `:memory:` for in-memory stores.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// `PRAGMA integrity_check`.
    ///
    /// # Errors
    /// `Database` if the check itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }

}

impl TerritoryStore for SqliteStore {
    fn load_all_territories(&self) -> Result<Vec<Territory>> {
        let start = Instant::now();
        let mut stmt = self
            .conn
            .prepare_cached("SELECT territory_id, data, checksum FROM territories")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut territories = Vec::new();
        for row in rows {
            let (id, data, checksum) = row?;
            self.verify_checksum(&id, &data, checksum.as_deref());
            match serde_json::from_slice::<Territory>(&data) {
                Ok(t) => territories.push(t),
                Err(e) => warn!(territory = %id, error = %e, "Skipping unreadable territory row"),
            }
        }
        debug!(
            count = territories.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Loaded territories"
        );
        Ok(territories)
    }

    fn load_all_memberships(&self) -> Result<Vec<(ActorId, TerritoryId)>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT actor_id, territory_id FROM memberships")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut memberships = Vec::new();
        for row in rows {
            let (actor, territory) = row?;
            match (Uuid::parse_str(&actor), Uuid::parse_str(&territory)) {
                (Ok(a), Ok(t)) => memberships.push((ActorId(a), TerritoryId(t))),
                _ => warn!(actor = %actor, territory = %territory, "Skipping row with invalid UUID"),
            }
        }
        Ok(memberships)
    }

    fn save(&self, territory: &Territory) -> Result<()> {
        let start = Instant::now();
        let json =
            serde_json::to_vec(territory).map_err(|e| SkyraidError::Serialization(e.to_string()))?;
        let checksum = self.config.checksum_enabled.then(|| crc32_hex(&json));
        let id = territory.id.0.to_string();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO territories (territory_id, data, updated_at, checksum)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(territory_id) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at,
                checksum = excluded.checksum",
            params![id, json, Utc::now().to_rfc3339(), checksum],
        )?;
        tx.execute("DELETE FROM memberships WHERE territory_id = ?1", params![id])?;
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO memberships (actor_id, territory_id) VALUES (?1, ?2)
                 ON CONFLICT(actor_id) DO UPDATE SET territory_id = excluded.territory_id",
            )?;
            for actor in &territory.members {
                insert.execute(params![actor.0.to_string(), id])?;
            }
        }
        tx.commit()?;

        debug!(
            territory = %territory.id,
            members = territory.members.len(),
            bytes = json.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Saved territory"
        );
        Ok(())
    }

    fn delete(&self, id: TerritoryId) -> Result<bool> {
        let id_str = id.0.to_string();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM memberships WHERE territory_id = ?1", params![id_str])?;
        let deleted = tx.execute(
            "DELETE FROM territories WHERE territory_id = ?1",
            params![id_str],
        )?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    fn load_placement_counter(&self) -> Result<Option<u64>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![PLACEMENT_COUNTER_KEY],
                |row| row.get(0),
            )
            .optional()?;
        value
            .map(|v| {
                v.parse::<u64>()
                    .map_err(|e| SkyraidError::Serialization(format!("placement counter {v:?}: {e}")))
            })
            .transpose()
    }

    fn save_placement_counter(&self, counter: u64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![PLACEMENT_COUNTER_KEY, counter.to_string()],
        )?;
        Ok(())
    }

    /// Integrity check, then a rotating backup. A failed check is logged and
    /// skips the backup so a damaged file never rotates out a good copy.
    fn checkpoint(&self) -> Result<()> {
        if !self.integrity_check()? {
            warn!(path = %self.db_path().display(), "Integrity check failed, backup skipped");
            return Ok(());
        }
        self.create_rotating_backup()
    }
}
