//! SQLite permanent store

use super::traits::{DownloadRecord, OpenStore, PermanentStore, StoreError, StoreResult};
use crate::merge::{DatasetMerger, MergeReport};
use crate::primitive::{ConsistencyError, Dataset, Primitive, PrimitiveId};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed permanent store
///
/// One table of primitives keyed by `(kind, id)` with the primitive stored as
/// JSON, and one append-only table of download records. Thread-safe via an
/// internal mutex on the connection. A merge runs in a single transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS primitives (
                kind TEXT NOT NULL,
                id INTEGER NOT NULL,
                version INTEGER NOT NULL,
                complete INTEGER NOT NULL,
                modified INTEGER NOT NULL,
                data_json TEXT NOT NULL,
                PRIMARY KEY (kind, id)
            );

            CREATE INDEX IF NOT EXISTS idx_primitives_incomplete
                ON primitives(complete, kind);

            CREATE TABLE IF NOT EXISTS downloads (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                at TEXT NOT NULL,
                missing_json TEXT NOT NULL
            );

            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn row_to_primitive(kind: &str, id: i64, data_json: &str) -> StoreResult<Primitive> {
        let primitive: Primitive = serde_json::from_str(data_json)?;
        let expected = format!("{}/{}", kind, id);
        let actual = format!("{}/{}", primitive.kind(), primitive.id().id());
        if expected != actual || !primitive.is_well_formed() {
            return Err(StoreError::Corrupt(expected));
        }
        Ok(primitive)
    }

    fn load(conn: &Connection, id: &PrimitiveId) -> StoreResult<Option<Primitive>> {
        let kind = id.kind().wire_name();
        let data_json: Option<String> = conn
            .query_row(
                "SELECT data_json FROM primitives WHERE kind = ?1 AND id = ?2",
                params![kind, id.id()],
                |row| row.get(0),
            )
            .optional()?;
        data_json
            .map(|json| Self::row_to_primitive(kind, id.id(), &json))
            .transpose()
    }

    fn exists(conn: &Connection, id: &PrimitiveId) -> StoreResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM primitives WHERE kind = ?1 AND id = ?2",
                params![id.kind().wire_name(), id.id()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn upsert(conn: &Connection, primitive: &Primitive) -> StoreResult<()> {
        conn.execute(
            r#"
            INSERT INTO primitives (kind, id, version, complete, modified, data_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(kind, id) DO UPDATE SET
                version = excluded.version,
                complete = excluded.complete,
                modified = excluded.modified,
                data_json = excluded.data_json
            "#,
            params![
                primitive.kind().wire_name(),
                primitive.id().id(),
                primitive.version as i64,
                primitive.is_complete(),
                primitive.modified,
                serde_json::to_string(primitive)?,
            ],
        )?;
        Ok(())
    }

    /// Insert or replace a primitive directly, bypassing merge rules
    pub fn insert(&self, primitive: &Primitive) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        Self::upsert(&conn, primitive)
    }

    /// `(total, incomplete)` primitive counts
    pub fn counts(&self) -> StoreResult<(usize, usize)> {
        let conn = self.conn.lock().unwrap();
        let (total, incomplete): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(complete = 0), 0) FROM primitives",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((total as usize, incomplete as usize))
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl PermanentStore for SqliteStore {
    fn lookup(&self, id: &PrimitiveId) -> StoreResult<Option<Primitive>> {
        let conn = self.conn.lock().unwrap();
        Self::load(&conn, id)
    }

    fn merge_from(&self, source: &Dataset, merger: &DatasetMerger) -> StoreResult<MergeReport> {
        let mut conn = self.conn.lock().unwrap();
        // Dropping the transaction without commit rolls everything back.
        let tx = conn.transaction()?;

        for primitive in source {
            for to in primitive.references() {
                if !source.contains(&to) && !Self::exists(&tx, &to)? {
                    return Err(ConsistencyError::DanglingReference {
                        from: primitive.id(),
                        to,
                    }
                    .into());
                }
            }
        }

        let mut report = MergeReport::default();
        for theirs in source {
            let mine = Self::load(&tx, &theirs.id())?;
            let resolution = merger.resolve(mine.as_ref(), theirs);
            if resolution.writes() {
                Self::upsert(&tx, theirs)?;
            }
            report.record(theirs.id(), resolution);
        }

        tx.commit()?;
        Ok(report)
    }

    fn on_post_download(&self, missing: &BTreeSet<PrimitiveId>) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO downloads (at, missing_json) VALUES (?1, ?2)",
            params![Utc::now().to_rfc3339(), serde_json::to_string(missing)?],
        )?;
        Ok(())
    }

    fn snapshot(&self) -> StoreResult<Dataset> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT kind, id, data_json FROM primitives")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut dataset = Dataset::new();
        for row in rows {
            let (kind, id, data_json) = row?;
            dataset.insert(Self::row_to_primitive(&kind, id, &data_json)?);
        }
        Ok(dataset)
    }

    fn downloads(&self) -> StoreResult<Vec<DownloadRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT at, missing_json FROM downloads ORDER BY seq")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (at, missing_json) = row?;
            let at = DateTime::parse_from_rfc3339(&at)
                .map_err(|_| StoreError::Corrupt(format!("download at '{}'", at)))?
                .with_timezone(&Utc);
            records.push(DownloadRecord {
                at,
                missing: serde_json::from_str(&missing_json)?,
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::MergePolicy;
    use crate::primitive::{Coord, Member};

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn sample() -> Dataset {
        [
            Primitive::point(1, 1, Coord::new(0.0, 0.0)),
            Primitive::point(2, 1, Coord::new(0.0, 1.0)).with_tag("name", "corner"),
            Primitive::incomplete(PrimitiveId::point(3)),
            Primitive::line(10, 2, vec![1, 2, 3]),
            Primitive::relation(5, 1, vec![Member::new(PrimitiveId::line(10), "outer")]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_merge_then_snapshot() {
        let store = create_test_store();
        let report = store.merge_from(&sample(), &DatasetMerger::new()).unwrap();
        assert_eq!(report.added, 5);
        assert_eq!(store.snapshot().unwrap(), sample());
        assert_eq!(store.counts().unwrap(), (5, 1));
    }

    #[test]
    fn test_lookup_roundtrips_tags() {
        let store = create_test_store();
        store.merge_from(&sample(), &DatasetMerger::new()).unwrap();
        let point = store.lookup(&PrimitiveId::point(2)).unwrap().unwrap();
        assert_eq!(point.tags.get("name").map(String::as_str), Some("corner"));
        assert!(store.lookup(&PrimitiveId::line(99)).unwrap().is_none());
    }

    #[test]
    fn test_placeholder_completed_by_later_merge() {
        let store = create_test_store();
        store.merge_from(&sample(), &DatasetMerger::new()).unwrap();

        let source: Dataset = [Primitive::point(3, 1, Coord::new(1.0, 1.0))]
            .into_iter()
            .collect();
        let report = store.merge_from(&source, &DatasetMerger::new()).unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(store.counts().unwrap(), (5, 0));
    }

    #[test]
    fn test_dangling_merge_rolls_back() {
        let store = create_test_store();
        store.merge_from(&sample(), &DatasetMerger::new()).unwrap();
        let before = store.snapshot().unwrap();

        let source: Dataset = [
            Primitive::point(1, 9, Coord::new(9.0, 9.0)),
            Primitive::line(11, 1, vec![1, 404]),
        ]
        .into_iter()
        .collect();

        let err = store.merge_from(&source, &DatasetMerger::new()).unwrap_err();
        assert!(matches!(err, StoreError::Consistency(_)));
        assert_eq!(store.snapshot().unwrap(), before);
    }

    #[test]
    fn test_keep_local_edits_in_store() {
        let store = create_test_store();
        store
            .insert(&Primitive::point(1, 1, Coord::new(4.0, 4.0)).mark_modified())
            .unwrap();

        let source: Dataset = [Primitive::point(1, 2, Coord::new(0.0, 0.0))]
            .into_iter()
            .collect();
        let merger = DatasetMerger::new().with_policy(MergePolicy::KeepLocalEdits);
        let report = store.merge_from(&source, &merger).unwrap();

        assert_eq!(report.conflicts, vec![PrimitiveId::point(1)]);
        let kept = store.lookup(&PrimitiveId::point(1)).unwrap().unwrap();
        assert!(kept.modified);
        assert_eq!(kept.coord(), Some(Coord::new(4.0, 4.0)));
    }

    #[test]
    fn test_downloads_are_ordered() {
        let store = create_test_store();
        store.on_post_download(&BTreeSet::new()).unwrap();
        store
            .on_post_download(&BTreeSet::from([PrimitiveId::line(7)]))
            .unwrap();

        let downloads = store.downloads().unwrap();
        assert_eq!(downloads.len(), 2);
        assert!(downloads[0].missing.is_empty());
        assert!(downloads[1].missing.contains(&PrimitiveId::line(7)));
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.merge_from(&sample(), &DatasetMerger::new()).unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.snapshot().unwrap(), sample());
    }

    #[test]
    fn test_wal_mode_enabled_at_connection() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("wal.db")).unwrap();
        let conn = store.conn.lock().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
