//! Durable backing store for the per-site ordered queues (§4.1).
//!
//! Rather than a Berkeley-DB-style environment with one file per site, each
//! logical queue family (the `TaskQueue`'s sites/tasks tables, the
//! `ResultQueue`'s sites/results tables) lives in one SQLite database opened
//! in WAL mode, with per-site separation modeled as a `site_id` column.
//! WAL gives the single-writer/many-readers property the original got from
//! per-file separation, without the one-file-per-site filesystem layout.
//!
//! Keys are fixed-width decimal text (left-padded so lexicographic order
//! equals numeric order), matching the multi-map contract in §4.1.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Width of the zero-padded decimal key. `u64::MAX` has 20 digits.
const KEY_WIDTH: usize = 20;

/// Encode an epoch-seconds value as a fixed-width decimal string so that
/// lexicographic ordering of keys matches numeric ordering.
#[must_use]
pub fn encode_key(epoch_secs: u64) -> String {
    format!("{epoch_secs:0width$}", width = KEY_WIDTH)
}

/// Open (creating if necessary) a WAL-mode SQLite pool at `path`.
pub async fn open_pool(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| sqlx::Error::Io(e))?;
    }
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
}

/// A single table realizing the §4.1 ordered multi-map contract:
/// `(site_id, key) -> [value, value, ...]` in insertion order within a key,
/// keys in lexicographic (== numeric, given fixed-width encoding) order.
///
/// Every public method here executes inside one transaction, matching the
/// "each queue call is a transaction" rule in §5.
#[derive(Clone)]
pub struct OrderedQueue {
    pool: SqlitePool,
    table: &'static str,
}

/// A row returned by [`OrderedQueue::head`], carrying enough to delete it
/// again without a second lookup racing a concurrent writer.
#[derive(Debug, Clone)]
pub struct QueueRow {
    pub rowid: i64,
    pub site_id: String,
    pub key: String,
    pub value: Vec<u8>,
}

impl OrderedQueue {
    /// The underlying connection pool, for callers that need a compound
    /// query spanning more than one `OrderedQueue` (e.g. `TaskQueue::get`,
    /// which joins the sites and tasks tables).
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    #[must_use]
    pub fn table_name(&self) -> &'static str {
        self.table
    }

    /// Open (creating the table if necessary) an ordered queue backed by
    /// `table` in `pool`.
    ///
    /// # Errors
    /// Returns an error if the table cannot be created.
    pub async fn create(pool: SqlitePool, table: &'static str) -> Result<Self, sqlx::Error> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                rowid INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value BLOB NOT NULL
            )"
        );
        sqlx::query(&ddl).execute(&pool).await?;
        let idx = format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_site_key ON {table} (site_id, key, rowid)"
        );
        sqlx::query(&idx).execute(&pool).await?;
        Ok(Self { pool, table })
    }

    /// Insert `value` under `(site_id, key)`. Duplicate keys are allowed and
    /// preserved in insertion order.
    pub async fn put(&self, site_id: &str, key: &str, value: &[u8]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let sql = format!("INSERT INTO {} (site_id, key, value) VALUES (?1, ?2, ?3)", self.table);
        sqlx::query(&sql)
            .bind(site_id)
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }

    /// Non-destructively fetch the row with the smallest key for `site_id`,
    /// breaking ties by insertion order.
    pub async fn head(&self, site_id: &str) -> Result<Option<QueueRow>, sqlx::Error> {
        let sql = format!(
            "SELECT rowid, site_id, key, value FROM {} WHERE site_id = ?1 ORDER BY key ASC, rowid ASC LIMIT 1",
            self.table
        );
        let row: Option<(i64, String, String, Vec<u8>)> = sqlx::query_as(&sql)
            .bind(site_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(rowid, site_id, key, value)| QueueRow {
            rowid,
            site_id,
            key,
            value,
        }))
    }

    /// Smallest key across every site, non-destructively. Used by the
    /// sites-queue, where `site_id` is itself the site identity being
    /// scheduled.
    pub async fn head_any(&self) -> Result<Option<QueueRow>, sqlx::Error> {
        let sql = format!(
            "SELECT rowid, site_id, key, value FROM {} ORDER BY key ASC, rowid ASC LIMIT 1",
            self.table
        );
        let row: Option<(i64, String, String, Vec<u8>)> =
            sqlx::query_as(&sql).fetch_optional(&self.pool).await?;
        Ok(row.map(|(rowid, site_id, key, value)| QueueRow {
            rowid,
            site_id,
            key,
            value,
        }))
    }

    /// All rows with `key <= max_key` (fixed-width decimal comparison, so
    /// lexicographic order matches numeric order), ordered by key then
    /// insertion order. Used by `TaskQueue::get` to scan ready sites without
    /// repeated round-trips.
    pub async fn ready_heads(&self, max_key: &str) -> Result<Vec<QueueRow>, sqlx::Error> {
        let sql = format!(
            "SELECT rowid, site_id, key, value FROM {} WHERE key <= ?1 ORDER BY key ASC, rowid ASC",
            self.table
        );
        let rows: Vec<(i64, String, String, Vec<u8>)> = sqlx::query_as(&sql)
            .bind(max_key)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(rowid, site_id, key, value)| QueueRow {
                rowid,
                site_id,
                key,
                value,
            })
            .collect())
    }

    /// Delete the exact row previously returned by `head`/`head_any`.
    pub async fn delete_row(&self, rowid: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let sql = format!("DELETE FROM {} WHERE rowid = ?1", self.table);
        sqlx::query(&sql).bind(rowid).execute(&mut *tx).await?;
        tx.commit().await
    }

    /// All values stored under `(site_id, key)`, in insertion order.
    pub async fn get_all_by_key(
        &self,
        site_id: &str,
        key: &str,
    ) -> Result<Vec<Vec<u8>>, sqlx::Error> {
        let sql = format!(
            "SELECT value FROM {} WHERE site_id = ?1 AND key = ?2 ORDER BY rowid ASC",
            self.table
        );
        let rows: Vec<(Vec<u8>,)> = sqlx::query_as(&sql)
            .bind(site_id)
            .bind(key)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(v,)| v).collect())
    }

    /// Number of rows for `site_id`, or the whole table when `None`.
    pub async fn len(&self, site_id: Option<&str>) -> Result<i64, sqlx::Error> {
        let count: (i64,) = if let Some(site_id) = site_id {
            let sql = format!("SELECT COUNT(*) FROM {} WHERE site_id = ?1", self.table);
            sqlx::query_as(&sql).bind(site_id).fetch_one(&self.pool).await?
        } else {
            let sql = format!("SELECT COUNT(*) FROM {}", self.table);
            sqlx::query_as(&sql).fetch_one(&self.pool).await?
        };
        Ok(count.0)
    }

    /// Delete every row belonging to `site_id`. Used by startup
    /// reconciliation when a site is removed from configuration.
    pub async fn delete_site(&self, site_id: &str) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let sql = format!("DELETE FROM {} WHERE site_id = ?1", self.table);
        sqlx::query(&sql).bind(site_id).execute(&mut *tx).await?;
        tx.commit().await
    }

    /// Delete every row for `(site_id, key)`.
    pub async fn delete_by_key(&self, site_id: &str, key: &str) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let sql = format!("DELETE FROM {} WHERE site_id = ?1 AND key = ?2", self.table);
        sqlx::query(&sql)
            .bind(site_id)
            .bind(key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }

    /// Distinct site ids currently present in the table.
    pub async fn distinct_sites(&self) -> Result<Vec<String>, sqlx::Error> {
        let sql = format!("SELECT DISTINCT site_id FROM {}", self.table);
        let rows: Vec<(String,)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(s,)| s).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_queue(table: &'static str) -> OrderedQueue {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        OrderedQueue::create(pool, table).await.unwrap()
    }

    #[tokio::test]
    async fn put_then_head_returns_smallest_key() {
        let q = memory_queue("t1").await;
        q.put("site-a", &encode_key(200), b"second").await.unwrap();
        q.put("site-a", &encode_key(100), b"first").await.unwrap();
        let head = q.head("site-a").await.unwrap().unwrap();
        assert_eq!(head.value, b"first");
    }

    #[tokio::test]
    async fn delete_row_decreases_len_by_one() {
        let q = memory_queue("t2").await;
        q.put("site-a", &encode_key(1), b"x").await.unwrap();
        q.put("site-a", &encode_key(2), b"y").await.unwrap();
        let head = q.head("site-a").await.unwrap().unwrap();
        q.delete_row(head.rowid).await.unwrap();
        assert_eq!(q.len(Some("site-a")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_keys_preserve_insertion_order() {
        let q = memory_queue("t3").await;
        let key = encode_key(50);
        q.put("site-a", &key, b"one").await.unwrap();
        q.put("site-a", &key, b"two").await.unwrap();
        let values = q.get_all_by_key("site-a", &key).await.unwrap();
        assert_eq!(values, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[tokio::test]
    async fn delete_site_removes_only_that_sites_rows() {
        let q = memory_queue("t4").await;
        q.put("site-a", &encode_key(1), b"a").await.unwrap();
        q.put("site-b", &encode_key(1), b"b").await.unwrap();
        q.delete_site("site-a").await.unwrap();
        assert_eq!(q.len(Some("site-a")).await.unwrap(), 0);
        assert_eq!(q.len(Some("site-b")).await.unwrap(), 1);
    }

    #[test]
    fn encode_key_preserves_numeric_order_lexicographically() {
        let a = encode_key(9);
        let b = encode_key(10);
        assert!(a < b);
        assert_eq!(a.len(), b.len());
    }
}
