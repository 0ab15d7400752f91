use super::models::{ShopRecord, SyncRun, SyncRunStatus};
use super::schema::SHOP_VERSIONED_SCHEMAS;
use super::ShopStore;
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct SqliteShopStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteShopStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let mut conn = Connection::open(path).context("Failed to open shop database")?;

        if is_new_db {
            info!("Creating new shop database at {:?}", path);
            SHOP_VERSIONED_SCHEMAS.last().unwrap().create(&conn)?;
        } else {
            let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
            let db_version = raw_version - BASE_DB_VERSION as i64;

            if db_version < 1 {
                anyhow::bail!(
                    "Shop database version {} is invalid (expected >= 1)",
                    db_version
                );
            }

            let current_schema_version = SHOP_VERSIONED_SCHEMAS.last().unwrap().version as i64;

            let version_index = SHOP_VERSIONED_SCHEMAS
                .iter()
                .position(|s| s.version == db_version as usize)
                .with_context(|| format!("Unknown shop database version {}", db_version))?;
            SHOP_VERSIONED_SCHEMAS[version_index]
                .validate(&conn)
                .with_context(|| {
                    format!(
                        "Shop database schema validation failed for version {}",
                        db_version
                    )
                })?;

            if db_version < current_schema_version {
                info!(
                    "Migrating shop database from version {} to {}",
                    db_version, current_schema_version
                );
                Self::migrate_if_needed(&mut conn, db_version as usize)?;
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate_if_needed(conn: &mut Connection, from_version: usize) -> Result<()> {
        let tx = conn.transaction()?;
        let mut latest_from = from_version;
        for schema in SHOP_VERSIONED_SCHEMAS.iter().skip(from_version) {
            if schema.version > from_version {
                info!(
                    "Running shop database migration from version {} to {}",
                    latest_from, schema.version
                );
                if let Some(migration_fn) = schema.migration {
                    migration_fn(&tx).with_context(|| {
                        format!("Failed to run migration to version {}", schema.version)
                    })?;
                }
                latest_from = schema.version;
            }
        }
        tx.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest_from),
            [],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339()
    }

    fn parse_datetime(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_shop(row: &rusqlite::Row) -> rusqlite::Result<ShopRecord> {
        let created_at_str: String = row.get("created_at")?;
        let last_sync_at_str: Option<String> = row.get("last_sync_at")?;
        let is_active: i64 = row.get("is_active")?;

        Ok(ShopRecord {
            id: row.get("id")?,
            name: row.get("name")?,
            domain: row.get("domain")?,
            access_token: row.get("access_token")?,
            timezone: row.get("timezone")?,
            is_active: is_active != 0,
            created_at: Self::parse_datetime(&created_at_str),
            last_sync_at: last_sync_at_str.and_then(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            }),
        })
    }

    fn row_to_sync_run(row: &rusqlite::Row) -> rusqlite::Result<SyncRun> {
        let status_str: String = row.get("status")?;
        let status = SyncRunStatus::parse(&status_str).unwrap_or(SyncRunStatus::Failed);

        let started_at_str: String = row.get("started_at")?;
        let finished_at_str: Option<String> = row.get("finished_at")?;

        Ok(SyncRun {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            shop_id: row.get("shop_id")?,
            job_type: row.get("job_type")?,
            started_at: Self::parse_datetime(&started_at_str),
            finished_at: finished_at_str.and_then(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            }),
            status,
            error_message: row.get("error_message")?,
            triggered_by: row.get("triggered_by")?,
        })
    }
}

impl ShopStore for SqliteShopStore {
    fn insert_shop(&self, shop: &ShopRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO shops (id, name, domain, access_token, timezone, is_active, created_at, last_sync_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                shop.id,
                shop.name,
                shop.domain,
                shop.access_token,
                shop.timezone,
                shop.is_active as i64,
                Self::format_datetime(&shop.created_at),
                shop.last_sync_at.as_ref().map(Self::format_datetime),
            ],
        )?;
        Ok(())
    }

    fn get_shop(&self, shop_id: &str) -> Result<Option<ShopRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, domain, access_token, timezone, is_active, created_at, last_sync_at
             FROM shops WHERE id = ?1",
        )?;

        let shop = stmt
            .query_row(params![shop_id], Self::row_to_shop)
            .optional()?;

        Ok(shop)
    }

    fn list_shops(&self, only_active: bool) -> Result<Vec<ShopRecord>> {
        let conn = self.conn.lock().unwrap();
        let sql = if only_active {
            "SELECT id, name, domain, access_token, timezone, is_active, created_at, last_sync_at
             FROM shops WHERE is_active = 1 ORDER BY id"
        } else {
            "SELECT id, name, domain, access_token, timezone, is_active, created_at, last_sync_at
             FROM shops ORDER BY id"
        };
        let mut stmt = conn.prepare(sql)?;

        let shops = stmt
            .query_map(params![], Self::row_to_shop)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(shops)
    }

    fn set_shop_active(&self, shop_id: &str, is_active: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE shops SET is_active = ?1 WHERE id = ?2",
            params![is_active as i64, shop_id],
        )?;
        Ok(())
    }

    fn update_access_token(&self, shop_id: &str, access_token: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE shops SET access_token = ?1 WHERE id = ?2",
            params![access_token, shop_id],
        )?;
        Ok(())
    }

    fn update_last_sync_at(&self, shop_id: &str, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE shops SET last_sync_at = ?1 WHERE id = ?2",
            params![Self::format_datetime(&at), shop_id],
        )?;
        Ok(())
    }

    fn delete_shop(&self, shop_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM shops WHERE id = ?1", params![shop_id])?;
        Ok(())
    }

    fn record_run_start(
        &self,
        job_id: &str,
        shop_id: &str,
        job_type: &str,
        triggered_by: &str,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let now = Self::format_datetime(&Utc::now());

        conn.execute(
            "INSERT INTO sync_runs (job_id, shop_id, job_type, started_at, status, triggered_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                job_id,
                shop_id,
                job_type,
                now,
                SyncRunStatus::Running.as_str(),
                triggered_by
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn record_run_finish(
        &self,
        run_id: i64,
        status: SyncRunStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Self::format_datetime(&Utc::now());

        conn.execute(
            "UPDATE sync_runs SET finished_at = ?1, status = ?2, error_message = ?3 WHERE id = ?4",
            params![now, status.as_str(), error_message, run_id],
        )?;

        Ok(())
    }

    fn get_runs_for_shop(&self, shop_id: &str, limit: usize) -> Result<Vec<SyncRun>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, job_id, shop_id, job_type, started_at, finished_at, status, error_message, triggered_by
             FROM sync_runs WHERE shop_id = ?1 ORDER BY started_at DESC, id DESC LIMIT ?2",
        )?;

        let runs = stmt
            .query_map(params![shop_id, limit as i64], Self::row_to_sync_run)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(runs)
    }

    fn get_last_run(&self, shop_id: &str) -> Result<Option<SyncRun>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, job_id, shop_id, job_type, started_at, finished_at, status, error_message, triggered_by
             FROM sync_runs WHERE shop_id = ?1 ORDER BY started_at DESC, id DESC LIMIT 1",
        )?;

        let run = stmt
            .query_row(params![shop_id], Self::row_to_sync_run)
            .optional()?;

        Ok(run)
    }

    fn mark_stale_runs_failed(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let now = Self::format_datetime(&Utc::now());

        // Runs still marked running at startup were interrupted by a restart
        let count = conn.execute(
            "UPDATE sync_runs SET status = ?1, finished_at = ?2, error_message = ?3
             WHERE status = ?4",
            params![
                SyncRunStatus::Failed.as_str(),
                now,
                "Run was interrupted (server restart)",
                SyncRunStatus::Running.as_str()
            ],
        )?;

        Ok(count)
    }

    fn prune_runs_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock().unwrap();

        let count = conn.execute(
            "DELETE FROM sync_runs WHERE status != ?1 AND started_at < ?2",
            params![
                SyncRunStatus::Running.as_str(),
                Self::format_datetime(&cutoff)
            ],
        )?;

        Ok(count)
    }
}
