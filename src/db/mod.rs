use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use std::path::Path;

/// Logical collections persisted as one serialized JSON array each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    Invoices,
    Companies,
    Suppliers,
    Categories,
    Users,
    AuditLogs,
    RolePermissions,
    Prompts,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Invoices,
        Collection::Companies,
        Collection::Suppliers,
        Collection::Categories,
        Collection::Users,
        Collection::AuditLogs,
        Collection::RolePermissions,
        Collection::Prompts,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Collection::Invoices => "invoices",
            Collection::Companies => "companies",
            Collection::Suppliers => "suppliers",
            Collection::Categories => "categories",
            Collection::Users => "users",
            Collection::AuditLogs => "auditLogs",
            Collection::RolePermissions => "rolePermissions",
            Collection::Prompts => "prompts",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessingLog {
    pub id: String,
    pub file_hash: Option<String>,
    pub file_name: Option<String>,
    pub process_type: String,
    pub status: String,
    pub message: Option<String>,
    pub created_at: String,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new<P: AsRef<Path>>(db_path: P) -> SqlResult<Self> {
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> SqlResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> SqlResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let mut db = Database { conn };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&mut self) -> SqlResult<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL
            );",
        )?;

        let migrations = vec![
            (
                "001_create_collections.sql",
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/migrations/001_create_collections.sql"
                )),
            ),
            (
                "002_create_settings.sql",
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/migrations/002_create_settings.sql"
                )),
            ),
            (
                "003_create_processing_logs_table.sql",
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/migrations/003_create_processing_logs_table.sql"
                )),
            ),
        ];

        for (name, sql) in migrations {
            let applied: Option<String> = self
                .conn
                .query_row(
                    "SELECT name FROM schema_migrations WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;

            if applied.is_none() {
                let tx = self.conn.transaction()?;
                tx.execute_batch(sql)?;
                tx.execute(
                    "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, datetime('now'))",
                    params![name],
                )?;
                tx.commit()?;
            }
        }

        Ok(())
    }

    pub fn get_collection(&self, collection: Collection) -> SqlResult<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM collections WHERE name = ?1")?;
        stmt.query_row(params![collection.key()], |row| row.get(0))
            .optional()
    }

    pub fn put_collection(&self, collection: Collection, payload: &str) -> SqlResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO collections (name, payload, updated_at) VALUES (?1, ?2, datetime('now'))",
            params![collection.key(), payload],
        )?;
        Ok(())
    }

    pub fn set_setting(&self, key: &str, value: &str) -> SqlResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> SqlResult<Option<String>> {
        let mut stmt = self.conn.prepare("SELECT value FROM settings WHERE key = ?1")?;
        stmt.query_row(params![key], |row| row.get(0)).optional()
    }

    pub fn log_processing(
        &self,
        file_hash: Option<&str>,
        file_name: Option<&str>,
        process_type: &str,
        status: &str,
        message: Option<&str>,
    ) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO processing_logs (id, file_hash, file_name, process_type, status, message, created_at)
             VALUES (hex(randomblob(16)), ?1, ?2, ?3, ?4, ?5, datetime('now'))",
            params![file_hash, file_name, process_type, status, message],
        )?;
        Ok(())
    }

    pub fn get_processing_logs(&self, limit: usize) -> SqlResult<Vec<ProcessingLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, file_hash, file_name, process_type, status, message, created_at
             FROM processing_logs
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(ProcessingLog {
                id: row.get(0)?,
                file_hash: row.get(1)?,
                file_name: row.get(2)?,
                process_type: row.get(3)?,
                status: row.get(4)?,
                message: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;

        rows.collect()
    }
}
