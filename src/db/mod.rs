mod from_row;
pub mod queries;

pub use from_row::{FromRow, KEY_HISTORY_COLS, LICENSE_KEY_COLS, query_all, query_one};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::email::EmailService;
use crate::error::Result;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Configurable table names, kept together so queries can't mix them up.
#[derive(Debug, Clone)]
pub struct Tables {
    pub license_keys: String,
    pub key_history: String,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            license_keys: "license_keys".to_string(),
            key_history: "key_history".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub tables: Tables,
    pub email: EmailService,
    pub admin_token: Option<String>,
    pub dev_mode: bool,
}

pub fn create_pool(database_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(database_path);
    Ok(Pool::builder().max_size(8).build(manager)?)
}

/// Create tables and indexes if missing. Idempotent.
pub fn init_db(conn: &Connection, tables: &Tables) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {keys} (
            key TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            key_type TEXT NOT NULL,
            is_trial INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            activated_at INTEGER,
            expires_at INTEGER,
            active_flows INTEGER,
            features TEXT NOT NULL DEFAULT '{{}}',
            full_name TEXT,
            company_name TEXT,
            number_of_employees TEXT,
            goal TEXT,
            notes TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_{keys}_email ON {keys}(email);
        CREATE INDEX IF NOT EXISTS idx_{keys}_created_at ON {keys}(created_at);

        CREATE TABLE IF NOT EXISTS {history} (
            id TEXT PRIMARY KEY,
            key_value TEXT NOT NULL,
            action TEXT NOT NULL,
            performed_at INTEGER NOT NULL,
            details TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_{history}_key_value ON {history}(key_value);",
        keys = tables.license_keys,
        history = tables.key_history,
    ))?;
    Ok(())
}
