use rusqlite::{Connection, Result, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

pub const DB_SCHEMA_VERSION: i64 = 3;
pub const DB_FILE_NAME: &str = "vida.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let starting_version = version;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 2 {
        apply_migration_2(conn)?;
        version = 2;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 3 {
        apply_migration_3(conn)?;
        version = 3;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > DB_SCHEMA_VERSION {
        // Written by a newer build; keep working with the columns we know.
        log::warn!("database schema v{version} is newer than supported v{DB_SCHEMA_VERSION}");
    } else if starting_version != version {
        log::info!("migrated database schema v{starting_version} -> v{version}");
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            email TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS bills (
            id TEXT PRIMARY KEY,
            profile_id TEXT NOT NULL,
            name TEXT NOT NULL,
            recipient TEXT NOT NULL,
            amount REAL NOT NULL,
            due_date TEXT NOT NULL,
            is_paid INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            profile_id TEXT NOT NULL,
            type TEXT NOT NULL CHECK(type IN ('income', 'expense')),
            amount REAL NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            date TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS debts (
            id TEXT PRIMARY KEY,
            profile_id TEXT NOT NULL,
            name TEXT NOT NULL,
            lender TEXT NOT NULL,
            total_balance REAL NOT NULL DEFAULT 0,
            interest_rate REAL,
            priority INTEGER NOT NULL DEFAULT 0,
            payments TEXT NOT NULL DEFAULT '[]'
        );

        CREATE INDEX IF NOT EXISTS idx_bills_profile_id ON bills(profile_id);
        CREATE INDEX IF NOT EXISTS idx_bills_due_date ON bills(due_date);
        CREATE INDEX IF NOT EXISTS idx_transactions_profile_id ON transactions(profile_id);
        CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
        CREATE INDEX IF NOT EXISTS idx_debts_profile_id ON debts(profile_id);
        ",
    )
}

fn apply_migration_2(conn: &Connection) -> Result<()> {
    add_column_if_missing(conn, "profiles", "cash_balance REAL")?;
    add_column_if_missing(conn, "profiles", "pix_balance REAL")?;
    add_column_if_missing(conn, "bills", "category TEXT")?;
    add_column_if_missing(conn, "bills", "debt_id TEXT")?;
    add_column_if_missing(conn, "debts", "category TEXT NOT NULL DEFAULT 'other'")?;
    add_column_if_missing(conn, "debts", "installment_count INTEGER")?;
    add_column_if_missing(conn, "debts", "installment_amount REAL")?;
    add_column_if_missing(conn, "debts", "first_due_date TEXT")?;

    // Older rows may carry an empty history string.
    conn.execute(
        "UPDATE debts SET payments = '[]' WHERE payments IS NULL OR payments = ''",
        [],
    )?;

    conn.execute_batch("CREATE INDEX IF NOT EXISTS idx_bills_debt_id ON bills(debt_id);")
}

fn apply_migration_3(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS recurring_bills (
            id TEXT PRIMARY KEY,
            profile_id TEXT NOT NULL,
            name TEXT NOT NULL,
            recipient TEXT NOT NULL,
            amount REAL NOT NULL,
            category TEXT,
            frequency TEXT NOT NULL CHECK(frequency IN ('weekly', 'monthly', 'yearly')),
            due_day INTEGER NOT NULL,
            due_month INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1
        );

        CREATE INDEX IF NOT EXISTS idx_recurring_bills_profile_id ON recurring_bills(profile_id);
        ",
    )?;

    add_column_if_missing(conn, "bills", "recurring_id TEXT")?;

    conn.execute_batch(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_bills_recurring_occurrence
            ON bills(recurring_id, due_date) WHERE recurring_id IS NOT NULL;",
    )
}

pub(crate) fn add_column_if_missing(conn: &Connection, table: &str, column_def: &str) -> Result<()> {
    let column_name = column_def
        .split_whitespace()
        .next()
        .unwrap_or(column_def)
        .to_string();

    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(|res| res.ok())
        .any(|name| name == column_name);

    if !exists {
        conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column_def}"), [])?;
    }

    Ok(())
}

pub fn get_db_connection(data_dir: &str) -> Result<Connection> {
    // A missing directory surfaces as SQLITE_CANTOPEN below.
    let _ = std::fs::create_dir_all(data_dir);
    let conn = Connection::open(Path::new(data_dir).join(DB_FILE_NAME))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    initialize_schema(&conn)?;
    Ok(conn)
}

/// Takes the write lock up front, so reads made inside the transaction cannot
/// be invalidated by another connection before it commits.
pub(crate) fn immediate_transaction(conn: &Connection) -> Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

pub(crate) fn bool_to_sql(value: bool) -> i32 {
    value as i32
}

#[cfg(test)]
pub(crate) fn test_connection() -> Connection {
    let conn = Connection::open_in_memory().expect("in-memory db");
    initialize_schema(&conn).expect("schema init");
    conn
}
