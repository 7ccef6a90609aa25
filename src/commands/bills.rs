use crate::commands::db::{bool_to_sql, get_db_connection};
use crate::commands::settings::load_effective_settings;
use crate::error::VidaError;
use crate::finance::calendar::format_date;
use crate::finance::payments::pay_bill_with_conn;
use crate::finance::validation::validate_bill;
use crate::models::bill::{Bill, PaidBill};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

const BILL_COLUMNS: &str =
    "id, profile_id, name, recipient, amount, due_date, is_paid, category, debt_id, recurring_id";

fn bill_from_row(row: &Row<'_>) -> Result<Bill> {
    Ok(Bill {
        id: row.get(0)?,
        profile_id: row.get(1)?,
        name: row.get(2)?,
        recipient: row.get(3)?,
        amount: row.get(4)?,
        due_date: row.get(5)?,
        is_paid: row.get::<_, i32>(6)? != 0,
        category: row.get(7)?,
        debt_id: row.get(8)?,
        recurring_id: row.get(9)?,
    })
}

pub fn insert_bill(conn: &Connection, bill: &Bill) -> Result<()> {
    conn.execute(
        "INSERT INTO bills (id, profile_id, name, recipient, amount, due_date, is_paid, category, debt_id, recurring_id) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
        params![&bill.id, &bill.profile_id, &bill.name, &bill.recipient, bill.amount, &bill.due_date, bool_to_sql(bill.is_paid), bill.category.as_deref(), bill.debt_id.as_deref(), bill.recurring_id.as_deref()],
    )?;
    Ok(())
}

/// Inserts unless another bill already covers the same recurring occurrence.
/// Returns whether a row was written.
pub fn insert_bill_if_absent(conn: &Connection, bill: &Bill) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO bills (id, profile_id, name, recipient, amount, due_date, is_paid, category, debt_id, recurring_id) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
        params![&bill.id, &bill.profile_id, &bill.name, &bill.recipient, bill.amount, &bill.due_date, bool_to_sql(bill.is_paid), bill.category.as_deref(), bill.debt_id.as_deref(), bill.recurring_id.as_deref()],
    )?;
    Ok(inserted > 0)
}

pub fn update_bill(conn: &Connection, bill: &Bill) -> Result<usize> {
    conn.execute(
        "UPDATE bills SET name=?2, recipient=?3, amount=?4, due_date=?5, is_paid=?6, category=?7, debt_id=?8, recurring_id=?9 WHERE id=?1",
        params![&bill.id, &bill.name, &bill.recipient, bill.amount, &bill.due_date, bool_to_sql(bill.is_paid), bill.category.as_deref(), bill.debt_id.as_deref(), bill.recurring_id.as_deref()],
    )
}

pub fn load_bill(conn: &Connection, id: &str) -> Result<Option<Bill>> {
    conn.query_row(
        &format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = ?1"),
        params![id],
        bill_from_row,
    )
    .optional()
}

pub fn list_bills(conn: &Connection, profile_id: &str) -> Result<Vec<Bill>> {
    query_bills(
        conn,
        &format!("SELECT {BILL_COLUMNS} FROM bills WHERE profile_id = ?1 ORDER BY due_date ASC, name ASC"),
        params![profile_id],
    )
}

pub fn list_bills_for_debt(conn: &Connection, debt_id: &str) -> Result<Vec<Bill>> {
    query_bills(
        conn,
        &format!("SELECT {BILL_COLUMNS} FROM bills WHERE debt_id = ?1 ORDER BY due_date ASC"),
        params![debt_id],
    )
}

/// Bills with a due date inside `[from, to]`, both ISO dates.
pub fn list_bills_between(conn: &Connection, profile_id: &str, from: &str, to: &str) -> Result<Vec<Bill>> {
    query_bills(
        conn,
        &format!("SELECT {BILL_COLUMNS} FROM bills WHERE profile_id = ?1 AND due_date >= ?2 AND due_date <= ?3 ORDER BY due_date ASC"),
        params![profile_id, from, to],
    )
}

/// Unpaid bills due on or before `until`, overdue ones included.
pub fn list_unpaid_until(conn: &Connection, profile_id: &str, until: &str) -> Result<Vec<Bill>> {
    query_bills(
        conn,
        &format!("SELECT {BILL_COLUMNS} FROM bills WHERE profile_id = ?1 AND is_paid = 0 AND due_date <= ?2 ORDER BY due_date ASC"),
        params![profile_id, until],
    )
}

fn query_bills(conn: &Connection, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Bill>> {
    let mut stmt = conn.prepare(sql)?;
    let bills = stmt
        .query_map(args, bill_from_row)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(bills)
}

pub fn delete_bill(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("DELETE FROM bills WHERE id = ?1", params![id])?;
    Ok(())
}

#[cfg_attr(feature = "desktop", tauri::command)]
pub async fn bill_crud(
    data_dir: String,
    operation: String,
    item: Option<Bill>,
    id: Option<String>,
    profile_id: Option<String>,
) -> Result<serde_json::Value, String> {
    let conn = get_db_connection(&data_dir).map_err(|e| format!("DB error: {e}"))?;

    match operation.as_str() {
        "create" => {
            let item = item.ok_or("Item required for create")?;
            validate_bill(&item).map_err(|e| e.to_string())?;
            insert_bill(&conn, &item).map_err(|e| format!("Insert error: {e}"))?;
            Ok(serde_json::json!({"status": "created", "id": item.id}))
        }
        "update" => {
            let item = item.ok_or("Item required for update")?;
            validate_bill(&item).map_err(|e| e.to_string())?;
            let changed = update_bill(&conn, &item).map_err(|e| format!("Update error: {e}"))?;
            if changed == 0 {
                return Err(VidaError::not_found("bill", &item.id).to_string());
            }
            Ok(serde_json::json!({"status": "updated", "id": item.id}))
        }
        "read" => {
            let id = id.ok_or("ID required for read")?;
            let bill = load_bill(&conn, &id).map_err(|e| format!("Read error: {e}"))?;
            Ok(serde_json::to_value(bill).unwrap_or(serde_json::Value::Null))
        }
        "list" => {
            let profile_id = profile_id.ok_or("profile_id required for list")?;
            let bills = list_bills(&conn, &profile_id).map_err(|e| format!("Query error: {e}"))?;
            Ok(serde_json::to_value(bills).unwrap_or_default())
        }
        "delete" => {
            let id = id.ok_or("ID required for delete")?;
            delete_bill(&conn, &id).map_err(|e| format!("Delete error: {e}"))?;
            Ok(serde_json::json!({"status": "deleted"}))
        }
        _ => Err(format!("Unknown operation: {operation}")),
    }
}

fn upcoming_window_end(today: NaiveDate, days: u32) -> Result<NaiveDate, String> {
    today
        .checked_add_signed(chrono::Duration::days(i64::from(days)))
        .ok_or_else(|| format!("{today} plus {days} days is past the supported calendar"))
}

/// Unpaid bills due within the configured window, overdue ones first.
#[cfg_attr(feature = "desktop", tauri::command)]
pub async fn get_upcoming_bills(
    data_dir: String,
    profile_id: String,
    today: Option<String>,
) -> Result<Vec<Bill>, String> {
    let settings = load_effective_settings(&data_dir)?;
    let today = match today {
        Some(raw) => crate::finance::calendar::parse_date(&raw).map_err(|e| e.to_string())?,
        None => chrono::Local::now().date_naive(),
    };
    let until = upcoming_window_end(today, settings.upcoming_days)?;

    let conn = get_db_connection(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    list_unpaid_until(&conn, &profile_id, &format_date(until)).map_err(|e| format!("Query error: {e}"))
}

#[cfg_attr(feature = "desktop", tauri::command)]
pub async fn pay_bill(
    data_dir: String,
    id: String,
    paid_on: Option<String>,
    record_transaction: Option<bool>,
) -> Result<PaidBill, String> {
    let settings = load_effective_settings(&data_dir)?;
    let record_transaction = record_transaction.unwrap_or(settings.record_transaction_on_pay);

    let conn = get_db_connection(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    pay_bill_with_conn(&conn, &id, paid_on.as_deref(), record_transaction).map_err(|e| e.to_string())
}
