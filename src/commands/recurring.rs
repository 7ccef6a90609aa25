use crate::commands::db::{bool_to_sql, get_db_connection};
use crate::error::VidaError;
use crate::finance::recurrence::generate_recurring_bills;
use crate::finance::validation::validate_recurring_bill;
use crate::models::bill::Bill;
use crate::models::recurring_bill::{Recurrence, RecurringBill};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

const RECURRING_COLUMNS: &str =
    "id, profile_id, name, recipient, amount, category, frequency, due_day, due_month, is_active";

fn recurring_from_row(row: &Row<'_>) -> Result<RecurringBill> {
    let raw_frequency: String = row.get(6)?;
    let frequency = Recurrence::parse(&raw_frequency).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            Type::Text,
            format!("unknown frequency `{raw_frequency}`").into(),
        )
    })?;

    Ok(RecurringBill {
        id: row.get(0)?,
        profile_id: row.get(1)?,
        name: row.get(2)?,
        recipient: row.get(3)?,
        amount: row.get(4)?,
        category: row.get(5)?,
        frequency,
        due_day: row.get(7)?,
        due_month: row.get(8)?,
        is_active: row.get::<_, i32>(9)? != 0,
    })
}

pub fn insert_recurring_bill(conn: &Connection, rb: &RecurringBill) -> Result<()> {
    conn.execute(
        "INSERT INTO recurring_bills (id, profile_id, name, recipient, amount, category, frequency, due_day, due_month, is_active) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
        params![&rb.id, &rb.profile_id, &rb.name, &rb.recipient, rb.amount, rb.category.as_deref(), rb.frequency.as_str(), rb.due_day, rb.due_month, bool_to_sql(rb.is_active)],
    )?;
    Ok(())
}

pub fn update_recurring_bill(conn: &Connection, rb: &RecurringBill) -> Result<usize> {
    conn.execute(
        "UPDATE recurring_bills SET name=?2, recipient=?3, amount=?4, category=?5, frequency=?6, due_day=?7, due_month=?8, is_active=?9 WHERE id=?1",
        params![&rb.id, &rb.name, &rb.recipient, rb.amount, rb.category.as_deref(), rb.frequency.as_str(), rb.due_day, rb.due_month, bool_to_sql(rb.is_active)],
    )
}

pub fn load_recurring_bill(conn: &Connection, id: &str) -> Result<Option<RecurringBill>> {
    conn.query_row(
        &format!("SELECT {RECURRING_COLUMNS} FROM recurring_bills WHERE id = ?1"),
        params![id],
        recurring_from_row,
    )
    .optional()
}

pub fn list_recurring_bills(conn: &Connection, profile_id: &str, active_only: bool) -> Result<Vec<RecurringBill>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECURRING_COLUMNS} FROM recurring_bills WHERE profile_id = ?1 AND (?2 = 0 OR is_active = 1) ORDER BY due_day ASC, name ASC"
    ))?;
    let items = stmt
        .query_map(params![profile_id, bool_to_sql(active_only)], recurring_from_row)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(items)
}

/// Bills already generated from the template are kept.
pub fn delete_recurring_bill(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("DELETE FROM recurring_bills WHERE id = ?1", params![id])?;
    Ok(())
}

#[cfg_attr(feature = "desktop", tauri::command)]
pub async fn recurring_bill_crud(
    data_dir: String,
    operation: String,
    item: Option<RecurringBill>,
    id: Option<String>,
    profile_id: Option<String>,
) -> Result<serde_json::Value, String> {
    let conn = get_db_connection(&data_dir).map_err(|e| format!("DB error: {e}"))?;

    match operation.as_str() {
        "create" => {
            let item = item.ok_or("Item required for create")?;
            validate_recurring_bill(&item).map_err(|e| e.to_string())?;
            insert_recurring_bill(&conn, &item).map_err(|e| format!("Insert error: {e}"))?;
            Ok(serde_json::json!({"status": "created", "id": item.id}))
        }
        "update" => {
            let item = item.ok_or("Item required for update")?;
            validate_recurring_bill(&item).map_err(|e| e.to_string())?;
            let changed = update_recurring_bill(&conn, &item).map_err(|e| format!("Update error: {e}"))?;
            if changed == 0 {
                return Err(VidaError::not_found("recurring bill", &item.id).to_string());
            }
            Ok(serde_json::json!({"status": "updated", "id": item.id}))
        }
        "read" => {
            let id = id.ok_or("ID required for read")?;
            let item = load_recurring_bill(&conn, &id).map_err(|e| format!("Read error: {e}"))?;
            Ok(serde_json::to_value(item).unwrap_or(serde_json::Value::Null))
        }
        "list" => {
            let profile_id = profile_id.ok_or("profile_id required for list")?;
            let items = list_recurring_bills(&conn, &profile_id, false)
                .map_err(|e| format!("Query error: {e}"))?;
            Ok(serde_json::to_value(items).unwrap_or_default())
        }
        "delete" => {
            let id = id.ok_or("ID required for delete")?;
            delete_recurring_bill(&conn, &id).map_err(|e| format!("Delete error: {e}"))?;
            Ok(serde_json::json!({"status": "deleted"}))
        }
        _ => Err(format!("Unknown operation: {operation}")),
    }
}

#[cfg_attr(feature = "desktop", tauri::command)]
pub async fn generate_recurring(
    data_dir: String,
    profile_id: String,
    month: String,
) -> Result<Vec<Bill>, String> {
    let conn = get_db_connection(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    generate_recurring_bills(&conn, &profile_id, &month).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::db::test_connection;

    fn template(id: &str, is_active: bool) -> RecurringBill {
        RecurringBill {
            id: id.to_string(),
            profile_id: "p1".to_string(),
            name: "Aluguel".to_string(),
            recipient: "Imobiliária".to_string(),
            amount: 1500.0,
            category: Some("housing".to_string()),
            frequency: Recurrence::Monthly,
            due_day: 5,
            due_month: None,
            is_active,
        }
    }

    #[test]
    fn active_filter_hides_paused_templates() {
        let conn = test_connection();
        insert_recurring_bill(&conn, &template("on", true)).unwrap();
        insert_recurring_bill(&conn, &template("off", false)).unwrap();

        assert_eq!(list_recurring_bills(&conn, "p1", false).unwrap().len(), 2);
        let active = list_recurring_bills(&conn, "p1", true).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "on");
    }

    #[test]
    fn round_trip_keeps_frequency() {
        let conn = test_connection();
        let mut rb = template("yearly", true);
        rb.frequency = Recurrence::Yearly;
        rb.due_month = Some(2);
        insert_recurring_bill(&conn, &rb).unwrap();
        assert_eq!(load_recurring_bill(&conn, "yearly").unwrap(), Some(rb));
    }
}
