use crate::commands::db::get_db_connection;
use crate::error::VidaError;
use crate::finance::calendar::{format_date, month_bounds};
use crate::finance::validation::validate_transaction;
use crate::models::transaction::{Transaction, TransactionKind};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

const TRANSACTION_COLUMNS: &str = "id, profile_id, type, amount, description, date";

fn transaction_from_row(row: &Row<'_>) -> Result<Transaction> {
    let raw_kind: String = row.get(2)?;
    let kind = TransactionKind::parse(&raw_kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("unknown transaction type `{raw_kind}`").into(),
        )
    })?;

    Ok(Transaction {
        id: row.get(0)?,
        profile_id: row.get(1)?,
        kind,
        amount: row.get(3)?,
        description: row.get(4)?,
        date: row.get(5)?,
    })
}

pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<()> {
    conn.execute(
        "INSERT INTO transactions (id, profile_id, type, amount, description, date) VALUES (?1,?2,?3,?4,?5,?6)",
        params![&tx.id, &tx.profile_id, tx.kind.as_str(), tx.amount, &tx.description, &tx.date],
    )?;
    Ok(())
}

pub fn update_transaction(conn: &Connection, tx: &Transaction) -> Result<usize> {
    conn.execute(
        "UPDATE transactions SET type=?2, amount=?3, description=?4, date=?5 WHERE id=?1",
        params![&tx.id, tx.kind.as_str(), tx.amount, &tx.description, &tx.date],
    )
}

pub fn load_transaction(conn: &Connection, id: &str) -> Result<Option<Transaction>> {
    conn.query_row(
        &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"),
        params![id],
        transaction_from_row,
    )
    .optional()
}

/// Newest first. With `range`, only dates inside `[from, to]`.
pub fn list_transactions(
    conn: &Connection,
    profile_id: &str,
    range: Option<(&str, &str)>,
) -> Result<Vec<Transaction>> {
    let (from, to) = range.unwrap_or(("0000-01-01", "9999-12-31"));
    let mut stmt = conn.prepare(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE profile_id = ?1 AND date >= ?2 AND date <= ?3 ORDER BY date DESC, id ASC"
    ))?;
    let items = stmt
        .query_map(params![profile_id, from, to], transaction_from_row)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(items)
}

pub fn delete_transaction(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("DELETE FROM transactions WHERE id = ?1", params![id])?;
    Ok(())
}

#[cfg_attr(feature = "desktop", tauri::command)]
pub async fn transaction_crud(
    data_dir: String,
    operation: String,
    item: Option<Transaction>,
    id: Option<String>,
    profile_id: Option<String>,
    month: Option<String>,
) -> Result<serde_json::Value, String> {
    let conn = get_db_connection(&data_dir).map_err(|e| format!("DB error: {e}"))?;

    match operation.as_str() {
        "create" => {
            let item = item.ok_or("Item required for create")?;
            validate_transaction(&item).map_err(|e| e.to_string())?;
            insert_transaction(&conn, &item).map_err(|e| format!("Insert error: {e}"))?;
            Ok(serde_json::json!({"status": "created", "id": item.id}))
        }
        "update" => {
            let item = item.ok_or("Item required for update")?;
            validate_transaction(&item).map_err(|e| e.to_string())?;
            let changed = update_transaction(&conn, &item).map_err(|e| format!("Update error: {e}"))?;
            if changed == 0 {
                return Err(VidaError::not_found("transaction", &item.id).to_string());
            }
            Ok(serde_json::json!({"status": "updated", "id": item.id}))
        }
        "read" => {
            let id = id.ok_or("ID required for read")?;
            let tx = load_transaction(&conn, &id).map_err(|e| format!("Read error: {e}"))?;
            Ok(serde_json::to_value(tx).unwrap_or(serde_json::Value::Null))
        }
        "list" => {
            let profile_id = profile_id.ok_or("profile_id required for list")?;
            let bounds = match month.as_deref() {
                Some(month) => {
                    let (first, last) = month_bounds(month).map_err(|e| e.to_string())?;
                    Some((format_date(first), format_date(last)))
                }
                None => None,
            };
            let range = bounds.as_ref().map(|(from, to)| (from.as_str(), to.as_str()));
            let items = list_transactions(&conn, &profile_id, range)
                .map_err(|e| format!("Query error: {e}"))?;
            Ok(serde_json::to_value(items).unwrap_or_default())
        }
        "delete" => {
            let id = id.ok_or("ID required for delete")?;
            delete_transaction(&conn, &id).map_err(|e| format!("Delete error: {e}"))?;
            Ok(serde_json::json!({"status": "deleted"}))
        }
        _ => Err(format!("Unknown operation: {operation}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::db::test_connection;

    fn tx(id: &str, kind: TransactionKind, date: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            profile_id: "p1".to_string(),
            kind,
            amount: 42.0,
            description: "groceries".to_string(),
            date: date.to_string(),
        }
    }

    #[test]
    fn month_range_filters_and_orders_newest_first() {
        let conn = test_connection();
        insert_transaction(&conn, &tx("a", TransactionKind::Expense, "2024-02-28")).unwrap();
        insert_transaction(&conn, &tx("b", TransactionKind::Income, "2024-03-01")).unwrap();
        insert_transaction(&conn, &tx("c", TransactionKind::Expense, "2024-03-15")).unwrap();

        let march: Vec<String> = list_transactions(&conn, "p1", Some(("2024-03-01", "2024-03-31")))
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(march, vec!["c".to_string(), "b".to_string()]);
        assert_eq!(list_transactions(&conn, "p1", None).unwrap().len(), 3);
    }

    #[test]
    fn kind_is_stored_as_type_column() {
        let conn = test_connection();
        insert_transaction(&conn, &tx("a", TransactionKind::Income, "2024-02-28")).unwrap();
        let raw: String = conn
            .query_row("SELECT type FROM transactions WHERE id = 'a'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(raw, "income");
        assert_eq!(load_transaction(&conn, "a").unwrap().unwrap().kind, TransactionKind::Income);
    }

    #[test]
    fn serializes_kind_under_type_key() {
        let value = serde_json::to_value(tx("a", TransactionKind::Expense, "2024-01-01")).unwrap();
        assert_eq!(value["type"], serde_json::json!("expense"));
        assert_eq!(value["profileId"], serde_json::json!("p1"));
    }
}
