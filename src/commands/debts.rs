use crate::commands::bills::list_bills_for_debt;
use crate::commands::db::get_db_connection;
use crate::commands::settings::load_effective_settings;
use crate::error::VidaError;
use crate::finance::installments::{generate_installment_bills, regenerate_installment_bills};
use crate::finance::payments::record_debt_payment_with_conn;
use crate::finance::validation::validate_debt;
use crate::models::bill::Bill;
use crate::models::debt::{Debt, DebtPayment};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

const DEBT_COLUMNS: &str = "id, profile_id, name, lender, total_balance, interest_rate, priority, category, installment_count, installment_amount, first_due_date, payments";

fn debt_from_row(row: &Row<'_>) -> Result<Debt> {
    let payments_json: String = row.get(11)?;
    let payments: Vec<DebtPayment> = serde_json::from_str(&payments_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(11, Type::Text, e.into()))?;

    Ok(Debt {
        id: row.get(0)?,
        profile_id: row.get(1)?,
        name: row.get(2)?,
        lender: row.get(3)?,
        total_balance: row.get(4)?,
        interest_rate: row.get(5)?,
        priority: row.get(6)?,
        category: row.get(7)?,
        installment_count: row.get(8)?,
        installment_amount: row.get(9)?,
        first_due_date: row.get(10)?,
        payments,
    })
}

fn payments_to_json(payments: &[DebtPayment]) -> Result<String> {
    serde_json::to_string(payments).map_err(|e| rusqlite::Error::ToSqlConversionFailure(e.into()))
}

pub fn insert_debt(conn: &Connection, debt: &Debt) -> Result<()> {
    let payments = payments_to_json(&debt.payments)?;
    conn.execute(
        "INSERT INTO debts (id, profile_id, name, lender, total_balance, interest_rate, priority, category, installment_count, installment_amount, first_due_date, payments) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
        params![&debt.id, &debt.profile_id, &debt.name, &debt.lender, debt.total_balance, debt.interest_rate, debt.priority, &debt.category, debt.installment_count, debt.installment_amount, debt.first_due_date.as_deref(), payments],
    )?;
    Ok(())
}

pub fn update_debt(conn: &Connection, debt: &Debt) -> Result<usize> {
    let payments = payments_to_json(&debt.payments)?;
    conn.execute(
        "UPDATE debts SET name=?2, lender=?3, total_balance=?4, interest_rate=?5, priority=?6, category=?7, installment_count=?8, installment_amount=?9, first_due_date=?10, payments=?11 WHERE id=?1",
        params![&debt.id, &debt.name, &debt.lender, debt.total_balance, debt.interest_rate, debt.priority, &debt.category, debt.installment_count, debt.installment_amount, debt.first_due_date.as_deref(), payments],
    )
}

pub fn load_debt(conn: &Connection, id: &str) -> Result<Option<Debt>> {
    conn.query_row(
        &format!("SELECT {DEBT_COLUMNS} FROM debts WHERE id = ?1"),
        params![id],
        debt_from_row,
    )
    .optional()
}

/// Ordered by user priority, then by the costliest interest.
pub fn list_debts(conn: &Connection, profile_id: &str) -> Result<Vec<Debt>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DEBT_COLUMNS} FROM debts WHERE profile_id = ?1 ORDER BY priority ASC, COALESCE(interest_rate, 0) DESC, name ASC"
    ))?;
    let debts = stmt
        .query_map(params![profile_id], debt_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(debts)
}

/// Deletes the debt and its unpaid installments. Paid installments stay as
/// history and keep their `debt_id`.
pub fn delete_debt(conn: &Connection, id: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM bills WHERE debt_id = ?1 AND is_paid = 0", params![id])?;
    tx.execute("DELETE FROM debts WHERE id = ?1", params![id])?;
    tx.commit()
}

#[cfg_attr(feature = "desktop", tauri::command)]
pub async fn debt_crud(
    data_dir: String,
    operation: String,
    item: Option<Debt>,
    id: Option<String>,
    profile_id: Option<String>,
) -> Result<serde_json::Value, String> {
    let conn = get_db_connection(&data_dir).map_err(|e| format!("DB error: {e}"))?;

    match operation.as_str() {
        "create" => {
            let mut item = item.ok_or("Item required for create")?;
            if item.category.trim().is_empty() {
                item.category = load_effective_settings(&data_dir)?.default_debt_category;
            }
            validate_debt(&item).map_err(|e| e.to_string())?;
            insert_debt(&conn, &item).map_err(|e| format!("Insert error: {e}"))?;
            Ok(serde_json::json!({"status": "created", "id": item.id}))
        }
        "update" => {
            let item = item.ok_or("Item required for update")?;
            validate_debt(&item).map_err(|e| e.to_string())?;
            let changed = update_debt(&conn, &item).map_err(|e| format!("Update error: {e}"))?;
            if changed == 0 {
                return Err(VidaError::not_found("debt", &item.id).to_string());
            }
            Ok(serde_json::json!({"status": "updated", "id": item.id}))
        }
        "read" => {
            let id = id.ok_or("ID required for read")?;
            let debt = load_debt(&conn, &id).map_err(|e| format!("Read error: {e}"))?;
            Ok(serde_json::to_value(debt).unwrap_or(serde_json::Value::Null))
        }
        "list" => {
            let profile_id = profile_id.ok_or("profile_id required for list")?;
            let debts = list_debts(&conn, &profile_id).map_err(|e| format!("Query error: {e}"))?;
            Ok(serde_json::to_value(debts).unwrap_or_default())
        }
        "delete" => {
            let id = id.ok_or("ID required for delete")?;
            delete_debt(&conn, &id).map_err(|e| format!("Delete error: {e}"))?;
            Ok(serde_json::json!({"status": "deleted"}))
        }
        _ => Err(format!("Unknown operation: {operation}")),
    }
}

#[cfg_attr(feature = "desktop", tauri::command)]
pub async fn generate_installments(
    data_dir: String,
    debt_id: String,
    regenerate: Option<bool>,
) -> Result<Vec<Bill>, String> {
    let conn = get_db_connection(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    let result = if regenerate.unwrap_or(false) {
        regenerate_installment_bills(&conn, &debt_id)
    } else {
        generate_installment_bills(&conn, &debt_id)
    };
    result.map_err(|e| e.to_string())
}

#[cfg_attr(feature = "desktop", tauri::command)]
pub async fn get_debt_installments(data_dir: String, debt_id: String) -> Result<Vec<Bill>, String> {
    let conn = get_db_connection(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    list_bills_for_debt(&conn, &debt_id).map_err(|e| format!("Query error: {e}"))
}

#[cfg_attr(feature = "desktop", tauri::command)]
pub async fn record_debt_payment(
    data_dir: String,
    debt_id: String,
    amount: f64,
    date: Option<String>,
) -> Result<Debt, String> {
    let conn = get_db_connection(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    record_debt_payment_with_conn(&conn, &debt_id, amount, date.as_deref()).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::bills::{insert_bill, load_bill};
    use crate::commands::db::test_connection;

    fn debt(id: &str, priority: i64, rate: Option<f64>) -> Debt {
        Debt {
            id: id.to_string(),
            profile_id: "p1".to_string(),
            name: format!("Debt {id}"),
            lender: "Itaú".to_string(),
            total_balance: 1200.0,
            interest_rate: rate,
            priority,
            category: "credit_card".to_string(),
            installment_count: None,
            installment_amount: None,
            first_due_date: None,
            payments: vec![],
        }
    }

    fn installment(id: &str, debt_id: &str, is_paid: bool) -> Bill {
        Bill {
            id: id.to_string(),
            profile_id: "p1".to_string(),
            name: "Debt (1/2)".to_string(),
            recipient: "Itaú".to_string(),
            amount: 600.0,
            due_date: "2024-01-10".to_string(),
            is_paid,
            category: None,
            debt_id: Some(debt_id.to_string()),
            recurring_id: None,
        }
    }

    #[test]
    fn payment_history_round_trips_through_json_column() {
        let conn = test_connection();
        let mut d = debt("d1", 1, Some(3.5));
        d.payments.push(DebtPayment {
            date: "2024-02-01".to_string(),
            amount: 100.0,
        });
        insert_debt(&conn, &d).unwrap();

        let loaded = load_debt(&conn, "d1").unwrap().expect("debt exists");
        assert_eq!(loaded, d);
        assert_eq!(loaded.total_paid(), 100.0);
    }

    #[test]
    fn list_orders_by_priority_then_interest() {
        let conn = test_connection();
        insert_debt(&conn, &debt("cheap", 1, Some(2.0))).unwrap();
        insert_debt(&conn, &debt("costly", 1, Some(12.0))).unwrap();
        insert_debt(&conn, &debt("later", 2, Some(30.0))).unwrap();

        let ids: Vec<String> = list_debts(&conn, "p1").unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["costly".to_string(), "cheap".to_string(), "later".to_string()]);
    }

    #[test]
    fn delete_keeps_paid_installments_as_history() {
        let conn = test_connection();
        insert_debt(&conn, &debt("d1", 1, None)).unwrap();
        insert_bill(&conn, &installment("paid", "d1", true)).unwrap();
        insert_bill(&conn, &installment("open", "d1", false)).unwrap();

        delete_debt(&conn, "d1").unwrap();

        assert!(load_debt(&conn, "d1").unwrap().is_none());
        assert!(load_bill(&conn, "paid").unwrap().is_some());
        assert!(load_bill(&conn, "open").unwrap().is_none());
    }

    #[test]
    fn unreadable_payment_history_is_an_error_not_an_empty_list() {
        let conn = test_connection();
        insert_debt(&conn, &debt("d1", 1, None)).unwrap();
        let corrupt = r#"[{"date":"2024-01-01","amount":"10"}]"#;
        conn.execute("UPDATE debts SET payments = ?1 WHERE id = 'd1'", params![corrupt])
            .unwrap();

        assert!(matches!(
            load_debt(&conn, "d1"),
            Err(rusqlite::Error::FromSqlConversionFailure(11, Type::Text, _))
        ));
        assert!(list_debts(&conn, "p1").is_err());
        assert!(record_debt_payment_with_conn(&conn, "d1", 5.0, Some("2024-02-01")).is_err());

        let stored: String = conn
            .query_row("SELECT payments FROM debts WHERE id = 'd1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(stored, corrupt);
    }
}
