use crate::commands::bills::insert_bill_if_absent;
use crate::commands::recurring::list_recurring_bills;
use crate::error::Result;
use crate::finance::calendar::{clamped_date, format_date, parse_month};
use crate::models::bill::Bill;
use crate::models::recurring_bill::{Recurrence, RecurringBill};
use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;

/// Dates in `year`/`month` on which `template` falls due.
pub fn occurrences_in_month(template: &RecurringBill, year: i32, month: u32) -> Vec<NaiveDate> {
    match template.frequency {
        Recurrence::Monthly => clamped_date(year, month, template.due_day).into_iter().collect(),
        Recurrence::Yearly => {
            if template.due_month == Some(month) {
                clamped_date(year, month, template.due_day).into_iter().collect()
            } else {
                Vec::new()
            }
        }
        Recurrence::Weekly => {
            let Some(first) = clamped_date(year, month, 1) else {
                return Vec::new();
            };
            first
                .iter_days()
                .take_while(|day| day.month() == month)
                .filter(|day| day.weekday().number_from_monday() == template.due_day)
                .collect()
        }
    }
}

fn bill_for_occurrence(template: &RecurringBill, due_date: NaiveDate) -> Bill {
    Bill {
        id: uuid::Uuid::new_v4().to_string(),
        profile_id: template.profile_id.clone(),
        name: template.name.clone(),
        recipient: template.recipient.clone(),
        amount: template.amount,
        due_date: format_date(due_date),
        is_paid: false,
        category: template.category.clone(),
        debt_id: None,
        recurring_id: Some(template.id.clone()),
    }
}

/// Creates the bills every active template of `profile_id` owes in `month`
/// (`YYYY-MM`). Occurrences that already have a bill are skipped, so calling
/// this repeatedly only returns what was newly created.
pub fn generate_recurring_bills(conn: &Connection, profile_id: &str, month: &str) -> Result<Vec<Bill>> {
    let (year, month_number) = parse_month(month)?;

    let templates = list_recurring_bills(conn, profile_id, true)?;
    let mut created = Vec::new();

    let tx = conn.unchecked_transaction()?;
    for template in &templates {
        for due_date in occurrences_in_month(template, year, month_number) {
            let bill = bill_for_occurrence(template, due_date);
            if insert_bill_if_absent(&tx, &bill)? {
                created.push(bill);
            }
        }
    }
    tx.commit()?;

    log::info!(
        "generated {} recurring bills for profile {profile_id} in {month} from {} templates",
        created.len(),
        templates.len()
    );
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::db::test_connection;
    use crate::commands::recurring::insert_recurring_bill;
    use crate::finance::calendar::parse_date;

    fn template(id: &str, frequency: Recurrence, due_day: u32, due_month: Option<u32>) -> RecurringBill {
        RecurringBill {
            id: id.to_string(),
            profile_id: "p1".to_string(),
            name: format!("Template {id}"),
            recipient: "Someone".to_string(),
            amount: 50.0,
            category: Some("home".to_string()),
            frequency,
            due_day,
            due_month,
            is_active: true,
        }
    }

    #[test]
    fn monthly_due_day_clamps_to_month_end() {
        let dates = occurrences_in_month(&template("m", Recurrence::Monthly, 31, None), 2023, 2);
        assert_eq!(dates, vec![parse_date("2023-02-28").unwrap()]);
    }

    #[test]
    fn weekly_yields_every_matching_weekday() {
        // June 2024 has five Saturdays: 1, 8, 15, 22, 29.
        let dates = occurrences_in_month(&template("w", Recurrence::Weekly, 6, None), 2024, 6);
        let days: Vec<u32> = dates.iter().map(|d| d.day()).collect();
        assert_eq!(days, vec![1, 8, 15, 22, 29]);
    }

    #[test]
    fn yearly_only_fires_in_its_month() {
        let yearly = template("y", Recurrence::Yearly, 20, Some(4));
        assert!(occurrences_in_month(&yearly, 2024, 3).is_empty());
        assert_eq!(
            occurrences_in_month(&yearly, 2024, 4),
            vec![parse_date("2024-04-20").unwrap()]
        );
    }

    #[test]
    fn generation_skips_inactive_templates_and_is_idempotent() {
        let conn = test_connection();
        insert_recurring_bill(&conn, &template("rent", Recurrence::Monthly, 5, None)).unwrap();
        let mut paused = template("gym", Recurrence::Monthly, 10, None);
        paused.is_active = false;
        insert_recurring_bill(&conn, &paused).unwrap();

        let first = generate_recurring_bills(&conn, "p1", "2024-05").unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].due_date, "2024-05-05");
        assert_eq!(first[0].recurring_id.as_deref(), Some("rent"));

        let second = generate_recurring_bills(&conn, "p1", "2024-05").unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn rejects_malformed_month() {
        let conn = test_connection();
        assert!(generate_recurring_bills(&conn, "p1", "2024-5-1").is_err());
    }
}
