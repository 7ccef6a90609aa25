use crate::commands::bills::list_bills_between;
use crate::commands::debts::list_debts;
use crate::commands::profiles::load_profile;
use crate::commands::transactions::list_transactions;
use crate::error::{Result, VidaError};
use crate::finance::calendar::{format_date, month_bounds};
use crate::finance::installments::{from_cents, to_cents};
use crate::models::summary::MonthlySummary;
use crate::models::transaction::TransactionKind;
use chrono::NaiveDate;
use rusqlite::Connection;

fn out_of_range() -> VidaError {
    VidaError::invalid("amount", "monthly totals exceed the supported range")
}

fn add_cents(total: i64, amount: f64) -> Result<i64> {
    total.checked_add(to_cents(amount)).ok_or_else(out_of_range)
}

pub fn monthly_summary(
    conn: &Connection,
    profile_id: &str,
    month: &str,
    today: NaiveDate,
) -> Result<MonthlySummary> {
    let profile = load_profile(conn, profile_id)?.ok_or_else(|| VidaError::not_found("profile", profile_id))?;
    let (first, last) = month_bounds(month)?;
    let (from, to) = (format_date(first), format_date(last));
    let today = format_date(today);

    let mut income_cents = 0i64;
    let mut expense_cents = 0i64;
    for tx in list_transactions(conn, profile_id, Some((from.as_str(), to.as_str())))? {
        let total = match tx.kind {
            TransactionKind::Income => &mut income_cents,
            TransactionKind::Expense => &mut expense_cents,
        };
        *total = add_cents(*total, tx.amount)?;
    }

    let bills = list_bills_between(conn, profile_id, &from, &to)?;
    let bills_paid = bills.iter().filter(|b| b.is_paid).count();
    let unpaid_cents = bills
        .iter()
        .filter(|b| !b.is_paid)
        .try_fold(0i64, |sum, b| add_cents(sum, b.amount))?;
    // ISO dates compare correctly as strings.
    let overdue_count = bills
        .iter()
        .filter(|b| !b.is_paid && b.due_date.as_str() < today.as_str())
        .count();

    let debt_cents = list_debts(conn, profile_id)?
        .iter()
        .try_fold(0i64, |sum, d| add_cents(sum, d.total_balance))?;
    let net_cents = income_cents.checked_sub(expense_cents).ok_or_else(out_of_range)?;

    Ok(MonthlySummary {
        profile_id: profile_id.to_string(),
        month: month.trim().to_string(),
        income: from_cents(income_cents),
        expense: from_cents(expense_cents),
        net: from_cents(net_cents),
        bills_due: bills.len(),
        bills_paid,
        unpaid_total: from_cents(unpaid_cents),
        overdue_count,
        total_debt: from_cents(debt_cents),
        available_funds: profile.available_funds(),
    })
}
