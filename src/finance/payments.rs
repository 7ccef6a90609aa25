use crate::commands::bills::load_bill;
use crate::commands::db::immediate_transaction;
use crate::commands::debts::{load_debt, update_debt};
use crate::commands::transactions::insert_transaction;
use crate::error::{Result, VidaError};
use crate::finance::calendar::{format_date, parse_date};
use crate::finance::installments::{from_cents, to_cents};
use crate::finance::validation::validate_amount;
use crate::models::bill::PaidBill;
use crate::models::debt::{Debt, DebtPayment};
use crate::models::transaction::{Transaction, TransactionKind};
use rusqlite::{params, Connection};

fn resolve_date(raw: Option<&str>) -> Result<String> {
    match raw {
        Some(raw) => Ok(format_date(parse_date(raw)?)),
        None => Ok(format_date(chrono::Local::now().date_naive())),
    }
}

/// Appends a payment to the debt history and lowers its balance, never below
/// zero.
pub fn apply_payment(debt: &mut Debt, amount: f64, date: &str) {
    debt.payments.push(DebtPayment {
        date: date.to_string(),
        amount,
    });
    let remaining = (to_cents(debt.total_balance) - to_cents(amount)).max(0);
    debt.total_balance = from_cents(remaining);
}

/// Marks a bill paid. Installment bills also settle part of their debt, and
/// with `record_transaction` an expense is booked for the payment.
pub fn pay_bill_with_conn(
    conn: &Connection,
    bill_id: &str,
    paid_on: Option<&str>,
    record_transaction: bool,
) -> Result<PaidBill> {
    let paid_on = resolve_date(paid_on)?;

    let tx = immediate_transaction(conn)?;
    let mut bill = load_bill(&tx, bill_id)?.ok_or_else(|| VidaError::not_found("bill", bill_id))?;
    let changed = tx.execute(
        "UPDATE bills SET is_paid = 1 WHERE id = ?1 AND is_paid = 0",
        params![&bill.id],
    )?;
    if changed == 0 {
        return Err(VidaError::AlreadyPaid(bill.id));
    }
    bill.is_paid = true;

    let mut remaining_debt_balance = None;
    if let Some(debt_id) = bill.debt_id.as_deref() {
        match load_debt(&tx, debt_id)? {
            Some(mut debt) => {
                apply_payment(&mut debt, bill.amount, &paid_on);
                update_debt(&tx, &debt)?;
                remaining_debt_balance = Some(debt.total_balance);
            }
            None => log::warn!("bill {} points at missing debt {debt_id}", bill.id),
        }
    }

    let transaction_id = if record_transaction {
        let expense = Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            profile_id: bill.profile_id.clone(),
            kind: TransactionKind::Expense,
            amount: bill.amount,
            description: format!("{} ({})", bill.name, bill.recipient),
            date: paid_on.clone(),
        };
        insert_transaction(&tx, &expense)?;
        Some(expense.id)
    } else {
        None
    };

    tx.commit()?;
    log::info!("paid bill {} ({:.2}) on {paid_on}", bill.id, bill.amount);

    Ok(PaidBill {
        bill,
        paid_on,
        transaction_id,
        remaining_debt_balance,
    })
}

pub fn record_debt_payment_with_conn(
    conn: &Connection,
    debt_id: &str,
    amount: f64,
    date: Option<&str>,
) -> Result<Debt> {
    validate_amount("amount", amount)?;
    let date = resolve_date(date)?;

    let tx = immediate_transaction(conn)?;
    let mut debt = load_debt(&tx, debt_id)?.ok_or_else(|| VidaError::not_found("debt", debt_id))?;
    apply_payment(&mut debt, amount, &date);
    update_debt(&tx, &debt)?;
    tx.commit()?;

    log::info!("recorded {amount:.2} payment on debt {debt_id}, balance now {:.2}", debt.total_balance);
    Ok(debt)
}
