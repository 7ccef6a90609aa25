use crate::commands::bills::{insert_bill, list_bills_for_debt};
use crate::commands::db::immediate_transaction;
use crate::commands::debts::load_debt;
use crate::error::{Result, VidaError};
use crate::finance::calendar::{add_months_clamped, format_date, parse_date};
use crate::finance::validation::MAX_INSTALLMENTS;
use crate::models::bill::Bill;
use crate::models::debt::Debt;
use chrono::NaiveDate;
use rusqlite::{params, Connection};

/// One row of an installment schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledInstallment {
    pub number: u32, // 1-based
    pub due_date: NaiveDate,
    pub amount_cents: i64,
}

pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Fixed monthly payment for `principal` over `count` months at `annual_rate`
/// percent (Price table).
pub fn amortized_payment(principal: f64, annual_rate: f64, count: u32) -> f64 {
    let r = annual_rate / 12.0 / 100.0;
    let n = count as f64;
    if r <= 0.0 {
        return principal / n;
    }
    principal * r / (1.0 - (1.0 + r).powf(-n))
}

/// Schedules installments `skip + 1 ..= count` for a debt whose remaining
/// balance is `total_balance`. Without a fixed amount it is spread over the
/// remaining installments and the last one takes the rounding remainder.
pub fn schedule_installments(debt: &Debt, skip: u32) -> Result<Vec<ScheduledInstallment>> {
    let plan = debt
        .installment_plan()
        .ok_or_else(|| VidaError::NoInstallmentPlan(debt.id.clone()))?;
    if plan.count > MAX_INSTALLMENTS {
        return Err(VidaError::invalid(
            "installmentCount",
            format!("{} is above the limit of {MAX_INSTALLMENTS}", plan.count),
        ));
    }
    let first_due = parse_date(&plan.first_due_date)?;

    if skip >= plan.count {
        return Ok(Vec::new());
    }
    let remaining = plan.count - skip;

    let amounts = match plan.amount {
        Some(fixed) => vec![to_cents(fixed); remaining as usize],
        None => {
            let (total_cents, base_cents) = match debt.interest_rate {
                Some(rate) if rate > 0.0 => {
                    let payment = amortized_payment(debt.total_balance, rate, remaining);
                    (to_cents(payment * remaining as f64), to_cents(payment))
                }
                _ => {
                    let total = to_cents(debt.total_balance);
                    (total, total / remaining as i64)
                }
            };
            if total_cents <= 0 {
                return Err(VidaError::invalid("totalBalance", "nothing left to split into installments"));
            }
            split_cents(total_cents, base_cents, remaining)
        }
    };
    if amounts.iter().any(|cents| *cents <= 0) {
        return Err(VidaError::invalid(
            "totalBalance",
            format!("too small to split into {remaining} installments of at least 0.01"),
        ));
    }

    let mut schedule = Vec::with_capacity(remaining as usize);
    for (offset, amount_cents) in (skip..plan.count).zip(amounts) {
        let due_date = add_months_clamped(first_due, offset)
            .ok_or_else(|| VidaError::invalid("firstDueDate", "schedule runs past the supported calendar"))?;
        schedule.push(ScheduledInstallment {
            number: offset + 1,
            due_date,
            amount_cents,
        });
    }
    Ok(schedule)
}

fn split_cents(total_cents: i64, base_cents: i64, parts: u32) -> Vec<i64> {
    let mut amounts = vec![base_cents; parts as usize];
    if let Some(last) = amounts.last_mut() {
        *last = total_cents - base_cents * (parts as i64 - 1);
    }
    amounts
}

pub fn installment_bills(debt: &Debt, schedule: &[ScheduledInstallment]) -> Vec<Bill> {
    let count = debt.installment_count.unwrap_or(schedule.len() as u32);
    schedule
        .iter()
        .map(|item| Bill {
            id: uuid::Uuid::new_v4().to_string(),
            profile_id: debt.profile_id.clone(),
            name: format!("{} ({}/{})", debt.name, item.number, count),
            recipient: debt.lender.clone(),
            amount: from_cents(item.amount_cents),
            due_date: format_date(item.due_date),
            is_paid: false,
            category: Some(debt.category.clone()),
            debt_id: Some(debt.id.clone()),
            recurring_id: None,
        })
        .collect()
}

fn load_planned_debt(conn: &Connection, debt_id: &str) -> Result<Debt> {
    let debt = load_debt(conn, debt_id)?.ok_or_else(|| VidaError::not_found("debt", debt_id))?;
    if debt.installment_plan().is_none() {
        return Err(VidaError::NoInstallmentPlan(debt.id));
    }
    Ok(debt)
}

/// Expands a debt's installment plan into unpaid bills. When the debt already
/// has installment bills they are returned as they are.
pub fn generate_installment_bills(conn: &Connection, debt_id: &str) -> Result<Vec<Bill>> {
    let tx = immediate_transaction(conn)?;
    let debt = load_planned_debt(&tx, debt_id)?;

    let existing = list_bills_for_debt(&tx, debt_id)?;
    if !existing.is_empty() {
        log::debug!("debt {debt_id} already has {} installment bills", existing.len());
        return Ok(existing);
    }

    let schedule = schedule_installments(&debt, 0)?;
    let bills = installment_bills(&debt, &schedule);
    for bill in &bills {
        insert_bill(&tx, bill)?;
    }
    tx.commit()?;

    log::info!("generated {} installment bills for debt {debt_id}", bills.len());
    Ok(bills)
}

/// Replaces the unpaid installments of a debt, continuing the numbering after
/// the installments already paid and spreading the current balance over what
/// is left of the plan.
pub fn regenerate_installment_bills(conn: &Connection, debt_id: &str) -> Result<Vec<Bill>> {
    let tx = immediate_transaction(conn)?;
    let debt = load_planned_debt(&tx, debt_id)?;

    let paid_count = list_bills_for_debt(&tx, debt_id)?
        .iter()
        .filter(|bill| bill.is_paid)
        .count() as u32;

    let schedule = schedule_installments(&debt, paid_count)?;
    let bills = installment_bills(&debt, &schedule);

    let removed = tx.execute(
        "DELETE FROM bills WHERE debt_id = ?1 AND is_paid = 0",
        params![debt_id],
    )?;
    for bill in &bills {
        insert_bill(&tx, bill)?;
    }
    tx.commit()?;

    log::info!(
        "regenerated installments for debt {debt_id}: removed {removed}, created {}, kept {paid_count} paid",
        bills.len()
    );
    Ok(bills)
}
