use crate::error::{Result, VidaError};
use crate::finance::calendar::parse_date;
use crate::models::bill::Bill;
use crate::models::debt::Debt;
use crate::models::recurring_bill::{Recurrence, RecurringBill};
use crate::models::transaction::Transaction;

/// Fifty years of monthly installments.
pub const MAX_INSTALLMENTS: u32 = 600;

pub fn validate_amount(field: &'static str, amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(VidaError::invalid(field, format!("{amount} must be greater than zero")));
    }
    Ok(())
}

pub fn validate_balance(field: &'static str, balance: f64) -> Result<()> {
    if !balance.is_finite() || balance < 0.0 {
        return Err(VidaError::invalid(field, format!("{balance} must not be negative")));
    }
    Ok(())
}

fn require_text(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(VidaError::invalid(field, "must not be empty"));
    }
    Ok(())
}

pub fn validate_bill(bill: &Bill) -> Result<()> {
    require_text("id", &bill.id)?;
    require_text("profileId", &bill.profile_id)?;
    require_text("name", &bill.name)?;
    validate_amount("amount", bill.amount)?;
    parse_date(&bill.due_date)?;
    Ok(())
}

pub fn validate_transaction(tx: &Transaction) -> Result<()> {
    require_text("id", &tx.id)?;
    require_text("profileId", &tx.profile_id)?;
    validate_amount("amount", tx.amount)?;
    parse_date(&tx.date)?;
    Ok(())
}

pub fn validate_debt(debt: &Debt) -> Result<()> {
    require_text("id", &debt.id)?;
    require_text("profileId", &debt.profile_id)?;
    require_text("name", &debt.name)?;
    validate_balance("totalBalance", debt.total_balance)?;
    if let Some(rate) = debt.interest_rate {
        validate_balance("interestRate", rate)?;
    }
    if let Some(count) = debt.installment_count {
        if !(1..=MAX_INSTALLMENTS).contains(&count) {
            return Err(VidaError::invalid(
                "installmentCount",
                format!("{count} is outside 1..={MAX_INSTALLMENTS}"),
            ));
        }
    }
    if let Some(amount) = debt.installment_amount {
        validate_amount("installmentAmount", amount)?;
    }
    if let Some(first_due) = &debt.first_due_date {
        parse_date(first_due)?;
    }
    Ok(())
}

pub fn validate_recurring_bill(rb: &RecurringBill) -> Result<()> {
    require_text("id", &rb.id)?;
    require_text("profileId", &rb.profile_id)?;
    require_text("name", &rb.name)?;
    validate_amount("amount", rb.amount)?;

    let day_range = match rb.frequency {
        Recurrence::Weekly => 1..=7,
        Recurrence::Monthly | Recurrence::Yearly => 1..=31,
    };
    if !day_range.contains(&rb.due_day) {
        return Err(VidaError::invalid(
            "dueDay",
            format!("{} is outside {:?} for {} bills", rb.due_day, day_range, rb.frequency.as_str()),
        ));
    }

    if rb.frequency == Recurrence::Yearly {
        match rb.due_month {
            Some(month) if (1..=12).contains(&month) => {}
            _ => return Err(VidaError::invalid("dueMonth", "yearly bills need a month between 1 and 12")),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debt_with_count(count: Option<u32>) -> Debt {
        Debt {
            id: "d1".to_string(),
            profile_id: "p1".to_string(),
            name: "Financiamento".to_string(),
            lender: "Banco".to_string(),
            total_balance: 1000.0,
            interest_rate: None,
            priority: 1,
            category: "loan".to_string(),
            installment_count: count,
            installment_amount: Some(10.0),
            first_due_date: Some("2024-01-10".to_string()),
            payments: vec![],
        }
    }

    fn recurring(frequency: Recurrence, due_day: u32, due_month: Option<u32>) -> RecurringBill {
        RecurringBill {
            id: "r1".to_string(),
            profile_id: "p1".to_string(),
            name: "Internet".to_string(),
            recipient: "ISP".to_string(),
            amount: 99.9,
            category: None,
            frequency,
            due_day,
            due_month,
            is_active: true,
        }
    }

    #[test]
    fn amounts_must_be_positive_and_finite() {
        assert!(validate_amount("amount", 10.0).is_ok());
        assert!(validate_amount("amount", 0.0).is_err());
        assert!(validate_amount("amount", f64::NAN).is_err());
        assert!(validate_balance("balance", 0.0).is_ok());
    }

    #[test]
    fn due_day_range_depends_on_frequency() {
        assert!(validate_recurring_bill(&recurring(Recurrence::Weekly, 7, None)).is_ok());
        assert!(validate_recurring_bill(&recurring(Recurrence::Weekly, 8, None)).is_err());
        assert!(validate_recurring_bill(&recurring(Recurrence::Monthly, 31, None)).is_ok());
        assert!(validate_recurring_bill(&recurring(Recurrence::Yearly, 10, None)).is_err());
        assert!(validate_recurring_bill(&recurring(Recurrence::Yearly, 10, Some(3))).is_ok());
    }

    #[test]
    fn installment_count_is_bounded() {
        assert!(validate_debt(&debt_with_count(None)).is_ok());
        assert!(validate_debt(&debt_with_count(Some(1))).is_ok());
        assert!(validate_debt(&debt_with_count(Some(MAX_INSTALLMENTS))).is_ok());
        assert!(validate_debt(&debt_with_count(Some(0))).is_err());
        assert!(validate_debt(&debt_with_count(Some(MAX_INSTALLMENTS + 1))).is_err());
        assert!(validate_debt(&debt_with_count(Some(4_000_000_000))).is_err());
    }
}
