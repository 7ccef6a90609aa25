pub mod calendar;
pub mod installments;
pub mod payments;
pub mod recurrence;
pub mod summary;
pub mod validation;
