use crate::commands::db::get_db_connection;
use crate::finance::calendar::{month_key, parse_date};
use crate::finance::summary::monthly_summary;
use crate::models::summary::MonthlySummary;

/// Dashboard figures for `month` (defaults to the current month).
#[cfg_attr(feature = "desktop", tauri::command)]
pub async fn get_monthly_summary(
    data_dir: String,
    profile_id: String,
    month: Option<String>,
    today: Option<String>,
) -> Result<MonthlySummary, String> {
    let today = match today {
        Some(raw) => parse_date(&raw).map_err(|e| e.to_string())?,
        None => chrono::Local::now().date_naive(),
    };
    let month = month.unwrap_or_else(|| month_key(today));

    let conn = get_db_connection(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    monthly_summary(&conn, &profile_id, &month, today).map_err(|e| e.to_string())
}
