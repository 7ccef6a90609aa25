use crate::commands::db::get_db_connection;
use crate::error::VidaError;
use crate::finance::validation::validate_balance;
use crate::models::profile::{ActiveProfile, UserProfile};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use std::sync::{Arc, Mutex};

const PROFILE_COLUMNS: &str = "id, email, created_at, cash_balance, pix_balance";

fn profile_from_row(row: &Row<'_>) -> Result<UserProfile> {
    Ok(UserProfile {
        id: row.get(0)?,
        email: row.get(1)?,
        created_at: row.get(2)?,
        cash_balance: row.get(3)?,
        pix_balance: row.get(4)?,
    })
}

pub fn insert_profile(conn: &Connection, profile: &UserProfile) -> Result<()> {
    conn.execute(
        "INSERT INTO profiles (id, email, created_at, cash_balance, pix_balance) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&profile.id, profile.email.as_deref(), &profile.created_at, profile.cash_balance, profile.pix_balance],
    )?;
    Ok(())
}

pub fn update_profile(conn: &Connection, profile: &UserProfile) -> Result<usize> {
    conn.execute(
        "UPDATE profiles SET email=?2, cash_balance=?3, pix_balance=?4 WHERE id=?1",
        params![&profile.id, profile.email.as_deref(), profile.cash_balance, profile.pix_balance],
    )
}

pub fn load_profile(conn: &Connection, id: &str) -> Result<Option<UserProfile>> {
    conn.query_row(
        &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
        params![id],
        profile_from_row,
    )
    .optional()
}

pub fn list_profiles(conn: &Connection) -> Result<Vec<UserProfile>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at ASC"
    ))?;
    let profiles = stmt
        .query_map([], profile_from_row)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(profiles)
}

/// Removes a profile together with every record it owns.
pub fn delete_profile(conn: &Connection, id: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    for table in ["bills", "transactions", "debts", "recurring_bills"] {
        tx.execute(&format!("DELETE FROM {table} WHERE profile_id = ?1"), params![id])?;
    }
    tx.execute("DELETE FROM profiles WHERE id = ?1", params![id])?;
    tx.commit()
}

#[cfg_attr(feature = "desktop", tauri::command)]
pub async fn create_local_profile(data_dir: String, email: Option<String>) -> Result<UserProfile, String> {
    let conn = get_db_connection(&data_dir).map_err(|e| format!("DB error: {e}"))?;
    let email = email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
    let profile = UserProfile::new_local(email);
    insert_profile(&conn, &profile).map_err(|e| format!("Insert error: {e}"))?;
    log::info!("created local profile {}", profile.id);
    Ok(profile)
}

#[cfg(feature = "desktop")]
#[tauri::command]
pub async fn profile_crud(
    data_dir: String,
    operation: String,
    item: Option<UserProfile>,
    id: Option<String>,
    state: tauri::State<'_, Arc<Mutex<ActiveProfile>>>,
) -> Result<serde_json::Value, String> {
    profile_crud_internal(&data_dir, &operation, item, id, state.inner())
}

pub fn profile_crud_internal(
    data_dir: &str,
    operation: &str,
    item: Option<UserProfile>,
    id: Option<String>,
    active: &Arc<Mutex<ActiveProfile>>,
) -> Result<serde_json::Value, String> {
    let conn = get_db_connection(data_dir).map_err(|e| format!("DB error: {e}"))?;

    match operation {
        "create" => {
            let item = item.ok_or("Item required for create")?;
            validate_profile_balances(&item)?;
            insert_profile(&conn, &item).map_err(|e| format!("Insert error: {e}"))?;
            Ok(serde_json::json!({"status": "created", "id": item.id}))
        }
        "update" => {
            let item = item.ok_or("Item required for update")?;
            validate_profile_balances(&item)?;
            let changed = update_profile(&conn, &item).map_err(|e| format!("Update error: {e}"))?;
            if changed == 0 {
                return Err(VidaError::not_found("profile", &item.id).to_string());
            }
            sync_active_profile(active, &item.id, Some(&item))?;
            Ok(serde_json::json!({"status": "updated", "id": item.id}))
        }
        "read" => {
            let id = id.ok_or("ID required for read")?;
            let profile = load_profile(&conn, &id).map_err(|e| format!("Read error: {e}"))?;
            Ok(serde_json::to_value(profile).unwrap_or(serde_json::Value::Null))
        }
        "list" => {
            let profiles = list_profiles(&conn).map_err(|e| format!("Query error: {e}"))?;
            Ok(serde_json::to_value(profiles).unwrap_or_default())
        }
        "delete" => {
            let id = id.ok_or("ID required for delete")?;
            delete_profile(&conn, &id).map_err(|e| format!("Delete error: {e}"))?;
            sync_active_profile(active, &id, None)?;
            log::info!("deleted profile {id} and its records");
            Ok(serde_json::json!({"status": "deleted"}))
        }
        _ => Err(format!("Unknown operation: {operation}")),
    }
}

fn validate_profile_balances(profile: &UserProfile) -> Result<(), String> {
    if let Some(cash) = profile.cash_balance {
        validate_balance("cashBalance", cash).map_err(|e| e.to_string())?;
    }
    if let Some(pix) = profile.pix_balance {
        validate_balance("pixBalance", pix).map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Replaces (or with `None`, clears) the active profile when it is `id`.
fn sync_active_profile(
    state: &Arc<Mutex<ActiveProfile>>,
    id: &str,
    stored: Option<&UserProfile>,
) -> Result<(), String> {
    let mut active = state.lock().map_err(|_| "Active profile lock error".to_string())?;
    if active.profile.as_ref().is_some_and(|profile| profile.id == id) {
        active.profile = stored.cloned();
    }
    Ok(())
}

#[cfg(feature = "desktop")]
#[tauri::command]
pub async fn update_profile_balances(
    data_dir: String,
    id: String,
    cash_balance: Option<f64>,
    pix_balance: Option<f64>,
    state: tauri::State<'_, Arc<Mutex<ActiveProfile>>>,
) -> Result<UserProfile, String> {
    update_profile_balances_internal(&data_dir, &id, cash_balance, pix_balance, state.inner())
}

pub fn update_profile_balances_internal(
    data_dir: &str,
    id: &str,
    cash_balance: Option<f64>,
    pix_balance: Option<f64>,
    active: &Arc<Mutex<ActiveProfile>>,
) -> Result<UserProfile, String> {
    let conn = get_db_connection(data_dir).map_err(|e| format!("DB error: {e}"))?;
    let mut profile = load_profile(&conn, id)
        .map_err(|e| format!("Read error: {e}"))?
        .ok_or_else(|| VidaError::not_found("profile", id).to_string())?;

    profile.cash_balance = cash_balance;
    profile.pix_balance = pix_balance;
    validate_profile_balances(&profile)?;
    update_profile(&conn, &profile).map_err(|e| format!("Update error: {e}"))?;
    sync_active_profile(active, id, Some(&profile))?;
    Ok(profile)
}

#[cfg(feature = "desktop")]
#[tauri::command]
pub async fn set_active_profile(
    data_dir: String,
    id: Option<String>,
    state: tauri::State<'_, Arc<Mutex<ActiveProfile>>>,
) -> Result<Option<UserProfile>, String> {
    set_active_profile_internal(&data_dir, id.as_deref(), state.inner())
}

#[cfg(feature = "desktop")]
#[tauri::command]
pub async fn get_active_profile(
    state: tauri::State<'_, Arc<Mutex<ActiveProfile>>>,
) -> Result<Option<UserProfile>, String> {
    get_active_profile_internal(state.inner())
}

/// Selects (or with `None`, clears) the active profile. The stored row is
/// reloaded so the state reflects the latest balances.
pub fn set_active_profile_internal(
    data_dir: &str,
    id: Option<&str>,
    state: &Arc<Mutex<ActiveProfile>>,
) -> Result<Option<UserProfile>, String> {
    let profile = match id {
        Some(id) => {
            let conn = get_db_connection(data_dir).map_err(|e| format!("DB error: {e}"))?;
            let profile = load_profile(&conn, id)
                .map_err(|e| format!("Read error: {e}"))?
                .ok_or_else(|| VidaError::not_found("profile", id).to_string())?;
            Some(profile)
        }
        None => None,
    };

    let mut active = state.lock().map_err(|_| "Active profile lock error".to_string())?;
    active.profile = profile.clone();
    Ok(profile)
}

pub fn get_active_profile_internal(state: &Arc<Mutex<ActiveProfile>>) -> Result<Option<UserProfile>, String> {
    let active = state.lock().map_err(|_| "Active profile lock error".to_string())?;
    Ok(active.profile.clone())
}
