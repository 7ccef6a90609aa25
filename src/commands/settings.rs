use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: i64 = 2;
const SETTINGS_FILE_NAME: &str = "settings.json";

/// Typed view over the values the backend itself acts on.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveSettings {
    pub upcoming_days: u32,
    pub default_debt_category: String,
    pub record_transaction_on_pay: bool,
    pub offline_cache_enabled: bool,
    pub asset_cache_version: String,
}

#[cfg_attr(feature = "desktop", tauri::command)]
pub async fn get_settings(data_dir: String) -> Result<Value, String> {
    load_settings_from_disk(&data_dir)
}

#[cfg_attr(feature = "desktop", tauri::command)]
pub async fn save_settings(data_dir: String, settings: Value) -> Result<Value, String> {
    save_settings_to_disk(&data_dir, settings)
}

pub fn load_effective_settings(data_dir: &str) -> Result<EffectiveSettings, String> {
    let settings = load_settings_from_disk(data_dir)?;
    Ok(effective_from_value(&settings))
}

fn effective_from_value(settings: &Value) -> EffectiveSettings {
    EffectiveSettings {
        upcoming_days: settings
            .get("upcomingDays")
            .and_then(Value::as_u64)
            .unwrap_or(7)
            .clamp(1, 60) as u32,
        default_debt_category: settings
            .get("defaultDebtCategory")
            .and_then(Value::as_str)
            .unwrap_or("other")
            .to_string(),
        record_transaction_on_pay: settings
            .get("recordTransactionOnPay")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        offline_cache_enabled: settings
            .get("offlineCacheEnabled")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        asset_cache_version: settings
            .get("assetCacheVersion")
            .and_then(Value::as_str)
            .unwrap_or("1")
            .to_string(),
    }
}

pub fn load_settings_from_disk(data_dir: &str) -> Result<Value, String> {
    let path = settings_path(data_dir);
    ensure_data_dir(data_dir)?;

    let original = if path.exists() {
        let raw = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read settings.json: {e}"))?;
        serde_json::from_str::<Value>(&raw).unwrap_or_else(|e| {
            log::warn!("settings.json is not valid JSON, starting from defaults: {e}");
            json!({})
        })
    } else {
        json!({})
    };

    let migrated = migrate_settings(original.clone());
    if migrated != original || !path.exists() {
        write_settings_file(&path, &migrated)?;
    }

    Ok(migrated)
}

pub fn save_settings_to_disk(data_dir: &str, settings: Value) -> Result<Value, String> {
    let path = settings_path(data_dir);
    ensure_data_dir(data_dir)?;

    let mut merged = load_settings_from_disk(data_dir).unwrap_or_else(|_| default_settings());
    merge_settings(&mut merged, &settings);

    let migrated = migrate_settings(merged);
    write_settings_file(&path, &migrated)?;
    Ok(migrated)
}

fn settings_path(data_dir: &str) -> PathBuf {
    Path::new(data_dir).join(SETTINGS_FILE_NAME)
}

fn ensure_data_dir(data_dir: &str) -> Result<(), String> {
    fs::create_dir_all(data_dir).map_err(|e| format!("Failed to create data directory: {e}"))
}

fn write_settings_file(path: &Path, settings: &Value) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {e}"))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write settings.json: {e}"))
}

fn migrate_settings(input: Value) -> Value {
    let defaults = default_settings();
    let mut out = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Map::new()),
    };

    let version = out
        .get("schema_version")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    if version < 1 {
        rename_key(&mut out, "reminderDays", "upcomingDays");
    }

    if version < 2 {
        // V2 introduces payment bookkeeping and offline cache keys.
        ensure_key(&mut out, "recordTransactionOnPay", json!(true));
        ensure_key(&mut out, "offlineCacheEnabled", json!(true));
        ensure_key(&mut out, "assetCacheVersion", json!("1"));
    }

    deep_merge_defaults(&mut out, &defaults);
    sanitize_settings(&mut out);
    if let Some(obj) = out.as_object_mut() {
        obj.insert("schema_version".to_string(), json!(SETTINGS_SCHEMA_VERSION));
    }

    out
}

fn default_settings() -> Value {
    json!({
        "schema_version": SETTINGS_SCHEMA_VERSION,
        "currency": "BRL",
        "locale": "pt-BR",
        "theme": "system",
        "upcomingDays": 7,
        "defaultDebtCategory": "other",
        "recordTransactionOnPay": true,
        "offlineCacheEnabled": true,
        "assetCacheVersion": "1",
        "notifications": {
            "billReminders": true,
            "overdueAlerts": true
        }
    })
}

fn deep_merge_defaults(target: &mut Value, defaults: &Value) {
    let (Some(target_obj), Some(default_obj)) = (target.as_object_mut(), defaults.as_object()) else {
        return;
    };

    for (key, default_value) in default_obj {
        match target_obj.get_mut(key) {
            Some(existing) => {
                if existing.is_object() && default_value.is_object() {
                    deep_merge_defaults(existing, default_value);
                }
            }
            None => {
                target_obj.insert(key.clone(), default_value.clone());
            }
        }
    }
}

fn ensure_key(target: &mut Value, key: &str, value: Value) {
    if let Some(obj) = target.as_object_mut() {
        obj.entry(key.to_string()).or_insert(value);
    }
}

fn rename_key(target: &mut Value, from: &str, to: &str) {
    let Some(obj) = target.as_object_mut() else {
        return;
    };
    if let Some(value) = obj.remove(from) {
        obj.entry(to.to_string()).or_insert(value);
    }
}

fn merge_settings(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target_obj), Value::Object(incoming_obj)) => {
            for (key, value) in incoming_obj {
                if let Some(existing) = target_obj.get_mut(key) {
                    merge_settings(existing, value);
                } else {
                    target_obj.insert(key.clone(), value.clone());
                }
            }
        }
        (target_slot, incoming_value) => {
            *target_slot = incoming_value.clone();
        }
    }
}

fn sanitize_settings(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };

    clamp_u64(obj, "upcomingDays", 1, 60, 7);

    sanitize_enum(obj, "currency", &["BRL", "USD", "EUR"], "BRL");
    sanitize_enum(obj, "locale", &["pt-BR", "en-US", "es-ES"], "pt-BR");
    sanitize_enum(obj, "theme", &["system", "light", "dark"], "system");

    ensure_bool(obj, "recordTransactionOnPay", true);
    ensure_bool(obj, "offlineCacheEnabled", true);

    let category_ok = obj
        .get("defaultDebtCategory")
        .and_then(Value::as_str)
        .is_some_and(|value| !value.trim().is_empty());
    if !category_ok {
        obj.insert("defaultDebtCategory".to_string(), json!("other"));
    }

    let version_ok = obj
        .get("assetCacheVersion")
        .and_then(Value::as_str)
        .is_some_and(|value| !value.trim().is_empty());
    if !version_ok {
        obj.insert("assetCacheVersion".to_string(), json!("1"));
    }

    if let Some(notifications) = obj.get_mut("notifications").and_then(Value::as_object_mut) {
        ensure_bool(notifications, "billReminders", true);
        ensure_bool(notifications, "overdueAlerts", true);
    } else {
        obj.insert(
            "notifications".to_string(),
            json!({ "billReminders": true, "overdueAlerts": true }),
        );
    }
}

fn clamp_u64(map: &mut Map<String, Value>, key: &str, min: u64, max: u64, default: u64) {
    let raw = map.get(key).and_then(Value::as_u64).unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn sanitize_enum(map: &mut Map<String, Value>, key: &str, allowed: &[&str], default: &str) {
    let valid = map
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| allowed.contains(value))
        .unwrap_or(default);
    map.insert(key.to_string(), json!(valid));
}

fn ensure_bool(map: &mut Map<String, Value>, key: &str, default: bool) {
    let value = map.get(key).and_then(Value::as_bool).unwrap_or(default);
    map.insert(key.to_string(), json!(value));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrates_legacy_reminder_days_and_fills_v2_keys() {
        let migrated = migrate_settings(json!({
            "schema_version": 0,
            "reminderDays": 14,
            "currency": "USD"
        }));

        assert_eq!(migrated["upcomingDays"], json!(14));
        assert!(migrated.get("reminderDays").is_none());
        assert_eq!(migrated["currency"], json!("USD"));
        assert_eq!(migrated["recordTransactionOnPay"], json!(true));
        assert_eq!(migrated["schema_version"], json!(SETTINGS_SCHEMA_VERSION));
    }

    #[test]
    fn sanitizes_out_of_range_and_unknown_values() {
        let migrated = migrate_settings(json!({
            "schema_version": 2,
            "upcomingDays": 400,
            "currency": "DOGE",
            "theme": 3,
            "offlineCacheEnabled": "yes",
            "assetCacheVersion": ""
        }));

        assert_eq!(migrated["upcomingDays"], json!(60));
        assert_eq!(migrated["currency"], json!("BRL"));
        assert_eq!(migrated["theme"], json!("system"));
        assert_eq!(migrated["offlineCacheEnabled"], json!(true));
        assert_eq!(migrated["assetCacheVersion"], json!("1"));
    }

    #[test]
    fn merges_partial_settings_without_losing_existing_values() {
        let mut existing = default_settings();
        merge_settings(&mut existing, &json!({ "notifications": { "overdueAlerts": false } }));
        let migrated = migrate_settings(existing);

        assert_eq!(migrated["notifications"]["overdueAlerts"], json!(false));
        assert_eq!(migrated["notifications"]["billReminders"], json!(true));
        assert_eq!(migrated["upcomingDays"], json!(7));
    }

    #[test]
    fn effective_settings_read_typed_values() {
        let effective = effective_from_value(&migrate_settings(json!({
            "upcomingDays": 3,
            "defaultDebtCategory": "loan"
        })));
        assert_eq!(effective.upcoming_days, 3);
        assert_eq!(effective.default_debt_category, "loan");
        assert!(effective.record_transaction_on_pay);
        assert_eq!(effective.asset_cache_version, "1");
    }
}
