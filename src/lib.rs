pub mod commands;
pub mod error;
pub mod finance;
pub mod models;
pub mod offline;

#[cfg(feature = "desktop")]
use commands::{
    assets::{activate_offline_assets, fetch_offline_asset, install_offline_assets, OfflineAssets},
    bills::{bill_crud, get_upcoming_bills, pay_bill},
    debts::{debt_crud, generate_installments, get_debt_installments, record_debt_payment},
    profiles::{
        create_local_profile, get_active_profile, profile_crud, set_active_profile,
        update_profile_balances,
    },
    recurring::{generate_recurring, recurring_bill_crud},
    settings::{get_settings, save_settings},
    summary::get_monthly_summary,
    transactions::transaction_crud,
};
#[cfg(feature = "desktop")]
use models::profile::ActiveProfile;
#[cfg(feature = "desktop")]
use std::sync::{Arc, Mutex};

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use tauri::Manager;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .manage(Arc::new(Mutex::new(ActiveProfile::default())))
        .setup(|app| {
            let data_dir = app.path().app_data_dir()?;
            let assets_dir = app.path().resource_dir()?.join("web");
            let offline = OfflineAssets::open(&data_dir.to_string_lossy(), &assets_dir.to_string_lossy())?;
            match offline.refresh() {
                Ok(status) => log::info!("offline cache {} ready ({} assets)", status.cache_name, status.installed),
                Err(e) => log::warn!("offline cache not refreshed: {e}"),
            }
            app.manage(Mutex::new(offline));
            Ok(())
        })
        .register_uri_scheme_protocol("offline", |ctx, request| {
            offline_protocol(ctx.app_handle(), &request)
        })
        .invoke_handler(tauri::generate_handler![
            create_local_profile,
            profile_crud,
            update_profile_balances,
            set_active_profile,
            get_active_profile,
            bill_crud,
            get_upcoming_bills,
            pay_bill,
            transaction_crud,
            debt_crud,
            generate_installments,
            get_debt_installments,
            record_debt_payment,
            recurring_bill_crud,
            generate_recurring,
            get_monthly_summary,
            get_settings,
            save_settings,
            install_offline_assets,
            activate_offline_assets,
            fetch_offline_asset,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

#[cfg(feature = "desktop")]
fn offline_protocol<R: tauri::Runtime>(
    app: &tauri::AppHandle<R>,
    request: &tauri::http::Request<Vec<u8>>,
) -> tauri::http::Response<Vec<u8>> {
    use offline::cache::AssetRequest;
    use tauri::Manager;

    let respond = |status: u16, content_type: &str, body: Vec<u8>| {
        tauri::http::Response::builder()
            .status(status)
            .header("Content-Type", content_type)
            .body(body)
            .unwrap_or_else(|_| tauri::http::Response::new(Vec::new()))
    };

    let Some(state) = app.try_state::<Mutex<OfflineAssets>>() else {
        return respond(503, "text/plain", b"offline cache not initialised".to_vec());
    };
    let Ok(offline) = state.lock() else {
        return respond(500, "text/plain", b"offline cache lock error".to_vec());
    };

    let headers = request
        .headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect();
    let asset_request = AssetRequest {
        method: request.method().as_str().to_string(),
        path: request.uri().path().to_string(),
        headers,
    };

    match offline.fetch(&asset_request) {
        Ok(Some(asset)) => respond(200, &asset.content_type, asset.body),
        Ok(None) => respond(404, "text/plain", b"not available offline".to_vec()),
        Err(e) => {
            log::warn!("offline asset request failed: {e}");
            respond(500, "text/plain", e.into_bytes())
        }
    }
}
