//! Catalog server over stdio.
//!
//! Reads one JSON `ApiRequest` per line from stdin and writes one JSON
//! `ApiResponse` per line to stdout. Logs go to stderr.
//!
//! Usage: `town-catalog [config.json]`. Without an argument the config is read
//! from `~/.town-catalog/config.json`; `TOWN_*` environment variables override it.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use town_catalog::api::{self, ApiRequest, ApiResponse};
use town_catalog::config::{default_config_path, load_config};
use town_catalog::error::CatalogError;
use town_catalog::scheduler::PurgeScheduler;
use town_catalog::state::AppState;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let config = load_config(&config_path)?;
    let state = AppState::open(config)?;
    log::info!(
        "Catalog ready (db: {})",
        state.config.db_path().display()
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {}", e))?;
    let purge = PurgeScheduler::new(
        state.config.db_path(),
        state.config.verification_code_ttl_secs,
        Duration::from_secs(state.config.verification_code_purge_interval_secs),
    )
    .spawn(runtime.handle());

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.map_err(|e| format!("Failed to read request: {}", e))?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<ApiRequest>(&line) {
            Ok(request) => api::handle(&state, &request),
            Err(e) => malformed(&e),
        };
        let encoded = serde_json::to_string(&response)
            .map_err(|e| format!("Failed to encode response: {}", e))?;
        writeln!(stdout, "{}", encoded).map_err(|e| format!("Failed to write response: {}", e))?;
        stdout
            .flush()
            .map_err(|e| format!("Failed to write response: {}", e))?;
    }

    runtime.block_on(purge.stop());
    log::info!("stdin closed, shutting down");
    Ok(())
}

fn malformed(e: &serde_json::Error) -> ApiResponse {
    log::debug!("Malformed request: {}", e);
    let err = CatalogError::bad_param("request", "must be a JSON object.");
    let status = err.status();
    ApiResponse {
        http_status: status.http_code(),
        status,
        headers: Default::default(),
        body: serde_json::json!({ "error": town_catalog::error::ErrorBody::from(&err) }),
    }
}
