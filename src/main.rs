mod arrange;
mod backup;
mod cli;
mod context;
mod db;
mod error;
mod export;
mod grid;
mod groups;
mod ipc;
mod logging;
mod model;
mod roster;
mod roster_import;
mod schemes;

use clap::Parser;
use std::io::{self, BufRead, Write};
use tracing::{error, info};

fn main() {
    let cli = cli::Cli::parse();
    if let Err(e) = logging::init_logging(&cli.log_config()) {
        eprintln!("failed to initialize logging: {}", e);
    }

    let mut state = ipc::AppState::default();
    if let Some(path) = cli.workspace.clone() {
        if let Err(e) = state.open_workspace(path) {
            error!(error = ?e, "could not open startup workspace");
        }
    }
    info!(version = env!("CARGO_PKG_VERSION"), "seatplannerd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                let body = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", body);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
