use crate::ipc::error::{err, ok};
use crate::ipc::helpers::to_value;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match state.open_workspace(path.clone()) {
        Ok(()) => {
            let active = state
                .ctx
                .as_ref()
                .and_then(|c| c.schemes().active_id().map(str::to_string));
            ok(
                &req.id,
                json!({
                    "workspacePath": path.to_string_lossy(),
                    "activeSchemeId": active,
                }),
            )
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

fn handle_workspace_state(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(ctx) = state.ctx.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match to_value(&ctx.summary()) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "workspace.state" => Some(handle_workspace_state(state, req)),
        _ => None,
    }
}
