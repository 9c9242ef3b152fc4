use crate::backup;
use crate::context::SeatingContext;
use crate::export::ListingField;
use crate::ipc::helpers::{
    get_bool, get_opt_str, get_required_str, parse_opt_param, parse_param, to_value, with_ctx,
    HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::roster_import::{self, ParseResult};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

fn io_err(code: &'static str, e: impl std::fmt::Display, path: &str) -> HandlerErr {
    HandlerErr {
        code,
        message: e.to_string(),
        details: Some(json!({ "path": path })),
    }
}

/// `mode` is "append" (default) or "replace".
fn replace_mode(params: &serde_json::Value) -> Result<bool, HandlerErr> {
    match get_opt_str(params, "mode").as_deref() {
        None | Some("append") => Ok(false),
        Some("replace") => Ok(true),
        Some(other) => Err(HandlerErr::bad_params(format!("unknown mode: {}", other))),
    }
}

fn apply_roster(ctx: &mut SeatingContext, params: &serde_json::Value, parsed: ParseResult) -> HandlerResult {
    let replace = replace_mode(params)?;
    let preview = get_bool(params, "preview").unwrap_or(false);
    let ParseResult {
        students,
        fields,
        errors,
    } = parsed;
    if preview {
        return Ok(json!({
            "preview": true,
            "students": to_value(&students)?,
            "fields": fields,
            "errors": to_value(&errors)?,
        }));
    }
    let added = ctx.import_students(students, replace)?;
    Ok(json!({
        "imported": added.len(),
        "replaced": replace,
        "fields": fields,
        "errors": to_value(&errors)?,
    }))
}

fn exchange_import_roster_csv(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let text = match (get_opt_str(params, "text"), get_opt_str(params, "inPath")) {
        (Some(text), _) => text,
        (None, Some(path)) => {
            std::fs::read_to_string(&path).map_err(|e| io_err("io_failed", e, &path))?
        }
        (None, None) => return Err(HandlerErr::bad_params("missing text or inPath")),
    };
    let parsed = roster_import::parse_csv(&text);
    apply_roster(ctx, params, parsed)
}

fn exchange_import_roster_rows(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let rows = parse_param::<Vec<BTreeMap<String, serde_json::Value>>>(params, "rows")?;
    let parsed = roster_import::parse_rows(&rows);
    apply_roster(ctx, params, parsed)
}

fn exchange_export_scheme(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let id = get_required_str(params, "schemeId")?;
    let payload = ctx
        .export_scheme(&id)
        .ok_or_else(|| crate::error::StoreError::not_found("scheme", &id))?;
    match get_opt_str(params, "outPath") {
        Some(path) => {
            std::fs::write(&path, &payload).map_err(|e| io_err("io_failed", e, &path))?;
            Ok(json!({ "outPath": path, "bytes": payload.len() }))
        }
        None => Ok(json!({ "payload": payload })),
    }
}

fn exchange_import_scheme(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let payload = match (get_opt_str(params, "payload"), get_opt_str(params, "inPath")) {
        (Some(p), _) => p,
        (None, Some(path)) => {
            std::fs::read_to_string(&path).map_err(|e| io_err("io_failed", e, &path))?
        }
        (None, None) => return Err(HandlerErr::bad_params("missing payload or inPath")),
    };
    let scheme = ctx.import_scheme(&payload)?;
    Ok(json!({ "schemeId": scheme.id, "name": scheme.name }))
}

fn exchange_export_snapshot(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let fields = parse_opt_param::<Vec<ListingField>>(params, "fields")?;
    to_value(&ctx.export_snapshot(fields)?)
}

fn exchange_group_listing(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let fields = parse_opt_param::<Vec<ListingField>>(params, "fields")?.unwrap_or_default();
    to_value(&ctx.group_listing(&fields))
}

fn backup_export_bundle(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let out_path = get_required_str(params, "outPath")?;
    let envelope = ctx.schemes().envelope();
    let summary = backup::export_bundle(&envelope, &PathBuf::from(&out_path))
        .map_err(|e| io_err("io_failed", format!("{e:?}"), &out_path))?;
    info!(path = %out_path, schemes = summary.scheme_count, "bundle exported");
    Ok(json!({
        "outPath": out_path,
        "bundleFormat": summary.bundle_format,
        "schemeCount": summary.scheme_count,
        "sha256": summary.sha256,
    }))
}

fn backup_import_bundle(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let in_path = get_required_str(params, "inPath")?;
    let summary = backup::import_bundle(&PathBuf::from(&in_path))
        .map_err(|e| io_err("invalid_payload", format!("{e:#}"), &in_path))?;
    let scheme_count = summary.envelope.schemes.len();
    ctx.restore(summary.envelope)?;
    info!(path = %in_path, schemes = scheme_count, "bundle restored");
    Ok(json!({
        "bundleFormatDetected": summary.bundle_format_detected,
        "schemeCount": scheme_count,
        "activeSchemeId": ctx.schemes().active_id(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: fn(&mut SeatingContext, &serde_json::Value) -> HandlerResult = match req.method.as_str() {
        "exchange.importRosterCsv" => exchange_import_roster_csv,
        "exchange.importRosterRows" => exchange_import_roster_rows,
        "exchange.exportScheme" => exchange_export_scheme,
        "exchange.importScheme" => exchange_import_scheme,
        "exchange.exportSnapshot" => exchange_export_snapshot,
        "exchange.groupListing" => exchange_group_listing,
        "backup.exportWorkspaceBundle" => backup_export_bundle,
        "backup.importWorkspaceBundle" => backup_import_bundle,
        _ => return None,
    };
    Some(with_ctx(state, req, f))
}
