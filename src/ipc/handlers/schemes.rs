use crate::context::SeatingContext;
use crate::ipc::helpers::{
    get_opt_str, get_required_name, get_required_str, to_value, with_ctx, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::DataScheme;
use serde_json::json;

/// List rows leave out the heavy collections.
fn scheme_row(s: &DataScheme, active_id: Option<&str>) -> serde_json::Value {
    json!({
        "id": s.id,
        "name": s.name,
        "description": s.description,
        "createdAt": s.created_at,
        "updatedAt": s.updated_at,
        "studentCount": s.students.len(),
        "groupCount": s.groups.len(),
        "rows": s.config.seat.rows,
        "cols": s.config.seat.cols,
        "active": Some(s.id.as_str()) == active_id,
    })
}

fn schemes_list(ctx: &mut SeatingContext, _params: &serde_json::Value) -> HandlerResult {
    let store = ctx.schemes();
    let active = store.active_id();
    let rows: Vec<serde_json::Value> = store.list().iter().map(|s| scheme_row(s, active)).collect();
    Ok(json!({ "schemes": rows, "activeSchemeId": active }))
}

fn schemes_get(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let id = get_required_str(params, "schemeId")?;
    let scheme = ctx
        .schemes()
        .get(&id)
        .ok_or_else(|| crate::error::StoreError::not_found("scheme", &id))?;
    Ok(json!({ "scheme": to_value(scheme)? }))
}

fn schemes_create(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let name = get_required_name(params, "name")?;
    let description = get_opt_str(params, "description");
    let scheme = ctx.create_scheme(&name, description)?;
    Ok(json!({ "schemeId": scheme.id, "name": scheme.name }))
}

fn schemes_delete(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let id = get_required_str(params, "schemeId")?;
    ctx.delete_scheme(&id)?;
    Ok(json!({ "ok": true, "activeSchemeId": ctx.schemes().active_id() }))
}

fn schemes_rename(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let id = get_required_str(params, "schemeId")?;
    let name = get_required_name(params, "name")?;
    let scheme = ctx.rename_scheme(&id, &name)?;
    Ok(json!({ "schemeId": scheme.id, "name": scheme.name }))
}

fn schemes_update_description(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let id = get_required_str(params, "schemeId")?;
    let description = get_required_str(params, "description")?;
    ctx.update_scheme_description(&id, &description)?;
    Ok(json!({ "ok": true }))
}

fn schemes_duplicate(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let id = get_required_str(params, "schemeId")?;
    let name = get_opt_str(params, "name");
    let copy = ctx.duplicate_scheme(&id, name.as_deref())?;
    Ok(json!({ "schemeId": copy.id, "name": copy.name }))
}

fn schemes_switch(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let id = get_required_str(params, "schemeId")?;
    let scheme = ctx.switch_scheme(&id)?;
    Ok(json!({ "activeSchemeId": scheme.id, "state": to_value(&ctx.summary())? }))
}

fn schemes_reset(ctx: &mut SeatingContext, _params: &serde_json::Value) -> HandlerResult {
    ctx.reset_schemes()?;
    Ok(json!({ "activeSchemeId": ctx.schemes().active_id() }))
}

fn schemes_storage_usage(ctx: &mut SeatingContext, _params: &serde_json::Value) -> HandlerResult {
    to_value(&ctx.schemes().storage_usage())
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: fn(&mut SeatingContext, &serde_json::Value) -> HandlerResult = match req.method.as_str() {
        "schemes.list" => schemes_list,
        "schemes.get" => schemes_get,
        "schemes.create" => schemes_create,
        "schemes.delete" => schemes_delete,
        "schemes.rename" => schemes_rename,
        "schemes.updateDescription" => schemes_update_description,
        "schemes.duplicate" => schemes_duplicate,
        "schemes.switch" => schemes_switch,
        "schemes.reset" => schemes_reset,
        "schemes.storageUsage" => schemes_storage_usage,
        _ => return None,
    };
    Some(with_ctx(state, req, f))
}
