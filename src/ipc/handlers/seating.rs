use crate::context::SeatingContext;
use crate::ipc::helpers::{
    get_bool, get_opt_str, get_required_str, get_required_u32, parse_param, to_value, with_ctx,
    HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{ExportConfigPatch, SeatConfig, SeatConfigPatch, MAX_GRID_SIDE};
use serde_json::json;

fn check_dims(rows: u32, cols: u32) -> Result<(), HandlerErr> {
    if !SeatConfig::dims_in_bounds(rows, cols) {
        return Err(HandlerErr {
            code: "bad_params",
            message: format!("rows and cols must be between 1 and {}", MAX_GRID_SIDE),
            details: Some(json!({ "rows": rows, "cols": cols })),
        });
    }
    Ok(())
}

fn seats_grid(ctx: &mut SeatingContext, _params: &serde_json::Value) -> HandlerResult {
    let grid = ctx.grid();
    Ok(json!({
        "rows": grid.rows(),
        "cols": grid.cols(),
        "seatCount": grid.total(),
        "grid": to_value(&grid.grid())?,
        "occupiedCount": grid.occupied_count(),
        "emptySeatCount": grid.empty_seats().len(),
    }))
}

fn seats_init(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let rows = get_required_u32(params, "rows")?;
    let cols = get_required_u32(params, "cols")?;
    check_dims(rows, cols)?;
    ctx.init_grid(rows, cols)?;
    Ok(json!({ "rows": rows, "cols": cols }))
}

fn seats_move(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let student_id = get_required_str(params, "studentId")?;
    let seat_id = get_required_str(params, "seatId")?;
    let from_group = get_opt_str(params, "fromGroupId");
    ctx.move_student_to_seat(&student_id, &seat_id, from_group.as_deref())?;
    Ok(json!({
        "studentId": student_id,
        "seatId": seat_id,
        "position": ctx.grid().student_position(&student_id),
        "groupId": ctx.groups().group_of(&student_id).map(|g| g.id.clone()),
    }))
}

fn seats_unseat(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let student_id = get_required_str(params, "studentId")?;
    let changed = ctx.unseat_student(&student_id)?;
    Ok(json!({ "changed": changed }))
}

fn seats_swap(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let a = get_required_str(params, "seatA")?;
    let b = get_required_str(params, "seatB")?;
    ctx.swap_seats(&a, &b)?;
    Ok(json!({ "ok": true }))
}

fn seats_force_set(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let seat_id = get_required_str(params, "seatId")?;
    let student_id = get_opt_str(params, "studentId");
    let locked = get_bool(params, "locked").unwrap_or(false);
    ctx.force_set_seat(&seat_id, student_id.as_deref(), locked)?;
    Ok(json!({ "ok": true }))
}

fn seats_toggle_lock(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let seat_id = get_required_str(params, "seatId")?;
    let locked = ctx.toggle_lock(&seat_id)?;
    Ok(json!({ "seatId": seat_id, "isLocked": locked }))
}

fn seats_clear_all(ctx: &mut SeatingContext, _params: &serde_json::Value) -> HandlerResult {
    let vacated = ctx.clear_all_seats()?;
    Ok(json!({ "vacated": vacated }))
}

fn config_get(ctx: &mut SeatingContext, _params: &serde_json::Value) -> HandlerResult {
    to_value(ctx.active_config()?)
}

fn config_update_seat(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let patch = parse_param::<SeatConfigPatch>(params, "patch")?;
    if patch.rows.is_some() || patch.cols.is_some() {
        let rows = patch.rows.unwrap_or(ctx.grid().rows());
        let cols = patch.cols.unwrap_or(ctx.grid().cols());
        check_dims(rows, cols)?;
    }
    let seat = ctx.update_seat_config(patch)?;
    Ok(json!({ "seat": to_value(&seat)? }))
}

fn config_update_export(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let patch = parse_param::<ExportConfigPatch>(params, "patch")?;
    if let Some(q) = patch.quality {
        if !(0.0..=1.0).contains(&q) {
            return Err(HandlerErr::bad_params("quality must be between 0 and 1"));
        }
    }
    let export = ctx.update_export_config(patch)?;
    Ok(json!({ "export": to_value(&export)? }))
}

fn config_set_show_podium(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let show = get_bool(params, "show").ok_or_else(|| HandlerErr::bad_params("missing show"))?;
    ctx.set_show_podium(show)?;
    Ok(json!({ "showPodium": show }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: fn(&mut SeatingContext, &serde_json::Value) -> HandlerResult = match req.method.as_str() {
        "seats.grid" => seats_grid,
        "seats.init" => seats_init,
        "seats.move" => seats_move,
        "seats.unseat" => seats_unseat,
        "seats.swap" => seats_swap,
        "seats.forceSet" => seats_force_set,
        "seats.toggleLock" => seats_toggle_lock,
        "seats.clearAll" => seats_clear_all,
        "config.get" => config_get,
        "config.updateSeat" => config_update_seat,
        "config.updateExport" => config_update_export,
        "config.setShowPodium" => config_set_show_podium,
        _ => return None,
    };
    Some(with_ctx(state, req, f))
}
