use crate::context::SeatingContext;
use crate::ipc::helpers::{
    get_opt_str, get_required_name, get_required_str, parse_param, to_value, with_ctx,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::StudentGroup;
use serde_json::json;

fn history_flags(ctx: &SeatingContext) -> serde_json::Value {
    json!({
        "canUndo": ctx.groups().can_undo(),
        "canRedo": ctx.groups().can_redo(),
    })
}

fn groups_list(ctx: &mut SeatingContext, _params: &serde_json::Value) -> HandlerResult {
    let groups = ctx.groups();
    let grouped = groups.grouped_student_ids();
    let ungrouped: Vec<&str> = ctx
        .roster()
        .students()
        .iter()
        .map(|s| s.id.as_str())
        .filter(|id| !grouped.contains(id))
        .collect();
    Ok(json!({
        "groups": to_value(&groups.groups())?,
        "activeGroupId": groups.active_group().map(|g| g.id.clone()),
        "ungroupedStudentIds": ungrouped,
        "history": history_flags(ctx),
    }))
}

fn groups_create(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let name = get_opt_str(params, "name");
    let group = ctx.create_group(name.as_deref())?;
    Ok(json!({ "group": to_value(&group)?, "history": history_flags(ctx) }))
}

fn groups_delete(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let id = get_required_str(params, "groupId")?;
    ctx.delete_group(&id)?;
    Ok(json!({ "ok": true, "history": history_flags(ctx) }))
}

fn groups_rename(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let id = get_required_str(params, "groupId")?;
    let name = get_required_name(params, "name")?;
    ctx.rename_group(&id, &name)?;
    Ok(json!({ "ok": true, "history": history_flags(ctx) }))
}

fn groups_set_color(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let id = get_required_str(params, "groupId")?;
    let color = get_required_str(params, "color")?;
    ctx.set_group_color(&id, &color)?;
    Ok(json!({ "ok": true }))
}

fn groups_add_student(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let id = get_required_str(params, "groupId")?;
    let student_id = get_required_str(params, "studentId")?;
    ctx.add_student_to_group(&id, &student_id)?;
    Ok(json!({ "ok": true, "history": history_flags(ctx) }))
}

fn groups_remove_student(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let id = get_required_str(params, "groupId")?;
    let student_id = get_required_str(params, "studentId")?;
    let changed = ctx.remove_student_from_group(&id, &student_id)?;
    Ok(json!({ "changed": changed, "history": history_flags(ctx) }))
}

fn groups_clear_students(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let id = get_required_str(params, "groupId")?;
    let changed = ctx.clear_group(&id)?;
    Ok(json!({ "changed": changed, "history": history_flags(ctx) }))
}

fn groups_move_student(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let from = get_required_str(params, "fromGroupId")?;
    let to = get_required_str(params, "toGroupId")?;
    let student_id = get_required_str(params, "studentId")?;
    ctx.move_student_between_groups(&from, &to, &student_id)?;
    Ok(json!({ "ok": true, "history": history_flags(ctx) }))
}

fn groups_clear_all(ctx: &mut SeatingContext, _params: &serde_json::Value) -> HandlerResult {
    ctx.clear_groups()?;
    Ok(json!({ "ok": true, "history": history_flags(ctx) }))
}

fn groups_set_active(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let id = get_opt_str(params, "groupId");
    ctx.set_active_group(id.as_deref())?;
    Ok(json!({ "activeGroupId": id }))
}

fn groups_replace(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let groups = parse_param::<Vec<StudentGroup>>(params, "groups")?;
    ctx.replace_groups(groups)?;
    Ok(json!({ "groups": to_value(&ctx.groups().groups())?, "history": history_flags(ctx) }))
}

fn groups_undo(ctx: &mut SeatingContext, _params: &serde_json::Value) -> HandlerResult {
    let changed = ctx.undo_groups()?;
    Ok(json!({
        "changed": changed,
        "groups": to_value(&ctx.groups().groups())?,
        "history": history_flags(ctx),
    }))
}

fn groups_redo(ctx: &mut SeatingContext, _params: &serde_json::Value) -> HandlerResult {
    let changed = ctx.redo_groups()?;
    Ok(json!({
        "changed": changed,
        "groups": to_value(&ctx.groups().groups())?,
        "history": history_flags(ctx),
    }))
}

fn groups_history(ctx: &mut SeatingContext, _params: &serde_json::Value) -> HandlerResult {
    let entries: Vec<serde_json::Value> = ctx
        .groups()
        .history()
        .iter()
        .map(|h| json!({ "type": h.kind, "timestamp": h.timestamp }))
        .collect();
    Ok(json!({
        "entries": entries,
        "index": ctx.groups().history_index(),
        "canUndo": ctx.groups().can_undo(),
        "canRedo": ctx.groups().can_redo(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: fn(&mut SeatingContext, &serde_json::Value) -> HandlerResult = match req.method.as_str() {
        "groups.list" => groups_list,
        "groups.create" => groups_create,
        "groups.delete" => groups_delete,
        "groups.rename" => groups_rename,
        "groups.setColor" => groups_set_color,
        "groups.addStudent" => groups_add_student,
        "groups.removeStudent" => groups_remove_student,
        "groups.clearStudents" => groups_clear_students,
        "groups.moveStudent" => groups_move_student,
        "groups.clearAll" => groups_clear_all,
        "groups.setActive" => groups_set_active,
        "groups.replace" => groups_replace,
        "groups.undo" => groups_undo,
        "groups.redo" => groups_redo,
        "groups.history" => groups_history,
        _ => return None,
    };
    Some(with_ctx(state, req, f))
}
