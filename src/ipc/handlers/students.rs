use crate::context::SeatingContext;
use crate::ipc::helpers::{
    get_opt_str, get_required_str, parse_param, to_value, with_ctx, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{NewStudent, Student, StudentPatch};
use serde_json::json;

fn students_list(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let roster = ctx.roster();
    let students: Vec<&Student> = match get_opt_str(params, "filter").as_deref() {
        None | Some("all") => roster.students().iter().collect(),
        Some("seated") => roster.seated(),
        Some("unseated") => roster.unseated(),
        Some(other) => {
            return Err(HandlerErr::bad_params(format!("unknown filter: {}", other)));
        }
    };
    Ok(json!({
        "students": to_value(&students)?,
        "seatedCount": roster.seated().len(),
        "unseatedCount": roster.unseated().len(),
    }))
}

fn validated(base: NewStudent) -> Result<NewStudent, HandlerErr> {
    if base.name.trim().is_empty() {
        return Err(HandlerErr::bad_params("student name must not be empty"));
    }
    Ok(NewStudent {
        name: base.name.trim().to_string(),
        ..base
    })
}

fn students_add(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let base = validated(parse_param::<NewStudent>(params, "student")?)?;
    let student = ctx.add_student(base)?;
    Ok(json!({ "student": to_value(&student)? }))
}

fn students_add_many(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let bases = parse_param::<Vec<NewStudent>>(params, "students")?
        .into_iter()
        .map(validated)
        .collect::<Result<Vec<_>, _>>()?;
    let added = ctx.add_students(bases)?;
    Ok(json!({ "students": to_value(&added)? }))
}

fn students_update(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let id = get_required_str(params, "studentId")?;
    let patch = parse_param::<StudentPatch>(params, "patch")?;
    if patch.name.as_deref().map(|n| n.trim().is_empty()).unwrap_or(false) {
        return Err(HandlerErr::bad_params("student name must not be empty"));
    }
    let student = ctx.update_student(&id, patch)?;
    Ok(json!({ "student": to_value(&student)? }))
}

fn students_set_color(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let id = get_required_str(params, "studentId")?;
    let color = get_required_str(params, "color")?;
    ctx.set_student_color(&id, &color)?;
    Ok(json!({ "ok": true }))
}

fn students_remove(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let id = get_required_str(params, "studentId")?;
    let removed = ctx.remove_student(&id)?;
    Ok(json!({ "studentId": removed.id }))
}

fn students_clear(ctx: &mut SeatingContext, _params: &serde_json::Value) -> HandlerResult {
    ctx.clear_students()?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: fn(&mut SeatingContext, &serde_json::Value) -> HandlerResult = match req.method.as_str() {
        "students.list" => students_list,
        "students.add" => students_add,
        "students.addMany" => students_add_many,
        "students.update" => students_update,
        "students.setColor" => students_set_color,
        "students.remove" => students_remove,
        "students.clear" => students_clear,
        _ => return None,
    };
    Some(with_ctx(state, req, f))
}
