use crate::arrange::Assignment;
use crate::context::SeatingContext;
use crate::ipc::helpers::{parse_param, to_value, with_ctx, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::ArrangeRule;
use serde_json::json;

fn arrangement_result(ctx: &SeatingContext, placed: &[Assignment]) -> HandlerResult {
    Ok(json!({
        "assignments": to_value(&placed)?,
        "placedCount": placed.len(),
        "unseatedCount": ctx.roster().unseated().len(),
        "emptySeatCount": ctx.grid().empty_seats().len(),
    }))
}

fn arrange_random(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let seed = match params.get("seed") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => Some(
            v.as_u64()
                .ok_or_else(|| HandlerErr::bad_params("seed must be a non-negative integer"))?,
        ),
    };
    let placed = ctx.random_arrange(seed)?;
    arrangement_result(ctx, &placed)
}

fn arrange_smart(ctx: &mut SeatingContext, params: &serde_json::Value) -> HandlerResult {
    let rule = parse_param::<ArrangeRule>(params, "rule")?;
    let placed = ctx.smart_arrange(&rule)?;
    arrangement_result(ctx, &placed)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: fn(&mut SeatingContext, &serde_json::Value) -> HandlerResult = match req.method.as_str() {
        "arrange.random" => arrange_random,
        "arrange.smart" => arrange_smart,
        _ => return None,
    };
    Some(with_ctx(state, req, f))
}
