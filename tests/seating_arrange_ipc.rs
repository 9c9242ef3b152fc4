mod test_support;

use serde_json::json;
use std::io::BufReader;
use std::process::{Child, ChildStdin, ChildStdout};
use test_support::{request, request_err, request_ok, spawn_sidecar, temp_dir};

type Sidecar = (Child, ChildStdin, BufReader<ChildStdout>);

fn open_with_grid(prefix: &str, rows: u32, cols: u32) -> (std::path::PathBuf, Sidecar) {
    let workspace = temp_dir(prefix);
    let (child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "open",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "init",
        "seats.init",
        json!({ "rows": rows, "cols": cols }),
    );
    (workspace, (child, stdin, reader))
}

fn student_ids(added: &serde_json::Value) -> Vec<String> {
    added["students"]
        .as_array()
        .expect("students")
        .iter()
        .map(|s| s["id"].as_str().expect("id").to_string())
        .collect()
}

#[test]
fn random_arrange_fills_small_grid() {
    let (workspace, (mut child, mut stdin, mut reader)) = open_with_grid("seatplanner-random", 2, 2);
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.addMany",
        json!({ "students": [{ "name": "A" }, { "name": "B" }, { "name": "C" }] }),
    );

    let arranged = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "arrange.random",
        json!({ "seed": 7 }),
    );
    assert_eq!(arranged["placedCount"], 3);
    assert_eq!(arranged["emptySeatCount"], 1);
    assert_eq!(arranged["unseatedCount"], 0);

    let state = request_ok(&mut stdin, &mut reader, "3", "workspace.state", json!({}));
    assert_eq!(state["seatedCount"], 3);
    assert_eq!(state["emptySeatCount"], 1);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn smart_height_arrange_fills_row_major() {
    let (workspace, (mut child, mut stdin, mut reader)) = open_with_grid("seatplanner-smart", 2, 2);
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.addMany",
        json!({ "students": [
            { "name": "A", "height": 170 },
            { "name": "B", "height": 150 },
            { "name": "C", "height": 160 }
        ] }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "arrange.smart",
        json!({ "rule": { "type": "height", "ascending": true } }),
    );

    let snapshot = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "exchange.exportSnapshot",
        json!({}),
    );
    assert_eq!(snapshot["chart"], json!([["B", "C"], ["A", ""]]));
    assert_eq!(snapshot["podiumRow"], json!(["讲台", ""]));

    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "config.setShowPodium",
        json!({ "show": false }),
    );
    let snapshot = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "exchange.exportSnapshot",
        json!({}),
    );
    assert!(snapshot.get("podiumRow").is_none());
    assert_eq!(snapshot["options"]["showPodium"], false);

    let missing_rule = request_err(&mut stdin, &mut reader, "6", "arrange.smart", json!({}));
    assert_eq!(missing_rule, "bad_params");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn locked_seats_refuse_moves_and_survive_clear() {
    let (workspace, (mut child, mut stdin, mut reader)) = open_with_grid("seatplanner-locks", 2, 2);
    let added = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.addMany",
        json!({ "students": [{ "name": "A" }, { "name": "B" }] }),
    );
    let ids = student_ids(&added);

    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "seats.move",
        json!({ "studentId": ids[0], "seatId": "seat-0-0" }),
    );
    let toggled = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "seats.toggleLock",
        json!({ "seatId": "seat-0-0" }),
    );
    assert_eq!(toggled["isLocked"], true);

    let refused = request(
        &mut stdin,
        &mut reader,
        "4",
        "seats.move",
        json!({ "studentId": ids[1], "seatId": "seat-0-0" }),
    );
    assert_eq!(refused["error"]["code"], "seat_locked");
    assert_eq!(refused["error"]["details"]["seatId"], "seat-0-0");

    let refused_out = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "seats.move",
        json!({ "studentId": ids[0], "seatId": "seat-1-1" }),
    );
    assert_eq!(refused_out, "seat_locked");

    request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "seats.move",
        json!({ "studentId": ids[1], "seatId": "seat-0-1" }),
    );
    let cleared = request_ok(&mut stdin, &mut reader, "7", "seats.clearAll", json!({}));
    assert_eq!(cleared["vacated"].as_array().map(|a| a.len()), Some(1));

    let grid = request_ok(&mut stdin, &mut reader, "8", "seats.grid", json!({}));
    assert_eq!(grid["seatCount"], 4);
    assert_eq!(grid["occupiedCount"], 1);
    assert_eq!(grid["grid"][0][0]["studentId"], ids[0].as_str());
    assert_eq!(grid["grid"][0][0]["isLocked"], true);

    let unseated = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "students.list",
        json!({ "filter": "unseated" }),
    );
    assert_eq!(unseated["students"][0]["id"], ids[1].as_str());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn swap_and_resize_keep_pointers_consistent() {
    let (workspace, (mut child, mut stdin, mut reader)) = open_with_grid("seatplanner-swap", 2, 2);
    let added = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.addMany",
        json!({ "students": [{ "name": "A" }, { "name": "B" }] }),
    );
    let ids = student_ids(&added);
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "seats.move",
        json!({ "studentId": ids[0], "seatId": "seat-0-0" }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "seats.move",
        json!({ "studentId": ids[1], "seatId": "seat-1-1" }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "seats.swap",
        json!({ "seatA": "seat-0-0", "seatB": "seat-1-1" }),
    );
    let seated = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.list",
        json!({ "filter": "seated" }),
    );
    let by_name: std::collections::HashMap<String, String> = seated["students"]
        .as_array()
        .expect("students")
        .iter()
        .map(|s| {
            (
                s["name"].as_str().unwrap_or_default().to_string(),
                s["seatId"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    assert_eq!(by_name["A"], "seat-1-1");
    assert_eq!(by_name["B"], "seat-0-0");

    // Shrinking to one row cuts A off the grid.
    let resized = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "config.updateSeat",
        json!({ "patch": { "rows": 1 } }),
    );
    assert_eq!(resized["seat"]["rows"], 1);
    let unseated = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "students.list",
        json!({ "filter": "unseated" }),
    );
    assert_eq!(unseated["students"][0]["name"], "A");

    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "8",
            "seats.init",
            json!({ "rows": 0, "cols": 3 })
        ),
        "bad_params"
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
