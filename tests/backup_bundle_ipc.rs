mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, str_at, temp_dir};

#[test]
fn workspace_bundle_restores_into_fresh_workspace() {
    let source = temp_dir("seatplanner-bundle-src");
    let target = temp_dir("seatplanner-bundle-dst");
    let bundle = source.join("schemes-backup.zip");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": source.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.addMany",
        json!({ "students": [{ "name": "Ann" }, { "name": "Bo" }] }),
    );
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "schemes.create",
        json!({ "name": "Exam" }),
    );
    let exam_id = str_at(&created, "schemeId").to_string();
    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "schemes.switch",
        json!({ "schemeId": exam_id }),
    );

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(exported["bundleFormat"], "seatplanner-schemes-v1");
    assert_eq!(exported["schemeCount"], 2);
    assert_eq!(str_at(&exported, "sha256").len(), 64);
    assert!(bundle.is_file());

    request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "workspace.select",
        json!({ "path": target.to_string_lossy() }),
    );
    let restored = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(restored["bundleFormatDetected"], "seatplanner-schemes-v1");
    assert_eq!(restored["schemeCount"], 2);
    assert_eq!(restored["activeSchemeId"], exam_id.as_str());

    let list = request_ok(&mut stdin, &mut reader, "8", "schemes.list", json!({}));
    let names: Vec<&str> = list["schemes"]
        .as_array()
        .expect("schemes")
        .iter()
        .filter_map(|s| s["name"].as_str())
        .collect();
    assert!(names.contains(&"Exam"));

    let state = request_ok(&mut stdin, &mut reader, "9", "workspace.state", json!({}));
    assert_eq!(state["activeSchemeName"], "Exam");
    assert_eq!(state["studentCount"], 0);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(source);
    let _ = std::fs::remove_dir_all(target);
}

#[test]
fn unreadable_bundle_is_rejected_without_touching_state() {
    let workspace = temp_dir("seatplanner-bundle-bad");
    let junk = workspace.join("junk.zip");
    std::fs::write(&junk, b"definitely not a bundle").expect("write junk");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let selected = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let active = str_at(&selected, "activeSchemeId").to_string();

    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "2",
            "backup.importWorkspaceBundle",
            json!({ "inPath": junk.to_string_lossy() })
        ),
        "invalid_payload"
    );
    let state = request_ok(&mut stdin, &mut reader, "3", "workspace.state", json!({}));
    assert_eq!(state["activeSchemeId"], active.as_str());
    assert_eq!(state["schemeCount"], 1);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
