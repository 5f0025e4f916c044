use assert_cmd::Command;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CONFIG: &str = r#"
[[source_group]]
kind = "cxx"
source_paths = ["src"]
header_search_paths = ["include"]

[indexing]
worker_count = 0
tick_interval_ms = 1
fingerprint = "content_hash"
"#;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn project(config: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "srcgraph.toml", config);
    write(
        root,
        "src/main.c",
        "#include \"util.h\"\n#include <lib.h>\nint main() { return 0; }\n",
    );
    write(root, "src/util.h", "#define UTIL 1\n");
    write(root, "include/lib.h", "#define LIB 2\n");
    dir
}

fn srcgraph(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("srcgraph").unwrap();
    cmd.arg("--project").arg(dir.path()).arg("--json");
    cmd.env_remove("SRCGRAPH_STORE").env_remove("SRCGRAPH_WORKERS");
    cmd
}

fn json_output(cmd: &mut Command, success: bool) -> Value {
    let assert = cmd.assert();
    let assert = if success {
        assert.success()
    } else {
        assert.failure()
    };
    serde_json::from_slice(&assert.get_output().stdout).unwrap()
}

#[test]
fn plan_on_a_fresh_project_indexes_everything() {
    let dir = project(CONFIG);
    let output = json_output(srcgraph(&dir).arg("plan"), true);

    assert_eq!(output["status"], "ok");
    assert_eq!(output["data"]["summary"]["mode"], "all_files");
    assert_eq!(output["data"]["summary"]["index_count"], 2);
    assert_eq!(output["data"]["available_modes"], serde_json::json!(["all_files"]));
}

#[test]
fn incremental_mode_needs_an_indexed_store() {
    let dir = project(CONFIG);
    let output = json_output(srcgraph(&dir).args(["plan", "--mode", "updated"]), false);

    assert_eq!(output["status"], "error");
    assert!(output["message"]
        .as_str()
        .unwrap()
        .contains("needs an indexed store"));
    assert_eq!(output["hints"][0]["type"], "action");
}

#[test]
fn index_then_plan_finds_nothing_to_do() {
    let dir = project(CONFIG);

    let indexed = json_output(srcgraph(&dir).args(["index", "--yes"]), true);
    assert_eq!(indexed["data"]["report"]["outcome"]["kind"], "success");
    assert_eq!(indexed["data"]["report"]["policy"], "keep");
    assert_eq!(indexed["meta"]["store_updated"], true);
    assert!(dir.path().join(".srcgraph/symbols.json").exists());

    let stats = json_output(srcgraph(&dir).arg("stats"), true);
    assert_eq!(stats["data"]["storage"]["file_count"], 3);
    assert_eq!(stats["data"]["errors"]["fatal"], 0);

    let plan = json_output(srcgraph(&dir).arg("plan"), true);
    assert_eq!(plan["data"]["summary"]["mode"], "updated_files");
    assert_eq!(plan["data"]["summary"]["index_count"], 0);
    assert_eq!(plan["data"]["summary"]["clear_count"], 0);
}

#[test]
fn modified_source_is_picked_up_by_the_next_index() {
    let dir = project(CONFIG);
    json_output(srcgraph(&dir).args(["index", "--yes"]), true);

    write(dir.path(), "src/util.h", "#define UTIL 2\n#define MORE 3\n");
    let plan = json_output(srcgraph(&dir).arg("plan"), true);
    let to_index: Vec<String> = plan["data"]["files_to_index"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(to_index.len(), 2, "util.h and its includer: {to_index:?}");
    assert!(to_index.iter().any(|p| p.ends_with("main.c")));

    let indexed = json_output(srcgraph(&dir).args(["index", "--yes", "--workers", "2"]), true);
    assert_eq!(indexed["data"]["report"]["indexed_source_file_count"], 2);
}

#[test]
fn unresolved_includes_fail_validation() {
    let dir = project(CONFIG);
    write(dir.path(), "src/broken.c", "#include \"missing.h\"\n");

    let output = json_output(srcgraph(&dir).arg("validate-includes"), false);
    assert_eq!(output["status"], "error");
    let unresolved = output["data"]["unresolved"].as_array().unwrap();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0]["include"], "missing.h");
    assert_eq!(unresolved[0]["line"], 1);
}

#[test]
fn clean_tree_passes_validation_in_text_mode() {
    let dir = project(CONFIG);
    let assert = Command::cargo_bin("srcgraph")
        .unwrap()
        .arg("--project")
        .arg(dir.path())
        .arg("validate-includes")
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert_eq!(stdout, "All includes of 2 source files resolved.\n");
}

#[test]
fn search_path_detection_suggests_the_header_directory() {
    let config = CONFIG.replace("header_search_paths = [\"include\"]\n", "");
    let dir = project(&config);

    let output = json_output(srcgraph(&dir).arg("detect-search-paths"), true);
    let expected = dir.path().canonicalize().unwrap().join("include");
    assert_eq!(
        output["data"]["search_paths"],
        serde_json::json!([expected.display().to_string()])
    );
}
