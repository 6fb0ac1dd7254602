use predicates::str::contains;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn diff_cmd(dir: &Path, old: &Path, new: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("toc-history");
    cmd.current_dir(dir)
        .env("TOC_HOME", dir)
        .arg("diff")
        .arg(old)
        .arg(new);
    cmd
}

#[test]
fn case_and_similarity_renames_are_separated_from_removals() {
    let tmp = tempdir().expect("tempdir");
    let old = tmp.path().join("old.wiki");
    let new = tmp.path().join("new.wiki");
    fs::write(&old, "==History==\n==Uses==\n==Side effects==").expect("write old");
    fs::write(&new, "==history==\n==Applications==\n==Side-effects==").expect("write new");

    let out = diff_cmd(tmp.path(), &old, &new)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&out).expect("json report");
    let resolution = &report["data"]["resolution"];
    assert_eq!(resolution["renamed"]["history"], "History");
    assert_eq!(resolution["renamed"]["Side-effects"], "Side effects");
    assert_eq!(resolution["removed"], serde_json::json!(["Uses"]));
    assert_eq!(resolution["added"], serde_json::json!(["Applications"]));
    assert_eq!(resolution["trace"][0]["kind"], "case_rename");

    // significance compares titles exactly: three added, three removed
    assert_eq!(report["data"]["score"]["significance"], 6.0);
}

#[test]
fn identical_outlines_report_only_unchanged_titles() {
    let tmp = tempdir().expect("tempdir");
    let old = tmp.path().join("old.wiki");
    let new = tmp.path().join("new.wiki");
    let text = "==Intro==\n===Background===\n==Methods==";
    fs::write(&old, text).expect("write old");
    fs::write(&new, text).expect("write new");

    diff_cmd(tmp.path(), &old, &new)
        .assert()
        .success()
        .stdout(contains("  = Intro"))
        .stdout(contains("significance: 0.0 (Minor changes)"))
        .stdout(contains("renamed=0"))
        .stdout(contains("titles unchanged"));
}

#[test]
fn raising_the_threshold_disables_near_matches() {
    let tmp = tempdir().expect("tempdir");
    let old = tmp.path().join("old.wiki");
    let new = tmp.path().join("new.wiki");
    fs::write(&old, "==Side effects==").expect("write old");
    fs::write(&new, "==Side-effects==").expect("write new");

    diff_cmd(tmp.path(), &old, &new)
        .args(["--rename-threshold", "0.99"])
        .assert()
        .success()
        .stdout(contains("renamed=0"))
        .stdout(contains("  + Side-effects"));

    diff_cmd(tmp.path(), &old, &new)
        .arg("--no-renames")
        .assert()
        .success()
        .stdout(contains("removed=1"));
}

#[test]
fn loose_json_records_are_accepted_and_malformed_ones_score_neutral() {
    let tmp = tempdir().expect("tempdir");
    let old = tmp.path().join("old.json");
    let new = tmp.path().join("new.json");
    fs::write(
        &old,
        r#"[{"title": "Intro", "level": 1}, {"title": "Usage", "level": 2}]"#,
    )
    .expect("write old");
    fs::write(
        &new,
        r#"{"sections": [{"title": "Intro", "level": 1}, {"title": "Usage", "level": 1}]}"#,
    )
    .expect("write new");

    let out = diff_cmd(tmp.path(), &old, &new)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&out).expect("json report");
    assert_eq!(report["data"]["score"]["level_changes"], 1);
    assert_eq!(report["data"]["score"]["significance"], 1.5);

    fs::write(&new, r#"[{"level": 1}]"#).expect("write malformed");
    let out = diff_cmd(tmp.path(), &old, &new)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&out).expect("json report");
    assert_eq!(report["data"]["score"]["significance"], 5.0);
    assert!(report["data"]["resolution"].is_null());
}
