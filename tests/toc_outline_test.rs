use predicates::str::contains;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

fn outline_json(text: &str) -> Value {
    let tmp = tempdir().expect("tempdir");
    let page = tmp.path().join("page.wiki");
    fs::write(&page, text).expect("write page");

    let out = assert_cmd::cargo::cargo_bin_cmd!("toc-history")
        .current_dir(tmp.path())
        .env("TOC_HOME", tmp.path())
        .arg("outline")
        .arg(&page)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&out).expect("json report")
}

fn titles_and_levels(report: &Value) -> Vec<(String, u64)> {
    report["data"]
        .as_array()
        .expect("sections")
        .iter()
        .map(|s| {
            (
                s["title"].as_str().expect("title").to_string(),
                s["level"].as_u64().expect("level"),
            )
        })
        .collect()
}

#[test]
fn nested_headings_get_stack_levels() {
    let report = outline_json("==Intro==\n===Background===\n==Methods==");
    assert_eq!(
        titles_and_levels(&report),
        vec![
            ("Intro".to_string(), 1),
            ("Background".to_string(), 2),
            ("Methods".to_string(), 1)
        ]
    );
    assert_eq!(report["data"][1]["rawLevel"], 3);
}

#[test]
fn deep_first_heading_resets_to_level_one() {
    let report = outline_json("====Deep====\n==Top==");
    assert_eq!(
        titles_and_levels(&report),
        vec![("Deep".to_string(), 1), ("Top".to_string(), 1)]
    );
}

#[test]
fn text_output_indents_by_level() {
    let tmp = tempdir().expect("tempdir");
    let page = tmp.path().join("page.wiki");
    fs::write(&page, "Lead text\n== Intro ==\n=== Background ===\n==  ==\n").expect("write");

    assert_cmd::cargo::cargo_bin_cmd!("toc-history")
        .current_dir(tmp.path())
        .env("TOC_HOME", tmp.path())
        .arg("outline")
        .arg(&page)
        .assert()
        .success()
        .stdout(contains("Intro (level 1, raw 2)"))
        .stdout(contains("  Background (level 2, raw 3)"))
        .stdout(contains("sections=2"));
}

#[test]
fn custom_marker_comes_from_environment() {
    let tmp = tempdir().expect("tempdir");
    let page = tmp.path().join("page.txt");
    fs::write(&page, "##Alpha##\n###Beta###\n==Ignored==").expect("write");

    assert_cmd::cargo::cargo_bin_cmd!("toc-history")
        .current_dir(tmp.path())
        .env("TOC_HOME", tmp.path())
        .env("TOC_HEADING_MARKER", "#")
        .arg("outline")
        .arg(&page)
        .assert()
        .success()
        .stdout(contains("Alpha (level 1, raw 2)"))
        .stdout(contains("sections=2"));
}
