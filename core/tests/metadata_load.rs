use sdc_core::error::CoreError;
use sdc_core::integrity::checksums::sha256_hex;
use sdc_core::metadata::annotate::QueryUrlBuilder;
use sdc_core::metadata::document::{self, LoadOptions};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

fn write_metadata(dir: &Path, value: &Value) -> PathBuf {
    let path = dir.join("outputs.json");
    fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

fn sample_metadata() -> Value {
    json!({
        "version": "0.4.0",
        "results": {
            "table": {
                "uid": "table",
                "files": [{
                    "name": "table.csv",
                    "sdc": { "cells": { "flag_a": [[0, 1]], "flag_b": [[0, 1], [2, 3]] } }
                }],
                "status": "fail",
                "type": "crosstab",
                "properties": {},
                "outcome": {},
                "command": "safe_table = acro.crosstab(df.year, df.grant_type)",
                "summary": "fail",
                "comments": [],
                "timestamp": null
            },
            "plot": {
                "files": [{ "name": "plot.png" }],
                "status": "review"
            }
        }
    })
}

fn write_output_files(dir: &Path) {
    fs::write(dir.join("table.csv"), b"year,grants\n2020,5\n").unwrap();
    fs::write(dir.join("plot.png"), b"not really a png").unwrap();
}

#[test]
fn load_exposes_version_and_results_in_file_order() {
    let tmp = tempfile::tempdir().unwrap();
    write_output_files(tmp.path());
    let path = write_metadata(tmp.path(), &sample_metadata());

    let outputs = document::load(&path).unwrap();
    assert_eq!(outputs.version(), "0.4.0");
    assert_eq!(outputs.uids().collect::<Vec<_>>(), vec!["table", "plot"]);
    assert_eq!(outputs.len(), 2);
    assert!(outputs.config().is_empty());
}

#[test]
fn sibling_config_is_merged() {
    let tmp = tempfile::tempdir().unwrap();
    write_output_files(tmp.path());
    let path = write_metadata(tmp.path(), &sample_metadata());
    fs::write(
        tmp.path().join("config.json"),
        r#"{"organisation": "test-org"}"#,
    )
    .unwrap();

    let outputs = document::load(&path).unwrap();
    assert_eq!(outputs.config()["organisation"], "test-org");
}

#[test]
fn structural_failures_name_the_broken_assertion() {
    let tmp = tempfile::tempdir().unwrap();

    let cases: Vec<(Value, &str)> = vec![
        (json!({ "results": {} }), "version"),
        (json!({ "version": "0.4.0" }), "results"),
        (
            json!({ "version": "0.4.0", "results": { "x": {} } }),
            "files",
        ),
        (
            json!({ "version": "0.4.0", "results": { "x": { "files": [] } } }),
            "empty",
        ),
        (
            json!({ "version": "0.4.0", "results": { "x": { "files": [{}] } } }),
            "name",
        ),
    ];

    for (value, needle) in cases {
        let path = write_metadata(tmp.path(), &value);
        match document::load(&path) {
            Err(CoreError::InvalidMetadataFile { path: p, reason }) => {
                assert!(p.contains("outputs.json"));
                assert!(
                    reason.contains(needle),
                    "reason {reason:?} should mention {needle:?}"
                );
            }
            other => panic!("expected InvalidMetadataFile, got {other:?}"),
        }
    }
}

#[test]
fn empty_results_validity_is_configurable() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_metadata(tmp.path(), &json!({ "version": "0.4.0", "results": {} }));

    assert!(document::load(&path).is_ok());

    let options = LoadOptions {
        allow_empty_results: false,
        ..LoadOptions::default()
    };
    let result = document::load_with(&path, &options, &QueryUrlBuilder::default());
    assert!(matches!(
        result,
        Err(CoreError::InvalidMetadataFile { .. })
    ));
}

#[test]
fn old_producer_version_aborts_the_load() {
    let tmp = tempfile::tempdir().unwrap();
    write_output_files(tmp.path());
    let mut metadata = sample_metadata();
    metadata["version"] = json!("0.3.0");
    let path = write_metadata(tmp.path(), &metadata);

    match document::load(&path) {
        Err(CoreError::VersionMismatch { used, supported }) => {
            assert_eq!(used, "0.3.0");
            assert_eq!(supported, "0.4.0");
        }
        other => panic!("expected VersionMismatch, got {other:?}"),
    }
}

#[test]
fn annotation_attaches_urls_checksums_and_cell_index() {
    let tmp = tempfile::tempdir().unwrap();
    write_output_files(tmp.path());
    let path = write_metadata(tmp.path(), &sample_metadata());

    let outputs = document::load(&path).unwrap();
    let table = outputs.get("table").unwrap();
    let file = &table.files[0];

    let url = file.url.as_deref().unwrap();
    assert!(url.contains("output=table"));
    assert!(url.contains("filename=table.csv"));

    assert_eq!(
        file.checksum.as_deref(),
        Some(sha256_hex(b"year,grants\n2020,5\n").as_str())
    );
    assert!(file.checksum_valid);

    assert_eq!(file.cell_index["0,1"], vec!["flag_a", "flag_b"]);
    assert_eq!(file.cell_index["2,3"], vec!["flag_b"]);
}

#[test]
fn modified_file_fails_checksum_on_reload() {
    let tmp = tempfile::tempdir().unwrap();
    write_output_files(tmp.path());
    let path = write_metadata(tmp.path(), &sample_metadata());

    // first load records the baseline
    let outputs = document::load(&path).unwrap();
    let baseline = outputs.get("table").unwrap().files[0]
        .checksum
        .clone()
        .unwrap();

    fs::write(tmp.path().join("table.csv"), b"tampered").unwrap();

    let outputs = document::load(&path).unwrap();
    let file = &outputs.get("table").unwrap().files[0];
    assert_eq!(file.checksum.as_deref(), Some(baseline.as_str()));
    assert!(!file.checksum_valid);
}

#[test]
fn missing_file_is_never_hashed() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("table.csv"), b"data").unwrap();
    let path = write_metadata(tmp.path(), &sample_metadata());

    let outputs = document::load(&path).unwrap();
    let plot = &outputs.get("plot").unwrap().files[0];
    assert_eq!(plot.checksum, None);
    assert!(!plot.checksum_valid);
    assert!(!tmp.path().join("checksums/plot.png.txt").exists());
}

#[test]
fn get_file_path_is_an_allow_list() {
    let tmp = tempfile::tempdir().unwrap();
    write_output_files(tmp.path());
    fs::write(tmp.path().join("secret.txt"), b"do not serve").unwrap();
    let path = write_metadata(tmp.path(), &sample_metadata());

    let outputs = document::load(&path).unwrap();
    assert_eq!(
        outputs.get_file_path("table", "table.csv"),
        Some(tmp.path().join("table.csv"))
    );
    // a file that exists on disk but is not declared for this output
    assert_eq!(outputs.get_file_path("table", "secret.txt"), None);
    assert_eq!(outputs.get_file_path("table", "plot.png"), None);
    assert_eq!(outputs.get_file_path("nope", "table.csv"), None);
}

#[test]
fn absolute_file_names_pass_through() {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = tempfile::tempdir().unwrap();
    let absolute = data_dir.path().join("elsewhere.csv");
    fs::write(&absolute, b"data").unwrap();

    let metadata = json!({
        "version": "0.4.0",
        "results": {
            "external": { "files": [{ "name": absolute.to_str().unwrap() }] }
        }
    });
    let path = write_metadata(tmp.path(), &metadata);

    let outputs = document::load(&path).unwrap();
    assert_eq!(
        outputs.get_file_path("external", absolute.to_str().unwrap()),
        Some(absolute)
    );
}

#[test]
fn write_round_trips_the_document() {
    let tmp = tempfile::tempdir().unwrap();
    write_output_files(tmp.path());
    let path = write_metadata(tmp.path(), &sample_metadata());

    let outputs = document::load(&path).unwrap();
    let reloaded = outputs.write().unwrap();

    assert_eq!(reloaded.version(), outputs.version());
    assert_eq!(
        reloaded.uids().collect::<Vec<_>>(),
        outputs.uids().collect::<Vec<_>>()
    );
}

#[test]
fn legacy_shaped_results_are_normalized_at_load() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("safe_table.csv"), b"cells").unwrap();
    let metadata = json!({
        "version": "0.4.0",
        "results": {
            "safe_table-2023-06-23-11472054": {
                "command": "safe_table = acro.crosstab(df.year, df.grant_type)",
                "summary": "fail; threshold: 6 cells may need suppressing",
                "outcome": "{}",
                "output": "safe_table.csv",
                "comments": "needs work",
                "timestamp": "2023-06-23-11472054"
            }
        }
    });
    let path = write_metadata(tmp.path(), &metadata);

    let outputs = document::load(&path).unwrap();
    let record = outputs.get("safe_table-2023-06-23-11472054").unwrap();
    assert_eq!(record.files[0].name, "safe_table.csv");
    assert!(record.files[0].checksum_valid);
    assert_eq!(record.status.as_deref(), Some("fail"));
    assert_eq!(record.output_type.as_deref(), Some("crosstab"));
    assert_eq!(record.comments, vec!["needs work"]);
}
