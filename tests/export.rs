use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use instat_report::batch::run_batch;
use instat_report::config::EngineConfig;
use instat_report::export::{
    write_events_csv, write_events_json, write_report_json, write_reports_json,
    write_summary_workbook,
};
use instat_report::load_match;
use instat_report::metrics::Selection;
use instat_report::model::{EventTable, NormalizedEvent};
use instat_report::report::PlayerReport;

fn fixture_table(name: &str) -> EventTable {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    let raw = fs::read_to_string(path).expect("fixture file should be readable");
    load_match(&raw, &EngineConfig::default()).expect("fixture loads").0
}

fn fixture_reports() -> Vec<PlayerReport> {
    let cfg = EngineConfig::default();
    let table = fixture_table("two_player_match.xml");
    let selections = vec![Selection::player("Adam Striker"), Selection::player("Ben Keeper")];
    run_batch(&table, &selections, &cfg).reports
}

#[test]
fn writes_one_json_payload_per_player() {
    let dir = tempfile::tempdir().expect("tempdir");
    let reports = fixture_reports();
    for report in &reports {
        write_report_json(dir.path(), report).expect("json written");
    }

    let path = dir.path().join("Adam_Striker_Alpha_FC_report.json");
    let raw = fs::read_to_string(&path).expect("payload exists");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
    assert_eq!(value["player"], "Adam Striker");
    assert_eq!(value["shots"]["goals"].as_array().map(Vec::len), Some(1));
    assert_eq!(value["timeline"]["points"].as_array().map(Vec::len), Some(18));
    assert!(value["timeline"]["points"][11]["player_value"].is_null());

    let back: PlayerReport = serde_json::from_str(&raw).expect("payload round trips");
    assert_eq!(back.player, reports[0].player);
    assert!(back.summary.keys().eq(reports[0].summary.keys()));

    assert!(dir.path().join("Ben_Keeper_Beta_United_report.json").exists());
    let leftovers = fs::read_dir(dir.path())
        .expect("list dir")
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn writes_summary_workbook() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("summary.xlsx");
    let reports = fixture_reports();
    let summary = write_summary_workbook(&path, &reports).expect("workbook written");
    assert_eq!(summary.players, 2);
    let names: BTreeSet<&String> = reports.iter().flat_map(|r| r.summary.keys()).collect();
    assert_eq!(summary.metrics, names.len());
    assert!(names.len() > reports[0].summary.len());
    assert_eq!(summary.timeline_rows, 36);
    assert!(fs::metadata(&path).expect("workbook exists").len() > 0);
}

#[test]
fn colliding_report_names_do_not_overwrite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let reports = fixture_reports();
    let mut twin = reports[0].clone();
    twin.player = "Adam-Striker".to_string();
    let batch = vec![reports[0].clone(), twin, reports[1].clone()];

    let paths = write_reports_json(dir.path(), &batch).expect("json written");
    assert_eq!(paths.len(), 3);
    assert_eq!(
        paths[1].file_name().and_then(|n| n.to_str()),
        Some("Adam_Striker_Alpha_FC_report_2.json")
    );
    let written = fs::read_dir(dir.path()).expect("list dir").count();
    assert_eq!(written, 3);

    let raw = fs::read_to_string(&paths[1]).expect("payload exists");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
    assert_eq!(value["player"], "Adam-Striker");
}

#[test]
fn event_table_exports_as_json_and_csv() {
    let dir = tempfile::tempdir().expect("tempdir");
    let table = fixture_table("annotated_passes.xml");

    let json_path = dir.path().join("events.json");
    assert_eq!(write_events_json(&json_path, &table.events).expect("json"), 4);
    let raw = fs::read_to_string(&json_path).expect("events json exists");
    let back: Vec<NormalizedEvent> = serde_json::from_str(&raw).expect("events round trip");
    assert_eq!(back.len(), table.events.len());
    assert_eq!(back[0].labels.get("Attack type").map(String::as_str), Some("Positional attack"));

    let csv_path = dir.path().join("events.csv");
    let columns = write_events_csv(&csv_path, &table.events).expect("csv");
    assert_eq!(columns, 18);
    let raw = fs::read_to_string(&csv_path).expect("events csv exists");
    let mut lines = raw.lines();
    let header: Vec<&str> = lines.next().expect("header").split(',').collect();
    assert_eq!(header.len(), columns);
    assert_eq!(header[0], "id");
    assert_eq!(header[17], "label_attack type");
    let rows: Vec<Vec<&str>> = lines.map(|l| l.split(',').collect()).collect();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0][6], "Alpha FC");
    assert_eq!(rows[0][7], "Cara Mid");
    assert_eq!(rows[0][10], "pass");
    assert_eq!(rows[0][17], "Positional attack");
    let failed: Vec<&Vec<&str>> = rows.iter().filter(|r| r[11] == "unsuccessful").collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0][17], "");
}
