use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::model::{Action, NormalizedEvent, Outcome};
use crate::report::PlayerReport;

pub struct ExportSummary {
    pub players: usize,
    pub metrics: usize,
    pub timeline_rows: usize,
}

/// Writes `<stem>.json` into `dir` via a temp file and rename.
pub fn write_report_json(dir: &Path, report: &PlayerReport) -> Result<PathBuf> {
    write_report_as(dir, &report.file_stem(), report)
}

/// One payload per report. Stems that collide within the batch get a `_2`, `_3`, ...
/// suffix so no report overwrites another.
pub fn write_reports_json(dir: &Path, reports: &[PlayerReport]) -> Result<Vec<PathBuf>> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut paths = Vec::with_capacity(reports.len());
    for report in reports {
        let base = report.file_stem();
        let mut stem = base.clone();
        let mut n = 2;
        while !taken.insert(stem.clone()) {
            stem = format!("{base}_{n}");
            n += 1;
        }
        paths.push(write_report_as(dir, &stem, report)?);
    }
    Ok(paths)
}

fn write_report_as(dir: &Path, stem: &str, report: &PlayerReport) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(format!("{stem}.json"));
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(report).context("serialize player report")?;
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, &path).with_context(|| format!("swap {}", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(path)
}

/// Dumps the normalized event table as a JSON array.
pub fn write_events_json(path: &Path, events: &[NormalizedEvent]) -> Result<usize> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(events).context("serialize events")?;
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    log::info!("Wrote {} events to {}", events.len(), path.display());
    Ok(events.len())
}

/// Flat CSV of the event table: fixed columns, then one `label_<group>` column per
/// provider label group seen anywhere in the match. Returns the column count.
pub fn write_events_csv(path: &Path, events: &[NormalizedEvent]) -> Result<usize> {
    let label_groups: Vec<&String> = events
        .iter()
        .flat_map(|e| e.labels.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut header: Vec<String> = EVENT_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.extend(label_groups.iter().map(|g| format!("label_{}", g.to_lowercase())));

    let mut writer = csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    writer.write_record(&header)?;
    for event in events {
        let mut row = vec![
            event.source_id.to_string(),
            event.event_id.to_string(),
            event.timestamp.to_string(),
            opt_to_string(event.end_time),
            event.half.to_string(),
            event.code.clone(),
            event.team.clone(),
            event.player.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
            opt_to_string(event.player.as_ref().and_then(|p| p.number)),
            event.action_label.clone(),
            action_type(&event.action).to_string(),
            event.action.outcome().map(outcome_name).unwrap_or_default().to_string(),
            round2(event.start.x).to_string(),
            round2(event.start.y).to_string(),
            opt_to_string(event.end.map(|p| round2(p.x))),
            opt_to_string(event.end.map(|p| round2(p.y))),
            event.is_progressive.to_string(),
        ];
        row.extend(
            label_groups
                .iter()
                .map(|g| event.labels.get(*g).cloned().unwrap_or_default()),
        );
        writer.write_record(&row)?;
    }
    writer.flush().with_context(|| format!("flush {}", path.display()))?;
    log::info!("Wrote {} events to {}", events.len(), path.display());
    Ok(header.len())
}

const EVENT_COLUMNS: [&str; 17] = [
    "id",
    "event_id",
    "start_time",
    "end_time",
    "half",
    "code",
    "team",
    "player",
    "shirt_number",
    "action",
    "action_type",
    "outcome",
    "start_x",
    "start_y",
    "end_x",
    "end_y",
    "progressive",
];

fn action_type(action: &Action) -> &'static str {
    match action {
        Action::Pass { .. } => "pass",
        Action::PassAnnotation { .. } => "pass_annotation",
        Action::Dribble { .. } => "dribble",
        Action::Defensive { .. } => "defensive",
        Action::Shot { .. } => "shot",
        Action::Other { .. } => "other",
    }
}

fn outcome_name(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Successful => "successful",
        Outcome::Unsuccessful => "unsuccessful",
        Outcome::Goal => "goal",
        Outcome::OnTarget => "on_target",
        Outcome::OffTarget => "off_target",
    }
}

pub fn write_summary_workbook(path: &Path, reports: &[PlayerReport]) -> Result<ExportSummary> {
    let metric_names: Vec<String> = reports
        .iter()
        .flat_map(|r| r.summary.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut summary_rows = vec![
        ["Player", "Team", "Shirt #"]
            .iter()
            .map(|s| s.to_string())
            .chain(metric_names.iter().cloned())
            .collect::<Vec<_>>(),
    ];
    for report in reports {
        let mut row = vec![
            report.player.clone(),
            report.team.clone().unwrap_or_default(),
            opt_to_string(report.shirt_number),
        ];
        row.extend(
            metric_names
                .iter()
                .map(|name| opt_to_string(report.summary.get(name).copied().flatten().map(round2))),
        );
        summary_rows.push(row);
    }

    let mut timeline_rows = vec![vec![
        "Player".to_string(),
        "Window".to_string(),
        "Minute".to_string(),
        "Player Value".to_string(),
        "Team Average".to_string(),
        "On Pitch".to_string(),
    ]];
    for report in reports {
        for point in &report.timeline.points {
            timeline_rows.push(vec![
                report.player.clone(),
                point.window.to_string(),
                point.minute.to_string(),
                opt_to_string(point.player_value),
                opt_to_string(point.team_average.map(round2)),
                point.players_on_pitch.to_string(),
            ]);
        }
    }

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;
        write_rows(sheet, &summary_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Timeline")?;
        write_rows(sheet, &timeline_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportSummary {
        players: reports.len(),
        metrics: metric_names.len(),
        timeline_rows: timeline_rows.len().saturating_sub(1),
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn opt_to_string<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
