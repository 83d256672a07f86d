use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use instat_report::batch;
use instat_report::config::{ActivityMeasure, EngineConfig};
use instat_report::error::ReportError;
use instat_report::export;
use instat_report::metrics::Selection;
use instat_report::model::{EventTable, NormalizationReport};
use instat_report::overview::{self, MatchOverview};

#[derive(Parser)]
#[command(name = "instat_report")]
#[command(about = "Player reports from Instat XML match events", long_about = None)]
struct Cli {
    /// JSON engine config
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List players found in a match file
    Players {
        xml: PathBuf,
        #[arg(long)]
        team: Option<String>,
    },
    /// Match overview and normalization report
    Summary { xml: PathBuf },
    /// Export the normalized event table (`.json` or `.csv` by extension)
    Events {
        xml: PathBuf,
        #[arg(long, default_value = "events.csv")]
        out: PathBuf,
    },
    /// Build report payloads
    Report {
        xml: PathBuf,
        #[arg(long = "player")]
        players: Vec<String>,
        /// Whole-team report instead of per player
        #[arg(long)]
        team: Option<String>,
        #[arg(long)]
        all: bool,
        #[arg(long, default_value = "reports")]
        out: PathBuf,
        #[arg(long)]
        xlsx: Option<PathBuf>,
        #[arg(long)]
        sigma: Option<f64>,
        #[arg(long)]
        measure: Option<String>,
        #[arg(long)]
        threads: Option<usize>,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut cfg = match cli.config.as_deref() {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::from_env(),
    };

    match cli.command {
        Commands::Players { xml, team } => {
            let (table, _) = load(&xml, &cfg)?;
            let listed = overview::players(&table, team.as_deref());
            if listed.is_empty() {
                println!("No players found.");
            }
            for p in listed {
                let number = p.number.map(|n| format!("#{n} ")).unwrap_or_default();
                println!(
                    "{number}{} ({}) {} events, {:.0} min",
                    p.key.name,
                    p.key.team,
                    p.event_count,
                    p.effective_secs() / 60.0
                );
            }
        }
        Commands::Summary { xml } => {
            let (table, report) = load(&xml, &cfg)?;
            print_overview(&MatchOverview::from_table(&table));
            print_normalization(&report);
        }
        Commands::Events { xml, out } => {
            let (table, _) = load(&xml, &cfg)?;
            let is_json = out.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            if is_json {
                let n = export::write_events_json(&out, &table.events)?;
                println!("{n} events -> {}", out.display());
            } else {
                let columns = export::write_events_csv(&out, &table.events)?;
                println!(
                    "{} events, {columns} columns -> {}",
                    table.events.len(),
                    out.display()
                );
            }
        }
        Commands::Report {
            xml,
            players,
            team,
            all,
            out,
            xlsx,
            sigma,
            measure,
            threads,
        } => {
            if let Some(sigma) = sigma {
                cfg.heatmap.sigma = sigma;
            }
            if let Some(raw) = measure {
                cfg.timeline.measure = ActivityMeasure::parse(&raw)
                    .with_context(|| format!("unknown activity measure `{raw}`"))?;
            }
            if let Some(threads) = threads {
                cfg.report_threads = threads;
            }
            cfg.sanitize();

            let (table, _) = load(&xml, &cfg)?;
            let selections = selections(&table, players, team, all);
            if selections.is_empty() {
                println!("Nothing selected; pass --player, --team or --all.");
                return Ok(());
            }

            let outcome = batch::run_batch(&table, &selections, &cfg);
            let paths = export::write_reports_json(&out, &outcome.reports)?;
            for (report, path) in outcome.reports.iter().zip(&paths) {
                println!("{} -> {}", report.player, path.display());
            }
            for failure in &outcome.failures {
                println!(
                    "{}: {}",
                    failure.selection.describe(),
                    failure.error.user_message()
                );
            }
            if let Some(path) = xlsx {
                let summary = export::write_summary_workbook(&path, &outcome.reports)?;
                println!(
                    "Workbook {} ({} players, {} metrics)",
                    path.display(),
                    summary.players,
                    summary.metrics
                );
            }
        }
    }
    Ok(())
}

fn load(path: &Path, cfg: &EngineConfig) -> Result<(EventTable, NormalizationReport)> {
    let xml = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    instat_report::load_match(&xml, cfg).map_err(|err: ReportError| {
        eprintln!("{}", err.user_message());
        anyhow::Error::new(err).context(format!("load {}", path.display()))
    })
}

fn selections(table: &EventTable, players: Vec<String>, team: Option<String>, all: bool) -> Vec<Selection> {
    let mut out: Vec<Selection> = if all {
        overview::players(table, team.as_deref())
            .into_iter()
            .map(|p| Selection::Player {
                name: p.key.name.clone(),
                team: Some(p.key.team.clone()),
            })
            .collect()
    } else {
        players.into_iter().map(Selection::player).collect()
    };
    if let Some(team) = team.filter(|_| !all) {
        out.push(Selection::team(team));
    }
    out
}

fn print_overview(o: &MatchOverview) {
    println!("Events: {}", o.total_events);
    println!("Teams: {}", o.teams.join(" vs "));
    for (team, n) in &o.players_per_team {
        let activity = o.team_activity.get(team).cloned().unwrap_or_default();
        println!(
            "  {team}: {n} players, {} events ({} successful, {} unsuccessful, {} goals)",
            activity.events, activity.successful, activity.unsuccessful, activity.goals
        );
    }
    println!(
        "Time range: {:.0}s - {:.0}s ({:.1} min)",
        o.first_timestamp, o.last_timestamp, o.duration_minutes
    );
    for (half, n) in &o.events_per_half {
        println!("  Half {half}: {n} events");
    }
    println!("Top actions:");
    for a in o.action_counts.iter().take(10) {
        println!("  {:>5}  {}", a.count, a.label);
    }
}

fn print_normalization(r: &NormalizationReport) {
    println!(
        "Rows: {} in, {} usable, {} rejected, {} clamped, {} folded, {} duplicates",
        r.input_rows,
        r.usable_events,
        r.rejected_total(),
        r.clamped_points,
        r.folded_annotations,
        r.duplicates_removed()
    );
    for (reason, n) in &r.rejected {
        println!("  rejected {reason:?}: {n}");
    }
    for d in &r.directions {
        println!("  {} half {}: {:?} ({:?})", d.team, d.half, d.direction, d.source);
    }
}
