use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::heatmap::DensityGrid;
use crate::metrics::{PassingStats, StatsBundle};
use crate::model::{
    Action, DefensiveKind, DribbleOutcome, NormalizedEvent, PassOutcome, Point, ShotOutcome,
};
use crate::timeline::Timeline;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point,
    pub end: Option<Point>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassPanel {
    pub progressive: Vec<Segment>,
    pub successful: Vec<Segment>,
    pub unsuccessful: Vec<Segment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DribblePanel {
    pub successful: Vec<Point>,
    pub unsuccessful: Vec<Point>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShotPanel {
    pub goals: Vec<Point>,
    pub on_target: Vec<Point>,
    pub off_target: Vec<Point>,
}

/// Everything the renderer needs for one subject, in canonical pitch space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerReport {
    pub player: String,
    pub team: Option<String>,
    pub shirt_number: Option<u32>,
    pub generated_at: DateTime<Utc>,
    pub pitch_length: f64,
    pub pitch_width: f64,
    pub effective_minutes: Option<u32>,
    pub passes: PassPanel,
    pub dribbles: DribblePanel,
    pub defensive: BTreeMap<DefensiveKind, Vec<Point>>,
    pub shots: ShotPanel,
    pub heatmap: Option<DensityGrid>,
    pub timeline: Timeline,
    pub summary: BTreeMap<String, Option<f64>>,
    pub stats: StatsBundle,
}

impl PlayerReport {
    /// `<player>_<team>_report`; the team part is left out for whole-team reports.
    pub fn file_stem(&self) -> String {
        let mut stem = stem_part(&self.player);
        if let Some(team) = self.team.as_deref().filter(|t| *t != self.player) {
            stem.push('_');
            stem.push_str(&stem_part(team));
        }
        format!("{stem}_report")
    }
}

fn stem_part(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

pub fn build_player_report(
    bundle: StatsBundle,
    events: &[&NormalizedEvent],
    cfg: &EngineConfig,
) -> PlayerReport {
    let mut passes = PassPanel::default();
    let mut dribbles = DribblePanel::default();
    let mut defensive: BTreeMap<DefensiveKind, Vec<Point>> = BTreeMap::new();
    let mut shots = ShotPanel::default();

    for event in events {
        match &event.action {
            Action::Pass { outcome, .. } => {
                let segment = Segment {
                    start: event.start,
                    end: event.end,
                };
                match outcome {
                    PassOutcome::Successful if event.is_progressive => passes.progressive.push(segment),
                    PassOutcome::Successful => passes.successful.push(segment),
                    PassOutcome::Unsuccessful => passes.unsuccessful.push(segment),
                }
            }
            Action::Dribble { outcome } => match outcome {
                DribbleOutcome::Successful => dribbles.successful.push(event.start),
                DribbleOutcome::Unsuccessful => dribbles.unsuccessful.push(event.start),
                DribbleOutcome::Attempted => {}
            },
            Action::Defensive { kind, .. } => defensive.entry(*kind).or_default().push(event.start),
            Action::Shot { outcome } => match outcome {
                ShotOutcome::Goal => shots.goals.push(event.start),
                ShotOutcome::OnTarget => shots.on_target.push(event.start),
                ShotOutcome::OffTarget | ShotOutcome::Blocked => shots.off_target.push(event.start),
            },
            Action::PassAnnotation { .. } | Action::Other { .. } => {}
        }
    }

    let heatmap = (bundle.heatmap.event_count >= cfg.heatmap.min_events).then(|| bundle.heatmap.clone());
    if heatmap.is_none() {
        log::debug!(
            "heatmap skipped for {}: {} events",
            bundle.label,
            bundle.heatmap.event_count
        );
    }

    PlayerReport {
        player: bundle.label.clone(),
        team: bundle.team.clone(),
        shirt_number: bundle.shirt_number,
        generated_at: Utc::now(),
        pitch_length: cfg.pitch.length,
        pitch_width: cfg.pitch.width,
        effective_minutes: bundle.playing_time.as_ref().map(|t| t.effective_minutes),
        passes,
        dribbles,
        defensive,
        shots,
        heatmap,
        timeline: bundle.timeline.clone(),
        summary: summary_metrics(&bundle),
        stats: bundle,
    }
}

pub fn summary_metrics(bundle: &StatsBundle) -> BTreeMap<String, Option<f64>> {
    let PassingStats {
        total,
        successful,
        progressive,
        long,
        key,
        accuracy,
        ..
    } = &bundle.passing;
    let d = &bundle.dribbling;
    let def = &bundle.defending;
    let s = &bundle.shooting;

    let mut out = BTreeMap::new();
    let mut put = |name: &str, value: Option<f64>| {
        out.insert(name.to_string(), value);
    };
    put("passes_total", Some(*total as f64));
    put("passes_successful", Some(*successful as f64));
    put("pass_accuracy_pct", accuracy.percent());
    put("passes_progressive", Some(*progressive as f64));
    put("passes_long", Some(*long as f64));
    put("passes_key", Some(*key as f64));
    put("dribbles_attempted", Some(d.attempts as f64));
    put("dribbles_successful", Some(d.successful as f64));
    put("dribble_success_pct", d.success_rate.percent());
    put("defensive_actions", Some(def.total as f64));
    put("challenges", Some(def.challenges as f64));
    put("challenge_success_pct", def.challenge_success.percent());
    for (kind, count) in &def.by_kind {
        let name = kind.label().to_lowercase().replace(' ', "_");
        put(&format!("def_{name}"), Some(count.count as f64));
    }
    put("ball_recoveries", Some(def.ball_recoveries as f64));
    put("ball_recoveries_opp_half", Some(def.ball_recoveries_opp_half as f64));
    put("shots_total", Some(s.total as f64));
    put("goals", Some(s.goals as f64));
    put("shots_on_target", Some((s.goals + s.on_target) as f64));
    put("shot_conversion_pct", s.conversion.percent());
    put("shots_on_target_pct", s.on_target_rate.percent());
    put(
        "effective_minutes",
        bundle.playing_time.as_ref().map(|t| t.effective_minutes as f64),
    );
    out
}
