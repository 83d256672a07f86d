use serde::{Deserialize, Serialize};

use crate::config::{ActivityMeasure, TimelineConfig};
use crate::metrics::Subject;
use crate::model::{EventTable, NormalizedEvent, PlayerProfile};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub window: usize,
    pub start_secs: f64,
    pub end_secs: f64,
    pub minute: u32,
    // None while the player is off the pitch.
    pub player_value: Option<u32>,
    pub team_average: Option<f64>,
    pub players_on_pitch: u32,
    pub team_total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub window_secs: f64,
    pub measure: ActivityMeasure,
    pub points: Vec<TimelinePoint>,
}

impl Timeline {
    /// Sum of team averages weighted by on-pitch players; equals the group's
    /// total counted activity.
    pub fn weighted_team_total(&self) -> f64 {
        self.points
            .iter()
            .filter_map(|p| p.team_average.map(|avg| avg * p.players_on_pitch as f64))
            .sum()
    }

    pub fn player_total(&self) -> u32 {
        self.points.iter().filter_map(|p| p.player_value).sum()
    }
}

pub fn counts_toward(measure: ActivityMeasure, event: &NormalizedEvent) -> bool {
    match measure {
        ActivityMeasure::Involvements => true,
        ActivityMeasure::Passes => event.action.is_pass(),
        ActivityMeasure::Dribbles => event.action.is_dribble(),
        ActivityMeasure::DefensiveActions => event.action.is_defensive(),
        ActivityMeasure::Shots => event.action.shot_outcome().is_some(),
    }
}

/// Windows tiling `[0, match_end]`; an event at exactly `match_end` lands in the last one.
pub fn window_count(match_end: f64, window_secs: f64) -> usize {
    ((match_end.max(0.0) / window_secs).ceil() as usize).max(1)
}

pub fn build_timeline(table: &EventTable, subject: &Subject<'_>, cfg: &TimelineConfig) -> Timeline {
    let window_secs = cfg.window_secs;
    let n = window_count(table.match_end, window_secs);
    let bucket = |ts: f64| ((ts / window_secs).floor().max(0.0) as usize).min(n - 1);

    let group_team = subject.team();
    let in_group = |team: &str| group_team.is_none_or(|t| t == team);
    let group: Vec<&PlayerProfile> = table.players.iter().filter(|p| in_group(&p.key.team)).collect();

    let mut subject_counts = vec![0u32; n];
    let mut team_totals = vec![0u32; n];
    for event in &table.events {
        if !counts_toward(cfg.measure, event) {
            continue;
        }
        let idx = bucket(event.timestamp);
        if subject.includes(event) {
            subject_counts[idx] += 1;
        }
        if event.player.is_some() && in_group(&event.team) {
            team_totals[idx] += 1;
        }
    }

    let points = (0..n)
        .map(|idx| {
            let start = idx as f64 * window_secs;
            let end = start + window_secs;
            // The last window also holds events at exactly `match_end`.
            let reach = if idx + 1 == n { f64::INFINITY } else { end };
            let on_pitch = group.iter().filter(|p| p.on_pitch_during(start, reach)).count() as u32;
            let player_value = match subject {
                Subject::Player(profile) => {
                    profile.on_pitch_during(start, reach).then_some(subject_counts[idx])
                }
                Subject::Team(_) | Subject::All => Some(subject_counts[idx]),
            };
            let team_average = (on_pitch > 0).then(|| team_totals[idx] as f64 / on_pitch as f64);
            TimelinePoint {
                window: idx,
                start_secs: start,
                end_secs: end,
                minute: (start / 60.0) as u32,
                player_value,
                team_average,
                players_on_pitch: on_pitch,
                team_total: team_totals[idx],
            }
        })
        .collect();

    Timeline {
        window_secs,
        measure: cfg.measure,
        points,
    }
}
