use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::AttackDirection;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pitch: PitchConfig,
    pub progressive: ProgressivePassPolicy,
    pub dedup: DedupConfig,
    pub heatmap: HeatmapConfig,
    pub timeline: TimelineConfig,
    // Played from kickoff when the first involvement lands inside this many seconds.
    pub entry_grace_secs: f64,
    pub min_match_secs: f64,
    pub direction_overrides: Vec<DirectionOverride>,
    // Worker threads for batch report building.
    pub report_threads: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    pub length: f64,
    pub width: f64,
    pub source_length: f64,
    pub source_width: f64,
}

/// Minimum reduction in distance to the attacking goal centre, in metres, for a
/// completed pass to count as progressive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressivePassPolicy {
    pub own_half_m: f64,
    pub cross_half_m: f64,
    pub opp_half_m: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub window_secs: f64,
    pub position_tolerance_m: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    pub bins_x: usize,
    pub bins_y: usize,
    pub sigma: f64,
    pub truncate: f64,
    pub min_events: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub window_secs: f64,
    pub measure: ActivityMeasure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivityMeasure {
    #[default]
    Involvements,
    Passes,
    Dribbles,
    DefensiveActions,
    Shots,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionOverride {
    pub team: String,
    pub half: u8,
    pub direction: AttackDirection,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pitch: PitchConfig::default(),
            progressive: ProgressivePassPolicy::default(),
            dedup: DedupConfig::default(),
            heatmap: HeatmapConfig::default(),
            timeline: TimelineConfig::default(),
            entry_grace_secs: 600.0,
            min_match_secs: 5400.0,
            direction_overrides: Vec::new(),
            report_threads: 4,
        }
    }
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            length: 105.0,
            width: 68.0,
            source_length: 105.0,
            source_width: 68.0,
        }
    }
}

impl Default for ProgressivePassPolicy {
    fn default() -> Self {
        Self {
            own_half_m: 30.0,
            cross_half_m: 15.0,
            opp_half_m: 10.0,
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_secs: 1.0,
            position_tolerance_m: 0.5,
        }
    }
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            bins_x: 20,
            bins_y: 20,
            sigma: 1.0,
            truncate: 4.0,
            min_events: 5,
        }
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            window_secs: 300.0,
            measure: ActivityMeasure::Involvements,
        }
    }
}

impl ActivityMeasure {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('-', "_").as_str() {
            "involvements" | "actions" | "all" => Some(ActivityMeasure::Involvements),
            "passes" => Some(ActivityMeasure::Passes),
            "dribbles" => Some(ActivityMeasure::Dribbles),
            "defensive_actions" | "defensive" => Some(ActivityMeasure::DefensiveActions),
            "shots" => Some(ActivityMeasure::Shots),
            _ => None,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `APP_*` environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    /// JSON file with `APP_*` variables applied on top; missing keys keep their default.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let mut cfg: EngineConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parse config {}", path.display()))?;
        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        env_f64("APP_PITCH_LENGTH", &mut self.pitch.length);
        env_f64("APP_PITCH_WIDTH", &mut self.pitch.width);
        env_f64("APP_SOURCE_LENGTH", &mut self.pitch.source_length);
        env_f64("APP_SOURCE_WIDTH", &mut self.pitch.source_width);
        env_f64("APP_DEDUP_WINDOW_SECS", &mut self.dedup.window_secs);
        env_f64("APP_HEATMAP_SIGMA", &mut self.heatmap.sigma);
        env_usize("APP_HEATMAP_BINS_X", &mut self.heatmap.bins_x);
        env_usize("APP_HEATMAP_BINS_Y", &mut self.heatmap.bins_y);
        env_f64("APP_TIMELINE_WINDOW_SECS", &mut self.timeline.window_secs);
        env_f64("APP_ENTRY_GRACE_SECS", &mut self.entry_grace_secs);
        env_usize("APP_REPORT_THREADS", &mut self.report_threads);
        if let Some(measure) = std::env::var("APP_TIMELINE_MEASURE")
            .ok()
            .and_then(|raw| ActivityMeasure::parse(&raw))
        {
            self.timeline.measure = measure;
        }
        self.sanitize();
    }

    pub fn sanitize(&mut self) {
        self.pitch.length = positive_or(self.pitch.length, 105.0);
        self.pitch.width = positive_or(self.pitch.width, 68.0);
        self.pitch.source_length = positive_or(self.pitch.source_length, self.pitch.length);
        self.pitch.source_width = positive_or(self.pitch.source_width, self.pitch.width);
        self.timeline.window_secs = positive_or(self.timeline.window_secs, 300.0);
        self.heatmap.bins_x = self.heatmap.bins_x.max(1);
        self.heatmap.bins_y = self.heatmap.bins_y.max(1);
        if !self.heatmap.sigma.is_finite() || self.heatmap.sigma < 0.0 {
            self.heatmap.sigma = 0.0;
        }
        // Wider than the grid is indistinguishable from uniform.
        let grid_size = self.heatmap.bins_x.max(self.heatmap.bins_y) as f64;
        self.heatmap.sigma = self.heatmap.sigma.min(grid_size);
        if !self.heatmap.truncate.is_finite() || self.heatmap.truncate < 0.0 {
            self.heatmap.truncate = 4.0;
        }
        self.dedup.window_secs = self.dedup.window_secs.max(0.0);
        self.report_threads = self.report_threads.clamp(1, 32);
    }

    pub fn direction_override(&self, team: &str, half: u8) -> Option<AttackDirection> {
        self.direction_overrides
            .iter()
            .find(|o| o.half == half && o.team == team)
            .map(|o| o.direction)
    }
}

fn env_f64(key: &str, slot: &mut f64) {
    if let Some(v) = std::env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
    {
        *slot = v;
    }
}

fn env_usize(key: &str, slot: &mut usize) {
    if let Some(v) = std::env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<usize>().ok())
    {
        *slot = v;
    }
}

fn positive_or(v: f64, fallback: f64) -> f64 {
    if v.is_finite() && v > 0.0 { v } else { fallback }
}
