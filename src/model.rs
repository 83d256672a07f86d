use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::PitchConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// 180 degree rotation about the pitch centre.
    pub fn reflect(&self, pitch: &PitchConfig) -> Point {
        Point {
            x: pitch.length - self.x,
            y: pitch.width - self.y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerRef {
    pub name: String,
    pub number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerKey {
    pub team: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackDirection {
    LeftToRight,
    RightToLeft,
}

impl AttackDirection {
    pub fn flipped(self) -> Self {
        match self {
            AttackDirection::LeftToRight => AttackDirection::RightToLeft,
            AttackDirection::RightToLeft => AttackDirection::LeftToRight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    Successful,
    Unsuccessful,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PassTags {
    pub forward: bool,
    pub long: bool,
    pub key: bool,
    pub provider_progressive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassAnnotation {
    Progressive,
    LongAccurate,
    LongInaccurate,
    Key,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DribbleOutcome {
    Successful,
    Unsuccessful,
    Attempted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefensiveKind {
    Tackle,
    Interception,
    Clearance,
    Block,
    Aerial,
    Challenge,
    Duel,
    Recovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuelOutcome {
    Won,
    Lost,
    NotApplicable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotOutcome {
    Goal,
    OnTarget,
    OffTarget,
    Blocked,
}

/// Flat outcome view shared by all action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Successful,
    Unsuccessful,
    Goal,
    OnTarget,
    OffTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Pass { outcome: PassOutcome, tags: PassTags },
    PassAnnotation { annotation: PassAnnotation },
    Dribble { outcome: DribbleOutcome },
    Defensive { kind: DefensiveKind, outcome: DuelOutcome },
    Shot { outcome: ShotOutcome },
    Other { label: String },
}

impl DefensiveKind {
    pub fn label(&self) -> &'static str {
        match self {
            DefensiveKind::Tackle => "Tackles",
            DefensiveKind::Interception => "Interceptions",
            DefensiveKind::Clearance => "Clearances",
            DefensiveKind::Block => "Blocks",
            DefensiveKind::Aerial => "Aerial duels",
            DefensiveKind::Challenge => "Challenges",
            DefensiveKind::Duel => "Duels",
            DefensiveKind::Recovery => "Ball recoveries",
        }
    }
}

impl ShotOutcome {
    pub fn is_on_target(&self) -> bool {
        matches!(self, ShotOutcome::Goal | ShotOutcome::OnTarget)
    }
}

impl Action {
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Action::Pass { outcome, .. } => Some(match outcome {
                PassOutcome::Successful => Outcome::Successful,
                PassOutcome::Unsuccessful => Outcome::Unsuccessful,
            }),
            Action::Dribble { outcome } => match outcome {
                DribbleOutcome::Successful => Some(Outcome::Successful),
                DribbleOutcome::Unsuccessful => Some(Outcome::Unsuccessful),
                DribbleOutcome::Attempted => None,
            },
            Action::Defensive { outcome, .. } => match outcome {
                DuelOutcome::Won => Some(Outcome::Successful),
                DuelOutcome::Lost => Some(Outcome::Unsuccessful),
                DuelOutcome::NotApplicable => None,
            },
            Action::Shot { outcome } => Some(match outcome {
                ShotOutcome::Goal => Outcome::Goal,
                ShotOutcome::OnTarget => Outcome::OnTarget,
                ShotOutcome::OffTarget | ShotOutcome::Blocked => Outcome::OffTarget,
            }),
            Action::PassAnnotation { .. } | Action::Other { .. } => None,
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Action::Pass { .. })
    }

    pub fn is_dribble(&self) -> bool {
        matches!(self, Action::Dribble { .. })
    }

    pub fn is_defensive(&self) -> bool {
        matches!(self, Action::Defensive { .. })
    }

    /// Defending that happens between the ball and the team's own goal.
    pub fn is_goal_side_defending(&self) -> bool {
        matches!(
            self,
            Action::Defensive {
                kind: DefensiveKind::Tackle
                    | DefensiveKind::Interception
                    | DefensiveKind::Clearance
                    | DefensiveKind::Block,
                ..
            }
        )
    }

    pub fn shot_outcome(&self) -> Option<ShotOutcome> {
        match self {
            Action::Shot { outcome } => Some(*outcome),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub event_id: usize,
    pub source_id: i64,
    pub timestamp: f64,
    pub end_time: Option<f64>,
    pub half: u8,
    pub code: String,
    pub team: String,
    pub player: Option<PlayerRef>,
    pub action_label: String,
    pub action: Action,
    pub start: Point,
    pub end: Option<Point>,
    pub is_progressive: bool,
    // Provider label groups with no dedicated field, keyed by group name.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl NormalizedEvent {
    pub fn belongs_to(&self, key: &PlayerKey) -> bool {
        self.team == key.team && self.player.as_ref().is_some_and(|p| p.name == key.name)
    }

    pub fn player_key(&self) -> Option<PlayerKey> {
        self.player.as_ref().map(|p| PlayerKey {
            team: self.team.clone(),
            name: p.name.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub key: PlayerKey,
    pub number: Option<u32>,
    pub first_involvement: f64,
    pub last_involvement: f64,
    pub entry: f64,
    pub exit: f64,
    pub event_count: usize,
}

impl PlayerProfile {
    pub fn effective_secs(&self) -> f64 {
        (self.exit - self.entry).max(0.0)
    }

    pub fn on_pitch_during(&self, start: f64, end: f64) -> bool {
        self.entry < end && self.exit >= start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionSource {
    Override,
    ShotGeometry,
    DefensiveGeometry,
    // Derived from the other team in the same half or the same team in another half.
    Inferred,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionDecision {
    pub team: String,
    pub half: u8,
    pub direction: AttackDirection,
    pub source: DirectionSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MissingTimestamp,
    InvalidTimestamp,
    MissingCoordinates,
    NoTeam,
    ExtraTeam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKind {
    Repeat,
    GoalEcho,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateRecord {
    pub dropped_event: usize,
    pub kept_event: usize,
    pub kind: DuplicateKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub input_rows: usize,
    pub rejected: BTreeMap<RejectReason, usize>,
    pub clamped_points: usize,
    pub folded_annotations: usize,
    pub events_before_dedup: usize,
    pub duplicates: Vec<DuplicateRecord>,
    pub directions: Vec<DirectionDecision>,
    pub usable_events: usize,
}

impl NormalizationReport {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    pub fn reject(&mut self, reason: RejectReason) {
        *self.rejected.entry(reason).or_insert(0) += 1;
    }

    pub fn duplicates_removed(&self) -> usize {
        self.duplicates.len()
    }
}

/// Read-only after normalization; shared across metric workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTable {
    pub pitch: PitchConfig,
    pub teams: Vec<String>,
    pub events: Vec<NormalizedEvent>,
    pub players: Vec<PlayerProfile>,
    pub match_end: f64,
}

impl EventTable {
    pub fn player(&self, name: &str, team: Option<&str>) -> Option<&PlayerProfile> {
        self.players
            .iter()
            .find(|p| p.key.name == name && team.is_none_or(|t| p.key.team == t))
    }

    pub fn team_players<'a>(&'a self, team: &'a str) -> impl Iterator<Item = &'a PlayerProfile> + 'a {
        self.players.iter().filter(move |p| p.key.team == team)
    }
}
