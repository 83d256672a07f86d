use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, PitchConfig};
use crate::error::InsufficientDataError;
use crate::heatmap::{self, DensityGrid};
use crate::model::{
    Action, DefensiveKind, DribbleOutcome, DuelOutcome, EventTable, NormalizedEvent, PassOutcome,
    PlayerProfile, ShotOutcome,
};
use crate::timeline::{self, Timeline};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    Player { name: String, team: Option<String> },
    Team { name: String },
    All,
}

impl Selection {
    pub fn player(name: impl Into<String>) -> Self {
        Selection::Player {
            name: name.into(),
            team: None,
        }
    }

    pub fn team(name: impl Into<String>) -> Self {
        Selection::Team { name: name.into() }
    }

    pub fn describe(&self) -> String {
        match self {
            Selection::Player { name, team: Some(team) } => format!("{name} ({team})"),
            Selection::Player { name, team: None } => name.clone(),
            Selection::Team { name } => format!("team {name}"),
            Selection::All => "all players".to_string(),
        }
    }
}

/// A selection resolved against one table.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Player(&'a PlayerProfile),
    Team(&'a str),
    All,
}

impl<'a> Subject<'a> {
    pub fn resolve(table: &'a EventTable, selection: &Selection) -> Result<Self, InsufficientDataError> {
        match selection {
            Selection::Player { name, team } => table
                .player(name, team.as_deref())
                .map(Subject::Player)
                .ok_or_else(|| InsufficientDataError::PlayerNotFound {
                    player: name.clone(),
                }),
            Selection::Team { name } => table
                .teams
                .iter()
                .find(|t| *t == name)
                .map(|t| Subject::Team(t.as_str()))
                .ok_or_else(|| InsufficientDataError::NoData {
                    selection: selection.describe(),
                }),
            Selection::All => Ok(Subject::All),
        }
    }

    pub fn includes(&self, event: &NormalizedEvent) -> bool {
        match *self {
            Subject::Player(profile) => event.belongs_to(&profile.key),
            Subject::Team(team) => event.team == team,
            Subject::All => true,
        }
    }

    /// Team the subject is compared against; `None` compares against everyone.
    pub fn team(&self) -> Option<&'a str> {
        match *self {
            Subject::Player(profile) => Some(profile.key.team.as_str()),
            Subject::Team(team) => Some(team),
            Subject::All => None,
        }
    }
}

/// `numerator / denominator`, undefined when nothing was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rate {
    pub numerator: u32,
    pub denominator: u32,
}

impl Rate {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator: numerator.min(denominator),
            denominator,
        }
    }

    pub fn value(&self) -> Option<f64> {
        (self.denominator > 0).then(|| self.numerator as f64 / self.denominator as f64)
    }

    pub fn percent(&self) -> Option<f64> {
        self.value().map(|v| v * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PassingStats {
    pub total: u32,
    pub successful: u32,
    pub unsuccessful: u32,
    pub progressive: u32,
    pub forward: u32,
    pub long: u32,
    pub key: u32,
    pub accuracy: Rate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutcomeCount {
    pub successful: u32,
    pub unsuccessful: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThirdSplit {
    pub defensive: OutcomeCount,
    pub middle: OutcomeCount,
    pub attacking: OutcomeCount,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DribbleStats {
    pub attempts: u32,
    pub successful: u32,
    pub unsuccessful: u32,
    pub unresolved: u32,
    pub success_rate: Rate,
    pub by_third: ThirdSplit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KindCount {
    pub count: u32,
    pub won: u32,
    pub lost: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DefensiveStats {
    pub total: u32,
    pub by_kind: BTreeMap<DefensiveKind, KindCount>,
    pub challenges: u32,
    pub challenges_won: u32,
    pub challenge_success: Rate,
    pub ball_recoveries: u32,
    pub ball_recoveries_opp_half: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShotStats {
    pub total: u32,
    pub goals: u32,
    pub on_target: u32,
    pub off_target: u32,
    pub blocked: u32,
    pub conversion: Rate,
    pub on_target_rate: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayingTime {
    pub first_involvement: f64,
    pub last_involvement: f64,
    pub entry: f64,
    pub exit: f64,
    pub effective_secs: f64,
    pub effective_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsBundle {
    pub selection: Selection,
    pub label: String,
    pub team: Option<String>,
    pub shirt_number: Option<u32>,
    pub events_considered: usize,
    pub passing: PassingStats,
    pub dribbling: DribbleStats,
    pub defending: DefensiveStats,
    pub shooting: ShotStats,
    pub playing_time: Option<PlayingTime>,
    pub heatmap: DensityGrid,
    pub timeline: Timeline,
}

pub fn compute(
    table: &EventTable,
    selection: &Selection,
    cfg: &EngineConfig,
) -> Result<StatsBundle, InsufficientDataError> {
    let subject = Subject::resolve(table, selection)?;
    let events: Vec<&NormalizedEvent> = table.events.iter().filter(|e| subject.includes(e)).collect();
    if events.is_empty() {
        return Err(InsufficientDataError::NoData {
            selection: selection.describe(),
        });
    }

    let (label, shirt_number, playing_time) = match subject {
        Subject::Player(profile) => (
            profile.key.name.clone(),
            profile.number,
            Some(playing_time(profile)),
        ),
        Subject::Team(team) => (team.to_string(), None, None),
        Subject::All => ("All players".to_string(), None, None),
    };

    Ok(StatsBundle {
        selection: selection.clone(),
        label,
        team: subject.team().map(str::to_string),
        shirt_number,
        events_considered: events.len(),
        passing: passing_stats(&events),
        dribbling: dribble_stats(&events, &table.pitch),
        defending: defensive_stats(&events, &table.pitch),
        shooting: shot_stats(&events),
        playing_time,
        heatmap: heatmap::density_grid(events.iter().map(|e| e.start), &table.pitch, &cfg.heatmap),
        timeline: timeline::build_timeline(table, &subject, &cfg.timeline),
    })
}

pub fn playing_time(profile: &PlayerProfile) -> PlayingTime {
    let effective_secs = profile.effective_secs();
    PlayingTime {
        first_involvement: profile.first_involvement,
        last_involvement: profile.last_involvement,
        entry: profile.entry,
        exit: profile.exit,
        effective_secs,
        effective_minutes: (effective_secs / 60.0) as u32,
    }
}

pub fn passing_stats(events: &[&NormalizedEvent]) -> PassingStats {
    let mut out = PassingStats::default();
    for event in events {
        let Action::Pass { outcome, tags } = &event.action else {
            continue;
        };
        out.total += 1;
        match outcome {
            PassOutcome::Successful => out.successful += 1,
            PassOutcome::Unsuccessful => out.unsuccessful += 1,
        }
        if event.is_progressive {
            out.progressive += 1;
        }
        out.forward += tags.forward as u32;
        out.long += tags.long as u32;
        out.key += tags.key as u32;
    }
    out.accuracy = Rate::new(out.successful, out.total);
    out
}

pub fn dribble_stats(events: &[&NormalizedEvent], pitch: &PitchConfig) -> DribbleStats {
    let mut out = DribbleStats::default();
    for event in events {
        let Action::Dribble { outcome } = event.action else {
            continue;
        };
        let third = third_of(event.start.x, pitch);
        let split = match third {
            Third::Defensive => &mut out.by_third.defensive,
            Third::Middle => &mut out.by_third.middle,
            Third::Attacking => &mut out.by_third.attacking,
        };
        match outcome {
            DribbleOutcome::Successful => {
                split.successful += 1;
                out.successful += 1;
            }
            DribbleOutcome::Unsuccessful => {
                split.unsuccessful += 1;
                out.unsuccessful += 1;
            }
            DribbleOutcome::Attempted => out.unresolved += 1,
        }
    }
    out.attempts = out.successful + out.unsuccessful;
    out.success_rate = Rate::new(out.successful, out.attempts);
    out
}

pub fn defensive_stats(events: &[&NormalizedEvent], pitch: &PitchConfig) -> DefensiveStats {
    let mut out = DefensiveStats::default();
    for event in events {
        let Action::Defensive { kind, outcome } = event.action else {
            continue;
        };
        out.total += 1;
        let entry = out.by_kind.entry(kind).or_default();
        entry.count += 1;
        match outcome {
            DuelOutcome::Won => entry.won += 1,
            DuelOutcome::Lost => entry.lost += 1,
            DuelOutcome::NotApplicable => {}
        }
        match kind {
            DefensiveKind::Challenge => {
                out.challenges += 1;
                if outcome == DuelOutcome::Won {
                    out.challenges_won += 1;
                }
            }
            DefensiveKind::Recovery => {
                out.ball_recoveries += 1;
                if event.start.x > pitch.length / 2.0 {
                    out.ball_recoveries_opp_half += 1;
                }
            }
            _ => {}
        }
    }
    out.challenge_success = Rate::new(out.challenges_won, out.challenges);
    out
}

pub fn shot_stats(events: &[&NormalizedEvent]) -> ShotStats {
    let mut out = ShotStats::default();
    for event in events {
        let Some(outcome) = event.action.shot_outcome() else {
            continue;
        };
        out.total += 1;
        match outcome {
            ShotOutcome::Goal => out.goals += 1,
            ShotOutcome::OnTarget => out.on_target += 1,
            ShotOutcome::OffTarget => out.off_target += 1,
            ShotOutcome::Blocked => {
                out.off_target += 1;
                out.blocked += 1;
            }
        }
    }
    let on_target = events
        .iter()
        .filter_map(|e| e.action.shot_outcome())
        .filter(ShotOutcome::is_on_target)
        .count() as u32;
    out.conversion = Rate::new(out.goals, out.total);
    out.on_target_rate = Rate::new(on_target, out.total);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Third {
    Defensive,
    Middle,
    Attacking,
}

pub fn third_of(x: f64, pitch: &PitchConfig) -> Third {
    let third = pitch.length / 3.0;
    if x < third {
        Third::Defensive
    } else if x < 2.0 * third {
        Third::Middle
    } else {
        Third::Attacking
    }
}
