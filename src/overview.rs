use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::model::{EventTable, Outcome, PlayerProfile};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamActivity {
    pub events: usize,
    pub successful: usize,
    pub unsuccessful: usize,
    pub goals: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchOverview {
    pub total_events: usize,
    pub teams: Vec<String>,
    pub players_per_team: BTreeMap<String, usize>,
    pub team_activity: BTreeMap<String, TeamActivity>,
    pub action_counts: Vec<ActionCount>,
    pub events_per_half: BTreeMap<u8, usize>,
    pub first_timestamp: f64,
    pub last_timestamp: f64,
    pub duration_minutes: f64,
}

impl MatchOverview {
    pub fn from_table(table: &EventTable) -> Self {
        let mut by_label: HashMap<&str, usize> = HashMap::new();
        let mut per_half = BTreeMap::new();
        let mut team_activity: BTreeMap<String, TeamActivity> = BTreeMap::new();
        for event in &table.events {
            *by_label.entry(event.action_label.as_str()).or_insert(0) += 1;
            *per_half.entry(event.half).or_insert(0) += 1;
            let activity = team_activity.entry(event.team.clone()).or_default();
            activity.events += 1;
            match event.action.outcome() {
                Some(Outcome::Successful | Outcome::OnTarget) => activity.successful += 1,
                Some(Outcome::Goal) => {
                    activity.successful += 1;
                    activity.goals += 1;
                }
                Some(Outcome::Unsuccessful | Outcome::OffTarget) => activity.unsuccessful += 1,
                None => {}
            }
        }
        let mut action_counts: Vec<ActionCount> = by_label
            .into_iter()
            .map(|(label, count)| ActionCount {
                label: label.to_string(),
                count,
            })
            .collect();
        action_counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));

        let first_timestamp = table
            .events
            .iter()
            .map(|e| e.timestamp)
            .fold(f64::INFINITY, f64::min);
        let last_timestamp = table.events.iter().map(|e| e.timestamp).fold(0.0, f64::max);
        let first_timestamp = if first_timestamp.is_finite() { first_timestamp } else { 0.0 };

        let players_per_team = table
            .teams
            .iter()
            .map(|team| (team.clone(), table.team_players(team).count()))
            .collect();

        Self {
            total_events: table.events.len(),
            teams: table.teams.clone(),
            players_per_team,
            team_activity,
            action_counts,
            events_per_half: per_half,
            first_timestamp,
            last_timestamp,
            duration_minutes: (last_timestamp - first_timestamp) / 60.0,
        }
    }
}

/// Players sorted by name, optionally limited to one team.
pub fn players<'a>(table: &'a EventTable, team: Option<&str>) -> Vec<&'a PlayerProfile> {
    let mut out: Vec<&PlayerProfile> = table
        .players
        .iter()
        .filter(|p| team.is_none_or(|t| p.key.team == t))
        .collect();
    out.sort_by(|a, b| a.key.name.cmp(&b.key.name).then_with(|| a.key.team.cmp(&b.key.team)));
    out
}
