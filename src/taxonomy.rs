use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::model::{
    Action, DefensiveKind, DribbleOutcome, DuelOutcome, PassAnnotation, PassOutcome, PassTags,
    ShotOutcome,
};

// Instat action labels; matching is case-insensitive on the trimmed label.
static ACTIONS: Lazy<HashMap<&'static str, Action>> = Lazy::new(|| {
    let pass = |outcome, forward| Action::Pass {
        outcome,
        tags: PassTags {
            forward,
            ..PassTags::default()
        },
    };
    let annotation = |annotation| Action::PassAnnotation { annotation };
    let dribble = |outcome| Action::Dribble { outcome };
    let defensive = |kind, outcome| Action::Defensive { kind, outcome };
    let shot = |outcome| Action::Shot { outcome };

    HashMap::from([
        ("passes accurate", pass(PassOutcome::Successful, false)),
        ("passes forward accurate", pass(PassOutcome::Successful, true)),
        ("inaccurate passes", pass(PassOutcome::Unsuccessful, false)),
        ("passes inaccurate", pass(PassOutcome::Unsuccessful, false)),
        ("incomplete passes forward", pass(PassOutcome::Unsuccessful, true)),
        ("progressive passes accurate", annotation(PassAnnotation::Progressive)),
        ("long passes accurate", annotation(PassAnnotation::LongAccurate)),
        ("long passes inaccurate", annotation(PassAnnotation::LongInaccurate)),
        ("key passes", annotation(PassAnnotation::Key)),
        ("dribbling successful", dribble(DribbleOutcome::Successful)),
        ("take on successful", dribble(DribbleOutcome::Successful)),
        ("dribbling unsuccessful", dribble(DribbleOutcome::Unsuccessful)),
        ("take on unsuccessful", dribble(DribbleOutcome::Unsuccessful)),
        ("dribbles", dribble(DribbleOutcome::Attempted)),
        ("dribbling", dribble(DribbleOutcome::Attempted)),
        ("tackles successful", defensive(DefensiveKind::Tackle, DuelOutcome::Won)),
        ("tackles unsuccessful", defensive(DefensiveKind::Tackle, DuelOutcome::Lost)),
        ("interceptions", defensive(DefensiveKind::Interception, DuelOutcome::NotApplicable)),
        ("clearances", defensive(DefensiveKind::Clearance, DuelOutcome::NotApplicable)),
        ("blocks", defensive(DefensiveKind::Block, DuelOutcome::NotApplicable)),
        ("ball recoveries", defensive(DefensiveKind::Recovery, DuelOutcome::NotApplicable)),
        ("challenges won", defensive(DefensiveKind::Challenge, DuelOutcome::Won)),
        ("challenges unsuccessful", defensive(DefensiveKind::Challenge, DuelOutcome::Lost)),
        ("challenges lost", defensive(DefensiveKind::Challenge, DuelOutcome::Lost)),
        ("duels won", defensive(DefensiveKind::Duel, DuelOutcome::Won)),
        ("duels lost", defensive(DefensiveKind::Duel, DuelOutcome::Lost)),
        ("air challenges won", defensive(DefensiveKind::Aerial, DuelOutcome::Won)),
        ("air challenges lost", defensive(DefensiveKind::Aerial, DuelOutcome::Lost)),
        ("aerial duels won", defensive(DefensiveKind::Aerial, DuelOutcome::Won)),
        ("aerial duels lost", defensive(DefensiveKind::Aerial, DuelOutcome::Lost)),
        ("goals", shot(ShotOutcome::Goal)),
        ("shots on target", shot(ShotOutcome::OnTarget)),
        ("shots off target", shot(ShotOutcome::OffTarget)),
        ("shots blocked", shot(ShotOutcome::Blocked)),
    ])
});

pub fn classify(label: &str) -> Action {
    let key = label.trim().to_lowercase();
    ACTIONS.get(key.as_str()).cloned().unwrap_or_else(|| Action::Other {
        label: label.trim().to_string(),
    })
}
