use std::collections::{BTreeSet, HashMap};

use crate::config::{EngineConfig, PitchConfig, ProgressivePassPolicy};
use crate::error::NormalizationError;
use crate::model::{
    Action, AttackDirection, DirectionDecision, DirectionSource, DuplicateKind, DuplicateRecord,
    EventTable, NormalizationReport, NormalizedEvent, PassAnnotation, PassOutcome, PassTags,
    PlayerKey, PlayerProfile, Point, RejectReason, ShotOutcome,
};
use crate::parser::EventRecord;
use crate::taxonomy;

pub fn normalize(
    records: &[EventRecord],
    cfg: &EngineConfig,
) -> Result<(EventTable, NormalizationReport), NormalizationError> {
    let mut report = NormalizationReport {
        input_rows: records.len(),
        ..NormalizationReport::default()
    };

    let (mut events, teams) = validate(records, &cfg.pitch, &mut report);
    if events.is_empty() {
        log_rejections(&report);
        return Err(NormalizationError::NoUsableEvents { report });
    }

    report.directions = decide_directions(&events, &teams, cfg);
    apply_directions(&mut events, &report.directions, &cfg.pitch);

    let folded = fold_pass_annotations(&mut events, cfg.dedup.window_secs);
    report.folded_annotations = folded;

    report.events_before_dedup = events.len();
    report.duplicates = dedup_shots(&mut events, cfg);

    for event in events.iter_mut() {
        event.is_progressive = pass_is_progressive(event, &cfg.pitch, &cfg.progressive);
    }

    let players = playing_spans(&events, cfg.entry_grace_secs);
    let last_ts = events.iter().map(|e| e.timestamp).fold(0.0, f64::max);
    let match_end = last_ts.max(cfg.min_match_secs);

    report.usable_events = events.len();
    log_rejections(&report);
    log::info!(
        "Normalized {} of {} rows ({} rejected, {} annotations folded, {} duplicates removed)",
        report.usable_events,
        report.input_rows,
        report.rejected_total(),
        report.folded_annotations,
        report.duplicates_removed()
    );

    let table = EventTable {
        pitch: cfg.pitch,
        teams,
        events,
        players,
        match_end,
    };
    Ok((table, report))
}

fn log_rejections(report: &NormalizationReport) {
    for (reason, count) in &report.rejected {
        log::warn!("Rejected {count} rows: {reason:?}");
    }
    if report.clamped_points > 0 {
        log::warn!("Clamped {} points into the pitch", report.clamped_points);
    }
}

fn validate(
    records: &[EventRecord],
    pitch: &PitchConfig,
    report: &mut NormalizationReport,
) -> (Vec<NormalizedEvent>, Vec<String>) {
    let mut teams: Vec<String> = Vec::new();
    let mut events = Vec::with_capacity(records.len());
    let mut half = 1u8;

    for record in records {
        if let Some(h) = record.half {
            half = h;
        }

        let team = record.team.trim();
        if team.is_empty() || team.eq_ignore_ascii_case("none") {
            report.reject(RejectReason::NoTeam);
            continue;
        }
        let Some(timestamp) = record.start_time else {
            report.reject(RejectReason::MissingTimestamp);
            continue;
        };
        if !timestamp.is_finite() || timestamp < 0.0 {
            report.reject(RejectReason::InvalidTimestamp);
            continue;
        }
        let Some(pos) = record.pos else {
            report.reject(RejectReason::MissingCoordinates);
            continue;
        };
        if !teams.iter().any(|t| t == team) {
            if teams.len() == 2 {
                report.reject(RejectReason::ExtraTeam);
                continue;
            }
            teams.push(team.to_string());
        }

        let start = scale_point(pos, pitch, &mut report.clamped_points);
        let end = record
            .dest
            .map(|d| scale_point(d, pitch, &mut report.clamped_points));

        events.push(NormalizedEvent {
            event_id: record.ordinal,
            source_id: record.source_id,
            timestamp,
            end_time: record.end_time.filter(|t| t.is_finite()),
            half,
            code: record.code.clone(),
            team: team.to_string(),
            player: record.player.clone(),
            action_label: record.action.clone(),
            action: taxonomy::classify(&record.action),
            start,
            end,
            is_progressive: false,
            labels: record.extra_labels.clone(),
        });
    }
    (events, teams)
}

/// Provider range to canonical pitch space, clamped.
pub fn scale_point(p: Point, pitch: &PitchConfig, clamped: &mut usize) -> Point {
    let x = p.x * pitch.length / pitch.source_length;
    let y = p.y * pitch.width / pitch.source_width;
    let cx = x.clamp(0.0, pitch.length);
    let cy = y.clamp(0.0, pitch.width);
    if cx != x || cy != y {
        *clamped += 1;
    }
    Point::new(cx, cy)
}

/// Whether the provider keeps absolute pitch coordinates (the teams at opposite ends,
/// switching at half-time) or already draws every team attacking the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Absolute,
    AttackRelative,
}

type Slot = (usize, u8);

fn decide_directions(
    events: &[NormalizedEvent],
    teams: &[String],
    cfg: &EngineConfig,
) -> Vec<DirectionDecision> {
    let halves: Vec<u8> = events
        .iter()
        .map(|e| e.half)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut known: HashMap<Slot, (AttackDirection, DirectionSource)> = HashMap::new();
    for (t, team) in teams.iter().enumerate() {
        for &half in &halves {
            if let Some(decision) = direction_evidence(events, team, half, cfg) {
                known.insert((t, half), decision);
            }
        }
    }

    let frame = frame_of(&known, &halves);
    log::debug!("coordinate frame: {frame:?}");

    // Each round fills only from slots settled in earlier rounds.
    loop {
        let mut filled = Vec::new();
        for t in 0..teams.len() {
            for &half in &halves {
                if known.contains_key(&(t, half)) {
                    continue;
                }
                if let Some(direction) = infer_direction(&known, t, half, &halves, frame) {
                    filled.push(((t, half), direction));
                }
            }
        }
        if filled.is_empty() {
            break;
        }
        for (slot, direction) in filled {
            known.insert(slot, (direction, DirectionSource::Inferred));
        }
    }

    let mut out = Vec::new();
    for (t, team) in teams.iter().enumerate() {
        for &half in &halves {
            let (direction, source) = known
                .get(&(t, half))
                .copied()
                .unwrap_or((AttackDirection::LeftToRight, DirectionSource::Default));
            log::debug!("{team} half {half}: {direction:?} from {source:?}");
            out.push(DirectionDecision {
                team: team.clone(),
                half,
                direction,
                source,
            });
        }
    }
    out
}

fn direction_evidence(
    events: &[NormalizedEvent],
    team: &str,
    half: u8,
    cfg: &EngineConfig,
) -> Option<(AttackDirection, DirectionSource)> {
    if let Some(direction) = cfg.direction_override(team, half) {
        return Some((direction, DirectionSource::Override));
    }
    let halfway = cfg.pitch.length / 2.0;
    let own = events.iter().filter(|e| e.half == half && e.team == team);

    if let Some(mean) = mean_x(own.clone().filter(|e| e.action.shot_outcome().is_some())) {
        let direction = if mean < halfway {
            AttackDirection::RightToLeft
        } else {
            AttackDirection::LeftToRight
        };
        return Some((direction, DirectionSource::ShotGeometry));
    }
    // Goal-side defending clusters in front of the team's own goal.
    mean_x(own.filter(|e| e.action.is_goal_side_defending())).map(|mean| {
        let direction = if mean > halfway {
            AttackDirection::RightToLeft
        } else {
            AttackDirection::LeftToRight
        };
        (direction, DirectionSource::DefensiveGeometry)
    })
}

fn mean_x<'a>(events: impl Iterator<Item = &'a NormalizedEvent>) -> Option<f64> {
    let (sum, n) = events.fold((0.0, 0usize), |(sum, n), e| (sum + e.start.x, n + 1));
    (n > 0).then(|| sum / n as f64)
}

// Halves where both teams have evidence vote; no votes means absolute provider coordinates.
fn frame_of(known: &HashMap<Slot, (AttackDirection, DirectionSource)>, halves: &[u8]) -> Frame {
    let (mut same, mut opposite) = (0usize, 0usize);
    for &half in halves {
        if let (Some(a), Some(b)) = (known.get(&(0, half)), known.get(&(1, half))) {
            if a.0 == b.0 {
                same += 1;
            } else {
                opposite += 1;
            }
        }
    }
    if same > opposite {
        Frame::AttackRelative
    } else {
        Frame::Absolute
    }
}

fn infer_direction(
    known: &HashMap<Slot, (AttackDirection, DirectionSource)>,
    team: usize,
    half: u8,
    halves: &[u8],
    frame: Frame,
) -> Option<AttackDirection> {
    let relate = |direction: AttackDirection, switched: bool| {
        if switched && frame == Frame::Absolute {
            direction.flipped()
        } else {
            direction
        }
    };
    // The opponent in the same half.
    if let Some(&(direction, _)) = known.get(&(1 - team, half)) {
        return Some(relate(direction, true));
    }
    // The same team in another half; ends switch between consecutive halves.
    halves
        .iter()
        .filter(|&&h| h != half)
        .find_map(|&h| known.get(&(team, h)).map(|&(direction, _)| relate(direction, h % 2 != half % 2)))
}

fn apply_directions(events: &mut [NormalizedEvent], decisions: &[DirectionDecision], pitch: &PitchConfig) {
    for event in events.iter_mut() {
        let flip = decisions
            .iter()
            .find(|d| d.half == event.half && d.team == event.team)
            .is_some_and(|d| d.direction == AttackDirection::RightToLeft);
        if flip {
            reflect_event(event, pitch);
        }
    }
}

pub fn reflect_event(event: &mut NormalizedEvent, pitch: &PitchConfig) {
    event.start = event.start.reflect(pitch);
    event.end = event.end.map(|p| p.reflect(pitch));
}

// Annotation records describe a pass that the export already carries as a primary
// record; fold them onto it, or keep them as the pass when no primary exists.
fn fold_pass_annotations(events: &mut Vec<NormalizedEvent>, window_secs: f64) -> usize {
    let mut passes_by_player: HashMap<PlayerKey, Vec<usize>> = HashMap::new();
    for (idx, event) in events.iter().enumerate() {
        if event.action.is_pass()
            && let Some(key) = event.player_key()
        {
            passes_by_player.entry(key).or_default().push(idx);
        }
    }

    let mut folded: Vec<bool> = vec![false; events.len()];
    let mut folded_count = 0usize;
    for idx in 0..events.len() {
        let Action::PassAnnotation { annotation } = events[idx].action else {
            continue;
        };
        let ts = events[idx].timestamp;
        let wants = annotation_outcome(annotation);
        let target = events[idx].player_key().and_then(|key| {
            passes_by_player.get(&key).and_then(|candidates| {
                candidates
                    .iter()
                    .copied()
                    .filter(|&c| {
                        matches!(events[c].action, Action::Pass { outcome, .. } if outcome == wants)
                            && (events[c].timestamp - ts).abs() <= window_secs
                    })
                    .min_by(|&a, &b| {
                        let da = (events[a].timestamp - ts).abs();
                        let db = (events[b].timestamp - ts).abs();
                        da.total_cmp(&db).then(a.cmp(&b))
                    })
            })
        });

        match target {
            Some(pass_idx) => {
                if let Action::Pass { tags, .. } = &mut events[pass_idx].action {
                    apply_annotation(tags, annotation);
                }
                folded[idx] = true;
                folded_count += 1;
            }
            None => {
                let mut tags = PassTags::default();
                apply_annotation(&mut tags, annotation);
                events[idx].action = Action::Pass {
                    outcome: wants,
                    tags,
                };
                // Later annotations of the same pass fold onto this one.
                if let Some(key) = events[idx].player_key() {
                    passes_by_player.entry(key).or_default().push(idx);
                }
            }
        }
    }

    let mut keep = folded.iter().map(|f| !f);
    events.retain(|_| keep.next().unwrap_or(true));
    folded_count
}

fn annotation_outcome(annotation: PassAnnotation) -> PassOutcome {
    match annotation {
        PassAnnotation::LongInaccurate => PassOutcome::Unsuccessful,
        PassAnnotation::Progressive | PassAnnotation::LongAccurate | PassAnnotation::Key => {
            PassOutcome::Successful
        }
    }
}

fn apply_annotation(tags: &mut PassTags, annotation: PassAnnotation) {
    match annotation {
        PassAnnotation::Progressive => tags.provider_progressive = true,
        PassAnnotation::LongAccurate | PassAnnotation::LongInaccurate => tags.long = true,
        PassAnnotation::Key => tags.key = true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ShotClass {
    Goal,
    OnTarget,
    OffTarget,
}

fn shot_class(outcome: ShotOutcome) -> ShotClass {
    match outcome {
        ShotOutcome::Goal => ShotClass::Goal,
        ShotOutcome::OnTarget => ShotClass::OnTarget,
        ShotOutcome::OffTarget | ShotOutcome::Blocked => ShotClass::OffTarget,
    }
}

/// Collapses duplicate shot/goal signals and returns what was dropped.
pub fn dedup_shots(events: &mut Vec<NormalizedEvent>, cfg: &EngineConfig) -> Vec<DuplicateRecord> {
    let window = cfg.dedup.window_secs;
    let tolerance = cfg.dedup.position_tolerance_m;
    let mut remove = vec![false; events.len()];
    let mut records = Vec::new();

    // A goal is also exported as an on-target shot; the goal wins.
    let goals: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.action.shot_outcome() == Some(ShotOutcome::Goal))
        .map(|(idx, _)| idx)
        .collect();
    for (idx, event) in events.iter().enumerate() {
        if event.action.shot_outcome() != Some(ShotOutcome::OnTarget) || event.player.is_none() {
            continue;
        }
        let echo = goals.iter().copied().find(|&g| {
            let goal = &events[g];
            goal.team == event.team
                && goal.player == event.player
                && (goal.timestamp - event.timestamp).abs() <= window
                && goal.start.distance(&event.start) <= tolerance
        });
        if let Some(g) = echo {
            remove[idx] = true;
            records.push(DuplicateRecord {
                dropped_event: event.event_id,
                kept_event: events[g].event_id,
                kind: DuplicateKind::GoalEcho,
            });
        }
    }

    let mut last_kept: HashMap<(String, Option<String>, ShotClass), (f64, usize)> = HashMap::new();
    for (idx, event) in events.iter().enumerate() {
        if remove[idx] {
            continue;
        }
        let Some(outcome) = event.action.shot_outcome() else {
            continue;
        };
        let key = (
            event.team.clone(),
            event.player.as_ref().map(|p| p.name.clone()),
            shot_class(outcome),
        );
        match last_kept.get(&key) {
            Some(&(ts, kept_id)) if (event.timestamp - ts).abs() <= window => {
                remove[idx] = true;
                records.push(DuplicateRecord {
                    dropped_event: event.event_id,
                    kept_event: kept_id,
                    kind: DuplicateKind::Repeat,
                });
            }
            _ => {
                last_kept.insert(key, (event.timestamp, event.event_id));
            }
        }
    }

    let mut keep = remove.iter().map(|d| !d);
    events.retain(|_| keep.next().unwrap_or(true));
    records.sort_by_key(|r| r.dropped_event);
    records
}

pub fn pass_is_progressive(event: &NormalizedEvent, pitch: &PitchConfig, policy: &ProgressivePassPolicy) -> bool {
    let Action::Pass { outcome, tags } = &event.action else {
        return false;
    };
    if *outcome != PassOutcome::Successful {
        return false;
    }
    if tags.provider_progressive {
        return true;
    }
    let Some(end) = event.end else {
        return false;
    };
    progressive_by_distance(event.start, end, pitch, policy)
}

pub fn progressive_by_distance(start: Point, end: Point, pitch: &PitchConfig, policy: &ProgressivePassPolicy) -> bool {
    let goal = Point::new(pitch.length, pitch.width / 2.0);
    let progress = start.distance(&goal) - end.distance(&goal);
    let halfway = pitch.length / 2.0;
    let threshold = match (start.x < halfway, end.x < halfway) {
        (true, true) => policy.own_half_m,
        (true, false) => policy.cross_half_m,
        (false, false) => policy.opp_half_m,
        (false, true) => policy.own_half_m,
    };
    progress >= threshold
}

fn playing_spans(events: &[NormalizedEvent], entry_grace_secs: f64) -> Vec<PlayerProfile> {
    let mut order: Vec<PlayerKey> = Vec::new();
    let mut spans: HashMap<PlayerKey, PlayerProfile> = HashMap::new();
    for event in events {
        let Some(key) = event.player_key() else {
            continue;
        };
        let number = event.player.as_ref().and_then(|p| p.number);
        let profile = spans.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            PlayerProfile {
                key,
                number,
                first_involvement: event.timestamp,
                last_involvement: event.timestamp,
                entry: 0.0,
                exit: 0.0,
                event_count: 0,
            }
        });
        profile.first_involvement = profile.first_involvement.min(event.timestamp);
        profile.last_involvement = profile.last_involvement.max(event.timestamp);
        profile.event_count += 1;
        if profile.number.is_none() {
            profile.number = number;
        }
    }

    order
        .into_iter()
        .filter_map(|key| spans.remove(&key))
        .map(|mut p| {
            p.entry = if p.first_involvement <= entry_grace_secs {
                0.0
            } else {
                p.first_involvement
            };
            p.exit = p.last_involvement;
            p
        })
        .collect()
}
