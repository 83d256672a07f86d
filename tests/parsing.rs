use std::fs;
use std::path::PathBuf;

use instat_report::config::{DirectionOverride, EngineConfig};
use instat_report::error::{ParseError, ReportError};
use instat_report::load_match;
use instat_report::model::{
    Action, AttackDirection, DirectionSource, DuplicateKind, NormalizationReport, PassOutcome,
    Point, RejectReason,
};
use instat_report::normalize::reflect_event;
use instat_report::parser::parse_events;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn instance(id: u32, team: &str, action: &str, extra: &str) -> String {
    format!(
        "<instance><ID>{id}</ID><start>{id}</start><end>{}</end><code>7. Sam Doe ({team})</code>\
         <label><group>Team</group><text>{team}</text></label>\
         <label><group>Action</group><text>{action}</text></label>{extra}</instance>",
        id + 1
    )
}

fn doc(body: &str) -> String {
    format!("<file><ALL_INSTANCES>{body}</ALL_INSTANCES><ROWS></ROWS></file>")
}

fn located(x: f64, y: f64, half: u8) -> String {
    format!(
        "<label><group>Half</group><text>{half}</text></label>\
         <label><group>pos_x</group><text>{x}</text></label>\
         <label><group>pos_y</group><text>{y}</text></label>"
    )
}

fn pass_to(from: (f64, f64), to: (f64, f64), half: u8) -> String {
    format!(
        "{}<label><group>pos_dest_x</group><text>{}</text></label>\
         <label><group>pos_dest_y</group><text>{}</text></label>",
        located(from.0, from.1, half),
        to.0,
        to.1
    )
}

fn direction_of(report: &NormalizationReport, team: &str, half: u8) -> (AttackDirection, DirectionSource) {
    let d = report
        .directions
        .iter()
        .find(|d| d.team == team && d.half == half)
        .expect("decision for every team and half");
    (d.direction, d.source)
}

fn with_override(team: &str, half: u8, direction: AttackDirection) -> EngineConfig {
    EngineConfig {
        direction_overrides: vec![DirectionOverride {
            team: team.to_string(),
            half,
            direction,
        }],
        ..EngineConfig::default()
    }
}

#[test]
fn parses_two_player_fixture() {
    let raw = read_fixture("two_player_match.xml");
    let records = parse_events(&raw).expect("fixture should parse");
    assert_eq!(records.len(), 12);

    let first = &records[0];
    assert_eq!(first.source_id, 1);
    assert_eq!(first.team, "Alpha FC");
    assert!(first.player.is_none());

    let pass = &records[1];
    let player = pass.player.as_ref().expect("player from code");
    assert_eq!(player.name, "Adam Striker");
    assert_eq!(player.number, Some(9));
    assert_eq!(pass.start_time, Some(30.0));
    assert_eq!(pass.end_time, Some(32.0));
    assert_eq!(pass.half, Some(1));
    assert_eq!(pass.pos.map(|p| (p.x, p.y)), Some((40.0, 34.0)));
    assert_eq!(pass.dest.map(|p| (p.x, p.y)), Some((60.0, 34.0)));
}

#[test]
fn malformed_xml_is_a_parse_error() {
    let err = parse_events("<file><ALL_INSTANCES><instance><ID>1</ID>").unwrap_err();
    assert!(matches!(err, ParseError::Xml { .. }), "{err:?}");

    let err = parse_events("<file><ROWS></ROWS></file>").unwrap_err();
    assert!(matches!(err, ParseError::MissingInstances));
}

#[test]
fn missing_team_is_a_parse_error() {
    let xml = doc(
        "<instance><ID>3</ID><start>1</start><code>7. Sam Doe</code>\
         <label><group>Action</group><text>Goals</text></label></instance>",
    );
    match parse_events(&xml) {
        Err(ParseError::MissingField { instance, field }) => {
            assert_eq!(instance, "3");
            assert_eq!(field, "Team");
        }
        other => panic!("unexpected {other:?}"),
    }

    let err = load_match(&xml, &EngineConfig::default()).unwrap_err();
    assert!(matches!(err, ReportError::Parse(_)));
    assert_eq!(err.user_message(), "Error parsing XML");
}

#[test]
fn pass_without_destination_parses_with_fields_absent() {
    let xml = doc(&instance(
        5,
        "Alpha",
        "Passes accurate",
        "<label><group>pos_x</group><text>30</text></label>\
         <label><group>pos_y</group><text>20</text></label>",
    ));
    let records = parse_events(&xml).expect("should parse");
    assert_eq!(records.len(), 1);
    assert!(records[0].dest.is_none());
    assert!(records[0].half.is_none());
    assert!(records[0].pos.is_some());
}

#[test]
fn normalization_counts_rejections_and_duplicates() {
    let raw = read_fixture("two_player_match.xml");
    let (table, report) = load_match(&raw, &EngineConfig::default()).expect("fixture loads");

    assert_eq!(report.input_rows, 12);
    assert_eq!(report.rejected_total(), 0);
    assert_eq!(report.events_before_dedup, 12);
    assert_eq!(report.usable_events, 10);
    assert_eq!(report.duplicates_removed(), 2);
    assert_eq!(
        report.events_before_dedup - report.usable_events,
        report.duplicates_removed()
    );
    let kinds: Vec<DuplicateKind> = report.duplicates.iter().map(|d| d.kind).collect();
    assert!(kinds.contains(&DuplicateKind::GoalEcho));
    assert!(kinds.contains(&DuplicateKind::Repeat));

    assert_eq!(table.teams, vec!["Alpha FC".to_string(), "Beta United".to_string()]);
    assert_eq!(table.match_end, 5400.0);

    let alpha_first = report
        .directions
        .iter()
        .find(|d| d.team == "Alpha FC" && d.half == 1)
        .expect("decision for Alpha first half");
    assert_eq!(alpha_first.direction, AttackDirection::LeftToRight);
    assert_eq!(alpha_first.source, DirectionSource::ShotGeometry);
    assert_eq!(
        direction_of(&report, "Beta United", 1),
        (AttackDirection::LeftToRight, DirectionSource::DefensiveGeometry)
    );
    assert_eq!(
        direction_of(&report, "Alpha FC", 2),
        (AttackDirection::LeftToRight, DirectionSource::Inferred)
    );
}

#[test]
fn overridden_direction_reflects_start_and_end() {
    let xml = doc(&format!(
        "{}{}",
        instance(1, "Alpha", "Passes accurate", &pass_to((20.0, 10.0), (40.0, 15.0), 1)),
        instance(2, "Beta", "Clearances", &located(90.0, 30.0, 1)),
    ));

    let ltr_cfg = with_override("Alpha", 1, AttackDirection::LeftToRight);
    let (ltr, ltr_report) = load_match(&xml, &ltr_cfg).expect("loads");
    assert_eq!(
        direction_of(&ltr_report, "Alpha", 1),
        (AttackDirection::LeftToRight, DirectionSource::Override)
    );
    assert_eq!(ltr.events[0].start, Point::new(20.0, 10.0));
    assert_eq!(ltr.events[0].end, Some(Point::new(40.0, 15.0)));

    let rtl_cfg = with_override("Alpha", 1, AttackDirection::RightToLeft);
    let (rtl, rtl_report) = load_match(&xml, &rtl_cfg).expect("loads");
    assert_eq!(
        direction_of(&rtl_report, "Alpha", 1),
        (AttackDirection::RightToLeft, DirectionSource::Override)
    );
    assert_eq!(rtl.events[0].start, Point::new(85.0, 58.0));
    assert_eq!(rtl.events[0].end, Some(Point::new(65.0, 53.0)));

    // Reflecting the swapped frame once more lands back on the original coordinates.
    let mut back = rtl.events[0].clone();
    reflect_event(&mut back, &rtl.pitch);
    assert_eq!(back.start, ltr.events[0].start);
    assert_eq!(back.end, ltr.events[0].end);

    // The other team's frame does not depend on Alpha's override.
    assert_eq!(ltr.events[1].start, rtl.events[1].start);
}

#[test]
fn shots_below_halfway_attack_right_to_left() {
    let xml = doc(&format!(
        "{}{}",
        instance(1, "Alpha", "Shots on target", &located(10.0, 30.0, 1)),
        instance(2, "Alpha", "Shots off target", &located(20.0, 40.0, 1)),
    ));
    let (table, report) = load_match(&xml, &EngineConfig::default()).expect("loads");
    assert_eq!(
        direction_of(&report, "Alpha", 1),
        (AttackDirection::RightToLeft, DirectionSource::ShotGeometry)
    );
    assert_eq!(table.events[0].start, Point::new(95.0, 38.0));
    assert_eq!(table.events[1].start, Point::new(85.0, 28.0));
}

#[test]
fn team_without_shots_takes_direction_from_defending() {
    let xml = doc(&format!(
        "{}{}",
        instance(1, "Alpha", "Goals", &located(95.0, 34.0, 1)),
        instance(2, "Beta", "Clearances", &located(100.0, 34.0, 1)),
    ));
    let (table, report) = load_match(&xml, &EngineConfig::default()).expect("loads");
    assert_eq!(
        direction_of(&report, "Beta", 1),
        (AttackDirection::RightToLeft, DirectionSource::DefensiveGeometry)
    );
    // Both teams now attack towards x = 105: Alpha's goal is near it, Beta's
    // clearance near its own goal at x = 0.
    assert_eq!(table.events[0].start.x, 95.0);
    assert_eq!(table.events[1].start.x, 5.0);
}

#[test]
fn missing_directions_follow_the_match_frame() {
    // Opposite shooting ends in the first half: absolute coordinates, ends switch.
    let xml = doc(&format!(
        "{}{}{}{}",
        instance(1, "Alpha", "Goals", &located(95.0, 34.0, 1)),
        instance(2, "Beta", "Shots on target", &located(10.0, 34.0, 1)),
        instance(3000, "Alpha", "Passes accurate", &located(60.0, 34.0, 2)),
        instance(3001, "Beta", "Attacks", &located(30.0, 34.0, 2)),
    ));
    let (table, report) = load_match(&xml, &EngineConfig::default()).expect("loads");
    assert_eq!(
        direction_of(&report, "Alpha", 2),
        (AttackDirection::RightToLeft, DirectionSource::Inferred)
    );
    assert_eq!(
        direction_of(&report, "Beta", 2),
        (AttackDirection::LeftToRight, DirectionSource::Inferred)
    );
    assert_eq!(table.events[2].start.x, 45.0);
    assert_eq!(table.events[3].start.x, 30.0);

    // Same shooting end for both teams: the export is already attack-relative.
    let xml = doc(&format!(
        "{}{}{}{}",
        instance(1, "Alpha", "Goals", &located(95.0, 34.0, 1)),
        instance(2, "Beta", "Shots on target", &located(90.0, 34.0, 1)),
        instance(3000, "Alpha", "Shots off target", &located(88.0, 34.0, 2)),
        instance(3001, "Beta", "Attacks", &located(30.0, 34.0, 2)),
    ));
    let (table, report) = load_match(&xml, &EngineConfig::default()).expect("loads");
    assert_eq!(
        direction_of(&report, "Beta", 2),
        (AttackDirection::LeftToRight, DirectionSource::Inferred)
    );
    assert_eq!(table.events[3].start.x, 30.0);

    // Only one team has evidence: the opponent defends the other end.
    let xml = doc(&format!(
        "{}{}",
        instance(1, "Alpha", "Goals", &located(95.0, 34.0, 1)),
        instance(2, "Beta", "Attacks", &located(30.0, 34.0, 1)),
    ));
    let (_, report) = load_match(&xml, &EngineConfig::default()).expect("loads");
    assert_eq!(
        direction_of(&report, "Beta", 1),
        (AttackDirection::RightToLeft, DirectionSource::Inferred)
    );
}

#[test]
fn pass_annotations_fold_onto_their_pass() {
    let raw = read_fixture("annotated_passes.xml");
    let (table, report) = load_match(&raw, &EngineConfig::default()).expect("fixture loads");

    assert_eq!(report.input_rows, 8);
    assert_eq!(report.folded_annotations, 4);
    assert_eq!(table.events.len(), 4);
    assert!(table.events.iter().all(|e| e.action.is_pass()));

    let tags_of = |source_id: i64| {
        let event = table
            .events
            .iter()
            .find(|e| e.source_id == source_id)
            .expect("event kept");
        match &event.action {
            Action::Pass { outcome, tags } => (*outcome, *tags),
            other => panic!("expected a pass, got {other:?}"),
        }
    };

    // Primary pass carries key, long and progressive from three annotations.
    let (outcome, tags) = tags_of(1);
    assert_eq!(outcome, PassOutcome::Successful);
    assert!(tags.key && tags.long && tags.provider_progressive);
    assert_eq!(
        table.events[0].labels.get("Attack type").map(String::as_str),
        Some("Positional attack")
    );

    // Unmatched key pass stands alone as a completed pass.
    let (outcome, tags) = tags_of(5);
    assert_eq!(outcome, PassOutcome::Successful);
    assert!(tags.key && !tags.long);

    // Unmatched inaccurate long pass stands alone as a failed pass.
    let (outcome, tags) = tags_of(6);
    assert_eq!(outcome, PassOutcome::Unsuccessful);
    assert!(tags.long && !tags.key);

    // Two annotations of the same pass with no primary make one pass, not two.
    let (outcome, tags) = tags_of(7);
    assert_eq!(outcome, PassOutcome::Successful);
    assert!(tags.provider_progressive && tags.long);
    assert!(table.events.iter().all(|e| e.source_id != 8));
}

#[test]
fn rows_without_team_or_coordinates_are_counted() {
    let xml = doc(&format!(
        "{}{}{}",
        instance(1, "None", "Passes accurate", "<label><group>pos_x</group><text>1</text></label><label><group>pos_y</group><text>1</text></label>"),
        instance(2, "Alpha", "Clearances", ""),
        instance(3, "Alpha", "Clearances", "<label><group>pos_x</group><text>10</text></label><label><group>pos_y</group><text>90</text></label>"),
    ));
    let (table, report) = load_match(&xml, &EngineConfig::default()).expect("one usable row");
    assert_eq!(table.events.len(), 1);
    assert_eq!(report.rejected.get(&RejectReason::NoTeam), Some(&1));
    assert_eq!(report.rejected.get(&RejectReason::MissingCoordinates), Some(&1));
    assert_eq!(report.clamped_points, 1);
    assert_eq!(table.events[0].start.y, 68.0);
}

#[test]
fn nothing_usable_is_a_normalization_error() {
    let xml = doc(&instance(1, "Alpha", "Clearances", ""));
    let err = load_match(&xml, &EngineConfig::default()).unwrap_err();
    assert!(matches!(err, ReportError::Normalization(_)));
    assert_eq!(err.user_message(), "No data available");
}
