use nirva_analysis::extract::find_balanced;
use nirva_analysis::recovery::RESPONSE_MARKER;
use nirva_analysis::sections::{parse_distribution, parse_social_interactions, parse_timeline};
use nirva_analysis::{DailyAnalysis, RecoveryWarning, Section, TimelinePoint, recover};

const FULL_REPLY: &str = include_str!("fixtures/raw_response_2025-03-14.txt");

fn wrap(response: &str) -> String {
    format!("=== PROMPT ===\nprompt text\n\n{RESPONSE_MARKER}\n{response}")
}

#[test]
fn full_reply_uses_explicit_sections() {
    let rec = recover(FULL_REPLY).expect("recovered");
    let doc = &rec.analysis;

    let ids: Vec<_> = doc.events.iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(ids, ["event_01", "event_02", "event_03"]);
    assert_eq!(doc.events[0].inferred_impact_on_subject, "energizing");

    assert_eq!(doc.overall_scores.daily_mood_score, 8.0);
    assert_eq!(doc.overall_scores.daily_stress_level_score, 3.0);
    assert_eq!(doc.overall_scores.daily_energy_level_score, 6.0);

    assert_eq!(doc.energy_timeline.len(), 3);
    assert_eq!(doc.energy_timeline[2], TimelinePoint::new("18:30", "5"));
    assert_eq!(doc.mood_distribution["focused"], 150);
    assert_eq!(doc.awake_time_allocation["social"], 45);

    let names: Vec<_> = doc
        .social_interactions
        .iter()
        .map(|s| s.person_name.as_str())
        .collect();
    assert_eq!(names, ["Ana", "Ben", "Mom"]);
    assert_eq!(doc.social_interactions[1].overall_inferred_impact, "Neutral");

    assert_eq!(doc.topic_analysis.len(), 3);
    assert_eq!(doc.topic_analysis[2].topic_name, "Parsing");
    assert_eq!(doc.topic_analysis[2].total_duration_minutes, Some(120));

    let defects: Vec<_> = rec.defects().collect();
    assert_eq!(defects.len(), 1, "{defects:?}");
    assert!(matches!(
        defects[0],
        RecoveryWarning::EventDropped { event_id, .. } if event_id == "event_04"
    ));
    assert!(!rec.warnings.iter().any(RecoveryWarning::is_derivation));
}

#[test]
fn single_event_scores_are_trivially_weighted() {
    let raw = wrap(
        r#"Step 2: Structured Event Analysis (JSON Output)
[{"event_id":"e1","duration_minutes":30,"mood_score":8,"stress_level":2,"energy_level":7,"mood_labels":["happy"],"activity_type":"work","people_involved":["Self"],"topic_labels":["planning"]}]
Step 3: Daily Summaries and Visualization Data
"#,
    );
    let doc = recover(&raw).expect("recovered").analysis;
    assert_eq!(doc.overall_scores.daily_mood_score, 8.0);
    assert_eq!(doc.overall_scores.daily_stress_level_score, 2.0);
    assert_eq!(doc.overall_scores.daily_energy_level_score, 7.0);
    assert!(doc.social_interactions.is_empty());
}

#[test]
fn zero_duration_events_weight_to_zero() {
    let raw = wrap(
        r#"Step 2: Structured Event Analysis (JSON Output)
[{"event_id":"e1","duration_minutes":0,"mood_score":8,"stress_level":2,"energy_level":7}]
Step 3: Daily Summaries and Visualization Data
"#,
    );
    let doc = recover(&raw).expect("recovered").analysis;
    assert_eq!(doc.overall_scores.daily_mood_score, 0.0);
    assert_eq!(doc.overall_scores.daily_stress_level_score, 0.0);
    assert_eq!(doc.overall_scores.daily_energy_level_score, 0.0);
}

#[test]
fn huge_durations_do_not_overflow() {
    let raw = wrap(
        r#"Step 2: Structured Event Analysis (JSON Output)
[{"event_id":"e1","duration_minutes":3000000000,"mood_score":6,"stress_level":2,"energy_level":7,"mood_labels":["happy"],"people_involved":["Ana"],"topic_labels":["work"]},
 {"event_id":"e2","duration_minutes":3000000000,"mood_score":6,"stress_level":2,"energy_level":7,"mood_labels":["happy"],"people_involved":["Ana"],"topic_labels":["work"]}]
Step 3: Daily Summaries and Visualization Data
"#,
    );
    let doc = recover(&raw).expect("recovered").analysis;
    assert_eq!(doc.events.len(), 2);
    assert_eq!(doc.mood_distribution["happy"], u32::MAX);
    assert_eq!(doc.overall_scores.daily_mood_score, 6.0);
    assert_eq!(doc.topic_analysis[0].total_duration_minutes, Some(u32::MAX));
}

#[test]
fn unparsable_distribution_without_events_is_empty() {
    assert!(parse_distribution("Description: pie chart\nfocused: a lot\nhappy - most of the day").is_empty());

    let raw = wrap("Mood Distribution:\nfocused: a lot\nhappy: most of the day\n");
    let doc = recover(&raw).expect("recovered").analysis;
    assert!(doc.mood_distribution.is_empty());
    assert!(doc.awake_time_allocation.is_empty());
}

#[test]
fn timeline_line_is_parsed_to_string_pairs() {
    let points = parse_timeline(r#"[["07:30", 7], ["09:00", 8]]"#);
    assert_eq!(
        serde_json::to_value(&points).unwrap(),
        serde_json::json!([["07:30", "7"], ["09:00", "8"]])
    );
}

#[test]
fn event_missing_energy_is_dropped_and_others_kept() {
    let raw = wrap(
        r#"Step 2: Structured Event Analysis (JSON Output)
[{"event_id":"a","duration_minutes":10,"mood_score":6,"stress_level":3,"energy_level":5},
 {"event_id":"b","duration_minutes":20,"mood_score":6,"stress_level":3},
 {"event_id":"c","duration_minutes":30,"mood_score":4,"stress_level":3,"energy_level":8}]
"#,
    );
    let rec = recover(&raw).expect("recovered");
    let ids: Vec<_> = rec.analysis.events.iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(ids, ["a", "c"]);
    assert!(rec.warnings.iter().any(|w| matches!(
        w,
        RecoveryWarning::EventDropped { event_id, .. } if event_id == "b"
    )));
    assert_eq!(rec.analysis.overall_scores.daily_mood_score, 4.5);
}

#[test]
fn bare_person_block_gets_placeholders() {
    let people = parse_social_interactions("Alice:\n");
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].person_name, "Alice");
    assert_eq!(people[0].total_interaction_time, "Unknown");
    assert_eq!(people[0].overall_inferred_impact, "Neutral");
    assert_eq!(people[0].key_observation, "N/A");
}

#[test]
fn recovery_is_idempotent() {
    let first = serde_json::to_string_pretty(&recover(FULL_REPLY).unwrap().analysis).unwrap();
    let second = serde_json::to_string_pretty(&recover(FULL_REPLY).unwrap().analysis).unwrap();
    assert_eq!(first, second);
}

#[test]
fn document_round_trips_through_json() {
    let doc = recover(FULL_REPLY).unwrap().analysis;
    let text = serde_json::to_string_pretty(&doc).unwrap();
    let back: DailyAnalysis = serde_json::from_str(&text).unwrap();
    assert_eq!(back, doc);
    back.validate().expect("still valid");
}

#[test]
fn every_timeline_entry_is_a_pair() {
    let doc = recover(FULL_REPLY).unwrap().analysis;
    let value = serde_json::to_value(&doc).unwrap();
    for entry in value["energy_timeline"].as_array().unwrap() {
        assert_eq!(entry.as_array().unwrap().len(), 2);
    }
}

#[test]
fn balanced_locator_output_balances() {
    let inputs = [
        "noise [1, [2, 3], {\"a\": [4]}] tail ]",
        "no brackets at all",
        "[[unclosed",
        "] early close [ok]",
    ];
    for input in inputs {
        let found = find_balanced(input, '[');
        if found.is_empty() {
            continue;
        }
        assert!(found.starts_with('['));
        let depth = found.chars().fold(0i64, |d, c| match c {
            '[' => d + 1,
            ']' => d - 1,
            _ => d,
        });
        assert_eq!(depth, 0, "{found}");
    }
}

#[test]
fn empty_reply_still_validates() {
    let rec = recover("").expect("recovered");
    assert!(rec.analysis.events.is_empty());
    assert_eq!(rec.warnings[0], RecoveryWarning::MarkerMissing);
    assert!(rec.warnings.contains(&RecoveryWarning::SectionMissing {
        section: Section::Events
    }));
}
