//! Parsers turning one section of the model's reply into typed records.
//!
//! None of these fail: a parser returns whatever it could recover (possibly
//! nothing) and leaves the decision to fall back to the orchestrator.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tracing::debug;

use crate::extract::{
    decode_lenient, find_balanced, json_objects, scalar_text, strip_bullet, to_float, to_int,
};
use crate::model::{
    Event, MinuteDistribution, SCORE_MAX, SCORE_MIN, SocialInteractionDetail, TimelinePoint,
    TopicDetail, score_in_range,
};
use crate::recovery::{RecoveryWarning, Section};

/// Identifier of the example event in the prompt template; never real data.
pub const PLACEHOLDER_EVENT_ID: &str = "unique_event_identifier_001";

const DEFAULT_MOOD: &str = "neutral";
const DEFAULT_TOPIC: &str = "daily life";

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("section regex must compile"))
}

fn pair_separator_regex() -> &'static Regex {
    static PAIR_SEPARATOR_RE: OnceLock<Regex> = OnceLock::new();
    cached(&PAIR_SEPARATOR_RE, r"\s*\]\s*,\s*\[\s*")
}

fn minutes_regex() -> &'static Regex {
    static MINUTES_RE: OnceLock<Regex> = OnceLock::new();
    cached(&MINUTES_RE, r"(?i)(\d+)\s*minutes?")
}

fn person_regex() -> &'static Regex {
    static PERSON_RE: OnceLock<Regex> = OnceLock::new();
    cached(
        &PERSON_RE,
        r"^\**\s*(\p{L}[\p{L}\p{N}\s()'.&-]*?)\s*\**\s*:\s*\**$",
    )
}

fn detail_regex() -> &'static Regex {
    static DETAIL_RE: OnceLock<Regex> = OnceLock::new();
    cached(&DETAIL_RE, r"^[-*•]\s*\**([^:*]+?)\**\s*:\s*(.+)$")
}

fn topic_regex() -> &'static Regex {
    static TOPIC_RE: OnceLock<Regex> = OnceLock::new();
    cached(&TOPIC_RE, r"^(?:(\d+)\.\s*)?([^(:]+)(?:\s*\(([^)]+)\))?")
}

fn event_count_regex() -> &'static Regex {
    static EVENT_COUNT_RE: OnceLock<Regex> = OnceLock::new();
    cached(&EVENT_COUNT_RE, r"(\d+)\s*(?:event|conversation)")
}

fn minute_count_regex() -> &'static Regex {
    static MINUTE_COUNT_RE: OnceLock<Regex> = OnceLock::new();
    cached(&MINUTE_COUNT_RE, r"(\d+)\s*minute")
}

fn first_u32(caps: Option<Captures<'_>>) -> Option<u32> {
    caps.and_then(|c| c.get(1)).and_then(|m| m.as_str().parse().ok())
}


/// Events from the first balanced JSON array in `section`.
///
/// Elements lacking a numeric duration or any of the three scores are
/// dropped with a warning; the rest keep source order.
pub fn parse_events(section: &str, warnings: &mut Vec<RecoveryWarning>) -> Vec<Event> {
    let json = find_balanced(section, '[');
    if json.is_empty() {
        warnings.push(RecoveryWarning::MalformedJson {
            section: Section::Events,
            error: "no balanced JSON array".to_string(),
        });
        return Vec::new();
    }
    let items = match decode_lenient(json) {
        Ok(Value::Array(items)) => items,
        Ok(_) => Vec::new(),
        Err(e) => {
            warnings.push(RecoveryWarning::MalformedJson {
                section: Section::Events,
                error: e.to_string(),
            });
            return Vec::new();
        }
    };

    let mut events = Vec::with_capacity(items.len());
    let mut used_ids = HashSet::new();
    for (index, item) in items.iter().enumerate() {
        let Value::Object(fields) = item else {
            warnings.push(RecoveryWarning::EventDropped {
                event_id: format!("#{}", index + 1),
                reason: "not a JSON object".to_string(),
            });
            continue;
        };
        if fields.get("event_id").and_then(Value::as_str) == Some(PLACEHOLDER_EVENT_ID) {
            debug!("skipping prompt template event {}", PLACEHOLDER_EVENT_ID);
            continue;
        }
        let mut event = match event_from_fields(fields, index) {
            Ok(event) => event,
            Err(reason) => {
                warnings.push(RecoveryWarning::EventDropped {
                    event_id: event_id(fields, index),
                    reason,
                });
                continue;
            }
        };
        if !used_ids.insert(event.event_id.clone()) {
            let renamed = (2..)
                .map(|n| format!("{}_{n}", event.event_id))
                .find(|candidate| !used_ids.contains(candidate))
                .unwrap_or_default();
            used_ids.insert(renamed.clone());
            warnings.push(RecoveryWarning::DuplicateEventId {
                event_id: std::mem::replace(&mut event.event_id, renamed.clone()),
                renamed,
            });
        }
        events.push(event);
    }
    events
}

fn event_id(fields: &Map<String, Value>, index: usize) -> String {
    fields
        .get("event_id")
        .and_then(scalar_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("event_{:02}", index + 1))
}

fn text(fields: &Map<String, Value>, key: &str) -> String {
    fields.get(key).and_then(scalar_text).unwrap_or_default()
}

fn list(fields: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    match fields.get(key)? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(scalar_text)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        Value::String(s) if !s.trim().is_empty() => Some(vec![s.trim().to_string()]),
        _ => None,
    }
}

fn score(fields: &Map<String, Value>, key: &str) -> Result<f64, String> {
    let value = fields
        .get(key)
        .and_then(to_float)
        .ok_or_else(|| format!("missing or non-numeric {key}"))?;
    if !score_in_range(value) {
        return Err(format!("{key} {value} outside [{SCORE_MIN}, {SCORE_MAX}]"));
    }
    Ok(value)
}

fn event_from_fields(fields: &Map<String, Value>, index: usize) -> Result<Event, String> {
    let duration = fields
        .get("duration_minutes")
        .and_then(to_int)
        .ok_or_else(|| "missing or non-numeric duration_minutes".to_string())?;
    let duration_minutes = u32::try_from(duration)
        .map_err(|_| format!("duration_minutes {duration} out of range"))?;
    let mood_score = score(fields, "mood_score")?;
    let stress_level = score(fields, "stress_level")?;
    let energy_level = score(fields, "energy_level")?;

    let impact = fields
        .get("inferred_impact_on_subject")
        .or_else(|| {
            fields
                .iter()
                .find(|(key, _)| key.starts_with("inferred_impact_on_"))
                .map(|(_, value)| value)
        })
        .and_then(scalar_text)
        .unwrap_or_default();

    Ok(Event {
        event_id: event_id(fields, index),
        event_title: text(fields, "event_title"),
        time_range: text(fields, "time_range"),
        duration_minutes,
        mood_labels: list(fields, "mood_labels").unwrap_or_else(|| vec![DEFAULT_MOOD.into()]),
        mood_score,
        stress_level,
        energy_level,
        activity_type: text(fields, "activity_type"),
        people_involved: list(fields, "people_involved").unwrap_or_default(),
        interaction_dynamic: text(fields, "interaction_dynamic"),
        inferred_impact_on_subject: impact,
        topic_labels: list(fields, "topic_labels").unwrap_or_else(|| vec![DEFAULT_TOPIC.into()]),
        context_summary: text(fields, "context_summary"),
        key_quote_or_moment: text(fields, "key_quote_or_moment"),
    })
}


/// Timeline pairs from the first `[[...]]` line, else from a JSON array.
pub fn parse_timeline(section: &str) -> Vec<TimelinePoint> {
    let from_line = section
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("[[") && line.ends_with("]]"))
        .map(parse_timeline_line)
        .unwrap_or_default();
    if !from_line.is_empty() {
        return from_line;
    }
    timeline_from_json(find_balanced(section, '['))
}

/// Parse one `[[t, v], [t, v]]` line.
///
/// Each pair splits on its first comma only; quotes are stripped from the
/// time. Pairs without a comma are dropped.
pub fn parse_timeline_line(line: &str) -> Vec<TimelinePoint> {
    let Some(content) = line
        .trim()
        .strip_prefix("[[")
        .and_then(|rest| rest.strip_suffix("]]"))
    else {
        return Vec::new();
    };
    pair_separator_regex()
        .split(content)
        .filter_map(|pair| {
            let (time, energy) = pair.split_once(',')?;
            let time = time.trim().replace(['"', '\''], "");
            Some(TimelinePoint::new(time, energy.trim()))
        })
        .collect()
}

fn timeline_from_json(array: &str) -> Vec<TimelinePoint> {
    let Ok(Value::Array(items)) = decode_lenient(array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item.as_array()?.as_slice() {
            [time, energy] => Some(TimelinePoint::new(
                scalar_text(time)?.trim().replace(['"', '\''], ""),
                scalar_text(energy)?,
            )),
            _ => None,
        })
        .collect()
}


/// `label: N minutes` lines; a `{label: N}` object when no line matches.
pub fn parse_distribution(section: &str) -> MinuteDistribution {
    let mut out = MinuteDistribution::new();
    for line in section.lines() {
        let Some((label, rest)) = line.trim().split_once(':') else {
            continue;
        };
        let label = strip_bullet(label).trim_matches(['"', '\'']).trim();
        if label.is_empty() {
            continue;
        }
        if let Some(minutes) = first_u32(minutes_regex().captures(rest)) {
            out.insert(label.to_string(), minutes);
        }
    }
    if out.is_empty() {
        out = distribution_from_json(section);
    }
    out
}

fn distribution_from_json(section: &str) -> MinuteDistribution {
    let Ok(Value::Object(map)) = decode_lenient(find_balanced(section, '{')) else {
        return MinuteDistribution::new();
    };
    map.iter()
        .filter_map(|(label, value)| {
            let minutes = to_int(value)
                .and_then(|m| u32::try_from(m).ok())
                .or_else(|| first_u32(minutes_regex().captures(value.as_str()?)))?;
            let label = label.trim();
            (!label.is_empty()).then(|| (label.to_string(), minutes))
        })
        .collect()
}


fn is_boilerplate_heading(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    matches!(lower.as_str(), "description" | "data")
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
}

/// Person blocks of the form `Name:` followed by `- key: value` lines.
///
/// Recognized keys are `total_interaction_time`, `overall_inferred_impact`
/// and `key_observation`; missing ones keep their placeholder values.
pub fn parse_social_interactions(section: &str) -> Vec<SocialInteractionDetail> {
    let mut out = Vec::new();
    let mut current: Option<SocialInteractionDetail> = None;
    for line in section.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(caps) = person_regex().captures(line) {
            out.extend(current.take());
            let name = caps[1].trim();
            if !is_boilerplate_heading(name) && !Event::is_self(name) {
                current = Some(SocialInteractionDetail::new(name));
            }
            continue;
        }
        let (Some(person), Some(caps)) = (current.as_mut(), detail_regex().captures(line)) else {
            continue;
        };
        let value = caps[2].trim().to_string();
        match normalize_key(&caps[1]).as_str() {
            "total_interaction_time" => person.total_interaction_time = value,
            "overall_inferred_impact" => person.overall_inferred_impact = value,
            "key_observation" => person.key_observation = value,
            _ => {}
        }
    }
    out.extend(current);
    if out.is_empty() {
        out = social_from_json(section);
    }
    out
}

fn social_from_json(section: &str) -> Vec<SocialInteractionDetail> {
    if !section.contains('{') {
        return Vec::new();
    }
    json_objects(section)
        .iter()
        .filter_map(|fields| {
            let name = fields.get("person_name").and_then(scalar_text)?;
            let name = name.trim();
            if name.is_empty() || Event::is_self(name) {
                return None;
            }
            let mut detail = SocialInteractionDetail::new(name);
            if let Some(v) = fields.get("total_interaction_time").and_then(scalar_text) {
                detail.total_interaction_time = v;
            }
            if let Some(v) = fields.get("overall_inferred_impact").and_then(scalar_text) {
                detail.overall_inferred_impact = v;
            }
            if let Some(v) = fields.get("key_observation").and_then(scalar_text) {
                detail.key_observation = v;
            }
            Some(detail)
        })
        .collect()
}


/// Ranked-list lines such as `1. Project planning (3 events, 135 minutes)`.
pub fn parse_topic_analysis(section: &str) -> Vec<TopicDetail> {
    let mut out = Vec::new();
    for raw_line in section.lines() {
        let line = strip_bullet(raw_line);
        if !line.starts_with(|c: char| c.is_alphanumeric()) {
            continue;
        }
        let lower = line.to_lowercase();
        if lower.starts_with("description:") || lower.starts_with("data:") {
            continue;
        }
        let Some(caps) = topic_regex().captures(line) else {
            continue;
        };
        let topic_name = caps[2].trim().trim_matches('*').trim();
        if topic_name.is_empty() {
            continue;
        }
        let details = match caps.get(3) {
            Some(m) => m.as_str().trim(),
            None => line[caps[0].len()..]
                .trim_start()
                .strip_prefix(':')
                .map(str::trim)
                .unwrap_or_default(),
        };
        let lower_details = details.to_lowercase();
        out.push(TopicDetail {
            rank: caps.get(1).and_then(|m| m.as_str().parse().ok()),
            topic_name: topic_name.to_string(),
            num_events: first_u32(event_count_regex().captures(&lower_details)),
            total_duration_minutes: first_u32(minute_count_regex().captures(&lower_details)),
            raw_description: details.to_string(),
        });
    }
    if out.is_empty() {
        out = topics_from_json(section);
    }
    out
}

fn topics_from_json(section: &str) -> Vec<TopicDetail> {
    if !section.contains('{') {
        return Vec::new();
    }
    let count = |fields: &Map<String, Value>, key: &str| {
        fields
            .get(key)
            .and_then(to_int)
            .and_then(|n| u32::try_from(n).ok())
    };
    json_objects(section)
        .iter()
        .filter_map(|fields| {
            let name = fields.get("topic_name").and_then(scalar_text)?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(TopicDetail {
                rank: count(fields, "rank"),
                topic_name: name.to_string(),
                num_events: count(fields, "num_events"),
                total_duration_minutes: count(fields, "total_duration_minutes"),
                raw_description: text(fields, "raw_description"),
            })
        })
        .collect()
}
