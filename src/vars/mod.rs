//! `{{NAME}}` placeholder substitution over declarative test data.
//!
//! Plain names resolve from a merged variable mapping; the dynamic forms
//! `{{NOW ...}}`, `{{RANDOM NUMBER a-b}}` and `{{COUNTER}}` are computed
//! on demand and cached per preparation so identical expressions inside
//! one test agree. Unknown names are left untouched.


use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;

static COUNTER: AtomicU64 = AtomicU64::new(0);

const DEFAULT_NOW_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Merge variable layers into one mapping. Earlier layers win; later
/// layers only fill names not yet defined.
#[must_use]
pub fn merge(layers: &[&BTreeMap<String, String>]) -> BTreeMap<String, String> {
    let mut merged = BTreeMap::new();
    for layer in layers {
        for (name, value) in layer.iter() {
            merged
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }
    merged
}

/// Resolver for dynamic variable expressions. Captures the wall clock
/// once at construction so every occurrence of an identical `NOW`
/// expression within one preparation resolves to the same instant.
#[derive(Debug)]
pub struct Dynamics {
    now: DateTime<Utc>,
    cache: BTreeMap<String, String>,
}

impl Dynamics {
    #[must_use]
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Pin the reference instant, mainly for deterministic tests.
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            cache: BTreeMap::new(),
        }
    }

    fn resolve(&mut self, expr: &str) -> Option<String> {
        if let Some(cached) = self.cache.get(expr) {
            return Some(cached.clone());
        }
        let value = if expr == "COUNTER" {
            Some(
                COUNTER
                    .fetch_add(1, Ordering::Relaxed)
                    .saturating_add(1)
                    .to_string(),
            )
        } else if let Some(rest) = expr.strip_prefix("RANDOM") {
            random_value(rest.trim())
        } else if let Some(rest) = expr.strip_prefix("NOW") {
            now_value(self.now, rest)
        } else {
            None
        }?;
        self.cache.insert(expr.to_owned(), value.clone());
        Some(value)
    }
}

impl Default for Dynamics {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace every `{{NAME}}` occurrence in `input`. Plain names come from
/// `vars`, dynamic expressions go through `dynamics`, anything else is
/// copied through verbatim.
#[must_use]
pub fn substitute(
    input: &str,
    vars: &BTreeMap<String, String>,
    dynamics: &mut Dynamics,
) -> String {
    let mut rest = input;
    let mut output = String::with_capacity(input.len());

    loop {
        let Some(start) = rest.find("{{") else {
            output.push_str(rest);
            break;
        };
        let (before, after_start) = rest.split_at(start);
        output.push_str(before);
        let Some(after) = after_start.strip_prefix("{{") else {
            output.push_str(after_start);
            break;
        };
        let Some(end) = after.find("}}") else {
            output.push_str("{{");
            output.push_str(after);
            break;
        };
        let (key_part, after_end) = after.split_at(end);
        let key = key_part.trim();
        if let Some(value) = vars.get(key) {
            output.push_str(value);
        } else if let Some(value) = dynamics.resolve(key) {
            output.push_str(&value);
        } else {
            output.push_str("{{");
            output.push_str(key_part);
            output.push_str("}}");
        }
        rest = match after_end.strip_prefix("}}") {
            Some(remaining) => remaining,
            None => {
                output.push_str(after_end);
                break;
            }
        };
    }

    output
}

/// Substitute every string nested anywhere inside a JSON value. Check
/// and extractor specs are kept as tagged JSON trees until compilation,
/// so this walk reaches each string field of every polymorphic variant,
/// including lists and nested objects.
#[must_use]
pub fn substitute_value(
    value: &serde_json::Value,
    vars: &BTreeMap<String, String>,
    dynamics: &mut Dynamics,
) -> serde_json::Value {
    match value {
        serde_json::Value::String(text) => {
            serde_json::Value::String(substitute(text, vars, dynamics))
        }
        serde_json::Value::Array(items) => serde_json::Value::Array(
            items
                .iter()
                .map(|item| substitute_value(item, vars, dynamics))
                .collect(),
        ),
        serde_json::Value::Object(fields) => serde_json::Value::Object(
            fields
                .iter()
                .map(|(name, field)| (name.clone(), substitute_value(field, vars, dynamics)))
                .collect(),
        ),
        serde_json::Value::Null | serde_json::Value::Bool(_) | serde_json::Value::Number(_) => {
            value.clone()
        }
    }
}

fn random_value(spec: &str) -> Option<String> {
    let bounds = spec.strip_prefix("NUMBER")?.trim();
    let (low_raw, high_raw) = bounds.split_once('-')?;
    let low: u64 = low_raw.trim().parse().ok()?;
    let high: u64 = high_raw.trim().parse().ok()?;
    if low > high {
        return None;
    }
    Some(rand::thread_rng().gen_range(low..=high).to_string())
}

fn now_value(now: DateTime<Utc>, rest: &str) -> Option<String> {
    let (offset_part, format) = match rest.split_once('|') {
        Some((offset, layout)) => (offset, layout.trim().trim_matches('"')),
        None => (rest, DEFAULT_NOW_FORMAT),
    };
    let offset_part = offset_part.trim();
    let instant = if offset_part.is_empty() {
        now
    } else {
        let delta = ChronoDuration::try_seconds(parse_offset_seconds(offset_part)?)?;
        now.checked_add_signed(delta)?
    };
    Some(instant.format(format).to_string())
}

fn parse_offset_seconds(offset: &str) -> Option<i64> {
    let (sign, magnitude) = if let Some(rest) = offset.strip_prefix('+') {
        (1i64, rest.trim())
    } else if let Some(rest) = offset.strip_prefix('-') {
        (-1i64, rest.trim())
    } else {
        return None;
    };
    let unit = magnitude.chars().last()?;
    let digits = magnitude.get(..magnitude.len().checked_sub(unit.len_utf8())?)?;
    let count: i64 = digits.trim().parse().ok()?;
    let seconds = match unit {
        's' => count,
        'm' => count.checked_mul(60)?,
        'h' => count.checked_mul(3600)?,
        'd' => count.checked_mul(86_400)?,
        _ => return None,
    };
    sign.checked_mul(seconds)
}
