//! Scorecard types and the model-response parser.
//!
//! Model output is free text with one JSON object somewhere inside it, often
//! wrapped in prose and sometimes cut off by the token limit. Parsing is two
//! stages:
//!
//! 1. [`extract_json_span`] + one [`repair_brackets`] pass turn the raw text
//!    into a [`serde_json::Value`], or fail with [`ParseError`].
//! 2. [`Scorecard::from_value`] coerces *any* value into a fully populated
//!    scorecard. It cannot fail; missing or mistyped fields take defaults.

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Whether a tip praises or criticises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipKind {
    Good,
    Improve,
}

/// One piece of feedback within a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    #[serde(rename = "type")]
    pub kind: TipKind,
    pub tip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Score and tips for one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub score: i64,
    pub tips: Vec<Tip>,
}

/// The validated feedback returned to callers. Every field is always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scorecard {
    #[serde(rename = "overallScore")]
    pub overall_score: i64,
    #[serde(rename = "ATS")]
    pub ats: CategoryScore,
    #[serde(rename = "toneAndStyle")]
    pub tone_and_style: CategoryScore,
    pub content: CategoryScore,
    pub structure: CategoryScore,
    pub skills: CategoryScore,
}

impl Scorecard {
    /// Coerce an arbitrary JSON value into a scorecard.
    ///
    /// Non-objects (including `null`) yield the all-default scorecard.
    pub fn from_value(value: &Value) -> Self {
        Self {
            overall_score: coerce_score(value.get("overallScore")),
            ats: coerce_category(value.get("ATS")),
            tone_and_style: coerce_category(value.get("toneAndStyle")),
            content: coerce_category(value.get("content")),
            structure: coerce_category(value.get("structure")),
            skills: coerce_category(value.get("skills")),
        }
    }

    /// The five categories in display order, with their wire names.
    pub fn categories(&self) -> [(&'static str, &CategoryScore); 5] {
        [
            ("ATS", &self.ats),
            ("toneAndStyle", &self.tone_and_style),
            ("content", &self.content),
            ("structure", &self.structure),
            ("skills", &self.skills),
        ]
    }
}

fn coerce_score(value: Option<&Value>) -> i64 {
    value
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite())
        .map(|n| n.round() as i64)
        .unwrap_or(0)
}

fn coerce_category(value: Option<&Value>) -> CategoryScore {
    let Some(value) = value else {
        return CategoryScore::default();
    };
    let tips = value
        .get("tips")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(coerce_tip).collect())
        .unwrap_or_default();
    CategoryScore {
        score: coerce_score(value.get("score")),
        tips,
    }
}

fn coerce_tip(value: &Value) -> Option<Tip> {
    let kind = match value.get("type")?.as_str()? {
        "good" => TipKind::Good,
        "improve" => TipKind::Improve,
        _ => return None,
    };
    let tip = value.get("tip")?.as_str()?.to_string();
    let explanation = value
        .get("explanation")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(Tip {
        kind,
        tip,
        explanation,
    })
}

/// Slice from the first `{` to the last `}` inclusive.
pub fn extract_json_span(raw: &str) -> Result<&str, ParseError> {
    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end > start => Ok(&raw[start..=end]),
        _ => Err(ParseError::NoJsonObject),
    }
}

/// Append the missing `]` then the missing `}` to `span`.
///
/// Counts every bracket character, including those inside string literals.
/// Balanced input is returned unchanged.
pub fn repair_brackets(span: &str) -> String {
    let count = |c: char| span.chars().filter(|&x| x == c).count();
    let missing_brackets = count('[').saturating_sub(count(']'));
    let missing_braces = count('{').saturating_sub(count('}'));

    let mut repaired = String::with_capacity(span.len() + missing_brackets + missing_braces);
    repaired.push_str(span);
    repaired.extend(std::iter::repeat_n(']', missing_brackets));
    repaired.extend(std::iter::repeat_n('}', missing_braces));
    repaired
}

/// Locate, parse and (once) repair the JSON object in `raw`.
pub fn parse_json_object(raw: &str) -> Result<Value, ParseError> {
    let span = extract_json_span(raw)?;
    match serde_json::from_str(span) {
        Ok(value) => Ok(value),
        Err(first) => {
            debug!("Model JSON did not parse ({}), attempting repair", first);
            let repaired = repair_brackets(span);
            serde_json::from_str(&repaired).map_err(|e| {
                warn!("Model JSON could not be repaired: {}", e);
                ParseError::InvalidJson(e.to_string())
            })
        }
    }
}

/// Parse raw model output into a scorecard.
///
/// Fails only when no JSON object can be located or repaired.
pub fn parse_feedback(raw: &str) -> Result<Scorecard, ParseError> {
    parse_json_object(raw).map(|value| Scorecard::from_value(&value))
}
