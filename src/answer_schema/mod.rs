//! Answer-Schema Normalizer (C5, §4.5): a single entry point all paths
//! (direct tool calls, C4's extraction fallback) funnel through so every
//! stored `AnswerSchema` is canonical, regardless of how the agent phrased
//! its answer.

use serde_json::Value;
use thiserror::Error;

use crate::types::{AnswerSchema, ItemType};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("no usable answer content in input")]
    NoUsableAnswer,

    #[error("keyword list must not be empty")]
    EmptyKeywords,
}

/// Normalizes any of the shapes in §4.5's table into a canonical
/// `AnswerSchema`. `correct_answer` is the item's own `correct_answer`
/// field, used only for the bare-string `"exact_match"` shape — the
/// normalizer never invents answer content absent from the input.
pub fn normalize(
    raw: &Value,
    item_type: ItemType,
    correct_answer: Option<&str>,
) -> Result<AnswerSchema, NormalizeError> {
    match raw {
        Value::Null => infer_from_item_type(item_type, correct_answer),

        Value::String(s) if s == "exact_match" => {
            let answer = correct_answer.ok_or(NormalizeError::NoUsableAnswer)?;
            Ok(AnswerSchema::exact_match(answer, "bare_string"))
        }
        Value::String(s) if s == "keyword_match" => {
            Err(NormalizeError::NoUsableAnswer) // bare string carries no keywords to extract
        }
        Value::String(_) => infer_from_item_type(item_type, correct_answer),

        Value::Object(map) => {
            if let Some(kind) = map.get("type").or_else(|| map.get("kind")).and_then(|v| v.as_str()) {
                return match kind {
                    "exact_match" => {
                        let answer = map
                            .get("correct_answer")
                            .and_then(|v| v.as_str())
                            .or(correct_answer)
                            .ok_or(NormalizeError::NoUsableAnswer)?;
                        Ok(AnswerSchema::exact_match(answer, "canonical"))
                    }
                    "keyword_match" => {
                        let keywords = map
                            .get("keywords")
                            .and_then(|v| v.as_array())
                            .ok_or(NormalizeError::NoUsableAnswer)?;
                        build_keywords(keywords, "canonical")
                    }
                    "true_false" => {
                        let raw_bool = map
                            .get("correct_answer")
                            .or_else(|| map.get("correct_bool"))
                            .ok_or(NormalizeError::NoUsableAnswer)?;
                        let b = parse_boolish_value(raw_bool).ok_or(NormalizeError::NoUsableAnswer)?;
                        Ok(AnswerSchema::true_false(b, "canonical"))
                    }
                    _ => infer_from_item_type(item_type, correct_answer),
                };
            }

            if let Some(k) = map.get("correct_key").and_then(|v| v.as_str()) {
                return Ok(AnswerSchema::exact_match(k, "legacy_correct_key"));
            }
            if let Some(arr) = map.get("correct_keywords").and_then(|v| v.as_array()) {
                return build_keywords(arr, "legacy_correct_keywords");
            }
            if let Some(arr) = map.get("keywords").and_then(|v| v.as_array()) {
                return build_keywords(arr, "legacy_keywords");
            }

            infer_from_item_type(item_type, correct_answer)
        }

        Value::Array(arr) => build_keywords(arr, "bare_keywords"),

        _ => infer_from_item_type(item_type, correct_answer),
    }
}

fn infer_from_item_type(
    item_type: ItemType,
    correct_answer: Option<&str>,
) -> Result<AnswerSchema, NormalizeError> {
    match item_type {
        ItemType::MultipleChoice => {
            let answer = correct_answer.ok_or(NormalizeError::NoUsableAnswer)?;
            Ok(AnswerSchema::exact_match(answer, "inferred"))
        }
        ItemType::TrueFalse => {
            let raw = correct_answer.ok_or(NormalizeError::NoUsableAnswer)?;
            let b = parse_boolish(raw).ok_or(NormalizeError::NoUsableAnswer)?;
            Ok(AnswerSchema::true_false(b, "inferred"))
        }
        ItemType::ShortAnswer => {
            let answer = correct_answer.ok_or(NormalizeError::NoUsableAnswer)?;
            let keywords: Vec<String> = answer
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if keywords.is_empty() {
                return Err(NormalizeError::NoUsableAnswer);
            }
            Ok(dedupe_and_build(keywords, "inferred"))
        }
    }
}

fn build_keywords(arr: &[Value], source_format: &str) -> Result<AnswerSchema, NormalizeError> {
    let keywords: Vec<String> = arr
        .iter()
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if keywords.is_empty() {
        return Err(NormalizeError::EmptyKeywords);
    }
    Ok(dedupe_and_build(keywords, source_format))
}

/// Trims and de-duplicates case-insensitively while keeping original casing
/// of the first occurrence, per §4.5's rule.
fn dedupe_and_build(keywords: Vec<String>, source_format: &str) -> AnswerSchema {
    let mut seen = std::collections::HashSet::new();
    let mut deduped = Vec::new();
    for k in keywords {
        let key = k.to_lowercase();
        if seen.insert(key) {
            deduped.push(k);
        }
    }
    AnswerSchema::keyword_match(deduped, source_format)
}

fn parse_boolish_value(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => parse_boolish(s),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

/// Normalizes boolean-ish strings: `true/false`, `yes/no`, `1/0`,
/// case-insensitive (§4.5, reused by §4.8's true_false scoring).
pub fn parse_boolish(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "y" | "t" => Some(true),
        "false" | "no" | "0" | "n" | "f" => Some(false),
        _ => None,
    }
}
