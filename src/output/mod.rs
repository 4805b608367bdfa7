//! Output Converter (C4, §4.4): extracts a JSON item list from mixed
//! assistant text, normalizes each item's answer schema via C5, and
//! validates. Never raises; returns `(items, diagnostics)`.

use serde::{Deserialize, Serialize};

use crate::agent::Conversation;
use crate::answer_schema;
use crate::types::{AnswerSchema, ItemType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedItem {
    pub item_type: ItemType,
    pub stem: String,
    pub choices: Option<Vec<String>>,
    pub answer_schema: AnswerSchema,
    pub difficulty: u8,
    pub category: String,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub reason: String,
}

pub struct ConversionResult {
    pub items: Vec<GeneratedItem>,
    pub diagnostics: Vec<Diagnostic>,
}

pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";

/// Entry point: given the full ReAct transcript, produce canonical items.
pub fn convert(transcript: &Conversation) -> ConversionResult {
    let mut diagnostics = Vec::new();

    let candidate = transcript
        .last_assistant_message()
        .map(|m| m.content.as_str())
        .and_then(|content| content.rfind(FINAL_ANSWER_MARKER).map(|idx| &content[idx..]))
        .and_then(extract_balanced_json);

    let raw_items = match candidate {
        Some(candidate) => match parse_with_cleanup_cascade(&candidate) {
            Some(value) => unwrap_questions_key(value),
            None => {
                diagnostics.push(Diagnostic {
                    reason: "all cleanup strategies failed to parse Final Answer JSON".into(),
                });
                harvest_from_tool_calls(transcript, &mut diagnostics)
            }
        },
        None => {
            diagnostics.push(Diagnostic {
                reason: "no Final Answer marker with a balanced JSON body found".into(),
            });
            harvest_from_tool_calls(transcript, &mut diagnostics)
        }
    };

    let mut items = Vec::new();
    for raw in raw_items {
        match validate_and_normalize(&raw) {
            Ok(item) => items.push(item),
            Err(reason) => diagnostics.push(Diagnostic { reason }),
        }
    }

    ConversionResult { items, diagnostics }
}

fn harvest_from_tool_calls(
    transcript: &Conversation,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<serde_json::Value> {
    let calls = transcript.save_question_tool_calls();
    if calls.is_empty() {
        diagnostics.push(Diagnostic {
            reason: "no save_generated_question tool calls to fall back on".into(),
        });
    }
    calls.into_iter().map(|tc| tc.arguments.clone()).collect()
}

fn unwrap_questions_key(value: serde_json::Value) -> Vec<serde_json::Value> {
    match value {
        serde_json::Value::Array(arr) => arr,
        serde_json::Value::Object(ref map) if map.contains_key("questions") => map["questions"]
            .as_array()
            .cloned()
            .unwrap_or_default(),
        other => vec![other],
    }
}

/// Finds the first balanced `[...]` or `{...}` in `text`, tracking string
/// literals/escapes so braces inside quoted strings don't throw off the
/// depth count.
fn extract_balanced_json(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(|&b| b == b'[' || b == b'{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => depth += 1,
            b']' | b'}' => {
                depth -= 1;
                if depth == 0 {
                    return std::str::from_utf8(&bytes[start..=i]).ok().map(str::to_string);
                }
            }
            _ => {}
        }
    }
    None
}

/// §4.4 step 3: each cleanup step runs against a fresh copy of the
/// candidate string; the first one that parses wins.
fn parse_with_cleanup_cascade(candidate: &str) -> Option<serde_json::Value> {
    if let Ok(v) = serde_json::from_str(candidate) {
        return Some(v);
    }
    if let Ok(v) = serde_json::from_str(&normalize_python_literals(candidate)) {
        return Some(v);
    }
    if let Ok(v) = serde_json::from_str(&strip_trailing_commas(candidate)) {
        return Some(v);
    }
    if let Ok(v) = serde_json::from_str(&fix_escape_drift(candidate)) {
        return Some(v);
    }
    if let Ok(v) = serde_json::from_str(&strip_control_chars(candidate)) {
        return Some(v);
    }
    None
}

fn normalize_python_literals(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escaped = false;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            out.push(b as char);
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if b == b'"' {
            in_string = true;
            out.push('"');
            i += 1;
            continue;
        }
        if s[i..].starts_with("True") && !prev_is_ident(s, i) && !next_is_ident(s, i + 4) {
            out.push_str("true");
            i += 4;
            continue;
        }
        if s[i..].starts_with("False") && !prev_is_ident(s, i) && !next_is_ident(s, i + 5) {
            out.push_str("false");
            i += 5;
            continue;
        }
        if s[i..].starts_with("None") && !prev_is_ident(s, i) && !next_is_ident(s, i + 4) {
            out.push_str("null");
            i += 4;
            continue;
        }
        out.push(b as char);
        i += 1;
    }
    out
}

fn prev_is_ident(s: &str, i: usize) -> bool {
    i > 0 && s.as_bytes()[i - 1].is_ascii_alphanumeric()
}
fn next_is_ident(s: &str, i: usize) -> bool {
    i < s.len() && s.as_bytes()[i].is_ascii_alphanumeric()
}

fn strip_trailing_commas(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == ']' || chars[j] == '}') {
                i += 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Fixes common escape drift: stray single backslashes not followed by a
/// recognized escape character are doubled so the JSON parser accepts them.
fn fix_escape_drift(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' {
            let next = chars.get(i + 1).copied();
            let valid = matches!(next, Some('"') | Some('\\') | Some('/') | Some('n') | Some('t') | Some('r') | Some('b') | Some('f') | Some('u'));
            if valid {
                out.push('\\');
            } else {
                out.push_str("\\\\");
            }
            i += 1;
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn strip_control_chars(s: &str) -> String {
    s.chars().filter(|c| !c.is_control() || *c == '\n' || *c == '\t').collect()
}

fn validate_and_normalize(raw: &serde_json::Value) -> Result<GeneratedItem, String> {
    let stem = raw
        .get("stem")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    if stem.trim().is_empty() {
        return Err("item has an empty stem".into());
    }

    let item_type_str = raw.get("item_type").and_then(|v| v.as_str()).unwrap_or_default();
    let item_type = match item_type_str {
        "multiple_choice" => ItemType::MultipleChoice,
        "true_false" => ItemType::TrueFalse,
        "short_answer" => ItemType::ShortAnswer,
        other => return Err(format!("unknown item_type '{other}'")),
    };

    let choices: Option<Vec<String>> = raw
        .get("choices")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|c| c.as_str().map(str::to_string)).collect());

    let correct_answer = raw.get("correct_answer").and_then(|v| v.as_str());

    if item_type == ItemType::MultipleChoice {
        match &choices {
            Some(c) if (4..=5).contains(&c.len()) => {
                if let Some(ca) = correct_answer {
                    if !c.iter().any(|x| x.trim() == ca.trim()) {
                        return Err("correct_answer is not among choices".into());
                    }
                } else {
                    return Err("multiple_choice item is missing correct_answer".into());
                }
            }
            Some(c) => return Err(format!("multiple_choice requires 4-5 choices, got {}", c.len())),
            None => return Err("multiple_choice item is missing choices".into()),
        }
    }

    let difficulty = raw.get("difficulty").and_then(|v| v.as_u64()).unwrap_or(0) as u8;
    if !(1..=10).contains(&difficulty) {
        return Err(format!("difficulty {difficulty} out of range [1..10]"));
    }

    let category = raw
        .get("category")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    if category.trim().is_empty() {
        return Err("item has an empty category".into());
    }

    let schema_input = raw.get("answer_schema").cloned().unwrap_or(serde_json::Value::Null);
    let answer_schema = answer_schema::normalize(&schema_input, item_type, correct_answer)
        .map_err(|e| format!("answer_schema normalization failed: {e}"))?;

    Ok(GeneratedItem {
        item_type,
        stem,
        choices,
        answer_schema,
        difficulty,
        category,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ConversationMessage;
    use serde_json::json;

    fn transcript_with_final_answer(body: &str) -> Conversation {
        let mut c = Conversation::new();
        c.push(ConversationMessage::assistant(format!("Final Answer: {body}")));
        c
    }

    #[test]
    fn parses_clean_json_array() {
        let body = json!([{
            "item_type": "multiple_choice",
            "stem": "What is ownership?",
            "choices": ["A", "B", "C", "D"],
            "correct_answer": "A",
            "answer_schema": {"type": "exact_match", "correct_answer": "A"},
            "difficulty": 5,
            "category": "rust",
        }])
        .to_string();
        let result = convert(&transcript_with_final_answer(&body));
        assert_eq!(result.items.len(), 1);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn unwraps_questions_key() {
        let body = json!({"questions": [{
            "item_type": "true_false",
            "stem": "Rust has a garbage collector.",
            "correct_answer": "false",
            "answer_schema": null,
            "difficulty": 3,
            "category": "rust",
        }]})
        .to_string();
        let result = convert(&transcript_with_final_answer(&body));
        assert_eq!(result.items.len(), 1);
    }

    #[test]
    fn cleans_python_literals_and_trailing_commas() {
        let body = r#"[{"item_type": "true_false", "stem": "x", "correct_answer": "True", "answer_schema": null, "difficulty": 4, "category": "rust",}]"#;
        let result = convert(&transcript_with_final_answer(body));
        assert_eq!(result.items.len(), 1);
    }

    #[test]
    fn rejects_mc_item_missing_choices() {
        let body = json!([{
            "item_type": "multiple_choice",
            "stem": "x",
            "correct_answer": "A",
            "answer_schema": {"type": "exact_match", "correct_answer": "A"},
            "difficulty": 5,
            "category": "rust",
        }])
        .to_string();
        let result = convert(&transcript_with_final_answer(&body));
        assert!(result.items.is_empty());
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[test]
    fn falls_back_to_tool_transcript_when_final_answer_is_unparseable() {
        let mut c = Conversation::new();
        c.push(ConversationMessage::assistant_tool_calls(vec![crate::agent::ToolCall {
            id: "1".into(),
            name: "save_generated_question".into(),
            arguments: json!({
                "item_type": "short_answer",
                "stem": "Explain ownership",
                "answer_schema": {"keywords": ["ownership", "borrowing"]},
                "difficulty": 5,
                "category": "rust",
            }),
        }]));
        c.push(ConversationMessage::assistant("Final Answer: {not valid json at all"));
        let result = convert(&c);
        assert_eq!(result.items.len(), 1);
    }
}
