//! # Parsing Utils
//!
//! Extracts the JSON decision object from a reasoning model's raw reply.
//! Strict parsing comes first; the repair pass only runs when that fails.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn think_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("static regex"))
}

/// Removes `<think>...</think>` blocks. A dangling `</think>` drops everything before it.
pub fn strip_reasoning(text: &str) -> String {
    let without_blocks = think_regex().replace_all(text, "");
    match without_blocks.rfind("</think>") {
        Some(idx) => without_blocks[idx + "</think>".len()..].to_string(),
        None => without_blocks.into_owned(),
    }
}

/// Drops code-fence marker lines (```json, ```).
pub fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The span from the first `{` to the last `}`.
pub fn json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Strips `//` and `/* */` comments and `#` comment lines outside strings.
fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;
    let mut line_start = true;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                line_start = false;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            '#' if line_start => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '\n' => {
                line_start = true;
                out.push(c);
            }
            _ => {
                if !c.is_whitespace() {
                    line_start = false;
                }
                out.push(c);
            }
        }
    }
    out
}

#[derive(Clone, Copy, PartialEq)]
enum Last {
    Structural,
    ValueEnd,
}

fn is_literal_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.' | '_')
}

fn flush_literal(literal: &mut String, out: &mut String) {
    if literal.is_empty() {
        return;
    }
    let mapped = match literal.as_str() {
        "True" => "true",
        "False" => "false",
        "None" => "null",
        other => other,
    };
    out.push_str(mapped);
    literal.clear();
}

/// Repairs the common defects of hand-written JSON: comments, stray whitespace
/// and newlines inside strings, missing commas between values, trailing commas
/// and Python literals.
pub fn normalize(candidate: &str) -> String {
    let stripped = strip_comments(candidate);
    let mut out = String::with_capacity(stripped.len());
    let mut literal = String::new();
    let mut last = Last::Structural;
    let mut in_string = false;
    let mut escaped = false;

    for c in stripped.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
            } else if c == '\\' {
                escaped = true;
                out.push(c);
            } else if c == '"' {
                in_string = false;
                last = Last::ValueEnd;
                out.push(c);
            } else if c.is_whitespace() {
                if !out.ends_with(' ') {
                    out.push(' ');
                }
            } else {
                out.push(c);
            }
            continue;
        }

        if is_literal_char(c) {
            if literal.is_empty() && last == Last::ValueEnd {
                out.push(',');
            }
            literal.push(c);
            continue;
        }
        if !literal.is_empty() {
            flush_literal(&mut literal, &mut out);
            last = Last::ValueEnd;
        }

        match c {
            _ if c.is_whitespace() => {}
            '"' | '{' | '[' => {
                if last == Last::ValueEnd {
                    out.push(',');
                }
                out.push(c);
                if c == '"' {
                    in_string = true;
                } else {
                    last = Last::Structural;
                }
            }
            '}' | ']' => {
                if out.ends_with(',') {
                    out.pop();
                }
                out.push(c);
                last = Last::ValueEnd;
            }
            _ => {
                out.push(c);
                last = Last::Structural;
            }
        }
    }
    flush_literal(&mut literal, &mut out);
    out
}

/// Finds and parses the decision object in `text`.
pub fn extract_json(text: &str) -> Result<Value, String> {
    let cleaned = strip_code_fences(&strip_reasoning(text));
    let span = json_span(&cleaned).ok_or_else(|| "no JSON object found".to_string())?;

    match serde_json::from_str::<Value>(span) {
        Ok(value) => Ok(value),
        Err(first) => {
            let repaired = normalize(span);
            serde_json::from_str::<Value>(&repaired).map_err(|second| {
                tracing::debug!("Repaired candidate: {}", repaired);
                format!("{first}; after repair: {second}")
            })
        }
    }
}
