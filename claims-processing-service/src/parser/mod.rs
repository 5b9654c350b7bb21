//! Recovery of structured JSON from model completions that were asked to return JSON.
//!
//! Models wrap JSON in markdown fences, add prose, leave trailing commas, use JavaScript
//! literal syntax or stop mid-object when they hit the token limit. [`parse_ai_response`]
//! tries a fixed ladder of increasingly aggressive strategies and returns the first value
//! that parses. It never guesses: if every strategy fails the error says so.

mod literal;

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::ParseError;

static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",(\s*[}\]])").unwrap());
static BARE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([{,]\s*)([A-Za-z_$][A-Za-z0-9_$]*)(\s*:)").unwrap());
static NON_JSON_SENTINEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\b(?:Infinity|NaN|undefined)\b").unwrap());

const PREVIEW_CHARS: usize = 120;
const FENCE: &str = "```";

type Strategy = fn(&str) -> Result<Value, String>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("direct", parse_direct),
    ("balanced_slice", parse_balanced_slice),
    ("syntax_repair", parse_repaired_syntax),
    ("truncation_repair", parse_repaired_truncation),
    ("literal_evaluation", parse_literal),
];

/// Parse a raw model completion into a JSON value.
///
/// Strategies run in a fixed order and the first success wins:
/// 1. the trimmed text as-is
/// 2. the first balanced `{...}`/`[...]` of each markdown fence body, then of the whole text
/// 3. that slice with trailing commas, single quotes, bare keys and `NaN`-like tokens fixed
/// 4. the text cut after its first complete value, with quotes normalized and raw newlines
///    escaped; a completion that stops before its value is closed is rejected
/// 5. a sandboxed JavaScript object-literal evaluator (no code is ever executed)
pub fn parse_ai_response(raw: &str) -> Result<Value, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let mut last_error = String::new();
    for (attempt, (name, strategy)) in STRATEGIES.iter().enumerate() {
        match strategy(raw) {
            Ok(value) => {
                if attempt > 0 {
                    debug!(strategy = name, attempt = attempt + 1, "recovered JSON from AI response");
                }
                return Ok(value);
            }
            Err(e) => last_error = format!("{name}: {e}"),
        }
    }

    Err(ParseError::Unrecoverable {
        attempts: STRATEGIES.len(),
        last_error,
        content_length: raw.chars().count(),
        preview: raw.trim().chars().take(PREVIEW_CHARS).collect(),
    })
}

fn parse_direct(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw.trim()).map_err(|e| e.to_string())
}

fn parse_balanced_slice(raw: &str) -> Result<Value, String> {
    first_success(raw, |text| {
        let slice = balanced_slice(text).ok_or("no balanced JSON object or array found")?;
        serde_json::from_str(slice).map_err(|e| e.to_string())
    })
}

fn parse_repaired_syntax(raw: &str) -> Result<Value, String> {
    first_success(raw, |text| {
        let slice = balanced_slice(text).ok_or("no balanced JSON object or array found")?;
        serde_json::from_str(&repair_syntax(slice)).map_err(|e| e.to_string())
    })
}

fn parse_repaired_truncation(raw: &str) -> Result<Value, String> {
    first_success(raw, |text| {
        let start = find_opener(text).ok_or("no JSON object or array start found")?;
        let normalized = normalize_quotes(&text[start..]);
        let complete = cut_after_first_value(&normalized)?;
        serde_json::from_str(&repair_syntax(&complete)).map_err(|e| e.to_string())
    })
}

fn parse_literal(raw: &str) -> Result<Value, String> {
    first_success(raw, |text| {
        let text = text.trim();
        if !(text.starts_with('{') || text.starts_with('[')) {
            return Err("content is not an object or array literal".to_string());
        }
        if let Some(flag) = code_red_flag(text) {
            return Err(format!("content contains `{flag}` outside of a string"));
        }
        literal::evaluate(text)
    })
}

/// Runs `attempt` over every candidate text and keeps the first value; on failure reports the
/// error from the most likely candidate.
fn first_success(
    raw: &str,
    attempt: impl Fn(&str) -> Result<Value, String>,
) -> Result<Value, String> {
    let mut first_error = None;
    for candidate in candidate_texts(raw) {
        match attempt(candidate) {
            Ok(value) => return Ok(value),
            Err(e) if first_error.is_none() => first_error = Some(e),
            Err(_) => {}
        }
    }
    Err(first_error.unwrap_or_else(|| "no content to parse".to_string()))
}

/// Texts that may hold the answer, most likely first: every markdown fence body in order,
/// then the whole completion.
fn candidate_texts(raw: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    let mut rest = raw;
    while let Some(open) = rest.find(FENCE) {
        let body = skip_info_string(&rest[open + FENCE.len()..]);
        match find_closing_fence(body) {
            Some(close) => {
                candidates.push(&body[..close]);
                rest = &body[close + FENCE.len()..];
            }
            None => {
                candidates.push(body);
                break;
            }
        }
    }
    candidates.push(raw);
    candidates
}

/// Skips a language tag such as `json` on the opening fence line. Anything else on that line,
/// like a `{`, is already content.
fn skip_info_string(after_open: &str) -> &str {
    let line_end = after_open.find('\n').unwrap_or(after_open.len());
    let is_tag = after_open[..line_end]
        .trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.'));
    if is_tag {
        after_open.get(line_end + 1..).unwrap_or("")
    } else {
        after_open
    }
}

/// Offset of the closing fence, ignoring fences quoted inside JSON strings.
fn find_closing_fence(body: &str) -> Option<usize> {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if body[i..].starts_with(FENCE) {
            return Some(i);
        }
    }
    // Unbalanced quotes in a non-JSON block
    if in_string { body.find(FENCE) } else { None }
}

fn find_opener(text: &str) -> Option<usize> {
    text.find(['{', '['])
}

/// Slice of the first complete JSON object or array, tracking string and escape state.
fn balanced_slice(text: &str) -> Option<&str> {
    let start = find_opener(text)?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
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
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Applies the syntax repairs that turn near-JSON into JSON without touching string contents.
fn repair_syntax(text: &str) -> String {
    let double_quoted = convert_single_quotes(text);
    let keyed = map_outside_strings(&double_quoted, |code| {
        BARE_KEY.replace_all(code, "$1\"$2\"$3").into_owned()
    });
    map_outside_strings(&keyed, |code| {
        let without_commas = TRAILING_COMMA.replace_all(code, "$1");
        NON_JSON_SENTINEL
            .replace_all(&without_commas, "null")
            .into_owned()
    })
}

/// Rewrites `'...'` strings as `"..."`, leaving double-quoted strings alone.
fn convert_single_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_double = false;
    let mut in_single = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_double {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_double = false;
            }
        } else if in_single {
            if escaped {
                escaped = false;
                if c != '\'' {
                    out.push('\\');
                }
                out.push(c);
            } else if c == '\\' {
                escaped = true;
            } else if c == '\'' {
                out.push('"');
                in_single = false;
            } else if c == '"' {
                out.push_str("\\\"");
            } else {
                out.push(c);
            }
        } else {
            match c {
                '"' => {
                    in_double = true;
                    out.push(c);
                }
                '\'' => {
                    in_single = true;
                    out.push('"');
                }
                _ => out.push(c),
            }
        }
    }
    out
}

/// Runs `rewrite` over every stretch of text that sits outside a double-quoted string.
fn map_outside_strings(text: &str, rewrite: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut segment_start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                out.push_str(&text[segment_start..=i]);
                segment_start = i + 1;
            }
        } else if c == '"' {
            out.push_str(&rewrite(&text[segment_start..i]));
            segment_start = i;
            in_string = true;
        }
    }

    if in_string {
        out.push_str(&text[segment_start..]);
    } else {
        out.push_str(&rewrite(&text[segment_start..]));
    }
    out
}

/// Replaces typographic quotes and undoes a layer of `\"` escaping when no bare quote exists.
fn normalize_quotes(text: &str) -> String {
    let straightened: String = text
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect();

    if straightened.contains("\\\"") && !has_unescaped_quote(&straightened) {
        straightened.replace("\\\"", "\"")
    } else {
        straightened
    }
}

fn has_unescaped_quote(text: &str) -> bool {
    let mut previous = None;
    for c in text.chars() {
        if c == '"' && previous != Some('\\') {
            return true;
        }
        previous = Some(c);
    }
    false
}

/// Cuts everything after the first complete value and escapes raw control characters inside
/// strings. A completion that ends before the value is closed is an error, never patched up.
fn cut_after_first_value(text: &str) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut open = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => {
                    escaped = false;
                    out.push(c);
                }
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
            continue;
        }

        out.push(c);
        match c {
            '"' => in_string = true,
            '{' | '[' => open += 1,
            '}' | ']' => {
                open = open.saturating_sub(1);
                if open == 0 {
                    return Ok(out);
                }
            }
            _ => {}
        }
    }

    if in_string {
        Err("completion ends inside an unterminated string".to_string())
    } else {
        Err(format!("completion ends with {open} unclosed object(s) or array(s)"))
    }
}

/// Characters that suggest executable code rather than a data literal.
fn code_red_flag(text: &str) -> Option<char> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in text.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | ')' | '=' | ';' | '`' => return Some(c),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json_round_trips() {
        let value = json!({"claimType": "auto", "estimatedAmount": 1500.5, "tags": ["a", "b"]});
        let parsed = parse_ai_response(&value.to_string()).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn test_markdown_fences_are_stripped() {
        let raw = "Here is the result:\n```json\n{\"riskLevel\": \"low\"}\n```\nLet me know!";
        assert_eq!(parse_ai_response(raw).unwrap(), json!({"riskLevel": "low"}));
    }

    #[test]
    fn test_trailing_prose_is_ignored() {
        let raw = r#"{"riskLevel": "high", "note": "braces } in strings"} I hope this helps {"#;
        assert_eq!(
            parse_ai_response(raw).unwrap(),
            json!({"riskLevel": "high", "note": "braces } in strings"})
        );
    }

    #[test]
    fn test_trailing_commas_are_removed() {
        let raw = r#"{"items": [1, 2, 3,], "done": true,}"#;
        assert_eq!(
            parse_ai_response(raw).unwrap(),
            json!({"items": [1, 2, 3], "done": true})
        );
    }

    #[test]
    fn test_single_quoted_keys_and_values_are_converted() {
        let raw = r#"{'claimType': 'auto', 'quote': 'she said "stop"', "owner's": 'x'}"#;
        assert_eq!(
            parse_ai_response(raw).unwrap(),
            json!({"claimType": "auto", "quote": "she said \"stop\"", "owner's": "x"})
        );
    }

    #[test]
    fn test_bare_keys_and_sentinels_are_repaired() {
        let raw = r#"{riskScore: NaN, ratio: -Infinity, note: "NaN stays: here", extra: undefined}"#;
        assert_eq!(
            parse_ai_response(raw).unwrap(),
            json!({"riskScore": null, "ratio": null, "note": "NaN stays: here", "extra": null})
        );
    }

    #[test]
    fn test_truncated_completion_is_rejected() {
        let raw = r#"{"riskLevel": "high", "riskScore": 8"#;
        let ParseError::Unrecoverable { last_error, .. } = parse_ai_response(raw).unwrap_err() else {
            panic!("expected unrecoverable error");
        };
        assert!(last_error.contains("literal_evaluation"));

        let raw = r#"{"executiveSummary": "Rear-end collision", "keyFindings": ["damage to bumper", "no inj"#;
        assert!(parse_ai_response(raw).is_err());
    }

    #[test]
    fn test_truncation_inside_a_string_is_rejected() {
        assert_eq!(
            cut_after_first_value(r#"{"message": "Thanks", "subj"#),
            Err("completion ends inside an unterminated string".to_string())
        );
        assert!(parse_ai_response(r#"{"message": "Thanks", "subject":"#).is_err());
    }

    #[test]
    fn test_fence_inside_a_string_does_not_end_the_block() {
        let raw = "```json\n{\"memo\": \"run ```cargo test``` first\", \"subject\": \"x\"}\n```";
        assert_eq!(
            parse_ai_response(raw).unwrap(),
            json!({"memo": "run ```cargo test``` first", "subject": "x"})
        );
    }

    #[test]
    fn test_brace_on_the_opening_fence_line_is_content() {
        let raw = "```{\n  \"claimType\": \"auto\"\n}\n```";
        assert_eq!(parse_ai_response(raw).unwrap(), json!({"claimType": "auto"}));

        let raw = "```json {\"claimType\": \"life\"}```";
        assert_eq!(parse_ai_response(raw).unwrap(), json!({"claimType": "life"}));
    }

    #[test]
    fn test_later_fence_is_used_when_an_earlier_one_holds_no_json() {
        let raw = "Use this layout:\n```\nriskLevel: one of low|medium|high\n```\n\
                   Answer:\n```json\n{\"riskLevel\": \"medium\"}\n```";
        assert_eq!(parse_ai_response(raw).unwrap(), json!({"riskLevel": "medium"}));
    }

    #[test]
    fn test_raw_newlines_and_curly_quotes_are_normalized() {
        let raw = "{\u{201C}memo\u{201D}: \u{201C}line one\nline two\u{201D}}";
        assert_eq!(
            parse_ai_response(raw).unwrap(),
            json!({"memo": "line one\nline two"})
        );
    }

    #[test]
    fn test_escaped_json_is_unescaped() {
        let raw = r#"{\"claimType\": \"health\"}"#;
        assert_eq!(parse_ai_response(raw).unwrap(), json!({"claimType": "health"}));
    }

    #[test]
    fn test_javascript_literal_is_evaluated() {
        let raw = "{\n  // risk block\n  score: 0x10,\n  ratio: .5,\n  tags: ['a',,'b'],\n}";
        assert_eq!(
            parse_ai_response(raw).unwrap(),
            json!({"score": 16, "ratio": 0.5, "tags": ["a", null, "b"]})
        );
    }

    #[test]
    fn test_code_is_never_evaluated() {
        let raw = "{ value: process.exit(1) }";
        let err = parse_ai_response(raw).unwrap_err();
        let ParseError::Unrecoverable { last_error, .. } = err else {
            panic!("expected unrecoverable error");
        };
        assert!(last_error.contains("literal_evaluation"));
        assert!(last_error.contains('('));
    }

    #[test]
    fn test_prose_fails_loudly() {
        let raw = "I'm sorry, I cannot determine the claim details from this document.";
        match parse_ai_response(raw).unwrap_err() {
            ParseError::Unrecoverable {
                attempts,
                content_length,
                preview,
                ..
            } => {
                assert_eq!(attempts, 5);
                assert_eq!(content_length, raw.chars().count());
                assert!(preview.starts_with("I'm sorry"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_blank_input_is_rejected() {
        assert_eq!(parse_ai_response("  \n "), Err(ParseError::EmptyResponse));
    }

    #[test]
    fn test_top_level_arrays_are_accepted() {
        let raw = "Findings:\n[\"late report\", \"prior claims\"]";
        assert_eq!(
            parse_ai_response(raw).unwrap(),
            json!(["late report", "prior claims"])
        );
    }
}
