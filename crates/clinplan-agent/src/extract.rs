use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Why a response did not yield a JSON value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractFailure {
    NoObject,
    InvalidJson(String),
}

impl ExtractFailure {
    pub fn reason(&self) -> String {
        match self {
            ExtractFailure::NoObject => "no JSON object in response".to_string(),
            ExtractFailure::InvalidJson(err) => format!("invalid JSON after repair: {err}"),
        }
    }
}

/// Pull the plan object out of a noisy completion.
///
/// Fences are stripped and the first balanced `{...}` span is parsed; if that
/// fails, comments and trailing commas are removed and parsing is retried once.
pub fn extract_json(raw: &str) -> Result<Value, ExtractFailure> {
    let unfenced = strip_code_fences(raw);
    let span = outermost_object(&unfenced).ok_or(ExtractFailure::NoObject)?;

    if let Ok(value) = serde_json::from_str::<Value>(span) {
        return Ok(value);
    }

    let repaired = strip_trailing_commas(&strip_comments(span));
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => {
            debug!(
                event = "plan_json_repaired",
                original_len = span.len(),
                repaired_len = repaired.len()
            );
            Ok(value)
        }
        Err(err) => Err(ExtractFailure::InvalidJson(err.to_string())),
    }
}

/// Remove markdown code fences (with or without a language tag).
pub fn strip_code_fences(raw: &str) -> String {
    match Regex::new(r"```[A-Za-z0-9_-]*") {
        Ok(re) => re.replace_all(raw, "").into_owned(),
        Err(_) => raw.replace("```", ""),
    }
}

/// First `{` through its balanced `}`, ignoring braces inside strings.
///
/// An object that never closes extends to the last `}` in the text.
pub fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Drop `//` line comments and `/* */` block comments outside strings.
pub fn strip_comments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut idx = 0;

    while idx < chars.len() {
        let ch = chars[idx];
        if in_string {
            out.push(ch);
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            idx += 1;
            continue;
        }

        let next = chars.get(idx + 1).copied();
        match (ch, next) {
            ('"', _) => {
                in_string = true;
                out.push(ch);
                idx += 1;
            }
            ('/', Some('/')) => {
                while idx < chars.len() && chars[idx] != '\n' {
                    idx += 1;
                }
            }
            ('/', Some('*')) => {
                idx += 2;
                while idx < chars.len() && !(chars[idx] == '*' && next_is(&chars, idx, '/')) {
                    idx += 1;
                }
                idx += 2;
            }
            _ => {
                out.push(ch);
                idx += 1;
            }
        }
    }
    out
}

fn next_is(chars: &[char], idx: usize, expected: char) -> bool {
    chars.get(idx + 1) == Some(&expected)
}

/// Drop commas that directly precede `}` or `]` outside strings.
pub fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (idx, &ch) in chars.iter().enumerate() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            out.push(ch);
            continue;
        }
        if ch == '"' {
            in_string = true;
        }
        if ch == ',' {
            let closes = chars[idx + 1..]
                .iter()
                .find(|next| !next.is_whitespace())
                .is_some_and(|next| matches!(next, '}' | ']'));
            if closes {
                continue;
            }
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repairs_fenced_response_with_trailing_comma() {
        let raw = "Sure! ```json\n{\"mode\": \"survival\", \"grouping_variable\": \"X\",}\n```";
        let value = extract_json(raw).expect("repaired");
        assert_eq!(value, json!({"mode": "survival", "grouping_variable": "X"}));
    }

    #[test]
    fn strips_comments_outside_strings() {
        let raw = r#"{
            // the analysis family
            "mode": "case_control", /* strict */
            "target_variable": "http://not-a-comment",
            "filters": ["AGE greater than 60",],
        }"#;
        let value = extract_json(raw).expect("repaired");
        assert_eq!(
            value,
            json!({
                "mode": "case_control",
                "target_variable": "http://not-a-comment",
                "filters": ["AGE greater than 60"],
            })
        );
    }

    #[test]
    fn braces_inside_strings_do_not_close_the_object() {
        let raw = r#"plan: {"case_condition": "STAGE is in {Stage III}", "mode": "survival"} thanks"#;
        let span = outermost_object(raw).expect("span");
        assert!(span.ends_with("\"survival\"}"));
    }

    #[test]
    fn prose_has_no_object() {
        assert_eq!(
            extract_json("I would run a survival analysis."),
            Err(ExtractFailure::NoObject)
        );
    }

    #[test]
    fn broken_json_reports_invalid() {
        assert!(matches!(
            extract_json("{\"mode\": survival}"),
            Err(ExtractFailure::InvalidJson(_))
        ));
    }
}
