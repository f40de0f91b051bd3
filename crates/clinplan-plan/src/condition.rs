use clinplan_core::DatasetSchema;
use regex::Regex;

use crate::errors::ConditionError;
use crate::model::{ConditionExpression, Operator, Scalar};
use crate::semantic::map_literal;

/// A parsed clause whose literals have not been typed yet.
///
/// Literals stay as text until semantic mapping has had a chance to replace
/// them with observed category values; numeric coercion happens last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCondition {
    pub column: String,
    pub operator: Operator,
    pub literals: Vec<String>,
}

impl RawCondition {
    /// Type the literals, optionally resolving them against observed values.
    ///
    /// Returns `None` when a set operator ends up with no members.
    pub fn resolve(self, schema: Option<&DatasetSchema>) -> Option<ConditionExpression> {
        let RawCondition {
            column,
            operator,
            literals,
        } = self;

        let mapped: Vec<String> = match schema {
            Some(schema) if !matches!(operator, Operator::Gt | Operator::Lt) => literals
                .iter()
                .flat_map(|literal| map_literal(&column, literal, schema))
                .collect(),
            _ => literals,
        };

        if operator.is_set() || mapped.len() > 1 {
            let values = mapped.iter().map(|literal| Scalar::from_literal(literal));
            return ConditionExpression::set(column, operator, values);
        }

        let literal = mapped.into_iter().next()?;
        Some(ConditionExpression::scalar(
            column,
            operator,
            Scalar::from_literal(&literal),
        ))
    }
}

/// Parse a condition and type its values.
///
/// With a schema, literals are mapped onto observed column values first.
/// `Ok(None)` means the text is empty or matches none of the grammar forms.
pub fn parse_condition(
    text: &str,
    schema: Option<&DatasetSchema>,
) -> Result<Option<ConditionExpression>, ConditionError> {
    Ok(parse_raw_condition(text)?.and_then(|raw| raw.resolve(schema)))
}

/// Parse a condition string into a raw clause without typing values.
///
/// Forms are tried in priority order: set membership, disjunction of
/// equalities on one column, then a single comparison.
pub fn parse_raw_condition(text: &str) -> Result<Option<RawCondition>, ConditionError> {
    let expr = normalize_expression(text);
    if expr.is_empty() {
        return Ok(None);
    }

    if let Some(parsed) = parse_set_form(&expr) {
        return Ok(parsed);
    }

    if let Some(parsed) = parse_disjunction(&expr)? {
        return Ok(parsed);
    }

    Ok(parse_simple(&expr).map(|(column, operator, literal)| RawCondition {
        column,
        operator,
        literals: vec![literal],
    }))
}

fn normalize_expression(text: &str) -> String {
    let mut expr = text.trim().to_string();
    while wrapped_in_parens(&expr) {
        expr = expr[1..expr.len() - 1].trim().to_string();
    }
    expr
}

/// True when the opening `(` is closed by the final character.
///
/// `(A is x) or (A is y)` starts and ends with parentheses but is not wrapped.
fn wrapped_in_parens(expr: &str) -> bool {
    if !(expr.starts_with('(') && expr.ends_with(')')) {
        return false;
    }
    let mut depth = 0usize;
    for (idx, ch) in expr.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return idx == expr.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

/// `<col> is in {a, b}`; the outer `Option` says whether the form matched.
fn parse_set_form(expr: &str) -> Option<Option<RawCondition>> {
    let re = Regex::new(
        r"(?i)^\s*(.+?)\s+(is\s+not\s+in|is\s+in|not\s+in|in)\s*[\{\[\(]([^{}\[\]()]*)[\}\]\)]\s*$",
    )
    .ok()?;
    let caps = re.captures(expr)?;
    let operator = Operator::from_token(&caps[2])?;
    let literals: Vec<String> = caps[3]
        .split(',')
        .map(clean_literal)
        .filter(|literal| !literal.is_empty())
        .collect();

    if literals.is_empty() {
        return Some(None);
    }

    Some(Some(RawCondition {
        column: clean_column(&caps[1]),
        operator,
        literals,
    }))
}

/// `<col> is a or <col> is b` collapsed into one membership test.
///
/// Clauses may themselves be `<col> is in {..}` sets, whose members join the
/// union. Trailing bare values (`X is a or b`) extend the previous column.
/// Clauses over different columns are ambiguous; clauses with other
/// operators cannot be merged and leave the whole condition unparsed.
fn parse_disjunction(expr: &str) -> Result<Option<Option<RawCondition>>, ConditionError> {
    let parts = split_disjunction(expr);
    if parts.len() < 2 {
        return Ok(None);
    }

    let mut columns: Vec<String> = Vec::new();
    let mut literals = Vec::new();
    let mut merge_blocked = false;

    for (idx, part) in parts.iter().enumerate() {
        let part = normalize_expression(part);
        let clause = match parse_set_form(&part) {
            Some(Some(set)) => Some((set.column, set.operator, set.literals)),
            Some(None) => return Ok(Some(None)),
            None => parse_simple(&part)
                .map(|(column, operator, literal)| (column, operator, vec![literal])),
        };

        match clause {
            Some((column, operator, values)) => {
                if !columns
                    .iter()
                    .any(|seen| seen.eq_ignore_ascii_case(&column))
                {
                    columns.push(column);
                }
                if !matches!(operator, Operator::Eq | Operator::In) {
                    merge_blocked = true;
                }
                literals.extend(values);
            }
            None if idx > 0 => {
                let literal = clean_literal(&part);
                if !literal.is_empty() {
                    literals.push(literal);
                }
            }
            None => return Ok(Some(None)),
        }
    }

    if columns.len() > 1 {
        return Err(ConditionError::AmbiguousCondition { columns });
    }
    if merge_blocked {
        return Ok(Some(None));
    }

    Ok(Some(columns.into_iter().next().map(|column| RawCondition {
        column,
        operator: Operator::In,
        literals,
    })))
}

/// Split on the `or` keyword outside quoted literals.
fn split_disjunction(expr: &str) -> Vec<String> {
    let chars: Vec<char> = expr.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut idx = 0;

    while idx < chars.len() {
        let ch = chars[idx];
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => {}
            None if (ch == '\'' || ch == '"') && starts_token(&chars, idx) => quote = Some(ch),
            None if is_or_keyword(&chars, idx) => {
                parts.push(current.trim().to_string());
                current.clear();
                idx += 3;
                continue;
            }
            None => {}
        }
        current.push(ch);
        idx += 1;
    }
    parts.push(current.trim().to_string());
    parts
}

fn starts_token(chars: &[char], idx: usize) -> bool {
    idx == 0 || chars[idx - 1].is_whitespace() || matches!(chars[idx - 1], '{' | '[' | ',' | '=')
}

fn is_or_keyword(chars: &[char], idx: usize) -> bool {
    idx + 3 < chars.len()
        && chars[idx].is_whitespace()
        && chars[idx + 1].eq_ignore_ascii_case(&'o')
        && chars[idx + 2].eq_ignore_ascii_case(&'r')
        && chars[idx + 3].is_whitespace()
}

/// Single comparison: natural-language or symbolic operator.
///
/// When both operator families occur, the one appearing first wins so quoted
/// values containing "is" do not split the column name.
fn parse_simple(expr: &str) -> Option<(String, Operator, String)> {
    let word = Regex::new(
        r"(?i)^\s*(.+?)\s+(is\s+not|is\s+greater\s+than|is\s+less\s+than|greater\s+than|less\s+than|is)\s+(.+?)\s*$",
    )
    .ok()?;
    let symbol = Regex::new(r"^\s*(.+?)\s*(==|!=|=|>|<)\s*(.+?)\s*$").ok()?;

    let word_caps = word.captures(expr);
    let symbol_caps = symbol.captures(expr);

    let caps = match (word_caps, symbol_caps) {
        (Some(word_caps), Some(symbol_caps)) => {
            let word_start = word_caps.get(2).map(|m| m.start()).unwrap_or(usize::MAX);
            let symbol_start = symbol_caps.get(2).map(|m| m.start()).unwrap_or(usize::MAX);
            if symbol_start < word_start {
                symbol_caps
            } else {
                word_caps
            }
        }
        (Some(caps), None) | (None, Some(caps)) => caps,
        (None, None) => return None,
    };

    let operator = Operator::from_token(&caps[2])?;
    let raw_value = caps[3].trim();
    if raw_value.starts_with('=') || starts_with_set_operator(raw_value) {
        return None;
    }

    let column = clean_column(&caps[1]);
    let literal = clean_literal(raw_value);
    if column.is_empty() || literal.is_empty() {
        return None;
    }
    Some((column, operator, literal))
}

/// `in {..}` or `not in [..]` left over from a set form that did not match.
fn starts_with_set_operator(value: &str) -> bool {
    Regex::new(r"(?i)^(not\s+)?in\s*[\{\[\(]")
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

fn clean_column(raw: &str) -> String {
    strip_quotes(raw.trim().trim_matches('`')).to_string()
}

fn clean_literal(raw: &str) -> String {
    strip_quotes(raw.trim()).trim().to_string()
}

fn strip_quotes(raw: &str) -> &str {
    let trimmed = raw.trim();
    for quote in ['\'', '"'] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return &trimmed[1..trimmed.len() - 1];
        }
    }
    trimmed.trim_matches(|ch| ch == '\'' || ch == '"')
}
