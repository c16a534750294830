//! Filter and sort expressions for collection queries.
//!
//! Grammar:
//!
//! ```text
//! expr    := and ('||' and)*
//! and     := term ('&&' term)*
//! term    := '(' expr ')' | field op literal
//! op      := '=' | '!=' | '~' | '!~' | '>' | '>=' | '<' | '<='
//! literal := "string" | 'string' | number | true | false | null
//! ```
//!
//! `~` is a case-insensitive substring match. Fields may be dotted paths
//! into nested objects; `id`, `created` and `updated` address record metadata.

use std::cmp::Ordering;

use serde_json::Value;

use super::{DbError, DbResult, Record};

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    NotEq,
    Like,
    NotLike,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Or(Vec<Filter>),
    And(Vec<Filter>),
    Compare { field: String, op: Op, value: Value },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Value),
    Op(Op),
    And,
    Or,
    Open,
    Close,
}

impl Filter {
    /// Parse a filter expression.
    pub fn parse(input: &str) -> DbResult<Self> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let filter = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(invalid(input, "unexpected trailing input"));
        }
        Ok(filter)
    }

    /// Evaluate against a record.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::Or(terms) => terms.iter().any(|t| t.matches(record)),
            Filter::And(terms) => terms.iter().all(|t| t.matches(record)),
            Filter::Compare { field, op, value } => {
                let actual = record.lookup(field).unwrap_or(Value::Null);
                compare(&actual, *op, value)
            }
        }
    }
}

fn invalid(input: &str, reason: &str) -> DbError {
    DbError::InvalidQuery(format!("{} in filter `{}`", reason, input))
}

fn tokenize(input: &str) -> DbResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '&' | '|' => {
                if chars.get(i + 1) != Some(&c) {
                    return Err(invalid(input, "expected `&&` or `||`"));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
                i += 2;
            }
            '=' => {
                tokens.push(Token::Op(Op::Eq));
                i += 1;
            }
            '~' => {
                tokens.push(Token::Op(Op::Like));
                i += 1;
            }
            '!' => {
                match chars.get(i + 1) {
                    Some('=') => tokens.push(Token::Op(Op::NotEq)),
                    Some('~') => tokens.push(Token::Op(Op::NotLike)),
                    _ => return Err(invalid(input, "expected `!=` or `!~`")),
                }
                i += 2;
            }
            '>' | '<' => {
                let or_equal = chars.get(i + 1) == Some(&'=');
                let op = match (c, or_equal) {
                    ('>', false) => Op::Gt,
                    ('>', true) => Op::Gte,
                    ('<', false) => Op::Lt,
                    _ => Op::Lte,
                };
                tokens.push(Token::Op(op));
                i += if or_equal { 2 } else { 1 };
            }
            '"' | '\'' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(invalid(input, "unterminated string")),
                        Some('\\') => {
                            if let Some(&escaped) = chars.get(i + 1) {
                                text.push(escaped);
                            }
                            i += 2;
                        }
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            text.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Literal(Value::String(text)));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number: f64 = text
                    .parse()
                    .map_err(|_| invalid(input, "malformed number"))?;
                let value = serde_json::Number::from_f64(number)
                    .map(Value::Number)
                    .ok_or_else(|| invalid(input, "malformed number"))?;
                tokens.push(Token::Literal(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "true" => Token::Literal(Value::Bool(true)),
                    "false" => Token::Literal(Value::Bool(false)),
                    "null" => Token::Literal(Value::Null),
                    _ => Token::Ident(word),
                });
            }
            _ => return Err(invalid(input, &format!("unexpected character `{}`", c))),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn expr(&mut self) -> DbResult<Filter> {
        let mut terms = vec![self.and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Filter::Or(terms)
        })
    }

    fn and(&mut self) -> DbResult<Filter> {
        let mut terms = vec![self.term()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            terms.push(self.term()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Filter::And(terms)
        })
    }

    fn term(&mut self) -> DbResult<Filter> {
        match self.next() {
            Some(Token::Open) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(DbError::InvalidQuery("missing closing parenthesis".into())),
                }
            }
            Some(Token::Ident(field)) => {
                let op = match self.next() {
                    Some(Token::Op(op)) => op,
                    _ => {
                        return Err(DbError::InvalidQuery(format!(
                            "expected operator after `{}`",
                            field
                        )))
                    }
                };
                match self.next() {
                    Some(Token::Literal(value)) => Ok(Filter::Compare { field, op, value }),
                    _ => Err(DbError::InvalidQuery(format!(
                        "expected literal after `{}`",
                        field
                    ))),
                }
            }
            _ => Err(DbError::InvalidQuery("expected field or `(`".into())),
        }
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

fn contains(actual: &Value, needle: &Value) -> bool {
    let Some(needle) = as_text(needle).map(|n| n.to_lowercase()) else {
        return false;
    };
    match actual {
        Value::Array(items) => items.iter().any(|item| {
            as_text(item).is_some_and(|text| text.to_lowercase().contains(&needle))
        }),
        other => as_text(other).is_some_and(|text| text.to_lowercase().contains(&needle)),
    }
}

fn compare(actual: &Value, op: Op, expected: &Value) -> bool {
    match op {
        Op::Eq => values_equal(actual, expected),
        Op::NotEq => !values_equal(actual, expected),
        Op::Like => contains(actual, expected),
        Op::NotLike => !contains(actual, expected),
        Op::Gt | Op::Gte | Op::Lt | Op::Lte => {
            let ordering = match (actual, expected) {
                (Value::Number(a), Value::Number(b)) => a
                    .as_f64()
                    .zip(b.as_f64())
                    .and_then(|(a, b)| a.partial_cmp(&b)),
                (Value::String(a), Value::String(b)) => Some(compare_text(a, b)),
                _ => None,
            };
            match ordering {
                Some(o) => match op {
                    Op::Gt => o == Ordering::Greater,
                    Op::Gte => o != Ordering::Less,
                    Op::Lt => o == Ordering::Less,
                    _ => o != Ordering::Greater,
                },
                None => false,
            }
        }
    }
}

/// One sort key: field name plus direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

/// Parse `-created,name` style sort strings.
pub fn parse_sort(sort: &str) -> DbResult<Vec<SortKey>> {
    sort.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (descending, field) = match part.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, part.strip_prefix('+').unwrap_or(part)),
            };
            if field.is_empty() || !field.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
                return Err(DbError::InvalidQuery(format!("invalid sort field `{}`", part)));
            }
            Ok(SortKey {
                field: field.to_string(),
                descending,
            })
        })
        .collect()
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Strings order case-insensitively in both filters and sorts.
fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Total order over JSON values used for sorting; nulls first.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => compare_text(x, y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: Value) -> Record {
        Record {
            id: "r1".into(),
            collection: "test".into(),
            created: "2024-01-01T00:00:00.000000Z".into(),
            updated: "2024-01-01T00:00:00.000000Z".into(),
            fields: fields.as_object().cloned().unwrap_or_default(),
            expand: Default::default(),
        }
    }

    #[test]
    fn test_equality() {
        let r = record(json!({"patient": "abc", "total": 1200}));
        assert!(Filter::parse(r#"patient = "abc""#).unwrap().matches(&r));
        assert!(!Filter::parse(r#"patient = "abd""#).unwrap().matches(&r));
        assert!(Filter::parse("total = 1200").unwrap().matches(&r));
        assert!(Filter::parse("total != 5").unwrap().matches(&r));
    }

    #[test]
    fn test_substring_case_insensitive() {
        let r = record(json!({"name": "Resina Compuesta"}));
        assert!(Filter::parse("name ~ 'resina'").unwrap().matches(&r));
        assert!(Filter::parse("name !~ 'corona'").unwrap().matches(&r));
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let r = record(json!({"a": 1, "b": 2, "c": 3}));
        // false && true || true
        assert!(Filter::parse("a = 5 && b = 2 || c = 3").unwrap().matches(&r));
        // false && (true || true)
        assert!(!Filter::parse("a = 5 && (b = 2 || c = 3)").unwrap().matches(&r));
    }

    #[test]
    fn test_ordering_operators() {
        let r = record(json!({"balance": 250.5}));
        assert!(Filter::parse("balance > 100").unwrap().matches(&r));
        assert!(Filter::parse("balance >= 250.5").unwrap().matches(&r));
        assert!(!Filter::parse("balance < 0").unwrap().matches(&r));
    }

    #[test]
    fn test_string_ordering_matches_sort_order() {
        let r = record(json!({"last_name": "Castro"}));
        assert!(Filter::parse(r#"last_name > "b""#).unwrap().matches(&r));
        assert!(Filter::parse(r#"last_name <= "castro""#).unwrap().matches(&r));

        let (a, b) = (json!("Castro"), json!("b"));
        assert_eq!(compare_values(&a, &b), Ordering::Greater);
    }

    #[test]
    fn test_metadata_and_nested_fields() {
        let r = record(json!({"plan": {"plan_type": "monthly"}}));
        assert!(Filter::parse(r#"id = "r1""#).unwrap().matches(&r));
        assert!(Filter::parse(r#"plan.plan_type = "monthly""#).unwrap().matches(&r));
        assert!(Filter::parse("missing = null").unwrap().matches(&r));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Filter::parse("patient =").is_err());
        assert!(Filter::parse("patient \"x\"").is_err());
        assert!(Filter::parse("a = 1 & b = 2").is_err());
        assert!(Filter::parse("(a = 1").is_err());
        assert!(Filter::parse("name = 'open").is_err());
    }

    #[test]
    fn test_parse_sort() {
        let keys = parse_sort("-created, name").unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys[0].descending);
        assert_eq!(keys[1].field, "name");
        assert!(parse_sort("na me").is_err());
    }
}
