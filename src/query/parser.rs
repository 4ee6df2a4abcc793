use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::core::error::{Error, Result};
use crate::query::ast::{
    BoolQuery, MatchPhraseQuery, MatchQuery, PrefixQuery, Query, RangeQuery, RangeValue, TermQuery,
};

/// Maximum bool nesting: a bool inside a bool is allowed, a third level is
/// rejected before any child is lowered.
const MAX_BOOL_DEPTH: usize = 2;

/// Parses and validates the JSON query DSL, lowering it into the internal
/// query tree.
///
/// The accepted request shape is `{"query": <clause>}`; siblings of
/// `query` are ignored. Clause grammar: `match`, `match_phrase`, `term`,
/// `prefix`, `range`, `match_all`, `bool` with `must`/`should`/
/// `must_not`/`filter` arrays.
pub struct DslParser {
    max_bool_depth: usize,
}

impl Default for DslParser {
    fn default() -> Self {
        DslParser {
            max_bool_depth: MAX_BOOL_DEPTH,
        }
    }
}

impl DslParser {
    pub fn new() -> Self {
        DslParser::default()
    }

    /// Parses a request body. The buffer must hold a JSON object with a
    /// `query` key containing a single clause.
    pub fn parse(&self, body: &[u8]) -> Result<Query> {
        let root: Value = serde_json::from_slice(body)
            .map_err(|e| Error::parse(format!("invalid JSON: {}", e)))?;
        self.parse_request(&root)
    }

    pub fn parse_request(&self, root: &Value) -> Result<Query> {
        let object = root
            .as_object()
            .ok_or_else(|| Error::parse("request must be a JSON object"))?;
        let clause = object
            .get("query")
            .ok_or_else(|| Error::parse("request is missing the 'query' key"))?;

        let mut seen = HashSet::new();
        self.parse_clause(clause, 0, &mut seen)
    }

    /// Parses a single clause object. `bool_depth` counts enclosing bool
    /// clauses; `seen` is the duplicate-field tracker of the clause list
    /// this clause belongs to.
    fn parse_clause(
        &self,
        value: &Value,
        bool_depth: usize,
        seen: &mut HashSet<(&'static str, String)>,
    ) -> Result<Query> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::parse("a query clause must be a JSON object"))?;
        if object.len() != 1 {
            return Err(Error::parse(format!(
                "a query clause must hold exactly one clause tag, found {}",
                object.len()
            )));
        }

        let (tag, body) = object.iter().next().expect("length checked above");
        let query = match tag.as_str() {
            "match" => {
                let (field, text) = parse_text_body(body, "match", "query")?;
                Query::Match(MatchQuery { field, text })
            }
            "match_phrase" => {
                let (field, phrase) = parse_text_body(body, "match_phrase", "query")?;
                Query::MatchPhrase(MatchPhraseQuery { field, phrase })
            }
            "term" => {
                let (field, value) = parse_scalar_body(body, "term")?;
                Query::Term(TermQuery { field, value })
            }
            "prefix" => {
                let (field, value) = parse_prefix_body(body)?;
                Query::Prefix(PrefixQuery { field, value })
            }
            "range" => Query::Range(parse_range_body(body)?),
            "match_all" => {
                let body = body
                    .as_object()
                    .ok_or_else(|| Error::parse("match_all body must be an object"))?;
                if !body.is_empty() {
                    return Err(Error::parse("match_all takes no parameters"));
                }
                Query::MatchAll
            }
            "bool" => self.parse_bool_body(body, bool_depth)?,
            other => {
                return Err(Error::parse(format!("unknown query clause '{}'", other)));
            }
        };

        if let Some((kind, field)) = clause_identity(&query) {
            if !seen.insert((kind, field.to_string())) {
                return Err(Error::validation(format!(
                    "duplicate {} clause for field '{}' in the same clause list",
                    kind, field
                )));
            }
        }

        Ok(query)
    }

    fn parse_bool_body(&self, body: &Value, bool_depth: usize) -> Result<Query> {
        let depth = bool_depth + 1;
        if depth > self.max_bool_depth {
            return Err(Error::validation(format!(
                "bool queries may nest at most {} deep",
                self.max_bool_depth
            )));
        }

        let object = body
            .as_object()
            .ok_or_else(|| Error::parse("bool body must be an object"))?;

        let mut query = BoolQuery::new();
        for (key, value) in object {
            let clauses = value.as_array().ok_or_else(|| {
                Error::parse(format!("bool clause '{}' must be an array", key))
            })?;

            // Each clause list gets its own duplicate-field tracker.
            let mut seen = HashSet::new();
            let mut parsed = Vec::with_capacity(clauses.len());
            for clause in clauses {
                parsed.push(self.parse_clause(clause, depth, &mut seen)?);
            }

            match key.as_str() {
                "must" => query.must = parsed,
                "should" => query.should = parsed,
                "must_not" => query.must_not = parsed,
                "filter" => query.filter = parsed,
                other => {
                    return Err(Error::parse(format!("unknown bool clause '{}'", other)));
                }
            }
        }

        Ok(Query::Bool(query))
    }
}

/// The single `(field, value)` entry of a leaf clause body.
fn single_field_entry<'a>(body: &'a Value, clause: &str) -> Result<(&'a String, &'a Value)> {
    let object = body
        .as_object()
        .ok_or_else(|| Error::parse(format!("{} body must be an object", clause)))?;
    if object.len() != 1 {
        return Err(Error::parse(format!(
            "{} requires exactly one field, found {}",
            clause,
            object.len()
        )));
    }
    let (field, value) = object.iter().next().expect("length checked above");
    if field.is_empty() {
        return Err(Error::parse(format!("{} field name must not be empty", clause)));
    }
    Ok((field, value))
}

/// Body of `match`/`match_phrase`: `{field: <string>}` or
/// `{field: {"query": <string>}}`.
fn parse_text_body(body: &Value, clause: &str, wrapper_key: &str) -> Result<(String, String)> {
    let (field, value) = single_field_entry(body, clause)?;
    let text = unwrap_value(value, wrapper_key)?
        .as_str()
        .ok_or_else(|| Error::parse(format!("{} value for '{}' must be a string", clause, field)))?;
    Ok((field.clone(), text.to_string()))
}

/// Body of `term`: `{field: <scalar>}` or `{field: {"value": <scalar>}}`.
/// Scalars are strings, numbers and booleans; the literal is kept in its
/// textual form for analysis at execution time.
fn parse_scalar_body(body: &Value, clause: &str) -> Result<(String, String)> {
    let (field, value) = single_field_entry(body, clause)?;
    let scalar = unwrap_value(value, "value")?;
    let literal = match scalar {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => {
            return Err(Error::parse(format!(
                "{} value for '{}' must be a scalar",
                clause, field
            )));
        }
    };
    Ok((field.clone(), literal))
}

/// Body of `prefix`: like `term`, but only non-empty strings are accepted.
fn parse_prefix_body(body: &Value) -> Result<(String, String)> {
    let (field, value) = single_field_entry(body, "prefix")?;
    let scalar = unwrap_value(value, "value")?;
    let literal = scalar.as_str().ok_or_else(|| {
        Error::parse(format!("prefix value for '{}' must be a string", field))
    })?;
    if literal.is_empty() {
        return Err(Error::validation(format!(
            "prefix value for '{}' must not be empty",
            field
        )));
    }
    Ok((field.clone(), literal.to_string()))
}

/// Body of `range`: `{field: {(gt|gte|lt|lte): <number|RFC3339>, ...}}`,
/// at least one bound, no mixing of numeric and time bounds.
fn parse_range_body(body: &Value) -> Result<RangeQuery> {
    let (field, value) = single_field_entry(body, "range")?;
    let bounds = value
        .as_object()
        .ok_or_else(|| Error::parse(format!("range bounds for '{}' must be an object", field)))?;

    let mut range = RangeQuery::new(field.clone());
    let mut kind: Option<RangeValue> = None;

    for (key, raw) in bounds {
        let bound = parse_range_value(raw, field)?;
        if let Some(first) = &kind {
            if !first.same_kind(&bound) {
                return Err(Error::validation(format!(
                    "range bounds for '{}' mix numeric and time values",
                    field
                )));
            }
        } else {
            kind = Some(bound);
        }

        match key.as_str() {
            "gt" => range.set_gt(bound),
            "gte" => range.set_gte(bound),
            "lt" => range.set_lt(bound),
            "lte" => range.set_lte(bound),
            other => {
                return Err(Error::parse(format!("unknown range bound '{}'", other)));
            }
        }
    }

    if !range.has_bounds() {
        return Err(Error::validation(format!(
            "range for '{}' requires at least one bound",
            field
        )));
    }
    Ok(range)
}

fn parse_range_value(value: &Value, field: &str) -> Result<RangeValue> {
    match value {
        Value::Number(n) => {
            let number = n.as_f64().ok_or_else(|| {
                Error::parse(format!("range bound for '{}' is not a representable number", field))
            })?;
            Ok(RangeValue::Number(number))
        }
        Value::String(s) => {
            let date = DateTime::parse_from_rfc3339(s).map_err(|_| {
                Error::parse(format!(
                    "range bound for '{}' must be a number or an RFC3339 time string",
                    field
                ))
            })?;
            Ok(RangeValue::Date(date.with_timezone(&Utc)))
        }
        _ => Err(Error::parse(format!(
            "range bound for '{}' must be a number or an RFC3339 time string",
            field
        ))),
    }
}

/// Accepts either a bare value or the object wrapper form
/// `{wrapper_key: value}`.
fn unwrap_value<'a>(value: &'a Value, wrapper_key: &str) -> Result<&'a Value> {
    match value {
        Value::Object(map) => unwrap_single_key(map, wrapper_key),
        other => Ok(other),
    }
}

fn unwrap_single_key<'a>(map: &'a Map<String, Value>, wrapper_key: &str) -> Result<&'a Value> {
    if map.len() != 1 {
        return Err(Error::parse(format!(
            "expected a single '{}' key, found {} keys",
            wrapper_key,
            map.len()
        )));
    }
    map.get(wrapper_key).ok_or_else(|| {
        let found = map.keys().next().map(String::as_str).unwrap_or("");
        Error::parse(format!("expected '{}' key, found '{}'", wrapper_key, found))
    })
}

fn clause_identity(query: &Query) -> Option<(&'static str, &str)> {
    match query {
        Query::Term(q) => Some(("term", &q.field)),
        Query::Match(q) => Some(("match", &q.field)),
        Query::MatchPhrase(q) => Some(("match_phrase", &q.field)),
        Query::Prefix(q) => Some(("prefix", &q.field)),
        Query::Range(q) => Some(("range", &q.field)),
        Query::MatchAll | Query::Bool(_) => None,
    }
}
