use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Internal query tree. A closed sum type: the parser constructs concrete
/// variants, the executor pattern-matches. No transport coupling; the DSL
/// shape is produced on demand by [`Query::to_dsl`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Term(TermQuery),
    Match(MatchQuery),
    MatchPhrase(MatchPhraseQuery),
    MatchAll,
    Prefix(PrefixQuery),
    Range(RangeQuery),
    Bool(BoolQuery),
}

/// Exact term lookup against a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermQuery {
    pub field: String,
    pub value: String,
}

/// Analyzed full-text match: OR semantics across the tokens of `text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchQuery {
    pub field: String,
    pub text: String,
}

/// Like match, but the tokens must occur in adjacent positions in the
/// clause's field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPhraseQuery {
    pub field: String,
    pub phrase: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixQuery {
    pub field: String,
    pub value: String,
}

/// A range bound: numeric or time. The parser rejects mixing the two
/// kinds within one field, so comparisons only ever see like kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RangeValue {
    Number(f64),
    Date(DateTime<Utc>),
}

impl RangeValue {
    /// Ordering between like kinds; `None` when kinds differ.
    pub fn compare(&self, other: &RangeValue) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (RangeValue::Number(a), RangeValue::Number(b)) => a.partial_cmp(b),
            (RangeValue::Date(a), RangeValue::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn same_kind(&self, other: &RangeValue) -> bool {
        matches!(
            (self, other),
            (RangeValue::Number(_), RangeValue::Number(_))
                | (RangeValue::Date(_), RangeValue::Date(_))
        )
    }

    fn to_dsl(self) -> Value {
        match self {
            RangeValue::Number(n) => json!(n),
            RangeValue::Date(d) => json!(d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

/// Range over a numeric or time field. `gt`/`gte` are mutually exclusive,
/// as are `lt`/`lte`: the setter that runs last chooses the active bound.
/// An absent bound is unbounded on that side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeQuery {
    pub field: String,
    pub gt: Option<RangeValue>,
    pub gte: Option<RangeValue>,
    pub lt: Option<RangeValue>,
    pub lte: Option<RangeValue>,
}

impl RangeQuery {
    pub fn new(field: impl Into<String>) -> Self {
        RangeQuery {
            field: field.into(),
            ..Default::default()
        }
    }

    pub fn set_gt(&mut self, value: RangeValue) {
        self.gt = Some(value);
        self.gte = None;
    }

    pub fn set_gte(&mut self, value: RangeValue) {
        self.gte = Some(value);
        self.gt = None;
    }

    pub fn set_lt(&mut self, value: RangeValue) {
        self.lt = Some(value);
        self.lte = None;
    }

    pub fn set_lte(&mut self, value: RangeValue) {
        self.lte = Some(value);
        self.lt = None;
    }

    pub fn has_bounds(&self) -> bool {
        self.gt.is_some() || self.gte.is_some() || self.lt.is_some() || self.lte.is_some()
    }

    /// The lower bound together with its strictness, if any.
    pub fn lower(&self) -> Option<(RangeValue, bool)> {
        self.gt
            .map(|v| (v, true))
            .or_else(|| self.gte.map(|v| (v, false)))
    }

    /// The upper bound together with its strictness, if any.
    pub fn upper(&self) -> Option<(RangeValue, bool)> {
        self.lt
            .map(|v| (v, true))
            .or_else(|| self.lte.map(|v| (v, false)))
    }
}

/// Composite query with must/should/must_not/filter children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub should: Vec<Query>,
    pub must_not: Vec<Query>,
    pub filter: Vec<Query>,
}

impl BoolQuery {
    pub fn new() -> Self {
        BoolQuery::default()
    }

    pub fn with_must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn with_should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    pub fn with_must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }

    pub fn with_filter(mut self, query: Query) -> Self {
        self.filter.push(query);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
            && self.should.is_empty()
            && self.must_not.is_empty()
            && self.filter.is_empty()
    }
}

impl Query {
    /// Serializes the tree back into the DSL's clause shape, such that
    /// re-parsing the output yields a structurally identical tree.
    pub fn to_dsl(&self) -> Value {
        match self {
            Query::Term(q) => leaf_clause("term", &q.field, json!(q.value)),
            Query::Match(q) => leaf_clause("match", &q.field, json!(q.text)),
            Query::MatchPhrase(q) => leaf_clause("match_phrase", &q.field, json!(q.phrase)),
            Query::MatchAll => json!({ "match_all": {} }),
            Query::Prefix(q) => leaf_clause("prefix", &q.field, json!(q.value)),
            Query::Range(q) => {
                let mut bounds = Map::new();
                if let Some(v) = q.gt {
                    bounds.insert("gt".to_string(), v.to_dsl());
                }
                if let Some(v) = q.gte {
                    bounds.insert("gte".to_string(), v.to_dsl());
                }
                if let Some(v) = q.lt {
                    bounds.insert("lt".to_string(), v.to_dsl());
                }
                if let Some(v) = q.lte {
                    bounds.insert("lte".to_string(), v.to_dsl());
                }
                leaf_clause("range", &q.field, Value::Object(bounds))
            }
            Query::Bool(q) => {
                let mut body = Map::new();
                for (key, clauses) in [
                    ("must", &q.must),
                    ("should", &q.should),
                    ("must_not", &q.must_not),
                    ("filter", &q.filter),
                ] {
                    if !clauses.is_empty() {
                        let lowered: Vec<Value> = clauses.iter().map(Query::to_dsl).collect();
                        body.insert(key.to_string(), Value::Array(lowered));
                    }
                }
                json!({ "bool": body })
            }
        }
    }
}

/// `{tag: {field: value}}`, the DSL's leaf-clause shape. Field names are
/// dynamic, so the object is built by hand rather than with `json!`.
fn leaf_clause(tag: &str, field: &str, value: Value) -> Value {
    let mut body = Map::new();
    body.insert(field.to_string(), value);
    let mut clause = Map::new();
    clause.insert(tag.to_string(), Value::Object(body));
    Value::Object(clause)
}
