//! Metadata predicates for filtering chunks at the index.
//!
//! A predicate is a conjunction of per-field clauses. A clause matches one
//! value (equality) or any of several values (set membership). Clauses are
//! collected by [`PredicateBuilder`] and only wrapped in an AND node when there
//! are two or more of them.

use std::fmt;

/// Metadata field a clause constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Bucket,
    Location,
    District,
    SalaryLabel,
}

impl Field {
    /// Column name in the chunk table.
    pub fn column(self) -> &'static str {
        match self {
            Field::Bucket => "bucket",
            Field::Location => "location",
            Field::District => "district",
            Field::SalaryLabel => "salary_bucket_2m_label",
        }
    }
}

/// How a clause matches its field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match {
    Eq(String),
    In(Vec<String>),
}

/// A single field constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: Field,
    pub matcher: Match,
}

impl Condition {
    pub fn eq(field: Field, value: impl Into<String>) -> Self {
        Self { field, matcher: Match::Eq(value.into()) }
    }

    /// Equality for one value, set membership for several, nothing for none.
    pub fn one_of(field: Field, values: Vec<String>) -> Option<Self> {
        match values.len() {
            0 => None,
            1 => values.into_iter().next().map(|v| Self::eq(field, v)),
            _ => Some(Self { field, matcher: Match::In(values) }),
        }
    }

    /// Whether a metadata value satisfies this clause.
    pub fn matches(&self, value: Option<&str>) -> bool {
        let Some(value) = value else { return false };
        match &self.matcher {
            Match::Eq(v) => v == value,
            Match::In(vs) => vs.iter().any(|v| v == value),
        }
    }

    fn to_sql(&self) -> String {
        let column = self.field.column();
        match &self.matcher {
            Match::Eq(v) => format!("{} = {}", column, quote(v)),
            Match::In(vs) => {
                let list: Vec<String> = vs.iter().map(|v| quote(v)).collect();
                format!("{} IN ({})", column, list.join(", "))
            }
        }
    }
}

/// A conjunctive filter over chunk metadata. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Predicate {
    /// Matches everything.
    #[default]
    Empty,
    Single(Condition),
    And(Vec<Condition>),
}

impl Predicate {
    pub fn is_empty(&self) -> bool {
        matches!(self, Predicate::Empty)
    }

    pub fn conditions(&self) -> &[Condition] {
        match self {
            Predicate::Empty => &[],
            Predicate::Single(c) => std::slice::from_ref(c),
            Predicate::And(cs) => cs,
        }
    }

    /// SQL `WHERE` body for the vector index, or `None` when unconstrained.
    pub fn to_sql(&self) -> Option<String> {
        match self {
            Predicate::Empty => None,
            Predicate::Single(c) => Some(c.to_sql()),
            Predicate::And(cs) => Some(
                cs.iter()
                    .map(|c| format!("({})", c.to_sql()))
                    .collect::<Vec<_>>()
                    .join(" AND "),
            ),
        }
    }

    /// Evaluate against a metadata lookup. Used by in-memory indexes.
    pub fn matches<'a, F>(&self, lookup: F) -> bool
    where
        F: Fn(Field) -> Option<&'a str>,
    {
        self.conditions().iter().all(|c| c.matches(lookup(c.field)))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_sql() {
            Some(sql) => f.write_str(&sql),
            None => f.write_str("(unconstrained)"),
        }
    }
}

/// Accumulates clauses in insertion order.
#[derive(Debug, Default)]
pub struct PredicateBuilder {
    conditions: Vec<Condition>,
}

impl PredicateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, condition: Condition) -> &mut Self {
        self.conditions.push(condition);
        self
    }

    pub fn push_opt(&mut self, condition: Option<Condition>) -> &mut Self {
        if let Some(c) = condition {
            self.conditions.push(c);
        }
        self
    }

    pub fn build(self) -> Predicate {
        let mut conditions = self.conditions;
        match conditions.len() {
            0 => Predicate::Empty,
            1 => Predicate::Single(conditions.remove(0)),
            _ => Predicate::And(conditions),
        }
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
