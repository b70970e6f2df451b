use std::collections::BTreeSet;
use std::fmt;

use column::Value;

/// Comparison applied between a column value (left) and a filter literal
/// (right).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
}

impl Condition {
    pub const COUNT: usize = 4;

    pub const ALL: [Condition; Self::COUNT] = [
        Condition::Equals,
        Condition::NotEquals,
        Condition::LessThan,
        Condition::GreaterThan,
    ];

    pub fn ordinal(self) -> usize {
        match self {
            Condition::Equals => 0,
            Condition::NotEquals => 1,
            Condition::LessThan => 2,
            Condition::GreaterThan => 3,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Condition::Equals => "==",
            Condition::NotEquals => "!=",
            Condition::LessThan => "<",
            Condition::GreaterThan => ">",
        };
        f.write_str(s)
    }
}

/// One row-level predicate. The literal is coerced to the column's type
/// when the query runs, never when the filter is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub attribute: String,
    pub condition: Condition,
    pub value: Value,
}

impl Filter {
    pub fn new(attribute: impl Into<String>, condition: Condition, value: impl Into<Value>) -> Self {
        Self {
            attribute: attribute.into(),
            condition,
            value: value.into(),
        }
    }

    pub fn equals(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(attribute, Condition::Equals, value)
    }

    pub fn not_equals(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(attribute, Condition::NotEquals, value)
    }

    pub fn less_than(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(attribute, Condition::LessThan, value)
    }

    pub fn greater_than(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(attribute, Condition::GreaterThan, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorKind {
    Count,
    Sum,
}

/// Requested aggregation. Carried by the query and its attribute is read
/// during the scan, but reduction itself is left to a
/// [`Reducer`](crate::Reducer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub kind: AggregatorKind,
    pub attribute: String,
}

/// An immutable scan request: filters are evaluated in declaration order
/// and a row must pass all of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub aggregation: Option<Aggregation>,
    pub group_by: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn aggregate(mut self, kind: AggregatorKind, attribute: impl Into<String>) -> Self {
        self.aggregation = Some(Aggregation {
            kind,
            attribute: attribute.into(),
        });
        self
    }

    pub fn group_by(mut self, attribute: impl Into<String>) -> Self {
        self.group_by = Some(attribute.into());
        self
    }

    /// Every attribute the scan has to read, deduplicated and sorted.
    pub fn referenced_attributes(&self) -> BTreeSet<&str> {
        let mut attrs: BTreeSet<&str> = self.filters.iter().map(|f| f.attribute.as_str()).collect();
        if let Some(agg) = &self.aggregation {
            attrs.insert(agg.attribute.as_str());
        }
        if let Some(group) = &self.group_by {
            attrs.insert(group.as_str());
        }
        attrs
    }

    /// Attributes that are read for the emitted rows but not filtered on.
    pub fn passthrough_attributes(&self) -> BTreeSet<&str> {
        let mut attrs = self.referenced_attributes();
        for f in &self.filters {
            attrs.remove(f.attribute.as_str());
        }
        attrs
    }
}
