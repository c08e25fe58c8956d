use std::cmp::Ordering;
use serde::{Deserialize, Serialize};
use super::{Row, Value};

/// Predicate over named columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Gte(String, Value),
    Lte(String, Value),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }

    pub fn gte(column: &str, value: impl Into<Value>) -> Self {
        Filter::Gte(column.to_string(), value.into())
    }

    pub fn lte(column: &str, value: impl Into<Value>) -> Self {
        Filter::Lte(column.to_string(), value.into())
    }

    /// Inclusive range on one column.
    pub fn range(column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Filter::And(vec![Filter::gte(column, low), Filter::lte(column, high)])
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut clauses) => {
                clauses.push(other);
                Filter::And(clauses)
            }
            clause => Filter::And(vec![clause, other]),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut clauses) => {
                clauses.push(other);
                Filter::Or(clauses)
            }
            clause => Filter::Or(vec![clause, other]),
        }
    }

    pub fn matches<R: Row + ?Sized>(&self, row: &R) -> bool {
        match self {
            Filter::Eq(column, value) => row.column(column) == *value,
            Filter::Gte(column, value) => matches!(
                row.column(column).compare(value),
                Some(Ordering::Greater) | Some(Ordering::Equal)
            ),
            Filter::Lte(column, value) => matches!(
                row.column(column).compare(value),
                Some(Ordering::Less) | Some(Ordering::Equal)
            ),
            Filter::And(clauses) => clauses.iter().all(|clause| clause.matches(row)),
            Filter::Or(clauses) => clauses.iter().any(|clause| clause.matches(row)),
        }
    }

    /// Top-level PostgREST parameters for this filter.
    ///
    /// A top-level `And` is flattened into one parameter per clause since
    /// PostgREST ANDs query parameters together.
    pub fn to_postgrest_params(&self) -> Vec<(String, String)> {
        match self {
            Filter::Eq(column, value) => vec![(column.clone(), format!("eq.{}", value))],
            Filter::Gte(column, value) => vec![(column.clone(), format!("gte.{}", value))],
            Filter::Lte(column, value) => vec![(column.clone(), format!("lte.{}", value))],
            Filter::And(clauses) => clauses.iter().flat_map(|c| c.to_postgrest_params()).collect(),
            Filter::Or(clauses) => vec![("or".to_string(), format!("({})", join_nested(clauses)))],
        }
    }

    /// Nested form used inside `or=(...)` / `and(...)` groups.
    fn to_postgrest_nested(&self) -> String {
        match self {
            Filter::Eq(column, value) => format!("{}.eq.{}", column, quote(value)),
            Filter::Gte(column, value) => format!("{}.gte.{}", column, quote(value)),
            Filter::Lte(column, value) => format!("{}.lte.{}", column, quote(value)),
            Filter::And(clauses) => format!("and({})", join_nested(clauses)),
            Filter::Or(clauses) => format!("or({})", join_nested(clauses)),
        }
    }
}

fn join_nested(clauses: &[Filter]) -> String {
    clauses
        .iter()
        .map(Filter::to_postgrest_nested)
        .collect::<Vec<_>>()
        .join(",")
}

// Reserved characters inside logical groups must be double quoted.
fn quote(value: &Value) -> String {
    let raw = value.to_string();
    if raw.chars().any(|c| matches!(c, ',' | '.' | ':' | '(' | ')' | '"' | ' ')) {
        format!("\"{}\"", raw.replace('"', "\\\""))
    } else {
        raw
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub filter: Option<Filter>,
    pub order: Vec<Order>,
}

impl Query {
    pub fn from(table: &str) -> Self {
        Query {
            table: table.to_string(),
            filter: None,
            order: Vec::new(),
        }
    }

    /// Adds a clause; repeated calls are ANDed together.
    pub fn filter(mut self, clause: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(clause),
            None => clause,
        });
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn matches<R: Row + ?Sized>(&self, row: &R) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter.matches(row))
    }

    /// Stable sort by the query's order columns, using `Value::sort_cmp`
    /// so nulls land where the backend puts them.
    pub fn sort<R: Row>(&self, rows: &mut [R]) {
        if self.order.is_empty() {
            return;
        }
        rows.sort_by(|a, b| {
            for order in &self.order {
                let ordering = a.column(&order.column).sort_cmp(&b.column(&order.column));
                let ordering = if order.ascending { ordering } else { ordering.reverse() };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    /// Full PostgREST parameter list: `select`, filters and `order`.
    pub fn to_postgrest_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        if let Some(filter) = &self.filter {
            params.extend(filter.to_postgrest_params());
        }
        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }
        params
    }
}
