use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// Sort direction for [`OrderBy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

/// A query over one table: a conjunction of equality constraints keyed by
/// field name, plus evaluation options.
///
/// An empty filter matches every row. Without an order, rows are visited in
/// ascending row index order and the scan stops once `limit` rows matched.
/// A `limit` of zero means no limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub filter: IndexMap<String, Json>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub order: Option<OrderBy>,
}

impl Query {
    /// A query matching every row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a query from a JSON object of `field: value` constraints.
    pub fn from_filter(filter: Map<String, Json>) -> Self {
        Self {
            filter: filter.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Require `field` to loosely equal `value`.
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Json>) -> Self {
        self.filter.insert(field.into(), value.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// The effective row cap.
    pub fn max_results(&self) -> usize {
        match self.limit {
            Some(n) if n > 0 => n,
            _ => usize::MAX,
        }
    }
}

/// Target of [`Table::find_one`](super::table::Table::find_one): a row index
/// looked up directly, or a query whose first match is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Index(i64),
    Query(Query),
}

impl From<i64> for Lookup {
    fn from(index: i64) -> Self {
        Lookup::Index(index)
    }
}

impl From<i32> for Lookup {
    fn from(index: i32) -> Self {
        Lookup::Index(i64::from(index))
    }
}

impl From<u32> for Lookup {
    fn from(index: u32) -> Self {
        Lookup::Index(i64::from(index))
    }
}

impl From<u64> for Lookup {
    fn from(index: u64) -> Self {
        Lookup::Index(i64::try_from(index).unwrap_or(i64::MAX))
    }
}

impl From<Query> for Lookup {
    fn from(query: Query) -> Self {
        Lookup::Query(query)
    }
}

impl From<&Query> for Lookup {
    fn from(query: &Query) -> Self {
        Lookup::Query(query.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let q = Query::new()
            .where_eq("name", "Matheus")
            .limit(3)
            .order_by("index", Direction::Desc);
        assert_eq!(q.filter["name"], json!("Matheus"));
        assert_eq!(q.max_results(), 3);
        assert_eq!(q.order.unwrap().direction, Direction::Desc);
    }

    #[test]
    fn test_zero_limit_is_unbounded() {
        assert_eq!(Query::new().limit(0).max_results(), usize::MAX);
        assert_eq!(Query::new().max_results(), usize::MAX);
    }

    #[test]
    fn test_from_json() {
        let q: Query = serde_json::from_value(json!({
            "filter": {"name": "Arzio"},
            "limit": 1,
            "order": {"field": "index"}
        }))
        .unwrap();
        assert_eq!(q.filter.len(), 1);
        assert_eq!(q.limit, Some(1));
        assert_eq!(q.order.unwrap().direction, Direction::Asc);

        let map = json!({"a": 1}).as_object().unwrap().clone();
        assert_eq!(Query::from_filter(map).filter["a"], json!(1));
    }

    #[test]
    fn test_lookup_conversions() {
        assert_eq!(Lookup::from(2), Lookup::Index(2));
        assert_eq!(Lookup::from(7u64), Lookup::Index(7));
        assert!(matches!(Lookup::from(Query::new()), Lookup::Query(_)));
    }
}
