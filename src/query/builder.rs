//! Structured query construction.
//!
//! A [`StructuredQuery`] describes a single-table `SELECT` with equality
//! filters. The builder emits SQL in which only quoted identifiers appear
//! literally; every filter value is bound to a named `@p_<n>` parameter.

use crate::config::BuilderConfig;
use crate::constants::{DEFAULT_ROW_LIMIT, LOG_QUERY_TRUNCATE_LENGTH, PARAMETER_PREFIX};
use crate::error::QueryError;
use crate::query::types::{QueryParameter, TypedValue};
use crate::security::{
    quote_identifier, quote_table_reference, safe_identifier, safe_table_reference,
    truncate_for_log,
};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Equality filters in bind order.
///
/// Re-inserting an existing field replaces its value but keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters(Vec<(String, TypedValue)>);

impl Filters {
    /// Create an empty filter set.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add or replace a filter.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<TypedValue>) {
        let field = field.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == field) {
            Some(entry) => entry.1 = value,
            None => self.0.push((field, value)),
        }
    }

    /// Iterate filters in bind order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.0.iter().map(|(field, value)| (field.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<TypedValue>> FromIterator<(K, V)> for Filters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filters = Filters::new();
        for (field, value) in iter {
            filters.insert(field, value);
        }
        filters
    }
}

impl Serialize for Filters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, value) in &self.0 {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Filters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FiltersVisitor;

        impl<'de> Visitor<'de> for FiltersVisitor {
            type Value = Filters;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to integer, boolean, string or null values")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Filters, E> {
                Ok(Filters::new())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Filters, A::Error> {
                let mut filters = Filters::new();
                while let Some((field, value)) = access.next_entry::<String, TypedValue>()? {
                    filters.insert(field, value);
                }
                Ok(filters)
            }
        }

        deserializer.deserialize_any(FiltersVisitor)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A structured request for a single-table `SELECT`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    /// `dataset.table` or `project.dataset.table`.
    pub table: String,

    /// Columns to select; empty selects `*`.
    #[serde(default, alias = "select", deserialize_with = "null_as_default")]
    pub select_columns: Vec<String>,

    #[serde(default)]
    pub filters: Filters,

    /// Sort columns; a leading `-` sorts descending.
    #[serde(default, deserialize_with = "null_as_default")]
    pub order_by: Vec<String>,

    /// Row limit; absent or non-positive falls back to the builder default.
    #[serde(default)]
    pub limit: Option<i64>,
}

impl StructuredQuery {
    /// Start a query against `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        self.filters.insert(field, value);
        self
    }

    pub fn order_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Parameterized SQL ready for the execution collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltQuery {
    pub sql_text: String,
    /// Serialized in bind order (`p_2` before `p_10`).
    #[serde(serialize_with = "serialize_in_bind_order")]
    pub parameters: BTreeMap<String, TypedValue>,
}

/// Position of a generated parameter name; foreign names sort last.
fn bind_index(name: &str) -> usize {
    name.strip_prefix(PARAMETER_PREFIX)
        .and_then(|index| index.parse().ok())
        .unwrap_or(usize::MAX)
}

fn in_bind_order(parameters: &BTreeMap<String, TypedValue>) -> Vec<(&str, &TypedValue)> {
    let mut entries: Vec<(&str, &TypedValue)> = parameters
        .iter()
        .map(|(name, value)| (name.as_str(), value))
        .collect();
    entries.sort_by_key(|&(name, _)| (bind_index(name), name));
    entries
}

fn serialize_in_bind_order<S: Serializer>(
    parameters: &BTreeMap<String, TypedValue>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(in_bind_order(parameters))
}

impl BuiltQuery {
    /// Wrap already-validated raw SQL that carries no parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql_text: sql.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Render parameters for submission to the engine, in bind order.
    pub fn query_parameters(&self) -> Vec<QueryParameter> {
        in_bind_order(&self.parameters)
            .into_iter()
            .map(|(name, value)| QueryParameter::new(name, value))
            .collect()
    }
}

/// Builds parameterized SQL from [`StructuredQuery`] descriptors.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    default_limit: u64,
    strict_identifiers: bool,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ROW_LIMIT, false)
    }
}

impl QueryBuilder {
    /// Create a builder.
    ///
    /// With `strict_identifiers`, identifiers containing whitespace, quotes or
    /// SQL metacharacters are rejected instead of only losing their backticks.
    pub fn new(default_limit: u64, strict_identifiers: bool) -> Self {
        Self {
            default_limit,
            strict_identifiers,
        }
    }

    /// Create a builder from configuration.
    pub fn from_config(config: &BuilderConfig) -> Self {
        Self::new(config.default_limit, config.strict_identifiers)
    }

    /// Build SQL and parameters for `query`.
    pub fn build(&self, query: &StructuredQuery) -> Result<BuiltQuery, QueryError> {
        let table = self.quote_table(&query.table)?;
        let select = self.select_clause(&query.select_columns)?;
        let (filter, parameters) = self.filter_clause(&query.filters)?;
        let order = self.order_clause(&query.order_by)?;
        let limit = self.resolve_limit(query.limit);

        let mut sql = format!("SELECT {} FROM {}", select, table);
        if !filter.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&filter);
        }
        if !order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }
        sql.push_str(&format!(" LIMIT {}", limit));

        debug!(
            "Built structured query with {} parameter(s): {}",
            parameters.len(),
            truncate_for_log(&sql, LOG_QUERY_TRUNCATE_LENGTH)
        );

        Ok(BuiltQuery {
            sql_text: sql,
            parameters,
        })
    }

    fn quote_table(&self, reference: &str) -> Result<String, QueryError> {
        if self.strict_identifiers {
            safe_table_reference(reference)
        } else {
            quote_table_reference(reference)
        }
    }

    fn quote_column(&self, name: &str) -> Result<String, QueryError> {
        if self.strict_identifiers {
            safe_identifier(name)
        } else {
            quote_identifier(name)
        }
    }

    fn select_clause(&self, columns: &[String]) -> Result<String, QueryError> {
        if columns.is_empty() {
            return Ok("*".to_string());
        }
        let quoted = columns
            .iter()
            .map(|column| self.quote_column(column))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(quoted.join(", "))
    }

    fn filter_clause(
        &self,
        filters: &Filters,
    ) -> Result<(String, BTreeMap<String, TypedValue>), QueryError> {
        let mut conditions = Vec::with_capacity(filters.len());
        let mut parameters = BTreeMap::new();

        for (index, (field, value)) in filters.iter().enumerate() {
            let name = format!("{}{}", PARAMETER_PREFIX, index);
            conditions.push(format!("{} = @{}", self.quote_column(field)?, name));
            parameters.insert(name, value.clone());
        }

        Ok((conditions.join(" AND "), parameters))
    }

    fn order_clause(&self, order_by: &[String]) -> Result<String, QueryError> {
        let mut terms = Vec::with_capacity(order_by.len());

        for entry in order_by {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (column, direction) = match entry.strip_prefix('-') {
                Some(column) => (column, "DESC"),
                None => (entry, "ASC"),
            };
            terms.push(format!("{} {}", self.quote_column(column)?, direction));
        }

        Ok(terms.join(", "))
    }

    fn resolve_limit(&self, limit: Option<i64>) -> u64 {
        match limit {
            Some(n) if n > 0 => n.unsigned_abs(),
            _ => self.default_limit,
        }
    }
}

/// Build with the default builder settings.
pub fn build(query: &StructuredQuery) -> Result<BuiltQuery, QueryError> {
    QueryBuilder::default().build(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_all() {
        let built = build(&StructuredQuery::new("ds.tbl")).unwrap();
        assert_eq!(built.sql_text, "SELECT * FROM `ds`.`tbl` LIMIT 100");
        assert!(built.parameters.is_empty());
    }

    #[test]
    fn test_select_columns_in_order() {
        let query = StructuredQuery::new("proj.ds.tbl").select(["order_id", "total"]);
        let built = build(&query).unwrap();
        assert_eq!(
            built.sql_text,
            "SELECT `order_id`, `total` FROM `proj`.`ds`.`tbl` LIMIT 100"
        );
    }

    #[test]
    fn test_filters_are_parameterized() {
        let query = StructuredQuery::new("ds.tbl").filter("a", 1_i64).filter("b", "x");
        let built = build(&query).unwrap();

        assert!(built
            .sql_text
            .contains("WHERE `a` = @p_0 AND `b` = @p_1"));
        assert_eq!(built.parameters.len(), 2);
        assert_eq!(built.parameters["p_0"], TypedValue::Int64(1));
        assert_eq!(built.parameters["p_1"], TypedValue::Str("x".to_string()));
    }

    #[test]
    fn test_filter_values_never_inlined() {
        let payload = "x' OR '1'='1";
        let query = StructuredQuery::new("ds.tbl").filter("name", payload);
        let built = build(&query).unwrap();
        assert!(!built.sql_text.contains(payload));
        assert_eq!(built.parameters["p_0"], TypedValue::Str(payload.to_string()));
    }

    #[test]
    fn test_order_by() {
        let query = StructuredQuery::new("ds.tbl").order_by(["-created_at", "total"]);
        let built = build(&query).unwrap();
        assert!(built
            .sql_text
            .contains("ORDER BY `created_at` DESC, `total` ASC"));
    }

    #[test]
    fn test_order_by_skips_blank_entries() {
        let query = StructuredQuery::new("ds.tbl").order_by(["", "  ", "total"]);
        let built = build(&query).unwrap();
        assert_eq!(
            built.sql_text,
            "SELECT * FROM `ds`.`tbl` ORDER BY `total` ASC LIMIT 100"
        );

        let query = StructuredQuery::new("ds.tbl").order_by(["   "]);
        assert!(!build(&query).unwrap().sql_text.contains("ORDER BY"));
    }

    #[test]
    fn test_order_by_bare_sign_rejected() {
        let query = StructuredQuery::new("ds.tbl").order_by(["-"]);
        assert!(matches!(build(&query), Err(QueryError::InvalidArgument(_))));
    }

    #[test]
    fn test_full_clause_order() {
        let query = StructuredQuery::new("ds.orders")
            .select(["id"])
            .filter("status", "PAID")
            .order_by(["-id"])
            .limit(5);
        let built = build(&query).unwrap();
        assert_eq!(
            built.sql_text,
            "SELECT `id` FROM `ds`.`orders` WHERE `status` = @p_0 ORDER BY `id` DESC LIMIT 5"
        );
    }

    #[test]
    fn test_limit_defaults() {
        for limit in [Some(0), Some(-3), None] {
            let mut query = StructuredQuery::new("ds.tbl");
            query.limit = limit;
            assert!(build(&query).unwrap().sql_text.ends_with("LIMIT 100"));
        }

        let builder = QueryBuilder::new(25, false);
        let built = builder.build(&StructuredQuery::new("ds.tbl")).unwrap();
        assert!(built.sql_text.ends_with("LIMIT 25"));
    }

    #[test]
    fn test_malformed_table() {
        for table in ["", "   ", "tbl", "a.b.c.d"] {
            let err = build(&StructuredQuery::new(table)).unwrap_err();
            assert!(matches!(err, QueryError::InvalidArgument(_)), "table '{}'", table);
        }
    }

    #[test]
    fn test_blank_column_rejected() {
        let query = StructuredQuery::new("ds.tbl").select(["id", " "]);
        assert!(matches!(build(&query), Err(QueryError::InvalidArgument(_))));

        let query = StructuredQuery::new("ds.tbl").filter("", 1_i64);
        assert!(matches!(build(&query), Err(QueryError::InvalidArgument(_))));
    }

    #[test]
    fn test_backticks_stripped_from_identifiers() {
        let query = StructuredQuery::new("ds.tbl").select(["a` FROM x; --"]);
        let built = build(&query).unwrap();
        assert_eq!(built.sql_text, "SELECT `a FROM x; --` FROM `ds`.`tbl` LIMIT 100");
    }

    #[test]
    fn test_strict_identifiers() {
        let strict = QueryBuilder::new(100, true);
        assert!(strict
            .build(&StructuredQuery::new("ds.tbl").select(["created_at"]))
            .is_ok());
        assert!(strict
            .build(&StructuredQuery::new("ds.tbl").select(["a b"]))
            .is_err());
        assert!(strict
            .build(&StructuredQuery::new("ds.tbl").filter("x;y", 1_i64))
            .is_err());
        assert!(strict.build(&StructuredQuery::new("ds.my tbl")).is_err());
    }

    #[test]
    fn test_build_is_deterministic() {
        let query = StructuredQuery::new("proj.ds.tbl")
            .select(["a", "b"])
            .filter("z", 1_i64)
            .filter("a", true)
            .filter("m", None::<i64>)
            .order_by(["-b"])
            .limit(10);
        assert_eq!(build(&query).unwrap(), build(&query).unwrap());
    }

    #[test]
    fn test_filter_reinsert_keeps_position() {
        let mut filters = Filters::new();
        filters.insert("a", 1_i64);
        filters.insert("b", 2_i64);
        filters.insert("a", 3_i64);
        let entries: Vec<_> = filters.iter().collect();
        assert_eq!(
            entries,
            vec![("a", &TypedValue::Int64(3)), ("b", &TypedValue::Int64(2))]
        );
    }

    #[test]
    fn test_deserialize_descriptor() {
        let query: StructuredQuery = serde_json::from_value(json!({
            "table": "ds.tbl",
            "select": ["id"],
            "filters": {"z": 1, "a": "x", "flag": true, "gone": null},
            "orderBy": ["-id"],
            "limit": null
        }))
        .unwrap();

        assert_eq!(query.select_columns, vec!["id"]);
        let fields: Vec<&str> = query.filters.iter().map(|(f, _)| f).collect();
        assert_eq!(fields, vec!["z", "a", "flag", "gone"]);
        assert_eq!(query.limit, None);

        let built = build(&query).unwrap();
        assert_eq!(
            built.sql_text,
            "SELECT `id` FROM `ds`.`tbl` WHERE `z` = @p_0 AND `a` = @p_1 AND `flag` = @p_2 AND `gone` = @p_3 ORDER BY `id` DESC LIMIT 100"
        );
        assert_eq!(built.parameters["p_3"], TypedValue::Null);
    }

    #[test]
    fn test_deserialize_null_collections() {
        let query: StructuredQuery = serde_json::from_value(json!({
            "table": "ds.tbl",
            "selectColumns": null,
            "filters": null,
            "orderBy": null
        }))
        .unwrap();
        assert!(query.select_columns.is_empty());
        assert!(query.filters.is_empty());
        assert!(query.order_by.is_empty());
    }

    #[test]
    fn test_deserialize_rejects_untyped_filter_values() {
        let result: Result<StructuredQuery, _> = serde_json::from_value(json!({
            "table": "ds.tbl",
            "filters": {"price": 9.99}
        }));
        assert!(result.is_err());

        let result: Result<StructuredQuery, _> = serde_json::from_value(json!({"select": ["a"]}));
        assert!(result.is_err());
    }

    #[test]
    fn test_query_parameters() {
        let query = StructuredQuery::new("ds.tbl").filter("a", 7_i64).filter("b", false);
        let params = build(&query).unwrap().query_parameters();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "p_0");
        assert_eq!(params[0].parameter_type.type_name, "INT64");
        assert_eq!(params[1].parameter_value.value.as_deref(), Some("false"));
    }

    #[test]
    fn test_parameters_follow_bind_order_past_ten() {
        let query: StructuredQuery = (0..12_i64)
            .fold(StructuredQuery::new("ds.tbl"), |q, i| q.filter(format!("f{}", i), i));
        let built = build(&query).unwrap();

        let names: Vec<String> = built.query_parameters().into_iter().map(|p| p.name).collect();
        let expected: Vec<String> = (0..12).map(|i| format!("p_{}", i)).collect();
        assert_eq!(names, expected);
        assert_eq!(built.query_parameters()[10].parameter_value.value.as_deref(), Some("10"));

        let json = serde_json::to_value(&built).unwrap();
        let keys: Vec<&String> = json["parameters"].as_object().unwrap().keys().collect();
        assert_eq!(keys, expected.iter().collect::<Vec<_>>());
    }
}
