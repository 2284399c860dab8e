//! Generic query request builder and result wrapper.
//!
//! [`QueryRequest`] accumulates filter, sort, projection, and pagination
//! state through fluent, consuming setters and serializes into the canonical
//! camelCase body the gateway expects. Serialization is deterministic and
//! order-preserving: criteria and sort orders go on the wire in the order
//! they were appended.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult};

/// Inclusive upper bound on the page size accepted by the gateway.
pub const MAX_PAGE_SIZE: u32 = 10_000;

/// Filter operations known to the gateway.
///
/// Criteria store the operation as a plain string, so operations outside this
/// set pass through untouched - the server is the authority on validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperation {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Between,
}

impl FilterOperation {
    /// Wire representation of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
            Self::Between => "BETWEEN",
        }
    }
}

impl fmt::Display for FilterOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<FilterOperation> for String {
    fn from(op: FilterOperation) -> Self {
        op.as_str().to_owned()
    }
}

/// Logical combinator between a criterion and the one preceding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction. Unrecognized directions pass through as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl From<SortDirection> for String {
    fn from(direction: SortDirection) -> Self {
        direction.as_str().to_owned()
    }
}

/// One filter condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriterion {
    /// Field name to filter on.
    pub key: String,
    /// Filter operation (`=`, `!=`, `LIKE`, `IN`, ...).
    pub operation: String,
    /// Value to filter by.
    pub value: Value,
    /// Logical operator combining this criterion with the previous one.
    /// The first criterion in a request never carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix_operation: Option<String>,
}

/// One sort order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortOrder {
    /// Field name to sort by.
    pub column: String,
    /// Sort direction, `ASC` or `DESC`.
    #[serde(rename = "sortOrder")]
    pub sort_order: String,
}

/// Request body for querying entity data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default)]
    pub criteria_list: Vec<FilterCriterion>,
    #[serde(default)]
    pub order_by_list: Vec<SortOrder>,
    /// Fields to project. Empty means all fields.
    #[serde(default)]
    pub select_fields_list: Vec<String>,
    /// Records to skip.
    pub offset: u32,
    /// Maximum records per page, in `[1, 10000]`.
    pub limit: u32,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            criteria_list: Vec::new(),
            order_by_list: Vec::new(),
            select_fields_list: Vec::new(),
            offset: 0,
            limit: 100,
        }
    }
}

impl QueryRequest {
    /// Create an unfiltered request with offset 0 and limit 100.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter criterion with no logical combinator.
    ///
    /// Use this for the first criterion; later criteria should go through
    /// [`QueryRequest::filter_with`] so the request stays unambiguous.
    #[must_use]
    pub fn filter(
        mut self,
        field: impl Into<String>,
        operation: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.criteria_list.push(FilterCriterion {
            key: field.into(),
            operation: operation.into(),
            value: value.into(),
            prefix_operation: None,
        });
        self
    }

    /// Append a filter criterion combined with the previous one.
    ///
    /// The combinator is dropped when this is the first criterion - there is
    /// nothing to combine with.
    #[must_use]
    pub fn filter_with(
        mut self,
        field: impl Into<String>,
        operation: impl Into<String>,
        value: impl Into<Value>,
        combinator: LogicalOperator,
    ) -> Self {
        let prefix_operation =
            (!self.criteria_list.is_empty()).then(|| combinator.as_str().to_owned());
        self.criteria_list.push(FilterCriterion {
            key: field.into(),
            operation: operation.into(),
            value: value.into(),
            prefix_operation,
        });
        self
    }

    /// Append a sort order. Recognized directions are normalized to
    /// upper-case `ASC`/`DESC`; anything else passes through untouched.
    #[must_use]
    pub fn sort(mut self, field: impl Into<String>, direction: impl Into<String>) -> Self {
        let direction = direction.into();
        let normalized = direction.to_ascii_uppercase();
        let sort_order =
            if normalized == "ASC" || normalized == "DESC" { normalized } else { direction };
        self.order_by_list.push(SortOrder { column: field.into(), sort_order });
        self
    }

    /// Replace the projection list wholesale. Empty means all fields.
    #[must_use]
    pub fn select_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select_fields_list = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set pagination from a 1-indexed page number and a page size.
    ///
    /// # Errors
    /// Returns [`GatewayError::Validation`] if `page` is 0, the page size is
    /// outside `[1, 10000]`, or the resulting offset overflows.
    pub fn paginate(mut self, page: u32, page_size: u32) -> GatewayResult<Self> {
        if page == 0 {
            return Err(GatewayError::Validation("page numbers are 1-indexed; got 0".into()));
        }
        check_limit(page_size)?;

        self.offset = (page - 1).checked_mul(page_size).ok_or_else(|| {
            GatewayError::Validation(format!("page {page} with size {page_size} overflows offset"))
        })?;
        self.limit = page_size;
        Ok(self)
    }

    /// Set the page size directly.
    ///
    /// # Errors
    /// Returns [`GatewayError::Validation`] if `limit` is outside `[1, 10000]`.
    pub fn limit(mut self, limit: u32) -> GatewayResult<Self> {
        check_limit(limit)?;
        self.limit = limit;
        Ok(self)
    }

    /// Set the offset directly.
    #[must_use]
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Derived 1-indexed page number. A zero limit maps to page 1.
    #[must_use]
    pub fn page(&self) -> u32 {
        if self.limit == 0 {
            1
        } else {
            self.offset / self.limit + 1
        }
    }

    /// Check invariants that raw construction can violate: the limit range
    /// and the prefix-operation contract on the criteria list.
    ///
    /// # Errors
    /// Returns [`GatewayError::Validation`] describing the first violation.
    pub fn validate(&self) -> GatewayResult<()> {
        check_limit(self.limit)?;

        for (index, criterion) in self.criteria_list.iter().enumerate() {
            match (index, &criterion.prefix_operation) {
                (0, Some(_)) => {
                    return Err(GatewayError::Validation(format!(
                        "first criterion '{}' must not carry a prefix operation",
                        criterion.key
                    )));
                }
                (_, None) if index > 0 => {
                    return Err(GatewayError::Validation(format!(
                        "criterion '{}' needs a prefix operation (AND/OR) to combine with the \
                         previous one",
                        criterion.key
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn check_limit(limit: u32) -> GatewayResult<()> {
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(GatewayError::Validation(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}, got {limit}"
        )));
    }
    Ok(())
}

/// One record returned by a query: an ordered field map.
pub type Record = serde_json::Map<String, Value>;

/// One page of query results.
///
/// Deserialized from the wire envelope `{"data": [...]}`; a missing or null
/// `data` field yields an empty page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResult {
    #[serde(default, rename = "data", deserialize_with = "null_as_empty")]
    pub records: Vec<Record>,
}

impl QueryResult {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Consume the page, yielding its records.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl IntoIterator for QueryResult {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Record>, D::Error>
where
    D: Deserializer<'de>,
{
    let records = Option::<Vec<Record>>::deserialize(deserializer)?;
    Ok(records.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn first_criterion_never_carries_prefix_operation() {
        let request = QueryRequest::new()
            .filter("tenantId", FilterOperation::Eq, 7)
            .filter_with("status", FilterOperation::Eq, "active", LogicalOperator::And);

        assert_eq!(request.criteria_list.len(), 2);
        assert_eq!(request.criteria_list[0].prefix_operation, None);
        assert_eq!(request.criteria_list[1].prefix_operation.as_deref(), Some("AND"));
        request.validate().unwrap();
    }

    #[test]
    fn filter_with_on_empty_request_drops_combinator() {
        let request =
            QueryRequest::new().filter_with("status", FilterOperation::Eq, "active", LogicalOperator::Or);
        assert_eq!(request.criteria_list[0].prefix_operation, None);
    }

    #[test]
    fn serializes_to_canonical_camel_case_body() {
        let request = QueryRequest::new()
            .filter("tenantId", FilterOperation::Eq, 7)
            .filter_with("status", FilterOperation::Eq, "active", LogicalOperator::And)
            .sort("createdAt", SortDirection::Desc)
            .select_fields(["id", "status"])
            .paginate(3, 20)
            .unwrap();

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "criteriaList": [
                    { "key": "tenantId", "operation": "=", "value": 7 },
                    { "key": "status", "operation": "=", "value": "active",
                      "prefixOperation": "AND" },
                ],
                "orderByList": [
                    { "column": "createdAt", "sortOrder": "DESC" },
                ],
                "selectFieldsList": ["id", "status"],
                "offset": 40,
                "limit": 20,
            })
        );
    }

    #[test]
    fn unrecognized_operations_and_directions_pass_through() {
        let request = QueryRequest::new()
            .filter("geo", "WITHIN", json!({ "radius": 5 }))
            .sort("score", "random");

        assert_eq!(request.criteria_list[0].operation, "WITHIN");
        assert_eq!(request.order_by_list[0].sort_order, "random");
    }

    #[test]
    fn sort_direction_normalizes_to_upper_case() {
        let request = QueryRequest::new().sort("name", "asc").sort("age", "Desc");
        assert_eq!(request.order_by_list[0].sort_order, "ASC");
        assert_eq!(request.order_by_list[1].sort_order, "DESC");
    }

    #[test]
    fn paginate_math_round_trips_through_page() {
        let request = QueryRequest::new().paginate(3, 20).unwrap();
        assert_eq!(request.offset, 40);
        assert_eq!(request.limit, 20);
        assert_eq!(request.page(), 3);
    }

    #[test]
    fn page_one_maps_to_offset_zero() {
        let request = QueryRequest::new().paginate(1, 100).unwrap();
        assert_eq!(request.offset, 0);
        assert_eq!(request.page(), 1);
    }

    #[test]
    fn zero_limit_derives_page_one() {
        let request = QueryRequest { limit: 0, offset: 40, ..Default::default() };
        assert_eq!(request.page(), 1);
    }

    #[test]
    fn limit_bounds_are_enforced_not_clamped() {
        assert!(matches!(
            QueryRequest::new().limit(0),
            Err(GatewayError::Validation(_))
        ));
        assert!(matches!(
            QueryRequest::new().limit(10_001),
            Err(GatewayError::Validation(_))
        ));
        assert_eq!(QueryRequest::new().limit(1).unwrap().limit, 1);
        assert_eq!(QueryRequest::new().limit(10_000).unwrap().limit, 10_000);
    }

    #[test]
    fn paginate_rejects_page_zero() {
        assert!(matches!(
            QueryRequest::new().paginate(0, 10),
            Err(GatewayError::Validation(_))
        ));
    }

    #[test]
    fn validate_flags_raw_constructed_contract_violations() {
        let bad_first = QueryRequest {
            criteria_list: vec![FilterCriterion {
                key: "a".into(),
                operation: "=".into(),
                value: json!(1),
                prefix_operation: Some("AND".into()),
            }],
            ..Default::default()
        };
        assert!(matches!(bad_first.validate(), Err(GatewayError::Validation(_))));

        let missing_combinator = QueryRequest {
            criteria_list: vec![
                FilterCriterion {
                    key: "a".into(),
                    operation: "=".into(),
                    value: json!(1),
                    prefix_operation: None,
                },
                FilterCriterion {
                    key: "b".into(),
                    operation: "=".into(),
                    value: json!(2),
                    prefix_operation: None,
                },
            ],
            ..Default::default()
        };
        assert!(matches!(missing_combinator.validate(), Err(GatewayError::Validation(_))));
    }

    #[test]
    fn query_result_tolerates_null_and_missing_data() {
        let from_null: QueryResult = serde_json::from_value(json!({ "data": null })).unwrap();
        assert!(from_null.is_empty());

        let from_missing: QueryResult = serde_json::from_value(json!({})).unwrap();
        assert!(from_missing.is_empty());

        let page: QueryResult =
            serde_json::from_value(json!({ "data": [{ "id": 1 }, { "id": 2 }] })).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page.records[0].get("id"), Some(&json!(1)));
    }
}
