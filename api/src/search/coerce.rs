use super::datemath;
use super::error::SearchError;
use super::fields::{self, FieldDescriptor, NativeType};
use super::parser::parse_filter;
use super::types::{
    Comparator, Condition, FilterNode, FilterValue, Node, RawCondition, RawValue, TaskFilter,
    TypedValue,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Resolve an IANA timezone name. An empty name falls back to `default`.
pub fn resolve_timezone(name: &str, default: Tz) -> Result<Tz, SearchError> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(default);
    }
    name.parse::<Tz>()
        .map_err(|_| SearchError::InvalidTimezone {
            timezone: name.to_string(),
        })
}

/// Parse, validate and coerce a filter string
pub fn compile_filter(filter: &str, tz: Tz) -> Result<TaskFilter, SearchError> {
    compile_filter_at(filter, tz, Utc::now())
}

/// Like [`compile_filter`] with an explicit "now" for relative dates
pub fn compile_filter_at(
    filter: &str,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<TaskFilter, SearchError> {
    let parsed = parse_filter(filter)?;
    type_nodes(parsed, tz, now)
}

fn type_nodes(
    nodes: Vec<FilterNode<RawCondition>>,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<TaskFilter, SearchError> {
    nodes
        .into_iter()
        .map(|node| {
            let typed = match node.node {
                Node::Condition(raw) => Node::Condition(type_condition(raw, tz, now)?),
                Node::Group(children) => Node::Group(type_nodes(children, tz, now)?),
            };
            Ok(FilterNode {
                join: node.join,
                node: typed,
            })
        })
        .collect()
}

fn type_condition(
    raw: RawCondition,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<Condition, SearchError> {
    let field = fields::validate_field(&raw.field)?;
    fields::validate_comparator(field, raw.comparator)?;
    let value = coerce(field, raw.comparator, &raw.value, tz, now)?;
    Ok(Condition {
        field,
        comparator: raw.comparator,
        value,
    })
}

/// Convert a raw value into the native type demanded by `field`
pub fn coerce(
    field: &FieldDescriptor,
    comparator: Comparator,
    raw: &RawValue,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<FilterValue, SearchError> {
    match (raw, comparator.is_list()) {
        (RawValue::List(items), true) => items
            .iter()
            .map(|item| coerce_scalar(field, item, tz, now))
            .collect::<Result<Vec<_>, _>>()
            .map(FilterValue::List),
        (RawValue::Single(value), true) => value
            .split(',')
            .map(|item| coerce_scalar(field, item.trim(), tz, now))
            .collect::<Result<Vec<_>, _>>()
            .map(FilterValue::List),
        (RawValue::Single(value), false) => {
            coerce_scalar(field, value, tz, now).map(FilterValue::Scalar)
        }
        (RawValue::List(items), false) => Err(SearchError::value(field.name, &items.join(","))),
    }
}

fn coerce_scalar(
    field: &FieldDescriptor,
    raw: &str,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<TypedValue, SearchError> {
    let invalid = || SearchError::value(field.name, raw);
    match field.native_type {
        NativeType::Int64 => raw.trim().parse().map(TypedValue::Int).map_err(|_| invalid()),
        NativeType::Float64 => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(TypedValue::Float)
            .ok_or_else(invalid),
        NativeType::Bool => match raw.trim().to_lowercase().as_str() {
            "true" | "1" => Ok(TypedValue::Bool(true)),
            "false" | "0" => Ok(TypedValue::Bool(false)),
            _ => Err(invalid()),
        },
        NativeType::Text => Ok(TypedValue::Text(raw.to_string())),
        NativeType::Timestamp => datemath::evaluate(raw, now, tz)
            .or_else(|| datemath::parse_absolute(raw, tz))
            .map(TypedValue::Timestamp)
            .ok_or_else(invalid),
    }
}
