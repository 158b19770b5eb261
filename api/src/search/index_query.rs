//! Compiles resolved search options into the filter and sort strings of the
//! search index.

use super::builder::numeric_term;
use super::error::SearchError;
use super::fields::{FieldDescriptor, NativeType, ID};
use super::fold::{fold, FoldTarget};
use super::types::{Comparator, Condition, SearchOptions, SearchScope, TypedValue};
use crate::index::document::position_attribute;
use crate::index::{IndexSearchRequest, MAX_SORT_FIELDS, NULL_DATE_SENTINEL, QUERY_BY};

/// Build the index request for a search.
///
/// Favorites live in the primary store, so the caller passes the favorite
/// task ids of `scope.favorites_of` in.
pub fn build_index_query(
    options: &SearchOptions,
    favorite_ids: &[i64],
) -> Result<IndexSearchRequest, SearchError> {
    let mut compiler = IndexCompiler {
        include_nulls: options.include_nulls,
    };

    let mut clauses = vec![scope_filter(&options.scope, favorite_ids)];
    if let Some(filter) = fold(&options.filter, &mut compiler)? {
        clauses.push(filter);
    }

    let mut q = "*".to_string();
    if !options.search.is_empty() {
        match numeric_term(&options.search) {
            // The engine cannot OR a text query with a filter, so numeric
            // terms are matched entirely in the filter
            Some(index) => {
                let term = quote(&options.search, "search")?;
                clauses.push(format!(
                    "(title:{term} || description:{term} || index:={index})"
                ));
            }
            None => q = options.search.clone(),
        }
    }

    Ok(IndexSearchRequest {
        q,
        query_by: QUERY_BY.iter().map(|s| s.to_string()).collect(),
        filter_by: clauses.join(" && "),
        sort_by: sort_by(options),
        page: options.page,
        per_page: options.per_page,
    })
}

fn scope_filter(scope: &SearchScope, favorite_ids: &[i64]) -> String {
    let mut parts = Vec::new();
    if !scope.project_ids.is_empty() {
        parts.push(format!("project_id:=[{}]", join_ints(&scope.project_ids)));
    }
    if scope.favorites_of.is_some() && !favorite_ids.is_empty() {
        parts.push(format!("task_id:=[{}]", join_ints(favorite_ids)));
    }

    match parts.len() {
        // Matches nothing; task ids are positive
        0 => "task_id:<0".to_string(),
        1 => parts.remove(0),
        _ => format!("({})", parts.join(" || ")),
    }
}

fn join_ints(values: &[i64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Strings are wrapped in backticks; a backtick inside cannot be escaped
fn quote(text: &str, field: &str) -> Result<String, SearchError> {
    if text.contains('`') {
        return Err(SearchError::value(field, text));
    }
    Ok(format!("`{}`", text))
}

fn literal(value: &TypedValue, field: &FieldDescriptor) -> Result<String, SearchError> {
    Ok(match value {
        TypedValue::Int(i) => i.to_string(),
        TypedValue::Float(f) => f.to_string(),
        TypedValue::Bool(b) => b.to_string(),
        TypedValue::Text(s) => quote(s, field.name)?,
        TypedValue::Timestamp(ts) => ts.timestamp().to_string(),
    })
}

struct IndexCompiler {
    include_nulls: bool,
}

impl IndexCompiler {
    fn condition(&self, condition: &Condition) -> Result<String, SearchError> {
        let field = condition.field;
        let path = field.index_path;
        let values = condition
            .value
            .values()
            .iter()
            .map(|v| literal(v, field))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(match condition.comparator {
            Comparator::In => format!("{}:=[{}]", path, values.join(",")),
            Comparator::NotIn => format!("{}:!=[{}]", path, values.join(",")),
            Comparator::Like => format!("{}:{}", path, values.join(",")),
            op => format!("{}:{}{}", path, op.as_str(), values.join(",")),
        })
    }
}

impl FoldTarget for IndexCompiler {
    type Expr = String;

    fn leaf(&mut self, condition: &Condition) -> Result<String, SearchError> {
        let compiled = self.condition(condition)?;
        let field = condition.field;
        if !field.nullable {
            return Ok(compiled);
        }

        let comparator = condition.comparator;
        let path = field.index_path;
        if self.include_nulls && comparator.is_range() {
            Ok(format!("({}:={} || {})", path, NULL_DATE_SENTINEL, compiled))
        } else if !self.include_nulls && (comparator.is_range() || comparator.is_negative()) {
            Ok(format!("({} && {}:!={})", compiled, path, NULL_DATE_SENTINEL))
        } else {
            Ok(compiled)
        }
    }

    fn and(&mut self, left: String, right: String) -> String {
        format!("({} && {})", left, right)
    }

    fn or(&mut self, left: String, right: String) -> String {
        format!("({} || {})", left, right)
    }
}

/// Sort string with missing values last. Fields beyond the engine limit are
/// dropped.
fn sort_by(options: &SearchOptions) -> String {
    let params = &options.sort.params;
    if params.len() > MAX_SORT_FIELDS {
        let dropped: Vec<&str> = params[MAX_SORT_FIELDS..]
            .iter()
            .map(|p| p.field.name)
            .collect();
        tracing::warn!(
            "Search index sorts by at most {} fields, ignoring {:?}",
            MAX_SORT_FIELDS,
            dropped
        );
    }

    params
        .iter()
        .take(MAX_SORT_FIELDS)
        .map(|param| {
            let direction = param.direction.as_str();
            match param.position_context {
                Some(view_id) if param.field.is_position() => format!(
                    "{}(missing_values: last):{}",
                    position_attribute(view_id),
                    direction
                ),
                _ if param.field.nullable => format!(
                    "{}_sort(missing_values: last):{}",
                    param.field.index_path, direction
                ),
                _ if param.field.name == ID => format!("task_id:{}", direction),
                _ if param.field.native_type == NativeType::Bool => {
                    format!("{}_sort:{}", param.field.index_path, direction)
                }
                _ => format!("{}:{}", param.field.index_path, direction),
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
