use super::error::SearchError;
use super::fields::{self, ID};
use super::types::{SortDirection, SortParam, SortSpec};

pub fn parse_direction(order: &str) -> Result<SortDirection, SearchError> {
    match order.trim().to_lowercase().as_str() {
        "asc" => Ok(SortDirection::Asc),
        "desc" => Ok(SortDirection::Desc),
        _ => Err(SearchError::InvalidSortOrder {
            order: order.to_string(),
        }),
    }
}

/// Validate and normalize parallel lists of sort fields and directions.
///
/// Missing directions default to ascending. An `id` tie-breaker is appended
/// so paging is stable; an empty list sorts by `id` alone.
pub fn resolve_sort(
    sort_by: &[String],
    order_by: &[String],
    position_context: Option<i64>,
) -> Result<SortSpec, SearchError> {
    let mut params: Vec<SortParam> = Vec::with_capacity(sort_by.len() + 1);

    for (i, name) in sort_by.iter().enumerate() {
        let field = fields::lookup(name)
            .filter(|f| f.sortable)
            .ok_or_else(|| SearchError::field(name))?;
        let direction = match order_by.get(i) {
            Some(order) if !order.trim().is_empty() => parse_direction(order)?,
            _ => SortDirection::Asc,
        };

        let position_context = if field.is_position() {
            match position_context {
                Some(ctx) if ctx != 0 => Some(ctx),
                _ => return Err(SearchError::MustHaveContextToSortByPosition),
            }
        } else {
            None
        };

        if params.iter().any(|p| p.field.name == field.name) {
            continue;
        }
        params.push(SortParam {
            field,
            direction,
            position_context,
        });
    }

    if !params.iter().any(|p| p.field.name == ID) {
        if let Some(id) = fields::lookup(ID) {
            params.push(SortParam {
                field: id,
                direction: SortDirection::Asc,
                position_context: None,
            });
        }
    }

    Ok(SortSpec { params })
}
