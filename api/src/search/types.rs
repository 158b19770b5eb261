/// AST and option types for the task filter language
use super::fields::FieldDescriptor;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::fmt;

/// How a node combines with the expression accumulated before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,    // =
    NotEq, // !=
    Gt,    // >
    Gte,   // >=
    Lt,    // <
    Lte,   // <=
    Like,  // like
    In,    // in
    NotIn, // not in
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::NotEq => "!=",
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
            Comparator::Like => "like",
            Comparator::In => "in",
            Comparator::NotIn => "not in",
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Comparator::In | Comparator::NotIn)
    }

    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Comparator::Gt | Comparator::Gte | Comparator::Lt | Comparator::Lte
        )
    }

    /// `!=` and `not in` match records without the value
    pub fn is_negative(&self) -> bool {
        matches!(self, Comparator::NotEq | Comparator::NotIn)
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of the filter forest, generic over the condition payload so the
/// parser and the coercer share one tree shape
#[derive(Debug, Clone, PartialEq)]
pub struct FilterNode<C> {
    pub join: Join,
    pub node: Node<C>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node<C> {
    Condition(C),
    Group(Vec<FilterNode<C>>),
}

/// Untyped value as written in the filter string
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Single(String),
    List(Vec<String>),
}

/// Condition straight out of the parser: nothing is validated yet
#[derive(Debug, Clone, PartialEq)]
pub struct RawCondition {
    pub field: String,
    pub comparator: Comparator,
    pub value: RawValue,
}

pub type ParsedFilter = Vec<FilterNode<RawCondition>>;

/// Scalar coerced to the native type of its field
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Timestamp(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Scalar(TypedValue),
    List(Vec<TypedValue>),
}

impl FilterValue {
    pub fn is_list(&self) -> bool {
        matches!(self, FilterValue::List(_))
    }

    pub fn values(&self) -> &[TypedValue] {
        match self {
            FilterValue::Scalar(v) => std::slice::from_ref(v),
            FilterValue::List(values) => values,
        }
    }
}

/// Validated, typed leaf of the filter tree
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: &'static FieldDescriptor,
    pub comparator: Comparator,
    pub value: FilterValue,
}

pub type TaskFilter = Vec<FilterNode<Condition>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortParam {
    pub field: &'static FieldDescriptor,
    pub direction: SortDirection,
    /// Project view the `position` field is relative to
    pub position_context: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortSpec {
    pub params: Vec<SortParam>,
}

/// Concrete projects a search may return tasks from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchScope {
    pub project_ids: Vec<i64>,
    /// Include the tasks this user marked as favorite
    pub favorites_of: Option<i64>,
}

impl SearchScope {
    pub fn projects(project_ids: Vec<i64>) -> Self {
        Self {
            project_ids,
            favorites_of: None,
        }
    }

    pub fn favorites(user_id: i64) -> Self {
        Self {
            project_ids: Vec::new(),
            favorites_of: Some(user_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.project_ids.is_empty() && self.favorites_of.is_none()
    }
}

/// Everything a searcher needs for one request
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub filter: TaskFilter,
    pub sort: SortSpec,
    pub scope: SearchScope,
    pub include_nulls: bool,
    pub timezone: Tz,
    pub search: String,
    /// 1-based
    pub page: i64,
    pub per_page: i64,
}

impl SearchOptions {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.per_page)
    }
}

/// The read contract as received from a caller
#[derive(Debug, Clone, Default)]
pub struct TaskSearchRequest {
    pub scope: Option<i64>,
    pub search: String,
    pub filter: String,
    pub filter_timezone: String,
    pub sort_by: Vec<String>,
    pub order_by: Vec<String>,
    pub project_view_id: Option<i64>,
    pub include_nulls: bool,
    pub page: i64,
    pub per_page: i64,
}
