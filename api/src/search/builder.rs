//! Compiles resolved search options into a parameterized SQL query over the
//! `tasks` table.

use super::error::SearchError;
use super::fields::{FieldDescriptor, Relation};
use super::fold::{fold, FoldTarget};
use super::types::{
    Comparator, Condition, FilterValue, SearchOptions, SearchScope, SortDirection, TypedValue,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl From<&TypedValue> for SqlValue {
    fn from(value: &TypedValue) -> Self {
        match value {
            TypedValue::Int(i) => SqlValue::Integer(*i),
            TypedValue::Float(f) => SqlValue::Float(*f),
            TypedValue::Bool(b) => SqlValue::Bool(*b),
            TypedValue::Text(s) => SqlValue::String(s.clone()),
            // Timestamps are stored as unix seconds
            TypedValue::Timestamp(ts) => SqlValue::Integer(ts.timestamp()),
        }
    }
}

/// SQL engines differ in placeholder syntax, case-insensitive matching and
/// where NULLs sort by default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlDialect {
    #[default]
    Sqlite,
    Postgres,
    Mysql,
}

/// Alias of the position table joined for `position` sorting
const POSITION_ALIAS: &str = "tp";

/// Pieces of a task query. Placeholders in `where_clause` are numbered in
/// the order of `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub joins: String,
    pub where_clause: String,
    pub order_by: String,
    pub values: Vec<SqlValue>,
    pub limit: i64,
    pub offset: i64,
}

impl SqlQuery {
    /// `SELECT {columns} FROM tasks ...` with ordering and pagination
    pub fn select_sql(&self, columns: &str) -> String {
        let mut sql = format!("SELECT {} FROM tasks", columns);
        if !self.joins.is_empty() {
            sql.push(' ');
            sql.push_str(&self.joins);
        }
        sql.push_str(" WHERE ");
        sql.push_str(&self.where_clause);
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by);
        }
        sql.push_str(&format!(" LIMIT {} OFFSET {}", self.limit, self.offset));
        sql
    }

    /// Total number of matches, ignoring pagination
    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM tasks WHERE {}", self.where_clause)
    }
}

/// Build the full query for a search. An empty scope yields a query that
/// matches nothing.
pub fn build_sql(options: &SearchOptions, dialect: SqlDialect) -> Result<SqlQuery, SearchError> {
    let mut compiler = SqlCompiler::new(dialect, options.include_nulls);
    let mut clauses = vec![compiler.scope(&options.scope)];

    if let Some(filter) = fold(&options.filter, &mut compiler)? {
        clauses.push(filter);
    }
    if !options.search.is_empty() {
        clauses.push(compiler.free_text(&options.search));
    }

    let (joins, order_by) = build_order_by(options, dialect);

    Ok(SqlQuery {
        joins,
        where_clause: clauses.join(" AND "),
        order_by,
        values: compiler.values,
        limit: options.per_page,
        offset: options.offset(),
    })
}

/// Placeholder-tracking filter compiler
pub struct SqlCompiler {
    dialect: SqlDialect,
    include_nulls: bool,
    values: Vec<SqlValue>,
}

impl SqlCompiler {
    pub fn new(dialect: SqlDialect, include_nulls: bool) -> Self {
        Self {
            dialect,
            include_nulls,
            values: Vec::new(),
        }
    }

    fn placeholder(&mut self, value: SqlValue) -> String {
        self.values.push(value);
        match self.dialect {
            SqlDialect::Postgres => format!("${}", self.values.len()),
            SqlDialect::Sqlite | SqlDialect::Mysql => "?".to_string(),
        }
    }

    fn placeholders(&mut self, values: &[TypedValue]) -> String {
        let parts: Vec<String> = values
            .iter()
            .map(|v| self.placeholder(SqlValue::from(v)))
            .collect();
        parts.join(", ")
    }

    fn like_operator(&self) -> &'static str {
        match self.dialect {
            SqlDialect::Postgres => "ILIKE",
            SqlDialect::Sqlite | SqlDialect::Mysql => "LIKE",
        }
    }

    /// MySQL treats a backslash inside a string literal as an escape
    fn like_escape(&self) -> &'static str {
        match self.dialect {
            SqlDialect::Mysql => "ESCAPE '\\\\'",
            SqlDialect::Sqlite | SqlDialect::Postgres => "ESCAPE '\\'",
        }
    }

    fn scope(&mut self, scope: &SearchScope) -> String {
        let mut parts = Vec::new();
        if !scope.project_ids.is_empty() {
            let ids: Vec<TypedValue> = scope
                .project_ids
                .iter()
                .map(|id| TypedValue::Int(*id))
                .collect();
            parts.push(format!("tasks.project_id IN ({})", self.placeholders(&ids)));
        }
        if let Some(user_id) = scope.favorites_of {
            let user = self.placeholder(SqlValue::Integer(user_id));
            parts.push(format!(
                "tasks.id IN (SELECT favorites.entity_id FROM favorites WHERE favorites.kind = 1 AND favorites.user_id = {})",
                user
            ));
        }

        match parts.len() {
            0 => "1 = 0".to_string(),
            1 => parts.remove(0),
            _ => format!("({})", parts.join(" OR ")),
        }
    }

    /// Case-insensitive substring match on title or description, plus an
    /// exact match on the task index when the term is a positive integer
    fn free_text(&mut self, term: &str) -> String {
        let pattern = format!("%{}%", escape_like(term));
        let like = self.like_operator();
        let escape = self.like_escape();
        let title = self.placeholder(SqlValue::String(pattern.clone()));
        let description = self.placeholder(SqlValue::String(pattern));
        let mut sql = format!(
            "(tasks.title {like} {title} {escape} OR tasks.description {like} {description} {escape}",
        );
        if let Some(index) = numeric_term(term) {
            let index = self.placeholder(SqlValue::Integer(index));
            sql.push_str(&format!(" OR tasks.task_index = {}", index));
        }
        sql.push(')');
        sql
    }

    fn column_condition(&mut self, column: &str, condition: &Condition) -> String {
        match (&condition.value, condition.comparator) {
            (FilterValue::List(values), Comparator::NotIn) => {
                format!("{} NOT IN ({})", column, self.placeholders(values))
            }
            (FilterValue::List(values), _) => {
                format!("{} IN ({})", column, self.placeholders(values))
            }
            (FilterValue::Scalar(TypedValue::Text(text)), Comparator::Like) => {
                let like = self.like_operator();
                let pattern = self.placeholder(SqlValue::String(format!("%{}%", escape_like(text))));
                format!("{} {} {} {}", column, like, pattern, self.like_escape())
            }
            (FilterValue::Scalar(value), comparator) => {
                let placeholder = self.placeholder(SqlValue::from(value));
                format!("{} {} {}", column, comparator.as_str(), placeholder)
            }
        }
    }

    /// `EXISTS` for positive comparators. Negative comparators become
    /// `NOT EXISTS` over the positive form so tasks without related rows
    /// still match.
    fn relation_condition(&mut self, relation: &Relation, condition: &Condition) -> String {
        let positive = Condition {
            field: condition.field,
            comparator: match condition.comparator {
                Comparator::NotEq => Comparator::Eq,
                Comparator::NotIn => Comparator::In,
                other => other,
            },
            value: condition.value.clone(),
        };
        let inner = self.column_condition(relation.match_column, &positive);
        let exists = if condition.comparator.is_negative() {
            "NOT EXISTS"
        } else {
            "EXISTS"
        };
        format!(
            "{} (SELECT 1 FROM {} WHERE {} = {} AND {})",
            exists, relation.table, relation.link_column, relation.outer_column, inner
        )
    }
}

impl FoldTarget for SqlCompiler {
    type Expr = String;

    fn leaf(&mut self, condition: &Condition) -> Result<String, SearchError> {
        let field = condition.field;
        if let Some(relation) = &field.relation {
            return Ok(self.relation_condition(relation, condition));
        }

        let column = qualified_column(field);
        let sql = self.column_condition(&column, condition);

        let widen = field.nullable
            && self.include_nulls
            && (condition.comparator.is_range() || condition.comparator.is_negative());
        if widen {
            Ok(format!("({} OR {} IS NULL)", sql, column))
        } else {
            Ok(sql)
        }
    }

    fn and(&mut self, left: String, right: String) -> String {
        format!("({} AND {})", left, right)
    }

    fn or(&mut self, left: String, right: String) -> String {
        format!("({} OR {})", left, right)
    }
}

fn qualified_column(field: &FieldDescriptor) -> String {
    format!("tasks.{}", field.column)
}

/// Joins needed for sorting and the ORDER BY list. NULLs always sort last.
fn build_order_by(options: &SearchOptions, dialect: SqlDialect) -> (String, String) {
    let mut joins = String::new();
    let mut terms = Vec::with_capacity(options.sort.params.len());

    for param in &options.sort.params {
        let column = match param.position_context {
            Some(view_id) if param.field.is_position() => {
                joins = format!(
                    "LEFT JOIN task_positions {alias} ON {alias}.task_id = tasks.id AND {alias}.project_view_id = {view_id}",
                    alias = POSITION_ALIAS,
                );
                format!("{}.position", POSITION_ALIAS)
            }
            _ => qualified_column(param.field),
        };
        let direction = match param.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };

        let may_be_null = param.field.nullable || param.field.is_position();
        let term = match (may_be_null, dialect) {
            (false, _) => format!("{} {}", column, direction),
            (true, SqlDialect::Postgres) => format!("{} {} NULLS LAST", column, direction),
            // SQLite and MySQL sort NULL first ascending; order by the null flag first
            (true, SqlDialect::Sqlite | SqlDialect::Mysql) => {
                format!("{} IS NULL, {} {}", column, column, direction)
            }
        };
        terms.push(term);
    }

    (joins, terms.join(", "))
}

/// Escape LIKE wildcards so user input matches literally
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// A free-text term addressing a task by its index, optionally `#`-prefixed
pub fn numeric_term(term: &str) -> Option<i64> {
    let digits = term.trim().strip_prefix('#').unwrap_or(term.trim());
    digits.parse::<i64>().ok().filter(|n| *n > 0)
}
