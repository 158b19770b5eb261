//! Static registry of the task fields a filter or sort may reference.

use super::error::SearchError;
use super::types::Comparator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeType {
    Int64,
    Float64,
    Text,
    Bool,
    Timestamp,
}

/// Side table a relation-backed field is matched against.
///
/// A condition on the field compiles to
/// `EXISTS (SELECT 1 FROM {table} WHERE {link_column} = {outer_column} AND {match_column} <op> ?)`.
#[derive(Debug, PartialEq, Eq)]
pub struct Relation {
    pub table: &'static str,
    pub link_column: &'static str,
    pub outer_column: &'static str,
    pub match_column: &'static str,
}

#[derive(Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub native_type: NativeType,
    /// Column on `tasks`; empty for relation fields
    pub column: &'static str,
    pub relation: Option<Relation>,
    pub nullable: bool,
    pub sortable: bool,
    /// Attribute path inside the index document
    pub index_path: &'static str,
}

impl FieldDescriptor {
    pub fn is_relation(&self) -> bool {
        self.relation.is_some()
    }

    pub fn is_position(&self) -> bool {
        self.name == POSITION
    }
}

pub const ID: &str = "id";
pub const POSITION: &str = "position";

const fn column(
    name: &'static str,
    column: &'static str,
    native_type: NativeType,
    index_path: &'static str,
) -> FieldDescriptor {
    FieldDescriptor {
        name,
        native_type,
        column,
        relation: None,
        nullable: false,
        sortable: true,
        index_path,
    }
}

const fn nullable_date(name: &'static str) -> FieldDescriptor {
    FieldDescriptor {
        name,
        native_type: NativeType::Timestamp,
        column: name,
        relation: None,
        nullable: true,
        sortable: true,
        index_path: name,
    }
}

const fn relation(
    name: &'static str,
    native_type: NativeType,
    relation: Relation,
    index_path: &'static str,
) -> FieldDescriptor {
    FieldDescriptor {
        name,
        native_type,
        column: "",
        relation: Some(relation),
        nullable: false,
        sortable: false,
        index_path,
    }
}

static FIELDS: &[FieldDescriptor] = &[
    column("id", "id", NativeType::Int64, "task_id"),
    column("title", "title", NativeType::Text, "title"),
    column("description", "description", NativeType::Text, "description"),
    column("done", "done", NativeType::Bool, "done"),
    nullable_date("done_at"),
    nullable_date("due_date"),
    column("created_by_id", "created_by_id", NativeType::Int64, "created_by_id"),
    column("project_id", "project_id", NativeType::Int64, "project_id"),
    column("repeat_after", "repeat_after", NativeType::Int64, "repeat_after"),
    column("priority", "priority", NativeType::Int64, "priority"),
    nullable_date("start_date"),
    nullable_date("end_date"),
    column("hex_color", "hex_color", NativeType::Text, "hex_color"),
    column("percent_done", "percent_done", NativeType::Float64, "percent_done"),
    column("uid", "uid", NativeType::Text, "uid"),
    column("created", "created", NativeType::Timestamp, "created"),
    column("updated", "updated", NativeType::Timestamp, "updated"),
    column("index", "task_index", NativeType::Int64, "index"),
    FieldDescriptor {
        sortable: true,
        ..relation(
            POSITION,
            NativeType::Float64,
            Relation {
                table: "task_positions",
                link_column: "task_positions.task_id",
                outer_column: "tasks.id",
                match_column: "task_positions.position",
            },
            "positions.position",
        )
    },
    relation(
        "project_view_id",
        NativeType::Int64,
        Relation {
            table: "task_positions",
            link_column: "task_positions.task_id",
            outer_column: "tasks.id",
            match_column: "task_positions.project_view_id",
        },
        "positions.project_view_id",
    ),
    relation(
        "assignees",
        NativeType::Text,
        Relation {
            table: "task_assignees INNER JOIN users ON users.id = task_assignees.user_id",
            link_column: "task_assignees.task_id",
            outer_column: "tasks.id",
            match_column: "users.username",
        },
        "assignees.username",
    ),
    relation(
        "labels",
        NativeType::Int64,
        Relation {
            table: "label_tasks",
            link_column: "label_tasks.task_id",
            outer_column: "tasks.id",
            match_column: "label_tasks.label_id",
        },
        "labels.id",
    ),
    relation(
        "reminders",
        NativeType::Timestamp,
        Relation {
            table: "task_reminders",
            link_column: "task_reminders.task_id",
            outer_column: "tasks.id",
            match_column: "task_reminders.reminder",
        },
        "reminders",
    ),
    relation(
        "parent_project",
        NativeType::Int64,
        Relation {
            table: "projects",
            link_column: "projects.id",
            outer_column: "tasks.project_id",
            match_column: "projects.parent_project_id",
        },
        "parent_project_id",
    ),
];

/// Every registered field, in declaration order
pub fn all() -> &'static [FieldDescriptor] {
    FIELDS
}

/// Look up a field by name. `project` is accepted for `project_id`.
pub fn lookup(name: &str) -> Option<&'static FieldDescriptor> {
    let name = name.trim();
    let name = if name.eq_ignore_ascii_case("project") {
        "project_id"
    } else {
        name
    };
    FIELDS.iter().find(|f| f.name.eq_ignore_ascii_case(name))
}

pub fn validate_field(name: &str) -> Result<&'static FieldDescriptor, SearchError> {
    lookup(name).ok_or_else(|| SearchError::field(name))
}

pub fn validate_comparator(
    field: &FieldDescriptor,
    comparator: Comparator,
) -> Result<(), SearchError> {
    let supported = match comparator {
        Comparator::Eq | Comparator::NotEq | Comparator::In | Comparator::NotIn => true,
        Comparator::Like => field.native_type == NativeType::Text && !field.is_relation(),
        Comparator::Gt | Comparator::Gte | Comparator::Lt | Comparator::Lte => matches!(
            field.native_type,
            NativeType::Int64 | NativeType::Float64 | NativeType::Timestamp
        ),
    };

    if supported {
        Ok(())
    } else {
        Err(SearchError::InvalidTaskFilterComparator {
            field: field.name.to_string(),
            comparator: comparator.to_string(),
        })
    }
}
