use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Status code the service uses for "Done".
pub const TASK_STATUS_DONE: i64 = 10;

/// Treat an explicit `null` the same as a missing field.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Unset or empty; the service treats an empty string as "no value" for these fields.
fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub oid: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub oid: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub archived: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub oid: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub due: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub assignees: Vec<User>,
    /// Passed through untouched; the service may return names or tag objects.
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<Value>,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == Some(TASK_STATUS_DONE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub oid: String,
    #[serde(rename = "description", default, deserialize_with = "null_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_default")]
    pub user: User,
    #[serde(rename = "createdAt", default, deserialize_with = "null_default")]
    pub created_at: String,
}

/// Body for creating a task. Unset fields are left out of the request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskCreateInput {
    pub name: String,
    #[serde(skip_serializing_if = "is_blank")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "is_blank")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub due: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl TaskCreateInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Partial update for a task; only supplied fields change server-side. An empty
/// description is sent so it can be cleared; other empty strings are dropped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskUpdateInput {
    #[serde(skip_serializing_if = "is_blank")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "is_blank")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub due: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub assignee: Option<String>,
}

impl TaskUpdateInput {
    /// True when serializing would produce an empty body.
    pub fn is_empty(&self) -> bool {
        is_blank(&self.name)
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && is_blank(&self.start)
            && is_blank(&self.due)
            && is_blank(&self.assignee)
    }
}

/// Partial update for a project.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectUpdateInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CommentBody<'a> {
    pub description: &'a str,
}
