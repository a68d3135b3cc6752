mod client;
mod models;
#[cfg(test)]
pub(crate) mod test_support;

pub use client::{ApiError, ApiResult, QuireClient};
pub(crate) use models::CommentBody;
pub use models::{
    Comment, Project, ProjectUpdateInput, Task, TaskCreateInput, TaskUpdateInput, User,
    TASK_STATUS_DONE,
};
