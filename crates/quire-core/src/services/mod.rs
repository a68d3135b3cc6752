pub mod comments;
pub mod projects;
pub mod tasks;
pub mod users;

pub use comments::CommentService;
pub use projects::ProjectService;
pub use tasks::{TaskQueryOptions, TaskService};
pub use users::UserService;
