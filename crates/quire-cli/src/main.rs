use std::io;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use quire_core::api::{
    Comment, Project, ProjectUpdateInput, QuireClient, Task, TaskCreateInput, TaskUpdateInput,
    User,
};
use quire_core::auth::{
    parse_authorization_input, run_manual_flow, AuthError, CredentialManager,
    FileCredentialStore, TokenResponse, DEFAULT_REDIRECT_URI,
};
use quire_core::config::Settings;
use quire_core::services::{
    CommentService, ProjectService, TaskQueryOptions, TaskService, UserService,
};
use tokio::task;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

const DEFAULT_PROFILE: &str = "default";

#[derive(Parser, Debug)]
#[command(author, version, about = "Quire terminal CLI")]
struct Cli {
    /// Profile name for stored credentials
    #[arg(long, global = true, default_value = DEFAULT_PROFILE)]
    profile: String,
    /// Output raw JSON
    #[arg(long, global = true)]
    json: bool,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authentication related commands
    #[command(subcommand)]
    Auth(AuthCommand),
    /// User account details
    #[command(subcommand)]
    User(UserCommand),
    /// Project operations
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Task operations
    #[command(subcommand)]
    Task(TaskCommand),
    /// Task comments
    #[command(subcommand)]
    Comment(CommentCommand),
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Print the authorization URL
    Url(UrlArgs),
    /// Exchange an authorization code for tokens
    Login(LoginArgs),
    /// Force a token refresh
    Refresh,
    /// Show the cached token state
    Status,
    /// Forget stored credentials for a profile
    Logout,
}

#[derive(Args, Debug)]
struct UrlArgs {
    /// Redirect URI registered for the OAuth app
    #[arg(long, default_value = DEFAULT_REDIRECT_URI)]
    redirect_uri: String,
    /// Open the URL in the system browser
    #[arg(long)]
    open: bool,
}

#[derive(Args, Debug)]
struct LoginArgs {
    /// Authorization code or the full redirect URL; prompted for when omitted
    #[arg(long)]
    code: Option<String>,
    /// Redirect URI registered for the OAuth app
    #[arg(long, default_value = DEFAULT_REDIRECT_URI)]
    redirect_uri: String,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Show the current authenticated user
    Me,
}

#[derive(Subcommand, Debug)]
enum ProjectCommand {
    /// List accessible projects
    List,
    /// View a single project by OID
    View { oid: String },
    /// Update project fields
    Update(ProjectUpdateArgs),
}

#[derive(Args, Debug)]
struct ProjectUpdateArgs {
    oid: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    archived: Option<bool>,
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    /// List tasks in a project
    List(TaskListArgs),
    /// View a single task by OID
    View { oid: String },
    /// Create a new task
    Create(TaskCreateArgs),
    /// Update task fields
    Update(TaskUpdateArgs),
    /// Mark a task as done, optionally leaving a comment
    Done(TaskDoneArgs),
    /// Delete a task
    Delete { oid: String },
}

#[derive(Args, Debug)]
struct TaskListArgs {
    /// Project OID
    #[arg(env = "QUIRE_DEFAULT_PROJECT")]
    project: String,
    /// Filter by status code
    #[arg(long)]
    status: Option<i64>,
    /// Filter by assignee OID
    #[arg(long)]
    assignee: Option<String>,
}

#[derive(Args, Debug)]
struct TaskCreateArgs {
    /// Task name
    name: String,
    /// Project OID
    #[arg(long, env = "QUIRE_DEFAULT_PROJECT")]
    project: String,
    #[arg(long)]
    description: Option<String>,
    /// Assignee user OID
    #[arg(long)]
    assignee: Option<String>,
    #[arg(long)]
    status: Option<i64>,
    #[arg(long)]
    priority: Option<i64>,
    /// Start date (ISO 8601)
    #[arg(long)]
    start: Option<String>,
    /// Due date (ISO 8601)
    #[arg(long)]
    due: Option<String>,
    /// Tag name (repeatable)
    #[arg(long = "tag")]
    tags: Vec<String>,
}

#[derive(Args, Debug)]
struct TaskUpdateArgs {
    oid: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    status: Option<i64>,
    #[arg(long)]
    priority: Option<i64>,
    #[arg(long)]
    start: Option<String>,
    #[arg(long)]
    due: Option<String>,
    #[arg(long)]
    assignee: Option<String>,
}

#[derive(Args, Debug)]
struct TaskDoneArgs {
    oid: String,
    /// Comment to add after completing
    #[arg(long, short)]
    comment: Option<String>,
}

#[derive(Subcommand, Debug)]
enum CommentCommand {
    /// List comments on a task
    List { task: String },
    /// Add a comment to a task
    Add { task: String, content: String },
    /// Replace a comment's content
    Update { oid: String, content: String },
    /// Delete a comment
    Delete { oid: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match &cli.command {
        Commands::Auth(cmd) => match cmd {
            AuthCommand::Url(args) => auth_url(&cli, args)?,
            AuthCommand::Login(args) => auth_login(&cli, args).await?,
            AuthCommand::Refresh => auth_refresh(&cli).await?,
            AuthCommand::Status => auth_status(&cli).await?,
            AuthCommand::Logout => auth_logout(&cli).await?,
        },
        Commands::User(UserCommand::Me) => user_me(&cli).await?,
        Commands::Project(cmd) => project_command(&cli, cmd).await?,
        Commands::Task(cmd) => task_command(&cli, cmd).await?,
        Commands::Comment(cmd) => comment_command(&cli, cmd).await?,
    }
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .init();
}

fn build_manager(cli: &Cli, settings: &Settings) -> Result<Arc<CredentialManager>> {
    tracing::debug!(profile = %cli.profile, "loading credentials");
    let credential = settings
        .credential()
        .context("missing Quire OAuth client configuration")?;
    let store = FileCredentialStore::with_default_locator()
        .context("unable to initialise credential store")?;
    let manager = CredentialManager::new(credential)
        .context("failed to build OAuth client")?
        .with_store(store, cli.profile.as_str())
        .context("failed to load stored credentials")?;
    Ok(Arc::new(manager))
}

fn build_client(cli: &Cli) -> Result<QuireClient> {
    let settings = Settings::from_env();
    let manager = build_manager(cli, &settings)?;
    QuireClient::with_base_url(manager, settings.api_base()).context("failed to build API client")
}

fn auth_url(cli: &Cli, args: &UrlArgs) -> Result<()> {
    let manager = build_manager(cli, &Settings::from_env())?;
    let url = manager.build_authorization_url(&args.redirect_uri);
    println!("{url}");
    if args.open {
        open::that(url.as_str()).context("failed to launch system browser")?;
    }
    Ok(())
}

async fn auth_login(cli: &Cli, args: &LoginArgs) -> Result<()> {
    let manager = build_manager(cli, &Settings::from_env())?;
    let response = match &args.code {
        Some(input) => {
            let code = parse_authorization_input(input.trim())?;
            manager.exchange(&code).await
        }
        None => {
            run_manual_flow(
                &manager,
                &args.redirect_uri,
                print_authorization_url,
                prompt_for_code,
            )
            .await
        }
    }
    .context("authorization code exchange failed")?;

    println!(
        "Login succeeded. Credentials stored for profile '{}'.",
        cli.profile
    );
    print_token_summary(&response);
    Ok(())
}

async fn auth_refresh(cli: &Cli) -> Result<()> {
    let manager = build_manager(cli, &Settings::from_env())?;
    let response = manager.refresh().await.context("token refresh failed")?;
    println!("Access token refreshed.");
    print_token_summary(&response);
    Ok(())
}

async fn auth_status(cli: &Cli) -> Result<()> {
    let manager = build_manager(cli, &Settings::from_env())?;
    let state = manager.snapshot().await;
    if cli.json {
        let summary = serde_json::json!({
            "client_id": manager.client_id(),
            "has_refresh_token": state.refresh_token.is_some(),
            "has_access_token": state.access_token.is_some(),
            "expires_at": state.expires_at,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    println!("Client ID     : {}", manager.client_id());
    println!("Refresh token : {}", present(state.refresh_token.is_some()));
    println!("Access token  : {}", present(state.access_token.is_some()));
    if let Some(expires_at) = state.expires_at {
        println!("Refresh after : {} (UTC)", expires_at);
    }
    Ok(())
}

async fn auth_logout(cli: &Cli) -> Result<()> {
    let manager = build_manager(cli, &Settings::from_env())?;
    manager
        .forget()
        .await
        .context("failed to remove stored credentials")?;
    println!("Deleted credentials for profile '{}'.", cli.profile);
    Ok(())
}

fn present(flag: bool) -> &'static str {
    if flag {
        "present"
    } else {
        "missing"
    }
}

fn print_token_summary(response: &TokenResponse) {
    match response.expires_in {
        Some(seconds) => println!("Access token valid for {seconds} seconds."),
        None => println!("Token endpoint did not report an expiry."),
    }
    if response.refresh_token.is_some() {
        println!("A new refresh token was issued and stored.");
    }
}

async fn prompt_for_code() -> Result<String, AuthError> {
    task::spawn_blocking(|| {
        use std::io::Write;
        print!("Paste the authorization code or redirect URL: ");
        io::stdout().flush().map_err(AuthError::Io)?;
        let mut input = String::new();
        io::stdin().read_line(&mut input).map_err(AuthError::Io)?;
        Ok::<_, AuthError>(input.trim().to_owned())
    })
    .await
    .map_err(|err| AuthError::Io(io::Error::other(err)))?
}

fn print_authorization_url(url: &Url) -> Result<(), AuthError> {
    println!("\nAuthorize the application by visiting:\n  {}\n", url);
    Ok(())
}

async fn user_me(cli: &Cli) -> Result<()> {
    let client = build_client(cli)?;
    let user = UserService::new(client)
        .me()
        .await
        .context("API request failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        render_user(&user);
    }
    Ok(())
}

async fn project_command(cli: &Cli, cmd: &ProjectCommand) -> Result<()> {
    let service = ProjectService::new(build_client(cli)?);
    match cmd {
        ProjectCommand::List => {
            let projects = service.list().await.context("API request failed")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&projects)?);
            } else {
                render_project_list(&projects);
            }
        }
        ProjectCommand::View { oid } => {
            let project = service.get(oid).await.context("API request failed")?;
            emit_project(cli, &project)?;
        }
        ProjectCommand::Update(args) => {
            let input = ProjectUpdateInput {
                name: args.name.clone(),
                description: args.description.clone(),
                archived: args.archived,
            };
            if input.name.is_none() && input.description.is_none() && input.archived.is_none() {
                bail!("nothing to update; pass at least one field");
            }
            let project = service
                .update(&args.oid, &input)
                .await
                .context("API request failed")?;
            emit_project(cli, &project)?;
        }
    }
    Ok(())
}

async fn task_command(cli: &Cli, cmd: &TaskCommand) -> Result<()> {
    let client = build_client(cli)?;
    let service = TaskService::new(client.clone());
    match cmd {
        TaskCommand::List(args) => {
            let options = TaskQueryOptions {
                status: args.status,
                assignee: args.assignee.clone(),
            };
            let tasks = service
                .list(&args.project, options)
                .await
                .context("API request failed")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else {
                render_task_list(&tasks);
            }
        }
        TaskCommand::View { oid } => {
            let task = service.get(oid).await.context("API request failed")?;
            emit_task(cli, &task)?;
        }
        TaskCommand::Create(args) => {
            let input = TaskCreateInput {
                name: args.name.clone(),
                description: args.description.clone(),
                assignee: args.assignee.clone(),
                status: args.status,
                priority: args.priority,
                start: args.start.clone(),
                due: args.due.clone(),
                tags: args.tags.clone(),
            };
            let task = service
                .create(&args.project, &input)
                .await
                .context("API request failed")?;
            emit_task(cli, &task)?;
        }
        TaskCommand::Update(args) => {
            let input = TaskUpdateInput {
                name: args.name.clone(),
                description: args.description.clone(),
                status: args.status,
                priority: args.priority,
                start: args.start.clone(),
                due: args.due.clone(),
                assignee: args.assignee.clone(),
            };
            if input.is_empty() {
                bail!("nothing to update; pass at least one field");
            }
            let task = service
                .update(&args.oid, &input)
                .await
                .context("API request failed")?;
            emit_task(cli, &task)?;
        }
        TaskCommand::Done(args) => {
            let task = service
                .complete(&args.oid)
                .await
                .context("API request failed")?;
            if let Some(comment) = &args.comment {
                CommentService::new(client)
                    .add(&args.oid, comment)
                    .await
                    .context("failed to add completion comment")?;
            }
            emit_task(cli, &task)?;
        }
        TaskCommand::Delete { oid } => {
            service.delete(oid).await.context("API request failed")?;
            println!("Deleted task {oid}.");
        }
    }
    Ok(())
}

async fn comment_command(cli: &Cli, cmd: &CommentCommand) -> Result<()> {
    let service = CommentService::new(build_client(cli)?);
    match cmd {
        CommentCommand::List { task } => {
            let comments = service.list(task).await.context("API request failed")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&comments)?);
            } else {
                for comment in &comments {
                    render_comment(comment);
                }
            }
        }
        CommentCommand::Add { task, content } => {
            let comment = service
                .add(task, content)
                .await
                .context("API request failed")?;
            emit_comment(cli, &comment)?;
        }
        CommentCommand::Update { oid, content } => {
            let comment = service
                .update(oid, content)
                .await
                .context("API request failed")?;
            emit_comment(cli, &comment)?;
        }
        CommentCommand::Delete { oid } => {
            service.delete(oid).await.context("API request failed")?;
            println!("Deleted comment {oid}.");
        }
    }
    Ok(())
}

fn emit_project(cli: &Cli, project: &Project) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(project)?);
    } else {
        println!("[{}] {}", project.oid, project.name);
        if let Some(description) = &project.description {
            println!("{description}");
        }
    }
    Ok(())
}

fn emit_task(cli: &Cli, task: &Task) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(task)?);
    } else {
        render_task(task);
    }
    Ok(())
}

fn emit_comment(cli: &Cli, comment: &Comment) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(comment)?);
    } else {
        render_comment(comment);
    }
    Ok(())
}

fn render_user(user: &User) {
    println!("User OID : {}", user.oid);
    println!("ID       : {}", user.id);
    println!("Name     : {}", user.name);
    if let Some(email) = &user.email {
        println!("Email    : {}", email);
    }
}

fn render_project_list(projects: &[Project]) {
    if projects.is_empty() {
        println!("No projects found.");
        return;
    }
    for project in projects {
        let archived = if project.archived { " (archived)" } else { "" };
        println!("{:<24} {}{}", project.oid, project.name, archived);
    }
}

fn render_task_list(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }
    let (done, pending): (Vec<&Task>, Vec<&Task>) = tasks.iter().partition(|t| t.is_completed());
    if !pending.is_empty() {
        println!("Pending ({}):", pending.len());
        for task in pending {
            println!("  {:<24} {}", task.oid, task.name);
        }
    }
    if !done.is_empty() {
        println!("Completed ({}):", done.len());
        for task in done {
            println!("  {:<24} {}", task.oid, task.name);
        }
    }
}

fn render_task(task: &Task) {
    let marker = if task.is_completed() { "x" } else { " " };
    println!("[{marker}] [{}] {}", task.oid, task.name);
    if let Some(status) = task.status {
        println!("Status   : {status}");
    }
    if let Some(priority) = task.priority {
        println!("Priority : {priority}");
    }
    if let Some(due) = &task.due {
        println!("Due      : {due}");
    }
    if !task.assignees.is_empty() {
        let names: Vec<&str> = task.assignees.iter().map(|u| u.name.as_str()).collect();
        println!("Assignees: {}", names.join(", "));
    }
    if let Some(description) = &task.description {
        println!();
        println!("{description}");
    }
}

fn render_comment(comment: &Comment) {
    let author = if comment.user.name.is_empty() {
        "unknown"
    } else {
        comment.user.name.as_str()
    };
    println!("[{}] {} ({})", comment.oid, author, comment.created_at);
    println!("  {}", comment.content);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "quire", "task", "done", "t-1", "--comment", "shipped", "--json", "--profile", "work",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.profile, "work");
        match cli.command {
            Commands::Task(TaskCommand::Done(args)) => {
                assert_eq!(args.oid, "t-1");
                assert_eq!(args.comment.as_deref(), Some("shipped"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn login_accepts_pasted_code() {
        let cli = Cli::try_parse_from(["quire", "auth", "login", "--code", "abc"]).unwrap();
        match cli.command {
            Commands::Auth(AuthCommand::Login(args)) => {
                assert_eq!(args.code.as_deref(), Some("abc"));
                assert_eq!(args.redirect_uri, DEFAULT_REDIRECT_URI);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
