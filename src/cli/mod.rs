use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use clap::{Args, Subcommand};
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::{
    board::{BoardActions, BoardColumns, BoardEvent, BoardManager, spawn_board_poller},
    projects::{AssignedTask, ProjectDirectory, TaskFilter},
    settings::Settings,
    store::{
        HttpTaskStore, STORE_CONNECT_FAILED, STORE_CONTRACT_PARSE_ERROR, STORE_HTTP_ERROR,
        STORE_NOT_FOUND, STORE_REQUEST_FAILED, STORE_TIMEOUT, STORE_VALIDATION_ERROR, StoreError,
    },
    types::{Project, Task, TaskStatus, UserRef},
};

const SCHEMA_VERSION: &str = "cli.v1";

#[derive(Debug, Clone, Subcommand)]
pub enum RootCommand {
    Board {
        #[command(subcommand)]
        command: BoardCommand,
    },
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum BoardCommand {
    Show,
    Watch(BoardWatchArgs),
}

#[derive(Debug, Clone, Subcommand)]
pub enum TaskCommand {
    Create(TaskCreateArgs),
    Update(TaskUpdateArgs),
    Move(TaskMoveArgs),
    Delete(TaskDeleteArgs),
}

#[derive(Debug, Clone, Subcommand)]
pub enum ProjectCommand {
    List,
    Join(ProjectIdArgs),
    Leave(ProjectIdArgs),
    Members,
    Assigned(ProjectAssignedArgs),
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigCommand {
    /// Prints the effective settings, flags and environment included.
    Show,
    /// Persists values to settings.toml.
    Set(ConfigSetArgs),
}

#[derive(Debug, Clone, Args)]
pub struct BoardWatchArgs {
    /// Overrides `poll_interval_ms` from settings.
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Args)]
pub struct TaskCreateArgs {
    #[arg(long, value_name = "TEXT")]
    pub title: String,

    #[arg(long, value_name = "TEXT")]
    pub description: Option<String>,

    #[arg(long, value_name = "STATUS", default_value = "todo")]
    pub status: TaskStatus,

    #[arg(long, value_name = "USER_ID")]
    pub assignee: Option<i64>,
}

#[derive(Debug, Clone, Args)]
pub struct TaskUpdateArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub id: i64,

    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,

    #[arg(long, value_name = "TEXT")]
    pub description: Option<String>,

    #[arg(long, value_name = "STATUS")]
    pub status: Option<TaskStatus>,

    #[arg(long, value_name = "USER_ID", conflicts_with = "unassign")]
    pub assignee: Option<i64>,

    #[arg(long)]
    pub unassign: bool,
}

#[derive(Debug, Clone, Args)]
pub struct TaskMoveArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub id: i64,

    #[arg(long, value_name = "STATUS")]
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Args)]
pub struct TaskDeleteArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub id: i64,
}

#[derive(Debug, Clone, Args)]
pub struct ProjectIdArgs {
    #[arg(long, value_name = "PROJECT_ID")]
    pub id: i64,
}

#[derive(Debug, Clone, Args)]
pub struct ProjectAssignedArgs {
    /// Only tasks of these projects (by name); repeatable.
    #[arg(long = "name", value_name = "PROJECT")]
    pub names: Vec<String>,

    /// Only tasks in these statuses; repeatable.
    #[arg(long = "status", value_name = "STATUS")]
    pub statuses: Vec<TaskStatus>,
}

#[derive(Debug, Clone, Args)]
pub struct ConfigSetArgs {
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    #[arg(long, value_name = "USER_ID")]
    pub user_id: Option<i64>,

    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    #[arg(long, value_name = "MS")]
    pub request_timeout_ms: Option<u64>,
}

/// Everything a command needs besides its own arguments.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub settings: Settings,
    pub project_id: Option<i64>,
    pub user_id: Option<i64>,
    pub json_output: bool,
    pub quiet: bool,
}

impl CliContext {
    fn current_user(&self) -> Option<UserRef> {
        self.user_id.map(UserRef::new)
    }
}

pub async fn run(context: &CliContext, command: RootCommand) -> i32 {
    match execute(context, command).await {
        Ok(output) => {
            print_success(output, context.json_output, context.quiet);
            0
        }
        Err(err) => {
            print_error(&err, context.json_output);
            err.exit_code
        }
    }
}

#[derive(Debug)]
struct CommandOutput {
    command: &'static str,
    project: Option<i64>,
    data: Value,
    text: String,
}

#[derive(Debug)]
struct CliError {
    exit_code: i32,
    code: &'static str,
    message: String,
    details: Option<Value>,
}

type CliResult<T> = Result<T, CliError>;

async fn execute(context: &CliContext, command: RootCommand) -> CliResult<CommandOutput> {
    match command {
        RootCommand::Board { command } => {
            execute_board_command(context, connect(context)?, command).await
        }
        RootCommand::Task { command } => {
            execute_task_command(context, connect(context)?, command).await
        }
        RootCommand::Project { command } => {
            execute_project_command(context, connect(context)?, command).await
        }
        RootCommand::Config { command } => execute_config_command(context, command),
    }
}

fn connect(context: &CliContext) -> CliResult<HttpTaskStore> {
    HttpTaskStore::new(context.settings.store_config()).map_err(store_error)
}

async fn execute_board_command(
    context: &CliContext,
    store: HttpTaskStore,
    command: BoardCommand,
) -> CliResult<CommandOutput> {
    match command {
        BoardCommand::Show => board_show(context, store).await,
        BoardCommand::Watch(args) => board_watch(context, store, args).await,
    }
}

async fn execute_task_command(
    context: &CliContext,
    store: HttpTaskStore,
    command: TaskCommand,
) -> CliResult<CommandOutput> {
    match command {
        TaskCommand::Create(args) => task_create(context, store, args).await,
        TaskCommand::Update(args) => task_update(context, store, args).await,
        TaskCommand::Move(args) => task_move(context, store, args).await,
        TaskCommand::Delete(args) => task_delete(context, store, args).await,
    }
}

async fn execute_project_command(
    context: &CliContext,
    store: HttpTaskStore,
    command: ProjectCommand,
) -> CliResult<CommandOutput> {
    let user_id = require_user(context)?;
    let mut directory = ProjectDirectory::load(store, user_id)
        .await
        .map_err(store_error)?;

    match command {
        ProjectCommand::List => Ok(project_list(context, &directory)),
        ProjectCommand::Join(args) => project_join(context, &mut directory, args.id).await,
        ProjectCommand::Leave(args) => project_leave(context, &mut directory, args.id).await,
        ProjectCommand::Members => Ok(project_members(context, &directory)),
        ProjectCommand::Assigned(args) => Ok(project_assigned(context, &directory, args)),
    }
}

fn execute_config_command(
    context: &CliContext,
    command: ConfigCommand,
) -> CliResult<CommandOutput> {
    match command {
        ConfigCommand::Show => Ok(config_show(context)),
        ConfigCommand::Set(args) => {
            let path = Settings::config_path()
                .ok_or_else(|| runtime_error("unable to determine the settings path"))?;
            config_set_at(&path, args)
        }
    }
}

fn config_show(context: &CliContext) -> CommandOutput {
    let settings = &context.settings;
    let path = Settings::config_path().map(|path| path.display().to_string());
    let rows = vec![
        vec!["api_url".to_string(), settings.api_url.clone()],
        vec![
            "poll_interval_ms".to_string(),
            settings.poll_interval_ms.to_string(),
        ],
        vec![
            "request_timeout_ms".to_string(),
            settings.request_timeout_ms.to_string(),
        ],
        vec![
            "user_id".to_string(),
            context
                .user_id
                .map(|user_id| user_id.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ],
        vec!["path".to_string(), path.clone().unwrap_or_else(|| "-".to_string())],
    ];

    CommandOutput {
        command: "config.show",
        project: context.project_id,
        data: json!({
            "path": path,
            "settings": settings,
            "user_id": context.user_id,
        }),
        text: render_text_table(&["Key", "Value"], &rows),
    }
}

fn config_set_at(path: &Path, args: ConfigSetArgs) -> CliResult<CommandOutput> {
    let nothing_to_set = args.url.is_none()
        && args.user_id.is_none()
        && args.poll_interval_ms.is_none()
        && args.request_timeout_ms.is_none();
    if nothing_to_set {
        return Err(usage_error(
            "NOTHING_TO_SET",
            "pass at least one of --url, --user-id, --poll-interval-ms, --request-timeout-ms",
        ));
    }

    let mut settings = Settings::load_from_path(path);
    if let Some(url) = args.url {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(usage_error(
                "INVALID_API_URL",
                format!("api url must start with http:// or https://, got '{url}'"),
            ));
        }
        settings.api_url = url.to_string();
    }
    match args.user_id {
        Some(user_id) if user_id <= 0 => {
            return Err(usage_error(
                "INVALID_USER",
                format!("user id must be a positive integer, got {user_id}"),
            ));
        }
        Some(user_id) => settings.user_id = Some(user_id),
        None => {}
    }
    if let Some(interval_ms) = args.poll_interval_ms {
        settings.poll_interval_ms = interval_ms;
    }
    if let Some(timeout_ms) = args.request_timeout_ms {
        settings.request_timeout_ms = timeout_ms;
    }
    settings.validate();

    settings
        .save_to_path(path)
        .map_err(|err| runtime_error(format_anyhow_error_chain(&err)))?;
    info!(path = %path.display(), "settings saved");

    Ok(CommandOutput {
        command: "config.set",
        project: None,
        data: json!({
            "path": path.display().to_string(),
            "settings": settings,
        }),
        text: format!("saved settings to {}", path.display()),
    })
}

fn require_project(context: &CliContext) -> CliResult<i64> {
    match context.project_id {
        None => Err(usage_error(
            "PROJECT_REQUIRED",
            "--project is required for board and task commands",
        )),
        Some(project_id) if project_id <= 0 => Err(usage_error(
            "INVALID_PROJECT",
            format!("project id must be a positive integer, got {project_id}"),
        )),
        Some(project_id) => Ok(project_id),
    }
}

fn require_user(context: &CliContext) -> CliResult<i64> {
    match context.user_id {
        None => Err(usage_error(
            "USER_REQUIRED",
            "--user (or user_id in settings.toml) is required for project commands",
        )),
        Some(user_id) if user_id <= 0 => Err(usage_error(
            "INVALID_USER",
            format!("user id must be a positive integer, got {user_id}"),
        )),
        Some(user_id) => Ok(user_id),
    }
}

/// The backend needs a user on every new task: the assignee, else the acting user.
fn require_task_owner(context: &CliContext, assignee: Option<i64>) -> CliResult<i64> {
    match assignee.or(context.user_id) {
        None => Err(usage_error(
            "USER_REQUIRED",
            "task create needs --assignee or --user (or user_id in settings.toml)",
        )),
        Some(user_id) if user_id <= 0 => Err(usage_error(
            "INVALID_USER",
            format!("user id must be a positive integer, got {user_id}"),
        )),
        Some(user_id) => Ok(user_id),
    }
}

fn watch_interval(settings: &Settings, args: &BoardWatchArgs) -> Duration {
    match args.interval_ms {
        Some(interval_ms) => Duration::from_millis(Settings::clamp_poll_interval_ms(interval_ms)),
        None => settings.poll_interval(),
    }
}

async fn load_board(
    context: &CliContext,
    store: HttpTaskStore,
) -> CliResult<BoardManager<HttpTaskStore>> {
    let project_id = require_project(context)?;
    BoardManager::load(store, project_id, context.current_user())
        .await
        .map_err(store_error)
}

async fn board_show(context: &CliContext, store: HttpTaskStore) -> CliResult<CommandOutput> {
    let manager = load_board(context, store).await?;
    let view = manager.view();

    Ok(CommandOutput {
        command: "board.show",
        project: Some(view.project_id),
        data: board_json(&view.columns),
        text: render_board_text(&view.columns),
    })
}

async fn board_watch(
    context: &CliContext,
    store: HttpTaskStore,
    args: BoardWatchArgs,
) -> CliResult<CommandOutput> {
    let project_id = require_project(context)?;
    let interval = watch_interval(&context.settings, &args);

    let manager = Arc::new(BoardManager::new(store, project_id, context.current_user()));
    let mut events = manager.subscribe();
    let stop = Arc::new(AtomicBool::new(false));
    let poller = spawn_board_poller(Arc::clone(&manager), interval, Arc::clone(&stop));
    info!(
        project_id,
        interval_ms = interval.as_millis() as u64,
        "watching board"
    );

    let mut refreshes = 0usize;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let outcome = loop {
        tokio::select! {
            signal = &mut shutdown => break signal.context("failed to listen for ctrl-c"),
            event = events.recv() => match event {
                Ok(event) => {
                    if matches!(event, BoardEvent::Refreshed { .. }) {
                        refreshes += 1;
                    }
                    print_watch_event(context, &manager.columns(), &event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "board watcher fell behind; skipping events");
                }
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    stop.store(true, Ordering::Relaxed);
    manager.request_refresh();
    if let Err(err) = poller.await {
        warn!(error = %err, "board poller ended abnormally");
    }
    outcome.map_err(|err| runtime_error(format_anyhow_error_chain(&err)))?;

    Ok(CommandOutput {
        command: "board.watch",
        project: Some(project_id),
        data: json!({
            "refreshes": refreshes,
            "board": board_json(&manager.columns()),
        }),
        text: format!("stopped watching after {refreshes} refreshes"),
    })
}

fn print_watch_event(context: &CliContext, columns: &BoardColumns, event: &BoardEvent) {
    if context.json_output {
        println!("{}", watch_event_json(columns, event));
        return;
    }
    if context.quiet {
        return;
    }

    let stamp = Local::now().format("%H:%M:%S");
    match event {
        BoardEvent::Refreshed { .. } => println!("[{stamp}] {}", render_board_summary(columns)),
        BoardEvent::RefreshFailed { detail } => eprintln!("[{stamp}] refresh failed: {detail}"),
        BoardEvent::Error(err) => eprintln!("[{stamp}] {}: {}", err.title, err.detail),
        BoardEvent::Changed => {}
    }
}

fn watch_event_json(columns: &BoardColumns, event: &BoardEvent) -> Value {
    match event {
        BoardEvent::Refreshed { task_count } => json!({
            "event": "refreshed",
            "task_count": task_count,
            "counts": column_counts_json(columns),
        }),
        BoardEvent::Changed => json!({
            "event": "changed",
            "counts": column_counts_json(columns),
        }),
        BoardEvent::RefreshFailed { detail } => json!({
            "event": "refresh_failed",
            "detail": detail,
        }),
        BoardEvent::Error(err) => json!({
            "event": "error",
            "title": err.title,
            "detail": err.detail,
        }),
    }
}

async fn task_create(
    context: &CliContext,
    store: HttpTaskStore,
    args: TaskCreateArgs,
) -> CliResult<CommandOutput> {
    let project_id = require_project(context)?;
    let title = args.title.trim();
    if title.is_empty() {
        return Err(usage_error("TITLE_REQUIRED", "title cannot be empty"));
    }
    require_task_owner(context, args.assignee)?;

    let manager = BoardManager::new(store, project_id, context.current_user());
    manager.open_new_task(args.status);
    let mut draft = manager
        .view()
        .selected
        .ok_or_else(|| runtime_error("task dialog did not open"))?;
    draft.title = title.to_string();
    draft.description = args.description.unwrap_or_default();
    draft.assigned_user = args.assignee.map(UserRef::new);

    submit_save(&manager, draft.clone()).await?;

    // Without an id in the response the board only learns about the task on
    // its next refresh.
    let created = manager.columns().iter().next().cloned();
    let text = match &created {
        Some(task) => format!("created task {} in {}", task.id, task.status.label()),
        None => format!("created task '{}' in {}", draft.title, draft.status.label()),
    };

    Ok(CommandOutput {
        command: "task.create",
        project: Some(project_id),
        data: task_json(created.as_ref().unwrap_or(&draft)),
        text,
    })
}

async fn task_update(
    context: &CliContext,
    store: HttpTaskStore,
    args: TaskUpdateArgs,
) -> CliResult<CommandOutput> {
    let nothing_to_update = args.title.is_none()
        && args.description.is_none()
        && args.status.is_none()
        && args.assignee.is_none()
        && !args.unassign;
    if nothing_to_update {
        return Err(usage_error(
            "NOTHING_TO_UPDATE",
            "pass at least one of --title, --description, --status, --assignee, --unassign",
        ));
    }

    let manager = load_board(context, store).await?;
    let task = find_task(&manager, args.id)?;
    manager.open_task(task.clone());

    let mut edited = task;
    if let Some(title) = args.title {
        let title = title.trim();
        if title.is_empty() {
            manager.close_modal();
            return Err(usage_error("TITLE_REQUIRED", "title cannot be empty"));
        }
        edited.title = title.to_string();
    }
    if let Some(description) = args.description {
        edited.description = description;
    }
    if let Some(status) = args.status {
        edited.status = status;
    }
    if let Some(assignee) = args.assignee {
        edited.assigned_user = Some(UserRef::new(assignee));
    }
    if args.unassign {
        edited.assigned_user = None;
    }

    submit_save(&manager, edited.clone()).await?;
    let updated = manager.columns().get(args.id).cloned().unwrap_or(edited);

    Ok(CommandOutput {
        command: "task.update",
        project: Some(manager.project_id()),
        text: format!("updated task {}", updated.id),
        data: task_json(&updated),
    })
}

async fn task_move(
    context: &CliContext,
    store: HttpTaskStore,
    args: TaskMoveArgs,
) -> CliResult<CommandOutput> {
    let manager = load_board(context, store).await?;
    let task = find_task(&manager, args.id)?;
    let source = task.status;

    if source == args.status {
        return Ok(CommandOutput {
            command: "task.move",
            project: Some(manager.project_id()),
            data: json!({ "moved": false, "task": task_json(&task) }),
            text: format!("task {} is already in {}", task.id, source.label()),
        });
    }

    manager.begin_drag(task, source);
    manager
        .drop_dragged(args.status)
        .await
        .map_err(store_error)?;

    let moved = find_task(&manager, args.id)?;
    Ok(CommandOutput {
        command: "task.move",
        project: Some(manager.project_id()),
        data: json!({
            "moved": true,
            "from": source,
            "task": task_json(&moved),
        }),
        text: format!(
            "moved task {} from {} to {}",
            moved.id,
            source.label(),
            moved.status.label()
        ),
    })
}

async fn task_delete(
    context: &CliContext,
    store: HttpTaskStore,
    args: TaskDeleteArgs,
) -> CliResult<CommandOutput> {
    let project_id = require_project(context)?;
    if args.id <= 0 {
        return Err(usage_error(
            "INVALID_TASK_ID",
            format!("task id must be a positive integer, got {}", args.id),
        ));
    }

    let manager = BoardManager::new(store, project_id, context.current_user());
    submit_delete(&manager, args.id).await?;

    Ok(CommandOutput {
        command: "task.delete",
        project: Some(project_id),
        data: json!({ "id": args.id, "deleted": true }),
        text: format!("deleted task {}", args.id),
    })
}

async fn submit_save(actions: &impl BoardActions, task: Task) -> CliResult<()> {
    actions.save_task(task).await.map_err(store_error)
}

async fn submit_delete(actions: &impl BoardActions, task_id: i64) -> CliResult<()> {
    actions.delete_task(task_id).await.map_err(store_error)
}

fn find_task(manager: &BoardManager<HttpTaskStore>, task_id: i64) -> CliResult<Task> {
    manager.columns().get(task_id).cloned().ok_or_else(|| {
        not_found_error(
            "TASK_NOT_FOUND",
            format!(
                "task {task_id} not found on project {}",
                manager.project_id()
            ),
        )
    })
}

fn project_list(
    context: &CliContext,
    directory: &ProjectDirectory<HttpTaskStore>,
) -> CommandOutput {
    let member = directory.member_projects();
    let other = directory.other_projects();

    CommandOutput {
        command: "project.list",
        project: context.project_id,
        data: json!({
            "user_id": directory.user_id(),
            "member": member.iter().map(project_json).collect::<Vec<_>>(),
            "other": other.iter().map(project_json).collect::<Vec<_>>(),
        }),
        text: render_project_list_text(member, other),
    }
}

async fn project_join(
    context: &CliContext,
    directory: &mut ProjectDirectory<HttpTaskStore>,
    project_id: i64,
) -> CliResult<CommandOutput> {
    directory.join(project_id).await.map_err(store_error)?;
    Ok(project_membership_output(
        context, directory, project_id, "project.join", true,
    ))
}

async fn project_leave(
    context: &CliContext,
    directory: &mut ProjectDirectory<HttpTaskStore>,
    project_id: i64,
) -> CliResult<CommandOutput> {
    directory.leave(project_id).await.map_err(store_error)?;
    Ok(project_membership_output(
        context,
        directory,
        project_id,
        "project.leave",
        false,
    ))
}

fn project_membership_output(
    context: &CliContext,
    directory: &ProjectDirectory<HttpTaskStore>,
    project_id: i64,
    command: &'static str,
    joined: bool,
) -> CommandOutput {
    let name = directory
        .find(project_id)
        .map(|project| project.name.clone())
        .unwrap_or_else(|| format!("#{project_id}"));
    let verb = if joined { "joined" } else { "left" };

    CommandOutput {
        command,
        project: context.project_id,
        data: json!({
            "project_id": project_id,
            "user_id": directory.user_id(),
            "member": joined,
        }),
        text: format!("{verb} project {name}"),
    }
}

fn project_members(
    context: &CliContext,
    directory: &ProjectDirectory<HttpTaskStore>,
) -> CommandOutput {
    let colleagues = directory.colleagues();
    let rows = colleagues
        .iter()
        .map(|user| vec![user.id.to_string(), user.display_name()])
        .collect::<Vec<_>>();

    CommandOutput {
        command: "project.members",
        project: context.project_id,
        data: json!({ "colleagues": colleagues }),
        text: if rows.is_empty() {
            "no colleagues yet".to_string()
        } else {
            render_text_table(&["ID", "User"], &rows)
        },
    }
}

fn project_assigned(
    context: &CliContext,
    directory: &ProjectDirectory<HttpTaskStore>,
    args: ProjectAssignedArgs,
) -> CommandOutput {
    let filter = TaskFilter {
        projects: args.names,
        statuses: args.statuses,
    };
    let tasks = directory.assigned_tasks(&filter);

    CommandOutput {
        command: "project.assigned",
        project: context.project_id,
        data: json!({ "tasks": tasks }),
        text: render_assigned_text(&tasks),
    }
}

fn board_json(columns: &BoardColumns) -> Value {
    json!({
        "total": columns.len(),
        "counts": column_counts_json(columns),
        "columns": columns,
    })
}

fn column_counts_json(columns: &BoardColumns) -> Value {
    let mut counts = serde_json::Map::new();
    for status in TaskStatus::ALL {
        counts.insert(
            status.as_str().to_string(),
            json!(columns.bucket(status).len()),
        );
    }
    Value::Object(counts)
}

fn task_json(task: &Task) -> Value {
    json!({
        "id": task.id,
        "project_id": task.project_id,
        "title": task.title,
        "description": task.description,
        "status": task.status,
        "assigned_user": task.assigned_user,
        "created_by": task.created_by,
        "created_date": task.created_date,
        "modified_date": task.modified_date,
    })
}

fn project_json(project: &Project) -> Value {
    json!({
        "id": project.id,
        "name": project.name,
        "description": project.description,
        "member_count": project.users.len(),
        "task_count": project.tasks.len(),
    })
}

fn render_board_summary(columns: &BoardColumns) -> String {
    TaskStatus::ALL
        .into_iter()
        .map(|status| format!("{}: {}", status.label(), columns.bucket(status).len()))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn render_board_text(columns: &BoardColumns) -> String {
    if columns.is_empty() {
        return format!("board is empty\n{}", render_board_summary(columns));
    }

    let headers = ["Status", "ID", "Title", "Assignee"];
    let rows = TaskStatus::ALL
        .into_iter()
        .flat_map(|status| {
            columns.bucket(status).iter().map(move |task| {
                vec![
                    status.label().to_string(),
                    task.id.to_string(),
                    task.title.replace('\n', " "),
                    task.assigned_user
                        .as_ref()
                        .map(UserRef::display_name)
                        .unwrap_or_else(|| "-".to_string()),
                ]
            })
        })
        .collect::<Vec<_>>();

    format!(
        "{}\n{}",
        render_text_table(&headers, &rows),
        render_board_summary(columns)
    )
}

fn render_project_list_text(member: &[Project], other: &[Project]) -> String {
    let headers = ["ID", "Name", "Members", "Tasks", "Joined"];
    let rows = member
        .iter()
        .map(|project| (project, true))
        .chain(other.iter().map(|project| (project, false)))
        .map(|(project, joined)| {
            vec![
                project.id.to_string(),
                project.name.clone(),
                project.users.len().to_string(),
                project.tasks.len().to_string(),
                if joined { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect::<Vec<_>>();

    if rows.is_empty() {
        return "no projects".to_string();
    }
    render_text_table(&headers, &rows)
}

fn render_assigned_text(tasks: &[AssignedTask]) -> String {
    if tasks.is_empty() {
        return "no assigned tasks".to_string();
    }

    let headers = ["Project", "ID", "Status", "Title"];
    let rows = tasks
        .iter()
        .map(|entry| {
            vec![
                entry.project_name.clone(),
                entry.task.id.to_string(),
                entry.task.status.label().to_string(),
                entry.task.title.replace('\n', " "),
            ]
        })
        .collect::<Vec<_>>();

    render_text_table(&headers, &rows)
}

fn render_text_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();

    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            let width = cell.chars().count();
            if width > widths[index] {
                widths[index] = width;
            }
        }
    }

    let border = format!(
        "+{}+",
        widths
            .iter()
            .map(|width| "-".repeat(*width + 2))
            .collect::<Vec<_>>()
            .join("+")
    );

    let render_row = |cells: Vec<&str>| {
        format!(
            "| {} |",
            cells
                .iter()
                .enumerate()
                .map(|(index, cell)| format!("{cell:<width$}", width = widths[index]))
                .collect::<Vec<_>>()
                .join(" | ")
        )
    };

    let mut lines = vec![border.clone(), render_row(headers.to_vec()), border.clone()];
    for row in rows {
        lines.push(render_row(row.iter().map(String::as_str).collect()));
    }
    lines.push(border);
    lines.join("\n")
}

fn usage_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError {
        exit_code: 2,
        code,
        message: message.into(),
        details: None,
    }
}

fn not_found_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError {
        exit_code: 3,
        code,
        message: message.into(),
        details: None,
    }
}

fn runtime_error(err: impl std::fmt::Display) -> CliError {
    CliError {
        exit_code: 5,
        code: "RUNTIME_ERROR",
        message: err.to_string(),
        details: None,
    }
}

fn store_error(err: StoreError) -> CliError {
    let code = match err.code.as_str() {
        STORE_VALIDATION_ERROR => STORE_VALIDATION_ERROR,
        STORE_NOT_FOUND => STORE_NOT_FOUND,
        STORE_CONNECT_FAILED => STORE_CONNECT_FAILED,
        STORE_TIMEOUT => STORE_TIMEOUT,
        STORE_REQUEST_FAILED => STORE_REQUEST_FAILED,
        STORE_HTTP_ERROR => STORE_HTTP_ERROR,
        STORE_CONTRACT_PARSE_ERROR => STORE_CONTRACT_PARSE_ERROR,
        _ => "STORE_ERROR",
    };
    let exit_code = match code {
        STORE_VALIDATION_ERROR => 2,
        STORE_NOT_FOUND => 3,
        _ => 5,
    };

    CliError {
        exit_code,
        code,
        message: err.message,
        details: None,
    }
}

fn print_success(output: CommandOutput, json_output: bool, quiet: bool) {
    if json_output {
        let payload = json!({
            "schema_version": SCHEMA_VERSION,
            "command": output.command,
            "project": output.project,
            "data": output.data
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(value) => println!("{value}"),
            Err(_) => println!("{}", payload),
        }
        return;
    }

    if quiet {
        return;
    }

    if output.text.is_empty() {
        println!("ok");
    } else {
        println!("{}", output.text);
    }
}

fn print_error(err: &CliError, json_output: bool) {
    error!(
        code = err.code,
        message = %err.message,
        details = ?err.details,
        "cli command failed"
    );

    if json_output {
        let payload = json!({
            "schema_version": SCHEMA_VERSION,
            "error": {
                "code": err.code,
                "message": err.message,
                "details": err.details
            }
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(value) => eprintln!("{value}"),
            Err(_) => eprintln!("{}", payload),
        }
        return;
    }

    eprintln!("error[{}]: {}", err.code, err.message);
}

fn format_anyhow_error_chain(err: &anyhow::Error) -> String {
    let mut seen = HashSet::new();
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        if !seen.insert(text.clone()) {
            continue;
        }
        parts.push(text);
    }

    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::group_tasks_by_status;

    fn context(project_id: Option<i64>, user_id: Option<i64>) -> CliContext {
        CliContext {
            settings: Settings::default(),
            project_id,
            user_id,
            json_output: false,
            quiet: true,
        }
    }

    fn task(id: i64, status: TaskStatus, title: &str) -> Task {
        Task {
            id,
            project_id: 1,
            title: title.to_string(),
            status,
            ..Task::default()
        }
    }

    #[test]
    fn require_project_rejects_missing_and_non_positive_ids() {
        let missing = require_project(&context(None, None)).expect_err("missing project");
        assert_eq!(missing.exit_code, 2);
        assert_eq!(missing.code, "PROJECT_REQUIRED");

        let zero = require_project(&context(Some(0), None)).expect_err("zero project");
        assert_eq!(zero.code, "INVALID_PROJECT");

        assert_eq!(require_project(&context(Some(3), None)).ok(), Some(3));
    }

    #[test]
    fn require_user_rejects_missing_user() {
        let err = require_user(&context(Some(1), None)).expect_err("missing user");
        assert_eq!(err.exit_code, 2);
        assert_eq!(err.code, "USER_REQUIRED");
        assert_eq!(require_user(&context(None, Some(9))).ok(), Some(9));
    }

    #[test]
    fn task_owner_falls_back_to_acting_user() {
        let missing = require_task_owner(&context(Some(1), None), None).expect_err("no owner");
        assert_eq!(missing.exit_code, 2);
        assert_eq!(missing.code, "USER_REQUIRED");

        let negative =
            require_task_owner(&context(Some(1), Some(-3)), None).expect_err("bad owner");
        assert_eq!(negative.code, "INVALID_USER");

        assert_eq!(require_task_owner(&context(Some(1), Some(4)), None).ok(), Some(4));
        assert_eq!(
            require_task_owner(&context(Some(1), Some(4)), Some(9)).ok(),
            Some(9)
        );
    }

    #[test]
    fn watch_interval_override_is_clamped() {
        let settings = Settings::default();
        let watch = |interval_ms| BoardWatchArgs { interval_ms };

        assert_eq!(
            watch_interval(&settings, &watch(Some(0))),
            Duration::from_secs(1)
        );
        assert_eq!(
            watch_interval(&settings, &watch(Some(3_600_000))),
            Duration::from_secs(60)
        );
        assert_eq!(
            watch_interval(&settings, &watch(Some(2_500))),
            Duration::from_millis(2_500)
        );
        assert_eq!(
            watch_interval(&settings, &watch(None)),
            settings.poll_interval()
        );
    }

    fn config_set(
        url: Option<&str>,
        user_id: Option<i64>,
        poll_interval_ms: Option<u64>,
    ) -> ConfigSetArgs {
        ConfigSetArgs {
            url: url.map(str::to_string),
            user_id,
            poll_interval_ms,
            request_timeout_ms: None,
        }
    }

    #[test]
    fn config_set_persists_and_merges_with_saved_values() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("kanban-board").join("settings.toml");

        let first = config_set(Some(" https://tasks.example.com/ "), Some(4), None);
        let output = config_set_at(&path, first).expect("first save should succeed");
        assert_eq!(output.command, "config.set");

        config_set_at(&path, config_set(None, None, Some(0))).expect("second save should succeed");

        let saved = Settings::load_from_path(&path);
        assert_eq!(saved.api_url, "https://tasks.example.com");
        assert_eq!(saved.user_id, Some(4));
        assert_eq!(saved.poll_interval_ms, 1_000);
    }

    #[test]
    fn config_set_rejects_bad_input_without_writing() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("settings.toml");

        let empty = config_set_at(&path, config_set(None, None, None)).expect_err("nothing set");
        assert_eq!(empty.code, "NOTHING_TO_SET");

        let url = config_set_at(&path, config_set(Some("localhost:8000"), None, None))
            .expect_err("bad url");
        assert_eq!(url.exit_code, 2);
        assert_eq!(url.code, "INVALID_API_URL");

        let user = config_set_at(&path, config_set(None, Some(0), None)).expect_err("bad user");
        assert_eq!(user.code, "INVALID_USER");

        assert!(!path.exists());
    }

    #[test]
    fn config_show_reports_effective_values() {
        let output = config_show(&context(None, Some(6)));

        assert_eq!(output.command, "config.show");
        assert_eq!(output.data["settings"]["api_url"], json!("http://localhost:8000"));
        assert_eq!(output.data["user_id"], json!(6));
        assert!(output.text.contains("poll_interval_ms"));
        assert!(output.text.contains("15000"));
    }

    #[test]
    fn store_errors_map_to_exit_codes() {
        let not_found = store_error(StoreError::new(STORE_NOT_FOUND, "task 7 not found"));
        assert_eq!(not_found.exit_code, 3);
        assert_eq!(not_found.code, STORE_NOT_FOUND);
        assert_eq!(not_found.message, "task 7 not found");

        let validation = store_error(StoreError::validation("task id must be positive"));
        assert_eq!(validation.exit_code, 2);

        let timeout = store_error(StoreError::new(STORE_TIMEOUT, "timed out"));
        assert_eq!(timeout.exit_code, 5);
        assert_eq!(timeout.code, STORE_TIMEOUT);

        let unknown = store_error(StoreError::new("SOMETHING_ELSE", "odd"));
        assert_eq!(unknown.code, "STORE_ERROR");
        assert_eq!(unknown.exit_code, 5);
    }

    #[test]
    fn format_anyhow_error_chain_includes_context_and_root_cause() {
        let err = anyhow::anyhow!("signal handler unavailable")
            .context("failed to listen for ctrl-c");
        let message = format_anyhow_error_chain(&err);

        assert_eq!(
            message,
            "failed to listen for ctrl-c: signal handler unavailable"
        );
    }

    #[test]
    fn board_text_renders_table_and_summary() {
        let mut assigned = task(2, TaskStatus::InProgress, "Wire up\nrefresh");
        assigned.assigned_user = Some(UserRef {
            id: 5,
            username: Some("ana".to_string()),
        });
        let columns = group_tasks_by_status(&[task(1, TaskStatus::Todo, "Write docs"), assigned]);

        let output = render_board_text(&columns);

        assert!(output.contains("| Status"));
        assert!(output.contains("Write docs"));
        assert!(output.contains("Wire up refresh"));
        assert!(output.contains("ana"));
        assert!(output.ends_with("To Do: 1 | In Progress: 1 | Done: 0"));
    }

    #[test]
    fn empty_board_text_says_so() {
        let output = render_board_text(&BoardColumns::default());
        assert!(output.starts_with("board is empty"));
    }

    #[test]
    fn board_json_counts_each_column() {
        let columns = group_tasks_by_status(&[
            task(1, TaskStatus::Done, "a"),
            task(2, TaskStatus::Done, "b"),
            task(3, TaskStatus::Todo, "c"),
        ]);

        let value = board_json(&columns);

        assert_eq!(value["total"], json!(3));
        assert_eq!(value["counts"]["done"], json!(2));
        assert_eq!(value["counts"]["inProgress"], json!(0));
        assert_eq!(value["columns"]["todo"][0]["id"], json!(3));
    }

    #[test]
    fn watch_events_serialize_with_kind() {
        let columns = group_tasks_by_status(&[task(1, TaskStatus::Todo, "a")]);

        let refreshed = watch_event_json(&columns, &BoardEvent::Refreshed { task_count: 1 });
        assert_eq!(refreshed["event"], json!("refreshed"));
        assert_eq!(refreshed["counts"]["todo"], json!(1));

        let failed = watch_event_json(
            &columns,
            &BoardEvent::RefreshFailed {
                detail: "STORE_TIMEOUT: timed out".to_string(),
            },
        );
        assert_eq!(failed["event"], json!("refresh_failed"));
    }

    #[test]
    fn project_list_text_marks_membership() {
        let member = vec![Project {
            id: 1,
            name: "alpha".to_string(),
            users: vec![UserRef::new(1), UserRef::new(2)],
            ..Project::default()
        }];
        let other = vec![Project {
            id: 2,
            name: "beta".to_string(),
            ..Project::default()
        }];

        let output = render_project_list_text(&member, &other);

        assert!(output.contains("| ID"));
        assert!(output.contains("alpha"));
        assert!(output.contains("yes"));
        assert!(output.contains("beta"));
        assert!(output.contains("no "));
    }

    #[test]
    fn assigned_text_lists_project_and_status() {
        let tasks = vec![AssignedTask {
            project_name: "alpha".to_string(),
            task: task(10, TaskStatus::InProgress, "Review PR"),
        }];

        let output = render_assigned_text(&tasks);

        assert!(output.contains("alpha"));
        assert!(output.contains("In Progress"));
        assert!(output.contains("Review PR"));
        assert_eq!(render_assigned_text(&[]), "no assigned tasks");
    }
}
