use std::panic;
use std::path::PathBuf;

use clap::Parser;

use kanban_board::{
    cli::{self, CliContext, RootCommand},
    logging::init_logging,
    settings::Settings,
};

#[derive(Parser, Debug)]
#[command(
    name = "kanban-board",
    about = "Kanban board client for a REST task backend",
    long_about = "Shows, watches and edits a project's kanban board (To Do, In Progress, Done) kept in sync with a REST task store.",
    version = env!("KANBAN_BOARD_BUILD_VERSION"),
    author
)]
struct Cli {
    #[arg(short, long, global = true, value_name = "PROJECT_ID")]
    project: Option<i64>,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    quiet: bool,

    /// Overrides `api_url` from settings and KANBAN_BOARD_API_URL.
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Acting user; defaults to `user_id` from settings.
    #[arg(short, long, global = true, value_name = "USER_ID")]
    user: Option<i64>,

    #[command(subcommand)]
    command: RootCommand,
}

impl Cli {
    fn into_context(self, mut settings: Settings) -> (CliContext, RootCommand) {
        if let Some(api_url) = self.api_url {
            settings.api_url = api_url;
            settings.validate();
        }

        let context = CliContext {
            project_id: self.project,
            user_id: self.user.or(settings.user_id),
            json_output: self.json,
            quiet: self.quiet,
            settings,
        };
        (context, self.command)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_handle = match init_logging() {
        Ok(handle) => Some(handle),
        Err(err) => {
            eprintln!("warning: failed to initialize logging: {err}");
            None
        }
    };
    if let Some(handle) = log_handle.as_ref() {
        install_panic_hook_with_log(handle.path.clone());
    }

    let (context, command) = cli.into_context(Settings::load());
    let code = cli::run(&context, command).await;

    // Flush the log writer; process::exit skips destructors.
    drop(log_handle);
    std::process::exit(code);
}

fn install_panic_hook_with_log(log_path: PathBuf) {
    let previous_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        eprintln!();
        eprintln!("  Log file: {}", log_path.display());
        eprintln!();
        previous_hook(panic_info);
    }));
}
