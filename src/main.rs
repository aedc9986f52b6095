use anyhow::{bail, Result};
use api::ApiClient;
use clap::Parser;
use colored::*;
use credentials::{CredentialProvider, FileCredentialStore};
use log::*;
use realtime::{ConnectionStatus, SyncClient};
use service::{config, logging::Logger, Config};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

mod output;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Follow a Taskboard workspace in real time")]
struct Cli {
    /// Log in with this email instead of reusing the stored credential
    #[arg(long, requires = "password")]
    email: Option<String>,

    /// Password for --email
    #[arg(long, env = "TASKBOARD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Workspace room to join
    #[arg(long)]
    workspace: Option<String>,

    /// Project rooms to join (repeatable)
    #[arg(long)]
    project: Vec<String>,

    /// Task whose fields should report who is typing
    #[arg(long)]
    watch_task: Option<String>,

    #[command(flatten)]
    config: Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    config::load_dotenv();
    let cli = Cli::parse();
    Logger::init_logger(&cli.config);

    info!("Starting taskboard in {} mode", cli.config.runtime_env());

    let credentials = Arc::new(FileCredentialStore::open(&cli.config.credentials_path)?);
    let api = ApiClient::new(cli.config.api_config(), credentials.clone())?
        .with_unauthorized_hook(|| warn!("Credential rejected by the API; log in again"));

    println!("{}", "=== SIGN IN ===".bright_white().bold());
    let me = match (&cli.email, &cli.password) {
        (Some(email), Some(password)) => {
            output::print_step(&format!("Logging in as {}...", email));
            api.login(email, password).await?.user
        }
        _ if credentials.has_token() => {
            output::print_step("Reusing stored credential...");
            api.current_user().await?
        }
        _ => bail!("no stored credential; pass --email and --password"),
    };
    output::print_ok(&format!("Signed in as {} ({})", me.name, me.gid));

    if let Some(task_gid) = &cli.watch_task {
        let task = api.get_task(task_gid).await?;
        output::print_ok(&format!("Watching task '{}'", task.name));
    }
    for project_gid in &cli.project {
        let tasks = api.project_tasks(project_gid).await?;
        output::print_ok(&format!(
            "Project {} has {} tasks",
            project_gid,
            tasks.len()
        ));
    }

    println!("\n{}", "=== LIVE ===".bright_white().bold());
    let sync = SyncClient::new(cli.config.sync_options()?, credentials.clone())?;

    let my_gid = me.gid.clone();
    let presence = sync.presence().clone();
    let watch_task = cli.watch_task.clone();
    let _subscriptions = vec![
        sync.events()
            .on_connection_change(|connected| output::print_status(ConnectionStatus::from(*connected))),
        sync.events().on_connection_error(output::print_connection_error),
        sync.events().on_task_change(output::print_task_change),
        sync.events().on_task_update(output::print_task_update),
        sync.events().on_project_change(output::print_project_change),
        sync.events()
            .on_user_joined_room(|presence| output::print_presence(presence, true)),
        sync.events()
            .on_user_left_room(|presence| output::print_presence(presence, false)),
        sync.presence().on_change(move |change| {
            if watch_task.as_deref() != Some(change.target_gid.as_str()) {
                return;
            }
            let summary = presence.summary(&change.target_gid, &change.field, Some(&my_gid));
            output::print_typing(&change.target_gid, &change.field, summary.as_deref());
        }),
    ];

    sync.connect();
    if let Some(workspace_gid) = &cli.workspace {
        sync.join_workspace(workspace_gid.clone());
    }
    for project_gid in &cli.project {
        sync.join_project(project_gid.clone());
    }

    tokio::signal::ctrl_c().await?;
    println!();
    output::print_step("Disconnecting...");
    if timeout(CLOSE_TIMEOUT, sync.close()).await.is_err() {
        warn!("Connection did not close within {:?}", CLOSE_TIMEOUT);
    }

    Ok(())
}
