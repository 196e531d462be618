use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use client_core::{
    CoordinatorConfig, HttpStepStore, HttpTaskStore, OperationCoordinator, OperationOutcome,
    Session, TaskStore,
};
use shared::domain::{Step, StepId, StepStatus, Task, TaskId, TaskStatus};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, DEFAULT_CONFIG_FILE};

#[derive(Parser, Debug)]
#[command(name = "momentum", about = "Goals, roadmap steps and the daily plan")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    token: Option<String>,
    /// Per-call commit timeout in milliseconds; 0 waits indefinitely.
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Tracing filter, e.g. `debug` or `client_core=trace`.
    #[arg(long)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(subcommand)]
    Roadmap(RoadmapCommand),
    #[command(subcommand)]
    Goal(GoalCommand),
    /// Today's scheduled tasks.
    Today,
    #[command(subcommand)]
    Task(TaskCommand),
    /// Review today, or show the review of an earlier day.
    Review {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Schedule today's tasks from the roadmap.
    StartDay,
}

#[derive(Subcommand, Debug)]
enum RoadmapCommand {
    Show,
    Add { title: String },
    Edit { id: String, title: String },
    Delete { id: String },
    Toggle { id: String },
    /// Positions are 1-based, as printed by `roadmap show`.
    Move { from: usize, to: usize },
}

#[derive(Subcommand, Debug)]
enum GoalCommand {
    /// Creates the active goal, or rewrites it and regenerates the roadmap.
    Set { description: String },
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    Add {
        title: String,
        /// RFC 3339 timestamp.
        #[arg(long)]
        deadline: Option<DateTime<Utc>>,
    },
    Done { id: String },
    Undo { id: String },
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(&args.config)?;
    if let Some(api_url) = args.api_url {
        settings.api_url = api_url;
    }
    if let Some(token) = args.token {
        settings.token = Some(token);
    }
    if let Some(timeout_ms) = args.timeout_ms {
        settings.commit_timeout_ms = timeout_ms;
    }
    if let Some(log_level) = args.log_level {
        settings.log_filter = log_level;
    }

    let filter = EnvFilter::try_new(&settings.log_filter)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let Some(token) = settings.token.clone() else {
        bail!("no API token; set MOMENTUM_TOKEN or pass --token");
    };
    let session = Session::new(&settings.api_url, token)
        .with_context(|| format!("invalid API url '{}'", settings.api_url))?;
    info!(api_url = %session.api_url(), "momentum: session ready");

    match args.command {
        Command::Roadmap(command) => {
            let store = Arc::new(HttpStepStore::new(session));
            let coordinator = OperationCoordinator::new_with_dependencies(
                store.clone(),
                store,
                CoordinatorConfig {
                    commit_timeout: settings.commit_timeout(),
                },
            );
            coordinator
                .refresh()
                .await
                .context("failed to load the roadmap")?;
            run_roadmap(&coordinator, command).await?;
            print_steps(&coordinator.steps().await);
        }
        Command::Goal(GoalCommand::Set { description }) => {
            let store = Arc::new(HttpStepStore::new(session));
            let coordinator = OperationCoordinator::new_with_dependencies(
                store.clone(),
                store,
                CoordinatorConfig {
                    commit_timeout: settings.commit_timeout(),
                },
            );
            coordinator
                .refresh()
                .await
                .context("failed to load the active goal")?;
            let report = if coordinator.goal().await.is_some() {
                coordinator.update_goal(&description).await?
            } else {
                coordinator.create_goal(&description).await?
            };
            info!(steps = report.inserted.len(), "momentum: roadmap regenerated");
            if let Some(goal) = coordinator.goal().await {
                println!("Goal: {}", goal.description);
            }
            print_steps(&coordinator.steps().await);
        }
        Command::Today => {
            let tasks = HttpTaskStore::new(session).today().await?;
            print_tasks(&tasks);
        }
        Command::Task(command) => run_task(&HttpTaskStore::new(session), command).await?,
        Command::Review { date } => {
            let store = HttpTaskStore::new(session);
            let review = match date {
                Some(date) => match store.review_for(date).await? {
                    Some(review) => review,
                    None => {
                        println!("No review for {date}.");
                        return Ok(());
                    }
                },
                None => store.review_day().await?,
            };
            for line in &review.summary {
                println!("{:>10}: {}", line.status, line.count);
            }
            if !review.ai_feedback.is_empty() {
                println!("\n{}", review.ai_feedback);
            }
        }
        Command::StartDay => {
            let tasks = HttpTaskStore::new(session).start_day().await?;
            print_tasks(&tasks);
        }
    }

    Ok(())
}

async fn run_roadmap(coordinator: &OperationCoordinator, command: RoadmapCommand) -> Result<()> {
    let outcome = match command {
        RoadmapCommand::Show => return Ok(()),
        RoadmapCommand::Add { title } => {
            let Some(goal) = coordinator.goal().await else {
                bail!("no active goal; run `momentum goal set <description>` first");
            };
            coordinator.create_step(&goal.id, &title).await?
        }
        RoadmapCommand::Edit { id, title } => {
            coordinator.edit_step(&StepId::new(id), &title).await?
        }
        RoadmapCommand::Delete { id } => coordinator.delete_step(&StepId::new(id)).await?,
        RoadmapCommand::Toggle { id } => coordinator.toggle_status(&StepId::new(id)).await?,
        RoadmapCommand::Move { from, to } => {
            let (Some(from), Some(to)) = (from.checked_sub(1), to.checked_sub(1)) else {
                bail!("positions start at 1");
            };
            coordinator.reorder(from, to).await?
        }
    };
    match outcome {
        OperationOutcome::Unchanged => println!("Nothing to change."),
        OperationOutcome::AlreadyApplied => println!("Step was already deleted."),
        OperationOutcome::Committed
        | OperationOutcome::Created(_)
        | OperationOutcome::Superseded => {}
    }
    Ok(())
}

async fn run_task(store: &HttpTaskStore, command: TaskCommand) -> Result<()> {
    match command {
        TaskCommand::Add { title, deadline } => {
            if title.trim().is_empty() {
                bail!("task title is required");
            }
            let task = store.create_task(title.trim(), deadline).await?;
            print_tasks(&[task]);
        }
        TaskCommand::Done { id } => {
            let task = store
                .set_task_status(&TaskId::new(id), TaskStatus::Completed)
                .await?;
            print_tasks(&[task]);
        }
        TaskCommand::Undo { id } => {
            let task = store
                .set_task_status(&TaskId::new(id), TaskStatus::Pending)
                .await?;
            print_tasks(&[task]);
        }
        TaskCommand::Delete { id } => {
            store.delete_task(&TaskId::new(id)).await?;
            println!("Deleted.");
        }
    }
    Ok(())
}

fn print_steps(steps: &[Step]) {
    if steps.is_empty() {
        println!("No roadmap steps.");
        return;
    }
    for step in steps {
        let mark = match step.status {
            StepStatus::Completed => "x",
            StepStatus::Pending => " ",
        };
        println!("{:>3}. [{mark}] {}  ({})", step.step_order, step.title, step.id);
    }
}

fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("Nothing scheduled.");
        return;
    }
    for task in tasks {
        let mark = match task.status {
            TaskStatus::Completed => "x",
            TaskStatus::Pending => " ",
        };
        let deadline = task
            .deadline
            .map(|deadline| format!("  due {}", deadline.format("%H:%M")))
            .unwrap_or_default();
        println!("[{mark}] {}{deadline}  ({})", task.title, task.id);
    }
}
