use std::sync::Arc;

use clap::Parser;
use dqctl::api::models::dashboard::SuccessTier;
use dqctl::config::Command;
use dqctl::notifications::ConsoleNotifier;
use dqctl::router::NavigationOutcome;
use dqctl::{Config, SessionContext, telemetry};

fn print_location(context: &SessionContext) {
    match context.router().current() {
        Some(location) => println!("Location: {} ({})", location.path, location.name),
        None => println!("Location: none"),
    }
}

async fn run(context: &SessionContext, command: Option<Command>) -> anyhow::Result<()> {
    let session = context.session();

    match command {
        Some(Command::Login { username, password }) => {
            session.login(&username, &password).await?;
            if let Some(user) = session.user() {
                println!("Logged in as {} ({})", user.username, user.role);
            }
            print_location(context);
        }
        Some(Command::Register {
            username,
            email,
            password,
        }) => {
            session.register(&username, &email, &password).await?;
            print_location(context);
        }
        Some(Command::Logout) => {
            session.logout().await;
        }
        Some(Command::Whoami) => {
            context.bootstrap().await?;
            let user = session.user().ok_or_else(|| anyhow::anyhow!("Not logged in"))?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Some(Command::Navigate { path }) => match context.router().navigate(&path).await? {
            NavigationOutcome::Completed(location) => println!("{}", location.path),
            NavigationOutcome::Superseded => print_location(context),
        },
        Some(Command::Stats) => {
            context.bootstrap().await?;
            let dashboard = context.dashboard();
            let global = dashboard.get_global_statistics().await;
            println!(
                "Projects: {}  Tasks: {} ({} ok, {} failed)  Success rate: {:.1}% [{:?}]",
                global.total_projects,
                global.total_tasks,
                global.successful_tasks,
                global.failed_tasks,
                global.overall_success_rate,
                SuccessTier::from_rate(global.overall_success_rate),
            );
            for project in dashboard.get_project_statistics().await {
                println!(
                    "  #{} {}: {}/{} tasks ok ({:.1}%) [{:?}]",
                    project.project_id,
                    project.project_name,
                    project.successful_tasks,
                    project.total_tasks,
                    project.success_rate,
                    project.health(),
                );
            }
        }
        None => {
            context.bootstrap().await?;
            print_location(context);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args = dqctl::config::Args::parse();

    // Load configuration
    let config = Config::load(&args)?;

    // If --validate flag is set, exit successfully after config validation
    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_telemetry("warn")?;

    tracing::debug!(config = ?config, "Loaded configuration");

    let context = SessionContext::new(&config, Arc::new(ConsoleNotifier))?;
    run(&context, args.command).await
}
