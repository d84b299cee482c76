use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use domain_client::{DeploymentSetPlan, DomainCommand, DomainResponse};
use domain_controller::{ControllerConfig, DomainController, LocalHostExecutor};
use domain_model::{DomainModel, DomainUpdate, HostId};
use log::info;
use std::fs;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "domainctl")]
#[command(about = "Applies configuration updates and deployment plans to a domain model")]
struct Cli {
    /// Path to the domain model checkpoint (JSON)
    #[arg(short, long)]
    model: String,

    /// Optional controller configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Write the resulting model back to the checkpoint
    #[arg(short, long)]
    write: bool,

    /// Simulate an outage of these hosts
    #[arg(long = "unreachable", value_name = "HOST")]
    unreachable: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the domain model
    Show,
    /// Execute a deployment plan
    ApplyPlan {
        /// Path to the plan JSON file
        #[arg(short, long)]
        file: String,
    },
    /// Apply a single domain update
    ApplyUpdate {
        /// Path to the update JSON file
        #[arg(short, long)]
        file: String,
        /// Keep the change even if some hosts fail
        #[arg(long)]
        no_rollback: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ControllerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level.as_str()))
        .init();

    let content = fs::read_to_string(&cli.model).context("Failed to read model checkpoint")?;
    let model: DomainModel = serde_json::from_str(&content).context("Invalid model JSON")?;

    let hosts = Arc::new(LocalHostExecutor::from_model(&model).context("Failed to start local hosts")?);
    for host in &cli.unreachable {
        hosts.set_unreachable(HostId::new(host.as_str()));
    }
    let controller = DomainController::new(model, hosts, config)?;

    let command = match cli.command {
        Commands::Show => DomainCommand::GetModel,
        Commands::ApplyPlan { file } => {
            let content = fs::read_to_string(&file).context("Failed to read plan file")?;
            let plan: DeploymentSetPlan = serde_json::from_str(&content).context("Invalid plan JSON")?;
            info!("Loaded plan {} with {} action(s)", plan.id(), plan.action_count());
            DomainCommand::SubmitPlan(plan)
        }
        Commands::ApplyUpdate { file, no_rollback } => {
            let content = fs::read_to_string(&file).context("Failed to read update file")?;
            let update: DomainUpdate = serde_json::from_str(&content).context("Invalid update JSON")?;
            DomainCommand::SubmitUpdate {
                update,
                rollback: !no_rollback,
            }
        }
    };

    let response = controller.handle_command(command).await;
    let failed = matches!(response, DomainResponse::Error(_));
    print_response(&response)?;

    if cli.write && !failed {
        let model = controller.model().await;
        fs::write(&cli.model, serde_json::to_string_pretty(&model)?)
            .context("Failed to write model checkpoint")?;
        info!("Model written to {}", cli.model);
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn print_response(resp: &DomainResponse) -> Result<()> {
    match resp {
        DomainResponse::Model(model) => println!("{}", serde_json::to_string_pretty(model)?),
        DomainResponse::UpdateApplied(outcome) => {
            println!("{}", serde_json::to_string_pretty(outcome)?)
        }
        DomainResponse::PlanApplied(response) => {
            println!("PLAN {}: {:?}", response.plan_id(), response.status());
            println!("{:<36} | {:<8} | {:<14}", "ACTION", "TYPE", "RESULT");
            println!("{:-<36}-+-{:-<8}-+-{:-<14}", "", "", "");
            for result in response.action_results() {
                println!(
                    "{:<36} | {:<8} | {:<14}",
                    result.action_id().to_string(),
                    result.deployment_action().action_type(),
                    format!("{:?}", result.classification())
                );
            }
            if let Some(cause) = response.domain_failure() {
                println!("DOMAIN FAILURE: {}", cause);
            }
            for server in response.updated_servers() {
                println!("UPDATED: {}", server);
            }
        }
        DomainResponse::Error(e) => eprintln!("ERROR: {}", e),
    }
    Ok(())
}
