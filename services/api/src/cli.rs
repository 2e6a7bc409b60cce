use std::sync::Arc;

use crate::infra::load_policy_store;
use crate::server;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rental_hub::access::{Action, InstanceId, PolicyResolver, PrincipalId, ResourceType};
use rental_hub::config::AppConfig;
use rental_hub::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "rental-hub",
    about = "Run the rental catalog service or inspect its access policies",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect the configured policy seed
    Policy {
        #[command(subcommand)]
        command: PolicyCommand,
    },
}

#[derive(Subcommand, Debug)]
enum PolicyCommand {
    /// Resolve one capability for a principal and print the decision
    Check(PolicyCheckArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct PolicyCheckArgs {
    #[arg(long)]
    principal: String,
    #[arg(long, value_enum)]
    resource_type: ResourceArg,
    #[arg(long, value_enum)]
    action: ActionArg,
    /// Instance id; without it the check is class-scoped
    #[arg(long)]
    instance: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ResourceArg {
    Property,
    Category,
    Coupon,
    Order,
    User,
}

impl From<ResourceArg> for ResourceType {
    fn from(value: ResourceArg) -> Self {
        match value {
            ResourceArg::Property => ResourceType::Property,
            ResourceArg::Category => ResourceType::Category,
            ResourceArg::Coupon => ResourceType::Coupon,
            ResourceArg::Order => ResourceType::Order,
            ResourceArg::User => ResourceType::User,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ActionArg {
    Create,
    Read,
    Update,
    Delete,
    Restore,
}

impl From<ActionArg> for Action {
    fn from(value: ActionArg) -> Self {
        match value {
            ActionArg::Create => Action::Create,
            ActionArg::Read => Action::Read,
            ActionArg::Update => Action::Update,
            ActionArg::Delete => Action::Delete,
            ActionArg::Restore => Action::Restore,
        }
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Policy {
            command: PolicyCommand::Check(args),
        } => run_policy_check(args).await,
    }
}

async fn run_policy_check(args: PolicyCheckArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let store = load_policy_store(config.storage.policy_file.as_deref()).await?;
    let resolver = PolicyResolver::new(Arc::new(store));

    let principal = PrincipalId(args.principal);
    let resource_type = ResourceType::from(args.resource_type);
    let action = Action::from(args.action);
    let decision = match args.instance {
        Some(instance) => {
            resolver
                .can(&principal, &InstanceId(instance), resource_type, action)
                .await?
        }
        None => resolver.can_global(&principal, resource_type, action).await?,
    };

    match serde_json::to_string_pretty(&decision) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("decision unavailable: {err}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_serve() {
        let cli = Cli::try_parse_from(["rental-hub"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_policy_check() {
        let cli = Cli::try_parse_from([
            "rental-hub",
            "policy",
            "check",
            "--principal",
            "alice",
            "--resource-type",
            "property",
            "--action",
            "restore",
            "--instance",
            "12",
        ])
        .expect("parses");

        let Some(Command::Policy {
            command: PolicyCommand::Check(args),
        }) = cli.command
        else {
            panic!("expected policy check");
        };
        assert_eq!(args.principal, "alice");
        assert_eq!(ResourceType::from(args.resource_type), ResourceType::Property);
        assert_eq!(Action::from(args.action), Action::Restore);
        assert_eq!(args.instance.as_deref(), Some("12"));
    }

    #[test]
    fn rejects_unknown_action() {
        let parsed = Cli::try_parse_from([
            "rental-hub",
            "policy",
            "check",
            "--principal",
            "alice",
            "--resource-type",
            "property",
            "--action",
            "archive",
        ]);
        assert!(parsed.is_err());
    }
}
