use std::collections::BTreeMap;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use log::debug;
use tokio_util::sync::CancellationToken;

use koyeb_client::{ClientConfig, KoyebClient};
use koyeb_core::api::{ApiResult, KoyebApi};
use koyeb_core::provider::Provider;
use koyeb_core::resource::{ResourceId, State, Value};
use koyeb_core::{Mapper, ResourceKind, WaitOptions, wait_for_status};
use koyeb_provider::{KoyebProvider, ProviderConfig};

#[derive(Parser)]
#[command(name = "koyeb-tf")]
#[command(about = "Inspect and manage Koyeb resources the way the provider sees them", long_about = None)]
struct Cli {
    /// API token
    #[arg(long, env = "KOYEB_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// API endpoint
    #[arg(long, env = "KOYEB_API_URL", global = true)]
    api_url: Option<String>,

    /// Log HTTP traffic
    #[arg(long, env = "KOYEB_DEBUG", global = true)]
    debug: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Maximum time to wait for long-running operations, in seconds
    #[arg(long, default_value_t = 600, global = true)]
    timeout: u64,

    /// Delay between two status polls, in seconds
    #[arg(long, default_value_t = 5, global = true)]
    poll_interval: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a name (or `app/service` slug) to an object ID
    Resolve {
        /// Kind of object: app, service, domain or secret
        kind: ResourceKind,
        /// Name, slug or ID
        reference: String,
    },
    /// Show the state of an object as the provider reads it
    Read {
        #[arg(value_enum)]
        resource_type: ResourceTypeArg,
        /// Name, slug or ID (volumes: ID only)
        reference: String,

        /// Print attributes as JSON
        #[arg(long)]
        json: bool,
    },
    /// Wait until an object reaches a status, or disappears
    Wait {
        #[arg(value_enum)]
        target: WaitTarget,
        /// Name, slug or ID (deployments and volumes: ID only)
        reference: String,

        /// Target status; may be repeated
        #[arg(long = "status", required_unless_present = "gone")]
        statuses: Vec<String>,

        /// Wait until the object no longer exists
        #[arg(long, conflicts_with = "statuses")]
        gone: bool,
    },
    /// Delete an object
    Delete {
        #[arg(value_enum)]
        resource_type: ResourceTypeArg,
        /// Name, slug or ID (volumes: ID only)
        reference: String,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ResourceTypeArg {
    App,
    Service,
    Domain,
    Secret,
    Volume,
}

impl ResourceTypeArg {
    fn as_str(self) -> &'static str {
        match self {
            ResourceTypeArg::App => "app",
            ResourceTypeArg::Service => "service",
            ResourceTypeArg::Domain => "domain",
            ResourceTypeArg::Secret => "secret",
            ResourceTypeArg::Volume => "volume",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WaitTarget {
    App,
    Service,
    Domain,
    Deployment,
    Volume,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match (cli.debug, cli.verbose) {
        (true, _) | (_, 2..) => log::LevelFilter::Debug,
        (_, 1) => log::LevelFilter::Info,
        _ => log::LevelFilter::Warn,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted, stopping...".yellow());
            on_signal.cancel();
        }
    });

    let result = run(cli, cancel).await;

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<(), String> {
    let client = build_client(&cli)?;
    let provider_config = ProviderConfig {
        wait_timeout: Duration::from_secs(cli.timeout),
        poll_interval: Duration::from_secs(cli.poll_interval),
    };

    match cli.command {
        Commands::Resolve { kind, reference } => run_resolve(&client, kind, &reference).await,
        Commands::Read {
            resource_type,
            reference,
            json,
        } => {
            let provider = KoyebProvider::new(client)
                .with_config(provider_config)
                .with_cancellation(cancel);
            run_read(&provider, resource_type, &reference, json).await
        }
        Commands::Wait {
            target,
            reference,
            statuses,
            gone,
        } => {
            let options = if gone {
                WaitOptions::until_gone(provider_config.wait_timeout)
            } else {
                WaitOptions::until_ready(provider_config.wait_timeout)
            }
            .with_interval(provider_config.poll_interval);
            run_wait(&client, target, &reference, &statuses, options, &cancel).await
        }
        Commands::Delete {
            resource_type,
            reference,
            auto_approve,
        } => {
            let provider = KoyebProvider::new(client)
                .with_config(provider_config)
                .with_cancellation(cancel);
            run_delete(&provider, resource_type, &reference, auto_approve).await
        }
    }
}

fn build_client(cli: &Cli) -> Result<KoyebClient, String> {
    let token = cli
        .token
        .clone()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| "Empty KOYEB_TOKEN environment variable".to_string())?;

    let mut config = ClientConfig::new(token).with_debug(cli.debug);
    if let Some(api_url) = cli.api_url.as_deref().filter(|u| !u.is_empty()) {
        config = config.with_api_url(api_url);
    }
    debug!("Using {:?}", config);

    KoyebClient::new(config).map_err(|e| e.to_string())
}

async fn run_resolve(
    client: &KoyebClient,
    kind: ResourceKind,
    reference: &str,
) -> Result<(), String> {
    let id = Mapper::new(client)
        .resolve(kind, reference)
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", id);
    Ok(())
}

async fn run_read(
    provider: &KoyebProvider,
    resource_type: ResourceTypeArg,
    reference: &str,
    json: bool,
) -> Result<(), String> {
    let id = ResourceId::new(resource_type.as_str(), reference);
    let state = provider
        .import(&id, reference)
        .await
        .map_err(|e| e.to_string())?;

    if json {
        let attributes: serde_json::Map<String, serde_json::Value> = state
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        let output = serde_json::json!({
            "id": state.identifier,
            "attributes": attributes,
        });
        let rendered = serde_json::to_string_pretty(&output).map_err(|e| e.to_string())?;
        println!("{}", rendered);
    } else {
        print_state(&state);
    }
    Ok(())
}

async fn run_wait(
    client: &KoyebClient,
    target: WaitTarget,
    reference: &str,
    statuses: &[String],
    options: WaitOptions,
    cancel: &CancellationToken,
) -> Result<(), String> {
    let mapper = Mapper::new(client);
    let object_id = match target {
        WaitTarget::App => mapper.resolve_app(reference).await,
        WaitTarget::Service => mapper.resolve_service(reference).await,
        WaitTarget::Domain => mapper.resolve_domain(reference).await,
        WaitTarget::Deployment | WaitTarget::Volume => Ok(reference.to_string()),
    }
    .map_err(|e| e.to_string())?;

    let targets: Vec<&str> = statuses.iter().map(String::as_str).collect();
    let label = format!("{} {}", target_name(target), object_id);
    let id = object_id.as_str();

    let status = match target {
        WaitTarget::App => wait_and_report(
            || client.get_app(id),
            &label,
            &targets,
            options,
            cancel,
        )
        .await,
        WaitTarget::Service => wait_and_report(
            || client.get_service(id),
            &label,
            &targets,
            options,
            cancel,
        )
        .await,
        WaitTarget::Domain => wait_and_report(
            || client.get_domain(id),
            &label,
            &targets,
            options,
            cancel,
        )
        .await,
        WaitTarget::Deployment => wait_and_report(
            || client.get_deployment(id),
            &label,
            &targets,
            options,
            cancel,
        )
        .await,
        WaitTarget::Volume => wait_and_report(
            || client.get_volume(id),
            &label,
            &targets,
            options,
            cancel,
        )
        .await,
    }?;

    match status {
        Some(status) => println!("{} {} is {}", "✓".green(), label, status.green().bold()),
        None => println!("{} {} is gone", "✓".green(), label),
    }
    Ok(())
}

/// Run the waiter and return the final status, or `None` once the object is gone
async fn wait_and_report<T, F, Fut>(
    fetch: F,
    label: &str,
    targets: &[&str],
    options: WaitOptions,
    cancel: &CancellationToken,
) -> Result<Option<String>, String>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ApiResult<T>>,
    T: StatusOf,
{
    let object = wait_for_status(fetch, T::status, label, targets, options, cancel)
        .await
        .map_err(|e| e.to_string())?;
    Ok(object.map(|o| o.status().to_string()))
}

fn target_name(target: WaitTarget) -> &'static str {
    match target {
        WaitTarget::App => "app",
        WaitTarget::Service => "service",
        WaitTarget::Domain => "domain",
        WaitTarget::Deployment => "deployment",
        WaitTarget::Volume => "volume",
    }
}

/// Objects carrying a status string
trait StatusOf {
    fn status(&self) -> &str;
}

macro_rules! impl_status_of {
    ($($ty:ty),*) => {
        $(impl StatusOf for $ty {
            fn status(&self) -> &str {
                &self.status
            }
        })*
    };
}

impl_status_of!(
    koyeb_core::api::App,
    koyeb_core::api::Service,
    koyeb_core::api::Domain,
    koyeb_core::api::Deployment,
    koyeb_core::api::Volume
);

async fn run_delete(
    provider: &KoyebProvider,
    resource_type: ResourceTypeArg,
    reference: &str,
    auto_approve: bool,
) -> Result<(), String> {
    let id = ResourceId::new(resource_type.as_str(), reference);
    let state = provider
        .import(&id, reference)
        .await
        .map_err(|e| e.to_string())?;
    let identifier = state
        .identifier
        .clone()
        .ok_or_else(|| format!("{} \"{}\" has no ID", resource_type.as_str(), reference))?;

    println!(
        "{} {} {} ({})",
        "-".red().bold(),
        resource_type.as_str().red(),
        reference.bold(),
        identifier
    );
    println!();

    // Confirmation prompt
    if !auto_approve {
        println!(
            "{}",
            format!("Do you really want to delete this {}?", resource_type.as_str())
                .yellow()
                .bold()
        );
        println!(
            "  {}",
            "This action cannot be undone. Type 'yes' to confirm.".yellow()
        );
        print!("\n  Enter a value: ");
        std::io::Write::flush(&mut std::io::stdout()).map_err(|e| e.to_string())?;

        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .map_err(|e| e.to_string())?;

        if input.trim() != "yes" {
            println!();
            println!("{}", "Delete cancelled.".yellow());
            return Ok(());
        }
        println!();
    }

    provider
        .delete(&id, &identifier)
        .await
        .map_err(|e| e.to_string())?;
    println!("{} Deleted {} {}", "✓".green(), resource_type.as_str(), reference);
    Ok(())
}

fn print_state(state: &State) {
    println!(
        "{} koyeb_{}.{}",
        "*".cyan().bold(),
        state.id.resource_type,
        state.id.name.bold()
    );
    if let Some(identifier) = &state.identifier {
        println!("    {}: {}", "id".cyan(), identifier);
    }

    let sorted: BTreeMap<_, _> = state.attributes.iter().collect();
    for (key, value) in sorted {
        println!("    {}: {}", key.cyan(), format_value(value));
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let sorted: BTreeMap<_, _> = map.iter().collect();
            let strs: Vec<_> = sorted
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{{}}}", strs.join(", "))
        }
    }
}
