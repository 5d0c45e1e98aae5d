use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use bizadmin::api::{ApiClient, DeleteOptions};
use bizadmin::config::{self, Config, Resource};
use bizadmin::model::{EntityId, Record};
use bizadmin::notify::{AlwaysConfirm, Confirm, TracingNotifier};
use bizadmin::query::{self, Filters};
use bizadmin::table;
use bizadmin::viewmodel::{CollectionViewModel, RemoveOutcome, ViewOptions};
use bizadmin::CollectionError;

#[derive(Debug, Parser)]
#[command(author, version, about = "Browse and edit admin console collections")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List one page of a collection
    List {
        resource: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value = "")]
        search: String,
        /// Filter as name=value, repeatable
        #[arg(long = "filter", value_parser = query::parse_filter)]
        filters: Vec<(String, String)>,
        /// Keep loading pages until the last one
        #[arg(long)]
        all: bool,
    },
    /// Create an entity from a JSON payload
    Create {
        resource: String,
        #[arg(long)]
        data: String,
    },
    /// Update an entity with a partial JSON payload
    Update {
        resource: String,
        id: String,
        #[arg(long)]
        data: String,
    },
    /// Delete an entity after confirmation
    Delete {
        resource: String,
        id: String,
        /// Also delete every record that depends on this one
        #[arg(long)]
        delete_all_data: bool,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Show aggregate counters
    Stats { resource: String },
    /// Print an example config.yaml
    ExampleConfig,
}

struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{} [y/N] ", prompt);
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    if let Command::ExampleConfig = args.command {
        print!("{}", config::example());
        return Ok(());
    }

    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    let result = match &args.command {
        Command::List {
            resource,
            page,
            search,
            filters,
            all,
        } => {
            let (res, vm) = open_view(&cfg, resource)?;
            let filters: Filters = filters.iter().cloned().collect();
            let (listed, stats) =
                futures::join!(vm.load(*page, filters, search), vm.refresh_stats());
            if let Err(err) = stats {
                warn!(%err, "stats unavailable for {}", resource);
            }
            listed?;
            if *all {
                while vm.load_more().await?.is_some() {}
            }
            print_table(res, &vm);
            Ok(())
        }
        Command::Create { resource, data } => {
            let (_, vm) = open_view(&cfg, resource)?;
            let payload = serde_json::from_str(data).context("--data must be valid JSON")?;
            let created = vm.create(&payload).await;
            print_record(created)
        }
        Command::Update { resource, id, data } => {
            let (_, vm) = open_view(&cfg, resource)?;
            let payload = serde_json::from_str(data).context("--data must be valid JSON")?;
            let updated = vm.update(&EntityId::new(id.as_str()), &payload).await;
            print_record(updated)
        }
        Command::Delete {
            resource,
            id,
            delete_all_data,
            yes,
        } => {
            let (_, vm) = open_view(&cfg, resource)?;
            let options = delete_all_data.then_some(DeleteOptions {
                delete_all_data: true,
            });
            let confirm: &dyn Confirm = if *yes { &AlwaysConfirm } else { &StdinConfirm };
            match vm.remove(&EntityId::new(id.as_str()), options, confirm).await? {
                RemoveOutcome::Removed => println!("deleted {}", id),
                RemoveOutcome::Cancelled => println!("cancelled"),
            }
            Ok(())
        }
        Command::Stats { resource } => {
            let (_, vm) = open_view(&cfg, resource)?;
            let c = vm.refresh_stats().await?;
            println!("Total: {}  Active: {}  Inactive: {}", c.total, c.active, c.inactive);
            Ok(())
        }
        Command::ExampleConfig => Ok(()),
    };

    if let Err(err) = &result {
        if let Some(CollectionError::Validation(v)) = err.downcast_ref::<CollectionError>() {
            for (field, msgs) in &v.fields {
                eprintln!("  {}: {}", field, msgs.join("; "));
            }
        }
    }
    result
}

fn open_view<'a>(
    cfg: &'a Config,
    name: &str,
) -> Result<(&'a Resource, CollectionViewModel<Record>)> {
    let res = cfg
        .resource(name)
        .ok_or_else(|| anyhow!("unknown resource '{}'", name))?;
    let client = ApiClient::from_config(cfg)?;
    let service = Arc::new(client.collection::<Record>(&res.path));
    let vm = CollectionViewModel::new(
        service,
        cfg.session_context(),
        Arc::new(TracingNotifier),
        ViewOptions::from_config(cfg, res),
    )?;
    info!(resource = name, path = %res.path, "opened collection");
    Ok((res, vm))
}

fn print_record(result: Result<Record, CollectionError>) -> Result<()> {
    let record = result?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn print_table(res: &Resource, vm: &CollectionViewModel<Record>) {
    print!("{}", table::render(res, &vm.snapshot(), &vm.session().currency));
}
