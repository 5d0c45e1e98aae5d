use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use bizadmin::api::{ApiClient, ListResponse};
use bizadmin::config;
use bizadmin::model::Record;
use bizadmin::query::ListQuery;

/// Fetch one page raw and report which list shape the backend answers with.
#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Resource name from the config
    #[arg(long)]
    resource: String,

    #[arg(long, default_value_t = 1)]
    page: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = config::load(Some(&args.config))?;
    let res = cfg
        .resource(&args.resource)
        .ok_or_else(|| anyhow!("unknown resource '{}'", args.resource))?;
    let client = ApiClient::from_config(&cfg)?;
    let collection = client.collection::<Record>(&res.path);

    let query = ListQuery::new(args.page, cfg.app.page_size);
    let raw = collection.list_raw(&query).await?;
    println!("Endpoint: {}", client.endpoint(&res.path, &[])?);

    match ListResponse::<Record>::decode(raw.clone()) {
        Ok(decoded) => {
            println!("Shape: {}", decoded.shape());
            let page = decoded.into_page();
            println!("Rows: {}", page.items.len());
            match page.total {
                Some(total) => println!("Total: {}", total),
                None => println!("Total: (not reported)"),
            }
            if let Some(first) = page.items.first() {
                println!("Fields:");
                for (name, value) in &first.fields {
                    println!("  {} -> {}", name, value);
                }
            }
        }
        Err(err) => {
            println!("Undecodable response: {}", err);
            println!("{}", serde_json::to_string_pretty(&raw)?);
        }
    }
    Ok(())
}
