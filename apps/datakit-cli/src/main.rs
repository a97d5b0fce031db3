//! `datakit`: run a datakit engine over the memory driver from a YAML file.

mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::commands::QueryArgs;
use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "datakit", version, about = "Metadata-driven data access from the command line")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "datakit.yaml")]
    config: PathBuf,

    /// Act as this user instead of the system context
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Space (tenant) of `--user`
    #[arg(long, global = true, requires = "user")]
    space: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert configured seed data and print the report
    Seed,
    /// List registered objects
    Objects,
    /// Seed, then print the records of an object matching a query
    Query(QueryCmd),
    /// Seed, then print how many records of an object match the filters
    Count(QueryCmd),
}

#[derive(Args, Debug)]
struct QueryCmd {
    object: String,

    /// Filter list as JSON, e.g. '[["done","=",false],"or",["owner","=","u1"]]'
    #[arg(short, long)]
    filters: Option<String>,

    /// Sort key; prefix with '-' for descending. Repeatable.
    #[arg(short, long)]
    sort: Vec<String>,

    /// Fields to return. Repeatable.
    #[arg(long = "field")]
    fields: Vec<String>,

    #[arg(long)]
    skip: Option<u64>,

    #[arg(short, long)]
    limit: Option<u64>,

    /// Reference field to inline. Repeatable.
    #[arg(short, long)]
    expand: Vec<String>,
}

impl QueryCmd {
    fn into_parts(self) -> (String, QueryArgs) {
        (
            self.object,
            QueryArgs {
                filters: self.filters,
                sort: self.sort,
                fields: self.fields,
                skip: self.skip,
                limit: self.limit,
                expand: self.expand,
            },
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;
    logging::init(&config.logging)?;
    tracing::info!(config = %cli.config.display(), objects = config.objects.len(), "configuration loaded");

    let engine = commands::build_engine(&config);
    let security = commands::security_context(cli.user.as_deref(), cli.space.as_deref());

    let result = match cli.command {
        Command::Seed => {
            let report = engine.init().await;
            println!(
                "{}",
                serde_json::json!({
                    "inserted": report.inserted,
                    "skipped": report.skipped,
                    "failed": report.failed,
                })
            );
            Ok(())
        }
        Command::Objects => {
            for object in commands::objects(&engine) {
                println!("{object}");
            }
            Ok(())
        }
        Command::Query(cmd) => {
            engine.init().await;
            let (object, args) = cmd.into_parts();
            commands::query(&engine, security, &object, &args)
                .await
                .map(|records| {
                    for record in records {
                        println!("{}", serde_json::Value::Object(record));
                    }
                })
        }
        Command::Count(cmd) => {
            engine.init().await;
            let (object, args) = cmd.into_parts();
            commands::count(&engine, security, &object, &args)
                .await
                .map(|n| println!("{n}"))
        }
    };

    engine.close().await?;
    result
}
