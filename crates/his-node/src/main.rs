use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use his_logging::HisSubscriberBuilder;
use his_node::cli::{Cli, Command};
use his_node::{NodeConfig, ReferenceDataNode};
use his_selectors::CodeLookupMatcher;

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.apply(NodeConfig::from_env());

    let _guard = HisSubscriberBuilder::new()
        .with_config(cli.log_config())
        .with_level(config.log_level.clone())
        .try_init()
        .context("failed to initialize logging")?;

    let node = ReferenceDataNode::open(config).context("failed to open reference-data node")?;

    match cli.command {
        Command::Seed => {
            let outcome = node.start().await?;
            print_json(&outcome)?;
        }
        Command::Roots => {
            let roots = node.coordinator().load_roots().await?;
            print_json(&roots)?;
        }
        Command::Children { code } => {
            let children = node.coordinator().load_children(&code).await?;
            print_json(&children)?;
        }
        Command::Search { prefix, limit } => {
            let hits = node.search(&prefix, limit).await?;
            print_json(&hits)?;
        }
        Command::Stats => {
            let stats = node.stats().await?;
            print_json(&stats)?;
        }
        Command::Lookup { kind, text, alias } => {
            let config = kind.matcher_config().with_commit_on_alias(alias);
            let entries = node.dictionaries().get(config.kind).await;
            let matcher = CodeLookupMatcher::new(entries, config);

            print_json(&serde_json::json!({
                "exact": matcher.exact_match(&text),
                "suggestions": matcher.filter(&text),
            }))?;
        }
    }

    Ok(())
}
