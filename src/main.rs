mod cli;
mod config;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, TrimArgs};
use keycut_av::{locate_split_point, probe_source, Engine, ToolRegistry, TrimRequest, Trimmer};
use keycut_core::config::Config;
use keycut_core::Timecode;

fn main() -> Result<()> {
    let cli = Cli::parse_from(cli::normalize_args(std::env::args_os()));

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "keycut=trace,keycut_av=trace".to_string()
        } else {
            "keycut=info,keycut_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = config::load_config_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Trim(args) => runtime()?.block_on(trim_file(args, config)),
        Commands::Probe { file, json } => runtime()?.block_on(probe_file(&file, json, &config)),
        Commands::SplitPoint { file, from } => {
            runtime()?.block_on(show_split_point(&file, from, &config))
        }
        Commands::CheckTools => check_tools(&config),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to start the async runtime")
}

fn engine(config: &Config) -> Engine {
    Engine::new(
        ToolRegistry::discover(&config.tools),
        config.trim.engine_loglevel.clone(),
    )
}

async fn trim_file(args: TrimArgs, config: Config) -> Result<()> {
    let deadline = args
        .timeout
        .map(Duration::from_secs)
        .or_else(|| config.trim.deadline());
    let trimmer =
        Trimmer::new(ToolRegistry::discover(&config.tools), &config.trim).with_deadline(deadline);

    let token = trimmer.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; stopping engine processes");
            token.cancel();
        }
    });

    let request = TrimRequest::new(&args.source, &args.destination)
        .with_start(args.from.unwrap_or(Timecode::ZERO))
        .with_end(args.to.unwrap_or(Timecode::END));

    let report = trimmer
        .trim(&request)
        .await
        .with_context(|| format!("Failed to trim {:?}", args.source))?;

    println!("Output: {}", report.destination.display());
    println!("Split point: {}", report.split_point);
    match report.plan.head {
        Some(span) => println!("Re-encoded: {span}"),
        None => println!("Re-encoded: nothing (start is on a keyframe)"),
    }
    match report.plan.tail {
        Some(span) => println!("Copied: {span}"),
        None => println!("Copied: nothing (clip ends before the next keyframe)"),
    }

    Ok(())
}

async fn probe_file(file: &Path, json: bool, config: &Config) -> Result<()> {
    let source = probe_source(&engine(config), file)
        .await
        .with_context(|| format!("Failed to probe {:?}", file))?;

    if json {
        let json_str = serde_json::to_string_pretty(&source)?;
        println!("{}", json_str);
    } else {
        println!("File: {}", source.path.display());
        println!("Container: {}", source.container);
        println!("Container names: {}", source.available_containers.join(", "));
        println!("\nVideo Streams: {}", source.video_streams.len());
        for stream in &source.video_streams {
            println!("  [{}] {}", stream.index, stream.encoder);
        }
    }

    Ok(())
}

async fn show_split_point(file: &Path, from: Timecode, config: &Config) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let split = locate_split_point(&engine(config), file, from, config.trim.packet_window)
        .await
        .with_context(|| format!("Failed to locate a split point in {:?}", file))?;

    println!("Requested start: {from}");
    println!("Encode until: {}", split.encode_boundary);
    println!("Remux from: {}", split.remux_boundary);

    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    let tools = ToolRegistry::discover(&config.tools).check_all();

    for tool in &tools {
        match &tool.path {
            Some(path) => println!(
                "{:<8} {}  [{}]",
                tool.name,
                path.display(),
                tool.version.as_deref().unwrap_or("version unknown")
            ),
            None => println!("{:<8} not found", tool.name),
        }
    }

    let missing: Vec<&str> = tools
        .iter()
        .filter(|t| !t.available)
        .map(|t| t.name.as_str())
        .collect();
    if missing.is_empty() {
        println!("\nReady to trim.");
    } else {
        println!(
            "\nCannot trim without {}. Put it on PATH or set tools.<name>_path in the config.",
            missing.join(" and ")
        );
    }

    Ok(())
}
