mod config;
mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repowatch_core::{
    list_repositories, query_log, snarf_replies, validate, CommandError, Dispatcher, Poller,
    Registry, Settings,
};
use repowatch_git::GitProviderFactory;

use crate::config::WatchFile;
use crate::console::{encode_line, ConsoleDispatcher};

#[derive(Parser, Debug)]
#[command(
    name = "repowatch",
    about = "Watches git repositories and announces new commits to channels",
    version
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = config::CONFIG_FILE_NAME)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll repositories periodically and print announcements
    Run,
    /// Validate the configuration file and exit
    CheckConfig,
    /// List repositories visible to a channel
    Repos {
        #[arg(long)]
        channel: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the most recent commits of a repository
    Log {
        name: String,
        #[arg(long)]
        channel: String,
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Scan text for commit identifiers and print matching replies
    Snarf {
        text: String,
        #[arg(long)]
        channel: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let file = WatchFile::load(&cli.config)?;

    if let Command::CheckConfig = cli.command {
        let repos = file.repositories();
        validate(&repos).context("invalid configuration")?;
        println!("configuration ok: {} repositories", repos.len());
        return Ok(());
    }

    let registry = Arc::new(Registry::new());
    let factory = Arc::new(GitProviderFactory::new(file.repo_dir()));
    apply_config(&registry, &factory, &file)
        .await
        .context("loading repositories")?;

    match cli.command {
        Command::Run => run(cli.config, registry, factory, file.settings()).await,
        Command::Repos { channel, json } => {
            let repos = list_repositories(&registry, &channel);
            if json {
                println!("{}", serde_json::to_string_pretty(&repos)?);
            } else if repos.is_empty() {
                println!("No repositories configured for {channel}.");
            } else {
                for repo in repos {
                    println!(
                        "{} ({}, branch: {})",
                        repo.name, repo.display_name, repo.branch
                    );
                }
            }
            Ok(())
        }
        Command::Log {
            name,
            channel,
            count,
        } => show_log(registry, file.settings(), name, channel, count).await,
        Command::Snarf { text, channel } => {
            show_snarf(registry, file.settings(), channel, text).await
        }
        Command::CheckConfig => unreachable!(),
    }
}

/// Run a registry reload off the async threads; cloning a new repository
/// can take a while.
async fn apply_config(
    registry: &Arc<Registry>,
    factory: &Arc<GitProviderFactory>,
    file: &WatchFile,
) -> Result<()> {
    let registry = Arc::clone(registry);
    let factory = Arc::clone(factory);
    let configs = file.repositories();
    tokio::task::spawn_blocking(move || registry.apply(configs, factory.as_ref()))
        .await
        .context("reload task failed")??;
    Ok(())
}

async fn run(
    config_path: PathBuf,
    registry: Arc<Registry>,
    factory: Arc<GitProviderFactory>,
    settings: Settings,
) -> Result<()> {
    let (settings_tx, settings_rx) = watch::channel(settings);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    {
        let shutdown_tx = shutdown_tx.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nInterrupted, shutting down...");
            let _ = shutdown_tx.send(true);
        })
        .context("Failed to set Ctrl+C handler")?;
    }

    // SIGHUP is the rehash trigger: reload the file and swap the config
    // set atomically; a bad file leaves everything as it was.
    #[cfg(unix)]
    {
        let registry = Arc::clone(&registry);
        let factory = Arc::clone(&factory);
        let settings_tx = settings_tx.clone();
        let mut hangup = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
            .context("Failed to install SIGHUP handler")?;
        tokio::spawn(async move {
            while hangup.recv().await.is_some() {
                match rehash(&config_path, &registry, &factory, &settings_tx).await {
                    Ok(count) => info!(repos = count, "rehash complete"),
                    Err(e) => warn!(error = %e, "rehash failed, keeping previous configuration"),
                }
            }
        });
    }

    info!(repos = registry.len(), "repowatch started");
    let dispatcher: Arc<dyn Dispatcher> = Arc::new(ConsoleDispatcher);
    Poller::new(registry, dispatcher, settings_rx, shutdown_rx)
        .run()
        .await;
    Ok(())
}

async fn rehash(
    config_path: &PathBuf,
    registry: &Arc<Registry>,
    factory: &Arc<GitProviderFactory>,
    settings_tx: &watch::Sender<Settings>,
) -> Result<usize> {
    let file = WatchFile::load(config_path)?;
    apply_config(registry, factory, &file).await?;
    // Sent after the registry swap so the restarted timer polls the new set.
    let _ = settings_tx.send(file.settings());
    Ok(registry.len())
}

async fn show_log(
    registry: Arc<Registry>,
    settings: Settings,
    name: String,
    channel: String,
    count: usize,
) -> Result<()> {
    let max_commits = settings.max_commits();
    let lines = {
        let name = name.clone();
        let channel = channel.clone();
        tokio::task::spawn_blocking(move || {
            if let Some(repo) = registry.get(&name) {
                repo.history.refresh()?;
            }
            query_log(&registry, &name, &channel, count, max_commits)
        })
        .await
        .context("log task failed")?
    };

    match lines {
        Ok(lines) => {
            for line in &lines {
                println!("{}", encode_line(line));
            }
            Ok(())
        }
        // Presented identically on purpose: an unauthorized channel must
        // not learn that the repository exists.
        Err(CommandError::NotFound(name)) | Err(CommandError::NotAuthorized(name)) => {
            println!("No repository named {name} visible in {channel}.");
            Ok(())
        }
        Err(CommandError::History(e)) => Err(e.into()),
    }
}

async fn show_snarf(
    registry: Arc<Registry>,
    settings: Settings,
    channel: String,
    text: String,
) -> Result<()> {
    let lines = {
        let channel = channel.clone();
        tokio::task::spawn_blocking(move || {
            snarf_replies(&registry, &channel, &text, settings.snarf)
        })
        .await
        .context("snarf task failed")?
    };

    if lines.is_empty() {
        println!("No commits matched in {channel}.");
    } else {
        for line in &lines {
            println!("{}", encode_line(line));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snarf_subcommand_parses() {
        let cli = Cli::parse_from(["repowatch", "snarf", "--channel", "#dev", "see deadbeef"]);
        match cli.command {
            Command::Snarf { text, channel } => {
                assert_eq!(text, "see deadbeef");
                assert_eq!(channel, "#dev");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
