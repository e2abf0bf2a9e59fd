//! Mailslot - numbered in-process mailboxes
//!
//! Main entry point for the mailslot CLI.

use anyhow::Context;
use clap::{Parser, Subcommand};
use mailslot::config::{validate_config_result, MailslotConfig};
use mailslot::shell::Shell;
use mailslot::stress::{self, StressConfig};
use mailslot::DeviceEndpoint;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// Mailslot - in-process message mailboxes
#[derive(Parser, Debug)]
#[command(name = "mailslot")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/mailslot/config.yaml)
    #[arg(short, long, env = "MAILSLOT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive shell over a fresh set of mailboxes
    Shell,

    /// Hammer one mailbox with concurrent writers and verify nothing is lost
    Stress {
        /// Minor number of the target mailbox
        #[arg(short, long, default_value = "0")]
        minor: u32,

        /// Number of concurrent writers
        #[arg(short, long, default_value = "8")]
        writers: usize,

        /// Messages per writer
        #[arg(short = 'n', long, default_value = "32")]
        messages: usize,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Print Prometheus metrics after the run
        #[arg(long)]
        metrics: bool,
    },

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write a configuration file with every default
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Check the configuration for errors
    Validate,

    /// Print the configuration file path
    Path,
}

fn main() {
    if let Err(e) = mailslot::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Config(ref cmd) = cli.command {
        return handle_config_command(cmd, cli.config.as_deref());
    }

    let config = MailslotConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    let device = DeviceEndpoint::from_config(&config)?;

    tracing::info!(
        instances = config.instances,
        order = %config.buffer.order,
        "Configuration loaded"
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;

    match cli.command {
        Commands::Shell => runtime.block_on(run_shell(device)),
        Commands::Stress {
            minor,
            writers,
            messages,
            json,
            metrics,
        } => {
            let stress_config = StressConfig {
                minor,
                writers,
                messages_per_writer: messages,
            };
            runtime.block_on(run_stress(device, stress_config, json, metrics))
        }
        Commands::Config(_) => Ok(()),
    }
}

async fn run_shell(device: DeviceEndpoint) -> anyhow::Result<()> {
    println!(
        "mailslot shell: {} mailboxes, type `help` for commands",
        device.registry().capacity()
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    Shell::new(device).run(stdin, stdout).await?;
    Ok(())
}

async fn run_stress(
    device: DeviceEndpoint,
    config: StressConfig,
    json: bool,
    show_metrics: bool,
) -> anyhow::Result<()> {
    let report = stress::run(Arc::new(device), &config)
        .await
        .with_context(|| format!("Stress run on mailbox {} failed", config.minor))?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("Stress run on mailbox {}", config.minor);
        println!("  writers:        {}", report.writers);
        println!("  attempted:      {}", report.attempted);
        println!("  accepted:       {}", report.accepted);
        println!("  rejected full:  {}", report.rejected_full);
        println!("  rejected busy:  {}", report.rejected_busy);
        println!("  drained:        {}", report.drained);
        println!("  duplicates:     {}", report.duplicates);
        println!("  unexpected:     {}", report.unexpected);
        println!("  missing:        {}", report.missing);
        println!("  elapsed:        {} ms", report.elapsed_ms);
    }

    if show_metrics {
        println!();
        print!("{}", mailslot::metrics::encode_metrics());
    }

    if !report.is_consistent() {
        anyhow::bail!("stress run lost or duplicated messages");
    }
    Ok(())
}

fn handle_config_command(cmd: &ConfigCommands, path: Option<&std::path::Path>) -> anyhow::Result<()> {
    let config_file = path
        .map(PathBuf::from)
        .unwrap_or_else(MailslotConfig::default_path);

    match cmd {
        ConfigCommands::Init { force } => {
            if config_file.exists() && !force {
                println!("Configuration already exists at {}", config_file.display());
                println!("Use --force to overwrite it.");
                return Ok(());
            }

            let config = MailslotConfig::new();
            let saved = match path {
                Some(path) => config.save(path),
                None => config.save_default(),
            };
            saved.with_context(|| format!("Failed to write {}", config_file.display()))?;
            println!("✓ Created configuration at {}", config_file.display());
        }
        ConfigCommands::Show => {
            let config = MailslotConfig::load_or_default(path)?;
            print!("{}", serde_yaml::to_string(&config)?);
        }
        ConfigCommands::Validate => {
            let config = MailslotConfig::load_or_default(path)?;
            validate_config_result(&config)?;
            println!("✓ Configuration is valid");
        }
        ConfigCommands::Path => {
            println!("{}", config_file.display());
        }
    }

    Ok(())
}
