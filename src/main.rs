//! bundle-health CLI - readiness checks for rendered Kubernetes bundles

use anyhow::Result;
use bundle_health::commands::check::{CheckOptions, OutputFormat, TargetOptions, WaitOptions};
use bundle_health::config::Settings;
use bundle_health::utils::enhance_error;
use bundle_health::{Strategy, log_info};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bundle-health")]
#[command(author, version, about = "Readiness checks for rendered Kubernetes bundles", long_about = None)]
struct Cli {
    /// Verbose output (can be used multiple times: -v, -vv, -vvv)
    /// -v: INFO, -vv: DEBUG, -vvv: TRACE
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single readiness pass over the objects in the manifests
    Check {
        #[command(flatten)]
        target: TargetArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Repeat readiness passes until the bundle is healthy
    Wait {
        #[command(flatten)]
        target: TargetArgs,

        /// Give up after this many seconds (default: [wait] timeout_secs)
        #[arg(long)]
        timeout: Option<u64>,

        /// Seconds between passes (default: [wait] interval_secs)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Configuration file helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print an example configuration file
    Example,
}

#[derive(Args)]
struct TargetArgs {
    /// Manifest file to check (repeatable, `-` for stdin)
    #[arg(short, long = "file", required = true)]
    files: Vec<PathBuf>,

    /// Readiness strategy: kind-aware or status
    #[arg(long)]
    strategy: Option<Strategy>,

    /// Namespace for documents that do not set one
    #[arg(short, long)]
    namespace: Option<String>,

    /// Path to kubeconfig file
    #[arg(short, long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Number of objects checked at once
    #[arg(long)]
    concurrency: Option<usize>,
}

impl From<TargetArgs> for TargetOptions {
    fn from(args: TargetArgs) -> Self {
        Self {
            files: args.files,
            strategy: args.strategy,
            namespace: args.namespace,
            kubeconfig: args.kubeconfig,
            concurrency: args.concurrency,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    bundle_health::utils::logger::init(cli.verbose);

    let settings = Settings::load();
    if !settings.colors.enabled {
        colored::control::set_override(false);
    }

    match run(cli.command, &settings).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            enhance_error(err).display();
            std::process::exit(1);
        }
    }
}

/// Returns whether the command succeeded; `check` reports an unhealthy bundle as `false`
async fn run(command: Commands, settings: &Settings) -> Result<bool> {
    match command {
        Commands::Check { target, output } => {
            let opts = CheckOptions {
                target: target.into(),
                output,
            };
            bundle_health::commands::check::check(opts, settings).await
        }
        Commands::Wait {
            target,
            timeout,
            interval,
        } => {
            let opts = WaitOptions {
                target: target.into(),
                timeout_secs: timeout,
                interval_secs: interval,
            };
            bundle_health::commands::check::wait(opts, settings).await?;
            Ok(true)
        }
        Commands::Config { command } => handle_config_command(command),
        Commands::Completion { shell } => handle_completion_command(shell),
        Commands::Version => handle_version_command(),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<bool> {
    match command {
        ConfigCommands::Example => {
            log_info!("Printing example configuration");
            print!("{}", Settings::example_config());
            Ok(true)
        }
    }
}

fn handle_completion_command(shell: Shell) -> Result<bool> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "bundle-health", &mut io::stdout());
    Ok(true)
}

fn handle_version_command() -> Result<bool> {
    println!("bundle-health {}", env!("CARGO_PKG_VERSION"));
    println!("Readiness checks for rendered Kubernetes bundles");
    Ok(true)
}
