mod cmd;
mod output;
mod prompts;
mod terminal;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{ServiceArgs, TargetArgs};
use output::{OutputFormat, print_error};

/// streamsub - submit stream applications to a remote build service
#[derive(Parser)]
#[command(name = "streamsub")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  format: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build an application and download its bundles, or start jobs from them
  Build {
    #[command(flatten)]
    target: TargetArgs,

    /// Start a job from each built bundle instead of downloading it
    #[arg(long)]
    submit: bool,

    /// Directory for downloaded bundles (default: output/ in the application directory)
    #[arg(short, long, value_name = "DIR", conflicts_with = "submit")]
    output: Option<PathBuf>,

    /// JSON job configuration used with --submit
    #[arg(long, value_name = "FILE", requires = "submit")]
    job_config: Option<PathBuf>,

    #[command(flatten)]
    service: ServiceArgs,
  },

  /// Assemble the source archive without submitting it
  Package {
    #[command(flatten)]
    target: TargetArgs,
  },

  /// Start a job from an existing application bundle
  Submit {
    /// Path to the application bundle
    bundle: PathBuf,

    /// JSON job configuration
    #[arg(long, value_name = "FILE")]
    job_config: Option<PathBuf>,

    #[command(flatten)]
    service: ServiceArgs,
  },

  /// Show the URL of the service console
  Console {
    #[command(flatten)]
    service: ServiceArgs,
  },

  /// Show the URL of the cloud dashboard
  Dashboard,
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Build {
      target,
      submit,
      output,
      job_config,
      service,
    } => cmd::cmd_build(&target, submit, output, job_config, &service, cli.format),
    Commands::Package { target } => cmd::cmd_package(&target, cli.verbose, cli.format),
    Commands::Submit {
      bundle,
      job_config,
      service,
    } => cmd::cmd_submit(bundle, job_config, &service, cli.format),
    Commands::Console { service } => cmd::cmd_console(&service, cli.format),
    Commands::Dashboard => cmd::cmd_dashboard(cli.format),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      if e.downcast_ref::<cmd::Reported>().is_none() {
        print_error(&format!("{:#}", e));
      }
      ExitCode::FAILURE
    }
  }
}
