mod cache;
mod commands;
mod config;
mod crude;
mod logging;

use clap::{ArgAction, Parser};
use color_eyre::{eyre::Report, Result};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::commands::Command;
use crate::config::{Config, Overrides};
use crate::crude::cached_client::CrudeClient;
use crate::crude::CrudeError;

#[derive(Parser, Debug)]
#[command(name = "crude")]
#[command(about = "Browse, read, save and delete entries of a crude content API")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./crude.yaml or $XDG_CONFIG_HOME/crude/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// API endpoint, overriding CRUDE_API_ENDPOINT and the config file
  #[arg(long, global = true)]
  endpoint: Option<String>,

  /// Cache directory, overriding CRUDE_CACHE_DIR and the config file
  #[arg(long, global = true)]
  cache_dir: Option<PathBuf>,

  /// More log output on stderr (-v info, -vv debug)
  #[arg(short, long, action = ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: Command,
}

fn main() -> ExitCode {
  if let Err(e) = color_eyre::install() {
    eprintln!("Failed to install error reporter: {e}");
  }

  let args = Args::parse();

  match run(args) {
    Ok(()) => ExitCode::SUCCESS,
    Err(report) => {
      eprintln!("Error: {report:?}");
      ExitCode::from(exit_code(&report))
    }
  }
}

fn run(args: Args) -> Result<()> {
  let overrides = Overrides {
    endpoint: args.endpoint,
    cache_dir: args.cache_dir,
  };
  let config = Config::load(args.config.as_deref(), overrides)?;
  let _log_guard = logging::init(args.verbose, config.log_file.as_deref())?;

  let mut client = CrudeClient::new(&config)?;
  let mut stdout = std::io::stdout().lock();
  commands::run(args.command, &mut client, Box::new(std::io::stdin()), &mut stdout)
}

/// 1 for ordinary failures, 2 when the cache or schema left us unable to
/// continue safely, 3 for an update conflict.
fn exit_code(report: &Report) -> u8 {
  report
    .downcast_ref::<CrudeError>()
    .map_or(1, CrudeError::exit_code)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_save() {
    let args = Args::try_parse_from(["crude", "save", "topics/abc123", "{}"]).unwrap();
    assert_eq!(
      args.command,
      Command::Save {
        id: "topics/abc123".into(),
        data: "{}".into()
      }
    );
  }

  #[test]
  fn test_parse_browse_defaults_and_globals() {
    let args = Args::try_parse_from(["crude", "browse", "topics", "-vv", "--endpoint", "http://x.test"]).unwrap();
    assert_eq!(
      args.command,
      Command::Browse {
        model: "topics".into(),
        page: 1,
        query: None
      }
    );
    assert_eq!(args.verbose, 2);
    assert_eq!(args.endpoint.as_deref(), Some("http://x.test"));
  }

  #[test]
  fn test_exit_code_from_report() {
    let conflict: Report = CrudeError::Conflict {
      id: "topics/a".parse().unwrap(),
      etag: None,
    }
    .into();
    assert_eq!(exit_code(&conflict), 3);
    assert_eq!(exit_code(&color_eyre::eyre::eyre!("plain")), 1);
  }
}
