use clap::{ArgAction, Parser, Subcommand};
use htmlbuild::config::{self, BuildConfig};
use htmlbuild::output::{self, Activity};
use htmlbuild::{build, watch};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(name = "htmlbuild")]
#[command(about = "Assemble a static site from HTML files and layouts")]
#[command(long_about = "\
Assemble a static site from HTML files and layouts

Every .html file in the source directory is written to the output directory,
wrapped in the ~layout files of its own directory and of every directory
above it. Static files are copied as they are.

Source structure:

  src/
  ├── ~layout.html          # Wraps every page below, at %{content}
  ├── ~nav.html             # Hidden: starts with ~, never written
  ├── index.html            # → dist/index.html
  └── blog/
      ├── ~layout.html      # Inner layout, inside the root one
      └── post.html         # → dist/blog/post.html

Directives:
  %{content}      where a layout places the wrapped content
  %{path FILE}    FILE relative to the output page (FILE is relative to the
                  file containing the directive)
  %{{             a literal %{

Run 'htmlbuild init' to write a documented htmlbuild.toml.")]
#[command(version, disable_version_flag = true)]
struct Cli {
    /// Print version
    #[arg(short = 'v', long, action = ArgAction::Version)]
    version: (),

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a stock config file with all options documented
    Init {
        /// Config file to create
        #[arg(default_value = config::DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Build the output directory once
    Build {
        /// Config file (TOML, or JSON5 when it ends in .json)
        #[arg(default_value = config::DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Build, then rebuild changed files until interrupted
    Watch {
        /// Config file (TOML, or JSON5 when it ends in .json)
        #[arg(default_value = config::DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(directives.as_deref()))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Init { config } => {
            config::write_stock_config(&config)?;
            println!("Wrote {}", config.display());
        }
        Command::Build { config } => {
            let config = load(&config)?;
            output::print_activity(&Activity::Building);
            let report = build::build_all(&config)?;
            output::print_build_report(&report);
        }
        Command::Watch { config } => {
            let config = load(&config)?;

            let running = Arc::new(AtomicBool::new(true));
            let handler_flag = running.clone();
            ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))?;

            output::print_watch_header(&config.source_directory, &config.static_directory);
            watch::watch(&config, running, |activity| output::print_activity(&activity))?;
        }
    }

    Ok(())
}

/// `RUST_LOG`-style directives, or `warn` when none are given.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse_lossy(directives.unwrap_or_default())
}

/// Load the config, falling back to defaults when the default file is absent.
fn load(path: &Path) -> Result<BuildConfig, config::ConfigError> {
    if path == Path::new(config::DEFAULT_CONFIG_FILE) && !path.exists() {
        tracing::warn!("{} not found, using default directories", path.display());
        let config = BuildConfig::default();
        config.validate()?;
        return Ok(config);
    }
    config::load_config(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn short_and_long_version_flags() {
        for flag in ["-v", "--version"] {
            match Cli::try_parse_from(["htmlbuild", flag]) {
                Ok(_) => panic!("{flag} should print the version"),
                Err(e) => assert_eq!(e.kind(), ErrorKind::DisplayVersion),
            }
        }
    }

    #[test]
    fn config_path_defaults_per_command() {
        let cli = Cli::try_parse_from(["htmlbuild", "watch"]).unwrap();
        match cli.command {
            Command::Watch { config } => assert_eq!(config, PathBuf::from("htmlbuild.toml")),
            _ => panic!("expected the watch command"),
        }
    }

    #[test]
    fn log_filter_defaults_to_warn() {
        assert_eq!(log_filter(None).to_string(), "warn");
        assert_eq!(log_filter(Some("")).to_string(), "warn");
    }

    #[test]
    fn log_filter_honors_more_verbose_directives() {
        assert_eq!(log_filter(Some("debug")).to_string(), "debug");
        assert_eq!(log_filter(Some("htmlbuild=trace")).to_string(), "htmlbuild=trace");
    }
}
