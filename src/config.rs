//! Build configuration.
//!
//! Handles loading and validating the project config file. The file names the
//! three directories the build works with and whether the output directory is
//! wiped before a build.
//!
//! ## Config File
//!
//! `htmlbuild.toml` in the working directory, unless another path is given on
//! the command line:
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! source_directory = "src"      # HTML templates and layouts
//! static_directory = "static"   # Copied verbatim, must differ from source_directory
//! out_directory = "dist"        # Build output
//! clear_build_folder = true     # Remove out_directory before every full build
//! ```
//!
//! A file ending in `.json` is read as JSON5 instead (comments and trailing
//! commas allowed), with either the keys above or their camelCase spelling:
//!
//! ```json5
//! {
//!     // path to directory containing HTML files
//!     "sourceDirectory": "src/",
//!     "staticDirectory": "static/",
//!     "outDirectory": "dist/",
//!     "clearBuildFolder": true,
//! }
//! ```
//!
//! Relative directories are resolved against the current working directory.
//! Unknown keys are rejected to catch typos early.

use crate::resolve::normalize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "htmlbuild.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON5 parse error: {0}")]
    Json(#[from] json5::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Config file {} already exists", .0.display())]
    AlreadyExists(PathBuf),
}

/// Directories and options for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Directory containing the HTML templates.
    #[serde(alias = "sourceDirectory")]
    pub source_directory: PathBuf,
    /// Directory of files copied verbatim into the output.
    #[serde(alias = "staticDirectory")]
    pub static_directory: PathBuf,
    /// Directory the built and copied files are written to.
    #[serde(alias = "outDirectory")]
    pub out_directory: PathBuf,
    /// Remove the output directory before every full build.
    #[serde(alias = "clearBuildFolder")]
    pub clear_build_folder: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_directory: PathBuf::from("src"),
            static_directory: PathBuf::from("static"),
            out_directory: PathBuf::from("dist"),
            clear_build_folder: true,
        }
    }
}

impl BuildConfig {
    /// Validate that the three directories are set and distinct.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("source_directory", &self.source_directory),
            ("static_directory", &self.static_directory),
            ("out_directory", &self.out_directory),
        ];
        for (name, dir) in fields {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Validation(format!("{name} must not be empty")));
            }
        }

        let source = absolute(&self.source_directory)?;
        let static_dir = absolute(&self.static_directory)?;
        let out = absolute(&self.out_directory)?;

        if source == static_dir {
            return Err(ConfigError::Validation(
                "source_directory and static_directory must not be equal".into(),
            ));
        }
        if out == source || out == static_dir {
            return Err(ConfigError::Validation(
                "out_directory must differ from source_directory and static_directory".into(),
            ));
        }
        Ok(())
    }
}

fn absolute(path: &Path) -> Result<PathBuf, ConfigError> {
    Ok(normalize(&std::path::absolute(path)?))
}

/// Parse config text, picking the format from the file name.
pub fn parse_config(content: &str, path: &Path) -> Result<BuildConfig, ConfigError> {
    let is_json = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let config = if is_json {
        json5::from_str(content)?
    } else {
        toml::from_str(content)?
    };
    Ok(config)
}

/// Load and validate the config file at `path`.
pub fn load_config(path: &Path) -> Result<BuildConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content, path)?;
    config.validate()?;
    Ok(config)
}

/// Write [`stock_config_toml`] to `path`, refusing to overwrite.
///
/// Used by the `init` CLI command.
pub fn write_stock_config(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    fs::write(path, stock_config_toml())?;
    Ok(())
}

/// Returns a fully-commented stock config with every key and its default.
pub fn stock_config_toml() -> &'static str {
    r##"# htmlbuild configuration
# ========================

# Path to the directory containing the HTML files.
#
# Files whose name starts with "~" are not copied to the output. Files whose
# name starts with "~layout" wrap every other HTML file in their directory and
# its subdirectories, at the position of %{content}.
source_directory = "src"

# Path to the directory containing static files to copy into the out directory.
# Must not be equal to the source directory.
static_directory = "static"

# The target directory to place the built and copied files into.
out_directory = "dist"

# Remove the out directory before every full build. Highly recommended, unless
# htmlbuild runs together with another build tool that clears it first.
clear_build_folder = true
"##
}
