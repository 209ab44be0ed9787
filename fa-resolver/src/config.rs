//! Command line and effective configuration for fa-resolver
//!
//! Precedence: command line → TOML file → built-in defaults. The root
//! folder additionally honours `FA_ROOT_FOLDER` (see
//! [`fa_common::config::RootFolderResolver`]).

use clap::Parser;
use fa_common::config::{load_config, RootFolderResolver, TomlConfig};
use fa_common::Result;
use std::path::PathBuf;

/// Command-line arguments for fa-resolver
#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(name = "fa-resolver")]
#[command(about = "File annotation resolution and caching service")]
#[command(version)]
pub struct Args {
    /// Configuration file (TOML); `FA_CONFIG` is consulted when absent
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Folder holding the database
    #[arg(short, long)]
    pub root_folder: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Interface to bind
    #[arg(long)]
    pub bind_address: Option<String>,

    /// Default viewer language
    #[arg(long)]
    pub language: Option<String>,
}

impl Args {
    /// Overlay command-line values on a loaded configuration
    pub fn apply(&self, config: &mut TomlConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind_address) = &self.bind_address {
            config.bind_address = bind_address.clone();
        }
        if let Some(language) = &self.language {
            config.default_language = language.clone();
        }

        let resolver = RootFolderResolver::new(self.root_folder.clone(), config.root_folder.clone());
        config.root_folder = Some(resolver.resolve());
    }
}

/// Configuration after file loading and command-line overrides
///
/// `root_folder` is always set in the result.
pub fn effective_config(args: &Args) -> Result<TomlConfig> {
    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);
    Ok(config)
}
