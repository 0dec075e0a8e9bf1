//! CLI argument definitions using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use crumbcache_core::config::Profile;

/// crumbcache - offline cache manager for the bakery sites
///
/// Drives the storefront or admin worker from the command line: install
/// and activate a version, then answer requests cache-first against the
/// on-disk cache store.
#[derive(Parser, Debug)]
#[command(name = "crumbcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub overrides: Overrides,
}

/// Settings that take precedence over the config file
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Worker profile (storefront or admin)
    #[arg(short, long, global = true, env = "CRUMBCACHE_PROFILE")]
    pub profile: Option<Profile>,

    /// Site origin, e.g. https://cupcakes.example
    #[arg(short, long, global = true, env = "CRUMBCACHE_ORIGIN")]
    pub origin: Option<String>,

    /// Directory holding the cache store and registration
    #[arg(long, global = true, env = "CRUMBCACHE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch the precache manifest and register this version as waiting
    Install {
        /// Reinstall even if this version is already installed
        #[arg(long)]
        force: bool,
    },

    /// Activate the waiting version and delete stale caches
    Activate,

    /// Request a URL through the worker
    Fetch(FetchArgs),

    /// Post a control message to the worker
    #[command(subcommand)]
    Message(MessageCommand),

    /// Simulate a push event
    Push {
        /// Push payload text
        text: Option<String>,
    },

    /// Simulate a notification click
    Click {
        /// Action button id; omit for a click on the notification itself
        #[arg(short, long)]
        action: Option<String>,
    },

    /// Run a background sync task
    Sync {
        /// Sync tag, e.g. weekly-bakes-update
        tag: String,
    },

    /// Show registration and cache contents
    Status,

    /// Unregister every version and delete all caches
    Reset,

    /// Show configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// URL or origin-relative path
    pub url: String,

    /// Treat the request as a page navigation
    #[arg(short, long)]
    pub navigate: bool,

    /// HTTP method
    #[arg(short, long, default_value = "GET")]
    pub method: String,

    /// Print the whole body instead of a preview
    #[arg(long)]
    pub full: bool,
}

#[derive(Subcommand, Debug)]
pub enum MessageCommand {
    /// Activate without waiting for open pages to close
    SkipWaiting,

    /// Store a JSON payload in the runtime cache for offline display
    StoreData {
        /// JSON payload
        json: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Print the effective worker config as JSON
    Show,

    /// Save the current profile, origin and cache directory as the config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch_with_globals() {
        let cli = Cli::try_parse_from([
            "crumbcache",
            "fetch",
            "/shop.html",
            "--navigate",
            "--profile",
            "admin",
            "--origin",
            "https://cakes.example",
        ])
        .unwrap();

        assert_eq!(cli.overrides.profile, Some(Profile::Admin));
        assert_eq!(cli.overrides.origin.as_deref(), Some("https://cakes.example"));
        match cli.command {
            Commands::Fetch(args) => {
                assert_eq!(args.url, "/shop.html");
                assert!(args.navigate);
                assert_eq!(args.method, "GET");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_message_store_data() {
        let cli = Cli::try_parse_from(["crumbcache", "message", "store-data", r#"{"a":1}"#]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Message(MessageCommand::StoreData { ref json }) if json == r#"{"a":1}"#
        ));
    }

    #[test]
    fn test_parse_config_init() {
        let cli = Cli::try_parse_from(["crumbcache", "config", "init", "--force", "--profile", "admin"]).unwrap();
        assert!(matches!(cli.command, Commands::Config(ConfigCommand::Init { force: true })));
        assert_eq!(cli.overrides.profile, Some(Profile::Admin));
    }

    #[test]
    fn test_rejects_unknown_profile() {
        assert!(Cli::try_parse_from(["crumbcache", "status", "--profile", "kitchen"]).is_err());
    }
}
