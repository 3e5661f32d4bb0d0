//! Command-line argument parsing

use crate::concurrency::DEFAULT_WORKERS;
use crate::error::handlers::ValidationErrorHandler;
use crate::error::{RegistryError, Result};
use crate::resolver::LATEST_TOKEN;
use crate::session::{DEFAULT_TIMEOUT_SECS, SessionOptions};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "glopm")]
#[command(about = "Command-line client for the GloPM package registry")]
#[command(version)]
pub struct Args {
    /// Registry API base URL for this invocation
    #[arg(long = "api-url", global = true, help = "Override the registry API URL (also GLOPM_API_URL)")]
    pub api_url: Option<String>,

    /// Seconds a network read may stall before the request fails
    #[arg(
        long = "timeout",
        short = 't',
        global = true,
        default_value_t = DEFAULT_TIMEOUT_SECS,
        help = "Idle timeout for network reads in seconds"
    )]
    pub timeout: u64,

    /// Verbose output
    #[arg(
        long = "verbose",
        short = 'v',
        global = true,
        env = "GLOPM_VERBOSE",
        help = "Enable verbose output"
    )]
    pub verbose: bool,

    /// Quiet mode
    #[arg(
        long = "quiet",
        short = 'q',
        global = true,
        help = "Only print errors"
    )]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an account and log in
    Register(CredentialArgs),
    /// Log in with an existing account
    Login(CredentialArgs),
    /// Forget the stored credentials
    Logout,
    /// Publish a package archive
    Publish {
        /// Package name
        name: String,
        /// Version being published
        version: String,
        /// Package description
        description: String,
        /// Path to the package archive
        file: PathBuf,
    },
    /// Download one package version
    Download {
        /// Package name
        name: String,
        /// Version to download, or "latest"
        #[arg(default_value = LATEST_TOKEN)]
        version: String,
        /// Output file path
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        #[arg(long = "no-cache", help = "Ignore cached version lookups")]
        no_cache: bool,
    },
    /// Download several packages given as name[@version]
    BatchDownload {
        #[arg(required = true, help = "Package specs in the form name[@version]")]
        packages: Vec<String>,
        #[command(flatten)]
        batch: BatchArgs,
        /// Directory the archives are written to
        #[arg(long = "output-dir", short = 'd', default_value = ".")]
        output_dir: PathBuf,
        #[arg(long = "no-cache", help = "Ignore cached version lookups")]
        no_cache: bool,
    },
    /// Search packages by keyword
    Search {
        query: String,
    },
    /// Show the latest version of a package
    Version {
        name: String,
        #[arg(long = "no-cache", help = "Ignore cached version lookups")]
        no_cache: bool,
    },
    /// List every version of a package
    List {
        name: String,
        #[arg(long = "no-cache", help = "Ignore cached version lookups")]
        no_cache: bool,
    },
    /// Delete a package, or a single version of it
    Delete {
        name: String,
        /// Only delete this version
        #[arg(long = "version")]
        version: Option<String>,
        #[arg(long, short = 'f', help = "Do not ask for confirmation")]
        force: bool,
    },
    /// Delete several packages
    BatchDelete {
        #[arg(required = true, help = "Package names")]
        packages: Vec<String>,
        #[command(flatten)]
        batch: BatchArgs,
        #[arg(long, short = 'f', help = "Do not ask for confirmation")]
        force: bool,
    },
    /// Show or change client configuration
    Config(ConfigArgs),
    /// Delete the logged-in account
    DeleteAccount {
        #[arg(long, short = 'f', help = "Do not ask for confirmation")]
        force: bool,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CredentialArgs {
    #[arg(long, short = 'u', env = "GLOPM_USERNAME")]
    pub username: Option<String>,
    #[arg(long, short = 'p', env = "GLOPM_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct BatchArgs {
    /// Run items concurrently
    #[arg(long, short = 'p')]
    pub parallel: bool,
    /// Number of concurrent workers
    #[arg(long, short = 'w', default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(long, help = "Show the current configuration")]
    pub show: bool,
    #[arg(long = "set-api", value_name = "URL", help = "Set the registry API URL")]
    pub set_api: Option<String>,
    #[arg(long = "clear-cache", help = "Remove every cached version lookup")]
    pub clear_cache: bool,
}

impl ConfigArgs {
    /// Exactly one action per invocation
    pub fn validate(&self) -> Result<()> {
        let actions = [self.show, self.set_api.is_some(), self.clear_cache];
        match actions.iter().filter(|set| **set).count() {
            1 => Ok(()),
            0 => Err(RegistryError::Validation(
                "Specify one of --show, --set-api or --clear-cache".to_string(),
            )),
            _ => Err(RegistryError::Validation(
                "--show, --set-api and --clear-cache cannot be combined".to_string(),
            )),
        }
    }
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            api_url: self.api_url.clone(),
            timeout_secs: self.timeout,
            verbose: self.verbose,
            quiet: self.quiet,
        }
    }

    /// Checks clap cannot express
    pub fn validate(&self) -> Result<()> {
        if self.timeout == 0 {
            return Err(RegistryError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }
        match &self.command {
            Command::BatchDownload { batch, .. } | Command::BatchDelete { batch, .. } => {
                ValidationErrorHandler::validate_workers(batch.workers)
            }
            Command::Config(config) => config.validate(),
            _ => Ok(()),
        }
    }
}

/// One `name[@version]` item of a batch download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub version: String,
}

impl PackageSpec {
    /// Split on the last `@`; no version means `latest`.
    ///
    /// A leading `@` belongs to the name (`@scope`), so `@scope` alone is a
    /// name without a version.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        let (name, version) = match spec.rsplit_once('@') {
            Some((name, version)) if !name.is_empty() => (name, version),
            _ => (spec, LATEST_TOKEN),
        };
        ValidationErrorHandler::validate_package_name(name)?;
        let version = if version.trim().is_empty() { LATEST_TOKEN } else { version.trim() };
        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
        })
    }
}
