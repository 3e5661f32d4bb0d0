//! Per-invocation context
//!
//! A [`Session`] is built once per command from the config directory and the
//! global flags, then handed by reference to whatever the command needs.
//! Credentials inside it are read-only for the lifetime of the command; the
//! only writers are the account commands, which persist and finish.

use crate::cache::ResponseCache;
use crate::concurrency::CancelFlag;
use crate::config::{AppConfig, ConfigPaths, Credentials};
use crate::download::DownloadPipeline;
use crate::error::Result;
use crate::error::handlers::ValidationErrorHandler;
use crate::logging::Logger;
use crate::registry::client::ApiClient;
use crate::registry::operations::{AuthOperations, PackageOperations};
use crate::resolver::VersionResolver;

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Global knobs that apply to every command
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub api_url: Option<String>,
    pub timeout_secs: u64,
    pub verbose: bool,
    pub quiet: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            api_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verbose: false,
            quiet: false,
        }
    }
}

impl SessionOptions {
    pub fn logger(&self) -> Logger {
        if self.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(self.verbose)
        }
    }
}

pub struct Session {
    paths: ConfigPaths,
    /// Config as stored on disk, without per-invocation overrides
    stored: AppConfig,
    /// Config in effect for this invocation
    effective: AppConfig,
    options: SessionOptions,
    client: ApiClient,
    cache: ResponseCache,
    logger: Logger,
    cancel: CancelFlag,
}

impl Session {
    pub fn open(paths: ConfigPaths, options: SessionOptions) -> Result<Self> {
        let logger = options.logger();
        let stored = AppConfig::load(&paths.config_file())?;
        let effective = stored.clone().with_overrides(options.api_url.clone());
        effective.validate()?;

        logger.detail(&format!("Config directory: {}", paths.config_dir.display()));
        logger.detail(&format!("API URL: {}", effective.api_url));

        let client = Self::build_client(&effective, &options, &logger)?;
        let cache = ResponseCache::new(paths.cache_dir(), logger.clone());

        Ok(Self {
            paths,
            stored,
            effective,
            options,
            client,
            cache,
            logger,
            cancel: CancelFlag::new(),
        })
    }

    fn build_client(config: &AppConfig, options: &SessionOptions, logger: &Logger) -> Result<ApiClient> {
        ApiClient::builder(config.api_url.clone())
            .with_credentials(config.credentials.clone())
            .with_read_timeout(options.timeout_secs)
            .with_logger(logger.clone())
            .build()
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn config(&self) -> &AppConfig {
        &self.effective
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.client.credentials()
    }

    pub fn auth(&self) -> AuthOperations {
        AuthOperations::new(self.client.clone(), self.logger.clone())
    }

    pub fn packages(&self) -> PackageOperations {
        PackageOperations::new(self.client.clone(), self.logger.clone())
    }

    pub fn resolver(&self) -> VersionResolver {
        VersionResolver::new(self.packages(), self.cache.clone(), self.logger.clone())
    }

    pub fn downloader(&self) -> DownloadPipeline {
        DownloadPipeline::new(self.client.clone(), self.logger.clone())
    }

    /// Persist new credentials and rebind the client to them.
    pub fn store_credentials(&mut self, credentials: Credentials) -> Result<()> {
        self.stored.set_credentials(credentials.clone());
        self.stored.save(&self.paths.config_file())?;
        self.effective.set_credentials(credentials);
        self.client = Self::build_client(&self.effective, &self.options, &self.logger)?;
        Ok(())
    }

    /// Forget stored credentials, returning the username that was logged in.
    pub fn clear_credentials(&mut self) -> Result<Option<String>> {
        let username = self.stored.clear_credentials();
        self.stored.save(&self.paths.config_file())?;
        self.effective.clear_credentials();
        self.client = Self::build_client(&self.effective, &self.options, &self.logger)?;
        Ok(username)
    }

    /// Validate and persist a new registry base URL.
    pub fn set_api_url(&mut self, api_url: &str) -> Result<()> {
        ValidationErrorHandler::validate_api_url(api_url)?;
        self.stored.api_url = api_url.trim().to_string();
        self.stored.save(&self.paths.config_file())
    }
}
