//! Subcommand handlers wired to the client engine

use crate::cli::args::{Args, BatchArgs, Command, ConfigArgs, CredentialArgs, PackageSpec};
use crate::cli::prompt;
use crate::concurrency::{BatchExecutor, BatchResult, BatchSummary, CancelFlag};
use crate::config::ConfigPaths;
use crate::download::progress::spawn_console_renderer;
use crate::download::progress_channel;
use crate::error::handlers::ValidationErrorHandler;
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::operations::{PackageOperations, PublishRequest};
use crate::registry::types::{NOT_AVAILABLE, PackageVersionInfo};
use crate::session::Session;
use std::path::{Path, PathBuf};

/// Outcome of one downloaded batch item
#[derive(Debug, Clone)]
struct Downloaded {
    label: String,
    path: PathBuf,
    size: u64,
}

pub struct Runner {
    args: Args,
    paths: ConfigPaths,
    cancel: CancelFlag,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        Self {
            args,
            paths: ConfigPaths::from_env(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_paths(mut self, paths: ConfigPaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the selected command. `Ok(false)` means a batch finished with
    /// failed items.
    pub async fn run(self) -> Result<bool> {
        self.args.validate()?;
        let options = self.args.session_options();
        let mut session = Session::open(self.paths, options)?.with_cancel(self.cancel);

        match self.args.command {
            Command::Register(creds) => register(&mut session, creds).await,
            Command::Login(creds) => login(&mut session, creds).await,
            Command::Logout => logout(&mut session),
            Command::Publish {
                name,
                version,
                description,
                file,
            } => {
                let request = PublishRequest {
                    name,
                    version,
                    description,
                    file,
                };
                publish(&session, request).await
            }
            Command::Download {
                name,
                version,
                output,
                no_cache,
            } => download(&session, &name, &version, output.as_deref(), no_cache).await,
            Command::BatchDownload {
                packages,
                batch,
                output_dir,
                no_cache,
            } => batch_download(&session, &packages, &batch, &output_dir, no_cache).await,
            Command::Search { query } => search(&session, &query).await,
            Command::Version { name, no_cache } => show_latest(&session, &name, no_cache).await,
            Command::List { name, no_cache } => list_versions(&session, &name, no_cache).await,
            Command::Delete {
                name,
                version,
                force,
            } => delete(&session, &name, version.as_deref(), force).await,
            Command::BatchDelete {
                packages,
                batch,
                force,
            } => batch_delete(&session, &packages, &batch, force).await,
            Command::Config(config) => config_command(&mut session, &config).await,
            Command::DeleteAccount { force } => delete_account(&mut session, force).await,
        }
    }
}

fn read_credentials(creds: CredentialArgs, confirm_password: bool) -> Result<(String, String)> {
    let username = match creds.username {
        Some(username) => username,
        None => prompt::ask("Username")?,
    };
    let password = match creds.password {
        Some(password) => password,
        None => {
            let password = prompt::ask_secret("Password")?;
            if confirm_password && prompt::ask_secret("Confirm password")? != password {
                return Err(RegistryError::Validation(
                    "The two passwords do not match".to_string(),
                ));
            }
            password
        }
    };
    ValidationErrorHandler::validate_credentials(&username, &password)?;
    Ok((username, password))
}

async fn register(session: &mut Session, creds: CredentialArgs) -> Result<bool> {
    let (username, password) = read_credentials(creds, true)?;
    session.logger().step(&format!("Registering {}", username));

    let credentials = session.auth().register(&username, &password).await?;
    session.store_credentials(credentials)?;

    let output = session.logger();
    output.success(&format!("Welcome to GloPM, {}! Your account is ready.", username));
    output.info("You are now logged in and can publish and download packages.");
    Ok(true)
}

async fn login(session: &mut Session, creds: CredentialArgs) -> Result<bool> {
    let (username, password) = read_credentials(creds, false)?;
    session.logger().step(&format!("Logging in as {}", username));

    let credentials = session.auth().login(&username, &password).await?;
    session.store_credentials(credentials)?;

    session
        .logger()
        .success(&format!("Welcome back, {}! You are logged in.", username));
    Ok(true)
}

fn logout(session: &mut Session) -> Result<bool> {
    let username = session
        .clear_credentials()?
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "user".to_string());
    session
        .logger()
        .success(&format!("Goodbye, {}! You have been logged out.", username));
    Ok(true)
}

async fn publish(session: &Session, request: PublishRequest) -> Result<bool> {
    let output = session.logger();
    output.step(&format!("Publishing {}@{}", request.name, request.version));

    session.packages().publish(&request).await?;
    invalidate_cache(session, &request.name).await;

    output.success(&format!("Published {}@{}", request.name, request.version));
    output.summary_kv(
        "Package",
        &[
            ("Name", request.name.clone()),
            ("Version", request.version.clone()),
            ("Description", non_empty_or_na(&request.description)),
        ],
    );
    Ok(true)
}

async fn download(
    session: &Session,
    name: &str,
    version_token: &str,
    output_path: Option<&Path>,
    no_cache: bool,
) -> Result<bool> {
    ValidationErrorHandler::validate_package_name(name)?;
    let output = session.logger();
    let version = session.resolver().resolve(name, version_token, !no_cache).await?;
    output.step(&format!("Downloading {}@{}", name, version));

    let default_dir = std::env::current_dir()?;
    let (events, receiver) = progress_channel();
    let renderer = spawn_console_renderer(output.clone(), format!("{}@{}", name, version), receiver);

    let result = session
        .downloader()
        .download(
            PackageOperations::download_request(name, &version),
            output_path,
            &default_dir,
            Some(&events),
        )
        .await;
    drop(events);
    // The renderer only ends once the sender is gone.
    let _ = renderer.await;

    let path = result?;
    let size = tokio::fs::metadata(&path).await?.len();
    output.success(&format!("Downloaded {}@{}", name, version));
    output.summary_kv(
        "Download",
        &[
            ("Package", name.to_string()),
            ("Version", version),
            ("Saved to", path.display().to_string()),
            ("Size", output.format_size(size)),
        ],
    );
    Ok(true)
}

/// `{name}-{version}.pkg` with path separators flattened
fn batch_file_name(name: &str, version: &str) -> String {
    format!("{}-{}.pkg", name, version).replace(['/', '\\'], "_")
}

async fn batch_download(
    session: &Session,
    packages: &[String],
    batch: &BatchArgs,
    output_dir: &Path,
    no_cache: bool,
) -> Result<bool> {
    let executor = BatchExecutor::new(batch.parallel, batch.workers)?
        .with_cancel(session.cancel_flag().clone());
    let output = session.logger();
    output.section("Batch download");
    output.info(&format!(
        "Downloading {} packages{}",
        packages.len(),
        if executor.is_parallel() {
            format!(" with {} workers", executor.max_workers())
        } else {
            String::new()
        }
    ));

    let resolver = &session.resolver();
    let downloader = &session.downloader();
    let results = executor
        .run(packages, move |raw| async move {
            let spec = PackageSpec::parse(raw)?;
            let version = resolver.resolve(&spec.name, &spec.version, !no_cache).await?;
            let target = output_dir.join(batch_file_name(&spec.name, &version));
            let path = downloader
                .download(
                    PackageOperations::download_request(&spec.name, &version),
                    Some(&target),
                    output_dir,
                    None,
                )
                .await?;
            let size = tokio::fs::metadata(&path).await?.len();
            Ok::<_, RegistryError>(Downloaded {
                label: format!("{}@{}", spec.name, version),
                path,
                size,
            })
        })
        .await;

    report(output, packages, &results, |item| {
        format!(
            "{} downloaded to {} ({})",
            item.label,
            item.path.display(),
            output.format_size(item.size)
        )
    });

    let summary = BatchSummary::from_results(&results);
    output.info(&format!(
        "Batch download finished in {}: {} packages downloaded",
        output.format_duration(output.elapsed()),
        summary
    ));
    Ok(summary.all_succeeded())
}

async fn search(session: &Session, query: &str) -> Result<bool> {
    let output = session.logger();
    let hits = session.packages().search(query).await?;

    if hits.is_empty() {
        output.info(&format!("No packages match \"{}\". Try another keyword.", query));
        return Ok(true);
    }

    let lines: Vec<String> = hits
        .iter()
        .map(|hit| {
            format!(
                "{}  {}  (updated {})",
                hit.name_or_na(),
                hit.description_or_na(),
                hit.updated_at_display()
            )
        })
        .collect();
    output.list(&format!("{} packages matching \"{}\"", hits.len(), query), &lines);
    Ok(true)
}

fn cached_label(cached: bool) -> &'static str {
    if cached { " (cached)" } else { "" }
}

fn version_line(output: &Logger, info: &PackageVersionInfo) -> String {
    format!(
        "{}  {}  published {}  {}",
        info.version,
        output.format_size(info.file_size),
        info.published_at_display(),
        info.description_or_na()
    )
}

async fn show_latest(session: &Session, name: &str, no_cache: bool) -> Result<bool> {
    let output = session.logger();
    let latest = match session.resolver().latest_version(name, !no_cache).await {
        Ok(latest) => latest,
        Err(RegistryError::NoVersionsAvailable(_)) => {
            output.info(&format!("Package {} has no published versions yet.", name));
            return Ok(true);
        }
        Err(e) => return Err(e),
    };

    let info = &latest.value;
    output.summary_kv(
        &format!("Latest version of {}{}", name, cached_label(latest.is_cached())),
        &[
            ("Version", info.version.clone()),
            ("Description", info.description_or_na().to_string()),
            ("File size", output.format_size(info.file_size)),
            ("Published", info.published_at_display()),
            ("Downloads", info.download_count.to_string()),
        ],
    );
    Ok(true)
}

async fn list_versions(session: &Session, name: &str, no_cache: bool) -> Result<bool> {
    let output = session.logger();
    let versions = session.resolver().list_versions(name, !no_cache).await?;

    if versions.value.is_empty() {
        output.info(&format!("Package {} has no published versions yet.", name));
        return Ok(true);
    }

    let lines: Vec<String> = versions
        .value
        .iter()
        .map(|info| version_line(output, info))
        .collect();
    output.list(
        &format!(
            "{} versions of {}{}",
            lines.len(),
            name,
            cached_label(versions.is_cached())
        ),
        &lines,
    );
    Ok(true)
}

async fn delete(session: &Session, name: &str, version: Option<&str>, force: bool) -> Result<bool> {
    ValidationErrorHandler::validate_package_name(name)?;
    session.client().require_credentials()?;

    let output = session.logger();
    let target = match version {
        Some(version) => format!("{}@{}", name, version),
        None => format!("{} and all of its versions", name),
    };
    if !force {
        output.warning(&format!("You are about to delete {}. This cannot be undone.", target));
        if !prompt::confirm("Continue?")? {
            output.info("Deletion cancelled.");
            return Ok(true);
        }
    }

    let packages = session.packages();
    match version {
        Some(version) => packages.delete_version(name, version).await?,
        None => packages.delete_package(name).await?,
    }
    invalidate_cache(session, name).await;

    output.success(&format!("Deleted {}", target));
    Ok(true)
}

async fn batch_delete(session: &Session, packages: &[String], batch: &BatchArgs, force: bool) -> Result<bool> {
    // Checked once for the whole list, before any prompt or request.
    session.client().require_credentials()?;
    let executor = BatchExecutor::new(batch.parallel, batch.workers)?
        .with_cancel(session.cancel_flag().clone());

    let output = session.logger();
    if !force {
        output.warning(&format!(
            "You are about to delete these packages: {}. This cannot be undone.",
            packages.join(", ")
        ));
        if !prompt::confirm("Continue?")? {
            output.info("Deletion cancelled.");
            return Ok(true);
        }
    }

    output.section("Batch delete");
    output.info(&format!("Deleting {} packages", packages.len()));

    let ops = &session.packages();
    let results = executor
        .run(packages, move |name| async move {
            ops.delete_package(name).await?;
            invalidate_cache(session, name).await;
            Ok::<_, RegistryError>(name.clone())
        })
        .await;

    report(output, packages, &results, |name| format!("{} deleted", name));

    let summary = BatchSummary::from_results(&results);
    output.info(&format!(
        "Batch delete finished in {}: {} packages deleted",
        output.format_duration(output.elapsed()),
        summary
    ));
    Ok(summary.all_succeeded())
}

/// One line per item, in input order
fn report<T>(output: &Logger, items: &[String], results: &[BatchResult<T>], describe: impl Fn(&T) -> String) {
    for result in results {
        match &result.outcome {
            Ok(value) => output.item(true, &describe(value)),
            Err(e) => output.item(false, &format!("{} failed: {}", items[result.index], e)),
        }
    }
}

async fn config_command(session: &mut Session, args: &ConfigArgs) -> Result<bool> {
    if args.show {
        let config = session.config();
        let output = session.logger();
        let mut rows = vec![("API URL", config.api_url.clone())];
        match &config.credentials {
            Some(creds) => {
                rows.push(("User ID", creds.user_id.clone()));
                rows.push(("API key", creds.masked_api_key()));
                rows.push(("Username", non_empty_or_na(&creds.username)));
            }
            None => {
                rows.push(("User ID", "not logged in".to_string()));
                rows.push(("API key", "not logged in".to_string()));
                rows.push(("Username", "not logged in".to_string()));
            }
        }
        rows.push(("Config dir", session.paths().config_dir.display().to_string()));
        output.summary_kv("Configuration", &rows);
    } else if let Some(url) = &args.set_api {
        session.set_api_url(url)?;
        session.logger().success(&format!("API URL set to {}", url.trim()));
    } else if args.clear_cache {
        let removed = session.cache().clear().await?;
        session
            .logger()
            .success(&format!("Cache cleared ({} entries removed)", removed));
    }
    Ok(true)
}

async fn delete_account(session: &mut Session, force: bool) -> Result<bool> {
    let credentials = session.client().require_credentials()?.clone();
    let username = if credentials.username.is_empty() {
        credentials.user_id.clone()
    } else {
        credentials.username.clone()
    };

    if !force {
        let output = session.logger();
        output.warning(
            "You are about to delete your account. This cannot be undone and your packages can no longer be managed.",
        );
        if !prompt::confirm_typed("Type your username to confirm", &username)? {
            output.info("Username does not match. Account deletion cancelled.");
            return Ok(true);
        }
    }

    session.auth().delete_account().await?;
    session.clear_credentials()?;
    session
        .logger()
        .success(&format!("Account {} deleted. Thank you for using GloPM.", username));
    Ok(true)
}

async fn invalidate_cache(session: &Session, name: &str) {
    if let Err(e) = session.cache().invalidate(name).await {
        session
            .logger()
            .warning(&format!("Could not clear cached data for {}: {}", name, e));
    }
}

fn non_empty_or_na(value: &str) -> String {
    if value.trim().is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        value.to_string()
    }
}
