//! Spectrum CLI commands
//!
//! ## Commands
//!
//! - `spectrum payload` - Print the backend payload for a set of filters
//! - `spectrum mine` - Load an event log, apply filters, print mined spectra
//! - `spectrum export` - Export the filtered event log and download it
//!
//! Exit codes: 0 on success, 1 on invalid usage of a configuration or view,
//! 2 when the mining backend fails, 3 when the config file is unusable.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use spectrum_backend_client::HttpMiningBackend;
use spectrum_core::BackendError;
use spectrum_core::ConfigurationId;
use spectrum_core::ErrorCategory;
use spectrum_core::EventLogId;
use spectrum_core::MiningBackend;
use spectrum_core::PayloadBuilder;
use spectrum_core::Scope;
use spectrum_core::Session;
use spectrum_core::SpectrumConfig;
use spectrum_core::SpectrumError;
use spectrum_core::filters::variant_segments;
use spectrum_core::notice::GENERIC_ERROR_TEXT;

use crate::filter_args::FilterArgs;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_BACKEND: i32 = 2;
pub const EXIT_CONFIG: i32 = 3;

/// Explore performance spectra of a process mining backend
#[derive(Debug, Parser)]
#[command(name = "spectrum", version)]
pub struct Cli {
    /// Config file (overrides SPECTRUM_EXPLORER_CONFIG)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides the config file)
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the mined-data payload the filters produce, without contacting
    /// the backend
    Payload(PayloadArgs),

    /// Load an event log, apply the filters and print the mined spectra
    Mine(MineArgs),

    /// Export the filtered event log and download the archive
    Export(ExportArgs),
}

#[derive(Debug, Parser)]
pub struct PayloadArgs {
    #[command(flatten)]
    pub filters: FilterArgs,
}

#[derive(Debug, Parser)]
pub struct MineArgs {
    /// Event log id
    #[arg(long, value_name = "ID")]
    pub log: EventLogId,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Output the mined data as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct ExportArgs {
    /// Event log id
    #[arg(long, value_name = "ID")]
    pub log: EventLogId,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Destination file (default: the download name in the current directory)
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

/// A mining request failed; the text is the notice shown to the user.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct FetchFailed(String);

impl Cli {
    pub async fn run(self) -> i32 {
        match self.execute().await {
            Ok(()) => EXIT_SUCCESS,
            Err(err) => {
                let code = exit_code(&err);
                tracing::debug!(code, "command failed");
                eprintln!("error: {err:#}");
                code
            }
        }
    }

    pub async fn execute(self) -> anyhow::Result<()> {
        let config = self.load_config()?;
        match self.command {
            Command::Payload(args) => run_payload(&config, &args),
            Command::Mine(args) => run_mine(&config, &args).await,
            Command::Export(args) => run_export(&config, &args).await,
        }
    }

    fn load_config(&self) -> spectrum_core::Result<SpectrumConfig> {
        let mut config = match &self.config {
            Some(path) => SpectrumConfig::load_from_path(path)?,
            None => SpectrumConfig::load()?,
        };
        if let Some(base_url) = &self.base_url {
            config.backend.base_url = base_url.clone();
        }
        Ok(config)
    }
}

pub fn exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<FetchFailed>().is_some() || err.downcast_ref::<BackendError>().is_some()
    {
        return EXIT_BACKEND;
    }
    match err.downcast_ref::<SpectrumError>().map(SpectrumError::category) {
        Some(ErrorCategory::BackendError) => EXIT_BACKEND,
        Some(ErrorCategory::ConfigError) => EXIT_CONFIG,
        Some(ErrorCategory::ConfigurationError | ErrorCategory::EventLogError) | None => {
            EXIT_FAILURE
        }
    }
}

fn run_payload(config: &SpectrumConfig, args: &PayloadArgs) -> anyhow::Result<()> {
    let builder = PayloadBuilder::new(config.payload.offset()?);
    let payload = builder.full_payload(&args.filters.snapshot());
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

async fn run_mine(config: &SpectrumConfig, args: &MineArgs) -> anyhow::Result<()> {
    let session = open_session(config)?;
    let id = session.load_event_log(args.log).await?;
    apply_filters(&session, id, &args.filters).await?;

    let data = session
        .configuration_data(id)
        .await?
        .ok_or_else(|| FetchFailed(GENERIC_ERROR_TEXT.to_string()))?;
    ensure_healthy(&session, id).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&*data)?);
        return Ok(());
    }

    let labels = variant_segments(&args.filters.variant);
    println!("event log {}, configuration {id}", args.log);
    for (index, spectrum) in data.spectra.iter().enumerate() {
        let label = labels
            .get(index)
            .map(|segment| format!(" [{}]", segment.label))
            .unwrap_or_default();
        let cases = data.cases_of_spectrum(index).len();
        let empty = if spectrum.empty { " (empty)" } else { "" };
        println!("spectrum {index}{label}: {cases} cases{empty}");
    }
    Ok(())
}

async fn run_export(config: &SpectrumConfig, args: &ExportArgs) -> anyhow::Result<()> {
    let session = open_session(config)?;
    let id = session.load_event_log(args.log).await?;
    apply_filters(&session, id, &args.filters).await?;

    let artifact = session.export(id).await?;
    let out = match &args.out {
        Some(out) => out.clone(),
        None => default_export_path(&artifact.file_name)?,
    };
    tokio::fs::write(&out, &artifact.bytes)
        .await
        .with_context(|| format!("failed to write {}", out.display()))?;
    println!("wrote {} bytes to {}", artifact.bytes.len(), out.display());
    Ok(())
}

/// The download token names the file, but only its last component is used so
/// the server can't place it outside the working directory.
fn default_export_path(token: &str) -> anyhow::Result<PathBuf> {
    match Path::new(token).file_name() {
        Some(name) => Ok(PathBuf::from(name)),
        None => anyhow::bail!("download token '{token}' does not name a file; pass --out"),
    }
}

fn open_session(config: &SpectrumConfig) -> anyhow::Result<Session<HttpMiningBackend>> {
    let backend = HttpMiningBackend::new(&config.backend)?;
    tracing::debug!(base_url = backend.base_url(), "using mining backend");
    Ok(Session::new(Arc::new(backend), config)?)
}

/// Apply the filters the way a user would: the exclusive filter first, on
/// top of the data it narrows, then the rest.
async fn apply_filters<B>(
    session: &Session<B>,
    id: ConfigurationId,
    filters: &FilterArgs,
) -> anyhow::Result<()>
where
    B: MiningBackend + ?Sized,
{
    if let Some(exclusive) = filters.exclusive() {
        session.configuration_data(id).await?;
        ensure_healthy(session, id).await?;
        session.set_filter(id, Scope::Global, exclusive).await?;
    }
    if let Some(manual) = filters.manual() {
        session.set_filter(id, Scope::Global, manual).await?;
    }
    if let Some(range) = filters.date_range() {
        session.set_filter(id, Scope::Global, range).await?;
    }

    let spectrum_filters = filters.spectrum_filters();
    if !spectrum_filters.is_empty() {
        session.set_active_spectrum(id, filters.spectrum).await?;
        for filter in spectrum_filters {
            session
                .set_filter(id, Scope::Spectrum(filters.spectrum), filter)
                .await?;
        }
    }
    ensure_healthy(session, id).await
}

async fn ensure_healthy<B>(session: &Session<B>, id: ConfigurationId) -> anyhow::Result<()>
where
    B: MiningBackend + ?Sized,
{
    if session.with_configuration(id, |state| state.has_error()).await? {
        let text = session
            .notice()
            .await
            .map(|notice| notice.text)
            .unwrap_or_else(|| GENERIC_ERROR_TEXT.to_string());
        return Err(FetchFailed(text).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;
    use wiremock::matchers::method;
    use wiremock::matchers::path;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("spectrum").chain(args.iter().copied()))
            .expect("parse")
    }

    fn write_config(dir: &tempfile::TempDir, base_url: &str) -> String {
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            format!("[backend]\nbase_url = \"{base_url}\"\nrequest_timeout_secs = 5\n"),
        )
        .expect("write config");
        path.display().to_string()
    }

    async fn mining_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/event-log/3/data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 3})))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = cli(&["mine", "--log", "3", "--json", "--base-url", "http://x"]);
        assert_eq!(cli.base_url.as_deref(), Some("http://x"));
        match cli.command {
            Command::Mine(args) => {
                assert_eq!(args.log, 3);
                assert!(args.json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn exit_codes_follow_error_category() {
        let backend: anyhow::Error = SpectrumError::Backend(BackendError::Transport("x".into())).into();
        assert_eq!(exit_code(&backend), EXIT_BACKEND);

        let config: anyhow::Error = SpectrumError::config("bad").into();
        assert_eq!(exit_code(&config), EXIT_CONFIG);

        let fetch: anyhow::Error = FetchFailed("down".into()).into();
        assert_eq!(exit_code(&fetch), EXIT_BACKEND);

        assert_eq!(exit_code(&anyhow::anyhow!("other")), EXIT_FAILURE);
    }

    #[test]
    fn export_path_keeps_only_the_token_file_name() {
        assert_eq!(
            default_export_path("log_3.zip").expect("plain token"),
            PathBuf::from("log_3.zip")
        );
        assert_eq!(
            default_export_path("../escape.zip").expect("traversal token"),
            PathBuf::from("escape.zip")
        );
        assert_eq!(
            default_export_path("/tmp/nested/escape.zip").expect("absolute token"),
            PathBuf::from("escape.zip")
        );
        assert!(default_export_path("..").is_err());
        assert!(default_export_path("").is_err());
    }

    #[tokio::test]
    async fn missing_config_file_exits_with_config_code() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("absent.toml").display().to_string();
        let code = cli(&["--config", &missing, "payload"]).run().await;
        assert_eq!(code, EXIT_CONFIG);
    }

    #[tokio::test]
    async fn mine_applies_filters_through_the_backend() {
        let server = mining_server().await;
        Mock::given(method("POST"))
            .and(path("/api/event-log/3/mined-data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "spectra": [{"records": [{"case_ID": "c1"}], "empty": false}],
                "event_log": {}
            })))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().expect("temp dir");
        let config = write_config(&dir, &server.uri());

        let code = cli(&["--config", &config, "mine", "--log", "3", "--cases", "c1"])
            .run()
            .await;
        assert_eq!(code, EXIT_SUCCESS);

        let requests = server.received_requests().await.expect("requests");
        let last = requests.last().expect("mined-data request");
        let body = last.body_json::<serde_json::Value>().expect("json body");
        assert_eq!(body["global_filters"]["cases"], json!(["c1"]));
    }

    #[tokio::test]
    async fn mine_reports_backend_failure() {
        let server = mining_server().await;
        Mock::given(method("POST"))
            .and(path("/api/event-log/3/mined-data"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().expect("temp dir");
        let config = write_config(&dir, &server.uri());

        let code = cli(&["--config", &config, "mine", "--log", "3"]).run().await;
        assert_eq!(code, EXIT_BACKEND);
    }

    #[tokio::test]
    async fn export_writes_downloaded_archive() {
        let server = mining_server().await;
        Mock::given(method("POST"))
            .and(path("/api/event-log/3/mined-data/export"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!("log_3.zip")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/download/log_3.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK".to_vec()))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().expect("temp dir");
        let config = write_config(&dir, &server.uri());
        let out = dir.path().join("out.zip");

        let code = cli(&[
            "--config",
            &config,
            "export",
            "--log",
            "3",
            "--out",
            &out.display().to_string(),
        ])
        .run()
        .await;

        assert_eq!(code, EXIT_SUCCESS);
        assert_eq!(std::fs::read(&out).expect("read export"), b"PK");
    }
}
