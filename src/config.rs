use std::path::PathBuf;

use crate::types::AuthMode;

/// Application configuration, built once from the command line and passed
/// by reference into every component.
pub struct Config {
    // Source
    pub folder_id: String,
    pub mime_types: Vec<String>,
    pub max_assets: Option<usize>,

    // Local cache
    pub local_folder: PathBuf,

    // Mirror
    pub gcs_bucket: String,
    pub gcs_path: String,
    pub always_upload: bool,

    // Describer
    pub describe: bool,
    pub prompt_template: Option<PathBuf>,
    pub model: String,

    // Google Cloud
    pub project_id: String,
    pub location: String,
    pub client_secret_path: PathBuf,

    // Auth
    pub token_file: PathBuf,
    pub auth_mode: AuthMode,

    // Output
    pub output: PathBuf,
    pub concurrency: Option<usize>,
    pub no_progress_bar: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let auth_mode = match &self.auth_mode {
            AuthMode::Presupplied(_) => "Presupplied(<redacted>)",
            AuthMode::BrowserCallback => "BrowserCallback",
            AuthMode::ManualCode => "ManualCode",
        };
        f.debug_struct("Config")
            .field("folder_id", &self.folder_id)
            .field("mime_types", &self.mime_types)
            .field("max_assets", &self.max_assets)
            .field("local_folder", &self.local_folder)
            .field("gcs_bucket", &self.gcs_bucket)
            .field("gcs_path", &self.gcs_path)
            .field("describe", &self.describe)
            .field("model", &self.model)
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("auth_mode", &auth_mode)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_cli(cli: crate::cli::Cli) -> anyhow::Result<Self> {
        let project_id = cli.project_id.trim().to_string();
        if project_id.is_empty() {
            anyhow::bail!(
                "Please provide PROJECT_ID, e.g. export PROJECT_ID=$(gcloud config get-value core/project)"
            );
        }
        if cli.credentials.as_os_str().is_empty() {
            anyhow::bail!("GOOGLE_CREDENTIALS not set");
        }
        if cli.folder.trim().is_empty() {
            anyhow::bail!("--folder must not be empty");
        }

        let mime_types = normalize_mime_types(&cli.mime_types);
        if mime_types.is_empty() {
            anyhow::bail!("--mime-types must name at least one MIME type");
        }

        let location = match cli.location.trim() {
            "" => "us-central1".to_string(),
            other => other.to_string(),
        };

        let gcs_bucket = cli
            .gcs_bucket
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| default_bucket(&project_id));

        let auth_mode = match cli.access_token.filter(|t| !t.trim().is_empty()) {
            Some(token) => AuthMode::Presupplied(token),
            None if cli.manual_auth => AuthMode::ManualCode,
            None => AuthMode::BrowserCallback,
        };

        Ok(Self {
            folder_id: cli.folder,
            mime_types,
            max_assets: (cli.max > 0).then_some(cli.max),
            local_folder: cli.local,
            gcs_bucket,
            gcs_path: cli.gcs_path,
            always_upload: cli.always_upload,
            describe: cli.describe,
            prompt_template: cli.prompt,
            model: cli.model,
            project_id,
            location,
            client_secret_path: cli.credentials,
            token_file: cli.token_file,
            auth_mode,
            output: cli.output,
            concurrency: (cli.concurrency > 0).then_some(cli.concurrency),
            no_progress_bar: cli.no_progress_bar,
        })
    }
}

/// Mirror bucket used when `--gcs-bucket` is not given.
fn default_bucket(project_id: &str) -> String {
    format!("{}-media", project_id)
}

/// Trim entries, drop blanks, and drop duplicates while keeping order.
fn normalize_mime_types(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for entry in raw {
        let trimmed = entry.trim();
        if trimmed.is_empty() || out.iter().any(|m| m == trimmed) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}
