use std::path::PathBuf;

use clap::Parser;

use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "drive-describe",
    about = "Describe media in a Google Drive folder with Gemini"
)]
pub struct Cli {
    /// Source Drive folder ID
    #[arg(long)]
    pub folder: String,

    /// Local folder that receives downloaded files
    #[arg(long, default_value = "local")]
    pub local: PathBuf,

    /// Max files to process, useful for a small batch (0 = no limit)
    #[arg(long, default_value_t = 0)]
    pub max: usize,

    /// GCS bucket to mirror into (default: <PROJECT_ID>-media)
    #[arg(long)]
    pub gcs_bucket: Option<String>,

    /// Object prefix inside the GCS bucket
    #[arg(long, default_value = "")]
    pub gcs_path: String,

    /// Upload to GCS even when the object already exists
    #[arg(long)]
    pub always_upload: bool,

    /// Describe each asset with Gemini (`--describe=false` to skip)
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub describe: bool,

    /// Custom prompt template file. Supports `{{.ImageName}}`, `{{- -}}`
    /// trim markers and `{{/* */}}` comments
    #[arg(long)]
    pub prompt: Option<PathBuf>,

    /// Comma-separated list of MIME types to process
    #[arg(long, value_delimiter = ',', default_value = "image/jpeg,image/png")]
    pub mime_types: Vec<String>,

    /// Generative model ID
    #[arg(long, default_value = "gemini-2.0-flash")]
    pub model: String,

    /// Max assets in flight at once (0 = one task per asset)
    #[arg(long, default_value_t = 0)]
    pub concurrency: usize,

    /// CSV report file
    #[arg(long, default_value = "descriptions.csv")]
    pub output: PathBuf,

    /// OAuth token cache file
    #[arg(long, default_value = "token.json")]
    pub token_file: PathBuf,

    /// Paste the authorization code instead of using the local callback
    #[arg(long)]
    pub manual_auth: bool,

    /// Use this OAuth access token instead of the cached/interactive one.
    /// Prefer the ACCESS_TOKEN environment variable; flags are visible in
    /// process listings.
    #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Google Cloud project ID
    #[arg(long, env = "PROJECT_ID")]
    pub project_id: String,

    /// Google Cloud region for the model endpoint
    #[arg(long, env = "LOCATION", default_value = "us-central1")]
    pub location: String,

    /// OAuth client-secret JSON file
    #[arg(long = "credentials", env = "GOOGLE_CREDENTIALS")]
    pub credentials: PathBuf,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Disable progress bar
    #[arg(long)]
    pub no_progress_bar: bool,
}
