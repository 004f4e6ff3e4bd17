#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive handed to `EnvFilter` when `RUST_LOG` is not set.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// How an authorization code is obtained when no cached token exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Open the consent page in a browser and catch the redirect locally.
    BrowserCallback,
    /// Print the consent URL and read the pasted code from stdin.
    ManualCode,
    /// Use an access token handed to us on the command line.
    Presupplied(String),
}
