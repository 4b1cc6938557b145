use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::time::Duration;

/// Header a trusted upstream (auth proxy) uses to pass the resolved user id.
pub const DEFAULT_USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Seconds between keep-alive comments written to every open stream
    #[arg(long, env, default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..))]
    pub heartbeat_interval_secs: u64,

    /// Reconnection delay hint (milliseconds) sent to clients after the handshake; 0 disables it
    #[arg(long, env, default_value_t = 3000)]
    pub client_retry_millis: u64,

    /// Request header carrying the user id resolved by the upstream session layer
    #[arg(long, env, default_value = DEFAULT_USER_ID_HEADER)]
    user_id_header: String,

    /// Shared key mutation services must present in `x-internal-key` to publish events
    #[arg(long, env)]
    internal_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Returns the reconnection hint, or `None` when disabled.
    pub fn client_retry(&self) -> Option<Duration> {
        (self.client_retry_millis > 0).then(|| Duration::from_millis(self.client_retry_millis))
    }

    pub fn user_id_header(&self) -> &str {
        &self.user_id_header
    }

    pub fn internal_api_key(&self) -> Option<&str> {
        self.internal_api_key.as_deref()
    }

    pub fn set_internal_api_key(mut self, key: impl Into<String>) -> Self {
        self.internal_api_key = Some(key.into());
        self
    }
}
