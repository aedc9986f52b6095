use api::ApiClientConfig;
use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use realtime::{parse_transports, ReconnectPolicy, SyncOptions};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_SOCKET_URL: &str = "http://localhost:5001";
pub const DEFAULT_CREDENTIALS_PATH: &str = ".taskboard/credentials.json";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Base URL of the REST API, including the `/api` prefix
    #[arg(long, env, default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Base URL of the realtime server
    #[arg(long, env, default_value = DEFAULT_SOCKET_URL)]
    pub socket_url: String,

    /// Transports to try, in order (comma separated: websocket, polling)
    #[arg(long, env, default_value = "websocket,polling")]
    pub transports: String,

    /// Milliseconds to wait for the realtime handshake before giving up on an attempt
    #[arg(long, env, default_value_t = 20_000)]
    pub handshake_timeout_ms: u64,

    /// Delay before the first reconnect attempt; doubles on each further attempt
    #[arg(long, env, default_value_t = 1000)]
    pub reconnect_base_delay_ms: u64,

    /// Reconnect attempts after an unexpected disconnect before giving up
    #[arg(long, env, default_value_t = 5)]
    pub max_reconnect_attempts: u32,

    /// Milliseconds after which a typing indicator with no refresh is dropped
    #[arg(long, env, default_value_t = 3000)]
    pub typing_expiry_ms: u64,

    /// File holding the bearer token and user record between runs
    #[arg(long, env, default_value = DEFAULT_CREDENTIALS_PATH)]
    pub credentials_path: PathBuf,

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

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Load variables from a `.env` file, if there is one, before flags are parsed.
pub fn load_dotenv() {
    dotenv().ok();
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        load_dotenv();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    /// Options for the realtime client. Fails on an unknown transport name.
    pub fn sync_options(&self) -> Result<SyncOptions, realtime::Error> {
        Ok(SyncOptions::default()
            .with_endpoint(self.socket_url.clone())
            .with_transports(parse_transports(&self.transports)?)
            .with_handshake_timeout(Duration::from_millis(self.handshake_timeout_ms))
            .with_reconnect(ReconnectPolicy::new(
                Duration::from_millis(self.reconnect_base_delay_ms),
                self.max_reconnect_attempts,
            ))
            .with_typing_expiry(Duration::from_millis(self.typing_expiry_ms)))
    }

    pub fn api_config(&self) -> ApiClientConfig {
        ApiClientConfig::default().with_base_url(self.api_url.clone())
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realtime::TransportKind;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["taskboard"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_build_default_sync_options() {
        let config = parse(&[]);
        let options = config.sync_options().unwrap();

        assert_eq!(options.endpoint, DEFAULT_SOCKET_URL);
        assert_eq!(
            options.transports,
            vec![TransportKind::WebSocket, TransportKind::Polling]
        );
        assert_eq!(options.handshake_timeout, Duration::from_millis(20_000));
        assert_eq!(options.reconnect, ReconnectPolicy::default());
        assert_eq!(options.typing_expiry, Duration::from_millis(3000));
        assert_eq!(config.api_config().base_url, DEFAULT_API_URL);
        assert_eq!(config.runtime_env(), RustEnv::Development);
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse(&[
            "--socket-url",
            "https://sync.example.com",
            "--transports",
            "polling",
            "--reconnect-base-delay-ms",
            "250",
            "--max-reconnect-attempts",
            "2",
            "--runtime-env",
            "PRODUCTION",
        ]);
        let options = config.sync_options().unwrap();

        assert_eq!(options.endpoint, "https://sync.example.com");
        assert_eq!(options.transports, vec![TransportKind::Polling]);
        assert_eq!(
            options.reconnect,
            ReconnectPolicy::new(Duration::from_millis(250), 2)
        );
        assert!(config.is_production());
    }

    #[test]
    fn test_unknown_transport_is_rejected() {
        let config = parse(&["--transports", "websocket,smoke-signals"]);
        assert!(config.sync_options().is_err());
    }

    #[test]
    fn test_runtime_env_round_trips_through_display() {
        for env in [RustEnv::Development, RustEnv::Production, RustEnv::Staging] {
            assert_eq!(env.to_string().parse::<RustEnv>(), Ok(env));
        }
        assert_eq!("qa".parse::<RustEnv>(), Err(RustEnvParseError));
    }
}
