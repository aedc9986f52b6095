use crate::config::Config;
use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// Socket and HTTP stack modules that log every frame and request at Debug.
const TRANSPORT_MODULES: &[&str] = &[
    "tungstenite",
    "tokio_tungstenite",
    "reqwest",
    "hyper",
    "rustls",
    "mio",
];

pub struct Logger {}

impl Logger {
    /// Install the terminal logger at `config.log_level_filter`.
    ///
    /// The transport stack only shows up at Trace, where the frames are the point.
    pub fn init_logger(config: &Config) {
        let level = config.log_level_filter;
        if let Err(e) = TermLogger::init(
            level,
            Self::build_log_config(level),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ) {
            eprintln!("Logger already initialized: {e}");
        }
    }

    /// Modules muted at `level`.
    fn muted_modules(level: LevelFilter) -> &'static [&'static str] {
        match level {
            LevelFilter::Trace => &[],
            _ => TRANSPORT_MODULES,
        }
    }

    fn build_log_config(level: LevelFilter) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();
        for module in Self::muted_modules(level) {
            builder.add_filter_ignore_str(module);
        }
        builder.build()
    }
}
