use std::str::FromStr;

use ini::Ini;
use thiserror::Error;

use crate::utils::cli::Cli;
use crate::utils::types::Address;

static DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
static DEFAULT_PERIOD_MS: u64 = 1_000;
static DEFAULT_SUCCESSOR_COUNT: usize = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("a listen port is required (-p or `port` in the config file)")]
    MissingPort,
    #[error("seed address and seed port must be provided together or neither")]
    SeedPair,
    #[error("{name} must lie within 1..=60000 ms, got {value}")]
    PeriodOutOfRange { name: &'static str, value: u64 },
    #[error("the successor list needs room for at least one entry")]
    SuccessorCount,
    #[error("cannot load config file: {0}")]
    File(#[from] ini::Error),
    #[error("invalid value for `{key}` in config file: {value:?}")]
    BadFileValue { key: &'static str, value: String },
}

/// Fully resolved runtime options: CLI flags merged over the optional INI
/// file merged over defaults, then validated. Invalid configuration is
/// fatal at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,
    /// "host:port" of the ring member to join via; a new ring when absent.
    pub seed: Option<Address>,
    pub stabilize_ms: u64,
    pub fix_fingers_ms: u64,
    pub check_predecessor_ms: u64,
    pub successor_count: usize,
    pub id_override: Option<String>,
    pub http_address: Option<String>,
}

impl Config {
    pub fn listen_address(&self) -> Address {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn resolve(cli: Cli) -> Result<Config, ConfigError> {
        let file = match &cli.config {
            Some(path) => Some(Ini::load_from_file(path)?),
            None => None,
        };
        let file = FileDefaults { file: file.as_ref() };

        let config = Config {
            bind_address: cli
                .bind_address
                .or(file.string("address"))
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            port: cli
                .port
                .or(file.parsed("port")?)
                .ok_or(ConfigError::MissingPort)?,
            seed: resolve_seed(
                cli.join_address.or(file.string("seed_address")),
                cli.join_port.or(file.parsed("seed_port")?),
            )?,
            stabilize_ms: cli
                .stabilize_ms
                .or(file.parsed("stabilize_ms")?)
                .unwrap_or(DEFAULT_PERIOD_MS),
            fix_fingers_ms: cli
                .fix_fingers_ms
                .or(file.parsed("fix_fingers_ms")?)
                .unwrap_or(DEFAULT_PERIOD_MS),
            check_predecessor_ms: cli
                .check_predecessor_ms
                .or(file.parsed("check_predecessor_ms")?)
                .unwrap_or(DEFAULT_PERIOD_MS),
            successor_count: cli
                .successor_count
                .or(file.parsed("successor_count")?)
                .unwrap_or(DEFAULT_SUCCESSOR_COUNT),
            id_override: cli.id_override.or(file.string("id")),
            http_address: cli.http_address.or(file.string("http_address")),
        };

        check_period("stabilize period", config.stabilize_ms)?;
        check_period("fix-fingers period", config.fix_fingers_ms)?;
        check_period("check-predecessor period", config.check_predecessor_ms)?;
        if config.successor_count < 1 {
            return Err(ConfigError::SuccessorCount);
        }
        Ok(config)
    }
}

fn resolve_seed(
    address: Option<String>,
    port: Option<u16>,
) -> Result<Option<Address>, ConfigError> {
    match (address, port) {
        (Some(address), Some(port)) => Ok(Some(format!("{}:{}", address.trim(), port))),
        (None, None) => Ok(None),
        _ => Err(ConfigError::SeedPair),
    }
}

fn check_period(name: &'static str, value: u64) -> Result<(), ConfigError> {
    if !(1..=60_000).contains(&value) {
        return Err(ConfigError::PeriodOutOfRange { name, value });
    }
    Ok(())
}

/// Reads the `[node]` section of the INI file, if one was given.
struct FileDefaults<'a> {
    file: Option<&'a Ini>,
}

impl FileDefaults<'_> {
    fn string(&self, key: &'static str) -> Option<String> {
        self.file
            .and_then(|file| file.section(Some("node")))
            .and_then(|section| section.get(key))
            .map(|value| value.trim().to_string())
    }

    fn parsed<T: FromStr>(&self, key: &'static str) -> Result<Option<T>, ConfigError> {
        match self.string(key) {
            None => Ok(None),
            Some(value) => value
                .parse::<T>()
                .map(Some)
                .map_err(|_| ConfigError::BadFileValue { key, value }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_cli() -> Cli {
        Cli {
            bind_address: None,
            port: Some(4600),
            join_address: None,
            join_port: None,
            stabilize_ms: None,
            fix_fingers_ms: None,
            check_predecessor_ms: None,
            successor_count: None,
            id_override: None,
            http_address: None,
            config: None,
        }
    }

    #[test]
    fn defaults_fill_the_gaps() {
        let config = Config::resolve(bare_cli()).unwrap();
        assert_eq!(config.listen_address(), "127.0.0.1:4600");
        assert_eq!(config.stabilize_ms, 1_000);
        assert_eq!(config.successor_count, 3);
        assert!(config.seed.is_none());
    }

    #[test]
    fn missing_port_is_fatal() {
        let mut cli = bare_cli();
        cli.port = None;
        assert!(matches!(
            Config::resolve(cli),
            Err(ConfigError::MissingPort)
        ));
    }

    #[test]
    fn seed_options_must_come_in_pairs() {
        let mut cli = bare_cli();
        cli.join_address = Some("127.0.0.1".into());
        assert!(matches!(Config::resolve(cli), Err(ConfigError::SeedPair)));

        let mut cli = bare_cli();
        cli.join_address = Some("127.0.0.1".into());
        cli.join_port = Some(4601);
        let config = Config::resolve(cli).unwrap();
        assert_eq!(config.seed.as_deref(), Some("127.0.0.1:4601"));
    }

    #[test]
    fn periods_are_range_checked() {
        let mut cli = bare_cli();
        cli.stabilize_ms = Some(0);
        assert!(matches!(
            Config::resolve(cli),
            Err(ConfigError::PeriodOutOfRange { .. })
        ));

        let mut cli = bare_cli();
        cli.fix_fingers_ms = Some(60_001);
        assert!(matches!(
            Config::resolve(cli),
            Err(ConfigError::PeriodOutOfRange { .. })
        ));
    }
}
