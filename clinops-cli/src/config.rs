//! Configuration for the `clinops` command line tool.
//!
//! Configuration is loaded from the following sources, in order of increasing precedence:
//!
//! 1. Defaults
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Environment variables (prefixed with `CLINOPS__`)
//!
//! See [`Config`] for a description of all sections and their defaults.
//!
//! # Environment Variables
//!
//! Environment variables use `CLINOPS__` as a prefix and double underscores (`__`) to denote
//! nested configuration structures. For example:
//!
//! - `CLINOPS__WAREHOUSE__ACCOUNT=myorg-myaccount` sets the warehouse account
//! - `CLINOPS__WAREHOUSE__TOKEN=...` sets the SQL API access token
//! - `CLINOPS__SIMULATION__CONCURRENCY=20` sets the number of concurrent dashboards
//!
//! # YAML Configuration File
//!
//! The above configuration in YAML format would look like this:
//!
//! ```yaml
//! warehouse:
//!   account: myorg-myaccount
//!   token: ...
//!
//! simulation:
//!   concurrency: 20
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDateTime;
use clinops_loadtest::{LoadPlan, SlaPolicy};
use clinops_synth::{GenerateResult, SyntheticGenerator};
use clinops_warehouse::WarehouseConfig;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "CLINOPS__";

/// Log output format.
///
/// Controls how log messages are formatted. The format can be explicitly specified or
/// auto-detected based on whether output is to a TTY.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Compact output with colors.
    ///
    /// ```text
    ///  INFO clinops_synth::generator: generated patients count=10000
    /// ```
    Pretty,

    /// Simplified plain text output.
    ///
    /// ```text
    /// 2025-03-04T12:10:32.120Z  INFO clinops_synth::generator: generated patients count=10000
    /// ```
    Simplified,

    /// Dump out JSON lines.
    ///
    /// ```text
    /// {"timestamp":"2025-03-04T12:11:08.729716Z","level":"INFO","count":10000,"message":"generated patients","target":"clinops_synth::generator"}
    /// ```
    Json,
}

/// The logging format parse error.
#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"error parsing "{}" as format: expected one of "auto", "pretty", "simplified", "json""#,
            self.0
        )
    }
}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "" => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("auto") => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            s if s.eq_ignore_ascii_case("simplified") => LogFormat::Simplified,
            s if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            s => return Err(FormatParseError(s.into())),
        };

        Ok(result)
    }
}

impl std::error::Error for FormatParseError {}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr, so they never mix with reports printed to stdout.
#[derive(Debug, Deserialize, Serialize)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable takes precedence and allows per-module overrides.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `CLINOPS__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format. See [`LogFormat`] for available options.
    ///
    /// # Default
    ///
    /// `Auto` (pretty for TTY, simplified otherwise)
    ///
    /// # Environment Variable
    ///
    /// `CLINOPS__LOGGING__FORMAT`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Settings of the dashboard load simulation.
#[derive(Debug, Deserialize, Serialize)]
pub struct Simulation {
    /// Number of dashboards opened at the same time per iteration.
    ///
    /// # Default
    ///
    /// `10`
    pub concurrency: usize,

    /// Number of dashboard iterations.
    ///
    /// # Default
    ///
    /// `5`
    pub dashboard_iterations: usize,

    /// Number of refreshes of the operational dashboard after the dashboard phase.
    ///
    /// # Default
    ///
    /// `10`
    pub operational_iterations: usize,

    /// Pause between two operational refreshes.
    ///
    /// # Default
    ///
    /// `500ms`
    #[serde(with = "humantime_serde")]
    pub operational_delay: Duration,

    /// Latency a query has to stay under to count towards the SLA, in milliseconds.
    ///
    /// # Default
    ///
    /// `100`
    pub latency_threshold_ms: f64,

    /// Share of queries that must stay under the threshold, in percent.
    ///
    /// # Default
    ///
    /// `95`
    pub sla_target_pct: f64,

    /// Directory the results CSV is written to.
    ///
    /// # Default
    ///
    /// The current directory.
    pub output_dir: PathBuf,
}

impl Simulation {
    /// The load plan described by this section.
    pub fn plan(&self, query_timeout: Duration) -> LoadPlan {
        LoadPlan::builder()
            .concurrency(self.concurrency)
            .dashboard_iterations(self.dashboard_iterations)
            .operational(self.operational_iterations, self.operational_delay)
            .query_timeout(query_timeout)
            .build()
    }

    /// The SLA the report is evaluated against.
    pub fn policy(&self) -> SlaPolicy {
        SlaPolicy {
            threshold_ms: self.latency_threshold_ms,
            target_pct: self.sla_target_pct,
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            concurrency: 10,
            dashboard_iterations: 5,
            operational_iterations: 10,
            operational_delay: Duration::from_millis(500),
            latency_threshold_ms: 100.0,
            sla_target_pct: 95.0,
            output_dir: PathBuf::from("."),
        }
    }
}

/// Settings of the synthetic record generator.
#[derive(Debug, Deserialize, Serialize)]
pub struct Synth {
    /// Number of patients to generate.
    ///
    /// # Default
    ///
    /// `10000`
    pub patients: usize,

    /// Mean number of encounters per patient.
    ///
    /// # Default
    ///
    /// `5.0`
    pub encounters_per_patient: f64,

    /// Mean number of lab results per lab-ordering encounter.
    ///
    /// # Default
    ///
    /// `3.0`
    pub labs_per_encounter: f64,

    /// Seed of the random number generator. Equal seeds and `as_of` produce equal data sets; an
    /// unset `as_of` follows the clock, so dates shift between runs.
    ///
    /// # Default
    ///
    /// `42`
    pub seed: u64,

    /// Point in time all generated dates are relative to.
    ///
    /// # Default
    ///
    /// `None` (the current UTC time)
    pub as_of: Option<NaiveDateTime>,

    /// Directory the CSV files are written to.
    ///
    /// # Default
    ///
    /// `data`
    pub output_dir: PathBuf,

    /// Number of records per `INSERT` statement when loading into the warehouse.
    ///
    /// # Default
    ///
    /// `100`
    pub batch_size: usize,
}

impl Synth {
    /// Creates a generator with the settings of this section.
    pub fn generator(&self) -> GenerateResult<SyntheticGenerator> {
        let mut builder = SyntheticGenerator::builder()
            .seed(self.seed)
            .patients(self.patients)
            .encounters_per_patient(self.encounters_per_patient)
            .labs_per_encounter(self.labs_per_encounter);
        if let Some(as_of) = self.as_of {
            builder = builder.as_of(as_of);
        }
        builder.build()
    }
}

impl Default for Synth {
    fn default() -> Self {
        Self {
            patients: 10_000,
            encounters_per_patient: 5.0,
            labs_per_encounter: 3.0,
            seed: 42,
            as_of: None,
            output_dir: PathBuf::from("data"),
            batch_size: clinops_synth::load::DEFAULT_BATCH_SIZE,
        }
    }
}

/// Settings of the cost monitor.
#[derive(Debug, Deserialize, Serialize)]
pub struct Cost {
    /// Number of days covered by the per-warehouse cost breakdown.
    ///
    /// # Default
    ///
    /// `7`
    pub days: u32,

    /// A day is anomalous when its credits exceed this multiple of the 30-day average.
    ///
    /// # Default
    ///
    /// `2.0`
    pub anomaly_multiplier: f64,
}

impl Default for Cost {
    fn default() -> Self {
        Self {
            days: 7,
            anomaly_multiplier: 2.0,
        }
    }
}

/// Main configuration struct for the `clinops` tool.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Warehouse connection.
    ///
    /// # Environment Variables
    ///
    /// - `CLINOPS__WAREHOUSE__ACCOUNT`
    /// - `CLINOPS__WAREHOUSE__TOKEN`
    /// - `CLINOPS__WAREHOUSE__WAREHOUSES__INTERACTIVE`
    /// - ...
    pub warehouse: WarehouseConfig,

    /// Logging configuration.
    pub logging: Logging,

    /// Dashboard load simulation.
    pub simulation: Simulation,

    /// Synthetic record generation.
    pub synth: Synth,

    /// Cost monitoring.
    pub cost: Cost,
}

impl Config {
    /// Loads configuration from the provided file and the environment.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if provided)
    /// 3. Environment variables (prefixed with `CLINOPS__`)
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML file cannot be read or parsed, or if any value is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn defaults_without_sources() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert_eq!(config.simulation.concurrency, 10);
            assert_eq!(config.simulation.dashboard_iterations, 5);
            assert_eq!(config.simulation.operational_delay, Duration::from_millis(500));
            assert_eq!(config.synth.patients, 10_000);
            assert_eq!(config.synth.output_dir, Path::new("data"));
            assert_eq!(config.cost.days, 7);
            assert_eq!(config.logging.level, LevelFilter::INFO);
            assert!(config.warehouse.token.is_none());

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CLINOPS__WAREHOUSE__ACCOUNT", "myorg-myaccount");
            jail.set_env("CLINOPS__WAREHOUSE__TOKEN", "abcde");
            jail.set_env("CLINOPS__WAREHOUSE__WAREHOUSES__INTERACTIVE", "FAST_WH");
            jail.set_env("CLINOPS__SIMULATION__CONCURRENCY", "20");
            jail.set_env("CLINOPS__SIMULATION__OPERATIONAL_DELAY", "2s");
            jail.set_env("CLINOPS__SYNTH__AS_OF", "2024-06-01T12:00:00");
            jail.set_env("CLINOPS__LOGGING__LEVEL", "debug");
            jail.set_env("CLINOPS__LOGGING__FORMAT", "json");

            let config = Config::load(None).unwrap();

            assert_eq!(dbg!(&config).warehouse.account, "myorg-myaccount");
            assert_eq!(
                config.warehouse.token.as_ref().unwrap().expose_secret().as_str(),
                "abcde"
            );
            assert_eq!(config.warehouse.warehouses.interactive, "FAST_WH");
            assert_eq!(config.simulation.concurrency, 20);
            assert_eq!(config.simulation.operational_delay, Duration::from_secs(2));
            assert_eq!(
                config.synth.as_of.unwrap().to_string(),
                "2024-06-01 12:00:00"
            );
            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.logging.format, LogFormat::Json);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            warehouse:
                account: myorg-myaccount
                query_timeout: 1m
            simulation:
                dashboard_iterations: 2
                latency_threshold_ms: 250
            cost:
                days: 14
                anomaly_multiplier: 3.5
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(dbg!(&config).warehouse.account, "myorg-myaccount");
            assert_eq!(config.warehouse.query_timeout, Duration::from_secs(60));
            assert_eq!(config.simulation.dashboard_iterations, 2);
            assert_eq!(config.simulation.policy().threshold_ms, 250.0);
            assert_eq!(config.cost.days, 14);
            assert_eq!(config.cost.anomaly_multiplier, 3.5);
            // untouched sections keep their defaults
            assert_eq!(config.simulation.concurrency, 10);

            Ok(())
        });
    }

    #[test]
    fn configured_with_env_and_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            synth:
                patients: 500
                seed: 7
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("CLINOPS__SYNTH__PATIENTS", "25");

            let config = Config::load(Some(tempfile.path())).unwrap();

            // Env should overwrite the yaml config
            assert_eq!(config.synth.patients, 25);
            assert_eq!(config.synth.seed, 7);

            Ok(())
        });
    }

    #[test]
    fn rejects_unknown_log_format() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CLINOPS__LOGGING__FORMAT", "xml");
            assert!(Config::load(None).is_err());
            Ok(())
        });
    }

    #[test]
    fn parses_log_format() {
        assert_eq!("".parse::<LogFormat>().unwrap(), LogFormat::Auto);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn simulation_builds_plan() {
        let simulation = Simulation {
            concurrency: 4,
            dashboard_iterations: 3,
            ..Default::default()
        };

        let plan = simulation.plan(Duration::from_secs(5));
        assert_eq!(plan.concurrency(), 4);
        assert_eq!(plan.sessions(), 12);
    }
}
