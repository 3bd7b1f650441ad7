//! Configuration for zmanimd with validation and default generation.
//!
//! Settings live in `zmanimd.toml` under `$XDG_CONFIG_HOME/zmanimd/` (or the
//! platform equivalent). When no configuration exists a commented template is
//! written and startup fails with instructions, because one field has no
//! sensible default: `geonameid`, the location the zmanim are computed for.
//! Without it the engine must never initialize its timers.
//!
//! ```toml
//! geonameid = 4887398        # GeoNames location id (required)
//! timezone = "America/Chicago"
//! refresh_interval = 5       # period re-evaluation interval in minutes (1-60)
//! verbose_logging = false    # periodic status report on/off
//! log_interval = 60          # status report interval in minutes (1-1440)
//! fetch_time = "02:00:00"    # local wall-clock time of the daily fetch
//!
//! [switch_names]             # optional display-name overrides
//! chatzot = "Midday"
//! ```
//!
//! All range and format violations are startup errors with actionable
//! messages; nothing is silently clamped.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Deserialize;

use crate::provider::DEFAULT_PROVIDER_URL;
use crate::zman::Zman;

pub const DEFAULT_TIMEZONE: &str = "America/Chicago";
pub const DEFAULT_REFRESH_INTERVAL_MINUTES: u64 = 5;
pub const DEFAULT_LOG_INTERVAL_MINUTES: u64 = 60;
pub const DEFAULT_FETCH_TIME: &str = "02:00:00";

/// Raw configuration as deserialized from TOML. Optional fields fall back to
/// the defaults above through the accessor methods.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// GeoNames location id the provider computes zmanim for. Required.
    pub geonameid: Option<u32>,
    /// IANA time zone for the daily fetch schedule and status display.
    pub timezone: Option<String>,
    /// Minutes between period re-evaluations.
    pub refresh_interval: Option<u64>,
    /// Whether the periodic status report runs at all.
    pub verbose_logging: Option<bool>,
    /// Minutes between status reports (when verbose logging is on).
    pub log_interval: Option<u64>,
    /// Local wall-clock time (HH:MM:SS) of the daily marker fetch.
    pub fetch_time: Option<String>,
    /// Provider base URL override, mainly for testing.
    pub provider_url: Option<String>,
    /// Display-name overrides keyed by canonical marker name.
    pub switch_names: Option<BTreeMap<String, String>>,
}

impl Config {
    /// Load and validate configuration.
    ///
    /// With no explicit path, looks in the default location and writes a
    /// commented template there if nothing exists yet (then fails, since the
    /// template has no geonameid).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if !path.exists() {
            write_default_template(&path)?;
            bail!(
                "no configuration found; wrote a template to {}: set `geonameid` and restart",
                path.display()
            );
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// The default configuration file path.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("could not determine the configuration directory")?;
        Ok(base.join("zmanimd").join("zmanimd.toml"))
    }

    /// Check every field; called by [`load`](Self::load) but public so tests
    /// can exercise it on hand-built configs.
    pub fn validate(&self) -> Result<()> {
        if self.geonameid.is_none() {
            bail!("`geonameid` is required: the location id the zmanim are computed for");
        }

        let interval = self.refresh_interval();
        if !(1..=60).contains(&interval) {
            bail!("`refresh_interval` must be between 1 and 60 minutes, got {interval}");
        }

        let log_interval = self.log_interval();
        if !(1..=1440).contains(&log_interval) {
            bail!("`log_interval` must be between 1 and 1440 minutes, got {log_interval}");
        }

        self.timezone()?;
        self.fetch_time()?;

        if let Some(names) = &self.switch_names {
            for key in names.keys() {
                if Zman::from_key(key).is_none() {
                    bail!(
                        "`switch_names` contains unknown marker `{key}`; known markers: {}",
                        Zman::ALL.map(Zman::key).join(", ")
                    );
                }
            }
        }
        Ok(())
    }

    pub fn geonameid(&self) -> u32 {
        // validate() guarantees presence before anything runs.
        self.geonameid.unwrap_or_default()
    }

    pub fn timezone(&self) -> Result<Tz> {
        let name = self.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE);
        name.parse()
            .map_err(|_| anyhow!("`timezone` is not a valid IANA time zone: {name}"))
    }

    pub fn refresh_interval(&self) -> u64 {
        self.refresh_interval
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_MINUTES)
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_interval() * 60)
    }

    pub fn verbose_logging(&self) -> bool {
        self.verbose_logging.unwrap_or(false)
    }

    pub fn log_interval(&self) -> u64 {
        self.log_interval.unwrap_or(DEFAULT_LOG_INTERVAL_MINUTES)
    }

    pub fn log_period(&self) -> Duration {
        Duration::from_secs(self.log_interval() * 60)
    }

    pub fn fetch_time(&self) -> Result<NaiveTime> {
        let raw = self.fetch_time.as_deref().unwrap_or(DEFAULT_FETCH_TIME);
        NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .map_err(|_| anyhow!("`fetch_time` must be HH:MM:SS, got {raw}"))
    }

    pub fn provider_url(&self) -> &str {
        self.provider_url.as_deref().unwrap_or(DEFAULT_PROVIDER_URL)
    }

    pub fn switch_names(&self) -> BTreeMap<String, String> {
        self.switch_names.clone().unwrap_or_default()
    }

    /// Log the resolved configuration as a startup block.
    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");
        log_indented!("Geoname id: {}", self.geonameid());
        log_indented!(
            "Time zone: {}",
            self.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE)
        );
        log_indented!("Refresh interval: {} min", self.refresh_interval());
        log_indented!(
            "Daily fetch at: {}",
            self.fetch_time.as_deref().unwrap_or(DEFAULT_FETCH_TIME)
        );
        if self.verbose_logging() {
            log_indented!("Status report: every {} min", self.log_interval());
        } else {
            log_indented!("Status report: disabled");
        }
        let overrides = self.switch_names();
        if !overrides.is_empty() {
            log_indented!("Switch name overrides: {}", overrides.len());
        }
    }
}

/// Write the commented starter configuration.
fn write_default_template(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let template = format!(
        "\
# zmanimd configuration

#geonameid = 4887398          # GeoNames location id (required)
timezone = \"{DEFAULT_TIMEZONE}\"
refresh_interval = {DEFAULT_REFRESH_INTERVAL_MINUTES}          # period re-evaluation interval in minutes (1-60)
verbose_logging = false
log_interval = {DEFAULT_LOG_INTERVAL_MINUTES}             # status report interval in minutes (1-1440)
fetch_time = \"{DEFAULT_FETCH_TIME}\"      # local time of the daily zmanim fetch

#[switch_names]              # optional display-name overrides
#chatzot = \"Midday\"
"
    );
    fs::write(path, template).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Config {
        Config {
            geonameid: Some(4887398),
            ..Config::default()
        }
    }

    #[test]
    fn minimal_config_validates_with_defaults() {
        let config = minimal();
        config.validate().unwrap();
        assert_eq!(config.refresh_interval(), 5);
        assert_eq!(config.log_interval(), 60);
        assert!(!config.verbose_logging());
        assert_eq!(config.timezone().unwrap(), chrono_tz::America::Chicago);
        assert_eq!(
            config.fetch_time().unwrap(),
            NaiveTime::from_hms_opt(2, 0, 0).unwrap()
        );
        assert_eq!(config.provider_url(), DEFAULT_PROVIDER_URL);
    }

    #[test]
    fn missing_geonameid_is_fatal() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("geonameid"));
    }

    #[test]
    fn out_of_range_intervals_are_rejected() {
        let mut config = minimal();
        config.refresh_interval = Some(0);
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.refresh_interval = Some(61);
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.log_interval = Some(2000);
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_timezone_and_fetch_time_are_rejected() {
        let mut config = minimal();
        config.timezone = Some("Mars/Olympus_Mons".to_string());
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.fetch_time = Some("2am".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_switch_name_key_is_rejected() {
        let mut config = minimal();
        let mut names = BTreeMap::new();
        names.insert("sunsrise".to_string(), "typo".to_string());
        config.switch_names = Some(names);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sunsrise"));
    }

    #[test]
    fn parses_full_toml() {
        let config: Config = toml::from_str(
            r#"
            geonameid = 281184
            timezone = "Asia/Jerusalem"
            refresh_interval = 1
            verbose_logging = true
            log_interval = 30
            fetch_time = "03:30:00"
            provider_url = "http://localhost:9999"

            [switch_names]
            chatzotNight = "Midnight"
            tzeit85deg = "Nightfall"
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.geonameid(), 281184);
        assert_eq!(config.timezone().unwrap(), chrono_tz::Asia::Jerusalem);
        assert!(config.verbose_logging());
        assert_eq!(config.switch_names().len(), 2);
    }

    #[test]
    fn unknown_top_level_fields_are_rejected() {
        let parsed: Result<Config, _> = toml::from_str("geonameid = 1\nrefresh = 5\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn missing_file_writes_template_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zmanimd.toml");
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("geonameid"));
        assert!(path.exists());

        // The template itself parses once geonameid is uncommented.
        let raw = fs::read_to_string(&path).unwrap();
        let fixed = raw.replace("#geonameid", "geonameid");
        let config: Config = toml::from_str(&fixed).unwrap();
        config.validate().unwrap();
    }
}
