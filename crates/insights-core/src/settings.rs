use chrono::NaiveDate;
use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Visitor insights dashboard for web-visitor logs
#[derive(Parser, Debug, Clone)]
#[command(
    name = "visitor-insights",
    about = "Visitor insights dashboard for web-visitor logs",
    version
)]
pub struct Settings {
    /// CSV log file, or a directory of CSV files
    #[arg(long, default_value = "sample_weblogs1.csv")]
    pub data_file: PathBuf,

    /// Output mode
    #[arg(long, default_value = "dashboard", value_parser = ["dashboard", "json"])]
    pub view: String,

    /// Display theme
    #[arg(long, default_value = "auto", value_parser = ["light", "dark", "classic", "auto"])]
    pub theme: String,

    /// Display timezone for timestamps carrying an offset ("auto" = system)
    #[arg(long, default_value = "UTC")]
    pub timezone: String,

    /// First calendar day to include (YYYY-MM-DD, default: earliest visit)
    #[arg(long, value_parser = parse_cli_date)]
    pub start_date: Option<NaiveDate>,

    /// Last calendar day to include (YYYY-MM-DD, default: latest visit)
    #[arg(long, value_parser = parse_cli_date)]
    pub end_date: Option<NaiveDate>,

    /// Restrict to one visitor IP
    #[arg(long)]
    pub ip: Option<String>,

    /// Free-text search over company, state, vertical and pages viewed
    #[arg(long)]
    pub search: Option<String>,

    /// Maximum enrichment lookups in flight
    #[arg(long, default_value = "8", value_parser = clap::value_parser!(u32).range(1..=64))]
    pub enrichment_concurrency: u32,

    /// Per-lookup enrichment timeout in milliseconds
    #[arg(long, default_value = "2000")]
    pub enrichment_timeout_ms: u64,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

fn parse_cli_date(s: &str) -> Result<NaiveDate, String> {
    crate::time_utils::parse_date(s).ok_or_else(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.visitor-insights/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".visitor-insights").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation – accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins. Filters (dates, ip, search) are never persisted.
        // Arg ids are the field names (underscores).
        restore(&matches, "view", &mut settings.view, last.view);
        restore(&matches, "timezone", &mut settings.timezone, last.timezone);
        restore(&matches, "theme", &mut settings.theme, last.theme);
        restore(&matches, "data_file", &mut settings.data_file, last.data_file);

        settings = Self::resolve_auto_values(settings);

        let params = LastUsedParams::from(&settings);
        if let Err(e) = params.save_to(config_path) {
            tracing::debug!(error = %e, "could not persist last-used parameters");
        }

        settings
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    ///
    /// An unrecognised timezone is replaced with `"UTC"` so it is never
    /// persisted.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }
        if !crate::time_utils::validate_timezone(&settings.timezone) {
            tracing::warn!(
                timezone = %settings.timezone,
                "unrecognised timezone, falling back to UTC"
            );
            settings.timezone = "UTC".to_string();
        }

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        settings
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            theme: Some(s.theme.clone()),
            timezone: Some(s.timezone.clone()),
            data_file: Some(s.data_file.clone()),
            view: Some(s.view.clone()),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

/// Overwrite `slot` with the saved value unless `name` was given on the CLI.
fn restore<T>(matches: &clap::ArgMatches, name: &str, slot: &mut T, saved: Option<T>) {
    if is_arg_explicitly_set(matches, name) {
        return;
    }
    if let Some(value) = saved {
        *slot = value;
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        LastUsedParams::config_path_in(tmp.path())
    }

    #[test]
    fn test_last_used_params_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            theme: Some("dark".to_string()),
            timezone: Some("Europe/Berlin".to_string()),
            data_file: Some(PathBuf::from("/logs/weblogs.csv")),
            view: Some("json".to_string()),
        };
        params.save_to(&path).expect("save");

        let loaded = LastUsedParams::load_from(&path);
        assert_eq!(loaded.theme, Some("dark".to_string()));
        assert_eq!(loaded.timezone, Some("Europe/Berlin".to_string()));
        assert_eq!(loaded.data_file, Some(PathBuf::from("/logs/weblogs.csv")));
        assert_eq!(loaded.view, Some("json".to_string()));
    }

    #[test]
    fn test_last_used_params_clear() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        LastUsedParams {
            theme: Some("light".to_string()),
            ..Default::default()
        }
        .save_to(&path)
        .expect("save");
        assert!(path.exists());

        LastUsedParams::clear_at(&path).expect("clear");
        assert!(!path.exists());
    }

    #[test]
    fn test_last_used_params_default_when_missing_or_corrupt() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        assert!(LastUsedParams::load_from(&path).theme.is_none());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(LastUsedParams::load_from(&path).view.is_none());
    }

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["visitor-insights"]);

        assert_eq!(settings.data_file, PathBuf::from("sample_weblogs1.csv"));
        assert_eq!(settings.view, "dashboard");
        assert_eq!(settings.theme, "auto");
        assert_eq!(settings.timezone, "UTC");
        assert!(settings.start_date.is_none());
        assert!(settings.end_date.is_none());
        assert!(settings.ip.is_none());
        assert!(settings.search.is_none());
        assert_eq!(settings.enrichment_concurrency, 8);
        assert_eq!(settings.enrichment_timeout_ms, 2000);
        assert_eq!(settings.log_level, "INFO");
        assert!(settings.log_file.is_none());
        assert!(!settings.debug);
        assert!(!settings.clear);
    }

    #[test]
    fn test_settings_cli_filters() {
        let settings = Settings::parse_from([
            "visitor-insights",
            "--start-date",
            "2024-01-01",
            "--end-date",
            "2024-01-31",
            "--ip",
            "10.1.2.3",
            "--search",
            "soft",
        ]);
        assert_eq!(settings.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(settings.end_date, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(settings.ip.as_deref(), Some("10.1.2.3"));
        assert_eq!(settings.search.as_deref(), Some("soft"));
    }

    #[test]
    fn test_settings_rejects_bad_date() {
        let result = Settings::try_parse_from(["visitor-insights", "--start-date", "Jan 1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_rejects_out_of_range_concurrency() {
        let result =
            Settings::try_parse_from(["visitor-insights", "--enrichment-concurrency", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_settings_to_last_used() {
        let settings = Settings::parse_from([
            "visitor-insights",
            "--theme",
            "classic",
            "--data-file",
            "/tmp/a.csv",
            "--search",
            "retail",
        ]);
        let last = LastUsedParams::from(&settings);
        assert_eq!(last.theme, Some("classic".to_string()));
        assert_eq!(last.data_file, Some(PathBuf::from("/tmp/a.csv")));
        assert_eq!(last.view, Some("dashboard".to_string()));
    }

    #[test]
    fn test_load_with_last_used_merges_persisted_values() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            theme: Some("dark".to_string()),
            timezone: Some("UTC".to_string()),
            data_file: Some(PathBuf::from("/data/old.csv")),
            view: Some("json".to_string()),
        }
        .save_to(&config_path)
        .expect("save");

        let settings =
            Settings::load_with_last_used_impl(vec!["visitor-insights".into()], &config_path);
        assert_eq!(settings.theme, "dark");
        assert_eq!(settings.view, "json");
        assert_eq!(settings.data_file, PathBuf::from("/data/old.csv"));
    }

    #[test]
    fn test_load_with_last_used_cli_overrides_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            theme: Some("dark".to_string()),
            data_file: Some(PathBuf::from("/data/old.csv")),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(
            vec![
                "visitor-insights".into(),
                "--theme".into(),
                "light".into(),
                "--data-file".into(),
                "/data/new.csv".into(),
            ],
            &config_path,
        );
        assert_eq!(settings.theme, "light");
        assert_eq!(settings.data_file, PathBuf::from("/data/new.csv"));
    }

    #[test]
    fn test_load_with_last_used_clear_removes_file() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            theme: Some("classic".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        Settings::load_with_last_used_impl(
            vec!["visitor-insights".into(), "--clear".into()],
            &config_path,
        );
        assert!(!config_path.exists());
    }

    #[test]
    fn test_load_with_last_used_debug_overrides_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        let settings = Settings::load_with_last_used_impl(
            vec!["visitor-insights".into(), "--debug".into()],
            &config_path,
        );
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_load_with_last_used_persists_after_run() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        Settings::load_with_last_used_impl(
            vec!["visitor-insights".into(), "--theme".into(), "classic".into()],
            &config_path,
        );

        assert!(config_path.exists());
        let loaded = LastUsedParams::load_from(&config_path);
        assert_eq!(loaded.theme, Some("classic".to_string()));
    }

    #[test]
    fn test_load_with_last_used_filters_not_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        Settings::load_with_last_used_impl(
            vec!["visitor-insights".into(), "--ip".into(), "1.1.1.1".into()],
            &config_path,
        );
        let settings =
            Settings::load_with_last_used_impl(vec!["visitor-insights".into()], &config_path);
        assert!(settings.ip.is_none());
    }

    #[test]
    fn test_load_with_last_used_invalid_timezone_becomes_utc() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        let settings = Settings::load_with_last_used_impl(
            vec![
                "visitor-insights".into(),
                "--timezone".into(),
                "Not/AZone".into(),
            ],
            &config_path,
        );
        assert_eq!(settings.timezone, "UTC");
        let loaded = LastUsedParams::load_from(&config_path);
        assert_eq!(loaded.timezone, Some("UTC".to_string()));
    }
}
