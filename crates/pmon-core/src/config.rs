use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::Destination, errors::Error, Result};

const DEFAULT_INTERVAL_MINUTES: u64 = 15;
const DEFAULT_RETENTION_HOURS: u64 = 24;
const DEFAULT_ARCHIVE_DIR: &str = "printer_shots";
const DEFAULT_CAPTURE_WIDTH: u32 = 640;
const DEFAULT_CAPTURE_HEIGHT: u32 = 480;
const DEFAULT_JPEG_QUALITY: u8 = 90;
/// Upper bound for interval and retention (100 years); keeps clock arithmetic in range.
const MAX_SPAN_SECS: u64 = 100 * 365 * 24 * 3600;

/// Typed configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_token: String,
    pub destination: Destination,

    // Camera
    pub camera_index: usize,
    pub capture_width: u32,
    pub capture_height: u32,
    pub jpeg_quality: u8,

    // Schedule
    pub interval: Duration,
    pub retention: Duration,
    pub run_once: bool,

    // Storage
    pub archive_dir: PathBuf,
}

impl Config {
    /// Load from the process environment, after merging `.env` if present.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).and_then(non_empty);

        // Required
        let telegram_token = var("TELEGRAM_TOKEN")
            .or_else(|| var("TELEGRAM_BOT_TOKEN"))
            .ok_or_else(|| {
                Error::Config("TELEGRAM_TOKEN environment variable is required".to_string())
            })?;
        let destination = var("TELEGRAM_CHAT_ID")
            .ok_or_else(|| {
                Error::Config("TELEGRAM_CHAT_ID environment variable is required".to_string())
            })?
            .parse::<Destination>()?;

        // Camera
        let camera_index = parse_num::<usize>("CAMERA_ID", var("CAMERA_ID"))?.unwrap_or(0);
        let capture_width = parse_num::<u32>("CAPTURE_WIDTH", var("CAPTURE_WIDTH"))?
            .unwrap_or(DEFAULT_CAPTURE_WIDTH);
        let capture_height = parse_num::<u32>("CAPTURE_HEIGHT", var("CAPTURE_HEIGHT"))?
            .unwrap_or(DEFAULT_CAPTURE_HEIGHT);
        if capture_width == 0 || capture_height == 0 {
            return Err(Error::Config(
                "CAPTURE_WIDTH and CAPTURE_HEIGHT must be greater than zero".to_string(),
            ));
        }
        let jpeg_quality =
            parse_num::<u8>("JPEG_QUALITY", var("JPEG_QUALITY"))?.unwrap_or(DEFAULT_JPEG_QUALITY);
        if !(1..=100).contains(&jpeg_quality) {
            return Err(Error::Config(format!(
                "JPEG_QUALITY must be between 1 and 100, got {jpeg_quality}"
            )));
        }

        // Schedule
        let interval_minutes = parse_num::<u64>("INTERVAL_MINUTES", var("INTERVAL_MINUTES"))?
            .unwrap_or(DEFAULT_INTERVAL_MINUTES);
        if interval_minutes == 0 {
            return Err(Error::Config(
                "INTERVAL_MINUTES must be greater than zero".to_string(),
            ));
        }
        let interval = span("INTERVAL_MINUTES", interval_minutes, 60)?;
        let retention_hours = parse_num::<u64>("RETENTION_HOURS", var("RETENTION_HOURS"))?
            .unwrap_or(DEFAULT_RETENTION_HOURS);
        if retention_hours == 0 {
            return Err(Error::Config(
                "RETENTION_HOURS must be greater than zero".to_string(),
            ));
        }
        let retention = span("RETENTION_HOURS", retention_hours, 3600)?;
        let run_once = var("RUN_ONCE").map(|s| parse_bool(&s)).unwrap_or(false);

        let archive_dir = PathBuf::from(var("ARCHIVE_DIR").unwrap_or(DEFAULT_ARCHIVE_DIR.into()));

        Ok(Self {
            telegram_token,
            destination,
            camera_index,
            capture_width,
            capture_height,
            jpeg_quality,
            interval,
            retention,
            run_once,
            archive_dir,
        })
    }

    /// Polling interval in whole minutes (for log lines).
    pub fn interval_minutes(&self) -> u64 {
        self.interval.as_secs() / 60
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_num<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}

/// `count` units of `unit_secs` seconds, capped at `MAX_SPAN_SECS`.
fn span(key: &str, count: u64, unit_secs: u64) -> Result<Duration> {
    count
        .checked_mul(unit_secs)
        .filter(|secs| *secs <= MAX_SPAN_SECS)
        .map(Duration::from_secs)
        .ok_or_else(|| Error::Config(format!("{key} is too large, got {count}")))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let cfg = Config::from_lookup(lookup(&[
            ("TELEGRAM_TOKEN", "123:abc"),
            ("TELEGRAM_CHAT_ID", "42"),
        ]))
        .unwrap();

        assert_eq!(cfg.telegram_token, "123:abc");
        assert_eq!(cfg.destination, Destination::Chat(42));
        assert_eq!(cfg.camera_index, 0);
        assert_eq!(cfg.interval, Duration::from_secs(15 * 60));
        assert_eq!(cfg.interval_minutes(), 15);
        assert_eq!(cfg.retention, Duration::from_secs(24 * 3600));
        assert_eq!(cfg.archive_dir, PathBuf::from("printer_shots"));
        assert_eq!((cfg.capture_width, cfg.capture_height), (640, 480));
        assert_eq!(cfg.jpeg_quality, 90);
        assert!(!cfg.run_once);
    }

    #[test]
    fn bot_token_alias_is_accepted() {
        let cfg = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("TELEGRAM_CHAT_ID", "@printer"),
        ]))
        .unwrap();
        assert_eq!(cfg.telegram_token, "t");
        assert_eq!(cfg.destination, Destination::Channel("@printer".into()));
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = Config::from_lookup(lookup(&[
            ("TELEGRAM_TOKEN", "t"),
            ("TELEGRAM_CHAT_ID", "-100200"),
            ("CAMERA_ID", "2"),
            ("INTERVAL_MINUTES", "1"),
            ("RETENTION_HOURS", "48"),
            ("ARCHIVE_DIR", "/var/lib/pmon"),
            ("CAPTURE_WIDTH", "1280"),
            ("CAPTURE_HEIGHT", "720"),
            ("JPEG_QUALITY", "75"),
            ("RUN_ONCE", "yes"),
        ]))
        .unwrap();

        assert_eq!(cfg.camera_index, 2);
        assert_eq!(cfg.interval, Duration::from_secs(60));
        assert_eq!(cfg.retention, Duration::from_secs(48 * 3600));
        assert_eq!(cfg.archive_dir, PathBuf::from("/var/lib/pmon"));
        assert_eq!((cfg.capture_width, cfg.capture_height), (1280, 720));
        assert_eq!(cfg.jpeg_quality, 75);
        assert!(cfg.run_once);
    }

    #[test]
    fn missing_required_vars_are_config_errors() {
        let err = Config::from_lookup(lookup(&[("TELEGRAM_CHAT_ID", "1")])).unwrap_err();
        assert!(matches!(err, Error::Config(m) if m.contains("TELEGRAM_TOKEN")));

        let err = Config::from_lookup(lookup(&[("TELEGRAM_TOKEN", "t")])).unwrap_err();
        assert!(matches!(err, Error::Config(m) if m.contains("TELEGRAM_CHAT_ID")));

        // Blank counts as missing.
        let err = Config::from_lookup(lookup(&[
            ("TELEGRAM_TOKEN", "   "),
            ("TELEGRAM_CHAT_ID", "1"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        for (key, val) in [
            ("INTERVAL_MINUTES", "0"),
            ("INTERVAL_MINUTES", "fifteen"),
            ("RETENTION_HOURS", "0"),
            ("CAMERA_ID", "-1"),
            ("JPEG_QUALITY", "0"),
            ("JPEG_QUALITY", "101"),
            ("CAPTURE_WIDTH", "0"),
        ] {
            let res = Config::from_lookup(lookup(&[
                ("TELEGRAM_TOKEN", "t"),
                ("TELEGRAM_CHAT_ID", "1"),
                (key, val),
            ]));
            assert!(res.is_err(), "{key}={val} should be rejected");
        }
    }

    #[test]
    fn oversized_spans_are_config_errors() {
        let max = u64::MAX.to_string();
        let huge_hours = (u64::MAX / 1000).to_string();
        let century_and_a_day = (100 * 365 * 24 + 24).to_string();
        for (key, val) in [
            ("INTERVAL_MINUTES", max.as_str()),
            ("RETENTION_HOURS", max.as_str()),
            ("RETENTION_HOURS", huge_hours.as_str()),
            ("RETENTION_HOURS", century_and_a_day.as_str()),
        ] {
            let err = Config::from_lookup(lookup(&[
                ("TELEGRAM_TOKEN", "t"),
                ("TELEGRAM_CHAT_ID", "1"),
                (key, val),
            ]))
            .unwrap_err();
            assert!(
                matches!(&err, Error::Config(m) if m.contains(key) && m.contains("too large")),
                "{key}={val}: {err}"
            );
        }
    }

    #[test]
    fn dotenv_parsing_handles_comments_quotes_and_export() {
        let parsed = parse_dotenv(
            "# comment\n\nTELEGRAM_TOKEN=\"123:abc\"\nexport CAMERA_ID=1\nBAD LINE\n=nokey\nARCHIVE_DIR='shots dir'\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("TELEGRAM_TOKEN".to_string(), "123:abc".to_string()),
                ("CAMERA_ID".to_string(), "1".to_string()),
                ("ARCHIVE_DIR".to_string(), "shots dir".to_string()),
            ]
        );
    }
}
