use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::cli::Cli;
use crate::state::DEFAULT_LEDGER_CAP;
use crate::timezone::{DeviceZone, IanaTimeZones, TimeZoneDb};

pub const DEFAULT_CONFIG_PATH: &str = "~/.ringdl/config.toml";
pub const DEFAULT_EVENT_LIMIT: u32 = 30;
pub const DEFAULT_LISTING_RETRIES: u32 = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const LEDGER_FILE_NAME: &str = "ring-events.json";
const TOKEN_CACHE_FILE_NAME: &str = "token.json";
const LOCK_FILE_NAME: &str = "ringdl.lock";

/// The config file as written. Required keys are optional here so a missing
/// one gets a message naming it.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    video_directory: Option<String>,
    user_name: Option<String>,
    password: Option<String>,
    event_limit: Option<u32>,
    listing_retries: Option<u32>,
    ledger_cap: Option<usize>,
    timeout_secs: Option<u64>,
    default_time_zone: Option<String>,
    ledger_file: Option<String>,
    token_cache_file: Option<String>,
}

/// Command-line values that take precedence over the file.
#[derive(Default)]
pub struct Overrides {
    pub password: Option<String>,
    pub limit: Option<u32>,
}

impl From<&Cli> for Overrides {
    fn from(cli: &Cli) -> Self {
        Self {
            password: cli.password.clone(),
            limit: cli.limit,
        }
    }
}

/// Settings for one run, read once at startup.
pub struct Config {
    pub video_directory: PathBuf,
    pub user_name: String,
    pub password: String,
    pub event_limit: u32,
    pub listing_retries: u32,
    /// `None` keeps every id.
    pub ledger_cap: Option<usize>,
    /// Bound on connecting and on each read, never on a whole download.
    pub timeout_secs: u64,
    /// Used for devices whose reported zone is unknown.
    pub default_zone: DeviceZone,
    pub ledger_file: PathBuf,
    pub token_cache_file: PathBuf,
    pub lock_file: PathBuf,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("video_directory", &self.video_directory)
            .field("user_name", &self.user_name)
            .field("password", &"<redacted>")
            .field("event_limit", &self.event_limit)
            .field("listing_retries", &self.listing_retries)
            .field("ledger_cap", &self.ledger_cap)
            .field("timeout_secs", &self.timeout_secs)
            .field("default_zone", &self.default_zone.name())
            .field("ledger_file", &self.ledger_file)
            .field("token_cache_file", &self.token_cache_file)
            .finish_non_exhaustive()
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Relative state paths live next to the config file.
fn state_path(config_dir: &Path, configured: Option<&str>, default_name: &str) -> PathBuf {
    match configured {
        Some(p) => {
            let p = expand_tilde(p);
            if p.is_relative() {
                config_dir.join(p)
            } else {
                p
            }
        }
        None => config_dir.join(default_name),
    }
}

fn required(value: Option<String>, key: &str, path: &Path) -> anyhow::Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => bail!("Missing required setting `{}` in {}", key, path.display()),
    }
}

impl Config {
    /// Locate and read the config file named on the command line, or the
    /// default one.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let path = expand_tilde(cli.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH));
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        Self::parse(&contents, &path, Overrides::from(cli))
    }

    pub fn parse(contents: &str, path: &Path, overrides: Overrides) -> anyhow::Result<Self> {
        let file: ConfigFile = toml::from_str(contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        let config_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let video_directory = expand_tilde(&required(file.video_directory, "video_directory", path)?);
        let user_name = required(file.user_name, "user_name", path)?;
        let password = match overrides.password {
            Some(p) if !p.is_empty() => p,
            _ => required(file.password, "password", path)?,
        };

        let default_zone = match file.default_time_zone.as_deref() {
            None => DeviceZone::System,
            Some(name) => match IanaTimeZones.lookup(name) {
                Some(zone) => zone,
                None => bail!(
                    "Unknown default_time_zone {:?} in {}",
                    name,
                    path.display()
                ),
            },
        };

        let ledger_cap = match file.ledger_cap.unwrap_or(DEFAULT_LEDGER_CAP) {
            0 => None,
            cap => Some(cap),
        };

        let timeout_secs = file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            bail!("timeout_secs must be at least 1 in {}", path.display());
        }

        Ok(Self {
            video_directory,
            user_name,
            password,
            event_limit: overrides
                .limit
                .or(file.event_limit)
                .unwrap_or(DEFAULT_EVENT_LIMIT),
            listing_retries: file.listing_retries.unwrap_or(DEFAULT_LISTING_RETRIES),
            ledger_cap,
            timeout_secs,
            default_zone,
            ledger_file: state_path(&config_dir, file.ledger_file.as_deref(), LEDGER_FILE_NAME),
            token_cache_file: state_path(
                &config_dir,
                file.token_cache_file.as_deref(),
                TOKEN_CACHE_FILE_NAME,
            ),
            lock_file: config_dir.join(LOCK_FILE_NAME),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        video_directory = "/srv/ring"
        user_name = "me@example.com"
        password = "hunter2"
    "#;

    fn parse(contents: &str) -> anyhow::Result<Config> {
        Config::parse(contents, Path::new("/home/me/.ringdl/config.toml"), Overrides::default())
    }

    #[test]
    fn test_expand_tilde_with_home() {
        let result = expand_tilde("~/Videos");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(result, home.join("Videos"));
        }
    }

    #[test]
    fn test_expand_tilde_no_prefix() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.video_directory, PathBuf::from("/srv/ring"));
        assert_eq!(config.user_name, "me@example.com");
        assert_eq!(config.event_limit, DEFAULT_EVENT_LIMIT);
        assert_eq!(config.listing_retries, DEFAULT_LISTING_RETRIES);
        assert_eq!(config.ledger_cap, Some(DEFAULT_LEDGER_CAP));
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.default_zone, DeviceZone::System);
        assert_eq!(
            config.ledger_file,
            PathBuf::from("/home/me/.ringdl/ring-events.json")
        );
        assert_eq!(
            config.token_cache_file,
            PathBuf::from("/home/me/.ringdl/token.json")
        );
        assert_eq!(config.lock_file, PathBuf::from("/home/me/.ringdl/ringdl.lock"));
    }

    #[test]
    fn test_optional_settings() {
        let contents = format!(
            "{}\nevent_limit = 300\nlisting_retries = 3\nledger_cap = 0\ntimeout_secs = 90\n\
             default_time_zone = \"Europe/Berlin\"\nledger_file = \"state/events.json\"\n\
             token_cache_file = \"/var/lib/ringdl/token.json\"\n",
            MINIMAL
        );
        let config = parse(&contents).unwrap();
        assert_eq!(config.event_limit, 300);
        assert_eq!(config.listing_retries, 3);
        assert_eq!(config.ledger_cap, None);
        assert_eq!(config.timeout_secs, 90);
        assert_eq!(config.default_zone, DeviceZone::Named(chrono_tz::Europe::Berlin));
        assert_eq!(
            config.ledger_file,
            PathBuf::from("/home/me/.ringdl/state/events.json")
        );
        assert_eq!(
            config.token_cache_file,
            PathBuf::from("/var/lib/ringdl/token.json")
        );
    }

    #[test]
    fn test_missing_required_field_names_it() {
        let err = parse("video_directory = \"/srv/ring\"\npassword = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("user_name"), "{}", err);
    }

    #[test]
    fn test_empty_password_is_missing() {
        let contents = "video_directory = \"/v\"\nuser_name = \"me\"\npassword = \"\"\n";
        let err = parse(contents).unwrap_err();
        assert!(err.to_string().contains("password"), "{}", err);
    }

    #[test]
    fn test_invalid_toml_is_fatal() {
        assert!(parse("video_directory = ").is_err());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let contents = format!("{}\ntimeout_secs = 0\n", MINIMAL);
        let err = parse(&contents).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"), "{}", err);
    }

    #[test]
    fn test_unknown_default_zone_is_fatal() {
        let contents = format!("{}\ndefault_time_zone = \"Mars/Olympus_Mons\"\n", MINIMAL);
        let err = parse(&contents).unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus_Mons"), "{}", err);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let contents = "video_directory = \"/v\"\nuser_name = \"me\"\nevent_limit = 50\n";
        let config = Config::parse(
            contents,
            Path::new("/etc/ringdl/config.toml"),
            Overrides {
                password: Some("from-env".into()),
                limit: Some(5),
            },
        )
        .unwrap();
        assert_eq!(config.password, "from-env");
        assert_eq!(config.event_limit, 5);
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = parse(MINIMAL).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_load_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let cli = Cli {
            config: Some(path.to_string_lossy().into_owned()),
            log_level: crate::types::LogLevel::Info,
            limit: None,
            password: None,
        };
        let err = Config::load(&cli).unwrap_err();
        assert!(err.to_string().contains("absent.toml"), "{}", err);
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let cli = Cli {
            config: Some(path.to_string_lossy().into_owned()),
            log_level: crate::types::LogLevel::Info,
            limit: Some(12),
            password: None,
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.event_limit, 12);
        assert_eq!(config.ledger_file, dir.path().join("ring-events.json"));
    }
}
