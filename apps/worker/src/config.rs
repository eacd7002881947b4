use std::{env, fmt, fs, path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitoring::SchedulerConfig;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config {path}: {err}", path = .0.display(), err = .1)]
    ReadFailed(path::PathBuf, #[source] std::io::Error),
    #[error("failed to write config {path}: {err}", path = .0.display(), err = .1)]
    WriteFailed(path::PathBuf, #[source] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("neither XDG_CONFIG_HOME nor a home directory is available")]
    ConfigPathUnavailable,
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub worker: Worker,
    #[serde(default)]
    pub notifier: Notifier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Worker {
    /// Seconds between probe cycles
    pub check_interval_secs: u64,
    /// Seconds between log rotations
    pub rotation_interval_secs: u64,
    /// Root of the record store
    pub data_dir: path::PathBuf,
    /// Directory holding live logs and their archives
    pub logs_dir: path::PathBuf,
    pub checks_category: String,
    /// Skip checks whose previous probe has not finished yet
    pub guard_in_flight: bool,
}

impl Default for Worker {
    fn default() -> Self {
        Self {
            check_interval_secs: 60,
            rotation_interval_secs: 24 * 60 * 60,
            data_dir: ".data".into(),
            logs_dir: ".logs".into(),
            checks_category: "checks".into(),
            guard_in_flight: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    /// Alerts only go to the service log
    #[default]
    Log,
    Twilio,
}

impl fmt::Display for NotifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifierKind::Log => write!(f, "log"),
            NotifierKind::Twilio => write!(f, "twilio"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Notifier {
    pub kind: NotifierKind,
    pub api_base: Option<String>,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_phone: Option<String>,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/upcheck/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("upcheck/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let redacted = |value: &Option<String>| if value.is_some() { "<set>" } else { "<unset>" };

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Worker")?;
        write_1(f, "Check Interval (s)", &self.worker.check_interval_secs)?;
        write_1(f, "Rotation Interval (s)", &self.worker.rotation_interval_secs)?;
        write_1(f, "Data Directory", &self.worker.data_dir.display())?;
        write_1(f, "Logs Directory", &self.worker.logs_dir.display())?;
        write_1(f, "Checks Category", &self.worker.checks_category)?;
        write_1(f, "Guard In-Flight Probes", &self.worker.guard_in_flight)?;
        write_title_1(f, "Notifier")?;
        write_1(f, "Kind", &self.notifier.kind)?;
        write_1(f, "Account SID", &redacted(&self.notifier.account_sid))?;
        write_1(f, "Auth Token", &redacted(&self.notifier.auth_token))?;
        write_1(f, "From Phone", &self.notifier.from_phone.as_deref().unwrap_or("<unset>"))?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/upcheck/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|err| Error::ReadFailed(config_path.clone(), err))?;
            toml::from_str(raw_string.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))?;
        }

        fs::write(path, config_str).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))
    }

    /// Reject settings the worker cannot run with
    pub fn validate(&self) -> Result<(), Error> {
        if self.worker.check_interval_secs == 0 || self.worker.rotation_interval_secs == 0 {
            return Err(Error::Invalid("intervals must be at least one second".into()));
        }
        if self.worker.checks_category.trim().is_empty() {
            return Err(Error::Invalid("checks_category must not be empty".into()));
        }
        if self.notifier.kind == NotifierKind::Twilio
            && (self.notifier.account_sid.is_none()
                || self.notifier.auth_token.is_none()
                || self.notifier.from_phone.is_none())
        {
            return Err(Error::Invalid(
                "the twilio notifier needs account_sid, auth_token and from_phone".into(),
            ));
        }
        Ok(())
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            check_interval: Duration::from_secs(self.worker.check_interval_secs),
            rotation_interval: Duration::from_secs(self.worker.rotation_interval_secs),
            category: self.worker.checks_category.clone(),
            guard_in_flight: self.worker.guard_in_flight,
        }
    }
}
