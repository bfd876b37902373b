//! Layered TOML configuration.
//!
//! Files are searched in three base directories, in this order:
//!
//! | Directory         | Main file             | Modular files            |
//! |-------------------|-----------------------|--------------------------|
//! | `/etc`            | `/etc/dotdee.toml`    | `/etc/dotdee.d/*.toml`   |
//! | `~`               | `~/.dotdee.toml`      | `~/.dotdee.d/*.toml`     |
//! | `~/.config`       | `~/.config/dotdee.toml` | `~/.config/dotdee.d/*.toml` |
//!
//! `$XDG_CONFIG_HOME` replaces `~/.config` when set. Later files override
//! earlier ones key by key, so user settings win over system wide ones.

use crate::natural_order;
use serde::Deserialize;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Settings that can come from configuration files. Every field is optional;
/// command line flags take precedence over all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub log_level: Option<LogLevel>,
    /// Manage files on this host over SSH.
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    /// Run every operation through `sudo`.
    pub sudo: Option<bool>,
}

impl Settings {
    /// Overlays the values set in `other` on top of `self`.
    pub fn merge(&mut self, other: Settings) {
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.user.is_some() {
            self.user = other.user;
        }
        if other.sudo.is_some() {
            self.sudo = other.sudo;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseDirectory {
    pub path: PathBuf,
    /// Whether file names in this directory get a leading dot.
    pub hidden: bool,
}

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    program_name: String,
    base_directories: Vec<BaseDirectory>,
}

impl ConfigLoader {
    /// A loader searching `/etc`, the home directory and the XDG config
    /// directory.
    pub fn new(program_name: &str) -> Self {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        let xdg = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| home.as_ref().map(|h| h.join(".config")));

        let mut base_directories = vec![BaseDirectory {
            path: PathBuf::from("/etc"),
            hidden: false,
        }];
        if let Some(home) = home {
            base_directories.push(BaseDirectory {
                path: home,
                hidden: true,
            });
        }
        if let Some(xdg) = xdg {
            base_directories.push(BaseDirectory {
                path: xdg,
                hidden: false,
            });
        }

        Self::with_base_directories(program_name, base_directories)
    }

    pub fn with_base_directories(program_name: &str, base_directories: Vec<BaseDirectory>) -> Self {
        ConfigLoader {
            program_name: program_name.to_string(),
            base_directories,
        }
    }

    fn prefix(base: &BaseDirectory) -> &'static str {
        if base.hidden { "." } else { "" }
    }

    pub fn main_file(&self, base: &BaseDirectory) -> PathBuf {
        base.path
            .join(format!("{}{}.toml", Self::prefix(base), self.program_name))
    }

    pub fn modular_directory(&self, base: &BaseDirectory) -> PathBuf {
        base.path
            .join(format!("{}{}.d", Self::prefix(base), self.program_name))
    }

    /// Configuration files that exist, in the order they are applied.
    pub fn available_files(&self) -> Result<Vec<PathBuf>, ConfigError> {
        let mut files = Vec::new();

        for base in &self.base_directories {
            let main = self.main_file(base);
            if main.is_file() {
                files.push(main);
            }
            files.extend(modular_files(&self.modular_directory(base))?);
        }

        Ok(files)
    }

    /// Loads and merges all available files. No files means default settings.
    pub fn load(&self) -> Result<(Settings, Vec<PathBuf>), ConfigError> {
        let files = self.available_files()?;
        let mut settings = Settings::default();
        for file in &files {
            settings.merge(load_file(file)?);
        }
        Ok((settings, files))
    }
}

fn modular_files(directory: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let read_dir = match std::fs::read_dir(directory) {
        Ok(read_dir) => read_dir,
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: directory.to_path_buf(),
                source,
            });
        }
    };

    let mut names = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|source| ConfigError::Read {
            path: directory.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension() != Some(OsStr::new("toml")) || !path.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }

    names.sort_by(|a, b| natural_order::compare(a, b));
    Ok(names.into_iter().map(|name| directory.join(name)).collect())
}

pub fn load_file(path: &Path) -> Result<Settings, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn loader(temp: &TempDir) -> ConfigLoader {
        ConfigLoader::with_base_directories(
            "dotdee",
            vec![
                BaseDirectory {
                    path: temp.path().join("etc"),
                    hidden: false,
                },
                BaseDirectory {
                    path: temp.path().join("home"),
                    hidden: true,
                },
            ],
        )
    }

    #[test]
    fn test_file_names() {
        let temp = TempDir::new().unwrap();
        let loader = loader(&temp);
        let home = BaseDirectory {
            path: PathBuf::from("/home/u"),
            hidden: true,
        };

        assert_eq!(loader.main_file(&home), Path::new("/home/u/.dotdee.toml"));
        assert_eq!(
            loader.modular_directory(&home),
            Path::new("/home/u/.dotdee.d")
        );
    }

    #[test]
    fn test_no_files_gives_defaults() {
        let temp = TempDir::new().unwrap();

        let (settings, files) = loader(&temp).load().unwrap();

        assert!(files.is_empty());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_later_files_override_earlier() {
        let temp = TempDir::new().unwrap();
        let etc = temp.path().join("etc");
        let home = temp.path().join("home");
        fs::create_dir_all(etc.join("dotdee.d")).unwrap();
        fs::create_dir_all(&home).unwrap();
        fs::write(etc.join("dotdee.toml"), "host = \"web1\"\nport = 22\n").unwrap();
        fs::write(etc.join("dotdee.d/10-b.toml"), "user = \"b\"\n").unwrap();
        fs::write(etc.join("dotdee.d/2-a.toml"), "user = \"a\"\nsudo = true\n").unwrap();
        fs::write(etc.join("dotdee.d/ignored.ini"), "garbage").unwrap();
        fs::write(home.join(".dotdee.toml"), "port = 2222\nlog_level = \"debug\"\n").unwrap();

        let (settings, files) = loader(&temp).load().unwrap();

        assert_eq!(
            files,
            vec![
                etc.join("dotdee.toml"),
                etc.join("dotdee.d/2-a.toml"),
                etc.join("dotdee.d/10-b.toml"),
                home.join(".dotdee.toml"),
            ]
        );
        assert_eq!(
            settings,
            Settings {
                log_level: Some(LogLevel::Debug),
                host: Some("web1".to_string()),
                port: Some(2222),
                user: Some("b".to_string()),
                sudo: Some(true),
            }
        );
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dotdee.toml");
        fs::write(&path, "hots = \"typo\"\n").unwrap();

        let err = load_file(&path).unwrap_err();

        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("dotdee.toml"));
    }

    #[test]
    fn test_invalid_log_level_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dotdee.toml");
        fs::write(&path, "log_level = \"loud\"\n").unwrap();

        assert!(load_file(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let temp = TempDir::new().unwrap();

        let err = load_file(&temp.path().join("nope.toml")).unwrap_err();

        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
