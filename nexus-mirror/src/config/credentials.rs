//! HTTP Basic credentials loaded from a `credentials.properties` file.
//!
//! The file uses `key=value` lines without sections:
//!
//! ```text
//! authenticate=true
//! username="deployer"
//! password='s3cret'
//! ```
//!
//! Values may be wrapped in matching single or double quotes, which are
//! removed. A missing file means "no authentication".

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use ini::{Ini, ParseOption};
use thiserror::Error;

/// File name looked up in the working directory when none is given.
pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.properties";

/// Errors raised while loading credentials.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read credentials file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("credentials file {} is malformed: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("credentials file {} enables authentication but has no {key}", path.display())]
    MissingKey { path: PathBuf, key: &'static str },
}

/// HTTP Basic credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Load credentials from a properties file.
    ///
    /// Returns `Ok(None)` when the file does not exist or when
    /// `authenticate` is not `true`.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        Self::parse(&contents, path)
    }

    /// Load from [`DEFAULT_CREDENTIALS_FILE`] in the current directory.
    pub fn load_default() -> Result<Option<Self>, ConfigError> {
        Self::load(Path::new(DEFAULT_CREDENTIALS_FILE))
    }

    fn parse(contents: &str, path: &Path) -> Result<Option<Self>, ConfigError> {
        // Passwords may contain backslashes and quotes; keep values verbatim.
        let options = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..ParseOption::default()
        };
        let ini = Ini::load_from_str_opt(contents, options).map_err(|e| {
            ConfigError::Malformed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        let props = ini.general_section();

        let authenticate = props
            .get("authenticate")
            .map(|v| strip_quotes(v.trim()).eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if !authenticate {
            return Ok(None);
        }

        let field = |key: &'static str| {
            props
                .get(key)
                .map(|v| strip_quotes(v.trim()).to_string())
                .ok_or_else(|| ConfigError::MissingKey {
                    path: path.to_path_buf(),
                    key,
                })
        };

        Ok(Some(Self::new(field("username")?, field("password")?)))
    }
}

/// Remove one pair of matching surrounding quotes (`"..."` or `'...'`).
pub fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
