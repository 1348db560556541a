//! Configuration management.
//!
//! A run is configured from three layers, highest precedence first:
//!
//! 1. Command-line flags (and their environment variables)
//! 2. An optional TOML config file
//! 3. Built-in defaults
//!
//! The layers are merged once into an immutable [`TransferConfig`].
//!
//! # Config file
//!
//! ```toml
//! domain = "example"            # example.cybozu.com
//! app = 42
//! api_token = "..."
//! encoding = "sjis"
//! fields = ["name", "items"]
//!
//! [basic_auth]
//! user = "proxy"
//!
//! [http]
//! timeout_ms = 30000
//!
//! [logging]
//! format = "json"
//! file = "/var/log/kintone-transfer.log"
//! ```

use crate::io::{ExportOptions, Format, ImportOptions, TextEncoding, UnknownFieldPolicy};
use crate::models::AppId;
use crate::observability::LoggingConfig;
use crate::security::AuthSettings;
use crate::store::{HttpConfig, normalize_domain};
use crate::{Error, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Directory name used under the platform config dir.
pub const CONFIG_DIR_NAME: &str = "kintone-transfer";

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Whether a run exports or imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Fetch records and write them to a file or stdout.
    Export,
    /// Read records from a CSV file and insert them.
    Import,
}

/// Configuration for one run.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Target app.
    pub app_id: AppId,
    /// Fully qualified domain, e.g. `example.cybozu.com`.
    pub domain: String,
    /// Authentication settings, before prompting.
    pub auth: AuthSettings,
    /// Query filter for export.
    pub filter: Option<String>,
    /// Fields to export, in column order.
    pub fields: Option<Vec<String>>,
    /// File format.
    pub format: Format,
    /// CSV text encoding.
    pub encoding: TextEncoding,
    /// Delete every record before importing.
    pub delete_all: bool,
    /// File to import; export mode when `None`.
    pub input: Option<PathBuf>,
    /// Export destination; stdout when `None`.
    pub output: Option<PathBuf>,
    /// Handling of fields that appear after the columns were fixed.
    pub unknown_fields: UnknownFieldPolicy,
    /// HTTP timeouts.
    pub http: HttpConfig,
    /// Logging setup.
    pub logging: LoggingConfig,
    /// Where the config file came from.
    pub origin: ConfigOrigin,
}

impl TransferConfig {
    /// Loads the config file and merges command-line overrides into it.
    ///
    /// `path` selects the config file; the default location is used when it
    /// is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit config file cannot be read or the
    /// merged settings are invalid.
    pub fn load(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let (file, origin) = match path {
            Some(path) => (
                ConfigFile::load_from_file(path)?,
                ConfigOrigin {
                    loaded: Some(path.to_path_buf()),
                    skipped: Vec::new(),
                },
            ),
            None => ConfigFile::load_default(),
        };
        let mut config = Self::resolve(file, overrides)?;
        config.origin = origin;
        Ok(config)
    }

    /// Merges a config file with command-line overrides and validates the
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a missing app id, domain or
    /// credentials, or conflicting flags, and
    /// [`Error::UnsupportedEncoding`] for an unknown encoding name.
    pub fn resolve(file: ConfigFile, overrides: ConfigOverrides) -> Result<Self> {
        let app_id = match (overrides.app_id.as_deref(), file.app) {
            (Some(app), _) => AppId::from_str(app)?,
            (None, Some(app)) => AppId::from_str(&app.to_string())?,
            (None, None) => return Err(Error::InvalidInput("app id is required".to_string())),
        };

        let domain = non_empty(overrides.domain)
            .or(non_empty(file.domain))
            .map(|d| normalize_domain(&d))
            .ok_or_else(|| Error::InvalidInput("domain is required".to_string()))?;

        let basic_auth = file.basic_auth.unwrap_or_default();
        let auth = AuthSettings {
            login: non_empty(overrides.login).or(non_empty(file.login)),
            password: overrides.password.map(SecretString::from).or(file.password),
            api_token: overrides.api_token.map(SecretString::from).or(file.api_token),
            basic_auth_user: non_empty(overrides.basic_auth_user).or(non_empty(basic_auth.user)),
            basic_auth_password: overrides
                .basic_auth_password
                .map(SecretString::from)
                .or(basic_auth.password),
        };
        if !auth.is_complete() {
            return Err(Error::InvalidInput(
                "either an API token or a login name is required".to_string(),
            ));
        }

        let format = match overrides.format.or(file.format) {
            Some(format) => Format::from_str(&format)?,
            None => Format::default(),
        };
        let encoding = match overrides.encoding.or(file.encoding) {
            Some(encoding) => TextEncoding::from_str(&encoding)?,
            None => TextEncoding::default(),
        };

        let fields = match overrides.fields {
            Some(fields) => split_fields(&fields),
            None => file.fields.and_then(|fields| {
                let fields: Vec<String> = fields
                    .into_iter()
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .collect();
                (!fields.is_empty()).then_some(fields)
            }),
        };

        let strict = overrides.strict_columns || file.strict_columns.unwrap_or(false);
        let unknown_fields = if strict {
            UnknownFieldPolicy::Error
        } else {
            UnknownFieldPolicy::Ignore
        };

        let http = file.http.unwrap_or_default();
        let http = HttpConfig {
            timeout_ms: http.timeout_ms.unwrap_or(0),
            connect_timeout_ms: http.connect_timeout_ms.unwrap_or(0),
        }
        .with_env_overrides();

        let logging = LoggingConfig::from_settings(file.logging.as_ref())
            .with_env_overrides()
            .with_verbose(overrides.verbose);

        let config = Self {
            app_id,
            domain,
            auth,
            filter: non_empty(overrides.query).or(non_empty(file.query)),
            fields,
            format,
            encoding,
            delete_all: overrides.delete_all,
            input: overrides.input,
            output: overrides.output,
            unknown_fields,
            http,
            logging,
            origin: ConfigOrigin::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        match self.mode() {
            Mode::Import => {
                if self.output.is_some() {
                    return Err(Error::InvalidInput(
                        "--output cannot be combined with an import file".to_string(),
                    ));
                }
                if !self.format.supports_import() {
                    return Err(Error::InvalidInput(format!(
                        "format {} does not support import",
                        self.format
                    )));
                }
            },
            Mode::Export => {
                if self.delete_all {
                    return Err(Error::InvalidInput(
                        "--delete-all needs an import file".to_string(),
                    ));
                }
            },
        }
        Ok(())
    }

    /// Returns whether this run imports or exports.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        if self.input.is_some() {
            Mode::Import
        } else {
            Mode::Export
        }
    }

    /// Builds export options.
    #[must_use]
    pub fn export_options(&self) -> ExportOptions {
        let mut options = ExportOptions::default()
            .with_format(self.format)
            .with_encoding(self.encoding)
            .with_unknown_fields(self.unknown_fields);
        if let Some(filter) = &self.filter {
            options = options.with_filter(filter.clone());
        }
        if let Some(fields) = &self.fields {
            options = options.with_fields(fields.clone());
        }
        options
    }

    /// Builds import options.
    #[must_use]
    pub const fn import_options(&self) -> ImportOptions {
        ImportOptions {
            format: self.format,
            encoding: self.encoding,
            delete_all: self.delete_all,
        }
    }
}

/// Values given on the command line.
///
/// `None` and `false` fall through to the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Domain or sub-domain.
    pub domain: Option<String>,
    /// Login name.
    pub login: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Basic-auth user.
    pub basic_auth_user: Option<String>,
    /// Basic-auth password.
    pub basic_auth_password: Option<String>,
    /// API token.
    pub api_token: Option<String>,
    /// App id, unparsed.
    pub app_id: Option<String>,
    /// Query filter.
    pub query: Option<String>,
    /// Comma separated field codes.
    pub fields: Option<String>,
    /// Format name.
    pub format: Option<String>,
    /// Encoding name.
    pub encoding: Option<String>,
    /// Delete all records before importing.
    pub delete_all: bool,
    /// Import file.
    pub input: Option<PathBuf>,
    /// Export file.
    pub output: Option<PathBuf>,
    /// Fail on fields outside the column list.
    pub strict_columns: bool,
    /// Debug logging.
    pub verbose: bool,
}

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Domain or sub-domain.
    pub domain: Option<String>,
    /// App id.
    pub app: Option<u64>,
    /// Login name.
    pub login: Option<String>,
    /// Password.
    #[serde(default, deserialize_with = "secret_string_serde::deserialize_optional")]
    pub password: Option<SecretString>,
    /// API token.
    #[serde(default, deserialize_with = "secret_string_serde::deserialize_optional")]
    pub api_token: Option<SecretString>,
    /// Format name.
    pub format: Option<String>,
    /// Encoding name.
    pub encoding: Option<String>,
    /// Query filter.
    pub query: Option<String>,
    /// Fields to export.
    pub fields: Option<Vec<String>>,
    /// Fail on fields outside the column list.
    pub strict_columns: Option<bool>,
    /// Basic authentication in front of the service.
    pub basic_auth: Option<BasicAuthFile>,
    /// HTTP timeouts.
    pub http: Option<HttpConfigFile>,
    /// Logging settings.
    pub logging: Option<LoggingSettings>,
}

/// `[basic_auth]` section.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct BasicAuthFile {
    /// User name.
    pub user: Option<String>,
    /// Password.
    #[serde(default, deserialize_with = "secret_string_serde::deserialize_optional")]
    pub password: Option<SecretString>,
}

/// `[http]` section.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct HttpConfigFile {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: Option<u64>,
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Filter directive, e.g. `debug` or `kintone_transfer=trace`.
    pub level: Option<String>,
    /// Log to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl ConfigFile {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        toml::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/kintone-transfer/` on macOS)
    /// 2. XDG config dir (`~/.config/kintone-transfer/` for Unix compatibility)
    ///
    /// Returns an empty configuration if no usable file is found.
    #[must_use]
    pub fn load_default() -> (Self, ConfigOrigin) {
        Self::load_first(&Self::default_paths())
    }

    /// Loads the first existing file of `paths` that parses.
    ///
    /// Files that fail to load are recorded in the returned origin and the
    /// search moves on.
    #[must_use]
    pub fn load_first(paths: &[PathBuf]) -> (Self, ConfigOrigin) {
        let mut origin = ConfigOrigin::default();
        for path in paths.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(file) => {
                    origin.loaded = Some(path.clone());
                    return (file, origin);
                },
                Err(e) => origin.skipped.push((path.clone(), e.to_string())),
            }
        }
        (Self::default(), origin)
    }

    /// Returns the candidate default config file paths.
    #[must_use]
    pub fn default_paths() -> Vec<PathBuf> {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Vec::new();
        };

        let platform = base_dirs
            .config_dir()
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME);
        let xdg = base_dirs
            .home_dir()
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME);

        if platform == xdg {
            vec![platform]
        } else {
            vec![platform, xdg]
        }
    }
}

/// Outcome of the config file search.
///
/// Config is read before logging is set up, so the outcome is kept and
/// logged afterwards with [`ConfigOrigin::log`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOrigin {
    /// File the settings were read from.
    pub loaded: Option<PathBuf>,
    /// Default-location files that were ignored, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

impl ConfigOrigin {
    /// Emits the search outcome through `tracing`.
    pub fn log(&self) {
        for (path, reason) in &self.skipped {
            tracing::warn!(path = %path.display(), "Ignoring config file: {reason}");
        }
        match &self.loaded {
            Some(path) => tracing::debug!(path = %path.display(), "Loaded config file"),
            None => tracing::debug!("No config file found"),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Splits a comma separated field list, dropping blanks.
#[must_use]
pub fn split_fields(fields: &str) -> Option<Vec<String>> {
    let fields: Vec<String> = fields
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect();
    (!fields.is_empty()).then_some(fields)
}

/// Serde helpers for `SecretString` values.
mod secret_string_serde {
    use secrecy::SecretString;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        Ok(s.map(SecretString::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::LogFormat;
    use secrecy::ExposeSecret;
    use std::io::Write;

    fn overrides() -> ConfigOverrides {
        ConfigOverrides {
            domain: Some("example".to_string()),
            api_token: Some("token".to_string()),
            app_id: Some("7".to_string()),
            ..ConfigOverrides::default()
        }
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_resolve_from_flags() {
        let config = TransferConfig::resolve(ConfigFile::default(), overrides()).unwrap();
        assert_eq!(config.app_id, AppId::new(7));
        assert_eq!(config.domain, "example.cybozu.com");
        assert_eq!(config.format, Format::Csv);
        assert_eq!(config.encoding, TextEncoding::Utf8);
        assert_eq!(config.unknown_fields, UnknownFieldPolicy::Ignore);
        assert_eq!(config.mode(), Mode::Export);
    }

    #[test]
    fn test_qualified_domain_kept() {
        let mut flags = overrides();
        flags.domain = Some("records.kintone.com".to_string());
        let config = TransferConfig::resolve(ConfigFile::default(), flags).unwrap();
        assert_eq!(config.domain, "records.kintone.com");
    }

    #[test]
    fn test_missing_app_id() {
        let mut flags = overrides();
        flags.app_id = None;
        let result = TransferConfig::resolve(ConfigFile::default(), flags);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_missing_domain() {
        let mut flags = overrides();
        flags.domain = Some("  ".to_string());
        let result = TransferConfig::resolve(ConfigFile::default(), flags);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_missing_credentials() {
        let mut flags = overrides();
        flags.api_token = None;
        let result = TransferConfig::resolve(ConfigFile::default(), flags);
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        let mut flags = overrides();
        flags.api_token = None;
        flags.login = Some("alice".to_string());
        assert!(TransferConfig::resolve(ConfigFile::default(), flags).is_ok());
    }

    #[test]
    fn test_unknown_encoding() {
        let mut flags = overrides();
        flags.encoding = Some("latin-9".to_string());
        let result = TransferConfig::resolve(ConfigFile::default(), flags);
        assert!(matches!(result, Err(Error::UnsupportedEncoding(_))));
    }

    #[test]
    fn test_fields_split_and_trimmed() {
        let mut flags = overrides();
        flags.fields = Some(" name, qty ,,items ".to_string());
        let config = TransferConfig::resolve(ConfigFile::default(), flags).unwrap();
        assert_eq!(
            config.fields,
            Some(vec!["name".to_string(), "qty".to_string(), "items".to_string()])
        );
        assert_eq!(split_fields(" , "), None);
    }

    #[test]
    fn test_import_mode_conflicts() {
        let mut flags = overrides();
        flags.input = Some(PathBuf::from("in.csv"));
        flags.output = Some(PathBuf::from("out.csv"));
        assert!(TransferConfig::resolve(ConfigFile::default(), flags).is_err());

        let mut flags = overrides();
        flags.input = Some(PathBuf::from("in.json"));
        flags.format = Some("json".to_string());
        assert!(TransferConfig::resolve(ConfigFile::default(), flags).is_err());

        let mut flags = overrides();
        flags.delete_all = true;
        assert!(TransferConfig::resolve(ConfigFile::default(), flags).is_err());
    }

    #[test]
    fn test_import_options() {
        let mut flags = overrides();
        flags.input = Some(PathBuf::from("in.csv"));
        flags.delete_all = true;
        flags.encoding = Some("SJIS".to_string());
        let config = TransferConfig::resolve(ConfigFile::default(), flags).unwrap();

        assert_eq!(config.mode(), Mode::Import);
        let options = config.import_options();
        assert!(options.delete_all);
        assert_eq!(options.encoding, TextEncoding::ShiftJis);
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
domain = "acme"
app = 12
login = "alice"
password = "secret"
encoding = "euc-jp"
query = "status = \"open\""
fields = ["name", " qty "]
strict_columns = true

[basic_auth]
user = "proxy"
password = "hunter2"

[logging]
format = "json"
"#,
        );

        let config =
            TransferConfig::load(Some(file.path()), ConfigOverrides::default()).unwrap();
        assert_eq!(config.app_id, AppId::new(12));
        assert_eq!(config.domain, "acme.cybozu.com");
        assert_eq!(config.encoding, TextEncoding::EucJp);
        assert_eq!(config.filter.as_deref(), Some("status = \"open\""));
        assert_eq!(
            config.fields,
            Some(vec!["name".to_string(), "qty".to_string()])
        );
        assert_eq!(config.unknown_fields, UnknownFieldPolicy::Error);
        assert_eq!(
            config.auth.password.as_ref().map(|p| p.expose_secret().to_string()),
            Some("secret".to_string())
        );
        assert_eq!(config.auth.basic_auth_user.as_deref(), Some("proxy"));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_flags_override_file() {
        let file = write_config("domain = \"acme\"\napp = 12\napi_token = \"file\"\n");
        let flags = ConfigOverrides {
            app_id: Some("99".to_string()),
            api_token: Some("flag".to_string()),
            ..ConfigOverrides::default()
        };

        let config = TransferConfig::load(Some(file.path()), flags).unwrap();
        assert_eq!(config.app_id, AppId::new(99));
        assert_eq!(config.domain, "acme.cybozu.com");
        assert_eq!(
            config.auth.api_token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("flag".to_string())
        );
    }

    #[test]
    fn test_load_first_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.toml");
        let good = dir.path().join("good.toml");
        std::fs::write(&broken, "app = [\n").unwrap();
        std::fs::write(&good, "app = 5\n").unwrap();
        let paths = vec![dir.path().join("absent.toml"), broken.clone(), good.clone()];

        let (file, origin) = ConfigFile::load_first(&paths);
        assert_eq!(file.app, Some(5));
        assert_eq!(origin.loaded, Some(good));
        assert_eq!(origin.skipped.len(), 1);
        assert_eq!(origin.skipped[0].0, broken);
        assert!(origin.skipped[0].1.contains("parse_config_file"));

        let (file, origin) = ConfigFile::load_first(&paths[..2]);
        assert!(file.app.is_none());
        assert!(origin.loaded.is_none());
        assert_eq!(origin.skipped.len(), 1);
    }

    #[test]
    fn test_explicit_file_is_recorded_as_origin() {
        let file = write_config("domain = \"acme\"\n");
        let config = TransferConfig::load(Some(file.path()), overrides()).unwrap();
        assert_eq!(config.origin.loaded.as_deref(), Some(file.path()));
        assert!(config.origin.skipped.is_empty());
    }

    #[test]
    fn test_unreadable_and_malformed_files() {
        let missing = TransferConfig::load(
            Some(Path::new("/nonexistent/kintone-transfer.toml")),
            overrides(),
        );
        assert!(matches!(
            missing,
            Err(Error::OperationFailed { ref operation, .. }) if operation == "read_config_file"
        ));

        let file = write_config("app = \"not a number\"\n");
        let malformed = TransferConfig::load(Some(file.path()), overrides());
        assert!(matches!(
            malformed,
            Err(Error::OperationFailed { ref operation, .. }) if operation == "parse_config_file"
        ));
    }

    #[test]
    fn test_export_options() {
        let mut flags = overrides();
        flags.query = Some("x = 1".to_string());
        flags.format = Some("json".to_string());
        let config = TransferConfig::resolve(ConfigFile::default(), flags).unwrap();

        let options = config.export_options();
        assert_eq!(options.format, Format::Json);
        assert_eq!(options.filter.as_deref(), Some("x = 1"));
        assert!(options.fields.is_none());
    }
}
