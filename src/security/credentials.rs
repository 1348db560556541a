//! Credential resolution and request authentication.
//!
//! kintone accepts either an API token (`X-Cybozu-API-Token`) or a login
//! name and password (`X-Cybozu-Authorization`, base64 of `login:password`).
//! Domains behind an HTTP basic-auth proxy additionally need an
//! `Authorization: Basic` header.
//!
//! Passwords missing from the configuration are asked for through a
//! [`CredentialsProvider`], so the interactive prompt can be swapped out in
//! tests.

use crate::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};

/// Header carrying an API token.
pub const API_TOKEN_HEADER: &str = "X-Cybozu-API-Token";

/// Header carrying password authentication.
pub const PASSWORD_HEADER: &str = "X-Cybozu-Authorization";

/// Header carrying HTTP basic authentication.
pub const BASIC_AUTH_HEADER: &str = "Authorization";

/// How requests authenticate against the app.
#[derive(Debug, Clone)]
pub enum Auth {
    /// API token.
    ApiToken(SecretString),
    /// Login name and password.
    Password {
        /// Login name.
        login: String,
        /// Password.
        password: SecretString,
    },
}

/// HTTP basic authentication in front of the service.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    /// User name.
    pub user: String,
    /// Password.
    pub password: SecretString,
}

/// Fully resolved credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// App authentication.
    pub auth: Auth,
    /// Optional basic authentication.
    pub basic: Option<BasicAuth>,
}

impl Credentials {
    /// Returns the authentication headers to attach to every request.
    #[must_use]
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::with_capacity(2);
        match &self.auth {
            Auth::ApiToken(token) => {
                headers.push((API_TOKEN_HEADER, token.expose_secret().to_string()));
            },
            Auth::Password { login, password } => {
                let pair = format!("{login}:{}", password.expose_secret());
                headers.push((PASSWORD_HEADER, STANDARD.encode(pair)));
            },
        }
        if let Some(basic) = &self.basic {
            let pair = format!("{}:{}", basic.user, basic.password.expose_secret());
            headers.push((BASIC_AUTH_HEADER, format!("Basic {}", STANDARD.encode(pair))));
        }
        headers
    }
}

/// Authentication settings as configured, before prompting.
#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    /// Login name for password authentication.
    pub login: Option<String>,
    /// Password; asked for when a login is set and this is not.
    pub password: Option<SecretString>,
    /// API token; takes precedence over login and password.
    pub api_token: Option<SecretString>,
    /// Basic-auth user name.
    pub basic_auth_user: Option<String>,
    /// Basic-auth password; asked for when a user is set and this is not.
    pub basic_auth_password: Option<SecretString>,
}

impl AuthSettings {
    /// Returns whether an API token or a login is configured.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        has_text(self.api_token.as_ref().map(|t| t.expose_secret()))
            || has_text(self.login.as_deref())
    }

    /// Resolves the settings into credentials, asking `provider` for
    /// passwords that were not configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if neither an API token nor a login is
    /// configured, or the provider cannot supply a password.
    pub fn resolve(&self, provider: &dyn CredentialsProvider) -> Result<Credentials> {
        let auth = if let Some(token) = self
            .api_token
            .as_ref()
            .filter(|t| !t.expose_secret().is_empty())
        {
            Auth::ApiToken(token.clone())
        } else {
            let login = self
                .login
                .as_deref()
                .filter(|l| !l.is_empty())
                .ok_or_else(|| {
                    Error::InvalidInput("either an API token or a login name is required".into())
                })?;
            let password = match self.password.as_ref().filter(|p| !p.expose_secret().is_empty()) {
                Some(password) => password.clone(),
                None => provider.password(login)?,
            };
            Auth::Password {
                login: login.to_string(),
                password,
            }
        };

        let basic = match self.basic_auth_user.as_deref().filter(|u| !u.is_empty()) {
            Some(user) => {
                let password = match self
                    .basic_auth_password
                    .as_ref()
                    .filter(|p| !p.expose_secret().is_empty())
                {
                    Some(password) => password.clone(),
                    None => provider.basic_auth_password(user)?,
                };
                Some(BasicAuth {
                    user: user.to_string(),
                    password,
                })
            },
            None => None,
        };

        Ok(Credentials { auth, basic })
    }
}

fn has_text(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

/// Supplies passwords that were not configured up front.
pub trait CredentialsProvider {
    /// Returns the password for `login`.
    ///
    /// # Errors
    ///
    /// Returns an error if no password can be obtained.
    fn password(&self, login: &str) -> Result<SecretString>;

    /// Returns the basic-auth password for `user`.
    ///
    /// # Errors
    ///
    /// Returns an error if no password can be obtained.
    fn basic_auth_password(&self, user: &str) -> Result<SecretString>;
}

/// Asks on the terminal with echo disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptingCredentials;

impl PromptingCredentials {
    fn prompt(prompt: &str) -> Result<SecretString> {
        rpassword::prompt_password(prompt)
            .map(SecretString::from)
            .map_err(|e| Error::OperationFailed {
                operation: "read_password".to_string(),
                cause: e.to_string(),
            })
    }
}

impl CredentialsProvider for PromptingCredentials {
    fn password(&self, _login: &str) -> Result<SecretString> {
        Self::prompt("Password: ")
    }

    fn basic_auth_password(&self, _user: &str) -> Result<SecretString> {
        Self::prompt("Basic authentication password: ")
    }
}

/// Returns fixed passwords, or fails when none was given.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    password: Option<SecretString>,
    basic_auth_password: Option<SecretString>,
}

impl StaticCredentials {
    /// Creates a provider with no passwords.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Sets the basic-auth password.
    #[must_use]
    pub fn with_basic_auth_password(mut self, password: impl Into<String>) -> Self {
        self.basic_auth_password = Some(SecretString::from(password.into()));
        self
    }
}

impl CredentialsProvider for StaticCredentials {
    fn password(&self, login: &str) -> Result<SecretString> {
        self.password
            .clone()
            .ok_or_else(|| Error::InvalidInput(format!("no password available for '{login}'")))
    }

    fn basic_auth_password(&self, user: &str) -> Result<SecretString> {
        self.basic_auth_password.clone().ok_or_else(|| {
            Error::InvalidInput(format!("no basic authentication password for '{user}'"))
        })
    }
}
