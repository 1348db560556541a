//! Security features.
//!
//! Credential resolution and authentication headers.

mod credentials;

pub use credentials::{
    API_TOKEN_HEADER, Auth, AuthSettings, BASIC_AUTH_HEADER, BasicAuth, Credentials,
    CredentialsProvider, PASSWORD_HEADER, PromptingCredentials, StaticCredentials,
};
