//! REST client factory for CLI commands.

use crate::Result;
use crate::config::TransferConfig;
use crate::security::CredentialsProvider;
use crate::store::KintoneClient;

/// Builds a kintone client from configuration, asking `provider` for any
/// password that was not configured.
///
/// # Errors
///
/// Returns an error if credentials cannot be resolved.
pub fn build_client(
    config: &TransferConfig,
    provider: &dyn CredentialsProvider,
) -> Result<KintoneClient> {
    let credentials = config.auth.resolve(provider)?;
    let client = KintoneClient::new(&config.domain, credentials, config.http);
    tracing::debug!(
        base_url = client.base_url(),
        app = %config.app_id,
        "Built kintone client"
    );
    Ok(client)
}
