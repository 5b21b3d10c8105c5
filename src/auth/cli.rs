//! Delegated tokens from the signed-in Azure CLI session

use azure_core::auth::TokenCredential;

use super::AuthError;

/// Ask `credential` for a token covering `scope`.
pub(crate) async fn get_access_token(
    credential: &dyn TokenCredential,
    scope: &str,
) -> Result<String, AuthError> {
    let access = credential
        .get_token(&[scope])
        .await
        .map_err(|e| AuthError::CliFailed(e.to_string()))?;

    Ok(access.token.secret().to_string())
}
