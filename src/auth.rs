//! Bearer tokens for the CLI: a pre-acquired token or the Azure CLI.

use std::sync::Arc;

use azrest::{CachedTokens, StaticToken, TokenProvider};

use crate::runner;

/// Acquires tokens through `az account get-access-token`.
pub struct AzureCliToken;

impl TokenProvider for AzureCliToken {
    fn token(&self, scope: &str) -> azrest::Result<String> {
        if !runner::command_exists("az") {
            return Err(azrest::Error::token(
                scope,
                "Azure CLI (az) not found; install it or set AZURE_ACCESS_TOKEN",
            ));
        }
        log::debug!("Acquiring token for {scope} via Azure CLI");
        let token = runner::run_capture(
            "az",
            &[
                "account",
                "get-access-token",
                "--scope",
                scope,
                "--query",
                "accessToken",
                "-o",
                "tsv",
            ],
        )
        .map_err(|e| azrest::Error::token(scope, format!("{e:#}")))?;

        if token.is_empty() {
            return Err(azrest::Error::token(scope, "Azure CLI returned an empty token"));
        }
        Ok(token)
    }
}

/// Pick the token source: an explicit token wins over the Azure CLI.
pub fn token_provider(access_token: Option<&str>) -> Arc<dyn TokenProvider> {
    match access_token {
        Some(token) if !token.is_empty() => {
            log::debug!("Using pre-acquired access token for every scope");
            Arc::new(StaticToken::new(token))
        }
        _ => Arc::new(CachedTokens::new(AzureCliToken)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_token_is_used() {
        let provider = token_provider(Some("tok"));
        assert_eq!(provider.token(azrest::scopes::SEARCH).unwrap(), "tok");
        assert_eq!(provider.token(azrest::scopes::MANAGEMENT).unwrap(), "tok");
    }
}
