//! Mounted credential files.

use std::fmt;
use std::path::Path;

use launchgate_common::LaunchError;
use launchgate_common::constants::FALLBACK_NAMESPACE;

use crate::config::SecretsConfig;

/// Credential token read from a mounted file. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Trailing newlines and whitespace are stripped, matching shell
    /// command substitution. An empty token is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let token = raw.trim_end();
        (!token.is_empty()).then(|| Self(token.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `Authorization` header value, prefixing `Bearer ` unless already present
    pub fn bearer_header(&self) -> String {
        if self.0.starts_with("Bearer ") {
            self.0.clone()
        } else {
            format!("Bearer {}", self.0)
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

/// Read the token file
pub async fn read_token(path: &Path) -> Result<Token, LaunchError> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        LaunchError::config(format!("cannot read token file {}: {}", path.display(), e))
    })?;

    Token::parse(&raw).ok_or_else(|| {
        LaunchError::config(format!("token file {} is empty", path.display()))
    })
}

/// Read the namespace file, falling back to `default`
pub async fn read_namespace(path: &Path) -> String {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().to_string(),
        Ok(_) => FALLBACK_NAMESPACE.to_string(),
        Err(e) => {
            tracing::debug!(
                path = %path.display(),
                error = %e,
                "Namespace file unavailable, using fallback"
            );
            FALLBACK_NAMESPACE.to_string()
        }
    }
}

/// Credentials handed to the server process
#[derive(Debug, Clone)]
pub struct Credentials {
    pub token: Token,
    pub namespace: Option<String>,
}

impl Credentials {
    pub async fn load(config: &SecretsConfig) -> Result<Self, LaunchError> {
        let token = read_token(&config.token_path).await?;
        let namespace = match config.namespace_env {
            Some(_) => Some(read_namespace(&config.namespace_path).await),
            None => None,
        };

        tracing::info!(
            token_path = %config.token_path.display(),
            namespace = namespace.as_deref().unwrap_or("-"),
            "🔑 Credentials loaded"
        );

        Ok(Self { token, namespace })
    }

    /// Environment variables to inject into the server process
    pub fn env_vars(&self, config: &SecretsConfig) -> Vec<(String, String)> {
        let mut vars = vec![(config.token_env.clone(), self.token.expose().to_string())];

        if let Some(ref name) = config.auth_header_env {
            vars.push((name.clone(), self.token.bearer_header()));
        }
        if let (Some(name), Some(namespace)) = (&config.namespace_env, &self.namespace) {
            vars.push((name.clone(), namespace.clone()));
        }

        vars
    }
}
