use crate::error::{Error, Result};
use std::path::Path;

pub const CLIENT_ID: &str = "CLIENT_ID";
pub const CLIENT_SECRET: &str = "CLIENT_SECRET";
pub const USER_AGENT: &str = "USER_AGENT";

/// Script-app credentials for the OAuth client-credentials grant.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Credentials {
    /// Load `env_file` if it exists (without overriding variables already set),
    /// then read the three settings from the process environment.
    pub fn from_env(env_file: Option<&Path>) -> Result<Self> {
        if let Some(path) = env_file {
            match dotenvy::from_path(path) {
                Ok(()) => tracing::debug!(path = %path.display(), "loaded env file"),
                Err(e) if e.not_found() => {
                    tracing::debug!(path = %path.display(), "no env file")
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable env file"),
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(Error::MissingCredentials(key))
        };
        Ok(Self {
            client_id: get(CLIENT_ID)?,
            client_secret: get(CLIENT_SECRET)?,
            user_agent: get(USER_AGENT)?,
        })
    }
}
