//! Connection settings for the Microsoft Graph API.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{MsGraphError, MsGraphResult};

pub const DEFAULT_GRAPH_ENDPOINT: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_LOGIN_ENDPOINT: &str = "https://login.microsoftonline.com";
pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MsGraphConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// Base URL including the API version.
    pub graph_endpoint: String,
    pub login_endpoint: String,
    pub scope: String,
    /// Retries for throttled (429) and unavailable (5xx) responses.
    pub max_retries: u32,
    /// `$top` for list requests; Graph caps most collections at 999.
    pub page_size: u32,
    pub timeout_secs: u64,
}

impl Default for MsGraphConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            graph_endpoint: DEFAULT_GRAPH_ENDPOINT.to_string(),
            login_endpoint: DEFAULT_LOGIN_ENDPOINT.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            max_retries: 5,
            page_size: 999,
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for MsGraphConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MsGraphConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("graph_endpoint", &self.graph_endpoint)
            .field("login_endpoint", &self.login_endpoint)
            .field("scope", &self.scope)
            .field("max_retries", &self.max_retries)
            .field("page_size", &self.page_size)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl MsGraphConfig {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Self::default()
        }
    }

    /// Credentials must be present and page size within Graph's limits.
    pub fn validate(&self) -> MsGraphResult<()> {
        for (name, value) in [
            ("tenant_id", &self.tenant_id),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(MsGraphError::Config(format!("{name} is required")));
            }
        }
        if !(1..=999).contains(&self.page_size) {
            return Err(MsGraphError::Config(format!(
                "page_size must be between 1 and 999, got {}",
                self.page_size
            )));
        }
        Ok(())
    }

    pub(crate) fn graph_base(&self) -> &str {
        self.graph_endpoint.trim_end_matches('/')
    }

    pub(crate) fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.login_endpoint.trim_end_matches('/'),
            self.tenant_id
        )
    }
}
