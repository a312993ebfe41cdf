//! Connection settings for the warehouse.
//!
//! These types are embedded into the application configuration and deserialized from YAML or
//! environment variables. Secrets are wrapped in [`secrecy::SecretBox`] so they never show up in
//! `Debug` output or logs.

use std::fmt;
use std::time::Duration;

use secrecy::{CloneableSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Serialize};

/// Newtype around `String` that protects against accidental logging of credentials.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    /// Returns the secret value.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ConfigSecret {
    fn from(str: &str) -> Self {
        ConfigSecret(str.to_string())
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[redacted]")
    }
}

impl CloneableSecret for ConfigSecret {}
impl SerializableSecret for ConfigSecret {}
impl Zeroize for ConfigSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// How the bearer token in [`WarehouseConfig::token`] was issued.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// An OAuth access token.
    #[default]
    Oauth,
    /// A JWT signed with the user's key pair.
    KeypairJwt,
    /// A programmatic access token.
    ProgrammaticAccessToken,
}

impl TokenType {
    /// The value of the `X-Snowflake-Authorization-Token-Type` header.
    pub fn header_value(self) -> &'static str {
        match self {
            TokenType::Oauth => "OAUTH",
            TokenType::KeypairJwt => "KEYPAIR_JWT",
            TokenType::ProgrammaticAccessToken => "PROGRAMMATIC_ACCESS_TOKEN",
        }
    }
}

/// Names of the compute warehouses used by the different tools.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Warehouses {
    /// Warehouse used for initial loads and cost queries.
    pub init: String,
    /// Warehouse used for CDC processing and monitoring.
    pub cdc: String,
    /// Low-latency warehouse serving dashboards.
    pub interactive: String,
}

impl Default for Warehouses {
    fn default() -> Self {
        Self {
            init: "CLINICAL_INIT_WH".into(),
            cdc: "CLINICAL_CDC_WH".into(),
            interactive: "CLINICAL_INTERACTIVE_WH".into(),
        }
    }
}

/// Selects one of the configured [`Warehouses`] when opening a session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Compute {
    /// [`Warehouses::init`]
    Init,
    /// [`Warehouses::cdc`]
    Cdc,
    /// [`Warehouses::interactive`]
    Interactive,
}

/// Warehouse connection configuration.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WarehouseConfig {
    /// Account identifier, e.g. `myorg-myaccount`.
    ///
    /// Used to derive the API endpoint unless [`base_url`](Self::base_url) is set.
    pub account: String,

    /// Overrides the API endpoint, e.g. for a proxy or a local emulator.
    pub base_url: Option<String>,

    /// Login name, informational only; the token identifies the user.
    pub user: String,

    /// Role used for all statements.
    pub role: String,

    /// Default database.
    pub database: String,

    /// Default schema.
    pub schema: String,

    /// Compute warehouses per tool.
    pub warehouses: Warehouses,

    /// Bearer token used to authenticate against the SQL API.
    pub token: Option<SecretBox<ConfigSecret>>,

    /// How [`token`](Self::token) was issued.
    pub token_type: TokenType,

    /// Upper bound for a single statement, from submission to the last row.
    #[serde(with = "humantime_serde")]
    pub query_timeout: Duration,
}

impl WarehouseConfig {
    /// The base URL of the SQL API.
    pub fn endpoint(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_owned(),
            None => format!("https://{}.snowflakecomputing.com", self.account),
        }
    }

    /// The warehouse name to use for the given compute role.
    pub fn warehouse(&self, compute: Compute) -> &str {
        match compute {
            Compute::Init => &self.warehouses.init,
            Compute::Cdc => &self.warehouses.cdc,
            Compute::Interactive => &self.warehouses.interactive,
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            account: String::new(),
            base_url: None,
            user: String::new(),
            role: "CLINICAL_DATA_ENGINEER".into(),
            database: "CLINICAL_DATA_PIPELINE".into(),
            schema: "RAW_DATA".into(),
            warehouses: Warehouses::default(),
            token: None,
            token_type: TokenType::default(),
            query_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_from_account() {
        let mut config = WarehouseConfig {
            account: "acme-clinical".into(),
            ..Default::default()
        };
        assert_eq!(
            config.endpoint(),
            "https://acme-clinical.snowflakecomputing.com"
        );

        config.base_url = Some("http://localhost:8080/".into());
        assert_eq!(config.endpoint(), "http://localhost:8080");
        assert_eq!(config.warehouse(Compute::Cdc), "CLINICAL_CDC_WH");
    }

    #[test]
    fn token_is_redacted() {
        let config = WarehouseConfig {
            token: Some(SecretBox::new(Box::new(ConfigSecret::from("s3cr3t")))),
            ..Default::default()
        };
        assert!(!format!("{config:?}").contains("s3cr3t"));
    }
}
