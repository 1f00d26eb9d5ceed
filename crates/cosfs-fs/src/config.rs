//! TOML configuration.
//!
//! ```toml
//! cache = true
//!
//! [backend]
//! kind = "s3"
//! max-retries = 3
//!
//! [client]
//! endpoint-override = "https://s3.us.cloud-object-storage.appdomain.cloud"
//! region = "us"
//!
//! [client.credentials]
//! type = "static"
//! access-key-id = "..."
//! secret-access-key = "..."
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
/// Older spelling, accepted when [`ENV_SECRET_ACCESS_KEY`] is unset.
pub const ENV_SECRET_KEY: &str = "AWS_SECRET_KEY";
pub const PROP_ACCESS_KEY_ID: &str = "aws.accessKeyId";
pub const PROP_SECRET_KEY: &str = "aws.secretKey";

/// Top-level configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSystemConfig {
    /// Memoize blob listings in the connector.
    pub cache: bool,
    pub backend: BackendConfig,
    pub client: ClientConfig,
}

impl Default for FileSystemConfig {
    fn default() -> Self {
        Self {
            cache: true,
            backend: BackendConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

impl FileSystemConfig {
    /// Read and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate a config document.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.client.validate()
    }
}

/// Where objects are stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BackendConfig {
    /// Process-local map; contents vanish on exit.
    #[default]
    Memory,
    /// One directory per bucket below `root`.
    Local { root: PathBuf },
    /// S3-compatible service described by the `[client]` section.
    #[serde(rename_all = "kebab-case")]
    S3 {
        /// Retries per request; the client default when unset.
        max_retries: Option<usize>,
    },
}

/// Settings for the object-store client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ClientConfig {
    pub endpoint_override: Option<String>,
    pub region: Option<String>,
    pub credentials: Option<CredentialsConfig>,
}

impl ClientConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.endpoint_override.is_some() && self.region.is_none() {
            return Err(ConfigError::EndpointWithoutRegion);
        }
        if let Some(credentials) = &self.credentials {
            credentials.validate()?;
        }
        Ok(())
    }
}

/// Where credentials come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialsSource {
    EnvironmentVariables,
    SystemProperties,
    Static,
    /// Environment first, then properties.
    Default,
}

impl CredentialsSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EnvironmentVariables => "environment-variables",
            Self::SystemProperties => "system-properties",
            Self::Static => "static",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for CredentialsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CredentialsConfig {
    #[serde(rename = "type")]
    pub source: CredentialsSource,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

impl CredentialsConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.source != CredentialsSource::Static {
            return Ok(());
        }
        if self.access_key_id.is_none() {
            return Err(missing(CredentialsSource::Static, "access-key-id"));
        }
        if self.secret_access_key.is_none() {
            return Err(missing(CredentialsSource::Static, "secret-access-key"));
        }
        Ok(())
    }

    /// Resolve against the process environment and `properties`.
    pub fn resolve(
        &self,
        properties: &BTreeMap<String, String>,
    ) -> ConfigResult<Option<Credentials>> {
        self.resolve_with(|name| std::env::var(name).ok(), properties)
    }

    /// Resolve with an explicit environment lookup.
    ///
    /// `Ok(None)` means the `default` source found nothing and the client
    /// should fall back to anonymous access.
    pub fn resolve_with<E>(
        &self,
        env: E,
        properties: &BTreeMap<String, String>,
    ) -> ConfigResult<Option<Credentials>>
    where
        E: Fn(&str) -> Option<String>,
    {
        match self.source {
            CredentialsSource::Static => {
                self.validate()?;
                Ok(Some(Credentials::new(
                    self.access_key_id.clone().unwrap_or_default(),
                    self.secret_access_key.clone().unwrap_or_default(),
                )))
            }
            CredentialsSource::EnvironmentVariables => from_environment(&env).map(Some),
            CredentialsSource::SystemProperties => from_properties(properties).map(Some),
            CredentialsSource::Default => Ok(from_environment(&env)
                .or_else(|_| from_properties(properties))
                .ok()),
        }
    }
}

/// An access key pair. The secret is never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

fn missing(source: CredentialsSource, name: &str) -> ConfigError {
    ConfigError::MissingCredential {
        origin: source.as_str(),
        name: name.to_string(),
    }
}

fn from_environment<E>(env: &E) -> ConfigResult<Credentials>
where
    E: Fn(&str) -> Option<String>,
{
    let source = CredentialsSource::EnvironmentVariables;
    let access = env(ENV_ACCESS_KEY_ID).ok_or_else(|| missing(source, ENV_ACCESS_KEY_ID))?;
    let secret = env(ENV_SECRET_ACCESS_KEY)
        .or_else(|| env(ENV_SECRET_KEY))
        .ok_or_else(|| missing(source, ENV_SECRET_ACCESS_KEY))?;
    Ok(Credentials::new(access, secret))
}

fn from_properties(properties: &BTreeMap<String, String>) -> ConfigResult<Credentials> {
    let source = CredentialsSource::SystemProperties;
    let lookup = |name: &str| {
        properties
            .get(name)
            .cloned()
            .ok_or_else(|| missing(source, name))
    };
    Ok(Credentials::new(lookup(PROP_ACCESS_KEY_ID)?, lookup(PROP_SECRET_KEY)?))
}
