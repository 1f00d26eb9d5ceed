use std::collections::BTreeMap;
use std::sync::Arc;

use cosfs_connector::{BlobConnector, Connector};
use cosfs_store::{InMemoryBackend, LocalDirBackend, ObjectBackend, S3Backend, S3Options};
use serde::Serialize;
use tracing::info;

use crate::config::{BackendConfig, Credentials, FileSystemConfig};
use crate::error::{ConfigResult, FsResult};
use crate::filesystem::BlobFileSystem;

/// Resolved client settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClientSettings {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    /// Access key id of the resolved credentials; the secret is not kept here.
    pub access_key_id: Option<String>,
}

/// Builds a [`BlobFileSystem`] from a [`FileSystemConfig`].
#[derive(Debug, Clone, Default)]
pub struct FileSystemCreator {
    config: FileSystemConfig,
    properties: BTreeMap<String, String>,
}

impl FileSystemCreator {
    pub fn new(config: FileSystemConfig) -> Self {
        Self {
            config,
            properties: BTreeMap::new(),
        }
    }

    /// Properties consulted by the `system-properties` and `default`
    /// credential sources.
    pub fn with_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.properties = properties;
        self
    }

    pub fn config(&self) -> &FileSystemConfig {
        &self.config
    }

    /// Validate the client section and resolve its credentials.
    pub fn client_settings(&self) -> ConfigResult<ClientSettings> {
        let (settings, _) = self.resolve_client()?;
        Ok(settings)
    }

    /// Options for the S3 backend, secret included.
    pub fn s3_options(&self) -> ConfigResult<S3Options> {
        let (settings, credentials) = self.resolve_client()?;
        let max_retries = match self.config.backend {
            BackendConfig::S3 { max_retries } => max_retries,
            _ => None,
        };
        Ok(S3Options {
            endpoint: settings.endpoint,
            region: settings.region,
            access_key_id: settings.access_key_id,
            secret_access_key: credentials.map(|c| c.secret_access_key),
            max_retries,
        })
    }

    fn resolve_client(&self) -> ConfigResult<(ClientSettings, Option<Credentials>)> {
        let client = &self.config.client;
        client.validate()?;
        let credentials: Option<Credentials> = match &client.credentials {
            Some(c) => c.resolve(&self.properties)?,
            None => None,
        };
        let settings = ClientSettings {
            endpoint: client.endpoint_override.clone(),
            region: client.region.clone(),
            access_key_id: credentials.as_ref().map(|c| c.access_key_id.clone()),
        };
        Ok((settings, credentials))
    }

    /// Open the configured backend.
    pub fn backend(&self) -> FsResult<Arc<dyn ObjectBackend>> {
        Ok(match &self.config.backend {
            BackendConfig::Memory => Arc::new(InMemoryBackend::new()),
            BackendConfig::Local { root } => Arc::new(LocalDirBackend::open(root)?),
            BackendConfig::S3 { .. } => Arc::new(S3Backend::new(self.s3_options()?)?),
        })
    }

    /// Build the connector over `backend`, cached or not per the config.
    pub fn connector(&self, backend: Arc<dyn ObjectBackend>) -> Arc<dyn BlobConnector> {
        if self.config.cache {
            Arc::new(Connector::caching(backend))
        } else {
            Arc::new(Connector::new(backend))
        }
    }

    pub fn create(&self) -> FsResult<BlobFileSystem> {
        let settings = self.client_settings()?;
        let backend = self.backend()?;
        info!(
            backend = ?self.config.backend,
            cache = self.config.cache,
            endpoint = settings.endpoint.as_deref().unwrap_or("default"),
            region = settings.region.as_deref().unwrap_or("default"),
            credentials = settings.access_key_id.is_some(),
            "created file system"
        );
        Ok(BlobFileSystem::new(self.connector(backend)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use cosfs_path::BlobPath;
    use tempfile::TempDir;

    use cosfs_connector::ConnectorError;
    use cosfs_store::StoreError;

    use crate::config::{CredentialsConfig, CredentialsSource, PROP_ACCESS_KEY_ID, PROP_SECRET_KEY};
    use crate::error::{ConfigError, FsError};

    fn path(s: &str) -> BlobPath {
        s.parse().unwrap()
    }

    #[test]
    fn default_config_builds_memory_fs() {
        let fs = FileSystemCreator::default().create().unwrap();
        let file = path("bucket/f");
        fs.append(&file, &[Bytes::from_static(b"abc")]).unwrap();
        assert_eq!(fs.file_size(&file).unwrap(), 3);
    }

    #[test]
    fn local_backend_persists_across_creators() {
        let dir = TempDir::new().unwrap();
        let config = FileSystemConfig {
            cache: false,
            backend: BackendConfig::Local { root: dir.path().join("data") },
            ..Default::default()
        };
        let file = path("bucket/dir/f");

        let first = FileSystemCreator::new(config.clone()).create().unwrap();
        first.append(&file, &[Bytes::from_static(b"kept")]).unwrap();
        drop(first);

        let second = FileSystemCreator::new(config).create().unwrap();
        assert_eq!(&second.read_all(&file).unwrap()[..], b"kept");
        assert!(second.directory_exists(&path("bucket/dir")).unwrap());
    }

    #[test]
    fn settings_from_properties() {
        let mut config = FileSystemConfig::default();
        config.client.endpoint_override = Some("https://s3.example.test".into());
        config.client.region = Some("eu".into());
        config.client.credentials = Some(CredentialsConfig {
            source: CredentialsSource::SystemProperties,
            access_key_id: None,
            secret_access_key: None,
        });
        let properties = BTreeMap::from([
            (PROP_ACCESS_KEY_ID.to_string(), "AKID".to_string()),
            (PROP_SECRET_KEY.to_string(), "SECRET".to_string()),
        ]);

        let settings = FileSystemCreator::new(config)
            .with_properties(properties)
            .client_settings()
            .unwrap();
        assert_eq!(settings.endpoint.as_deref(), Some("https://s3.example.test"));
        assert_eq!(settings.region.as_deref(), Some("eu"));
        assert_eq!(settings.access_key_id.as_deref(), Some("AKID"));
    }

    #[test]
    fn s3_backend_takes_client_settings() {
        let mut config = FileSystemConfig {
            backend: BackendConfig::S3 { max_retries: Some(0) },
            ..Default::default()
        };
        config.client.endpoint_override = Some("http://127.0.0.1:1".into());
        config.client.region = Some("us-south".into());
        config.client.credentials = Some(CredentialsConfig {
            source: CredentialsSource::Static,
            access_key_id: Some("AKID".into()),
            secret_access_key: Some("SECRET".into()),
        });
        let creator = FileSystemCreator::new(config);

        let options = creator.s3_options().unwrap();
        assert_eq!(options.endpoint.as_deref(), Some("http://127.0.0.1:1"));
        assert_eq!(options.region.as_deref(), Some("us-south"));
        assert_eq!(options.access_key_id.as_deref(), Some("AKID"));
        assert_eq!(options.secret_access_key.as_deref(), Some("SECRET"));
        assert_eq!(options.max_retries, Some(0));

        // Nothing listens on the endpoint, so the first request fails in the
        // S3 client rather than in a local backend.
        let fs = creator.create().unwrap();
        let err = fs.append(&path("bucket/f"), &[Bytes::from_static(b"x")]).unwrap_err();
        assert!(matches!(
            err,
            FsError::Connector(ConnectorError::Backend(StoreError::ObjectStore(_)))
        ));
    }

    #[test]
    fn create_rejects_invalid_client() {
        let mut config = FileSystemConfig::default();
        config.client.endpoint_override = Some("https://s3.example.test".into());
        let err = FileSystemCreator::new(config).create().unwrap_err();
        assert!(matches!(err, FsError::Config(ConfigError::EndpointWithoutRegion)));
    }
}
