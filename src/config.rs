use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{BackendError, Error, Result};
use crate::key::resolve_key;

pub const MISSING_BUCKET: &str = "GCSAdapter requires a bucket";

pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

pub const ENV_PROJECT_ID: &str = "GCP_PROJECT_ID";
pub const ENV_KEYFILE_PATH: &str = "GCP_KEYFILE_PATH";
pub const ENV_BUCKET: &str = "GCS_BUCKET";
pub const ENV_BUCKET_PREFIX: &str = "GCS_BUCKET_PREFIX";
pub const ENV_DIRECT_ACCESS: &str = "GCS_DIRECT_ACCESS";
pub const ENV_ENDPOINT: &str = "GCS_ENDPOINT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CredentialReference {
    KeyFile(PathBuf),
    Hmac(HmacKey),
}

impl From<&str> for CredentialReference {
    fn from(path: &str) -> Self {
        CredentialReference::KeyFile(PathBuf::from(path))
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HmacKey {
    #[serde(alias = "accessKeyId", alias = "access_id")]
    pub access_key_id: String,
    #[serde(alias = "secretAccessKey", alias = "secret")]
    pub secret_access_key: String,
}

impl HmacKey {
    pub fn load<P: AsRef<Path>>(path: P) -> std::result::Result<Self, BackendError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BackendError::new(format!("Failed to read key file {:?}: {}", path, e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            BackendError::new(format!("Failed to parse key file {:?}: {}", path, e))
        })
    }
}

impl fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacKey")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterOptions {
    #[serde(alias = "projectId")]
    pub project_id: Option<String>,
    #[serde(alias = "keyFilename", alias = "credentialReference")]
    pub key_filename: Option<CredentialReference>,
    pub bucket: Option<String>,
    #[serde(alias = "bucketPrefix")]
    pub bucket_prefix: Option<String>,
    #[serde(alias = "directAccess")]
    pub direct_access: Option<bool>,
    pub endpoint: Option<String>,
}

impl AdapterOptions {
    /// Positional form: `(project_id, credential, bucket)` plus extra options.
    ///
    /// Only `bucket_prefix`, `direct_access` and `endpoint` are taken from
    /// `extra`.
    pub fn positional(
        project_id: impl Into<String>,
        credential: Option<CredentialReference>,
        bucket: Option<&str>,
        extra: AdapterOptions,
    ) -> Self {
        Self {
            project_id: Some(project_id.into()),
            key_filename: credential,
            bucket: bucket.map(str::to_string),
            bucket_prefix: extra.bucket_prefix,
            direct_access: extra.direct_access,
            endpoint: extra.endpoint,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());
        Self {
            project_id: var(ENV_PROJECT_ID),
            key_filename: var(ENV_KEYFILE_PATH).map(|p| CredentialReference::KeyFile(p.into())),
            bucket: var(ENV_BUCKET),
            bucket_prefix: var(ENV_BUCKET_PREFIX),
            direct_access: var(ENV_DIRECT_ACCESS)
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes")),
            endpoint: var(ENV_ENDPOINT),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdapterConfig {
    pub project_id: Option<String>,
    pub credential: Option<CredentialReference>,
    pub bucket: String,
    pub key_prefix: String,
    pub direct_access: bool,
    pub endpoint: String,
}

impl AdapterConfig {
    pub fn from_options(options: AdapterOptions) -> Result<Self> {
        let bucket = options
            .bucket
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Error::Configuration(MISSING_BUCKET.to_string()))?;

        Ok(Self {
            project_id: options.project_id,
            credential: options.key_filename,
            bucket,
            key_prefix: options.bucket_prefix.unwrap_or_default(),
            direct_access: options.direct_access.unwrap_or(false),
            endpoint: options
                .endpoint
                .map(|e| e.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        })
    }

    pub fn resolve_key(&self, filename: &str) -> String {
        resolve_key(&self.key_prefix, filename)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    pub mount: String,
    #[serde(alias = "applicationId")]
    pub application_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gcs: AdapterOptions,
    pub host: Option<HostConfig>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> AnyResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config = toml::from_str(&content)
            .context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn default_config() -> String {
        r#"
[gcs]
project_id = "my-project"
bucket = "my-bucket"
key_filename = "gcs-hmac.json"   # JSON file with access_key_id / secret_access_key
bucket_prefix = ""               # Optional prefix for all object keys
direct_access = false            # Hand out storage URLs instead of host URLs
# endpoint = "https://storage.googleapis.com"

[host]
mount = "http://localhost:1337/parse"
application_id = "my-app"
"#
        .to_string()
    }
}
