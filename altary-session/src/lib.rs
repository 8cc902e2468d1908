#![deny(missing_docs)]
//! Filesystem-backed store for the local Altary session.
//!
//! The session lives in a single JSON file in the user's home directory:
//!
//! ```text
//! ~/.altary/config.json
//! { "api_base_url": "...", "auth": { "token": "...", "project_id": "..." } }
//! ```
//!
//! Reads never fail: a missing file yields defaults, an unreadable one is
//! logged and also yields defaults. Every mutation is a full
//! read-modify-write of the record, written to a temporary file, synced and
//! renamed over the original before the call returns. There is no locking
//! between processes; the last writer wins.

use std::path::{Path, PathBuf};

use altary_types::{AltaryError, DEFAULT_API_BASE_URL, Session, Token};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

/// Environment variable naming the config file explicitly.
pub const CONFIG_PATH_ENV: &str = "ALTARY_CONFIG_PATH";

/// Environment variable overriding the API base URL without persisting it.
pub const BASE_URL_ENV: &str = "ALTARY_API_BASE_URL";

const CONFIG_DIR_NAME: &str = ".altary";
const CONFIG_FILE_NAME: &str = "config.json";

/// On-disk shape of the session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigRecord {
    #[serde(default = "default_base_url")]
    api_base_url: String,
    #[serde(default)]
    auth: AuthRecord,
    /// Unknown top-level keys, kept so a rewrite does not drop them.
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AuthRecord {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl Default for ConfigRecord {
    fn default() -> Self {
        Self {
            api_base_url: default_base_url(),
            auth: AuthRecord::default(),
            extra: serde_json::Map::new(),
        }
    }
}

impl ConfigRecord {
    fn to_session(&self, base_url_override: Option<&str>) -> Session {
        let api_base_url = base_url_override
            .or(Some(self.api_base_url.as_str()))
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        Session {
            api_base_url,
            token: self.auth.token.clone().and_then(Token::new),
            default_project_id: self
                .auth
                .project_id
                .clone()
                .filter(|id| !id.trim().is_empty()),
        }
    }
}

/// Owner of the persisted [`Session`].
///
/// Construct one per process and share it (`Arc<SessionStore>`) with the
/// remote client and the auth flow. Callers only ever receive snapshots.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    base_url_override: Option<String>,
}

impl SessionStore {
    /// Create a store backed by the given file.
    ///
    /// Nothing is read or created until the first call.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            base_url_override: None,
        }
    }

    /// Create a store from the process environment.
    ///
    /// Uses `ALTARY_CONFIG_PATH` if set, otherwise `~/.altary/config.json`.
    /// `ALTARY_API_BASE_URL`, if set, overrides the stored base URL.
    pub fn from_env() -> Self {
        resolve(
            std::env::var(CONFIG_PATH_ENV).ok(),
            std::env::var(BASE_URL_ENV).ok(),
            dirs::home_dir(),
        )
    }

    /// Override the base URL returned by [`load`](Self::load).
    ///
    /// The override is never written to disk, and [`clear`](Self::clear)
    /// keeps whatever base URL is persisted.
    #[must_use]
    pub fn with_base_url_override(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.base_url_override = if url.trim().is_empty() { None } else { Some(url) };
        self
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current session, or defaults if nothing usable is on disk.
    pub async fn load(&self) -> Session {
        self.read_record()
            .await
            .to_session(self.base_url_override.as_deref())
    }

    /// Read-only copy of the current session, for display.
    pub async fn snapshot(&self) -> Session {
        self.load().await
    }

    /// Store `token`, leaving the other fields untouched.
    ///
    /// # Errors
    ///
    /// [`AltaryError::InvalidInput`] for an empty token,
    /// [`AltaryError::ConfigIo`] if the record cannot be written.
    pub async fn set_token(&self, token: &str) -> Result<Session, AltaryError> {
        let token = Token::new(token)
            .ok_or_else(|| AltaryError::InvalidInput("token must not be empty".into()))?;
        self.update(|record| record.auth.token = Some(token.expose().to_string()))
            .await
    }

    /// Store the default project, leaving the other fields untouched.
    ///
    /// # Errors
    ///
    /// [`AltaryError::InvalidInput`] for an empty id,
    /// [`AltaryError::ConfigIo`] if the record cannot be written.
    pub async fn set_default_project(&self, project_id: &str) -> Result<Session, AltaryError> {
        if project_id.trim().is_empty() {
            return Err(AltaryError::InvalidInput(
                "project id must not be empty".into(),
            ));
        }
        let project_id = project_id.to_string();
        self.update(move |record| record.auth.project_id = Some(project_id))
            .await
    }

    /// Forget the token and the default project. The base URL is kept.
    ///
    /// # Errors
    ///
    /// [`AltaryError::ConfigIo`] if the record cannot be written.
    pub async fn clear(&self) -> Result<Session, AltaryError> {
        self.update(|record| record.auth = AuthRecord::default())
            .await
    }

    async fn update(
        &self,
        apply: impl FnOnce(&mut ConfigRecord),
    ) -> Result<Session, AltaryError> {
        let mut record = self.load_record().await.map_err(AltaryError::ConfigIo)?;
        apply(&mut record);
        self.write_record(&record)
            .await
            .map_err(AltaryError::ConfigIo)?;
        Ok(record.to_session(self.base_url_override.as_deref()))
    }

    /// Like [`Self::load_record`], but an unreadable file also yields defaults.
    async fn read_record(&self) -> ConfigRecord {
        match self.load_record().await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "config file unreadable, using defaults"
                );
                ConfigRecord::default()
            }
        }
    }

    /// Read the record. A missing, empty or malformed file yields defaults;
    /// any other read failure is returned so it is never overwritten.
    async fn load_record(&self) -> std::io::Result<ConfigRecord> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no config file, using defaults");
                return Ok(ConfigRecord::default());
            }
            Err(e) => return Err(e),
        };
        if contents.trim().is_empty() {
            return Ok(ConfigRecord::default());
        }
        match serde_json::from_str(&contents) {
            Ok(record) => Ok(record),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "config file is not valid JSON, using defaults"
                );
                Ok(ConfigRecord::default())
            }
        }
    }

    async fn write_record(&self, record: &ConfigRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let tmp_path = temp_path(&self.path);
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.sync_all().await?;
        drop(file);
        restrict_permissions(&tmp_path).await?;

        tokio::fs::rename(&tmp_path, &self.path).await?;
        tracing::debug!(path = %self.path.display(), "config written");
        Ok(())
    }
}

/// Build a store from already-read environment values.
fn resolve(
    config_path: Option<String>,
    base_url: Option<String>,
    home: Option<PathBuf>,
) -> SessionStore {
    let path = match config_path.filter(|p| !p.trim().is_empty()) {
        Some(path) => PathBuf::from(path),
        None => {
            let root = home.unwrap_or_else(|| {
                tracing::warn!("home directory unknown, storing config in the working directory");
                PathBuf::from(".")
            });
            root.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
        }
    };
    let store = SessionStore::new(path);
    match base_url {
        Some(url) => store.with_base_url_override(url),
        None => store,
    }
}

/// Sibling temp file used for the atomic rename.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| CONFIG_FILE_NAME.to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

/// The record holds a bearer token: owner read/write only.
#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
