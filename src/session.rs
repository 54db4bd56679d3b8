use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::formats::{AuthResponse, User};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub user: Option<User>,
}

impl From<AuthResponse> for Session {
    fn from(auth: AuthResponse) -> Self {
        Self {
            access: auth.access,
            refresh: auth.refresh,
            user: auth.user,
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> anyhow::Result<Option<Session>>;
    async fn save(&self, session: &Session) -> anyhow::Result<()>;
    async fn clear(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct LocalFsSessionStore {
    path: PathBuf,
}

impl LocalFsSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for LocalFsSessionStore {
    async fn load(&self) -> anyhow::Result<Option<Session>> {
        read_json(&self.path)
            .await
            .with_context(|| format!("read: {}", self.path.display()))
    }

    async fn save(&self, session: &Session) -> anyhow::Result<()> {
        write_json_atomic(&self.path, session)
            .await
            .context("write session file")
    }

    async fn clear(&self) -> anyhow::Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("remove session: {}", self.path.display()))
            }
        }
    }
}

#[derive(Default)]
pub struct SessionContext {
    current: Mutex<Option<Session>>,
    store: Option<Arc<dyn SessionStore>>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("active", &self.is_active())
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn restore(store: Arc<dyn SessionStore>) -> anyhow::Result<Self> {
        let current = store.load().await.context("load session")?;
        Ok(Self {
            current: Mutex::new(current),
            store: Some(store),
        })
    }

    pub async fn begin(&self, session: Session) -> anyhow::Result<()> {
        if let Some(store) = &self.store {
            store.save(&session).await.context("persist session")?;
        }
        *self.lock() = Some(session);
        tracing::debug!("session started");
        Ok(())
    }

    pub async fn end(&self) -> anyhow::Result<()> {
        *self.lock() = None;
        if let Some(store) = &self.store {
            store.clear().await.context("clear stored session")?;
        }
        tracing::debug!("session ended");
        Ok(())
    }

    pub async fn replace_access(&self, access: String) -> anyhow::Result<()> {
        let updated = {
            let mut current = self.lock();
            let Some(session) = current.as_mut() else {
                anyhow::bail!("no active session");
            };
            session.access = access;
            session.clone()
        };
        if let Some(store) = &self.store {
            store.save(&updated).await.context("persist refreshed session")?;
        }
        Ok(())
    }

    pub async fn set_user(&self, user: User) -> anyhow::Result<()> {
        let updated = {
            let mut current = self.lock();
            let Some(session) = current.as_mut() else {
                anyhow::bail!("no active session");
            };
            session.user = Some(user);
            session.clone()
        };
        if let Some(store) = &self.store {
            store.save(&updated).await.context("persist session user")?;
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    pub fn access_token(&self) -> Option<String> {
        self.lock().as_ref().map(|s| s.access.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.lock()
            .as_ref()
            .map(|s| s.refresh.clone())
            .filter(|token| !token.is_empty())
    }

    pub fn user(&self) -> Option<User> {
        self.lock().as_ref().and_then(|s| s.user.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        // A poisoned lock still holds a consistent Option<Session>.
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let value = serde_json::from_slice(&bytes).context("parse json")?;
    Ok(Some(value))
}

async fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create parent dir: {}", parent.display()))?;
    }

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}
