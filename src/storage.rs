use crate::errors::StoreError;
use crate::models::{AppData, ProfilePatch, ProfileRecord};
use crate::operations::ResetEntry;
use std::{
    ffi::OsString,
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::{error, info};

/// Access to persisted profile rows.
pub trait ProfileStore: Send + Sync {
    fn read_profile(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<ProfileRecord>, StoreError>> + Send;

    fn create_profile(
        &self,
        record: ProfileRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Applies `patch` and returns the stored record. Either the whole patch
    /// is persisted or nothing changes.
    fn write_profile(
        &self,
        user_id: &str,
        patch: ProfilePatch,
    ) -> impl Future<Output = Result<ProfileRecord, StoreError>> + Send;
}

/// Append-only log of resets.
pub trait ResetHistory: Send + Sync {
    fn append(&self, entry: &ResetEntry) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Reads the data file. A missing file is an empty store; an unreadable or
/// malformed file is an error so that no later write can replace it.
pub async fn load_data(path: &Path) -> Result<AppData, StoreError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "no data file yet, starting empty");
            return Ok(AppData::default());
        }
        Err(err) => return Err(err.into()),
    };
    serde_json::from_slice(&bytes).map_err(|err| {
        error!(path = %path.display(), "data file is not valid profile data: {err}");
        StoreError::from(err)
    })
}

/// Writes the whole store to a sibling temp file, then renames it over
/// `path`. Readers see either the old file or the new one.
pub async fn persist_data(path: &Path, data: &AppData) -> Result<(), StoreError> {
    let payload = serde_json::to_vec_pretty(data)?;
    let staging = staging_path(path);
    fs::write(&staging, payload).await?;
    if let Err(err) = fs::rename(&staging, path).await {
        let _ = fs::remove_file(&staging).await;
        return Err(err.into());
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Profiles kept in memory and mirrored to a single JSON file.
#[derive(Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    data: Arc<Mutex<AppData>>,
}

impl JsonFileStore {
    pub fn new(path: PathBuf, data: AppData) -> Self {
        Self {
            path,
            data: Arc::new(Mutex::new(data)),
        }
    }

    pub async fn open(path: PathBuf) -> Result<Self, StoreError> {
        let data = load_data(&path).await?;
        Ok(Self::new(path, data))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProfileStore for JsonFileStore {
    async fn read_profile(&self, user_id: &str) -> Result<Option<ProfileRecord>, StoreError> {
        let data = self.data.lock().await;
        Ok(data.profiles.get(user_id).cloned())
    }

    async fn create_profile(&self, record: ProfileRecord) -> Result<(), StoreError> {
        let mut data = self.data.lock().await;
        if data.profiles.contains_key(&record.user_id) {
            return Err(StoreError::AlreadyExists(record.user_id));
        }

        let mut next = data.clone();
        next.profiles.insert(record.user_id.clone(), record);
        persist_data(&self.path, &next).await?;
        *data = next;
        Ok(())
    }

    async fn write_profile(
        &self,
        user_id: &str,
        patch: ProfilePatch,
    ) -> Result<ProfileRecord, StoreError> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        let record = next
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(user_id.to_string()))?;
        patch.apply(record);
        let updated = record.clone();

        persist_data(&self.path, &next).await?;
        *data = next;
        Ok(updated)
    }
}

/// Reset history as JSON lines appended to a file.
#[derive(Debug, Clone)]
pub struct JsonlHistory {
    path: PathBuf,
}

impl JsonlHistory {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub async fn entries(&self) -> Result<Vec<ResetEntry>, StoreError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StoreError::from))
            .collect()
    }
}

impl ResetHistory for JsonlHistory {
    async fn append(&self, entry: &ResetEntry) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
