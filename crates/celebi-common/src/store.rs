use miette::Diagnostic;
use serde_json::{Map, Value};
use smol_str::SmolStr;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Errors emitted by key/value stores.
///
/// Only writes can fail. Reads collapse missing and unreadable entries into `None`.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum StoreError {
    /// Filesystem or I/O error
    #[error("I/O error: {0}")]
    #[diagnostic(
        code(celebi::store::io),
        help("check that the store path is writable")
    )]
    Io(#[from] std::io::Error),
    /// Serialization error (e.g., JSON)
    #[error("serialization error: {0}")]
    #[diagnostic(code(celebi::store::serde))]
    Serde(#[from] serde_json::Error),
    /// Any other error from a backend implementation
    #[error(transparent)]
    #[diagnostic(code(celebi::store::other))]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

/// Pluggable string-keyed storage for structured values.
///
/// `get` never fails: a missing entry and an entry that cannot be read back
/// are both reported as `None`, and callers must treat them the same way.
#[cfg_attr(not(target_arch = "wasm32"), trait_variant::make(Send))]
pub trait KeyValueStore {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> impl Future<Output = Option<Value>>;
    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Value) -> impl Future<Output = Result<(), StoreError>>;
    /// Delete `key`. Deleting an absent key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StoreError>>;
}

#[cfg(not(target_arch = "wasm32"))]
impl<T: KeyValueStore + Sync> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> impl Future<Output = Option<Value>> + Send {
        self.as_ref().get(key)
    }
    fn set(&self, key: &str, value: Value) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.as_ref().set(key, value)
    }
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.as_ref().remove(key)
    }
}

/// In-memory store, lives as long as the process.
///
/// Clones share the same map. This is the natural backend for the ephemeral
/// store and for tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<HashMap<SmolStr, Value>>>);

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub async fn len(&self) -> usize {
        self.0.read().await.len()
    }

    /// Whether the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.0.read().await.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<Value> {
        self.0.read().await.get(key).cloned()
    }
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.0.write().await.insert(SmolStr::new(key), value);
        Ok(())
    }
    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.0.write().await.remove(key);
        Ok(())
    }
}

/// File-backed store keeping every key in a single JSON object.
///
/// NOT secure, the file holds access tokens in plain text.
///
/// Example
/// ```no_run
/// use celebi_common::store::{FileStore, KeyValueStore};
/// # async fn demo() -> Result<(), celebi_common::store::StoreError> {
/// let store = FileStore::new("/tmp/celebi-store.json")?;
/// store.set("currentInstance", "mastodon.social".into()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct FileStore {
    /// Path to the JSON file.
    pub path: PathBuf,
}

impl FileStore {
    /// Open the store at `path`, creating the file (and its parent directory)
    /// if it does not exist yet. Existing contents are kept.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        if !path.exists() {
            std::fs::write(&path, b"{}")?;
        }
        Ok(Self { path })
    }

    fn read_map(&self) -> Option<Map<String, Value>> {
        let file = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&file).ok()? {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    fn write_map(&self, map: Map<String, Value>) -> Result<(), StoreError> {
        std::fs::write(&self.path, serde_json::to_string_pretty(&Value::Object(map))?)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Option<Value> {
        self.read_map()?.remove(key)
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut map = match self.read_map() {
            Some(map) => map,
            None => {
                #[cfg(feature = "tracing")]
                tracing::warn!(path = %self.path.display(), "store file unreadable, starting fresh");
                Map::new()
            }
        };
        map.insert(key.to_string(), value);
        self.write_map(map)
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let Some(mut map) = self.read_map() else {
            return Ok(());
        };
        if map.remove(key).is_some() {
            self.write_map(map)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("celebi-store-{}-{}", std::process::id(), name))
            .join("store.json")
    }

    #[tokio::test]
    async fn memory_store_roundtrip_and_remove() {
        let store = MemoryStore::new();
        assert!(store.get("accessToken").await.is_none());
        store.set("accessToken", json!("tok")).await.unwrap();
        assert_eq!(store.get("accessToken").await, Some(json!("tok")));
        store.remove("accessToken").await.unwrap();
        assert!(store.get("accessToken").await.is_none());
        // removing twice is fine
        store.remove("accessToken").await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn memory_store_clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.set("codeVerifier", json!("v1")).await.unwrap();
        assert_eq!(other.get("codeVerifier").await, Some(json!("v1")));
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let path = temp_path("reopen");
        let _ = std::fs::remove_file(&path);
        {
            let store = FileStore::new(&path).unwrap();
            store
                .set("app_mastodon.example", json!({"client_id": "cid"}))
                .await
                .unwrap();
        }
        let store = FileStore::new(&path).unwrap();
        assert_eq!(
            store.get("app_mastodon.example").await,
            Some(json!({"client_id": "cid"}))
        );
        store.remove("app_mastodon.example").await.unwrap();
        assert!(store.get("app_mastodon.example").await.is_none());
    }

    #[tokio::test]
    async fn file_store_corrupt_file_reads_as_absent() {
        let path = temp_path("corrupt");
        let store = FileStore::new(&path).unwrap();
        std::fs::write(&path, b"{not json").unwrap();
        assert!(store.get("accessToken").await.is_none());
        store.remove("accessToken").await.unwrap();

        // a write recovers the file
        store.set("accessToken", json!("tok")).await.unwrap();
        assert_eq!(store.get("accessToken").await, Some(json!("tok")));
    }
}
