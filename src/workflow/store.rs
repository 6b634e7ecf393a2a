//! Session persistence
//!
//! `SessionStore` encodes sessions as JSON on top of any [`KvStore`]. The
//! backing medium is best-effort: every failure surfaces as
//! `Error::Persistence` and the scheduler treats it as a warning.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::state::WorkflowSession;
use crate::{Error, Result};

/// Namespace of session keys in the underlying store
pub const SESSION_PREFIX: &str = "workflow_session_";

/// Minimal key-value interface the session store is written against
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;

    /// Keys starting with `prefix`, sorted
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Persistence("memory store lock poisoned".to_string()))
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .lock()?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// One file per key in a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Persistence(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::Persistence(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;

        // Write then rename so a crash never leaves a half-written checkpoint
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)
            .and_then(|_| std::fs::rename(&tmp, &path))
            .map_err(|e| {
                Error::Persistence(format!("Failed to write {}: {}", path.display(), e))
            })
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Persistence(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::Persistence(format!(
                    "Failed to list {}: {}",
                    self.dir.display(),
                    e
                )))
            }
        };

        let mut keys: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                name.strip_suffix(".json").and_then(decode_key)
            })
            .filter(|k| k.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// Escape everything outside `[A-Za-z0-9._-]` as `%XX` so any key maps to a
/// safe, reversible file name.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn decode_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Keyed persistence of workflow sessions
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KvStore>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Store backed by a directory of JSON files
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStore::new(dir)))
    }

    /// Store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    fn storage_key(session_key: &str) -> String {
        format!("{}{}", SESSION_PREFIX, session_key)
    }

    /// Load a session; `None` if never saved or cleared
    pub fn load(&self, session_key: &str) -> Result<Option<WorkflowSession>> {
        let Some(bytes) = self.kv.get(&Self::storage_key(session_key))? else {
            return Ok(None);
        };

        let session: WorkflowSession = serde_json::from_slice(&bytes).map_err(|e| {
            Error::Persistence(format!("Corrupt session {}: {}", session_key, e))
        })?;
        Ok(Some(session))
    }

    /// Write a checkpoint
    pub fn save(&self, session: &WorkflowSession) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(session)
            .map_err(|e| Error::Persistence(format!("Failed to encode session: {}", e)))?;
        self.kv.set(&Self::storage_key(&session.session_key), &bytes)?;
        debug!("Checkpointed session {}", session.session_key);
        Ok(())
    }

    /// Remove a persisted session
    pub fn clear(&self, session_key: &str) -> Result<()> {
        self.kv.delete(&Self::storage_key(session_key))
    }

    /// Keys of all persisted sessions
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .kv
            .keys(SESSION_PREFIX)?
            .into_iter()
            .filter_map(|k| k.strip_prefix(SESSION_PREFIX).map(str::to_string))
            .collect())
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::generator::CaseContext;
    use crate::workflow::definition::{TaskSpec, WorkflowDefinition};
    use crate::workflow::state::ExecutionMode;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Store whose medium can be made to fail
    #[derive(Default)]
    pub(crate) struct FlakyStore {
        inner: MemoryStore,
        pub(crate) failing_writes: AtomicBool,
        /// Upcoming reads that fail
        pub(crate) failing_reads: AtomicUsize,
    }

    impl FlakyStore {
        /// Every operation fails
        pub(crate) fn failing() -> Self {
            let store = Self::failing_writes();
            store.failing_reads.store(usize::MAX, Ordering::SeqCst);
            store
        }

        /// Reads work, writes fail
        pub(crate) fn failing_writes() -> Self {
            let store = Self::default();
            store.failing_writes.store(true, Ordering::SeqCst);
            store
        }

        pub(crate) fn fail_next_reads(&self, count: usize) {
            self.failing_reads.store(count, Ordering::SeqCst);
        }

        fn unavailable() -> Error {
            Error::Persistence("medium unavailable".to_string())
        }

        fn check_write(&self) -> Result<()> {
            if self.failing_writes.load(Ordering::SeqCst) {
                Err(Self::unavailable())
            } else {
                Ok(())
            }
        }
    }

    impl KvStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            let failed = self
                .failing_reads
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(Self::unavailable());
            }
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &[u8]) -> Result<()> {
            self.check_write()?;
            self.inner.set(key, value)
        }

        fn delete(&self, key: &str) -> Result<()> {
            self.check_write()?;
            self.inner.delete(key)
        }

        fn keys(&self, prefix: &str) -> Result<Vec<String>> {
            if self.failing_reads.load(Ordering::SeqCst) > 0 {
                return Err(Self::unavailable());
            }
            self.inner.keys(prefix)
        }
    }

    fn session(key: &str) -> WorkflowSession {
        let def = WorkflowDefinition::new(
            "pair",
            vec![TaskSpec::new("a", "A"), TaskSpec::new("b", "B").depends_on(&["a"])],
        );
        let mut session =
            WorkflowSession::new(key, &def, ExecutionMode::Sequential, CaseContext::new(key));
        session.start("a").unwrap();
        session.complete("a", "output of a".to_string()).unwrap();
        session
    }

    #[test]
    fn test_key_encoding_is_reversible() {
        for key in ["plain", "GEMS/JHB 2024#1", "ünïcode", "a%b"] {
            let encoded = encode_key(key);
            assert!(encoded
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "._-%".contains(c)));
            assert_eq!(decode_key(&encoded).as_deref(), Some(key));
        }
    }

    #[test]
    fn test_save_load_clear_file_store() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::in_dir(dir.path().join("sessions"));

        assert!(store.load("case/1").unwrap().is_none());

        let s = session("case/1");
        store.save(&s).unwrap();
        assert_eq!(store.load("case/1").unwrap(), Some(s));
        assert_eq!(store.list().unwrap(), vec!["case/1"]);

        store.clear("case/1").unwrap();
        assert!(store.load("case/1").unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
        // Clearing twice is fine
        store.clear("case/1").unwrap();
    }

    #[test]
    fn test_resume_idempotence() {
        let store = SessionStore::in_memory();
        let s = session("case-2");

        store.save(&s).unwrap();
        let loaded = store.load("case-2").unwrap().unwrap();
        store.save(&loaded).unwrap();
        let reloaded = store.load("case-2").unwrap().unwrap();

        assert_eq!(reloaded, s);
    }

    #[test]
    fn test_list_ignores_foreign_keys() {
        let kv = Arc::new(MemoryStore::new());
        kv.set("unrelated", b"{}").unwrap();
        let store = SessionStore::new(kv);
        store.save(&session("b")).unwrap();
        store.save(&session("a")).unwrap();

        assert_eq!(store.list().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_corrupt_session_is_persistence_error() {
        let kv = Arc::new(MemoryStore::new());
        kv.set("workflow_session_bad", b"not json").unwrap();
        let store = SessionStore::new(kv);

        assert!(matches!(store.load("bad"), Err(Error::Persistence(_))));
    }

    #[test]
    fn test_unavailable_medium() {
        let store = SessionStore::new(Arc::new(FlakyStore::failing()));
        assert!(matches!(store.save(&session("x")), Err(Error::Persistence(_))));
        assert!(matches!(store.load("x"), Err(Error::Persistence(_))));
    }

    #[test]
    fn test_failed_read_leaves_session_intact() {
        let kv = Arc::new(FlakyStore::default());
        let store = SessionStore::new(kv.clone());
        let s = session("y");
        store.save(&s).unwrap();

        kv.fail_next_reads(1);
        assert!(matches!(store.load("y"), Err(Error::Persistence(_))));
        assert_eq!(store.load("y").unwrap(), Some(s));
    }
}
