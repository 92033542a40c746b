//! In-memory backend used by tests and the memory dev mode

use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::error::{StorageError, StorageResult};
use crate::gateway::{ObjectStorage, Upload};
use crate::keys::object_key;

const BASE_URL: &str = "https://storage.kavach.test";

/// Keeps objects in a map and records every release call.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    released: Mutex<Vec<String>>,
    /// Uploads still accepted before `store` starts failing; `None` is no limit.
    upload_budget: Mutex<Option<usize>>,
    fail_releases: AtomicBool,
}

/// The guarded maps are never left half-written, so a poisoned lock is
/// used as is.
fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `store` call fail.
    pub fn fail_uploads(&self, fail: bool) {
        *locked(&self.upload_budget) = fail.then_some(0);
    }

    /// Accept `count` more uploads, then fail every following `store` call.
    pub fn fail_uploads_after(&self, count: usize) {
        *locked(&self.upload_budget) = Some(count);
    }

    /// Make every following release fail (the call is still recorded).
    pub fn fail_releases(&self, fail: bool) {
        self.fail_releases.store(fail, Ordering::SeqCst);
    }

    /// Keys passed to release, in call order.
    pub fn released(&self) -> Vec<String> {
        locked(&self.released).clone()
    }

    /// Number of objects currently held.
    pub fn len(&self) -> usize {
        locked(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the object behind a URL or key is still stored.
    pub fn contains(&self, url_or_key: &str) -> bool {
        match self.resolve_key(url_or_key) {
            Some(key) => locked(&self.objects).contains_key(&key),
            None => false,
        }
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn store(&self, upload: &Upload) -> StorageResult<String> {
        {
            let mut budget = locked(&self.upload_budget);
            match budget.as_mut() {
                Some(0) => {
                    return Err(StorageError::Upload(format!(
                        "memory store refused {}",
                        upload.file_name
                    )));
                }
                Some(left) => *left -= 1,
                None => {}
            }
        }

        let key = object_key(&upload.file_name);
        locked(&self.objects).insert(key.clone(), upload.bytes.clone());
        Ok(format!("{}/{}", BASE_URL, key))
    }

    async fn release_key(&self, key: &str) -> StorageResult<()> {
        locked(&self.released).push(key.to_string());

        if self.fail_releases.load(Ordering::SeqCst) {
            return Err(StorageError::Delete(format!("memory store refused {}", key)));
        }

        locked(&self.objects).remove(key);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
