use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use futures::future::{BoxFuture, FutureExt};

use crate::errors::BackendError;
use crate::store::{unique_name, Store};

/// Keeps saved files in memory, keyed by path.
#[derive(Default)]
pub(crate) struct MockStore {
    pub(crate) map: RwLock<HashMap<String, Vec<u8>>>,
    fail_saves: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MockStore {
    pub(crate) fn new() -> Self {
        MockStore::default()
    }

    pub(crate) fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub(crate) fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.map.read().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }
}

fn injected(operation: &str) -> BackendError {
    BackendError::Storage {
        source: io::Error::new(io::ErrorKind::Other, format!("injected {} failure", operation)),
    }
}

impl Store for MockStore {
    fn save<'a>(
        &'a self,
        filename: &'a str,
        raw: Vec<u8>,
    ) -> BoxFuture<'a, Result<String, BackendError>> {
        let result = if self.fail_saves.load(Ordering::SeqCst) {
            Err(injected("save"))
        } else {
            let path = format!("/mock/{}", unique_name(filename));
            self.map.write().unwrap().insert(path.clone(), raw);
            Ok(path)
        };

        async move { result }.boxed()
    }

    fn delete<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<(), BackendError>> {
        let result = if self.fail_deletes.load(Ordering::SeqCst) {
            Err(injected("delete"))
        } else {
            match self.map.write().unwrap().remove(path) {
                Some(_) => Ok(()),
                None => Err(BackendError::Storage {
                    source: io::Error::from(io::ErrorKind::NotFound),
                }),
            }
        };

        async move { result }.boxed()
    }
}
