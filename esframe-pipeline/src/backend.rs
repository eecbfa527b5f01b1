//! Process-wide decoder backend state.
//!
//! Decoder backends often carry global state (a loaded shared library, a
//! one-time library initialisation) that must exist exactly once per process
//! no matter how many pipelines use it. The [`BackendRegistry`] loads a
//! backend on first use, hands out reference-counted [`BackendLease`]s and
//! unloads the backend when the last lease is dropped.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while loading or sharing a backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be loaded.
    #[error("failed to load backend '{name}': {reason}")]
    Load {
        /// Registry name of the backend.
        name: String,
        /// Why loading failed.
        reason: String,
    },

    /// The backend is already registered under a different type.
    #[error("backend '{0}' is registered with a different type")]
    TypeMismatch(String),

    /// A required entry point is missing from the backend.
    #[error("backend '{backend}' has no symbol '{symbol}'")]
    MissingSymbol {
        /// Library the symbol was looked up in.
        backend: String,
        /// Name of the missing symbol.
        symbol: String,
    },
}

impl BackendError {
    /// Shorthand for a load failure.
    pub fn load(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        BackendError::Load {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

struct Entry {
    refs: usize,
    handle: Arc<dyn Any + Send + Sync>,
}

/// Reference-counted registry of loaded backends, keyed by name.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static BackendRegistry {
        static GLOBAL: OnceLock<BackendRegistry> = OnceLock::new();
        GLOBAL.get_or_init(BackendRegistry::new)
    }

    /// Take a reference to backend `name`, loading it with `load` if this is
    /// the first reference.
    ///
    /// The registry lock is held while loading, so concurrent first users of
    /// the same backend load it once. A failed load leaves no entry behind.
    pub fn acquire<T, F>(&self, name: &str, load: F) -> Result<BackendLease<T>, BackendError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T, BackendError>,
    {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(name) {
            let handle = Arc::clone(&entry.handle)
                .downcast::<T>()
                .map_err(|_| BackendError::TypeMismatch(name.to_string()))?;
            entry.refs += 1;
            debug!(backend = name, refs = entry.refs, "Backend reference taken");
            return Ok(self.lease(name, handle));
        }

        let backend = load().map_err(|e| {
            warn!(backend = name, error = %e, "Backend load failed");
            e
        })?;
        let handle = Arc::new(backend);
        entries.insert(
            name.to_string(),
            Entry {
                refs: 1,
                handle: Arc::clone(&handle) as Arc<dyn Any + Send + Sync>,
            },
        );
        info!(backend = name, "Backend loaded");
        Ok(self.lease(name, handle))
    }

    /// Number of live leases on `name`.
    pub fn refcount(&self, name: &str) -> usize {
        self.entries.lock().get(name).map_or(0, |e| e.refs)
    }

    /// Check if `name` is currently loaded.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }

    /// Names of the loaded backends.
    pub fn loaded(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn lease<T>(&self, name: &str, handle: Arc<T>) -> BackendLease<T> {
        BackendLease {
            registry: self.clone(),
            name: name.to_string(),
            handle,
        }
    }

    fn release(&self, name: &str) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(name) else {
            return;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 {
            entries.remove(name);
            info!(backend = name, "Backend unloaded");
        } else {
            debug!(backend = name, refs = entry.refs, "Backend reference released");
        }
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("loaded", &self.loaded())
            .finish()
    }
}

/// A live reference to a loaded backend.
pub struct BackendLease<T> {
    registry: BackendRegistry,
    name: String,
    handle: Arc<T>,
}

impl<T> BackendLease<T> {
    /// Registry name of the backend.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Deref for BackendLease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.handle
    }
}

impl<T> Drop for BackendLease<T> {
    fn drop(&mut self) {
        self.registry.release(&self.name);
    }
}

impl<T> fmt::Debug for BackendLease<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendLease")
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(feature = "dynamic-backend")]
pub use native::NativeLibrary;

#[cfg(feature = "dynamic-backend")]
mod native {
    use super::BackendError;
    use libloading::{Library, Symbol};
    use std::path::{Path, PathBuf};
    use tracing::{debug, info};

    /// A shared library opened from the first loadable candidate path.
    pub struct NativeLibrary {
        path: PathBuf,
        library: Library,
    }

    impl NativeLibrary {
        /// Open the first of `candidates` that loads.
        ///
        /// # Safety
        ///
        /// Loading a library runs its initialisers; the caller must trust
        /// every candidate path.
        pub unsafe fn open_first<P: AsRef<Path>>(candidates: &[P]) -> Result<Self, BackendError> {
            let mut failures = Vec::new();
            for candidate in candidates {
                let path = candidate.as_ref();
                // SAFETY: the caller vouches for the candidate libraries.
                match unsafe { Library::new(path) } {
                    Ok(library) => {
                        info!(path = %path.display(), "Opened backend library");
                        return Ok(Self {
                            path: path.to_path_buf(),
                            library,
                        });
                    }
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "Backend candidate not loadable");
                        failures.push(format!("{}: {e}", path.display()));
                    }
                }
            }

            let reason = if failures.is_empty() {
                "no candidate paths".to_string()
            } else {
                failures.join("; ")
            };
            Err(BackendError::load("native", reason))
        }

        /// Path the library was opened from.
        pub fn path(&self) -> &Path {
            &self.path
        }

        /// Look up a symbol.
        ///
        /// # Safety
        ///
        /// `T` must match the symbol's real type.
        pub unsafe fn symbol<T>(&self, name: &str) -> Result<Symbol<'_, T>, BackendError> {
            // SAFETY: the caller guarantees the type of the symbol.
            unsafe { self.library.get(name.as_bytes()) }.map_err(|_| BackendError::MissingSymbol {
                backend: self.path.display().to_string(),
                symbol: name.to_string(),
            })
        }
    }

    impl std::fmt::Debug for NativeLibrary {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("NativeLibrary")
                .field("path", &self.path)
                .finish()
        }
    }

}
