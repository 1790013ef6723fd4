//! Resource locations and one-time lazy initialization

use hf_hub::{api::sync::Api, Repo, RepoType};
use serde::{Deserialize, Serialize};
use smsclass_core::{DegradedReason, Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Where a vocabulary, label mapping or model file lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceSource {
    /// Local file path
    Local { path: PathBuf },

    /// File in a Hugging Face Hub model repository
    HuggingFace {
        repo_id: String,
        filename: String,
        revision: Option<String>,
    },
}

impl ResourceSource {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local { path: path.into() }
    }

    pub fn hugging_face(repo_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self::HuggingFace {
            repo_id: repo_id.into(),
            filename: filename.into(),
            revision: None,
        }
    }

    /// Resolve to a readable local path, downloading if needed
    pub fn resolve(&self) -> Result<PathBuf> {
        match self {
            Self::Local { path } => {
                if !path.exists() {
                    return Err(Error::resource(format!(
                        "Resource file not found: {:?}",
                        path
                    )));
                }
                Ok(path.clone())
            }
            Self::HuggingFace {
                repo_id,
                filename,
                revision,
            } => {
                let api = Api::new()
                    .map_err(|e| Error::resource(format!("Failed to initialize HF API: {}", e)))?;

                let repo = api.repo(Repo::with_revision(
                    repo_id.clone(),
                    RepoType::Model,
                    revision.clone().unwrap_or_else(|| "main".to_string()),
                ));

                let path = repo.get(filename).map_err(|e| {
                    Error::resource(format!(
                        "Failed to download {} from {}: {}",
                        filename, repo_id, e
                    ))
                })?;

                tracing::info!("Fetched {} from {}", filename, repo_id);
                Ok(path)
            }
        }
    }
}

impl fmt::Display for ResourceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { path } => write!(f, "{}", path.display()),
            Self::HuggingFace {
                repo_id,
                filename,
                revision,
            } => match revision {
                Some(rev) => write!(f, "hf://{}@{}/{}", repo_id, rev, filename),
                None => write!(f, "hf://{}/{}", repo_id, filename),
            },
        }
    }
}

type Initializer<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

/// Value built once on first use; a failed build is cached as "not ready"
pub struct LazyResource<T> {
    name: &'static str,
    cell: OnceLock<std::result::Result<T, String>>,
    init: Option<Initializer<T>>,
}

impl<T> LazyResource<T> {
    /// Defer construction until the first `get`
    pub fn new<F>(name: &'static str, init: F) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Self {
            name,
            cell: OnceLock::new(),
            init: Some(Box::new(init)),
        }
    }

    /// Already-built value
    pub fn ready(name: &'static str, value: T) -> Self {
        Self {
            name,
            cell: OnceLock::from(Ok(value)),
            init: None,
        }
    }

    /// Permanently unavailable resource
    pub fn failed(name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            name,
            cell: OnceLock::from(Err(reason.into())),
            init: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The value, initializing on first call
    ///
    /// Concurrent first callers block until one initializer finishes.
    pub fn get(&self) -> std::result::Result<&T, DegradedReason> {
        self.cell
            .get_or_init(|| self.initialize())
            .as_ref()
            .map_err(|e| DegradedReason::NotReady(e.clone()))
    }

    /// Whether initialization has been attempted
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    fn initialize(&self) -> std::result::Result<T, String> {
        let Some(init) = &self.init else {
            return Err(format!("{} has no initializer", self.name));
        };

        match init() {
            Ok(value) => {
                tracing::info!("Initialized {}", self.name);
                Ok(value)
            }
            Err(e) => {
                tracing::warn!("Failed to initialize {}: {}", self.name, e);
                Err(e.to_string())
            }
        }
    }
}

impl<T> fmt::Debug for LazyResource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.cell.get() {
            None => "pending",
            Some(Ok(_)) => "ready",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("LazyResource")
            .field("name", &self.name)
            .field("state", &state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_initializes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let lazy = LazyResource::new("counter", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        });

        assert!(!lazy.is_initialized());
        assert_eq!(*lazy.get().unwrap(), 42);
        assert_eq!(*lazy.get().unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let lazy: LazyResource<u32> = LazyResource::new("broken", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Error::resource("missing vocab.txt"))
        });

        for _ in 0..3 {
            let reason = lazy.get().unwrap_err();
            assert!(matches!(reason, DegradedReason::NotReady(ref msg) if msg.contains("vocab.txt")));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_use() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let lazy = Arc::new(LazyResource::new("shared", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(10));
            Ok(String::from("loaded"))
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lazy = lazy.clone();
                std::thread::spawn(move || lazy.get().map(|s| s.clone()).ok())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().as_deref(), Some("loaded"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ready_and_failed() {
        assert_eq!(*LazyResource::ready("v", 7).get().unwrap(), 7);
        assert!(LazyResource::<u8>::failed("v", "nope").get().is_err());
    }

    #[test]
    fn test_missing_local_source() {
        let source = ResourceSource::local("/nonexistent/model.safetensors");
        assert!(matches!(source.resolve(), Err(Error::Resource(_))));
    }

    #[test]
    fn test_source_yaml_forms() {
        let local: ResourceSource = serde_yaml::from_str("path: ./assets/vocab.txt").unwrap();
        assert_eq!(local, ResourceSource::local("./assets/vocab.txt"));

        let hub: ResourceSource =
            serde_yaml::from_str("repo_id: org/sms-model\nfilename: model.safetensors").unwrap();
        assert_eq!(hub, ResourceSource::hugging_face("org/sms-model", "model.safetensors"));
        assert_eq!(hub.to_string(), "hf://org/sms-model/model.safetensors");
    }
}
