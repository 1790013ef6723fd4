//! Inference backend interface
//!
//! The classifiers treat the model runtime as opaque: a backend takes the
//! encoded input, returns raw INT8 outputs and reports the quantization
//! parameters of its tensors.

use crate::quantization::{QuantParams, TensorQuantization};
use crate::wordpiece::MAX_SEQUENCE_LENGTH;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smsclass_core::{Error, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

/// Model over the 65,536-bucket hashed feature vector
pub trait HashedFeatureBackend: Send + Sync {
    /// Backend name for logs and metrics
    fn name(&self) -> &str;

    /// Input and output tensor parameters
    fn quantization(&self) -> TensorQuantization;

    /// Width of the input tensor
    fn input_width(&self) -> usize;

    /// Run the model on one quantized feature vector
    fn run(&self, features: &[i8]) -> Result<Vec<i8>>;

    /// Whether `run` may be called from several threads at once
    fn concurrent_safe(&self) -> bool {
        true
    }
}

/// Model over `(input_ids, attention_mask)` token sequences
pub trait SequenceBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Output tensor parameters
    fn output_quantization(&self) -> QuantParams;

    fn run(
        &self,
        input_ids: &[i32; MAX_SEQUENCE_LENGTH],
        attention_mask: &[i32; MAX_SEQUENCE_LENGTH],
    ) -> Result<Vec<i8>>;

    fn concurrent_safe(&self) -> bool {
        true
    }
}

/// Compute device requested for a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda { index: Option<usize> },
    Metal { index: Option<usize> },
}

/// Options passed to a loader alongside the model file
#[derive(Debug, Clone, Default)]
pub struct BackendOptions {
    pub device: DeviceSpec,
}

/// Extension point for runtime model backends
///
/// Implement this in an external crate to plug in an inference engine
/// without coupling the classifiers crate to it.
pub trait BackendLoader: Send + Sync {
    /// Load a hashed-feature model from a resolved file
    fn load_hashed(
        &self,
        model: &Path,
        options: &BackendOptions,
    ) -> Result<Arc<dyn HashedFeatureBackend>>;

    /// Load a token-sequence model from a resolved file
    fn load_sequence(
        &self,
        model: &Path,
        options: &BackendOptions,
    ) -> Result<Arc<dyn SequenceBackend>>;
}

/// Serializes calls into a backend that is not safe for concurrent use
pub struct BackendGate<B: ?Sized> {
    backend: Arc<B>,
    lock: Option<Mutex<()>>,
}

impl<B: ?Sized> BackendGate<B> {
    fn with_lock(backend: Arc<B>, serialize: bool) -> Self {
        Self {
            backend,
            lock: serialize.then(|| Mutex::new(())),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_serialized(&self) -> bool {
        self.lock.is_some()
    }

    /// Call into the backend, holding the slot if one is required
    ///
    /// A panic inside the backend is returned as a backend error; the release
    /// profile aborts on panic, so it is caught here rather than at the
    /// blocking task boundary.
    pub fn call<R>(&self, f: impl FnOnce(&B) -> Result<R>) -> Result<R> {
        let _slot = self.lock.as_ref().map(|lock| lock.lock());
        catch_unwind(AssertUnwindSafe(|| f(&self.backend)))
            .unwrap_or_else(|payload| Err(Error::backend(panic_message(payload.as_ref()))))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause");
    format!("Backend panicked: {}", detail)
}

impl BackendGate<dyn HashedFeatureBackend> {
    pub fn hashed(backend: Arc<dyn HashedFeatureBackend>) -> Self {
        let serialize = !backend.concurrent_safe();
        Self::with_lock(backend, serialize)
    }
}

impl BackendGate<dyn SequenceBackend> {
    pub fn sequence(backend: Arc<dyn SequenceBackend>) -> Self {
        let serialize = !backend.concurrent_safe();
        Self::with_lock(backend, serialize)
    }
}

impl<B: ?Sized> std::fmt::Debug for BackendGate<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendGate")
            .field("serialized", &self.is_serialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Exclusive {
        active: AtomicUsize,
        overlaps: AtomicUsize,
    }

    impl SequenceBackend for Exclusive {
        fn name(&self) -> &str {
            "exclusive"
        }

        fn output_quantization(&self) -> QuantParams {
            QuantParams::identity()
        }

        fn run(
            &self,
            _input_ids: &[i32; MAX_SEQUENCE_LENGTH],
            _attention_mask: &[i32; MAX_SEQUENCE_LENGTH],
        ) -> Result<Vec<i8>> {
            if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![0; 5])
        }

        fn concurrent_safe(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_unsafe_backend_is_serialized() {
        let backend = Arc::new(Exclusive {
            active: AtomicUsize::new(0),
            overlaps: AtomicUsize::new(0),
        });
        let gate: Arc<BackendGate<dyn SequenceBackend>> =
            Arc::new(BackendGate::sequence(backend.clone()));
        assert!(gate.is_serialized());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                std::thread::spawn(move || {
                    let ids = [0; MAX_SEQUENCE_LENGTH];
                    gate.call(|b| b.run(&ids, &ids)).unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().len(), 5);
        }
        assert_eq!(backend.overlaps.load(Ordering::SeqCst), 0);
    }

    struct Panicking;

    impl SequenceBackend for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn output_quantization(&self) -> QuantParams {
            QuantParams::identity()
        }

        fn run(
            &self,
            _input_ids: &[i32; MAX_SEQUENCE_LENGTH],
            _attention_mask: &[i32; MAX_SEQUENCE_LENGTH],
        ) -> Result<Vec<i8>> {
            panic!("tensor shape mismatch");
        }

        fn concurrent_safe(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_backend_panic_becomes_error() {
        let gate: BackendGate<dyn SequenceBackend> = BackendGate::sequence(Arc::new(Panicking));
        let ids = [0; MAX_SEQUENCE_LENGTH];

        let err = gate.call(|b| b.run(&ids, &ids)).unwrap_err();
        assert!(matches!(&err, Error::Backend(msg) if msg.contains("tensor shape mismatch")));

        // the slot is released after the panic
        assert!(gate.call(|b| b.run(&ids, &ids)).is_err());
    }

    #[test]
    fn test_device_spec_yaml() {
        let cpu: DeviceSpec = serde_yaml::from_str("cpu").unwrap();
        assert_eq!(cpu, DeviceSpec::Cpu);

        let cuda: DeviceSpec = serde_yaml::from_str("cuda: { index: 1 }").unwrap();
        assert_eq!(cuda, DeviceSpec::Cuda { index: Some(1) });
    }
}
