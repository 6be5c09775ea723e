use std::sync::{Arc, Mutex};

use image::RgbImage;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::error::{Result, ScanError};

/// Thread-safe handle to one loaded backend.
///
/// Clones share the same model. Calls are serialized through the mutex, so a
/// still-image request and a running scan can use one model without ever
/// invoking it concurrently.
#[derive(Clone)]
pub struct SharedBackend {
    name: &'static str,
    inner: Arc<Mutex<dyn DetectorBackend>>,
}

impl SharedBackend {
    pub fn new<B: DetectorBackend + 'static>(backend: B) -> Self {
        Self {
            name: backend.name(),
            inner: Arc::new(Mutex::new(backend)),
        }
    }
}

impl DetectorBackend for SharedBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| ScanError::inference("backend lock poisoned"))?;
        guard.detect(frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| ScanError::backend_unavailable("backend lock poisoned"))?;
        guard.warm_up()
    }
}
