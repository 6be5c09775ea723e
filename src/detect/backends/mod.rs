pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

use std::path::Path;

pub use stub::StubBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;

use crate::config::ModelSettings;
use crate::detect::backend::DetectorBackend;
use crate::error::{Result, ScanError};

/// Open the backend named by `settings.path`.
///
/// `stub://` paths select the stub backend. Anything else must be an existing
/// model file; a missing or unloadable file is `BackendUnavailable`.
pub fn open_backend(settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    if settings.path.starts_with("stub://") {
        let backend = StubBackend::from_uri(&settings.path)?;
        log::info!("detector: using stub model {}", settings.path);
        return Ok(Box::new(backend));
    }

    let path = Path::new(&settings.path);
    if !path.is_file() {
        return Err(ScanError::backend_unavailable(format!(
            "model file {} does not exist",
            path.display()
        )));
    }

    #[cfg(feature = "backend-tract")]
    {
        let backend = TractBackend::new(path, settings)?;
        log::info!(
            "detector: loaded {} ({}x{} input)",
            path.display(),
            settings.input_width,
            settings.input_height
        );
        Ok(Box::new(backend))
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        Err(ScanError::backend_unavailable(format!(
            "loading {} requires the backend-tract feature",
            path.display()
        )))
    }
}
