use image::RgbImage;

use crate::detect::result::Detection;
use crate::error::Result;

/// Detector backend trait.
///
/// A backend wraps an opaque pretrained model: given one decoded RGB frame,
/// it returns the regions the model reports above its own threshold, in the
/// model's output order.
///
/// Backends must:
/// - Treat the frame as read-only
/// - Report load problems as `ScanError::BackendUnavailable`
/// - Report call failures as `ScanError::InferenceFailed`, never as an empty result
///
/// `detect` takes `&mut self`; callers never issue concurrent calls against
/// one instance. Use `SharedBackend` to share a loaded model between callers.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<B: DetectorBackend + ?Sized> DetectorBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>> {
        (**self).detect(frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
