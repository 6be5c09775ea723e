use image::RgbImage;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};
use crate::error::{Result, ScanError};

/// Stub backend for testing and demos.
///
/// Replays a script of per-call detection lists (cycling when exhausted) and
/// can be told to fail on a given call. `stub://demo` models report one box of
/// each class sized relative to the frame.
pub struct StubBackend {
    script: Vec<Vec<Detection>>,
    demo: bool,
    fail_at: Option<u64>,
    calls: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            demo: false,
            fail_at: None,
            calls: 0,
        }
    }

    /// Build from a `stub://<name>[?fail_at=N]` model path.
    ///
    /// Known names are `demo` and `empty`.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("stub://")
            .ok_or_else(|| ScanError::backend_unavailable(format!("not a stub model: {uri}")))?;
        let (name, query) = rest.split_once('?').unwrap_or((rest, ""));

        let mut backend = match name {
            "demo" => Self::demo(),
            "empty" => Self::new(),
            other => {
                return Err(ScanError::backend_unavailable(format!(
                    "unknown stub model '{other}'"
                )))
            }
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some(("fail_at", value)) => {
                    let call = value.parse().map_err(|_| {
                        ScanError::backend_unavailable(format!("invalid fail_at '{value}'"))
                    })?;
                    backend = backend.failing_at(call);
                }
                _ => {
                    return Err(ScanError::backend_unavailable(format!(
                        "unsupported stub model option '{pair}'"
                    )))
                }
            }
        }
        Ok(backend)
    }

    fn demo() -> Self {
        Self {
            demo: true,
            ..Self::new()
        }
    }

    /// Report the same detections on every call.
    pub fn with_detections(self, detections: Vec<Detection>) -> Self {
        self.with_script(vec![detections])
    }

    /// Report `script[call % script.len()]` on each call.
    pub fn with_script(mut self, script: Vec<Vec<Detection>>) -> Self {
        self.script = script;
        self
    }

    /// Fail the zero-based `call` with `InferenceFailed`.
    pub fn failing_at(mut self, call: u64) -> Self {
        self.fail_at = Some(call);
        self
    }

    /// Number of `detect` calls made so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn demo_detections(frame: &RgbImage) -> Vec<Detection> {
        let (w, h) = (frame.width() as i32, frame.height() as i32);
        vec![
            Detection::new(BoundingBox::new(w / 8, h / 4, w / 2, h * 3 / 4), 0.87, 0),
            Detection::new(
                BoundingBox::new(w * 5 / 8, h / 3, w * 7 / 8, h * 5 / 6),
                0.64,
                1,
            ),
        ]
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>> {
        let call = self.calls;
        self.calls += 1;

        if self.fail_at == Some(call) {
            return Err(ScanError::inference(format!("stub failure on call {call}")));
        }
        if self.demo {
            return Ok(Self::demo_detections(frame));
        }
        if self.script.is_empty() {
            return Ok(Vec::new());
        }
        let index = (call % self.script.len() as u64) as usize;
        Ok(self.script[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_cycles_and_fails_on_request() {
        let a = vec![Detection::new(BoundingBox::new(0, 0, 1, 1), 0.5, 0)];
        let mut backend = StubBackend::new()
            .with_script(vec![a.clone(), Vec::new()])
            .failing_at(3);
        let frame = RgbImage::new(2, 2);

        assert_eq!(backend.detect(&frame).unwrap(), a);
        assert!(backend.detect(&frame).unwrap().is_empty());
        assert_eq!(backend.detect(&frame).unwrap(), a);
        assert!(matches!(
            backend.detect(&frame),
            Err(ScanError::InferenceFailed(_))
        ));
        assert_eq!(backend.detect(&frame).unwrap(), a);
        assert!(backend.detect(&frame).unwrap().is_empty());
        assert_eq!(backend.calls(), 6);
    }

    #[test]
    fn uri_selects_model_and_options() {
        let mut demo = StubBackend::from_uri("stub://demo?fail_at=1").unwrap();
        let frame = RgbImage::new(80, 60);
        let dets = demo.detect(&frame).unwrap();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].bbox, BoundingBox::new(10, 15, 40, 45));
        assert!(demo.detect(&frame).is_err());

        assert!(matches!(
            StubBackend::from_uri("stub://yolo"),
            Err(ScanError::BackendUnavailable(_))
        ));
        assert!(matches!(
            StubBackend::from_uri("stub://empty?fail_at=x"),
            Err(ScanError::BackendUnavailable(_))
        ));
    }
}
