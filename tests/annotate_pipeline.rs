use image::{Rgb, RgbImage};

use anomaly_scan::config::{ModelSettings, OverlaySettings};
use anomaly_scan::{
    open_backend, pipeline_from_config, BoundingBox, ClassTable, Detection,
    FrameAnnotationPipeline, LabelRenderer, ScanConfig, ScanError, StubBackend,
};

fn frame() -> RgbImage {
    RgbImage::from_fn(120, 90, |x, y| Rgb([(x * 2) as u8, (y * 2) as u8, 40]))
}

fn pipeline(backend: StubBackend) -> FrameAnnotationPipeline {
    let overlay = OverlaySettings {
        fonts: Vec::new(),
        text_size: 8.0,
        ..OverlaySettings::default()
    };
    FrameAnnotationPipeline::new(Box::new(backend), ClassTable::default(), &overlay)
}

#[test]
fn zero_detections_leave_pixels_identical() {
    let mut pipeline = pipeline(StubBackend::new());
    let input = frame();
    let annotated = pipeline.annotate(&input).expect("annotate");

    assert!(annotated.detections.is_empty());
    assert!(annotated.overlays.is_empty());
    assert_eq!(annotated.pixels, input);
}

#[test]
fn each_detection_gets_a_box_and_label() {
    let detections = vec![
        Detection::new(BoundingBox::new(10, 50, 40, 80), 0.8731, 0),
        Detection::new(BoundingBox::new(60, 5, 100, 30), 0.5, 1),
        Detection::new(BoundingBox::new(70, 60, 110, 85), 0.129, 7),
    ];
    let mut pipeline = pipeline(StubBackend::new().with_detections(detections.clone()));
    let input = frame();
    let annotated = pipeline.annotate(&input).expect("annotate");

    assert_eq!(annotated.detections, detections);
    let labels: Vec<&str> = annotated.overlays.iter().map(|o| o.text.as_str()).collect();
    assert_eq!(labels, vec!["anomaly: 0.87", "normal: 0.50", "class 7: 0.13"]);
    for (overlay, det) in annotated.overlays.iter().zip(&detections) {
        assert_eq!(overlay.bbox, det.bbox);
        assert!(overlay.anchor.0 >= 0 && overlay.anchor.1 >= 0);
        assert_eq!(*annotated.pixels.get_pixel(det.bbox.x2 as u32, det.bbox.y2 as u32), Rgb([0, 255, 0]));
    }

    // Label sits above the box when there is room, on-frame otherwise.
    assert_eq!(annotated.overlays[0].anchor, (10, 15));
    assert_eq!(annotated.overlays[1].anchor.1, 0);

    // The caller's frame is untouched.
    assert_eq!(input, frame());
}

#[test]
fn out_of_frame_boxes_are_clamped() {
    let mut pipeline = pipeline(
        StubBackend::new().with_detections(vec![Detection::new(
            BoundingBox::new(-20, 70, 500, -3),
            1.4,
            0,
        )]),
    );
    let annotated = pipeline.annotate(&frame()).expect("annotate");
    let det = &annotated.detections[0];
    assert_eq!(det.bbox, BoundingBox::new(0, 0, 119, 70));
    assert_eq!(det.confidence, 1.0);
    assert_eq!(annotated.overlays[0].text, "anomaly: 1.00");
}

#[test]
fn inference_failure_propagates_without_drawing() {
    let mut pipeline = pipeline(StubBackend::new().failing_at(0));
    assert!(matches!(
        pipeline.annotate(&frame()),
        Err(ScanError::InferenceFailed(_))
    ));
}

#[test]
fn corrupt_model_is_backend_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("best.onnx");
    std::fs::write(&model, b"definitely not onnx").unwrap();

    let settings = ModelSettings {
        path: model.display().to_string(),
        ..ModelSettings::default()
    };
    assert!(matches!(
        open_backend(&settings),
        Err(ScanError::BackendUnavailable(_))
    ));

    let config = ScanConfig {
        model: ModelSettings {
            path: dir.path().join("missing.onnx").display().to_string(),
            ..ModelSettings::default()
        },
        ..ScanConfig::default()
    };
    assert!(matches!(
        pipeline_from_config(&config),
        Err(ScanError::BackendUnavailable(_))
    ));
}

#[test]
fn builtin_labels_render_without_fonts() {
    let overlay = OverlaySettings {
        fonts: vec!["/nonexistent/font.ttf".into()],
        ..OverlaySettings::default()
    };
    let renderer = LabelRenderer::load(&overlay.fonts, overlay.text_size);
    assert!(renderer.uses_builtin());

    let mut pipeline = FrameAnnotationPipeline::with_label_renderer(
        Box::new(StubBackend::from_uri("stub://demo").unwrap()),
        ClassTable::new([(0, "异常"), (1, "正常")]),
        &overlay,
        renderer,
    );
    let annotated = pipeline.annotate(&frame()).expect("annotate");
    assert_eq!(annotated.overlays.len(), 2);
    assert_eq!(annotated.overlays[0].text, "异常: 0.87");
    assert_ne!(annotated.pixels, frame());
}
