#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use panelseek_core::DetectContext;
use panelseek_core::RoiDetector;
use panelseek_core::corner::CornerDetector;
use panelseek_core::edge::EdgeContourDetector;
use panelseek_core::geometry::Rect;
use panelseek_core::test_utils::{ScreenshotBuilder, bright_rect_screenshot};

#[test]
fn test_edge_detector_accuracy_on_canonical_fixture() {
    // Dark 800x1000 screenshot with one bright 500x300 panel at a fixed
    // offset (aspect 1.67).
    let panel = Rect::new(150, 350, 500, 300);
    let image = bright_rect_screenshot(800, 1000, panel);

    let detector = EdgeContourDetector::default();
    let result = detector
        .detect(&image, &DetectContext::default())
        .unwrap()
        .expect("panel must be detected");

    let iou = result.bounds.iou(&panel);
    assert!(iou >= 0.7, "IoU {iou} below 0.7 for {:?}", result.bounds);
    assert!(result.bounds.contained_in(800, 1000));
    assert!((0.0..=1.0).contains(&result.confidence));
}

#[test]
fn test_edge_detector_survives_moderate_noise() {
    let panel = Rect::new(140, 300, 520, 340);
    let (image, _) = ScreenshotBuilder::new(800, 1000)
        .with_panel(panel.x, panel.y, panel.width, panel.height)
        .with_noise(5.0)
        .build();

    let detector = EdgeContourDetector::default();
    let result = detector.detect(&image, &DetectContext::default()).unwrap();

    // The bright frame survives mild noise; the detected bounds must still
    // overlap the panel substantially.
    let result = result.expect("noisy panel still detectable");
    assert!(
        result.bounds.iou(&panel) >= 0.5,
        "IoU {} too low under noise",
        result.bounds.iou(&panel)
    );
}

#[test]
fn test_corner_and_edge_agree_on_styled_panel() {
    let panel = Rect::new(140, 300, 520, 340);
    let (image, _) = ScreenshotBuilder::new(800, 1000)
        .with_panel(panel.x, panel.y, panel.width, panel.height)
        .build();

    let edge = EdgeContourDetector::default()
        .detect(&image, &DetectContext::default())
        .unwrap()
        .expect("edge candidate");
    let corner = CornerDetector::default()
        .detect(&image, &DetectContext::default())
        .unwrap()
        .expect("corner candidate");

    // Both detectors independently localize the same panel region.
    assert!(edge.bounds.iou(&panel) > 0.4);
    assert!(corner.bounds.iou(&panel) > 0.3);
    assert!(edge.bounds.iou(&corner.bounds) > 0.25);
}

#[cfg(feature = "extended-tests")]
mod extended {
    use super::*;
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_edge_detector_random_panel_sweep() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for i in 0..10 {
            // Stay inside the detector's aspect and relative-area windows.
            let height: u32 = rng.gen_range(300..380);
            let width: u32 = rng.gen_range((height * 13 / 10)..(height * 2).min(740));
            let x = rng.gen_range(20..800 - width - 20) as i32;
            let y = rng.gen_range(20..1000 - height - 20) as i32;
            let panel = Rect::new(x, y, width, height);
            let image = bright_rect_screenshot(800, 1000, panel);

            let result = EdgeContourDetector::default()
                .detect(&image, &DetectContext::default())
                .unwrap()
                .unwrap_or_else(|| panic!("sweep {i}: panel {panel:?} not detected"));
            assert!(
                result.bounds.iou(&panel) >= 0.6,
                "sweep {i}: IoU {} for {panel:?}",
                result.bounds.iou(&panel)
            );
        }
    }
}

#[test]
fn test_produced_rectangles_respect_invariants() {
    let fixtures = [
        ScreenshotBuilder::new(800, 1000)
            .with_panel(140, 300, 520, 340)
            .build()
            .0,
        bright_rect_screenshot(800, 1000, Rect::new(150, 350, 500, 300)),
        ScreenshotBuilder::new(640, 420).build().0, // no panel at all
    ];

    for image in fixtures {
        let (w, h) = (image.width, image.height);
        for detector in [
            Box::new(EdgeContourDetector::default()) as Box<dyn RoiDetector>,
            Box::new(CornerDetector::default()) as Box<dyn RoiDetector>,
        ] {
            if let Some(result) = detector.detect(&image, &DetectContext::default()).unwrap() {
                assert!(result.bounds.width > 0);
                assert!(result.bounds.height > 0);
                assert!(result.bounds.contained_in(w, h));
                assert!((0.0..=1.0).contains(&result.confidence));
            }
        }
    }
}
