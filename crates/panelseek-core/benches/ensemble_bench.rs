use std::sync::Arc;

use divan::bench;
use panelseek_core::DetectionMethod;
use panelseek_core::config::{CoordinatorConfig, DetectOptions};
use panelseek_core::coordinator::RoiCoordinator;
use panelseek_core::edge::EdgeContourDetector;
use panelseek_core::template::TemplateMatchDetector;
use panelseek_core::test_utils::ScreenshotBuilder;

fn main() {
    divan::main();
}

#[bench]
fn bench_ensemble_1280x800(bencher: divan::Bencher) {
    let coordinator = RoiCoordinator::builder()
        .config(
            CoordinatorConfig::builder()
                .enabled_methods(&[DetectionMethod::Edge, DetectionMethod::Template])
                .build(),
        )
        .detector(Arc::new(EdgeContourDetector::default()))
        .detector(Arc::new(TemplateMatchDetector::default()))
        .build()
        .expect("valid coordinator");

    let (image, _) = ScreenshotBuilder::new(1280, 800)
        .with_panel(240, 180, 760, 460)
        .build();

    bencher.bench_local(move || {
        coordinator
            .detect_roi(image.clone(), &DetectOptions::default())
            .expect("fallback enabled")
    });
}
