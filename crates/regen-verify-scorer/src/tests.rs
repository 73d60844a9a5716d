use regen_verify_types::{
    CandidateId, ErrorLevel, QualityResult, QualityScores, QualityThresholds, RasterSample,
};

use crate::{
    GrayPlane, ImageFileLoader, InMemoryLoader, LoadError, QualityScorer, RasterLoader,
    classify, edge_quality, geometry_delta, perceptual_hash, phash_distance,
    structural_similarity,
};
use crate::signals::spectral_hash::cosine_basis;

/// Flat background with a checkered square "product" in `[lo, hi)`.
fn product(size: u32, background: u8, lo: u32, hi: u32, tones: (u8, u8)) -> RasterSample {
    let mut data = Vec::with_capacity((size * size) as usize);
    for y in 0..size {
        for x in 0..size {
            let inside = (lo..hi).contains(&x) && (lo..hi).contains(&y);
            let value = if !inside {
                background
            } else if ((x / 2) + (y / 2)) % 2 == 0 {
                tones.0
            } else {
                tones.1
            };
            data.push(value);
        }
    }
    RasterSample::from_gray(size, size, data).unwrap()
}

fn original() -> RasterSample {
    product(128, 40, 32, 96, (100, 160))
}

fn restyled() -> RasterSample {
    product(128, 230, 32, 96, (100, 160))
}

fn to_rgba(gray: &RasterSample) -> RasterSample {
    let data = gray.data().iter().flat_map(|&v| [v, v, v, 255]).collect();
    RasterSample::from_rgba(gray.width(), gray.height(), data).unwrap()
}

fn relaxed() -> QualityThresholds {
    QualityThresholds {
        ssim_min_diff: 0.0,
        phash_min_dist: 0,
        ..QualityThresholds::default()
    }
}

#[test]
fn identical_images_have_identity_scores() {
    let image = original();
    let result = QualityScorer::default().score(&image, &image);
    assert!((result.scores.ssim - 1.0).abs() < 1e-6);
    assert!(result.scores.ssim_diff.abs() < 1e-6);
    assert_eq!(result.scores.phash_distance, 0);
    assert_eq!(result.scores.geom_delta, Some(0.0));
    // identical output is never "different enough" under default thresholds
    assert_eq!(result.error_level, ErrorLevel::P1);

    let relaxed = QualityScorer::new(relaxed()).unwrap();
    let result = relaxed.score(&image, &image);
    assert_eq!(result.error_level, ErrorLevel::Ok);
    assert!(result.passed);
    assert!(result.reasons.is_empty());
}

#[test]
fn ssim_is_symmetric() {
    let a = GrayPlane::from_raster(&original());
    let b = GrayPlane::from_raster(&product(128, 70, 32, 96, (90, 200)));
    let forward = structural_similarity(&a, &b);
    let backward = structural_similarity(&b, &a);
    assert_eq!(forward, backward);
    assert!(forward > 0.0 && forward < 1.0);
}

#[test]
fn dimension_mismatch_is_reported_not_raised() {
    let small = RasterSample::from_gray(100, 100, vec![0; 100 * 100]).unwrap();
    let large = RasterSample::from_gray(200, 200, vec![0; 200 * 200]).unwrap();
    let result = QualityScorer::default().score(&small, &large);
    assert_eq!(result.error_level, ErrorLevel::P1);
    assert!(!result.passed);
    assert_eq!(result.reasons, vec![QualityResult::DIMENSION_MISMATCH.to_string()]);
    assert_eq!(result.scores, QualityScores::incomparable());
}

#[test]
fn background_swap_is_accepted() {
    let result = QualityScorer::default().score(&original(), &restyled());
    assert_eq!(result.error_level, ErrorLevel::Ok, "{:?}", result.reasons);
    assert_eq!(result.scores.geom_delta, Some(0.0));
    assert!(result.scores.ssim_diff > 0.3);
    assert!(result.scores.phash_distance >= 12);
    assert_eq!(result.scores.edge_score, 1.0);
}

#[test]
fn background_swap_on_large_canvas_is_accepted() {
    let source = product(512, 40, 128, 384, (100, 160));
    let candidate = product(512, 230, 128, 384, (100, 160));
    let thresholds = QualityThresholds::default();
    let result = QualityScorer::new(thresholds).unwrap().score(&source, &candidate);
    assert!(result.scores.geom_delta.unwrap() < 1e-9);
    assert!(result.scores.ssim_diff > thresholds.ssim_min_diff);
    assert_eq!(result.error_level, ErrorLevel::Ok);
}

#[test]
fn shrunken_subject_is_critical() {
    let shrunk = product(128, 230, 48, 80, (100, 160));
    let result = QualityScorer::default().score(&original(), &shrunk);
    assert_eq!(result.error_level, ErrorLevel::P0);
    assert!(!result.passed);
    assert!(result.reasons[0].starts_with("Geometry changed too much"));
}

#[test]
fn raising_geometry_tolerance_never_increases_severity() {
    let shifted = product(128, 230, 48, 112, (100, 160));
    let source = original();
    let mut previous = ErrorLevel::P0;
    for max_delta in [0.0, 0.03, 0.05, 0.07, 0.2, 1.0] {
        let thresholds = QualityThresholds {
            geom_max_delta: max_delta,
            ..QualityThresholds::default()
        };
        let level = QualityScorer::new(thresholds)
            .unwrap()
            .score(&source, &shifted)
            .error_level;
        assert!(level <= previous, "{max_delta}: {level} after {previous}");
        previous = level;
    }
    assert_eq!(previous, ErrorLevel::Ok);
}

#[test]
fn flat_subject_is_minor_edge_issue() {
    let flat = product(128, 230, 32, 96, (120, 120));
    let result = QualityScorer::default().score(&original(), &flat);
    assert_eq!(result.error_level, ErrorLevel::P2);
    assert!(result.passed);
    assert_eq!(result.reasons.len(), 1);
    assert!(result.reasons[0].starts_with("Poor edge quality"));
}

#[test]
fn blank_candidate_has_indeterminate_geometry() {
    let blank = RasterSample::from_gray(128, 128, vec![90; 128 * 128]).unwrap();
    let a = GrayPlane::from_raster(&original());
    let b = GrayPlane::from_raster(&blank);
    assert_eq!(geometry_delta(&a, &b), None);
    assert_eq!(edge_quality(&b), 0.0);

    let result = QualityScorer::default().score(&original(), &blank);
    assert_eq!(result.scores.geom_delta, None);
    assert_eq!(result.error_level, ErrorLevel::P1);
    assert!(result.reasons[0].starts_with("Geometry could not be verified"));
}

#[test]
fn geometry_violation_collects_every_reason() {
    let scores = QualityScores {
        ssim: 0.9,
        ssim_diff: 0.1,
        phash_distance: 3,
        edge_score: 0.2,
        geom_delta: Some(0.5),
        overall_score: 0.0,
    };
    let (level, reasons) = classify(&scores, &QualityThresholds::default());
    assert_eq!(level, ErrorLevel::P0);
    assert_eq!(reasons.len(), 4);
    assert!(reasons[1].starts_with("Not different enough"));
    assert!(reasons[2].starts_with("Perceptual hash too similar"));
    assert!(reasons[3].starts_with("Poor edge quality"));
}

#[test]
fn rgba_and_gray_inputs_score_alike() {
    let gray = QualityScorer::default().score(&original(), &restyled());
    let rgba = QualityScorer::default().score(&to_rgba(&original()), &to_rgba(&restyled()));
    assert_eq!(gray, rgba);
}

#[test]
fn phash_distance_stays_in_range() {
    let a = GrayPlane::from_raster(&original());
    let b = GrayPlane::from_raster(&restyled());
    let distance = phash_distance(&a, &b);
    assert!(distance <= 63);
    assert_eq!(phash_distance(&a, &a), 0);
}

#[test]
fn hashing_reuses_one_cosine_table() {
    let plane = GrayPlane::from_raster(&original());
    let first = perceptual_hash(&plane);
    assert_eq!(perceptual_hash(&plane), first);
    assert!(std::ptr::eq(cosine_basis(), cosine_basis()));
    assert_eq!(cosine_basis()[0], [1.0; 32]);
}

#[test]
fn overall_score_uses_default_weights() {
    let result = QualityScorer::default().score(&original(), &restyled());
    let s = &result.scores;
    let expected = 0.3 * s.ssim_diff
        + 0.25 * (s.phash_distance as f64 / 64.0)
        + 0.25 * s.edge_score
        + 0.2 * (1.0 - s.geom_delta.unwrap());
    assert!((s.overall_score - expected).abs() < 1e-12);
}

#[test]
fn score_many_preserves_order() {
    let source = original();
    let candidates = vec![
        restyled(),
        source.clone(),
        product(128, 230, 48, 80, (100, 160)),
    ];
    let results = QualityScorer::default().score_many(&source, &candidates);
    let levels: Vec<ErrorLevel> = results.iter().map(|r| r.error_level).collect();
    assert_eq!(levels, vec![ErrorLevel::Ok, ErrorLevel::P1, ErrorLevel::P0]);
}

#[test]
fn invalid_thresholds_fail_at_construction() {
    let thresholds = QualityThresholds {
        edge_min_score: 1.5,
        ..QualityThresholds::default()
    };
    assert!(QualityScorer::new(thresholds).is_err());
}

#[test]
fn file_loader_decodes_and_resizes() {
    let dir = tempfile::tempdir().unwrap();
    let source = original();
    let image =
        image::GrayImage::from_raw(source.width(), source.height(), source.data().to_vec())
            .unwrap();
    image.save(dir.path().join("original.png")).unwrap();

    let loader = ImageFileLoader::new().with_base_dir(dir.path());
    let loaded = loader.load(&CandidateId::from("original.png")).unwrap();
    assert_eq!((loaded.width(), loaded.height()), (128, 128));
    let result = QualityScorer::new(relaxed()).unwrap().score(&source, &loaded);
    assert_eq!(result.scores.phash_distance, 0);

    let resized = loader
        .clone()
        .with_uniform_size(64, 32)
        .load(&CandidateId::from("original.png"))
        .unwrap();
    assert_eq!((resized.width(), resized.height()), (64, 32));

    let missing = loader.load(&CandidateId::from("missing.png"));
    assert!(matches!(missing, Err(LoadError::NotFound { .. })));
}

#[test]
fn in_memory_loader_returns_registered_rasters() {
    let loader = InMemoryLoader::new().with("a", original());
    assert!(loader.load(&CandidateId::from("a")).is_ok());
    assert!(loader.load(&CandidateId::from("b")).is_err());
}
