use crate::pipeline::GrayPlane;

const PRESENT_THRESHOLD: f32 = 50.0;
const STRONG_THRESHOLD: f32 = 100.0;

/// Absolute edge-quality proxy of a single image in `[0, 1]`. Blurry or
/// washed-out generations have few strong gradients and score low.
pub fn edge_quality(plane: &GrayPlane) -> f64 {
    if plane.is_empty() {
        return 0.0;
    }
    let mut present = 0usize;
    let mut strong = 0usize;
    for &magnitude in &plane.edges {
        if magnitude > PRESENT_THRESHOLD {
            present += 1;
            if magnitude > STRONG_THRESHOLD {
                strong += 1;
            }
        }
    }
    let edge_ratio = present as f64 / plane.len() as f64;
    let strong_ratio = strong as f64 / present.max(1) as f64;
    (edge_ratio * 10.0 * (0.5 + 0.5 * strong_ratio)).min(1.0)
}
