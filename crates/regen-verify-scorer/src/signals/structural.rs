use crate::pipeline::GrayPlane;

const DYNAMIC_RANGE: f64 = 255.0;
const C1: f64 = (0.01 * DYNAMIC_RANGE) * (0.01 * DYNAMIC_RANGE);
const C2: f64 = (0.03 * DYNAMIC_RANGE) * (0.03 * DYNAMIC_RANGE);

/// Whole-image SSIM over two equal-sized grayscale planes, clamped to
/// `[0, 1]`. Every term is written symmetrically so swapping the arguments
/// yields a bit-identical value.
pub fn structural_similarity(a: &GrayPlane, b: &GrayPlane) -> f64 {
    debug_assert!(a.same_dimensions(b));
    let len = a.pixels.len().min(b.pixels.len());
    if len == 0 {
        return 0.0;
    }
    let n = len as f64;
    let (mut sum_x, mut sum_y) = (0.0f64, 0.0f64);
    for (&x, &y) in a.pixels.iter().zip(b.pixels.iter()) {
        sum_x += x as f64;
        sum_y += y as f64;
    }
    let mean_x = sum_x / n;
    let mean_y = sum_y / n;

    let (mut var_x, mut var_y, mut cov) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.pixels.iter().zip(b.pixels.iter()) {
        let dx = x as f64 - mean_x;
        let dy = y as f64 - mean_y;
        var_x += dx * dx;
        var_y += dy * dy;
        cov += dx * dy;
    }
    var_x /= n;
    var_y /= n;
    cov /= n;

    let numerator = (2.0 * (mean_x * mean_y) + C1) * (2.0 * cov + C2);
    let denominator = (mean_x * mean_x + mean_y * mean_y + C1) * (var_x + var_y + C2);
    (numerator / denominator).clamp(0.0, 1.0)
}
