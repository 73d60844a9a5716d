use std::f64::consts::PI;

/// Integer luma using the Rec. 601 weights.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64)
        .round()
        .min(255.0) as u8
}

/// Nearest-neighbour downsample: destination pixel `(x, y)` reads source
/// pixel `(x * width / size, y * height / size)`.
pub fn resize_nearest_into(
    pixels: &[u8],
    width: usize,
    height: usize,
    size: usize,
    output: &mut [u8],
) {
    assert_eq!(pixels.len(), width * height);
    assert_eq!(output.len(), size * size);
    if width == 0 || height == 0 {
        output.fill(0);
        return;
    }
    for y in 0..size {
        let src_y = (y * height / size).min(height - 1);
        let row = src_y * width;
        for x in 0..size {
            let src_x = (x * width / size).min(width - 1);
            output[y * size + x] = pixels[row + src_x];
        }
    }
}

/// 3x3 Sobel gradient magnitude, clamped to 255. Border pixels stay zero.
pub fn sobel_magnitude_into(pixels: &[u8], width: usize, height: usize, output: &mut Vec<f32>) {
    assert_eq!(pixels.len(), width * height);
    output.clear();
    output.resize(pixels.len(), 0.0);
    if width < 3 || height < 3 {
        return;
    }
    let px = |x: usize, y: usize| pixels[y * width + x] as f32;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let gx = px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1)
                - px(x - 1, y - 1)
                - 2.0 * px(x - 1, y)
                - px(x - 1, y + 1);
            let gy = px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1)
                - px(x - 1, y - 1)
                - 2.0 * px(x, y - 1)
                - px(x + 1, y - 1);
            output[y * width + x] = (gx * gx + gy * gy).sqrt().min(255.0);
        }
    }
}

pub fn sobel_magnitude(pixels: &[u8], width: usize, height: usize) -> Vec<f32> {
    let mut output = Vec::new();
    sobel_magnitude_into(pixels, width, height, &mut output);
    output
}

/// Cosine basis `cos((2n + 1) k PI / (2 * N))` for the first `K` frequencies.
pub fn dct_basis<const K: usize, const N: usize>() -> [[f64; N]; K] {
    let mut table = [[0.0f64; N]; K];
    for (k, row) in table.iter_mut().enumerate() {
        for (n, value) in row.iter_mut().enumerate() {
            *value = ((2 * n + 1) as f64 * k as f64 * PI / (2 * N) as f64).cos();
        }
    }
    table
}

/// Unnormalized separable 2-D DCT-II of an `N x N` block, keeping only the
/// `K x K` low-frequency corner, indexed `[v][u]`.
pub fn dct2_low<const K: usize, const N: usize>(
    block: &[u8],
    basis: &[[f64; N]; K],
) -> [[f64; K]; K] {
    assert_eq!(block.len(), N * N);
    let mut rows = [[0.0f64; K]; N];
    for (y, row) in rows.iter_mut().enumerate() {
        let src = &block[y * N..(y + 1) * N];
        for (u, value) in row.iter_mut().enumerate() {
            *value = src
                .iter()
                .zip(basis[u].iter())
                .map(|(&p, &c)| p as f64 * c)
                .sum();
        }
    }
    let mut output = [[0.0f64; K]; K];
    for (v, out_row) in output.iter_mut().enumerate() {
        for (u, value) in out_row.iter_mut().enumerate() {
            *value = rows
                .iter()
                .zip(basis[v].iter())
                .map(|(row, &c)| row[u] * c)
                .sum();
        }
    }
    output
}
