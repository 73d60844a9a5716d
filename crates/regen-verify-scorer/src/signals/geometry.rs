use crate::pipeline::GrayPlane;

const EDGE_THRESHOLD: f32 = 30.0;
const PADDING_RATIO: f64 = 0.05;

/// Coarse subject region: the padded bounding box of all edge pixels.
/// Bounds are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubjectBox {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl SubjectBox {
    pub fn area(&self) -> usize {
        (self.x1 - self.x0 + 1) * (self.y1 - self.y0 + 1)
    }

    pub fn centroid(&self) -> (f64, f64) {
        (
            (self.x0 + self.x1) as f64 / 2.0,
            (self.y0 + self.y1) as f64 / 2.0,
        )
    }
}

/// Returns `None` when the plane has no edge pixels above the threshold.
pub fn subject_box(plane: &GrayPlane) -> Option<SubjectBox> {
    let (mut min_x, mut min_y) = (usize::MAX, usize::MAX);
    let (mut max_x, mut max_y) = (0usize, 0usize);
    let mut found = false;
    for (y, row) in plane.edges.chunks_exact(plane.width.max(1)).enumerate() {
        for (x, &magnitude) in row.iter().enumerate() {
            if magnitude > EDGE_THRESHOLD {
                found = true;
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);
            }
        }
    }
    if !found {
        return None;
    }
    let padding = (plane.width.min(plane.height) as f64 * PADDING_RATIO).round() as usize;
    Some(SubjectBox {
        x0: min_x.saturating_sub(padding),
        y0: min_y.saturating_sub(padding),
        x1: (max_x + padding).min(plane.width - 1),
        y1: (max_y + padding).min(plane.height - 1),
    })
}

/// Normalized subject drift in `[0, 1]`: the mean of the relative area
/// change and the centroid shift over the image diagonal.
///
/// `None` means the drift is indeterminate because one of the images has no
/// detectable subject. It must not be read as either "identical" or
/// "diverged".
pub fn geometry_delta(original: &GrayPlane, candidate: &GrayPlane) -> Option<f64> {
    debug_assert!(original.same_dimensions(candidate));
    let a = subject_box(original)?;
    let b = subject_box(candidate)?;
    Some(box_delta(&a, &b, original.width, original.height))
}

/// Drift between two subject boxes inside a `width x height` frame.
pub fn box_delta(a: &SubjectBox, b: &SubjectBox, width: usize, height: usize) -> f64 {
    let area_a = a.area() as f64;
    let area_b = b.area() as f64;
    let area_delta = (area_a - area_b).abs() / area_a.max(area_b);

    let (ax, ay) = a.centroid();
    let (bx, by) = b.centroid();
    let width = width as f64;
    let height = height as f64;
    let diagonal = (width * width + height * height).sqrt();
    let center_delta = ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt() / diagonal;

    (area_delta + center_delta) / 2.0
}
