//! Face alignment via 4-DOF similarity transform.
//!
//! Maps the five detected landmarks onto the InsightFace 112×112 template
//! and warps the colour frame accordingly.

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

/// ArcFace reference landmarks for a 112×112 output.
pub const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

pub const ALIGNED_SIZE: u32 = 112;

/// Least-squares similarity transform (scale, rotation, translation)
/// taking `src` points onto `dst` points.
///
/// Returns the row-major 3×3 matrix
/// ```text
/// | a  -b  tx |
/// | b   a  ty |
/// | 0   0   1 |
/// ```
/// Degenerate input (all source points coincide) yields the identity.
pub fn similarity_transform(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> [f32; 9] {
    let n = src.len() as f32;
    let mean = |pts: &[(f32, f32); 5]| {
        let (sx, sy) = pts.iter().fold((0.0f32, 0.0f32), |(ax, ay), &(x, y)| (ax + x, ay + y));
        (sx / n, sy / n)
    };
    let (smx, smy) = mean(src);
    let (dmx, dmy) = mean(dst);

    let mut var = 0.0f32;
    let mut num_a = 0.0f32;
    let mut num_b = 0.0f32;
    for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
        let (sx, sy) = (sx - smx, sy - smy);
        let (dx, dy) = (dx - dmx, dy - dmy);
        var += sx * sx + sy * sy;
        num_a += sx * dx + sy * dy;
        num_b += sx * dy - sy * dx;
    }

    if var < 1e-12 {
        return [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
    }

    let a = num_a / var;
    let b = num_b / var;
    let tx = dmx - (a * smx - b * smy);
    let ty = dmy - (b * smx + a * smy);

    [a, -b, tx, b, a, ty, 0.0, 0.0, 1.0]
}

/// Warp the face described by `landmarks` into a canonical 112×112 crop.
///
/// Pixels that fall outside the source frame are black.
pub fn align_face(frame: &RgbImage, landmarks: &[(f32, f32); 5]) -> RgbImage {
    let matrix = similarity_transform(landmarks, &REFERENCE_LANDMARKS_112);
    let mut aligned = RgbImage::new(ALIGNED_SIZE, ALIGNED_SIZE);

    match Projection::from_matrix(matrix) {
        Some(projection) => warp_into(
            frame,
            &projection,
            Interpolation::Bilinear,
            Rgb([0, 0, 0]),
            &mut aligned,
        ),
        None => tracing::warn!(?matrix, "non-invertible alignment transform, using black crop"),
    }

    aligned
}
