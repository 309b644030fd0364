//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

const ANGLE_EPSILON: f64 = 1e-6;

/// Clamp a requested size so neither axis exceeds the current one.
///
/// Each axis is clamped against its own current value, so a request can
/// shrink one dimension while leaving the other untouched.
///
/// # Examples
/// ```
/// # use imgconv::imaging::calculations::clamp_to_current;
/// assert_eq!(clamp_to_current((500, 50), (200, 100)), (200, 50));
/// assert_eq!(clamp_to_current((150, 400), (200, 100)), (150, 100));
/// ```
pub fn clamp_to_current(requested: (u32, u32), current: (u32, u32)) -> (u32, u32) {
    let (req_w, req_h) = requested;
    let (cur_w, cur_h) = current;
    (req_w.min(cur_w), req_h.min(cur_h))
}

/// Scale dimensions by a percentage, rounding to the nearest pixel.
///
/// Returns `None` when either axis would not fit in a `u32`.
///
/// # Examples
/// ```
/// # use imgconv::imaging::calculations::percent_dimensions;
/// assert_eq!(percent_dimensions((200, 100), 50.0), Some((100, 50)));
/// assert_eq!(percent_dimensions((3, 3), 50.0), Some((2, 2)));
/// assert_eq!(percent_dimensions((10, 10), 1e12), None);
/// ```
pub fn percent_dimensions(current: (u32, u32), percent: f64) -> Option<(u32, u32)> {
    let factor = percent / 100.0;
    let scale = |v: u32| {
        let scaled = (v as f64 * factor).round();
        (scaled >= 0.0 && scaled <= u32::MAX as f64).then_some(scaled as u32)
    };
    Some((scale(current.0)?, scale(current.1)?))
}

/// Normalize an angle into `[0, 360)`.
pub fn normalize_degrees(degrees: f64) -> f64 {
    let n = degrees.rem_euclid(360.0);
    if (360.0 - n).abs() < ANGLE_EPSILON { 0.0 } else { n }
}

/// Number of clockwise quarter turns if `degrees` is a multiple of 90.
pub fn quarter_turns(degrees: f64) -> Option<u8> {
    let n = normalize_degrees(degrees);
    (0..4u8).find(|&k| (n - f64::from(k) * 90.0).abs() < ANGLE_EPSILON)
}

/// Size of the canvas that holds an image rotated by `degrees`.
///
/// Quarter turns swap or keep the dimensions exactly; other angles expand the
/// canvas to the rotated bounding box.
pub fn rotated_bounds(width: u32, height: u32, degrees: f64) -> (u32, u32) {
    match quarter_turns(degrees) {
        Some(1) | Some(3) => (height, width),
        Some(_) => (width, height),
        None => {
            let radians = degrees.to_radians();
            let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
            let (w, h) = (width as f64, height as f64);
            let new_w = (w * cos + h * sin).round() as u32;
            let new_h = (w * sin + h * cos).round() as u32;
            (new_w.max(1), new_h.max(1))
        }
    }
}
