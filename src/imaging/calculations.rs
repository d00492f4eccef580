//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::Bounds;

/// Scale `(width, height)` to fit inside `bounds`, preserving aspect ratio.
///
/// The limiting dimension decides the scale factor. Images already inside
/// the box are returned unchanged: derivatives are never enlarged.
///
/// # Examples
/// ```
/// # use photoweb::imaging::{Bounds, fit_within};
/// // 3000x2000 into 1500x1200 → width limits → 1500x1000
/// assert_eq!(fit_within((3000, 2000), Bounds::new(1500, 1200)), (1500, 1000));
///
/// // 800x600 into 1500x1200 → already fits
/// assert_eq!(fit_within((800, 600), Bounds::new(1500, 1200)), (800, 600));
/// ```
pub fn fit_within(source: (u32, u32), bounds: Bounds) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return (src_w, src_h);
    }
    if src_w <= bounds.width && src_h <= bounds.height {
        return (src_w, src_h);
    }

    let scale_w = bounds.width as f64 / src_w as f64;
    let scale_h = bounds.height as f64 / src_h as f64;

    if scale_w <= scale_h {
        // Width is the limiting edge
        let h = (src_h as f64 * scale_w).round().max(1.0) as u32;
        (bounds.width, h.min(bounds.height))
    } else {
        // Height is the limiting edge
        let w = (src_w as f64 * scale_h).round().max(1.0) as u32;
        (w.min(bounds.width), bounds.height)
    }
}
