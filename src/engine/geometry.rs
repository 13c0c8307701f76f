//! Pure crop geometry for the render engine.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::asset::FocusPoint;

/// Dimensions that completely cover `target` while keeping the source aspect
/// ratio. One side matches the target exactly, the other may exceed it.
pub fn fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Wider source: height matches, width overflows
        let w = ((tgt_h as f64 * src_aspect).round() as u32).max(tgt_w);
        (w, tgt_h)
    } else {
        let h = ((tgt_w as f64 / src_aspect).round() as u32).max(tgt_h);
        (tgt_w, h)
    }
}

/// Top-left corner of a `target`-sized window inside `filled`, centered on
/// the focus point as far as the image edges allow.
pub fn focal_offset(filled: (u32, u32), target: (u32, u32), focus: FocusPoint) -> (u32, u32) {
    (
        axis_offset(filled.0, target.0, focus.x),
        axis_offset(filled.1, target.1, focus.y),
    )
}

fn axis_offset(filled: u32, target: u32, percent: f64) -> u32 {
    let slack = filled.saturating_sub(target);
    let center = filled as f64 * percent.clamp(0.0, 100.0) / 100.0;
    let start = (center - target as f64 / 2.0).round();
    start.clamp(0.0, slack as f64) as u32
}

/// Height that keeps the source aspect ratio at `width`.
pub fn proportional_height(source: (u32, u32), width: u32) -> u32 {
    ((width as f64 * source.1 as f64 / source.0 as f64).round() as u32).max(1)
}

/// Width that keeps the source aspect ratio at `height`.
pub fn proportional_width(source: (u32, u32), height: u32) -> u32 {
    ((height as f64 * source.0 as f64 / source.1 as f64).round() as u32).max(1)
}
