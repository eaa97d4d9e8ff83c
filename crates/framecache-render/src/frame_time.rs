//! Frame-aligned render time: round down to the nearest frame boundary so
//! repeated requests at slightly different times converge on one file.

/// `floor(time * fps) / fps`, with a small correction at 60 fps to counter
/// observed rounding artifacts in that specific frame rate.
pub fn rounded_render_time(time: f64, fps: u32) -> f64 {
    let rounded = (time * fps as f64).floor() / fps as f64;
    if fps == 60 {
        rounded - 1.0 / 100.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_down_to_frame_boundary() {
        let rounded = rounded_render_time(1.04, 30);
        assert!(rounded <= 1.04);
        assert!((rounded - 1.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn applies_correction_at_60_fps() {
        let rounded = rounded_render_time(2.0, 60);
        assert!((rounded - (2.0 - 0.01)).abs() < 1e-9);
    }

    #[test]
    fn does_not_apply_correction_at_other_fps() {
        let rounded = rounded_render_time(2.0, 30);
        assert!((rounded - 2.0).abs() < 1e-9);
    }
}
