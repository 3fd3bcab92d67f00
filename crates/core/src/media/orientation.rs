//! Aspect-ratio geometry for the orientation stage.

use super::types::Orientation;

/// Width/height ratios closer to 1.0 than this count as square.
const SQUARE_TOLERANCE: f64 = 0.1;

/// Classifies a frame size into its native orientation.
pub fn detect_native(width: u32, height: u32) -> Orientation {
    if height == 0 {
        return Orientation::Landscape;
    }
    let ratio = width as f64 / height as f64;
    if (ratio - 1.0).abs() < SQUARE_TOLERANCE {
        Orientation::Square
    } else if ratio > 1.0 {
        Orientation::Landscape
    } else {
        Orientation::Portrait
    }
}

/// Computes the output frame size for `orientation` given a source frame size.
///
/// The target never exceeds the source on either axis. Results are rounded to
/// the nearest even number since yuv420p encodes need even dimensions.
pub fn target_dimensions(orientation: Orientation, width: u32, height: u32) -> (u32, u32) {
    let (w, h) = (width as f64, height as f64);
    let (target_w, target_h) = match orientation {
        Orientation::Square => {
            let side = w.min(h);
            (side, side)
        }
        Orientation::Portrait => {
            let target_w = h * 9.0 / 16.0;
            if target_w > w {
                (w, w * 16.0 / 9.0)
            } else {
                (target_w, h)
            }
        }
        Orientation::Landscape => {
            let target_h = w * 9.0 / 16.0;
            if target_h > h {
                (h * 16.0 / 9.0, h)
            } else {
                (w, target_h)
            }
        }
    };
    (even(target_w), even(target_h))
}

/// Builds the ffmpeg filter that fits the input inside `width`x`height`
/// without distortion and centers it on padding.
pub fn scale_pad_filter(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
        w = width,
        h = height
    )
}

fn even(value: f64) -> u32 {
    let rounded = value.round().max(0.0) as u32;
    (rounded - rounded % 2).max(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_native() {
        assert_eq!(detect_native(1920, 1080), Orientation::Landscape);
        assert_eq!(detect_native(1080, 1920), Orientation::Portrait);
        assert_eq!(detect_native(1000, 1000), Orientation::Square);
        // Within tolerance of 1:1
        assert_eq!(detect_native(1050, 1000), Orientation::Square);
        assert_eq!(detect_native(1100, 1000), Orientation::Landscape);
    }

    #[test]
    fn test_square_uses_shorter_side() {
        assert_eq!(target_dimensions(Orientation::Square, 1920, 1080), (1080, 1080));
        assert_eq!(target_dimensions(Orientation::Square, 720, 1280), (720, 720));
    }

    #[test]
    fn test_portrait_from_landscape() {
        // 1080 * 9 / 16 = 607.5, rounded to an even 608
        let (w, h) = target_dimensions(Orientation::Portrait, 1920, 1080);
        assert_eq!((w, h), (608, 1080));
        let ratio = w as f64 / h as f64;
        assert!((ratio - 9.0 / 16.0).abs() < 0.01);
    }

    #[test]
    fn test_portrait_width_overflow_fixes_width() {
        // 1000 * 9 / 16 = 562.5 > 500, so width is kept and height derived
        let (w, h) = target_dimensions(Orientation::Portrait, 500, 1000);
        assert_eq!(w, 500);
        assert_eq!(h, 888);
    }

    #[test]
    fn test_landscape_from_portrait() {
        let (w, h) = target_dimensions(Orientation::Landscape, 1080, 1920);
        assert_eq!((w, h), (1080, 608));
    }

    #[test]
    fn test_landscape_height_overflow_fixes_height() {
        // 1000 * 9 / 16 = 562.5 > 500, so height is kept and width derived
        let (w, h) = target_dimensions(Orientation::Landscape, 1000, 500);
        assert_eq!((w, h), (888, 500));
    }

    #[test]
    fn test_targets_never_exceed_source() {
        for (sw, sh) in [(1920, 1080), (1080, 1920), (1001, 999), (640, 480), (3, 3)] {
            for orientation in Orientation::ALL {
                let (w, h) = target_dimensions(orientation, sw, sh);
                assert!(w <= sw.max(2) && h <= sh.max(2), "{orientation} {sw}x{sh} -> {w}x{h}");
                assert_eq!(w % 2, 0);
                assert_eq!(h % 2, 0);
            }
        }
    }

    #[test]
    fn test_scale_pad_filter() {
        let filter = scale_pad_filter(608, 1080);
        assert!(filter.starts_with("scale=608:1080:force_original_aspect_ratio=decrease"));
        assert!(filter.contains("pad=608:1080:(ow-iw)/2:(oh-ih)/2"));
    }
}
