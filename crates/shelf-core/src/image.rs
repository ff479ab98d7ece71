/// Scales `(width, height)` down so neither side exceeds `max`, keeping the aspect ratio.
///
/// The longer side becomes exactly `max`; the shorter one is rounded half away from zero
/// (the same as `Math.round` for positive sizes). Sizes already within bounds, and
/// degenerate zero sizes, are returned unchanged. A scaled side never drops below 1 px.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width == 0 || height == 0 || max == 0 {
        return (width, height);
    }
    if width <= max && height <= max {
        return (width, height);
    }

    let scale = |side: u32, longer: u32| -> u32 {
        let scaled = (f64::from(side) * f64::from(max) / f64::from(longer)).round();
        (scaled as u32).max(1)
    };

    if width > height {
        (max, scale(height, width))
    } else {
        (scale(width, height), max)
    }
}

#[cfg(test)]
mod tests {
    use super::fit_within;

    #[test]
    fn landscape_and_portrait_scale_to_bound() {
        assert_eq!(fit_within(4000, 3000, 800), (800, 600));
        assert_eq!(fit_within(3000, 4000, 800), (600, 800));
        assert_eq!(fit_within(1000, 1000, 800), (800, 800));
    }

    #[test]
    fn small_images_are_untouched() {
        assert_eq!(fit_within(640, 480, 800), (640, 480));
        assert_eq!(fit_within(800, 800, 800), (800, 800));
    }

    #[test]
    fn rounds_half_up_and_clamps_to_one_pixel() {
        // 801 x 401 -> 401 * 800 / 801 = 400.499... -> 400
        assert_eq!(fit_within(801, 401, 800), (800, 400));
        // 1600 x 1001 -> 500.5 -> 501
        assert_eq!(fit_within(1600, 1001, 800), (800, 501));
        assert_eq!(fit_within(100_000, 1, 800), (800, 1));
    }

    #[test]
    fn longer_side_equals_bound_and_ratio_is_kept() {
        for (w, h) in [(4032, 3024), (1080, 1920), (2500, 900), (901, 900), (3000, 1999)] {
            let (nw, nh) = fit_within(w, h, 800);
            assert_eq!(nw.max(nh), 800, "{w}x{h}");

            // The shorter side is the exact proportional size, off by at most rounding.
            let (long, short, new_short) = if w > h { (w, h, nh) } else { (h, w, nw) };
            let exact = f64::from(short) * 800.0 / f64::from(long);
            assert!(
                (f64::from(new_short) - exact).abs() <= 0.5,
                "{w}x{h} -> {nw}x{nh}"
            );
        }
    }
}
