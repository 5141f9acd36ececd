// Aspect-preserving transform for the display quad

/// Scale applied to the [-1, 1] quad in normalized device coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportTransform {
    pub scale_x: f32,
    pub scale_y: f32,
}

impl ViewportTransform {
    /// Fit an image inside the window without distortion, then apply `zoom`.
    ///
    /// All dimensions must be non-zero.
    pub fn fit(
        image_width: u32,
        image_height: u32,
        window_width: u32,
        window_height: u32,
        zoom: f32,
    ) -> Self {
        let image_aspect = image_width as f32 / image_height as f32;
        let window_aspect = window_width as f32 / window_height as f32;

        let (scale_x, scale_y) = if image_aspect > window_aspect {
            (1.0, window_aspect / image_aspect)
        } else {
            (image_aspect / window_aspect, 1.0)
        };

        Self {
            scale_x: scale_x * zoom,
            scale_y: scale_y * zoom,
        }
    }

    /// Column-major 4x4 matrix for the vertex shader
    pub fn to_matrix(self) -> [[f32; 4]; 4] {
        [
            [self.scale_x, 0.0, 0.0, 0.0],
            [0.0, self.scale_y, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{} != {}", a, b);
    }

    #[test]
    fn test_wide_image_in_standard_window() {
        let t = ViewportTransform::fit(1920, 1080, 800, 600, 1.0);
        assert_close(t.scale_x, 1.0);
        assert_close(t.scale_y, 0.75);
    }

    #[test]
    fn test_tall_image_in_standard_window() {
        let t = ViewportTransform::fit(600, 800, 800, 600, 1.0);
        assert_close(t.scale_x, 0.5625);
        assert_close(t.scale_y, 1.0);
    }

    #[test]
    fn test_matching_aspect_fills_window() {
        let t = ViewportTransform::fit(400, 300, 800, 600, 1.0);
        assert_close(t.scale_x, 1.0);
        assert_close(t.scale_y, 1.0);
    }

    #[test]
    fn test_zoom_scales_both_axes() {
        let base = ViewportTransform::fit(1920, 1080, 800, 600, 1.0);
        let zoomed = ViewportTransform::fit(1920, 1080, 800, 600, 2.0);
        assert_close(zoomed.scale_x, base.scale_x * 2.0);
        assert_close(zoomed.scale_y, base.scale_y * 2.0);
        // Aspect survives zoom
        assert_close(zoomed.scale_x / zoomed.scale_y, base.scale_x / base.scale_y);
    }

    #[test]
    fn test_matrix_is_pure_scale() {
        let m = ViewportTransform { scale_x: 0.5, scale_y: 2.0 }.to_matrix();
        assert_eq!(m[0], [0.5, 0.0, 0.0, 0.0]);
        assert_eq!(m[1], [0.0, 2.0, 0.0, 0.0]);
        assert_eq!(m[2], [0.0, 0.0, 1.0, 0.0]);
        assert_eq!(m[3], [0.0, 0.0, 0.0, 1.0]);
    }
}
