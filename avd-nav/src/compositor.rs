//! Fixed-shape target representation built from differently sized reference views.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};
use ndarray::{Array3, Array4, ArrayView3, Axis, s};

use crate::dataset::Image;
use crate::env::EnvError;

/// Scales each view to fit a `(height, width, channels)` canvas and stacks the
/// results into one `(views, height, width, channels)` array.
#[derive(Clone, Debug)]
pub struct TargetCompositor {
    height: usize,
    width: usize,
    channels: usize,
    fallback_count: usize,
}

impl TargetCompositor {
    pub fn new(shape: [usize; 3], fallback_count: usize) -> Self {
        let [height, width, channels] = shape;
        Self {
            height,
            width,
            channels,
            fallback_count,
        }
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.height, self.width, self.channels]
    }

    /// Composites every view.
    ///
    /// Each view is resized so its larger side matches the matching canvas side,
    /// pasted at the top-left corner, and surrounded by white when the view is
    /// dark (mean < 127) or by black otherwise.
    pub fn compose(&self, images: &[Image]) -> Result<Array4<u8>, EnvError> {
        if images.is_empty() {
            return Err(EnvError::EmptyInput("no target views to composite".into()));
        }
        let canvases = images
            .iter()
            .map(|img| self.composite_one(img))
            .collect::<Result<Vec<_>, _>>()?;
        let views: Vec<ArrayView3<'_, u8>> = canvases.iter().map(|c| c.view()).collect();
        ndarray::stack(Axis(0), &views)
            .map_err(|e| EnvError::config(format!("cannot stack target views: {e}")))
    }

    /// Zero-filled stand-in used when an instance has no reference views.
    pub fn fallback(&self) -> Array4<u8> {
        Array4::zeros((self.fallback_count, self.height, self.width, self.channels))
    }

    /// [`compose`](Self::compose), substituting [`fallback`](Self::fallback) for empty input.
    pub fn compose_or_fallback(&self, images: &[Image]) -> Result<Array4<u8>, EnvError> {
        match self.compose(images) {
            Err(EnvError::EmptyInput(_)) => Ok(self.fallback()),
            other => other,
        }
    }

    fn composite_one(&self, image: &Image) -> Result<Array3<u8>, EnvError> {
        let resized = self.fit(image)?;
        let (rh, rw, _) = resized.dim();
        let mut canvas = Array3::from_elem(
            (self.height, self.width, self.channels),
            background_for(&resized),
        );
        canvas.slice_mut(s![..rh, ..rw, ..]).assign(&resized);
        Ok(canvas)
    }

    fn fit(&self, image: &Image) -> Result<Array3<u8>, EnvError> {
        let (h, w, c) = image.dim();
        if c != self.channels {
            return Err(EnvError::ShapeMismatch {
                field: "target view channels",
                expected: vec![self.channels],
                actual: vec![c],
            });
        }
        if h == 0 || w == 0 {
            return Err(EnvError::config(format!("target view has no pixels: {h}x{w}")));
        }

        let scale = if h >= w {
            self.height as f64 / h as f64
        } else {
            self.width as f64 / w as f64
        };
        let nh = ((h as f64 * scale).round() as usize).max(1);
        let nw = ((w as f64 * scale).round() as usize).max(1);
        if nh > self.height || nw > self.width {
            return Err(EnvError::config(format!(
                "target view {h}x{w} scales to {nh}x{nw}, larger than canvas {}x{}",
                self.height, self.width
            )));
        }
        Ok(resize(image, nh, nw))
    }
}

fn background_for(image: &Array3<u8>) -> u8 {
    let total: u64 = image.iter().map(|&v| v as u64).sum();
    let mean = total as f64 / image.len().max(1) as f64;
    if mean < 127.0 { u8::MAX } else { 0 }
}

/// Bilinear resize, one channel plane at a time.
fn resize(image: &Image, new_h: usize, new_w: usize) -> Array3<u8> {
    let (h, w, c) = image.dim();
    if (h, w) == (new_h, new_w) {
        return image.clone();
    }
    let planes: Vec<ImageBuffer<Luma<u8>, Vec<u8>>> = (0..c)
        .map(|ch| {
            let plane = ImageBuffer::from_fn(w as u32, h as u32, |x, y| {
                Luma([image[[y as usize, x as usize, ch]]])
            });
            imageops::resize(&plane, new_w as u32, new_h as u32, FilterType::Triangle)
        })
        .collect();
    Array3::from_shape_fn((new_h, new_w, c), |(y, x, ch)| {
        planes[ch].get_pixel(x as u32, y as u32)[0]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(h: usize, w: usize, value: u8) -> Image {
        Image::from_elem((h, w, 3), value)
    }

    #[test]
    fn mixed_sizes_compose_to_fixed_shape() {
        let comp = TargetCompositor::new([100, 100, 3], 2);
        let out = comp
            .compose(&[solid(30, 50, 10), solid(80, 20, 200)])
            .unwrap();
        assert_eq!(out.dim(), (2, 100, 100, 3));
    }

    #[test]
    fn dark_views_get_white_background() {
        let comp = TargetCompositor::new([100, 100, 3], 2);
        let out = comp.compose(&[solid(30, 50, 0)]).unwrap();
        // 30x50 scales by 2 to 60x100
        assert_eq!(out[[0, 0, 0, 0]], 0);
        assert_eq!(out[[0, 59, 99, 2]], 0);
        assert_eq!(out[[0, 60, 0, 0]], 255);
        assert_eq!(out[[0, 99, 99, 1]], 255);
    }

    #[test]
    fn bright_views_get_black_background() {
        let comp = TargetCompositor::new([100, 100, 3], 2);
        let out = comp.compose(&[solid(80, 20, 255)]).unwrap();
        // 80x20 scales by 1.25 to 100x25
        assert_eq!(out[[0, 0, 0, 0]], 255);
        assert_eq!(out[[0, 99, 24, 0]], 255);
        assert_eq!(out[[0, 0, 25, 0]], 0);
        assert_eq!(out[[0, 50, 99, 2]], 0);
    }

    #[test]
    fn composition_is_deterministic() {
        let comp = TargetCompositor::new([64, 48, 3], 2);
        let gradient = Image::from_shape_fn((37, 23, 3), |(y, x, c)| ((y * 7 + x * 3 + c) % 256) as u8);
        let views = vec![gradient, solid(5, 90, 140)];
        let first = comp.compose(&views).unwrap();
        for _ in 0..3 {
            assert_eq!(comp.compose(&views).unwrap(), first);
        }
    }

    #[test]
    fn empty_input_is_reported_and_fallback_is_zero() {
        let comp = TargetCompositor::new([10, 12, 3], 2);
        assert!(matches!(comp.compose(&[]), Err(EnvError::EmptyInput(_))));

        let fallback = comp.compose_or_fallback(&[]).unwrap();
        assert_eq!(fallback.dim(), (2, 10, 12, 3));
        assert!(fallback.iter().all(|&v| v == 0));
    }

    #[test]
    fn oversized_fit_is_a_configuration_error() {
        // wide canvas, landscape view scaled to full width overflows the height
        let comp = TargetCompositor::new([50, 100, 3], 2);
        assert!(matches!(
            comp.compose(&[solid(40, 60, 0)]),
            Err(EnvError::Configuration(_))
        ));
    }

    #[test]
    fn channel_mismatch_is_rejected() {
        let comp = TargetCompositor::new([10, 10, 3], 2);
        let gray = Image::zeros((4, 4, 1));
        assert!(matches!(
            comp.compose(&[gray]),
            Err(EnvError::ShapeMismatch { .. })
        ));
    }
}
