use std::ops::Range;

use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wrn_core::{DataFormat, Float, Tensor, TensorError, TensorResult};

/// Per-sample image transform applied by a data pipeline.
pub trait Transform<T: Float> {
    fn apply(&mut self, image: Tensor<T>) -> TensorResult<Tensor<T>>;
}

impl<T, F> Transform<T> for F
where
    T: Float,
    F: FnMut(Tensor<T>) -> TensorResult<Tensor<T>>,
{
    fn apply(&mut self, image: Tensor<T>) -> TensorResult<Tensor<T>> {
        self(image)
    }
}

/// Rows and columns blanked by a `size`x`size` cutout centered on `(y, x)`,
/// clipped to an `h`x`w` image.
pub fn cutout_region(h: usize, w: usize, y: usize, x: usize, size: usize) -> (Range<usize>, Range<usize>) {
    let half = size / 2;
    let rows = y.saturating_sub(half)..y.saturating_add(size - half).min(h);
    let cols = x.saturating_sub(half)..x.saturating_add(size - half).min(w);
    (rows, cols)
}

/// Cutout augmentation: with probability `p`, overwrite a square patch
/// centered on a uniformly drawn pixel with a constant, in every channel.
#[derive(Debug, Clone)]
pub struct RandomCutout<T: Float> {
    p: f64,
    size: usize,
    fill: T,
    format: DataFormat,
    rng: StdRng,
}

/// Cutout transform applying with probability `p` a `size`x`size` patch.
pub fn get_random_cutout<T: Float>(p: f64, size: usize) -> TensorResult<RandomCutout<T>> {
    RandomCutout::new(p, size)
}

impl<T: Float> RandomCutout<T> {
    /// Zero fill, channels-last images, entropy-seeded.
    pub fn new(p: f64, size: usize) -> TensorResult<Self> {
        if !(0.0..=1.0).contains(&p) {
            return Err(TensorError::InvalidOperation(format!(
                "cutout probability must be in [0, 1], got {}",
                p
            )));
        }
        if size == 0 {
            return Err(TensorError::InvalidOperation("cutout size must be positive".into()));
        }
        Ok(RandomCutout {
            p,
            size,
            fill: T::ZERO,
            format: DataFormat::ChannelsLast,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_fill(mut self, fill: T) -> Self {
        self.fill = fill;
        self
    }

    pub fn with_format(mut self, format: DataFormat) -> Self {
        self.format = format;
        self
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl<T: Float> Transform<T> for RandomCutout<T> {
    fn apply(&mut self, mut image: Tensor<T>) -> TensorResult<Tensor<T>> {
        let (h, w, c) = self.format.split(image.shape())?;
        if h == 0 || w == 0 {
            return Err(TensorError::InvalidOperation(format!(
                "cannot cut out of an empty image {}",
                image.shape()
            )));
        }

        // applies iff the draw in [0, 1) falls below p, so p = 0 never fires
        // and p = 1 always does
        if self.rng.gen::<f64>() >= self.p {
            return Ok(image);
        }

        let y = self.rng.gen_range(0..h);
        let x = self.rng.gen_range(0..w);
        let (rows, cols) = cutout_region(h, w, y, x, self.size);
        trace!("cutout at ({}, {}): rows {:?} cols {:?}", y, x, rows, cols);

        let shape = image.shape().clone();
        let data = image.data_mut();
        for yy in rows {
            for xx in cols.clone() {
                for ch in 0..c {
                    data[shape.offset(&self.format.index(yy, xx, ch))?] = self.fill;
                }
            }
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changed_box(before: &Tensor<f64>, after: &Tensor<f64>) -> Option<(Range<usize>, Range<usize>)> {
        let (h, w, _) = DataFormat::ChannelsLast.split(before.shape()).unwrap();
        let mut bbox: Option<(usize, usize, usize, usize)> = None;
        for y in 0..h {
            for x in 0..w {
                if before.get(&[y, x, 0]).unwrap() != after.get(&[y, x, 0]).unwrap() {
                    bbox = Some(match bbox {
                        None => (y, y, x, x),
                        Some((y0, y1, x0, x1)) => (y0.min(y), y1.max(y), x0.min(x), x1.max(x)),
                    });
                }
            }
        }
        bbox.map(|(y0, y1, x0, x1)| (y0..y1 + 1, x0..x1 + 1))
    }

    #[test]
    fn test_always_applies_with_p_one() {
        let image = Tensor::<f64>::ones(vec![32, 32, 3]);
        for seed in 0..200 {
            let mut cutout = get_random_cutout::<f64>(1.0, 16).unwrap().with_seed(seed);
            let out = cutout.apply(image.clone()).unwrap();
            let (rows, cols) = changed_box(&image, &out).expect("cutout must change the image");
            assert!(rows.len() <= 16 && cols.len() <= 16);

            // contiguous: every pixel of the bounding box is blanked in every channel
            let blanked = rows.len() * cols.len() * 3;
            assert_eq!(image.count_diff(&out).unwrap(), blanked);
            for y in rows.clone() {
                for x in cols.clone() {
                    for ch in 0..3 {
                        assert_eq!(out.get(&[y, x, ch]).unwrap(), 0.0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_never_applies_with_p_zero() {
        let image = Tensor::<f64>::rand(vec![32, 32, 3], Some(3));
        let mut cutout = get_random_cutout::<f64>(0.0, 16).unwrap().with_seed(11);
        for _ in 0..500 {
            let out = cutout.apply(image.clone()).unwrap();
            assert_eq!(out, image);
        }
    }

    #[test]
    fn test_partial_probability_mixes() {
        let image = Tensor::<f64>::ones(vec![16, 16, 1]);
        let mut cutout = get_random_cutout::<f64>(0.5, 4).unwrap().with_seed(5);
        let applied = (0..400)
            .filter(|_| cutout.apply(image.clone()).unwrap() != image)
            .count();
        assert!(applied > 100 && applied < 300, "applied {} times", applied);
    }

    #[test]
    fn test_region_clipping() {
        assert_eq!(cutout_region(32, 32, 0, 0, 16), (0..8, 0..8));
        assert_eq!(cutout_region(32, 32, 31, 16, 16), (23..32, 8..24));
        assert_eq!(cutout_region(32, 32, 10, 10, 5), (8..13, 8..13));
        assert_eq!(cutout_region(4, 4, 2, 2, 1), (2..3, 2..3));
    }

    #[test]
    fn test_oversized_patch_blanks_whole_image() {
        assert_eq!(cutout_region(32, 24, 5, 7, usize::MAX), (0..32, 0..24));

        let image = Tensor::<f64>::ones(vec![32, 32, 3]);
        let mut cutout = get_random_cutout::<f64>(1.0, usize::MAX).unwrap().with_seed(1);
        let out = cutout.apply(image).unwrap();
        assert!(out.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_custom_fill_and_channels_first() {
        let image = Tensor::<f32>::zeros(vec![3, 8, 8]);
        let mut cutout = get_random_cutout::<f32>(1.0, 2)
            .unwrap()
            .with_fill(1.0)
            .with_format(DataFormat::ChannelsFirst)
            .with_seed(9);
        let out = cutout.apply(image.clone()).unwrap();
        let changed = image.count_diff(&out).unwrap();
        assert!(changed > 0 && changed <= 2 * 2 * 3);
        assert_eq!(changed % 3, 0);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(get_random_cutout::<f64>(1.5, 16).is_err());
        assert!(get_random_cutout::<f64>(-0.1, 16).is_err());
        assert!(get_random_cutout::<f64>(0.5, 0).is_err());

        let mut cutout = get_random_cutout::<f64>(1.0, 4).unwrap();
        assert!(cutout.apply(Tensor::ones(vec![8, 8])).is_err());
        assert!(cutout.apply(Tensor::ones(vec![0, 8, 3])).is_err());
    }

    #[test]
    fn test_closures_are_transforms() {
        let mut invert = |t: Tensor<f64>| -> TensorResult<Tensor<f64>> { Ok(t.apply(|v| 1.0 - v)) };
        let out = invert.apply(Tensor::ones(vec![2, 2, 1])).unwrap();
        assert!(out.data().iter().all(|&v| v == 0.0));
    }
}
