use log::debug;
use opencv::core;
use opencv::prelude::*;
use rand::prelude::*;

use crate::error::Result;
use crate::utils::fits_window;

/// Draws one random window-sized crop from each sufficiently large negative image.
pub struct NegativeSampler {
    rng: StdRng,
    seed: u64,
}

impl NegativeSampler {
    /// Without a seed a fresh one is drawn, so each run samples differently.
    pub fn new(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        debug!("negative sampler seed: {}", seed);
        NegativeSampler {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform top-left in `[0, W - w] x [0, H - h]`, `None` when the window does not fit.
    pub fn crop_origin(&mut self, image: core::Size, window: core::Size) -> Option<core::Point> {
        if image.width < window.width || image.height < window.height {
            return None;
        }
        let x = self.rng.gen_range(0..=image.width - window.width);
        let y = self.rng.gen_range(0..=image.height - window.height);
        Some(core::Point::new(x, y))
    }

    /// Independent copies, one per eligible source image, in pool order.
    pub fn sample(&mut self, pool: &[Mat], window: core::Size) -> Result<Vec<Mat>> {
        let mut crops = Vec::with_capacity(pool.len());
        for image in pool {
            if !fits_window(image, window) {
                continue;
            }
            let size = core::Size::new(image.cols(), image.rows());
            if let Some(origin) = self.crop_origin(size, window) {
                let roi = core::Rect::new(origin.x, origin.y, window.width, window.height);
                crops.push(Mat::roi(image, roi)?.try_clone()?);
            }
        }
        Ok(crops)
    }
}
