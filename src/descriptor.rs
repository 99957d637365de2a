use opencv::core;
use opencv::objdetect::HOGDescriptor;
use opencv::prelude::*;

use crate::error::Result;
use crate::utils::{fits_window, to_gray};

/// Descriptor cell size; detection windows are multiples of it.
pub const CELL_SIZE: i32 = 8;

/// Default HOG layout (16x16 blocks, 8x8 stride and cells, 9 bins) over `window`.
pub fn hog_for_window(window: core::Size) -> Result<HOGDescriptor> {
    let mut hog = HOGDescriptor::default()?;
    hog.set_win_size(window);
    Ok(hog)
}

/// Descriptors computed for one eligible image.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedSample {
    pub descriptor: Vec<f32>,
    /// Descriptor of the horizontally mirrored window, when flip augmentation is on.
    pub mirrored: Option<Vec<f32>>,
}

impl ExtractedSample {
    pub fn count(&self) -> usize {
        1 + usize::from(self.mirrored.is_some())
    }
}

/// Computes HOG descriptors for centered, window-sized grayscale crops.
pub struct DescriptorExtractor {
    hog: HOGDescriptor,
    window: core::Size,
    flip: bool,
}

impl DescriptorExtractor {
    pub fn new(window: core::Size, flip: bool) -> Result<Self> {
        Ok(DescriptorExtractor {
            hog: hog_for_window(window)?,
            window,
            flip,
        })
    }

    pub fn window(&self) -> core::Size {
        self.window
    }

    pub fn descriptor_len(&self) -> Result<usize> {
        Ok(self.hog.get_descriptor_size()?)
    }

    /// `None` when the image is smaller than the window in either dimension.
    pub fn extract(&self, image: &Mat) -> Result<Option<ExtractedSample>> {
        if !fits_window(image, self.window) {
            return Ok(None);
        }

        let roi = core::Rect::new(
            (image.cols() - self.window.width) / 2,
            (image.rows() - self.window.height) / 2,
            self.window.width,
            self.window.height,
        );
        let gray = to_gray(&Mat::roi(image, roi)?.try_clone()?)?;
        let descriptor = self.compute(&gray)?;

        let mirrored = if self.flip {
            let mut flipped = Mat::default();
            core::flip(&gray, &mut flipped, 1)?;
            Some(self.compute(&flipped)?)
        } else {
            None
        };

        Ok(Some(ExtractedSample { descriptor, mirrored }))
    }

    /// One entry per input image, in input order.
    pub fn extract_all(&self, images: &[Mat]) -> Result<Vec<Option<ExtractedSample>>> {
        images.iter().map(|image| self.extract(image)).collect()
    }

    fn compute(&self, gray: &Mat) -> Result<Vec<f32>> {
        let mut descriptors = core::Vector::<f32>::new();
        self.hog.compute(
            gray,
            &mut descriptors,
            core::Size::new(CELL_SIZE, CELL_SIZE),
            core::Size::new(0, 0),
            &core::Vector::<core::Point>::new(),
        )?;
        Ok(descriptors.to_vec())
    }
}

/// Feature vectors of the eligible samples, mirrored copies right after their source.
pub fn flatten(samples: Vec<Option<ExtractedSample>>) -> Vec<Vec<f32>> {
    let mut vectors = Vec::with_capacity(samples.iter().flatten().map(ExtractedSample::count).sum());
    for sample in samples.into_iter().flatten() {
        vectors.push(sample.descriptor);
        if let Some(mirrored) = sample.mirrored {
            vectors.push(mirrored);
        }
    }
    vectors
}
