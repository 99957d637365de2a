use log::{debug, info};
use opencv::prelude::*;
use opencv::{core, highgui, imgproc};

use crate::detection::MultiScaleDetector;
use crate::error::Result;
use crate::models::Detection;
use crate::utils::{clip_to_bounds, fits_window};

const VISUALIZE_WINDOW: &str = "testing trained detector on negative images";

/// Window-sized copies of every detected region, clipped to the image.
///
/// Boxes found at another pyramid level are resized back to the window.
pub fn crops_from_detections(image: &Mat, detections: &[Detection], window: core::Size) -> Result<Vec<Mat>> {
    let bounds = core::Size::new(image.cols(), image.rows());
    let mut crops = Vec::with_capacity(detections.len());
    for detection in detections {
        let Some(region) = clip_to_bounds(detection.region, bounds) else {
            debug!("dropping detection {:?} outside the image", detection.region);
            continue;
        };
        let crop = Mat::roi(image, region)?.try_clone()?;
        if region.size() == window {
            crops.push(crop);
        } else {
            let mut resized = Mat::default();
            imgproc::resize(&crop, &mut resized, window, 0.0, 0.0, imgproc::INTER_LINEAR_EXACT)?;
            crops.push(resized);
        }
    }
    Ok(crops)
}

/// Harvests false positives of a first-pass detector from full negative images.
pub struct HardNegativeMiner {
    visualize: bool,
}

impl HardNegativeMiner {
    pub fn new(visualize: bool) -> Self {
        HardNegativeMiner { visualize }
    }

    /// Every detection on a negative image is a false positive; images smaller
    /// than the window contribute nothing.
    pub fn harvest(&self, detector: &MultiScaleDetector, negatives: &[Mat]) -> Result<Vec<Mat>> {
        info!("Testing trained detector on {} negative images. This may take a few minutes...", negatives.len());
        let window = detector.window();
        let mut hard_negatives = Vec::new();

        for image in negatives {
            let detections = if fits_window(image, window) {
                detector.detect(image)?
            } else {
                Vec::new()
            };
            hard_negatives.extend(crops_from_detections(image, &detections, window)?);

            if self.visualize {
                self.show(image, &detections)?;
            }
        }

        info!("harvested {} hard negatives", hard_negatives.len());
        Ok(hard_negatives)
    }

    fn show(&self, image: &Mat, detections: &[Detection]) -> Result<()> {
        let mut canvas = image.try_clone()?;
        for detection in detections {
            imgproc::rectangle(&mut canvas, detection.region,
                core::Scalar::new(0.0, 255.0, 0.0, 0.0), 2, imgproc::LINE_8, 0)?;
        }
        highgui::imshow(VISUALIZE_WINDOW, &canvas)?;
        highgui::wait_key(5)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::hog_for_window;
    use crate::models::DetectorModel;

    fn image(width: i32, height: i32) -> Mat {
        Mat::zeros(height, width, core::CV_8UC3).unwrap().to_mat().unwrap()
    }

    fn det(x: i32, y: i32, w: i32, h: i32) -> Detection {
        Detection {
            region: core::Rect::new(x, y, w, h),
            confidence: 0.5,
        }
    }

    fn constant_model(bias: f32) -> DetectorModel {
        let window = core::Size::new(64, 64);
        let len = hog_for_window(window).unwrap().get_descriptor_size().unwrap();
        DetectorModel::new(window, vec![0.0; len], bias)
    }

    #[test]
    fn each_detection_becomes_one_window_crop() {
        let window = core::Size::new(64, 64);
        let detections = vec![det(0, 0, 64, 64), det(50, 40, 96, 96), det(180, 180, 128, 128)];
        let crops = crops_from_detections(&image(256, 256), &detections, window).unwrap();

        assert_eq!(crops.len(), 3);
        for crop in &crops {
            assert_eq!((crop.cols(), crop.rows()), (64, 64));
        }
    }

    #[test]
    fn detections_outside_the_image_are_dropped() {
        let crops = crops_from_detections(&image(100, 100), &[det(120, 0, 64, 64)], core::Size::new(64, 64)).unwrap();
        assert!(crops.is_empty());
    }

    #[test]
    fn undersized_negatives_yield_nothing() {
        let detector = MultiScaleDetector::new(&constant_model(1.0)).unwrap();
        let miner = HardNegativeMiner::new(false);
        let crops = miner.harvest(&detector, &[image(32, 32), image(63, 200)]).unwrap();
        assert!(crops.is_empty());
    }

    #[test]
    fn rejecting_detector_mines_nothing() {
        let detector = MultiScaleDetector::new(&constant_model(-5.0)).unwrap();
        let miner = HardNegativeMiner::new(false);
        assert!(miner.harvest(&detector, &[image(128, 128)]).unwrap().is_empty());
    }

    #[test]
    fn accepting_detector_mines_window_crops() {
        let detector = MultiScaleDetector::new(&constant_model(5.0)).unwrap();
        let miner = HardNegativeMiner::new(false);
        let crops = miner.harvest(&detector, &[image(160, 160)]).unwrap();
        assert!(!crops.is_empty());
        assert!(crops.iter().all(|c| c.cols() == 64 && c.rows() == 64));
    }
}
