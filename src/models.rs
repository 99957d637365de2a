use std::path::{Path, PathBuf};

use opencv::core;
use opencv::objdetect::HOGDescriptor;
use opencv::prelude::*;

use crate::descriptor::hog_for_window;
use crate::error::{Result, TrainError};

/// A trained linear detector: the descriptor weights followed by one bias term.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorModel {
    pub window: core::Size,
    pub weights: Vec<f32>,
}

impl DetectorModel {
    pub fn new(window: core::Size, feature_weights: Vec<f32>, bias: f32) -> Self {
        let mut weights = feature_weights;
        weights.push(bias);
        DetectorModel { window, weights }
    }

    /// Descriptor length L; the weight vector holds L + 1 values.
    pub fn descriptor_len(&self) -> usize {
        self.weights.len().saturating_sub(1)
    }

    pub fn bias(&self) -> f32 {
        self.weights.last().copied().unwrap_or(0.0)
    }

    /// Signed distance of one descriptor from the decision hyperplane.
    pub fn score(&self, descriptor: &[f32]) -> f32 {
        let dot: f32 = self.weights[..self.descriptor_len()]
            .iter()
            .zip(descriptor)
            .map(|(w, x)| w * x)
            .sum();
        dot + self.bias()
    }

    /// A HOG descriptor for this window with the weights installed as its SVM detector.
    pub fn to_hog(&self) -> Result<HOGDescriptor> {
        let mut hog = hog_for_window(self.window)?;
        let expected = hog.get_descriptor_size()? + 1;
        if self.weights.len() != expected {
            return Err(TrainError::DescriptorLength {
                index: 0,
                found: self.weights.len(),
                expected,
            });
        }
        let detector = core::Vector::<f32>::from_iter(self.weights.iter().copied());
        hog.set_svm_detector(&detector)?;
        Ok(hog)
    }

    /// Persist window size and weights in OpenCV file-storage format.
    pub fn save(&self, path: &Path) -> Result<()> {
        let hog = self.to_hog()?;
        hog.save(&path.to_string_lossy(), "")?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let load_error = |reason: &str| TrainError::ModelLoad {
            path: PathBuf::from(path),
            reason: reason.to_string(),
        };
        if !path.is_file() {
            return Err(load_error("file not found"));
        }

        let mut hog = HOGDescriptor::default()?;
        if !hog.load(&path.to_string_lossy(), "")? {
            return Err(load_error("not a HOG detector file"));
        }

        let window = hog.win_size();
        let weights = hog.svm_detector().to_vec();
        let expected = hog.get_descriptor_size()? + 1;
        if weights.len() != expected {
            return Err(load_error(&format!(
                "weight vector has {} values, expected {}",
                weights.len(),
                expected
            )));
        }
        Ok(DetectorModel { window, weights })
    }
}

/// One candidate window in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub region: core::Rect,
    pub confidence: f64,
}

/// Outcome of picking the best detection(s) of one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Detections tied at the maximum confidence, all above the acceptance threshold.
    Accepted(Vec<Detection>),
    /// Nothing worth drawing; `best` is the maximum confidence seen, if any.
    Rejected { best: Option<f64> },
}

impl Selection {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Selection::Accepted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn model_64() -> DetectorModel {
        let len = hog_for_window(core::Size::new(64, 64))
            .unwrap()
            .get_descriptor_size()
            .unwrap();
        let weights = (0..len).map(|i| ((i % 7) as f32 - 3.0) * 0.01).collect();
        DetectorModel::new(core::Size::new(64, 64), weights, -0.25)
    }

    #[test]
    fn weight_vector_carries_bias_last() {
        let model = model_64();
        assert_eq!(model.weights.len(), model.descriptor_len() + 1);
        assert_eq!(model.bias(), -0.25);
    }

    #[test]
    fn score_is_dot_plus_bias() {
        let model = DetectorModel::new(core::Size::new(16, 16), vec![1.0, 2.0, 3.0], 0.5);
        assert_eq!(model.score(&[1.0, 1.0, 1.0]), 6.5);
    }

    #[test]
    fn save_and_load_preserve_model() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("detector.yml");
        let model = model_64();
        model.save(&path).unwrap();

        let loaded = DetectorModel::load(&path).unwrap();
        assert_eq!(loaded.window, model.window);
        assert_eq!(loaded.weights.len(), model.weights.len());
        for (a, b) in loaded.weights.iter().zip(&model.weights) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempdir().unwrap();
        let err = DetectorModel::load(&dir.path().join("nope.yml")).unwrap_err();
        assert!(matches!(err, TrainError::ModelLoad { .. }));
    }

    #[test]
    fn wrong_length_is_rejected_by_hog() {
        let model = DetectorModel::new(core::Size::new(64, 64), vec![0.0; 10], 0.0);
        assert!(matches!(model.to_hog(), Err(TrainError::DescriptorLength { .. })));
    }
}
