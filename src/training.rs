use log::info;
use opencv::prelude::*;
use opencv::{core, ml};

use crate::dataset::TrainingSet;
use crate::error::{Result, TrainError};
use crate::models::DetectorModel;

/// Soft-margin constant.
pub const SVM_C: f64 = 0.01;
/// Width of the epsilon-insensitive loss tube.
pub const SVM_P: f64 = 0.1;
pub const MAX_ITERATIONS: i32 = 1000;
pub const TOLERANCE: f64 = 1e-3;

/// Linear epsilon-SVR used as a two-class discriminator.
pub struct ModelTrainer {
    svm: core::Ptr<ml::SVM>,
    trained: bool,
}

impl ModelTrainer {
    pub fn new() -> Result<Self> {
        let mut svm = ml::SVM::create()?;
        svm.set_coef0(0.0)?;
        svm.set_degree(3.0)?;
        svm.set_term_criteria(core::TermCriteria::new(
            core::TermCriteria_Type::COUNT as i32 + core::TermCriteria_Type::EPS as i32,
            MAX_ITERATIONS,
            TOLERANCE,
        )?)?;
        svm.set_gamma(0.0)?;
        svm.set_kernel(ml::SVM_KernelTypes::LINEAR as i32)?;
        svm.set_nu(0.5)?;
        svm.set_p(SVM_P)?;
        svm.set_c(SVM_C)?;
        svm.set_type(ml::SVM_Types::EPS_SVR as i32)?;

        Ok(ModelTrainer { svm, trained: false })
    }

    /// Fit on `set`, replacing any previous fit.
    pub fn train(&mut self, set: &TrainingSet) -> Result<()> {
        info!(
            "Training SVM on {} samples ({} positive, {} negative)...",
            set.len(),
            set.positive_count,
            set.negative_count
        );
        self.trained = false;
        if !self.svm.train(&set.samples, ml::ROW_SAMPLE, &set.labels)? {
            return Err(TrainError::DegenerateClassifier("training did not complete".into()));
        }
        self.trained = true;
        Ok(())
    }

    /// Feature weights and bias of the linear decision function.
    ///
    /// A linear fit collapses to one support vector with a unit coefficient;
    /// anything else means the solver degenerated.
    pub fn decision_function(&self) -> Result<(Vec<f32>, f32)> {
        if !self.trained {
            return Err(TrainError::Untrained);
        }

        let sv = self.svm.get_support_vectors()?;
        let mut alpha = Mat::default();
        let mut svidx = Mat::default();
        let rho = self.svm.get_decision_function(0, &mut alpha, &mut svidx)?;

        let alpha_count = alpha.rows() * alpha.cols();
        let index_count = svidx.rows() * svidx.cols();
        if sv.rows() != 1 || alpha_count != 1 || index_count != 1 {
            return Err(TrainError::DegenerateClassifier(format!(
                "{} support vectors, {} coefficients",
                sv.rows(),
                alpha_count
            )));
        }

        let coefficient = match alpha.typ() {
            core::CV_64F => *alpha.at::<f64>(0)?,
            core::CV_32F => f64::from(*alpha.at::<f32>(0)?),
            other => {
                return Err(TrainError::DegenerateClassifier(format!(
                    "unexpected coefficient type {}",
                    other
                )))
            }
        };
        if coefficient != 1.0 {
            return Err(TrainError::DegenerateClassifier(format!(
                "support vector coefficient is {}",
                coefficient
            )));
        }
        if sv.typ() != core::CV_32F {
            return Err(TrainError::DegenerateClassifier("support vectors are not 32-bit floats".into()));
        }

        let weights = sv.at_row::<f32>(0)?.to_vec();
        Ok((weights, -rho as f32))
    }

    pub fn extract_detector(&self, window: core::Size) -> Result<DetectorModel> {
        let (weights, bias) = self.decision_function()?;
        Ok(DetectorModel::new(window, weights, bias))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn pattern(dims: usize, phase: usize) -> Vec<f32> {
        (0..dims).map(|d| if d % 2 == phase { 1.0 } else { 0.0 }).collect()
    }

    /// Two well-separated noisy clusters in `dims` dimensions.
    fn clusters(dims: usize, per_class: usize) -> TrainingSet {
        let mut rng = StdRng::seed_from_u64(11);
        let mut jitter = |base: Vec<f32>| -> Vec<f32> {
            base.into_iter().map(|v| v + rng.gen_range(-0.05f32..0.05f32)).collect()
        };
        let positives: Vec<Vec<f32>> = (0..per_class).map(|_| jitter(pattern(dims, 0))).collect();
        let negatives: Vec<Vec<f32>> = (0..per_class).map(|_| jitter(pattern(dims, 1))).collect();
        TrainingSet::assemble(&positives, &negatives, dims).unwrap()
    }

    #[test]
    fn untrained_has_no_detector() {
        let trainer = ModelTrainer::new().unwrap();
        assert!(matches!(
            trainer.extract_detector(core::Size::new(64, 64)),
            Err(TrainError::Untrained)
        ));
    }

    #[test]
    fn linear_fit_yields_weights_plus_bias() {
        let set = clusters(20, 30);
        let mut trainer = ModelTrainer::new().unwrap();
        trainer.train(&set).unwrap();

        let model = trainer.extract_detector(core::Size::new(16, 16)).unwrap();
        assert_eq!(model.weights.len(), 21);
        assert_eq!(model.descriptor_len(), 20);
    }

    #[test]
    fn detector_separates_training_clusters() {
        let set = clusters(20, 30);
        let mut trainer = ModelTrainer::new().unwrap();
        trainer.train(&set).unwrap();
        let model = trainer.extract_detector(core::Size::new(16, 16)).unwrap();

        assert!(model.score(&pattern(20, 0)) > model.score(&pattern(20, 1)));
    }

    #[test]
    fn retraining_replaces_previous_fit() {
        let mut trainer = ModelTrainer::new().unwrap();
        trainer.train(&clusters(10, 20)).unwrap();
        let first = trainer.extract_detector(core::Size::new(16, 16)).unwrap();

        trainer.train(&clusters(12, 20)).unwrap();
        let second = trainer.extract_detector(core::Size::new(16, 16)).unwrap();
        assert_eq!(first.weights.len(), 11);
        assert_eq!(second.weights.len(), 13);
    }
}
