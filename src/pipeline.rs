use std::path::{Path, PathBuf};

use log::info;
use opencv::core;
use opencv::prelude::*;

use crate::config::RunConfig;
use crate::corpus::{load_images, load_images_with_paths};
use crate::dataset::TrainingSet;
use crate::descriptor::{flatten, DescriptorExtractor, CELL_SIZE};
use crate::detection::{DetectorTester, MultiScaleDetector, TestSummary};
use crate::error::{Result, TrainError};
use crate::frames::{open_source, AnnotatedFileWriter, DisplayWindow, FrameSink};
use crate::mining::HardNegativeMiner;
use crate::models::DetectorModel;
use crate::sampling::NegativeSampler;
use crate::training::ModelTrainer;

/// What a training run produced.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: DetectorModel,
    pub positive_count: usize,
    pub negative_count: usize,
    /// Hard negatives added before the second fit, when mining ran.
    pub hard_negatives: Option<usize>,
}

/// Train (unless test-only), save, reload and test.
pub fn run(config: &RunConfig) -> Result<Option<TrainingOutcome>> {
    config.validate()?;
    if config.test_only {
        test_detector(config, &config.output_model_path)?;
        return Ok(None);
    }

    let outcome = train_detector(config)?;
    outcome.model.save(&config.output_model_path)?;
    info!("detector saved to {}", config.output_model_path.display());

    test_detector(config, &config.output_model_path)?;
    Ok(Some(outcome))
}

/// Explicit size when both sides are given, otherwise the common size of the
/// positives rounded down to whole cells.
pub fn resolve_window_size(
    config: &RunConfig,
    positives: &[(PathBuf, Mat)],
    positive_dir: &Path,
) -> Result<core::Size> {
    if config.has_explicit_window() {
        return Ok(core::Size::new(config.detector_width, config.detector_height));
    }

    let (_, first) = positives.first().ok_or_else(|| TrainError::EmptyCorpus(positive_dir.to_path_buf()))?;
    let (width, height) = (first.cols(), first.rows());
    if let Some((path, odd)) = positives.iter().find(|(_, p)| p.cols() != width || p.rows() != height) {
        return Err(TrainError::InconsistentPositiveSize {
            path: path.clone(),
            expected_width: width,
            expected_height: height,
            width: odd.cols(),
            height: odd.rows(),
        });
    }

    let window = core::Size::new(width / CELL_SIZE * CELL_SIZE, height / CELL_SIZE * CELL_SIZE);
    if window.width < 2 * CELL_SIZE || window.height < 2 * CELL_SIZE {
        return Err(TrainError::InvalidWindow {
            width: window.width,
            height: window.height,
        });
    }
    Ok(window)
}

/// Descriptors of both classes, labelled by the counts actually extracted.
fn build_training_set(extractor: &DescriptorExtractor, positives: &[Mat], negatives: &[Mat]) -> Result<TrainingSet> {
    let window = extractor.window();

    info!("Histogram of Gradients are being calculated for positive images...");
    let positive_vectors = flatten(extractor.extract_all(positives)?);
    info!("...[done] ( positive count : {} )", positive_vectors.len());
    if positive_vectors.is_empty() {
        return Err(TrainError::NoPositiveSamples {
            width: window.width,
            height: window.height,
        });
    }

    info!("Histogram of Gradients are being calculated for negative images...");
    let negative_vectors = flatten(extractor.extract_all(negatives)?);
    info!("...[done] ( negative count : {} )", negative_vectors.len());
    if negative_vectors.is_empty() {
        return Err(TrainError::NoNegativeSamples {
            width: window.width,
            height: window.height,
        });
    }

    TrainingSet::assemble(&positive_vectors, &negative_vectors, extractor.descriptor_len()?)
}

/// Load, sample, extract and train; optionally mine hard negatives and train again.
pub fn train_detector(config: &RunConfig) -> Result<TrainingOutcome> {
    let (Some(positive_dir), Some(negative_dir)) = (&config.positive_dir, &config.negative_dir) else {
        return Err(TrainError::MissingCorpusDir);
    };
    let visualize = config.visualize_training && config.shows_windows();

    info!("Positive images are being loaded...");
    let loaded = load_images_with_paths(positive_dir, visualize)?;
    if loaded.is_empty() {
        return Err(TrainError::EmptyCorpus(positive_dir.clone()));
    }
    info!("...[done] ( {} images )", loaded.len());

    let window = resolve_window_size(config, &loaded, positive_dir)?;
    let positives: Vec<Mat> = loaded.into_iter().map(|(_, img)| img).collect();
    info!("detection window: {}x{}", window.width, window.height);

    info!("Negative images are being loaded...");
    let full_negatives = load_images(negative_dir, false)?;
    let mut sampler = NegativeSampler::new(config.seed);
    let negatives = sampler.sample(&full_negatives, window)?;
    info!(
        "...[done] ( {} crops from {} images, seed {} )",
        negatives.len(),
        full_negatives.len(),
        sampler.seed()
    );

    let extractor = DescriptorExtractor::new(window, config.flip_augmentation)?;
    let mut set = build_training_set(&extractor, &positives, &negatives)?;

    let mut trainer = ModelTrainer::new()?;
    trainer.train(&set)?;
    info!("...[done]");

    let mut hard_negatives = None;
    if config.retrain_with_hard_negatives {
        let first = MultiScaleDetector::new(&trainer.extract_detector(window)?)?;
        let retrain = HardNegativeRetrain {
            extractor: &extractor,
            miner: HardNegativeMiner::new(visualize),
            positives: &positives,
            full_negatives: &full_negatives,
        };
        let (harvested, retrained) = retrain.run(&mut trainer, &first, negatives)?;
        hard_negatives = Some(harvested);
        set = retrained;
    }

    Ok(TrainingOutcome {
        model: trainer.extract_detector(window)?,
        positive_count: set.positive_count,
        negative_count: set.negative_count,
        hard_negatives,
    })
}

/// Second training round: false positives of a first detector become extra negatives.
pub struct HardNegativeRetrain<'a> {
    pub extractor: &'a DescriptorExtractor,
    pub miner: HardNegativeMiner,
    pub positives: &'a [Mat],
    /// Full-size negative images searched for false positives.
    pub full_negatives: &'a [Mat],
}

impl HardNegativeRetrain<'_> {
    /// Harvest with `first`, append to `negatives` and refit `trainer` once.
    /// Returns the harvest size and the enlarged training set.
    pub fn run(
        &self,
        trainer: &mut ModelTrainer,
        first: &MultiScaleDetector,
        mut negatives: Vec<Mat>,
    ) -> Result<(usize, TrainingSet)> {
        let harvested = self.miner.harvest(first, self.full_negatives)?;
        let count = harvested.len();
        negatives.extend(harvested);

        let set = build_training_set(self.extractor, self.positives, &negatives)?;
        info!("Training SVM again...");
        trainer.train(&set)?;
        info!("...[done]");
        Ok((count, set))
    }
}

/// Reload the detector at `model_path` and run it over the configured test source.
pub fn test_detector(config: &RunConfig, model_path: &Path) -> Result<TestSummary> {
    let tester = DetectorTester::from_file(model_path)?;
    let mut source = open_source(&config.test_source())?;

    let mut sinks: Vec<Box<dyn FrameSink>> = Vec::new();
    if config.shows_windows() {
        sinks.push(Box::new(DisplayWindow::new(&format!("testing {}", model_path.display()))?));
    }
    if let Some(dir) = &config.annotate_dir {
        sinks.push(Box::new(AnnotatedFileWriter::new(dir)?));
    }

    tester.run(source.as_mut(), &mut sinks)
}
