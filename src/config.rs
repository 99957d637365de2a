//! Command-line configuration for a training and/or testing run.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use log::LevelFilter;

use crate::descriptor::CELL_SIZE;
use crate::error::{Result, TrainError};

/// Train a HOG + linear SVM sliding-window detector and test it on images or video.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about)]
pub struct RunConfig {
    /// Detector window width; 0 infers it from the positive images.
    #[arg(long, visible_alias = "dw", default_value_t = 0)]
    pub detector_width: i32,

    /// Detector window height; 0 infers it from the positive images.
    #[arg(long, visible_alias = "dh", default_value_t = 0)]
    pub detector_height: i32,

    /// Directory of positive samples.
    #[arg(long, visible_alias = "pd")]
    pub positive_dir: Option<PathBuf>,

    /// Directory of full-size negative images.
    #[arg(long, visible_alias = "nd")]
    pub negative_dir: Option<PathBuf>,

    /// Directory of images to test the detector on.
    #[arg(long, visible_alias = "td", default_value = ".")]
    pub test_source_dir: PathBuf,

    /// Where the trained detector is written (and read in test-only mode).
    #[arg(long, visible_alias = "fn", default_value = "my_detector.yml")]
    pub output_model_path: PathBuf,

    /// Video file to test on, or a single digit selecting a camera.
    #[arg(long, visible_alias = "tv", default_value = "")]
    pub video_or_camera_source: String,

    /// Skip training and test an existing detector.
    #[arg(short = 't', long, action = ArgAction::SetTrue)]
    pub test_only: bool,

    /// Show images and hard-negative boxes while training.
    #[arg(short = 'v', long, action = ArgAction::SetTrue)]
    pub visualize_training: bool,

    /// Add horizontally mirrored samples.
    #[arg(short = 'f', long, action = ArgAction::SetTrue)]
    pub flip_augmentation: bool,

    /// Mine hard negatives with the first detector and train again.
    #[arg(short = 'd', long, action = ArgAction::SetTrue)]
    pub retrain_with_hard_negatives: bool,

    /// Seed for negative sampling; random per run when absent.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Never open display windows.
    #[arg(long, action = ArgAction::SetTrue)]
    pub headless: bool,

    /// Write annotated test frames into this directory.
    #[arg(long)]
    pub annotate_dir: Option<PathBuf>,

    /// Default log level when RUST_LOG is not set (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,
}

/// Where test frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestSource {
    Files(PathBuf),
    Camera(i32),
    Video(String),
}

impl RunConfig {
    /// Options for a run with every flag off and no corpus directories.
    pub fn with_defaults() -> Self {
        RunConfig {
            detector_width: 0,
            detector_height: 0,
            positive_dir: None,
            negative_dir: None,
            test_source_dir: PathBuf::from("."),
            output_model_path: PathBuf::from("my_detector.yml"),
            video_or_camera_source: String::new(),
            test_only: false,
            visualize_training: false,
            flip_augmentation: false,
            retrain_with_hard_negatives: false,
            seed: None,
            headless: false,
            annotate_dir: None,
            log_level: LevelFilter::Info,
        }
    }

    /// True when both window dimensions were given explicitly.
    pub fn has_explicit_window(&self) -> bool {
        self.detector_width != 0 && self.detector_height != 0
    }

    pub fn validate(&self) -> Result<()> {
        if self.has_explicit_window() {
            let valid = |side: i32| side >= 2 * CELL_SIZE && side % CELL_SIZE == 0;
            if !valid(self.detector_width) || !valid(self.detector_height) {
                return Err(TrainError::InvalidWindow {
                    width: self.detector_width,
                    height: self.detector_height,
                });
            }
        }
        Ok(())
    }

    pub fn test_source(&self) -> TestSource {
        let video = self.video_or_camera_source.as_str();
        match video.as_bytes() {
            [] => TestSource::Files(self.test_source_dir.clone()),
            [digit] if digit.is_ascii_digit() => TestSource::Camera(i32::from(digit - b'0')),
            _ => TestSource::Video(video.to_string()),
        }
    }

    pub fn shows_windows(&self) -> bool {
        !self.headless
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> RunConfig {
        RunConfig::try_parse_from(std::iter::once("hog-trainer").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_are_inferred_window_and_cwd() {
        let config = parse(&[]);
        assert_eq!(config.detector_width, 0);
        assert_eq!(config.output_model_path, PathBuf::from("my_detector.yml"));
        assert_eq!(config.test_source(), TestSource::Files(PathBuf::from(".")));
        assert!(!config.test_only && !config.flip_augmentation);
    }

    #[test]
    fn short_aliases_are_accepted() {
        let config = parse(&["--dw", "64", "--dh", "128", "--pd", "pos", "--nd", "neg", "-f", "-d"]);
        assert_eq!((config.detector_width, config.detector_height), (64, 128));
        assert_eq!(config.positive_dir, Some(PathBuf::from("pos")));
        assert!(config.flip_augmentation && config.retrain_with_hard_negatives);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn single_digit_selects_camera() {
        let config = parse(&["--tv", "2"]);
        assert_eq!(config.test_source(), TestSource::Camera(2));
        let config = parse(&["--tv", "12"]);
        assert_eq!(config.test_source(), TestSource::Video("12".into()));
        let config = parse(&["--tv", "clip.avi"]);
        assert_eq!(config.test_source(), TestSource::Video("clip.avi".into()));
    }

    #[test]
    fn window_must_be_cell_aligned() {
        let config = parse(&["--dw", "60", "--dh", "64"]);
        assert!(matches!(config.validate(), Err(TrainError::InvalidWindow { .. })));
        let config = parse(&["--dw", "8", "--dh", "64"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn half_specified_window_is_inferred() {
        let config = parse(&["--dw", "60"]);
        assert!(!config.has_explicit_window());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn log_level_parses() {
        assert_eq!(parse(&["--log-level", "debug"]).log_level, LevelFilter::Debug);
    }
}
