//! Sliding-window object detection with HOG descriptors and a linear SVM.
//!
//! The pipeline loads a positive and a negative image corpus, samples
//! window-sized negative crops, computes descriptors, trains a linear
//! epsilon-SVR, optionally mines hard negatives and retrains, and finally
//! tests the saved detector on images or video with a multi-scale search.

pub mod config;
pub mod corpus;
pub mod dataset;
pub mod descriptor;
pub mod detection;
pub mod error;
pub mod frames;
pub mod mining;
pub mod models;
pub mod pipeline;
pub mod sampling;
pub mod training;
pub mod utils;

pub use config::{RunConfig, TestSource};
pub use error::{Result, TrainError};
pub use models::{Detection, DetectorModel, Selection};
