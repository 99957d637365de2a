use std::path::Path;

use log::{debug, info};
use opencv::objdetect::HOGDescriptor;
use opencv::prelude::*;
use opencv::{core, imgproc};

use crate::error::Result;
use crate::frames::{FrameSink, FrameSource};
use crate::models::{DetectorModel, Detection, Selection};
use crate::utils::fits_window;

/// Best detections at or below this confidence are rejected.
pub const ACCEPT_THRESHOLD: f64 = 0.1;
/// Detections this close to the maximum count as tied with it.
pub const TIE_EPSILON: f64 = 1e-9;
pub const ESC_KEY: i32 = 27;
/// Per-frame key poll; never blocks, so file streams run straight through.
pub const FRAME_WAIT_MS: i32 = 1;

const PYRAMID_SCALE: f64 = 1.05;
const GROUP_THRESHOLD: f64 = 2.0;

/// Multi-scale sliding-window search with a trained linear detector.
pub struct MultiScaleDetector {
    hog: HOGDescriptor,
    window: core::Size,
}

impl MultiScaleDetector {
    pub fn new(model: &DetectorModel) -> Result<Self> {
        Ok(MultiScaleDetector {
            hog: model.to_hog()?,
            window: model.window,
        })
    }

    pub fn window(&self) -> core::Size {
        self.window
    }

    /// Detections in frame coordinates; empty for frames smaller than the window.
    pub fn detect(&self, frame: &Mat) -> Result<Vec<Detection>> {
        if !fits_window(frame, self.window) {
            return Ok(Vec::new());
        }

        let mut regions = core::Vector::<core::Rect>::new();
        let mut weights = core::Vector::<f64>::new();
        self.hog.detect_multi_scale_weights(
            frame,
            &mut regions,
            &mut weights,
            0.0,
            core::Size::new(0, 0),
            core::Size::new(0, 0),
            PYRAMID_SCALE,
            GROUP_THRESHOLD,
            false,
        )?;

        Ok(regions
            .iter()
            .zip(weights.iter())
            .map(|(region, confidence)| Detection { region, confidence })
            .collect())
    }
}

/// Keep the detections tied at the maximum confidence if that maximum is accepted.
pub fn select_best(detections: &[Detection]) -> Selection {
    let Some(best) = detections.iter().map(|d| d.confidence).reduce(f64::max) else {
        return Selection::Rejected { best: None };
    };
    if best <= ACCEPT_THRESHOLD {
        return Selection::Rejected { best: Some(best) };
    }
    Selection::Accepted(
        detections
            .iter()
            .filter(|d| best - d.confidence <= TIE_EPSILON)
            .copied()
            .collect(),
    )
}

/// Green intensity for a box, growing with the squared confidence.
pub fn box_color(confidence: f64) -> core::Scalar {
    core::Scalar::new(0.0, (confidence * confidence * 200.0).min(255.0), 0.0, 0.0)
}

/// Draw accepted boxes with their confidence, or the rejection marker.
pub fn annotate(image: &mut Mat, selection: &Selection) -> Result<()> {
    match selection {
        Selection::Accepted(best) => {
            let thickness = image.cols() / 400 + 1;
            for detection in best {
                imgproc::put_text(image, &format!("{:.6}", detection.confidence),
                    detection.region.tl(),
                    imgproc::FONT_HERSHEY_PLAIN, 2.0,
                    core::Scalar::new(255.0, 0.0, 0.0, 0.0), 1, imgproc::LINE_8, false)?;
                imgproc::rectangle(image, detection.region, box_color(detection.confidence),
                    thickness, imgproc::LINE_8, 0)?;
            }
        }
        Selection::Rejected { .. } => {
            imgproc::put_text(image, "[!]",
                core::Point::new(0, image.cols() / 4),
                imgproc::FONT_HERSHEY_DUPLEX, 5.0,
                core::Scalar::new(0.0, 0.0, 255.0, 0.0), 1, imgproc::LINE_8, false)?;
        }
    }
    Ok(())
}

/// Totals of one pass of the tester over a frame stream.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TestSummary {
    pub frames: usize,
    pub accepted: usize,
    pub cancelled: bool,
}

/// Runs a saved detector over a stream of frames and emits annotated frames.
pub struct DetectorTester {
    detector: MultiScaleDetector,
}

impl DetectorTester {
    pub fn new(model: &DetectorModel) -> Result<Self> {
        Ok(DetectorTester {
            detector: MultiScaleDetector::new(model)?,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Testing trained detector {}...", path.display());
        Self::new(&DetectorModel::load(path)?)
    }

    /// Detect, select and annotate one frame in place.
    pub fn process_frame(&self, image: &mut Mat) -> Result<Selection> {
        let detections = self.detector.detect(image)?;
        let selection = select_best(&detections);
        debug!("{} detections, selection: {:?}", detections.len(), selection);
        annotate(image, &selection)?;
        Ok(selection)
    }

    /// Loop until the source is exhausted or a live stream is cancelled with ESC.
    pub fn run(&self, source: &mut dyn FrameSource, sinks: &mut [Box<dyn FrameSink>]) -> Result<TestSummary> {
        let mut summary = TestSummary::default();

        while let Some(mut frame) = source.next_frame()? {
            let selection = self.process_frame(&mut frame.image)?;
            summary.frames += 1;
            if selection.is_accepted() {
                summary.accepted += 1;
            }

            let mut cancel = false;
            for sink in sinks.iter_mut() {
                if sink.emit(&frame, FRAME_WAIT_MS)? == Some(ESC_KEY) && source.is_live() {
                    cancel = true;
                }
            }
            if cancel {
                summary.cancelled = true;
                break;
            }
        }

        info!("tested {} frames, {} with an accepted detection", summary.frames, summary.accepted);
        Ok(summary)
    }
}
