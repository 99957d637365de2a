use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use opencv::prelude::*;
use opencv::{core, highgui, imgcodecs, videoio};

use crate::config::TestSource;
use crate::corpus::{list_image_files, read_image};
use crate::error::{Result, TrainError};
use crate::utils::scale_for_display;

/// One frame of a test stream.
pub struct Frame {
    pub name: String,
    pub image: Mat,
}

/// Where the tester pulls frames from.
pub trait FrameSource {
    /// `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Live streams are paced and can be cancelled from the keyboard.
    fn is_live(&self) -> bool;
}

/// Where annotated frames go. Returns the key pressed while emitting, if any.
pub trait FrameSink {
    fn emit(&mut self, frame: &Frame, wait_ms: i32) -> Result<Option<i32>>;
}

/// Images of a directory, decoded lazily in sorted order.
pub struct ImageFileSource {
    files: std::vec::IntoIter<PathBuf>,
}

impl ImageFileSource {
    pub fn open(dir: &Path) -> Result<Self> {
        let files = list_image_files(dir)?;
        info!("testing on {} image files from {}", files.len(), dir.display());
        Ok(ImageFileSource { files: files.into_iter() })
    }
}

impl FrameSource for ImageFileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        for path in self.files.by_ref() {
            match read_image(&path)? {
                Some(image) => {
                    let name = path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    return Ok(Some(Frame { name, image }));
                }
                None => warn!("{} is invalid!", path.display()),
            }
        }
        Ok(None)
    }

    fn is_live(&self) -> bool {
        false
    }
}

/// A video file or camera device.
pub struct VideoSource {
    capture: videoio::VideoCapture,
    index: usize,
}

impl VideoSource {
    pub fn open_camera(device: i32) -> Result<Self> {
        let capture = videoio::VideoCapture::new(device, videoio::CAP_ANY)?;
        Self::from_capture(capture, &format!("camera {}", device))
    }

    pub fn open_file(path: &str) -> Result<Self> {
        let capture = videoio::VideoCapture::from_file(path, videoio::CAP_ANY)?;
        Self::from_capture(capture, path)
    }

    fn from_capture(capture: videoio::VideoCapture, label: &str) -> Result<Self> {
        if !capture.is_opened()? {
            return Err(TrainError::VideoOpen(label.to_string()));
        }
        info!("testing on video source {}", label);
        Ok(VideoSource { capture, index: 0 })
    }
}

impl FrameSource for VideoSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut image = Mat::default();
        if !self.capture.read(&mut image)? || image.empty() {
            return Ok(None);
        }
        self.index += 1;
        Ok(Some(Frame {
            name: format!("frame_{:06}", self.index),
            image,
        }))
    }

    fn is_live(&self) -> bool {
        true
    }
}

pub fn open_source(source: &TestSource) -> Result<Box<dyn FrameSource>> {
    Ok(match source {
        TestSource::Files(dir) => Box::new(ImageFileSource::open(dir)?),
        TestSource::Camera(device) => Box::new(VideoSource::open_camera(*device)?),
        TestSource::Video(path) => Box::new(VideoSource::open_file(path)?),
    })
}

/// A resizable highgui window.
pub struct DisplayWindow {
    title: String,
}

impl DisplayWindow {
    pub fn new(title: &str) -> Result<Self> {
        highgui::named_window(title, highgui::WINDOW_NORMAL)?;
        Ok(DisplayWindow { title: title.to_string() })
    }
}

impl FrameSink for DisplayWindow {
    fn emit(&mut self, frame: &Frame, wait_ms: i32) -> Result<Option<i32>> {
        let scaled = scale_for_display(&frame.image)?;
        highgui::imshow(&self.title, &scaled)?;
        let key = highgui::wait_key(wait_ms)?;
        Ok((key >= 0).then_some(key))
    }
}

impl Drop for DisplayWindow {
    fn drop(&mut self) {
        let _ = highgui::destroy_window(&self.title);
    }
}

/// Writes `result_<NNN>_<name>.png` files into a directory.
pub struct AnnotatedFileWriter {
    dir: PathBuf,
    written: usize,
}

impl AnnotatedFileWriter {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| TrainError::io(dir, e))?;
        Ok(AnnotatedFileWriter {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl FrameSink for AnnotatedFileWriter {
    fn emit(&mut self, frame: &Frame, _wait_ms: i32) -> Result<Option<i32>> {
        let output = self.dir.join(format!("result_{:03}_{}.png", self.written + 1, frame.name));
        imgcodecs::imwrite(&output.to_string_lossy(), &frame.image, &core::Vector::<i32>::new())?;
        self.written += 1;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_png(path: &Path) {
        let img = Mat::zeros(12, 12, core::CV_8UC3).unwrap().to_mat().unwrap();
        imgcodecs::imwrite(&path.to_string_lossy(), &img, &core::Vector::<i32>::new()).unwrap();
    }

    #[test]
    fn file_source_skips_unreadable_and_ends() {
        let dir = tempdir().unwrap();
        write_png(&dir.path().join("a.png"));
        fs::write(dir.path().join("b.png"), b"broken").unwrap();
        write_png(&dir.path().join("c.png"));

        let mut source = ImageFileSource::open(dir.path()).unwrap();
        assert!(!source.is_live());
        let names: Vec<String> = std::iter::from_fn(|| source.next_frame().unwrap())
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["a", "c"]);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn writer_numbers_outputs() {
        let dir = tempdir().unwrap();
        let mut writer = AnnotatedFileWriter::new(&dir.path().join("out")).unwrap();
        let frame = Frame {
            name: "street".into(),
            image: Mat::zeros(10, 10, core::CV_8UC3).unwrap().to_mat().unwrap(),
        };
        writer.emit(&frame, 0).unwrap();
        writer.emit(&frame, 0).unwrap();

        assert_eq!(writer.written(), 2);
        assert!(dir.path().join("out/result_001_street.png").is_file());
        assert!(dir.path().join("out/result_002_street.png").is_file());
    }

    #[test]
    fn missing_video_fails_to_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.avi");
        let result = VideoSource::open_file(&path.to_string_lossy());
        assert!(matches!(result, Err(TrainError::VideoOpen(_)) | Err(TrainError::OpenCv(_))));
    }
}
