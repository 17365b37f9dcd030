//! Animated clips loaded from GIF files.

use crate::data::FlowDirection;
use crate::error::RenderError;
use crate::frame::{Frame, HEIGHT, WIDTH};
use crate::sentiment::SentimentBucket;

use image::codecs::gif::GifDecoder;
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, RgbaImage};
use log::debug;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Most frames decoded from one clip.
pub const MAX_CLIP_FRAMES: usize = 20;

/// The animations the appliance shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Clip {
    /// Sentiment gauge for a bucket.
    Mood(SentimentBucket),
    /// Sentiment gauge when there is no value.
    MoodError,
    /// Money flow in a direction.
    MoneyFlow(FlowDirection),
}

impl Clip {
    /// Path of the clip, relative to the asset root.
    pub fn relative_path(self) -> PathBuf {
        let path = match self {
            Self::Mood(SentimentBucket::ExtremeFear) => "feargreed/extremefear_opt.gif",
            Self::Mood(SentimentBucket::Fear) => "feargreed/fear_opt.gif",
            Self::Mood(SentimentBucket::Neutral) => "feargreed/neutral_opt.gif",
            Self::Mood(SentimentBucket::Greed) => "feargreed/greed_opt.gif",
            Self::Mood(SentimentBucket::ExtremeGreed) => "feargreed/extremegreed_opt.gif",
            Self::MoodError => "error.gif",
            Self::MoneyFlow(FlowDirection::Up) => "money_flow/flow_up.gif",
            Self::MoneyFlow(FlowDirection::Down) => "money_flow/flow_down.gif",
            Self::MoneyFlow(FlowDirection::Neutral) => "money_flow/flow_neutral.gif",
        };
        PathBuf::from(path)
    }
}

/// Source of decoded clip frames.
pub trait AnimationStore: Send {
    /// Decode `clip` into panel-sized frames. Never returns an empty list.
    fn load(&self, clip: Clip) -> Result<Vec<Frame>, RenderError>;
}

/// Clips decoded from a directory of GIF files.
#[derive(Debug, Clone)]
pub struct GifLibrary {
    root: PathBuf,
}

impl GifLibrary {
    /// A library rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

/// Convert a decoded RGBA image into a panel frame, resizing if needed.
///
/// Alpha is dropped.
pub fn frame_from_rgba(image: &RgbaImage) -> Frame {
    let resized;
    let image = if image.dimensions() == (WIDTH, HEIGHT) {
        image
    } else {
        resized = imageops::resize(image, WIDTH, HEIGHT, FilterType::Lanczos3);
        &resized
    };
    let bytes: Vec<u8> = image
        .pixels()
        .flat_map(|p| [p.0[0], p.0[1], p.0[2]])
        .collect();
    Frame::from_rgb_bytes(&bytes).unwrap_or_else(Frame::black)
}

impl AnimationStore for GifLibrary {
    fn load(&self, clip: Clip) -> Result<Vec<Frame>, RenderError> {
        let path = self.root.join(clip.relative_path());
        let file = File::open(&path).map_err(|source| RenderError::Asset {
            path: path.clone(),
            source,
        })?;
        let decoder = GifDecoder::new(BufReader::new(file))?;
        let frames = decoder
            .into_frames()
            .take(MAX_CLIP_FRAMES)
            .map(|frame| frame.map(|f| frame_from_rgba(f.buffer())))
            .collect::<Result<Vec<_>, _>>()?;

        if frames.is_empty() {
            return Err(RenderError::EmptyClip(path.display().to_string()));
        }
        debug!("decoded {} frames from {}", frames.len(), path.display());
        Ok(frames)
    }
}
