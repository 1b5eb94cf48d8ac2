//! Capability descriptors for the AI job classes this orchestrator serves.
//!
//! A [`Capability`] is the unit of routing (one HTTP endpoint each) and, with
//! the model identifier, the unit of price locking. Its wire ordinal is part
//! of every session key, so the numeric values below must never change.

use std::fmt;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of frames produced by the stable-video-diffusion family of models.
///
/// Not caller-configurable; every video job is billed for this many frames.
pub const FRAMES_PER_VIDEO: u64 = 25;

/// Default output height for text-to-image jobs.
pub const DEFAULT_IMAGE_HEIGHT: u64 = 512;
/// Default output width for text-to-image jobs.
pub const DEFAULT_IMAGE_WIDTH: u64 = 512;

/// Default output height for video jobs.
pub const DEFAULT_VIDEO_HEIGHT: u64 = 576;
/// Default output width for video jobs.
pub const DEFAULT_VIDEO_WIDTH: u64 = 1024;

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// A supported job class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    TextToImage,
    ImageToImage,
    ImageToVideo,
    TextToVideo,
}

/// How the request body for a capability is encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    /// A single JSON document.
    Json,
    /// A `multipart/form-data` payload carrying an `image` part.
    Multipart,
}

/// Output dimensions assumed when a request does not declare its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputDefaults {
    /// `None` when the dimensions come from the input image instead.
    pub height: Option<u64>,
    /// `None` when the dimensions come from the input image instead.
    pub width: Option<u64>,
    pub frames: u64,
}

impl Capability {
    /// Every capability, in ordinal order.
    pub const ALL: [Capability; 4] = [
        Capability::TextToImage,
        Capability::ImageToImage,
        Capability::ImageToVideo,
        Capability::TextToVideo,
    ];

    /// Stable numeric tag shared with the rest of the network.
    pub fn ordinal(self) -> u32 {
        match self {
            Self::TextToImage => 27,
            Self::ImageToImage => 28,
            Self::ImageToVideo => 29,
            Self::TextToVideo => 30,
        }
    }

    /// Path segment of the endpoint that accepts this capability.
    pub fn selector(self) -> &'static str {
        match self {
            Self::TextToImage => "text-to-image",
            Self::ImageToImage => "image-to-image",
            Self::ImageToVideo => "image-to-video",
            Self::TextToVideo => "text-to-video",
        }
    }

    /// Resolve an endpoint path segment to its capability.
    pub fn from_selector(selector: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cap| cap.selector() == selector)
    }

    pub fn body_encoding(self) -> BodyEncoding {
        match self {
            Self::TextToImage | Self::TextToVideo => BodyEncoding::Json,
            Self::ImageToImage | Self::ImageToVideo => BodyEncoding::Multipart,
        }
    }

    /// Billing defaults for this capability.
    pub fn output_defaults(self) -> OutputDefaults {
        match self {
            Self::TextToImage => OutputDefaults {
                height: Some(DEFAULT_IMAGE_HEIGHT),
                width: Some(DEFAULT_IMAGE_WIDTH),
                frames: 1,
            },
            Self::ImageToImage => OutputDefaults {
                height: None,
                width: None,
                frames: 1,
            },
            Self::ImageToVideo | Self::TextToVideo => OutputDefaults {
                height: Some(DEFAULT_VIDEO_HEIGHT),
                width: Some(DEFAULT_VIDEO_WIDTH),
                frames: FRAMES_PER_VIDEO,
            },
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TextToImage => "TextToImage",
            Self::ImageToImage => "ImageToImage",
            Self::ImageToVideo => "ImageToVideo",
            Self::TextToVideo => "TextToVideo",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
