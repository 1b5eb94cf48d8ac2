//! Capability-specific job parameters.
//!
//! Text-driven jobs arrive as JSON and deserialize straight into their
//! parameter record. Image-driven jobs arrive as `multipart/form-data` and are
//! assembled field by field through [`MultipartForm`].

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::error::CoreError;
use crate::estimation::{self, OutputUnits};

/// Name of the multipart part carrying the input image.
pub const IMAGE_FIELD: &str = "image";

// ---------------------------------------------------------------------------
// Parameter records
// ---------------------------------------------------------------------------

/// A binary image uploaded as part of a multipart job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextToImageParams {
    pub model_id: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_check: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_inference_steps: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_images_per_prompt: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextToVideoParams {
    pub model_id: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_inference_steps: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_check: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageToImageParams {
    pub model_id: String,
    pub image: ImageFile,
    pub prompt: String,
    pub height: Option<i64>,
    pub width: Option<i64>,
    pub strength: Option<f64>,
    pub guidance_scale: Option<f64>,
    pub image_guidance_scale: Option<f64>,
    pub negative_prompt: Option<String>,
    pub safety_check: Option<bool>,
    pub seed: Option<i64>,
    pub num_images_per_prompt: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageToVideoParams {
    pub model_id: String,
    pub image: ImageFile,
    pub height: Option<i64>,
    pub width: Option<i64>,
    pub fps: Option<i64>,
    pub motion_bucket_id: Option<i64>,
    pub noise_aug_strength: Option<f64>,
    pub seed: Option<i64>,
    pub safety_check: Option<bool>,
}

/// Render optional knobs as multipart text fields, skipping unset ones.
macro_rules! push_fields {
    ($out:ident, $params:ident, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$params.$field {
                $out.push((stringify!($field), value.to_string()));
            }
        )+
    };
}

impl ImageToImageParams {
    /// Text fields to send alongside the image part.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut out = vec![("model_id", self.model_id.clone()), ("prompt", self.prompt.clone())];
        let p = self;
        push_fields!(
            out,
            p,
            height,
            width,
            strength,
            guidance_scale,
            image_guidance_scale,
            negative_prompt,
            safety_check,
            seed,
            num_images_per_prompt,
        );
        out
    }
}

impl ImageToVideoParams {
    /// Text fields to send alongside the image part.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut out = vec![("model_id", self.model_id.clone())];
        let p = self;
        push_fields!(
            out,
            p,
            height,
            width,
            fps,
            motion_bucket_id,
            noise_aug_strength,
            seed,
            safety_check,
        );
        out
    }
}

// ---------------------------------------------------------------------------
// Multipart assembly
// ---------------------------------------------------------------------------

/// Collects the parts of a multipart job body.
///
/// Unknown text fields are kept but ignored when the parameters are built.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    image: Option<ImageFile>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn set_image(&mut self, image: ImageFile) {
        self.image = Some(image);
    }

    pub fn into_image_to_image(mut self) -> Result<ImageToImageParams, CoreError> {
        Ok(ImageToImageParams {
            model_id: self.required("model_id")?,
            image: self.take_image()?,
            prompt: self.fields.remove("prompt").unwrap_or_default(),
            height: self.parsed("height")?,
            width: self.parsed("width")?,
            strength: self.parsed("strength")?,
            guidance_scale: self.parsed("guidance_scale")?,
            image_guidance_scale: self.parsed("image_guidance_scale")?,
            negative_prompt: self.fields.remove("negative_prompt"),
            safety_check: self.parsed("safety_check")?,
            seed: self.parsed("seed")?,
            num_images_per_prompt: self.parsed("num_images_per_prompt")?,
        })
    }

    pub fn into_image_to_video(mut self) -> Result<ImageToVideoParams, CoreError> {
        Ok(ImageToVideoParams {
            model_id: self.required("model_id")?,
            image: self.take_image()?,
            height: self.parsed("height")?,
            width: self.parsed("width")?,
            fps: self.parsed("fps")?,
            motion_bucket_id: self.parsed("motion_bucket_id")?,
            noise_aug_strength: self.parsed("noise_aug_strength")?,
            seed: self.parsed("seed")?,
            safety_check: self.parsed("safety_check")?,
        })
    }

    fn required(&mut self, name: &str) -> Result<String, CoreError> {
        self.fields
            .remove(name)
            .ok_or_else(|| CoreError::MalformedBody(format!("missing required field '{name}'")))
    }

    fn take_image(&mut self) -> Result<ImageFile, CoreError> {
        self.image
            .take()
            .ok_or_else(|| CoreError::MalformedBody(format!("missing required part '{IMAGE_FIELD}'")))
    }

    fn parsed<T: FromStr>(&mut self, name: &str) -> Result<Option<T>, CoreError>
    where
        T::Err: std::fmt::Display,
    {
        match self.fields.remove(name) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                CoreError::MalformedBody(format!("field '{name}' has invalid value '{raw}': {e}"))
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// JobRequest
// ---------------------------------------------------------------------------

/// A decoded job, one variant per capability.
#[derive(Debug, Clone, PartialEq)]
pub enum JobRequest {
    TextToImage(TextToImageParams),
    ImageToImage(ImageToImageParams),
    ImageToVideo(ImageToVideoParams),
    TextToVideo(TextToVideoParams),
}

impl JobRequest {
    /// Decode a JSON body for a text-driven capability.
    pub fn from_json(capability: Capability, body: &[u8]) -> Result<Self, CoreError> {
        let malformed = |e: serde_json::Error| CoreError::MalformedBody(e.to_string());
        match capability {
            Capability::TextToImage => serde_json::from_slice(body)
                .map(Self::TextToImage)
                .map_err(malformed),
            Capability::TextToVideo => serde_json::from_slice(body)
                .map(Self::TextToVideo)
                .map_err(malformed),
            Capability::ImageToImage | Capability::ImageToVideo => Err(CoreError::MalformedBody(
                format!("{capability} expects a multipart body"),
            )),
        }
    }

    /// Build an image-driven job from its collected multipart parts.
    pub fn from_multipart(capability: Capability, form: MultipartForm) -> Result<Self, CoreError> {
        match capability {
            Capability::ImageToImage => form.into_image_to_image().map(Self::ImageToImage),
            Capability::ImageToVideo => form.into_image_to_video().map(Self::ImageToVideo),
            Capability::TextToImage | Capability::TextToVideo => Err(CoreError::MalformedBody(
                format!("{capability} expects a JSON body"),
            )),
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            Self::TextToImage(_) => Capability::TextToImage,
            Self::ImageToImage(_) => Capability::ImageToImage,
            Self::ImageToVideo(_) => Capability::ImageToVideo,
            Self::TextToVideo(_) => Capability::TextToVideo,
        }
    }

    pub fn model_id(&self) -> &str {
        match self {
            Self::TextToImage(p) => &p.model_id,
            Self::ImageToImage(p) => &p.model_id,
            Self::ImageToVideo(p) => &p.model_id,
            Self::TextToVideo(p) => &p.model_id,
        }
    }

    /// Estimate the billable output volume of this job.
    ///
    /// Image-to-image output mirrors the input image, whose header is decoded
    /// to recover its size; declared dimensions still take precedence.
    pub fn output_units(&self) -> Result<OutputUnits, CoreError> {
        let defaults = self.capability().output_defaults();
        match self {
            Self::TextToImage(p) => estimation::estimate_output(p.height, p.width, defaults),
            Self::TextToVideo(p) => estimation::estimate_output(p.height, p.width, defaults),
            Self::ImageToVideo(p) => estimation::estimate_output(p.height, p.width, defaults),
            Self::ImageToImage(p) => {
                let (width, height) = estimation::image_dimensions(&p.image.bytes)?;
                estimation::estimate_output(
                    p.height.or(Some(i64::from(height))),
                    p.width.or(Some(i64::from(width))),
                    defaults,
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
