//! Output-size estimation for usage billing.
//!
//! A job is billed by the volume of output it produces, measured in pixels
//! (times frames for video). The estimate is computed from the declared
//! request dimensions, the capability defaults, or the intrinsic size of the
//! input image, and never from the compute backend's actual work.

use std::io::Cursor;

use image::ImageReader;

use crate::capability::OutputDefaults;
use crate::error::CoreError;

/// Estimated billable output volume (pixels x frames).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct OutputUnits(pub u64);

impl OutputUnits {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for OutputUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolve one declared dimension against its default.
///
/// Declared values win. A declared value must be positive.
fn resolve_dimension(
    name: &str,
    declared: Option<i64>,
    default: Option<u64>,
) -> Result<u64, CoreError> {
    match (declared, default) {
        (Some(value), _) if value > 0 => Ok(value as u64),
        (Some(value), _) => Err(CoreError::MalformedBody(format!(
            "{name} must be positive, got {value}"
        ))),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(CoreError::MalformedBody(format!(
            "{name} is required for this request type"
        ))),
    }
}

/// Compute output units from declared dimensions and capability defaults.
pub fn estimate_output(
    height: Option<i64>,
    width: Option<i64>,
    defaults: OutputDefaults,
) -> Result<OutputUnits, CoreError> {
    let height = resolve_dimension("height", height, defaults.height)?;
    let width = resolve_dimension("width", width, defaults.width)?;
    checked_units(height, width, defaults.frames)
}

/// Read `(width, height)` from an encoded image without decoding pixel data.
pub fn image_dimensions(image: &[u8]) -> Result<(u32, u32), CoreError> {
    let reader = ImageReader::new(Cursor::new(image))
        .with_guessed_format()
        .map_err(|e| CoreError::MalformedBody(format!("image: {e}")))?;

    reader
        .into_dimensions()
        .map_err(|e| CoreError::MalformedBody(format!("image: {e}")))
}

fn checked_units(height: u64, width: u64, frames: u64) -> Result<OutputUnits, CoreError> {
    height
        .checked_mul(width)
        .and_then(|px| px.checked_mul(frames))
        .map(OutputUnits)
        .ok_or_else(|| CoreError::MalformedBody("output dimensions too large".into()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
