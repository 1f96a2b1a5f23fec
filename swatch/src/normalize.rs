//! Decoding validated bytes and resizing them onto the fixed working canvas

use crate::{validate::ValidatedImage, PaletteError};
use image::{imageops::FilterType, RgbImage};

/// The side length of the square canvas every image is resized to
pub const CANVAS_SIZE: u32 = 200;

/// Decode validated image bytes into 8-bit sRGB pixels, dropping any alpha channel.
///
/// # Errors
/// Returns [`PaletteError::Decode`] if the decoder fails despite the header being valid,
/// e.g., for a truncated body.
pub fn decode(image: &ValidatedImage) -> Result<RgbImage, PaletteError> {
	image::load_from_memory_with_format(image.bytes, image.format.to_image_format())
		.map(image::DynamicImage::into_rgb8)
		.map_err(PaletteError::Decode)
}

/// Resize an image to exactly [`CANVAS_SIZE`] x [`CANVAS_SIZE`] using bilinear filtering.
///
/// The aspect ratio is not preserved.
#[must_use]
pub fn resize(image: &RgbImage) -> RgbImage {
	if image.dimensions() == (CANVAS_SIZE, CANVAS_SIZE) {
		image.clone()
	} else {
		image::imageops::resize(image, CANVAS_SIZE, CANVAS_SIZE, FilterType::Triangle)
	}
}

/// Decode validated image bytes and resize them onto the working canvas
///
/// # Errors
/// See [`decode`].
pub fn load_and_resize(image: &ValidatedImage) -> Result<RgbImage, PaletteError> {
	decode(image).map(|decoded| resize(&decoded))
}
