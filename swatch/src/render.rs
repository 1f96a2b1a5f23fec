//! Turning palette colors into hex codes and a swatch strip image

use crate::PaletteError;
use image::{Rgb, RgbImage};
use palette::Srgb;
use std::{fmt, io::Cursor};

/// The width and height of each color block in a swatch
pub const SWATCH_SIZE: u32 = 100;

/// The separator used when a palette is stored as a single string of hex codes
pub const CODE_SEPARATOR: char = '|';

/// Format a color as a lowercase `#rrggbb` hex code
#[must_use]
pub fn hex_code(color: Srgb<u8>) -> String {
	format!("#{color:x}")
}

/// Parse a `#rrggbb` hex code, ignoring case and surrounding whitespace.
///
/// # Errors
/// Returns [`PaletteError::InvalidParameter`] if `code` is not a `#` followed by six hex digits.
pub fn parse_hex_code(code: &str) -> Result<Srgb<u8>, PaletteError> {
	let invalid = || PaletteError::invalid("hex_code", format!("`{code}` is not of the form #rrggbb"));

	let digits = code.trim().strip_prefix('#').ok_or_else(invalid)?;
	if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
		return Err(invalid());
	}

	let value = u32::from_str_radix(digits, 16).map_err(|_| invalid())?;

	#[allow(clippy::cast_possible_truncation)]
	Ok(Srgb::new((value >> 16) as u8, (value >> 8) as u8, value as u8))
}

/// Parse palette colors stored as hex codes joined by [`CODE_SEPARATOR`]
///
/// # Errors
/// Returns [`PaletteError::InvalidParameter`] if any code is malformed or there are no codes.
pub fn parse_codes(codes: &str) -> Result<Vec<Srgb<u8>>, PaletteError> {
	if codes.trim().is_empty() {
		return Err(PaletteError::invalid("hex_code", "no colors were given"));
	}

	codes.split(CODE_SEPARATOR).map(parse_hex_code).collect()
}

/// One color of an extracted palette
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteEntry {
	/// The lowercase `#rrggbb` hex code
	pub hex: String,
	/// The 8-bit sRGB color
	pub rgb: Srgb<u8>,
	/// The number of canvas pixels that were closest to this color
	pub pixels: u32,
}

impl PaletteEntry {
	/// Create an entry for a color and its pixel count
	#[must_use]
	pub fn new(rgb: Srgb<u8>, pixels: u32) -> Self {
		Self { hex: hex_code(rgb), rgb, pixels }
	}
}

impl fmt::Display for PaletteEntry {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let Srgb { red, green, blue, .. } = self.rgb;
		write!(f, "RGB: [{red}, {green}, {blue}] Hex: {}", self.hex)
	}
}

/// Render colors as a single row of [`SWATCH_SIZE`] x [`SWATCH_SIZE`] blocks, in order.
///
/// Block `i` covers the columns `SWATCH_SIZE * i .. SWATCH_SIZE * (i + 1)`.
/// An empty slice gives an empty image.
#[must_use]
pub fn render_swatch(colors: &[Srgb<u8>]) -> RgbImage {
	// The number of colors is at most u8::MAX for extracted palettes, but parsed palettes may be longer
	#[allow(clippy::cast_possible_truncation)]
	let width = SWATCH_SIZE.saturating_mul(colors.len() as u32);

	RgbImage::from_fn(width, SWATCH_SIZE, |x, _| {
		let Srgb { red, green, blue, .. } = colors[(x / SWATCH_SIZE) as usize];
		Rgb([red, green, blue])
	})
}

/// Encode an image as PNG bytes
///
/// # Errors
/// Returns [`PaletteError::Encode`] if the encoder fails.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, PaletteError> {
	let mut bytes = Vec::new();
	image
		.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
		.map_err(PaletteError::Encode)?;
	Ok(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
	use super::*;
	use crate::ErrorKind;

	#[test]
	fn hex_codes_are_lowercase_and_padded() {
		assert_eq!(hex_code(Srgb::new(255, 0, 0)), "#ff0000");
		assert_eq!(hex_code(Srgb::new(1, 2, 3)), "#010203");
		assert_eq!(hex_code(Srgb::new(171, 205, 239)), "#abcdef");
	}

	#[test]
	fn parses_hex_codes() {
		assert_eq!(parse_hex_code("#123456").unwrap(), Srgb::new(0x12, 0x34, 0x56));
		assert_eq!(parse_hex_code(" #ABCDEF ").unwrap(), Srgb::new(0xab, 0xcd, 0xef));

		for code in ["123456", "#12345", "#1234567", "#12345g", "#+12345", ""] {
			assert_eq!(parse_hex_code(code).unwrap_err().kind(), ErrorKind::InvalidParameter, "{code:?}");
		}
	}

	#[test]
	fn parses_stored_codes() {
		let colors = parse_codes("#123456|#654321|#000000").unwrap();
		assert_eq!(colors, [Srgb::new(0x12, 0x34, 0x56), Srgb::new(0x65, 0x43, 0x21), Srgb::new(0, 0, 0)]);

		assert!(parse_codes("").is_err());
		assert!(parse_codes("#123456||#000000").is_err());
	}

	#[test]
	fn entry_display_shows_rgb_and_hex() {
		let entry = PaletteEntry::new(Srgb::new(18, 52, 86), 40);
		assert_eq!(entry.hex, "#123456");
		assert_eq!(entry.to_string(), "RGB: [18, 52, 86] Hex: #123456");
	}

	#[test]
	fn swatch_layout() {
		let colors = [Srgb::new(255, 0, 0), Srgb::new(0, 255, 0), Srgb::new(0, 0, 255)];
		let swatch = render_swatch(&colors);

		assert_eq!(swatch.dimensions(), (3 * SWATCH_SIZE, SWATCH_SIZE));
		for (x, _, pixel) in swatch.enumerate_pixels() {
			let Srgb { red, green, blue, .. } = colors[(x / SWATCH_SIZE) as usize];
			assert_eq!(*pixel, Rgb([red, green, blue]), "x = {x}");
		}
		assert_eq!(*swatch.get_pixel(99, 99), Rgb([255, 0, 0]));
		assert_eq!(*swatch.get_pixel(100, 0), Rgb([0, 255, 0]));
	}

	#[test]
	fn single_color_swatch_is_a_square() {
		let swatch = render_swatch(&[Srgb::new(255, 0, 0)]);
		assert_eq!(swatch.dimensions(), (SWATCH_SIZE, SWATCH_SIZE));
		assert!(swatch.pixels().all(|&p| p == Rgb([255, 0, 0])));
	}

	#[test]
	fn encoded_swatch_decodes_to_the_same_pixels() {
		let swatch = render_swatch(&[Srgb::new(12, 34, 56), Srgb::new(200, 100, 0)]);
		let bytes = encode_png(&swatch).unwrap();

		assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Png);
		let decoded = image::load_from_memory(&bytes).unwrap().into_rgb8();
		assert_eq!(decoded, swatch);
	}
}
