//! Checks uploaded bytes and numeric parameters before any pixel work is done

use crate::PaletteError;
use std::{fmt, io::Cursor, path::Path, str::FromStr};

/// The image formats accepted by the pipeline
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ImageFormat {
	/// JPEG / JFIF
	Jpeg,
	/// Portable Network Graphics
	Png,
}

impl ImageFormat {
	/// Map a declared MIME type to a supported format.
	///
	/// Matching ignores case and any `;`-separated parameters.
	#[must_use]
	pub fn from_mime(mime: &str) -> Option<Self> {
		let essence = mime.split(';').next().unwrap_or_default().trim();
		if ["image/jpeg", "image/jpg", "image/pjpeg"]
			.iter()
			.any(|m| essence.eq_ignore_ascii_case(m))
		{
			Some(Self::Jpeg)
		} else if essence.eq_ignore_ascii_case("image/png") {
			Some(Self::Png)
		} else {
			None
		}
	}

	/// Map a file extension (without the leading dot) to a supported format
	#[must_use]
	pub fn from_extension(ext: &str) -> Option<Self> {
		if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") {
			Some(Self::Jpeg)
		} else if ext.eq_ignore_ascii_case("png") {
			Some(Self::Png)
		} else {
			None
		}
	}

	/// The canonical MIME type for this format
	#[must_use]
	pub const fn mime(self) -> &'static str {
		match self {
			Self::Jpeg => "image/jpeg",
			Self::Png => "image/png",
		}
	}

	/// The matching `image` crate format
	pub(crate) const fn to_image_format(self) -> image::ImageFormat {
		match self {
			Self::Jpeg => image::ImageFormat::Jpeg,
			Self::Png => image::ImageFormat::Png,
		}
	}
}

impl fmt::Display for ImageFormat {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(match self {
			Self::Jpeg => "JPEG",
			Self::Png => "PNG",
		})
	}
}

/// Encoded image bytes together with the MIME type the uploader declared for them
#[derive(Debug, Clone)]
pub struct RawImage {
	/// The encoded bytes
	pub bytes: Vec<u8>,
	/// The declared MIME type, e.g. `image/png`
	pub declared_mime: String,
}

impl RawImage {
	/// Wrap some bytes and their declared MIME type
	#[must_use]
	pub fn new(bytes: Vec<u8>, declared_mime: impl Into<String>) -> Self {
		Self { bytes, declared_mime: declared_mime.into() }
	}

	/// Wrap some bytes, declaring their MIME type from a file name's extension.
	///
	/// Unknown extensions are declared as `application/octet-stream`, which validation rejects.
	#[must_use]
	pub fn from_named_bytes(bytes: Vec<u8>, name: impl AsRef<Path>) -> Self {
		let mime = name
			.as_ref()
			.extension()
			.and_then(|ext| ext.to_str())
			.and_then(ImageFormat::from_extension)
			.map_or("application/octet-stream", ImageFormat::mime);

		Self::new(bytes, mime)
	}
}

/// Image bytes that passed validation, tagged with their confirmed format
#[derive(Debug, Clone, Copy)]
pub struct ValidatedImage<'a> {
	/// The encoded bytes
	pub(crate) bytes: &'a [u8],
	/// The confirmed format
	pub(crate) format: ImageFormat,
	/// Width and height read from the image header
	pub(crate) dimensions: (u32, u32),
}

impl ValidatedImage<'_> {
	/// The confirmed format
	#[must_use]
	pub const fn format(&self) -> ImageFormat {
		self.format
	}

	/// The width and height read from the image header
	#[must_use]
	pub const fn dimensions(&self) -> (u32, u32) {
		self.dimensions
	}
}

/// Confirm that `raw` is a JPEG or PNG image matching its declared type.
///
/// Only the header is read here; full decoding happens in [`crate::decode`].
///
/// # Errors
/// - [`PaletteError::UnsupportedFormat`] if the declared type, or the type detected from the content,
///   is anything other than JPEG or PNG.
/// - [`PaletteError::CorruptInput`] if the bytes are empty, unrecognizable,
///   do not match the declared type, or have an unreadable header.
pub fn validate(raw: &RawImage) -> Result<ValidatedImage<'_>, PaletteError> {
	let format = ImageFormat::from_mime(&raw.declared_mime)
		.ok_or_else(|| PaletteError::UnsupportedFormat(raw.declared_mime.clone()))?;

	if raw.bytes.is_empty() {
		return Err(PaletteError::CorruptInput(format!("the {format} file is empty")));
	}

	let detected = image::guess_format(&raw.bytes)
		.map_err(|_| PaletteError::CorruptInput(format!("the content is not a recognizable {format} image")))?;

	if detected != format.to_image_format() {
		return Err(match detected {
			image::ImageFormat::Jpeg | image::ImageFormat::Png => PaletteError::CorruptInput(format!(
				"declared as {} but the content is {detected:?}",
				format.mime()
			)),
			other => PaletteError::UnsupportedFormat(format!("{other:?}")),
		});
	}

	let dimensions = image::ImageReader::with_format(Cursor::new(&raw.bytes), format.to_image_format())
		.into_dimensions()
		.map_err(|e| PaletteError::CorruptInput(format!("unreadable {format} header: {e}")))?;

	if dimensions.0 == 0 || dimensions.1 == 0 {
		return Err(PaletteError::CorruptInput(format!("the {format} image has no pixels")));
	}

	Ok(ValidatedImage { bytes: &raw.bytes, format, dimensions })
}

/// Parse an integer parameter, naming it in the error
fn parse_integer(name: &'static str, s: &str) -> Result<i64, PaletteError> {
	s.trim()
		.parse()
		.map_err(|_| PaletteError::invalid(name, format!("`{s}` is not an integer")))
}

/// The number of colors to extract, in `1..=255`
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ClusterCount(u8);

impl ClusterCount {
	/// Five colors
	pub const DEFAULT: Self = Self(5);

	/// Validate a requested number of colors.
	///
	/// # Errors
	/// Returns [`PaletteError::InvalidParameter`] unless `k` is in `1..=255`.
	pub fn new(k: i64) -> Result<Self, PaletteError> {
		if k < 1 {
			Err(PaletteError::invalid("k", format!("{k} is not a positive integer")))
		} else {
			u8::try_from(k)
				.map(Self)
				.map_err(|_| PaletteError::invalid("k", format!("{k} is more than {} colors", u8::MAX)))
		}
	}

	/// The number of colors
	#[must_use]
	pub const fn get(self) -> u8 {
		self.0
	}
}

impl Default for ClusterCount {
	fn default() -> Self {
		Self::DEFAULT
	}
}

impl FromStr for ClusterCount {
	type Err = PaletteError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(parse_integer("k", s)?)
	}
}

impl fmt::Display for ClusterCount {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		self.0.fmt(f)
	}
}

/// The side length of a square Gaussian blur kernel, odd and in `1..=255`
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct KernelSize(u32);

impl KernelSize {
	/// A 5x5 kernel
	pub const DEFAULT: Self = Self(5);

	/// The largest accepted kernel size
	pub const MAX: u32 = 255;

	/// Validate a requested kernel size.
	///
	/// The kernel must have a center pixel, so even sizes are rejected.
	///
	/// # Errors
	/// Returns [`PaletteError::InvalidParameter`] unless `size` is odd and in `1..=255`.
	pub fn new(size: i64) -> Result<Self, PaletteError> {
		if size < 1 {
			Err(PaletteError::invalid("blur_kernel", format!("{size} is not a positive integer")))
		} else if size % 2 == 0 {
			Err(PaletteError::invalid("blur_kernel", format!("{size} is even")))
		} else if size > i64::from(Self::MAX) {
			Err(PaletteError::invalid("blur_kernel", format!("{size} is larger than {}", Self::MAX)))
		} else {
			#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
			Ok(Self(size as u32))
		}
	}

	/// The side length of the kernel
	#[must_use]
	pub const fn get(self) -> u32 {
		self.0
	}

	/// The number of pixels on each side of the center
	#[must_use]
	pub const fn radius(self) -> u32 {
		self.0 / 2
	}
}

impl Default for KernelSize {
	fn default() -> Self {
		Self::DEFAULT
	}
}

impl FromStr for KernelSize {
	type Err = PaletteError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(parse_integer("blur_kernel", s)?)
	}
}

impl fmt::Display for KernelSize {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		self.0.fmt(f)
	}
}
