//! Error values returned by each stage of the palette pipeline

use std::fmt::{self, Display};

/// A failure from one of the pipeline stages
///
/// Every stage fails fast with one of these values and no partial palette is ever produced.
#[derive(Debug, thiserror::Error)]
pub enum PaletteError {
	/// The declared or detected image type is not JPEG or PNG
	#[error("unsupported image format: {0}")]
	UnsupportedFormat(String),

	/// The bytes are empty, truncated, or do not match the declared type
	#[error("corrupt image data: {0}")]
	CorruptInput(String),

	/// The image passed validation, but the decoder still failed on it
	#[error("failed to decode image: {0}")]
	Decode(#[source] image::ImageError),

	/// A numeric parameter was missing its required form or range
	#[error("invalid value for `{name}`: {reason}")]
	InvalidParameter {
		/// The name of the parameter as the caller knows it
		name: &'static str,
		/// Why the value was rejected
		reason: String,
	},

	/// More clusters were requested than there are distinct colors to cluster
	#[error("cannot find {k} colors in an image with only {distinct} distinct colors")]
	ClusteringFailure {
		/// The requested number of clusters
		k: u8,
		/// The number of distinct colors after resizing and smoothing
		distinct: u32,
	},

	/// The swatch image could not be encoded
	#[error("failed to encode swatch image: {0}")]
	Encode(#[source] image::ImageError),
}

impl PaletteError {
	/// Shorthand for an [`PaletteError::InvalidParameter`]
	pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
		Self::InvalidParameter { name, reason: reason.into() }
	}

	/// The category of this error, without its payload
	#[must_use]
	pub const fn kind(&self) -> ErrorKind {
		match self {
			Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
			Self::CorruptInput(_) => ErrorKind::CorruptInput,
			Self::Decode(_) => ErrorKind::DecodeError,
			Self::InvalidParameter { .. } => ErrorKind::InvalidParameter,
			Self::ClusteringFailure { .. } => ErrorKind::ClusteringFailure,
			Self::Encode(_) => ErrorKind::EncodeError,
		}
	}
}

/// Fieldless categories of [`PaletteError`], suitable for reporting to a caller
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// See [`PaletteError::UnsupportedFormat`]
	UnsupportedFormat,
	/// See [`PaletteError::CorruptInput`]
	CorruptInput,
	/// See [`PaletteError::Decode`]
	DecodeError,
	/// See [`PaletteError::InvalidParameter`]
	InvalidParameter,
	/// See [`PaletteError::ClusteringFailure`]
	ClusteringFailure,
	/// See [`PaletteError::Encode`]
	EncodeError,
}

impl ErrorKind {
	/// The snake case name of this kind
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::UnsupportedFormat => "unsupported_format",
			Self::CorruptInput => "corrupt_input",
			Self::DecodeError => "decode_error",
			Self::InvalidParameter => "invalid_parameter",
			Self::ClusteringFailure => "clustering_failure",
			Self::EncodeError => "encode_error",
		}
	}
}

impl Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kind_matches_variant() {
		assert_eq!(PaletteError::UnsupportedFormat("text/plain".into()).kind(), ErrorKind::UnsupportedFormat);
		assert_eq!(PaletteError::CorruptInput("empty".into()).kind(), ErrorKind::CorruptInput);
		assert_eq!(PaletteError::invalid("k", "must be positive").kind(), ErrorKind::InvalidParameter);
		assert_eq!(PaletteError::ClusteringFailure { k: 3, distinct: 1 }.kind(), ErrorKind::ClusteringFailure);
	}

	#[test]
	fn messages_name_the_parameter() {
		let message = PaletteError::invalid("blur_kernel", "4 is even").to_string();
		assert_eq!(message, "invalid value for `blur_kernel`: 4 is even");
	}

	#[test]
	fn kind_displays_as_snake_case() {
		assert_eq!(ErrorKind::ClusteringFailure.to_string(), "clustering_failure");
		assert_eq!(ErrorKind::DecodeError.to_string(), "decode_error");
	}
}
