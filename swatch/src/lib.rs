//! Extract the dominant colors of an image by performing k-means clustering in the CIELAB color space.
//!
//! # Examples
//!
//! ## Get 5 dominant colors from an uploaded JPEG.
//!
//! ```no_run
//! let bytes = std::fs::read("some image.jpg").unwrap();
//! let raw = swatch::RawImage::new(bytes, "image/jpeg");
//! let artifact = swatch::extract_palette(&raw, &swatch::PaletteOptions::default()).unwrap();
//!
//! for entry in &artifact.entries {
//! 	println!("{entry}");
//! }
//! ```
//!
//! ## Use request parameters, and save the swatch.
//!
//! ```no_run
//! let raw = swatch::RawImage::from_named_bytes(std::fs::read("photo.png").unwrap(), "photo.png");
//! let options = swatch::PaletteOptions::from_params(Some("8"), Some("9")).unwrap();
//! let artifact = swatch::extract_palette(&raw, &options).unwrap();
//!
//! std::fs::write("swatch.png", artifact.swatch_png().unwrap()).unwrap();
//! println!("{}", artifact.codes());
//! ```
//!
//! ## Run the stages individually.
//!
//! ```no_run
//! # fn main() -> Result<(), swatch::PaletteError> {
//! let raw = swatch::RawImage::new(std::fs::read("photo.png").unwrap(), "image/png");
//! let validated = swatch::validate(&raw)?;
//! let canvas = swatch::load_and_resize(&validated)?;
//! let smoothed = swatch::gaussian_blur(&canvas, swatch::KernelSize::new(3)?);
//! let labs = swatch::LabCounts::from_rgbimage(&smoothed);
//!
//! let result = swatch::kmeans(&labs, 4, &swatch::KmeansOptions::default());
//! let colors = swatch::centroids_to_srgb(&result.centroids);
//! let swatch = swatch::render_swatch(&colors);
//! # Ok(())
//! # }
//! ```
//!
//! # Stages
//!
//! Every stage either returns its output or a [`PaletteError`] that ends the run.
//!
//! ## Validation
//!
//! Only JPEG and PNG are accepted. The declared MIME type must be one of
//! `image/jpeg`, `image/jpg`, `image/pjpeg`, or `image/png`,
//! the content must actually be of the declared format,
//! and the header must describe an image with nonzero dimensions.
//!
//! ## Normalization
//!
//! The decoded image is resized to a fixed 200x200 canvas with bilinear interpolation.
//! The aspect ratio is not kept, since only the proportions of colors matter.
//!
//! ## Blur
//!
//! A Gaussian blur smooths away noise and texture, so that k-means finds the broad color regions.
//! The kernel size must be odd and at most 255. A size of 1 disables blurring.
//!
//! ## k-means
//!
//! Colors are clustered in CIELAB, where euclidean distance roughly follows perceived color difference.
//! Identical pixels are merged and weighted by their count before clustering.
//!
//! The clustering is seeded, so the same image and options always give the same palette.
//! Multiple trials are run with different seeds and the one with the lowest variance is kept.
//! With the `threads` feature, trials run in parallel without changing the result.
//!
//! If the smoothed canvas has fewer distinct colors than requested,
//! the run fails with [`PaletteError::ClusteringFailure`] instead of returning fewer colors.
//!
//! ## Rendering
//!
//! Centroids are converted back to sRGB, clamping colors outside the gamut,
//! and each becomes a lowercase `#rrggbb` hex code and a 100x100 block of the swatch strip.

#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::cargo)]
#![warn(clippy::use_debug, clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
#![warn(clippy::unwrap_used, clippy::unwrap_in_result)]
#![warn(clippy::unneeded_field_pattern, clippy::rest_pat_in_fully_bound_structs)]
#![warn(clippy::unnecessary_self_imports)]
#![warn(clippy::str_to_string, clippy::string_to_string, clippy::string_slice)]
#![warn(missing_docs, clippy::missing_docs_in_private_items, rustdoc::all)]
#![warn(clippy::float_cmp_const, clippy::lossy_float_literal)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::unreadable_literal)]

mod blur;
mod color;
mod error;
mod kmeans;
mod normalize;
mod pipeline;
mod render;
mod validate;

pub use blur::{auto_sigma, gaussian_blur, gaussian_kernel};
pub use color::{centroids_to_srgb, lab_to_srgb, srgb_to_lab, LabCounts};
pub use error::{ErrorKind, PaletteError};
pub use kmeans::{run as kmeans, KmeansOptions, KmeansResult};
pub use normalize::{decode, load_and_resize, resize, CANVAS_SIZE};
pub use pipeline::{extract_from_rgb, extract_palette, PaletteArtifact, PaletteOptions};
pub use render::{
	encode_png, hex_code, parse_codes, parse_hex_code, render_swatch, PaletteEntry, CODE_SEPARATOR, SWATCH_SIZE,
};
pub use validate::{validate, ClusterCount, ImageFormat, KernelSize, RawImage, ValidatedImage};

pub use palette::{Lab, Srgb};
