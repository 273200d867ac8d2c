//! A baseline and progressive JPEG decoder.
//!
//! The decoder pulls bytes from any [`std::io::Read`], walks the marker
//! segments, entropy-decodes every scan (including progressive spectral
//! selection and successive approximation) and hands its sink one dense
//! RGBA buffer plus whatever metadata the stream carried.
//!
//! ```no_run
//! use duma_jpeg::Decoder;
//!
//! let data = std::fs::read("image.jpg").unwrap();
//! let mut decoder = Decoder::new();
//! let pixels = decoder.decode_buffer(&data).unwrap();
//!
//! println!(
//!     "{}x{} -> {} RGBA bytes",
//!     decoder.width(),
//!     decoder.height(),
//!     pixels.len()
//! );
//! ```
#![allow(
    clippy::needless_return,
    clippy::similar_names,
    clippy::inline_always,
    clippy::module_name_repetitions
)]
#![warn(clippy::correctness, clippy::perf, clippy::pedantic)]
#[macro_use]
extern crate log;

pub use crate::decoder::{Decoder, DecoderOptions, ImageInfo};
pub use crate::errors::DecodeErrors;
pub use crate::image::{ImageSink, RgbaImage};
pub use crate::misc::ColorModel;
pub use crate::probe::probe;

mod bitstream;
mod color_convert;
mod components;
mod decoder;
pub mod errors;
mod headers;
mod huffman;
mod idct;
mod image;
mod marker;
mod mcu;
mod mcu_prog;
mod misc;
mod probe;
mod source;
mod worker;
