//! Contains most common errors that may be encountered in decoding a JPEG image

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

use crate::misc::{
    START_OF_FRAME_EXT_AR, START_OF_FRAME_LOS_SEQ, START_OF_FRAME_LOS_SEQ_AR,
    START_OF_FRAME_PROG_DCT_AR,
};

/// Common decode errors
///
/// All of these are fatal to the decode of the current image; the two
/// entropy-level signals `MissingFF00` and `ShortHuffmanData` are trapped
/// inside the Huffman decoder and only reach a caller when the bitstream is
/// truly unusable.
#[allow(clippy::module_name_repetitions)]
pub enum DecodeErrors {
    /// A generic format error with a dynamic reason
    Format(String),
    /// A generic format error with a static reason
    FormatStatic(&'static str),
    /// Problems with Huffman tables or Huffman-coded data
    HuffmanDecode(String),
    /// Start of frame errors
    SofError(String),
    /// Start of scan errors
    SosError(String),
    /// Quantization table errors
    DqtError(String),
    /// Illegal magic bytes, the stream does not start with `0xFFD8`
    IllegalMagicBytes(u16),
    /// Image dimensions are too large to decode
    LargeDimensions(usize),
    /// Image width or height is set to zero
    ZeroError,
    /// The underlying reader ran out of bytes where more were expected
    ExhaustedData,
    /// A `0xFF` byte inside entropy-coded data was not followed by `0x00`
    MissingFF00,
    /// Entropy-coded data ended before a Huffman symbol completed
    ShortHuffmanData,
    /// A restart marker did not carry the expected cyclic index
    BadRestart {
        /// Marker byte the restart counter expected
        expected: u8,
        /// Marker byte found in the stream
        found: u8,
    },
    /// A four component image without an Adobe APP14 segment
    UnknownColorModel,
    /// Image encoding schemes we do not support
    Unsupported(UnsupportedSchemes),
    /// An error from the underlying reader
    IoError(std::io::Error),
}

impl Display for DecodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Format(reason) => write!(f, "{reason}"),
            Self::FormatStatic(reason) => write!(f, "{reason}"),
            Self::HuffmanDecode(reason) => {
                write!(f, "Error decoding huffman values: {reason}")
            }
            Self::SofError(reason) => write!(f, "Error parsing SOF segment: {reason}"),
            Self::SosError(reason) => write!(f, "Error parsing SOS segment: {reason}"),
            Self::DqtError(reason) => write!(f, "Error parsing DQT segment: {reason}"),
            Self::IllegalMagicBytes(bytes) => {
                write!(f, "Error parsing image, illegal start bytes: {bytes:#x}")
            }
            Self::LargeDimensions(dimensions) => write!(
                f,
                "Image dimensions {dimensions} larger than the maximum supported"
            ),
            Self::ZeroError => write!(f, "Image width or height is set to zero, cannot continue"),
            Self::ExhaustedData => write!(f, "Unexpected end of data"),
            Self::MissingFF00 => write!(f, "Missing 0xFF00 sequence in entropy coded data"),
            Self::ShortHuffmanData => write!(f, "Short huffman data"),
            Self::BadRestart { expected, found } => write!(
                f,
                "Bad restart marker, expected 0xFF{expected:02X} but found 0xFF{found:02X}"
            ),
            Self::UnknownColorModel => write!(
                f,
                "Unknown color model, 4-component JPEG without Adobe APP14 metadata"
            ),
            Self::Unsupported(scheme) => write!(f, "{scheme:?}"),
            Self::IoError(err) => write!(f, "Underlying reader error: {err}"),
        }
    }
}

impl Debug for DecodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Error for DecodeErrors {}

impl From<std::io::Error> for DecodeErrors {
    fn from(err: std::io::Error) -> DecodeErrors {
        DecodeErrors::IoError(err)
    }
}

/// Contains unsupported/yet-to-be supported JPEG image encoding types.
#[derive(Eq, PartialEq, Copy, Clone)]
pub enum UnsupportedSchemes {
    /// Lossless (sequential), huffman coding
    LosslessHuffman,
    /// Extended sequential DCT, arithmetic coding
    ExtendedSequentialDctArithmetic,
    /// Progressive DCT, arithmetic coding
    ProgressiveDctArithmetic,
    /// Lossless (sequential), arithmetic coding
    LosslessArithmetic,
    /// Any other start of frame marker we know nothing about
    Other(u8),
}

impl Debug for UnsupportedSchemes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LosslessHuffman => {
                write!(f,"The library cannot decode images encoded with the Lossless Huffman encoding scheme")
            }
            Self::ExtendedSequentialDctArithmetic => {
                write!(f,"The library cannot decode images encoded with the Extended Sequential DCT Arithmetic scheme")
            }
            Self::ProgressiveDctArithmetic => {
                write!(f,"The library cannot decode images encoded with the Progressive DCT Arithmetic scheme")
            }
            Self::LosslessArithmetic => {
                write!(f,"The library cannot decode images encoded with the Lossless Arithmetic encoding scheme")
            }
            Self::Other(sof) => {
                write!(
                    f,
                    "The library cannot decode images with the start of frame marker SOF{sof}"
                )
            }
        }
    }
}

impl UnsupportedSchemes {
    #[must_use]
    pub fn from_int(int: u16) -> Option<UnsupportedSchemes> {
        match int {
            START_OF_FRAME_LOS_SEQ => Some(Self::LosslessHuffman),
            START_OF_FRAME_EXT_AR => Some(Self::ExtendedSequentialDctArithmetic),
            START_OF_FRAME_PROG_DCT_AR => Some(Self::ProgressiveDctArithmetic),
            START_OF_FRAME_LOS_SEQ_AR => Some(Self::LosslessArithmetic),
            _ => None,
        }
    }
}
