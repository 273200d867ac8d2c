//! Small utilities and constants used across the decoder
#![allow(dead_code)]

/// Start of baseline DCT Huffman coding
pub const START_OF_FRAME_BASE: u16 = 0xffc0;
/// Start of extended sequential DCT Huffman coding
pub const START_OF_FRAME_EXT_SEQ: u16 = 0xffc1;
/// Start of progressive DCT encoding
pub const START_OF_FRAME_PROG_DCT: u16 = 0xffc2;
/// Start of lossless sequential Huffman coding
pub const START_OF_FRAME_LOS_SEQ: u16 = 0xffc3;
/// Start of extended sequential DCT arithmetic coding
pub const START_OF_FRAME_EXT_AR: u16 = 0xffc9;
/// Start of progressive DCT arithmetic coding
pub const START_OF_FRAME_PROG_DCT_AR: u16 = 0xffca;
/// Start of lossless sequential arithmetic coding
pub const START_OF_FRAME_LOS_SEQ_AR: u16 = 0xffcb;

/// Undo run length encoding of coefficients by placing them in natural order
///
/// Maps a zig-zag index to the equivalent index of an 8x8 block stored in
/// row-major order, e.g. `UN_ZIGZAG[3] == 16` (row 2, column 0).
#[rustfmt::skip]
pub const UN_ZIGZAG: [usize; 64] = [
    0,  1,  8,  16, 9,  2,  3, 10,
    17, 24, 32, 25, 18, 11, 4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13, 6,  7,  14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// Color models an image can decode from
///
/// The decoder always emits RGBA, this tells us how the decoded sample
/// planes are to be interpreted when converting.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ColorModel {
    /// A single luminance plane
    Grayscale,
    /// Y/Cb/Cr, the common case
    YCbCr,
    /// Three planes holding R, G and B samples directly
    Rgb,
    /// C/M/Y planes plus a black plane, stored inverted as JPEG does
    Cmyk,
    /// Y/Cb/Cr planes plus a black plane
    Ycck,
}
