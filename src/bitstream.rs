#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
//! Bit-level access to entropy-coded data
//!
//! JPEG entropy data is an MSB-first bitstream layered over the byte-stuffed
//! reads of [`ByteSource`]. The accumulator keeps its unread bits in the low
//! `bits_left` positions of `buffer`, with `top_bit` tracking the mask of the
//! oldest unread bit, so peeking at the next eight bits for the Huffman fast
//! path is a single shift.
//!
//! Refilling can fail in two recoverable ways, the data can run into a
//! marker (`0xFF` not followed by `0x00`) or simply run out. Both cases are
//! reported through [`Fill`] instead of an error because the Huffman decoder
//! may still be able to produce the next symbol out of the bits it already
//! holds, it only has to stop using the lookahead path.

use std::io::Read;

use crate::errors::DecodeErrors;
use crate::huffman::{HuffmanTable, MAX_CODE_LENGTH};
use crate::source::ByteSource;

/// Outcome of a bit-buffer refill.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) enum Fill
{
    /// The accumulator holds at least the requested bits
    Full,
    /// A marker byte interrupted the entropy data
    MissingFF00,
    /// The stream ended before the requested bits arrived
    ShortData,
}

/// The `(a, m, n)` bit accumulator over byte-stuffed entropy data.
pub(crate) struct BitStream
{
    /// Unread bits, right aligned in the low `bits_left` positions
    buffer:    u32,
    /// Mask of the oldest unread bit, `1 << (bits_left - 1)`, 0 when empty
    top_bit:   u32,
    /// Number of unread bits in `buffer`
    bits_left: i32,
}

impl BitStream
{
    pub const fn new() -> BitStream
    {
        BitStream {
            buffer: 0,
            top_bit: 0,
            bits_left: 0,
        }
    }

    /// Empty the accumulator, done at scan starts and restart markers.
    pub fn reset(&mut self)
    {
        self.buffer = 0;
        self.top_bit = 0;
        self.bits_left = 0;
    }

    /// Refill until at least `count` bits are buffered.
    ///
    /// Returns [`Fill::Full`] on success; the two short outcomes leave the
    /// bits read so far in place for the slow Huffman path to chew on.
    pub fn ensure_bits<R: Read>(
        &mut self, source: &mut ByteSource<R>, count: i32,
    ) -> Result<Fill, DecodeErrors>
    {
        while self.bits_left < count
        {
            let byte = match source.read_stuffed()
            {
                Ok(b) => u32::from(b),
                Err(DecodeErrors::MissingFF00) => return Ok(Fill::MissingFF00),
                Err(DecodeErrors::ExhaustedData) => return Ok(Fill::ShortData),
                Err(e) => return Err(e),
            };

            self.buffer = (self.buffer << 8) | byte;
            self.bits_left += 8;

            if self.top_bit == 0
            {
                self.top_bit = 1 << 7;
            }
            else
            {
                self.top_bit <<= 8;
            }
        }

        Ok(Fill::Full)
    }

    /// Like [`Self::ensure_bits`] but a short refill is an error.
    ///
    /// Used by the plain bit readers below, where a marker or EOF in the
    /// middle of a value cannot be recovered from.
    fn want_bits<R: Read>(
        &mut self, source: &mut ByteSource<R>, count: i32,
    ) -> Result<(), DecodeErrors>
    {
        match self.ensure_bits(source, count)?
        {
            Fill::Full => Ok(()),
            Fill::MissingFF00 => Err(DecodeErrors::MissingFF00),
            Fill::ShortData => Err(DecodeErrors::ShortHuffmanData),
        }
    }

    /// Read a single bit.
    pub fn decode_bit<R: Read>(&mut self, source: &mut ByteSource<R>) -> Result<bool, DecodeErrors>
    {
        if self.bits_left == 0
        {
            self.want_bits(source, 1)?;
        }

        let bit = self.buffer & self.top_bit != 0;

        self.bits_left -= 1;
        self.top_bit >>= 1;

        Ok(bit)
    }

    /// Read `count` bits as an unsigned value, `count` in `[0, 16]`.
    pub fn decode_bits<R: Read>(
        &mut self, source: &mut ByteSource<R>, count: i32,
    ) -> Result<u32, DecodeErrors>
    {
        if self.bits_left < count
        {
            self.want_bits(source, count)?;
        }

        let bits = (self.buffer >> (self.bits_left - count)) & ((1 << count) - 1);

        self.bits_left -= count;
        self.top_bit >>= count;

        Ok(bits)
    }

    /// Read `t` magnitude bits and sign-extend them, section F.2.2.1.
    ///
    /// A value whose top bit is clear codes a negative number, offset so the
    /// `t`-bit patterns cover `[-(2^t - 1), -(2^(t-1))]` and `[2^(t-1), 2^t - 1]`.
    pub fn receive_extend<R: Read>(
        &mut self, source: &mut ByteSource<R>, t: u8,
    ) -> Result<i32, DecodeErrors>
    {
        let t = i32::from(t);

        if self.bits_left < t
        {
            self.want_bits(source, t)?;
        }

        self.bits_left -= t;
        self.top_bit >>= t;

        let s = 1_i32 << t;
        let x = ((self.buffer >> self.bits_left) as i32) & (s - 1);

        if x < s >> 1
        {
            Ok(x + ((-1) << t) + 1)
        }
        else
        {
            Ok(x)
        }
    }

    /// Push back the raw bytes of the last stuffed read.
    ///
    /// If a whole byte of it is still unread in the accumulator, drop those
    /// bits too so the stream positions agree.
    pub fn unread_stuffed<R: Read>(&mut self, source: &mut ByteSource<R>)
    {
        source.roll_back();

        if self.bits_left >= 8
        {
            self.buffer >>= 8;
            self.bits_left -= 8;
            self.top_bit >>= 8;
        }
    }

    /// Undo entropy lookahead before raw byte reads.
    ///
    /// The overshot byte goes back to the source only when none of its bits
    /// were consumed; a partially used byte was the tail padding of the
    /// entropy segment and stays consumed.
    pub fn unread_overshoot<R: Read>(&mut self, source: &mut ByteSource<R>)
    {
        if self.bits_left >= 8
        {
            self.unread_stuffed(source);
        }
        else
        {
            source.unreadable = 0;
        }
    }

    /// Decode one Huffman symbol.
    pub fn decode_huffman<R: Read>(
        &mut self, source: &mut ByteSource<R>, table: &HuffmanTable,
    ) -> Result<u8, DecodeErrors>
    {
        if self.bits_left < 8
        {
            match self.ensure_bits(source, 8)?
            {
                Fill::Full => {}
                _ =>
                {
                    // The segment ran short, but the bits already buffered
                    // may still hold the next symbol. Undo the byte the
                    // refill consumed and decode bit by bit.
                    if source.unreadable != 0
                    {
                        self.unread_stuffed(source);
                    }

                    return self.decode_huffman_slow(source, table);
                }
            }
        }

        let slot = table.lookup[((self.buffer >> (self.bits_left - 8)) & 0xFF) as usize];

        if slot != 0
        {
            let length = i32::from(slot & 0xFF) - 1;

            self.bits_left -= length;
            self.top_bit >>= length;

            return Ok((slot >> 8) as u8);
        }

        self.decode_huffman_slow(source, table)
    }

    /// The canonical bit-at-a-time lookup for codes the fast path missed.
    fn decode_huffman_slow<R: Read>(
        &mut self, source: &mut ByteSource<R>, table: &HuffmanTable,
    ) -> Result<u8, DecodeErrors>
    {
        let mut code = 0_i32;

        for length in 0..MAX_CODE_LENGTH
        {
            if self.bits_left == 0
            {
                self.want_bits(source, 1)?;
            }

            if self.buffer & self.top_bit != 0
            {
                code |= 1;
            }

            self.bits_left -= 1;
            self.top_bit >>= 1;

            // max_code is -1 for lengths with no codes, which can never
            // compare greater-or-equal to an accumulating code
            if code <= table.max_code[length]
            {
                let index = table.vals_base[length] + code - table.min_code[length];

                return Ok(table.values[(index & 0xFF) as usize]);
            }

            code <<= 1;
        }

        Err(DecodeErrors::HuffmanDecode(
            "bad Huffman code, no match in 16 bits".to_string(),
        ))
    }
}
