//! Buffered byte source over an opaque reader
//!
//! The entropy decoder needs two things an ordinary buffered reader does not
//! give us: a byte-stuffed read where `0xFF 0x00` collapses to a literal
//! `0xFF`, and the ability to push back the one or two raw bytes the last
//! stuffed read consumed when the Huffman fast path overshoots into a
//! marker. The buffer therefore always keeps the previous two bytes around
//! across refills.

use std::cmp::min;
use std::io::Read;

use crate::bitstream::BitStream;
use crate::errors::DecodeErrors;

/// Size of the internal window of raw input bytes
const BUFFER_SIZE: usize = 4096;

/// A sliding window over the raw bytes of a JPEG stream.
pub(crate) struct ByteSource<R>
{
    reader: R,
    buffer: [u8; BUFFER_SIZE],
    /// Position of the next unread byte, `start <= end`
    start:  usize,
    /// One past the last valid byte in the buffer
    end:    usize,
    /// Raw bytes consumed by the most recent stuffed read, 0, 1 or 2.
    ///
    /// `roll_back` backs the window up by this much so the marker parser can
    /// resynchronize after the Huffman decoder overshoots.
    pub(crate) unreadable: usize,
}

impl<R> ByteSource<R>
where
    R: Read,
{
    pub fn new(reader: R) -> ByteSource<R>
    {
        ByteSource {
            reader,
            buffer: [0; BUFFER_SIZE],
            start: 0,
            end: 0,
            unreadable: 0,
        }
    }

    /// Refill the window from the underlying reader.
    ///
    /// The last two buffered bytes are preserved at the front so that a
    /// stuffed byte straddling the refill can still be unread.
    fn fill_buffer(&mut self) -> Result<(), DecodeErrors>
    {
        debug_assert_eq!(self.start, self.end, "fill called with unread bytes");

        if self.end > 2
        {
            self.buffer[0] = self.buffer[self.end - 2];
            self.buffer[1] = self.buffer[self.end - 1];

            self.start = 2;
            self.end = 2;
        }

        loop
        {
            match self.reader.read(&mut self.buffer[self.end..])
            {
                Ok(0) => return Err(DecodeErrors::ExhaustedData),
                Ok(n) =>
                {
                    self.end += n;
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(DecodeErrors::IoError(e)),
            }
        }
    }

    /// Return the next raw byte, refilling as needed.
    pub fn read_byte(&mut self) -> Result<u8, DecodeErrors>
    {
        while self.start == self.end
        {
            self.fill_buffer()?;
        }

        let byte = self.buffer[self.start];

        self.start += 1;
        self.unreadable = 0;

        Ok(byte)
    }

    /// Return the next byte of entropy-coded data.
    ///
    /// `0xFF 0x00` collapses to a literal `0xFF`; any other `0xFF xx` means
    /// a marker begins here and raises [`DecodeErrors::MissingFF00`], with
    /// `unreadable` telling the caller how far to back up to land on the
    /// `0xFF` again.
    pub fn read_stuffed(&mut self) -> Result<u8, DecodeErrors>
    {
        // fast path, both bytes of a potential pair are already buffered
        if self.start + 2 <= self.end
        {
            let byte = self.buffer[self.start];

            self.start += 1;
            self.unreadable = 1;

            if byte != 0xFF
            {
                return Ok(byte);
            }

            if self.buffer[self.start] != 0x00
            {
                return Err(DecodeErrors::MissingFF00);
            }

            self.start += 1;
            self.unreadable = 2;

            return Ok(0xFF);
        }

        self.unreadable = 0;

        let byte = self.read_byte()?;

        self.unreadable = 1;

        if byte != 0xFF
        {
            return Ok(byte);
        }

        let next = self.read_byte()?;

        self.unreadable = 2;

        if next != 0x00
        {
            return Err(DecodeErrors::MissingFF00);
        }

        Ok(0xFF)
    }

    /// Push back the raw bytes of the most recent stuffed read.
    pub fn roll_back(&mut self)
    {
        self.start -= self.unreadable;
        self.unreadable = 0;
    }

    /// Read exactly `dst.len()` raw bytes, with no stuffing semantics.
    ///
    /// A stuffed byte pending from the entropy decoder is pushed back first
    /// so segment parsing starts at the marker boundary.
    pub fn read_full(&mut self, bits: &mut BitStream, dst: &mut [u8]) -> Result<(), DecodeErrors>
    {
        if self.unreadable != 0
        {
            bits.unread_overshoot(self);
        }

        let mut offset = 0;

        while offset < dst.len()
        {
            if self.start == self.end
            {
                self.fill_buffer()?;
            }

            let take = min(self.end - self.start, dst.len() - offset);

            dst[offset..offset + take].copy_from_slice(&self.buffer[self.start..self.start + take]);

            self.start += take;
            offset += take;
        }

        Ok(())
    }

    /// Discard exactly `count` raw bytes, same semantics as [`Self::read_full`].
    pub fn skip(&mut self, bits: &mut BitStream, count: usize) -> Result<(), DecodeErrors>
    {
        if self.unreadable != 0
        {
            bits.unread_overshoot(self);
        }

        let mut left = count;

        while left > 0
        {
            if self.start == self.end
            {
                self.fill_buffer()?;
            }

            let take = min(self.end - self.start, left);

            self.start += take;
            left -= take;
        }

        Ok(())
    }
}
