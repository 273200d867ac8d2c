//! Progressive refinement and final reconstruction
//!
//! Progressive images transmit coefficients over several scans, by spectral
//! band (different zig-zag ranges per scan) and by bit plane (successive
//! approximation). The first pass of each band goes through the ordinary
//! block decoder with the point transform applied; the passes after it land
//! here, adding one bit of precision to coefficients that already exist and
//! placing newly visible ones.
//!
//! Once the marker loop sees EOI the accumulated coefficients of every
//! component run through the usual dequantize/IDCT pipeline.

use std::io::Read;

use crate::decoder::Decoder;
use crate::errors::DecodeErrors;
use crate::misc::UN_ZIGZAG;
use crate::source::ByteSource;

impl Decoder
{
    /// Refine one block by one bit plane, section G.1.2.
    pub(crate) fn refine_block<R: Read>(
        &mut self, source: &mut ByteSource<R>, ac_table: usize, block: &mut [i16; 64],
        zig_start: i32, zig_end: i32, delta: i32,
    ) -> Result<(), DecodeErrors>
    {
        if zig_start == 0
        {
            // DC refinement is a single bit OR'd into the new bit plane
            if self.bits.decode_bit(source)?
            {
                block[0] |= delta as i16;
            }

            return Ok(());
        }

        // AC refinement, sections G.1.2.2 and G.1.2.3
        let mut zig = zig_start;

        if self.eob_run == 0
        {
            'band: while zig <= zig_end
            {
                let mut correction = 0_i32;

                let value = {
                    let table = self.ac_huffman_tables[ac_table].as_ref().ok_or_else(|| {
                        DecodeErrors::HuffmanDecode(format!(
                            "No AC Huffman table at index {ac_table}"
                        ))
                    })?;

                    self.bits.decode_huffman(source, table)?
                };

                let run = i32::from(value >> 4);
                let size = value & 0x0F;

                match size
                {
                    0 =>
                    {
                        if run != 15
                        {
                            // end of band for this and the next eob_run
                            // blocks, existing coefficients still refine
                            self.eob_run = 1 << run;

                            if run != 0
                            {
                                self.eob_run |= self.bits.decode_bits(source, run)? as u16;
                            }

                            break 'band;
                        }

                        // run of 16 zeroes handled by the skip below
                    }
                    1 =>
                    {
                        // a coefficient becomes visible in this bit plane,
                        // its sign arrives as one raw bit
                        correction = delta;

                        if !self.bits.decode_bit(source)?
                        {
                            correction = -correction;
                        }
                    }
                    _ =>
                    {
                        // T.81 reserves every other combination here, bail
                        // out rather than guess
                        return Err(DecodeErrors::HuffmanDecode(
                            "Unexpected Huffman code in refinement scan".to_string(),
                        ));
                    }
                }

                zig = self.refine_non_zeroes(source, block, zig, zig_end, run, delta)?;

                if zig > zig_end
                {
                    return Err(DecodeErrors::HuffmanDecode(format!(
                        "Too many coefficients, position {zig} past band end {zig_end}"
                    )));
                }

                if correction != 0
                {
                    block[UN_ZIGZAG[zig as usize]] = correction as i16;
                }

                zig += 1;
            }
        }

        if self.eob_run > 0
        {
            // the rest of the band is zero in this block, but coefficients
            // that already exist still collect their refinement bits
            self.eob_run -= 1;

            self.refine_non_zeroes(source, block, zig, zig_end, -1, delta)?;
        }

        Ok(())
    }

    /// Advance through the band refining existing non-zero coefficients,
    /// skipping `zeroes_left` zero entries on the way (every remaining one
    /// when -1), and return the position reached.
    ///
    /// Refinement bits are sign preserving, magnitudes only ever grow.
    fn refine_non_zeroes<R: Read>(
        &mut self, source: &mut ByteSource<R>, block: &mut [i16; 64], zig: i32, zig_end: i32,
        zeroes_left: i32, delta: i32,
    ) -> Result<i32, DecodeErrors>
    {
        let mut zig = zig;
        let mut zeroes_left = zeroes_left;

        while zig <= zig_end
        {
            let natural = UN_ZIGZAG[zig as usize];

            if block[natural] == 0
            {
                if zeroes_left == 0
                {
                    break;
                }

                zeroes_left -= 1;
            }
            else if self.bits.decode_bit(source)?
            {
                if block[natural] >= 0
                {
                    block[natural] += delta as i16;
                }
                else
                {
                    block[natural] -= delta as i16;
                }
            }

            zig += 1;
        }

        Ok(zig)
    }

    /// Dequantize and inverse transform every accumulated block, the final
    /// step of a progressive decode.
    pub(crate) fn reconstruct_progressive(&mut self) -> Result<(), DecodeErrors>
    {
        let (mxx, myy) = (self.mcu_x, self.mcu_y);

        for comp_index in 0..self.components.len()
        {
            let hi = self.components[comp_index].horizontal_sample;
            let vi = self.components[comp_index].vertical_sample;

            for by in 0..myy * vi
            {
                for bx in 0..mxx * hi
                {
                    let offset = 64 * (by * mxx * hi + bx);

                    let mut block = [0_i16; 64];

                    block.copy_from_slice(
                        &self.components[comp_index].coeffs[offset..offset + 64],
                    );

                    self.reconstruct_block(&block, bx, by, comp_index)?;
                }
            }
        }

        debug!("Reconstructed progressive image");

        Ok(())
    }
}
