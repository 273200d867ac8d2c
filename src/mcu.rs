//! Scan decoding, the hardest part of the format
//!
//! One entropy-coded scan covers either every component interleaved (the
//! usual baseline layout and progressive DC scans) or a single component.
//! Interleaved scans walk MCU by MCU, visiting `h * v` blocks per component
//! per MCU in row-major order inside the component's tile. Non-interleaved
//! scans walk the component's blocks left to right, top to bottom, skipping
//! grid positions that fall outside the image at the pixel level, those
//! carry no data in the stream.
//!
//! For a sequential 32x16 image at 4:2:0 the luma visiting order per MCU is
//!
//! ```text
//!   0 1 4 5
//!   2 3 6 7
//! ```
//!
//! while a non-interleaved scan of the same component walks
//!
//! ```text
//!   0 1 2 3
//!   4 5 6 7
//! ```
//!
//! Baseline blocks are dequantized and transformed on the spot; progressive
//! blocks accumulate in the per-component coefficient store until every scan
//! has run.

use std::io::Read;

use crate::decoder::{Decoder, MAX_COMPONENTS};
use crate::errors::DecodeErrors;
use crate::headers::{ScanComponent, ScanHeader};
use crate::idct::idct_block;
use crate::misc::UN_ZIGZAG;
use crate::source::ByteSource;

impl Decoder
{
    /// Decode one entropy-coded scan.
    pub(crate) fn decode_scan<R: Read>(
        &mut self, source: &mut ByteSource<R>, scan: &ScanHeader,
    ) -> Result<(), DecodeErrors>
    {
        let (mxx, myy) = (self.mcu_x, self.mcu_y);

        if !self.planes_made
        {
            self.make_planes()?;
            self.planes_made = true;
        }

        let zig_start = i32::from(scan.spec_start);
        let zig_end = i32::from(scan.spec_end);
        let shift = scan.succ_low;

        // fresh scan, empty accumulator, zeroed predictors and EOB run
        self.bits.reset();
        self.eob_run = 0;

        let mut dc = [0_i32; MAX_COMPONENTS];
        let mut block = [0_i16; 64];
        let mut mcu = 0_usize;
        let mut expected_rst = 0_u8;
        let mut block_count = 0_usize;

        let width = usize::from(self.info.width);
        let height = usize::from(self.info.height);

        for my in 0..myy
        {
            for mx in 0..mxx
            {
                for scan_comp in &scan.components
                {
                    let comp_index = scan_comp.index;
                    let hi = self.components[comp_index].horizontal_sample;
                    let vi = self.components[comp_index].vertical_sample;

                    for j in 0..hi * vi
                    {
                        let (bx, by);

                        if scan.components.len() != 1
                        {
                            bx = hi * mx + j % hi;
                            by = vi * my + j / hi;
                        }
                        else
                        {
                            let blocks_per_row = mxx * hi;

                            bx = block_count % blocks_per_row;
                            by = block_count / blocks_per_row;
                            block_count += 1;

                            if bx * 8 >= width || by * 8 >= height
                            {
                                continue;
                            }
                        }

                        let coeff_offset = 64 * (by * mxx * hi + bx);

                        if self.is_progressive
                        {
                            // resume from what earlier scans decoded
                            let coeffs = &self.components[comp_index].coeffs;

                            block.copy_from_slice(&coeffs[coeff_offset..coeff_offset + 64]);
                        }
                        else
                        {
                            block = [0; 64];
                        }

                        if scan.succ_high == 0
                        {
                            self.decode_block(
                                source, scan_comp, &mut block, zig_start, zig_end, shift, &mut dc,
                            )?;
                        }
                        else
                        {
                            self.refine_block(
                                source,
                                scan_comp.ac_table,
                                &mut block,
                                zig_start,
                                zig_end,
                                1 << shift,
                            )?;
                        }

                        if self.is_progressive
                        {
                            // dequantization and the IDCT wait until every
                            // band has been refined
                            let coeffs = &mut self.components[comp_index].coeffs;

                            coeffs[coeff_offset..coeff_offset + 64].copy_from_slice(&block);
                        }
                        else
                        {
                            self.reconstruct_block(&block, bx, by, comp_index)?;
                        }
                    }
                }

                mcu += 1;

                if self.restart_interval > 0
                    && mcu % self.restart_interval == 0
                    && mcu < mxx * myy
                {
                    self.handle_restart(source, &mut expected_rst, &mut dc)?;
                }
            }
        }

        Ok(())
    }

    /// Decode one block of a sequential scan or a progressive first pass,
    /// sections F.2.2.1 and F.2.2.2 plus the G.1.2.2 EOB run rules.
    #[allow(clippy::too_many_arguments)]
    fn decode_block<R: Read>(
        &mut self, source: &mut ByteSource<R>, scan_comp: &ScanComponent, block: &mut [i16; 64],
        zig_start: i32, zig_end: i32, shift: u8, dc: &mut [i32; MAX_COMPONENTS],
    ) -> Result<(), DecodeErrors>
    {
        let mut zig = zig_start;

        if zig == 0
        {
            zig = 1;

            // DC coefficient, a category symbol and that many magnitude bits
            let value = {
                let table = self.dc_huffman_tables[scan_comp.dc_table]
                    .as_ref()
                    .ok_or_else(|| {
                        DecodeErrors::HuffmanDecode(format!(
                            "No DC Huffman table at index {}",
                            scan_comp.dc_table
                        ))
                    })?;

                self.bits.decode_huffman(source, table)?
            };

            if value > 16
            {
                return Err(DecodeErrors::HuffmanDecode(
                    "Excessive DC component, category above 16".to_string(),
                ));
            }

            let dc_delta = self.bits.receive_extend(source, value)?;

            // the predictor accumulates deltas across the scan
            dc[scan_comp.index] += dc_delta;

            block[0] = (dc[scan_comp.index] << shift) as i16;
        }

        if zig > zig_end
        {
            // a DC-only progressive scan
            return Ok(());
        }

        if self.eob_run > 0
        {
            // this block sits inside a pending end-of-band run, its band is
            // all zero
            self.eob_run -= 1;

            return Ok(());
        }

        // AC coefficients, a run/size symbol each
        while zig <= zig_end
        {
            let value = {
                let table = self.ac_huffman_tables[scan_comp.ac_table]
                    .as_ref()
                    .ok_or_else(|| {
                        DecodeErrors::HuffmanDecode(format!(
                            "No AC Huffman table at index {}",
                            scan_comp.ac_table
                        ))
                    })?;

                self.bits.decode_huffman(source, table)?
            };

            let run = i32::from(value >> 4);
            let size = value & 0x0F;

            if size != 0
            {
                zig += run;

                if zig > zig_end
                {
                    break;
                }

                let ac = self.bits.receive_extend(source, size)?;

                block[UN_ZIGZAG[zig as usize]] = (ac << shift) as i16;
            }
            else if run != 15
            {
                // end of band; runs above one block spill into the
                // following blocks of this scan
                self.eob_run = 1 << run;

                if run != 0
                {
                    self.eob_run |= self.bits.decode_bits(source, run)? as u16;
                }

                self.eob_run -= 1;

                break;
            }
            else
            {
                // ZRL, sixteen zeroes
                zig += 15;
            }

            zig += 1;
        }

        Ok(())
    }

    /// Check and consume the restart marker that must follow, then reset
    /// entropy state, sections F.2.1.3.1 and G.1.2.2.
    fn handle_restart<R: Read>(
        &mut self, source: &mut ByteSource<R>, expected_rst: &mut u8,
        dc: &mut [i32; MAX_COMPONENTS],
    ) -> Result<(), DecodeErrors>
    {
        // restart markers of well-formed input follow the MCU immediately,
        // we do not hunt for them
        let mut tmp = [0_u8; 2];

        source.read_full(&mut self.bits, &mut tmp)?;

        let expected = 0xD0 + *expected_rst;

        if tmp[0] != 0xFF || tmp[1] != expected
        {
            return Err(DecodeErrors::BadRestart {
                expected,
                found: tmp[1],
            });
        }

        // markers cycle RST0..RST7
        *expected_rst = (*expected_rst + 1) & 7;

        self.bits.reset();
        *dc = [0; MAX_COMPONENTS];
        self.eob_run = 0;

        Ok(())
    }

    /// Dequantize a block, inverse transform it and write the samples into
    /// the component's plane at block position `(bx, by)`.
    pub(crate) fn reconstruct_block(
        &mut self, block: &[i16; 64], bx: usize, by: usize, comp_index: usize,
    ) -> Result<(), DecodeErrors>
    {
        let qt_index = self.components[comp_index].quantization_table;

        let qt = self.qt_tables[qt_index].ok_or_else(|| {
            DecodeErrors::DqtError(format!(
                "No quantization table at index {qt_index} for component {comp_index}"
            ))
        })?;

        // multiply in zig-zag order, the table is stored that way
        let mut coeffs = [0_i32; 64];

        for (zig, qt_value) in qt.iter().enumerate()
        {
            let natural = UN_ZIGZAG[zig];

            coeffs[natural] = i32::from(block[natural]) * qt_value;
        }

        let component = &mut self.components[comp_index];
        let stride = component.width_stride;
        let offset = 8 * (by * stride + bx);

        idct_block(&mut coeffs, &mut component.samples[offset..], stride);

        Ok(())
    }
}
