//! Per-component state extracted from a SOF header
//!
//! A component owns its reconstructed sample plane and, for progressive
//! images, the coefficient blocks refined across scans.

use crate::errors::DecodeErrors;

/// Component data from the start of frame
#[derive(Clone)]
pub(crate) struct Component
{
    /// Identifier byte from the SOF segment, matched against scan selectors
    pub id:                u8,
    /// Horizontal sampling factor, 1, 2 or 4
    pub horizontal_sample: usize,
    /// Vertical sampling factor, 1, 2 or 4
    pub vertical_sample:   usize,
    /// Quantization table selector, 0 to 3
    pub quantization_table: usize,
    /// How many samples to the next plane row
    pub width_stride:      usize,
    /// Reconstructed samples for this component
    pub samples:           Vec<u8>,
    /// Progressive coefficient store, one 64-entry block per 8x8 unit,
    /// flat-indexed by `64 * (by * mxx * h + bx)`. Empty for baseline.
    pub coeffs:            Vec<i16>,
}

impl Component
{
    /// Create a component from its three bytes in the start of frame.
    pub fn from(data: [u8; 3], position: usize) -> Result<Component, DecodeErrors>
    {
        let id = data[0];
        let horizontal_sample = usize::from(data[1] >> 4);
        let vertical_sample = usize::from(data[1] & 0x0F);
        let quantization_table = usize::from(data[2]);

        if quantization_table > 3
        {
            return Err(DecodeErrors::SofError(format!(
                "Too large quantization table selector {quantization_table}, expected a value between 0 and 3"
            )));
        }

        if !matches!(horizontal_sample, 1 | 2 | 4) || !matches!(vertical_sample, 1 | 2 | 4)
        {
            return Err(DecodeErrors::SofError(format!(
                "Invalid sampling factors ({horizontal_sample}, {vertical_sample}) for component {position}, expected 1, 2 or 4"
            )));
        }

        info!("Component ID:{id} HS:{horizontal_sample} VS:{vertical_sample} QT:{quantization_table}");

        Ok(Component {
            id,
            horizontal_sample,
            vertical_sample,
            quantization_table,
            // set once MCU geometry is known
            width_stride: 0,
            samples: vec![],
            coeffs: vec![],
        })
    }
}

/// The chroma subsampling ratios we can decode.
///
/// Derived from the ratio between the luma and chroma sampling factors,
/// `R422` for instance halves the chroma plane horizontally.
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub(crate) enum SubSampRatio
{
    R444,
    R422,
    R420,
    R440,
    R411,
    R410,
    /// Grayscale, or not yet determined
    None,
}

impl SubSampRatio
{
    /// Map the horizontal and vertical luma/chroma factor ratios to a tag.
    pub fn from_ratios(h_ratio: usize, v_ratio: usize) -> Option<SubSampRatio>
    {
        match (h_ratio, v_ratio)
        {
            (1, 1) => Some(SubSampRatio::R444),
            (1, 2) => Some(SubSampRatio::R440),
            (2, 1) => Some(SubSampRatio::R422),
            (2, 2) => Some(SubSampRatio::R420),
            (4, 1) => Some(SubSampRatio::R411),
            (4, 2) => Some(SubSampRatio::R410),
            (_, _) => None,
        }
    }
}
