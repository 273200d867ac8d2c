//! Final post-processing, sample planes to RGBA pixels
//!
//! By this point decoding proper is done and every plane is read-only, so
//! each output row depends on nothing but its own sources. Rows are split
//! into bands and fanned out over a scoped thread pool; with one thread we
//! just run the loop inline.

use crate::color_convert::{cmyk_row, grayscale_row, rgb_row, ycbcr_row, ycck_row};
use crate::decoder::Decoder;
use crate::errors::DecodeErrors;
use crate::misc::ColorModel;

/// Convert the decoder's sample planes into one dense RGBA buffer.
pub(crate) fn finish_to_rgba(decoder: &Decoder) -> Result<Vec<u8>, DecodeErrors>
{
    let model = decoder.color_model()?;

    let width = usize::from(decoder.width());
    let height = usize::from(decoder.height());
    let row_bytes = width * 4;

    let mut pixels = vec![0_u8; row_bytes * height];

    let threads = decoder.options.threads().min(height.max(1));

    info!(
        "Color converting {model:?} planes ({:?} subsampling) to RGBA with {threads} thread(s)",
        decoder.sub_sample_ratio
    );

    if threads <= 1
    {
        for (y, row) in pixels.chunks_exact_mut(row_bytes).enumerate()
        {
            convert_row(decoder, model, y, row);
        }

        return Ok(pixels);
    }

    let band_rows = (height + threads - 1) / threads;

    let mut pool = scoped_threadpool::Pool::new(threads as u32);

    pool.scoped(|scope| {
        for (band, rows) in pixels.chunks_mut(band_rows * row_bytes).enumerate()
        {
            scope.execute(move || {
                let base = band * band_rows;

                for (i, row) in rows.chunks_exact_mut(row_bytes).enumerate()
                {
                    convert_row(decoder, model, base + i, row);
                }
            });
        }
    });

    Ok(pixels)
}

/// Convert one output row.
///
/// Chroma and black rows are located with the per-component scales
/// `sx = h_max / h` and `sy = v_max / v`; SOF validation guarantees the
/// second and third components share factors and that the first and fourth
/// run at full resolution.
fn convert_row(decoder: &Decoder, model: ColorModel, y: usize, out: &mut [u8])
{
    let width = out.len() / 4;

    match model
    {
        ColorModel::Grayscale =>
        {
            let luma = &decoder.components[0];

            grayscale_row(&luma.samples[y * luma.width_stride..][..width], out);
        }
        ColorModel::YCbCr | ColorModel::Rgb =>
        {
            let luma = &decoder.components[0];
            let cb = &decoder.components[1];
            let cr = &decoder.components[2];

            let sx = decoder.h_max / cb.horizontal_sample;
            let sy = decoder.v_max / cb.vertical_sample;

            let luma_row = &luma.samples[y * luma.width_stride..][..width];
            let cb_row = &cb.samples[(y / sy) * cb.width_stride..];
            let cr_row = &cr.samples[(y / sy) * cr.width_stride..];

            if model == ColorModel::Rgb
            {
                rgb_row(luma_row, cb_row, cr_row, sx, out);
            }
            else
            {
                ycbcr_row(luma_row, cb_row, cr_row, sx, out);
            }
        }
        ColorModel::Cmyk | ColorModel::Ycck =>
        {
            let first = &decoder.components[0];
            let second = &decoder.components[1];
            let third = &decoder.components[2];
            let black = &decoder.components[3];

            let sx = decoder.h_max / second.horizontal_sample;
            let sy = decoder.v_max / second.vertical_sample;

            let first_row = &first.samples[y * first.width_stride..][..width];
            let second_row = &second.samples[(y / sy) * second.width_stride..];
            let third_row = &third.samples[(y / sy) * third.width_stride..];
            let black_row = &black.samples[y * black.width_stride..][..width];

            if model == ColorModel::Cmyk
            {
                cmyk_row(first_row, second_row, third_row, black_row, sx, out);
            }
            else
            {
                ycck_row(first_row, second_row, third_row, black_row, sx, out);
            }
        }
    }
}
