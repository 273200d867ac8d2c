//! Parsers for the marker segments the decoder acts on
//!
//! Every parser receives the payload length already read by the marker loop
//! (segment length minus the two length bytes) and must consume exactly that
//! many bytes from the source.
//!
//! A good guide on markers can be found [here](http://vip.sugovica.hu/Sardi/kepnezo/JPEG%20File%20Layout%20and%20Format.htm)

use std::io::Read;

use crate::components::Component;
use crate::decoder::{Decoder, MAX_DIMENSIONS};
use crate::errors::DecodeErrors;
use crate::huffman::HuffmanTable;
use crate::source::ByteSource;

/// One component's slice of a scan, resolved back to SOF order.
pub(crate) struct ScanComponent
{
    /// Index into the decoder's component list
    pub index:    usize,
    /// DC Huffman table selector for this scan
    pub dc_table: usize,
    /// AC Huffman table selector for this scan
    pub ac_table: usize,
}

/// Everything a single SOS header tells us.
pub(crate) struct ScanHeader
{
    pub components: Vec<ScanComponent>,
    /// Start of the spectral band, zig-zag index
    pub spec_start: u8,
    /// End of the spectral band, inclusive
    pub spec_end:   u8,
    /// Successive approximation bit position high
    pub succ_high:  u8,
    /// Successive approximation bit position low
    pub succ_low:   u8,
}

/// **B.2.4.2 Huffman table-specification syntax**
///
/// A single DHT segment may carry several tables, each a 17 byte header
/// (class/destination plus the 16 length counts) followed by the values.
pub(crate) fn parse_huffman<R>(
    decoder: &mut Decoder, source: &mut ByteSource<R>, mut length: usize,
) -> Result<(), DecodeErrors>
where
    R: Read,
{
    while length > 0
    {
        if length < 17
        {
            return Err(DecodeErrors::HuffmanDecode(format!(
                "DHT segment has {length} bytes left, too short for a table header"
            )));
        }

        let mut header = [0_u8; 17];

        source.read_full(&mut decoder.bits, &mut header)?;
        length -= 17;

        let table_class = header[0] >> 4;
        let index = usize::from(header[0] & 0x0F);

        if table_class > 1
        {
            return Err(DecodeErrors::HuffmanDecode(format!(
                "Bad Tc value {table_class}, expected 0 (DC) or 1 (AC)"
            )));
        }

        if index > 3
        {
            return Err(DecodeErrors::HuffmanDecode(format!(
                "Bad Th value {index}, expected a value between 0 and 3"
            )));
        }

        let mut counts = [0_u8; 16];

        counts.copy_from_slice(&header[1..]);

        let n_codes = counts.iter().map(|count| usize::from(*count)).sum::<usize>();

        if length < n_codes
        {
            return Err(DecodeErrors::HuffmanDecode(format!(
                "DHT table claims {n_codes} values but the segment has {length} bytes left"
            )));
        }

        let mut values = vec![0_u8; n_codes];

        source.read_full(&mut decoder.bits, &mut values)?;
        length -= n_codes;

        let table = HuffmanTable::new(&counts, &values)?;

        debug!(
            "DHT {} table {} with {} codes",
            if table_class == 0 { "DC" } else { "AC" },
            index,
            table.n_codes
        );

        if table_class == 0
        {
            decoder.dc_huffman_tables[index] = Some(table);
        }
        else
        {
            decoder.ac_huffman_tables[index] = Some(table);
        }
    }

    Ok(())
}

/// **B.2.4.1 Quantization table-specification syntax**
///
/// Tables are stored in zig-zag order and stay that way; dequantization
/// walks them in zig-zag order too.
pub(crate) fn parse_dqt<R>(
    decoder: &mut Decoder, source: &mut ByteSource<R>, mut length: usize,
) -> Result<(), DecodeErrors>
where
    R: Read,
{
    while length > 0
    {
        let qt_info = source.read_byte()?;

        length -= 1;

        // 0 = one byte per entry, 1 = two big-endian bytes per entry
        let precision = qt_info >> 4;
        let position = usize::from(qt_info & 0x0F);

        if position > 3
        {
            return Err(DecodeErrors::DqtError(format!(
                "Bad Tq value {position}, expected a value between 0 and 3"
            )));
        }

        let mut table = [0_i32; 64];

        match precision
        {
            0 =>
            {
                if length < 64
                {
                    return Err(DecodeErrors::DqtError(
                        "Not enough bytes for an 8-bit quantization table".to_string(),
                    ));
                }

                let mut values = [0_u8; 64];

                source.read_full(&mut decoder.bits, &mut values)?;
                length -= 64;

                for (entry, value) in table.iter_mut().zip(values.iter())
                {
                    *entry = i32::from(*value);
                }
            }
            1 =>
            {
                if length < 128
                {
                    return Err(DecodeErrors::DqtError(
                        "Not enough bytes for a 16-bit quantization table".to_string(),
                    ));
                }

                let mut values = [0_u8; 128];

                source.read_full(&mut decoder.bits, &mut values)?;
                length -= 128;

                for (entry, value) in table.iter_mut().zip(values.chunks_exact(2))
                {
                    *entry = i32::from(u16::from_be_bytes([value[0], value[1]]));
                }
            }
            _ =>
            {
                return Err(DecodeErrors::DqtError(format!(
                    "Bad Pq value {precision}, expected 0 or 1"
                )));
            }
        }

        decoder.qt_tables[position] = Some(table);
    }

    Ok(())
}

/// **B.2.2 Frame header syntax**
pub(crate) fn parse_start_of_frame<R>(
    decoder: &mut Decoder, source: &mut ByteSource<R>, length: usize,
) -> Result<(), DecodeErrors>
where
    R: Read,
{
    if !decoder.components.is_empty()
    {
        return Err(DecodeErrors::SofError(
            "Multiple SOF markers in one image".to_string(),
        ));
    }

    // 6 fixed bytes plus three per component, 1, 3 or 4 components
    let num_components = match length
    {
        9 => 1,
        15 => 3,
        18 => 4,
        _ =>
        {
            return Err(DecodeErrors::SofError(format!(
                "Unsupported number of components, SOF payload of {length} bytes"
            )));
        }
    };

    let mut buf = [0_u8; 18];

    source.read_full(&mut decoder.bits, &mut buf[..length])?;

    let precision = buf[0];

    if precision != 8
    {
        return Err(DecodeErrors::SofError(format!(
            "The library only supports 8-bit precision, the image has {precision} bits"
        )));
    }

    let height = u16::from_be_bytes([buf[1], buf[2]]);
    let width = u16::from_be_bytes([buf[3], buf[4]]);

    if width == 0 || height == 0
    {
        return Err(DecodeErrors::ZeroError);
    }

    let dimensions = usize::from(width) * usize::from(height);

    if dimensions > MAX_DIMENSIONS
    {
        return Err(DecodeErrors::LargeDimensions(dimensions));
    }

    if width > decoder.options.get_max_width() || height > decoder.options.get_max_height()
    {
        return Err(DecodeErrors::Format(format!(
            "Image dimensions {}x{} exceed the configured limits of {}x{}",
            width,
            height,
            decoder.options.get_max_width(),
            decoder.options.get_max_height()
        )));
    }

    if usize::from(buf[5]) != num_components
    {
        return Err(DecodeErrors::SofError(format!(
            "SOF length implies {} components but the header says {}",
            num_components, buf[5]
        )));
    }

    let mut components = Vec::with_capacity(num_components);

    for i in 0..num_components
    {
        let component = Component::from([buf[6 + 3 * i], buf[7 + 3 * i], buf[8 + 3 * i]], i)?;

        // B.2.2, component identifiers must be unique
        if components.iter().any(|other: &Component| other.id == component.id)
        {
            return Err(DecodeErrors::SofError(format!(
                "Repeated component identifier {}",
                component.id
            )));
        }

        components.push(component);
    }

    validate_sampling_factors(&mut components)?;

    decoder.h_max = components.iter().map(|c| c.horizontal_sample).max().unwrap_or(1);
    decoder.v_max = components.iter().map(|c| c.vertical_sample).max().unwrap_or(1);

    // number of MCUs each way, rounding partial ones up
    decoder.mcu_x = (usize::from(width) + decoder.h_max * 8 - 1) / (decoder.h_max * 8);
    decoder.mcu_y = (usize::from(height) + decoder.v_max * 8 - 1) / (decoder.v_max * 8);

    decoder.components = components;

    decoder.info.width = width;
    decoder.info.height = height;
    decoder.info.components = num_components as u8;

    info!("Image dimensions: {width}x{height}, {num_components} component(s)");

    Ok(())
}

/// Enforce the factor combinations the decoder knows how to lay out.
fn validate_sampling_factors(components: &mut [Component]) -> Result<(), DecodeErrors>
{
    match components.len()
    {
        1 =>
        {
            // A.2.2, single component scans are non-interleaved regardless
            // of the declared factors, the effective ratio is always 1x1
            components[0].horizontal_sample = 1;
            components[0].vertical_sample = 1;
        }
        3 =>
        {
            let (h0, v0) = (components[0].horizontal_sample, components[0].vertical_sample);

            // luma with v == 4 would need chroma ratios we cannot express
            if v0 == 4
            {
                return Err(DecodeErrors::SofError(
                    "Unsupported subsampling ratio, luma vertical factor of 4".to_string(),
                ));
            }

            let (h1, v1) = (components[1].horizontal_sample, components[1].vertical_sample);

            if h0 % h1 != 0 || v0 % v1 != 0
            {
                return Err(DecodeErrors::SofError(
                    "Unsupported subsampling ratio, chroma factors do not divide luma factors"
                        .to_string(),
                ));
            }

            if components[2].horizontal_sample != h1 || components[2].vertical_sample != v1
            {
                return Err(DecodeErrors::SofError(
                    "Unsupported subsampling ratio, Cb and Cr factors differ".to_string(),
                ));
            }
        }
        4 =>
        {
            // only the two factor patterns seen in the wild, all-1x1 and
            // 2x2 on the first and fourth component
            let factors: Vec<(usize, usize)> = components
                .iter()
                .map(|c| (c.horizontal_sample, c.vertical_sample))
                .collect();

            let all_ones = factors.iter().all(|f| *f == (1, 1));
            let two_two = factors == [(2, 2), (1, 1), (1, 1), (2, 2)];

            if !all_ones && !two_two
            {
                return Err(DecodeErrors::SofError(
                    "Unsupported subsampling factors for a 4-component image".to_string(),
                ));
            }
        }
        _ => unreachable!("component count checked at the call site"),
    }

    Ok(())
}

/// **B.2.3 Scan header syntax**
pub(crate) fn parse_sos<R>(
    decoder: &mut Decoder, source: &mut ByteSource<R>, length: usize,
) -> Result<ScanHeader, DecodeErrors>
where
    R: Read,
{
    if decoder.components.is_empty()
    {
        return Err(DecodeErrors::SosError(
            "SOS marker without a preceding SOF".to_string(),
        ));
    }

    if !(6..=12).contains(&length) || length % 2 != 0
    {
        return Err(DecodeErrors::SosError(format!(
            "Bad SOS length {length}, corrupt JPEG"
        )));
    }

    let mut buf = [0_u8; 12];

    source.read_full(&mut decoder.bits, &mut buf[..length])?;

    let ns = usize::from(buf[0]);

    if length != 4 + 2 * ns
    {
        return Err(DecodeErrors::SosError(format!(
            "SOS length {length} inconsistent with {ns} scan components"
        )));
    }

    let mut scan_components: Vec<ScanComponent> = Vec::with_capacity(ns);
    let mut total_hv = 0;

    for i in 0..ns
    {
        let selector = buf[1 + 2 * i];

        let index = decoder
            .components
            .iter()
            .position(|component| component.id == selector)
            .ok_or_else(|| {
                DecodeErrors::SosError(format!("Unknown component selector {selector}"))
            })?;

        // B.2.3, each selector shall differ from the ones before it
        if scan_components.iter().any(|sc| sc.index == index)
        {
            return Err(DecodeErrors::SosError(format!(
                "Repeated component selector {selector}"
            )));
        }

        total_hv += decoder.components[index].horizontal_sample
            * decoder.components[index].vertical_sample;

        let tables = buf[2 + 2 * i];
        let dc_table = usize::from(tables >> 4);
        let ac_table = usize::from(tables & 0x0F);

        if dc_table > 3 || ac_table > 3
        {
            return Err(DecodeErrors::SosError(format!(
                "Bad Td/Ta byte {tables:#04x}, table selectors run from 0 to 3"
            )));
        }

        scan_components.push(ScanComponent {
            index,
            dc_table,
            ac_table,
        });
    }

    // B.2.3, an interleaved scan may cover at most 10 data units per MCU
    if ns > 1 && total_hv > 10
    {
        return Err(DecodeErrors::SosError(format!(
            "Total sampling factors {total_hv} too large for an interleaved scan"
        )));
    }

    // spectral selection and successive approximation, hard-coded for
    // sequential scans as per table B.3
    let (mut spec_start, mut spec_end) = (0, 63);
    let (mut succ_high, mut succ_low) = (0, 0);

    if decoder.is_progressive
    {
        spec_start = buf[1 + 2 * ns];
        spec_end = buf[2 + 2 * ns];
        succ_high = buf[3 + 2 * ns] >> 4;
        succ_low = buf[3 + 2 * ns] & 0x0F;

        if spec_start > spec_end || spec_end > 63 || (spec_start == 0 && spec_end != 0)
        {
            return Err(DecodeErrors::SosError(format!(
                "Bad spectral selection bounds {spec_start}..{spec_end}"
            )));
        }

        if spec_start != 0 && ns != 1
        {
            return Err(DecodeErrors::SosError(
                "Progressive AC scans must have exactly one component".to_string(),
            ));
        }

        if succ_high != 0 && succ_high != succ_low + 1
        {
            return Err(DecodeErrors::SosError(format!(
                "Bad successive approximation values, Ah {succ_high} with Al {succ_low}"
            )));
        }
    }

    Ok(ScanHeader {
        components: scan_components,
        spec_start,
        spec_end,
        succ_high,
        succ_low,
    })
}

/// APP0, we only care whether it marks the stream as JFIF and, if so, the
/// declared pixel density.
pub(crate) fn parse_app0<R>(
    decoder: &mut Decoder, source: &mut ByteSource<R>, length: usize,
) -> Result<(), DecodeErrors>
where
    R: Read,
{
    // identifier(5) version(2) units(1) x-density(2) y-density(2)
    if length < 12
    {
        return source.skip(&mut decoder.bits, length);
    }

    let mut buf = [0_u8; 12];

    source.read_full(&mut decoder.bits, &mut buf)?;

    if &buf[..5] == b"JFIF\x00"
    {
        decoder.is_jfif = true;
        decoder.info.x_density = u16::from_be_bytes([buf[8], buf[9]]);
        decoder.info.y_density = u16::from_be_bytes([buf[10], buf[11]]);

        info!(
            "JFIF stream, density {}x{}",
            decoder.info.x_density, decoder.info.y_density
        );
    }

    source.skip(&mut decoder.bits, length - 12)
}

/// APP1, holds the EXIF profile when the payload announces one.
pub(crate) fn parse_app1<R>(
    decoder: &mut Decoder, source: &mut ByteSource<R>, length: usize,
) -> Result<(), DecodeErrors>
where
    R: Read,
{
    if length < 6
    {
        return source.skip(&mut decoder.bits, length);
    }

    let mut buf = [0_u8; 6];

    source.read_full(&mut decoder.bits, &mut buf)?;

    // DC-008 section 4.5.4
    if &buf == b"Exif\x00\x00"
    {
        let mut profile = vec![0_u8; length - 6];

        source.read_full(&mut decoder.bits, &mut profile)?;

        info!("EXIF profile, {} bytes", profile.len());

        decoder.exif = Some(profile);

        return Ok(());
    }

    source.skip(&mut decoder.bits, length - 6)
}

/// APP14, the Adobe segment whose transform byte drives CMYK/YCCK handling.
pub(crate) fn parse_app14<R>(
    decoder: &mut Decoder, source: &mut ByteSource<R>, length: usize,
) -> Result<(), DecodeErrors>
where
    R: Read,
{
    // "Adobe"(5) version(2) flags0(2) flags1(2) transform(1)
    if length < 12
    {
        return source.skip(&mut decoder.bits, length);
    }

    let mut buf = [0_u8; 12];

    source.read_full(&mut decoder.bits, &mut buf)?;

    if &buf[..5] == b"Adobe"
    {
        decoder.adobe_transform_valid = true;
        decoder.adobe_transform = buf[11];

        info!("Adobe APP14 segment, transform {}", decoder.adobe_transform);
    }

    source.skip(&mut decoder.bits, length - 12)
}
