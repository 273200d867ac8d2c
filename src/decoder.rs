//! Main decoder logic, the segment state machine and its entry points
#![allow(clippy::doc_markdown)]

use std::io::{Cursor, Read};
use std::num::NonZeroUsize;
use std::path::Path;

use crate::bitstream::BitStream;
use crate::components::{Component, SubSampRatio};
use crate::errors::{DecodeErrors, UnsupportedSchemes};
use crate::headers::{
    parse_app0, parse_app1, parse_app14, parse_dqt, parse_huffman, parse_sos,
    parse_start_of_frame,
};
use crate::huffman::HuffmanTable;
use crate::image::{ImageSink, RgbaImage};
use crate::marker::Marker;
use crate::misc::ColorModel;
use crate::source::ByteSource;
use crate::worker;

/// Maximum components in a frame
pub(crate) const MAX_COMPONENTS: usize = 4;

/// Maximum number of pixels we will decode
pub(crate) const MAX_DIMENSIONS: usize = 1 << 27;

/// Knobs for a decode, set once and handed to [`Decoder::new_with_options`].
#[derive(Copy, Clone, Debug)]
pub struct DecoderOptions
{
    max_width:   u16,
    max_height:  u16,
    num_threads: Option<NonZeroUsize>,
    strict_mode: bool,
}

impl Default for DecoderOptions
{
    fn default() -> Self
    {
        DecoderOptions {
            max_width: u16::MAX,
            max_height: u16::MAX,
            num_threads: None,
            strict_mode: false,
        }
    }
}

impl DecoderOptions
{
    #[must_use]
    pub fn new() -> DecoderOptions
    {
        DecoderOptions::default()
    }

    /// Reject images wider than `width` pixels.
    #[must_use]
    pub fn set_max_width(mut self, width: u16) -> Self
    {
        self.max_width = width;
        self
    }

    /// Reject images taller than `height` pixels.
    #[must_use]
    pub fn set_max_height(mut self, height: u16) -> Self
    {
        self.max_height = height;
        self
    }

    /// Number of threads for the color conversion stage.
    ///
    /// Defaults to the number of CPUs; decoding itself is always serial.
    #[must_use]
    pub fn set_num_threads(mut self, threads: NonZeroUsize) -> Self
    {
        self.num_threads = Some(threads);
        self
    }

    /// Error out on oddities a lenient decoder would shrug at, currently
    /// extraneous bytes between marker segments.
    #[must_use]
    pub fn set_strict_mode(mut self, strict: bool) -> Self
    {
        self.strict_mode = strict;
        self
    }

    #[must_use]
    pub fn get_max_width(&self) -> u16
    {
        self.max_width
    }

    #[must_use]
    pub fn get_max_height(&self) -> u16
    {
        self.max_height
    }

    #[must_use]
    pub fn get_strict_mode(&self) -> bool
    {
        self.strict_mode
    }

    pub(crate) fn threads(&self) -> usize
    {
        self.num_threads.map_or_else(num_cpus::get, NonZeroUsize::get)
    }
}

/// A struct representing image information
#[derive(Default, Clone, Eq, PartialEq, Debug)]
pub struct ImageInfo
{
    /// Width of the image
    pub width:          u16,
    /// Height of the image
    pub height:         u16,
    /// Number of components, 1, 3 or 4
    pub components:     u8,
    /// Whether the image uses progressive encoding
    pub is_progressive: bool,
    /// Horizontal pixel density from JFIF, zero when absent
    pub x_density:      u16,
    /// Vertical pixel density from JFIF, zero when absent
    pub y_density:      u16,
}

/// A JPEG decoder instance.
///
/// One instance decodes one image; every buffer it allocates lives and dies
/// with it.
pub struct Decoder
{
    /// Image information picked up from the headers
    pub(crate) info: ImageInfo,
    /// Quantization tables in zig-zag order
    pub(crate) qt_tables: [Option<[i32; 64]>; MAX_COMPONENTS],
    /// DC Huffman tables, up to four
    pub(crate) dc_huffman_tables: [Option<HuffmanTable>; MAX_COMPONENTS],
    /// AC Huffman tables, up to four
    pub(crate) ac_huffman_tables: [Option<HuffmanTable>; MAX_COMPONENTS],
    /// Image components from the SOF header, with their planes
    pub(crate) components: Vec<Component>,
    /// Maximum horizontal sampling factor of all components
    pub(crate) h_max: usize,
    /// Maximum vertical sampling factor of all components
    pub(crate) v_max: usize,
    /// Number of MCUs across
    pub(crate) mcu_x: usize,
    /// Number of MCUs down
    pub(crate) mcu_y: usize,
    /// Whether the frame uses progressive encoding
    pub(crate) is_progressive: bool,
    /// Chroma subsampling descriptor, for the curious and the logs
    pub(crate) sub_sample_ratio: SubSampRatio,
    /// MCUs between restart markers, zero when unused
    pub(crate) restart_interval: usize,
    /// Pending end-of-band run shared by progressive AC scans
    pub(crate) eob_run: u16,
    /// The entropy bit accumulator
    pub(crate) bits: BitStream,
    /// An APP0 segment said this is a JFIF stream
    pub(crate) is_jfif: bool,
    /// An APP14 Adobe segment was present
    pub(crate) adobe_transform_valid: bool,
    /// The Adobe color transform byte, meaningful with the flag above
    pub(crate) adobe_transform: u8,
    /// Raw EXIF payload waiting to be handed to the sink
    pub(crate) exif: Option<Vec<u8>>,
    /// Sample planes (and progressive stores) have been allocated
    pub(crate) planes_made: bool,
    /// Number of entropy-coded scans fully decoded
    pub(crate) scans_processed: usize,
    /// Decode options
    pub(crate) options: DecoderOptions,
}

impl Decoder
{
    /// Create a decoder with default options.
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Decoder
    {
        Decoder::new_with_options(DecoderOptions::default())
    }

    /// Create a decoder with the given options.
    #[must_use]
    pub fn new_with_options(options: DecoderOptions) -> Decoder
    {
        Decoder {
            info: ImageInfo::default(),
            qt_tables: [None; MAX_COMPONENTS],
            dc_huffman_tables: [None, None, None, None],
            ac_huffman_tables: [None, None, None, None],
            components: vec![],
            h_max: 1,
            v_max: 1,
            mcu_x: 0,
            mcu_y: 0,
            is_progressive: false,
            sub_sample_ratio: SubSampRatio::None,
            restart_interval: 0,
            eob_run: 0,
            bits: BitStream::new(),
            is_jfif: false,
            adobe_transform_valid: false,
            adobe_transform: 0,
            exif: None,
            planes_made: false,
            scans_processed: 0,
            options,
        }
    }

    /// Decode a JPEG stream into the given sink.
    ///
    /// With `metadata_only` the call returns after the first SOF when the
    /// stream is JFIF, otherwise at SOS, delivering resolution and EXIF
    /// metadata but no pixels.
    ///
    /// # Errors
    /// See [`DecodeErrors`] for everything that can go wrong.
    pub fn decode<R, S>(
        &mut self, reader: R, image: &mut S, metadata_only: bool,
    ) -> Result<(), DecodeErrors>
    where
        R: Read,
        S: ImageSink,
    {
        let mut source = ByteSource::new(reader);

        self.decode_internal(&mut source, image, metadata_only)
    }

    /// Decode a buffer already in memory, returning the RGBA pixels.
    ///
    /// # Errors
    /// See [`DecodeErrors`].
    pub fn decode_buffer(&mut self, buffer: &[u8]) -> Result<Vec<u8>, DecodeErrors>
    {
        let mut image = RgbaImage::default();

        self.decode(Cursor::new(buffer), &mut image, false)?;

        Ok(image.pixels)
    }

    /// Decode a JPEG file, returning the RGBA pixels.
    ///
    /// # Errors
    /// See [`DecodeErrors`].
    pub fn decode_file<P>(&mut self, path: P) -> Result<Vec<u8>, DecodeErrors>
    where
        P: AsRef<Path>,
    {
        let file = std::fs::File::open(path)?;

        let mut image = RgbaImage::default();

        self.decode(file, &mut image, false)?;

        Ok(image.pixels)
    }

    /// Read only the headers of an image buffer.
    ///
    /// Useful to learn dimensions and component count without paying for a
    /// full decode.
    ///
    /// # Errors
    /// See [`DecodeErrors`].
    pub fn read_headers(&mut self, buffer: &[u8]) -> Result<(), DecodeErrors>
    {
        let mut image = RgbaImage::default();

        self.decode(Cursor::new(buffer), &mut image, true)
    }

    /// Image information gathered so far.
    ///
    /// Returns `None` before a successful header parse.
    #[must_use]
    pub fn info(&self) -> Option<ImageInfo>
    {
        if self.info.width == 0
        {
            return None;
        }

        Some(self.info.clone())
    }

    /// Width of the image in pixels.
    #[must_use]
    pub fn width(&self) -> u16
    {
        self.info.width
    }

    /// Height of the image in pixels.
    #[must_use]
    pub fn height(&self) -> u16
    {
        self.info.height
    }

    /// The marker segment state machine.
    fn decode_internal<R, S>(
        &mut self, source: &mut ByteSource<R>, image: &mut S, metadata_only: bool,
    ) -> Result<(), DecodeErrors>
    where
        R: Read,
        S: ImageSink,
    {
        let mut tmp = [0_u8; 2];

        source.read_full(&mut self.bits, &mut tmp)?;

        if tmp != [0xFF, 0xD8]
        {
            return Err(DecodeErrors::IllegalMagicBytes(u16::from_be_bytes(tmp)));
        }

        loop
        {
            source.read_full(&mut self.bits, &mut tmp)?;

            // Markers begin with 0xFF. libjpeg silently slides over
            // extraneous bytes before one and so do we, strict mode excepted
            let mut extraneous = 0_usize;

            while tmp[0] != 0xFF
            {
                tmp[0] = tmp[1];
                tmp[1] = source.read_byte()?;
                extraneous += 1;
            }

            if extraneous > 0
            {
                // the tail of an entropy segment legitimately rolls back up
                // to two bytes, anything beyond that is junk
                if self.options.strict_mode && extraneous > 3
                {
                    return Err(DecodeErrors::FormatStatic(
                        "[strict-mode]: extraneous bytes between marker segments",
                    ));
                }

                debug!("Skipped {extraneous} byte(s) before a marker");
            }

            let mut marker = tmp[1];

            if marker == 0x00
            {
                // a stray 0xFF 0x00 escape outside entropy data, skip it
                continue;
            }

            // B.1.1.2, markers may be preceded by any number of fill bytes
            while marker == 0xFF
            {
                marker = source.read_byte()?;
            }

            if marker == 0xD9
            {
                debug!("EOI marker, image data complete");
                break;
            }

            if (0xD0..=0xD7).contains(&marker)
            {
                // a restart marker outside a scan carries no data, some
                // encoders emit one after the final entropy segment
                warn!("RST{} marker outside a scan, ignoring", marker - 0xD0);
                continue;
            }

            source.read_full(&mut self.bits, &mut tmp)?;

            let Some(length) = usize::from(u16::from_be_bytes(tmp)).checked_sub(2)
            else
            {
                return Err(DecodeErrors::FormatStatic("Marker segment length below 2"));
            };

            match Marker::from_u8(marker)
            {
                Some(Marker::SOF(sof @ (0 | 1 | 2))) =>
                {
                    self.is_progressive = sof == 2;

                    info!(
                        "Image encoding scheme: {}",
                        match sof
                        {
                            0 => "Baseline DCT",
                            1 => "Extended sequential DCT, Huffman coding",
                            _ => "Progressive DCT, Huffman coding",
                        }
                    );

                    parse_start_of_frame(self, source, length)?;

                    self.info.is_progressive = self.is_progressive;

                    if metadata_only && self.is_jfif
                    {
                        self.deliver_metadata(image);

                        return Ok(());
                    }
                }
                Some(Marker::SOF(sof)) =>
                {
                    let scheme = UnsupportedSchemes::from_int(0xFFC0 | u16::from(sof))
                        .unwrap_or(UnsupportedSchemes::Other(sof));

                    return Err(DecodeErrors::Unsupported(scheme));
                }
                Some(Marker::DHT) =>
                {
                    if metadata_only
                    {
                        source.skip(&mut self.bits, length)?;
                    }
                    else
                    {
                        parse_huffman(self, source, length)?;
                    }
                }
                Some(Marker::DQT) =>
                {
                    if metadata_only
                    {
                        source.skip(&mut self.bits, length)?;
                    }
                    else
                    {
                        parse_dqt(self, source, length)?;
                    }
                }
                Some(Marker::DRI) =>
                {
                    if length != 2
                    {
                        return Err(DecodeErrors::FormatStatic("Bad DRI length, corrupt JPEG"));
                    }

                    source.read_full(&mut self.bits, &mut tmp)?;

                    self.restart_interval = usize::from(u16::from_be_bytes(tmp));

                    info!("Restart interval: {} MCUs", self.restart_interval);
                }
                Some(Marker::SOS) =>
                {
                    if metadata_only
                    {
                        self.deliver_metadata(image);

                        return Ok(());
                    }

                    let scan = parse_sos(self, source, length)?;

                    self.decode_scan(source, &scan)?;

                    self.scans_processed += 1;
                }
                Some(Marker::APP(0)) => parse_app0(self, source, length)?,
                Some(Marker::APP(1)) => parse_app1(self, source, length)?,
                Some(Marker::APP(14)) => parse_app14(self, source, length)?,
                Some(Marker::APP(n)) =>
                {
                    warn!("Skipping APP{n} segment, {length} bytes");

                    source.skip(&mut self.bits, length)?;
                }
                Some(Marker::COM) =>
                {
                    warn!("Skipping comment segment, {length} bytes");

                    source.skip(&mut self.bits, length)?;
                }
                Some(Marker::DAC) =>
                {
                    return Err(DecodeErrors::FormatStatic(
                        "Arithmetic coding is not supported",
                    ));
                }
                Some(other) =>
                {
                    return Err(DecodeErrors::Format(format!(
                        "Cannot process marker {other:?} at this position"
                    )));
                }
                None =>
                {
                    return Err(DecodeErrors::Format(format!(
                        "Unknown marker 0xFF{marker:02X}"
                    )));
                }
            }
        }

        if self.components.is_empty()
        {
            return Err(DecodeErrors::FormatStatic("Missing SOF marker"));
        }

        if self.scans_processed == 0
        {
            return Err(DecodeErrors::FormatStatic("Missing SOS marker"));
        }

        if self.is_progressive
        {
            // every scan has refined its band, now run the deferred
            // dequantize/IDCT over the accumulated coefficients
            self.reconstruct_progressive()?;
        }

        let pixels = worker::finish_to_rgba(self)?;

        self.deliver_metadata(image);

        image.set_pixels(
            usize::from(self.info.width),
            usize::from(self.info.height),
            pixels,
        );

        debug!("Finished decoding image");

        Ok(())
    }

    /// Hand resolution and EXIF data to the sink.
    fn deliver_metadata<S: ImageSink>(&mut self, image: &mut S)
    {
        if self.is_jfif
        {
            image.set_resolution(self.info.x_density, self.info.y_density);
        }

        if let Some(profile) = self.exif.take()
        {
            image.set_exif_profile(profile);
        }
    }

    /// Allocate sample planes (and progressive coefficient stores) for every
    /// component, done at the first SOS.
    pub(crate) fn make_planes(&mut self) -> Result<(), DecodeErrors>
    {
        let (mxx, myy) = (self.mcu_x, self.mcu_y);
        let progressive = self.is_progressive;

        for component in &mut self.components
        {
            component.width_stride = 8 * component.horizontal_sample * mxx;

            let plane_height = 8 * component.vertical_sample * myy;

            component.samples = vec![0; component.width_stride * plane_height];

            if progressive
            {
                // one i16 per coefficient, the same count as samples
                component.coeffs = vec![0; component.width_stride * plane_height];
            }
        }

        if self.components.len() >= 3
        {
            let chroma_h = self.components[1].horizontal_sample;
            let chroma_v = self.components[1].vertical_sample;

            self.sub_sample_ratio =
                SubSampRatio::from_ratios(self.h_max / chroma_h, self.v_max / chroma_v)
                    .ok_or_else(|| {
                        DecodeErrors::SofError("Unsupported subsampling ratio".to_string())
                    })?;

            info!("Subsampling ratio: {:?}", self.sub_sample_ratio);
        }

        Ok(())
    }

    /// Decide how the decoded planes map to RGB, section "color conversion"
    /// of the usual lore:
    ///
    /// - one component is grayscale
    /// - three components are RGB only when the stream is not JFIF and
    ///   either Adobe says "no transform" or the component ids literally
    ///   spell R, G, B; otherwise YCbCr
    /// - four components need the Adobe marker to tell CMYK from YCbCrK
    pub(crate) fn color_model(&self) -> Result<ColorModel, DecodeErrors>
    {
        match self.components.len()
        {
            1 => Ok(ColorModel::Grayscale),
            3 =>
            {
                if self.is_rgb()
                {
                    Ok(ColorModel::Rgb)
                }
                else
                {
                    Ok(ColorModel::YCbCr)
                }
            }
            4 =>
            {
                if !self.adobe_transform_valid
                {
                    return Err(DecodeErrors::UnknownColorModel);
                }

                if self.adobe_transform == 0
                {
                    Ok(ColorModel::Cmyk)
                }
                else
                {
                    Ok(ColorModel::Ycck)
                }
            }
            _ => Err(DecodeErrors::FormatStatic("Invalid component count")),
        }
    }

    fn is_rgb(&self) -> bool
    {
        if self.is_jfif
        {
            return false;
        }

        if self.adobe_transform_valid && self.adobe_transform == 0
        {
            return true;
        }

        self.components[0].id == b'R'
            && self.components[1].id == b'G'
            && self.components[2].id == b'B'
    }
}
