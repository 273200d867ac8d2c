//! End-to-end tests over synthesized baseline streams.

mod common;

use std::io::Cursor;

use common::{ac_spec, dc_spec, BitWriter, Jpeg};
use duma_jpeg::{probe, DecodeErrors, Decoder, RgbaImage};

/// A grayscale baseline image, one block per DC value, laid out
/// left-to-right, top-to-bottom. All AC coefficients are zero.
fn gray_baseline(width: u16, height: u16, dc_values: &[i32]) -> Vec<u8> {
    let (dc, ac) = (dc_spec(), ac_spec());

    let mut jpeg = Jpeg::new();

    jpeg.app0_jfif(72, 72);
    jpeg.dqt_identity(0);
    jpeg.sof(0xC0, width, height, &[(1, 1, 1, 0)]);
    jpeg.dht(0, 0, &dc);
    jpeg.dht(1, 0, &ac);
    jpeg.sos(&[(1, 0, 0)], 0, 63, 0, 0);

    let mut writer = BitWriter::new();
    let mut predictor = 0;

    for value in dc_values {
        writer.value(&dc, value - predictor);
        writer.code(&ac, 0x00); // EOB
        predictor = *value;
    }

    jpeg.entropy(&writer.finish());
    jpeg.eoi()
}

#[test]
fn minimal_grayscale_block() {
    // S1: single 8x8 block, DC 0, every pixel level-shifts to gray
    let data = gray_baseline(8, 8, &[0]);

    let mut decoder = Decoder::new();
    let pixels = decoder.decode_buffer(&data).unwrap();

    assert_eq!((decoder.width(), decoder.height()), (8, 8));
    assert_eq!(pixels.len(), 8 * 8 * 4);
    assert!(pixels.chunks_exact(4).all(|p| p == [128, 128, 128, 255]));
}

#[test]
fn grayscale_partial_mcu() {
    // 11x9 needs 2x2 blocks, the output must crop back to 11x9
    let data = gray_baseline(11, 9, &[0, 0, 0, 0]);

    let mut decoder = Decoder::new();
    let pixels = decoder.decode_buffer(&data).unwrap();

    assert_eq!((decoder.width(), decoder.height()), (11, 9));
    assert_eq!(pixels.len(), 11 * 9 * 4);
    assert!(pixels.chunks_exact(4).all(|p| p == [128, 128, 128, 255]));
}

#[test]
fn ycbcr_420_single_mcu() {
    // S2: one 16x16 MCU, four luma blocks then Cb then Cr, everything zero
    // decodes to neutral gray
    let (dc, ac) = (dc_spec(), ac_spec());

    let mut jpeg = Jpeg::new();

    jpeg.app0_jfif(72, 72);
    jpeg.dqt_identity(0);
    jpeg.sof(0xC0, 16, 16, &[(1, 2, 2, 0), (2, 1, 1, 0), (3, 1, 1, 0)]);
    jpeg.dht(0, 0, &dc);
    jpeg.dht(1, 0, &ac);
    jpeg.sos(&[(1, 0, 0), (2, 0, 0), (3, 0, 0)], 0, 63, 0, 0);

    let mut writer = BitWriter::new();

    for _ in 0..6 {
        writer.value(&dc, 0);
        writer.code(&ac, 0x00);
    }

    jpeg.entropy(&writer.finish());

    let data = jpeg.eoi();

    let mut decoder = Decoder::new();
    let pixels = decoder.decode_buffer(&data).unwrap();

    assert_eq!(pixels.len(), 16 * 16 * 4);
    assert!(pixels.chunks_exact(4).all(|p| p == [128, 128, 128, 255]));
}

/// S4: restart interval of one MCU over three grayscale blocks, each with a
/// DC delta of 10. The decoder must reset predictors at each marker.
fn restart_stream(second_marker: u8) -> Vec<u8> {
    let (dc, ac) = (dc_spec(), ac_spec());

    let mut jpeg = Jpeg::new();

    jpeg.app0_jfif(72, 72);
    jpeg.dqt_identity(0);
    jpeg.sof(0xC0, 24, 8, &[(1, 1, 1, 0)]);
    jpeg.dht(0, 0, &dc);
    jpeg.dht(1, 0, &ac);
    jpeg.dri(1);
    jpeg.sos(&[(1, 0, 0)], 0, 63, 0, 0);

    for interval in 0..3 {
        let mut writer = BitWriter::new();

        writer.value(&dc, 10);
        writer.code(&ac, 0x00);
        jpeg.entropy(&writer.finish());

        match interval {
            0 => jpeg.rst(0),
            1 => jpeg.out.extend([0xFF, second_marker]),
            _ => {} // no marker after the final MCU
        }
    }

    jpeg.eoi()
}

#[test]
fn restart_resets_dc_predictors() {
    let data = restart_stream(0xD1);

    let mut decoder = Decoder::new();
    let pixels = decoder.decode_buffer(&data).unwrap();

    // with predictors reset, every block sees the same DC of 10; if they
    // accumulated, the second and third block would come out brighter
    assert!(pixels.chunks_exact(4).all(|p| p == [129, 129, 129, 255]));
}

#[test]
fn misnamed_restart_marker_is_an_error() {
    // RST2 where RST1 must appear
    let data = restart_stream(0xD2);

    let mut decoder = Decoder::new();
    let err = decoder.decode_buffer(&data).unwrap_err();

    assert!(matches!(
        err,
        DecodeErrors::BadRestart {
            expected: 0xD1,
            found: 0xD2
        }
    ));
}

#[test]
fn stuffed_ff_inside_entropy_data() {
    // S5: DC 2047 encodes to a literal 0xFF byte, which the stream carries
    // as 0xFF 0x00; the pair must decode as one data byte, not a marker
    let data = gray_baseline(8, 8, &[2047]);

    assert!(
        data.windows(2).any(|w| w == [0xFF, 0x00]),
        "test stream should exercise byte stuffing"
    );

    let mut decoder = Decoder::new();
    let pixels = decoder.decode_buffer(&data).unwrap();

    // 128 + 2047/8 clamps to white
    assert!(pixels.chunks_exact(4).all(|p| p == [255, 255, 255, 255]));
}

/// A 4-component 8x8 image with all-1x1 factors. `dc_values` are per
/// component, `adobe` the APP14 transform byte if any.
fn four_component(adobe: Option<u8>, dc_values: [i32; 4]) -> Vec<u8> {
    let (dc, ac) = (dc_spec(), ac_spec());

    let mut jpeg = Jpeg::new();

    if let Some(transform) = adobe {
        jpeg.app14_adobe(transform);
    }

    jpeg.dqt_identity(0);
    jpeg.sof(
        0xC0,
        8,
        8,
        &[(1, 1, 1, 0), (2, 1, 1, 0), (3, 1, 1, 0), (4, 1, 1, 0)],
    );
    jpeg.dht(0, 0, &dc);
    jpeg.dht(1, 0, &ac);
    jpeg.sos(&[(1, 0, 0), (2, 0, 0), (3, 0, 0), (4, 0, 0)], 0, 63, 0, 0);

    let mut writer = BitWriter::new();

    for value in dc_values {
        writer.value(&dc, value);
        writer.code(&ac, 0x00);
    }

    jpeg.entropy(&writer.finish());
    jpeg.eoi()
}

#[test]
fn cmyk_without_adobe_marker_is_rejected() {
    // S6: no APP14, the color model cannot be determined
    let data = four_component(None, [0; 4]);

    let mut decoder = Decoder::new();
    let err = decoder.decode_buffer(&data).unwrap_err();

    assert!(matches!(err, DecodeErrors::UnknownColorModel));
}

#[test]
fn cmyk_with_adobe_transform_zero() {
    let data = four_component(Some(0), [0; 4]);

    let mut decoder = Decoder::new();
    let pixels = decoder.decode_buffer(&data).unwrap();

    // all planes sit at 128, inverted-CMYK composition gives 128*128/255
    assert!(pixels.chunks_exact(4).all(|p| p == [64, 64, 64, 255]));
}

#[test]
fn ycck_with_adobe_transform_two() {
    // K plane saturates to 255 (no ink), the YCbCr part is neutral gray
    let data = four_component(Some(2), [0, 0, 0, 1016]);

    let mut decoder = Decoder::new();
    let pixels = decoder.decode_buffer(&data).unwrap();

    assert!(pixels.chunks_exact(4).all(|p| p == [128, 128, 128, 255]));
}

/// An 8x8 3-component image whose ids literally spell R, G, B and whose DC
/// values put the planes at 138, 128 and 118.
fn rgb_identified(with_jfif: bool) -> Vec<u8> {
    let (dc, ac) = (dc_spec(), ac_spec());

    let mut jpeg = Jpeg::new();

    if with_jfif {
        jpeg.app0_jfif(72, 72);
    }

    jpeg.dqt_identity(0);
    jpeg.sof(0xC0, 8, 8, &[(b'R', 1, 1, 0), (b'G', 1, 1, 0), (b'B', 1, 1, 0)]);
    jpeg.dht(0, 0, &dc);
    jpeg.dht(1, 0, &ac);
    jpeg.sos(&[(b'R', 0, 0), (b'G', 0, 0), (b'B', 0, 0)], 0, 63, 0, 0);

    let mut writer = BitWriter::new();

    for value in [80, 0, -80] {
        writer.value(&dc, value);
        writer.code(&ac, 0x00);
    }

    jpeg.entropy(&writer.finish());
    jpeg.eoi()
}

#[test]
fn rgb_component_ids_decode_without_transform() {
    let data = rgb_identified(false);

    let mut decoder = Decoder::new();
    let pixels = decoder.decode_buffer(&data).unwrap();

    // planes pass through untouched
    assert!(pixels.chunks_exact(4).all(|p| p == [138, 128, 118, 255]));
}

#[test]
fn jfif_always_means_ycbcr() {
    // same stream plus a JFIF APP0: the R/G/B ids no longer matter
    let data = rgb_identified(true);

    let mut decoder = Decoder::new();
    let pixels = decoder.decode_buffer(&data).unwrap();

    // ycbcr(138, 128, 118)
    assert!(pixels.chunks_exact(4).all(|p| p == [124, 145, 138, 255]));
}

#[test]
fn sixteen_bit_quantization_table() {
    let (dc, ac) = (dc_spec(), ac_spec());

    let mut jpeg = Jpeg::new();

    jpeg.dqt_identity_16bit(0);
    jpeg.sof(0xC0, 8, 8, &[(1, 1, 1, 0)]);
    jpeg.dht(0, 0, &dc);
    jpeg.dht(1, 0, &ac);
    jpeg.sos(&[(1, 0, 0)], 0, 63, 0, 0);

    let mut writer = BitWriter::new();

    writer.value(&dc, 16);
    writer.code(&ac, 0x00);

    jpeg.entropy(&writer.finish());

    let data = jpeg.eoi();

    let mut decoder = Decoder::new();
    let pixels = decoder.decode_buffer(&data).unwrap();

    // 128 + 16/8
    assert!(pixels.chunks_exact(4).all(|p| p == [130, 130, 130, 255]));
}

#[test]
fn comment_segments_are_skipped() {
    let (dc, ac) = (dc_spec(), ac_spec());

    let mut jpeg = Jpeg::new();

    jpeg.segment(0xFE, b"written by a test");
    jpeg.dqt_identity(0);
    jpeg.sof(0xC0, 8, 8, &[(1, 1, 1, 0)]);
    jpeg.dht(0, 0, &dc);
    jpeg.dht(1, 0, &ac);
    jpeg.sos(&[(1, 0, 0)], 0, 63, 0, 0);

    let mut writer = BitWriter::new();

    writer.value(&dc, 0);
    writer.code(&ac, 0x00);

    jpeg.entropy(&writer.finish());

    let data = jpeg.eoi();

    assert!(Decoder::new().decode_buffer(&data).is_ok());
}

#[test]
fn metadata_only_returns_after_jfif_sof() {
    let data = gray_baseline(8, 8, &[0]);

    let mut decoder = Decoder::new();
    let mut image = RgbaImage::default();

    decoder
        .decode(Cursor::new(data.as_slice()), &mut image, true)
        .unwrap();

    assert_eq!((image.x_density, image.y_density), (72, 72));
    assert!(image.pixels.is_empty());

    let info = decoder.info().unwrap();

    assert_eq!((info.width, info.height, info.components), (8, 8, 1));
    assert!(!info.is_progressive);
}

#[test]
fn exif_profile_reaches_the_sink() {
    let (dc, ac) = (dc_spec(), ac_spec());
    let profile = [0x4D, 0x4D, 0x00, 0x2A, 1, 2, 3, 4];

    let mut jpeg = Jpeg::new();

    jpeg.app1_exif(&profile);
    jpeg.dqt_identity(0);
    jpeg.sof(0xC0, 8, 8, &[(1, 1, 1, 0)]);
    jpeg.dht(0, 0, &dc);
    jpeg.dht(1, 0, &ac);
    jpeg.sos(&[(1, 0, 0)], 0, 63, 0, 0);

    let mut writer = BitWriter::new();

    writer.value(&dc, 0);
    writer.code(&ac, 0x00);

    jpeg.entropy(&writer.finish());

    let data = jpeg.eoi();

    let mut decoder = Decoder::new();
    let mut image = RgbaImage::default();

    decoder
        .decode(Cursor::new(data.as_slice()), &mut image, false)
        .unwrap();

    assert_eq!(image.exif.as_deref(), Some(profile.as_slice()));
    assert_eq!(image.pixels.len(), 8 * 8 * 4);
}

#[test]
fn truncated_stream_reports_eof() {
    let mut data = gray_baseline(8, 8, &[0]);

    data.truncate(12);

    let mut decoder = Decoder::new();
    let err = decoder.decode_buffer(&data).unwrap_err();

    assert!(matches!(err, DecodeErrors::ExhaustedData));
}

#[test]
fn missing_soi_is_rejected() {
    let mut decoder = Decoder::new();
    let err = decoder.decode_buffer(&[0x89, 0x50, 0x4E, 0x47]).unwrap_err();

    assert!(matches!(err, DecodeErrors::IllegalMagicBytes(0x8950)));
}

#[test]
fn missing_sos_is_rejected() {
    let mut jpeg = Jpeg::new();

    jpeg.dqt_identity(0);
    jpeg.sof(0xC0, 8, 8, &[(1, 1, 1, 0)]);

    let data = jpeg.eoi();

    let mut decoder = Decoder::new();
    let err = decoder.decode_buffer(&data).unwrap_err();

    assert!(matches!(err, DecodeErrors::FormatStatic(s) if s.contains("SOS")));
}

#[test]
fn probe_recognizes_jpeg_streams() {
    assert!(probe(&gray_baseline(8, 8, &[0])));
    assert!(!probe(b"definitely not a jpeg"));
}
