//! End-to-end tests over synthesized progressive streams.

mod common;

use common::{ac_spec, dc_spec, BitWriter, Jpeg};
use duma_jpeg::Decoder;

/// Baseline equivalent of the progressive streams below: an 8x8 YCbCr
/// image with DC values 80, 0 and -80.
fn baseline_reference() -> Vec<u8> {
    let (dc, ac) = (dc_spec(), ac_spec());

    let mut jpeg = Jpeg::new();

    jpeg.app0_jfif(72, 72);
    jpeg.dqt_identity(0);
    jpeg.sof(0xC0, 8, 8, &[(1, 1, 1, 0), (2, 1, 1, 0), (3, 1, 1, 0)]);
    jpeg.dht(0, 0, &dc);
    jpeg.dht(1, 0, &ac);
    jpeg.sos(&[(1, 0, 0), (2, 0, 0), (3, 0, 0)], 0, 63, 0, 0);

    let mut writer = BitWriter::new();

    for value in [80, 0, -80] {
        writer.value(&dc, value);
        writer.code(&ac, 0x00);
    }

    jpeg.entropy(&writer.finish());
    jpeg.eoi()
}

#[test]
fn dc_scan_then_ac_scans_match_baseline() {
    // S3: an interleaved DC-only first scan, then one AC scan per
    // component covering the 1..63 band with nothing in it
    let (dc, ac) = (dc_spec(), ac_spec());

    let mut jpeg = Jpeg::new();

    jpeg.app0_jfif(72, 72);
    jpeg.dqt_identity(0);
    jpeg.sof(0xC2, 8, 8, &[(1, 1, 1, 0), (2, 1, 1, 0), (3, 1, 1, 0)]);
    jpeg.dht(0, 0, &dc);
    jpeg.sos(&[(1, 0, 0), (2, 0, 0), (3, 0, 0)], 0, 0, 0, 0);

    let mut writer = BitWriter::new();

    for value in [80, 0, -80] {
        writer.value(&dc, value);
    }

    jpeg.entropy(&writer.finish());

    jpeg.dht(1, 0, &ac);

    for id in [1, 2, 3] {
        jpeg.sos(&[(id, 0, 0)], 1, 63, 0, 0);

        let mut writer = BitWriter::new();

        writer.code(&ac, 0x00); // EOB, the whole band is zero

        jpeg.entropy(&writer.finish());
    }

    let data = jpeg.eoi();

    let mut progressive = Decoder::new();
    let pixels = progressive.decode_buffer(&data).unwrap();

    let mut baseline = Decoder::new();
    let expected = baseline.decode_buffer(&baseline_reference()).unwrap();

    assert!(progressive.info().unwrap().is_progressive);
    assert_eq!(pixels, expected);
}

#[test]
fn dc_successive_approximation() {
    // first scan sends the DC without its lowest bit, the refinement scan
    // supplies it; 40 << 1 | 1 == 81, every pixel lands on 138
    let dc = dc_spec();

    let mut jpeg = Jpeg::new();

    jpeg.dqt_identity(0);
    jpeg.sof(0xC2, 8, 8, &[(1, 1, 1, 0)]);
    jpeg.dht(0, 0, &dc);

    jpeg.sos(&[(1, 0, 0)], 0, 0, 0, 1);

    let mut writer = BitWriter::new();

    writer.value(&dc, 40);
    jpeg.entropy(&writer.finish());

    jpeg.sos(&[(1, 0, 0)], 0, 0, 1, 0);

    let mut writer = BitWriter::new();

    writer.put(1, 1); // the refinement bit, padding makes this byte 0xFF
    jpeg.entropy(&writer.finish());

    let data = jpeg.eoi();

    let mut decoder = Decoder::new();
    let pixels = decoder.decode_buffer(&data).unwrap();

    assert!(pixels.chunks_exact(4).all(|p| p == [138, 138, 138, 255]));
}

#[test]
fn ac_successive_approximation_matches_baseline() {
    // the coefficient at zig-zag position 1 arrives over two scans, first
    // as 1 << 1, then refined by one bit to 3
    let (dc, ac) = (dc_spec(), ac_spec());

    let mut jpeg = Jpeg::new();

    jpeg.dqt_identity(0);
    jpeg.sof(0xC2, 8, 8, &[(1, 1, 1, 0)]);
    jpeg.dht(0, 0, &dc);
    jpeg.dht(1, 0, &ac);

    // DC scan, value zero
    jpeg.sos(&[(1, 0, 0)], 0, 0, 0, 0);

    let mut writer = BitWriter::new();

    writer.value(&dc, 0);
    jpeg.entropy(&writer.finish());

    // AC first pass at Al = 1, run 0 size 1, positive sign
    jpeg.sos(&[(1, 0, 0)], 1, 63, 0, 1);

    let mut writer = BitWriter::new();

    writer.code(&ac, 0x01);
    writer.put(1, 1); // magnitude bit
    writer.code(&ac, 0x00); // EOB
    jpeg.entropy(&writer.finish());

    // AC refinement at Ah = 1: EOB immediately, then one correction bit
    // for the existing coefficient
    jpeg.sos(&[(1, 0, 0)], 1, 63, 1, 0);

    let mut writer = BitWriter::new();

    writer.code(&ac, 0x00);
    writer.put(1, 1);
    jpeg.entropy(&writer.finish());

    let data = jpeg.eoi();

    let mut decoder = Decoder::new();
    let pixels = decoder.decode_buffer(&data).unwrap();

    // baseline image with the same final coefficients
    let mut jpeg = Jpeg::new();

    jpeg.dqt_identity(0);
    jpeg.sof(0xC0, 8, 8, &[(1, 1, 1, 0)]);
    jpeg.dht(0, 0, &dc);
    jpeg.dht(1, 0, &ac);
    jpeg.sos(&[(1, 0, 0)], 0, 63, 0, 0);

    let mut writer = BitWriter::new();

    writer.value(&dc, 0);
    writer.code(&ac, 0x02); // run 0, size 2
    writer.put(3, 2);
    writer.code(&ac, 0x00);
    jpeg.entropy(&writer.finish());

    let mut baseline = Decoder::new();
    let expected = baseline.decode_buffer(&jpeg.eoi()).unwrap();

    assert_eq!(pixels, expected);
}

/// A 24x16 4:2:0 progressive stream. The interleaved DC scan covers eight
/// luma blocks, the non-interleaved luma AC scan only the six whose top
/// left corner is inside the image.
fn subsampled_24x16(luma_ac: impl FnOnce(&mut BitWriter)) -> Vec<u8> {
    let (dc, ac) = (dc_spec(), ac_spec());

    let mut jpeg = Jpeg::new();

    jpeg.app0_jfif(72, 72);
    jpeg.dqt_identity(0);
    jpeg.sof(0xC2, 24, 16, &[(1, 2, 2, 0), (2, 1, 1, 0), (3, 1, 1, 0)]);
    jpeg.dht(0, 0, &dc);
    jpeg.sos(&[(1, 0, 0), (2, 0, 0), (3, 0, 0)], 0, 0, 0, 0);

    let mut writer = BitWriter::new();

    // two MCUs, each four luma blocks plus one Cb and one Cr
    for _ in 0..12 {
        writer.value(&dc, 0);
    }

    jpeg.entropy(&writer.finish());

    jpeg.dht(1, 0, &ac);

    // luma AC band
    jpeg.sos(&[(1, 0, 0)], 1, 63, 0, 0);

    let mut writer = BitWriter::new();

    luma_ac(&mut writer);
    jpeg.entropy(&writer.finish());

    // chroma AC bands, two blocks each
    for id in [2, 3] {
        jpeg.sos(&[(id, 0, 0)], 1, 63, 0, 0);

        let mut writer = BitWriter::new();

        for _ in 0..2 {
            writer.code(&ac, 0x00);
        }

        jpeg.entropy(&writer.finish());
    }

    jpeg.eoi()
}

#[test]
fn non_interleaved_scan_skips_out_of_bounds_blocks() {
    // exactly six EOB symbols; a decoder visiting eight blocks would read
    // past them and fail
    let ac = ac_spec();
    let data = subsampled_24x16(|writer| {
        for _ in 0..6 {
            writer.code(&ac, 0x00);
        }
    });

    let mut decoder = Decoder::new();
    let pixels = decoder.decode_buffer(&data).unwrap();

    assert_eq!(pixels.len(), 24 * 16 * 4);
    assert!(pixels.chunks_exact(4).all(|p| p == [128, 128, 128, 255]));
}

#[test]
fn eob_run_spans_blocks() {
    // a single EOB run of six covers the whole luma band scan
    let ac = ac_spec();
    let data = subsampled_24x16(|writer| {
        writer.code(&ac, 0x20); // EOB run, category 2
        writer.put(2, 2); // 4 + 2 blocks
    });

    let mut decoder = Decoder::new();
    let pixels = decoder.decode_buffer(&data).unwrap();

    assert!(pixels.chunks_exact(4).all(|p| p == [128, 128, 128, 255]));
}
