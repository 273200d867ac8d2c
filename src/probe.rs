use crate::Decoder;

/// Probe a buffer and return whether it looks like a JPEG image we can
/// decode.
///
/// This parses headers only, no entropy decoding or post processing runs.
#[must_use]
pub fn probe(buffer: &[u8]) -> bool
{
    let mut decoder = Decoder::new();

    decoder.read_headers(buffer).is_ok()
}
