//! JPEG marker byte assignments, ITU T.81 table B.1

/// Markers that may appear in a JPEG stream.
///
/// A marker is the byte following an unescaped `0xFF` in the stream.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
#[allow(clippy::upper_case_acronyms)]
pub enum Marker {
    /// Start of frame, the parameter carries the SOF type (0-15)
    SOF(u8),
    /// Define Huffman table
    DHT,
    /// Define arithmetic coding conditioning
    DAC,
    /// Restart marker (0-7)
    RST(u8),
    /// Start of image
    SOI,
    /// End of image
    EOI,
    /// Start of scan
    SOS,
    /// Define quantization table
    DQT,
    /// Define number of lines
    DNL,
    /// Define restart interval
    DRI,
    /// Application segment (0-15)
    APP(u8),
    /// Comment
    COM,
}

impl Marker {
    /// Convert a byte to a marker.
    ///
    /// Returns `None` for bytes that do not name a marker we can act on,
    /// which includes `0x00` (a stuffed byte) and `0xFF` (a fill byte).
    #[must_use]
    pub fn from_u8(byte: u8) -> Option<Marker> {
        use self::Marker::{APP, COM, DAC, DHT, DNL, DQT, DRI, EOI, RST, SOF, SOI, SOS};

        match byte {
            0xc0..=0xc3 | 0xc5..=0xc7 | 0xc9..=0xcb | 0xcd..=0xcf => Some(SOF(byte - 0xc0)),
            0xc4 => Some(DHT),
            0xcc => Some(DAC),
            0xd0..=0xd7 => Some(RST(byte - 0xd0)),
            0xd8 => Some(SOI),
            0xd9 => Some(EOI),
            0xda => Some(SOS),
            0xdb => Some(DQT),
            0xdc => Some(DNL),
            0xdd => Some(DRI),
            0xe0..=0xef => Some(APP(byte - 0xe0)),
            0xfe => Some(COM),
            _ => None,
        }
    }
}
