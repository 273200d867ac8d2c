//! Output interfaces
//!
//! The decoder core always produces planar byte samples internally and hands
//! its collaborator one dense row-major RGBA buffer at the end, plus any
//! metadata it came across on the way. Anything fancier, packing, color
//! management, incremental display, belongs to the sink.

/// Receiver for the decoded image and its metadata.
pub trait ImageSink
{
    /// Receive the finished image as a dense row-major RGBA buffer.
    fn set_pixels(&mut self, width: usize, height: usize, pixels: Vec<u8>);

    /// Receive the pixel density recorded in a JFIF APP0 segment.
    fn set_resolution(&mut self, x_density: u16, y_density: u16)
    {
        let _ = (x_density, y_density);
    }

    /// Receive the raw EXIF profile of an APP1 segment.
    fn set_exif_profile(&mut self, profile: Vec<u8>)
    {
        let _ = profile;
    }
}

/// A plain RGBA image buffer, the sink behind the convenience entry points.
#[derive(Default, Debug)]
pub struct RgbaImage
{
    /// Width in pixels
    pub width:     usize,
    /// Height in pixels
    pub height:    usize,
    /// Dense row-major RGBA bytes, `width * height * 4` of them
    pub pixels:    Vec<u8>,
    /// Horizontal pixel density from JFIF, zero when absent
    pub x_density: u16,
    /// Vertical pixel density from JFIF, zero when absent
    pub y_density: u16,
    /// Raw EXIF payload when the image carried one
    pub exif:      Option<Vec<u8>>,
}

impl ImageSink for RgbaImage
{
    fn set_pixels(&mut self, width: usize, height: usize, pixels: Vec<u8>)
    {
        self.width = width;
        self.height = height;
        self.pixels = pixels;
    }

    fn set_resolution(&mut self, x_density: u16, y_density: u16)
    {
        self.x_density = x_density;
        self.y_density = y_density;
    }

    fn set_exif_profile(&mut self, profile: Vec<u8>)
    {
        self.exif = Some(profile);
    }
}
