//! Frame files on disk, decoded and encoded through the `image` crate.
//!
//! Input frames are PNM (normally binary PGM, `P5`); previews are PNG.

use crate::error::FrameError;
use crate::types::Frame;
use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{ExtendedColorType, GrayImage, ImageEncoder, ImageFormat};
use std::io::{self, ErrorKind, Write};

/// Decode a PNM image to an 8-bit grayscale frame. Color and 16-bit inputs
/// are converted. Anything the decoder rejects, including headers whose
/// size exceeds its allocation limits, is a corrupt frame.
pub fn decode_pnm(data: &[u8], origin: &str) -> Result<Frame, FrameError> {
    let image = image::load_from_memory_with_format(data, ImageFormat::Pnm)
        .map_err(|e| FrameError::Corrupt {
            origin: origin.to_string(),
            reason: e.to_string(),
        })?
        .into_luma8();
    let (width, height) = image.dimensions();
    Frame::new(width as usize, height as usize, image.into_raw())
}

/// Write `frame` as a binary PGM with maxval 255.
pub fn encode_pgm<W: Write>(frame: &Frame, out: &mut W) -> io::Result<()> {
    let (width, height) = image_size(frame)?;
    PnmEncoder::new(out)
        .with_subtype(PnmSubtype::Graymap(SampleEncoding::Binary))
        .write_image(&frame.pixels, width, height, ExtendedColorType::L8)
        .map_err(io::Error::other)
}

pub fn to_gray_image(frame: &Frame) -> io::Result<GrayImage> {
    let (width, height) = image_size(frame)?;
    GrayImage::from_raw(width, height, frame.pixels.clone()).ok_or_else(|| {
        io::Error::new(ErrorKind::InvalidInput, "pixel buffer does not match frame size")
    })
}

fn image_size(frame: &Frame) -> io::Result<(u32, u32)> {
    let side = |d: usize| {
        u32::try_from(d).map_err(|_| io::Error::new(ErrorKind::InvalidInput, "frame too large to encode"))
    };
    Ok((side(frame.width)?, side(frame.height)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pgm_file_matches_frame() {
        let mut frame = Frame::filled(5, 3, 10);
        frame.row_mut(1).copy_from_slice(&[0, 64, 128, 192, 255]);
        let mut buf = Vec::new();
        encode_pgm(&frame, &mut buf).unwrap();
        assert!(buf.starts_with(b"P5"));
        assert_eq!(decode_pnm(&buf, "mem").unwrap(), frame);
    }

    #[test]
    fn test_decode_header_comments() {
        let mut data = b"P5\n# made by hand\n2 1\n255\n".to_vec();
        data.extend_from_slice(&[0, 200]);
        let frame = decode_pnm(&data, "mem").unwrap();
        assert_eq!((frame.width, frame.height), (2, 1));
        assert_eq!(frame.pixels, vec![0, 200]);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        let cases: [&[u8]; 4] = [
            b"",
            b"not an image",
            b"P5\n2 x\n255\n",
            b"P5\n4 4\n255\n\x01\x02",
        ];
        for data in cases {
            assert!(matches!(decode_pnm(data, "f.pgm"), Err(FrameError::Corrupt { .. })));
        }
    }

    #[test]
    fn test_decode_oversized_header_is_corrupt() {
        let data = b"P5\n4294967297 4294967297\n255\n\x00";
        match decode_pnm(data, "huge.pgm") {
            Err(FrameError::Corrupt { origin, .. }) => assert_eq!(origin, "huge.pgm"),
            other => panic!("expected corrupt frame, got {:?}", other),
        }
        assert!(decode_pnm(b"P5\n5000 5000\n255\n\x00", "tall.pgm").is_err());
    }

    #[test]
    fn test_to_gray_image() {
        let mut frame = Frame::filled(3, 2, 0);
        frame.row_mut(1)[2] = 99;
        let image = to_gray_image(&frame).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(2, 1)[0], 99);
    }
}
