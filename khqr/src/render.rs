//! QR image rendering and transaction hashing.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;

use crate::Result;

/// md5 hex digest of the payload — the key the Bakong gateway is queried by.
pub fn transaction_md5(payload: &str) -> String {
    format!("{:x}", md5::compute(payload.as_bytes()))
}

/// Render the payload as a PNG wrapped in a `data:` URL, directly usable as
/// an `<img>` source with no further fetch.
pub fn qr_png_data_url(payload: &str) -> Result<String> {
    let code = QrCode::new(payload.as_bytes())?;
    let img = code
        .render::<Luma<u8>>()
        .min_dimensions(320, 320)
        .build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(img).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

    Ok(format!("data:image/png;base64,{}", STANDARD.encode(&png)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_known_vector() {
        assert_eq!(transaction_md5("hello"), "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn data_url_shape() {
        let url = qr_png_data_url("00020101021129150011sokha@devb6304ABCD").unwrap();
        let b64 = url.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = STANDARD.decode(b64).unwrap();
        // PNG magic header.
        assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
