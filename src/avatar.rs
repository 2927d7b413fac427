//! Avatar upload handling: multipart extraction, checks, and normalization.

use actix_multipart::Multipart;
use futures::{StreamExt, TryStreamExt};
use image::imageops::FilterType;
use image::ImageFormat;
use regex::Regex;
use std::io::Cursor;

use crate::error::AppError;

/// Multipart field that carries the upload.
pub const AVATAR_FIELD: &str = "avatar";
/// Largest accepted upload, in bytes.
pub const MAX_AVATAR_BYTES: usize = 1_000_000;
/// Stored avatars are exactly this many pixels wide and high.
pub const AVATAR_SIZE: u32 = 250;

lazy_static::lazy_static! {
    static ref IMAGE_FILENAME: Regex = Regex::new(r"\.(jpg|jpeg|png)$").unwrap();
}

pub fn is_image_filename(filename: &str) -> bool {
    IMAGE_FILENAME.is_match(filename)
}

fn not_an_image() -> AppError {
    AppError::BadRequest("Please upload an image.".into())
}

/// Reads the `avatar` field out of a multipart body.
///
/// The filename is checked before any bytes are buffered, and reading stops as soon
/// as the upload exceeds [`MAX_AVATAR_BYTES`]. Other fields are drained and ignored.
pub async fn read_avatar_field(mut payload: Multipart) -> Result<Vec<u8>, AppError> {
    let mut upload = None;

    while let Some(mut field) = payload.try_next().await? {
        let disposition = field.content_disposition();
        if disposition.get_name() != Some(AVATAR_FIELD) || upload.is_some() {
            while field.next().await.is_some() {}
            continue;
        }

        let filename = disposition.get_filename().unwrap_or_default().to_string();
        if !is_image_filename(&filename) {
            log::debug!("rejecting avatar upload named '{}'", filename);
            return Err(not_an_image());
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            if bytes.len() + chunk.len() > MAX_AVATAR_BYTES {
                return Err(AppError::BadRequest("File too large".into()));
            }
            bytes.extend_from_slice(&chunk);
        }
        upload = Some(bytes);
    }

    upload.ok_or_else(not_an_image)
}

/// Decodes an uploaded image, crops it to fill 250x250 and re-encodes it as PNG.
pub fn normalize(bytes: &[u8]) -> Result<Vec<u8>, AppError> {
    let image = image::load_from_memory(bytes)?;
    let resized = image.resize_to_fill(AVATAR_SIZE, AVATAR_SIZE, FilterType::Lanczos3);

    let mut png = Vec::new();
    resized.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}
