//! Builders for source images and file records.

#![allow(dead_code)]

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

use icon_worker::db::{FileRecord, ProcessingStatus};

/// Encodes a solid-color image in the given format.
pub fn solid_image(width: u32, height: u32, color: [u8; 3], format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), format)
        .expect("Failed to encode test image");
    out
}

pub fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    solid_image(width, height, color, ImageFormat::Png)
}

pub fn solid_jpeg(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    solid_image(width, height, color, ImageFormat::Jpeg)
}

/// A fully transparent PNG, to exercise alpha flattening.
pub fn transparent_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 0]));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .expect("Failed to encode test image");
    out
}

/// Builder for `FileRecord` fixtures.
pub struct RecordBuilder {
    record: FileRecord,
}

impl RecordBuilder {
    pub fn new(id: i32) -> Self {
        Self {
            record: FileRecord::pending(id, format!("raw/{}.jpg", id)),
        }
    }

    pub fn source_path(mut self, path: &str) -> Self {
        self.record.source_path = Some(path.to_string());
        self
    }

    pub fn no_source_path(mut self) -> Self {
        self.record.source_path = None;
        self
    }

    pub fn status(mut self, status: ProcessingStatus) -> Self {
        self.record.status = status;
        self
    }

    pub fn build(self) -> FileRecord {
        self.record
    }
}
