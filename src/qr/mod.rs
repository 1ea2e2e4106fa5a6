//! QR-coded item labels.
//!
//! A label encodes the JSON form of a [`QrPayload`]: the item record with its
//! creation date shortened to a display date. Payloads are built on demand and
//! never stored.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use image::{imageops, DynamicImage, ImageFormat, Luma};
use qrcode::render::unicode;
use qrcode::{EcLevel, QrCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use strum::{Display, EnumString};
use tracing::debug;

use crate::errors::ServiceError;
use crate::models::ItemRecord;

pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Edge length of a rendered label in pixels.
pub const DEFAULT_LABEL_SIZE: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum CorrectionLevel {
    L,
    #[default]
    M,
    Q,
    H,
}

impl From<CorrectionLevel> for EcLevel {
    fn from(level: CorrectionLevel) -> Self {
        match level {
            CorrectionLevel::L => EcLevel::L,
            CorrectionLevel::M => EcLevel::M,
            CorrectionLevel::Q => EcLevel::Q,
            CorrectionLevel::H => EcLevel::H,
        }
    }
}

/// Display copy of an item record carried inside the QR code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    pub store_name: String,
    pub item_id: String,
    pub item_type: String,
    pub weight: Decimal,
    pub purity: String,
    pub total_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hallmark: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Creation date as `M/D/YYYY`
    pub date_created: String,
    pub date_modified: DateTime<Utc>,
    pub id: String,
}

impl QrPayload {
    pub fn from_record(record: &ItemRecord) -> Self {
        Self {
            store_name: record.store_name.clone(),
            item_id: record.item_id.clone(),
            item_type: record.item_type.clone(),
            weight: record.weight,
            purity: record.purity.clone(),
            total_price: record.total_price,
            size: record.size.clone(),
            color: record.color.clone(),
            hallmark: record.hallmark.clone(),
            description: record.description.clone(),
            date_created: display_date(&record.date_created),
            date_modified: record.date_modified,
            id: record.id.clone(),
        }
    }

    /// Compact JSON encoded into the symbol.
    pub fn to_json(&self) -> Result<String, ServiceError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Pretty JSON offered for "copy data".
    pub fn clipboard_text(&self) -> Result<String, ServiceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Suggested file name for a saved label, e.g. `NGP0007_QR.png`.
    pub fn file_name(&self) -> String {
        format!("{}_QR.png", self.item_id)
    }
}

/// Short display date used on labels, e.g. `3/1/2024`.
pub fn display_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%-m/%-d/%Y").to_string()
}

/// A rendered label image.
#[derive(Debug, Clone)]
pub struct RenderedLabel {
    pub payload: QrPayload,
    /// PNG-encoded grayscale image
    pub png: Vec<u8>,
    pub size_px: u32,
}

impl RenderedLabel {
    /// `data:image/png;base64,...` form of the image.
    pub fn data_url(&self) -> String {
        format!("{}{}", PNG_DATA_URL_PREFIX, STANDARD.encode(&self.png))
    }

    pub fn file_name(&self) -> String {
        self.payload.file_name()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LabelRenderer {
    size_px: u32,
    level: CorrectionLevel,
}

impl Default for LabelRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_LABEL_SIZE, CorrectionLevel::M)
    }
}

impl LabelRenderer {
    pub fn new(size_px: u32, level: CorrectionLevel) -> Self {
        Self { size_px, level }
    }

    fn encode(&self, payload: &QrPayload) -> Result<QrCode, ServiceError> {
        let json = payload.to_json()?;
        Ok(QrCode::with_error_correction_level(
            json.as_bytes(),
            self.level.into(),
        )?)
    }

    /// Renders the payload as a square PNG of the configured size.
    pub fn render(&self, payload: &QrPayload) -> Result<RenderedLabel, ServiceError> {
        let code = self.encode(payload)?;
        let mut image = code
            .render::<Luma<u8>>()
            .min_dimensions(self.size_px, self.size_px)
            .build();
        if image.width() != self.size_px || image.height() != self.size_px {
            image = imageops::resize(
                &image,
                self.size_px,
                self.size_px,
                imageops::FilterType::Nearest,
            );
        }

        let mut png = Vec::new();
        DynamicImage::ImageLuma8(image).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        debug!(item_id = %payload.item_id, bytes = png.len(), "Rendered label");

        Ok(RenderedLabel {
            payload: payload.clone(),
            png,
            size_px: self.size_px,
        })
    }

    /// Renders the payload with half-block characters for a terminal.
    pub fn render_terminal(&self, payload: &QrPayload) -> Result<String, ServiceError> {
        let code = self.encode(payload)?;
        Ok(code
            .render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .build())
    }
}
