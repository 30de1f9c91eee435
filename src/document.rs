//! Builds the downloadable learning record (`.docx`).
//!
//! Assembly happens in two steps. [`LearningRecord::assemble`] turns the
//! generated text and uploads into plain data, decoding every photo up front
//! so a bad one becomes a [`PhotoOutcome::Failed`] instead of an error.
//! [`LearningRecord::to_docx`] then renders that data with `docx-rs`.

use std::io::Cursor;

use docx_rs::{BreakType, Docx, Paragraph, Pic, Run, Style, StyleType};
use thiserror::Error;

pub const DOCUMENT_TITLE: &str = "學習歷程紀錄";
pub const PHOTOS_HEADING: &str = "活動照片";
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Display width of every embedded photo.
pub const PHOTO_WIDTH_INCHES: u32 = 4;
const EMU_PER_INCH: u32 = 914_400;

const TITLE_STYLE: &str = "Title";
const HEADING_STYLE: &str = "Heading1";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to write document: {0}")]
    Pack(String),
}

/// A file part from the upload form, held fully in memory.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    /// Filename, if the browser sent a non-empty one.
    pub fn name(&self) -> Option<&str> {
        self.filename.as_deref().filter(|name| !name.is_empty())
    }
}

/// A photo decoded and re-encoded as PNG, ready for embedding.
#[derive(Debug, Clone)]
pub struct EmbeddedPhoto {
    pub filename: String,
    pub png: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
}

impl EmbeddedPhoto {
    /// Display size in EMU: fixed width, height in proportion.
    fn display_size_emu(&self) -> (u32, u32) {
        let width = PHOTO_WIDTH_INCHES * EMU_PER_INCH;
        let height = if self.width_px == 0 {
            width
        } else {
            let scaled = u64::from(width) * u64::from(self.height_px) / u64::from(self.width_px);
            u32::try_from(scaled).unwrap_or(u32::MAX)
        };
        (width, height)
    }
}

#[derive(Debug, Clone)]
pub enum PhotoOutcome {
    Embedded(EmbeddedPhoto),
    Failed { filename: String, reason: String },
}

impl PhotoOutcome {
    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded(_))
    }
}

/// Text that replaces a photo that could not be embedded.
pub fn placeholder_text(filename: &str, reason: &str) -> String {
    format!("[提醒] 無法插入圖片 {}：{}", filename, reason)
}

/// Splits generated text into paragraphs.
///
/// Text containing `**` is split on it, which also drops Markdown bold
/// markers; otherwise it is split into lines. Fragments are trimmed and
/// empty ones dropped.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let fragments: Vec<&str> = if text.contains("**") {
        text.split("**").collect()
    } else {
        text.lines().collect()
    };

    fragments
        .into_iter()
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Decodes one upload. Unnamed uploads are skipped entirely.
pub fn prepare_photo(upload: &UploadedImage) -> Option<PhotoOutcome> {
    let filename = upload.name()?.to_string();

    let decoded = image::load_from_memory(&upload.bytes).and_then(|img| {
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)?;
        Ok((png, img.width(), img.height()))
    });

    Some(match decoded {
        Ok((png, width_px, height_px)) => PhotoOutcome::Embedded(EmbeddedPhoto {
            filename,
            png,
            width_px,
            height_px,
        }),
        Err(e) => {
            tracing::warn!(file = %filename, error = %e, "Could not embed photo");
            PhotoOutcome::Failed {
                filename,
                reason: e.to_string(),
            }
        }
    })
}

/// Everything that goes into the document, in order.
#[derive(Debug, Clone)]
pub struct LearningRecord {
    pub paragraphs: Vec<String>,
    pub photos: Vec<PhotoOutcome>,
}

impl LearningRecord {
    pub fn assemble(text: &str, uploads: &[UploadedImage]) -> Self {
        Self {
            paragraphs: split_paragraphs(text),
            photos: uploads.iter().filter_map(prepare_photo).collect(),
        }
    }

    pub fn embedded_count(&self) -> usize {
        self.photos.iter().filter(|photo| photo.is_embedded()).count()
    }

    pub fn placeholder_count(&self) -> usize {
        self.photos.len() - self.embedded_count()
    }

    /// Renders the record as `.docx` bytes.
    pub fn to_docx(&self) -> Result<Vec<u8>, DocumentError> {
        let mut docx = Docx::new()
            .add_style(
                Style::new(TITLE_STYLE, StyleType::Paragraph)
                    .name("Title")
                    .size(56),
            )
            .add_style(
                Style::new(HEADING_STYLE, StyleType::Paragraph)
                    .name("Heading 1")
                    .size(32)
                    .bold(),
            )
            .add_paragraph(styled(TITLE_STYLE, DOCUMENT_TITLE));

        for paragraph in &self.paragraphs {
            docx = docx.add_paragraph(text_paragraph(paragraph));
        }

        docx = docx
            .add_paragraph(Paragraph::new().add_run(Run::new().add_break(BreakType::Page)))
            .add_paragraph(styled(HEADING_STYLE, PHOTOS_HEADING));

        for photo in &self.photos {
            docx = match photo {
                PhotoOutcome::Embedded(photo) => {
                    let (width, height) = photo.display_size_emu();
                    let pic = Pic::new_with_dimensions(photo.png.clone(), photo.width_px, photo.height_px)
                        .size(width, height);
                    docx.add_paragraph(Paragraph::new().add_run(Run::new().add_image(pic)))
                        .add_paragraph(Paragraph::new())
                }
                PhotoOutcome::Failed { filename, reason } => {
                    docx.add_paragraph(text_paragraph(&placeholder_text(filename, reason)))
                }
            };
        }

        let mut buf = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut buf)
            .map_err(|e| DocumentError::Pack(e.to_string()))?;
        Ok(buf.into_inner())
    }
}

fn text_paragraph(text: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text))
}

fn styled(style: &str, text: &str) -> Paragraph {
    text_paragraph(text).style(style)
}
