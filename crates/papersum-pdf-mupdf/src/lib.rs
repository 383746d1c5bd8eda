use std::path::Path;

use mupdf::{Document, TextPageFlags};

use papersum_core::chunk::chunks_from_pages;
use papersum_core::{Chunk, ChunkError, ChunkProvider};

pub mod text;

/// MuPDF-based [`ChunkProvider`]: one chunk per PDF page.
///
/// This crate is the sole AGPL island. It isolates the mupdf dependency
/// (AGPL-3.0) so that the core crate and its tests never link it.
///
/// Running headers and footers (venue names, page numbers) repeat on every
/// page and add nothing to a summary, so by default text blocks in the top
/// 4% and bottom 5% of each page are dropped.
#[derive(Debug, Clone)]
pub struct MupdfChunkProvider {
    /// Fraction of page height from bottom to exclude as footer (0.0–1.0).
    /// `None` disables footer exclusion.
    footer_exclusion_ratio: Option<f32>,
    /// Fraction of page height from top to exclude as header (0.0–1.0).
    /// `None` disables header exclusion.
    header_exclusion_ratio: Option<f32>,
}

impl Default for MupdfChunkProvider {
    fn default() -> Self {
        Self {
            footer_exclusion_ratio: Some(0.05),
            header_exclusion_ratio: Some(0.04),
        }
    }
}

impl MupdfChunkProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the footer exclusion ratio. Pass `0.0` to disable.
    pub fn with_footer_exclusion(mut self, ratio: f32) -> Self {
        self.footer_exclusion_ratio = (ratio > 0.0).then_some(ratio);
        self
    }

    /// Set the header exclusion ratio. Pass `0.0` to disable.
    pub fn with_header_exclusion(mut self, ratio: f32) -> Self {
        self.header_exclusion_ratio = (ratio > 0.0).then_some(ratio);
        self
    }

    fn page_texts(&self, path: &Path) -> Result<Vec<String>, ChunkError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| ChunkError::OpenError("invalid path encoding".into()))?;
        let document =
            Document::open(path_str).map_err(|e| ChunkError::OpenError(e.to_string()))?;

        let extraction = |e: mupdf::Error| ChunkError::ExtractionError(e.to_string());
        let mut pages = Vec::new();

        for page in document.pages().map_err(extraction)? {
            let page = page.map_err(extraction)?;
            let text_page = page
                .to_text_page(TextPageFlags::empty())
                .map_err(extraction)?;

            let bounds = page.bounds().map_err(extraction)?;
            let height = bounds.y1 - bounds.y0;
            let header_limit = self.header_exclusion_ratio.map(|r| bounds.y0 + height * r);
            let footer_limit = self.footer_exclusion_ratio.map(|r| bounds.y1 - height * r);

            let mut page_text = String::new();
            for block in text_page.blocks() {
                let b = block.bounds();
                if header_limit.is_some_and(|limit| b.y1 <= limit)
                    || footer_limit.is_some_and(|limit| b.y0 >= limit)
                {
                    continue;
                }
                for line in block.lines() {
                    page_text.extend(line.chars().map(|c| c.char().unwrap_or('\u{FFFD}')));
                    page_text.push('\n');
                }
                page_text.push('\n');
            }
            pages.push(text::clean_page(&page_text));
        }

        Ok(pages)
    }
}

impl ChunkProvider for MupdfChunkProvider {
    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }

    fn load(&self, source: &Path) -> Result<Vec<Chunk>, ChunkError> {
        if !source.is_file() {
            return Err(ChunkError::SourceNotFound(source.display().to_string()));
        }
        let pages = self.page_texts(source)?;
        let page_count = pages.len();
        let chunks = chunks_from_pages(source, pages)?;
        tracing::debug!(
            path = %source.display(),
            pages = page_count,
            chunks = chunks.len(),
            "extracted PDF pages"
        );
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_source_not_found() {
        let err = MupdfChunkProvider::new()
            .load(Path::new("/no/such/paper.pdf"))
            .unwrap_err();
        assert!(matches!(err, ChunkError::SourceNotFound(_)));
    }

    #[test]
    fn garbage_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"definitely not a pdf").unwrap();
        let err = MupdfChunkProvider::new().load(&path).unwrap_err();
        assert!(matches!(
            err,
            ChunkError::OpenError(_) | ChunkError::ExtractionError(_) | ChunkError::EmptyDocument(_)
        ));
    }

    #[test]
    fn exclusion_ratios() {
        let p = MupdfChunkProvider::new()
            .with_footer_exclusion(0.0)
            .with_header_exclusion(0.1);
        assert_eq!(p.footer_exclusion_ratio, None);
        assert_eq!(p.header_exclusion_ratio, Some(0.1));
        assert_eq!(p.extensions(), &["pdf"]);
    }
}
