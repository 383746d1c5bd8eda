use std::path::Path;

use thiserror::Error;

/// One ordered unit of extracted document text (a page).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based position in the document.
    pub index: usize,
    pub text: String,
}

impl Chunk {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("source not found: {0}")]
    SourceNotFound(String),
    #[error("document has no text to summarize: {0}")]
    EmptyDocument(String),
    #[error("failed to open document: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for turning a source document into ordered text chunks.
///
/// Implementors own text extraction; the aggregation strategies only ever
/// see the resulting [`Chunk`] sequence.
pub trait ChunkProvider: Send + Sync {
    /// Lower-case file extensions (without the dot) this provider can read.
    fn extensions(&self) -> &[&str];

    /// Load the document at `source` as a non-empty, ordered chunk sequence.
    fn load(&self, source: &Path) -> Result<Vec<Chunk>, ChunkError>;
}

/// Build an indexed chunk sequence from raw page texts.
///
/// Whitespace-only pages are dropped and the survivors are re-indexed from 0,
/// so every chunk carries text worth a completion call. Yields
/// [`ChunkError::EmptyDocument`] when nothing is left.
pub fn chunks_from_pages<I, S>(source: &Path, pages: I) -> Result<Vec<Chunk>, ChunkError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let chunks: Vec<Chunk> = pages
        .into_iter()
        .map(Into::into)
        .filter(|text: &String| !text.trim().is_empty())
        .enumerate()
        .map(|(index, text)| Chunk { index, text })
        .collect();

    if chunks.is_empty() {
        return Err(ChunkError::EmptyDocument(source.display().to_string()));
    }
    Ok(chunks)
}

/// Plain-text documents where pages are separated by form feeds (`\x0c`),
/// the convention used by `pdftotext` and similar tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextFileProvider;

impl ChunkProvider for TextFileProvider {
    fn extensions(&self) -> &[&str] {
        &["txt"]
    }

    fn load(&self, source: &Path) -> Result<Vec<Chunk>, ChunkError> {
        if !source.exists() {
            return Err(ChunkError::SourceNotFound(source.display().to_string()));
        }
        let text = std::fs::read_to_string(source)?;
        chunks_from_pages(source, text.split('\u{0C}'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn blank_pages_are_dropped_and_reindexed() {
        let chunks = chunks_from_pages(
            Path::new("paper.pdf"),
            vec!["Abstract", "   \n ", "Method", ""],
        )
        .unwrap();
        assert_eq!(
            chunks,
            vec![Chunk::new(0, "Abstract"), Chunk::new(1, "Method")]
        );
    }

    #[test]
    fn all_blank_pages_is_empty_document() {
        let err = chunks_from_pages(Path::new("blank.pdf"), vec!["", "\n"]).unwrap_err();
        assert!(matches!(err, ChunkError::EmptyDocument(ref p) if p == "blank.pdf"));
    }

    #[test]
    fn text_provider_splits_on_form_feed() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "page one\u{0C}page two\u{0C}page three").unwrap();

        let chunks = TextFileProvider.load(file.path()).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["page one", "page two", "page three"]);
        assert_eq!(chunks[2].index, 2);
    }

    #[test]
    fn text_provider_missing_file() {
        let err = TextFileProvider
            .load(Path::new("/definitely/not/here.txt"))
            .unwrap_err();
        assert!(matches!(err, ChunkError::SourceNotFound(_)));
    }
}
