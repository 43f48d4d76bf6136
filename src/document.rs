use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Note supplied by the caller for indexing.
///
/// `text` is optional on the wire so a note without text is reported as a
/// malformed document instead of failing the whole envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: Some(text.into()),
        }
    }

    /// A note with no text, as received from an incomplete source
    pub fn without_text(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

/// Load a JSON array of notes
pub fn load_documents<P: AsRef<Path>>(path: P) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let docs = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse notes from {}", path.display()))?;
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_text_deserializes() -> Result<()> {
        let doc: Document = serde_json::from_str(r#"{"id": "n1"}"#)?;
        assert_eq!(doc, Document::without_text("n1"));
        assert!(doc.text().is_none());
        Ok(())
    }

    #[test]
    fn test_load_documents() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"[{{"id": "n1", "text": "the cat sat"}}, {{"id": "n2", "text": "a dog"}}]"#
        )?;

        let docs = load_documents(file.path())?;
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0], Document::new("n1", "the cat sat"));
        Ok(())
    }

    #[test]
    fn test_load_documents_bad_json() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, "not json")?;

        let err = load_documents(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse notes"));
        Ok(())
    }
}
