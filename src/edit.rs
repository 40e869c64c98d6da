use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// The fundamental edit primitive: byte-span replacement on in-memory text.
///
/// Every patch transform compiles down to this single primitive. Intelligence
/// lives in span acquisition (key lookup, anchor search), not application.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "TextEdit does nothing until apply() is called"]
pub struct TextEdit {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text to place at [byte_start, byte_end)
    pub new_text: String,
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Invalid byte range: [{byte_start}, {byte_end}) in text of length {len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        len: usize,
    },

    #[error("Edit boundary at byte {0} is not a UTF-8 character boundary")]
    NotCharBoundary(usize),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TextEdit {
    pub fn new(byte_start: usize, byte_end: usize, new_text: impl Into<String>) -> Self {
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
        }
    }

    /// Pure insertion at `offset`.
    pub fn insert(offset: usize, new_text: impl Into<String>) -> Self {
        Self::new(offset, offset, new_text)
    }

    fn validate(&self, text: &str) -> Result<(), EditError> {
        if self.byte_start > self.byte_end || self.byte_end > text.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                len: text.len(),
            });
        }
        for offset in [self.byte_start, self.byte_end] {
            if !text.is_char_boundary(offset) {
                return Err(EditError::NotCharBoundary(offset));
            }
        }
        Ok(())
    }

    /// Whether applying this edit would leave `text` unchanged.
    pub fn is_noop(&self, text: &str) -> bool {
        text.get(self.byte_start..self.byte_end) == Some(self.new_text.as_str())
    }

    /// Splice the edit into `text`, returning the new content.
    ///
    /// Bytes outside [byte_start, byte_end) are carried over untouched.
    pub fn apply(&self, text: &str) -> Result<String, EditError> {
        self.validate(text)?;

        let mut out = String::with_capacity(
            text.len() + self.new_text.len() - (self.byte_end - self.byte_start),
        );
        out.push_str(&text[..self.byte_start]);
        out.push_str(&self.new_text);
        out.push_str(&text[self.byte_end..]);
        Ok(out)
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full new content lands or nothing changes. Permissions of an
/// existing target are carried over to the replacement.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    // Tempfile in the same directory keeps the rename on one filesystem
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let permissions = fs::metadata(path).ok().map(|m| m.permissions());

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    if let Some(permissions) = permissions {
        fs::set_permissions(temp.path(), permissions)?;
    }

    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_replacement() {
        let edit = TextEdit::new(0, 5, "HELLO");
        assert_eq!(edit.apply("hello world").unwrap(), "HELLO world");
    }

    #[test]
    fn test_apply_insertion() {
        let edit = TextEdit::insert(5, ",");
        assert_eq!(edit.apply("hello world").unwrap(), "hello, world");
    }

    #[test]
    fn test_invalid_range() {
        let edit = TextEdit::new(5, 20, "x");
        assert!(matches!(
            edit.apply("hello world"),
            Err(EditError::InvalidByteRange { .. })
        ));
    }

    #[test]
    fn test_inverted_range() {
        let edit = TextEdit::new(10, 5, "x");
        assert!(matches!(
            edit.apply("hello world"),
            Err(EditError::InvalidByteRange { .. })
        ));
    }

    #[test]
    fn test_rejects_split_codepoint() {
        let edit = TextEdit::new(1, 2, "x");
        assert!(matches!(
            edit.apply("é"),
            Err(EditError::NotCharBoundary(1))
        ));
    }

    #[test]
    fn test_is_noop() {
        assert!(TextEdit::new(0, 5, "hello").is_noop("hello world"));
        assert!(!TextEdit::new(0, 5, "HELLO").is_noop("hello world"));
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("test.txt");
        fs::write(&file_path, b"original content").unwrap();

        atomic_write(&file_path, b"modified content").unwrap();

        let content = fs::read_to_string(&file_path).unwrap();
        assert_eq!(content, "modified content");
    }

    #[test]
    #[cfg(unix)]
    fn test_atomic_write_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("web.php");
        fs::write(&file_path, b"<?php\n").unwrap();
        fs::set_permissions(&file_path, fs::Permissions::from_mode(0o644)).unwrap();

        atomic_write(&file_path, b"<?php\n// edited\n").unwrap();

        let mode = fs::metadata(&file_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
