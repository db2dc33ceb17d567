// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Decomposition Content Reader
//!
//! Reads back the file tree written by `qlik app unbuild` so callers that
//! never touch the filesystem get every component in one result.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Walk, classify and decode a decomposition root
//!
//! # Decoding
//!
//! Bytes are decoded with the first encoding that yields plausible text:
//!
//! 1. **UTF-8** (strict)
//! 2. **Latin-1**, when the text has no control characters (C0 other than
//!    tab, newline, form feed and carriage return; DEL; C1)
//! 3. **Windows-1252**, when no undefined code point or C0 control appears
//! 4. otherwise **base64** (standard alphabet, padded)
//!
//! Text containing NUL is never accepted; a NUL byte marks binary content.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::domain::artifact::{ContentEncoding, DecomposedFile, DecompositionResult};
use crate::domain::classifier::classify;
use crate::domain::errors::{OrchestratorError, OrchestratorResult};

/// Default per-file read limit.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

pub const FILE_TOO_LARGE: &str = "file too large";

// ============================================================================
// Content Reader
// ============================================================================

#[derive(Debug, Clone)]
pub struct ContentReader {
    /// Files above this size are listed but not read
    max_file_bytes: u64,

    /// When false, files are classified, sized and sniffed but `content`
    /// stays empty
    include_contents: bool,
}

impl ContentReader {
    pub fn new() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            include_contents: true,
        }
    }

    pub fn with_limits(max_file_bytes: u64, include_contents: bool) -> Self {
        Self {
            max_file_bytes,
            include_contents,
        }
    }

    /// Walk `root` and produce one record per regular file.
    ///
    /// Only a missing or non-directory root is an error. Anything that goes
    /// wrong below the root is recorded on the affected file and the walk
    /// continues.
    pub fn read_tree(&self, root: &Path) -> OrchestratorResult<DecompositionResult> {
        if !root.is_dir() {
            return Err(OrchestratorError::InvalidPath(format!(
                "decomposition root '{}' is not a directory",
                root.display()
            )));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let Some(path) = e.path() else {
                        tracing::warn!(root = %root.display(), error = %e, "Skipping unreadable entry without a path");
                        continue;
                    };
                    let relative = relative_path(root, path);
                    if relative.is_empty() {
                        continue;
                    }
                    tracing::warn!(path = %relative, error = %e, "Failed to read directory entry");
                    files.push(DecomposedFile::unreadable(
                        relative.clone(),
                        classify(&relative),
                        0,
                        e.to_string(),
                    ));
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let relative = relative_path(root, entry.path());
            files.push(self.read_file(entry.path(), relative));
        }

        let result = DecompositionResult::from_files(root.to_path_buf(), files);
        tracing::debug!(
            root = %root.display(),
            files = result.files.len(),
            bytes = result.total_bytes(),
            "Read decomposition tree"
        );
        Ok(result)
    }

    fn read_file(&self, path: &Path, relative_path: String) -> DecomposedFile {
        let category = classify(&relative_path);

        let size_bytes = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => return DecomposedFile::unreadable(relative_path, category, 0, e.to_string()),
        };

        if size_bytes > self.max_file_bytes {
            tracing::debug!(path = %relative_path, size_bytes, "File exceeds read limit");
            return DecomposedFile::unreadable(relative_path, category, size_bytes, FILE_TOO_LARGE);
        }

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %relative_path, error = %e, "Failed to read file");
                return DecomposedFile::unreadable(relative_path, category, size_bytes, e.to_string());
            }
        };

        let (encoding, content) = decode_bytes(&bytes);
        DecomposedFile {
            relative_path,
            category,
            size_bytes,
            encoding,
            content: if self.include_contents { content } else { String::new() },
            read_error: None,
        }
    }
}

impl Default for ContentReader {
    fn default() -> Self {
        Self::new()
    }
}

/// `path` relative to `root`, `/`-separated.
fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// Encoding cascade
// ============================================================================

/// Decode raw file bytes into displayable content.
pub fn decode_bytes(bytes: &[u8]) -> (ContentEncoding, String) {
    if let Ok(text) = std::str::from_utf8(bytes) {
        if !text.contains('\0') {
            return (ContentEncoding::Utf8, text.to_string());
        }
    }
    if let Some(text) = decode_latin1(bytes) {
        return (ContentEncoding::Latin1, text);
    }
    if let Some(text) = decode_cp1252(bytes) {
        return (ContentEncoding::Cp1252, text);
    }
    (ContentEncoding::BinaryBase64, STANDARD.encode(bytes))
}

fn is_allowed_c0(byte: u8) -> bool {
    matches!(byte, b'\t' | b'\n' | 0x0C | b'\r')
}

fn is_c0_control(byte: u8) -> bool {
    (byte < 0x20 && !is_allowed_c0(byte)) || byte == 0x7F
}

fn decode_latin1(bytes: &[u8]) -> Option<String> {
    if bytes
        .iter()
        .any(|&b| is_c0_control(b) || (0x80..=0x9F).contains(&b))
    {
        return None;
    }
    Some(bytes.iter().map(|&b| char::from(b)).collect())
}

/// Windows-1252 code points for 0x80..=0x9F. `None` marks bytes the code
/// page leaves undefined.
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

fn decode_cp1252(bytes: &[u8]) -> Option<String> {
    bytes
        .iter()
        .map(|&b| match b {
            _ if is_c0_control(b) => None,
            0x80..=0x9F => CP1252_HIGH[(b - 0x80) as usize],
            _ => Some(char::from(b)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifact::Category;

    fn write(root: &Path, relative: &str, bytes: &[u8]) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_utf8_first() {
        let (encoding, text) = decode_bytes("LOAD * FROM [lib://Data/ventes.qvd] // café".as_bytes());
        assert_eq!(encoding, ContentEncoding::Utf8);
        assert!(text.ends_with("café"));
    }

    #[test]
    fn test_latin1_fallback() {
        // "café" in Latin-1
        let (encoding, text) = decode_bytes(&[b'c', b'a', b'f', 0xE9]);
        assert_eq!(encoding, ContentEncoding::Latin1);
        assert_eq!(text, "café");
    }

    #[test]
    fn test_cp1252_fallback() {
        // 0x80 is the euro sign in Windows-1252 and a C1 control in Latin-1
        let (encoding, text) = decode_bytes(&[0x80, b'1', b'0', b' ', 0x93, b'x', 0x94]);
        assert_eq!(encoding, ContentEncoding::Cp1252);
        assert_eq!(text, "\u{20AC}10 \u{201C}x\u{201D}");
    }

    #[test]
    fn test_binary_falls_back_to_base64() {
        let bytes = [0x00, 0xFF, 0x81, 0x10, 0xFE];
        let (encoding, text) = decode_bytes(&bytes);
        assert_eq!(encoding, ContentEncoding::BinaryBase64);
        assert_eq!(STANDARD.decode(text).unwrap(), bytes);
    }

    #[test]
    fn test_nul_in_valid_utf8_is_binary() {
        let (encoding, _) = decode_bytes(b"abc\0def");
        assert_eq!(encoding, ContentEncoding::BinaryBase64);
    }

    #[test]
    fn test_undefined_cp1252_byte_is_binary() {
        let (encoding, _) = decode_bytes(&[b'a', 0x81, b'b']);
        assert_eq!(encoding, ContentEncoding::BinaryBase64);
    }

    #[test]
    fn test_base64_roundtrips_arbitrary_bytes() {
        for seed in 0u8..32 {
            let bytes: Vec<u8> = (0..64u16)
                .map(|i| (i as u8).wrapping_mul(seed.wrapping_add(7)) ^ seed)
                .chain([0x00, 0x8D])
                .collect();
            let (encoding, text) = decode_bytes(&bytes);
            assert_eq!(encoding, ContentEncoding::BinaryBase64);
            assert_eq!(STANDARD.decode(text).unwrap(), bytes);
        }
    }

    #[test]
    fn test_read_tree_scenario() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "script.qvs", b"LOAD 1 AS x AUTOGENERATE 1;");
        write(dir.path(), "dimensions/d1.json", br#"{"qDim": {"qFieldDefs": ["Region"]}}"#);
        write(dir.path(), "objects/o1.bin", &[0xC3, 0x28, 0x00, 0xFF]);

        let result = ContentReader::new().read_tree(dir.path()).unwrap();

        let paths: Vec<_> = result.files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["dimensions/d1.json", "objects/o1.bin", "script.qvs"]);
        assert_eq!(result.count(Category::Script), 1);
        assert_eq!(result.count(Category::Dimension), 1);
        assert_eq!(result.count(Category::Object), 1);
        assert_eq!(result.category_counts.values().sum::<usize>(), 3);

        let object = &result.files[1];
        assert_eq!(object.encoding, ContentEncoding::BinaryBase64);
        assert_eq!(STANDARD.decode(&object.content).unwrap(), vec![0xC3, 0x28, 0x00, 0xFF]);
        assert_eq!(object.size_bytes, 4);
    }

    #[test]
    fn test_oversized_file_is_listed_not_read() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "objects/big.json", &[b'x'; 64]);
        write(dir.path(), "script.qvs", b"ok");

        let result = ContentReader::with_limits(16, true).read_tree(dir.path()).unwrap();
        let big = &result.files[0];
        assert_eq!(big.read_error.as_deref(), Some(FILE_TOO_LARGE));
        assert_eq!(big.size_bytes, 64);
        assert!(big.content.is_empty());
        assert!(result.files[1].is_readable());
        assert_eq!(result.unreadable_files().count(), 1);
    }

    #[test]
    fn test_contents_can_be_excluded() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "objects/o1.bin", &[0x00, 0xFF]);
        write(dir.path(), "script.qvs", b"LOAD 1;");

        let result = ContentReader::with_limits(DEFAULT_MAX_FILE_BYTES, false)
            .read_tree(dir.path())
            .unwrap();
        assert!(result.files.iter().all(|f| f.content.is_empty()));
        assert_eq!(result.files[0].encoding, ContentEncoding::BinaryBase64);
        assert_eq!(result.files[1].size_bytes, 7);
    }

    #[test]
    fn test_empty_and_missing_roots() {
        let dir = tempfile::tempdir().unwrap();
        let result = ContentReader::new().read_tree(dir.path()).unwrap();
        assert!(result.files.is_empty());
        assert!(result.category_counts.is_empty());

        assert!(ContentReader::new().read_tree(&dir.path().join("nope")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_does_not_abort_walk() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "measures/locked.json", b"{}");
        write(dir.path(), "measures/open.json", b"{}");
        let locked = dir.path().join("measures/locked.json");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let result = ContentReader::new().read_tree(dir.path()).unwrap();
        assert_eq!(result.files.len(), 2);
        assert_eq!(result.count(Category::Measure), 2);

        // Root can read anything, so only assert the error when it bites.
        if fs::read(&locked).is_err() {
            assert!(!result.files[0].is_readable());
        }
        assert!(result.files[1].is_readable());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let outside = tempfile::tempdir().unwrap();
        write(outside.path(), "secret.txt", b"nope");
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "script.qvs", b"LOAD 1;");
        std::os::unix::fs::symlink(outside.path(), dir.path().join("linked")).unwrap();

        let result = ContentReader::new().read_tree(dir.path()).unwrap();
        assert_eq!(result.files.len(), 1);
    }
}
