//! Entry kind classification.

use serde::{Deserialize, Serialize};

/// The kind of an entry: a folder, or a file category derived from its
/// extension. Used for browser-side icons and the storage breakdown
/// chart; downloads always fall back to the stored MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entry_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A folder. Always zero bytes, never has a blob.
    Folder,
    /// Raster/vector image formats.
    Image,
    /// Video containers.
    Video,
    /// PDF documents.
    Pdf,
    /// Plain-text and source files.
    Text,
    /// Audio formats.
    Audio,
    /// Compressed archives.
    Archive,
    /// Anything else.
    File,
}

const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "ico"];
const VIDEO_EXTS: &[&str] = &["mp4", "webm", "avi", "mov", "mkv", "flv", "wmv"];
const TEXT_EXTS: &[&str] = &[
    "txt", "md", "json", "xml", "html", "css", "js", "py", "java", "cpp", "c", "rs", "toml",
];
const AUDIO_EXTS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a", "aac"];
const ARCHIVE_EXTS: &[&str] = &["zip", "rar", "7z", "tar", "gz", "bz2"];

impl EntryKind {
    /// Classify a file by its name's extension (case-insensitive).
    /// Never returns [`EntryKind::Folder`].
    pub fn from_name(name: &str) -> Self {
        let ext = name
            .rsplit('.')
            .next()
            .filter(|ext| *ext != name)
            .map(str::to_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Self::Pdf,
            e if IMAGE_EXTS.contains(&e) => Self::Image,
            e if VIDEO_EXTS.contains(&e) => Self::Video,
            e if TEXT_EXTS.contains(&e) => Self::Text,
            e if AUDIO_EXTS.contains(&e) => Self::Audio,
            e if ARCHIVE_EXTS.contains(&e) => Self::Archive,
            _ => Self::File,
        }
    }

    /// `true` for [`EntryKind::Folder`].
    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder)
    }
}
