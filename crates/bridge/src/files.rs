//! Uploaded files and PDF text extraction.

use {
    async_trait::async_trait,
    std::{
        path::{Path, PathBuf},
        process::Stdio,
    },
    tracing::debug,
};

use crate::{Error, Result};

/// Separates the file id from the original name in stored file names.
const ID_SEPARATOR: &str = "__";

pub const PDF_MIME: &str = "application/pdf";

/// A previously uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub id: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub path: PathBuf,
}

impl StoredFile {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == PDF_MIME
    }
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Look up an upload by id. Unknown ids resolve to `None`.
    async fn resolve(&self, file_id: &str) -> Result<Option<StoredFile>>;

    async fn read(&self, file: &StoredFile) -> Result<Vec<u8>>;
}

/// Uploads kept in one flat directory as `<id>__<name>`.
#[derive(Debug, Clone)]
pub struct DirFileStore {
    dir: PathBuf,
    max_bytes: u64,
}

impl DirFileStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store an upload under a fresh id.
    ///
    /// Only images and PDFs are accepted.
    pub async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<StoredFile> {
        let file_name = sanitize_file_name(file_name);
        let mime_type = mime_from_name(&file_name);
        if !(mime_type.starts_with("image/") || mime_type == PDF_MIME) {
            return Err(Error::attachment(
                &file_name,
                format!("unsupported mime type: {mime_type}"),
            ));
        }
        let size_bytes = bytes.len() as u64;
        if size_bytes == 0 {
            return Err(Error::attachment(&file_name, "empty file"));
        }
        self.check_size(&file_name, size_bytes)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let path = self.dir.join(format!("{id}{ID_SEPARATOR}{file_name}"));
        tokio::fs::write(&path, bytes).await?;
        debug!(file_id = %id, file_name = %file_name, size_bytes, "stored upload");

        Ok(StoredFile {
            id,
            file_name,
            mime_type: mime_type.to_string(),
            size_bytes,
            path,
        })
    }

    fn check_size(&self, file_name: &str, size: u64) -> Result<()> {
        if size > self.max_bytes {
            return Err(Error::attachment(
                file_name,
                format!("exceeds {} bytes", self.max_bytes),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl FileStore for DirFileStore {
    async fn resolve(&self, file_id: &str) -> Result<Option<StoredFile>> {
        let file_id = file_id.trim();
        if file_id.is_empty() || file_id.contains(['/', '\\']) {
            return Ok(None);
        }
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let prefix = format!("{file_id}{ID_SEPARATOR}");
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(original) = name.to_str().and_then(|n| n.strip_prefix(&prefix)) else {
                continue;
            };
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            return Ok(Some(StoredFile {
                id: file_id.to_string(),
                file_name: original.to_string(),
                mime_type: mime_from_name(original).to_string(),
                size_bytes: meta.len(),
                path: entry.path(),
            }));
        }
        Ok(None)
    }

    async fn read(&self, file: &StoredFile) -> Result<Vec<u8>> {
        self.check_size(&file.file_name, file.size_bytes)?;
        let bytes = tokio::fs::read(&file.path).await?;
        // The file may have grown since it was resolved.
        self.check_size(&file.file_name, bytes.len() as u64)?;
        Ok(bytes)
    }
}

/// MIME type guessed from the file extension.
pub fn mime_from_name(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("pdf") => PDF_MIME,
        _ => "application/octet-stream",
    }
}

/// Make an uploaded name safe to use as a single path component.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '-',
            c if c.is_control() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|') => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" => "file".to_string(),
        "." | ".." => format!("file{cleaned}"),
        _ => cleaned,
    }
}

// ── PDF text ─────────────────────────────────────────────────────────────────

#[async_trait]
pub trait PdfTextExtractor: Send + Sync {
    async fn extract_text(&self, path: &Path) -> Result<String>;
}

/// Extracts text with poppler's `pdftotext`.
#[derive(Debug, Clone)]
pub struct Pdftotext {
    program: PathBuf,
}

impl Default for Pdftotext {
    fn default() -> Self {
        Self {
            program: PathBuf::from("pdftotext"),
        }
    }
}

impl Pdftotext {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl PdfTextExtractor for Pdftotext {
    async fn extract_text(&self, path: &Path) -> Result<String> {
        let output = tokio::process::Command::new(&self.program)
            .args(["-layout", "-nopgbrk"])
            .arg(path)
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::pdf(format!("failed to start {}: {e}", self.program.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::pdf(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case::png("shot.PNG", "image/png")]
    #[case::jpg("a.jpg", "image/jpeg")]
    #[case::jpeg("a.jpeg", "image/jpeg")]
    #[case::webp("a.webp", "image/webp")]
    #[case::gif("a.gif", "image/gif")]
    #[case::pdf("report.pdf", "application/pdf")]
    #[case::other("notes.txt", "application/octet-stream")]
    #[case::none("README", "application/octet-stream")]
    fn mime_by_extension(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(mime_from_name(name), expected);
    }

    #[rstest]
    #[case::plain("photo.png", "photo.png")]
    #[case::slashes("../etc/passwd", "..-etc-passwd")]
    #[case::backslash("a\\b.pdf", "a-b.pdf")]
    #[case::reserved("what?.png", "what_.png")]
    #[case::blank("   ", "file")]
    #[case::dotdot("..", "file..")]
    fn sanitized_names(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_file_name(input), expected);
    }

    #[tokio::test]
    async fn save_then_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirFileStore::new(dir.path(), 1024);

        let saved = store.save("cat.png", b"\x89PNG").await.unwrap();
        assert_eq!(saved.mime_type, "image/png");
        assert!(saved.path.starts_with(dir.path()));
        assert!(
            saved
                .path
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .ends_with("__cat.png")
        );

        let found = store.resolve(&saved.id).await.unwrap().unwrap();
        assert_eq!(found, saved);
        assert_eq!(store.read(&found).await.unwrap(), b"\x89PNG");
    }

    #[tokio::test]
    async fn resolve_unknown_or_missing_dir_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirFileStore::new(dir.path().join("nope"), 1024);
        assert!(store.resolve("abc").await.unwrap().is_none());

        let store = DirFileStore::new(dir.path(), 1024);
        std::fs::write(dir.path().join("abc__x.png"), b"x").unwrap();
        assert!(store.resolve("abd").await.unwrap().is_none());
        assert!(store.resolve("").await.unwrap().is_none());
        assert!(store.resolve("../abc").await.unwrap().is_none());
        assert!(store.resolve(" abc ").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn save_rejects_unsupported_empty_and_oversized() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirFileStore::new(dir.path(), 4);
        assert!(matches!(
            store.save("notes.txt", b"hi").await,
            Err(Error::Attachment { .. })
        ));
        assert!(matches!(
            store.save("a.png", b"").await,
            Err(Error::Attachment { .. })
        ));
        assert!(matches!(
            store.save("a.png", b"12345").await,
            Err(Error::Attachment { .. })
        ));
    }

    #[tokio::test]
    async fn read_enforces_size_cap() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big__huge.pdf"), vec![0u8; 16]).unwrap();
        let store = DirFileStore::new(dir.path(), 8);
        let file = store.resolve("big").await.unwrap().unwrap();
        assert!(file.is_pdf());
        assert!(matches!(
            store.read(&file).await,
            Err(Error::Attachment { .. })
        ));
    }

    #[tokio::test]
    async fn missing_pdftotext_binary_is_pdf_error() {
        let extractor = Pdftotext::new("/nonexistent/pdftotext");
        let err = extractor
            .extract_text(Path::new("/tmp/x.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Pdf(_)));
    }
}
