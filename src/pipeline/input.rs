//! Input resolution: turn a user-supplied path or URL into PDF bytes.
//!
//! Both backends (lopdf for decomposition, pdfium for plates) load from
//! memory, so a URL is downloaded straight into a buffer and never touches
//! the file system. The `%PDF` magic is checked before returning so callers
//! get a meaningful error instead of a parser failure deep in page 1.

use crate::error::Pdf2PptxError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A PDF loaded into memory together with the name it was found under.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub bytes: Vec<u8>,
    /// File name, e.g. `report.pdf`. Used for the deck title and output name.
    pub file_name: String,
    /// Where the bytes came from, for error messages.
    pub origin: PathBuf,
}

impl ResolvedInput {
    /// File name without a trailing `.pdf` (case-insensitive).
    pub fn stem(&self) -> &str {
        file_stem(&self.file_name)
    }
}

/// Strip a trailing `.pdf` extension, case-insensitively.
pub fn file_stem(file_name: &str) -> &str {
    let len = file_name.len();
    if len > 4 && file_name.is_char_boundary(len - 4) && file_name[len - 4..].eq_ignore_ascii_case(".pdf") {
        &file_name[..len - 4]
    } else {
        file_name
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to PDF bytes.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2PptxError> {
    if input.trim().is_empty() {
        return Err(Pdf2PptxError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input)).await
    }
}

/// Wrap caller-supplied bytes, validating the PDF magic.
pub fn from_bytes(bytes: Vec<u8>, file_name: &str) -> Result<ResolvedInput, Pdf2PptxError> {
    let origin = PathBuf::from(format!("<memory>/{file_name}"));
    check_magic(&bytes, &origin)?;
    Ok(ResolvedInput {
        bytes,
        file_name: file_name.to_string(),
        origin,
    })
}

/// Read a local file, validating existence and PDF magic bytes.
async fn resolve_local(path: &Path) -> Result<ResolvedInput, Pdf2PptxError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Pdf2PptxError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Pdf2PptxError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    check_magic(&bytes, path)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());

    debug!("Resolved local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(ResolvedInput {
        bytes,
        file_name,
        origin: path.to_path_buf(),
    })
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2PptxError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2PptxError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2PptxError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Pdf2PptxError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Pdf2PptxError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Pdf2PptxError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    let file_name = filename_from_url(url);
    let origin = PathBuf::from(url);
    check_magic(&bytes, &origin)?;

    info!("Downloaded {} bytes as '{}'", bytes.len(), file_name);
    Ok(ResolvedInput {
        bytes,
        file_name,
        origin,
    })
}

fn check_magic(bytes: &[u8], path: &Path) -> Result<(), Pdf2PptxError> {
    if bytes.len() >= 4 && &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(Pdf2PptxError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    if bytes.len() < 4 {
        return Err(Pdf2PptxError::CorruptPdf {
            path: path.to_path_buf(),
            detail: format!("only {} bytes", bytes.len()),
        });
    }
    Ok(())
}

/// Last path segment of the URL if it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
