//! Normalization of uploaded files into a flat list of PDFs.
//!
//! PDFs are taken as-is, ZIP archives contribute every PDF they contain
//! (by base name), anything else is ignored.

use std::io::{Cursor, Read};

use crate::error::ProcessError;

/// Largest buffer reserved up front for one archive entry. Entries may still
/// grow past it while being read, within the extraction budget.
const MAX_ENTRY_RESERVATION: u64 = 16 * 1024 * 1024;

/// A file received from a client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A PDF ready to become a session document.
#[derive(Debug, Clone)]
pub struct PdfUpload {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadKind {
    Pdf,
    Zip,
    Other,
}

fn classify(filename: &str) -> UploadKind {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        UploadKind::Pdf
    } else if lower.ends_with(".zip") {
        UploadKind::Zip
    } else {
        UploadKind::Other
    }
}

/// Strips any directory components from a client-supplied name.
fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Expands uploads into PDFs, preserving upload order.
///
/// `max_extracted_bytes` bounds the total size of PDFs taken out of archives
/// in this upload; an archive that would exceed it is rejected.
pub fn collect_pdfs(
    files: Vec<UploadedFile>,
    max_extracted_bytes: u64,
) -> Result<Vec<PdfUpload>, ProcessError> {
    let mut remaining = max_extracted_bytes;
    let mut pdfs = Vec::new();
    for file in files {
        match classify(&file.filename) {
            UploadKind::Pdf => pdfs.push(PdfUpload {
                name: base_name(&file.filename).to_string(),
                bytes: file.bytes,
            }),
            UploadKind::Zip => {
                let extracted = extract_zip(&file.filename, &file.bytes, &mut remaining)?;
                tracing::debug!(
                    archive = %file.filename,
                    count = extracted.len(),
                    "expanded archive"
                );
                pdfs.extend(extracted);
            }
            UploadKind::Other => {
                tracing::debug!(filename = %file.filename, "skipping unsupported upload");
            }
        }
    }
    Ok(pdfs)
}

fn extract_zip(
    archive_name: &str,
    bytes: &[u8],
    remaining: &mut u64,
) -> Result<Vec<PdfUpload>, ProcessError> {
    let archive_error = |reason: String| ProcessError::Archive {
        name: archive_name.to_string(),
        reason,
    };

    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| archive_error(e.to_string()))?;

    let mut pdfs = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| archive_error(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let entry_name = entry.name().to_string();
        // macOS resource forks ride along in many archives.
        if entry_name.starts_with("__MACOSX/") {
            continue;
        }
        let name = base_name(&entry_name);
        if name.starts_with("._") || classify(name) != UploadKind::Pdf {
            continue;
        }

        let too_large = || archive_error(format!("'{}' exceeds the extraction limit", entry_name));
        // The declared size comes from the archive and may be forged either way.
        let declared = entry.size();
        if declared > *remaining {
            return Err(too_large());
        }
        let mut content = Vec::with_capacity(declared.min(MAX_ENTRY_RESERVATION) as usize);
        let read = entry
            .by_ref()
            .take(remaining.saturating_add(1))
            .read_to_end(&mut content)
            .map_err(|e| archive_error(format!("failed to read '{}': {}", entry_name, e)))?
            as u64;
        if read > *remaining {
            return Err(too_large());
        }
        *remaining -= read;
        pdfs.push(PdfUpload {
            name: name.to_string(),
            bytes: content,
        });
    }
    Ok(pdfs)
}


#[cfg(test)]
mod tests {
    use super::test_support::zip_of;
    use super::*;

    const BUDGET: u64 = 1024 * 1024;

    fn upload(name: &str, bytes: &[u8]) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_pdfs_pass_through_and_others_are_skipped() {
        let uploads = vec![
            upload("a.pdf", b"A"),
            upload("notes.txt", b"skip"),
            upload("B.PDF", b"B"),
        ];
        let pdfs = collect_pdfs(uploads, BUDGET).unwrap();
        let names: Vec<_> = pdfs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "B.PDF"]);
    }

    #[test]
    fn test_zip_contributes_inner_pdfs_by_base_name() {
        let archive = zip_of(&[
            ("batch/one.pdf", b"1"),
            ("batch/readme.md", b"#"),
            ("batch/deep/two.pdf", b"2"),
            ("__MACOSX/batch/._one.pdf", b"junk"),
        ]);
        let pdfs = collect_pdfs(
            vec![upload("batch.zip", &archive), upload("three.pdf", b"3")],
            BUDGET,
        )
        .unwrap();
        let names: Vec<_> = pdfs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["one.pdf", "two.pdf", "three.pdf"]);
        assert_eq!(pdfs[1].bytes, b"2".to_vec());
    }

    #[test]
    fn test_zip_without_pdfs_yields_nothing() {
        let archive = zip_of(&[("a.txt", b"a")]);
        assert!(collect_pdfs(vec![upload("docs.zip", &archive)], BUDGET)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_corrupt_zip_is_rejected() {
        let err =
            collect_pdfs(vec![upload("broken.zip", b"PK\x03\x04garbage")], BUDGET).unwrap_err();
        assert!(matches!(err, ProcessError::Archive { ref name, .. } if name == "broken.zip"));
    }

    #[test]
    fn test_client_paths_are_stripped() {
        let pdfs = collect_pdfs(vec![upload("C:\\scans\\invoice.pdf", b"x")], BUDGET).unwrap();
        assert_eq!(pdfs[0].name, "invoice.pdf");
    }

    /// Rewrites the uncompressed size of the first central directory entry.
    fn forge_declared_size(mut archive: Vec<u8>, size: u32) -> Vec<u8> {
        let header = archive
            .windows(4)
            .position(|w| w == b"PK\x01\x02")
            .expect("central directory header");
        archive[header + 24..header + 28].copy_from_slice(&size.to_le_bytes());
        archive
    }

    #[test]
    fn test_forged_entry_size_is_rejected_without_allocating() {
        let archive = forge_declared_size(zip_of(&[("scan.pdf", b"%PDF")]), 0xFFFF_FFF0);
        let err = collect_pdfs(vec![upload("forged.zip", &archive)], BUDGET).unwrap_err();
        assert!(
            matches!(err, ProcessError::Archive { ref reason, .. } if reason.contains("extraction limit"))
        );
    }

    #[test]
    fn test_extraction_budget_spans_every_archive() {
        let first = zip_of(&[("a.pdf", &[b'a'; 600][..])]);
        let second = zip_of(&[("b.pdf", &[b'b'; 600][..])]);

        let one = collect_pdfs(vec![upload("one.zip", &first)], 1000).unwrap();
        assert_eq!(one[0].bytes.len(), 600);

        let err = collect_pdfs(
            vec![upload("one.zip", &first), upload("two.zip", &second)],
            1000,
        )
        .unwrap_err();
        assert!(matches!(err, ProcessError::Archive { ref name, .. } if name == "two.zip"));
    }

    #[test]
    fn test_plain_pdfs_do_not_count_against_the_budget() {
        let pdfs = collect_pdfs(vec![upload("big.pdf", &[0u8; 64])], 0).unwrap();
        assert_eq!(pdfs.len(), 1);
    }
}
