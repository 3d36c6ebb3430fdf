//! Terminal rendition of the review frontend: upload, progress and detail views.

use std::path::PathBuf;
use std::time::Duration;

use docverify::client::{poll_until, PollOptions, SessionProgress};
use docverify::labels::{self, CategoryFilter};
use docverify::processor::UploadedFile;
use docverify::ApiClient;

use crate::error::ServerError;

/// Creates a session from local PDF and ZIP files.
pub async fn upload(client: &ApiClient, paths: &[PathBuf]) -> Result<i64, ServerError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ServerError::ReadFile {
                path: path.display().to_string(),
                source,
            })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.pdf".to_string());
        files.push(UploadedFile { filename, bytes });
    }

    let session = client.create_session(files).await?;
    println!(
        "Created session {} with {} document(s)",
        session.id, session.total_documents
    );
    Ok(session.id)
}

/// Polls the document list until every document is SUCCESSFUL or FAILED.
pub async fn watch(client: &ApiClient, session_id: i64, interval: Duration) -> Result<(), ServerError> {
    let options = PollOptions {
        interval,
        max_attempts: None,
    };
    let documents = poll_until(
        options,
        || client.documents(session_id, None),
        |docs| SessionProgress::from_documents(docs).is_complete(),
        |docs| println!("{}", SessionProgress::from_documents(docs)),
    )
    .await?;

    for doc in &documents {
        let v = doc.verification;
        println!(
            "  #{:<5} {:<11} {}  qr={} stamp={} signature={}",
            doc.id,
            doc.status.as_str(),
            doc.original_name,
            v.has_qr,
            v.has_stamp,
            v.has_signature
        );
    }
    let session = client.session(session_id).await?;
    println!("Session {} finished: {}", session.id, session.status);
    Ok(())
}

/// Prints one document: flags, normalized detections per page and analysis.
pub async fn show(
    client: &ApiClient,
    session_id: i64,
    document_id: i64,
    only: Option<&str>,
    interval: Duration,
) -> Result<(), ServerError> {
    let filter = match only {
        Some(list) => CategoryFilter::parse(list).map_err(ServerError::InvalidArgument)?,
        None => CategoryFilter::default(),
    };

    let details = client.document(session_id, document_id).await?;
    let doc = &details.document;
    println!("{} ({})", doc.original_name, doc.status);
    println!("  document: {}", doc.document_url);
    let v = doc.verification;
    println!(
        "  QR: {}  stamp: {}  signature: {}",
        yes_no(v.has_qr),
        yes_no(v.has_stamp),
        yes_no(v.has_signature)
    );
    if let Some(error) = &details.error {
        println!("  error: {error}");
    }

    if let Some(labels) = &details.labels_position {
        for page in &labels.artifacts.pages {
            println!("  page {} ({}x{})", page.page_index, page.width, page.height);
            for d in labels.detections_on(page.page_index) {
                if !filter.matches(d) {
                    continue;
                }
                let Some(b) = labels::normalize(d, page.width, page.height) else {
                    continue;
                };
                println!(
                    "    {:<10} x={:.3} y={:.3} w={:.3} h={:.3} conf={:.2}",
                    b.category, b.x, b.y, b.width, b.height, b.confidence
                );
            }
        }
    }

    let options = PollOptions {
        interval,
        max_attempts: None,
    };
    let analysis = poll_until(
        options,
        || client.analysis_status(document_id),
        |view| view.is_terminal(),
        |_| {},
    )
    .await?;

    println!("  analysis: {:?}", analysis.status);
    if let Some(kind) = &analysis.document_type {
        println!("    type: {kind}");
    }
    if let Some(summary) = &analysis.document_summary {
        println!("    summary: {summary}");
    }
    if let Some(frauds) = &analysis.fraud_sentences {
        println!("    suspicious sentences: {}", frauds.len());
        for sentence in frauds {
            println!("      - {sentence}");
        }
    }
    if let Some(words) = &analysis.mistake_words {
        println!("    misspelled: {}", words.join(", "));
    }
    if let Some(log) = &analysis.error_log {
        println!("    error: {log}");
    }
    if let Some(message) = &analysis.message {
        println!("    {message}");
    }
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
