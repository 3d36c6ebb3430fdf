use std::collections::BTreeMap;

use crate::collaborators::Detection;
use crate::labels::LabelsPosition;
use crate::models::Verification;
use crate::processor::RenderedPage;

/// A document waiting to be labeled.
#[derive(Debug, Clone)]
pub struct DocumentJob {
    pub session_id: i64,
    pub document_id: i64,
    pub original_name: String,
    pub pdf: Vec<u8>,
}

pub struct LabelingContext {
    // Input
    pub job: DocumentJob,
    pub document_key: String,

    // Step 1 result
    pub pages: Vec<RenderedPage>,

    // Step 2 results
    pub original_url: Option<String>,
    pub page_urls: BTreeMap<u32, String>,

    // Step 3 result, keyed by page
    pub detections: BTreeMap<u32, Vec<Detection>>,

    // Step 4 result
    pub labeled_urls: BTreeMap<u32, String>,
}

impl LabelingContext {
    pub fn new(job: DocumentJob) -> Self {
        let document_key = crate::storage::document_key(job.session_id, job.document_id);
        Self {
            job,
            document_key,
            pages: Vec::new(),
            original_url: None,
            page_urls: BTreeMap::new(),
            detections: BTreeMap::new(),
            labeled_urls: BTreeMap::new(),
        }
    }
}

/// What a successful run stored for the document.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelingOutcome {
    pub document_id: i64,
    pub verification: Verification,
    pub labels: LabelsPosition,
}
