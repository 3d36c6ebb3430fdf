use crate::dto::SessionDocumentDto;
use crate::models::DocumentStatus;

/// Progress of a session, computed from its document list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionProgress {
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub total: usize,
}

impl SessionProgress {
    pub fn from_documents(documents: &[SessionDocumentDto]) -> Self {
        let mut progress = Self {
            total: documents.len(),
            ..Self::default()
        };
        for doc in documents {
            match doc.status {
                DocumentStatus::Successful => progress.completed += 1,
                DocumentStatus::Failed => progress.failed += 1,
                DocumentStatus::Pending => progress.pending += 1,
            }
        }
        progress
    }

    pub fn finished(&self) -> usize {
        self.completed + self.failed
    }

    /// Whole percent of finished documents; 0 for an empty list.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.finished() * 100) / self.total).min(100) as u8
    }

    /// Complete once at least one document exists and none is pending.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.pending == 0
    }
}

impl std::fmt::Display for SessionProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:>3}% | {} done, {} failed, {} pending of {}",
            self.percent(),
            self.completed,
            self.failed,
            self.pending,
            self.total
        )
    }
}
