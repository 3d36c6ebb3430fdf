use crate::models::Verification;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelingPhase {
    Rendering,
    Uploading,
    Detecting,
    Drawing,
    Persisting,
}

impl LabelingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelingPhase::Rendering => "rendering",
            LabelingPhase::Uploading => "uploading",
            LabelingPhase::Detecting => "detecting",
            LabelingPhase::Drawing => "drawing",
            LabelingPhase::Persisting => "persisting",
        }
    }
}

/// Events emitted by the pipeline while labeling a document.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Phase {
        phase: LabelingPhase,
        message: String,
    },
    Completed {
        pages: usize,
        verification: Verification,
    },
    Failed {
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Writes every event to the log of the current span.
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase { phase, message } => {
                tracing::info!(phase = phase.as_str(), "{}", message);
            }
            ProgressEvent::Completed {
                pages,
                verification,
            } => {
                tracing::info!(
                    pages,
                    has_qr = verification.has_qr,
                    has_stamp = verification.has_stamp,
                    has_signature = verification.has_signature,
                    "document labeled"
                );
            }
            ProgressEvent::Failed { error } => {
                tracing::warn!(error = %error, "document labeling failed");
            }
        }
    }
}
