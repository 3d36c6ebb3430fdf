use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::Instrument;

use crate::collaborators::Detector;
use crate::db::{document_repo, session_repo, Database};
use crate::labels::{self, Artifacts, LabeledDetection, LabelsPosition, PageArtifact};
use crate::processor::{raster, PageRenderer};
use crate::storage::{self, DocumentStorage};

use super::config::PipelineConfig;
use super::context::{DocumentJob, LabelingContext, LabelingOutcome};
use super::error::PipelineError;
use super::progress::{LabelingPhase, ProgressEvent, ProgressReporter};

/// Renders, stores, detects and labels one PDF at a time.
pub struct LabelingPipeline {
    db: Database,
    storage: DocumentStorage,
    detector: Arc<dyn Detector>,
    renderer: Arc<dyn PageRenderer>,
    config: PipelineConfig,
}

impl LabelingPipeline {
    pub fn new(
        db: Database,
        storage: DocumentStorage,
        detector: Arc<dyn Detector>,
        renderer: Arc<dyn PageRenderer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            db,
            storage,
            detector,
            renderer,
            config,
        }
    }

    /// Labels a document and records the outcome.
    ///
    /// The document ends SUCCESSFUL or FAILED, then the owning session's
    /// status is re-derived.
    pub async fn process(
        &self,
        job: DocumentJob,
        progress: &dyn ProgressReporter,
    ) -> Result<LabelingOutcome, PipelineError> {
        let span = tracing::info_span!(
            "pipeline",
            session_id = job.session_id,
            document_id = job.document_id,
            filename = %job.original_name,
        );
        async {
            let session_id = job.session_id;
            let document_id = job.document_id;

            let result = self.run(LabelingContext::new(job), progress).await;
            if let Err(err) = &result {
                let message = err.to_string();
                progress.report(ProgressEvent::Failed {
                    error: message.clone(),
                });
                if !document_repo::mark_failed(&self.db, document_id, &message)? {
                    tracing::warn!("document was no longer pending when marking it failed");
                }
            }

            if let Some(session) = session_repo::refresh_status(&self.db, session_id)? {
                if session.is_complete() {
                    tracing::info!(status = %session.status, "session finished");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Runs every step; the caller decides what a failure means.
    pub async fn run(
        &self,
        mut ctx: LabelingContext,
        progress: &dyn ProgressReporter,
    ) -> Result<LabelingOutcome, PipelineError> {
        // Step 1: Render pages
        progress.report(ProgressEvent::Phase {
            phase: LabelingPhase::Rendering,
            message: "Rendering PDF pages...".to_string(),
        });
        ctx.pages = self
            .renderer
            .render(&ctx.job.pdf, self.config.render_dpi)
            .instrument(tracing::info_span!("render_pages"))
            .await?;

        // Step 2: Upload original and pages
        progress.report(ProgressEvent::Phase {
            phase: LabelingPhase::Uploading,
            message: format!("Uploading {} page images...", ctx.pages.len()),
        });
        self.step_upload(&mut ctx)
            .instrument(tracing::info_span!("upload_pages"))
            .await?;

        // Step 3: Detect markers
        progress.report(ProgressEvent::Phase {
            phase: LabelingPhase::Detecting,
            message: "Detecting QR codes, stamps and signatures...".to_string(),
        });
        self.step_detect(&mut ctx)
            .instrument(tracing::info_span!("detect"))
            .await?;

        // Step 4: Draw labeled pages
        progress.report(ProgressEvent::Phase {
            phase: LabelingPhase::Drawing,
            message: "Drawing labeled pages...".to_string(),
        });
        self.step_draw(&mut ctx)
            .instrument(tracing::info_span!("draw_labels"))
            .await?;

        // Step 5: Persist
        progress.report(ProgressEvent::Phase {
            phase: LabelingPhase::Persisting,
            message: "Saving results...".to_string(),
        });
        let outcome = {
            let _step = tracing::info_span!("persist").entered();
            self.step_persist(&ctx)?
        };

        progress.report(ProgressEvent::Completed {
            pages: ctx.pages.len(),
            verification: outcome.verification,
        });
        Ok(outcome)
    }

    async fn step_upload(&self, ctx: &mut LabelingContext) -> Result<(), PipelineError> {
        let original = self
            .storage
            .put(&storage::original_key(&ctx.document_key), ctx.job.pdf.clone())
            .await?;
        ctx.original_url = Some(original);

        for page in &ctx.pages {
            let url = self
                .storage
                .put(&storage::page_key(&ctx.document_key, page.page), page.png.clone())
                .await?;
            ctx.page_urls.insert(page.page, url);
        }
        Ok(())
    }

    async fn step_detect(&self, ctx: &mut LabelingContext) -> Result<(), PipelineError> {
        for page in &ctx.pages {
            let filename = format!("page_{}.png", page.page);
            let found = self
                .detector
                .detect(&filename, &page.png, self.config.min_confidence)
                .await?;
            let kept: Vec<_> = found
                .into_iter()
                .filter(|d| d.confidence >= self.config.min_confidence)
                .collect();
            tracing::debug!(page = page.page, detections = kept.len(), "page scanned");
            ctx.detections.insert(page.page, kept);
        }
        Ok(())
    }

    async fn step_draw(&self, ctx: &mut LabelingContext) -> Result<(), PipelineError> {
        for page in &ctx.pages {
            let detections = ctx.detections.get(&page.page).cloned().unwrap_or_default();
            let png = page.png.clone();
            let labeled = tokio::task::spawn_blocking(move || {
                raster::draw_detections(&png, &detections)
            })
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))??;

            let url = self
                .storage
                .put(&storage::labeled_page_key(&ctx.document_key, page.page), labeled)
                .await?;
            ctx.labeled_urls.insert(page.page, url);
        }
        Ok(())
    }

    fn step_persist(&self, ctx: &LabelingContext) -> Result<LabelingOutcome, PipelineError> {
        let labels = build_labels(ctx);
        let verification = labels::verification_of(
            ctx.detections.values().flatten().filter_map(|d| d.kind()),
        );
        let payload = serde_json::to_string(&labels)?;

        if !document_repo::mark_successful(&self.db, ctx.job.document_id, verification, &payload)? {
            tracing::warn!("document was no longer pending when storing labels");
        }

        Ok(LabelingOutcome {
            document_id: ctx.job.document_id,
            verification,
            labels,
        })
    }
}

fn build_labels(ctx: &LabelingContext) -> LabelsPosition {
    let pages = ctx
        .pages
        .iter()
        .map(|page| PageArtifact {
            page_index: page.page,
            image_url: ctx.page_urls.get(&page.page).cloned().unwrap_or_default(),
            labeled_image_url: ctx.labeled_urls.get(&page.page).cloned(),
            width: page.width,
            height: page.height,
        })
        .collect();

    let detections: BTreeMap<String, Vec<LabeledDetection>> = ctx
        .detections
        .iter()
        .map(|(page, found)| (page.to_string(), found.iter().map(LabeledDetection::from).collect()))
        .collect();

    LabelsPosition {
        artifacts: Artifacts {
            original_pdf_url: ctx.original_url.clone().unwrap_or_default(),
            labeled_pdf_url: None,
            pages,
        },
        detections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::models::{DocumentStatus, SessionStatus};
    use crate::pipeline::NoopProgress;
    use crate::testing::{detection, FakeDetector, FakeRenderer};

    struct RecordingProgress(Mutex<Vec<ProgressEvent>>);

    impl ProgressReporter for RecordingProgress {
        fn report(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn pipeline(db: &Database, storage: &DocumentStorage, detector: FakeDetector, pages: u32) -> LabelingPipeline {
        LabelingPipeline::new(
            db.clone(),
            storage.clone(),
            Arc::new(detector),
            Arc::new(FakeRenderer {
                pages,
                width: 60,
                height: 80,
            }),
            PipelineConfig::default(),
        )
    }

    fn job_for(db: &Database, names: &[&str]) -> Vec<DocumentJob> {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        let (session, docs) = session_repo::create_with_documents(db, &names).unwrap();
        docs.into_iter()
            .map(|d| DocumentJob {
                session_id: session.id,
                document_id: d.id,
                original_name: d.original_name,
                pdf: b"%PDF-1.4 test".to_vec(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_process_labels_document_and_finishes_session() {
        let db = Database::open_in_memory().unwrap();
        let storage = DocumentStorage::in_memory("http://objects.test");
        let detector = FakeDetector {
            detections: vec![
                detection("stamp", 5.0, 5.0, 20.0, 10.0, 0.9),
                detection("qr", 1.0, 1.0, 4.0, 4.0, 0.1),
            ],
            fail: false,
        };
        let pipeline = pipeline(&db, &storage, detector, 2);
        let job = job_for(&db, &["contract.pdf"]).remove(0);
        let key = storage::document_key(job.session_id, job.document_id);
        let progress = RecordingProgress(Mutex::new(Vec::new()));

        let outcome = pipeline.process(job.clone(), &progress).await.unwrap();

        // The low-confidence QR code is dropped.
        assert!(outcome.verification.has_stamp);
        assert!(!outcome.verification.has_qr);
        assert_eq!(outcome.labels.artifacts.pages.len(), 2);
        assert_eq!(outcome.labels.detections_on(1).len(), 1);
        assert_eq!(outcome.labels.detections_on(1)[0].area, 200.0);
        assert_eq!(
            outcome.labels.artifacts.original_pdf_url,
            format!("http://objects.test/{key}/original.pdf")
        );
        assert_eq!(
            outcome.labels.page(2).unwrap().labeled_image_url.as_deref(),
            Some(format!("http://objects.test/{key}/labeled/page_2.png").as_str())
        );

        assert!(storage.get(&storage::original_key(&key)).await.is_ok());
        assert_eq!(storage.list_page_images(&key).await.unwrap().len(), 2);
        assert!(storage.get(&storage::labeled_page_key(&key, 1)).await.is_ok());

        let row = document_repo::find_by_id(&db, job.document_id).unwrap().unwrap();
        assert_eq!(row.status, DocumentStatus::Successful);
        assert!(row.verification.has_stamp);
        let stored: LabelsPosition =
            serde_json::from_str(row.labels_position.as_deref().unwrap()).unwrap();
        assert_eq!(stored, outcome.labels);

        let session = session_repo::find_by_id(&db, job.session_id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Success);

        let events = progress.0.lock().unwrap();
        assert!(matches!(
            events.first(),
            Some(ProgressEvent::Phase {
                phase: LabelingPhase::Rendering,
                ..
            })
        ));
        assert!(matches!(events.last(), Some(ProgressEvent::Completed { pages: 2, .. })));
    }

    #[tokio::test]
    async fn test_render_failure_marks_document_failed() {
        let db = Database::open_in_memory().unwrap();
        let storage = DocumentStorage::in_memory("http://objects.test");
        let pipeline = pipeline(
            &db,
            &storage,
            FakeDetector {
                detections: vec![],
                fail: false,
            },
            0,
        );
        let job = job_for(&db, &["empty.pdf"]).remove(0);

        let err = pipeline.process(job.clone(), &NoopProgress).await.unwrap_err();
        assert!(matches!(err, PipelineError::Processing(_)));

        let row = document_repo::find_by_id(&db, job.document_id).unwrap().unwrap();
        assert_eq!(row.status, DocumentStatus::Failed);
        assert_eq!(row.error.as_deref(), Some(err.to_string().as_str()));
        let session = session_repo::find_by_id(&db, job.session_id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn test_session_waits_for_remaining_documents() {
        let db = Database::open_in_memory().unwrap();
        let storage = DocumentStorage::in_memory("http://objects.test");
        let failing = pipeline(
            &db,
            &storage,
            FakeDetector {
                detections: vec![],
                fail: true,
            },
            1,
        );
        let jobs = job_for(&db, &["a.pdf", "b.pdf"]);

        let err = failing.process(jobs[0].clone(), &NoopProgress).await.unwrap_err();
        assert!(matches!(err, PipelineError::Detection(_)));
        let session = session_repo::find_by_id(&db, jobs[0].session_id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Processing);
        assert_eq!(session.failed_count, 1);

        let working = pipeline(
            &db,
            &storage,
            FakeDetector {
                detections: vec![detection("signature", 0.0, 0.0, 2.0, 2.0, 0.99)],
                fail: false,
            },
            1,
        );
        let outcome = working.process(jobs[1].clone(), &NoopProgress).await.unwrap();
        assert!(outcome.verification.has_signature);
        let session = session_repo::find_by_id(&db, jobs[1].session_id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
    }

    #[test]
    fn test_build_labels_for_pages_without_detections() {
        let job = DocumentJob {
            session_id: 1,
            document_id: 2,
            original_name: "x.pdf".into(),
            pdf: Vec::new(),
        };
        let mut ctx = LabelingContext::new(job);
        ctx.pages.push(crate::processor::RenderedPage {
            page: 1,
            png: Vec::new(),
            width: 10,
            height: 20,
        });
        ctx.page_urls.insert(1, "u1".into());
        ctx.detections.insert(1, Vec::new());
        let labels = build_labels(&ctx);
        assert_eq!(labels.artifacts.pages[0].image_url, "u1");
        assert!(labels.artifacts.pages[0].labeled_image_url.is_none());
        assert!(labels.detections_on(1).is_empty());
        assert_eq!(labels.verification(), Default::default());
    }
}
