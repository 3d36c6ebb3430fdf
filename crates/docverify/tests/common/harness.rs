//! Test harness for isolated service execution.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use docverify::collaborators::{Collaborators, Detector};
use docverify::config::Settings;
use docverify::db::Database;
use docverify::sessions::CreatedSession;
use docverify::storage;
use docverify::AppContext;

use super::doubles::{BlankRenderer, FixedDetector};

pub struct TestHarness {
    temp_dir: TempDir,
    pub settings: Settings,
    pub ctx: AppContext,
}

impl TestHarness {
    /// Stub collaborators, a detector finding every marker and two-page documents.
    pub fn new() -> Self {
        Self::with_detector(Arc::new(FixedDetector::all_markers()), 2)
    }

    pub fn with_detector(detector: Arc<dyn Detector>, pages: u32) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let vars = HashMap::from([
            ("SERVER_PORT".to_string(), "0".to_string()),
            (
                "DATABASE_PATH".to_string(),
                temp_dir.path().join("docverify.db").display().to_string(),
            ),
            ("USE_STUB_ADAPTER".to_string(), "true".to_string()),
            (
                "STORAGE_ROOT".to_string(),
                temp_dir.path().join("objects").display().to_string(),
            ),
            ("STORAGE_PUBLIC_URL".to_string(), "http://files.test".to_string()),
        ]);
        let settings =
            Settings::from_lookup(|name| vars.get(name).cloned()).expect("valid test settings");

        let db = Database::open(&settings.database_path).expect("open database");
        let store = storage::build_store(&settings.storage).expect("filesystem storage");
        let collaborators = Collaborators {
            detector,
            ..Collaborators::stub()
        };
        let ctx = AppContext::assemble(
            db,
            store,
            collaborators,
            Arc::new(BlankRenderer { pages }),
            &settings,
        );

        Self {
            temp_dir,
            settings,
            ctx,
        }
    }

    pub fn objects_root(&self) -> PathBuf {
        self.temp_dir.path().join("objects")
    }

    /// Waits for every background task of an upload; returns the session id.
    pub async fn settle(&self, created: CreatedSession) -> i64 {
        for task in created.tasks {
            task.await.expect("document task panicked");
        }
        created.session.id
    }
}
