use crate::config::ProcessingSettings;

/// Knobs of the labeling pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub render_dpi: u32,
    /// Detections below this confidence are discarded.
    pub min_confidence: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&ProcessingSettings::default())
    }
}

impl From<&ProcessingSettings> for PipelineConfig {
    fn from(settings: &ProcessingSettings) -> Self {
        Self {
            render_dpi: settings.render_dpi,
            min_confidence: settings.detection_confidence,
        }
    }
}
