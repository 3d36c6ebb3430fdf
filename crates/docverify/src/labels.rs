//! Detection payloads stored per document and the views derived from them.
//!
//! Pixel coordinates are stored exactly as the detector reported them. The
//! viewer works in page-relative coordinates, see [`normalize`].

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::collaborators::{Detection, DetectionCategory};
use crate::models::Verification;

/// Stored labeling result of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelsPosition {
    pub artifacts: Artifacts,
    /// Detections keyed by 1-based page index.
    pub detections: BTreeMap<String, Vec<LabeledDetection>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifacts {
    pub original_pdf_url: String,
    pub labeled_pdf_url: Option<String>,
    pub pages: Vec<PageArtifact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageArtifact {
    pub page_index: u32,
    pub image_url: String,
    pub labeled_image_url: Option<String>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledDetection {
    pub category: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub area: f64,
    pub confidence: f64,
}

impl From<&Detection> for LabeledDetection {
    fn from(d: &Detection) -> Self {
        Self {
            category: d.category.clone(),
            x: d.x,
            y: d.y,
            width: d.width,
            height: d.height,
            area: d.area(),
            confidence: d.confidence,
        }
    }
}

impl LabeledDetection {
    pub fn kind(&self) -> Option<DetectionCategory> {
        DetectionCategory::from_label(&self.category)
    }
}

impl LabelsPosition {
    pub fn page(&self, page_index: u32) -> Option<&PageArtifact> {
        self.artifacts.pages.iter().find(|p| p.page_index == page_index)
    }

    pub fn detections_on(&self, page_index: u32) -> &[LabeledDetection] {
        self.detections
            .get(&page_index.to_string())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Flags derived from every stored detection.
    pub fn verification(&self) -> Verification {
        verification_of(self.detections.values().flatten().filter_map(LabeledDetection::kind))
    }
}

/// Sets a flag for each category that appears at least once.
pub fn verification_of(kinds: impl IntoIterator<Item = DetectionCategory>) -> Verification {
    let mut flags = Verification::default();
    for kind in kinds {
        match kind {
            DetectionCategory::Qr => flags.has_qr = true,
            DetectionCategory::Stamp => flags.has_stamp = true,
            DetectionCategory::Signature => flags.has_signature = true,
        }
    }
    flags
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub category: String,
    pub bbox: BBox,
    pub area: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: u32,
    pub height: u32,
}

/// One page in the annotation-export format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAnnotations {
    /// Each element holds a single `annotation_K` entry.
    pub annotations: Vec<BTreeMap<String, Annotation>>,
    pub page_size: PageSize,
}

/// Converts a document's labels into `{"page_N": {annotations, page_size}}`.
///
/// Annotation numbers run across the whole document, starting at 1.
pub fn page_annotations(labels: &LabelsPosition) -> BTreeMap<String, PageAnnotations> {
    let mut pages: Vec<&PageArtifact> = labels.artifacts.pages.iter().collect();
    pages.sort_by_key(|p| p.page_index);

    let mut next_id = 0;
    let mut out = BTreeMap::new();
    for page in pages {
        let annotations = labels
            .detections_on(page.page_index)
            .iter()
            .map(|d| {
                next_id += 1;
                let mut entry = BTreeMap::new();
                entry.insert(
                    format!("annotation_{next_id}"),
                    Annotation {
                        category: d.category.clone(),
                        bbox: BBox {
                            x: d.x,
                            y: d.y,
                            width: d.width,
                            height: d.height,
                        },
                        area: d.area,
                        confidence: d.confidence,
                    },
                );
                entry
            })
            .collect();
        out.insert(
            format!("page_{}", page.page_index),
            PageAnnotations {
                annotations,
                page_size: PageSize {
                    width: page.width,
                    height: page.height,
                },
            },
        );
    }
    out
}

pub type LabelsMap = BTreeMap<String, BTreeMap<String, PageAnnotations>>;

/// Builds the session labels map keyed by original file name.
///
/// Documents are expected oldest first; a repeated name gets ` (2)`, ` (3)`…
pub fn labels_map<'a, I>(documents: I) -> LabelsMap
where
    I: IntoIterator<Item = (&'a str, &'a LabelsPosition)>,
{
    let mut used = HashSet::new();
    let mut map = BTreeMap::new();
    for (name, labels) in documents {
        map.insert(unique_name(name, &mut used), page_annotations(labels));
    }
    map
}

fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{name} ({n})");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// A detection in page-relative coordinates, every value in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedBox {
    pub category: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
}

/// Divides pixel coordinates by the page size and clamps them to `[0, 1]`.
/// Returns `None` for a degenerate page size.
pub fn normalize(d: &LabeledDetection, page_width: u32, page_height: u32) -> Option<NormalizedBox> {
    if page_width == 0 || page_height == 0 {
        return None;
    }
    let (pw, ph) = (page_width as f64, page_height as f64);
    let clamp = |v: f64, max: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, max) };
    let x = clamp(d.x / pw, 1.0);
    let y = clamp(d.y / ph, 1.0);
    Some(NormalizedBox {
        category: d.category.clone(),
        x,
        y,
        // The box never extends past the right or bottom edge.
        width: clamp(d.width / pw, 1.0 - x),
        height: clamp(d.height / ph, 1.0 - y),
        confidence: d.confidence,
    })
}

/// Which categories the viewer currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryFilter {
    pub qr: bool,
    pub stamp: bool,
    pub signature: bool,
}

impl Default for CategoryFilter {
    fn default() -> Self {
        Self {
            qr: true,
            stamp: true,
            signature: true,
        }
    }
}

impl CategoryFilter {
    /// Parses `qr,stamp`; an empty list keeps everything visible.
    pub fn parse(list: &str) -> Result<Self, String> {
        let mut filter = Self {
            qr: false,
            stamp: false,
            signature: false,
        };
        let mut any = false;
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match DetectionCategory::from_label(item) {
                Some(kind) => filter.set(kind, true),
                None => return Err(format!("unknown category '{item}'")),
            }
            any = true;
        }
        Ok(if any { filter } else { Self::default() })
    }

    pub fn set(&mut self, kind: DetectionCategory, visible: bool) {
        match kind {
            DetectionCategory::Qr => self.qr = visible,
            DetectionCategory::Stamp => self.stamp = visible,
            DetectionCategory::Signature => self.signature = visible,
        }
    }

    pub fn toggle(&mut self, kind: DetectionCategory) {
        let visible = self.allows(kind);
        self.set(kind, !visible);
    }

    pub fn allows(&self, kind: DetectionCategory) -> bool {
        match kind {
            DetectionCategory::Qr => self.qr,
            DetectionCategory::Stamp => self.stamp,
            DetectionCategory::Signature => self.signature,
        }
    }

    /// Unknown categories are only shown while nothing is filtered out.
    pub fn matches(&self, detection: &LabeledDetection) -> bool {
        match detection.kind() {
            Some(kind) => self.allows(kind),
            None => *self == Self::default(),
        }
    }
}
