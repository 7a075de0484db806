use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::ImportError;

/// One line of a Dataturks export: a labeled image.
#[derive(Debug, Deserialize, Clone)]
pub struct LabeledItem {
    /// Image URL or local path.
    pub content: String,
    /// Dataturks writes `null` here for skipped images.
    #[serde(default)]
    pub annotation: Option<Vec<Option<Region>>>,
}

impl LabeledItem {
    /// Regions in export order, without `null` and `{}` entries.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.annotation
            .iter()
            .flatten()
            .flatten()
            .filter(|region| !region.is_empty())
    }

    /// An item whose annotation list is missing or has no entries at all.
    pub fn is_skipped(&self) -> bool {
        self.annotation.as_ref().map_or(true, Vec::is_empty)
    }
}

// The Region struct representing one annotated geometry
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    #[serde(default)]
    pub label: Label,
    #[serde(default)]
    pub shape: Option<String>,
    #[serde(default)]
    pub points: Vec<Point>,
    #[serde(default)]
    pub image_width: Option<u32>,
    #[serde(default)]
    pub image_height: Option<u32>,
}

impl Region {
    /// An entry carrying neither labels nor points, such as `{}`.
    pub fn is_empty(&self) -> bool {
        self.label.iter().next().is_none() && self.points.is_empty()
    }

    /// Pascal VOC only supports rectangles; a missing shape means rectangle.
    pub fn is_rectangle(&self) -> bool {
        self.shape.as_deref().map_or(true, |shape| shape == "rectangle")
    }
}

/// A region label: either one string or several labels sharing the geometry.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Label {
    One(String),
    Many(Vec<String>),
}

impl Default for Label {
    fn default() -> Self {
        Label::Many(Vec::new())
    }
}

impl Label {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let labels: &[String] = match self {
            Label::One(label) => std::slice::from_ref(label),
            Label::Many(labels) => labels,
        };
        labels.iter().map(String::as_str)
    }
}

/// A point in fractions of the image width and height.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(from = "RawPoint")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

// Rectangles come as `[x, y]` pairs, OCR boxes as `{"x": .., "y": ..}`
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPoint {
    Object { x: f64, y: f64 },
    Pair([f64; 2]),
}

impl From<RawPoint> for Point {
    fn from(raw: RawPoint) -> Self {
        match raw {
            RawPoint::Object { x, y } => Point::new(x, y),
            RawPoint::Pair([x, y]) => Point::new(x, y),
        }
    }
}

/// The two point layouts Dataturks uses for a bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Corners {
    /// All four corners of the rectangle, in any order.
    FourCorner([Point; 4]),
    /// Top-left then bottom-right.
    TwoCorner([Point; 2]),
}

impl TryFrom<&[Point]> for Corners {
    type Error = ImportError;

    fn try_from(points: &[Point]) -> Result<Self, Self::Error> {
        match *points {
            [a, b, c, d] => Ok(Corners::FourCorner([a, b, c, d])),
            [a, b] => Ok(Corners::TwoCorner([a, b])),
            _ => Err(ImportError::UnsupportedPoints(points.len())),
        }
    }
}

/// Integer pixel bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    pub xmin: i64,
    pub ymin: i64,
    pub xmax: i64,
    pub ymax: i64,
}

impl Rectangle {
    pub fn is_inverted(&self) -> bool {
        self.xmin > self.xmax || self.ymin > self.ymax
    }
}

/// A labeled box inside a Pascal VOC annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct VocObject {
    pub name: String,
    pub bndbox: Rectangle,
}

/// The Pascal VOC annotation of one image, written once as `<filename>.xml`.
#[derive(Debug, Clone, PartialEq)]
pub struct VocAnnotation {
    pub folder: String,
    pub filename: String,
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub objects: Vec<VocObject>,
}

/// Result of converting one labeled item.
#[derive(Debug)]
pub enum ItemOutcome {
    Converted(VocAnnotation),
    Skipped,
}

/// Number of image ids written to each populated manifest.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SplitSizes {
    pub trainval: usize,
    pub test: usize,
}

// Struct to hold import statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImportReport {
    pub lines_read: usize,
    pub total_items: usize,
    pub blank_lines: usize,
    pub files: usize,
    pub skipped: usize,
    pub failed: usize,
    pub label_counts: BTreeMap<String, usize>,
    pub splits: SplitSizes,
}

impl ImportReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_converted(&mut self, annotation: &VocAnnotation) {
        self.files += 1;
        for object in &annotation.objects {
            *self.label_counts.entry(object.name.clone()).or_insert(0) += 1;
        }
    }

    pub fn increment_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn increment_failed(&mut self) {
        self.failed += 1;
    }

    pub fn print_summary(&self) {
        log::info!("=== Import Summary ===");
        log::info!("Items read: {}", self.total_items);
        log::info!("Processed files: {}", self.files);
        log::info!("Skipped (no annotation): {}", self.skipped);
        for (label, count) in &self.label_counts {
            log::info!("  {}: {}", label, count);
        }
        log::info!(
            "Split: {} trainval, {} test",
            self.splits.trainval,
            self.splits.test
        );
        if self.failed > 0 {
            log::warn!("Failed items: {}", self.failed);
        }
    }
}
