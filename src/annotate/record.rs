use serde::{Deserialize, Serialize};

use crate::projection::{PixelRect, Projection};

/// One element's annotation in one sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox2D {
    pub class_id: usize,
    pub label: String,
    #[serde(flatten)]
    pub projection: Projection,
}

impl BoundingBox2D {
    pub fn new(class_id: usize, label: impl Into<String>, projection: Projection) -> Self {
        Self {
            class_id,
            label: label.into(),
            projection,
        }
    }

    /// Pixel rectangle, `None` when the element is absent.
    pub fn rect(&self) -> Option<&PixelRect> {
        self.projection.rect()
    }

    pub fn is_absent(&self) -> bool {
        self.projection.is_absent()
    }
}

/// Persisted description of one sample. Paths are relative to the split
/// directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: String,
    pub split: String,
    pub state_index: u64,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated_image: Option<String>,
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub boxes: Vec<BoundingBox2D>,
}

impl DatasetRecord {
    pub fn visible_boxes(&self) -> impl Iterator<Item = &BoundingBox2D> {
        self.boxes.iter().filter(|b| !b.is_absent())
    }
}
