//! Annotation assembly.
//!
//! Turns a render plus its projected boxes into a [`DatasetRecord`], the
//! label payload and, in debug mode, an overlay image that is also kept for
//! the run's summary animation.

mod id;
pub mod label;
mod overlay;
mod record;

use image::RgbImage;
use std::collections::HashMap;

use crate::projection::project;
use crate::scene::RenderResult;

pub use id::SampleIdGenerator;
pub use label::{format_label_file, label_lines, parse_label_file, LabelLine};
pub use overlay::draw_overlay;
pub use record::{BoundingBox2D, DatasetRecord};

pub const IMAGES_DIR: &str = "images";
pub const LABELS_DIR: &str = "labels";

/// A record together with the artifacts the writer persists for it.
#[derive(Clone, Debug)]
pub struct AssembledSample {
    pub record: DatasetRecord,
    pub image: RgbImage,
    pub annotated: Option<RgbImage>,
    pub label_text: String,
}

/// Projects every tracked element of a render, in class-id order.
pub fn project_elements(render: &RenderResult) -> Vec<BoundingBox2D> {
    render
        .elements
        .iter()
        .map(|element| {
            BoundingBox2D::new(
                element.class_id,
                element.name.clone(),
                project(&element.transform, element.extent.as_ref(), &render.camera),
            )
        })
        .collect()
}

pub struct AnnotationAssembler {
    ids: SampleIdGenerator,
    split: String,
    debug: bool,
    overlays: Vec<RgbImage>,
    /// Position of each sample's frame in `overlays`.
    slots: HashMap<String, usize>,
}

impl AnnotationAssembler {
    pub fn new(seed: u64, split: impl Into<String>, debug: bool) -> Self {
        Self {
            ids: SampleIdGenerator::new(seed),
            split: split.into(),
            debug,
            overlays: Vec::new(),
            slots: HashMap::new(),
        }
    }

    pub fn assemble(
        &mut self,
        sample_index: u64,
        render: RenderResult,
        boxes: Vec<BoundingBox2D>,
    ) -> AssembledSample {
        let id = self.ids.id_for(sample_index);
        let (width, height) = render.image.dimensions();
        let label_text = format_label_file(&label_lines(&boxes, width, height));

        let annotated = if self.debug {
            let overlay = draw_overlay(&render.image, &boxes);
            self.push_overlay(&id, overlay.clone());
            Some(overlay)
        } else {
            None
        };

        let record = DatasetRecord {
            image: format!("{}/{}.png", IMAGES_DIR, id),
            annotated_image: annotated
                .as_ref()
                .map(|_| format!("{}/{}_annotated.png", IMAGES_DIR, id)),
            label: format!("{}/{}.txt", LABELS_DIR, id),
            id,
            split: self.split.clone(),
            state_index: render.state_index,
            width,
            height,
            boxes,
        };

        AssembledSample {
            record,
            image: render.image,
            annotated,
            label_text,
        }
    }

    /// Drops the overlay of a sample that was not persisted.
    pub fn discard_overlay(&mut self, id: &str) {
        let Some(pos) = self.slots.remove(id) else {
            return;
        };
        self.overlays.remove(pos);
        for slot in self.slots.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
    }

    /// Overlay frames in capture order.
    pub fn overlays(&self) -> impl Iterator<Item = &RgbImage> {
        self.overlays.iter()
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    fn push_overlay(&mut self, id: &str, frame: RgbImage) {
        match self.slots.get(id) {
            Some(&pos) => self.overlays[pos] = frame,
            None => {
                self.slots.insert(id.to_string(), self.overlays.len());
                self.overlays.push(frame);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{CameraModel, Intrinsics, PixelRect, Projection};
    use glam::DAffine3;
    use image::Rgb;

    fn render(index: u64) -> RenderResult {
        RenderResult {
            state_index: index,
            image: RgbImage::from_pixel(100, 50, Rgb([0, 0, 0])),
            camera: CameraModel {
                world_from_camera: DAffine3::IDENTITY,
                intrinsics: Intrinsics::from_fov(1.0, 100, 50),
                near: 0.1,
            },
            elements: vec![],
        }
    }

    fn boxes() -> Vec<BoundingBox2D> {
        vec![
            BoundingBox2D::new(
                0,
                "Cube",
                Projection::Visible {
                    bbox: PixelRect {
                        xmin: 10.0,
                        ymin: 10.0,
                        xmax: 30.0,
                        ymax: 20.0,
                    },
                },
            ),
            BoundingBox2D::new(1, "Sphere", Projection::Absent),
        ]
    }

    #[test]
    fn assembles_consistent_paths_and_labels() {
        let mut assembler = AnnotationAssembler::new(5, "train", false);
        let sample = assembler.assemble(3, render(3), boxes());
        let id = &sample.record.id;
        assert_eq!(sample.record.image, format!("images/{}.png", id));
        assert_eq!(sample.record.label, format!("labels/{}.txt", id));
        assert!(sample.record.annotated_image.is_none());
        assert!(sample.annotated.is_none());
        assert_eq!(sample.record.boxes.len(), 2);
        assert_eq!(
            sample.label_text,
            "0 0.200000 0.300000 0.200000 0.200000\n"
        );
        assert_eq!(assembler.overlay_count(), 0);
    }

    #[test]
    fn debug_mode_keeps_overlay_frames() {
        let mut assembler = AnnotationAssembler::new(5, "val", true);
        let first = assembler.assemble(0, render(0), boxes());
        assembler.assemble(1, render(1), boxes());
        assert_eq!(assembler.overlay_count(), 2);
        assert_eq!(
            first.record.annotated_image,
            Some(format!("images/{}_annotated.png", first.record.id))
        );

        // Re-assembling an id replaces its frame.
        assembler.assemble(1, render(1), boxes());
        assert_eq!(assembler.overlay_count(), 2);

        assembler.discard_overlay(&first.record.id);
        assert_eq!(assembler.overlay_count(), 1);
    }

    #[test]
    fn discarding_keeps_later_frames_addressable() {
        let mut assembler = AnnotationAssembler::new(5, "val", true);
        let ids: Vec<String> = (0..3)
            .map(|i| assembler.assemble(i, render(i), boxes()).record.id)
            .collect();
        assembler.discard_overlay(&ids[0]);
        assembler.discard_overlay("not-a-sample");
        assert_eq!(assembler.overlay_count(), 2);

        // Replacing the last frame must not append or touch the middle one.
        let marker = Rgb([1, 2, 3]);
        let mut last = render(2);
        last.image.put_pixel(99, 49, marker);
        assembler.assemble(2, last, vec![]);
        let frames: Vec<&RgbImage> = assembler.overlays().collect();
        assert_eq!(frames.len(), 2);
        assert_ne!(frames[0].get_pixel(99, 49), &marker);
        assert_eq!(frames[1].get_pixel(99, 49), &marker);

        assembler.discard_overlay(&ids[2]);
        assembler.discard_overlay(&ids[1]);
        assert_eq!(assembler.overlay_count(), 0);
    }
}
