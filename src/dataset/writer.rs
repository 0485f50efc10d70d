use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, RgbImage};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{
    compact_index, write_animation, write_atomic, ANIMATION_FILE, CLASSES_FILE, INDEX_FILE,
};
use crate::annotate::{AssembledSample, IMAGES_DIR, LABELS_DIR};

/// What [`DatasetWriter::finish`] left on disk.
#[derive(Clone, Debug, Default)]
pub struct FinishReport {
    /// Records in the compacted index, including ones from earlier runs.
    pub indexed: usize,
    pub animation: Option<PathBuf>,
    pub animation_error: Option<String>,
}

/// Single writer for one split directory.
///
/// Nothing touches the filesystem until the first [`write`](Self::write).
/// Index lines are appended and flushed per sample; [`finish`](Self::finish)
/// collapses repeated ids so the index holds one line per id.
pub struct DatasetWriter {
    split_dir: PathBuf,
    class_names: Vec<String>,
    index: Option<File>,
    ids: HashSet<String>,
}

impl DatasetWriter {
    pub fn new(split_dir: impl Into<PathBuf>, class_names: Vec<String>) -> Self {
        Self {
            split_dir: split_dir.into(),
            class_names,
            index: None,
            ids: HashSet::new(),
        }
    }

    pub fn split_dir(&self) -> &Path {
        &self.split_dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.split_dir.join(INDEX_FILE)
    }

    /// Distinct ids written by this writer.
    pub fn written(&self) -> usize {
        self.ids.len()
    }

    /// Persists a sample's artifacts, then its index line. The index line is
    /// only appended once every artifact is on disk.
    pub fn write(&mut self, sample: &AssembledSample) -> Result<()> {
        self.ensure_layout()?;
        let record = &sample.record;

        save_png(&self.split_dir.join(&record.image), &sample.image)?;
        if let (Some(rel), Some(annotated)) = (&record.annotated_image, &sample.annotated) {
            save_png(&self.split_dir.join(rel), annotated)?;
        }
        let label_path = self.split_dir.join(&record.label);
        fs::write(&label_path, &sample.label_text)
            .with_context(|| format!("writing {}", label_path.display()))?;

        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let index_path = self.index_path();
        let index = self
            .index
            .as_mut()
            .ok_or_else(|| anyhow!("metadata index is not open"))?;
        let committed = index.metadata()?.len();
        if let Err(err) = index.write_all(line.as_bytes()).and_then(|_| index.flush()) {
            // Drop any partial line so the next append starts clean.
            if let Err(trunc) = index.set_len(committed) {
                log::warn!(
                    "could not roll back {} to {} bytes: {}",
                    index_path.display(),
                    committed,
                    trunc
                );
            }
            return Err(anyhow::Error::from(err)
                .context(format!("appending to {}", index_path.display())));
        }

        if !self.ids.insert(record.id.clone()) {
            log::debug!("sample {} rewritten", record.id);
        }
        Ok(())
    }

    /// Compacts the index and, when `overlays` is non-empty, writes the
    /// summary animation. An animation failure is reported, not returned.
    pub fn finish(&mut self, overlays: &[&RgbImage]) -> Result<FinishReport> {
        self.index = None;
        let mut report = FinishReport::default();

        let index_path = self.index_path();
        if index_path.exists() {
            report.indexed = compact_index(&index_path)?;
        }

        if !overlays.is_empty() {
            let path = self.split_dir.join(ANIMATION_FILE);
            let result = fs::create_dir_all(&self.split_dir)
                .map_err(anyhow::Error::from)
                .and_then(|_| write_animation(&path, overlays));
            match result {
                Ok(()) => {
                    log::info!(
                        "wrote {} frame animation to {}",
                        overlays.len(),
                        path.display()
                    );
                    report.animation = Some(path);
                }
                Err(err) => {
                    log::warn!("failed to write annotation animation: {:#}", err);
                    report.animation_error = Some(format!("{:#}", err));
                }
            }
        }
        Ok(report)
    }

    fn ensure_layout(&mut self) -> Result<()> {
        if self.index.is_some() {
            return Ok(());
        }
        for dir in [IMAGES_DIR, LABELS_DIR] {
            let path = self.split_dir.join(dir);
            fs::create_dir_all(&path)
                .with_context(|| format!("creating {}", path.display()))?;
        }
        let mut classes = self.class_names.join("\n");
        classes.push('\n');
        write_atomic(&self.split_dir.join(CLASSES_FILE), classes.as_bytes())?;
        self.index = Some(open_index(&self.index_path())?);
        Ok(())
    }
}

fn save_png(path: &Path, image: &RgbImage) -> Result<()> {
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("writing {}", path.display()))
}

/// Opens the index for appending. A line left unterminated by an
/// interrupted run is cut off, so the file ends on a record boundary.
fn open_index(path: &Path) -> Result<File> {
    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let len = file.metadata()?.len();
    let boundary = last_line_end(&mut file, len)?;
    if boundary < len {
        log::warn!(
            "{}: dropping {} bytes of an unterminated record",
            path.display(),
            len - boundary
        );
        file.set_len(boundary)
            .with_context(|| format!("truncating {}", path.display()))?;
    }
    Ok(file)
}

/// Offset just past the last newline in the first `len` bytes, or 0.
fn last_line_end(file: &mut File, len: u64) -> Result<u64> {
    const CHUNK: u64 = 4096;
    let mut buf = [0u8; CHUNK as usize];
    let mut end = len;
    while end > 0 {
        let start = end.saturating_sub(CHUNK);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(pos) = chunk.iter().rposition(|&b| b == b'\n') {
            return Ok(start + pos as u64 + 1);
        }
        end = start;
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{BoundingBox2D, DatasetRecord};
    use crate::dataset::read_index;
    use crate::projection::{PixelRect, Projection};
    use image::Rgb;
    use tempfile::tempdir;

    fn sample(id: &str, xmin: f64, annotated: bool) -> AssembledSample {
        let image = RgbImage::from_pixel(40, 20, Rgb([9, 9, 9]));
        let boxes = vec![BoundingBox2D::new(
            0,
            "Cube",
            Projection::Visible {
                bbox: PixelRect {
                    xmin,
                    ymin: 2.0,
                    xmax: 20.0,
                    ymax: 10.0,
                },
            },
        )];
        AssembledSample {
            record: DatasetRecord {
                id: id.to_string(),
                split: "train".to_string(),
                state_index: 0,
                image: format!("images/{}.png", id),
                annotated_image: annotated.then(|| format!("images/{}_annotated.png", id)),
                label: format!("labels/{}.txt", id),
                width: 40,
                height: 20,
                boxes,
            },
            annotated: annotated.then(|| image.clone()),
            image,
            label_text: "0 0.375000 0.300000 0.250000 0.400000\n".to_string(),
        }
    }

    #[test]
    fn layout_is_created_on_first_write() -> Result<()> {
        let dir = tempdir()?;
        let split = dir.path().join("out").join("train");
        let mut writer = DatasetWriter::new(&split, vec!["Cube".into(), "Sphere".into()]);
        assert!(!split.exists());

        writer.write(&sample("000000-aa", 10.0, true))?;
        assert!(split.join("images/000000-aa.png").is_file());
        assert!(split.join("images/000000-aa_annotated.png").is_file());
        assert!(split.join("labels/000000-aa.txt").is_file());
        assert_eq!(fs::read_to_string(split.join(CLASSES_FILE))?, "Cube\nSphere\n");
        // Flushed before finish.
        assert_eq!(fs::read_to_string(split.join(INDEX_FILE))?.lines().count(), 1);
        Ok(())
    }

    #[test]
    fn rewriting_an_id_keeps_the_later_record() -> Result<()> {
        let dir = tempdir()?;
        let mut writer = DatasetWriter::new(dir.path(), vec!["Cube".into()]);
        writer.write(&sample("000001-bb", 1.0, false))?;
        writer.write(&sample("000001-bb", 5.0, false))?;
        assert_eq!(writer.written(), 1);

        let report = writer.finish(&[])?;
        assert_eq!(report.indexed, 1);
        assert!(report.animation.is_none());

        let records = read_index(&dir.path().join(INDEX_FILE))?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].boxes[0].rect().map(|r| r.xmin), Some(5.0));
        Ok(())
    }

    #[test]
    fn finish_writes_animation_for_overlays() -> Result<()> {
        let dir = tempdir()?;
        let mut writer = DatasetWriter::new(dir.path(), vec!["Cube".into()]);
        let s = sample("000002-cc", 1.0, true);
        writer.write(&s)?;
        let frame = s.annotated.clone().unwrap();
        let report = writer.finish(&[&frame])?;
        assert_eq!(report.animation, Some(dir.path().join(ANIMATION_FILE)));
        assert!(dir.path().join(ANIMATION_FILE).is_file());
        Ok(())
    }

    #[test]
    fn unterminated_tail_is_cut_before_appending() -> Result<()> {
        let dir = tempdir()?;
        let index_path = dir.path().join(INDEX_FILE);
        let mut writer = DatasetWriter::new(dir.path(), vec!["Cube".into()]);
        writer.write(&sample("000000-aa", 1.0, false))?;
        writer.finish(&[])?;

        let mut raw = fs::read_to_string(&index_path)?;
        raw.push_str("{\"id\":\"000003-ab");
        fs::write(&index_path, raw)?;

        let mut writer = DatasetWriter::new(dir.path(), vec!["Cube".into()]);
        writer.write(&sample("000003-dd", 1.0, false))?;
        let report = writer.finish(&[])?;
        assert_eq!(report.indexed, 2);

        let records = read_index(&index_path)?;
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["000000-aa", "000003-dd"]);
        Ok(())
    }

    #[test]
    fn index_without_any_newline_is_reset() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join(INDEX_FILE), "{\"id\":\"0000")?;
        let mut writer = DatasetWriter::new(dir.path(), vec!["Cube".into()]);
        writer.write(&sample("000004-ee", 1.0, false))?;
        writer.finish(&[])?;
        let records = read_index(&dir.path().join(INDEX_FILE))?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "000004-ee");
        Ok(())
    }
}
