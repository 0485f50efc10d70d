//! dataset_verify - Check a written split against its metadata index.
//!
//! For every indexed record this tool checks:
//! - the image, label and (if listed) annotated image exist
//! - the image has the dimensions the record claims
//! - the label file matches the labels recomputed from the indexed boxes
//! - every class id is listed in classes.txt

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use sweep_annotate::annotate::{label_lines, parse_label_file};
use sweep_annotate::dataset::{CLASSES_FILE, INDEX_FILE};
use sweep_annotate::{read_index, DatasetRecord};

#[path = "../ui.rs"]
mod ui;

const LABEL_TOLERANCE: f64 = 1e-4;

#[derive(Parser, Debug)]
#[command(
    name = "dataset_verify",
    about = "Verify a dataset split against its metadata index"
)]
struct Args {
    /// Split directory (contains metadata.jsonl)
    #[arg(long, value_name = "PATH")]
    split_dir: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    println!("dataset_verify: checking {}", args.split_dir.display());
    println!();

    let records = {
        let _stage = ui.stage("Read metadata index");
        read_index(&args.split_dir.join(INDEX_FILE))?
    };
    let classes = {
        let _stage = ui.stage("Read class list");
        let path = args.split_dir.join(CLASSES_FILE);
        fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?
            .lines()
            .map(str::to_string)
            .collect::<Vec<_>>()
    };

    let mut failures = 0usize;
    {
        let _stage = ui.stage("Verify records");
        for record in &records {
            match verify_record(&args.split_dir, record, classes.len()) {
                Ok(()) => {
                    if args.verbose {
                        println!("  {}: {} boxes OK", record.id, record.visible_boxes().count());
                    }
                }
                Err(err) => {
                    failures += 1;
                    println!("  {}: FAIL {:#}", record.id, err);
                }
            }
        }
    }
    println!();

    if failures > 0 {
        return Err(anyhow!(
            "{} of {} records failed verification",
            failures,
            records.len()
        ));
    }
    println!("OK: {} records verified.", records.len());
    Ok(())
}

fn verify_record(split_dir: &Path, record: &DatasetRecord, class_count: usize) -> Result<()> {
    let image_path = split_dir.join(&record.image);
    let (width, height) = image::image_dimensions(&image_path)
        .with_context(|| format!("reading {}", image_path.display()))?;
    if (width, height) != (record.width, record.height) {
        return Err(anyhow!(
            "image is {}x{}, index says {}x{}",
            width,
            height,
            record.width,
            record.height
        ));
    }
    if let Some(annotated) = &record.annotated_image {
        if !split_dir.join(annotated).is_file() {
            return Err(anyhow!("missing annotated image {}", annotated));
        }
    }
    if let Some(bad) = record.boxes.iter().find(|b| b.class_id >= class_count) {
        return Err(anyhow!(
            "class id {} ({}) not in {}",
            bad.class_id,
            bad.label,
            CLASSES_FILE
        ));
    }

    let label_path = split_dir.join(&record.label);
    let raw = fs::read_to_string(&label_path)
        .with_context(|| format!("reading {}", label_path.display()))?;
    let on_disk = parse_label_file(&raw)?;
    let expected = label_lines(&record.boxes, record.width, record.height);
    if on_disk.len() != expected.len() {
        return Err(anyhow!(
            "label file has {} lines, index implies {}",
            on_disk.len(),
            expected.len()
        ));
    }
    for (n, (got, want)) in on_disk.iter().zip(&expected).enumerate() {
        if !got.approx_eq(want, LABEL_TOLERANCE) {
            return Err(anyhow!(
                "label line {} is {:?}, index implies {:?}",
                n + 1,
                got,
                want
            ));
        }
    }
    Ok(())
}
