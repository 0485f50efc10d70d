//! On-disk dataset layout for one split.
//!
//! ```text
//! <target>/<split>/
//!     classes.txt
//!     metadata.jsonl
//!     annotation_animation.gif      (debug only)
//!     images/<id>.png
//!     images/<id>_annotated.png     (debug only)
//!     labels/<id>.txt
//! ```

mod animation;
mod index;
mod writer;

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

pub use animation::{write_animation, FRAME_DELAY_MS};
pub use index::{compact_index, read_index};
pub use writer::{DatasetWriter, FinishReport};

pub const INDEX_FILE: &str = "metadata.jsonl";
pub const CLASSES_FILE: &str = "classes.txt";
pub const ANIMATION_FILE: &str = "annotation_animation.gif";

pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {} into place", tmp_path.display()))?;
    Ok(())
}
