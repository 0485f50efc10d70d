use anyhow::{anyhow, Result};

use super::record::BoundingBox2D;

/// One detection label line: class id plus normalized centre/size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabelLine {
    pub class_id: usize,
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

impl LabelLine {
    pub fn approx_eq(&self, other: &LabelLine, tolerance: f64) -> bool {
        self.class_id == other.class_id
            && (self.cx - other.cx).abs() <= tolerance
            && (self.cy - other.cy).abs() <= tolerance
            && (self.w - other.w).abs() <= tolerance
            && (self.h - other.h).abs() <= tolerance
    }
}

/// Label lines for every non-absent box, in box order.
pub fn label_lines(boxes: &[BoundingBox2D], width: u32, height: u32) -> Vec<LabelLine> {
    let (fw, fh) = (width as f64, height as f64);
    boxes
        .iter()
        .filter_map(|b| {
            let rect = b.rect()?;
            let (cx, cy) = rect.center();
            Some(LabelLine {
                class_id: b.class_id,
                cx: (cx / fw).clamp(0.0, 1.0),
                cy: (cy / fh).clamp(0.0, 1.0),
                w: (rect.width() / fw).clamp(0.0, 1.0),
                h: (rect.height() / fh).clamp(0.0, 1.0),
            })
        })
        .collect()
}

pub fn format_label_file(lines: &[LabelLine]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(&format!(
            "{} {:.6} {:.6} {:.6} {:.6}\n",
            line.class_id, line.cx, line.cy, line.w, line.h
        ));
    }
    out
}

pub fn parse_label_file(raw: &str) -> Result<Vec<LabelLine>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 5 {
                return Err(anyhow!(
                    "label line {} has {} fields, expected 5",
                    n + 1,
                    fields.len()
                ));
            }
            let class_id = fields[0]
                .parse()
                .map_err(|_| anyhow!("label line {}: bad class id {:?}", n + 1, fields[0]))?;
            let mut coords = [0.0f64; 4];
            for (slot, field) in coords.iter_mut().zip(&fields[1..]) {
                *slot = field
                    .parse()
                    .map_err(|_| anyhow!("label line {}: bad coordinate {:?}", n + 1, field))?;
            }
            Ok(LabelLine {
                class_id,
                cx: coords[0],
                cy: coords[1],
                w: coords[2],
                h: coords[3],
            })
        })
        .collect()
}
