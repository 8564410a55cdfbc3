use crate::config::Layout;
use serde::{Deserialize, Serialize};

/// Pixel box of one answer circle on the sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BubbleRegion {
    pub question_id: String,
    pub choice_value: String,
    pub x: i64,
    pub y: i64,
    pub width: f64,
    pub height: f64,
}

impl BubbleRegion {
    /// Integer pixel bounds `(left, top, right, bottom)`, right/bottom exclusive.
    pub fn pixel_bounds(&self) -> (i64, i64, i64, i64) {
        let right = (self.x as f64 + self.width).trunc() as i64;
        let bottom = (self.y as f64 + self.height).trunc() as i64;
        (self.x, self.y, right, bottom)
    }
}

/// Every circle of one sheet template, question-major in choice order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    pub regions: Vec<BubbleRegion>,
}

impl GridLayout {
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Distinct question ids in first-seen order.
    pub fn question_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for r in &self.regions {
            if !ids.contains(&r.question_id) {
                ids.push(r.question_id.clone());
            }
        }
        ids
    }
}

/// Grid for the reference answer sheet.
pub fn generate_grid() -> GridLayout {
    Layout::default().grid()
}

const MAX_PREALLOC: usize = 4096;

impl Layout {
    pub fn region_count(&self) -> usize {
        (self.questions as usize).saturating_mul(self.choices_per_question as usize)
    }

    pub fn grid(&self) -> GridLayout {
        let mut regions = Vec::with_capacity(self.region_count().min(MAX_PREALLOC));

        for q in 1..=self.questions {
            let question_y = self.start_y + f64::from(q - 1) * self.vertical_shift;
            // x is a running sum; truncating it must match the summed float, not c * spacing.
            let mut x_so_far = self.start_x;
            for c in 1..=self.choices_per_question {
                regions.push(BubbleRegion {
                    question_id: format!("Q{q}"),
                    choice_value: c.to_string(),
                    x: x_so_far.trunc() as i64,
                    y: question_y.trunc() as i64,
                    width: self.circle_width,
                    height: self.circle_height,
                });
                x_so_far += if c == 1 { self.first_gap } else { self.spacing };
            }
        }

        GridLayout { regions }
    }
}
