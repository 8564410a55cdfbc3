use crate::{
    config::Scoring,
    error::OmrResult,
    grid::{BubbleRegion, GridLayout},
};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

/// Answers read from one sheet image.
///
/// Exactly one of the two states is meaningful: a scored sheet has answers and
/// no error, a failed sheet carries an error and whatever answers were read
/// before the failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyResponse {
    #[serde(rename = "questionResponses", default)]
    pub question_responses: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SurveyResponse {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            question_responses: BTreeMap::new(),
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn answer(&self, question_id: &str) -> &str {
        self.question_responses
            .get(question_id)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Running best choice for one question.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DarknessScore {
    pub chosen_value: String,
    pub darkness: f64,
}

impl DarknessScore {
    /// Only a strictly darker circle takes over, so ties stay with the earlier choice.
    pub fn offer(&mut self, choice_value: &str, darkness: f64) {
        if darkness > self.darkness {
            self.chosen_value = choice_value.to_string();
            self.darkness = darkness;
        }
    }

    /// The chosen value if its mark clears the threshold, `""` otherwise.
    pub fn resolve(&self, threshold: f64) -> String {
        if self.darkness > threshold {
            self.chosen_value.clone()
        } else {
            String::new()
        }
    }
}

/// Score one encoded image with the reference thresholds.
pub fn score_image(image_bytes: &[u8], grid: &GridLayout) -> SurveyResponse {
    score_image_with(&Scoring::default(), image_bytes, grid)
}

pub fn score_image_with(scoring: &Scoring, image_bytes: &[u8], grid: &GridLayout) -> SurveyResponse {
    try_score_image(scoring, image_bytes, grid)
        .unwrap_or_else(|err| SurveyResponse::failed(err.to_string()))
}

pub fn try_score_image(
    scoring: &Scoring,
    image_bytes: &[u8],
    grid: &GridLayout,
) -> OmrResult<SurveyResponse> {
    let img = image::load_from_memory(image_bytes)?.to_rgba8();
    trace!(width = img.width(), height = img.height(), "decoded sheet");
    Ok(score_rgba(scoring, &img, grid))
}

/// Score an already decoded sheet.
pub fn score_rgba(scoring: &Scoring, img: &RgbaImage, grid: &GridLayout) -> SurveyResponse {
    let mut scores: BTreeMap<&str, DarknessScore> = BTreeMap::new();

    for region in &grid.regions {
        let ratio = region_darkness(scoring, img, region);
        scores
            .entry(region.question_id.as_str())
            .or_default()
            .offer(&region.choice_value, ratio);
    }

    let question_responses = scores
        .into_iter()
        .map(|(qid, score)| {
            trace!(question = qid, choice = %score.chosen_value, darkness = score.darkness);
            (qid.to_string(), score.resolve(scoring.darkness_threshold))
        })
        .collect();

    SurveyResponse {
        question_responses,
        error: None,
    }
}

/// Fraction of dark pixels inside the region's crop box.
///
/// Crop pixels outside the image read as transparent black. They never count
/// as dark but still count toward the total, so a circle hanging off the edge
/// of the scan is diluted rather than clipped.
pub fn region_darkness(scoring: &Scoring, img: &RgbaImage, region: &BubbleRegion) -> f64 {
    let (left, top, right, bottom) = region.pixel_bounds();

    let mut dark_count = 0u64;
    let mut total_count = 0u64;

    for yy in top..bottom {
        for xx in left..right {
            let px = pixel_or_transparent(img, xx, yy);
            if is_dark(scoring, px) {
                dark_count += 1;
            }
            total_count += 1;
        }
    }

    if total_count == 0 {
        return 0.0;
    }
    dark_count as f64 / total_count as f64
}

fn pixel_or_transparent(img: &RgbaImage, x: i64, y: i64) -> Rgba<u8> {
    match (u32::try_from(x), u32::try_from(y)) {
        (Ok(x), Ok(y)) => img.get_pixel_checked(x, y).copied().unwrap_or(Rgba([0, 0, 0, 0])),
        _ => Rgba([0, 0, 0, 0]),
    }
}

fn is_dark(scoring: &Scoring, px: Rgba<u8>) -> bool {
    let [r, g, b, a] = px.0;
    let brightness = (f64::from(r) + f64::from(g) + f64::from(b)) / 3.0;
    brightness < scoring.dark_brightness && a > scoring.min_alpha
}
