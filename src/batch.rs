use crate::{
    config::Config,
    error::{OmrError, OmrResult},
    grid::GridLayout,
    scorer::{self, SurveyResponse},
    util::sha256_hex,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::time::Instant;
use tracing::{debug, info, warn};

/// One invocation's worth of scoring state. The grid is built once and shared
/// read-only by every image of the batch.
pub struct Batch {
    cfg: Config,
    grid: GridLayout,
}

impl Batch {
    pub fn new(cfg: &Config) -> Self {
        Self {
            cfg: cfg.clone(),
            grid: cfg.layout.grid(),
        }
    }

    pub fn grid(&self) -> &GridLayout {
        &self.grid
    }

    /// Rejects a request before any image is touched.
    pub fn check_request(&self, image_count: usize) -> OmrResult<()> {
        if image_count == 0 {
            return Err(OmrError::ClientInput("No images provided".into()));
        }
        let max = self.cfg.limits.max_images;
        if max > 0 && image_count > max {
            return Err(OmrError::ClientInput(format!(
                "Too many images: {image_count} (max {max})"
            )));
        }
        Ok(())
    }

    /// Scores every image in order. One result per input, always; a bad image
    /// only spoils its own slot.
    pub fn score_batch<S: AsRef<str>>(&self, encoded_images: &[S]) -> Vec<SurveyResponse> {
        self.score_entries(encoded_images.iter().map(|s| Ok(s.as_ref())))
    }

    /// Like [`Batch::score_batch`], but an entry may already be a failure
    /// (for example a non-string element of a JSON array). It is recorded in
    /// its own slot like any other image error.
    pub fn score_entries<'a, I>(&self, entries: I) -> Vec<SurveyResponse>
    where
        I: IntoIterator<Item = OmrResult<&'a str>>,
    {
        let started = Instant::now();
        let mut results = Vec::new();

        for (i, entry) in entries.into_iter().enumerate() {
            let res = entry
                .and_then(|encoded| self.decode_image(i, encoded))
                .and_then(|bytes| {
                    scorer::try_score_image(&self.cfg.scoring, &bytes, &self.grid)
                });

            let response = match res {
                Ok(r) => r,
                Err(err) => {
                    warn!("image {} failed: {err}", i);
                    SurveyResponse::failed(err.to_string())
                }
            };
            debug!(index = i, answers = ?response.question_responses, "scored");
            results.push(response);
        }

        let failed = results.iter().filter(|r| !r.is_ok()).count();
        info!(
            "batch images={} failed={} elapsed_ms={}",
            results.len(),
            failed,
            started.elapsed().as_millis()
        );
        results
    }

    fn decode_image(&self, index: usize, encoded: &str) -> OmrResult<Vec<u8>> {
        // Characters outside the base64 alphabet are skipped, not rejected.
        let compact: String = encoded
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
            .collect();
        let bytes = STANDARD.decode(compact.as_bytes())?;

        let max = self.cfg.limits.max_image_bytes;
        if max > 0 && bytes.len() > max {
            return Err(OmrError::ImageDecode(format!(
                "image exceeds max_image_bytes: {} > {}",
                bytes.len(),
                max
            )));
        }

        let digest = sha256_hex(&bytes);
        info!("image {} bytes={} sha256={}", index, bytes.len(), &digest[..12]);
        Ok(bytes)
    }
}

/// Scores a batch against the reference sheet with default settings.
pub fn score_batch<S: AsRef<str>>(encoded_images: &[S]) -> Vec<SurveyResponse> {
    Batch::new(&Config::default()).score_batch(encoded_images)
}
