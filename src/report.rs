use crate::{
    config::{Config, Report},
    error::{OmrError, OmrResult},
    grid::GridLayout,
    scorer::SurveyResponse,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use regex::Regex;
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static TRAILING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)$").expect("valid trailing-number regex"));

/// Header row followed by one row per scored sheet, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTable {
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn build(report: &Report, question_ids: &[String], results: &[SurveyResponse]) -> Self {
        let mut header: Vec<String> = question_ids.to_vec();
        header.push(report.error_column.clone());

        let mut rows = Vec::with_capacity(results.len() + 1);
        rows.push(header);

        for r in results {
            let mut row: Vec<String> = question_ids
                .iter()
                .map(|qid| r.answer(qid).to_string())
                .collect();
            row.push(r.error.clone().unwrap_or_default());
            rows.push(row);
        }

        Self { rows }
    }

    pub fn header(&self) -> &[String] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn width(&self) -> usize {
        self.header().len()
    }

    /// Single-sheet xlsx workbook of the table.
    pub fn to_xlsx(&self, sheet_name: &str) -> OmrResult<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet_name)?;

        for (r, row) in self.rows.iter().enumerate() {
            let r = u32::try_from(r)
                .map_err(|_| OmrError::Encoding(format!("row index out of range: {r}")))?;
            for (c, cell) in row.iter().enumerate() {
                let c = u16::try_from(c)
                    .map_err(|_| OmrError::Encoding(format!("column index out of range: {c}")))?;
                worksheet.write_string(r, c, cell.as_str())?;
            }
        }

        Ok(workbook.save_to_buffer()?)
    }

    pub fn to_xlsx_base64(&self, sheet_name: &str) -> OmrResult<String> {
        Ok(STANDARD.encode(self.to_xlsx(sheet_name)?))
    }
}

/// Question ids ordered by their numeric suffix (`Q2` before `Q10`).
pub fn report_columns(grid: &GridLayout) -> Vec<String> {
    let mut ids = grid.question_ids();
    ids.sort_by_key(|id| {
        let n = TRAILING_NUMBER
            .captures(id)
            .and_then(|c| c[1].parse::<u64>().ok())
            .unwrap_or(u64::MAX);
        (n, id.clone())
    });
    ids
}

/// Table for the reference sheet with default column names.
pub fn encode_report(results: &[SurveyResponse]) -> ReportTable {
    let cfg = Config::default();
    let columns = report_columns(&cfg.layout.grid());
    ReportTable::build(&cfg.report, &columns, results)
}
