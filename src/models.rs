use std::fmt;

use serde::Serialize;

use crate::error::SurveyError;

/// The four survey questions, in the column order shared by the survey
/// sheet, the analysis sheet and the exported report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Criterion {
    OverallSatisfaction,
    ProductQuality,
    CustomerSupport,
    Recommendation,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Criterion::OverallSatisfaction,
        Criterion::ProductQuality,
        Criterion::CustomerSupport,
        Criterion::Recommendation,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Criterion::OverallSatisfaction => "Overall Satisfaction",
            Criterion::ProductQuality => "Product Quality",
            Criterion::CustomerSupport => "Customer Support",
            Criterion::Recommendation => "Recommendation",
        }
    }

    pub fn question(self) -> &'static str {
        match self {
            Criterion::OverallSatisfaction => {
                "How would you rate your overall satisfaction with our service? (1-5): "
            }
            Criterion::ProductQuality => {
                "How satisfied are you with the quality of the product you received? (1-5): "
            }
            Criterion::CustomerSupport => {
                "How would you rate your experience with our customer support team? (1-5): "
            }
            Criterion::Recommendation => {
                "How likely are you to recommend our product/service to a friend or colleague? (1-5): "
            }
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A named worksheet in the tabular store. Row 1 of every sheet is its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sheet {
    Survey,
    Analysis,
    Report,
}

impl Sheet {
    pub const ALL: [Sheet; 3] = [Sheet::Survey, Sheet::Analysis, Sheet::Report];

    pub fn name(self) -> &'static str {
        match self {
            Sheet::Survey => "survey",
            Sheet::Analysis => "analysis",
            Sheet::Report => "report",
        }
    }

    pub fn header(self) -> &'static [&'static str] {
        match self {
            Sheet::Survey => &[
                "customer_id",
                "overall_satisfaction",
                "product_quality",
                "customer_support",
                "recommendation",
            ],
            Sheet::Analysis => &[
                "response_count",
                "avg_overall",
                "avg_quality",
                "avg_support",
                "avg_recommendation",
            ],
            Sheet::Report => &["Metric", "Value", "Feedback"],
        }
    }

    pub fn header_row(self) -> Vec<String> {
        self.header().iter().map(|cell| cell.to_string()).collect()
    }
}

impl fmt::Display for Sheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyResponse {
    pub customer_id: i64,
    pub scores: [u8; 4],
}

impl SurveyResponse {
    pub fn from_row(row: &[String], position: usize) -> Result<Self, SurveyError> {
        let cells = parse_cells(Sheet::Survey, row, position)?;
        let mut scores = [0u8; 4];
        for (slot, value) in scores.iter_mut().zip(&cells[1..]) {
            if !(1..=5).contains(value) {
                return Err(SurveyError::MalformedRow {
                    sheet: Sheet::Survey,
                    row: position,
                    reason: format!("score {value} is outside 1-5"),
                });
            }
            *slot = *value as u8;
        }
        Ok(Self {
            customer_id: cells[0],
            scores,
        })
    }

    pub fn score(&self, criterion: Criterion) -> u8 {
        self.scores[criterion as usize]
    }
}

/// One computed aggregate: response count plus the rounded average per criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisSnapshot {
    pub response_count: u64,
    pub averages: [u8; 4],
}

impl AnalysisSnapshot {
    pub fn to_row(&self) -> Vec<String> {
        std::iter::once(self.response_count.to_string())
            .chain(self.averages.iter().map(|avg| avg.to_string()))
            .collect()
    }

    pub fn from_row(row: &[String], position: usize) -> Result<Self, SurveyError> {
        let cells = parse_cells(Sheet::Analysis, row, position)?;
        let response_count = u64::try_from(cells[0]).map_err(|_| SurveyError::MalformedRow {
            sheet: Sheet::Analysis,
            row: position,
            reason: format!("negative response count {}", cells[0]),
        })?;
        let mut averages = [0u8; 4];
        for (slot, value) in averages.iter_mut().zip(&cells[1..]) {
            *slot = u8::try_from(*value).map_err(|_| SurveyError::MalformedRow {
                sheet: Sheet::Analysis,
                row: position,
                reason: format!("average {value} is out of range"),
            })?;
        }
        Ok(Self {
            response_count,
            averages,
        })
    }

    pub fn average(&self, criterion: Criterion) -> u8 {
        self.averages[criterion as usize]
    }
}

fn parse_cells(sheet: Sheet, row: &[String], position: usize) -> Result<[i64; 5], SurveyError> {
    if row.len() < 5 {
        return Err(SurveyError::MalformedRow {
            sheet,
            row: position,
            reason: format!("expected 5 cells, found {}", row.len()),
        });
    }

    let mut cells = [0i64; 5];
    for (slot, raw) in cells.iter_mut().zip(row) {
        *slot = raw.trim().parse().map_err(|_| SurveyError::MalformedRow {
            sheet,
            row: position,
            reason: format!("'{raw}' is not an integer"),
        })?;
    }
    Ok(cells)
}
