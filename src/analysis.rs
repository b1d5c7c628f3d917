use tracing::{debug, info};

use crate::error::SurveyResult;
use crate::models::{AnalysisSnapshot, Criterion, Sheet, SurveyResponse};
use crate::store::TableStore;

pub const INVALID_SCORE_MESSAGE: &str = "Invalid score.";

/// Rounded per-criterion mean over all responses; all zeros when there are none.
pub fn calculate_averages(responses: &[SurveyResponse]) -> [u8; 4] {
    let count = responses.len() as u64;
    if count == 0 {
        return [0; 4];
    }

    let mut totals = [0u64; 4];
    for response in responses {
        for (total, criterion) in totals.iter_mut().zip(Criterion::ALL) {
            *total += u64::from(response.score(criterion));
        }
    }

    totals.map(|total| round_half_even(total, count) as u8)
}

/// `numerator / denominator` rounded to the nearest integer, ties to even.
pub fn round_half_even(numerator: u64, denominator: u64) -> u64 {
    let quotient = numerator / denominator;
    let twice_remainder = 2 * (numerator % denominator);
    if twice_remainder > denominator || (twice_remainder == denominator && quotient % 2 == 1) {
        quotient + 1
    } else {
        quotient
    }
}

pub fn message_for(score: i64) -> &'static str {
    match score {
        1 => "Extremely poor. Immediate action is required to address the issues.",
        2 => "Below expectations. Significant improvements are needed.",
        3 => "Average. Consider making improvements to enhance satisfaction.",
        4 => "Good. Keep up the good work, but look for areas to enhance further.",
        5 => "Excellent. Continue with the current practices to maintain high standards.",
        _ => INVALID_SCORE_MESSAGE,
    }
}

pub fn build_snapshot(responses: &[SurveyResponse]) -> AnalysisSnapshot {
    AnalysisSnapshot {
        response_count: responses.len() as u64,
        averages: calculate_averages(responses),
    }
}

/// Survey sheet rows without the header.
pub fn parse_responses(rows: &[Vec<String>]) -> SurveyResult<Vec<SurveyResponse>> {
    rows.iter()
        .enumerate()
        .skip(1)
        .map(|(idx, row)| SurveyResponse::from_row(row, idx + 1))
        .collect()
}

pub struct SurveyAnalyzer<'a> {
    store: &'a dyn TableStore,
}

impl<'a> SurveyAnalyzer<'a> {
    pub fn new(store: &'a dyn TableStore) -> Self {
        Self { store }
    }

    pub async fn fetch_responses(&self) -> SurveyResult<Vec<SurveyResponse>> {
        let rows = self.store.get_all_values(Sheet::Survey).await?;
        parse_responses(&rows)
    }

    pub async fn current_snapshot(&self) -> SurveyResult<AnalysisSnapshot> {
        let responses = self.fetch_responses().await?;
        let snapshot = build_snapshot(&responses);
        debug!(
            response_count = snapshot.response_count,
            averages = ?snapshot.averages,
            "computed snapshot"
        );
        Ok(snapshot)
    }

    /// Computes a fresh snapshot and appends it to the analysis log.
    pub async fn record_snapshot(&self) -> SurveyResult<AnalysisSnapshot> {
        let snapshot = self.current_snapshot().await?;
        self.store
            .append_row(Sheet::Analysis, snapshot.to_row())
            .await?;
        info!(
            response_count = snapshot.response_count,
            averages = ?snapshot.averages,
            "appended analysis snapshot"
        );
        Ok(snapshot)
    }

    /// The last analysis row, if any snapshot was ever recorded.
    pub async fn latest_snapshot(&self) -> SurveyResult<Option<AnalysisSnapshot>> {
        let rows = self.store.get_all_values(Sheet::Analysis).await?;
        if rows.len() < 2 {
            return Ok(None);
        }
        let position = rows.len();
        AnalysisSnapshot::from_row(&rows[position - 1], position).map(Some)
    }
}

pub fn feedback_lines(snapshot: &AnalysisSnapshot) -> Vec<String> {
    Criterion::ALL
        .iter()
        .map(|criterion| {
            let average = snapshot.average(*criterion);
            format!(
                "{} ({}): {}",
                criterion,
                average,
                message_for(i64::from(average))
            )
        })
        .collect()
}
