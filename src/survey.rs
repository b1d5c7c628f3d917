use tracing::info;

use crate::error::{SurveyError, SurveyResult};
use crate::models::Sheet;
use crate::store::TableStore;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

pub const RATING_GUIDE: &str = "\
Data must be a number from 1-5 based on the following:
    1 - Bad experience
    2 - Poor experience
    3 - Neutral experience
    4 - Good experience
    5 - Best experience";

/// Parses one typed answer into a score in `MIN_SCORE..=MAX_SCORE`.
pub fn validate_response(raw: &str) -> SurveyResult<u8> {
    let value: i64 = raw.trim().parse().map_err(|_| {
        SurveyError::InvalidInput("Invalid input. Please enter a number between 1 and 5.".to_string())
    })?;

    if !(i64::from(MIN_SCORE)..=i64::from(MAX_SCORE)).contains(&value) {
        return Err(SurveyError::InvalidInput(
            "Number must be between 1 and 5.".to_string(),
        ));
    }

    Ok(value as u8)
}

/// First cell of the last data row, or 1 when the sheet has no data rows.
pub fn last_customer_id(rows: &[Vec<String>]) -> SurveyResult<i64> {
    if rows.len() < 2 {
        return Ok(1);
    }

    let position = rows.len();
    let cell = rows[position - 1]
        .first()
        .ok_or_else(|| SurveyError::MalformedRow {
            sheet: Sheet::Survey,
            row: position,
            reason: "row has no customer id".to_string(),
        })?;

    cell.trim().parse().map_err(|_| SurveyError::MalformedRow {
        sheet: Sheet::Survey,
        row: position,
        reason: format!("customer id '{cell}' is not an integer"),
    })
}

pub struct SurveyRecorder<'a> {
    store: &'a dyn TableStore,
}

impl<'a> SurveyRecorder<'a> {
    pub fn new(store: &'a dyn TableStore) -> Self {
        Self { store }
    }

    pub async fn get_last_customer_id(&self) -> SurveyResult<i64> {
        let rows = self.store.get_all_values(Sheet::Survey).await?;
        last_customer_id(&rows)
    }

    /// Appends one response row and returns the customer id it was given.
    pub async fn record(&self, scores: [u8; 4]) -> SurveyResult<i64> {
        let cells = scores.iter().map(|score| score.to_string()).collect();
        let customer_id = self
            .store
            .append_numbered_row(Sheet::Survey, cells)
            .await?;
        info!(
            customer_id,
            backend = self.store.backend_tag(),
            ?scores,
            "recorded survey response"
        );
        Ok(customer_id)
    }
}
