use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{SurveyError, SurveyResult};
use crate::models::Sheet;
use crate::survey;

/// The shared tabular store: ordered rows of text cells per sheet, header first.
#[async_trait]
pub trait TableStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    /// Every row of the sheet including the header.
    async fn get_all_values(&self, sheet: Sheet) -> SurveyResult<Vec<Vec<String>>>;

    async fn append_row(&self, sheet: Sheet, cells: Vec<String>) -> SurveyResult<()>;

    /// Drops every data row; the header row stays in place.
    async fn clear(&self, sheet: Sheet) -> SurveyResult<()>;

    /// Appends `cells` prefixed with `last id + 1` and returns the new id.
    /// Reading the last id and appending happen under one lock, so two
    /// callers never receive the same id.
    async fn append_numbered_row(&self, sheet: Sheet, cells: Vec<String>) -> SurveyResult<i64>;
}

/// In-process store used by tests and by `run --ephemeral`.
pub struct MemoryStore {
    sheets: Mutex<HashMap<Sheet, Vec<Vec<String>>>>,
    unavailable: AtomicBool,
    unreadable: std::sync::Mutex<HashSet<Sheet>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        let sheets = Sheet::ALL
            .into_iter()
            .map(|sheet| (sheet, vec![sheet.header_row()]))
            .collect();
        Self {
            sheets: Mutex::new(sheets),
            unavailable: AtomicBool::new(false),
            unreadable: std::sync::Mutex::new(HashSet::new()),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail like an unreachable remote store.
    #[cfg(test)]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Makes reads of one sheet fail while everything else keeps working.
    #[cfg(test)]
    pub fn fail_reads_of(&self, sheet: Sheet) {
        if let Ok(mut unreadable) = self.unreadable.lock() {
            unreadable.insert(sheet);
        }
    }

    fn check_readable(&self, sheet: Sheet) -> SurveyResult<()> {
        self.check_available()?;
        let unreadable = self
            .unreadable
            .lock()
            .map(|sheets| sheets.contains(&sheet))
            .unwrap_or(false);
        if unreadable {
            return Err(SurveyError::RemoteStore(format!(
                "{sheet} sheet marked unreadable"
            )));
        }
        Ok(())
    }

    fn check_available(&self) -> SurveyResult<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(SurveyError::RemoteStore(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn get_all_values(&self, sheet: Sheet) -> SurveyResult<Vec<Vec<String>>> {
        self.check_readable(sheet)?;
        Ok(self
            .sheets
            .lock()
            .await
            .get(&sheet)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_row(&self, sheet: Sheet, cells: Vec<String>) -> SurveyResult<()> {
        self.check_available()?;
        self.sheets.lock().await.entry(sheet).or_default().push(cells);
        Ok(())
    }

    async fn clear(&self, sheet: Sheet) -> SurveyResult<()> {
        self.check_available()?;
        self.sheets
            .lock()
            .await
            .insert(sheet, vec![sheet.header_row()]);
        Ok(())
    }

    async fn append_numbered_row(&self, sheet: Sheet, cells: Vec<String>) -> SurveyResult<i64> {
        self.check_available()?;
        let mut sheets = self.sheets.lock().await;
        let rows = sheets.entry(sheet).or_default();
        let id = survey::last_customer_id(rows)? + 1;
        let mut row = Vec::with_capacity(cells.len() + 1);
        row.push(id.to_string());
        row.extend(cells);
        rows.push(row);
        Ok(id)
    }
}
