use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::analysis::message_for;
use crate::error::{SurveyError, SurveyResult};
use crate::models::{AnalysisSnapshot, Criterion};

pub const DEFAULT_REPORT_PATH: &str = "reports/analysis_report.csv";
pub const TOTAL_RESPONSES_METRIC: &str = "Total Responses";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportRow {
    #[serde(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Value")]
    pub value: u64,
    #[serde(rename = "Feedback", default)]
    pub feedback: Option<String>,
}

impl ReportRow {
    pub fn to_cells(&self) -> Vec<String> {
        let mut cells = vec![self.metric.clone(), self.value.to_string()];
        if let Some(feedback) = &self.feedback {
            cells.push(feedback.clone());
        }
        cells
    }
}

pub fn metric_name(criterion: Criterion) -> String {
    format!("Average {}", criterion.label())
}

/// One row for the response count, then one per criterion in column order.
pub fn build_rows(snapshot: &AnalysisSnapshot, include_feedback: bool) -> Vec<ReportRow> {
    let mut rows = vec![ReportRow {
        metric: TOTAL_RESPONSES_METRIC.to_string(),
        value: snapshot.response_count,
        feedback: include_feedback.then(String::new),
    }];

    for criterion in Criterion::ALL {
        let average = snapshot.average(criterion);
        rows.push(ReportRow {
            metric: metric_name(criterion),
            value: u64::from(average),
            feedback: include_feedback.then(|| message_for(i64::from(average)).to_string()),
        });
    }

    rows
}

/// Keeps a field on a single line. Quotes are doubled by the csv writer.
pub fn sanitize_field(field: &str) -> String {
    field
        .replace("\r\n", " ")
        .replace(['\r', '\n'], " ")
}

pub struct ReportExporter {
    path: PathBuf,
}

impl ReportExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn export(&self, snapshot: &AnalysisSnapshot, include_feedback: bool) -> SurveyResult<()> {
        let rows = build_rows(snapshot, include_feedback);
        self.write_rows(&rows, include_feedback)?;
        info!(
            path = %self.path.display(),
            response_count = snapshot.response_count,
            include_feedback,
            "exported analysis report"
        );
        Ok(())
    }

    fn write_rows(&self, rows: &[ReportRow], include_feedback: bool) -> SurveyResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_path(&self.path)?;

        if include_feedback {
            writer.write_record(["Metric", "Value", "Feedback"])?;
        } else {
            writer.write_record(["Metric", "Value"])?;
        }

        for row in rows {
            let cells: Vec<String> = row.to_cells().iter().map(|c| sanitize_field(c)).collect();
            writer.write_record(&cells)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// The exported file as text lines, header first.
    pub fn read_back(&self) -> SurveyResult<Vec<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(SurveyError::ReportMissing {
                path: self.path.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// The exported file parsed back into rows, for re-import into the store.
    pub fn parse(&self) -> SurveyResult<Vec<ReportRow>> {
        if !self.path.exists() {
            return Err(SurveyError::ReportMissing {
                path: self.path.clone(),
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;
        let mut rows = Vec::new();
        for result in reader.deserialize::<ReportRow>() {
            rows.push(result?);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> AnalysisSnapshot {
        AnalysisSnapshot {
            response_count: 1,
            averages: [5, 4, 3, 2],
        }
    }

    #[test]
    fn export_writes_metric_value_rows() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ReportExporter::new(dir.path().join("reports/analysis_report.csv"));

        exporter.export(&snapshot(), false).unwrap();
        let lines = exporter.read_back().unwrap();

        assert_eq!(
            lines,
            vec![
                "Metric,Value",
                "Total Responses,1",
                "Average Overall Satisfaction,5",
                "Average Product Quality,4",
                "Average Customer Support,3",
                "Average Recommendation,2",
            ]
        );
    }

    #[test]
    fn export_with_feedback_adds_third_column() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ReportExporter::new(dir.path().join("analysis_report.csv"));

        exporter.export(&snapshot(), true).unwrap();
        let lines = exporter.read_back().unwrap();

        assert_eq!(lines[0], "Metric,Value,Feedback");
        assert_eq!(lines[1], "Total Responses,1,");
        assert!(lines[2].starts_with("Average Overall Satisfaction,5,Excellent."));
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn exported_rows_parse_back_to_the_same_values() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ReportExporter::new(dir.path().join("r.csv"));
        let snapshot = AnalysisSnapshot {
            response_count: 0,
            averages: [0, 0, 0, 0],
        };

        for include_feedback in [false, true] {
            exporter.export(&snapshot, include_feedback).unwrap();
            let expected: Vec<ReportRow> = build_rows(&snapshot, include_feedback)
                .into_iter()
                .map(|mut row| {
                    // empty cells read back as None
                    row.feedback = row.feedback.filter(|f| !f.is_empty());
                    row
                })
                .collect();
            assert_eq!(exporter.parse().unwrap(), expected);
        }
    }

    #[test]
    fn sanitize_removes_line_breaks() {
        assert_eq!(sanitize_field("a\nb\r\nc\rd"), "a b c d");
    }

    #[test]
    fn quotes_and_newlines_stay_on_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ReportExporter::new(dir.path().join("r.csv"));
        let rows = vec![ReportRow {
            metric: "Note".to_string(),
            value: 3,
            feedback: Some("said \"fine\"\nthen left".to_string()),
        }];

        exporter.write_rows(&rows, true).unwrap();
        let lines = exporter.read_back().unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "Note,3,\"said \"\"fine\"\" then left\"");
    }

    #[test]
    fn read_back_before_export_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ReportExporter::new(dir.path().join("missing.csv"));
        assert!(matches!(
            exporter.read_back(),
            Err(SurveyError::ReportMissing { .. })
        ));
        assert!(matches!(exporter.parse(), Err(SurveyError::ReportMissing { .. })));
    }
}
