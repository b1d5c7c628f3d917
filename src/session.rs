use std::io::{BufRead, Write};

use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use crate::analysis::{feedback_lines, SurveyAnalyzer};
use crate::config::OwnerSecret;
use crate::console::Console;
use crate::error::SurveyResult;
use crate::models::{AnalysisSnapshot, Criterion};
use crate::report::{ReportExporter, TOTAL_RESPONSES_METRIC};
use crate::store::TableStore;
use crate::survey::{validate_response, SurveyRecorder, RATING_GUIDE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Owner,
}

pub fn parse_role(raw: &str) -> Option<Role> {
    match raw.trim().to_lowercase().as_str() {
        "customer" => Some(Role::Customer),
        "owner" => Some(Role::Owner),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    PrintAverages,
    ShowFeedback,
    ExportCsv,
    ReadCsv,
    Exit,
}

pub fn parse_menu_choice(raw: &str) -> Option<MenuChoice> {
    match raw.trim() {
        "1" => Some(MenuChoice::PrintAverages),
        "2" => Some(MenuChoice::ShowFeedback),
        "3" => Some(MenuChoice::ExportCsv),
        "4" => Some(MenuChoice::ReadCsv),
        "5" => Some(MenuChoice::Exit),
        _ => None,
    }
}

const ROLE_PROMPT: &str = "Are you a customer or the owner? (Enter 'customer' or 'owner'): ";
const CONTINUE_PROMPT: &str = "Do you want to perform another action? (yes/no): ";
const MENU: &str = "\
Available functionalities:
1. Print survey averages
2. Provide feedback based on averages
3. Export analysis to CSV
4. Read exported CSV
5. Exit menu";

/// The interactive program: role selection, customer survey, owner analysis menu.
///
/// Console failures (including closed input) end the session; store and
/// report failures are printed and only abandon the action in progress.
pub struct Session<'a, R, W> {
    store: &'a dyn TableStore,
    secret: &'a OwnerSecret,
    exporter: ReportExporter,
    console: Console<R, W>,
}

impl<'a, R: BufRead, W: Write> Session<'a, R, W> {
    pub fn new(
        store: &'a dyn TableStore,
        secret: &'a OwnerSecret,
        exporter: ReportExporter,
        console: Console<R, W>,
    ) -> Self {
        Self {
            store,
            secret,
            exporter,
            console,
        }
    }

    #[cfg(test)]
    pub fn into_console(self) -> Console<R, W> {
        self.console
    }

    pub async fn run(&mut self) -> SurveyResult<()> {
        loop {
            let answer = self.console.ask(ROLE_PROMPT)?;
            let Some(role) = parse_role(&answer) else {
                self.console
                    .say("Invalid role. Please enter 'customer' or 'owner'.")?;
                continue;
            };

            match role {
                Role::Customer => self.customer_turn().await?,
                Role::Owner => self.owner_turn().await?,
            }

            if !self.console.ask_yes_no(CONTINUE_PROMPT)? {
                self.console.say("Exiting the program.")?;
                return Ok(());
            }
        }
    }

    async fn customer_turn(&mut self) -> SurveyResult<()> {
        self.console
            .say("\nPlease rate your customer experience in the next four questions.\n")?;
        self.console.say(RATING_GUIDE)?;

        let mut scores = [0u8; 4];
        for (slot, criterion) in scores.iter_mut().zip(Criterion::ALL) {
            *slot = loop {
                let raw = self.console.ask(criterion.question())?;
                match validate_response(&raw) {
                    Ok(score) => break score,
                    Err(err) => self.console.say(err.to_string())?,
                }
            };
        }

        self.console.say("Updating survey worksheet...")?;
        match SurveyRecorder::new(self.store).record(scores).await {
            Ok(customer_id) => {
                self.console.say("Survey worksheet updated successfully.")?;
                self.console
                    .say(format!("Thank you! Your customer id is {customer_id}."))?;
            }
            Err(err) => {
                warn!(error = %err, "failed to record survey response");
                self.console.say(format!(
                    "An error occurred while processing customer responses: {err}"
                ))?;
            }
        }
        Ok(())
    }

    async fn owner_turn(&mut self) -> SurveyResult<()> {
        let attempt = self.console.ask("Enter the owner password: ")?;
        if !self.secret.verify(&attempt) {
            warn!("rejected owner password");
            self.console.say("\nIncorrect password.")?;
            return Ok(());
        }
        self.console
            .say("\nPassword correct. Proceeding with analysis...")?;

        let session_id = Uuid::new_v4();
        let span = info_span!("owner_session", %session_id);
        self.owner_session().instrument(span).await
    }

    async fn owner_session(&mut self) -> SurveyResult<()> {
        match SurveyAnalyzer::new(self.store).record_snapshot().await {
            Ok(_) => self.console.say("Analysis worksheet updated successfully.")?,
            Err(err) => {
                warn!(error = %err, "failed to update analysis worksheet");
                self.console.say(format!(
                    "An error occurred while processing survey analysis: {err}"
                ))?;
                return Ok(());
            }
        }

        loop {
            self.console.say(format!("\n{MENU}"))?;
            let answer = self.console.ask("Select a functionality (1-5): ")?;
            match parse_menu_choice(&answer) {
                Some(MenuChoice::PrintAverages) => self.print_averages().await?,
                Some(MenuChoice::ShowFeedback) => self.show_feedback().await?,
                Some(MenuChoice::ExportCsv) => self.export_csv().await?,
                Some(MenuChoice::ReadCsv) => self.read_csv()?,
                Some(MenuChoice::Exit) => {
                    self.console.say("Exiting functionality menu.")?;
                    return Ok(());
                }
                None => self
                    .console
                    .say("Invalid choice. Please select a number between 1 and 5.")?,
            }
        }
    }

    /// The last analysis row; absence and failures are reported on the console.
    async fn latest_snapshot(&mut self) -> SurveyResult<Option<AnalysisSnapshot>> {
        match SurveyAnalyzer::new(self.store).latest_snapshot().await {
            Ok(Some(snapshot)) => Ok(Some(snapshot)),
            Ok(None) => {
                self.console
                    .say("No data available in the analysis worksheet.")?;
                Ok(None)
            }
            Err(err) => {
                warn!(error = %err, "failed to read analysis worksheet");
                self.console.say(format!(
                    "An error occurred while reading the analysis worksheet: {err}"
                ))?;
                Ok(None)
            }
        }
    }

    async fn print_averages(&mut self) -> SurveyResult<()> {
        let Some(snapshot) = self.latest_snapshot().await? else {
            return Ok(());
        };

        self.console.say("\nSurvey Averages:")?;
        self.console.say(format!(
            "{TOTAL_RESPONSES_METRIC}: {}",
            snapshot.response_count
        ))?;
        for criterion in Criterion::ALL {
            self.console
                .say(format!("{criterion}: {}", snapshot.average(criterion)))?;
        }
        Ok(())
    }

    async fn show_feedback(&mut self) -> SurveyResult<()> {
        let Some(snapshot) = self.latest_snapshot().await? else {
            return Ok(());
        };

        self.console.say("\nFeedback Based on Averages:")?;
        for line in feedback_lines(&snapshot) {
            self.console.say(line)?;
        }
        Ok(())
    }

    async fn export_csv(&mut self) -> SurveyResult<()> {
        if !self
            .console
            .ask_yes_no("Do you want to export the analysis data to a CSV file? (yes/no): ")?
        {
            self.console.say("Skipping export to CSV.")?;
            return Ok(());
        }
        let include_feedback = self
            .console
            .ask_yes_no("Include feedback in the report? (yes/no): ")?;

        let Some(snapshot) = self.latest_snapshot().await? else {
            return Ok(());
        };

        match self.exporter.export(&snapshot, include_feedback) {
            Ok(()) => self.console.say(format!(
                "\nAnalysis data exported to {} successfully.",
                self.exporter.path().display()
            ))?,
            Err(err) => {
                warn!(error = %err, "export failed");
                self.console
                    .say(format!("\nAn error occurred while exporting to CSV: {err}"))?;
            }
        }
        Ok(())
    }

    fn read_csv(&mut self) -> SurveyResult<()> {
        match self.exporter.read_back() {
            Ok(lines) => {
                self.console
                    .say(format!("\nContents of {}:", self.exporter.path().display()))?;
                for line in lines {
                    self.console.say(line)?;
                }
            }
            Err(err) => self
                .console
                .say(format!("\nCould not read the report: {err}"))?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::Path;

    use super::*;
    use crate::error::SurveyError;
    use crate::models::Sheet;
    use crate::store::MemoryStore;

    async fn run_script(store: &MemoryStore, report: &Path, script: &str) -> (SurveyResult<()>, String) {
        let secret = OwnerSecret::new("owner");
        let console = Console::new(Cursor::new(script.to_string()), Vec::new());
        let mut session = Session::new(store, &secret, ReportExporter::new(report), console);
        let result = session.run().await;
        let output = String::from_utf8(session.into_console().into_output()).unwrap();
        (result, output)
    }

    #[test]
    fn roles_are_trimmed_and_case_insensitive() {
        assert_eq!(parse_role("  Customer \n"), Some(Role::Customer));
        assert_eq!(parse_role("OWNER"), Some(Role::Owner));
        assert_eq!(parse_role("admin"), None);
        assert_eq!(parse_menu_choice(" 3 "), Some(MenuChoice::ExportCsv));
        assert_eq!(parse_menu_choice("6"), None);
    }

    #[tokio::test]
    async fn customer_flow_reprompts_then_records() {
        let store = MemoryStore::new();
        let dir = tempfile::tempdir().unwrap();
        let script = "shopper\ncustomer\n9\nfive\n5\n4\n3\n2\nno\n";

        let (result, output) = run_script(&store, &dir.path().join("r.csv"), script).await;
        result.unwrap();

        assert!(output.contains("Invalid role. Please enter 'customer' or 'owner'."));
        assert!(output.contains("Number must be between 1 and 5."));
        assert!(output.contains("Invalid input. Please enter a number between 1 and 5."));
        assert!(output.contains("Survey worksheet updated successfully."));
        assert!(output.ends_with("Exiting the program.\n"));

        let rows = store.get_all_values(Sheet::Survey).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["2", "5", "4", "3", "2"]);
    }

    #[tokio::test]
    async fn wrong_password_aborts_owner_flow_without_lockout() {
        let store = MemoryStore::new();
        let dir = tempfile::tempdir().unwrap();
        let script = "owner\nguess\nyes\nowner\nOWNER\nyes\nowner\nowner \t\n5\nno\n";

        let (result, output) = run_script(&store, &dir.path().join("r.csv"), script).await;
        result.unwrap();

        assert_eq!(output.matches("Incorrect password.").count(), 2);
        assert_eq!(output.matches("Password correct.").count(), 1);
        let analysis = store.get_all_values(Sheet::Analysis).await.unwrap();
        assert_eq!(analysis.len(), 2);
    }

    #[tokio::test]
    async fn owner_session_appends_one_snapshot_and_exports() {
        let store = MemoryStore::new();
        store
            .append_numbered_row(Sheet::Survey, vec!["5".into(), "4".into(), "3".into(), "2".into()])
            .await
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("reports/analysis_report.csv");
        let script = "owner\nowner\n4\n1\n2\n7\n3\nmaybe\nyes\nno\n4\n5\nno\n";

        let (result, output) = run_script(&store, &report, script).await;
        result.unwrap();

        assert!(output.contains("Analysis worksheet updated successfully."));
        assert!(output.contains("Could not read the report"));
        assert!(output.contains("Total Responses: 1"));
        assert!(output.contains("Customer Support: 3"));
        assert!(output.contains("Product Quality (4): Good."));
        assert!(output.contains("Invalid choice. Please select a number between 1 and 5."));
        assert!(output.contains("Analysis data exported to"));
        assert!(output.contains("Average Overall Satisfaction,5"));
        assert!(output.contains("Exiting functionality menu."));

        let analysis = store.get_all_values(Sheet::Analysis).await.unwrap();
        assert_eq!(analysis.len(), 2);
        assert_eq!(analysis[1], vec!["1", "5", "4", "3", "2"]);
        assert_eq!(
            std::fs::read_to_string(&report).unwrap().lines().nth(1),
            Some("Total Responses,1")
        );
    }

    #[tokio::test]
    async fn failed_export_is_reported_and_menu_continues() {
        let store = MemoryStore::new();
        store
            .append_numbered_row(Sheet::Survey, vec!["5".into(), "4".into(), "3".into(), "2".into()])
            .await
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let script = "owner\nowner\n3\nyes\nyes\n1\n5\nno\n";

        let (result, output) = run_script(&store, &blocker.join("r.csv"), script).await;
        result.unwrap();

        assert!(output.contains("An error occurred while exporting to CSV"));
        assert!(!output.contains("Analysis data exported to"));
        let after_error = output
            .split("An error occurred while exporting to CSV")
            .nth(1)
            .unwrap();
        assert!(after_error.contains("Overall Satisfaction: 5"));
        assert!(after_error.contains("Exiting functionality menu."));
        assert!(output.ends_with("Exiting the program.\n"));
    }

    #[tokio::test]
    async fn unreadable_analysis_sheet_abandons_menu_actions() {
        let store = MemoryStore::new();
        store.fail_reads_of(Sheet::Analysis);
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("r.csv");
        let script = "owner\nowner\n1\n2\n3\nyes\nno\n5\nno\n";

        let (result, output) = run_script(&store, &report, script).await;
        result.unwrap();

        assert!(output.contains("Analysis worksheet updated successfully."));
        assert_eq!(
            output
                .matches("An error occurred while reading the analysis worksheet")
                .count(),
            3
        );
        assert!(!output.contains("Survey Averages:"));
        assert!(!output.contains("Feedback Based on Averages:"));
        assert!(!report.exists());
        assert!(output.contains("Exiting functionality menu."));
    }

    #[tokio::test]
    async fn store_failure_abandons_action_but_not_program() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let dir = tempfile::tempdir().unwrap();
        let script = "customer\n1\n2\n3\n4\nyes\nowner\nowner\nno\n";

        let (result, output) = run_script(&store, &dir.path().join("r.csv"), script).await;
        result.unwrap();

        assert!(output.contains("An error occurred while processing customer responses"));
        assert!(output.contains("An error occurred while processing survey analysis"));
        assert!(!output.contains("Available functionalities"));
    }

    #[tokio::test]
    async fn closed_input_ends_the_session() {
        let store = MemoryStore::new();
        let dir = tempfile::tempdir().unwrap();

        let (result, _) = run_script(&store, &dir.path().join("r.csv"), "customer\n3\n").await;
        assert!(matches!(result, Err(SurveyError::InputClosed)));
        assert_eq!(store.get_all_values(Sheet::Survey).await.unwrap().len(), 1);
    }
}
