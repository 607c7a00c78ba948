//! Output formatter trait

use cohort_application::RunReport;

/// Trait for formatting run reports
pub trait OutputFormatter {
    /// Format the complete report for humans
    fn format(&self, report: &RunReport) -> String;

    /// Format as JSON
    fn format_json(&self, report: &RunReport) -> String;
}
