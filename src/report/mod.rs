mod terminal;
mod json;

pub use terminal::TerminalReporter;
pub use json::JsonReporter;

use crate::scan::ScanReport;
use miette::Result;
use std::path::PathBuf;

/// Output format for reports
#[derive(Debug, Clone, Default)]
pub enum ReportFormat {
    #[default]
    Terminal,
    Json,
}

/// Writes a scan report in the chosen format
pub struct Reporter {
    format: ReportFormat,
    output_path: Option<PathBuf>,
}

impl Reporter {
    pub fn new(format: ReportFormat, output_path: Option<PathBuf>) -> Self {
        Self { format, output_path }
    }

    pub fn report(&self, report: &ScanReport) -> Result<()> {
        match &self.format {
            ReportFormat::Terminal => {
                let reporter = TerminalReporter::new(self.output_path.clone());
                reporter.report(report)
            }
            ReportFormat::Json => {
                let reporter = JsonReporter::new(self.output_path.clone());
                reporter.report(report)
            }
        }
    }
}
