use crate::probe::Verdict;
use crate::scan::{ScanReport, SecretFinding, Section};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;

/// JSON reporter for programmatic output
pub struct JsonReporter {
    output_path: Option<PathBuf>,
}

impl JsonReporter {
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self { output_path }
    }

    pub fn report(&self, report: &ScanReport) -> Result<()> {
        let json = self.render(report)?;

        if let Some(path) = &self.output_path {
            std::fs::write(path, &json).into_diagnostic()?;
            println!("Report written to: {}", path.display());
        } else {
            println!("{}", json);
        }

        Ok(())
    }

    pub fn render(&self, report: &ScanReport) -> Result<String> {
        serde_json::to_string_pretty(&JsonReport::from_scan(report)).into_diagnostic()
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    version: &'static str,
    tool: &'static str,
    summary: JsonSummary,
    #[serde(flatten)]
    report: &'a ScanReport,
}

#[derive(Serialize)]
struct JsonSummary {
    exposed_components: usize,
    exposed_secrets: usize,
    unverified_secrets: usize,
    unreachable_probes: usize,
}

impl<'a> JsonReport<'a> {
    fn from_scan(report: &'a ScanReport) -> Self {
        let mut summary = JsonSummary {
            exposed_components: 0,
            exposed_secrets: 0,
            unverified_secrets: 0,
            unreachable_probes: 0,
        };

        for section in &report.sections {
            match section {
                Section::Manifest { manifest, .. } => {
                    summary.exposed_components +=
                        manifest.surface.iter().map(|g| g.components.len()).sum::<usize>();
                }
                Section::Strings { strings, .. } => {
                    for finding in &strings.findings {
                        match finding {
                            SecretFinding::Probe(r) if r.verdict == Verdict::Exposed => {
                                summary.exposed_secrets += 1
                            }
                            SecretFinding::Probe(r) if r.verdict == Verdict::Unreachable => {
                                summary.unreachable_probes += 1
                            }
                            SecretFinding::Unverified(_) => summary.unverified_secrets += 1,
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        Self {
            version: "1.0",
            tool: concat!("slicer ", env!("CARGO_PKG_VERSION")),
            summary,
            report,
        }
    }
}
