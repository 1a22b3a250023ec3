use crate::config::PathKind;
use crate::discovery::ExtractedUrl;
use crate::probe::{ProbeResult, Verdict};
use crate::scan::{ManifestSection, ScanReport, SecretFinding, Section, StringsSection};
use crate::secrets::SecretCategory;
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use std::fmt::Write;
use std::path::PathBuf;

/// Human-readable report, one section per configured path
pub struct TerminalReporter {
    output_path: Option<PathBuf>,
}

impl TerminalReporter {
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self { output_path }
    }

    pub fn report(&self, report: &ScanReport) -> Result<()> {
        if let Some(path) = &self.output_path {
            colored::control::set_override(false);
            std::fs::write(path, self.render(report)).into_diagnostic()?;
            println!("Report written to: {}", path.display());
        } else {
            print!("{}", self.render(report));
        }
        Ok(())
    }

    pub fn render(&self, report: &ScanReport) -> String {
        let mut out = String::new();

        for section in &report.sections {
            // Writing into a String cannot fail
            let _ = self.write_section(&mut out, section);
            out.push('\n');
        }

        if let Some(urls) = &report.urls {
            let _ = self.write_urls(&mut out, urls);
        }

        if report.cancelled {
            let _ = writeln!(
                out,
                "{}",
                "Scan interrupted, the report above is incomplete".red().bold()
            );
        }

        out
    }

    fn write_section(&self, out: &mut String, section: &Section) -> std::fmt::Result {
        match section {
            Section::Manifest { path, manifest } => {
                writeln!(out, "{}", path.display().to_string().cyan().bold())?;
                self.write_manifest(out, manifest)
            }
            Section::Strings { path, strings } => {
                writeln!(out, "{}", path.display().to_string().cyan().bold())?;
                self.write_strings(out, strings)
            }
            Section::Listing { path, kind, files } => {
                writeln!(out, "{}", path.display().to_string().cyan().bold())?;
                let label = match kind {
                    PathKind::XmlFiles => "XML-files",
                    _ => "raw-files",
                };
                writeln!(out, "{}:", label.bold())?;
                for file in files {
                    writeln!(out, "\t- {}", file)?;
                }
                Ok(())
            }
            Section::Skipped { path } => writeln!(
                out,
                "{}",
                format!("{}: not found, skipped", path.display()).dimmed()
            ),
        }
    }

    fn write_manifest(&self, out: &mut String, manifest: &ManifestSection) -> std::fmt::Result {
        if let Some(package) = &manifest.package {
            writeln!(out, "Package: {}", package)?;
        }
        writeln!(out, "Backup allowed: {}", flag(&manifest.allow_backup, "true"))?;
        writeln!(out, "Debuggable: {}", flag(&manifest.debuggable, "true"))?;

        for group in &manifest.surface {
            writeln!(out)?;
            writeln!(out, "{}:", group.kind.tag().bold())?;
            for component in &group.components {
                writeln!(out, "\t{}:", component.name)?;
                writeln!(out, "\tPermission: {}", component.permission_display())?;
                for filter in &component.intent_filters {
                    writeln!(out, "\tIntent-filters:")?;
                    for rule in filter {
                        writeln!(out, "\t\t- {}", rule)?;
                    }
                }
            }
        }

        writeln!(out)?;
        writeln!(out, "{}:", "Apikeys-in-manifest".bold())?;
        for meta in &manifest.api_keys {
            writeln!(
                out,
                "\t- {}: {}",
                meta.name,
                meta.value.as_deref().unwrap_or("none")
            )?;
        }
        Ok(())
    }

    fn write_strings(&self, out: &mut String, strings: &StringsSection) -> std::fmt::Result {
        writeln!(out, "{}:", "Strings".bold())?;

        let mut last_skipped = None;
        for finding in &strings.findings {
            match finding {
                SecretFinding::Unverified(candidate) => {
                    writeln!(out, "\t- {}: {}", candidate.resource_name, candidate.raw_value)?;
                }
                SecretFinding::Probe(result) if result.verdict == Verdict::Skipped => {
                    // One line per key, not one per endpoint
                    if last_skipped != Some(result.candidate_index) {
                        writeln!(
                            out,
                            "\t- {}: {} {}",
                            result.candidate.resource_name,
                            result.candidate.raw_value,
                            "(not probed)".dimmed()
                        )?;
                    }
                    last_skipped = Some(result.candidate_index);
                }
                SecretFinding::Probe(result) => self.write_probe(out, result)?,
            }
        }
        Ok(())
    }

    fn write_probe(&self, out: &mut String, result: &ProbeResult) -> std::fmt::Result {
        let status = result.evidence.status.unwrap_or_default();

        match (result.candidate.category, result.verdict) {
            (SecretCategory::FirebaseDbUrl, Verdict::Exposed) => {
                writeln!(out, "\t- {}: {}", result.url, "Is open to public".red().bold())
            }
            (SecretCategory::FirebaseDbUrl, Verdict::Protected) => {
                writeln!(out, "\t- {}: {}", result.url, "Permission Denied".green())
            }
            (_, Verdict::Exposed) => {
                writeln!(out, "\t- {}: {}", result.url, status.to_string().red().bold())
            }
            (category, Verdict::Unreachable) => {
                let target = match category {
                    SecretCategory::FirebaseDbUrl => "Couldn't connect to Firebase",
                    _ => "Unable to connect to the Google API",
                };
                writeln!(
                    out,
                    "\t{} {}: {} ({})",
                    "!".yellow(),
                    result.url,
                    target.yellow(),
                    result.evidence.error.as_deref().unwrap_or("unknown error")
                )
            }
            // Restricted Google keys are not worth a line
            _ => Ok(()),
        }
    }

    fn write_urls(&self, out: &mut String, urls: &[ExtractedUrl]) -> std::fmt::Result {
        writeln!(out, "{}:", "URLs".bold())?;
        for url in urls {
            writeln!(
                out,
                "\t- {} {}",
                url.url,
                format!("({})", url.file.display()).dimmed()
            )?;
        }
        Ok(())
    }
}

/// Highlight a flag that weakens the application when set to `risky`
fn flag(value: &str, risky: &str) -> colored::ColoredString {
    if value == risky {
        value.yellow().bold()
    } else {
        value.normal()
    }
}
