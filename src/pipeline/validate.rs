//! Structural and compile-time checks over a whole template.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::engine::{Engine, HelperRegistry};
use crate::template::{Condition, Section, SectionTemplate, Template};

/// One problem found by [`validate_with`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionIssue {
    /// Section the issue belongs to; `None` for template-level issues
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    /// Human-readable description
    pub message: String,
}

impl SectionIssue {
    fn template(message: impl Into<String>) -> Self {
        Self {
            section_id: None,
            message: message.into(),
        }
    }

    fn section(section_id: &str, message: impl Into<String>) -> Self {
        Self {
            section_id: Some(section_id.to_string()),
            message: message.into(),
        }
    }
}

impl fmt::Display for SectionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.section_id {
            Some(id) => write!(f, "section '{}': {}", id, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// All errors and warnings found in a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Problems that prevent rendering
    pub errors: Vec<SectionIssue>,
    /// Problems recovered at render time
    pub warnings: Vec<SectionIssue>,
}

impl ValidationReport {
    /// True when there are no errors. Warnings do not count.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// One-line description of the errors.
    pub fn summary(&self) -> String {
        match self.errors.len() {
            0 => "no errors".to_string(),
            1 => self.errors[0].to_string(),
            n => format!(
                "{} errors: {}",
                n,
                self.errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ")
            ),
        }
    }

    /// Errors for one section.
    pub fn errors_for<'a>(&'a self, section_id: &'a str) -> impl Iterator<Item = &'a SectionIssue> {
        self.errors
            .iter()
            .filter(move |issue| issue.section_id.as_deref() == Some(section_id))
    }
}

/// Structural checks only: section list, ids and content shapes.
pub(crate) fn check_structure(template: &Template, report: &mut ValidationReport) {
    if template.sections.is_empty() {
        report
            .errors
            .push(SectionIssue::template("template has no sections"));
    }

    let mut seen = HashSet::new();
    for (index, section) in template.sections.iter().enumerate() {
        if section.id.trim().is_empty() {
            report.errors.push(SectionIssue::template(format!(
                "section {} has no id",
                index + 1
            )));
        } else if !seen.insert(section.id.as_str()) {
            report.errors.push(SectionIssue::section(
                &section.id,
                "duplicate section id",
            ));
        }

        if !section.kind.accepts(&section.template) {
            report.errors.push(SectionIssue::section(
                &section.id,
                format!(
                    "{} section cannot hold {} content",
                    section.kind.as_str(),
                    section.template.shape()
                ),
            ));
        }

        let empty = match &section.template {
            SectionTemplate::Text(source) => source.trim().is_empty(),
            SectionTemplate::Table(table) => table.rows.trim().is_empty(),
            SectionTemplate::Conditional(blocks) => blocks.is_empty(),
        };
        if empty {
            report
                .errors
                .push(SectionIssue::section(&section.id, "empty template"));
        }
    }
}

/// Validate a template against a helper registry.
///
/// Every section is compiled, disabled ones included, and every problem is
/// collected instead of stopping at the first.
pub fn validate_with(template: &Template, helpers: &HelperRegistry) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_structure(template, &mut report);

    let mut engine = Engine::with_helpers(helpers.clone());
    for (name, source) in &template.partials {
        if let Err(e) = engine.register_partial(name.as_str(), source) {
            report
                .errors
                .push(SectionIssue::template(format!("partial '{}': {}", name, e)));
        }
    }

    for name in template.helpers.keys() {
        if !helpers.contains(name) {
            report.warnings.push(SectionIssue::template(format!(
                "custom helper '{}' is source text and will not run; register it natively",
                name
            )));
        }
    }

    for section in &template.sections {
        compile_section(&engine, section, &mut report);
    }

    report
}

fn compile_section(engine: &Engine, section: &Section, report: &mut ValidationReport) {
    match &section.template {
        SectionTemplate::Text(source) => {
            if let Err(e) = engine.compile(source) {
                report
                    .errors
                    .push(SectionIssue::section(&section.id, e.to_string()));
            }
        }
        SectionTemplate::Table(table) => {
            if let Err(e) = engine.compile(&table.rows) {
                report
                    .errors
                    .push(SectionIssue::section(&section.id, format!("rows: {}", e)));
            }
        }
        SectionTemplate::Conditional(blocks) => {
            for block in blocks {
                if block.variants.is_empty() {
                    report.warnings.push(SectionIssue::section(
                        &section.id,
                        format!("block '{}' has no variants", block.id),
                    ));
                }
                if let Some(show) = &block.show_condition {
                    warn_unknown_operators(section, &block.id, show, report);
                }
                for variant in &block.variants {
                    if let Some(condition) = &variant.condition {
                        warn_unknown_operators(section, &block.id, condition, report);
                    }
                    if let Err(e) = engine.compile(&variant.content) {
                        report.errors.push(SectionIssue::section(
                            &section.id,
                            format!("block '{}', variant '{}': {}", block.id, variant.id, e),
                        ));
                    }
                }
            }
        }
    }
}

fn warn_unknown_operators(
    section: &Section,
    block_id: &str,
    condition: &Condition,
    report: &mut ValidationReport,
) {
    for operator in condition.unknown_operators() {
        report.warnings.push(SectionIssue::section(
            &section.id,
            format!(
                "block '{}': unknown operator '{}' evaluates to false",
                block_id, operator
            ),
        ));
    }
}
