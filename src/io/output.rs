use crate::core::{
    CheckStatus, CodeAnalysis, ExecutionStatus, RefactoringPlan, RefactoringResult, RiskLevel,
    Severity, StepStatus, ValidationResult,
};
use colored::*;
use std::io::Write;

pub trait OutputWriter {
    fn write_analysis(&mut self, analysis: &CodeAnalysis) -> anyhow::Result<()>;
    fn write_plan(&mut self, plan: &RefactoringPlan) -> anyhow::Result<()>;
    fn write_result(&mut self, result: &RefactoringResult) -> anyhow::Result<()>;
    fn write_validation(&mut self, validation: &ValidationResult) -> anyhow::Result<()>;
}

pub struct JsonWriter<W: Write> {
    writer: W,
}

impl<W: Write> JsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    fn write_value<T: serde::Serialize>(&mut self, value: &T) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        self.writer.write_all(json.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> OutputWriter for JsonWriter<W> {
    fn write_analysis(&mut self, analysis: &CodeAnalysis) -> anyhow::Result<()> {
        self.write_value(analysis)
    }

    fn write_plan(&mut self, plan: &RefactoringPlan) -> anyhow::Result<()> {
        self.write_value(plan)
    }

    fn write_result(&mut self, result: &RefactoringResult) -> anyhow::Result<()> {
        self.write_value(result)
    }

    fn write_validation(&mut self, validation: &ValidationResult) -> anyhow::Result<()> {
        self.write_value(validation)
    }
}

pub struct MarkdownWriter<W: Write> {
    writer: W,
}

impl<W: Write> MarkdownWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> OutputWriter for MarkdownWriter<W> {
    fn write_analysis(&mut self, analysis: &CodeAnalysis) -> anyhow::Result<()> {
        writeln!(self.writer, "# Reforge Analysis Report")?;
        writeln!(self.writer)?;
        writeln!(
            self.writer,
            "Generated: {}",
            analysis.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(self.writer)?;

        let m = &analysis.metrics;
        writeln!(self.writer, "## Summary")?;
        writeln!(self.writer)?;
        writeln!(self.writer, "| Metric | Value |")?;
        writeln!(self.writer, "|--------|-------|")?;
        writeln!(self.writer, "| Files analyzed | {} |", m.files.len())?;
        writeln!(self.writer, "| Total lines | {} |", m.total_loc)?;
        writeln!(self.writer, "| Functions | {} |", m.total_functions)?;
        writeln!(
            self.writer,
            "| Average complexity | {:.1} |",
            m.average_complexity
        )?;
        writeln!(self.writer, "| Max complexity | {} |", m.max_complexity)?;
        writeln!(
            self.writer,
            "| Maintainability | {:.1} |",
            m.maintainability
        )?;
        writeln!(
            self.writer,
            "| Estimated debt | {:.1} hours |",
            m.debt_hours
        )?;
        writeln!(self.writer)?;

        if !analysis.findings.is_empty() {
            writeln!(self.writer, "## Findings ({})", analysis.findings.len())?;
            writeln!(self.writer)?;
            writeln!(self.writer, "| Location | Kind | Severity | Message |")?;
            writeln!(self.writer, "|----------|------|----------|---------|")?;
            for finding in &analysis.findings {
                writeln!(
                    self.writer,
                    "| {}:{} | {} | {} | {} |",
                    finding.location.file.display(),
                    finding.location.line,
                    finding.kind,
                    finding.severity,
                    finding.message
                )?;
            }
            writeln!(self.writer)?;
        }

        if !analysis.graph.cycles.is_empty() {
            writeln!(self.writer, "## Dependency Cycles")?;
            writeln!(self.writer)?;
            for cycle in &analysis.graph.cycles {
                writeln!(self.writer, "- {}", cycle.nodes.join(" -> "))?;
            }
            writeln!(self.writer)?;
        }

        Ok(())
    }

    fn write_plan(&mut self, plan: &RefactoringPlan) -> anyhow::Result<()> {
        writeln!(self.writer, "# Refactoring Plan `{}`", plan.id)?;
        writeln!(self.writer)?;
        writeln!(
            self.writer,
            "Overall risk: **{}** — estimated {} minutes",
            plan.risk.level, plan.estimated_minutes
        )?;
        writeln!(self.writer)?;
        for step in &plan.steps {
            writeln!(
                self.writer,
                "1. `{}` ({}, risk {}): {}",
                step.id, step.refactoring, step.risk, step.description
            )?;
        }
        writeln!(self.writer)?;
        Ok(())
    }

    fn write_result(&mut self, result: &RefactoringResult) -> anyhow::Result<()> {
        writeln!(self.writer, "# Execution Result `{}`", result.id)?;
        writeln!(self.writer)?;
        writeln!(self.writer, "Status: **{}**", status_name(result.status))?;
        writeln!(self.writer)?;
        for outcome in &result.executed_steps {
            writeln!(
                self.writer,
                "- `{}`: {} ({} ms)",
                outcome.step_id,
                step_status_name(outcome.status),
                outcome.duration_ms
            )?;
        }
        writeln!(self.writer)?;
        Ok(())
    }

    fn write_validation(&mut self, validation: &ValidationResult) -> anyhow::Result<()> {
        writeln!(self.writer, "# Validation")?;
        writeln!(self.writer)?;
        writeln!(
            self.writer,
            "Valid: **{}** — behavior preserved: **{}**",
            validation.is_valid, validation.behavior.behavior_preserved
        )?;
        writeln!(self.writer)?;
        for check in &validation.checks {
            writeln!(
                self.writer,
                "- {:?}: {} — {}",
                check.kind,
                check_status_name(check.status),
                check.message
            )?;
        }
        writeln!(self.writer)?;
        Ok(())
    }
}

pub struct TerminalWriter;

impl Default for TerminalWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalWriter {
    pub fn new() -> Self {
        Self
    }
}

impl OutputWriter for TerminalWriter {
    fn write_analysis(&mut self, analysis: &CodeAnalysis) -> anyhow::Result<()> {
        println!("{}", "Reforge Analysis".bold().blue());
        println!("{}", "================".blue());
        println!();

        let m = &analysis.metrics;
        println!("Files analyzed: {}", m.files.len());
        println!("Total lines: {}", m.total_loc);
        println!("Functions: {}", m.total_functions);
        println!("Average complexity: {:.1}", m.average_complexity);
        println!("Maintainability: {:.1}", m.maintainability);
        println!("Estimated debt: {:.1} hours", m.debt_hours);
        println!();

        if !analysis.findings.is_empty() {
            println!("{} findings:", analysis.findings.len());
            for finding in &analysis.findings {
                println!(
                    "  {} {}:{} {}",
                    severity_label(finding.severity),
                    finding.location.file.display(),
                    finding.location.line,
                    finding.message
                );
            }
            println!();
        }

        if !analysis.duplications.is_empty() {
            println!("{} duplicate blocks detected", analysis.duplications.len());
            println!();
        }
        Ok(())
    }

    fn write_plan(&mut self, plan: &RefactoringPlan) -> anyhow::Result<()> {
        println!("{} {}", "Plan".bold().blue(), plan.id);
        println!(
            "Risk: {} — estimated {} minutes",
            risk_label(plan.risk.level),
            plan.estimated_minutes
        );
        println!();
        for (idx, step) in plan.steps.iter().enumerate() {
            println!(
                "  {}. [{}] {} ({})",
                idx + 1,
                risk_label(step.risk),
                step.description,
                step.refactoring
            );
            if !step.depends_on.is_empty() {
                println!("     after: {}", step.depends_on.join(", "));
            }
        }
        println!();
        Ok(())
    }

    fn write_result(&mut self, result: &RefactoringResult) -> anyhow::Result<()> {
        let status = match result.status {
            ExecutionStatus::Success => "SUCCESS".green().bold(),
            ExecutionStatus::Partial => "PARTIAL".yellow().bold(),
            ExecutionStatus::Failed => "FAILED".red().bold(),
        };
        println!("{} {} ({})", "Run".bold().blue(), result.id, status);
        for outcome in &result.executed_steps {
            let mark = match outcome.status {
                StepStatus::Success => "✓".green(),
                StepStatus::Failed => "✗".red(),
                StepStatus::Skipped => "-".yellow(),
            };
            println!("  {mark} {} ({} ms)", outcome.step_id, outcome.duration_ms);
            for issue in &outcome.issues {
                println!("      {issue}");
            }
        }
        println!(
            "Complexity delta: {}, lines delta: {}",
            result.delta.complexity, result.delta.loc
        );
        println!();
        Ok(())
    }

    fn write_validation(&mut self, validation: &ValidationResult) -> anyhow::Result<()> {
        let verdict = if validation.is_valid {
            "VALID".green().bold()
        } else {
            "INVALID".red().bold()
        };
        println!("{} {}", "Validation".bold().blue(), verdict);
        for check in &validation.checks {
            let mark = match check.status {
                CheckStatus::Passed => "✓".green(),
                CheckStatus::Failed => "✗".red(),
                CheckStatus::Warning => "!".yellow(),
            };
            println!("  {mark} {:?}: {}", check.kind, check.message);
        }
        println!(
            "Behavior preserved: {}",
            if validation.behavior.behavior_preserved {
                "yes".green()
            } else {
                "not demonstrated".yellow()
            }
        );
        println!();
        Ok(())
    }
}

fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::Critical | Severity::Error => severity.to_string().red(),
        Severity::Major => severity.to_string().yellow(),
        _ => severity.to_string().normal(),
    }
}

fn risk_label(risk: RiskLevel) -> ColoredString {
    match risk {
        RiskLevel::High => "high".red(),
        RiskLevel::Medium => "medium".yellow(),
        RiskLevel::Low => "low".green(),
    }
}

fn status_name(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Success => "success",
        ExecutionStatus::Partial => "partial",
        ExecutionStatus::Failed => "failed",
    }
}

fn step_status_name(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Success => "success",
        StepStatus::Failed => "failed",
        StepStatus::Skipped => "skipped",
    }
}

fn check_status_name(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Passed => "passed",
        CheckStatus::Failed => "failed",
        CheckStatus::Warning => "warning",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Markdown,
    Terminal,
}

pub fn create_writer(
    format: OutputFormat,
    output: Option<std::path::PathBuf>,
) -> anyhow::Result<Box<dyn OutputWriter>> {
    match (format, output) {
        (OutputFormat::Json, Some(path)) => {
            Ok(Box::new(JsonWriter::new(std::fs::File::create(path)?)))
        }
        (OutputFormat::Json, None) => Ok(Box::new(JsonWriter::new(std::io::stdout()))),
        (OutputFormat::Markdown, Some(path)) => {
            Ok(Box::new(MarkdownWriter::new(std::fs::File::create(path)?)))
        }
        (OutputFormat::Markdown, None) => Ok(Box::new(MarkdownWriter::new(std::io::stdout()))),
        (OutputFormat::Terminal, _) => Ok(Box::new(TerminalWriter::new())),
    }
}
