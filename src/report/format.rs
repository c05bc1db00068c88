//! Formatted terminal output.
//!
//! Kept apart from the pipeline so the numbers stay testable and output
//! changes are localized.

use crate::domain::{FitResult, Measured, SkipRecord};
use crate::fit::DrudeFit;
use crate::report::RunSummary;

/// Processed/existing/skipped counts followed by one line per skip.
pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    out.push_str("=== drude - run summary ===\n");
    out.push_str(&format!(
        "processed: {} | existing: {} | skipped: {}\n",
        summary.processed.len(),
        summary.existing.len(),
        summary.skipped.len()
    ));
    if !summary.skipped.is_empty() {
        out.push('\n');
        out.push_str(&format_skips(&summary.skipped));
    }
    out
}

pub fn format_skips(skips: &[SkipRecord]) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<16} {:<26} {}", "sample", "kind", "reason").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<16} {:-<26} {:-<6}", "", "", "").trim_end());
    out.push('\n');
    for s in skips {
        out.push_str(format!("{:<16} {:<26} {}", truncate(&s.sample, 16), s.kind, s.reason).trim_end());
        out.push('\n');
    }
    out
}

/// Both fits of one batch as `name  value ± error` tables.
pub fn format_drude_fit(name: &str, fit: &DrudeFit) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {name} ===\n"));
    out.push_str(&format_fit_table(&fit.real));
    out.push('\n');
    out.push_str(&format_fit_table(&fit.imaginary));
    out
}

pub fn format_fit_table(fit: &FitResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} fit: chi2={:.4} chi2/dof={:.4} iterations={}\n",
        fit.component.label(),
        fit.chi_square,
        fit.reduced_chi_square,
        fit.iterations
    ));
    for (i, name) in fit.names.iter().enumerate() {
        out.push_str(&format!(
            "  {:<18} {}\n",
            name,
            fmt_measured(Measured::new(fit.values[i], fit.errors[i]))
        ));
    }
    out
}

/// `value ± error` in scientific notation.
pub fn fmt_measured(m: Measured) -> String {
    format!("{:>12.4e} ± {:.2e}", m.value, m.error)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DrudeComponent;

    #[test]
    fn summary_lists_skips() {
        let summary = RunSummary {
            generated_at: "now".into(),
            processed: vec!["B1".into()],
            existing: vec![],
            skipped: vec![SkipRecord::new("B2", "missing_measurement", "no S4 file")],
        };
        let text = format_run_summary(&summary);
        assert!(text.contains("processed: 1 | existing: 0 | skipped: 1"));
        assert!(text.contains("B2"));
        assert!(text.contains("no S4 file"));
        assert!(text.lines().all(|l| l == l.trim_end()));
    }

    #[test]
    fn fit_table_has_one_row_per_parameter() {
        let fit = FitResult {
            component: DrudeComponent::Real,
            names: vec!["Carrier Density".into(), "Effective Mass".into()],
            values: vec![1e26, 0.35],
            errors: vec![1e24, 0.01],
            chi_square: 1.0,
            reduced_chi_square: 0.5,
            iterations: 4,
        };
        let text = format_fit_table(&fit);
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("Carrier Density"));
        assert!(text.contains("±"));
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
