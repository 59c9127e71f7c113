//! Markdown issue section for the health report.

use dbpulse_rules::{Classification, Issue};

/// Renders the "Critical/High/Medium Issues" section.
pub struct MarkdownIssueFormatter {
    heading_level: usize,
}

impl MarkdownIssueFormatter {
    pub fn new() -> Self {
        Self { heading_level: 2 }
    }

    /// Use `level` `#` characters for the section heading; subsections
    /// get one more.
    pub fn with_heading_level(level: usize) -> Self {
        Self {
            heading_level: level.clamp(1, 5),
        }
    }

    pub fn format(&self, classification: &Classification) -> String {
        let mut md = String::new();
        md.push_str(&format!("{} Detected Issues\n\n", "#".repeat(self.heading_level)));

        if classification.issue_count() == 0 {
            md.push_str("No critical, high or medium issues were detected.\n");
            return md;
        }

        let sub = "#".repeat(self.heading_level + 1);
        for (title, issues) in [
            ("Critical Issues", &classification.critical_issues),
            ("High Issues", &classification.high_issues),
            ("Medium Issues", &classification.medium_issues),
        ] {
            md.push_str(&format!("{sub} {title} ({})\n\n", issues.len()));
            if issues.is_empty() {
                md.push_str("None.\n\n");
                continue;
            }
            for issue in issues {
                format_issue(&mut md, issue);
            }
            md.push('\n');
        }

        md
    }
}

impl Default for MarkdownIssueFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn format_issue(md: &mut String, issue: &Issue) {
    md.push_str(&format!(
        "- **{}** (score {}): {}\n",
        escape_inline(&issue.metric),
        issue.analysis.score,
        escape_inline(&issue.analysis.reasoning)
    ));
    for recommendation in &issue.analysis.recommendations {
        md.push_str(&format!("  - {}\n", escape_inline(recommendation)));
    }
}

/// Keep rule text on one line and out of markdown emphasis.
fn escape_inline(s: &str) -> String {
    s.replace('\r', "")
        .replace('\n', " ")
        .replace('*', "\\*")
        .replace('#', "\\#")
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbpulse_rules::{Level, SeverityAnalysis};
    use serde_json::json;

    fn issue(metric: &str, level: Level, reasoning: &str) -> Issue {
        Issue {
            metric: metric.to_string(),
            analysis: SeverityAnalysis {
                level,
                score: level.default_score().into(),
                reasoning: reasoning.to_string(),
                recommendations: vec!["scale up".to_string(), "add pooling".to_string()],
            },
            data: json!({}),
        }
    }

    #[test]
    fn test_empty_classification() {
        let md = MarkdownIssueFormatter::new().format(&Classification::default());
        assert_eq!(
            md,
            "## Detected Issues\n\nNo critical, high or medium issues were detected.\n"
        );
    }

    #[test]
    fn test_sections_and_bullets() {
        let classification = Classification {
            critical_issues: vec![issue("pg_connections", Level::Critical, "95 connections")],
            medium_issues: vec![issue("pg_bloat", Level::Medium, "table bloat")],
            ..Classification::default()
        };
        let md = MarkdownIssueFormatter::new().format(&classification);
        assert!(md.contains("### Critical Issues (1)\n\n- **pg_connections** (score 5): 95 connections\n  - scale up\n  - add pooling\n"));
        assert!(md.contains("### High Issues (0)\n\nNone.\n"));
        assert!(md.contains("### Medium Issues (1)"));
    }

    #[test]
    fn test_injection_escaped() {
        let classification = Classification {
            high_issues: vec![issue("m", Level::High, "line\n## Injected *bold*")],
            ..Classification::default()
        };
        let md = MarkdownIssueFormatter::with_heading_level(1).format(&classification);
        assert!(md.starts_with("# Detected Issues"));
        assert!(md.contains("line \\#\\# Injected \\*bold\\*"));
    }
}
