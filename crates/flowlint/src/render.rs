//! Plain diagnostic rendering for the CLI.

use std::io::Write;

use owo_colors::OwoColorize as _;

use crate::diagnostic::{Diagnostic, Severity};

/// Renders the diagnostic's `kind[rule]` tag, colored by its severity.
fn kind_tag(diagnostic: &Diagnostic) -> String {
    let tag = format!(
        "{kind}[{rule}]",
        kind = diagnostic.kind,
        rule = diagnostic.rule
    );

    match diagnostic.severity {
        Severity::Info => tag.purple().to_string(),
        Severity::Low => tag.cyan().to_string(),
        Severity::Medium => tag.yellow().to_string(),
        Severity::High => tag.red().to_string(),
    }
}

/// Writes diagnostics as `path:line:col: kind[rule]: message` lines,
/// sorted by position.
pub fn render_plain(
    out: &mut impl Write,
    path: &str,
    diagnostics: &[Diagnostic],
) -> std::io::Result<()> {
    let mut sorted: Vec<&Diagnostic> = diagnostics.iter().collect();
    sorted.sort_by_key(|d| (d.pos.line, d.pos.col, d.rule));

    for diagnostic in sorted {
        writeln!(
            out,
            "{path}:{pos}: {tag}: {message}",
            pos = diagnostic.pos,
            tag = kind_tag(diagnostic),
            message = diagnostic.message
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use yamlgraft::Position;

    use super::*;
    use crate::diagnostic::DiagnosticKind;

    #[test]
    fn test_render_sorts_by_position_and_shows_kind() {
        let diagnostics = vec![
            Diagnostic {
                rule: "b-rule",
                message: "second".into(),
                pos: Position::new(5, 1),
                kind: DiagnosticKind::Style,
                severity: Severity::Low,
            },
            Diagnostic {
                rule: "a-rule",
                message: "first".into(),
                pos: Position::new(2, 3),
                kind: DiagnosticKind::Security,
                severity: Severity::High,
            },
        ];

        let mut out = vec![];
        render_plain(&mut out, "wf.yml", &diagnostics).unwrap();
        let rendered = String::from_utf8(out).unwrap();

        let first = rendered.lines().next().unwrap();
        assert!(first.starts_with("wf.yml:2:3:"));
        assert!(first.contains("security[a-rule]"));
        assert!(first.contains("first"));

        let second = rendered.lines().nth(1).unwrap();
        assert!(second.contains("style[b-rule]"));
    }
}
