//! Reports obfuscated `uses:` references (`.`/`..`/empty path
//! components) and rewrites them into their normalized form.

use yamlgraft::{Op, Patch};

use crate::{
    diagnostic::{DiagnosticKind, Severity},
    fix::Fix,
    models::Step,
    rules::{Rule, RuleState, rule_meta},
    state::AnalysisState,
};

pub(crate) struct Obfuscation {
    state: RuleState,
}

rule_meta!(
    Obfuscation,
    "obfuscation",
    "obfuscated action reference"
);

impl Obfuscation {
    pub(crate) fn new(_state: &AnalysisState<'_>) -> Result<Self, super::RuleLoadError> {
        Ok(Self {
            state: RuleState::new(Self::ident(), Self::url()),
        })
    }

    /// Splits `owner/repo/subpath@ref` into its parts. Returns `None`
    /// for references without a subpath (nothing to obfuscate).
    fn subpath_parts(uses: &str) -> Option<(String, Vec<String>, String)> {
        let (path, reference) = uses.rsplit_once('@')?;
        let mut segments = path.split('/');
        let owner = segments.next()?;
        let repo = segments.next()?;
        let subpath: Vec<String> = segments.map(str::to_string).collect();
        if subpath.is_empty() {
            return None;
        }
        Some((
            format!("{owner}/{repo}"),
            subpath,
            reference.to_string(),
        ))
    }

    /// Resolves `.`/`..`/empty components. Returns `None` when `..`
    /// escapes the repository root, in which case no sound rewrite
    /// exists.
    fn normalize(subpath: &[String]) -> Option<Vec<String>> {
        let mut out: Vec<&str> = vec![];
        for component in subpath {
            match component.as_str() {
                "" | "." => {}
                ".." => {
                    out.pop()?;
                }
                other => out.push(other),
            }
        }
        Some(out.into_iter().map(str::to_string).collect())
    }
}

impl Rule for Obfuscation {
    fn state(&self) -> &RuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RuleState {
        &mut self.state
    }

    fn visit_step(&mut self, step: &Step) -> anyhow::Result<()> {
        let Some(uses) = step.uses() else {
            return Ok(());
        };
        if uses.value.starts_with("./")
            || uses.value.starts_with("docker://")
            || uses.contains_expression()
        {
            return Ok(());
        }
        let Some((prefix, subpath, reference)) = Self::subpath_parts(&uses.value) else {
            return Ok(());
        };

        let mut suspicious: Vec<String> = vec![];
        for component in &subpath {
            match component.as_str() {
                "." | ".." => suspicious.push(format!("\"{component}\"")),
                "" => suspicious.push("\"\"".into()),
                _ => {}
            }
        }
        if suspicious.is_empty() {
            return Ok(());
        }

        self.state.error(
            uses.pos,
            DiagnosticKind::Style,
            Severity::Low,
            format!(
                "action reference \"{uses}\" contains obfuscating path components: {components}",
                uses = uses.value,
                components = suspicious.join(", ")
            ),
        );

        if let Some(normalized) = Self::normalize(&subpath) {
            let mut rewritten = prefix;
            for segment in &normalized {
                rewritten.push('/');
                rewritten.push_str(segment);
            }
            rewritten.push('@');
            rewritten.push_str(&reference);

            self.state.queue_fix(Fix {
                rule: Self::ident(),
                title: format!("normalize action reference to \"{rewritten}\""),
                pos: uses.pos,
                patches: vec![Patch {
                    route: uses.route.clone(),
                    op: Op::Replace(serde_yaml::Value::String(rewritten)),
                }],
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::testutil::analyze_rules;

    #[test]
    fn test_dot_components_reported() {
        let diags = analyze_rules(
            "on: push\njobs:\n  a:\n    runs-on: x\n    steps:\n      - uses: owner/repo/./sub/../sub@v1\n",
        );

        let findings: Vec<_> = diags.iter().filter(|d| d.rule == "obfuscation").collect();
        assert_eq!(findings.len(), 1, "{diags:?}");
        assert!(findings[0].message.contains("\".\""));
        assert!(findings[0].message.contains("\"..\""));
    }

    #[test]
    fn test_clean_subpath() {
        let diags = analyze_rules(
            "on: push\njobs:\n  a:\n    runs-on: x\n    steps:\n      - uses: owner/repo/sub@v1\n",
        );
        assert!(diags.iter().all(|d| d.rule != "obfuscation"), "{diags:?}");
    }

    #[test]
    fn test_normalize() {
        use super::Obfuscation;

        let subpath: Vec<String> = vec![".".into(), "sub".into(), "..".into(), "sub".into()];
        assert_eq!(
            Obfuscation::normalize(&subpath),
            Some(vec!["sub".to_string()])
        );

        // `..` escaping the repo root has no sound rewrite.
        let subpath: Vec<String> = vec!["..".into(), "x".into()];
        assert_eq!(Obfuscation::normalize(&subpath), None);
    }
}
