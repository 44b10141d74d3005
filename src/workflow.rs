//! Extraction of pinned action references from workflow documents.

use std::collections::{HashMap, VecDeque};
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;

use crate::reference::ACTIONS_SCHEME;

/// `uses:` keys, optionally as a list item and with a quoted value.
static USES_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:-\s+)?["']?uses["']?\s*:\s*["']?([^"'\s#]+)"#)
        .expect("uses pattern is valid")
});

/// Keys whose indented body is data rather than workflow structure: block
/// scalars (`run: |`) and `with:`/`env:` maps. Group 1 is the key's column.
static OPAQUE_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"^(\s*(?:-\s+)?)"#,
        r#"(?:["']?[\w.-]+["']?\s*:\s+[|>][-+0-9]*|["']?(?:with|env)["']?\s*:)"#,
        r#"\s*(?:#.*)?$"#,
    ))
    .expect("body pattern is valid")
});

/// One distinct reference found in a workflow, with every line it occurs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRef {
    /// Normalized `actions://owner/repo[/path]@rev` string.
    pub reference: String,
    /// 1-based line numbers, in document order.
    pub lines: Vec<usize>,
}

/// Extracts action references from a workflow or composite action document.
///
/// Looks at `jobs.<id>.uses`, `jobs.<id>.steps[*].uses`, and
/// `runs.steps[*].uses`. Local (`./`) and container (`docker://`) uses are
/// skipped. References are returned in order of first appearance.
///
/// # Errors
///
/// Returns an error if the document is not valid YAML.
pub fn parse_workflow(source: &str) -> Result<Vec<WorkflowRef>, serde_yaml::Error> {
    let document: Value = serde_yaml::from_str(source)?;

    let mut scanned = scan_lines(source);
    let mut refs: Vec<WorkflowRef> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for uses in collect_uses(&document) {
        let line = scanned
            .get_mut(uses)
            .and_then(VecDeque::pop_front)
            .or_else(|| first_line_containing(source, uses))
            .unwrap_or(1);
        if !is_remote_action(uses) {
            continue;
        }
        let reference = format!("{ACTIONS_SCHEME}{uses}");
        match index.get(&reference) {
            Some(&i) => refs[i].lines.push(line),
            None => {
                index.insert(reference.clone(), refs.len());
                refs.push(WorkflowRef { reference, lines: vec![line] });
            }
        }
    }

    for r in &mut refs {
        r.lines.sort_unstable();
        r.lines.dedup();
    }
    Ok(refs)
}

fn is_remote_action(uses: &str) -> bool {
    !uses.starts_with("./") && !uses.starts_with("docker://")
}

/// `uses` values in document order.
fn collect_uses(document: &Value) -> Vec<&str> {
    let mut found = Vec::new();
    if let Some(jobs) = document.get("jobs").and_then(Value::as_mapping) {
        for job in jobs.values() {
            if let Some(uses) = job.get("uses").and_then(Value::as_str) {
                found.push(uses);
            }
            found.extend(step_uses(job));
        }
    }
    if let Some(runs) = document.get("runs") {
        found.extend(step_uses(runs));
    }
    found
}

fn step_uses(holder: &Value) -> impl Iterator<Item = &str> {
    holder
        .get("steps")
        .and_then(Value::as_sequence)
        .into_iter()
        .flatten()
        .filter_map(|step| step.get("uses")?.as_str())
}

/// Line numbers of every `uses:` key, queued per value.
///
/// Lines inside a script or an input map are skipped, so text such as
/// `uses: x@y` in a `run: |` body is not mistaken for a step.
fn scan_lines(source: &str) -> HashMap<&str, VecDeque<usize>> {
    let mut lines: HashMap<&str, VecDeque<usize>> = HashMap::new();
    let mut body_above: Option<usize> = None;
    for (i, text) in source.lines().enumerate() {
        if let Some(column) = body_above {
            let indent = text.len() - text.trim_start().len();
            if text.trim().is_empty() || indent > column {
                continue;
            }
            body_above = None;
        }
        if let Some(value) = USES_LINE.captures(text).and_then(|c| c.get(1)) {
            lines.entry(value.as_str()).or_default().push_back(i + 1);
        } else if let Some(key) = OPAQUE_BODY.captures(text).and_then(|c| c.get(1)) {
            body_above = Some(key.as_str().chars().count());
        }
    }
    lines
}

fn first_line_containing(source: &str, needle: &str) -> Option<usize> {
    source.lines().position(|line| line.contains(needle)).map(|i| i + 1)
}
