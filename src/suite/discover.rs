use super::TestCase;
use crate::config::ToolKind;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::runner::find_test_script;
use std::cmp::Ordering;
use std::path::Path;

/// Number in a test directory name matching `^ex(\d+)`.
pub fn example_number(name: &str) -> Option<u32> {
    let digits: &str = name.strip_prefix("ex")?;
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse().ok()
}

/// Order by example number; names without one sort last, ties by name.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    match (example_number(a), example_number(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Find the `ex*` test directories of the context's test tree.
///
/// Each case gets its driver script (when one exists) and the tool that
/// runs it, resolved once here.
pub fn discover(ctx: &Context) -> Result<Vec<TestCase>> {
    let mut names: Vec<String> = std::fs::read_dir(&ctx.tests_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with("ex"))
        .collect();
    names.sort_by(|a, b| compare_names(a, b));

    let default_tool = ctx.default_tool();
    let cases = names
        .into_iter()
        .map(|name| {
            let dir = ctx.tests_dir.join(&name);
            let script = find_test_script(&dir).ok();
            let tool = default_tool.or_else(|| tool_hint(script.as_deref()));
            TestCase {
                number: example_number(&name),
                name,
                dir,
                script,
                tool,
            }
        })
        .collect::<Vec<_>>();

    tracing::debug!(count = cases.len(), dir = %ctx.tests_dir.display(), "discovered tests");
    Ok(cases)
}

fn tool_hint(script: Option<&Path>) -> Option<ToolKind> {
    script
        .and_then(|p| p.to_str())
        .and_then(ToolKind::from_path_hint)
}
