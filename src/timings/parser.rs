//! Line-level parsing of per-rank timing logs.
//!
//! Two line shapes are accepted:
//!
//! - whitespace: `<rank> <operation> <seconds>`, where the rank token is
//!   free-form (`0`, `r0`, `rank_3`); the file name is what assigns ranks
//! - comma: `<timerId>,<level>,<start>,<end>,<seconds>,<name...>` where the
//!   name may itself contain commas
//!
//! Anything else, including comment and header lines, is skipped.

/// Which line shape a sample came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFormat {
    /// `<rank> <operation> <seconds>`
    Whitespace,
    /// Timer rows with id, level and start/end columns.
    Timer,
}

/// One parsed timing line.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingSample {
    pub format: LineFormat,
    pub operation: String,
    pub elapsed_seconds: f64,
}

/// Parse a single line in either format. Returns `None` for malformed lines.
pub fn parse_line(line: &str) -> Option<TimingSample> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with("TimerId") {
        return None;
    }

    if line.contains(',') {
        parse_comma_line(line)
    } else {
        parse_whitespace_line(line)
    }
}

fn parse_whitespace_line(line: &str) -> Option<TimingSample> {
    let mut fields = line.split_whitespace();
    fields.next()?;
    let operation = fields.next()?;
    let elapsed_seconds = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }

    Some(TimingSample {
        format: LineFormat::Whitespace,
        operation: operation.to_string(),
        elapsed_seconds,
    })
}

fn parse_comma_line(line: &str) -> Option<TimingSample> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 6 {
        return None;
    }
    let elapsed_seconds = parts[4].trim().parse().ok()?;
    let name = parts[5..].join(",").trim().to_string();
    if name.is_empty() {
        return None;
    }

    Some(TimingSample {
        format: LineFormat::Timer,
        operation: name,
        elapsed_seconds,
    })
}

/// Parse every valid line of a file's contents, in order.
pub fn parse_lines(content: &str) -> Vec<TimingSample> {
    content.lines().filter_map(parse_line).collect()
}
