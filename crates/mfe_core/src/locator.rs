use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::codec::{self, NAME_PREFIX};

/// Half-open range of line indices `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

impl LineSpan {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("monster {name:?} not found")]
pub struct NotFound {
    pub name: String,
}

/// Returns the record name if `line` is a `name:` line.
pub fn name_of(line: &str) -> Option<&str> {
    line.trim().strip_prefix(NAME_PREFIX).map(str::trim)
}

/// Finds the span occupied by the record called `name`.
///
/// The span starts at the first matching `name:` line and runs up to the
/// next `name:` line, or to the end of `lines` when the record is last.
/// Trailing blank and comment lines belong to the span.
pub fn locate<S: AsRef<str>>(lines: &[S], name: &str) -> Result<LineSpan, NotFound> {
    let start = lines
        .iter()
        .position(|line| name_of(line.as_ref()) == Some(name))
        .ok_or_else(|| NotFound {
            name: name.to_string(),
        })?;
    let end = next_record_start(lines, start + 1);
    debug!(name, start, end, "located record span");
    Ok(LineSpan { start, end })
}

fn next_record_start<S: AsRef<str>>(lines: &[S], from: usize) -> usize {
    lines[from..]
        .iter()
        .position(|line| codec::is_name_line(line.as_ref().trim()))
        .map_or(lines.len(), |offset| from + offset)
}

/// Builds a name → span map in one pass.
///
/// When a name repeats, the first occurrence wins, matching [`locate`].
pub fn index_spans<S: AsRef<str>>(lines: &[S]) -> HashMap<String, LineSpan> {
    let starts: Vec<(usize, &str)> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| name_of(line.as_ref()).map(|name| (i, name)))
        .collect();

    let mut spans = HashMap::with_capacity(starts.len());
    for (pos, &(start, name)) in starts.iter().enumerate() {
        let end = starts.get(pos + 1).map_or(lines.len(), |&(next, _)| next);
        spans
            .entry(name.to_string())
            .or_insert(LineSpan { start, end });
    }
    spans
}

/// Shrinks `span` so it ends after the last field line.
///
/// Blank lines and comments at the tail of a span usually separate records
/// or introduce the next one; patching keeps them in place.
pub fn body_end<S: AsRef<str>>(lines: &[S], span: LineSpan) -> usize {
    let mut end = span.end;
    while end > span.start + 1 {
        let trimmed = lines[end - 1].as_ref().trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            end -= 1;
        } else {
            break;
        }
    }
    end
}
