use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::{self, BlowStyle};
use crate::locator::{self, LineSpan, NotFound};
use crate::record::Monster;
use crate::source::SourceLines;

pub const DEFAULT_BACKUP_PREFIX: &str = "monster_backup";
pub const DEFAULT_DERIVATIVE_PREFIX: &str = "monster_edited";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const DEFAULT_EXTENSION: &str = "txt";

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error(transparent)]
    NotFound(#[from] NotFound),
    #[error("failed to back up {} to {}: {source}", primary.display(), backup.display())]
    Backup {
        primary: PathBuf,
        backup: PathBuf,
        source: io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// Snapshot the primary file, then overwrite it.
    #[default]
    InPlace,
    /// Leave the primary file alone and write a new timestamped file
    /// beside it.
    Derivative,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOptions {
    pub mode: SaveMode,
    pub backup_prefix: String,
    pub derivative_prefix: String,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            mode: SaveMode::InPlace,
            backup_prefix: DEFAULT_BACKUP_PREFIX.to_string(),
            derivative_prefix: DEFAULT_DERIVATIVE_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    /// Snapshot of the primary taken before it was overwritten.
    pub backup: Option<PathBuf>,
    /// File that received the patched content.
    pub written: PathBuf,
    /// Records whose block was replaced, by original name.
    pub applied: Vec<String>,
    /// Requested records with no `name:` line in the file.
    pub missing: Vec<String>,
    /// Lines with no recognised prefix (`base:`, `depth:` ...) that were
    /// inside a rewritten block and are not in the new content.
    pub dropped: Vec<String>,
}

/// Result of a batch splice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSplice {
    pub source: SourceLines,
    /// Names whose block was replaced, in file order.
    pub applied: Vec<String>,
    pub dropped: Vec<String>,
}

/// Trimmed lines that are not blank, not comments and carry no known field.
pub fn unrecognised_lines<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    lines
        .iter()
        .map(|line| line.as_ref().trim())
        .filter(|t| !t.is_empty() && !t.starts_with('#') && codec::split_line(t).is_none())
        .map(str::to_string)
        .collect()
}

fn warn_dropped(name: &str, dropped: &[String]) {
    if !dropped.is_empty() {
        warn!(
            name,
            lines = ?dropped,
            "dropping unrecognised lines from rewritten monster"
        );
    }
}

/// Replaces the located span with the encoded block for `edited`.
///
/// Trailing blank and comment lines of the span are kept after the block.
pub fn splice_one(
    source: &SourceLines,
    span: LineSpan,
    edited: &Monster,
    style: BlowStyle,
) -> SourceLines {
    let lines = source.lines();
    let body_end = locator::body_end(lines, span);
    let block = source.terminate(codec::encode(edited, style), body_end == lines.len());

    let mut out = Vec::with_capacity(lines.len() - (body_end - span.start) + block.len());
    out.extend_from_slice(&lines[..span.start]);
    out.extend(block);
    out.extend_from_slice(&lines[body_end..]);
    SourceLines::from_lines(out, source.newline())
}

/// Rewrites every record named in `modified` in a single top-to-bottom pass.
///
/// After a matching `name:` line the original lines are skipped until the
/// next `name:` line or the first blank line, whichever comes first; that
/// terminating line is kept.
pub fn splice_batch(
    source: &SourceLines,
    modified: &BTreeMap<&str, &Monster>,
    style: BlowStyle,
) -> BatchSplice {
    let lines = source.lines();
    let mut out = Vec::with_capacity(lines.len());
    let mut applied = Vec::new();
    let mut dropped = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let edited = locator::name_of(&lines[i]).and_then(|name| modified.get(name));
        let Some(edited) = edited else {
            out.push(lines[i].clone());
            i += 1;
            continue;
        };

        let name = locator::name_of(&lines[i]).unwrap_or_default();
        let block_start = i + 1;
        i = block_start;
        while i < lines.len() {
            let trimmed = lines[i].trim();
            if trimmed.is_empty() || codec::is_name_line(trimmed) {
                break;
            }
            i += 1;
        }
        let unknown = unrecognised_lines(&lines[block_start..i]);
        warn_dropped(name, &unknown);
        dropped.extend(unknown);
        applied.push(name.to_string());
        out.extend(source.terminate(codec::encode(edited, style), i == lines.len()));
    }

    BatchSplice {
        source: SourceLines::from_lines(out, source.newline()),
        applied,
        dropped,
    }
}

/// Patches the single record called `name` in the file at `path`.
///
/// The span is looked up in the file as it is now, so records added or
/// moved since the last load are handled; a record that has vanished fails
/// with [`PatchError::NotFound`] before anything is written.
pub fn patch_one(
    path: &Path,
    name: &str,
    edited: &Monster,
    options: &SaveOptions,
) -> Result<SaveReport, PatchError> {
    let source = read_source(path)?;
    let span = locator::locate(source.lines(), name)?;
    let body_end = locator::body_end(source.lines(), span);
    let dropped = unrecognised_lines(&source.lines()[span.start + 1..body_end]);
    let patched = splice_one(&source, span, edited, BlowStyle::Verbatim);
    let (backup, written) = commit(path, &patched.to_text(), options)?;

    warn_dropped(name, &dropped);
    info!(name, written = %written.display(), "saved monster");
    Ok(SaveReport {
        backup,
        written,
        applied: vec![name.to_string()],
        missing: Vec::new(),
        dropped,
    })
}

/// Patches every record in `modified_names` using the working copies in
/// `records_by_name`, normalizing legacy blow strings on the way out.
pub fn patch_batch<'a, I>(
    path: &Path,
    modified_names: I,
    records_by_name: &HashMap<String, Monster>,
    options: &SaveOptions,
) -> Result<SaveReport, PatchError>
where
    I: IntoIterator<Item = &'a str>,
{
    let source = read_source(path)?;
    let spans = locator::index_spans(source.lines());

    let mut modified = BTreeMap::new();
    let mut missing = Vec::new();
    for name in modified_names {
        match records_by_name.get(name) {
            Some(record) if spans.contains_key(name) => {
                modified.insert(name, record);
            }
            _ => {
                warn!(name, "modified monster has no block in the data file");
                missing.push(name.to_string());
            }
        }
    }

    let BatchSplice {
        source: patched,
        applied,
        dropped,
    } = splice_batch(&source, &modified, BlowStyle::Normalized);
    let (backup, written) = commit(path, &patched.to_text(), options)?;

    info!(
        count = applied.len(),
        written = %written.display(),
        "saved modified monsters"
    );
    Ok(SaveReport {
        backup,
        written,
        applied,
        missing,
        dropped,
    })
}

pub fn read_source(path: &Path) -> Result<SourceLines, PatchError> {
    let text = fs::read_to_string(path).map_err(|source| PatchError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(SourceLines::from_text(&text))
}

fn commit(
    path: &Path,
    text: &str,
    options: &SaveOptions,
) -> Result<(Option<PathBuf>, PathBuf), PatchError> {
    let now = Local::now().naive_local();
    match options.mode {
        SaveMode::InPlace => {
            let backup = take_backup(path, &options.backup_prefix, now)?;
            write_replacing(path, text)?;
            Ok((Some(backup), path.to_path_buf()))
        }
        SaveMode::Derivative => {
            let target = timestamped_path(path, &options.derivative_prefix, now);
            write_replacing(&target, text)?;
            Ok((None, target))
        }
    }
}

/// Copies `primary` byte for byte to a fresh timestamped path beside it.
pub fn take_backup(
    primary: &Path,
    prefix: &str,
    now: NaiveDateTime,
) -> Result<PathBuf, PatchError> {
    let backup = timestamped_path(primary, prefix, now);
    fs::copy(primary, &backup).map_err(|source| PatchError::Backup {
        primary: primary.to_path_buf(),
        backup: backup.clone(),
        source,
    })?;
    debug!(backup = %backup.display(), "backup written");
    Ok(backup)
}

/// `<dir>/<prefix>_<YYYYMMDD_HHMMSS>.<ext>`, with `_<n>` added until the
/// name is unused.
pub fn timestamped_path(primary: &Path, prefix: &str, now: NaiveDateTime) -> PathBuf {
    let dir = primary.parent().unwrap_or_else(|| Path::new(""));
    let ext = primary
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or(DEFAULT_EXTENSION);
    let stamp = now.format(TIMESTAMP_FORMAT);

    let mut candidate = dir.join(format!("{prefix}_{stamp}.{ext}"));
    let mut n = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{prefix}_{stamp}_{n}.{ext}"));
        n += 1;
    }
    candidate
}

/// Writes `text` to a temporary file next to `path`, then moves it over
/// `path`. Permissions of an existing file are carried over.
fn write_replacing(path: &Path, text: &str) -> Result<(), PatchError> {
    let write_err = |source: io::Error| PatchError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(text.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions()).map_err(write_err)?;
    }
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FILE: &str = "\
# monsters
name:Orc
speed:110
hit-points:11

name:Troll
hit-points:40
blow:HIT:HURT:1d10

# the big one
name:Dragon
speed:130";

    fn troll() -> Monster {
        let mut m = Monster::new("Troll");
        m.health = Some(55);
        m.blows = vec!["bite hurt 2d6".to_string()];
        m
    }

    #[test]
    fn splice_one_keeps_neighbours_and_trailing_trivia() {
        let source = SourceLines::from_text(FILE);
        let span = locator::locate(source.lines(), "Troll").unwrap();
        let out = splice_one(&source, span, &troll(), BlowStyle::Verbatim);
        assert_eq!(
            out.to_text(),
            "\
# monsters
name:Orc
speed:110
hit-points:11

name:Troll
hit-points:55
blow:bite hurt 2d6

# the big one
name:Dragon
speed:130"
        );
    }

    #[test]
    fn splice_one_at_eof_keeps_missing_terminator() {
        let source = SourceLines::from_text(FILE);
        let span = locator::locate(source.lines(), "Dragon").unwrap();
        let mut dragon = Monster::new("Dragon");
        dragon.speed = Some(140);
        let out = splice_one(&source, span, &dragon, BlowStyle::Verbatim);
        assert!(out.to_text().ends_with("name:Dragon\nspeed:140"));
    }

    #[test]
    fn splice_batch_stops_at_blank_line_and_normalizes_blows() {
        let source = SourceLines::from_text(FILE);
        let troll = troll();
        let mut orc = Monster::new("Orc");
        orc.speed = Some(115);
        let modified = BTreeMap::from([("Troll", &troll), ("Orc", &orc)]);

        let spliced = splice_batch(&source, &modified, BlowStyle::Normalized);
        assert_eq!(spliced.applied, vec!["Orc", "Troll"]);
        assert!(spliced.dropped.is_empty());
        assert_eq!(
            spliced.source.to_text(),
            "\
# monsters
name:Orc
speed:115

name:Troll
hit-points:55
blow:BITE:HURT:2d6

# the big one
name:Dragon
speed:130"
        );
    }

    #[test]
    fn splice_batch_without_changes_is_identity() {
        let source = SourceLines::from_text(FILE);
        let spliced = splice_batch(&source, &BTreeMap::new(), BlowStyle::Normalized);
        assert!(spliced.applied.is_empty());
        assert_eq!(spliced.source, source);
    }

    #[test]
    fn splice_batch_collects_unrecognised_lines() {
        let source = SourceLines::from_text("name:Orc\nbase:orc\ndepth:5\nspeed:110\n# note\n\nname:Imp\n");
        let orc = Monster::new("Orc");
        let modified = BTreeMap::from([("Orc", &orc)]);

        let spliced = splice_batch(&source, &modified, BlowStyle::Normalized);
        assert_eq!(spliced.dropped, vec!["base:orc", "depth:5"]);
        assert_eq!(spliced.source.to_text(), "name:Orc\n\nname:Imp\n");
    }

    #[test]
    fn timestamped_path_uses_prefix_and_extension() {
        let now = NaiveDateTime::parse_from_str("2024-03-05 07:08:09", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let path = timestamped_path(Path::new("/nonexistent/dir/monster.txt"), "bk", now);
        assert_eq!(path, PathBuf::from("/nonexistent/dir/bk_20240305_070809.txt"));
        let path = timestamped_path(Path::new("/nonexistent/dir/monster"), "bk", now);
        assert_eq!(path, PathBuf::from("/nonexistent/dir/bk_20240305_070809.txt"));
    }
}
