use thiserror::Error;
use tracing::debug;

use crate::codec::{self, ValidationError};
use crate::record::{Field, Monster};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed field `{field}` on line {line}: {raw:?}")]
    MalformedField {
        field: Field,
        raw: String,
        line: usize,
    },
    #[error("empty record name on line {line}")]
    EmptyName { line: usize },
}

impl ParseError {
    fn from_validation(err: ValidationError, field: Field, raw: &str, line: usize) -> Self {
        match err {
            ValidationError::EmptyName => Self::EmptyName { line },
            _ => Self::MalformedField {
                field,
                raw: raw.to_string(),
                line,
            },
        }
    }
}

/// Decodes every record in `text`, in file order.
///
/// Blank lines, `#` comments, unknown prefixes and field lines seen before
/// the first `name:` are skipped. The first malformed field aborts the whole
/// parse; no partial list is returned.
pub fn parse_str(text: &str) -> Result<Vec<Monster>, ParseError> {
    parse_lines(text.lines())
}

pub fn parse_lines<'a, I>(lines: I) -> Result<Vec<Monster>, ParseError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut monsters = Vec::new();
    let mut current: Option<Monster> = None;

    for (index, line) in lines.into_iter().enumerate() {
        let line_no = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((field, raw)) = codec::split_line(trimmed) else {
            continue;
        };

        if field == Field::Name {
            if raw.is_empty() {
                return Err(ParseError::EmptyName { line: line_no });
            }
            if let Some(mut done) = current.take() {
                done.finalize();
                monsters.push(done);
            }
            current = Some(Monster::new(raw));
            continue;
        }

        let Some(monster) = current.as_mut() else {
            continue;
        };
        codec::apply(monster, field, raw)
            .map_err(|e| ParseError::from_validation(e, field, raw, line_no))?;
    }

    if let Some(mut done) = current {
        done.finalize();
        monsters.push(done);
    }

    debug!(count = monsters.len(), "parsed monster records");
    Ok(monsters)
}
