use mfe_core::record::Monster;
use serde_json::{Map as JsonMap, Value as JsonValue};

const LABEL_WIDTH: usize = 13;
const NONE_TEXT: &str = "None";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextRenderOptions {
    /// Replace every non-ASCII character with `?` before returning.
    pub ascii_only: bool,
}

/// Replaces each non-ASCII character with a single `?`.
pub fn sanitize_ascii(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect()
}

pub fn render_detail(monster: &Monster) -> String {
    render_detail_with_options(monster, TextRenderOptions::default())
}

/// Multi-line sheet for one record. Absent values print as `None`; each
/// blow and flag line gets its own row under a shared label.
pub fn render_detail_with_options(monster: &Monster, options: TextRenderOptions) -> String {
    let mut rows: Vec<String> = Vec::new();
    rows.push(monster.name.clone());
    rows.push("=".repeat(monster.name.chars().count()));
    push_row(&mut rows, "Speed", &int_text(monster.speed));
    push_row(&mut rows, "Hit Points", &int_text(monster.health));
    push_row(&mut rows, "Experience", &int_text(monster.experience));
    push_list(&mut rows, "Blows", &monster.blows);
    push_list(&mut rows, "Flags", &monster.flags);
    push_row(&mut rows, "Flags Off", text_or_none(&monster.flags_off));
    push_row(&mut rows, "Description", text_or_none(&monster.description));
    push_row(&mut rows, "Spell Power", &int_text(monster.spell_power));
    push_row(&mut rows, "Rarity", &int_text(monster.rarity));

    finish(rows, options)
}

pub fn render_list(records: &[&Monster]) -> String {
    render_list_with_options(records, TextRenderOptions::default())
}

/// Numbered, one name per line, in the order given.
pub fn render_list_with_options(records: &[&Monster], options: TextRenderOptions) -> String {
    if records.is_empty() {
        return finish(vec!["No matching monsters.".to_string()], options);
    }
    let width = records.len().to_string().len();
    let rows = records
        .iter()
        .enumerate()
        .map(|(i, m)| format!("{:>width$}. {}", i + 1, m.name))
        .collect();
    finish(rows, options)
}

/// One record as a JSON object with a fixed key order.
pub fn render_json(monster: &Monster) -> JsonValue {
    JsonValue::Object(monster_json(monster))
}

pub fn render_json_many(records: &[&Monster]) -> JsonValue {
    JsonValue::Array(
        records
            .iter()
            .map(|m| JsonValue::Object(monster_json(m)))
            .collect(),
    )
}

fn monster_json(monster: &Monster) -> JsonMap<String, JsonValue> {
    let mut out = JsonMap::new();

    out.insert("name".to_string(), JsonValue::String(monster.name.clone()));
    out.insert("speed".to_string(), int_json(monster.speed));
    out.insert("hit_points".to_string(), int_json(monster.health));
    out.insert("experience".to_string(), int_json(monster.experience));
    out.insert("blows".to_string(), strings_json(&monster.blows));
    out.insert("flags".to_string(), strings_json(&monster.flags));
    out.insert("flags_off".to_string(), text_json(&monster.flags_off));
    out.insert("description".to_string(), text_json(&monster.description));
    out.insert("spell_power".to_string(), int_json(monster.spell_power));
    out.insert("rarity".to_string(), int_json(monster.rarity));
    out.insert("damage".to_string(), int_json(monster.damage));

    out
}

fn int_json(value: Option<i64>) -> JsonValue {
    match value {
        Some(v) => JsonValue::from(v),
        None => JsonValue::Null,
    }
}

fn text_json(value: &Option<String>) -> JsonValue {
    match value {
        Some(v) => JsonValue::String(v.clone()),
        None => JsonValue::Null,
    }
}

fn strings_json(values: &[String]) -> JsonValue {
    JsonValue::Array(values.iter().cloned().map(JsonValue::String).collect())
}

fn int_text(value: Option<i64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| NONE_TEXT.to_string())
}

fn text_or_none(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(NONE_TEXT)
}

fn push_row(rows: &mut Vec<String>, label: &str, value: &str) {
    let label = format!("{label}:");
    rows.push(format!("{label:<LABEL_WIDTH$} {value}"));
}

fn push_list(rows: &mut Vec<String>, label: &str, values: &[String]) {
    match values.split_first() {
        None => push_row(rows, label, NONE_TEXT),
        Some((first, rest)) => {
            push_row(rows, label, first);
            for value in rest {
                rows.push(format!("{:<LABEL_WIDTH$} {value}", ""));
            }
        }
    }
}

fn finish(rows: Vec<String>, options: TextRenderOptions) -> String {
    let mut out = rows
        .iter()
        .map(|row| row.trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    if options.ascii_only {
        sanitize_ascii(&out)
    } else {
        out
    }
}
