use thiserror::Error;

use crate::record::{Field, Monster};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Integer,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    /// Last occurrence in a block wins.
    Single,
    /// Each occurrence is appended in file order.
    Repeatable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: Field,
    pub prefix: &'static str,
    pub value_type: ValueType,
    pub multiplicity: Multiplicity,
}

/// Line prefixes recognised inside a block, in encoding order.
pub const FIELD_SPECS: [FieldSpec; 10] = [
    FieldSpec {
        field: Field::Name,
        prefix: "name:",
        value_type: ValueType::Text,
        multiplicity: Multiplicity::Single,
    },
    FieldSpec {
        field: Field::Speed,
        prefix: "speed:",
        value_type: ValueType::Integer,
        multiplicity: Multiplicity::Single,
    },
    FieldSpec {
        field: Field::Health,
        prefix: "hit-points:",
        value_type: ValueType::Integer,
        multiplicity: Multiplicity::Single,
    },
    FieldSpec {
        field: Field::Experience,
        prefix: "experience:",
        value_type: ValueType::Integer,
        multiplicity: Multiplicity::Single,
    },
    FieldSpec {
        field: Field::Blow,
        prefix: "blow:",
        value_type: ValueType::Text,
        multiplicity: Multiplicity::Repeatable,
    },
    FieldSpec {
        field: Field::Flags,
        prefix: "flags:",
        value_type: ValueType::Text,
        multiplicity: Multiplicity::Repeatable,
    },
    FieldSpec {
        field: Field::FlagsOff,
        prefix: "flags-off:",
        value_type: ValueType::Text,
        multiplicity: Multiplicity::Single,
    },
    FieldSpec {
        field: Field::Description,
        prefix: "desc:",
        value_type: ValueType::Text,
        multiplicity: Multiplicity::Single,
    },
    FieldSpec {
        field: Field::SpellPower,
        prefix: "spell-power:",
        value_type: ValueType::Integer,
        multiplicity: Multiplicity::Single,
    },
    FieldSpec {
        field: Field::Rarity,
        prefix: "rarity:",
        value_type: ValueType::Integer,
        multiplicity: Multiplicity::Single,
    },
];

pub const NAME_PREFIX: &str = "name:";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("field `{field}` expects an integer, got {raw:?}")]
    NotAnInteger { field: Field, raw: String },
    #[error("field `{field}` cannot contain a line break")]
    LineBreak { field: Field },
    #[error("field `{field}` is not {expected}")]
    WrongMultiplicity {
        field: Field,
        expected: &'static str,
    },
    #[error("field `{field}` has no entry {index} (it has {len})")]
    IndexOutOfRange {
        field: Field,
        index: usize,
        len: usize,
    },
    #[error("record name cannot be empty")]
    EmptyName,
}

/// How blow strings are written back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlowStyle {
    /// Emit each blow exactly as stored.
    #[default]
    Verbatim,
    /// Rewrite legacy `METHOD EFFECT DICE` entries as `METHOD:EFFECT:DICE`.
    Normalized,
}

pub fn spec_for(field: Field) -> &'static FieldSpec {
    // FIELD_SPECS is laid out in Field discriminant order.
    &FIELD_SPECS[field as usize]
}

/// Splits an already-trimmed line into its field and raw value.
///
/// The value is trimmed as well, so trailing spaces in text fields do not
/// survive a re-encode.
pub fn split_line(line: &str) -> Option<(Field, &str)> {
    FIELD_SPECS.iter().find_map(|spec| {
        line.strip_prefix(spec.prefix)
            .map(|rest| (spec.field, rest.trim()))
    })
}

pub fn is_name_line(trimmed: &str) -> bool {
    trimmed.starts_with(NAME_PREFIX)
}

pub fn parse_int(field: Field, raw: &str) -> Result<i64, ValidationError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::NotAnInteger {
            field,
            raw: raw.to_string(),
        })
}

fn check_text(field: Field, raw: &str) -> Result<(), ValidationError> {
    if raw.contains(['\n', '\r']) {
        return Err(ValidationError::LineBreak { field });
    }
    Ok(())
}

/// Applies one decoded value to `monster` following the field's multiplicity.
///
/// Integer fields are parsed before anything is written, so a rejected value
/// leaves the record as it was.
pub fn apply(monster: &mut Monster, field: Field, raw: &str) -> Result<(), ValidationError> {
    let spec = spec_for(field);
    match (spec.value_type, spec.multiplicity) {
        (ValueType::Integer, _) => {
            let value = parse_int(field, raw)?;
            if let Some(slot) = monster.int_slot_mut(field) {
                *slot = Some(value);
            }
        }
        (ValueType::Text, Multiplicity::Repeatable) => {
            check_text(field, raw)?;
            if let Some(list) = monster.list_mut(field) {
                list.push(raw.to_string());
            }
        }
        (ValueType::Text, Multiplicity::Single) => {
            check_text(field, raw)?;
            if field == Field::Name {
                let name = raw.trim();
                if name.is_empty() {
                    return Err(ValidationError::EmptyName);
                }
                monster.name = name.to_string();
            } else if let Some(slot) = monster.text_slot_mut(field) {
                *slot = Some(raw.to_string());
            }
        }
    }
    Ok(())
}

/// Rewrites a legacy space-separated blow into colon-delimited form.
///
/// Entries that already contain a colon, or consist of a single token, are
/// returned unchanged. Method and effect are upper-cased; the damage dice
/// keep their case.
pub fn normalize_blow(blow: &str) -> String {
    if blow.contains(':') {
        return blow.to_string();
    }
    let mut parts = blow.split_whitespace();
    let (Some(method), Some(effect)) = (parts.next(), parts.next()) else {
        return blow.to_string();
    };
    let dice: Vec<&str> = parts.collect();
    let mut out = format!(
        "{}:{}",
        method.to_ascii_uppercase(),
        effect.to_ascii_uppercase()
    );
    if !dice.is_empty() {
        out.push(':');
        out.push_str(&dice.join(" "));
    }
    out
}

/// Encodes `monster` as a complete block, without line terminators.
///
/// Order: name, speed, hit-points, experience, every blow, every flags
/// line, flags-off, desc, spell-power, rarity. Absent fields are omitted,
/// as is a `health` that only holds the end-of-block default.
pub fn encode(monster: &Monster, style: BlowStyle) -> Vec<String> {
    let mut out = Vec::with_capacity(8 + monster.blows.len() + monster.flags.len());
    out.push(format!("{NAME_PREFIX}{}", monster.name));

    let push_int = |out: &mut Vec<String>, field: Field, value: Option<i64>| {
        if let Some(v) = value {
            out.push(format!("{}{v}", spec_for(field).prefix));
        }
    };
    let push_text = |out: &mut Vec<String>, field: Field, value: &Option<String>| {
        if let Some(v) = value {
            out.push(format!("{}{v}", spec_for(field).prefix));
        }
    };

    push_int(&mut out, Field::Speed, monster.speed);
    push_int(&mut out, Field::Health, monster.encoded_health());
    push_int(&mut out, Field::Experience, monster.experience);
    for blow in &monster.blows {
        let blow = match style {
            BlowStyle::Verbatim => blow.clone(),
            BlowStyle::Normalized => normalize_blow(blow),
        };
        out.push(format!("{}{blow}", spec_for(Field::Blow).prefix));
    }
    for flag in &monster.flags {
        out.push(format!("{}{flag}", spec_for(Field::Flags).prefix));
    }
    push_text(&mut out, Field::FlagsOff, &monster.flags_off);
    push_text(&mut out, Field::Description, &monster.description);
    push_int(&mut out, Field::SpellPower, monster.spell_power);
    push_int(&mut out, Field::Rarity, monster.rarity);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_line_distinguishes_flags_and_flags_off() {
        assert_eq!(split_line("flags:UNIQUE"), Some((Field::Flags, "UNIQUE")));
        assert_eq!(
            split_line("flags-off:SMART"),
            Some((Field::FlagsOff, "SMART"))
        );
        assert_eq!(split_line("depth:5"), None);
    }

    #[test]
    fn split_line_trims_text_values() {
        assert_eq!(
            split_line("desc:A tiny demon.   "),
            Some((Field::Description, "A tiny demon."))
        );
    }

    #[test]
    fn apply_rejects_non_integer_without_touching_record() {
        let mut monster = Monster::new("Orc");
        monster.speed = Some(110);
        let err = apply(&mut monster, Field::Speed, "fast").unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotAnInteger {
                field: Field::Speed,
                raw: "fast".to_string()
            }
        );
        assert_eq!(monster.speed, Some(110));
    }

    #[test]
    fn apply_accepts_signed_integers() {
        let mut monster = Monster::new("Orc");
        apply(&mut monster, Field::Speed, "-5").unwrap();
        assert_eq!(monster.speed, Some(-5));
    }

    #[test]
    fn apply_appends_repeatable_and_overwrites_single() {
        let mut monster = Monster::new("Orc");
        apply(&mut monster, Field::Blow, "HIT:HURT:1d8").unwrap();
        apply(&mut monster, Field::Blow, "HIT:HURT:1d9").unwrap();
        apply(&mut monster, Field::Description, "first").unwrap();
        apply(&mut monster, Field::Description, "second").unwrap();
        assert_eq!(monster.blows, vec!["HIT:HURT:1d8", "HIT:HURT:1d9"]);
        assert_eq!(monster.description.as_deref(), Some("second"));
    }

    #[test]
    fn apply_rejects_line_breaks() {
        let mut monster = Monster::new("Orc");
        let err = apply(&mut monster, Field::Description, "a\nname:Evil").unwrap_err();
        assert_eq!(
            err,
            ValidationError::LineBreak {
                field: Field::Description
            }
        );
    }

    #[test]
    fn apply_accepts_values_beyond_32_bits() {
        let mut monster = Monster::new("Orc");
        apply(&mut monster, Field::Experience, "3000000000").unwrap();
        assert_eq!(monster.experience, Some(3_000_000_000));
    }

    #[test]
    fn defaulted_health_is_not_encoded_until_set() {
        let mut monster = Monster::new("Imp");
        monster.finalize();
        assert_eq!(monster.health, Some(1));
        assert_eq!(encode(&monster, BlowStyle::Verbatim), vec!["name:Imp"]);

        apply(&mut monster, Field::Health, "1").unwrap();
        assert_eq!(
            encode(&monster, BlowStyle::Verbatim),
            vec!["name:Imp", "hit-points:1"]
        );
    }

    #[test]
    fn normalize_blow_handles_legacy_and_colon_forms() {
        assert_eq!(normalize_blow("claw hurt 1d4"), "CLAW:HURT:1d4");
        assert_eq!(normalize_blow("BITE:POISON:2d6"), "BITE:POISON:2d6");
        assert_eq!(normalize_blow("beg"), "beg");
        assert_eq!(normalize_blow("moan terrify"), "MOAN:TERRIFY");
    }

    #[test]
    fn encode_uses_fixed_order_and_omits_absent_fields() {
        let mut monster = Monster::new("Imp");
        monster.rarity = Some(2);
        monster.speed = Some(120);
        monster.flags = vec!["DEMON".to_string(), "EVIL".to_string()];
        monster.blows = vec!["claw hurt 1d4".to_string()];
        monster.description = Some("A small demon.".to_string());

        assert_eq!(
            encode(&monster, BlowStyle::Normalized),
            vec![
                "name:Imp",
                "speed:120",
                "blow:CLAW:HURT:1d4",
                "flags:DEMON",
                "flags:EVIL",
                "desc:A small demon.",
                "rarity:2",
            ]
        );
        assert_eq!(
            encode(&monster, BlowStyle::Verbatim)[2],
            "blow:claw hurt 1d4"
        );
    }
}
