use serde::{Deserialize, Serialize};

pub const DEFAULT_HEALTH: i64 = 1;
pub const DEFAULT_DAMAGE: i64 = 0;

/// One monster definition, keyed by `name`.
///
/// Every attribute other than `name` is optional so that an absent line
/// stays absent when the record is encoded again. `health` and `damage`
/// are filled in by the parser when a block ends without them; a filled-in
/// `health` is flagged so it is not written back as a `hit-points:` line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monster {
    pub name: String,
    pub health: Option<i64>,
    pub speed: Option<i64>,
    pub experience: Option<i64>,
    pub spell_power: Option<i64>,
    pub rarity: Option<i64>,
    pub blows: Vec<String>,
    pub flags: Vec<String>,
    pub flags_off: Option<String>,
    pub description: Option<String>,
    pub damage: Option<i64>,
    /// Set when `health` holds the end-of-block default rather than a value
    /// read from the file or entered by the user.
    #[serde(skip)]
    pub health_defaulted: bool,
}

impl Monster {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Applies the end-of-block defaults for legacy entries.
    pub fn finalize(&mut self) {
        if self.health.is_none() {
            self.health = Some(DEFAULT_HEALTH);
            self.health_defaulted = true;
        }
        if self.damage.is_none() {
            self.damage = Some(DEFAULT_DAMAGE);
        }
    }

    /// Slot for an integer field. Only used for writes, so handing out the
    /// health slot drops the default marker.
    pub(crate) fn int_slot_mut(&mut self, field: Field) -> Option<&mut Option<i64>> {
        match field {
            Field::Health => {
                self.health_defaulted = false;
                Some(&mut self.health)
            }
            Field::Speed => Some(&mut self.speed),
            Field::Experience => Some(&mut self.experience),
            Field::SpellPower => Some(&mut self.spell_power),
            Field::Rarity => Some(&mut self.rarity),
            _ => None,
        }
    }

    pub(crate) fn text_slot_mut(&mut self, field: Field) -> Option<&mut Option<String>> {
        match field {
            Field::FlagsOff => Some(&mut self.flags_off),
            Field::Description => Some(&mut self.description),
            _ => None,
        }
    }

    pub(crate) fn list_mut(&mut self, field: Field) -> Option<&mut Vec<String>> {
        match field {
            Field::Blow => Some(&mut self.blows),
            Field::Flags => Some(&mut self.flags),
            _ => None,
        }
    }

    /// Copies every attribute of `edited` into `self`.
    ///
    /// Used after a successful save so callers holding the original keep
    /// their handle while observing the committed values.
    pub fn merge_from(&mut self, edited: &Monster) {
        self.name.clone_from(&edited.name);
        self.health = edited.health;
        self.speed = edited.speed;
        self.experience = edited.experience;
        self.spell_power = edited.spell_power;
        self.rarity = edited.rarity;
        self.blows.clone_from(&edited.blows);
        self.flags.clone_from(&edited.flags);
        self.flags_off.clone_from(&edited.flags_off);
        self.description.clone_from(&edited.description);
        self.damage = edited.damage;
        self.health_defaulted = edited.health_defaulted;
    }

    /// `health` as it should be written out; `None` while it still holds
    /// the untouched default.
    pub fn encoded_health(&self) -> Option<i64> {
        if self.health_defaulted && self.health == Some(DEFAULT_HEALTH) {
            None
        } else {
            self.health
        }
    }
}

/// The fixed set of attributes that appear as `prefix:value` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Name,
    Speed,
    Health,
    Experience,
    Blow,
    Flags,
    FlagsOff,
    Description,
    SpellPower,
    Rarity,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Name => "name",
            Self::Speed => "speed",
            Self::Health => "hit-points",
            Self::Experience => "experience",
            Self::Blow => "blow",
            Self::Flags => "flags",
            Self::FlagsOff => "flags-off",
            Self::Description => "desc",
            Self::SpellPower => "spell-power",
            Self::Rarity => "rarity",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
