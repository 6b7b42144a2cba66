//! Achievement diary completion varbits.
//!
//! Every area has four tiers; each tier is tracked by one varbit whose value
//! rises when the tier's tasks are all done.

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Elite,
}

impl Difficulty {
    /// Case-insensitive lookup of a difficulty word from game text.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            "elite" => Some(Self::Elite),
            _ => None,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
            Self::Elite => "Elite",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diary {
    pub area: &'static str,
    pub difficulty: Difficulty,
}

/// Karamja easy, medium and hard use 0 = not started, 1 = started,
/// 2 = completed. Karamja elite and every other diary use 0/1.
pub const KARAMJA_THREE_STATE_IDS: [i32; 3] = [3578, 3599, 3611];

const TABLE: &[(i32, &str, Difficulty)] = &[
    (4458, "Ardougne", Difficulty::Easy),
    (4459, "Ardougne", Difficulty::Medium),
    (4460, "Ardougne", Difficulty::Hard),
    (4461, "Ardougne", Difficulty::Elite),
    (4483, "Desert", Difficulty::Easy),
    (4484, "Desert", Difficulty::Medium),
    (4485, "Desert", Difficulty::Hard),
    (4486, "Desert", Difficulty::Elite),
    (4462, "Falador", Difficulty::Easy),
    (4463, "Falador", Difficulty::Medium),
    (4464, "Falador", Difficulty::Hard),
    (4465, "Falador", Difficulty::Elite),
    (4491, "Fremennik", Difficulty::Easy),
    (4492, "Fremennik", Difficulty::Medium),
    (4493, "Fremennik", Difficulty::Hard),
    (4494, "Fremennik", Difficulty::Elite),
    (4475, "Kandarin", Difficulty::Easy),
    (4476, "Kandarin", Difficulty::Medium),
    (4477, "Kandarin", Difficulty::Hard),
    (4478, "Kandarin", Difficulty::Elite),
    (3578, "Karamja", Difficulty::Easy),
    (3599, "Karamja", Difficulty::Medium),
    (3611, "Karamja", Difficulty::Hard),
    (4566, "Karamja", Difficulty::Elite),
    (7925, "Kourend & Kebos", Difficulty::Easy),
    (7926, "Kourend & Kebos", Difficulty::Medium),
    (7927, "Kourend & Kebos", Difficulty::Hard),
    (7928, "Kourend & Kebos", Difficulty::Elite),
    (4495, "Lumbridge & Draynor", Difficulty::Easy),
    (4496, "Lumbridge & Draynor", Difficulty::Medium),
    (4497, "Lumbridge & Draynor", Difficulty::Hard),
    (4498, "Lumbridge & Draynor", Difficulty::Elite),
    (4487, "Morytania", Difficulty::Easy),
    (4488, "Morytania", Difficulty::Medium),
    (4489, "Morytania", Difficulty::Hard),
    (4490, "Morytania", Difficulty::Elite),
    (4479, "Varrock", Difficulty::Easy),
    (4480, "Varrock", Difficulty::Medium),
    (4481, "Varrock", Difficulty::Hard),
    (4482, "Varrock", Difficulty::Elite),
    (4471, "Western Provinces", Difficulty::Easy),
    (4472, "Western Provinces", Difficulty::Medium),
    (4473, "Western Provinces", Difficulty::Hard),
    (4474, "Western Provinces", Difficulty::Elite),
    (4466, "Wilderness", Difficulty::Easy),
    (4467, "Wilderness", Difficulty::Medium),
    (4468, "Wilderness", Difficulty::Hard),
    (4469, "Wilderness", Difficulty::Elite),
];

lazy_static! {
    pub static ref DIARIES: HashMap<i32, Diary> = TABLE
        .iter()
        .map(|&(id, area, difficulty)| (id, Diary { area, difficulty }))
        .collect();
}

pub fn lookup(id: i32) -> Option<Diary> {
    DIARIES.get(&id).copied()
}

/// Whether `value` marks the diary tracked by `id` as completed.
pub fn is_complete(id: i32, value: i32) -> bool {
    if KARAMJA_THREE_STATE_IDS.contains(&id) {
        value > 1
    } else {
        value > 0
    }
}

/// Resolve a completion message's area text against the table, matching when
/// either name contains the other (ignoring case).
pub fn find_by_area(area: &str, difficulty: Difficulty) -> Option<(i32, Diary)> {
    let needle = area.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    TABLE
        .iter()
        .filter(|(_, _, d)| *d == difficulty)
        .find(|(_, name, _)| {
            let name = name.to_lowercase();
            name.contains(&needle) || needle.contains(&name)
        })
        .map(|&(id, area, difficulty)| (id, Diary { area, difficulty }))
}
