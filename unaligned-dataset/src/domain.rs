use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter};

/// One of the three image collections a dataset draws from.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumCount, EnumIter,
)]
pub enum Domain {
    A,
    B,
    C,
}

impl Domain {
    pub fn iter() -> impl Iterator<Item = Self> {
        <Self as strum::IntoEnumIterator>::iter()
    }

    /// Position of the domain in per-domain arrays.
    pub fn index(self) -> usize {
        match self {
            Domain::A => 0,
            Domain::B => 1,
            Domain::C => 2,
        }
    }

    /// Directory name for this domain in the given phase, e.g. `trainA`.
    pub fn dir_name(self, phase: &str) -> String {
        format!("{phase}{self}")
    }
}

#[test]
fn dir_names_follow_phase() {
    let names: Vec<String> = Domain::iter().map(|d| d.dir_name("test")).collect();

    assert_eq!(names, ["testA", "testB", "testC"]);
    assert_eq!(Domain::COUNT, 3);
}
