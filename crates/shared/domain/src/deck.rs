use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deck slots of a Flex-style deck.
///
/// Rows run from `A` (back) to `D` (front), columns 1–3 are regular slots and
/// column 4 holds the staging area. Legacy numeric names (`"1"`..`"12"`) are
/// accepted on input and mapped to the equivalent coordinate slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeckSlotName {
    #[serde(alias = "10")]
    A1,
    #[serde(alias = "11")]
    A2,
    #[serde(alias = "12")]
    A3,
    A4,
    #[serde(alias = "7")]
    B1,
    #[serde(alias = "8")]
    B2,
    #[serde(alias = "9")]
    B3,
    B4,
    #[serde(alias = "4")]
    C1,
    #[serde(alias = "5")]
    C2,
    #[serde(alias = "6")]
    C3,
    C4,
    #[serde(alias = "1")]
    D1,
    #[serde(alias = "2")]
    D2,
    #[serde(alias = "3")]
    D3,
    D4,
}

impl DeckSlotName {
    pub const ALL: [Self; 16] = [
        Self::A1,
        Self::A2,
        Self::A3,
        Self::A4,
        Self::B1,
        Self::B2,
        Self::B3,
        Self::B4,
        Self::C1,
        Self::C2,
        Self::C3,
        Self::C4,
        Self::D1,
        Self::D2,
        Self::D3,
        Self::D4,
    ];

    /// Row letter, `'A'` being the back of the deck.
    #[must_use]
    pub const fn row(self) -> char {
        match self {
            Self::A1 | Self::A2 | Self::A3 | Self::A4 => 'A',
            Self::B1 | Self::B2 | Self::B3 | Self::B4 => 'B',
            Self::C1 | Self::C2 | Self::C3 | Self::C4 => 'C',
            Self::D1 | Self::D2 | Self::D3 | Self::D4 => 'D',
        }
    }

    /// Column number, 1-based. Column 4 is the staging area.
    #[must_use]
    pub const fn column(self) -> u8 {
        match self {
            Self::A1 | Self::B1 | Self::C1 | Self::D1 => 1,
            Self::A2 | Self::B2 | Self::C2 | Self::D2 => 2,
            Self::A3 | Self::B3 | Self::C3 | Self::D3 => 3,
            Self::A4 | Self::B4 | Self::C4 | Self::D4 => 4,
        }
    }

    #[must_use]
    pub const fn is_staging(self) -> bool {
        self.column() == 4
    }

    /// Legacy numeric slot (`D1` is 1, `A3` is 12). Staging slots have none.
    #[must_use]
    pub const fn as_int(self) -> Option<u8> {
        if self.is_staging() {
            return None;
        }
        let row_index = match self.row() {
            'D' => 0,
            'C' => 1,
            'B' => 2,
            _ => 3,
        };
        Some(row_index * 3 + self.column())
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A1 => "A1",
            Self::A2 => "A2",
            Self::A3 => "A3",
            Self::A4 => "A4",
            Self::B1 => "B1",
            Self::B2 => "B2",
            Self::B3 => "B3",
            Self::B4 => "B4",
            Self::C1 => "C1",
            Self::C2 => "C2",
            Self::C3 => "C3",
            Self::C4 => "C4",
            Self::D1 => "D1",
            Self::D2 => "D2",
            Self::D3 => "D3",
            Self::D4 => "D4",
        }
    }
}

impl FromStr for DeckSlotName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        if let Ok(number) = normalized.parse::<u8>() {
            return Self::ALL
                .into_iter()
                .find(|slot| slot.as_int() == Some(number))
                .ok_or_else(|| ParseError::new("deck slot", s));
        }
        Self::ALL
            .into_iter()
            .find(|slot| slot.as_str() == normalized)
            .ok_or_else(|| ParseError::new("deck slot", s))
    }
}

impl fmt::Display for DeckSlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipette mount on the gantry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mount {
    Left,
    Right,
}

impl Mount {
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl FromStr for Mount {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            _ => Err(ParseError::new("mount", s)),
        }
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
