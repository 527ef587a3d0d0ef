//! Mood labels

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of mood classes
pub const MOOD_COUNT: usize = 4;

/// Emotional category predicted for a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Calm,
    Energetic,
    Happy,
    Sad,
}

impl Mood {
    /// All moods in canonical (alphabetical) order
    pub const ALL: [Mood; MOOD_COUNT] = [Mood::Calm, Mood::Energetic, Mood::Happy, Mood::Sad];

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Calm => "calm",
            Mood::Energetic => "energetic",
            Mood::Happy => "happy",
            Mood::Sad => "sad",
        }
    }

    /// Position in [`Mood::ALL`]
    pub fn canonical_index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "calm" => Ok(Mood::Calm),
            "energetic" => Ok(Mood::Energetic),
            "happy" => Ok(Mood::Happy),
            "sad" => Ok(Mood::Sad),
            other => Err(format!("unknown mood label '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Calm".parse::<Mood>().unwrap(), Mood::Calm);
        assert_eq!(" SAD ".parse::<Mood>().unwrap(), Mood::Sad);
        assert!("angry".parse::<Mood>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Mood::Energetic).unwrap(), "\"energetic\"");
        let mood: Mood = serde_json::from_str("\"happy\"").unwrap();
        assert_eq!(mood, Mood::Happy);
    }

    #[test]
    fn test_canonical_order() {
        for (i, mood) in Mood::ALL.iter().enumerate() {
            assert_eq!(mood.canonical_index(), i);
        }
    }
}
