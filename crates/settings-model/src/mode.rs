use std::fmt;

use serde::{Deserialize, Serialize};

/// How an imported category record is combined with the live one.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Overlay candidate fields onto the live record.
    #[default]
    Merge,
    /// Take the candidate record, padding missing fields with declared defaults.
    Replace,
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MergeMode::Merge => "merge",
            MergeMode::Replace => "replace",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for MergeMode {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "merge" => Ok(MergeMode::Merge),
            "replace" => Ok(MergeMode::Replace),
            _ => Err(()),
        }
    }
}
