//! UI-facing save status.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Save indicator rendered by the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    /// Disk matches memory.
    Saved,
    /// Accepted mutations are not on disk yet.
    Unsaved,
    /// A write is in flight.
    Saving,
}

impl SaveStatus {
    /// Label shown in the status bar.
    pub fn label(self) -> &'static str {
        match self {
            Self::Saved => "Saved",
            Self::Unsaved => "Unsaved changes...",
            Self::Saving => "Saving...",
        }
    }
}

impl Display for SaveStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
