//! Function categories derived from the naming convention.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The role a pipeline function plays, classified from its name prefix.
///
/// Every category except [`Category::Other`] takes part in automatic call
/// scanning. `Other` functions only enter a dependency set when monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Download,
    Read,
    Correct,
    Convert,
    Calc,
    Tool,
    Other,
}

impl Category {
    /// Categories with a recognised prefix, in classification order.
    pub const SCANNED: [Category; 6] = [
        Category::Download,
        Category::Read,
        Category::Correct,
        Category::Convert,
        Category::Calc,
        Category::Tool,
    ];

    /// Name prefix for this category. `Other` has none.
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            Category::Download => Some("download"),
            Category::Read => Some("read"),
            Category::Correct => Some("correct"),
            Category::Convert => Some("convert"),
            Category::Calc => Some("calc"),
            Category::Tool => Some("tool"),
            Category::Other => None,
        }
    }

    /// Classifies an unqualified identifier by its prefix.
    ///
    /// Returns `None` when no prefix matches; the caller decides whether that
    /// is an error or an explicit `other` registration.
    pub fn classify(identifier: &str) -> Option<Category> {
        Self::SCANNED.into_iter().find(|category| {
            category
                .prefix()
                .is_some_and(|prefix| identifier.starts_with(prefix))
        })
    }

    /// Whether an unqualified identifier reads as a pipeline function name:
    /// a category prefix followed by an uppercase letter, as in `readData`.
    /// Library helpers such as `read.csv` do not.
    pub fn follows_convention(identifier: &str) -> bool {
        Self::classify(identifier).is_some_and(|category| {
            category.prefix().is_some_and(|prefix| {
                identifier[prefix.len()..]
                    .starts_with(|c: char| c.is_ascii_uppercase())
            })
        })
    }

    /// Returns `true` if calls to functions of this category are discovered
    /// by source scanning.
    pub fn is_scanned(self) -> bool {
        self != Category::Other
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().unwrap_or("other"))
    }
}
