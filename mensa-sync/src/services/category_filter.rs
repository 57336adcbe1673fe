//! Category allow-list
//!
//! Only dishes of the configured categories are synced. Others are dropped
//! without being reported.

use crate::models::MenuItem;

/// Case-insensitive, whitespace-tolerant category allow-list
#[derive(Debug, Clone)]
pub struct CategoryFilter {
    allowed: Vec<String>,
}

fn normalize(category: &str) -> String {
    category.trim().to_lowercase()
}

impl CategoryFilter {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|c| normalize(c.as_ref()))
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    pub fn allows(&self, category: Option<&str>) -> bool {
        category
            .map(normalize)
            .is_some_and(|c| self.allowed.contains(&c))
    }

    /// Keep only items whose category is allowed
    pub fn retain(&self, items: Vec<MenuItem>) -> Vec<MenuItem> {
        items
            .into_iter()
            .filter(|item| {
                let keep = self.allows(item.category.as_deref());
                if !keep {
                    tracing::trace!(category = ?item.category, "Dropping item outside allow-list");
                }
                keep
            })
            .collect()
    }
}
