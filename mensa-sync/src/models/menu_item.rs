//! Menu feed entries
//!
//! One element of the JSON array returned by the menu feed. Every field is
//! optional on the wire; validation happens in the upsert engine.

use serde::{Deserialize, Serialize};

/// One dish as reported by the menu feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Ingredient and allergen notes
    #[serde(default)]
    pub notes: Vec<String>,
    /// Serving date, `YYYY-MM-DD`
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub prices: Prices,
}

/// Price table of a feed entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prices {
    #[serde(default, alias = "students")]
    pub student: Option<f64>,
    #[serde(default, alias = "employees")]
    pub employee: Option<f64>,
    #[serde(default, alias = "pupils")]
    pub pupil: Option<f64>,
    #[serde(default, alias = "others")]
    pub other: Option<f64>,
}

impl MenuItem {
    /// Name trimmed, `None` when missing or blank
    pub fn trimmed_name(&self) -> Option<&str> {
        non_blank(self.name.as_deref())
    }

    /// Date trimmed, `None` when missing or blank
    pub fn trimmed_date(&self) -> Option<&str> {
        non_blank(self.date.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
