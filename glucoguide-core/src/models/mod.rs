mod blog;
pub(crate) mod coerce;
mod food;
mod forum;
mod meal_plan;
mod meal_slot;
mod medicine;
mod profile;
mod sugar;

pub use blog::{slugify, BlogDraft, BlogPost};
pub use food::{FoodItem, Totals};
pub use forum::{ForumBoard, ForumPost, Reply};
pub use meal_plan::{DailySummary, MealPlan, DAILY_CALORIE_TARGET, DAILY_GI_TARGET};
pub use meal_slot::MealSlot;
pub use medicine::{CalendarDay, Medicine, MedicineDraft};
pub use profile::{ProfileUpdate, UserProfile};
pub use sugar::{SugarCategory, SugarLevel, SugarLog, SugarReading};

use std::fmt;
use std::str::FromStr;

/// Identifies one item in a list, either by stable id or by position.
///
/// Positions are only meaningful against the list as currently held; a second
/// removal by index issued before the first is reflected may hit the wrong item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemRef {
    Id(String),
    Index(usize),
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemRef::Id(id) => write!(f, "{}", id),
            ItemRef::Index(index) => write!(f, "#{}", index),
        }
    }
}

impl FromStr for ItemRef {
    type Err = String;

    /// Plain digits are a position, anything else an id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Item reference cannot be empty".to_string());
        }
        Ok(match s.parse::<usize>() {
            Ok(index) => ItemRef::Index(index),
            Err(_) => ItemRef::Id(s.to_string()),
        })
    }
}
