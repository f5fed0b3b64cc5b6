use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use uuid::Uuid;

use super::coerce::u32_from_number_or_string;
use crate::error::AppError;

/// One food entry in a meal list.
///
/// `id` is empty on documents written before items carried ids; the meal plan
/// decoder fills those in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodItem {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "u32_from_number_or_string")]
    pub gi: u32,
    #[serde(deserialize_with = "u32_from_number_or_string")]
    pub calories: u32,
}

impl FoodItem {
    /// Creates an item with a fresh id.
    pub fn new(name: impl Into<String>, gi: u32, calories: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            gi,
            calories,
        }
    }

    /// Rejects items the form would not accept.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Food name is required"));
        }
        Ok(())
    }

    /// The quick-pick list offered next to the custom food form.
    pub fn catalogue() -> Vec<FoodItem> {
        [
            ("Oatmeal", 55, 150),
            ("Boiled Egg", 0, 78),
            ("Apple", 38, 95),
            ("Grilled Chicken", 0, 165),
            ("Brown Rice", 50, 215),
        ]
        .into_iter()
        .map(|(name, gi, calories)| FoodItem::new(name, gi, calories))
        .collect()
    }

    /// Looks up a catalogue entry by name, case-insensitively.
    pub fn from_catalogue(name: &str) -> Option<FoodItem> {
        Self::catalogue()
            .into_iter()
            .find(|item| item.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn totals(&self) -> Totals {
        Totals {
            gi: self.gi,
            calories: self.calories,
        }
    }
}

impl fmt::Display for FoodItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (GI {}, {} kcal)", self.name, self.gi, self.calories)
    }
}

/// Summed GI and calories. Derived on demand, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub gi: u32,
    pub calories: u32,
}

impl Add for Totals {
    type Output = Totals;

    fn add(self, other: Totals) -> Totals {
        Totals {
            gi: self.gi.saturating_add(other.gi),
            calories: self.calories.saturating_add(other.calories),
        }
    }
}

impl Sum for Totals {
    fn sum<I: Iterator<Item = Totals>>(iter: I) -> Totals {
        iter.fold(Totals::default(), Add::add)
    }
}

impl<'a> Sum<&'a FoodItem> for Totals {
    fn sum<I: Iterator<Item = &'a FoodItem>>(iter: I) -> Totals {
        iter.map(FoodItem::totals).sum()
    }
}

impl fmt::Display for Totals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GI {}, {} kcal", self.gi, self.calories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catalogue_values() {
        let catalogue = FoodItem::catalogue();
        assert_eq!(catalogue.len(), 5);
        let oatmeal = &catalogue[0];
        assert_eq!((oatmeal.name.as_str(), oatmeal.gi, oatmeal.calories), ("Oatmeal", 55, 150));
        assert!(catalogue.iter().all(|item| !item.id.is_empty()));
    }

    #[test]
    fn test_from_catalogue() {
        let apple = FoodItem::from_catalogue("apple").unwrap();
        assert_eq!(apple.gi, 38);
        assert_eq!(apple.calories, 95);
        assert!(FoodItem::from_catalogue("pizza").is_none());
    }

    #[test]
    fn test_decode_legacy_item_with_string_numbers() {
        let item: FoodItem =
            serde_json::from_value(json!({"name": "Apple", "gi": "38", "calories": "95"})).unwrap();
        assert_eq!(item.id, "");
        assert_eq!(item.gi, 38);
        assert_eq!(item.calories, 95);
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        assert!(serde_json::from_value::<FoodItem>(json!({"name": "Apple", "gi": 38})).is_err());
    }

    #[test]
    fn test_totals_sum() {
        let items = vec![FoodItem::new("Oatmeal", 55, 150), FoodItem::new("Apple", 38, 95)];
        let totals: Totals = items.iter().sum();
        assert_eq!(totals, Totals { gi: 93, calories: 245 });
    }

    #[test]
    fn test_validate_requires_name() {
        assert!(FoodItem::new("  ", 1, 1).validate().is_err());
        assert!(FoodItem::new("Rice", 1, 1).validate().is_ok());
    }
}
