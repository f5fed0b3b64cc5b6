use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the five named meal lists in a day's plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MealSlot {
    #[serde(rename = "Breakfast")]
    Breakfast,
    #[serde(rename = "Morning Snack")]
    MorningSnack,
    #[serde(rename = "Lunch")]
    Lunch,
    #[serde(rename = "Afternoon Snack")]
    AfternoonSnack,
    #[serde(rename = "Dinner")]
    Dinner,
}

impl MealSlot {
    /// All slots in the order they appear during the day.
    pub const ALL: [MealSlot; 5] = [
        MealSlot::Breakfast,
        MealSlot::MorningSnack,
        MealSlot::Lunch,
        MealSlot::AfternoonSnack,
        MealSlot::Dinner,
    ];

    /// The document key for this slot.
    pub fn label(&self) -> &'static str {
        match self {
            MealSlot::Breakfast => "Breakfast",
            MealSlot::MorningSnack => "Morning Snack",
            MealSlot::Lunch => "Lunch",
            MealSlot::AfternoonSnack => "Afternoon Snack",
            MealSlot::Dinner => "Dinner",
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MealSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "breakfast" => Ok(MealSlot::Breakfast),
            "morningsnack" => Ok(MealSlot::MorningSnack),
            "lunch" => Ok(MealSlot::Lunch),
            "afternoonsnack" => Ok(MealSlot::AfternoonSnack),
            "dinner" => Ok(MealSlot::Dinner),
            _ => Err(format!(
                "Invalid meal '{}'. Valid options: breakfast, morning-snack, lunch, afternoon-snack, dinner",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meal_slot_display() {
        assert_eq!(format!("{}", MealSlot::Breakfast), "Breakfast");
        assert_eq!(format!("{}", MealSlot::MorningSnack), "Morning Snack");
        assert_eq!(format!("{}", MealSlot::AfternoonSnack), "Afternoon Snack");
    }

    #[test]
    fn test_meal_slot_from_str() {
        assert_eq!(MealSlot::from_str("breakfast").unwrap(), MealSlot::Breakfast);
        assert_eq!(
            MealSlot::from_str("Morning Snack").unwrap(),
            MealSlot::MorningSnack
        );
        assert_eq!(
            MealSlot::from_str("afternoon-snack").unwrap(),
            MealSlot::AfternoonSnack
        );
        assert_eq!(MealSlot::from_str("DINNER").unwrap(), MealSlot::Dinner);
    }

    #[test]
    fn test_meal_slot_from_str_invalid() {
        assert!(MealSlot::from_str("brunch").is_err());
        assert!(MealSlot::from_str("").is_err());
    }

    #[test]
    fn test_meal_slot_serializes_as_document_key() {
        let json = serde_json::to_string(&MealSlot::MorningSnack).unwrap();
        assert_eq!(json, "\"Morning Snack\"");
    }

    #[test]
    fn test_all_is_in_day_order() {
        let mut sorted = MealSlot::ALL;
        sorted.sort();
        assert_eq!(sorted, MealSlot::ALL);
    }
}
