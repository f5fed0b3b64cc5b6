use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::food::{FoodItem, Totals};
use super::meal_slot::MealSlot;
use super::ItemRef;
use crate::store::{DocPath, Document, DocumentSchema, SchemaError};

/// Daily calorie budget shown against the plan's grand total.
pub const DAILY_CALORIE_TARGET: u32 = 2000;
/// Daily glycemic load budget shown against the plan's grand total.
pub const DAILY_GI_TARGET: u32 = 100;

/// One day's meal plan: an ordered food list per meal slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MealPlan {
    pub date: NaiveDate,
    meals: BTreeMap<MealSlot, Vec<FoodItem>>,
}

impl MealPlan {
    /// A plan with every slot present and empty.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            meals: MealSlot::ALL.iter().map(|slot| (*slot, Vec::new())).collect(),
        }
    }

    pub fn items(&self, slot: MealSlot) -> &[FoodItem] {
        self.meals.get(&slot).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Appends to the end of the slot's list. Duplicates are allowed.
    pub fn add(&mut self, slot: MealSlot, item: FoodItem) {
        self.meals.entry(slot).or_default().push(item);
    }

    /// Removes one item by id or by position in the current list.
    pub fn remove(&mut self, slot: MealSlot, item: &ItemRef) -> Option<FoodItem> {
        let items = self.meals.get_mut(&slot)?;
        let index = match item {
            ItemRef::Index(index) => Some(*index).filter(|i| *i < items.len()),
            ItemRef::Id(id) => items.iter().position(|i| &i.id == id),
        }?;
        Some(items.remove(index))
    }

    pub fn slot_totals(&self, slot: MealSlot) -> Totals {
        self.items(slot).iter().sum()
    }

    pub fn grand_totals(&self) -> Totals {
        MealSlot::ALL.iter().map(|slot| self.slot_totals(*slot)).sum()
    }

    pub fn summary(&self) -> DailySummary {
        DailySummary {
            totals: self.grand_totals(),
            calorie_target: DAILY_CALORIE_TARGET,
            gi_target: DAILY_GI_TARGET,
        }
    }

    pub fn item_count(&self) -> usize {
        self.meals.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }
}

impl DocumentSchema for MealPlan {
    const KIND: &'static str = "meal plan";

    fn decode(path: &DocPath, data: &Document) -> Result<Self, SchemaError> {
        let date = NaiveDate::parse_from_str(path.id(), "%Y-%m-%d")
            .map_err(|_| SchemaError::new(Self::KIND, path, "document id is not a date"))?;

        let mut meals = BTreeMap::new();
        for slot in MealSlot::ALL {
            let raw = data.get(slot.label()).ok_or_else(|| {
                SchemaError::new(Self::KIND, path, format!("missing meal '{}'", slot))
            })?;
            let mut items: Vec<FoodItem> = serde_json::from_value(raw.clone()).map_err(|e| {
                SchemaError::new(Self::KIND, path, format!("meal '{}': {}", slot, e))
            })?;
            // Items saved before ids existed get a position-derived id, stable
            // until the plan is next written back.
            for (index, item) in items.iter_mut().enumerate() {
                if item.id.is_empty() {
                    item.id = format!("{}-{}", slot.label().replace(' ', "-").to_lowercase(), index);
                }
            }
            meals.insert(slot, items);
        }

        Ok(Self { date, meals })
    }

    fn encode(&self) -> Document {
        MealSlot::ALL
            .iter()
            .map(|slot| {
                let items = serde_json::to_value(self.items(*slot))
                    .unwrap_or_else(|_| Value::Array(Vec::new()));
                (slot.label().to_string(), items)
            })
            .collect()
    }
}

impl fmt::Display for MealPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = format!("Meal plan for {}", self.date);
        writeln!(f, "{}", title)?;
        writeln!(f, "{}", "=".repeat(title.len()))?;

        for slot in MealSlot::ALL {
            let items = self.items(slot);
            writeln!(f, "\n{} ({})", slot, self.slot_totals(slot))?;
            if items.is_empty() {
                writeln!(f, "  (nothing planned)")?;
            }
            for (index, item) in items.iter().enumerate() {
                writeln!(f, "  {}. {}  [{}]", index, item, item.id)?;
            }
        }

        write!(f, "\n{}", self.summary())
    }
}

/// Grand totals compared with the daily targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub totals: Totals,
    pub calorie_target: u32,
    pub gi_target: u32,
}

impl DailySummary {
    /// Negative when the plan is over budget.
    pub fn calories_remaining(&self) -> i64 {
        i64::from(self.calorie_target) - i64::from(self.totals.calories)
    }

    pub fn over_calorie_target(&self) -> bool {
        self.totals.calories > self.calorie_target
    }

    pub fn over_gi_target(&self) -> bool {
        self.totals.gi > self.gi_target
    }
}

impl fmt::Display for DailySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Total: {} / {} kcal, GI {} / {}",
            self.totals.calories, self.calorie_target, self.totals.gi, self.gi_target
        )?;
        if self.over_calorie_target() {
            writeln!(f, "Over the daily calorie target")?;
        }
        if self.over_gi_target() {
            writeln!(f, "Over the daily GI target")?;
        }
        Ok(())
    }
}
