//! Meal planner: one plan document per owner and date, edited locally and
//! written back in full after a quiet period.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::feature::{Feature, OpContext, WriteMode};
use crate::error::AppError;
use crate::models::{FoodItem, ItemRef, MealPlan, MealSlot};
use crate::store::{DocPath, Document, DocumentSchema, Query, SchemaError, Snapshot, Write};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub enum MealPlanOp {
    Add { slot: MealSlot, item: FoodItem },
    Remove { slot: MealSlot, item: ItemRef },
}

#[derive(Debug, Clone)]
pub struct MealPlanner {
    debounce: Duration,
}

impl Default for MealPlanner {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl MealPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// `users/<owner>/mealPlans/<YYYY-MM-DD>`
    pub fn plan_path(owner: &str, date: NaiveDate) -> Result<DocPath, AppError> {
        let collection = format!("users/{}/mealPlans", owner);
        Ok(DocPath::new(&collection, &date.format("%Y-%m-%d").to_string())?)
    }
}

impl Feature for MealPlanner {
    type Key = NaiveDate;
    type Buffer = MealPlan;
    type Op = MealPlanOp;

    const NAME: &'static str = "meal_planner";

    fn write_mode(&self) -> WriteMode {
        WriteMode::Debounced(self.debounce)
    }

    fn empty(&self, date: &NaiveDate) -> MealPlan {
        MealPlan::empty(*date)
    }

    fn query(&self, owner: &str, date: &NaiveDate) -> Result<Query, AppError> {
        Ok(Query::document(Self::plan_path(owner, *date)?))
    }

    fn decode(
        &self,
        _owner: &str,
        date: &NaiveDate,
        snapshot: &Snapshot,
    ) -> Result<MealPlan, SchemaError> {
        match snapshot.single() {
            Some(doc) => MealPlan::decode(&doc.path, &doc.data),
            None => Ok(MealPlan::empty(*date)),
        }
    }

    fn default_document(
        &self,
        owner: &str,
        date: &NaiveDate,
    ) -> Result<Option<(DocPath, Document)>, AppError> {
        let mut data = MealPlan::empty(*date).encode();
        data.insert("createdAt".to_string(), Value::String(Utc::now().to_rfc3339()));
        Ok(Some((Self::plan_path(owner, *date)?, data)))
    }

    fn apply(
        &self,
        _ctx: &OpContext<'_, NaiveDate>,
        plan: &mut MealPlan,
        op: MealPlanOp,
    ) -> Result<Vec<Write>, AppError> {
        match op {
            MealPlanOp::Add { slot, mut item } => {
                item.validate()?;
                if item.id.is_empty() {
                    item.id = Uuid::new_v4().to_string();
                }
                plan.add(slot, item);
            }
            MealPlanOp::Remove { slot, item } => {
                plan.remove(slot, &item).ok_or_else(|| {
                    AppError::validation(format!("No item {} in {}", item, slot))
                })?;
            }
        }
        Ok(Vec::new())
    }

    fn flush(
        &self,
        owner: &str,
        date: &NaiveDate,
        plan: &MealPlan,
    ) -> Result<Vec<Write>, AppError> {
        let mut fields = plan.encode();
        fields.insert("updatedAt".to_string(), Value::String(Utc::now().to_rfc3339()));
        Ok(vec![Write::Merge {
            path: Self::plan_path(owner, *date)?,
            fields,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Session;
    use crate::models::Totals;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
    }

    #[test]
    fn test_plan_path() {
        let path = MealPlanner::plan_path("u1", date()).unwrap();
        assert_eq!(path.as_str(), "users/u1/mealPlans/2024-01-05");
        assert!(MealPlanner::plan_path("bad/owner", date()).is_err());
    }

    #[test]
    fn test_apply_edits_buffer_without_writes() {
        let planner = MealPlanner::new();
        let session = Session::authenticated("u1", "a@example.com");
        let ctx = OpContext {
            session: &session,
            key: &date(),
            now: Utc::now(),
        };
        let mut plan = planner.empty(&date());

        let writes = planner
            .apply(
                &ctx,
                &mut plan,
                MealPlanOp::Add {
                    slot: MealSlot::Breakfast,
                    item: FoodItem {
                        id: String::new(),
                        name: "Oatmeal".into(),
                        gi: 55,
                        calories: 150,
                    },
                },
            )
            .unwrap();
        assert!(writes.is_empty());
        assert!(!plan.items(MealSlot::Breakfast)[0].id.is_empty());

        let err = planner
            .apply(
                &ctx,
                &mut plan,
                MealPlanOp::Remove {
                    slot: MealSlot::Dinner,
                    item: ItemRef::Index(0),
                },
            )
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed(_)));
        assert_eq!(plan.grand_totals(), Totals { gi: 55, calories: 150 });
    }

    #[test]
    fn test_flush_merges_every_slot() {
        let planner = MealPlanner::new();
        let mut plan = MealPlan::empty(date());
        plan.add(MealSlot::Lunch, FoodItem::new("Brown Rice", 50, 215));

        let writes = planner.flush("u1", &date(), &plan).unwrap();
        match &writes[..] {
            [Write::Merge { path, fields }] => {
                assert_eq!(path.as_str(), "users/u1/mealPlans/2024-01-05");
                for slot in MealSlot::ALL {
                    assert!(fields.contains_key(slot.label()));
                }
                assert!(fields.contains_key("updatedAt"));
                assert_eq!(fields["Lunch"][0]["name"], "Brown Rice");
            }
            other => panic!("unexpected writes {:?}", other),
        }
    }

    #[test]
    fn test_default_document_decodes_as_empty_plan() {
        let planner = MealPlanner::new();
        let (path, data) = planner.default_document("u1", &date()).unwrap().unwrap();
        let plan = MealPlan::decode(&path, &data).unwrap();
        assert!(plan.is_empty());
        assert!(data.contains_key("createdAt"));
    }
}
