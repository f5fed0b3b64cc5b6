//! Sugar tracker: the owner's reading history, with edits to the selected
//! date's document written immediately.

use chrono::NaiveDate;
use serde_json::Value;

use super::feature::{Feature, OpContext, WriteMode};
use crate::error::AppError;
use crate::models::{SugarCategory, SugarLog, SugarReading};
use crate::store::{DocPath, Document, DocumentSchema, Query, SchemaError, Snapshot, Write};

pub const COLLECTION: &str = "sugarReadings";

/// Highest value the form accepts, in mg/dL.
const MAX_READING: f64 = 1000.0;

#[derive(Debug, Clone)]
pub enum SugarOp {
    /// Set or clear one category on the selected date.
    Set {
        category: SugarCategory,
        value: Option<f64>,
    },
    /// Submit several categories at once.
    Record(Vec<(SugarCategory, Option<f64>)>),
}

#[derive(Debug, Clone, Default)]
pub struct SugarTracker;

impl SugarTracker {
    pub fn path(owner: &str, date: NaiveDate) -> Result<DocPath, AppError> {
        Ok(DocPath::new(COLLECTION, &SugarReading::document_id(owner, date))?)
    }
}

fn validate(category: SugarCategory, value: Option<f64>) -> Result<(), AppError> {
    match value {
        Some(v) if !v.is_finite() || v <= 0.0 || v > MAX_READING => Err(AppError::validation(
            format!("{} reading must be between 1 and {}", category, MAX_READING),
        )),
        _ => Ok(()),
    }
}

impl Feature for SugarTracker {
    /// The date being edited.
    type Key = NaiveDate;
    type Buffer = SugarLog;
    type Op = SugarOp;

    const NAME: &'static str = "sugar_tracker";

    fn write_mode(&self) -> WriteMode {
        WriteMode::Immediate
    }

    fn empty(&self, _date: &NaiveDate) -> SugarLog {
        SugarLog::default()
    }

    fn query(&self, owner: &str, _date: &NaiveDate) -> Result<Query, AppError> {
        Ok(Query::where_eq(COLLECTION, "userId", owner))
    }

    fn decode(
        &self,
        _owner: &str,
        _date: &NaiveDate,
        snapshot: &Snapshot,
    ) -> Result<SugarLog, SchemaError> {
        let readings = snapshot
            .documents
            .iter()
            .filter_map(|doc| match SugarReading::decode(&doc.path, &doc.data) {
                Ok(reading) => Some(reading),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping invalid sugar reading");
                    None
                }
            })
            .collect();
        Ok(SugarLog::new(readings))
    }

    fn apply(
        &self,
        ctx: &OpContext<'_, NaiveDate>,
        log: &mut SugarLog,
        op: SugarOp,
    ) -> Result<Vec<Write>, AppError> {
        let date = *ctx.key;
        let values = match op {
            SugarOp::Set { category, value } => vec![(category, value)],
            SugarOp::Record(values) => values,
        };
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let mut reading = log
            .for_date(date)
            .cloned()
            .unwrap_or_else(|| SugarReading::new(ctx.owner(), date));

        let mut fields = Document::new();
        fields.insert("userId".to_string(), Value::String(ctx.owner().to_string()));
        fields.insert(
            "date".to_string(),
            Value::String(date.format("%Y-%m-%d").to_string()),
        );
        for (category, value) in values {
            validate(category, value)?;
            reading.set(category, value);
            fields.insert(category.label().to_string(), value.into());
        }
        log.upsert(reading);

        Ok(vec![Write::Merge {
            path: Self::path(ctx.owner(), date)?,
            fields,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Session;
    use chrono::Utc;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
    }

    fn apply(log: &mut SugarLog, op: SugarOp) -> Result<Vec<Write>, AppError> {
        let session = Session::authenticated("u1", "a@example.com");
        let ctx = OpContext {
            session: &session,
            key: &date(),
            now: Utc::now(),
        };
        SugarTracker.apply(&ctx, log, op)
    }

    #[test]
    fn test_set_merges_one_category() {
        let mut log = SugarLog::default();
        let writes = apply(
            &mut log,
            SugarOp::Set {
                category: SugarCategory::Fasting,
                value: Some(95.0),
            },
        )
        .unwrap();

        assert_eq!(log.for_date(date()).unwrap().fasting, Some(95.0));
        match &writes[..] {
            [Write::Merge { path, fields }] => {
                assert_eq!(path.as_str(), "sugarReadings/u1_2024-01-05");
                assert_eq!(fields["Fasting"], json!(95.0));
                assert_eq!(fields["date"], "2024-01-05");
                assert!(!fields.contains_key("Bedtime"));
            }
            other => panic!("unexpected writes {:?}", other),
        }
    }

    #[test]
    fn test_record_keeps_other_categories() {
        let mut log = SugarLog::default();
        apply(
            &mut log,
            SugarOp::Set {
                category: SugarCategory::Fasting,
                value: Some(95.0),
            },
        )
        .unwrap();
        apply(
            &mut log,
            SugarOp::Record(vec![
                (SugarCategory::AfterMeal, Some(150.0)),
                (SugarCategory::Bedtime, None),
            ]),
        )
        .unwrap();

        let reading = log.for_date(date()).unwrap();
        assert_eq!(reading.fasting, Some(95.0));
        assert_eq!(reading.after_meal, Some(150.0));
        assert_eq!(reading.bedtime, None);
        assert_eq!(log.readings().len(), 1);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut log = SugarLog::default();
        for value in [0.0, -5.0, 5000.0, f64::NAN] {
            let result = apply(
                &mut log,
                SugarOp::Set {
                    category: SugarCategory::Bedtime,
                    value: Some(value),
                },
            );
            assert!(matches!(result, Err(AppError::ValidationFailed(_))));
        }
    }
}
