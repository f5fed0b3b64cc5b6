//! Medicine reminders: one document per medicine, filtered by owner, with
//! every edit written immediately.

use chrono::NaiveDate;
use serde_json::Value;
use uuid::Uuid;

use super::feature::{Feature, OpContext, WriteMode};
use crate::error::AppError;
use crate::models::{Medicine, MedicineDraft};
use crate::store::{DocPath, DocumentSchema, Query, SchemaError, Snapshot, Write};

pub const COLLECTION: &str = "medicines";

#[derive(Debug, Clone)]
pub enum MedicineOp {
    Add(MedicineDraft),
    Remove { medicine: String },
    MarkTaken { medicine: String, date: NaiveDate },
}

/// The owner's medicines, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MedicineList {
    pub items: Vec<Medicine>,
}

impl MedicineList {
    pub fn find(&self, id: &str) -> Option<&Medicine> {
        self.items.iter().find(|m| m.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Medicines;

impl Medicines {
    pub fn path(id: &str) -> Result<DocPath, AppError> {
        Ok(DocPath::new(COLLECTION, id)?)
    }
}

fn not_found(id: &str) -> AppError {
    AppError::validation(format!("Medicine not found: {}", id))
}

impl Feature for Medicines {
    type Key = ();
    type Buffer = MedicineList;
    type Op = MedicineOp;

    const NAME: &'static str = "medicines";

    fn write_mode(&self) -> WriteMode {
        WriteMode::Immediate
    }

    fn empty(&self, _key: &()) -> MedicineList {
        MedicineList::default()
    }

    fn query(&self, owner: &str, _key: &()) -> Result<Query, AppError> {
        Ok(Query::where_eq(COLLECTION, "userId", owner))
    }

    fn decode(
        &self,
        _owner: &str,
        _key: &(),
        snapshot: &Snapshot,
    ) -> Result<MedicineList, SchemaError> {
        let mut items: Vec<Medicine> = snapshot
            .documents
            .iter()
            .filter_map(|doc| match Medicine::decode(&doc.path, &doc.data) {
                Ok(medicine) => Some(medicine),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping invalid medicine");
                    None
                }
            })
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(MedicineList { items })
    }

    fn apply(
        &self,
        ctx: &OpContext<'_, ()>,
        list: &mut MedicineList,
        op: MedicineOp,
    ) -> Result<Vec<Write>, AppError> {
        match op {
            MedicineOp::Add(draft) => {
                let draft = draft.validate()?;
                let id = Uuid::new_v4().to_string();
                let medicine = draft.into_medicine(id.clone(), ctx.owner(), ctx.now);
                let write = Write::Set {
                    path: Self::path(&id)?,
                    data: medicine.encode(),
                };
                list.items.push(medicine);
                Ok(vec![write])
            }
            MedicineOp::Remove { medicine } => {
                let index = list
                    .items
                    .iter()
                    .position(|m| m.id == medicine)
                    .ok_or_else(|| not_found(&medicine))?;
                list.items.remove(index);
                Ok(vec![Write::Delete {
                    path: Self::path(&medicine)?,
                }])
            }
            MedicineOp::MarkTaken { medicine, date } => {
                let entry = list
                    .items
                    .iter_mut()
                    .find(|m| m.id == medicine)
                    .ok_or_else(|| not_found(&medicine))?;
                if !entry.mark_taken(date) {
                    return Ok(Vec::new());
                }
                Ok(vec![Write::ArrayUnion {
                    path: Self::path(&medicine)?,
                    field: "taken".to_string(),
                    values: vec![Value::String(date.format("%Y-%m-%d").to_string())],
                }])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Session;
    use chrono::Utc;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
    }

    fn apply(list: &mut MedicineList, op: MedicineOp) -> Result<Vec<Write>, AppError> {
        let session = Session::authenticated("u1", "a@example.com");
        let ctx = OpContext {
            session: &session,
            key: &(),
            now: Utc::now(),
        };
        Medicines.apply(&ctx, list, op)
    }

    #[test]
    fn test_add_sets_document_scoped_to_owner() {
        let mut list = MedicineList::default();
        let writes = apply(
            &mut list,
            MedicineOp::Add(MedicineDraft::new("Metformin", "500mg", "08:00")),
        )
        .unwrap();

        assert_eq!(list.items.len(), 1);
        match &writes[..] {
            [Write::Set { path, data }] => {
                assert_eq!(path.collection(), "medicines");
                assert_eq!(path.id(), list.items[0].id);
                assert_eq!(data["userId"], "u1");
                assert_eq!(data["taken"], serde_json::json!([]));
            }
            other => panic!("unexpected writes {:?}", other),
        }
    }

    #[test]
    fn test_add_validates_form() {
        let mut list = MedicineList::default();
        let err = apply(&mut list, MedicineOp::Add(MedicineDraft::new("", "1", "08:00")));
        assert!(matches!(err, Err(AppError::ValidationFailed(_))));
    }

    #[test]
    fn test_mark_taken_twice_is_a_no_op() {
        let mut list = MedicineList::default();
        apply(
            &mut list,
            MedicineOp::Add(MedicineDraft::new("Metformin", "500mg", "08:00")),
        )
        .unwrap();
        let id = list.items[0].id.clone();

        let first = apply(
            &mut list,
            MedicineOp::MarkTaken {
                medicine: id.clone(),
                date: date(),
            },
        )
        .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(list.items[0].taken, vec![date()]);

        let second = apply(
            &mut list,
            MedicineOp::MarkTaken {
                medicine: id,
                date: date(),
            },
        )
        .unwrap();
        assert!(second.is_empty());
        assert_eq!(list.items[0].taken, vec![date()]);
    }

    #[test]
    fn test_remove_unknown_medicine() {
        let mut list = MedicineList::default();
        let err = apply(
            &mut list,
            MedicineOp::Remove {
                medicine: "missing".into(),
            },
        );
        assert!(matches!(err, Err(AppError::ValidationFailed(_))));
    }
}
