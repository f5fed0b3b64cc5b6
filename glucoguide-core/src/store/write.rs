use serde_json::Value;

use super::{Document, StoreError, Write};

/// Applies one write to the current state of its document.
///
/// Returns the new document body, or `None` when the document no longer
/// exists. Shared by every store implementation so they agree on semantics.
pub fn apply_write(current: Option<Document>, write: &Write) -> Result<Option<Document>, StoreError> {
    match write {
        Write::Set { data, .. } => Ok(Some(data.clone())),
        Write::Create { data, .. } => Ok(Some(current.unwrap_or_else(|| data.clone()))),
        Write::Merge { fields, .. } => {
            let mut doc = current.unwrap_or_default();
            for (key, value) in fields {
                doc.insert(key.clone(), value.clone());
            }
            Ok(Some(doc))
        }
        Write::ArrayUnion {
            path,
            field,
            values,
        } => {
            let mut doc = current.ok_or_else(|| StoreError::NotFound(path.clone()))?;
            let array = array_field(&mut doc, path, field)?;
            for value in values {
                if !array.contains(value) {
                    array.push(value.clone());
                }
            }
            Ok(Some(doc))
        }
        Write::ArrayRemove {
            path,
            field,
            values,
        } => {
            let mut doc = current.ok_or_else(|| StoreError::NotFound(path.clone()))?;
            let array = array_field(&mut doc, path, field)?;
            array.retain(|v| !values.contains(v));
            Ok(Some(doc))
        }
        Write::Delete { .. } => Ok(None),
    }
}

fn array_field<'a>(
    doc: &'a mut Document,
    path: &super::DocPath,
    field: &str,
) -> Result<&'a mut Vec<Value>, StoreError> {
    let entry = doc
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    match entry {
        Value::Array(array) => Ok(array),
        _ => Err(StoreError::FailedPrecondition {
            path: path.clone(),
            message: format!("field '{}' is not an array", field),
        }),
    }
}
