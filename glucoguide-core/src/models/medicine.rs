use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;
use crate::store::{decode_fields, encode_fields, DocPath, Document, DocumentSchema, SchemaError};

/// A medicine reminder with its adherence record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    /// Document id, not stored in the body.
    #[serde(skip)]
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub dose: String,
    /// Reminder time, `HH:MM`.
    pub time: String,
    /// Dates the medicine was taken, in the order they were marked.
    #[serde(default)]
    pub taken: Vec<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Medicine {
    /// Records `date` as taken. Returns false if it already was.
    pub fn mark_taken(&mut self, date: NaiveDate) -> bool {
        if self.is_taken(date) {
            return false;
        }
        self.taken.push(date);
        true
    }

    pub fn is_taken(&self, date: NaiveDate) -> bool {
        self.taken.contains(&date)
    }

    /// Taken/missed status for `days` consecutive dates starting at `from`.
    pub fn calendar(&self, from: NaiveDate, days: u32) -> Vec<CalendarDay> {
        (0..i64::from(days))
            .map(|offset| {
                let date = from + Duration::days(offset);
                CalendarDay {
                    date,
                    taken: self.is_taken(date),
                }
            })
            .collect()
    }

    /// Percentage of days in the calendar window that were taken.
    pub fn adherence(&self, from: NaiveDate, days: u32) -> u8 {
        if days == 0 {
            return 0;
        }
        let taken = self.calendar(from, days).iter().filter(|d| d.taken).count() as u32;
        ((taken * 100) / days) as u8
    }
}

impl DocumentSchema for Medicine {
    const KIND: &'static str = "medicine";

    fn decode(path: &DocPath, data: &Document) -> Result<Self, SchemaError> {
        let mut medicine: Medicine = decode_fields(Self::KIND, path, data)?;
        medicine.id = path.id().to_string();
        Ok(medicine)
    }

    fn encode(&self) -> Document {
        encode_fields(self)
    }
}

impl fmt::Display for Medicine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} at {}", self.name, self.dose, self.time)
    }
}

/// One cell of the adherence calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub taken: bool,
}

/// The custom medicine form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicineDraft {
    pub name: String,
    pub dose: String,
    pub time: String,
}

impl MedicineDraft {
    pub fn new(name: impl Into<String>, dose: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dose: dose.into(),
            time: time.into(),
        }
    }

    /// Checks required fields and normalises the time to `HH:MM`.
    pub fn validate(&self) -> Result<MedicineDraft, AppError> {
        let name = self.name.trim();
        let dose = self.dose.trim();
        let time = self.time.trim();
        if name.is_empty() {
            return Err(AppError::validation("Medicine name is required"));
        }
        if dose.is_empty() {
            return Err(AppError::validation("Dose is required"));
        }
        if time.is_empty() {
            return Err(AppError::validation("Time is required"));
        }
        let parsed = NaiveTime::parse_from_str(time, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(time, "%I:%M %p"))
            .map_err(|_| AppError::validation("Time must be HH:MM or hh:mm AM/PM"))?;

        Ok(MedicineDraft::new(name, dose, parsed.format("%H:%M").to_string()))
    }

    /// Builds the stored medicine for `owner` with document id `id`.
    pub fn into_medicine(self, id: impl Into<String>, owner: &str, now: DateTime<Utc>) -> Medicine {
        Medicine {
            id: id.into(),
            user_id: owner.to_string(),
            name: self.name,
            dose: self.dose,
            time: self.time,
            taken: Vec::new(),
            created_at: Some(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn medicine() -> Medicine {
        MedicineDraft::new("Metformin", "500mg", "08:00").into_medicine("m1", "u1", Utc::now())
    }

    #[test]
    fn test_mark_taken_is_idempotent() {
        let mut medicine = medicine();
        assert!(medicine.mark_taken(date(5)));
        assert_eq!(medicine.taken, vec![date(5)]);
        assert!(!medicine.mark_taken(date(5)));
        assert_eq!(medicine.taken, vec![date(5)]);
    }

    #[test]
    fn test_calendar_and_adherence() {
        let mut medicine = medicine();
        medicine.mark_taken(date(2));
        medicine.mark_taken(date(4));

        let calendar = medicine.calendar(date(1), 30);
        assert_eq!(calendar.len(), 30);
        assert_eq!(calendar[0], CalendarDay { date: date(1), taken: false });
        assert!(calendar[1].taken);
        assert!(calendar[3].taken);
        assert_eq!(calendar[29].date, date(30));

        assert_eq!(medicine.adherence(date(1), 4), 50);
        assert_eq!(medicine.adherence(date(1), 0), 0);
    }

    #[test]
    fn test_draft_validation() {
        assert!(MedicineDraft::new("", "1", "08:00").validate().is_err());
        assert!(MedicineDraft::new("A", " ", "08:00").validate().is_err());
        assert!(MedicineDraft::new("A", "1", "").validate().is_err());
        assert!(MedicineDraft::new("A", "1", "8am").validate().is_err());

        let draft = MedicineDraft::new(" Insulin ", "10 units", " 07:05 ").validate().unwrap();
        assert_eq!(draft.name, "Insulin");
        assert_eq!(draft.time, "07:05");
    }

    #[test]
    fn test_draft_accepts_twelve_hour_time() {
        let morning = MedicineDraft::new("Metformin", "500mg", "08:00 AM").validate().unwrap();
        assert_eq!(morning.time, "08:00");

        let evening = MedicineDraft::new("Metformin", "500mg", "9:30 PM").validate().unwrap();
        assert_eq!(evening.time, "21:30");

        assert!(MedicineDraft::new("A", "1", "13:00 PM").validate().is_err());
    }

    #[test]
    fn test_decode_takes_id_from_path() {
        let path = DocPath::parse("medicines/abc").unwrap();
        let data = json!({
            "userId": "u1",
            "name": "Insulin",
            "dose": "10 units",
            "time": "08:00",
            "taken": ["2024-01-05"]
        });
        let medicine = Medicine::decode(&path, data.as_object().unwrap()).unwrap();
        assert_eq!(medicine.id, "abc");
        assert_eq!(medicine.taken, vec![date(5)]);
        assert!(!medicine.encode().contains_key("id"));
    }

    #[test]
    fn test_decode_rejects_missing_dose() {
        let path = DocPath::parse("medicines/abc").unwrap();
        let data = json!({"userId": "u1", "name": "Insulin", "time": "08:00"});
        assert!(Medicine::decode(&path, data.as_object().unwrap()).is_err());
    }
}
