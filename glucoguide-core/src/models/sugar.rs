use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::coerce::optional_f64;
use crate::store::{decode_fields, encode_fields, DocPath, Document, DocumentSchema, SchemaError};

/// When in the day a reading was taken. Serialized as the document field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SugarCategory {
    #[serde(rename = "Fasting")]
    Fasting,
    #[serde(rename = "Before Meal")]
    BeforeMeal,
    #[serde(rename = "After Meal")]
    AfterMeal,
    #[serde(rename = "Bedtime")]
    Bedtime,
}

impl SugarCategory {
    pub const ALL: [SugarCategory; 4] = [
        SugarCategory::Fasting,
        SugarCategory::BeforeMeal,
        SugarCategory::AfterMeal,
        SugarCategory::Bedtime,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SugarCategory::Fasting => "Fasting",
            SugarCategory::BeforeMeal => "Before Meal",
            SugarCategory::AfterMeal => "After Meal",
            SugarCategory::Bedtime => "Bedtime",
        }
    }
}

impl fmt::Display for SugarCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SugarCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "fasting" => Ok(SugarCategory::Fasting),
            "beforemeal" => Ok(SugarCategory::BeforeMeal),
            "aftermeal" => Ok(SugarCategory::AfterMeal),
            "bedtime" => Ok(SugarCategory::Bedtime),
            _ => Err(format!(
                "Invalid category '{}'. Valid options: fasting, before-meal, after-meal, bedtime",
                s
            )),
        }
    }
}

/// Classification of a blood sugar value in mg/dL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SugarLevel {
    Low,
    Normal,
    High,
}

impl SugarLevel {
    /// `< 70` is low, `70..130` is normal, `>= 130` is high.
    pub fn classify(value: f64) -> SugarLevel {
        if value < 70.0 {
            SugarLevel::Low
        } else if value < 130.0 {
            SugarLevel::Normal
        } else {
            SugarLevel::High
        }
    }
}

impl fmt::Display for SugarLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SugarLevel::Low => write!(f, "Low"),
            SugarLevel::Normal => write!(f, "Normal"),
            SugarLevel::High => write!(f, "High"),
        }
    }
}

/// All readings for one owner and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SugarReading {
    pub user_id: String,
    pub date: NaiveDate,
    #[serde(rename = "Fasting", default, deserialize_with = "optional_f64")]
    pub fasting: Option<f64>,
    #[serde(rename = "Before Meal", default, deserialize_with = "optional_f64")]
    pub before_meal: Option<f64>,
    #[serde(rename = "After Meal", default, deserialize_with = "optional_f64")]
    pub after_meal: Option<f64>,
    #[serde(rename = "Bedtime", default, deserialize_with = "optional_f64")]
    pub bedtime: Option<f64>,
}

impl SugarReading {
    pub fn new(owner: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            user_id: owner.into(),
            date,
            fasting: None,
            before_meal: None,
            after_meal: None,
            bedtime: None,
        }
    }

    /// Document id: at most one reading document per owner and date.
    pub fn document_id(owner: &str, date: NaiveDate) -> String {
        format!("{}_{}", owner, date.format("%Y-%m-%d"))
    }

    pub fn get(&self, category: SugarCategory) -> Option<f64> {
        match category {
            SugarCategory::Fasting => self.fasting,
            SugarCategory::BeforeMeal => self.before_meal,
            SugarCategory::AfterMeal => self.after_meal,
            SugarCategory::Bedtime => self.bedtime,
        }
    }

    pub fn set(&mut self, category: SugarCategory, value: Option<f64>) {
        let slot = match category {
            SugarCategory::Fasting => &mut self.fasting,
            SugarCategory::BeforeMeal => &mut self.before_meal,
            SugarCategory::AfterMeal => &mut self.after_meal,
            SugarCategory::Bedtime => &mut self.bedtime,
        };
        *slot = value;
    }

    pub fn is_empty(&self) -> bool {
        SugarCategory::ALL.iter().all(|c| self.get(*c).is_none())
    }
}

impl DocumentSchema for SugarReading {
    const KIND: &'static str = "sugar reading";

    fn decode(path: &DocPath, data: &Document) -> Result<Self, SchemaError> {
        decode_fields(Self::KIND, path, data)
    }

    fn encode(&self) -> Document {
        encode_fields(self)
    }
}

impl fmt::Display for SugarReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date)?;
        for category in SugarCategory::ALL {
            match self.get(category) {
                Some(value) => write!(
                    f,
                    "  {}: {} ({})",
                    category,
                    value,
                    SugarLevel::classify(value)
                )?,
                None => write!(f, "  {}: -", category)?,
            }
        }
        Ok(())
    }
}

/// Every reading the owner has recorded, oldest first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SugarLog {
    readings: Vec<SugarReading>,
}

impl SugarLog {
    pub fn new(mut readings: Vec<SugarReading>) -> Self {
        readings.sort_by_key(|r| r.date);
        readings.dedup_by_key(|r| r.date);
        Self { readings }
    }

    pub fn readings(&self) -> &[SugarReading] {
        &self.readings
    }

    pub fn for_date(&self, date: NaiveDate) -> Option<&SugarReading> {
        self.readings.iter().find(|r| r.date == date)
    }

    /// Inserts or replaces the reading for its date.
    pub fn upsert(&mut self, reading: SugarReading) {
        match self.readings.binary_search_by_key(&reading.date, |r| r.date) {
            Ok(index) => self.readings[index] = reading,
            Err(index) => self.readings.insert(index, reading),
        }
    }

    /// Readings in the `days`-long window ending at `until`, inclusive.
    pub fn history(&self, until: NaiveDate, days: u32) -> Vec<&SugarReading> {
        let from = until - Duration::days(i64::from(days.saturating_sub(1)));
        self.readings
            .iter()
            .filter(|r| r.date >= from && r.date <= until)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_classification_boundaries() {
        assert_eq!(SugarLevel::classify(100.0), SugarLevel::Normal);
        assert_eq!(SugarLevel::classify(60.0), SugarLevel::Low);
        assert_eq!(SugarLevel::classify(140.0), SugarLevel::High);
        assert_eq!(SugarLevel::classify(70.0), SugarLevel::Normal);
        assert_eq!(SugarLevel::classify(69.9), SugarLevel::Low);
        assert_eq!(SugarLevel::classify(130.0), SugarLevel::High);
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("before-meal".parse::<SugarCategory>().unwrap(), SugarCategory::BeforeMeal);
        assert_eq!("After Meal".parse::<SugarCategory>().unwrap(), SugarCategory::AfterMeal);
        assert!("lunch".parse::<SugarCategory>().is_err());
    }

    #[test]
    fn test_decode_coerces_blank_and_string_values() {
        let path = DocPath::parse("sugarReadings/u1_2024-01-05").unwrap();
        let data = json!({
            "userId": "u1",
            "date": "2024-01-05",
            "Fasting": "95",
            "Before Meal": "",
            "After Meal": 150
        });
        let reading = SugarReading::decode(&path, data.as_object().unwrap()).unwrap();
        assert_eq!(reading.fasting, Some(95.0));
        assert_eq!(reading.before_meal, None);
        assert_eq!(reading.after_meal, Some(150.0));
        assert_eq!(reading.bedtime, None);
    }

    #[test]
    fn test_encode_uses_category_names() {
        let mut reading = SugarReading::new("u1", date(5));
        reading.set(SugarCategory::BeforeMeal, Some(110.0));
        let doc = reading.encode();
        assert_eq!(doc["Before Meal"], 110.0);
        assert_eq!(doc["userId"], "u1");
        assert_eq!(doc["date"], "2024-01-05");
    }

    #[test]
    fn test_document_id() {
        assert_eq!(SugarReading::document_id("u1", date(5)), "u1_2024-01-05");
    }

    #[test]
    fn test_log_upsert_and_history() {
        let mut log = SugarLog::new(vec![
            SugarReading::new("u1", date(10)),
            SugarReading::new("u1", date(2)),
        ]);
        assert_eq!(log.readings()[0].date, date(2));

        let mut updated = SugarReading::new("u1", date(10));
        updated.set(SugarCategory::Fasting, Some(88.0));
        log.upsert(updated);
        log.upsert(SugarReading::new("u1", date(5)));

        assert_eq!(log.readings().len(), 3);
        assert_eq!(log.for_date(date(10)).unwrap().fasting, Some(88.0));

        let week: Vec<NaiveDate> = log.history(date(10), 7).iter().map(|r| r.date).collect();
        assert_eq!(week, vec![date(5), date(10)]);
    }
}
