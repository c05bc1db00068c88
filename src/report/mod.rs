//! Result aggregation and terminal reporting.
//!
//! Every command ends in one flat JSON object per sample or batch. Stages
//! contribute their records in pipeline order through [`ResultRecord::merge`];
//! a key that is written twice keeps its first position and takes the later
//! value, and each such collision is reported back to the caller.

use chrono::Local;
use log::warn;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::{FitResult, ParameterSet, SkipRecord};
use crate::error::AppError;

pub mod format;

pub use format::*;

/// A key that a later stage overwrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCollision {
    pub key: String,
    /// The stage whose value won.
    pub stage: String,
}

/// Flat, insertion-ordered result record.
#[derive(Debug, Clone, Default)]
pub struct ResultRecord {
    fields: Map<String, Value>,
    collisions: Vec<KeyCollision>,
}

impl ResultRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one value; returns `true` if it replaced an existing key.
    pub fn insert(&mut self, stage: &str, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        // `Map::insert` on an existing key keeps its slot with `preserve_order`.
        let replaced = self.fields.insert(key.clone(), value).is_some();
        if replaced {
            warn!("result key `{key}` overwritten by {stage}");
            self.collisions.push(KeyCollision {
                key,
                stage: stage.to_string(),
            });
        }
        replaced
    }

    /// Merge every top-level key of a serializable struct or map.
    pub fn merge<T: Serialize + ?Sized>(&mut self, stage: &str, value: &T) -> Result<(), AppError> {
        match serde_json::to_value(value) {
            Ok(Value::Object(map)) => {
                self.merge_map(stage, map);
                Ok(())
            }
            Ok(other) => Err(AppError::new(
                4,
                format!("{stage} produced a non-object record: {other}"),
            )),
            Err(e) => Err(AppError::new(4, format!("Failed to serialize {stage}: {e}"))),
        }
    }

    pub fn merge_map(&mut self, stage: &str, map: Map<String, Value>) {
        for (key, value) in map {
            self.insert(stage, key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn collisions(&self) -> &[KeyCollision] {
        &self.collisions
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl Serialize for ResultRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// Names, guesses and `[lowers, uppers]` of one optimiser call.
pub fn parameter_set_record(label: &str, set: &ParameterSet) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(format!("{label} Variable Names"), Value::from(set.names.clone()));
    map.insert(format!("{label} Initial Guesses"), Value::from(set.guesses.clone()));
    map.insert(
        format!("{label} Bounds"),
        Value::from(vec![set.lowers.clone(), set.uppers.clone()]),
    );
    map
}

/// Optimised values, standard errors and goodness of fit.
pub fn fit_result_record(fit: &FitResult) -> Map<String, Value> {
    let label = fit.component.label();
    let mut map = Map::new();
    map.insert(format!("{label} Results"), Value::from(fit.values.clone()));
    map.insert(format!("{label} Errors"), Value::from(fit.errors.clone()));
    map.insert(format!("{label} Chi Square"), Value::from(fit.chi_square));
    map.insert(
        format!("{label} Reduced Chi Square"),
        Value::from(fit.reduced_chi_square),
    );
    map.insert(format!("{label} Iterations"), Value::from(fit.iterations));
    map
}

/// Processed/skipped bookkeeping of a batch run (`summary.json`).
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    #[serde(rename = "Generated At")]
    pub generated_at: String,
    #[serde(rename = "Processed")]
    pub processed: Vec<String>,
    /// Batches whose output already existed and were left alone.
    #[serde(rename = "Existing")]
    pub existing: Vec<String>,
    #[serde(rename = "Skipped")]
    pub skipped: Vec<SkipRecord>,
}

impl RunSummary {
    pub fn new(processed: Vec<String>, existing: Vec<String>, skipped: Vec<SkipRecord>) -> Self {
        Self {
            generated_at: Local::now().to_rfc3339(),
            processed,
            existing,
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DrudeComponent;
    use serde_json::json;

    #[test]
    fn collision_keeps_position_takes_later_value() {
        let mut record = ResultRecord::new();
        record.merge_map("measurement", json!({"A": 1, "B": 2}).as_object().unwrap().clone());
        record.merge_map("fit", json!({"C": 3, "A": 10}).as_object().unwrap().clone());

        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, ["A", "B", "C"]);
        assert_eq!(record.get("A"), Some(&json!(10)));
        assert_eq!(
            record.collisions(),
            [KeyCollision {
                key: "A".into(),
                stage: "fit".into()
            }]
        );
    }

    #[test]
    fn merge_rejects_non_objects() {
        let mut record = ResultRecord::new();
        let err = record.merge("grid", &vec![1.0, 2.0]).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(record.is_empty());
    }

    #[test]
    fn fit_record_uses_component_label() {
        let fit = FitResult {
            component: DrudeComponent::Imaginary,
            names: vec!["Relaxation Time".into()],
            values: vec![5e-15],
            errors: vec![1e-16],
            chi_square: 2.0,
            reduced_chi_square: 1.0,
            iterations: 7,
        };
        let map = fit_result_record(&fit);
        assert_eq!(map["Imaginary Results"], json!([5e-15]));
        assert_eq!(map["Imaginary Iterations"], json!(7));
    }

    #[test]
    fn bounds_are_lowers_then_uppers() {
        let mut set = ParameterSet::default();
        set.push("Effective Mass", 0.35, 0.1, 1.0);
        set.push("Epsilon Infinity", 3.9, 1.0, 10.0);
        let map = parameter_set_record("Real", &set);
        assert_eq!(map["Real Bounds"], json!([[0.1, 1.0], [1.0, 10.0]]));
    }
}
