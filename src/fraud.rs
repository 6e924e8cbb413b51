//! Flagging of unusual transaction rows with pre-trained anomaly models.
//!
//! Models are trained elsewhere and only evaluated here. A model receives one
//! feature vector per record and answers `1` (normal) or `-1` (anomalous) for
//! each, following the outlier-detector convention.

use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    Error,
    record::{Category, FlowSource, TransactionRecord},
    rounding::round_half_up,
};

/// Number of features passed to a model for each record.
pub const FEATURE_COUNT: usize = 6;

/// The model's answer for one record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// The record looks like the training data.
    Normal,
    /// The record is an outlier.
    Anomalous,
}

impl TryFrom<i8> for Verdict {
    type Error = Error;

    fn try_from(prediction: i8) -> Result<Self, Self::Error> {
        match prediction {
            1 => Ok(Verdict::Normal),
            -1 => Ok(Verdict::Anomalous),
            other => Err(Error::InvalidPrediction(other)),
        }
    }
}

/// A pre-trained anomaly detector.
pub trait AnomalyModel: Send + Sync {
    /// Predict `1` (normal) or `-1` (anomalous) for each row of features.
    fn predict(&self, rows: &[[f64; FEATURE_COUNT]]) -> Result<Vec<i8>, Error>;
}

/// The features of `record` in model input order: count then value for the
/// incoming, outgoing and domestic flows.
pub fn feature_vector(record: &TransactionRecord) -> [f64; FEATURE_COUNT] {
    let mut features = [0.0; FEATURE_COUNT];

    for (i, category) in Category::FLOWS.into_iter().enumerate() {
        let flow = record.flow(category);
        features[2 * i] = flow.count as f64;
        features[2 * i + 1] = flow.value;
    }

    features
}

/// The inclusive range a feature took in the training data.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureRange {
    /// The smallest value considered normal.
    pub min: f64,
    /// The largest value considered normal.
    pub max: f64,
}

impl FeatureRange {
    fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// An envelope model: a row is normal when every feature lies within the
/// range observed in training.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeModel {
    /// The identifier the model is registered under. Defaults to the file stem
    /// when loaded from a directory.
    #[serde(default)]
    pub id: Option<String>,
    /// One range per feature, in [feature_vector] order.
    pub features: [FeatureRange; FEATURE_COUNT],
}

impl AnomalyModel for RangeModel {
    fn predict(&self, rows: &[[f64; FEATURE_COUNT]]) -> Result<Vec<i8>, Error> {
        Ok(rows
            .iter()
            .map(|row| {
                let inside = row
                    .iter()
                    .zip(&self.features)
                    .all(|(&value, range)| range.contains(value));

                if inside { 1 } else { -1 }
            })
            .collect())
    }
}

/// Models by identifier.
#[derive(Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Box<dyn AnomalyModel>>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `model` as `id`, replacing any model already registered under
    /// that identifier.
    pub fn register(&mut self, id: &str, model: Box<dyn AnomalyModel>) {
        if self.models.insert(id.to_owned(), model).is_some() {
            tracing::warn!("replaced the anomaly model \"{id}\"");
        }
    }

    /// Get the model registered as `id`.
    ///
    /// # Errors
    /// Returns [Error::ModelNotFound] if no model has that identifier.
    pub fn get(&self, id: &str) -> Result<&dyn AnomalyModel, Error> {
        self.models
            .get(id)
            .map(|model| model.as_ref())
            .ok_or_else(|| Error::ModelNotFound(id.to_owned()))
    }

    /// The registered identifiers in sorted order.
    pub fn ids(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    /// Load every `*.json` [RangeModel] file in `dir`.
    ///
    /// Each model is registered under its `id` field, or the file stem when
    /// the field is absent. Other files are ignored.
    ///
    /// # Errors
    /// Returns [Error::ModelLoad] if the directory cannot be listed or a model
    /// file cannot be read or parsed.
    pub fn load_dir(dir: &Path) -> Result<Self, Error> {
        let mut registry = Self::new();

        let entries = fs::read_dir(dir)
            .map_err(|error| Error::ModelLoad(format!("{}: {error}", dir.display())))?;

        for entry in entries {
            let path = entry
                .map_err(|error| Error::ModelLoad(format!("{}: {error}", dir.display())))?
                .path();

            if path.extension().and_then(|extension| extension.to_str()) != Some("json") {
                continue;
            }

            let text = fs::read_to_string(&path)
                .map_err(|error| Error::ModelLoad(format!("{}: {error}", path.display())))?;
            let model: RangeModel = serde_json::from_str(&text)
                .map_err(|error| Error::ModelLoad(format!("{}: {error}", path.display())))?;

            let id = match (&model.id, path.file_stem().and_then(|stem| stem.to_str())) {
                (Some(id), _) => id.clone(),
                (None, Some(stem)) => stem.to_owned(),
                (None, None) => {
                    return Err(Error::ModelLoad(format!(
                        "{}: model has no id and no usable file name",
                        path.display()
                    )));
                }
            };

            tracing::debug!("loaded anomaly model \"{id}\" from {}", path.display());
            registry.register(&id, Box::new(model));
        }

        tracing::info!("loaded {} anomaly models", registry.models.len());

        Ok(registry)
    }
}

/// A record with the verdict of a model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlaggedTransaction {
    /// The evaluated record.
    pub record: TransactionRecord,
    /// The model's verdict.
    pub verdict: Verdict,
}

/// Run the model registered as `model_id` over `records`.
///
/// # Errors
/// Returns [Error::ModelNotFound] for an unknown model,
/// [Error::PredictionLengthMismatch] if the model does not return exactly one
/// prediction per record, and [Error::InvalidPrediction] for a prediction
/// other than `1` or `-1`.
pub fn flag_transactions(
    records: &[TransactionRecord],
    model_id: &str,
    registry: &ModelRegistry,
) -> Result<Vec<FlaggedTransaction>, Error> {
    let model = registry.get(model_id)?;
    let features: Vec<_> = records.iter().map(feature_vector).collect();
    let predictions = model.predict(&features)?;

    if predictions.len() != records.len() {
        return Err(Error::PredictionLengthMismatch {
            expected: records.len(),
            got: predictions.len(),
        });
    }

    records
        .iter()
        .zip(predictions)
        .map(|(record, prediction)| {
            Ok(FlaggedTransaction {
                record: record.clone(),
                verdict: Verdict::try_from(prediction)?,
            })
        })
        .collect()
}

/// Counts of a flagging run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FraudSummary {
    /// Number of evaluated records.
    pub total: usize,
    /// Number of records flagged as anomalous.
    pub anomalous: usize,
    /// Anomalous records as a percentage of all records, rounded half-up to
    /// two decimals. `None` when no records were evaluated.
    pub anomalous_share: Option<f64>,
}

impl FraudSummary {
    /// Summarise the verdicts in `flagged`.
    pub fn summarize(flagged: &[FlaggedTransaction]) -> Self {
        let total = flagged.len();
        let anomalous = flagged
            .iter()
            .filter(|transaction| transaction.verdict == Verdict::Anomalous)
            .count();
        let anomalous_share =
            (total > 0).then(|| round_half_up(anomalous as f64 / total as f64 * 100.0, 2));

        Self {
            total,
            anomalous,
            anomalous_share,
        }
    }
}

#[cfg(test)]
mod model_tests {
    use crate::{
        Error,
        fraud::{
            AnomalyModel, FEATURE_COUNT, FeatureRange, FraudSummary, ModelRegistry, RangeModel,
            Verdict, feature_vector, flag_transactions,
        },
        period::PeriodKey,
        record::{Flow, TransactionRecord},
    };

    struct FixedModel(Vec<i8>);

    impl AnomalyModel for FixedModel {
        fn predict(&self, _rows: &[[f64; FEATURE_COUNT]]) -> Result<Vec<i8>, Error> {
            Ok(self.0.clone())
        }
    }

    fn record(incoming_value: f64) -> TransactionRecord {
        TransactionRecord {
            provider_code: "001".to_owned(),
            provider_name: "Bank Satu".to_owned(),
            period: PeriodKey::month(2024, 2).unwrap(),
            incoming: Flow::new(1, incoming_value),
            outgoing: Flow::new(2, 20.0),
            domestic: Flow::new(3, 30.0),
        }
    }

    fn range_model() -> RangeModel {
        RangeModel {
            id: None,
            features: [FeatureRange {
                min: 0.0,
                max: 100.0,
            }; FEATURE_COUNT],
        }
    }

    #[test]
    fn features_follow_flow_order() {
        assert_eq!(
            feature_vector(&record(10.0)),
            [1.0, 10.0, 2.0, 20.0, 3.0, 30.0]
        );
    }

    #[test]
    fn range_model_flags_values_outside_the_envelope() {
        let mut registry = ModelRegistry::new();
        registry.register("range", Box::new(range_model()));

        let flagged =
            flag_transactions(&[record(50.0), record(500.0)], "range", &registry).unwrap();

        assert_eq!(flagged[0].verdict, Verdict::Normal);
        assert_eq!(flagged[1].verdict, Verdict::Anomalous);
    }

    #[test]
    fn unknown_model_is_an_error() {
        let registry = ModelRegistry::new();

        let result = flag_transactions(&[record(1.0)], "missing", &registry);

        assert_eq!(result, Err(Error::ModelNotFound("missing".to_owned())));
    }

    #[test]
    fn prediction_outside_plus_minus_one_is_an_error() {
        let mut registry = ModelRegistry::new();
        registry.register("bad", Box::new(FixedModel(vec![0])));

        let result = flag_transactions(&[record(1.0)], "bad", &registry);

        assert_eq!(result, Err(Error::InvalidPrediction(0)));
    }

    #[test]
    fn wrong_number_of_predictions_is_an_error() {
        let mut registry = ModelRegistry::new();
        registry.register("short", Box::new(FixedModel(vec![1])));

        let result = flag_transactions(&[record(1.0), record(2.0)], "short", &registry);

        assert_eq!(
            result,
            Err(Error::PredictionLengthMismatch {
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn summary_counts_anomalies() {
        let mut registry = ModelRegistry::new();
        registry.register("fixed", Box::new(FixedModel(vec![1, -1, 1])));
        let flagged = flag_transactions(
            &[record(1.0), record(2.0), record(3.0)],
            "fixed",
            &registry,
        )
        .unwrap();

        let summary = FraudSummary::summarize(&flagged);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.anomalous, 1);
        assert_eq!(summary.anomalous_share, Some(33.33));
    }

    #[test]
    fn empty_summary_has_no_share() {
        assert_eq!(FraudSummary::summarize(&[]).anomalous_share, None);
    }
}
