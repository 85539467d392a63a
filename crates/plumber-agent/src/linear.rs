//! Linear value-function approximation over named features.
//!
//! A [`LinearQ`] estimates `Q(s, a)` as the dot product of a [`WeightVector`] with the
//! [`Features`] a [`FeatureExtractor`] produces for `(s, a)`. Every vector involved is
//! laid out in the order of one [`FeatureSchema`]; weights are created against a
//! schema and never resized afterwards.
//!
//! # Extractors
//!
//! - [`InfoFeatures`] reads the ten game-info fields and ignores the action. All
//!   actions therefore share one estimate, and greedy selection degenerates into a fair
//!   random draw among them.
//! - [`ActionConditioned`] wraps another extractor and moves its features into the
//!   block owned by the chosen action, giving each action its own weights.
//!
//! # Update
//!
//! ```text
//! diff = reward + discount * max_a' Q(s', a') - Q(s, a)
//! w[f] += learning_rate * diff * x[f]     for every feature f of (s, a)
//! ```

use std::collections::BTreeMap;

use plumber_env::{Action, ActionSpace, GameInfo};
use serde::{Deserialize, Serialize};

use crate::{
    ConfigError,
    update::{LearningParams, TdUpdate, Transition},
    value::ValueFunction,
};

/// Ordered, duplicate-free feature names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new<I, N>(names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect::<Vec<String>>();
        if names.is_empty() {
            return Err(ConfigError::SchemaMismatch("schema has no features".into()));
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(ConfigError::SchemaMismatch(format!(
                    "duplicate feature `{name}`"
                )));
            }
        }
        Ok(Self { names })
    }

    #[must_use]
    #[expect(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Feature values in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct Features(Vec<f64>);

impl Features {
    #[must_use]
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Anything laid out against a fixed [`FeatureSchema`].
pub trait FeatureSet {
    fn schema(&self) -> &FeatureSchema;
}

/// Computes the features of a `(state, action)` pair.
///
/// The returned vector must have exactly `schema().len()` entries.
pub trait FeatureExtractor<S>: FeatureSet
where
    S: ?Sized,
{
    fn features(&self, state: &S, action: Action) -> Features;
}

/// One weight per schema feature.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightVector {
    schema: FeatureSchema,
    weights: Vec<f64>,
}

impl WeightVector {
    #[must_use]
    pub fn zeros(schema: &FeatureSchema) -> Self {
        Self {
            schema: schema.clone(),
            weights: vec![0.0; schema.len()],
        }
    }

    /// Builds weights from a name/value map that must name exactly the schema's
    /// features.
    pub fn from_map(
        schema: &FeatureSchema,
        map: &BTreeMap<String, f64>,
    ) -> Result<Self, ConfigError> {
        if let Some(unknown) = map.keys().find(|name| schema.index_of(name).is_none()) {
            return Err(ConfigError::SchemaMismatch(format!(
                "unknown feature `{unknown}`"
            )));
        }
        let weights = schema
            .names()
            .iter()
            .map(|name| {
                map.get(name).copied().ok_or_else(|| {
                    ConfigError::SchemaMismatch(format!("missing weight for `{name}`"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            schema: schema.clone(),
            weights,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.weights
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.schema.index_of(name).map(|i| self.weights[i])
    }

    #[must_use]
    pub fn dot(&self, features: &Features) -> f64 {
        debug_assert_eq!(features.len(), self.weights.len());
        self.weights
            .iter()
            .zip(features.values())
            .map(|(w, x)| w * x)
            .sum()
    }

    /// `w[f] += step * x[f]` for every feature.
    pub fn add_scaled(&mut self, features: &Features, step: f64) {
        debug_assert_eq!(features.len(), self.weights.len());
        for (w, x) in self.weights.iter_mut().zip(features.values()) {
            *w += step * x;
        }
    }

    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.schema
            .names()
            .iter()
            .cloned()
            .zip(self.weights.iter().copied())
            .collect()
    }
}

/// How [`InfoFeatures`] scales the raw game-info numbers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfoScale {
    /// Field values as reported. Score and position dominate every other feature.
    Raw,
    /// Each field divided by its typical range, so values stay around `[0, 1]`.
    #[default]
    Normalized,
}

impl InfoScale {
    const DIVISORS: [f64; 10] = [
        100.0, 1.0, 3.0, 10_000.0, 4.0, 2.0, 400.0, 8.0, 3000.0, 255.0,
    ];
}

/// The ten game-info fields as features, independent of the action.
#[derive(Debug, Clone)]
pub struct InfoFeatures {
    schema: FeatureSchema,
    scale: InfoScale,
}

impl InfoFeatures {
    #[must_use]
    pub fn new(scale: InfoScale) -> Self {
        Self {
            schema: FeatureSchema {
                names: GameInfo::FEATURE_NAMES.map(String::from).to_vec(),
            },
            scale,
        }
    }

    #[must_use]
    pub fn scale(&self) -> InfoScale {
        self.scale
    }
}

impl FeatureSet for InfoFeatures {
    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }
}

impl FeatureExtractor<GameInfo> for InfoFeatures {
    fn features(&self, state: &GameInfo, _action: Action) -> Features {
        let mut values = state.feature_values();
        if self.scale == InfoScale::Normalized {
            for (v, d) in values.iter_mut().zip(InfoScale::DIVISORS) {
                *v /= d;
            }
        }
        Features(values.to_vec())
    }
}

/// Gives every action its own copy of the inner extractor's features.
///
/// The schema is `inner × actions` with names `"{feature}@{action}"`; the features of
/// `(s, a)` are zero outside the block of `a`.
#[derive(Debug, Clone)]
pub struct ActionConditioned<E> {
    inner: E,
    block: usize,
    schema: FeatureSchema,
}

impl<E> ActionConditioned<E>
where
    E: FeatureSet,
{
    pub fn new(inner: E, action_space: ActionSpace) -> Self {
        let base = inner.schema();
        let names = action_space
            .iter()
            .flat_map(|action| base.names().iter().map(move |n| format!("{n}@{action}")))
            .collect();
        let block = base.len();
        Self {
            inner,
            block,
            schema: FeatureSchema { names },
        }
    }
}

impl<E> FeatureSet for ActionConditioned<E> {
    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }
}

impl<S, E> FeatureExtractor<S> for ActionConditioned<E>
where
    S: ?Sized,
    E: FeatureExtractor<S>,
{
    fn features(&self, state: &S, action: Action) -> Features {
        let mut values = vec![0.0; self.schema.len()];
        let start = action.index() * self.block;
        values[start..start + self.block]
            .copy_from_slice(self.inner.features(state, action).values());
        Features(values)
    }
}

/// Linear Q-function `Q(s, a) = w · x(s, a)`.
#[derive(Debug, Clone)]
pub struct LinearQ<E> {
    extractor: E,
    action_space: ActionSpace,
    weights: WeightVector,
}

impl<E> LinearQ<E>
where
    E: FeatureSet,
{
    /// Starts from all-zero weights.
    pub fn new(extractor: E, action_space: ActionSpace) -> Self {
        let weights = WeightVector::zeros(extractor.schema());
        Self {
            extractor,
            action_space,
            weights,
        }
    }

    /// Starts from previously learned weights, which must use the extractor's schema.
    pub fn with_weights(
        extractor: E,
        action_space: ActionSpace,
        weights: WeightVector,
    ) -> Result<Self, ConfigError> {
        if weights.schema() != extractor.schema() {
            return Err(ConfigError::SchemaMismatch(
                "weights were learned for different features".into(),
            ));
        }
        Ok(Self {
            extractor,
            action_space,
            weights,
        })
    }

    #[must_use]
    pub fn weights(&self) -> &WeightVector {
        &self.weights
    }

    #[must_use]
    pub fn into_weights(self) -> WeightVector {
        self.weights
    }
}

impl<S, E> ValueFunction<S> for LinearQ<E>
where
    E: FeatureExtractor<S>,
{
    fn action_space(&self) -> ActionSpace {
        self.action_space
    }

    fn value(&self, state: &S, action: Action) -> f64 {
        self.weights.dot(&self.extractor.features(state, action))
    }
}

impl<S, E> TdUpdate<S> for LinearQ<E>
where
    E: FeatureExtractor<S>,
{
    fn update(&mut self, transition: &Transition<S>, params: &LearningParams) {
        let features = self
            .extractor
            .features(&transition.state, transition.action);
        let diff = params.sample(self, transition) - self.weights.dot(&features);
        self.weights
            .add_scaled(&features, params.learning_rate() * diff);
    }
}

#[cfg(test)]
mod tests {
    use plumber_env::Scenario;

    use super::*;

    /// Two hand-picked features, action ignored.
    struct Pair(FeatureSchema);

    impl Pair {
        fn new() -> Self {
            Self(FeatureSchema::new(["a", "b"]).unwrap())
        }
    }

    impl FeatureSet for Pair {
        fn schema(&self) -> &FeatureSchema {
            &self.0
        }
    }

    impl FeatureExtractor<(f64, f64)> for Pair {
        fn features(&self, state: &(f64, f64), _action: Action) -> Features {
            Features::new(vec![state.0, state.1])
        }
    }

    #[test]
    fn test_schema_rejects_duplicates_and_empty() {
        assert!(FeatureSchema::new(["x", "y", "x"]).is_err());
        assert!(FeatureSchema::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_weights_from_map_must_match_schema() {
        let schema = FeatureSchema::new(["a", "b"]).unwrap();
        let mut map = BTreeMap::from([("a".to_owned(), 1.0)]);
        assert!(WeightVector::from_map(&schema, &map).is_err());
        map.insert("b".into(), 2.0);
        let weights = WeightVector::from_map(&schema, &map).unwrap();
        assert_eq!(weights.values(), &[1.0, 2.0]);
        map.insert("c".into(), 0.0);
        assert!(WeightVector::from_map(&schema, &map).is_err());
    }

    #[test]
    fn test_value_is_dot_product() {
        let schema = FeatureSchema::new(["a", "b"]).unwrap();
        let weights =
            WeightVector::from_map(&schema, &BTreeMap::from([("a".into(), 2.0), ("b".into(), -1.0)]))
                .unwrap();
        let q = LinearQ::with_weights(Pair::new(), ActionSpace::new(2).unwrap(), weights).unwrap();
        assert_eq!(q.value(&(3.0, 4.0), Action::new(1)), 2.0);
    }

    #[test]
    fn test_gradient_update() {
        let mut q = LinearQ::new(Pair::new(), ActionSpace::new(2).unwrap());
        let params = LearningParams::new(0.5, 0.9).unwrap();
        let transition = Transition {
            state: (1.0, 2.0),
            action: Action::new(0),
            reward: 4.0,
            next_state: (0.0, 0.0),
            done: false,
        };
        // diff = 4 + 0.9 * 0 - 0 = 4; w += 0.5 * 4 * x
        q.update(&transition, &params);
        assert_eq!(q.weights().values(), &[2.0, 4.0]);
        // diff = 4 - (2 + 8) = -6; w += 0.5 * -6 * x
        q.update(&transition, &params);
        assert_eq!(q.weights().values(), &[-1.0, -2.0]);
    }

    #[test]
    fn test_mismatched_weights_rejected() {
        let other = WeightVector::zeros(&FeatureSchema::new(["z"]).unwrap());
        assert!(LinearQ::with_weights(Pair::new(), ActionSpace::new(2).unwrap(), other).is_err());
    }

    #[test]
    fn test_info_features_tie_all_actions() {
        let mut q = LinearQ::new(InfoFeatures::new(InfoScale::Raw), ActionSpace::SIMPLE);
        let info = GameInfo::initial(Scenario::AllStages);
        q.update(
            &Transition {
                state: info,
                action: Action::new(3),
                reward: 1.0,
                next_state: info,
                done: false,
            },
            &LearningParams::new(0.001, 0.9).unwrap(),
        );
        assert_eq!(q.best_actions(&info).len(), ActionSpace::SIMPLE.len());
    }

    #[test]
    fn test_normalized_info_features() {
        let features = InfoFeatures::new(InfoScale::Normalized)
            .features(&GameInfo::initial(Scenario::AllStages), Action::new(0));
        let time = GameInfo::FEATURE_NAMES
            .iter()
            .position(|n| *n == "time")
            .unwrap();
        assert_eq!(features.values()[time], 1.0);
        assert!(features.values().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_action_conditioned_separates_actions() {
        let actions = ActionSpace::new(3).unwrap();
        let extractor = ActionConditioned::new(Pair::new(), actions);
        assert_eq!(extractor.schema().len(), 6);
        assert_eq!(extractor.schema().names()[2], "a@1");

        let features = extractor.features(&(5.0, 7.0), Action::new(1));
        assert_eq!(features.values(), &[0.0, 0.0, 5.0, 7.0, 0.0, 0.0]);

        let mut q = LinearQ::new(extractor, actions);
        q.update(
            &Transition {
                state: (1.0, 0.0),
                action: Action::new(2),
                reward: 1.0,
                next_state: (0.0, 0.0),
                done: false,
            },
            &LearningParams::new(1.0, 0.0).unwrap(),
        );
        assert_eq!(q.best_actions(&(1.0, 0.0)), vec![Action::new(2)]);
    }
}
