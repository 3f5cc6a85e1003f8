//! Selective artifact update
//!
//! A run retrains any subset of three axes: the primary dense head
//! (intercept + dense weights), the token weights, and the funnel head.
//! Axes without an update are carried over from the prior artifact
//! unchanged. Dense weights are overwritten key by key; token weights are
//! replaced wholesale.

use super::artifact::{FunnelHead, ModelArtifact, ARTIFACT_VERSION};
use indexmap::IndexMap;

/// Which axes a run trains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingAxes {
    pub ai: bool,
    pub tokens: bool,
    pub funnel: bool,
}

impl TrainingAxes {
    pub const ALL: Self = Self {
        ai: true,
        tokens: true,
        funnel: true,
    };

    /// Axis switches as given on the command line; none set means all
    pub fn from_flags(ai: bool, tokens: bool, funnel: bool) -> Self {
        if !ai && !tokens && !funnel {
            return Self::ALL;
        }
        Self { ai, tokens, funnel }
    }

    /// Whether the primary classifier has to be fit
    pub fn needs_primary_fit(&self) -> bool {
        self.ai || self.tokens
    }
}

impl std::fmt::Display for TrainingAxes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = [
            (self.ai, "ai"),
            (self.tokens, "tokens"),
            (self.funnel, "funnel"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("+"))
        }
    }
}

/// Fresh intercept and named weights for one linear head
#[derive(Debug, Clone, PartialEq)]
pub struct HeadUpdate {
    pub intercept: f64,
    pub weights: IndexMap<String, f64>,
}

/// Everything a run produced; `None` axes are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactUpdate {
    pub ai: Option<HeadUpdate>,
    pub tokens: Option<IndexMap<String, f64>>,
    pub funnel: Option<HeadUpdate>,
}

impl ArtifactUpdate {
    pub fn is_empty(&self) -> bool {
        self.ai.is_none() && self.tokens.is_none() && self.funnel.is_none()
    }
}

/// Step 3: apply an update on top of a repaired prior artifact
pub fn merge(prior: &ModelArtifact, update: &ArtifactUpdate) -> ModelArtifact {
    let version = if update.is_empty() {
        prior.version
    } else {
        ARTIFACT_VERSION
    };

    let (intercept, dense_feature_weights) = match &update.ai {
        Some(head) => (
            finite_or(head.intercept, prior.intercept),
            overwrite_keys(&prior.dense_feature_weights, &head.weights),
        ),
        None => (prior.intercept, prior.dense_feature_weights.clone()),
    };

    let token_weights = match &update.tokens {
        Some(tokens) => tokens
            .iter()
            .filter(|(_, w)| w.is_finite())
            .map(|(t, w)| (t.clone(), *w))
            .collect(),
        None => prior.token_weights.clone(),
    };

    let funnel_head = match &update.funnel {
        Some(head) => FunnelHead {
            intercept: finite_or(head.intercept, prior.funnel_head.intercept),
            dense_feature_weights: overwrite_keys(
                &prior.funnel_head.dense_feature_weights,
                &head.weights,
            ),
        },
        None => prior.funnel_head.clone(),
    };

    ModelArtifact {
        version,
        intercept,
        dense_feature_weights,
        token_weights,
        funnel_head,
    }
}

/// Keys of `base` in order, taking finite values from `fresh` where present
fn overwrite_keys(
    base: &IndexMap<String, f64>,
    fresh: &IndexMap<String, f64>,
) -> IndexMap<String, f64> {
    base.iter()
        .map(|(key, &old)| {
            let value = fresh
                .get(key)
                .copied()
                .filter(|w| w.is_finite())
                .unwrap_or(old);
            (key.clone(), value)
        })
        .collect()
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
