//! Dense feature encoding for chat messages
//!
//! Maps one message plus its context signals to the fixed 36-slot vector
//! the scoring side reads. Slot order is the contract with the consumer of
//! the model artifact: `DENSE_FEATURE_NAMES[i]` names slot `i`.

use super::dataset::{Channel, MessageContext};

/// Number of fixed dense features
pub const DENSE_FEATURE_COUNT: usize = 36;

/// Dense feature names in slot order
pub const DENSE_FEATURE_NAMES: [&str; DENSE_FEATURE_COUNT] = [
    "kw_payment",
    "kw_account",
    "kw_urgency",
    "kw_trust",
    "kw_too_good",
    "kw_platform",
    "has_link",
    "has_suspicious_punctuation",
    "ctx_pushes_external_platform",
    "ctx_demands_upfront_payment",
    "ctx_requests_sensitive_data",
    "ctx_claims_middleman_without_proof",
    "ctx_too_good_to_be_true",
    "ctx_repeated_contact_3plus",
    "ctx_is_spam",
    "ctx_asks_for_stuff",
    "ctx_advertising",
    "intent_offer",
    "intent_rep",
    "intent_redirect",
    "intent_instruction",
    "intent_payment",
    "intent_anchor",
    "funnel_step_norm",
    "funnel_sequence_norm",
    "funnel_full_chain",
    "funnel_partial_chain",
    "rapid_followup",
    "channel_pm",
    "channel_party",
    "channel_public",
    "rule_hits_norm",
    "similarity_hits_norm",
    "behavior_hits_norm",
    "trend_hits_norm",
    "funnel_hits_norm",
];

/// Number of dense features the funnel head is fit on
pub const FUNNEL_FEATURE_COUNT: usize = 14;

/// Subset of `DENSE_FEATURE_NAMES` used by the funnel head, in dense order
pub const FUNNEL_FEATURE_NAMES: [&str; FUNNEL_FEATURE_COUNT] = [
    "ctx_pushes_external_platform",
    "ctx_repeated_contact_3plus",
    "intent_offer",
    "intent_rep",
    "intent_redirect",
    "intent_instruction",
    "intent_payment",
    "intent_anchor",
    "funnel_step_norm",
    "funnel_sequence_norm",
    "funnel_full_chain",
    "funnel_partial_chain",
    "rapid_followup",
    "funnel_hits_norm",
];

/// Slot index of a dense feature name
pub fn dense_index(name: &str) -> Option<usize> {
    DENSE_FEATURE_NAMES.iter().position(|n| *n == name)
}

/// Caps used by the divide-and-clamp normalisations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationCaps {
    pub funnel_step: f64,
    pub funnel_sequence: f64,
    pub rule_hits: f64,
    pub similarity_hits: f64,
    pub behavior_hits: f64,
    pub trend_hits: f64,
    pub funnel_hits: f64,
    /// Delay (ms) at which `rapid_followup` reaches zero
    pub followup_window_ms: f64,
}

impl Default for NormalizationCaps {
    fn default() -> Self {
        Self {
            funnel_step: 4.0,
            funnel_sequence: 40.0,
            rule_hits: 3.0,
            similarity_hits: 2.0,
            behavior_hits: 3.0,
            trend_hits: 2.0,
            funnel_hits: 2.0,
            followup_window_ms: 120_000.0,
        }
    }
}

/// Keyword sets and caps the encoder reads.
///
/// Matching is plain substring containment against the lower-cased message.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTables {
    pub payment_words: Vec<&'static str>,
    pub account_words: Vec<&'static str>,
    pub urgency_words: Vec<&'static str>,
    pub trust_words: Vec<&'static str>,
    pub too_good_words: Vec<&'static str>,
    pub platform_words: Vec<&'static str>,
    pub link_markers: Vec<&'static str>,
    pub punctuation_markers: Vec<&'static str>,
    pub caps: NormalizationCaps,
}

impl Default for FeatureTables {
    fn default() -> Self {
        Self {
            payment_words: vec!["pay", "payment", "vorkasse", "coins", "money", "btc", "crypto"],
            account_words: vec!["password", "passwort", "2fa", "code", "email", "login"],
            urgency_words: vec!["now", "quick", "fast", "urgent", "sofort", "jetzt"],
            trust_words: vec!["trust", "legit", "safe", "trusted", "middleman"],
            too_good_words: vec!["free", "100%", "guaranteed", "garantiert", "dupe", "rank"],
            platform_words: vec!["discord", "telegram", "t.me", "server", "dm"],
            link_markers: vec!["http://", "https://", "www."],
            punctuation_markers: vec!["!!!", "??", "$$"],
            caps: NormalizationCaps::default(),
        }
    }
}

/// Encoded dense feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct DenseFeatures {
    values: [f64; DENSE_FEATURE_COUNT],
}

impl DenseFeatures {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value of a named feature, `None` for unknown names
    pub fn get(&self, name: &str) -> Option<f64> {
        dense_index(name).map(|i| self.values[i])
    }

    /// Values of the funnel-head subset, in `FUNNEL_FEATURE_NAMES` order
    pub fn funnel_values(&self) -> Vec<f64> {
        FUNNEL_FEATURE_NAMES
            .iter()
            .filter_map(|name| self.get(name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Pure encoder from (message, context) to `DenseFeatures`
#[derive(Debug, Clone, Default)]
pub struct DenseEncoder {
    tables: FeatureTables,
}

impl DenseEncoder {
    pub fn new(tables: FeatureTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &FeatureTables {
        &self.tables
    }

    /// Encode one message with its context signals
    pub fn encode(&self, message: &str, ctx: &MessageContext) -> DenseFeatures {
        let t = &self.tables;
        let caps = &t.caps;
        let msg = message.to_lowercase();

        let rapid_followup = if ctx.delta_ms <= 0 {
            0.0
        } else {
            1.0 - normalize(ctx.delta_ms as f64, caps.followup_window_ms)
        };

        let values = [
            flag(contains_any(&msg, &t.payment_words)),
            flag(contains_any(&msg, &t.account_words)),
            flag(contains_any(&msg, &t.urgency_words)),
            flag(contains_any(&msg, &t.trust_words)),
            flag(contains_any(&msg, &t.too_good_words)),
            flag(contains_any(&msg, &t.platform_words)),
            flag(contains_any(&msg, &t.link_markers)),
            flag(contains_any(&msg, &t.punctuation_markers)),
            flag(ctx.pushes_external_platform),
            flag(ctx.demands_upfront_payment),
            flag(ctx.requests_sensitive_data),
            flag(ctx.claims_middleman_without_proof),
            flag(ctx.too_good_to_be_true),
            flag(ctx.repeated_contact_attempts >= 3),
            flag(ctx.is_spam),
            flag(ctx.asks_for_stuff),
            flag(ctx.advertising),
            flag(ctx.intent_offer),
            flag(ctx.intent_rep),
            flag(ctx.intent_redirect),
            flag(ctx.intent_instruction),
            flag(ctx.intent_payment),
            flag(ctx.intent_anchor),
            normalize(ctx.funnel_step_index as f64, caps.funnel_step),
            normalize(ctx.funnel_sequence_score, caps.funnel_sequence),
            flag(ctx.funnel_full_chain),
            flag(ctx.funnel_partial_chain),
            rapid_followup,
            flag(ctx.channel == Channel::Pm),
            flag(ctx.channel == Channel::Party),
            flag(ctx.channel == Channel::Public),
            normalize(ctx.rule_hits as f64, caps.rule_hits),
            normalize(ctx.similarity_hits as f64, caps.similarity_hits),
            normalize(ctx.behavior_hits as f64, caps.behavior_hits),
            normalize(ctx.trend_hits as f64, caps.trend_hits),
            normalize(ctx.funnel_hits as f64, caps.funnel_hits),
        ];

        DenseFeatures { values }
    }
}

/// `value / cap` clamped to [0, 1]; zero for a non-positive cap or negative value
pub fn normalize(value: f64, cap: f64) -> f64 {
    if cap <= 0.0 || value < 0.0 || value.is_nan() {
        return 0.0;
    }
    (value / cap).clamp(0.0, 1.0)
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| !n.is_empty() && text.contains(n))
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}
