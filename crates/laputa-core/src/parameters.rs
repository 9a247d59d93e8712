//! Inquirer and link parameters
//!
//! The distributions new inquirers and links draw their properties from,
//! together with a variation policy per property that decides whether a
//! batch re-rolls the property between trials.

use serde::{Deserialize, Serialize};

use crate::distribution::{DefaultDistribution, Distribution};
use crate::meta_distribution::MetaDistribution;

/// How a property changes from one trial to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VariationPolicy {
    /// Keep the value from the template society
    #[serde(rename = "constant")]
    KeepConstant,
    /// Re-roll from the setup's distribution
    #[default]
    #[serde(rename = "default")]
    VaryGlobally,
    /// Re-roll from the entity's own distribution
    #[serde(rename = "variable")]
    VaryIndividually,
}

impl VariationPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            VariationPolicy::KeepConstant => "constant",
            VariationPolicy::VaryGlobally => "default",
            VariationPolicy::VaryIndividually => "variable",
        }
    }
}

/// Which distribution a re-roll draws from, if any.
///
/// An entity override set to `VaryIndividually` wins. Otherwise the setup's
/// policy applies, unless the override pins the value with `KeepConstant`.
pub fn resolve_variation<'a, T>(
    setup_policy: VariationPolicy,
    setup_source: &'a T,
    entity: Option<(VariationPolicy, &'a T)>,
) -> Option<&'a T> {
    match entity {
        Some((VariationPolicy::VaryIndividually, own)) => Some(own),
        Some((VariationPolicy::KeepConstant, _)) => None,
        _ if setup_policy == VariationPolicy::VaryGlobally => Some(setup_source),
        _ => None,
    }
}

/// When a link passes its source's belief on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidencePolicy {
    /// Every step, from the source's current belief
    #[default]
    None,
    /// Only after the source inquired
    Inquiry,
    /// After the source inquired or heard something new
    Any,
}

impl EvidencePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            EvidencePolicy::None => "none",
            EvidencePolicy::Inquiry => "inquiry",
            EvidencePolicy::Any => "any",
        }
    }

    pub fn requires_evidence(self) -> bool {
        self != EvidencePolicy::None
    }
}

/// What an inquirer or link is saying this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Message {
    #[default]
    Nothing,
    P,
    NotP,
}

impl Message {
    pub fn from_verdict(p: bool) -> Self {
        if p {
            Message::P
        } else {
            Message::NotP
        }
    }
}

/// Distributions for the properties of a new inquirer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InquirerParameters {
    pub start_belief: Distribution,
    pub inquiry_chance: Distribution,
    pub inquiry_accuracy: Distribution,
    pub inquiry_trust: MetaDistribution,
    pub vary_start_belief: VariationPolicy,
    pub vary_inquiry_chance: VariationPolicy,
    pub vary_inquiry_accuracy: VariationPolicy,
    pub vary_inquiry_trust: VariationPolicy,
}

impl Default for InquirerParameters {
    fn default() -> Self {
        Self {
            start_belief: Distribution::default(),
            inquiry_chance: Distribution::default(),
            inquiry_accuracy: Distribution::default(),
            inquiry_trust: MetaDistribution::for_trust(),
            vary_start_belief: VariationPolicy::VaryGlobally,
            vary_inquiry_chance: VariationPolicy::VaryGlobally,
            vary_inquiry_accuracy: VariationPolicy::VaryGlobally,
            vary_inquiry_trust: VariationPolicy::VaryGlobally,
        }
    }
}

/// Policies come from the nearer endpoint, distributions are blended.
fn pick<T: Copy>(l: T, r: T, v: f64) -> T {
    if v >= 0.5 {
        r
    } else {
        l
    }
}

impl InquirerParameters {
    pub fn interpolate(l: &Self, r: &Self, v: f64) -> Self {
        Self {
            start_belief: Distribution::interpolate(&l.start_belief, &r.start_belief, v),
            inquiry_chance: Distribution::interpolate(&l.inquiry_chance, &r.inquiry_chance, v),
            inquiry_accuracy: Distribution::interpolate(
                &l.inquiry_accuracy,
                &r.inquiry_accuracy,
                v,
            ),
            inquiry_trust: MetaDistribution::interpolate(&l.inquiry_trust, &r.inquiry_trust, v),
            vary_start_belief: pick(l.vary_start_belief, r.vary_start_belief, v),
            vary_inquiry_chance: pick(l.vary_inquiry_chance, r.vary_inquiry_chance, v),
            vary_inquiry_accuracy: pick(l.vary_inquiry_accuracy, r.vary_inquiry_accuracy, v),
            vary_inquiry_trust: pick(l.vary_inquiry_trust, r.vary_inquiry_trust, v),
        }
    }

    pub fn renormalise(&mut self) {
        self.start_belief.renormalise();
        self.inquiry_chance.renormalise();
        self.inquiry_accuracy.renormalise();
        self.inquiry_trust.renormalise();
    }

    pub fn description(&self) -> String {
        [
            format!(
                "Inquirer starting belief distribution: {}",
                self.start_belief.description()
            ),
            format!(
                "Inquiry chance distribution: {}",
                self.inquiry_chance.description()
            ),
            format!(
                "Inquiry accuracy distribution: {}",
                self.inquiry_accuracy.description()
            ),
            format!(
                "Inquiry trust metadistribution: {}",
                self.inquiry_trust.description()
            ),
        ]
        .join("\r\n")
    }
}

/// Distributions for the properties of a new link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkParameters {
    pub listen_chance: Distribution,
    pub threshold: Distribution,
    pub trust: MetaDistribution,
    pub vary_listen_chance: VariationPolicy,
    pub vary_threshold: VariationPolicy,
    pub vary_trust: VariationPolicy,
}

impl Default for LinkParameters {
    fn default() -> Self {
        Self {
            listen_chance: Distribution::default(),
            threshold: DefaultDistribution::IntervalUpper.build(),
            trust: MetaDistribution::for_trust(),
            vary_listen_chance: VariationPolicy::VaryGlobally,
            vary_threshold: VariationPolicy::VaryGlobally,
            vary_trust: VariationPolicy::VaryGlobally,
        }
    }
}

impl LinkParameters {
    pub fn interpolate(l: &Self, r: &Self, v: f64) -> Self {
        Self {
            listen_chance: Distribution::interpolate(&l.listen_chance, &r.listen_chance, v),
            threshold: Distribution::interpolate(&l.threshold, &r.threshold, v),
            trust: MetaDistribution::interpolate(&l.trust, &r.trust, v),
            vary_listen_chance: pick(l.vary_listen_chance, r.vary_listen_chance, v),
            vary_threshold: pick(l.vary_threshold, r.vary_threshold, v),
            vary_trust: pick(l.vary_trust, r.vary_trust, v),
        }
    }

    pub fn renormalise(&mut self) {
        self.listen_chance.renormalise();
        self.threshold.renormalise();
        self.trust.renormalise();
    }

    pub fn description(&self) -> String {
        [
            format!(
                "Link listen chance distribution: {}",
                self.listen_chance.description()
            ),
            format!("Link threshold distribution: {}", self.threshold.description()),
            format!("Link trust metadistribution: {}", self.trust.description()),
        ]
        .join("\r\n")
    }
}
