//! Links
//!
//! A directed channel from a source inquirer to a target inquirer. The
//! target holds a trust function over the source's reliability and listens
//! with some chance each step.

use serde::{Deserialize, Serialize};

use crate::context::SimContext;
use crate::parameters::{resolve_variation, EvidencePolicy, LinkParameters, Message};
use crate::setup::SocietySetup;
use crate::trust::TrustFunction;

/// Map key for a link. Ordered target first, so all links into one
/// inquirer form a contiguous range ordered by source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkKey {
    pub target: usize,
    pub source: usize,
}

impl LinkKey {
    pub fn new(source: usize, target: usize) -> Self {
        Self { target, source }
    }

    /// First key of the links into `target`.
    pub fn first_into(target: usize) -> Self {
        Self { target, source: 0 }
    }

    /// Last possible key of the links into `target`.
    pub fn last_into(target: usize) -> Self {
        Self {
            target,
            source: usize::MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Link {
    pub source: usize,
    pub target: usize,
    pub trust: TrustFunction,
    pub listen_chance: f64,
    pub threshold: f64,
    /// Step this link last delivered a message, -1 for never
    pub last_used: i64,
    pub evidence_policy: EvidencePolicy,
    pub count_prior_as_evidence: bool,
    pub update_trust: bool,
    /// What the link passes on under an evidence policy
    #[serde(skip)]
    pub message: Message,
    /// Per-link distributions overriding the setup's
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Box<LinkParameters>>,
}

impl Default for Link {
    fn default() -> Self {
        Self {
            source: 0,
            target: 0,
            trust: TrustFunction::uniform(),
            listen_chance: 0.0,
            threshold: 0.5,
            last_used: -1,
            evidence_policy: EvidencePolicy::None,
            count_prior_as_evidence: false,
            update_trust: true,
            message: Message::Nothing,
            parameters: None,
        }
    }
}

impl Link {
    /// A link with neutral properties, filled in by the caller.
    pub fn blank(source: usize, target: usize) -> Self {
        Self {
            source,
            target,
            ..Self::default()
        }
    }

    /// A link with properties drawn from the setup.
    pub fn from_setup(
        source: usize,
        target: usize,
        setup: &SocietySetup,
        ctx: &mut SimContext,
    ) -> Self {
        let params = &setup.link_parameters;
        let threshold = params.threshold.random_value(ctx);
        let listen_chance = params.listen_chance.random_value(ctx);
        let trust = params.trust.random_trust_function(ctx);
        Self {
            source,
            target,
            trust,
            listen_chance,
            threshold,
            last_used: -1,
            evidence_policy: setup.evidence_policy,
            count_prior_as_evidence: setup.count_prior_as_evidence,
            update_trust: setup.update_trust,
            message: Message::Nothing,
            parameters: None,
        }
    }

    pub fn key(&self) -> LinkKey {
        LinkKey::new(self.source, self.target)
    }

    /// Re-rolls each property the variation policies leave open, in the
    /// order listen chance, threshold, trust.
    pub fn rerandomize(&mut self, setup: &SocietySetup, ctx: &mut SimContext) {
        let params = &setup.link_parameters;
        let own = self.parameters.as_deref();
        if let Some(d) = resolve_variation(
            params.vary_listen_chance,
            &params.listen_chance,
            own.map(|o| (o.vary_listen_chance, &o.listen_chance)),
        ) {
            self.listen_chance = d.random_value(ctx);
        }
        if let Some(d) = resolve_variation(
            params.vary_threshold,
            &params.threshold,
            own.map(|o| (o.vary_threshold, &o.threshold)),
        ) {
            self.threshold = d.random_value(ctx);
        }
        if let Some(m) = resolve_variation(
            params.vary_trust,
            &params.trust,
            own.map(|o| (o.vary_trust, &o.trust)),
        ) {
            m.set_trust_function_to_random(&mut self.trust, ctx);
        }
    }

    /// Folds a second, freshly drawn link into this one.
    ///
    /// Threshold and trust are averaged by listen chance; the listen chances
    /// combine as independent chances.
    pub fn merge_with_new(&mut self, setup: &SocietySetup, ctx: &mut SimContext) {
        let params = &setup.link_parameters;
        let lc = params.listen_chance.random_value(ctx);
        let sum = self.listen_chance + lc;
        let scale = if sum > 0.0 { 1.0 / sum } else { 0.0 };
        let threshold = params.threshold.random_value(ctx);
        if sum > 0.0 {
            self.threshold = (self.threshold * self.listen_chance + threshold * lc) * scale;
        }
        params
            .trust
            .merge_trust_function_with_random(&mut self.trust, lc * scale, ctx);
        self.listen_chance = self.listen_chance + lc - self.listen_chance * lc;
    }
}
