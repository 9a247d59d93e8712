//! Inquirers
//!
//! A node of the society. Each inquirer holds a credence in p, may inquire
//! into p directly, and weighs what it hears by how far it trusts the
//! source of the information.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::context::SimContext;
use crate::parameters::{resolve_variation, InquirerParameters, Message};
use crate::setup::SocietySetup;
use crate::trust::TrustFunction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inquirer {
    pub name: String,
    pub belief: Amount,
    /// Belief after the current step, committed once every inquirer has run
    #[serde(skip)]
    pub new_belief: Amount,
    pub inquiry_chance: f64,
    pub inquiry_accuracy: f64,
    pub inquiry_trust: TrustFunction,
    /// Step of the last inquiry, -1 for none
    #[serde(skip, default = "never")]
    pub last_inquiry_result: i64,
    /// Verdict of the last inquiry
    #[serde(skip)]
    pub message: Message,
    /// Per-inquirer distributions overriding the setup's
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Box<InquirerParameters>>,
    pub x: f64,
    pub y: f64,
    pub include_in_statistics: bool,
    pub update_inquiry_trust: bool,
    /// Targets of this inquirer's outgoing links
    #[serde(skip)]
    pub listeners: Vec<usize>,
    #[serde(skip)]
    pub n_listeners: usize,
    #[serde(skip)]
    pub n_sources: usize,
}

fn never() -> i64 {
    -1
}

impl Default for Inquirer {
    fn default() -> Self {
        Self {
            name: String::new(),
            belief: Amount::default(),
            new_belief: Amount::default(),
            inquiry_chance: 0.0,
            inquiry_accuracy: 0.5,
            inquiry_trust: TrustFunction::uniform(),
            last_inquiry_result: -1,
            message: Message::Nothing,
            parameters: None,
            x: 0.0,
            y: 0.0,
            include_in_statistics: true,
            update_inquiry_trust: true,
            listeners: Vec::new(),
            n_listeners: 0,
            n_sources: 0,
        }
    }
}

fn probability(v: f64) -> Amount {
    Amount::new(v.clamp(0.0, 1.0))
}

impl Inquirer {
    /// An inquirer with neutral properties at `(x, y)`.
    pub fn blank(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    /// An inquirer with properties drawn from the setup.
    pub fn from_setup(x: f64, y: f64, setup: &SocietySetup, ctx: &mut SimContext) -> Self {
        let params = &setup.inquirer_parameters;
        let belief = probability(params.start_belief.random_value(ctx));
        let inquiry_chance = params.inquiry_chance.random_value(ctx);
        let inquiry_accuracy = params.inquiry_accuracy.random_value(ctx);
        let inquiry_trust = params.inquiry_trust.random_trust_function(ctx);
        Self {
            belief,
            new_belief: belief,
            inquiry_chance,
            inquiry_accuracy,
            inquiry_trust,
            x,
            y,
            include_in_statistics: setup.include_in_statistics,
            update_inquiry_trust: setup.update_inquiry_trust,
            ..Self::default()
        }
    }

    /// Re-rolls each property the variation policies leave open, in the
    /// order belief, chance, accuracy, trust.
    pub fn rerandomize(&mut self, setup: &SocietySetup, ctx: &mut SimContext) {
        let params = &setup.inquirer_parameters;
        let own = self.parameters.as_deref();
        if let Some(d) = resolve_variation(
            params.vary_start_belief,
            &params.start_belief,
            own.map(|o| (o.vary_start_belief, &o.start_belief)),
        ) {
            self.belief = probability(d.random_value(ctx));
            self.new_belief = self.belief;
        }
        if let Some(d) = resolve_variation(
            params.vary_inquiry_chance,
            &params.inquiry_chance,
            own.map(|o| (o.vary_inquiry_chance, &o.inquiry_chance)),
        ) {
            self.inquiry_chance = d.random_value(ctx);
        }
        if let Some(d) = resolve_variation(
            params.vary_inquiry_accuracy,
            &params.inquiry_accuracy,
            own.map(|o| (o.vary_inquiry_accuracy, &o.inquiry_accuracy)),
        ) {
            self.inquiry_accuracy = d.random_value(ctx);
        }
        if let Some(m) = resolve_variation(
            params.vary_inquiry_trust,
            &params.inquiry_trust,
            own.map(|o| (o.vary_inquiry_trust, &o.inquiry_trust)),
        ) {
            m.set_trust_function_to_random(&mut self.inquiry_trust, ctx);
        }
    }

    /// Inquires into p with probability `inquiry_chance`, folding the
    /// result into `lik`. Returns the verdict when an inquiry happened.
    pub fn inquire(
        &mut self,
        lik: &mut Likelihood,
        cur_step: i64,
        ctx: &mut SimContext,
    ) -> Option<bool> {
        if ctx.uniform() >= self.inquiry_chance {
            return None;
        }
        self.last_inquiry_result = cur_step;
        let verdict = ctx.uniform() < self.inquiry_accuracy;
        lik.fold(verdict, self.inquiry_trust.expectation() as f64);
        if self.update_inquiry_trust {
            self.inquiry_trust.update(self.belief.v() as f32, verdict);
        }
        self.message = Message::from_verdict(verdict);
        Some(verdict)
    }
}

/// Unnormalised weights of p and not-p during one update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Likelihood {
    pub p: Amount,
    pub not_p: Amount,
}

impl Likelihood {
    /// Starts from the prior belief.
    pub fn from_belief(belief: Amount) -> Self {
        Self {
            p: belief,
            not_p: belief.inverted(),
        }
    }

    /// Folds in a report for p (`verdict`) from a source expected to be
    /// right with probability `reliability`.
    pub fn fold(&mut self, verdict: bool, reliability: f64) {
        let e = probability(reliability);
        if verdict {
            self.p *= e;
            self.not_p *= e.inverted();
        } else {
            self.p *= e.inverted();
            self.not_p *= e;
        }
    }

    /// False when every report so far contradicted some other one with
    /// full certainty, leaving nothing to normalise.
    pub fn is_consistent(&self) -> bool {
        self.p.is_positive() || self.not_p.is_positive()
    }

    /// The posterior belief in p.
    pub fn posterior(&self) -> Amount {
        self.p.divided_by_added(self.not_p)
    }
}
