//! Society Setup
//!
//! Everything needed to generate a society: how many inquirers, how many
//! links and how they attach, plus the parameters each new inquirer and
//! link draws its properties from.

use serde::{Deserialize, Serialize};

use crate::distribution::{format_value, Distribution};
use crate::parameters::{EvidencePolicy, InquirerParameters, LinkParameters, VariationPolicy};

/// Setup defaults
pub mod setup_constants {
    /// Smallest population the default population distribution yields
    pub const DEFAULT_MIN_POPULATION: i64 = 2;
    /// Largest population the default population distribution yields
    pub const DEFAULT_MAX_POPULATION: i64 = 20;
    /// Probability a growth link points into the new inquirer
    pub const DEFAULT_GROWTH_BALANCE: f64 = 0.5;
    /// Growth balance at which new inquirers may exceed n - 1 links
    pub const UNCAPPED_GROWTH_BALANCE: f64 = 0.999;
}

/// Weights steering which source a new link attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkWeights {
    /// Weight every inquirer starts with
    pub base: f64,
    /// Bonus for inquirers the target already talks to
    pub symmetry: f64,
    /// Bonus for sources of the target's sources
    pub transitivity: f64,
    /// Bonus per existing listener
    pub clustering: f64,
}

impl Default for LinkWeights {
    fn default() -> Self {
        Self {
            base: 1.0,
            symmetry: 0.0,
            transitivity: 0.0,
            clustering: 0.0,
        }
    }
}

impl LinkWeights {
    pub fn interpolate(l: &Self, r: &Self, v: f64) -> Self {
        let mix = |a: f64, b: f64| a * (1.0 - v) + b * v;
        Self {
            base: mix(l.base, r.base),
            symmetry: mix(l.symmetry, r.symmetry),
            transitivity: mix(l.transitivity, r.transitivity),
            clustering: mix(l.clustering, r.clustering),
        }
    }
}

/// What the link density distribution counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMethod {
    /// Links in the whole society
    Total,
    /// Links per inquirer
    #[default]
    PerInquirer,
    /// Links per ordered pair of inquirers
    PerInquirerSquared,
}

/// Whether the link density distribution gives a count or a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkCount {
    /// A fraction of the possible links
    #[default]
    Density,
    /// A literal number of links
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkDistribution {
    pub method: LinkMethod,
    pub count: LinkCount,
}

impl LinkDistribution {
    pub fn is_number(&self) -> bool {
        self.count == LinkCount::Number
    }
}

/// Generation parameters for one society (or one batch stage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocietySetup {
    pub population: Distribution,
    pub link_density: Distribution,
    /// Share of the population created before growth starts
    pub initial_population_part: f64,
    /// Chance a growth link points into the new inquirer rather than out of it
    pub growth_balance: f64,
    pub link_weights: LinkWeights,
    pub inquirer_parameters: InquirerParameters,
    pub link_parameters: LinkParameters,
    pub link_distribution: LinkDistribution,
    pub evidence_policy: EvidencePolicy,
    pub count_prior_as_evidence: bool,
    pub update_trust: bool,
    pub include_in_statistics: bool,
    pub update_inquiry_trust: bool,
    pub vary_population: bool,
    pub vary_links: bool,
    pub limit_links_to_one_per_pair: bool,
}

impl Default for SocietySetup {
    fn default() -> Self {
        let mut population = Distribution::default();
        population.set_discrete_range(
            setup_constants::DEFAULT_MIN_POPULATION,
            setup_constants::DEFAULT_MAX_POPULATION,
        );
        Self {
            population,
            link_density: Distribution::default(),
            initial_population_part: 1.0,
            growth_balance: setup_constants::DEFAULT_GROWTH_BALANCE,
            link_weights: LinkWeights::default(),
            inquirer_parameters: InquirerParameters::default(),
            link_parameters: LinkParameters::default(),
            link_distribution: LinkDistribution::default(),
            evidence_policy: EvidencePolicy::None,
            count_prior_as_evidence: false,
            update_trust: true,
            include_in_statistics: true,
            update_inquiry_trust: true,
            vary_population: false,
            vary_links: false,
            limit_links_to_one_per_pair: true,
        }
    }
}

impl SocietySetup {
    /// Blends two setups. Flags and policies stay with `l`, except the
    /// generation switches which follow `r` from `v = 0.5` on.
    pub fn interpolate(l: &Self, r: &Self, v: f64) -> Self {
        let mix = |a: f64, b: f64| a * (1.0 - v) + b * v;
        let mut out = l.clone();
        out.population = Distribution::interpolate(&l.population, &r.population, v);
        out.link_density = Distribution::interpolate(&l.link_density, &r.link_density, v);
        out.initial_population_part = mix(l.initial_population_part, r.initial_population_part);
        out.growth_balance = mix(l.growth_balance, r.growth_balance);
        out.link_weights = LinkWeights::interpolate(&l.link_weights, &r.link_weights, v);
        out.inquirer_parameters =
            InquirerParameters::interpolate(&l.inquirer_parameters, &r.inquirer_parameters, v);
        out.link_parameters =
            LinkParameters::interpolate(&l.link_parameters, &r.link_parameters, v);
        if v >= 0.5 {
            out.vary_population = r.vary_population;
            out.vary_links = r.vary_links;
            out.limit_links_to_one_per_pair = r.limit_links_to_one_per_pair;
            out.link_distribution = r.link_distribution;
        }
        out
    }

    /// Keeps every inquirer and link property from the template between
    /// trials.
    pub fn pin_variation(&mut self) {
        let ip = &mut self.inquirer_parameters;
        ip.vary_start_belief = VariationPolicy::KeepConstant;
        ip.vary_inquiry_chance = VariationPolicy::KeepConstant;
        ip.vary_inquiry_accuracy = VariationPolicy::KeepConstant;
        ip.vary_inquiry_trust = VariationPolicy::KeepConstant;
        let lp = &mut self.link_parameters;
        lp.vary_listen_chance = VariationPolicy::KeepConstant;
        lp.vary_threshold = VariationPolicy::KeepConstant;
        lp.vary_trust = VariationPolicy::KeepConstant;
    }

    /// Renormalises every freeform histogram in the setup.
    pub fn renormalise(&mut self) {
        self.population.renormalise();
        self.link_density.renormalise();
        self.inquirer_parameters.renormalise();
        self.link_parameters.renormalise();
    }

    /// Builds the trust tables used when rolling trust functions.
    pub fn precalculate(&mut self) {
        self.inquirer_parameters.inquiry_trust.precalculate_for_trust();
        self.link_parameters.trust.precalculate_for_trust();
    }

    pub fn description(&self) -> String {
        let per = match self.link_distribution.method {
            LinkMethod::Total => " in total",
            LinkMethod::PerInquirer => " per inquirer",
            LinkMethod::PerInquirerSquared => " per inquirer squared",
        };
        let w = &self.link_weights;
        let mut s = String::from("Population: ");
        s += &format!("Distribution: {}\r\n", self.population.description());
        s += &format!(
            "Links: {} - {}{}\r\n",
            self.link_density.min.trunc() as i64,
            self.link_density.max.trunc() as i64,
            per
        );
        s += &format!("Distribution: {}\r\n", self.link_density.description());
        s += &format!(
            "Weights: Base={}, Symmetry={}, Transitivity={}, Clustering={}\r\n",
            format_value(w.base),
            format_value(w.symmetry),
            format_value(w.transitivity),
            format_value(w.clustering)
        );
        s += &self.inquirer_parameters.description();
        s += "\r\n";
        s += &self.link_parameters.description();
        s += "\r\n";
        s
    }
}
