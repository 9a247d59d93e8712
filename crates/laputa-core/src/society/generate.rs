//! Society generation
//!
//! Builds random societies from a setup. An initial part of the population
//! is created and linked at random; the rest joins one inquirer at a time,
//! each bringing links of its own. Link sources are picked by weight, and
//! the weights reward symmetry, transitivity and clustering.

use super::Society;
use crate::context::{round_half_up, SimContext};
use crate::setup::{setup_constants, LinkCount, LinkMethod, SocietySetup};

/// Position new inquirers are placed at before any layout.
const SPAWN_POSITION: f64 = 100.0;

/// Failed link attempts allowed per wanted link before growth gives up.
const ATTEMPTS_PER_LINK: usize = 64;

fn non_negative(v: f64) -> f64 {
    if v > 0.0 {
        v
    } else {
        0.0
    }
}

fn rounded(v: f64) -> usize {
    round_half_up(non_negative(v)) as usize
}

impl Society {
    /// Generates a fresh society from `setup`.
    pub fn generate(setup: &SocietySetup, ctx: &mut SimContext) -> Society {
        let mut soc = Society::new();
        soc.generate_from_setup(setup, ctx);
        soc
    }

    /// Builds a trial society from a setup and an optional template.
    ///
    /// With `vary_population` (or without a template) a fresh society is
    /// generated. Otherwise the template is copied and every property its
    /// variation policy leaves open is re-rolled; links are regenerated when
    /// `vary_links` is set.
    pub fn from_setup(
        setup: &SocietySetup,
        template: Option<&Society>,
        ctx: &mut SimContext,
    ) -> Society {
        let template = match template {
            Some(t) if !setup.vary_population => t,
            _ => return Society::generate(setup, ctx),
        };
        let mut soc = template.clone();
        for p in soc.people.iter_mut() {
            p.rerandomize(setup, ctx);
        }
        if setup.vary_links {
            soc.generate_links_from_setup(setup, ctx);
        } else {
            for link in soc.links.values_mut() {
                link.rerandomize(setup, ctx);
            }
        }
        soc
    }

    /// Replaces the society with a generated one.
    pub fn generate_from_setup(&mut self, setup: &SocietySetup, ctx: &mut SimContext) {
        let population = rounded(setup.population.random_value(ctx));
        let initial =
            rounded(population as f64 * setup.initial_population_part).min(population);
        self.people.clear();
        self.links.clear();
        self.weights.reset(0, setup.link_weights.base);
        for _ in 0..initial {
            self.add_generated_inquirer(setup, ctx);
        }

        let n_links = self.roll_number_of_links(setup, ctx);
        for _ in 0..n_links {
            self.generate_new_link(setup, ctx);
        }

        while self.people.len() < population {
            self.add_new_inquirer_with_links(setup, ctx);
        }
        tracing::debug!(
            inquirers = self.people.len(),
            links = self.links.len(),
            "generated society"
        );
    }

    /// Drops every link and rolls a new set from `setup`.
    pub fn generate_links_from_setup(&mut self, setup: &SocietySetup, ctx: &mut SimContext) {
        self.links.clear();
        for p in self.people.iter_mut() {
            p.listeners.clear();
            p.n_listeners = 0;
            p.n_sources = 0;
        }
        self.weights
            .reset(self.people.len(), setup.link_weights.base);
        let n_links = self.roll_number_of_links(setup, ctx);
        for _ in 0..n_links {
            self.generate_new_link(setup, ctx);
        }
    }

    fn add_generated_inquirer(&mut self, setup: &SocietySetup, ctx: &mut SimContext) -> usize {
        let i = self.add_inquirer(SPAWN_POSITION, SPAWN_POSITION, Some(setup), ctx);
        self.weights.push(setup.link_weights.base);
        i
    }

    /// Number of links for the initial population.
    pub fn roll_number_of_links(&self, setup: &SocietySetup, ctx: &mut SimContext) -> usize {
        let n = self.people.len();
        let pairs = n * n.saturating_sub(1);
        let density = &setup.link_density;
        match (setup.link_distribution.count, setup.link_distribution.method) {
            (LinkCount::Number, LinkMethod::Total) => {
                (non_negative(density.random_value(ctx)) as usize).min(pairs)
            }
            (LinkCount::Number, _) => {
                let sum: usize = (0..n)
                    .map(|_| non_negative(density.random_value(ctx)) as usize)
                    .sum();
                sum.min(pairs)
            }
            (LinkCount::Density, LinkMethod::Total) => {
                rounded(density.random_value(ctx) * pairs as f64)
            }
            (LinkCount::Density, LinkMethod::PerInquirer) => (0..n)
                .map(|_| rounded(density.random_value(ctx) * n.saturating_sub(1) as f64))
                .sum(),
            (LinkCount::Density, LinkMethod::PerInquirerSquared) => {
                let p = density.random_value(ctx);
                ctx.binomial(pairs as u64, p) as usize
            }
        }
    }

    /// Adds one link between a uniform target and a weighted source.
    pub fn generate_new_link(&mut self, setup: &SocietySetup, ctx: &mut SimContext) {
        let n = self.people.len();
        if n < 2 {
            return;
        }
        let mut target = ctx.index(n);
        if setup.limit_links_to_one_per_pair {
            let mut attempts = 0;
            while self.people[target].n_sources >= n - 1 {
                attempts += 1;
                if attempts > ATTEMPTS_PER_LINK * n {
                    tracing::warn!(inquirers = n, "every inquirer already hears everyone");
                    return;
                }
                target = ctx.index(n);
            }
        }

        self.adjust_weights_for_target(target, setup);
        if let Some(source) = self.weights.pick(ctx) {
            self.add_link(source, target, setup, ctx);
        }
        self.recalculate_weights(setup);
    }

    /// Biases the source weights for a link into `target`.
    fn adjust_weights_for_target(&mut self, target: usize, setup: &SocietySetup) {
        let lw = &setup.link_weights;
        if lw.symmetry != 0.0 {
            for &l in &self.people[target].listeners {
                self.weights.adjust(l, lw.symmetry);
            }
        }

        if lw.transitivity != 0.0 {
            let second_hand: Vec<usize> = self
                .incoming(target)
                .flat_map(|l| self.incoming(l.source).map(|l2| l2.source))
                .filter(|&s| s != target)
                .collect();
            for s in second_hand {
                self.weights.adjust(s, lw.transitivity);
            }
        }

        if setup.limit_links_to_one_per_pair {
            let sources: Vec<usize> = self.incoming(target).map(|l| l.source).collect();
            for s in sources {
                self.weights.exclude(s);
            }
        }

        self.weights.exclude(target);
    }

    /// Appends one inquirer drawn from `setup` and links it in.
    pub fn add_new_inquirer_with_links(&mut self, setup: &SocietySetup, ctx: &mut SimContext) {
        let new = self.add_generated_inquirer(setup, ctx);
        let n = self.people.len();
        if n < 2 {
            return;
        }
        let others = n - 1;
        let density = &setup.link_density;
        let growth_part = 1.0 - setup.initial_population_part;
        let mut n_links = match (setup.link_distribution.count, setup.link_distribution.method) {
            (LinkCount::Number, LinkMethod::Total) => {
                rounded(density.random_value(ctx) * growth_part).min(others * 2)
            }
            (LinkCount::Number, _) => {
                (non_negative(density.random_value(ctx)) as usize).min(others * 2)
            }
            (LinkCount::Density, LinkMethod::Total) => {
                rounded(density.random_value(ctx) * growth_part)
            }
            (LinkCount::Density, LinkMethod::PerInquirer) => {
                rounded(density.random_value(ctx) * (others * 2) as f64)
            }
            (LinkCount::Density, LinkMethod::PerInquirerSquared) => {
                let p = density.random_value(ctx);
                ctx.binomial((others * 2) as u64, p) as usize
            }
        };
        if setup.growth_balance != setup_constants::UNCAPPED_GROWTH_BALANCE {
            n_links = n_links.min(others);
        }

        let clustering = setup.link_weights.clustering;
        let max_attempts = ATTEMPTS_PER_LINK * n_links + ATTEMPTS_PER_LINK;
        let mut added = 0;
        let mut attempts = 0;
        while added < n_links {
            if attempts >= max_attempts {
                tracing::warn!(
                    inquirer = new,
                    wanted = n_links,
                    added,
                    "gave up linking new inquirer"
                );
                break;
            }
            attempts += 1;
            if ctx.uniform() < setup.growth_balance {
                self.adjust_weights_for_target(new, setup);
                if let Some(from) = self.weights.pick(ctx) {
                    if self.add_link(from, new, setup, ctx) {
                        added += 1;
                        self.weights.adjust(from, clustering);
                    }
                }
                self.recalculate_weights(setup);
            } else {
                let to = ctx.index(others);
                if self.add_link(new, to, setup, ctx) {
                    added += 1;
                    self.weights.add(new, clustering);
                }
            }
        }
    }
}
