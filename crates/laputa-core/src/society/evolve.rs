//! One step of belief propagation.
//!
//! Every inquirer updates from the beliefs of the previous step: it may
//! inquire, then hears from each source it listens to. The new beliefs are
//! committed together once everyone has updated.

use super::{Likelihood, LinkKey, Society};
use crate::context::SimContext;
use crate::parameters::{EvidencePolicy, Message};
use crate::simulation::{LogLevel, Simulation};

fn verdict_word(p: bool) -> &'static str {
    if p {
        "p"
    } else {
        "not-p"
    }
}

impl Society {
    /// Advances every inquirer by one step and rescores the simulation.
    pub fn evolve(&mut self, sim: &mut Simulation, ctx: &mut SimContext) {
        for i in 0..self.people.len() {
            self.do_inquiry(i, sim, ctx);
        }

        for link in self.links.values_mut() {
            let src = &self.people[link.source];
            let (old, new) = (src.belief.v(), src.new_belief.v());
            match link.evidence_policy {
                EvidencePolicy::Inquiry => {
                    if src.message == Message::P && new >= link.threshold {
                        link.message = Message::P;
                    } else if src.message == Message::NotP && new <= 1.0 - link.threshold {
                        link.message = Message::NotP;
                    }
                }
                EvidencePolicy::Any => {
                    if new > old && new >= link.threshold {
                        link.message = Message::P;
                    } else if new < old && new <= 1.0 - link.threshold {
                        link.message = Message::NotP;
                    }
                }
                EvidencePolicy::None => {}
            }
        }

        for p in self.people.iter_mut() {
            p.belief = p.new_belief;
        }
        sim.e_value = sim.instant_e_value(self);
        sim.e_value_delta = sim.e_value - sim.start_e_value;
    }

    /// Computes the new belief of inquirer `index` from inquiry and the
    /// testimony of its sources.
    pub fn do_inquiry(&mut self, index: usize, sim: &mut Simulation, ctx: &mut SimContext) {
        let log = sim.log_level;
        let step = sim.cur_step;
        let belief = self.people[index].belief;
        let mut lik = Likelihood::from_belief(belief);
        let mut inquiry_effect = belief;
        let mut received = false;

        if let Some(verdict) = self.people[index].inquire(&mut lik, step, ctx) {
            received = true;
            sim.inquiry_results += 1;
            inquiry_effect = lik.posterior();
            if log >= LogLevel::Standard {
                tracing::debug!(
                    inquirer = %self.label(index),
                    result = verdict_word(verdict),
                    "inquiry"
                );
            }
            if log >= LogLevel::Detailed {
                tracing::trace!(
                    inquirer = %self.label(index),
                    expected_trust = self.people[index].inquiry_trust.expectation(),
                    "inquiry trust updated"
                );
            }
        }

        let keys: Vec<LinkKey> = self
            .links
            .range(LinkKey::first_into(index)..=LinkKey::last_into(index))
            .map(|(k, _)| *k)
            .collect();
        for key in keys {
            let say = self.what_source_says(key, index, ctx);
            let listens = ctx.uniform() < self.links[&key].listen_chance;
            let verdict = match say {
                Message::P if listens => true,
                Message::NotP if listens => false,
                _ => continue,
            };
            sim.messages_sent += 1;
            received = true;
            let Some(link) = self.links.get_mut(&key) else {
                continue;
            };
            link.last_used = step;
            let before = link.trust.expectation();
            lik.fold(verdict, before as f64);
            if link.update_trust {
                link.trust.update(belief.v() as f32, verdict);
            }
            let after = link.trust.expectation();
            if log >= LogLevel::Standard {
                tracing::debug!(
                    inquirer = %self.label(index),
                    source = %self.label(key.source),
                    heard = verdict_word(verdict),
                    "message"
                );
            }
            if log >= LogLevel::Detailed {
                tracing::trace!(
                    inquirer = %self.label(index),
                    source = %self.label(key.source),
                    from = before,
                    to = after,
                    "source trust updated"
                );
            }
        }

        let new_belief = if !received {
            belief
        } else if lik.is_consistent() {
            let nb = lik.posterior();
            if nb > inquiry_effect {
                sim.bandwagon.towards_p += nb.v() - inquiry_effect.v();
                sim.bandwagon.overridden_towards_p += 1;
            } else if nb < inquiry_effect {
                sim.bandwagon.towards_not_p += inquiry_effect.v() - nb.v();
                sim.bandwagon.overridden_towards_not_p += 1;
            }
            if log >= LogLevel::Standard {
                tracing::debug!(
                    inquirer = %self.label(index),
                    from = belief.v(),
                    to = nb.v(),
                    "belief updated"
                );
            }
            nb
        } else {
            if log > LogLevel::None {
                tracing::info!(
                    inquirer = %self.label(index),
                    "information gathered forced a contradiction"
                );
            }
            belief
        };
        self.people[index].new_belief = new_belief;
    }

    /// The message a link into `index` carries this step.
    fn what_source_says(&self, key: LinkKey, index: usize, ctx: &mut SimContext) -> Message {
        let link = &self.links[&key];
        let src = &self.people[key.source];
        if link.evidence_policy == EvidencePolicy::None {
            let b = src.belief.v();
            let t = link.threshold;
            return if (b > 0.5 && t > 0.5) || (b < 0.5 && t < 0.5) {
                Message::P
            } else if (b < 0.5 && t > 0.5) || (b > 0.5 && t < 0.5) {
                Message::NotP
            } else {
                Message::from_verdict(ctx.coin())
            };
        }

        let mut new_evidence = link.last_used < src.last_inquiry_result
            || (link.count_prior_as_evidence && link.last_used == -1);
        if link.evidence_policy == EvidencePolicy::Any && !new_evidence {
            new_evidence = self
                .incoming(key.source)
                .any(|l2| l2.source != index && l2.last_used > link.last_used);
        }
        if new_evidence {
            link.message
        } else {
            Message::Nothing
        }
    }
}
