//! Society
//!
//! A weighted directed graph of inquirers. Links are keyed target first, so
//! everything an inquirer listens to is one contiguous range of the map.
//! Generation lives in `generate`, per-step belief propagation in `evolve`
//! and layout in `topology`.

mod evolve;
mod generate;
mod inquirer;
mod link;
mod topology;
mod weights;

pub use inquirer::{Inquirer, Likelihood};
pub use link::{Link, LinkKey};
pub use weights::WeightTable;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::context::SimContext;
use crate::setup::SocietySetup;

/// Which links count towards an inquirer's degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegreeDirection {
    In,
    Out,
    Total,
}

/// Copied inquirers and links, ready to be merged into another society.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocietyFragment {
    /// Indices the inquirers had in the society they were taken from
    pub indices: Vec<usize>,
    pub inquirers: Vec<Inquirer>,
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Society {
    pub people: Vec<Inquirer>,
    #[serde(with = "link_list")]
    pub links: BTreeMap<LinkKey, Link>,
    /// Source weights used while generating links
    #[serde(skip)]
    weights: WeightTable,
    #[serde(skip)]
    in_degrees: Vec<usize>,
    #[serde(skip)]
    out_degrees: Vec<usize>,
    #[serde(skip)]
    total_degrees: Vec<usize>,
}

impl Society {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    /// Appends an inquirer as is. Returns its index.
    pub fn push_inquirer(&mut self, inq: Inquirer) -> usize {
        self.people.push(inq);
        self.people.len() - 1
    }

    /// Appends an inquirer drawn from `setup`, or a blank one.
    pub fn add_inquirer(
        &mut self,
        x: f64,
        y: f64,
        setup: Option<&SocietySetup>,
        ctx: &mut SimContext,
    ) -> usize {
        let inq = match setup {
            Some(setup) => Inquirer::from_setup(x, y, setup, ctx),
            None => Inquirer::blank(x, y),
        };
        self.push_inquirer(inq)
    }

    /// Name used in log output: the inquirer's name, or its 1-based index.
    pub fn label(&self, index: usize) -> String {
        match self.people.get(index) {
            Some(p) if !p.name.is_empty() => format!("'{}'", p.name),
            _ => (index + 1).to_string(),
        }
    }

    /// Adds a link drawn from `setup`.
    ///
    /// If the pair is already linked, a limited setup refuses the link and
    /// an unlimited one merges a fresh draw into the existing link.
    pub fn add_link(
        &mut self,
        source: usize,
        target: usize,
        setup: &SocietySetup,
        ctx: &mut SimContext,
    ) -> bool {
        debug_assert!(source < self.people.len() && target < self.people.len());
        if source >= self.people.len() || target >= self.people.len() {
            return false;
        }
        let key = LinkKey::new(source, target);
        if let Some(link) = self.links.get_mut(&key) {
            if setup.limit_links_to_one_per_pair {
                return false;
            }
            link.merge_with_new(setup, ctx);
            return true;
        }
        self.links
            .insert(key, Link::from_setup(source, target, setup, ctx));
        self.attach(source, target);
        true
    }

    /// Inserts a fully built link, replacing any link on the same pair.
    pub fn insert_link(&mut self, link: Link) {
        let (source, target) = (link.source, link.target);
        if source >= self.people.len() || target >= self.people.len() {
            tracing::warn!(source, target, "ignoring link to a missing inquirer");
            return;
        }
        if self.links.insert(link.key(), link).is_none() {
            self.attach(source, target);
        }
    }

    fn attach(&mut self, source: usize, target: usize) {
        let src = &mut self.people[source];
        src.listeners.push(target);
        src.n_listeners += 1;
        self.people[target].n_sources += 1;
    }

    pub fn remove_link(&mut self, source: usize, target: usize) -> Option<Link> {
        let link = self.links.remove(&LinkKey::new(source, target))?;
        let src = &mut self.people[source];
        if let Some(pos) = src.listeners.iter().position(|&t| t == target) {
            src.listeners.remove(pos);
        }
        src.n_listeners = src.n_listeners.saturating_sub(1);
        let tgt = &mut self.people[target];
        tgt.n_sources = tgt.n_sources.saturating_sub(1);
        Some(link)
    }

    pub fn link(&self, source: usize, target: usize) -> Option<&Link> {
        self.links.get(&LinkKey::new(source, target))
    }

    pub fn link_mut(&mut self, source: usize, target: usize) -> Option<&mut Link> {
        self.links.get_mut(&LinkKey::new(source, target))
    }

    /// Links into `target`, ordered by source.
    pub fn incoming(&self, target: usize) -> impl Iterator<Item = &Link> {
        self.links
            .range(LinkKey::first_into(target)..=LinkKey::last_into(target))
            .map(|(_, l)| l)
    }

    /// Rebuilds listener lists and counts from the link map. Links whose
    /// endpoints do not exist are dropped.
    pub fn recalculate_listeners(&mut self) {
        for p in self.people.iter_mut() {
            p.listeners.clear();
            p.n_listeners = 0;
            p.n_sources = 0;
        }
        let n = self.people.len();
        let before = self.links.len();
        self.links.retain(|_, l| l.source < n && l.target < n);
        if self.links.len() < before {
            tracing::warn!(
                dropped = before - self.links.len(),
                "dropped links to missing inquirers"
            );
        }
        let pairs: Vec<(usize, usize)> = self.links.values().map(|l| (l.source, l.target)).collect();
        for (s, t) in pairs {
            self.attach(s, t);
        }
    }

    /// Histogram of inquirer degrees, padded with zeros to `1.5 * max + 1`
    /// entries.
    pub fn degrees(&self, dir: DegreeDirection) -> Vec<usize> {
        let degree = |p: &Inquirer| match dir {
            DegreeDirection::In => p.n_sources,
            DegreeDirection::Out => p.n_listeners,
            DegreeDirection::Total => p.n_sources + p.n_listeners,
        };
        let max = self.people.iter().map(degree).max().unwrap_or(0);
        let mut hist = vec![0; (max as f64 * 1.5) as usize + 1];
        for p in &self.people {
            hist[degree(p)] += 1;
        }
        hist
    }

    /// Refreshes the cached degree histograms.
    pub fn calculate_degrees(&mut self) {
        self.in_degrees = self.degrees(DegreeDirection::In);
        self.out_degrees = self.degrees(DegreeDirection::Out);
        self.total_degrees = self.degrees(DegreeDirection::Total);
    }

    /// Cached histogram from the last `calculate_degrees`.
    pub fn cached_degrees(&self, dir: DegreeDirection) -> &[usize] {
        match dir {
            DegreeDirection::In => &self.in_degrees,
            DegreeDirection::Out => &self.out_degrees,
            DegreeDirection::Total => &self.total_degrees,
        }
    }

    pub fn people_in_statistics(&self) -> usize {
        self.people
            .iter()
            .filter(|p| p.include_in_statistics)
            .count()
    }

    /// Copies the given inquirers and `(source, target)` links out of the
    /// society. Missing links are skipped.
    pub fn extract(
        &self,
        inqs: &BTreeSet<usize>,
        links: &BTreeSet<(usize, usize)>,
    ) -> SocietyFragment {
        let mut f = SocietyFragment::default();
        for &i in inqs.iter().filter(|&&i| i < self.people.len()) {
            f.indices.push(i);
            f.inquirers.push(self.people[i].clone());
        }
        f.links = links
            .iter()
            .filter_map(|&(s, t)| self.link(s, t).cloned())
            .collect();
        f
    }

    /// Appends the fragment's inquirers and recreates its links between the
    /// new positions. Links to inquirers outside the fragment keep their
    /// index. Returns every fragment link's remapped `(source, target)`.
    pub fn merge(&mut self, fragment: &SocietyFragment) -> Vec<(usize, usize)> {
        let mut remap = BTreeMap::new();
        for (&old, inq) in fragment.indices.iter().zip(&fragment.inquirers) {
            remap.insert(old, self.people.len());
            self.people.push(inq.clone());
        }
        let map = |i: usize| remap.get(&i).copied().unwrap_or(i);
        let n = self.people.len();
        let mut pairs = Vec::with_capacity(fragment.links.len());
        for l in &fragment.links {
            let (s, t) = (map(l.source), map(l.target));
            if s < n && t < n {
                let link = self
                    .links
                    .entry(LinkKey::new(s, t))
                    .or_insert_with(|| Link::blank(s, t));
                link.listen_chance = l.listen_chance;
                link.trust = l.trust.clone();
                link.threshold = l.threshold;
                link.parameters = l.parameters.clone();
            }
            pairs.push((s, t));
        }
        self.recalculate_listeners();
        pairs
    }

    fn recalculate_weights(&mut self, setup: &SocietySetup) {
        let people = &self.people;
        self.weights
            .recalculate(&setup.link_weights, |i| people[i].n_listeners);
    }
}

/// Links serialize as a plain list; keys are rebuilt on load.
mod link_list {
    use super::{Link, LinkKey};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        links: &BTreeMap<LinkKey, Link>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        s.collect_seq(links.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<BTreeMap<LinkKey, Link>, D::Error> {
        let links = Vec::<Link>::deserialize(d)?;
        Ok(links.into_iter().map(|l| (l.key(), l)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn chain(n: usize) -> Society {
        let mut soc = Society::new();
        for _ in 0..n {
            soc.push_inquirer(Inquirer::blank(0.0, 0.0));
        }
        for i in 1..n {
            soc.insert_link(Link::blank(i - 1, i));
        }
        soc
    }

    #[test]
    fn test_add_link_limited_and_merged() {
        let mut soc = chain(2);
        let mut setup = SocietySetup::default();
        let mut ctx = SimContext::from_seed(1);
        assert!(!soc.add_link(0, 1, &setup, &mut ctx));
        setup.limit_links_to_one_per_pair = false;
        assert!(soc.add_link(0, 1, &setup, &mut ctx));
        assert_eq!(soc.links.len(), 1);
        assert_eq!(soc.people[0].n_listeners, 1);
        assert!(soc.add_link(1, 0, &setup, &mut ctx));
        assert_eq!(soc.people[0].n_sources, 1);
        assert_eq!(soc.people[1].listeners, vec![0]);
    }

    #[test]
    fn test_remove_link_updates_counts() {
        let mut soc = chain(3);
        assert!(soc.remove_link(0, 1).is_some());
        assert!(soc.remove_link(0, 1).is_none());
        assert_eq!(soc.people[0].n_listeners, 0);
        assert!(soc.people[0].listeners.is_empty());
        assert_eq!(soc.people[1].n_sources, 0);
        assert_eq!(soc.people[2].n_sources, 1);
    }

    #[test]
    fn test_incoming_is_ordered_by_source() {
        let mut soc = chain(4);
        soc.insert_link(Link::blank(3, 1));
        soc.insert_link(Link::blank(2, 3));
        let sources: Vec<usize> = soc.incoming(1).map(|l| l.source).collect();
        assert_eq!(sources, vec![0, 3]);
        assert_eq!(soc.incoming(0).count(), 0);
    }

    #[test]
    fn test_recalculate_listeners_matches_links() {
        let mut soc = chain(4);
        soc.insert_link(Link::blank(3, 0));
        let before: Vec<(usize, usize)> = soc
            .people
            .iter()
            .map(|p| (p.n_listeners, p.n_sources))
            .collect();
        for p in soc.people.iter_mut() {
            p.n_listeners = 9;
            p.listeners.clear();
        }
        soc.recalculate_listeners();
        let after: Vec<(usize, usize)> = soc
            .people
            .iter()
            .map(|p| (p.n_listeners, p.n_sources))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_degrees_histogram_padding() {
        let mut soc = chain(3);
        soc.insert_link(Link::blank(0, 2));
        // out degrees: 2, 1, 0
        let out = soc.degrees(DegreeDirection::Out);
        assert_eq!(out, vec![1, 1, 1, 0]);
        let total = soc.degrees(DegreeDirection::Total);
        assert_eq!(total.iter().sum::<usize>(), 3);
        assert_eq!(total.len(), 4);
        soc.calculate_degrees();
        assert_eq!(soc.cached_degrees(DegreeDirection::Out), out.as_slice());
    }

    #[test]
    fn test_extract_and_merge() {
        let mut soc = chain(3);
        soc.link_mut(0, 1).unwrap().listen_chance = 0.7;
        let inqs: BTreeSet<usize> = [0, 1].into_iter().collect();
        let links: BTreeSet<(usize, usize)> = [(0, 1), (1, 2), (2, 0)].into_iter().collect();
        let f = soc.extract(&inqs, &links);
        assert_eq!(f.indices, vec![0, 1]);
        assert_eq!(f.links.len(), 2);

        let pairs = soc.merge(&f);
        assert_eq!(soc.len(), 5);
        // 0 -> 3, 1 -> 4, 2 stays
        assert_eq!(pairs, vec![(3, 4), (4, 2)]);
        assert_eq!(soc.link(3, 4).unwrap().listen_chance, 0.7);
        assert!(soc.link(4, 2).is_some());
        assert_eq!(soc.people[2].n_sources, 2);
    }

    #[test]
    fn test_serde_round_trip_rebuilds_keys() {
        let soc = chain(3);
        let json = serde_json::to_string(&soc).unwrap();
        let mut back: Society = serde_json::from_str(&json).unwrap();
        back.recalculate_listeners();
        assert_eq!(back.links.len(), 2);
        assert!(back.link(1, 2).is_some());
        assert_eq!(back.people[1].n_listeners, 1);
    }

    #[test]
    fn test_label() {
        let mut soc = chain(2);
        soc.people[1].name = "Gulliver".to_string();
        assert_eq!(soc.label(0), "1");
        assert_eq!(soc.label(1), "'Gulliver'");
    }
}
