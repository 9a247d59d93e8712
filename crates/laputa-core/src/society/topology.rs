//! Layout and snapshots for renderers.

use std::f64::consts::PI;

use laputa_report::NetworkTopology;

use super::Society;
use crate::context::SimContext;

/// Diameter of a drawn inquirer.
const INQUIRER_CIRCLE_SIZE: f64 = 15.0;

/// Distance between rings, and the arc length one inquirer takes on a ring.
const RING_SPACING: f64 = INQUIRER_CIRCLE_SIZE * 3.0;

impl Society {
    /// Places inquirers on concentric rings around `(mid_x, mid_y)`, the
    /// best connected in the middle. Only positions change.
    pub fn organise(&mut self, mid_x: f64, mid_y: f64, ctx: &mut SimContext) {
        let degree: Vec<usize> = self
            .people
            .iter()
            .map(|p| p.n_listeners + p.n_sources)
            .collect();
        let max = degree.iter().copied().max().unwrap_or(0);
        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); max + 1];
        for (i, &d) in degree.iter().enumerate() {
            groups[d].push(i);
        }
        groups.retain(|g| !g.is_empty());

        let mut r: f64 = 0.0;
        for group in groups.iter().rev() {
            let count = group.len() as f64;
            let min_radius = if group.len() <= 1 {
                0.0
            } else if group.len() <= 4 {
                4.0 * RING_SPACING / (2.0 * PI)
            } else {
                count * RING_SPACING / (2.0 * PI)
            };
            r = r.max(min_radius);
            let mut v = ctx.uniform() * 2.0 * PI / count;
            for &i in group {
                self.people[i].x = mid_x + v.cos() * r;
                self.people[i].y = mid_y - v.sin() * r;
                v += 2.0 * PI / count;
            }
            r += RING_SPACING;
        }
    }

    /// Copies positions and links into a renderer-neutral snapshot.
    pub fn topology(&self) -> NetworkTopology {
        let mut t = NetworkTopology::new();
        for p in &self.people {
            t.add_node(p.x, p.y);
        }
        for l in self.links.values() {
            t.add_edge(
                l.source,
                l.target,
                l.listen_chance,
                l.trust.expectation() as f64,
            );
        }
        t
    }
}
