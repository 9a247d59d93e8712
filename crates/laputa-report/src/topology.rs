//! Network Topology Snapshots
//!
//! Lightweight copies of a society's graph, taken during a batch run, with
//! a Pajek text rendering for external network tools.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// A node position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub x: f64,
    pub y: f64,
}

/// A directed edge with zero-based endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopologyEdge {
    pub source: usize,
    pub target: usize,
    pub listen_chance: f64,
    /// Expected trust of the link
    pub trust: f64,
}

/// Which value goes into the Pajek arc weight column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeWeighting {
    #[default]
    None,
    ListenChance,
    Trust,
}

/// Snapshot of a society graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkTopology {
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
}

impl NetworkTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, x: f64, y: f64) {
        self.nodes.push(TopologyNode { x, y });
    }

    pub fn add_edge(&mut self, source: usize, target: usize, listen_chance: f64, trust: f64) {
        self.edges.push(TopologyEdge {
            source,
            target,
            listen_chance,
            trust,
        });
    }

    /// Renders the graph in Pajek `.net` format.
    ///
    /// Coordinates are rescaled into [0.05, 0.95]. Only edges with a listen
    /// chance above `min_listen` are written.
    pub fn pajek(&self, min_listen: f64, weighting: EdgeWeighting) -> String {
        let mut out = String::new();
        let (min_x, range_x) = axis_range(self.nodes.iter().map(|n| n.x));
        let (min_y, range_y) = axis_range(self.nodes.iter().map(|n| n.y));

        let _ = write!(out, "*Vertices {}\r\n", self.nodes.len());
        for (i, node) in self.nodes.iter().enumerate() {
            let x = (node.x - min_x) / (range_x / 0.9) + 0.05;
            let y = (node.y - min_y) / (range_y / 0.9) + 0.05;
            let _ = write!(out, "{} \"{}\" {:.4} {:.4}\r\n", i + 1, i + 1, x, y);
        }

        let arcs: Vec<&TopologyEdge> = self
            .edges
            .iter()
            .filter(|e| e.listen_chance > min_listen)
            .collect();
        let _ = write!(out, "*Arcs {}\r\n", arcs.len());
        for edge in arcs {
            let _ = write!(out, "{} {}", edge.source + 1, edge.target + 1);
            match weighting {
                EdgeWeighting::None => {}
                EdgeWeighting::ListenChance => {
                    let _ = write!(out, " {:.4}", edge.listen_chance);
                }
                EdgeWeighting::Trust => {
                    let _ = write!(out, " {:.4}", edge.trust);
                }
            }
            out.push_str("\r\n");
        }
        out
    }
}

fn axis_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    let range = hi - lo;
    (lo, if range > 0.0 { range } else { 1.0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> NetworkTopology {
        let mut topo = NetworkTopology::new();
        topo.add_node(0.0, 0.0);
        topo.add_node(100.0, 0.0);
        topo.add_node(50.0, 100.0);
        topo.add_edge(0, 1, 0.5, 0.7);
        topo.add_edge(1, 2, 0.0, 0.4);
        topo.add_edge(2, 0, 0.9, 0.6);
        topo
    }

    #[test]
    fn test_pajek_header_and_vertices() {
        let text = triangle().pajek(0.0, EdgeWeighting::None);
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines[0], "*Vertices 3");
        assert_eq!(lines[1], "1 \"1\" 0.0500 0.0500");
        assert_eq!(lines[2], "2 \"2\" 0.9500 0.0500");
    }

    #[test]
    fn test_pajek_filters_quiet_links() {
        let text = triangle().pajek(0.0, EdgeWeighting::ListenChance);
        assert!(text.contains("*Arcs 2\r\n"));
        assert!(text.contains("1 2 0.5000\r\n"));
        assert!(text.contains("3 1 0.9000\r\n"));
        assert!(!text.contains("2 3"));
    }

    #[test]
    fn test_pajek_trust_weights() {
        let text = triangle().pajek(0.6, EdgeWeighting::Trust);
        assert!(text.contains("*Arcs 1\r\n3 1 0.6000\r\n"));
    }

    #[test]
    fn test_single_node_has_no_zero_division() {
        let mut topo = NetworkTopology::new();
        topo.add_node(5.0, 5.0);
        let text = topo.pajek(0.0, EdgeWeighting::None);
        assert!(text.contains("1 \"1\" 0.0500 0.0500"));
    }
}
