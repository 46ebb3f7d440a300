/*!
The social network over farmers.

An undirected graph without self-loops whose nodes are agent ids. It is built
once before the first season and then only read, by SHARED farmers looking up
their peers. The edges go into a petgraph graph, and the sorted neighbour
lists the decision phase reads are taken from that graph, one per agent id.
*/
use std::collections::BTreeSet;

use petgraph::graph::{NodeIndex, UnGraph};
use rand::Rng;
use serde_derive::{Deserialize, Serialize};
use tracing::warn;

use crate::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Watts-Strogatz ring lattice with random rewiring
    SmallWorld,
    /// Erdős-Rényi graph with the edge probability matching the degree
    Random,
    /// Barabási-Albert preferential attachment
    ScaleFree,
}

impl std::str::FromStr for Topology {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "small_world" | "smallworld" => Ok(Topology::SmallWorld),
            "random" => Ok(Topology::Random),
            "scale_free" | "scalefree" => Ok(Topology::ScaleFree),
            other => Err(format!("unknown topology {:?}", other)),
        }
    }
}

pub type SocialGraph = UnGraph<AgentId, ()>;

#[derive(Debug, Clone)]
pub struct SocialNetwork {
    graph: SocialGraph,
    neighbors: Vec<Vec<AgentId>>,
}

fn ordered(a: AgentId, b: AgentId) -> (AgentId, AgentId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Ring lattice where every node is linked to its `k/2` successors, then
/// every lattice edge is rewired with probability `p` to a random node.
fn small_world_edges<R: Rng>(n: usize, k: usize, p: f64, rng: &mut R) -> BTreeSet<(AgentId, AgentId)> {
    let mut edges = BTreeSet::new();
    let mut lattice = Vec::with_capacity(n * k / 2);
    for i in 0..n {
        for j in 1..=(k / 2) {
            let e = ordered(i, (i + j) % n);
            if e.0 != e.1 && edges.insert(e) {
                lattice.push((i, (i + j) % n));
            }
        }
    }

    for (source, target) in lattice {
        if !rng.gen_bool(p) {
            continue;
        }
        let candidates: Vec<AgentId> = (0..n)
            .filter(|&c| c != source && !edges.contains(&ordered(source, c)))
            .collect();
        if candidates.is_empty() {
            continue;
        }
        let new_target = candidates[rng.gen_range(0..candidates.len())];
        edges.remove(&ordered(source, target));
        edges.insert(ordered(source, new_target));
    }
    edges
}

fn random_edges<R: Rng>(n: usize, k: usize, rng: &mut R) -> BTreeSet<(AgentId, AgentId)> {
    let mut edges = BTreeSet::new();
    if n < 2 {
        return edges;
    }
    let p = (k as f64 / (n - 1) as f64).min(1.0);
    for i in 0..n {
        for j in (i + 1)..n {
            if rng.gen_bool(p) {
                edges.insert((i, j));
            }
        }
    }
    edges
}

/// Every new node attaches to `m` distinct existing nodes with probability
/// proportional to their degree, starting from a complete core of `m + 1`.
fn scale_free_edges<R: Rng>(n: usize, m: usize, rng: &mut R) -> BTreeSet<(AgentId, AgentId)> {
    let mut edges = BTreeSet::new();
    let core = (m + 1).min(n);
    // Every node appears once per incident edge
    let mut repeated: Vec<AgentId> = Vec::new();
    for i in 0..core {
        for j in (i + 1)..core {
            edges.insert((i, j));
            repeated.push(i);
            repeated.push(j);
        }
    }
    for new in core..n {
        let mut targets = BTreeSet::new();
        while targets.len() < m {
            targets.insert(repeated[rng.gen_range(0..repeated.len())]);
        }
        for t in targets {
            edges.insert(ordered(new, t));
            repeated.push(new);
            repeated.push(t);
        }
    }
    edges
}

impl SocialNetwork {
    /**
    Build a network over agents `0..n`.

    The requested average degree is clipped to what `n` nodes can realise.

    ```rust
    use model::socialnetwork::{SocialNetwork, Topology};
    use model::stochasticity::{substream, DrawPurpose};

    let mut rng = substream(42, u64::MAX, 0, DrawPurpose::Network);
    let net = SocialNetwork::build(10, Topology::SmallWorld, 4, 0.0, &mut rng);
    assert_eq!(net.neighbors(0), &[1, 2, 8, 9]);
    assert_eq!(net.edge_count(), 20);
    ```
     */
    pub fn build<R: Rng>(
        n: usize,
        topology: Topology,
        average_degree: usize,
        rewiring_probability: f64,
        rng: &mut R,
    ) -> SocialNetwork {
        let max_degree = n.saturating_sub(1);
        let degree = if average_degree > max_degree {
            if n > 0 {
                warn!(
                    requested = average_degree,
                    realised = max_degree,
                    agents = n,
                    "Average degree clipped to the number of agents"
                );
            }
            max_degree
        } else {
            average_degree
        };

        let edges = match topology {
            Topology::SmallWorld => small_world_edges(n, degree, rewiring_probability, rng),
            Topology::Random => random_edges(n, degree, rng),
            Topology::ScaleFree if degree == 0 => BTreeSet::new(),
            Topology::ScaleFree => scale_free_edges(n, std::cmp::max(1, degree / 2), rng),
        };

        let mut graph = SocialGraph::with_capacity(n, edges.len());
        let nodes: Vec<NodeIndex> = (0..n).map(|i| graph.add_node(i)).collect();
        for &(a, b) in edges.iter() {
            graph.add_edge(nodes[a], nodes[b], ());
        }
        let neighbors = nodes
            .iter()
            .map(|&node| {
                let mut list: Vec<AgentId> = graph.neighbors(node).map(|m| graph[m]).collect();
                list.sort_unstable();
                list
            })
            .collect();
        SocialNetwork { graph, neighbors }
    }

    /// Agents one edge away from `agent`, in ascending order.
    pub fn neighbors(&self, agent: AgentId) -> &[AgentId] {
        &self.neighbors[agent]
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn mean_degree(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            2.0 * self.edge_count() as f64 / self.len() as f64
        }
    }
}
