use crate::config::{Config, GraphType, check_num};
use crate::error::{Error, Result};
use crate::model::Individual;
use net_ensembles::rand::SeedableRng as _;
use net_ensembles::{AdjContainer, BAensemble, EmptyNode, ErEnsembleC, Graph, WithGraph};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_pcg::Pcg64;

/// Validated topology of the population graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Topology {
    /// Every pair is linked independently with probability `p`.
    ErdosRenyi { p: f64 },
    /// Preferential attachment, each new node attaching `m` edges.
    BarabasiAlbert { m: usize },
    /// Ring of degree `k` with each edge rewired with probability `p`.
    WattsStrogatz { k: usize, p: f64 },
}

impl Topology {
    /// Interpret `connections` for the given graph type and check its range.
    pub fn new(
        population_size: usize,
        graph_type: GraphType,
        connections: f64,
        rewiring_prob: f64,
    ) -> Result<Self> {
        let topology = match graph_type {
            GraphType::ErdosRenyi => {
                check_num("connections", connections, 0.0..=1.0)?;
                Self::ErdosRenyi { p: connections }
            }
            GraphType::BarabasiAlbert => {
                let m = as_count(connections)?;
                check_num("connections", m, 1..population_size)?;
                Self::BarabasiAlbert { m }
            }
            GraphType::WattsStrogatz => {
                let k = as_count(connections)?;
                check_num("connections", k, 2..population_size)?;
                if k % 2 != 0 {
                    return Err(Error::config(format!(
                        "connections must be even for a small-world graph, but is {k}"
                    )));
                }
                check_num("rewiring_prob", rewiring_prob, 0.0..=1.0)?;
                Self::WattsStrogatz {
                    k,
                    p: rewiring_prob,
                }
            }
        };
        Ok(topology)
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            cfg.population_size,
            cfg.graph_type,
            cfg.connections,
            cfg.rewiring_prob,
        )
    }
}

fn as_count(connections: f64) -> Result<usize> {
    if !connections.is_finite() || connections < 0.0 || connections.fract() != 0.0 {
        return Err(Error::config(format!(
            "connections must be a non-negative integer for this graph type, but is {connections}"
        )));
    }
    Ok(connections as usize)
}

/// Undirected contact between two individuals.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub a: usize,
    pub b: usize,
    /// Sampled contact chance; carried for future use, no effect on transmission.
    pub contact_chance: f64,
}

/// Population graph.
///
/// Individuals live in an arena indexed by their id; edges are stored once,
/// with `a < b`, and mirrored into per-individual neighbor lists.
#[derive(Debug, Clone)]
pub struct PopulationGraph {
    individuals: Vec<Individual>,
    edges: Vec<Edge>,
    neighbors: Vec<Vec<usize>>,
}

impl PopulationGraph {
    /// Generate a graph of `population_size` susceptible individuals.
    ///
    /// The generators draw from their own `Pcg64`, seeded from `rng`, so
    /// the run seed still fixes the topology. Attributes are left at their
    /// defaults; see [`crate::sampler`].
    pub fn build(
        population_size: usize,
        topology: Topology,
        rng: &mut ChaCha12Rng,
    ) -> Result<Self> {
        let topology_rng = Pcg64::seed_from_u64(rng.random());
        let graph = match topology {
            Topology::ErdosRenyi { p } => erdos_renyi(population_size, p, topology_rng),
            Topology::BarabasiAlbert { m } => barabasi_albert(population_size, m, topology_rng)?,
            Topology::WattsStrogatz { k, p } => watts_strogatz(population_size, k, p, rng)?,
        };
        Ok(Self::from_graph(&graph))
    }

    /// Copy the topology of `graph` into the arena.
    fn from_graph(graph: &Graph<EmptyNode>) -> Self {
        let neighbors: Vec<Vec<usize>> = (0..graph.vertex_count())
            .map(|id| {
                let mut adjacent: Vec<usize> = graph.container(id).neighbors().copied().collect();
                adjacent.sort_unstable();
                adjacent
            })
            .collect();
        let edges = neighbors
            .iter()
            .enumerate()
            .flat_map(|(a, adjacent)| {
                adjacent.iter().filter(move |&&b| a < b).map(move |&b| Edge {
                    a,
                    b,
                    contact_chance: 0.0,
                })
            })
            .collect();
        Self {
            individuals: vec![Individual::default(); neighbors.len()],
            edges,
            neighbors,
        }
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    pub fn individuals_mut(&mut self) -> &mut [Individual] {
        &mut self.individuals
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edges_mut(&mut self) -> &mut [Edge] {
        &mut self.edges
    }

    pub fn neighbors(&self, id: usize) -> &[usize] {
        &self.neighbors[id]
    }
}

fn link(graph: &mut Graph<EmptyNode>, u: usize, v: usize) -> Result<()> {
    graph
        .add_edge(u, v)
        .map_err(|e| Error::config(format!("failed to link {u} and {v}: {e:?}")))
}

fn erdos_renyi(n: usize, p: f64, rng: Pcg64) -> Graph<EmptyNode> {
    if n < 2 {
        return Graph::new(n);
    }
    // The ensemble is parametrized by its mean degree.
    let mean_degree = p * (n - 1) as f64;
    ErEnsembleC::<EmptyNode, Pcg64>::new(n, mean_degree, rng)
        .graph()
        .clone()
}

fn barabasi_albert(n: usize, m: usize, rng: Pcg64) -> Result<Graph<EmptyNode>> {
    if n > m + 1 {
        let source_n = m + 2;
        let ensemble = BAensemble::<EmptyNode, Pcg64>::new(n, rng, m, source_n);
        return Ok(ensemble.graph().clone());
    }
    // No room to grow: every node attaches to node 0.
    let mut graph = Graph::new(n);
    for v in 1..n {
        link(&mut graph, 0, v)?;
    }
    Ok(graph)
}

fn watts_strogatz(
    n: usize,
    k: usize,
    p: f64,
    rng: &mut ChaCha12Rng,
) -> Result<Graph<EmptyNode>> {
    let mut graph = Graph::new(n);
    for u in 0..n {
        for j in 1..=k / 2 {
            link(&mut graph, u, (u + j) % n)?;
        }
    }

    for j in 1..=k / 2 {
        for u in 0..n {
            if rng.random::<f64>() >= p {
                continue;
            }
            // Nowhere left to rewire to.
            if graph.degree(u).unwrap_or(0) >= n - 1 {
                continue;
            }
            // Adding fails for self loops and existing edges.
            loop {
                let w = rng.random_range(0..n);
                if w != u && graph.add_edge(u, w).is_ok() {
                    break;
                }
            }
            graph
                .remove_edge(u, (u + j) % n)
                .map_err(|e| Error::config(format!("failed to rewire {u}: {e:?}")))?;
        }
    }
    Ok(graph)
}

#[cfg(test)]
impl PopulationGraph {
    /// Graph with the given edges and default individuals.
    pub(crate) fn from_edges(population_size: usize, pairs: &[(usize, usize)]) -> Self {
        let mut graph = Graph::new(population_size);
        for &(u, v) in pairs {
            assert!(u != v && u < population_size && v < population_size);
            link(&mut graph, u, v).expect("distinct edge");
        }
        Self::from_graph(&graph)
    }
}
