use crate::config::{IndividualParams, NormalParams};
use crate::error::{Error, Result};
use crate::graph::PopulationGraph;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Normal;

/// Clamped normal distribution of an attribute in `[0, 1]`.
struct AttributeDist {
    normal: Normal<f64>,
}

impl AttributeDist {
    fn new(name: &str, params: &NormalParams) -> Result<Self> {
        let normal = Normal::new(params.mu, params.sigma)
            .map_err(|e| Error::config(format!("invalid {name} distribution: {e}")))?;
        Ok(Self { normal })
    }

    fn sample(&self, rng: &mut ChaCha12Rng) -> f64 {
        self.normal.sample(rng).clamp(0.0, 1.0)
    }
}

/// Draw every individual's immune level and vaccine effectiveness, then
/// every edge's contact chance.
pub fn assign(
    graph: &mut PopulationGraph,
    params: &IndividualParams,
    rng: &mut ChaCha12Rng,
) -> Result<()> {
    let immune_dist = AttributeDist::new("immune_level", &params.immune_level)?;
    let vaccine_dist = AttributeDist::new("vaccine_effectiveness", &params.vaccine_effectiveness)?;
    let contact_dist = AttributeDist::new("contact_chance", &params.contact_chance)?;

    for individual in graph.individuals_mut() {
        individual.immune_level = immune_dist.sample(rng);
        individual.vaccine_effectiveness = vaccine_dist.sample(rng);
    }

    for edge in graph.edges_mut() {
        edge.contact_chance = contact_dist.sample(rng);
    }

    Ok(())
}
