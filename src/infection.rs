//! Infection probability models.
//!
//! A model is selected once from the configuration and then queried for every
//! susceptible individual with at least one infected neighbor, every day.

use crate::config::{InfectionModelConfig, InfectionParams, ModelType, check_finite, check_num};
use crate::error::{Error, Result};
use crate::graph::PopulationGraph;
use crate::model::Individual;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Bernoulli;

pub trait InfectionModel {
    fn name(&self) -> &'static str;

    /// Draw any per-day state before probabilities are computed.
    fn begin_day(&self, _graph: &mut PopulationGraph, _rng: &mut ChaCha12Rng) {}

    /// Probability that `individual` becomes infected today, given the
    /// neighbors that were infected at the start of the day.
    ///
    /// Must return 0 when `infected_neighbors` is empty.
    fn infection_probability(
        &self,
        individual: &Individual,
        infected_neighbors: &[&Individual],
    ) -> Result<f64>;
}

/// Build the model selected by `cfg`, checking its parameters.
pub fn from_config(cfg: &InfectionModelConfig) -> Result<Box<dyn InfectionModel>> {
    let params = &cfg.infection_parameters;
    let model: Box<dyn InfectionModel> = match cfg.model_type {
        ModelType::Independent => Box::new(Independent::new(params)?),
        ModelType::Dependent => Box::new(Dependent::new(params)?),
        ModelType::SuperspreaderDynamic => Box::new(SuperspreaderDynamic::new(params)?),
    };
    Ok(model)
}

fn require(value: Option<f64>, name: &str, model_type: ModelType) -> Result<f64> {
    value.ok_or_else(|| {
        Error::config(format!(
            "infection parameter {name} is required by the {model_type:?} model"
        ))
    })
}

/// Probability of at least one success among independent trials.
fn combine(probs: impl Iterator<Item = f64>) -> f64 {
    1.0 - probs.map(|p| 1.0 - p).product::<f64>()
}

fn checked(model: &dyn InfectionModel, prob: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&prob) {
        return Err(Error::computation(format!(
            "{} model produced probability {prob} outside [0, 1]",
            model.name()
        )));
    }
    Ok(prob)
}

/// Every infected neighbor is an independent chance of transmission.
#[derive(Debug)]
pub struct Independent {
    base_prob_transmission: f64,
}

impl Independent {
    pub fn new(params: &InfectionParams) -> Result<Self> {
        let base_prob_transmission = require(
            params.base_prob_transmission,
            "base_prob_transmission",
            ModelType::Independent,
        )?;
        check_num("base_prob_transmission", base_prob_transmission, 0.0..=1.0)?;
        Ok(Self {
            base_prob_transmission,
        })
    }
}

impl InfectionModel for Independent {
    fn name(&self) -> &'static str {
        "independent"
    }

    fn infection_probability(
        &self,
        individual: &Individual,
        infected_neighbors: &[&Individual],
    ) -> Result<f64> {
        let p = self.base_prob_transmission * individual.susceptibility();
        let prob = combine(infected_neighbors.iter().map(|_| p));
        checked(self, prob)
    }
}

/// Sigmoid dose-response on the number of infected neighbors.
#[derive(Debug)]
pub struct Dependent {
    alpha: f64,
    beta: f64,
}

impl Dependent {
    pub fn new(params: &InfectionParams) -> Result<Self> {
        let alpha = require(params.alpha, "alpha", ModelType::Dependent)?;
        let beta = require(params.beta, "beta", ModelType::Dependent)?;
        check_finite("alpha", alpha)?;
        check_finite("beta", beta)?;
        Ok(Self { alpha, beta })
    }
}

impl InfectionModel for Dependent {
    fn name(&self) -> &'static str {
        "dependent"
    }

    fn infection_probability(
        &self,
        individual: &Individual,
        infected_neighbors: &[&Individual],
    ) -> Result<f64> {
        let k = infected_neighbors.len();
        if k == 0 {
            return Ok(0.0);
        }
        let sigmoid = 1.0 / (1.0 + (-self.alpha * k as f64 + self.beta).exp());
        checked(self, sigmoid * individual.susceptibility())
    }
}

/// Independent transmission where each infected individual may be a
/// superspreader for the day.
#[derive(Debug)]
pub struct SuperspreaderDynamic {
    superspreader_dist: Bernoulli,
    normal_base_infectivity: f64,
    superspreader_multiplier: f64,
}

impl SuperspreaderDynamic {
    pub fn new(params: &InfectionParams) -> Result<Self> {
        let model_type = ModelType::SuperspreaderDynamic;
        let p_becomes_superspreader = require(
            params.p_becomes_superspreader,
            "p_becomes_superspreader",
            model_type,
        )?;
        let normal_base_infectivity = require(
            params.normal_base_infectivity,
            "normal_base_infectivity",
            model_type,
        )?;
        let superspreader_multiplier = require(
            params.superspreader_multiplier,
            "superspreader_multiplier",
            model_type,
        )?;

        check_num("p_becomes_superspreader", p_becomes_superspreader, 0.0..=1.0)?;
        check_num("normal_base_infectivity", normal_base_infectivity, 0.0..=1.0)?;
        check_finite("superspreader_multiplier", superspreader_multiplier)?;
        check_num("superspreader_multiplier", superspreader_multiplier, 0.0..)?;

        let superspreader_dist = Bernoulli::new(p_becomes_superspreader)
            .map_err(|e| Error::config(format!("invalid p_becomes_superspreader: {e}")))?;

        Ok(Self {
            superspreader_dist,
            normal_base_infectivity,
            superspreader_multiplier,
        })
    }

    fn infectivity(&self, spreader: &Individual) -> f64 {
        if spreader.is_superspreader_today {
            self.normal_base_infectivity * self.superspreader_multiplier
        } else {
            self.normal_base_infectivity
        }
    }
}

impl InfectionModel for SuperspreaderDynamic {
    fn name(&self) -> &'static str {
        "superspreader_dynamic"
    }

    fn begin_day(&self, graph: &mut PopulationGraph, rng: &mut ChaCha12Rng) {
        for individual in graph.individuals_mut() {
            individual.is_superspreader_today =
                individual.is_infected() && self.superspreader_dist.sample(rng);
        }
    }

    fn infection_probability(
        &self,
        individual: &Individual,
        infected_neighbors: &[&Individual],
    ) -> Result<f64> {
        let susceptibility = individual.susceptibility();
        let prob = combine(
            infected_neighbors
                .iter()
                .map(|spreader| (self.infectivity(spreader) * susceptibility).min(1.0)),
        );
        checked(self, prob)
    }
}
