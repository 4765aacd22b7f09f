use crate::config::Config;
use crate::error::{Error, Result};
use crate::graph::{PopulationGraph, Topology};
use crate::infection::{self, InfectionModel};
use crate::model::{DailyRecord, InfectionState, ResultSeries};
use crate::sampler;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Bernoulli;

/// Simulation engine.
///
/// Owns the population graph, the infection model and the random number
/// generator of a single run, and advances the epidemic one day at a time.
pub struct Engine {
    cfg: Config,
    graph: PopulationGraph,
    model: Box<dyn InfectionModel>,
    rng: ChaCha12Rng,
    recovery_duration: u32,
    day: usize,
    records: Vec<DailyRecord>,
}

impl Engine {
    /// Create a new `Engine` from a configuration.
    ///
    /// Builds the population graph, samples its attributes and seeds the
    /// day-0 infections. Every configuration error surfaces here, before any
    /// day is simulated.
    pub fn new(cfg: Config) -> Result<Self> {
        cfg.validate()?;

        let topology = Topology::from_config(&cfg)?;
        let model = infection::from_config(&cfg.infection_model)?;
        let recovery_duration = u32::try_from(cfg.infection_model.recovery_duration)
            .map_err(|e| Error::config(format!("invalid recovery_duration: {e}")))?;

        let seed = cfg.seed.unwrap_or_else(rand::random::<u64>);
        let mut rng = ChaCha12Rng::seed_from_u64(seed);
        log::info!("building {:?} graph (seed {seed})", cfg.graph_type);

        let mut graph = PopulationGraph::build(cfg.population_size, topology, &mut rng)?;
        sampler::assign(&mut graph, &cfg.individual_parameters, &mut rng)?;
        log::debug!(
            "graph has {} individuals and {} edges",
            graph.len(),
            graph.edges().len()
        );

        let mut engine = Self {
            graph,
            model,
            rng,
            recovery_duration,
            day: 0,
            records: Vec::with_capacity(cfg.number_of_days + 1),
            cfg,
        };
        engine.seed(engine.cfg.initial_binomial_probability)?;

        Ok(engine)
    }

    /// Infect each individual independently with probability `prob` and
    /// record day 0.
    fn seed(&mut self, prob: f64) -> Result<()> {
        let seed_dist = Bernoulli::new(prob)
            .map_err(|e| Error::config(format!("invalid initial_binomial_probability: {e}")))?;

        for individual in self.graph.individuals_mut() {
            if seed_dist.sample(&mut self.rng) {
                individual.state = InfectionState::Infected;
                individual.days_infected = 0;
            }
        }

        let record = self.count(0);
        log::debug!("{record:?}");
        self.records.push(record);
        Ok(())
    }

    /// Advance the simulation by one day and return the resulting counts.
    pub fn step(&mut self) -> Result<DailyRecord> {
        self.day += 1;

        self.model.begin_day(&mut self.graph, &mut self.rng);

        // Draw every infection decision before writing any state, so that all
        // decisions see the individuals infected at the start of the day.
        let mut newly_infected = Vec::new();
        let mut infected_neighbors = Vec::new();
        let individuals = self.graph.individuals();
        for (id, individual) in individuals.iter().enumerate() {
            if !individual.is_susceptible() {
                continue;
            }

            infected_neighbors.clear();
            infected_neighbors.extend(
                self.graph
                    .neighbors(id)
                    .iter()
                    .map(|&other| &individuals[other])
                    .filter(|other| other.is_infected()),
            );
            if infected_neighbors.is_empty() {
                continue;
            }

            let prob = self
                .model
                .infection_probability(individual, &infected_neighbors)?;
            let infection_dist = Bernoulli::new(prob)
                .map_err(|e| Error::computation(format!("invalid infection probability: {e}")))?;
            if infection_dist.sample(&mut self.rng) {
                newly_infected.push(id);
            }
        }

        // Only individuals infected at the start of the day progress.
        for individual in self.graph.individuals_mut() {
            if individual.is_infected() {
                individual.days_infected += 1;
                if individual.days_infected >= self.recovery_duration {
                    individual.state = InfectionState::Recovered;
                }
            }
        }

        let individuals = self.graph.individuals_mut();
        for &id in &newly_infected {
            individuals[id].state = InfectionState::Infected;
            individuals[id].days_infected = 0;
        }

        let record = self.count(newly_infected.len());
        log::debug!("{record:?}");
        self.records.push(record);

        Ok(record)
    }

    /// Run every configured day and return the full series.
    pub fn run(mut self) -> Result<ResultSeries> {
        let n_days = self.cfg.number_of_days;
        for _ in 0..n_days {
            self.step()?;
        }

        let final_states = self
            .graph
            .individuals()
            .iter()
            .map(|individual| individual.state)
            .collect();

        log::info!(
            "simulated {n_days} days with the {} model",
            self.model.name()
        );

        Ok(ResultSeries {
            records: self.records,
            final_states,
        })
    }

    fn count(&self, newly_infected: usize) -> DailyRecord {
        let mut record = DailyRecord {
            day: self.day,
            susceptible: 0,
            infected: 0,
            recovered: 0,
            newly_infected,
        };
        for individual in self.graph.individuals() {
            match individual.state {
                InfectionState::Susceptible => record.susceptible += 1,
                InfectionState::Infected => record.infected += 1,
                InfectionState::Recovered => record.recovered += 1,
            }
        }
        debug_assert_eq!(record.total(), self.graph.len());
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::base_config;
    use crate::config::{GraphType, InfectionParams, ModelType, NormalParams};

    fn states(engine: &Engine) -> Vec<InfectionState> {
        engine
            .graph
            .individuals()
            .iter()
            .map(|individual| individual.state)
            .collect()
    }

    fn defenseless(cfg: &mut Config) {
        let zero = NormalParams { mu: 0.0, sigma: 0.0 };
        cfg.individual_parameters.immune_level = zero;
        cfg.individual_parameters.vaccine_effectiveness = zero;
    }

    fn set_model(cfg: &mut Config, model_type: ModelType) {
        cfg.infection_model.model_type = model_type;
        cfg.infection_model.infection_parameters = InfectionParams {
            base_prob_transmission: Some(0.3),
            alpha: Some(0.5),
            beta: Some(2.0),
            p_becomes_superspreader: Some(0.1),
            normal_base_infectivity: Some(0.1),
            superspreader_multiplier: Some(8.0),
        };
    }

    /// Engine on a fixed path-shaped graph with only `infected` seeded.
    fn engine_on_path(n: usize, infected: &[usize], recovery_duration: i64) -> Engine {
        let mut cfg = base_config();
        defenseless(&mut cfg);
        cfg.initial_binomial_probability = 0.0;
        cfg.infection_model.recovery_duration = recovery_duration;
        cfg.infection_model.infection_parameters.base_prob_transmission = Some(1.0);

        let mut engine = Engine::new(cfg).expect("valid config");
        let pairs: Vec<_> = (1..n).map(|v| (v - 1, v)).collect();
        engine.graph = PopulationGraph::from_edges(n, &pairs);
        for &id in infected {
            engine.graph.individuals_mut()[id].state = InfectionState::Infected;
        }
        engine
    }

    #[test]
    fn counts_always_sum_to_population() {
        for (graph_type, connections) in [
            (GraphType::ErdosRenyi, 0.08),
            (GraphType::BarabasiAlbert, 2.0),
            (GraphType::WattsStrogatz, 4.0),
        ] {
            for model_type in [
                ModelType::Independent,
                ModelType::Dependent,
                ModelType::SuperspreaderDynamic,
            ] {
                let mut cfg = base_config();
                cfg.graph_type = graph_type;
                cfg.connections = connections;
                set_model(&mut cfg, model_type);

                let series = Engine::new(cfg.clone())
                    .and_then(Engine::run)
                    .expect("run completes");
                assert_eq!(series.records.len(), cfg.number_of_days + 1);
                assert_eq!(series.population_size(), cfg.population_size);
                for (day, record) in series.records.iter().enumerate() {
                    assert_eq!(record.day, day);
                    assert_eq!(record.total(), cfg.population_size);
                }
            }
        }
    }

    #[test]
    fn states_only_move_forward() {
        let mut cfg = base_config();
        cfg.connections = 0.15;
        set_model(&mut cfg, ModelType::SuperspreaderDynamic);
        let mut engine = Engine::new(cfg.clone()).expect("valid config");

        let mut previous = states(&engine);
        for _ in 0..cfg.number_of_days {
            engine.step().expect("step completes");
            let current = states(&engine);
            for (before, after) in previous.iter().zip(&current) {
                assert!(after >= before, "{before:?} went back to {after:?}");
                assert!(
                    !(*before == InfectionState::Susceptible
                        && *after == InfectionState::Recovered),
                    "recovered without being infected"
                );
            }
            previous = current;
        }
    }

    #[test]
    fn same_seed_same_series() {
        let mut cfg = base_config();
        cfg.graph_type = GraphType::WattsStrogatz;
        cfg.connections = 4.0;
        set_model(&mut cfg, ModelType::SuperspreaderDynamic);

        let a = Engine::new(cfg.clone())
            .and_then(Engine::run)
            .expect("run completes");
        let b = Engine::new(cfg).and_then(Engine::run).expect("run completes");
        assert_eq!(a, b);
    }

    #[test]
    fn seeding_extremes() {
        let mut cfg = base_config();
        cfg.initial_binomial_probability = 0.0;
        let engine = Engine::new(cfg.clone()).expect("valid config");
        assert_eq!(engine.records[0].infected, 0);

        cfg.initial_binomial_probability = 1.0;
        let engine = Engine::new(cfg.clone()).expect("valid config");
        assert_eq!(engine.records[0].infected, cfg.population_size);
        assert_eq!(engine.records[0].susceptible, 0);
    }

    #[test]
    fn no_edges_no_infections() {
        let mut cfg = base_config();
        cfg.connections = 0.0;
        cfg.initial_binomial_probability = 0.0;
        set_model(&mut cfg, ModelType::Dependent);

        let series = Engine::new(cfg.clone())
            .and_then(Engine::run)
            .expect("run completes");
        for record in &series.records {
            assert_eq!(record.susceptible, cfg.population_size);
            assert_eq!(record.newly_infected, 0);
        }
    }

    #[test]
    fn no_exposure_no_dose_response_infection() {
        let mut cfg = base_config();
        cfg.connections = 1.0;
        cfg.initial_binomial_probability = 0.0;
        cfg.infection_model.model_type = ModelType::Dependent;
        cfg.infection_model.infection_parameters = InfectionParams {
            alpha: Some(1.0),
            beta: Some(-20.0),
            ..Default::default()
        };

        let series = Engine::new(cfg).and_then(Engine::run).expect("run completes");
        assert!(series.records.iter().all(|record| record.infected == 0));
    }

    #[test]
    fn disconnected_population_recovers_together() {
        for model_type in [
            ModelType::Independent,
            ModelType::Dependent,
            ModelType::SuperspreaderDynamic,
        ] {
            let mut cfg = base_config();
            cfg.population_size = 100;
            cfg.connections = 0.0;
            cfg.initial_binomial_probability = 1.0;
            cfg.number_of_days = 20;
            cfg.infection_model.recovery_duration = 14;
            set_model(&mut cfg, model_type);

            let series = Engine::new(cfg).and_then(Engine::run).expect("run completes");
            let records = &series.records;
            assert_eq!((records[0].infected, records[0].susceptible), (100, 0));
            assert_eq!((records[13].infected, records[13].recovered), (100, 0));
            assert_eq!((records[14].infected, records[14].recovered), (0, 100));
            assert!(
                series
                    .final_states
                    .iter()
                    .all(|&state| state == InfectionState::Recovered)
            );
        }
    }

    #[test]
    fn infection_does_not_cascade_within_a_day() {
        use InfectionState::*;
        let mut engine = engine_on_path(4, &[0], 10);

        engine.step().expect("step completes");
        assert_eq!(
            states(&engine),
            vec![Infected, Infected, Susceptible, Susceptible]
        );

        engine.step().expect("step completes");
        assert_eq!(
            states(&engine),
            vec![Infected, Infected, Infected, Susceptible]
        );
    }

    #[test]
    fn recovery_after_exact_duration() {
        let recovery_duration = 3;
        let mut engine = engine_on_path(2, &[0], recovery_duration);

        // Individual 0 infected on day 0, individual 1 on day 1.
        let mut recovered_on = [None, None];
        for day in 1..=6 {
            engine.step().expect("step completes");
            for (id, state) in states(&engine).into_iter().enumerate() {
                if state == InfectionState::Recovered && recovered_on[id].is_none() {
                    recovered_on[id] = Some(day);
                }
            }
        }
        assert_eq!(recovered_on, [Some(3), Some(4)]);
    }

    #[test]
    fn recovering_individual_still_transmits_that_day() {
        let mut engine = engine_on_path(2, &[0], 1);
        let record = engine.step().expect("step completes");
        assert_eq!(
            states(&engine),
            vec![InfectionState::Recovered, InfectionState::Infected]
        );
        assert_eq!(record.newly_infected, 1);
    }

    #[test]
    fn invalid_config_fails_before_any_day() {
        let mut cfg = base_config();
        cfg.infection_model.recovery_duration = 0;
        assert!(matches!(Engine::new(cfg), Err(Error::Configuration(_))));

        let mut cfg = base_config();
        cfg.infection_model.infection_parameters.base_prob_transmission = None;
        assert!(matches!(Engine::new(cfg), Err(Error::Configuration(_))));
    }
}
