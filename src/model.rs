use serde::{Deserialize, Serialize};

/// Compartment of an individual.
///
/// Transitions only go forward: `Susceptible -> Infected -> Recovered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum InfectionState {
    #[default]
    Susceptible,
    Infected,
    Recovered,
}

/// Individual of the population (node of the population graph).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Individual {
    pub state: InfectionState,

    pub immune_level: f64,
    pub vaccine_effectiveness: f64,

    /// Full days spent infected, meaningful only while infected.
    pub days_infected: u32,

    /// Superspreader status, redrawn every day by the superspreader model.
    pub is_superspreader_today: bool,
}

impl Individual {
    pub fn is_susceptible(&self) -> bool {
        self.state == InfectionState::Susceptible
    }

    pub fn is_infected(&self) -> bool {
        self.state == InfectionState::Infected
    }

    /// Multiplier applied to an infection probability by the individual's defenses.
    pub fn susceptibility(&self) -> f64 {
        (1.0 - self.immune_level) * (1.0 - self.vaccine_effectiveness)
    }
}

/// Aggregate counts at the end of a simulated day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub day: usize,
    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,
    /// Individuals that became infected during this day (0 on day 0).
    pub newly_infected: usize,
}

impl DailyRecord {
    pub fn total(&self) -> usize {
        self.susceptible + self.infected + self.recovered
    }
}

/// Output of a complete run.
///
/// Holds one record per day, day 0 included, and the final state of each
/// individual indexed by its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSeries {
    pub records: Vec<DailyRecord>,
    pub final_states: Vec<InfectionState>,
}

impl ResultSeries {
    pub fn population_size(&self) -> usize {
        self.final_states.len()
    }
}

/// Stored result of a named run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub simulation_name: String,
    pub series: ResultSeries,
}
