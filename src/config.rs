use crate::error::{Error, Result};
use crate::graph::Topology;
use crate::infection;
use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::{ffi::OsStr, fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Population graph topology.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphType {
    #[default]
    ErdosRenyi,
    BarabasiAlbert,
    WattsStrogatz,
}

/// Infection probability model variant.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Independent,
    Dependent,
    SuperspreaderDynamic,
}

/// Parameters of a normal distribution.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NormalParams {
    pub mu: f64,
    pub sigma: f64,
}

/// Distributions of the sampled individual and contact attributes.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndividualParams {
    pub immune_level: NormalParams,
    pub vaccine_effectiveness: NormalParams,
    /// Edge attribute, sampled but not used by any infection model.
    pub contact_chance: NormalParams,
}

/// Model-specific infection parameters.
///
/// Every key is optional here; the selected model checks that the keys
/// it needs are present when it is constructed.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfectionParams {
    pub base_prob_transmission: Option<f64>,
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub p_becomes_superspreader: Option<f64>,
    pub normal_base_infectivity: Option<f64>,
    pub superspreader_multiplier: Option<f64>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfectionModelConfig {
    #[serde(rename = "type")]
    pub model_type: ModelType,

    /// Number of days an individual stays infected.
    #[serde(default = "default_recovery_duration")]
    pub recovery_duration: i64,

    #[serde(default)]
    pub infection_parameters: InfectionParams,
}

fn default_recovery_duration() -> i64 {
    14
}

fn default_rewiring_prob() -> f64 {
    0.1
}

/// Simulation configuration parameters.
///
/// Loaded from a TOML or JSON file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Descriptive name of the run.
    pub simulation_name: Option<String>,
    /// Seed of the run's random number generator.
    pub seed: Option<u64>,

    /// Number of individuals.
    pub population_size: usize,

    #[serde(default)]
    pub graph_type: GraphType,
    /// Edge probability, attachment count or ring degree, depending on `graph_type`.
    pub connections: f64,
    /// Rewiring probability of the small-world topology.
    #[serde(default = "default_rewiring_prob")]
    pub rewiring_prob: f64,

    /// Probability that each individual is infected on day 0.
    pub initial_binomial_probability: f64,
    /// Number of simulated days after day 0.
    pub number_of_days: usize,

    pub individual_parameters: IndividualParams,
    pub infection_model: InfectionModelConfig,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The format is chosen by extension (`.toml` or `.json`).
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> anyhow::Result<Self> {
        let file = file.as_ref();
        let format = match file.extension().and_then(OsStr::to_str) {
            Some("toml") => Format::Toml,
            Some("json") => Format::Json,
            _ => bail!("config file must have a .toml or .json extension: {file:?}"),
        };
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config = Self::parse(&contents, format)
            .with_context(|| format!("failed to load config from {file:?}"))?;

        Ok(config)
    }

    /// Parse and validate a [`Config`] from a string.
    pub fn parse(contents: &str, format: Format) -> Result<Self> {
        let config: Config = match format {
            Format::Toml => toml::from_str(contents).map_err(|e| Error::config(e.to_string()))?,
            Format::Json => {
                serde_json::from_str(contents).map_err(|e| Error::config(e.to_string()))?
            }
        };

        config.validate()?;

        Ok(config)
    }

    /// Check every value against its domain.
    ///
    /// Also checks the topology and infection parameters, so that an invalid
    /// configuration never reaches the engine.
    pub fn validate(&self) -> Result<()> {
        check_num("population_size", self.population_size, 1..)?;
        check_num("rewiring_prob", self.rewiring_prob, 0.0..=1.0)?;
        check_num(
            "initial_binomial_probability",
            self.initial_binomial_probability,
            0.0..=1.0,
        )?;
        check_num("number_of_days", self.number_of_days, 1..)?;

        let params = &self.individual_parameters;
        check_normal("immune_level", &params.immune_level)?;
        check_normal("vaccine_effectiveness", &params.vaccine_effectiveness)?;
        check_normal("contact_chance", &params.contact_chance)?;

        check_num(
            "recovery_duration",
            self.infection_model.recovery_duration,
            1..,
        )?;

        Topology::from_config(self)?;
        infection::from_config(&self.infection_model)?;

        Ok(())
    }

    /// Name of the run, falling back to `default` when none is configured.
    pub fn name_or(&self, default: &str) -> String {
        self.simulation_name
            .clone()
            .unwrap_or_else(|| default.to_string())
    }
}

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

pub(crate) fn check_num<T, R>(name: &str, num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        return Err(Error::config(format!(
            "{name} must be in the range {range:?}, but is {num:?}"
        )));
    }
    Ok(())
}

pub(crate) fn check_finite(name: &str, num: f64) -> Result<()> {
    if !num.is_finite() {
        return Err(Error::config(format!("{name} must be finite, but is {num}")));
    }
    Ok(())
}

fn check_normal(name: &str, params: &NormalParams) -> Result<()> {
    check_finite(&format!("{name}.mu"), params.mu)?;
    check_finite(&format!("{name}.sigma"), params.sigma)?;
    check_num(&format!("{name}.sigma"), params.sigma, 0.0..)?;
    Ok(())
}
