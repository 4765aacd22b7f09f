use crate::model::{ResultSeries, RunOutput};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Run-level metrics used to compare runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub simulation_name: String,
    pub population_size: usize,
    pub peak_infected: usize,
    pub peak_infected_percentage: f64,
    /// First day on which the peak is reached.
    pub day_of_peak: usize,
    pub total_ever_infected: usize,
    pub final_susceptible: usize,
    pub final_recovered: usize,
}

impl SummaryMetrics {
    pub fn new(simulation_name: &str, series: &ResultSeries) -> Self {
        let population_size = series.population_size();

        let mut peak_infected = 0;
        let mut day_of_peak = 0;
        for record in &series.records {
            if record.infected > peak_infected {
                peak_infected = record.infected;
                day_of_peak = record.day;
            }
        }

        let peak_infected_percentage = if population_size > 0 {
            100.0 * peak_infected as f64 / population_size as f64
        } else {
            0.0
        };

        let initially_infected = series.records.first().map_or(0, |r| r.infected);
        let total_ever_infected = initially_infected
            + series
                .records
                .iter()
                .map(|record| record.newly_infected)
                .sum::<usize>();

        let last = series.records.last();

        Self {
            simulation_name: simulation_name.to_string(),
            population_size,
            peak_infected,
            peak_infected_percentage,
            day_of_peak,
            total_ever_infected,
            final_susceptible: last.map_or(population_size, |r| r.susceptible),
            final_recovered: last.map_or(0, |r| r.recovered),
        }
    }
}

/// Collects the summary metrics of several runs.
#[derive(Default)]
pub struct Analyzer {
    rows: Vec<SummaryMetrics>,
}

impl Analyzer {
    pub fn add_run(&mut self, run: &RunOutput) {
        let metrics = SummaryMetrics::new(&run.simulation_name, &run.series);
        log::info!("{metrics:?}");
        self.rows.push(metrics);
    }

    /// Write one CSV row per run.
    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let mut writer =
            csv::Writer::from_path(file).with_context(|| format!("failed to create {file:?}"))?;
        for row in &self.rows {
            writer.serialize(row).context("failed to serialize metrics")?;
        }
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}
