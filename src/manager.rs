use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Engine;
use crate::model::RunOutput;
use anyhow::{Context, Result, bail};
use glob::glob;
use rayon::prelude::*;
use rmp_serde::{decode, encode};
use std::{
    collections::BTreeSet,
    ffi::OsStr,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

pub struct Manager {
    sim_dir: PathBuf,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();
        if !sim_dir.is_dir() {
            bail!("{sim_dir:?} is not a directory");
        }
        Ok(Self { sim_dir })
    }

    /// Run the given configs, or every config in the simulation directory.
    ///
    /// Configs that fail to load are skipped; the remaining runs are
    /// independent and execute in parallel.
    pub fn run_simulations(&self, config_files: &[PathBuf]) -> Result<()> {
        let config_files = if config_files.is_empty() {
            self.find_config_files()
                .context("failed to find config files")?
        } else {
            config_files.to_vec()
        };
        if config_files.is_empty() {
            bail!("no config files found in {:?}", self.sim_dir);
        }

        let mut runs = Vec::with_capacity(config_files.len());
        let mut names = BTreeSet::new();
        for file in &config_files {
            match load_run(file) {
                Ok((name, cfg)) => {
                    if !names.insert(name.clone()) {
                        bail!("more than one config is named {name:?}");
                    }
                    log::info!("loaded {file:?} as {name:?}");
                    runs.push((name, cfg));
                }
                Err(error) => log::warn!("skipping {file:?}: {error:#}"),
            }
        }
        if runs.is_empty() {
            bail!("no valid config files");
        }

        let n_runs = runs.len();
        let n_failed = runs
            .into_par_iter()
            .map(|(name, cfg)| {
                self.run_simulation(&name, cfg)
                    .with_context(|| format!("failed to run {name:?}"))
            })
            .filter_map(Result::err)
            .inspect(|error| log::error!("{error:#}"))
            .count();

        if n_failed == n_runs {
            bail!("every simulation failed");
        }
        log::info!("completed {} of {n_runs} simulations", n_runs - n_failed);

        Ok(())
    }

    fn run_simulation(&self, name: &str, cfg: Config) -> Result<()> {
        let run_dir = self.run_dir(name);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;

        log::info!(
            "running {name:?}: {} individuals, {} days",
            cfg.population_size,
            cfg.number_of_days
        );
        let series = Engine::new(cfg)
            .context("failed to construct engine")?
            .run()
            .context("failed to perform simulation")?;

        let series_file = run_dir.join("series.csv");
        let mut writer = csv::Writer::from_path(&series_file)
            .with_context(|| format!("failed to create {series_file:?}"))?;
        for record in &series.records {
            writer.serialize(record).context("failed to serialize record")?;
        }
        writer.flush().context("failed to flush writer stream")?;

        let output = RunOutput {
            simulation_name: name.to_string(),
            series,
        };
        let results_file = self.results_file(name);
        let file = File::create(&results_file)
            .with_context(|| format!("failed to create {results_file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &output).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;

        log::info!("saved {run_dir:?}");
        Ok(())
    }

    /// Summarize every stored run into a single CSV file.
    pub fn run_analysis(&self) -> Result<()> {
        let results_files = self
            .glob_paths("run-*/results.msgpack")
            .context("failed to glob results files")?;
        if results_files.is_empty() {
            bail!("no run results found in {:?}", self.sim_dir);
        }

        let mut analyzer = Analyzer::default();
        for results_file in results_files {
            let file = File::open(&results_file)
                .with_context(|| format!("failed to open {results_file:?}"))?;
            let mut reader = BufReader::new(file);
            let output: RunOutput =
                decode::from_read(&mut reader).context("failed to deserialize results")?;
            analyzer.add_run(&output);
        }

        let summary_file = self.summary_file();
        analyzer
            .save_results(&summary_file)
            .context("failed to save results")?;
        log::info!("saved {summary_file:?}");

        Ok(())
    }

    /// Remove every run directory and the summary.
    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.glob_paths("run-*").context("failed to glob run dirs")? {
            if run_dir.is_dir() {
                fs::remove_dir_all(&run_dir)
                    .with_context(|| format!("failed to remove {run_dir:?}"))?;
                log::info!("removed {run_dir:?}");
            }
        }

        let summary_file = self.summary_file();
        if summary_file.exists() {
            fs::remove_file(&summary_file)
                .with_context(|| format!("failed to remove {summary_file:?}"))?;
            log::info!("removed {summary_file:?}");
        }

        Ok(())
    }

    fn find_config_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = self.glob_paths("*.toml")?;
        files.extend(self.glob_paths("*.json")?);
        files.sort();
        Ok(files)
    }

    fn glob_paths(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join(pattern);
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let paths = glob(pattern)
            .context("failed to glob paths")?
            .filter_map(Result::ok)
            .collect();
        Ok(paths)
    }

    fn run_dir(&self, name: &str) -> PathBuf {
        self.sim_dir.join(format!("run-{name}"))
    }

    fn results_file(&self, name: &str) -> PathBuf {
        self.run_dir(name).join("results.msgpack")
    }

    fn summary_file(&self) -> PathBuf {
        self.sim_dir.join("summary.csv")
    }
}

/// Load a config and pick the name of its run.
fn load_run(file: &Path) -> Result<(String, Config)> {
    let cfg = Config::from_file(file)?;
    let stem = file
        .file_stem()
        .and_then(OsStr::to_str)
        .context("config file name is not valid UTF-8")?;
    let name = sanitize(&cfg.name_or(stem));
    Ok((name, cfg))
}

/// Make a run name safe to use as a directory name.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
