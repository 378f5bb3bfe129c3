use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use cdrflow_api::StageConfig;
use cdrflow_bench::BenchOptions;
use cdrflow_engine::{TopologyConfig, TopologyKind};

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "cdrflow", about = "Бенчмарк топологий обогащения CDR")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Прогнать одну топологию
    Run(RunArgs),
    /// Прогнать все четыре топологии подряд и вывести таблицу
    Compare(BenchArgs),
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Топология: fanout | pipeline | pool | semaphore
    #[arg(long, env = "CDRFLOW_TOPOLOGY")]
    pub topology: Option<TopologyKind>,

    #[command(flatten)]
    pub bench: BenchArgs,
}

#[derive(Args, Clone, Debug)]
pub struct BenchArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, default_value = "cdrflow.toml", env = "CDRFLOW_CONFIG")]
    pub config: String,

    /// Количество записей за прогон
    #[arg(long, short = 'n')]
    pub iterations: Option<u64>,

    /// Воркеров (или permits для semaphore) у выбранной топологии
    #[arg(long)]
    pub workers: Option<usize>,

    /// Ёмкость каналов (минимум 1)
    #[arg(long)]
    pub buffer: Option<usize>,

    /// Seed генератора записей
    #[arg(long)]
    pub seed: Option<u64>,

    /// Период опроса живых задач, мс
    #[arg(long)]
    pub sample_interval_ms: Option<u64>,

    /// Проверять каждую запись: дубликаты, идентичность, заполненность
    #[arg(long)]
    pub validate: bool,

    /// Печатать каждую обогащённую запись (JSON)
    #[arg(long)]
    pub print_records: bool,

    /// Отчёт в JSON вместо таблицы
    #[arg(long)]
    pub json: bool,

    /// Нулевые задержки стадий
    #[arg(long)]
    pub instant: bool,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct BenchConfig {
    pub topology: Option<TopologyKind>,
    pub iterations: Option<u64>,
    pub sample_interval_ms: Option<u64>,
    pub seed: Option<u64>,
    #[serde(default)]
    pub stages: StageConfig,
    #[serde(default)]
    pub topologies: TopologyConfig,
}

impl BenchConfig {
    pub fn load(path: &str) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &str) -> Result<Self, CliError> {
        toml::from_str(content)
            .map_err(|e| CliError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }
}

const DEFAULT_ITERATIONS: u64 = 10_000;
const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1;
const DEFAULT_TOPOLOGY: TopologyKind = TopologyKind::Pool;

// ═══════════════════════════════════════════════════════════════
//  Effective: merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация после мержа: cdrflow.toml < env/CLI
#[derive(Debug)]
pub struct Effective {
    pub topology: TopologyKind,
    pub stages: StageConfig,
    pub topologies: TopologyConfig,
    pub options: BenchOptions,
    pub print_records: bool,
    pub json: bool,
}

impl Effective {
    /// `topology` is the `run` selection; `None` for `compare`, where
    /// `--workers` applies to every topology.
    pub fn new(args: &BenchArgs, topology: Option<TopologyKind>) -> Result<Self, CliError> {
        let cfg = match BenchConfig::load(&args.config) {
            Ok(c) => c,
            Err(e) => {
                if std::path::Path::new(&args.config).exists() {
                    return Err(e);
                }
                tracing::debug!(config = %args.config, "config file not found, using defaults");
                BenchConfig::default()
            }
        };
        Self::merge(args, topology, cfg)
    }

    fn merge(args: &BenchArgs, topology: Option<TopologyKind>, cfg: BenchConfig) -> Result<Self, CliError> {
        let selected = topology.or(cfg.topology).unwrap_or(DEFAULT_TOPOLOGY);

        let mut stages = cfg.stages;
        if args.instant {
            stages.direction_latency_ms = 0;
            stages.home_operator_latency_ms = 0;
            stages.risk_min_ms = 0;
            stages.risk_max_ms = 0;
        }
        stages.validate()?;

        let mut topologies = cfg.topologies;
        if let Some(workers) = args.workers {
            match topology {
                Some(kind) => topologies.set_workers(kind, workers),
                None => TopologyKind::ALL.iter().for_each(|&kind| topologies.set_workers(kind, workers)),
            }
        }
        if let Some(buffer) = args.buffer {
            topologies.set_buffer(buffer);
        }
        match topology {
            Some(kind) => topologies.validate(kind)?,
            None => {
                for kind in TopologyKind::ALL {
                    topologies.validate(kind)?;
                }
            }
        }

        let options = BenchOptions {
            iterations: args.iterations.or(cfg.iterations).unwrap_or(DEFAULT_ITERATIONS),
            sample_interval: Duration::from_millis(
                args.sample_interval_ms
                    .or(cfg.sample_interval_ms)
                    .unwrap_or(DEFAULT_SAMPLE_INTERVAL_MS)
                    .max(1),
            ),
            seed: args.seed.or(cfg.seed),
            validate: args.validate,
        };

        Ok(Self {
            topology: selected,
            stages,
            topologies,
            options,
            print_records: args.print_records,
            json: args.json,
        })
    }
}
