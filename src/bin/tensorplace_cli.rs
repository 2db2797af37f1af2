use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tensorplace::config::{GpuUtilization, PlanConfig};
use tensorplace::inventory::{
    host_memory_bytes, mib_to_bytes, query_nvidia_gpus, Accelerator, Inventory,
};
use tensorplace::loader::load_model_from;
use tensorplace::logging::{init_with_config, LogLevel, LoggingConfig};
use tensorplace::memory::{kv_cache_size_bytes, ContextQuant, MemoryCalculator};
use tensorplace::model::extract_geometry;
use tensorplace::placement::{plan, TracingObserver};

const MIB: u64 = 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "tensorplace-cli", version)]
#[command(about = "Plan llama.cpp tensor overrides across GPUs and host memory", long_about = None)]
struct Cli {
    /// Log per-pass allocation summaries (debug with -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Also write JSON logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute a placement and print the `-ngl 0 -ot ...` fragment
    Plan {
        #[command(flatten)]
        model: ModelArgs,
        #[command(flatten)]
        devices: DeviceArgs,
        /// Skip the feasibility check and let host memory overcommit (swap)
        #[arg(long)]
        no_check: bool,
        /// Fraction of every GPU's memory to use
        #[arg(long, conflicts_with = "granular_gpu_percentage")]
        gpu_percentage: Option<f64>,
        /// Per-GPU fractions in inventory order, e.g. "0.9,0.8,0.7"
        #[arg(long)]
        granular_gpu_percentage: Option<String>,
        /// Fraction of host memory to use when the check is on
        #[arg(long)]
        host_percentage: Option<f64>,
        /// Device name emitted for host memory
        #[arg(long, default_value = "CPU")]
        host_name: String,
        /// Print the full report as JSON instead of the bare fragment
        #[arg(long)]
        json: bool,
    },
    /// Print the model's geometry and footprint without planning
    Inspect {
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Print the detected device inventory
    Devices {
        #[command(flatten)]
        devices: DeviceArgs,
    },
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// GGUF file or http(s) URL (any shard of a split model), or a JSON model dump
    #[arg(value_name = "MODEL")]
    model: String,
    /// Context length to reserve key/value cache for
    #[arg(short, long)]
    context_length: u64,
    /// Key/value cache precision in bits: 4, 8 or 16
    #[arg(long, default_value_t = 16)]
    context_quant: u32,
}

#[derive(Args, Debug)]
struct DeviceArgs {
    /// Accelerator as NAME=MiB (repeatable); skips nvidia-smi
    #[arg(long = "device", value_name = "NAME=MiB")]
    devices: Vec<String>,
    /// Host memory in MiB; defaults to the detected total
    #[arg(long)]
    host_mib: Option<u64>,
}

impl DeviceArgs {
    fn inventory(&self) -> anyhow::Result<Inventory> {
        let accelerators = if self.devices.is_empty() {
            query_nvidia_gpus().context("GPU detection failed; pass --device NAME=MiB")?
        } else {
            self.devices
                .iter()
                .map(|d| Accelerator::parse_override(d))
                .collect::<anyhow::Result<Vec<_>>>()?
        };
        let host_bytes = match self.host_mib {
            Some(mib) => mib_to_bytes(mib).context("invalid --host-mib")?,
            None => host_memory_bytes(),
        };
        Ok(Inventory::new(accelerators, host_bytes))
    }
}

fn init_logging(verbose: u8, log_file: Option<PathBuf>) {
    let level = match verbose {
        0 => LogLevel::Warn,
        1 => LogLevel::Info,
        _ => LogLevel::Debug,
    };
    let mut config = LoggingConfig::new().with_level(level).with_env_overrides();
    if let Some(path) = log_file {
        config = config.with_log_file(path);
    }
    if let Err(e) = init_with_config(&config) {
        eprintln!("warning: logging disabled: {}", e);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file);

    match cli.command {
        Commands::Plan {
            model,
            devices,
            no_check,
            gpu_percentage,
            granular_gpu_percentage,
            host_percentage,
            host_name,
            json,
        } => {
            let gpu_utilization = match (gpu_percentage, granular_gpu_percentage) {
                (_, Some(list)) => GpuUtilization::parse_per_device(&list)?,
                (Some(fraction), None) => GpuUtilization::Uniform(fraction),
                (None, None) => GpuUtilization::default(),
            };
            let mut config = PlanConfig::new(model.context_length)
                .with_context_quant(ContextQuant::from_bits(model.context_quant)?)
                .with_check(!no_check)
                .with_gpu_utilization(gpu_utilization)
                .with_host_device_name(host_name);
            if let Some(fraction) = host_percentage {
                config = config.with_host_utilization(fraction);
            }
            config.validate()?;

            let inventory = devices.inventory()?;
            let loaded = load_model_from(&model.model)?;
            let result = plan(&loaded, &inventory, &config, &mut TracingObserver)?;

            let report = result.report();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                if cli.verbose > 0 {
                    eprint!("{}", report);
                }
                println!("{}", report.command_fragment);
            }
        }
        Commands::Inspect { model } => {
            let quant = ContextQuant::from_bits(model.context_quant)?;
            let loaded = load_model_from(&model.model)?;
            let geometry = extract_geometry(&loaded)?;
            let sizes = MemoryCalculator::from_model(&loaded)?;
            let kv = kv_cache_size_bytes(&geometry, model.context_length, quant);
            println!("Architecture: {}", loaded.architecture);
            println!(
                "Geometry: hidden {} heads {} kv heads {} layers {} head size {}",
                geometry.hidden_size,
                geometry.num_attention_heads,
                geometry.num_key_value_heads,
                geometry.num_layers,
                geometry.head_size
            );
            println!(
                "Tensors: {} totalling {:.2} MiB",
                sizes.tensor_count(),
                sizes.total_bytes() as f64 / MIB as f64
            );
            println!(
                "KV cache at {} tokens: {:.2} MiB",
                model.context_length,
                kv as f64 / MIB as f64
            );
        }
        Commands::Devices { devices } => {
            let inventory = devices.inventory()?;
            for acc in &inventory.accelerators {
                println!(
                    "{}: {} MiB {}",
                    acc.name,
                    acc.capacity_bytes / MIB,
                    acc.description
                );
            }
            println!(
                "Accelerators: {} MiB total",
                inventory.total_accelerator_bytes() / MIB
            );
            println!("Host: {} MiB", inventory.host_bytes / MIB);
        }
    }
    Ok(())
}
