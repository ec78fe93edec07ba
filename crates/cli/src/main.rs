//! spillmodel
//!
//! Predicts how a sort/spill/merge engine behaves under a fixed memory
//! budget without running a job: spill file counts, on-disk bytes and the
//! pass-by-pass merge of the spill files.
//!
//! ```bash
//! # 50k one-character keys with int values through a 1 MB buffer
//! spillmodel -D mapreduce.task.io.sort.mb=1 -D mapreduce.map.sort.spill.percent=0.5 \
//!     plan --records 50000
//!
//! # merge schedule for 23 segments at factor 5
//! spillmodel --factor 5 merge --segments 23
//!
//! # encoded bytes of a few integers
//! spillmodel varint 127 128 -113 1024
//! ```
//!
//! Set `RUST_LOG=debug` to trace every spill prediction and merge pass on
//! stderr.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use merge::MergePolicy;
use spill::{text_len, INT_FIELD_BYTES};

mod config;
mod model;

use config::ModelConfig;
use model::{SpillMergeModel, Workload};

#[derive(Parser)]
#[command(name = "spillmodel", version)]
#[command(
    about = "Analytical model of sort buffer spills and multi-pass merges",
    long_about = None
)]
struct Cli {
    /// Job property, repeatable (e.g. -D mapreduce.task.io.sort.mb=1)
    #[arg(short = 'D', value_name = "KEY=VALUE", global = true)]
    properties: Vec<String>,

    /// Sort buffer size in MB
    #[arg(long, global = true)]
    sort_mb: Option<u64>,

    /// Buffer fraction that triggers a spill, in (0, 1]
    #[arg(long, global = true)]
    spill_percent: Option<f64>,

    /// Maximum segments merged per pass
    #[arg(long, global = true)]
    factor: Option<u64>,

    /// Partitions in the merged output
    #[arg(long, global = true)]
    partitions: Option<u32>,

    /// Merge policy: variable or fixed
    #[arg(long, global = true)]
    policy: Option<MergePolicy>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the encoded bytes and size of integers
    Varint {
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<i64>,
    },
    /// Predict spill files and output bytes
    Spill {
        #[arg(long)]
        records: u64,
        #[command(flatten)]
        shape: RecordShape,
    },
    /// Show the merge passes for a number of segments
    Merge {
        #[arg(long)]
        segments: u64,
    },
    /// Predict spills, then the merge of the spill files
    Plan {
        #[arg(long)]
        records: u64,
        #[command(flatten)]
        shape: RecordShape,
    },
    /// Predict spills for several record counts
    Sweep {
        /// Comma-separated record counts
        #[arg(long, value_delimiter = ',', required = true)]
        records: Vec<u64>,
        #[command(flatten)]
        shape: RecordShape,
    },
    /// Records needed to produce a number of spill files
    RecordsForSpills {
        #[arg(long)]
        spills: u64,
        #[command(flatten)]
        shape: RecordShape,
    },
}

/// Record layout; defaults to a one-character text key with an int value.
#[derive(Args)]
struct RecordShape {
    /// Serialized key size in bytes
    #[arg(long, conflicts_with = "text_key_chars", allow_negative_numbers = true)]
    key_bytes: Option<i64>,

    /// Key is a text field of this many characters
    #[arg(long)]
    text_key_chars: Option<i64>,

    /// Serialized value size in bytes
    #[arg(long, default_value_t = INT_FIELD_BYTES, allow_negative_numbers = true)]
    value_bytes: i64,
}

impl RecordShape {
    fn key_bytes(&self) -> Result<i64> {
        match (self.key_bytes, self.text_key_chars) {
            (Some(bytes), _) => Ok(bytes),
            (None, chars) => Ok(text_len(chars.unwrap_or(1))?),
        }
    }
}

impl Cli {
    fn model_config(&self) -> Result<ModelConfig> {
        let mut config = ModelConfig::default();
        config.apply_properties(&self.properties)?;
        if let Some(mb) = self.sort_mb {
            config.sort_buffer_mb = mb;
        }
        if let Some(percent) = self.spill_percent {
            config.spill_percent = percent;
        }
        if let Some(factor) = self.factor {
            config.sort_factor = factor;
        }
        if let Some(partitions) = self.partitions {
            config.partitions = partitions;
        }
        if let Some(policy) = self.policy {
            config.merge_policy = policy;
        }
        config.validate()?;
        Ok(config)
    }

    fn model(&self) -> Result<SpillMergeModel> {
        SpillMergeModel::new(self.model_config()?)
    }
}

fn format_binary(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:08b}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    run(&Cli::parse())
}

/// Runs one command. Only the model commands read the configuration.
fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Varint { values } => {
            for &value in values {
                let bytes = varint::encode(value);
                println!(
                    "{value:>20}: {:>80}  len: {}  expected len: {}",
                    format_binary(&bytes),
                    bytes.len(),
                    varint::size_of(value)
                );
            }
        }
        Commands::Spill { records, shape } => {
            let model = cli.model()?;
            let size = model.record_size(shape.key_bytes()?, shape.value_bytes)?;
            println!("record size: {size}");
            println!("{}", model.predict_spills(*records, &size)?);
        }
        Commands::Merge { segments } => {
            let model = cli.model()?;
            print!("{}", model.merge_trace(*segments)?);
        }
        Commands::Plan { records, shape } => {
            let model = cli.model()?;
            let config = model.config();
            println!(
                "sort buffer: {} MB, spill at {}, factor {}, partitions {}, {} merge",
                config.sort_buffer_mb,
                config.spill_percent,
                config.sort_factor,
                config.partitions,
                config.merge_policy
            );
            let plan = model.plan(&Workload {
                records: *records,
                key_bytes: shape.key_bytes()?,
                value_bytes: shape.value_bytes,
            })?;
            print!("{plan}");
        }
        Commands::Sweep { records, shape } => {
            let model = cli.model()?;
            let predictions = model.sweep(records, shape.key_bytes()?, shape.value_bytes)?;
            for (count, prediction) in predictions {
                println!("{count:>12} records: {prediction}");
            }
        }
        Commands::RecordsForSpills { spills, shape } => {
            let model = cli.model()?;
            let records =
                model.records_for_spills(*spills, shape.key_bytes()?, shape.value_bytes)?;
            println!("{records}");
        }
    }

    Ok(())
}
