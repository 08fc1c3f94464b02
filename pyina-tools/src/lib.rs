use clap::{Parser, ValueEnum};
use serde::de::DeserializeOwned;
use std::path::Path;

pub mod farm;
mod latency;
pub use latency::{latency, Envelope, LatencyBenchmark, LatencyOptions, StringPingPong};
pub mod scatter;
pub mod selfcheck;

/// Latency benchmark args.
#[derive(Parser)]
pub struct LatencyArgs {
    /// Path for benchmark options file.
    #[arg(short, long)]
    pub options_path: String,
}

/// How jobs are spread over the ranks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// One job at a time to whichever worker is free.
    Farm,
    /// One contiguous block of jobs per rank.
    Scatter,
}

/// Task farm args.
#[derive(Parser)]
pub struct FarmArgs {
    /// Strategy used to hand out jobs.
    #[arg(long, value_enum, default_value_t = Strategy::Farm)]
    pub strategy: Strategy,

    /// With the scatter strategy, let the master compute a share too.
    #[arg(long)]
    pub onall: bool,

    /// Number of jobs to farm out.
    #[arg(short, long, default_value_t = 100)]
    pub jobs: usize,

    /// Factor broadcast to every worker; job `x` computes `scale * x * x`.
    #[arg(short, long, default_value_t = 3)]
    pub scale: i64,
}

/// Load benchmark options from a file path.
pub fn load_options<P, T>(path: P) -> T
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let fp = std::fs::File::open(path).expect("failed to load option file");
    serde_yaml::from_reader(fp).expect("failed to deserialize option file")
}

/// Print latency results as `size latency` rows.
pub fn print_latency(results: &[(usize, f32)]) {
    println!("# size latency");
    for (size, lat) in results {
        println!("{} {}", size, lat);
    }
}
