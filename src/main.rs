//! Замер умножения матриц на одном ядре, на нескольких ядрах и на GPU

use anyhow::Result;
use clap::Parser;
use hello_compute::cli::CliArgs;
use hello_compute::utils::init_tracing;
use hello_compute::{Accelerator, Harness};
use std::io;

fn main() -> Result<()> {
    init_tracing();
    let args = CliArgs::parse();

    // Наличие GPU выясняется один раз, до выбора режима
    let accelerator = Accelerator::detect();
    tracing::debug!(?accelerator, size = args.size, "starting");

    let mut harness = Harness::new(io::stdout().lock(), args.bench_config(), accelerator);
    let report = harness.run(&args.mode, args.n_cores())?;

    if args.json {
        if let Some(report) = report {
            harness.write_json(&report)?;
        }
    }

    Ok(())
}
