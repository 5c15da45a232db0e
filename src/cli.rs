//! Разбор аргументов командной строки

use crate::bench::{BenchConfig, MATRIX_SIZE};
use clap::Parser;

/// Timed matrix multiplication on one core, many cores or a GPU
#[derive(Parser, Debug)]
#[command(name = "hello_compute", version, about, long_about = None, allow_negative_numbers = true)]
pub struct CliArgs {
    /// Execution mode: cpu, multicore or gpu
    #[arg(default_value = "cpu")]
    pub mode: String,

    /// Thread count hint for multicore mode (default: 4)
    ///
    /// Kept as text: only the multicore mode parses it.
    pub n_cores: Option<String>,

    /// Extra positional arguments are ignored
    #[arg(hide = true)]
    pub rest: Vec<String>,

    /// Dimension of the square matrices
    #[arg(short, long, default_value_t = MATRIX_SIZE)]
    pub size: usize,

    /// Also print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Disable the progress spinner on stderr
    #[arg(long)]
    pub no_progress: bool,

    /// Multiply matrices of ones and twos and check the product
    #[arg(long)]
    pub verify: bool,
}

impl CliArgs {
    pub fn bench_config(&self) -> BenchConfig {
        BenchConfig {
            size: self.size,
            progress: !self.no_progress,
            verify: self.verify,
        }
    }

    pub fn n_cores(&self) -> Option<&str> {
        self.n_cores.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_tutorial() {
        let args = CliArgs::try_parse_from(["hello_compute"]).unwrap();
        assert_eq!(args.mode, "cpu");
        assert_eq!(args.n_cores, None);
        assert_eq!(args.size, 5000);
        assert!(!args.json);
        assert!(args.bench_config().progress);
        assert!(!args.bench_config().verify);
    }

    #[test]
    fn multicore_with_core_count() {
        let args = CliArgs::try_parse_from(["hello_compute", "multicore", "8"]).unwrap();
        assert_eq!(args.mode, "multicore");
        assert_eq!(args.n_cores(), Some("8"));
    }

    #[test]
    fn negative_core_count_is_not_validated() {
        let args = CliArgs::try_parse_from(["hello_compute", "multicore", "-2"]).unwrap();
        assert_eq!(args.n_cores(), Some("-2"));
    }

    #[test]
    fn unknown_mode_is_accepted_by_the_parser() {
        let args = CliArgs::try_parse_from(["hello_compute", "bogus"]).unwrap();
        assert_eq!(args.mode, "bogus");
    }

    #[test]
    fn second_argument_is_not_parsed_by_clap() {
        for (mode, raw) in [("cpu", "abc"), ("gpu", "1.5"), ("bogus", "x"), ("multicore", "many")] {
            let args = CliArgs::try_parse_from(["hello_compute", mode, raw]).unwrap();
            assert_eq!(args.mode, mode);
            assert_eq!(args.n_cores(), Some(raw));
        }
    }

    #[test]
    fn extra_arguments_are_ignored() {
        let args = CliArgs::try_parse_from(["hello_compute", "multicore", "2", "extra", "more"]).unwrap();
        assert_eq!(args.n_cores(), Some("2"));
        assert_eq!(args.rest, ["extra", "more"]);
    }

    #[test]
    fn options() {
        let args = CliArgs::try_parse_from([
            "hello_compute", "gpu", "--size", "256", "--json", "--no-progress", "--verify",
        ])
        .unwrap();
        let config = args.bench_config();
        assert_eq!(config.size, 256);
        assert!(!config.progress);
        assert!(config.verify);
        assert!(args.json);
    }
}
