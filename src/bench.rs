//! Замер времени умножения матриц в трех режимах
//!
//! [`Harness`] печатает приветствие, выбирает режим, замеряет
//! генерацию и умножение матриц и печатает итог. Весь вывод идет в
//! переданный `Write`, так что тесты читают его из `Vec<u8>`.

use crate::accel::Accelerator;
use crate::matrix::{
    build_thread_pool, compare_results, cpu_matrix_multiply, expected_product,
    initialize_matrices, parallel_matrix_multiply, MatrixType, Shape,
};
use crate::utils::{measure_time, spinner};
use anyhow::{bail, Context, Result};
use ndarray::Array2;
use rayon::ThreadPool;
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Размер матриц по умолчанию
pub const MATRIX_SIZE: usize = 5000;
/// Число ядер по умолчанию для режима `multicore`
pub const DEFAULT_CORES: i64 = 4;
pub const USAGE: &str = "Usage: hello_compute [cpu|multicore|gpu] [n_cores]";
pub const GPU_SKIPPED: &str = "OpenCL not available - GPU computation skipped";

const SEPARATOR_WIDTH: usize = 50;

/// Режим вычислений
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Cpu,
    Multicore,
    Gpu,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cpu" => Ok(Mode::Cpu),
            "multicore" => Ok(Mode::Multicore),
            "gpu" => Ok(Mode::Gpu),
            other => bail!("Unknown mode: {other}"),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Cpu => "cpu",
            Mode::Multicore => "multicore",
            Mode::Gpu => "gpu",
        };
        f.write_str(name)
    }
}

/// Подсказка о числе потоков для режима `multicore`.
///
/// Значение не проверяется: ноль и отрицательные числа превращаются в
/// "решает rayon". Сколько ядер реально занято, никто не гарантирует.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoreCount(pub i64);

impl CoreCount {
    /// Число потоков для `ThreadPoolBuilder::num_threads`
    pub fn pool_threads(self) -> usize {
        usize::try_from(self.0).unwrap_or(0)
    }

    /// Разбирает второй аргумент командной строки.
    ///
    /// Нужен только режиму `multicore`; остальные режимы его не читают.
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw {
            None => Ok(CoreCount::default()),
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map(CoreCount)
                .with_context(|| format!("invalid n_cores: {raw:?}")),
        }
    }
}

impl Default for CoreCount {
    fn default() -> Self {
        CoreCount(DEFAULT_CORES)
    }
}

impl fmt::Display for CoreCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Параметры замера
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchConfig {
    pub size: usize,
    /// Показывать крутилку в stderr
    pub progress: bool,
    /// Умножать матрицы из единиц и двоек и сверять результат
    pub verify: bool,
}

impl BenchConfig {
    /// Тип входных матриц: случайные, либо известные при проверке
    pub fn matrix_type(&self) -> MatrixType {
        if self.verify {
            MatrixType::OnesAndTwos
        } else {
            MatrixType::Random
        }
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            size: MATRIX_SIZE,
            progress: true,
            verify: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Skipped,
    Failed,
}

/// Итог одного запуска
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchReport {
    pub mode: Mode,
    pub size: usize,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<Shape>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<CoreCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BenchReport {
    fn new(mode: Mode, size: usize, outcome: Outcome) -> Self {
        Self {
            mode,
            size,
            outcome,
            elapsed_secs: None,
            shape: None,
            cores: None,
            pool_threads: None,
            device: None,
            verified: None,
            error: None,
        }
    }

    fn completed(mode: Mode, size: usize, elapsed: Duration, shape: Shape) -> Self {
        Self {
            elapsed_secs: Some(elapsed.as_secs_f64()),
            shape: Some(shape),
            ..Self::new(mode, size, Outcome::Completed)
        }
    }
}

struct GpuRun {
    shape: Shape,
    elapsed: Duration,
    device: String,
    verified: Option<bool>,
}

pub struct Harness<W: Write> {
    out: W,
    config: BenchConfig,
    accelerator: Accelerator,
}

impl<W: Write> Harness<W> {
    pub fn new(out: W, config: BenchConfig, accelerator: Accelerator) -> Self {
        Self { out, config, accelerator }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn separator(&mut self) -> Result<()> {
        writeln!(self.out, "{}", "-".repeat(SEPARATOR_WIDTH))?;
        Ok(())
    }

    /// Приветствие; всегда печатается первым
    pub fn greet(&mut self) -> Result<()> {
        writeln!(self.out, "Hello World from the supercomputer!")?;
        writeln!(self.out, "1 + 1 = {}", 1 + 1)?;
        self.separator()
    }

    /// Генерация и умножение на хосте; время включает генерацию
    fn timed_host_multiply(&self, pool: Option<&ThreadPool>) -> Result<(Array2<f64>, Duration)> {
        let pb = spinner("multiplying matrices", self.config.progress)?;
        let (result, elapsed) = measure_time(|| -> Result<Array2<f64>> {
            let (a, b) = initialize_matrices(self.config.matrix_type(), self.config.size);
            match pool {
                Some(pool) => parallel_matrix_multiply(&a, &b, pool),
                None => cpu_matrix_multiply(&a, &b),
            }
        });
        pb.finish_and_clear();
        Ok((result?, elapsed))
    }

    /// Сверяет произведение с известным ответом, если включена проверка
    fn check_result(&self, product: &Array2<f64>) -> Option<bool> {
        if !self.config.verify {
            return None;
        }
        let expected = expected_product(self.config.matrix_type(), self.config.size)?;
        Some(compare_results(product, &expected, 1e-9))
    }

    fn write_check(&mut self, verified: Option<bool>) -> Result<()> {
        match verified {
            Some(true) => writeln!(self.out, "Result check: passed")?,
            Some(false) => writeln!(self.out, "Result check: FAILED")?,
            None => {}
        }
        Ok(())
    }

    /// Умножение в одном потоке
    pub fn run_cpu(&mut self) -> Result<BenchReport> {
        writeln!(self.out, "Running CPU computation...")?;
        let (product, elapsed) = self.timed_host_multiply(None)?;
        let shape = Shape::from(&product);
        let verified = self.check_result(&product);

        writeln!(self.out, "CPU computation completed in {:.2} seconds", elapsed.as_secs_f64())?;
        writeln!(self.out, "Result shape: {shape}")?;
        self.write_check(verified)?;
        self.separator()?;

        info!(elapsed = ?elapsed, %shape, "cpu run finished");
        Ok(BenchReport {
            verified,
            ..BenchReport::completed(Mode::Cpu, self.config.size, elapsed, shape)
        })
    }

    /// Умножение в пуле из `cores` потоков.
    ///
    /// Пул собирается до начала замера.
    pub fn run_multicore(&mut self, cores: CoreCount) -> Result<BenchReport> {
        let pool = build_thread_pool(cores.pool_threads())?;

        writeln!(self.out, "Running multi-core CPU computation with {cores} cores...")?;
        let (product, elapsed) = self.timed_host_multiply(Some(&pool))?;
        let shape = Shape::from(&product);
        let verified = self.check_result(&product);

        writeln!(self.out, "Multi-core computation completed in {:.2} seconds", elapsed.as_secs_f64())?;
        writeln!(self.out, "Cores used: {cores}")?;
        self.write_check(verified)?;
        self.separator()?;

        info!(elapsed = ?elapsed, %cores, threads = pool.current_num_threads(), "multicore run finished");
        Ok(BenchReport {
            cores: Some(cores),
            pool_threads: Some(pool.current_num_threads()),
            verified,
            ..BenchReport::completed(Mode::Multicore, self.config.size, elapsed, shape)
        })
    }

    fn gpu_multiply(&mut self) -> Result<GpuRun> {
        let size = self.config.size;
        let matrix_type = self.config.matrix_type();
        let progress = self.config.progress;
        let expected = if self.config.verify {
            expected_product(matrix_type, size)
        } else {
            None
        };

        let Accelerator::Available(backend) = &mut self.accelerator else {
            bail!("no GPU backend");
        };

        let pb = spinner("multiplying matrices on the GPU", progress)?;
        let (result, elapsed) = measure_time(|| -> Result<Shape> {
            let (a, b) = initialize_matrices(matrix_type, size);
            let shape = backend.matrix_multiply(&a, &b)?;
            // Без барьера замер покажет только время постановки в очередь
            backend.synchronize()?;
            Ok(shape)
        });
        pb.finish_and_clear();
        let shape = result?;

        // Чтение с устройства идет уже после замера
        let verified = match expected {
            Some(expected) => Some(compare_results(&backend.read_result()?, &expected, 1e-9)),
            None => None,
        };

        Ok(GpuRun {
            shape,
            elapsed,
            device: backend.device_name(),
            verified,
        })
    }

    /// Умножение на GPU.
    ///
    /// Отсутствие ускорителя и ошибки во время вычислений не считаются
    /// ошибкой всей программы: печатается сообщение, и замер завершается.
    pub fn run_gpu(&mut self) -> Result<BenchReport> {
        let size = self.config.size;

        if let Accelerator::Unavailable(reason) = &self.accelerator {
            info!(%reason, "skipping gpu run");
            writeln!(self.out, "{GPU_SKIPPED}")?;
            self.separator()?;
            return Ok(BenchReport::new(Mode::Gpu, size, Outcome::Skipped));
        }

        writeln!(self.out, "Running GPU computation...")?;
        let report = match self.gpu_multiply() {
            Ok(run) => {
                writeln!(self.out, "GPU computation completed in {:.2} seconds", run.elapsed.as_secs_f64())?;
                writeln!(self.out, "Result shape: {}", run.shape)?;
                writeln!(self.out, "GPU device: {}", run.device)?;
                self.write_check(run.verified)?;
                BenchReport {
                    device: Some(run.device),
                    verified: run.verified,
                    ..BenchReport::completed(Mode::Gpu, size, run.elapsed, run.shape)
                }
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(error = %message, "gpu run failed");
                writeln!(self.out, "GPU error: {message}")?;
                BenchReport {
                    error: Some(message),
                    ..BenchReport::new(Mode::Gpu, size, Outcome::Failed)
                }
            }
        };
        self.separator()?;
        Ok(report)
    }

    /// Запускает ровно один режим.
    ///
    /// Для неизвестного режима печатает подсказку и возвращает `None`.
    /// `n_cores` разбирается только в режиме `multicore`; там же
    /// возвращается ошибка, если это не целое число.
    pub fn dispatch(&mut self, mode: &str, n_cores: Option<&str>) -> Result<Option<BenchReport>> {
        let Ok(parsed) = mode.parse::<Mode>() else {
            writeln!(self.out, "Unknown mode: {mode}")?;
            writeln!(self.out, "{USAGE}")?;
            return Ok(None);
        };

        let report = match parsed {
            Mode::Cpu => self.run_cpu()?,
            Mode::Multicore => self.run_multicore(CoreCount::parse(n_cores)?)?,
            Mode::Gpu => self.run_gpu()?,
        };
        Ok(Some(report))
    }

    /// Приветствие, затем выбранный режим
    pub fn run(&mut self, mode: &str, n_cores: Option<&str>) -> Result<Option<BenchReport>> {
        self.greet()?;
        self.dispatch(mode, n_cores)
    }

    /// Печатает отчет в JSON
    pub fn write_json(&mut self, report: &BenchReport) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.out, report)?;
        writeln!(self.out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREETING: &str = "Hello World from the supercomputer!\n1 + 1 = 2\n";

    fn separator() -> String {
        "-".repeat(SEPARATOR_WIDTH)
    }

    fn harness() -> Harness<Vec<u8>> {
        harness_with(BenchConfig {
            size: 24,
            progress: false,
            verify: false,
        })
    }

    fn harness_with(config: BenchConfig) -> Harness<Vec<u8>> {
        Harness::new(Vec::new(), config, Accelerator::Unavailable("test".into()))
    }

    fn output(harness: Harness<Vec<u8>>) -> String {
        String::from_utf8(harness.into_inner()).unwrap()
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("cpu".parse::<Mode>().unwrap(), Mode::Cpu);
        assert_eq!("multicore".parse::<Mode>().unwrap(), Mode::Multicore);
        assert_eq!("gpu".parse::<Mode>().unwrap(), Mode::Gpu);
        assert!("CPU".parse::<Mode>().is_err());
        assert_eq!(Mode::Multicore.to_string(), "multicore");
    }

    #[test]
    fn core_count_defaults_and_conversion() {
        assert_eq!(CoreCount::parse(None).unwrap(), CoreCount(4));
        assert_eq!(CoreCount::parse(Some("8")).unwrap().pool_threads(), 8);
        assert_eq!(CoreCount::parse(Some("-3")).unwrap(), CoreCount(-3));
        assert_eq!(CoreCount(0).pool_threads(), 0);
        assert_eq!(CoreCount(-3).pool_threads(), 0);
        assert!(CoreCount::parse(Some("1.5")).is_err());
    }

    #[test]
    fn core_count_is_ignored_outside_multicore() {
        let mut h = harness();
        let report = h.dispatch("cpu", Some("abc")).unwrap().unwrap();
        assert_eq!(report.mode, Mode::Cpu);
        assert_eq!(report.cores, None);
        assert!(output(h).starts_with("Running CPU computation...\n"));

        let mut h = harness();
        let report = h.dispatch("gpu", Some("1.5")).unwrap().unwrap();
        assert_eq!(report.outcome, Outcome::Skipped);

        let mut h = harness();
        assert!(h.dispatch("bogus", Some("x")).unwrap().is_none());
        assert!(output(h).starts_with("Unknown mode: bogus\n"));
    }

    #[test]
    fn multicore_rejects_non_numeric_core_count() {
        let mut h = harness();
        let err = h.dispatch("multicore", Some("many")).unwrap_err();
        assert!(err.to_string().contains("invalid n_cores"));
        assert!(!output(h).contains("Running multi-core"));
    }

    #[test]
    fn verify_checks_cpu_and_multicore_products() {
        let config = BenchConfig { size: 20, progress: false, verify: true };
        let mut h = harness_with(config);
        let cpu = h.dispatch("cpu", None).unwrap().unwrap();
        let multi = h.dispatch("multicore", Some("3")).unwrap().unwrap();
        assert_eq!(cpu.verified, Some(true));
        assert_eq!(multi.verified, Some(true));
        assert_eq!(output(h).matches("Result check: passed\n").count(), 2);
    }

    #[test]
    fn no_check_line_without_verify() {
        let mut h = harness();
        let report = h.dispatch("cpu", None).unwrap().unwrap();
        assert_eq!(report.verified, None);
        assert!(!output(h).contains("Result check"));
    }

    #[test]
    fn greeting_comes_first_for_every_mode() {
        for mode in ["cpu", "multicore", "gpu", "bogus"] {
            let mut h = harness();
            h.run(mode, None).unwrap();
            let out = output(h);
            let banner = format!("{GREETING}{}\n", separator());
            assert!(out.starts_with(&banner), "mode {mode}: {out}");
        }
    }

    #[test]
    fn unknown_mode_prints_usage_only() {
        let mut h = harness();
        let report = h.dispatch("bogus", Some("8")).unwrap();
        assert!(report.is_none());
        assert_eq!(output(h), format!("Unknown mode: bogus\n{USAGE}\n"));
    }

    #[test]
    fn cpu_reports_square_shape() {
        let mut h = harness();
        let report = h.dispatch("cpu", None).unwrap().unwrap();
        assert_eq!(report.mode, Mode::Cpu);
        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(report.shape, Some(Shape(24, 24)));
        assert!(report.elapsed_secs.unwrap() >= 0.0);

        let out = output(h);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Running CPU computation...");
        assert!(lines[1].starts_with("CPU computation completed in "));
        assert!(lines[1].ends_with(" seconds"));
        assert_eq!(lines[2], "Result shape: (24, 24)");
        assert_eq!(lines[3], separator());
    }

    #[test]
    fn multicore_uses_requested_core_count() {
        let mut h = harness();
        let report = h.dispatch("multicore", Some("8")).unwrap().unwrap();
        assert_eq!(report.cores, Some(CoreCount(8)));
        assert_eq!(report.pool_threads, Some(8));
        assert_eq!(report.shape, Some(Shape(24, 24)));

        let out = output(h);
        assert!(out.starts_with("Running multi-core CPU computation with 8 cores...\n"));
        assert!(out.contains("Multi-core computation completed in "));
        assert!(out.contains("Cores used: 8\n"));
    }

    #[test]
    fn multicore_without_count_uses_four() {
        let mut h = harness();
        let report = h.dispatch("multicore", None).unwrap().unwrap();
        assert_eq!(report.cores, Some(CoreCount(4)));
        assert_eq!(report.pool_threads, Some(4));
        assert!(output(h).contains("Cores used: 4\n"));
    }

    #[test]
    fn non_positive_core_count_is_passed_through() {
        let mut h = harness();
        let report = h.run_multicore(CoreCount(0)).unwrap();
        assert!(report.pool_threads.unwrap() >= 1);
        assert!(output(h).contains("Cores used: 0\n"));
    }

    #[test]
    fn gpu_without_accelerator_is_skipped() {
        let mut h = harness();
        let report = h.dispatch("gpu", None).unwrap().unwrap();
        assert_eq!(report.outcome, Outcome::Skipped);
        assert_eq!(report.elapsed_secs, None);
        assert_eq!(output(h), format!("{GPU_SKIPPED}\n{}\n", separator()));
    }

    #[test]
    fn json_report() {
        let mut h = harness();
        let report = h.dispatch("multicore", Some("2")).unwrap().unwrap();
        let mut json = harness();
        json.write_json(&report).unwrap();

        let value: serde_json::Value = serde_json::from_str(&output(json)).unwrap();
        assert_eq!(value["mode"], "multicore");
        assert_eq!(value["outcome"], "completed");
        assert_eq!(value["cores"], 2);
        assert_eq!(value["shape"], serde_json::json!([24, 24]));
        assert!(value.get("device").is_none());
        assert!(value.get("verified").is_none());
    }
}
