//! Операции над матрицами

use super::types::MatrixType;
use anyhow::{ensure, Context, Result};
use ndarray::{concatenate, s, Array2, Axis};
use rand::thread_rng;
use rand_distr::{Distribution, Uniform};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

/// Инициализирует квадратные матрицы заданного типа и размера
pub fn initialize_matrices(matrix_type: MatrixType, size: usize) -> (Array2<f64>, Array2<f64>) {
    match matrix_type {
        MatrixType::OnesAndTwos => {
            (Array2::from_elem((size, size), 1.0), Array2::from_elem((size, size), 2.0))
        },
        MatrixType::Random => {
            let mut rng = thread_rng();
            let uniform = Uniform::new(0.0f64, 1.0);
            let a = Array2::from_shape_simple_fn((size, size), || uniform.sample(&mut rng));
            let b = Array2::from_shape_simple_fn((size, size), || uniform.sample(&mut rng));
            (a, b)
        }
    }
}

/// Известное произведение матриц, созданных `initialize_matrices`.
///
/// Для `OnesAndTwos` каждый элемент равен `2 * size`; для случайных
/// матриц ответа заранее нет.
pub fn expected_product(matrix_type: MatrixType, size: usize) -> Option<Array2<f64>> {
    match matrix_type {
        MatrixType::OnesAndTwos => Some(Array2::from_elem((size, size), 2.0 * size as f64)),
        MatrixType::Random => None,
    }
}

fn check_dimensions(a: &Array2<f64>, b: &Array2<f64>) -> Result<()> {
    ensure!(
        a.ncols() == b.nrows(),
        "matrix dimensions do not match: {:?} x {:?}",
        a.dim(),
        b.dim()
    );
    Ok(())
}

/// CPU реализация матричного умножения в одном потоке
pub fn cpu_matrix_multiply(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    check_dimensions(a, b)?;
    debug!(rows = a.nrows(), inner = a.ncols(), cols = b.ncols(), "single-threaded multiply");
    Ok(a.dot(b))
}

/// Собирает пул потоков для многоядерного режима.
///
/// `threads == 0` оставляет выбор числа потоков за rayon. Число потоков —
/// только подсказка: сколько ядер реально будет занято, решает ОС.
pub fn build_thread_pool(threads: usize) -> Result<ThreadPool> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|index| format!("matmul-{index}"))
        .build()
        .context("failed to build the matrix multiply thread pool")?;
    debug!(requested = threads, actual = pool.current_num_threads(), "thread pool ready");
    Ok(pool)
}

/// Умножение матриц в пуле потоков.
///
/// Строки `a` делятся на блоки по числу потоков пула, каждый блок
/// умножается на `b` независимо, затем блоки склеиваются по строкам.
pub fn parallel_matrix_multiply(
    a: &Array2<f64>,
    b: &Array2<f64>,
    pool: &ThreadPool,
) -> Result<Array2<f64>> {
    check_dimensions(a, b)?;

    let rows = a.nrows();
    if rows == 0 {
        return Ok(Array2::zeros((0, b.ncols())));
    }

    let blocks = pool.current_num_threads().clamp(1, rows);
    let block_rows = rows.div_ceil(blocks);
    let starts: Vec<usize> = (0..rows).step_by(block_rows).collect();
    debug!(blocks = starts.len(), block_rows, "parallel multiply");

    let parts: Vec<Array2<f64>> = pool.install(|| {
        starts
            .par_iter()
            .map(|&start| {
                let end = (start + block_rows).min(rows);
                a.slice(s![start..end, ..]).dot(b)
            })
            .collect()
    });

    let views: Vec<_> = parts.iter().map(|part| part.view()).collect();
    concatenate(Axis(0), &views).context("failed to join row blocks")
}

/// Сравнивает две матрицы поэлементно с допуском `epsilon`
pub fn compare_results(left: &Array2<f64>, right: &Array2<f64>, epsilon: f64) -> bool {
    if left.dim() != right.dim() {
        warn!(left = ?left.dim(), right = ?right.dim(), "shapes differ");
        return false;
    }

    let mut max_diff = 0.0f64;
    let mut diff_count = 0usize;

    for (x, y) in left.iter().zip(right.iter()) {
        let diff = (x - y).abs();
        if diff > epsilon {
            diff_count += 1;
            max_diff = max_diff.max(diff);
        }
    }

    if diff_count > 0 {
        warn!(diff_count, max_diff, "matrices differ");
        false
    } else {
        true
    }
}
