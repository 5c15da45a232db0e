//! Модуль для работы с матрицами
//!
//! Предоставляет:
//! - Типы матриц
//! - Операции над матрицами на CPU (одно ядро и пул потоков)
//! - Исходный код OpenCL ядра (с фичей `opencl`)

mod types;
pub mod operations;
#[cfg(feature = "opencl")]
pub mod kernels;

pub use types::{MatrixType, Shape};
pub use operations::{
    build_thread_pool,
    compare_results,
    cpu_matrix_multiply,
    expected_product,
    initialize_matrices,
    parallel_matrix_multiply,
};
#[cfg(feature = "opencl")]
pub use kernels::{MATRIX_MULTIPLY_KERNEL, MATRIX_MULTIPLY_KERNEL_NAME, TILE_SIZE};
