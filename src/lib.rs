//! Timed CPU, multi-core and GPU matrix multiplication for an HPC tutorial

// Макросы объявлены до модулей, которые их используют
#[cfg(feature = "opencl")]
#[macro_use]
mod macros {
    /// Макрос для обработки ошибок OpenCL (коды возврата)
    #[macro_export]
    macro_rules! cl_check {
        ($what:literal, $expr:expr) => {{
            let code = unsafe { $expr };
            $crate::opencl::check(code, $what)
        }};
    }

    /// Макрос для функций OpenCL, которые возвращают объект и пишут код
    /// ошибки в выходной параметр
    #[macro_export]
    macro_rules! cl_create {
        ($what:literal, |$err:ident| $expr:expr) => {{
            let mut $err: $crate::opencl::types::cl_int = $crate::opencl::types::CL_SUCCESS;
            let obj = unsafe { $expr };
            $crate::opencl::check($err, $what).and_then(|()| {
                if obj.is_null() {
                    Err(::anyhow::anyhow!(concat!($what, " returned a null handle")))
                } else {
                    Ok(obj)
                }
            })
        }};
    }
}

pub mod accel;
pub mod bench;
pub mod cli;
pub mod matrix;
#[cfg(feature = "opencl")]
pub mod opencl;
pub mod utils;

// Реэкспортируем основные типы для удобства
pub use accel::{Accelerator, GpuBackend};
pub use bench::{BenchConfig, BenchReport, CoreCount, Harness, Mode};
pub use matrix::{MatrixType, Shape};
