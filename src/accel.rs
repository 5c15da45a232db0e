//! Определение доступности GPU
//!
//! Возможность считать на ускорителе выясняется один раз при старте
//! программы. Дальше режим `gpu` ветвится по [`Accelerator`], а не по
//! ошибке загрузки библиотеки.

use crate::matrix::Shape;
use anyhow::Result;
use ndarray::Array2;

/// Бэкенд, умеющий умножать матрицы на устройстве
pub trait GpuBackend {
    /// Человекочитаемое имя устройства
    fn device_name(&self) -> String;

    /// Ставит умножение `a * b` в очередь устройства.
    ///
    /// Возврат не означает, что вычисления закончены: для этого есть
    /// [`GpuBackend::synchronize`].
    fn matrix_multiply(&mut self, a: &Array2<f64>, b: &Array2<f64>) -> Result<Shape>;

    /// Ждет завершения всей работы, поставленной в очередь
    fn synchronize(&mut self) -> Result<()>;

    /// Копирует результат последнего умножения в память хоста
    fn read_result(&mut self) -> Result<Array2<f64>>;
}

/// Результат проверки наличия ускорителя
pub enum Accelerator {
    /// GPU недоступен; строка объясняет почему
    Unavailable(String),
    Available(Box<dyn GpuBackend>),
}

impl Accelerator {
    /// Ищет GPU через OpenCL
    #[cfg(feature = "opencl")]
    pub fn detect() -> Self {
        match crate::opencl::OpenClBackend::probe() {
            Ok(Some(backend)) => {
                tracing::info!(device = %backend.device_name(), "OpenCL GPU detected");
                Accelerator::Available(Box::new(backend))
            }
            Ok(None) => Self::unavailable("no OpenCL GPU device found"),
            Err(err) => Self::unavailable(format!("OpenCL probe failed: {err:#}")),
        }
    }

    /// Сборка без фичи `opencl`: ускорителя нет
    #[cfg(not(feature = "opencl"))]
    pub fn detect() -> Self {
        Self::unavailable("built without the `opencl` feature")
    }

    fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::info!(%reason, "GPU unavailable");
        Accelerator::Unavailable(reason)
    }
}

impl std::fmt::Debug for Accelerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Accelerator::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
            Accelerator::Available(backend) => {
                f.debug_tuple("Available").field(&backend.device_name()).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "opencl"))]
    #[test]
    fn detect_without_feature_is_unavailable() {
        match Accelerator::detect() {
            Accelerator::Unavailable(reason) => assert!(reason.contains("opencl")),
            Accelerator::Available(_) => unreachable!(),
        }
    }

    struct Dummy;

    impl GpuBackend for Dummy {
        fn device_name(&self) -> String {
            "dummy".into()
        }

        fn matrix_multiply(&mut self, a: &Array2<f64>, b: &Array2<f64>) -> Result<Shape> {
            Ok(Shape(a.nrows(), b.ncols()))
        }

        fn synchronize(&mut self) -> Result<()> {
            Ok(())
        }

        fn read_result(&mut self) -> Result<Array2<f64>> {
            Ok(Array2::zeros((0, 0)))
        }
    }

    #[test]
    fn debug_shows_device_name() {
        let accel = Accelerator::Available(Box::new(Dummy));
        assert_eq!(format!("{accel:?}"), "Available(\"dummy\")");
    }
}
