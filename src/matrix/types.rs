//! Типы матриц и связанные структуры

use serde::Serialize;
use std::fmt;

/// Тип матриц для вычислений
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixType {
    /// Матрицы заполненные 1 и 2
    OnesAndTwos,
    /// Случайно заполненные матрицы, равномерно на [0, 1)
    #[default]
    Random
}

/// Размер матрицы: (строки, столбцы)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Shape(pub usize, pub usize);

impl Shape {
    pub fn square(size: usize) -> Self {
        Shape(size, size)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

impl<S, D> From<&ndarray::ArrayBase<S, D>> for Shape
where
    S: ndarray::Data,
    D: ndarray::Dimension,
{
    fn from(array: &ndarray::ArrayBase<S, D>) -> Self {
        let dims = array.shape();
        Shape(
            dims.first().copied().unwrap_or(0),
            dims.get(1).copied().unwrap_or(1),
        )
    }
}
