//! Модуль для работы с OpenCL
//!
//! Содержит низкоуровневые привязки и безопасные обертки для OpenCL

pub mod bindings;
pub mod callbacks;
pub mod context;
pub mod types;

pub use context::GpuContext;
pub use types::error_name;

use crate::accel::GpuBackend;
use crate::matrix::Shape;
use anyhow::{anyhow, ensure, Result};
use bindings::*;
use ndarray::Array2;
use std::ffi::c_void;
use std::ptr;
use types::*;

/// Превращает код возврата OpenCL в `Result`
pub fn check(code: cl_int, what: &str) -> Result<()> {
    if code == CL_SUCCESS {
        Ok(())
    } else {
        Err(anyhow!("{what} failed: {} ({code})", error_name(code)))
    }
}

/// Список платформ; отсутствие ICD считается пустым списком
fn platforms() -> Result<Vec<cl_platform_id>> {
    let mut count: cl_uint = 0;
    let status = unsafe { clGetPlatformIDs(0, ptr::null_mut(), &mut count) };
    if status == CL_PLATFORM_NOT_FOUND_KHR || count == 0 {
        return Ok(Vec::new());
    }
    check(status, "clGetPlatformIDs")?;

    let mut ids = vec![ptr::null_mut(); count as usize];
    cl_check!("clGetPlatformIDs", clGetPlatformIDs(count, ids.as_mut_ptr(), ptr::null_mut()))?;
    Ok(ids)
}

/// Первое GPU устройство платформы, если оно есть
fn first_gpu(platform: cl_platform_id) -> Result<Option<cl_device_id>> {
    let mut device = ptr::null_mut();
    let mut count: cl_uint = 0;
    let status = unsafe { clGetDeviceIDs(platform, CL_DEVICE_TYPE_GPU, 1, &mut device, &mut count) };
    if status == CL_DEVICE_NOT_FOUND || count == 0 {
        return Ok(None);
    }
    check(status, "clGetDeviceIDs")?;
    Ok(Some(device))
}

/// Первое найденное устройство.
///
/// Ошибка на одной платформе не мешает проверить остальные.
fn first_device<P, D>(
    platforms: impl IntoIterator<Item = P>,
    mut lookup: impl FnMut(P) -> Result<Option<D>>,
) -> Option<D> {
    for platform in platforms {
        match lookup(platform) {
            Ok(Some(device)) => return Some(device),
            Ok(None) => continue,
            Err(err) => {
                tracing::debug!(error = %format!("{err:#}"), "skipping OpenCL platform");
            }
        }
    }
    None
}

fn device_name(device: cl_device_id) -> Result<String> {
    let mut size = 0usize;
    cl_check!("clGetDeviceInfo", clGetDeviceInfo(device, CL_DEVICE_NAME, 0, ptr::null_mut(), &mut size))?;

    let mut name = vec![0u8; size];
    cl_check!("clGetDeviceInfo", clGetDeviceInfo(
        device,
        CL_DEVICE_NAME,
        size,
        name.as_mut_ptr() as *mut c_void,
        ptr::null_mut()
    ))?;

    Ok(String::from_utf8_lossy(&name).trim_end_matches('\0').trim().to_string())
}

/// GPU бэкенд поверх OpenCL.
///
/// Контекст создается лениво при первом умножении, так что его стоимость
/// попадает в замер так же, как инициализация драйвера.
pub struct OpenClBackend {
    device: cl_device_id,
    name: String,
    context: Option<GpuContext>,
}

impl OpenClBackend {
    /// Ищет первое GPU устройство среди всех платформ
    pub fn probe() -> Result<Option<Self>> {
        let Some(device) = first_device(platforms()?, first_gpu) else {
            return Ok(None);
        };
        let name = device_name(device)?;
        Ok(Some(Self { device, name, context: None }))
    }

    fn context(&mut self) -> Result<&mut GpuContext> {
        if self.context.is_none() {
            self.context = Some(GpuContext::new(self.device)?);
        }
        self.context.as_mut().ok_or_else(|| anyhow!("OpenCL context was not created"))
    }
}

impl GpuBackend for OpenClBackend {
    fn device_name(&self) -> String {
        self.name.clone()
    }

    fn matrix_multiply(&mut self, a: &Array2<f64>, b: &Array2<f64>) -> Result<Shape> {
        let size = a.nrows();
        ensure!(
            a.dim() == (size, size) && b.dim() == (size, size),
            "GPU multiply expects square matrices of equal size, got {:?} and {:?}",
            a.dim(),
            b.dim()
        );

        let a_host = a.as_standard_layout();
        let b_host = b.as_standard_layout();
        let (a_data, b_data) = match (a_host.as_slice(), b_host.as_slice()) {
            (Some(a_data), Some(b_data)) => (a_data, b_data),
            _ => return Err(anyhow!("matrices are not contiguous")),
        };

        self.context()?.matrix_multiply(a_data, b_data, size)?;
        Ok(Shape::square(size))
    }

    fn synchronize(&mut self) -> Result<()> {
        match &self.context {
            Some(ctx) => ctx.finish(),
            None => Ok(()),
        }
    }

    fn read_result(&mut self) -> Result<Array2<f64>> {
        let ctx = self.context.as_ref().ok_or_else(|| anyhow!("nothing was computed on the GPU"))?;
        let (data, size) = ctx.read_result()?;
        Ok(Array2::from_shape_vec((size, size), data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_names_the_failing_call() {
        assert!(check(CL_SUCCESS, "clFinish").is_ok());
        let err = check(-5, "clFinish").unwrap_err().to_string();
        assert_eq!(err, "clFinish failed: CL_OUT_OF_RESOURCES (-5)");
        assert_eq!(error_name(-12345), "CL_UNKNOWN_ERROR");
    }

    #[test]
    fn failing_platform_does_not_stop_the_search() {
        let found = first_device(["broken", "empty", "gpu"], |platform| match platform {
            "broken" => Err(anyhow!("clGetDeviceIDs failed: CL_INVALID_VALUE (-30)")),
            "empty" => Ok(None),
            other => Ok(Some(other)),
        });
        assert_eq!(found, Some("gpu"));

        let none: Option<&str> = first_device(["broken"], |_| Err(anyhow!("boom")));
        assert_eq!(none, None);
    }
}
