//! Контекст OpenCL для умножения матриц на GPU

use super::bindings::*;
use super::callbacks::log_context_error;
use super::error_name;
use super::types::*;
use crate::matrix::{MATRIX_MULTIPLY_KERNEL, MATRIX_MULTIPLY_KERNEL_NAME, TILE_SIZE};
use anyhow::{anyhow, bail, ensure, Context, Result};
use std::ffi::{c_void, CString};
use std::ptr;

/// Владеет всеми объектами OpenCL и освобождает их в `Drop`.
///
/// Поля заполняются по мере создания, поэтому при ошибке посередине
/// `new` освобождается только то, что уже успели создать.
pub struct GpuContext {
    device: cl_device_id,
    context: cl_context,
    command_queue: cl_command_queue,
    program: cl_program,
    kernel: cl_kernel,
    buffers: Vec<cl_mem>,
    /// Буфер результата последнего умножения и его размер
    result: Option<(cl_mem, usize)>,
}

impl GpuContext {
    /// Создает контекст, очередь команд и компилирует ядро для `device`
    pub fn new(device: cl_device_id) -> Result<Self> {
        let mut ctx = Self {
            device,
            context: ptr::null_mut(),
            command_queue: ptr::null_mut(),
            program: ptr::null_mut(),
            kernel: ptr::null_mut(),
            buffers: Vec::new(),
            result: None,
        };

        ctx.context = cl_create!("clCreateContext", |err| clCreateContext(
            ptr::null(),
            1,
            &device,
            Some(log_context_error),
            ptr::null_mut(),
            &mut err
        ))?;

        ctx.command_queue = cl_create!("clCreateCommandQueue", |err| clCreateCommandQueue(
            ctx.context,
            device,
            0,
            &mut err
        ))?;

        let source = CString::new(MATRIX_MULTIPLY_KERNEL)?;
        let source_ptr = source.as_ptr();
        let source_len = MATRIX_MULTIPLY_KERNEL.len();
        ctx.program = cl_create!("clCreateProgramWithSource", |err| clCreateProgramWithSource(
            ctx.context,
            1,
            &source_ptr,
            &source_len,
            &mut err
        ))?;

        let build_status = unsafe {
            clBuildProgram(ctx.program, 1, &device, ptr::null(), None, ptr::null_mut())
        };
        if build_status != CL_SUCCESS {
            let log = ctx.build_log().unwrap_or_else(|err| format!("<no build log: {err:#}>"));
            bail!(
                "failed to build the matrix multiply kernel ({}): {}",
                error_name(build_status),
                log.trim()
            );
        }

        let kernel_name = CString::new(MATRIX_MULTIPLY_KERNEL_NAME)?;
        ctx.kernel = cl_create!("clCreateKernel", |err| clCreateKernel(
            ctx.program,
            kernel_name.as_ptr(),
            &mut err
        ))?;

        Ok(ctx)
    }

    /// Лог компиляции программы
    fn build_log(&self) -> Result<String> {
        let mut log_size = 0usize;
        cl_check!("clGetProgramBuildInfo", clGetProgramBuildInfo(
            self.program,
            self.device,
            CL_PROGRAM_BUILD_LOG,
            0,
            ptr::null_mut(),
            &mut log_size
        ))?;

        let mut log = vec![0u8; log_size];
        cl_check!("clGetProgramBuildInfo", clGetProgramBuildInfo(
            self.program,
            self.device,
            CL_PROGRAM_BUILD_LOG,
            log_size,
            log.as_mut_ptr() as *mut c_void,
            ptr::null_mut()
        ))?;

        Ok(String::from_utf8_lossy(&log).trim_end_matches('\0').to_string())
    }

    fn release_buffers(&mut self) {
        self.result = None;
        for buffer in self.buffers.drain(..) {
            unsafe {
                clReleaseMemObject(buffer);
            }
        }
    }

    fn create_buffer(&mut self, flags: cl_mem_flags, bytes: usize, host: Option<&[f64]>) -> Result<cl_mem> {
        let host_ptr = host.map_or(ptr::null_mut(), |data| data.as_ptr() as *mut c_void);
        let buffer = cl_create!("clCreateBuffer", |err| clCreateBuffer(
            self.context,
            flags,
            bytes,
            host_ptr,
            &mut err
        ))?;
        self.buffers.push(buffer);
        Ok(buffer)
    }

    /// Ставит в очередь умножение квадратных матриц `size x size`.
    ///
    /// Данные `a` и `b` копируются на устройство при создании буферов;
    /// результат остается в памяти устройства до `read_result`.
    pub fn matrix_multiply(&mut self, a: &[f64], b: &[f64], size: usize) -> Result<()> {
        let elements = size * size;
        ensure!(
            a.len() == elements && b.len() == elements,
            "expected two {size}x{size} matrices, got {} and {} elements",
            a.len(),
            b.len()
        );
        let size_arg = cl_int::try_from(size).context("matrix too large for the kernel")?;

        self.release_buffers();

        let bytes = elements * std::mem::size_of::<f64>();
        let a_buffer = self.create_buffer(CL_MEM_READ_ONLY | CL_MEM_COPY_HOST_PTR, bytes, Some(a))?;
        let b_buffer = self.create_buffer(CL_MEM_READ_ONLY | CL_MEM_COPY_HOST_PTR, bytes, Some(b))?;
        let c_buffer = self.create_buffer(CL_MEM_WRITE_ONLY, bytes, None)?;
        self.result = Some((c_buffer, size));

        for (index, buffer) in [a_buffer, b_buffer, c_buffer].iter().enumerate() {
            cl_check!("clSetKernelArg", clSetKernelArg(
                self.kernel,
                index as cl_uint,
                std::mem::size_of::<cl_mem>(),
                buffer as *const _ as *const c_void
            ))?;
        }
        cl_check!("clSetKernelArg", clSetKernelArg(
            self.kernel,
            3,
            std::mem::size_of::<cl_int>(),
            &size_arg as *const _ as *const c_void
        ))?;

        let padded = size.div_ceil(TILE_SIZE) * TILE_SIZE;
        let global_size = [padded, padded];
        let local_size = [TILE_SIZE, TILE_SIZE];

        cl_check!("clEnqueueNDRangeKernel", clEnqueueNDRangeKernel(
            self.command_queue,
            self.kernel,
            2,
            ptr::null(),
            global_size.as_ptr(),
            local_size.as_ptr(),
            0,
            ptr::null(),
            ptr::null_mut()
        ))
    }

    /// Блокирующее чтение результата; возвращает данные по строкам
    pub fn read_result(&self) -> Result<(Vec<f64>, usize)> {
        let (buffer, size) = self.result.ok_or_else(|| anyhow!("no result on the device"))?;
        let mut host = vec![0.0f64; size * size];
        cl_check!("clEnqueueReadBuffer", clEnqueueReadBuffer(
            self.command_queue,
            buffer,
            CL_TRUE,
            0,
            host.len() * std::mem::size_of::<f64>(),
            host.as_mut_ptr() as *mut c_void,
            0,
            ptr::null(),
            ptr::null_mut()
        ))?;
        Ok((host, size))
    }

    /// Барьер: ждет окончания всех команд в очереди
    pub fn finish(&self) -> Result<()> {
        cl_check!("clFinish", clFinish(self.command_queue))
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        self.release_buffers();
        unsafe {
            if !self.kernel.is_null() {
                clReleaseKernel(self.kernel);
            }
            if !self.program.is_null() {
                clReleaseProgram(self.program);
            }
            if !self.command_queue.is_null() {
                clReleaseCommandQueue(self.command_queue);
            }
            if !self.context.is_null() {
                clReleaseContext(self.context);
            }
        }
    }
}
