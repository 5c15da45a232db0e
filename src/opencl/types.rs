//! OpenCL типы данных и константы

#![allow(non_camel_case_types)]

pub type cl_platform_id = *mut std::ffi::c_void;
pub type cl_device_id = *mut std::ffi::c_void;
pub type cl_context = *mut std::ffi::c_void;
pub type cl_command_queue = *mut std::ffi::c_void;
pub type cl_program = *mut std::ffi::c_void;
pub type cl_kernel = *mut std::ffi::c_void;
pub type cl_mem = *mut std::ffi::c_void;
pub type cl_event = *mut std::ffi::c_void;
pub type cl_int = i32;
pub type cl_uint = u32;
pub type cl_bool = u32;
pub type cl_device_type = u64;
pub type cl_device_info = u32;
pub type cl_context_properties = isize;
pub type cl_command_queue_properties = u64;
pub type cl_mem_flags = u64;
pub type cl_program_build_info = u32;

// Коды возврата
pub const CL_SUCCESS: cl_int = 0;
pub const CL_DEVICE_NOT_FOUND: cl_int = -1;
pub const CL_PLATFORM_NOT_FOUND_KHR: cl_int = -1001;

pub const CL_TRUE: cl_bool = 1;

// Константы OpenCL
pub const CL_DEVICE_TYPE_GPU: cl_device_type = 1 << 2;
pub const CL_DEVICE_NAME: cl_device_info = 0x102B;
pub const CL_MEM_READ_ONLY: cl_mem_flags = 1 << 2;
pub const CL_MEM_WRITE_ONLY: cl_mem_flags = 1 << 1;
pub const CL_MEM_COPY_HOST_PTR: cl_mem_flags = 1 << 5;
pub const CL_PROGRAM_BUILD_LOG: cl_program_build_info = 0x1183;

/// Символьное имя кода ошибки OpenCL
pub fn error_name(code: cl_int) -> &'static str {
    match code {
        0 => "CL_SUCCESS",
        -1 => "CL_DEVICE_NOT_FOUND",
        -2 => "CL_DEVICE_NOT_AVAILABLE",
        -3 => "CL_COMPILER_NOT_AVAILABLE",
        -4 => "CL_MEM_OBJECT_ALLOCATION_FAILURE",
        -5 => "CL_OUT_OF_RESOURCES",
        -6 => "CL_OUT_OF_HOST_MEMORY",
        -11 => "CL_BUILD_PROGRAM_FAILURE",
        -30 => "CL_INVALID_VALUE",
        -33 => "CL_INVALID_DEVICE",
        -34 => "CL_INVALID_CONTEXT",
        -36 => "CL_INVALID_COMMAND_QUEUE",
        -38 => "CL_INVALID_MEM_OBJECT",
        -44 => "CL_INVALID_PROGRAM",
        -46 => "CL_INVALID_KERNEL_NAME",
        -48 => "CL_INVALID_KERNEL",
        -51 => "CL_INVALID_ARG_SIZE",
        -52 => "CL_INVALID_KERNEL_ARGS",
        -54 => "CL_INVALID_WORK_GROUP_SIZE",
        -61 => "CL_INVALID_BUFFER_SIZE",
        -1001 => "CL_PLATFORM_NOT_FOUND_KHR",
        _ => "CL_UNKNOWN_ERROR",
    }
}
