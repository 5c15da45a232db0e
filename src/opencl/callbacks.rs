use std::ffi::{c_char, c_void, CStr};

/// Тип callback-функции для контекста OpenCL
pub type ContextNotifyCallback = Option<
    unsafe extern "C" fn(
        errinfo: *const c_char,
        private_info: *const c_void,
        cb: usize,
        user_data: *mut c_void,
    )
>;

/// Пересылает сообщения драйвера об ошибках контекста в `tracing`
pub unsafe extern "C" fn log_context_error(
    errinfo: *const c_char,
    _private_info: *const c_void,
    _cb: usize,
    _user_data: *mut c_void,
) {
    if errinfo.is_null() {
        return;
    }
    // Драйвер передает строку, завершенную нулем
    let message = unsafe { CStr::from_ptr(errinfo) }.to_string_lossy();
    tracing::warn!(%message, "OpenCL context error");
}
