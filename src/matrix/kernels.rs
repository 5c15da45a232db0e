//! OpenCL ядра для матричных операций

/// Сторона тайла в локальной памяти; совпадает с размером рабочей группы
pub const TILE_SIZE: usize = 16;

/// Имя точки входа ядра
pub const MATRIX_MULTIPLY_KERNEL_NAME: &str = "matrix_multiply";

/// Исходный код ядра для матричного умножения.
///
/// Глобальный размер округляется вверх до `TILE_SIZE`, поэтому все чтения
/// и запись результата проверяют границы: размер 5000 не кратен 16.
pub static MATRIX_MULTIPLY_KERNEL: &str = r#"
#pragma OPENCL EXTENSION cl_khr_fp64 : enable

#define TILE 16

__kernel void matrix_multiply(
    __global const double* a,
    __global const double* b,
    __global double* c,
    const int size
) {
    __local double a_tile[TILE][TILE];
    __local double b_tile[TILE][TILE];

    const int col = get_global_id(0);
    const int row = get_global_id(1);
    const int local_col = get_local_id(0);
    const int local_row = get_local_id(1);

    double sum = 0.0;
    const int num_tiles = (size + TILE - 1) / TILE;

    for (int tile = 0; tile < num_tiles; tile++) {
        const int a_col = tile * TILE + local_col;
        const int b_row = tile * TILE + local_row;

        a_tile[local_row][local_col] = (row < size && a_col < size) ? a[row * size + a_col] : 0.0;
        b_tile[local_row][local_col] = (b_row < size && col < size) ? b[b_row * size + col] : 0.0;

        barrier(CLK_LOCAL_MEM_FENCE);

        #pragma unroll
        for (int k = 0; k < TILE; k++) {
            sum = fma(a_tile[local_row][k], b_tile[k][local_col], sum);
        }

        barrier(CLK_LOCAL_MEM_FENCE);
    }

    if (row < size && col < size) {
        c[row * size + col] = sum;
    }
}
"#;
