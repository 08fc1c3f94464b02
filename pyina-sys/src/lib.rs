//! Raw bindings to the pyina C shim.
//!
//! Handles are Fortran integer handles (`MPI_Fint`), see `csrc/pyina.h`.
#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_double, c_int};

/// Fortran integer handle for a communicator.
pub type pyina_comm_t = c_int;

/// Fortran integer handle for a group.
pub type pyina_group_t = c_int;

/// Compiled-in MPI constant values.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct pyina_consts_t {
    pub any_tag: c_int,
    pub any_source: c_int,
    pub root: c_int,
    pub tag_ub: c_int,
    pub host: c_int,
    pub io: c_int,
    pub wtime_is_global: c_int,
}

extern "C" {
    pub fn pyina_init_thread(required: c_int, provided: *mut c_int) -> c_int;
    pub fn pyina_finalize() -> c_int;
    pub fn pyina_initialized(flag: *mut c_int) -> c_int;
    pub fn pyina_finalized(flag: *mut c_int) -> c_int;
    pub fn pyina_wtime() -> c_double;
    pub fn pyina_get_version(buf: *mut c_char, len: *mut c_int) -> c_int;
    pub fn pyina_error_string(code: c_int, buf: *mut c_char, len: *mut c_int) -> c_int;

    pub fn pyina_consts(out: *mut pyina_consts_t);
    pub fn pyina_undefined() -> c_int;

    pub fn pyina_comm_world() -> pyina_comm_t;
    pub fn pyina_comm_errors_return(comm: pyina_comm_t) -> c_int;
    pub fn pyina_comm_rank(comm: pyina_comm_t, rank: *mut c_int) -> c_int;
    pub fn pyina_comm_size(comm: pyina_comm_t, size: *mut c_int) -> c_int;
    pub fn pyina_comm_dup(comm: pyina_comm_t, newcomm: *mut pyina_comm_t) -> c_int;
    pub fn pyina_comm_free(comm: pyina_comm_t) -> c_int;
    pub fn pyina_comm_group(comm: pyina_comm_t, group: *mut pyina_group_t) -> c_int;
    pub fn pyina_barrier(comm: pyina_comm_t) -> c_int;

    pub fn pyina_group_size(group: pyina_group_t, size: *mut c_int) -> c_int;
    pub fn pyina_group_rank(group: pyina_group_t, rank: *mut c_int) -> c_int;
    pub fn pyina_group_free(group: pyina_group_t) -> c_int;

    pub fn pyina_send_int(value: c_int, dest: c_int, tag: c_int, comm: pyina_comm_t) -> c_int;
    pub fn pyina_recv_int(
        value: *mut c_int,
        source: c_int,
        tag: c_int,
        comm: pyina_comm_t,
        actual_source: *mut c_int,
        actual_tag: *mut c_int,
        actual_error: *mut c_int,
    ) -> c_int;
    pub fn pyina_send_chars(
        buf: *const c_char,
        count: c_int,
        dest: c_int,
        tag: c_int,
        comm: pyina_comm_t,
    ) -> c_int;
    pub fn pyina_recv_chars(
        buf: *mut c_char,
        count: c_int,
        source: c_int,
        tag: c_int,
        comm: pyina_comm_t,
        actual_source: *mut c_int,
        actual_tag: *mut c_int,
        actual_error: *mut c_int,
        actual_count: *mut c_int,
    ) -> c_int;
    pub fn pyina_bcast_int(value: *mut c_int, root: c_int, comm: pyina_comm_t) -> c_int;
    pub fn pyina_bcast_chars(buf: *mut c_char, count: c_int, root: c_int, comm: pyina_comm_t)
        -> c_int;
}
