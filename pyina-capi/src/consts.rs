//! Return codes.
//!
//! IMPORTANT: These must mirror those in `pyina-capi/include/pyina.h`.
use crate::c;

pub const SUCCESS: c::ReturnStatus = 0;

/// A null communicator was ignored; outputs are left empty.
pub const NONE: c::ReturnStatus = 1;

pub const ERR_ARG: c::ReturnStatus = -1;

pub const ERR_NULL_COMM: c::ReturnStatus = -2;

pub const ERR_TRANSPORT: c::ReturnStatus = -3;

pub const ERR_INTERNAL: c::ReturnStatus = -4;

pub const ERR_NOT_INITIALIZED: c::ReturnStatus = -5;
