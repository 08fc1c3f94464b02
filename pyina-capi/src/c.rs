//! C interface types and definitions.
use pyina::{MpiComm, MpiConstants, MpiGroup, RecvStatus};
use std::ffi::c_int;

/// Default return value type.
pub type ReturnStatus = c_int;

/// Opaque communicator handle. A null pointer is the null communicator.
pub type Comm = *mut MpiComm;

/// Opaque group handle.
pub type Group = *mut MpiGroup;

/// Status of a string receive.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Status {
    pub source: c_int,
    pub tag: c_int,
    pub error: c_int,
}

impl From<RecvStatus> for Status {
    fn from(status: RecvStatus) -> Status {
        Status {
            source: status.source,
            tag: status.tag,
            error: status.error,
        }
    }
}

/// Exported MPI constants.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Consts {
    pub any_tag: c_int,
    pub any_source: c_int,
    pub root: c_int,
    pub tag_ub: c_int,
    pub host: c_int,
    pub io: c_int,
    pub wtime_is_global: c_int,
}

impl From<MpiConstants> for Consts {
    fn from(consts: MpiConstants) -> Consts {
        Consts {
            any_tag: consts.any_tag,
            any_source: consts.any_source,
            root: consts.root,
            tag_ub: consts.tag_ub,
            host: consts.host,
            io: consts.io,
            wtime_is_global: consts.wtime_is_global,
        }
    }
}
