//! Communicator and group handles.
use crate::{binding, c, consts, report};
use lazy_static::lazy_static;
use log::{debug, info};
use pyina::{Communicator, Group, MpiComm, MpiConstants, CONSTANT_NAMES};
use std::ffi::{c_char, c_int, CString};
use std::ptr;

lazy_static! {
    static ref CONSTANT_CNAMES: Vec<CString> = CONSTANT_NAMES
        .iter()
        .filter_map(|name| CString::new(*name).ok())
        .collect();
}

/// Return a handle for MPI_COMM_WORLD, or NULL before initialization. The
/// handle must be released with `pyina_comm_free()`.
#[no_mangle]
pub unsafe extern "C" fn pyina_comm_world() -> c::Comm {
    info!("pyina_comm_world()");
    match MpiComm::world() {
        Ok(comm) => Box::into_raw(Box::new(comm)),
        Err(err) => {
            report("pyina_comm_world", err);
            ptr::null_mut()
        }
    }
}

/// Shared body of the rank and size queries.
unsafe fn query(comm: c::Comm, out: *mut c_int, op: &str, f: fn(&MpiComm) -> i32) -> c::ReturnStatus {
    if out.is_null() {
        return consts::ERR_ARG;
    }
    match binding().resolve_handle(comm.as_ref()) {
        Ok(Some(comm)) => {
            *out = f(comm);
            consts::SUCCESS
        }
        Ok(None) => consts::NONE,
        Err(err) => report(op, err),
    }
}

#[no_mangle]
pub unsafe extern "C" fn pyina_comm_rank(comm: c::Comm, rank: *mut c_int) -> c::ReturnStatus {
    query(comm, rank, "pyina_comm_rank", |comm| comm.rank())
}

#[no_mangle]
pub unsafe extern "C" fn pyina_comm_size(comm: c::Comm, size: *mut c_int) -> c::ReturnStatus {
    query(comm, size, "pyina_comm_size", |comm| comm.size())
}

/// Duplicate a communicator (collective). Returns NULL for a null
/// communicator or on failure.
#[no_mangle]
pub unsafe extern "C" fn pyina_comm_dup(comm: c::Comm) -> c::Comm {
    info!("pyina_comm_dup()");
    match binding().duplicate(comm.as_ref()) {
        Ok(Some(dup)) => Box::into_raw(Box::new(dup)),
        Ok(None) => ptr::null_mut(),
        Err(err) => {
            report("pyina_comm_dup", err);
            ptr::null_mut()
        }
    }
}

/// Release a communicator handle. Duplicated communicators are freed; the
/// world handle is only released.
#[no_mangle]
pub unsafe extern "C" fn pyina_comm_free(comm: c::Comm) {
    if comm.is_null() {
        return;
    }
    debug!("pyina_comm_free()");
    drop(Box::from_raw(comm));
}

/// Derive the group of a communicator. Returns NULL for a null communicator
/// or on failure.
#[no_mangle]
pub unsafe extern "C" fn pyina_test(comm: c::Comm) -> c::Group {
    info!("pyina_test()");
    match binding().derive_group(comm.as_ref()) {
        Ok(Some(group)) => {
            debug!(
                target: "pyina::test",
                "group size {}, rank {:?}",
                group.size(),
                group.rank()
            );
            Box::into_raw(Box::new(group))
        }
        Ok(None) => ptr::null_mut(),
        Err(err) => {
            report("pyina_test", err);
            ptr::null_mut()
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn pyina_group_size(group: c::Group, size: *mut c_int) -> c::ReturnStatus {
    if size.is_null() {
        return consts::ERR_ARG;
    }
    match group.as_ref() {
        Some(group) => {
            *size = group.size();
            consts::SUCCESS
        }
        None => consts::ERR_ARG,
    }
}

/// Rank of the caller in the group; -1 if it is not a member.
#[no_mangle]
pub unsafe extern "C" fn pyina_group_rank(group: c::Group, rank: *mut c_int) -> c::ReturnStatus {
    if rank.is_null() {
        return consts::ERR_ARG;
    }
    match group.as_ref() {
        Some(group) => {
            *rank = group.rank().unwrap_or(-1);
            consts::SUCCESS
        }
        None => consts::ERR_ARG,
    }
}

#[no_mangle]
pub unsafe extern "C" fn pyina_group_free(group: c::Group) -> c::ReturnStatus {
    if group.is_null() {
        return consts::ERR_ARG;
    }
    drop(Box::from_raw(group));
    consts::SUCCESS
}

/// Fill `out` with the exported MPI constants. MPI does not need to be
/// initialized.
#[no_mangle]
pub unsafe extern "C" fn pyina_mpiconsts(out: *mut c::Consts) -> c::ReturnStatus {
    match out.as_mut() {
        Some(out) => {
            *out = MpiConstants::query().into();
            consts::SUCCESS
        }
        None => consts::ERR_ARG,
    }
}

/// Number of exported constants.
#[no_mangle]
pub extern "C" fn pyina_mpiconst_count() -> c_int {
    CONSTANT_NAMES.len() as c_int
}

/// Name of the constant at `index`, or NULL if out of range. The string is
/// static.
#[no_mangle]
pub extern "C" fn pyina_mpiconst_name(index: c_int) -> *const c_char {
    usize::try_from(index)
        .ok()
        .and_then(|index| CONSTANT_CNAMES.get(index))
        .map_or(ptr::null(), |name| name.as_ptr())
}

/// Value of the constant at `index`.
#[no_mangle]
pub unsafe extern "C" fn pyina_mpiconst_value(index: c_int, value: *mut c_int) -> c::ReturnStatus {
    let Some(value) = value.as_mut() else {
        return consts::ERR_ARG;
    };
    let entries = MpiConstants::query().entries();
    match usize::try_from(index).ok().and_then(|index| entries.get(index)) {
        Some((_, v)) => {
            *value = *v;
            consts::SUCCESS
        }
        None => consts::ERR_ARG,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_communicator_is_ignored() {
        let mut value: c_int = 77;
        unsafe {
            assert_eq!(pyina_comm_rank(ptr::null_mut(), &mut value), consts::NONE);
            assert_eq!(pyina_comm_size(ptr::null_mut(), &mut value), consts::NONE);
            assert!(pyina_comm_dup(ptr::null_mut()).is_null());
            assert!(pyina_test(ptr::null_mut()).is_null());
            pyina_comm_free(ptr::null_mut());
        }
        assert_eq!(value, 77);
    }

    #[test]
    fn null_out_pointers_are_argument_errors() {
        unsafe {
            assert_eq!(pyina_comm_rank(ptr::null_mut(), ptr::null_mut()), consts::ERR_ARG);
            assert_eq!(pyina_group_size(ptr::null_mut(), ptr::null_mut()), consts::ERR_ARG);
            assert_eq!(pyina_group_free(ptr::null_mut()), consts::ERR_ARG);
            assert_eq!(pyina_mpiconsts(ptr::null_mut()), consts::ERR_ARG);
        }
    }

    #[test]
    fn world_requires_initialization() {
        assert!(unsafe { pyina_comm_world() }.is_null());
    }

    #[test]
    fn constants_are_exported() {
        let mut out = c::Consts::default();
        assert_eq!(unsafe { pyina_mpiconsts(&mut out) }, consts::SUCCESS);
        assert!(out.any_source < 0);
        assert!(out.any_tag < 0);
        assert_ne!(out.any_source, out.root);
        assert!(out.tag_ub >= 0);
    }

    #[test]
    fn constants_by_index() {
        use std::ffi::CStr;

        assert_eq!(pyina_mpiconst_count(), 7);
        let name = unsafe { CStr::from_ptr(pyina_mpiconst_name(1)) };
        assert_eq!(name.to_str().unwrap(), "MPI_ANY_SOURCE");
        assert!(pyina_mpiconst_name(7).is_null());
        assert!(pyina_mpiconst_name(-1).is_null());

        let mut value: c_int = 0;
        let mut out = c::Consts::default();
        unsafe {
            assert_eq!(pyina_mpiconsts(&mut out), consts::SUCCESS);
            assert_eq!(pyina_mpiconst_value(1, &mut value), consts::SUCCESS);
            assert_eq!(pyina_mpiconst_value(7, &mut value), consts::ERR_ARG);
            assert_eq!(pyina_mpiconst_value(0, ptr::null_mut()), consts::ERR_ARG);
        }
        assert_eq!(value, out.any_source);
    }
}
