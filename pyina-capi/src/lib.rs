//! C API for the pyina string-transfer binding.
//!
//! Communicator and group handles are boxed Rust values handed out as
//! opaque pointers; the caller releases them with `pyina_comm_free` and
//! `pyina_group_free`. A NULL communicator is resolved through the
//! configured null communicator policy.
use lazy_static::lazy_static;
use log::{error, info};
use parking_lot::Mutex;
use pyina::{Binding, Config, Context, Error};
use std::ffi::{c_char, CString};

mod c;
mod comm;
mod consts;
mod p2p;

/// Process-global state between `pyina_init()` and `pyina_finalize()`.
struct State {
    ctx: Context,
    binding: Binding,
}

lazy_static! {
    static ref STATE: Mutex<Option<State>> = Mutex::new(None);
    static ref HELLO: CString = CString::new(pyina::hello()).unwrap_or_default();
}

/// Binding to use for the next call. Before initialization the defaults
/// apply, so null handles are still resolved by policy.
pub(crate) fn binding() -> Binding {
    STATE
        .lock()
        .as_ref()
        .map(|state| state.binding.clone())
        .unwrap_or_default()
}

/// Map a library error to a return code.
pub(crate) fn error_code(err: &Error) -> c::ReturnStatus {
    match err {
        Error::NullCommunicator => consts::ERR_NULL_COMM,
        Error::NotInitialized => consts::ERR_NOT_INITIALIZED,
        Error::InvalidRank { .. } | Error::InvalidTag(_) | Error::MessageTooLong(_) => consts::ERR_ARG,
        Error::Mpi { .. }
        | Error::InvalidLength(_)
        | Error::Truncated { .. }
        | Error::Mismatch { .. }
        | Error::Timeout => consts::ERR_TRANSPORT,
        Error::AlreadyInitialized
        | Error::InitFailure(_)
        | Error::WorldTooSmall { .. }
        | Error::Config(_)
        | Error::Internal(_) => consts::ERR_INTERNAL,
    }
}

/// Log `err` and return its code.
pub(crate) fn report(op: &str, err: Error) -> c::ReturnStatus {
    error!("{}: {}", op, err);
    error_code(&err)
}

/// Initialize MPI and load the configuration from the environment.
///
/// MPI can only be initialized once per process: a second call, also one
/// made after `pyina_finalize()`, returns `PYINA_ERR_INTERNAL`.
#[no_mangle]
pub unsafe extern "C" fn pyina_init() -> c::ReturnStatus {
    // Initialize logging; the host may already have done so.
    let _ = env_logger::try_init();

    info!("pyina_init()");
    let mut state = STATE.lock();
    if state.is_some() {
        return report("pyina_init", Error::AlreadyInitialized);
    }
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => return report("pyina_init", err),
    };
    match Context::init() {
        Ok(ctx) => {
            let _ = state.insert(State {
                ctx,
                binding: Binding::new(config),
            });
            consts::SUCCESS
        }
        Err(err) => report("pyina_init", err),
    }
}

/// Finalize MPI. Handles still held by the caller must be freed first.
#[no_mangle]
pub unsafe extern "C" fn pyina_finalize() -> c::ReturnStatus {
    info!("pyina_finalize()");
    match STATE.lock().take() {
        Some(state) => {
            info!("finalizing at thread level {:?}", state.ctx.thread_level());
            drop(state);
            consts::SUCCESS
        }
        None => consts::ERR_NOT_INITIALIZED,
    }
}

/// Return the sanity check greeting. The string is static.
#[no_mangle]
pub extern "C" fn pyina_hello() -> *const c_char {
    HELLO.as_ptr()
}

/// Describe a return code. The string is static.
#[no_mangle]
pub extern "C" fn pyina_strerror(code: c::ReturnStatus) -> *const c_char {
    let msg: &'static [u8] = match code {
        consts::SUCCESS => b"success\0",
        consts::NONE => b"null communicator ignored\0",
        consts::ERR_ARG => b"invalid argument\0",
        consts::ERR_NULL_COMM => b"null communicator\0",
        consts::ERR_TRANSPORT => b"transport error\0",
        consts::ERR_INTERNAL => b"internal error\0",
        consts::ERR_NOT_INITIALIZED => b"not initialized\0",
        _ => b"unknown error code\0",
    };
    msg.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn hello_is_nul_terminated() {
        let hello = unsafe { CStr::from_ptr(pyina_hello()) };
        assert_eq!(hello.to_str().unwrap(), "pyina says Hello.");
    }

    #[test]
    fn strerror_covers_every_code() {
        let text = |code| unsafe { CStr::from_ptr(pyina_strerror(code)) }.to_str().unwrap();
        assert_eq!(text(consts::SUCCESS), "success");
        assert_eq!(text(consts::NONE), "null communicator ignored");
        assert_eq!(text(consts::ERR_NULL_COMM), "null communicator");
        assert_eq!(text(consts::ERR_NOT_INITIALIZED), "not initialized");
        assert_eq!(text(42), "unknown error code");
    }

    #[test]
    fn error_codes() {
        assert_eq!(error_code(&Error::NullCommunicator), consts::ERR_NULL_COMM);
        assert_eq!(error_code(&Error::InvalidRank { rank: 9, size: 2 }), consts::ERR_ARG);
        assert_eq!(error_code(&Error::Mpi { op: "MPI_Recv", code: 3 }), consts::ERR_TRANSPORT);
        assert_eq!(error_code(&Error::InvalidLength(-1)), consts::ERR_TRANSPORT);
        assert_eq!(error_code(&Error::Config("bad".into())), consts::ERR_INTERNAL);
        assert_eq!(error_code(&Error::AlreadyInitialized), consts::ERR_INTERNAL);
        assert_eq!(
            error_code(&Error::Mismatch { expected: 6, received: 3 }),
            consts::ERR_TRANSPORT
        );
    }

    #[test]
    fn finalize_without_init() {
        assert_eq!(unsafe { pyina_finalize() }, consts::ERR_NOT_INITIALIZED);
    }
}
