//! MPI environment handle.
use crate::{comm::check, comm::MpiComm, Communicator, Error, Result};
use log::{debug, info};
use std::ffi::{c_char, c_int};
use std::sync::atomic::{AtomicBool, Ordering};

/// Global flag tracking whether this process initialized MPI.
static MPI_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Size of the buffers handed to MPI_Get_library_version/MPI_Error_string;
/// at least MPI_MAX_LIBRARY_VERSION_STRING on common implementations.
const STRING_BUFFER_SIZE: usize = 8192;

/// MPI thread support levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum ThreadLevel {
    Single = 0,
    Funneled = 1,
    Serialized = 2,
    Multiple = 3,
}

/// Initialized MPI environment. MPI is finalized when this is dropped.
///
/// Initialization installs MPI_ERRORS_RETURN on MPI_COMM_WORLD, so failures
/// come back as [`Error::Mpi`] instead of aborting the job. Communicators
/// duplicated from the world inherit the handler.
#[derive(Debug)]
pub struct Context {
    thread_level: ThreadLevel,
}

impl Context {
    /// Initialize MPI with single-threaded support.
    pub fn init() -> Result<Context> {
        Context::init_thread(ThreadLevel::Single)
    }

    /// Initialize MPI with the requested thread support level.
    pub fn init_thread(required: ThreadLevel) -> Result<Context> {
        if is_initialized() || MPI_INITIALIZED.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyInitialized);
        }

        let mut provided: c_int = 0;
        let ret = unsafe { pyina_sys::pyina_init_thread(required as c_int, &mut provided) };
        if ret != 0 {
            MPI_INITIALIZED.store(false, Ordering::SeqCst);
            return Err(Error::InitFailure(ret));
        }

        let thread_level = match provided {
            0 => ThreadLevel::Single,
            1 => ThreadLevel::Funneled,
            2 => ThreadLevel::Serialized,
            _ => ThreadLevel::Multiple,
        };
        let ctx = Context { thread_level };

        let world = unsafe { pyina_sys::pyina_comm_world() };
        check("MPI_Comm_set_errhandler", unsafe {
            pyina_sys::pyina_comm_errors_return(world)
        })?;
        info!("MPI initialized (thread level {:?})", thread_level);
        Ok(ctx)
    }

    /// Thread support level provided by the library.
    pub fn thread_level(&self) -> ThreadLevel {
        self.thread_level
    }

    /// Get a handle to MPI_COMM_WORLD.
    pub fn world(&self) -> Result<MpiComm> {
        MpiComm::world()
    }

    /// Check that the job runs on at least `required` processes.
    pub fn ensure_size(&self, required: i32) -> Result<MpiComm> {
        let world = self.world()?;
        if world.size() < required {
            return Err(Error::WorldTooSmall {
                required,
                actual: world.size(),
            });
        }
        Ok(world)
    }

    /// Check if MPI has been initialized and not yet finalized.
    pub fn is_initialized() -> bool {
        is_initialized() && !is_finalized()
    }

    /// Wall-clock time in seconds.
    pub fn wtime() -> f64 {
        unsafe { pyina_sys::pyina_wtime() }
    }

    /// MPI library version string.
    pub fn version() -> Result<String> {
        let mut buf = vec![0u8; STRING_BUFFER_SIZE];
        let mut len: c_int = 0;
        check("MPI_Get_library_version", unsafe {
            pyina_sys::pyina_get_version(buf.as_mut_ptr() as *mut c_char, &mut len)
        })?;
        buf.truncate(len.max(0) as usize);
        let version = String::from_utf8_lossy(&buf);
        Ok(version.trim_end_matches(['\0', '\n']).to_string())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if MPI_INITIALIZED.swap(false, Ordering::SeqCst) && !is_finalized() {
            debug!(target: "pyina::fini", "finalizing MPI");
            unsafe {
                pyina_sys::pyina_finalize();
            }
        }
    }
}

/// Check if MPI has been initialized (by any caller).
pub fn is_initialized() -> bool {
    let mut flag: c_int = 0;
    unsafe { pyina_sys::pyina_initialized(&mut flag) };
    flag != 0
}

/// Check if MPI has been finalized.
pub fn is_finalized() -> bool {
    let mut flag: c_int = 0;
    unsafe { pyina_sys::pyina_finalized(&mut flag) };
    flag != 0
}

/// Return the MPI library's description of an error code.
pub fn error_string(code: i32) -> Option<String> {
    let mut buf = vec![0u8; STRING_BUFFER_SIZE];
    let mut len: c_int = 0;
    let ret = unsafe { pyina_sys::pyina_error_string(code, buf.as_mut_ptr() as *mut c_char, &mut len) };
    if ret != 0 {
        return None;
    }
    buf.truncate(len.max(0) as usize);
    Some(String::from_utf8_lossy(&buf).into_owned())
}
