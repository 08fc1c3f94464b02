//! MPI backed communicators and groups.
use crate::{
    communicator::{Communicator, Group, Source, TagSelector},
    consts::MpiConstants,
    context::{is_finalized, is_initialized},
    Error, RecvStatus, Result,
};
use log::{debug, error};
use pyina_sys::{pyina_comm_t, pyina_group_t};
use std::ffi::{c_char, c_int};
use std::marker::PhantomData;

/// Turn an MPI return code into a result.
pub(crate) fn check(op: &'static str, code: c_int) -> Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(Error::Mpi { op, code })
    }
}

/// Convert a buffer length to an MPI count.
fn count(len: usize) -> Result<c_int> {
    c_int::try_from(len).map_err(|_| Error::MessageTooLong(len))
}

/// Communicator handle backed by an MPI_Comm.
///
/// The world communicator is borrowed from MPI and never freed; duplicated
/// communicators own their handle and free it once, on drop.
#[derive(Debug)]
pub struct MpiComm {
    handle: pyina_comm_t,
    rank: i32,
    size: i32,
    owned: bool,
    /// Handles must stay on the thread that created them.
    _marker: PhantomData<*const ()>,
}

impl MpiComm {
    /// Return a handle for MPI_COMM_WORLD.
    pub fn world() -> Result<MpiComm> {
        if !is_initialized() || is_finalized() {
            return Err(Error::NotInitialized);
        }
        let handle = unsafe { pyina_sys::pyina_comm_world() };
        MpiComm::from_handle(handle, false)
    }

    fn from_handle(handle: pyina_comm_t, owned: bool) -> Result<MpiComm> {
        let mut comm = MpiComm {
            handle,
            rank: 0,
            size: 0,
            owned,
            _marker: PhantomData,
        };
        // On failure `comm` is dropped here, releasing an owned handle.
        check("MPI_Comm_rank", unsafe {
            pyina_sys::pyina_comm_rank(handle, &mut comm.rank)
        })?;
        check("MPI_Comm_size", unsafe {
            pyina_sys::pyina_comm_size(handle, &mut comm.size)
        })?;
        Ok(comm)
    }

    /// Fortran integer handle of the communicator.
    pub fn as_raw(&self) -> pyina_comm_t {
        self.handle
    }

    /// Return true if dropping this handle frees the communicator.
    pub fn is_owned(&self) -> bool {
        self.owned
    }
}

impl Drop for MpiComm {
    fn drop(&mut self) {
        if !self.owned || is_finalized() {
            return;
        }
        debug!(target: "pyina::fini", "destructor called for type: MpiComm");
        let ret = unsafe { pyina_sys::pyina_comm_free(self.handle) };
        if ret != 0 {
            error!(target: "pyina::fini", "MPI_Comm_free failed with code {}", ret);
        }
    }
}

impl Communicator for MpiComm {
    type Group = MpiGroup;

    fn size(&self) -> i32 {
        self.size
    }

    fn rank(&self) -> i32 {
        self.rank
    }

    fn barrier(&self) -> Result<()> {
        check("MPI_Barrier", unsafe { pyina_sys::pyina_barrier(self.handle) })
    }

    fn duplicate(&self) -> Result<MpiComm> {
        let mut newcomm: pyina_comm_t = 0;
        check("MPI_Comm_dup", unsafe {
            pyina_sys::pyina_comm_dup(self.handle, &mut newcomm)
        })?;
        MpiComm::from_handle(newcomm, true)
    }

    fn group(&self) -> Result<MpiGroup> {
        let mut group: pyina_group_t = 0;
        check("MPI_Comm_group", unsafe {
            pyina_sys::pyina_comm_group(self.handle, &mut group)
        })?;
        MpiGroup::from_handle(group)
    }

    fn send_int(&self, value: i32, dest: i32, tag: i32) -> Result<()> {
        check("MPI_Send", unsafe {
            pyina_sys::pyina_send_int(value, dest, tag, self.handle)
        })
    }

    fn recv_int(&self, source: Source, tag: TagSelector) -> Result<(i32, RecvStatus)> {
        let consts = MpiConstants::query();
        let mut value: c_int = 0;
        let mut status = RecvStatus { source: 0, tag: 0, error: 0 };
        check("MPI_Recv", unsafe {
            pyina_sys::pyina_recv_int(
                &mut value,
                source.to_raw(&consts),
                tag.to_raw(&consts),
                self.handle,
                &mut status.source,
                &mut status.tag,
                &mut status.error,
            )
        })?;
        Ok((value, status))
    }

    fn send_chars(&self, data: &[u8], dest: i32, tag: i32) -> Result<()> {
        let len = count(data.len())?;
        check("MPI_Send", unsafe {
            pyina_sys::pyina_send_chars(data.as_ptr() as *const c_char, len, dest, tag, self.handle)
        })
    }

    fn recv_chars(&self, buf: &mut [u8], source: Source, tag: TagSelector) -> Result<(usize, RecvStatus)> {
        let consts = MpiConstants::query();
        let len = count(buf.len())?;
        let mut status = RecvStatus { source: 0, tag: 0, error: 0 };
        let mut received: c_int = 0;
        check("MPI_Recv", unsafe {
            pyina_sys::pyina_recv_chars(
                buf.as_mut_ptr() as *mut c_char,
                len,
                source.to_raw(&consts),
                tag.to_raw(&consts),
                self.handle,
                &mut status.source,
                &mut status.tag,
                &mut status.error,
                &mut received,
            )
        })?;
        let received = usize::try_from(received).map_err(|_| Error::InvalidLength(received))?;
        Ok((received, status))
    }

    fn bcast_int(&self, value: &mut i32, root: i32) -> Result<()> {
        check("MPI_Bcast", unsafe {
            pyina_sys::pyina_bcast_int(value, root, self.handle)
        })
    }

    fn bcast_chars(&self, buf: &mut [u8], root: i32) -> Result<()> {
        let len = count(buf.len())?;
        check("MPI_Bcast", unsafe {
            pyina_sys::pyina_bcast_chars(buf.as_mut_ptr() as *mut c_char, len, root, self.handle)
        })
    }
}

/// Group handle backed by an MPI_Group, freed on drop.
#[derive(Debug)]
pub struct MpiGroup {
    handle: pyina_group_t,
    size: i32,
    rank: Option<i32>,
    _marker: PhantomData<*const ()>,
}

impl MpiGroup {
    fn from_handle(handle: pyina_group_t) -> Result<MpiGroup> {
        let mut group = MpiGroup {
            handle,
            size: 0,
            rank: None,
            _marker: PhantomData,
        };
        check("MPI_Group_size", unsafe {
            pyina_sys::pyina_group_size(handle, &mut group.size)
        })?;
        let mut rank: c_int = 0;
        check("MPI_Group_rank", unsafe {
            pyina_sys::pyina_group_rank(handle, &mut rank)
        })?;
        let undefined = unsafe { pyina_sys::pyina_undefined() };
        group.rank = if rank == undefined { None } else { Some(rank) };
        Ok(group)
    }

    pub fn as_raw(&self) -> pyina_group_t {
        self.handle
    }
}

impl Group for MpiGroup {
    fn size(&self) -> i32 {
        self.size
    }

    fn rank(&self) -> Option<i32> {
        self.rank
    }
}

impl Drop for MpiGroup {
    fn drop(&mut self) {
        if is_finalized() {
            return;
        }
        debug!(target: "pyina::fini", "destructor called for type: MpiGroup");
        let ret = unsafe { pyina_sys::pyina_group_free(self.handle) };
        if ret != 0 {
            error!(target: "pyina::fini", "MPI_Group_free failed with code {}", ret);
        }
    }
}
