//! String transfers.
//!
//! Received strings are returned in library-owned buffers of `len + 1`
//! bytes (payload plus a trailing zero) that must be released with
//! `pyina_buffer_free(ptr, len)`.
use crate::{binding, c, consts, report};
use log::info;
use pyina::{MpiConstants, Source, TagSelector};
use std::ffi::{c_char, c_int};
use std::{ptr, slice};

/// Borrow an input buffer; NULL is only valid with a zero length.
unsafe fn input<'a>(buf: *const c_char, len: isize) -> Option<&'a [u8]> {
    let len = usize::try_from(len).ok()?;
    if len == 0 {
        Some(&[])
    } else if buf.is_null() {
        None
    } else {
        Some(slice::from_raw_parts(buf as *const u8, len))
    }
}

/// Hand `payload` over to the caller with a trailing zero.
unsafe fn output(mut payload: Vec<u8>, out_buf: *mut *mut c_char, out_len: *mut usize) {
    let len = payload.len();
    payload.push(0);
    let ptr = Box::into_raw(payload.into_boxed_slice()) as *mut u8;
    *out_buf = ptr as *mut c_char;
    *out_len = len;
}

unsafe fn clear(out_buf: *mut *mut c_char, out_len: *mut usize) {
    *out_buf = ptr::null_mut();
    *out_len = 0;
}

/// Send `len` bytes from `buf` to `dest` under `tag`.
#[no_mangle]
pub unsafe extern "C" fn pyina_send_string(
    comm: c::Comm,
    dest: c_int,
    tag: c_int,
    buf: *const c_char,
    len: isize,
) -> c::ReturnStatus {
    info!("pyina_send_string()");
    let Some(payload) = input(buf, len) else {
        return consts::ERR_ARG;
    };
    match binding().send_string(comm.as_ref(), dest, tag, payload) {
        Ok(Some(())) => consts::SUCCESS,
        Ok(None) => consts::NONE,
        Err(err) => report("pyina_send_string", err),
    }
}

/// Receive a string from `source` under `tag`; either may be the MPI
/// wildcard. The status describes the payload message.
#[no_mangle]
pub unsafe extern "C" fn pyina_receive_string(
    comm: c::Comm,
    source: c_int,
    tag: c_int,
    out_buf: *mut *mut c_char,
    out_len: *mut usize,
    status: *mut c::Status,
) -> c::ReturnStatus {
    info!("pyina_receive_string()");
    if out_buf.is_null() || out_len.is_null() {
        return consts::ERR_ARG;
    }
    clear(out_buf, out_len);

    let mpi_consts = MpiConstants::query();
    let source = Source::from_raw(source, &mpi_consts);
    let tag = TagSelector::from_raw(tag, &mpi_consts);
    match binding().receive_string(comm.as_ref(), source, tag) {
        Ok(Some(received)) => {
            let (payload, recv_status) = received.into_parts();
            if let Some(status) = status.as_mut() {
                *status = recv_status.into();
            }
            output(payload, out_buf, out_len);
            consts::SUCCESS
        }
        Ok(None) => consts::NONE,
        Err(err) => report("pyina_receive_string", err),
    }
}

/// Broadcast a string from `root`. Only the root's input is read; non-root
/// callers may pass NULL with a zero length.
#[no_mangle]
pub unsafe extern "C" fn pyina_bcast_string(
    comm: c::Comm,
    root: c_int,
    buf: *const c_char,
    len: isize,
    out_buf: *mut *mut c_char,
    out_len: *mut usize,
) -> c::ReturnStatus {
    info!("pyina_bcast_string()");
    if out_buf.is_null() || out_len.is_null() {
        return consts::ERR_ARG;
    }
    let Some(payload) = input(buf, len) else {
        return consts::ERR_ARG;
    };
    clear(out_buf, out_len);

    match binding().broadcast_string(comm.as_ref(), root, payload) {
        Ok(Some(payload)) => {
            output(payload, out_buf, out_len);
            consts::SUCCESS
        }
        Ok(None) => consts::NONE,
        Err(err) => report("pyina_bcast_string", err),
    }
}

/// Release a buffer returned by a receive or broadcast.
#[no_mangle]
pub unsafe extern "C" fn pyina_buffer_free(buf: *mut c_char, len: usize) {
    if buf.is_null() {
        return;
    }
    let raw = ptr::slice_from_raw_parts_mut(buf as *mut u8, len + 1);
    drop(Box::from_raw(raw));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_communicator_send_is_ignored() {
        let msg = b"lost";
        let ret = unsafe {
            pyina_send_string(ptr::null_mut(), 1, 0, msg.as_ptr() as *const c_char, msg.len() as isize)
        };
        assert_eq!(ret, consts::NONE);
    }

    #[test]
    fn null_communicator_receive_leaves_outputs_empty() {
        let mut buf: *mut c_char = 0x1 as *mut c_char;
        let mut len: usize = 99;
        let mut status = c::Status { source: 5, tag: 5, error: 5 };
        let ret = unsafe { pyina_receive_string(ptr::null_mut(), 0, 0, &mut buf, &mut len, &mut status) };
        assert_eq!(ret, consts::NONE);
        assert!(buf.is_null());
        assert_eq!(len, 0);
        assert_eq!(status, c::Status { source: 5, tag: 5, error: 5 });
    }

    #[test]
    fn null_communicator_bcast_is_ignored() {
        let mut buf: *mut c_char = ptr::null_mut();
        let mut len: usize = 0;
        let ret = unsafe { pyina_bcast_string(ptr::null_mut(), 0, ptr::null(), 0, &mut buf, &mut len) };
        assert_eq!(ret, consts::NONE);
        assert!(buf.is_null());
    }

    #[test]
    fn malformed_arguments() {
        let mut buf: *mut c_char = ptr::null_mut();
        let mut len: usize = 0;
        unsafe {
            assert_eq!(pyina_send_string(ptr::null_mut(), 1, 0, ptr::null(), 3), consts::ERR_ARG);
            assert_eq!(pyina_send_string(ptr::null_mut(), 1, 0, ptr::null(), -1), consts::ERR_ARG);
            assert_eq!(
                pyina_receive_string(ptr::null_mut(), 0, 0, ptr::null_mut(), &mut len, ptr::null_mut()),
                consts::ERR_ARG
            );
            assert_eq!(
                pyina_bcast_string(ptr::null_mut(), 0, ptr::null(), -2, &mut buf, &mut len),
                consts::ERR_ARG
            );
        }
    }

    #[test]
    fn output_buffers_are_terminated_and_freed() {
        let mut buf: *mut c_char = ptr::null_mut();
        let mut len: usize = 0;
        unsafe {
            output(b"abc\0def".to_vec(), &mut buf, &mut len);
            assert_eq!(len, 7);
            let bytes = slice::from_raw_parts(buf as *const u8, len + 1);
            assert_eq!(bytes, b"abc\0def\0");
            pyina_buffer_free(buf, len);
            pyina_buffer_free(ptr::null_mut(), 0);
        }
    }
}
