//! Length-prefixed string transfers.
//!
//! A string travels as two messages under the same tag: its length as one
//! MPI int, then `length + 1` chars holding the bytes and a trailing zero.
//! The length is authoritative, so payloads may contain zero bytes.
use crate::{
    communicator::{Communicator, Source, TagSelector},
    Error, RecvStatus, Result,
};
use log::debug;
use std::str::Utf8Error;

/// Terminator appended to every payload on the wire.
pub const TERMINATOR: u8 = 0;

/// Length broadcast by a root whose payload cannot be sent, so that every
/// rank leaves the collective with an error.
const ABORT_LENGTH: i32 = -1;

/// A string received with [`receive_string`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Received {
    /// Payload bytes, without the terminator.
    pub payload: Vec<u8>,

    /// Status of the payload receive.
    pub status: RecvStatus,
}

impl Received {
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// View the payload as UTF-8.
    pub fn as_str(&self) -> std::result::Result<&str, Utf8Error> {
        std::str::from_utf8(&self.payload)
    }

    /// Convert the payload to a string, replacing invalid UTF-8.
    pub fn into_string_lossy(self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    pub fn into_parts(self) -> (Vec<u8>, RecvStatus) {
        (self.payload, self.status)
    }
}

/// Length prefix for `payload`; the terminator must still fit an MPI count.
fn length_prefix(payload: &[u8]) -> Result<i32> {
    match i32::try_from(payload.len()) {
        Ok(len) if len < i32::MAX => Ok(len),
        _ => Err(Error::MessageTooLong(payload.len())),
    }
}

/// Buffer size for a received length prefix (payload plus terminator).
fn buffer_size(len: i32) -> Result<usize> {
    usize::try_from(len)
        .map(|len| len + 1)
        .map_err(|_| Error::InvalidLength(len))
}

fn with_terminator(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload.len() + 1);
    buf.extend_from_slice(payload);
    buf.push(TERMINATOR);
    buf
}

/// Send `payload` to `dest`: the length first, then the bytes with a
/// trailing terminator.
pub fn send_string<C>(comm: &C, dest: i32, tag: i32, payload: &[u8]) -> Result<()>
where
    C: Communicator + ?Sized,
{
    let len = length_prefix(payload)?;
    debug!(
        target: "pyina::send_string",
        "peer={{{}}}, tag={{{}}}, string={{{}}}@{}",
        dest,
        tag,
        String::from_utf8_lossy(payload),
        len
    );
    comm.send_int(len, dest, tag)?;
    comm.send_chars(&with_terminator(payload), dest, tag)
}

/// Receive a string sent with [`send_string`].
///
/// The payload is received from the rank that sent the length and under the
/// tag it carried, not from the nominal `source`: with wildcards the length
/// may come from any sender, and its payload must come from the same one.
pub fn receive_string<C>(comm: &C, source: Source, tag: TagSelector) -> Result<Received>
where
    C: Communicator + ?Sized,
{
    debug!(target: "pyina::receive_string", "receive for peer # : {}", source);

    let (len, first) = comm.recv_int(source, tag)?;
    let mut buf = vec![0u8; buffer_size(len)?];
    let (received, status) = comm.recv_chars(
        &mut buf,
        Source::Rank(first.source),
        TagSelector::Tag(first.tag),
    )?;
    if received != buf.len() {
        return Err(Error::Mismatch {
            expected: buf.len(),
            received,
        });
    }
    buf.truncate(buf.len() - 1);

    debug!(
        target: "pyina::receive_string",
        "peer={{{}}}, tag={{{}}}, sender={{{}}}, ans tag={{{}}}, string={{{}}}@{}",
        source,
        tag,
        status.source,
        status.tag,
        String::from_utf8_lossy(&buf),
        len
    );
    Ok(Received {
        payload: buf,
        status,
    })
}

/// Broadcast a string from `root` (collective).
///
/// Only the root's `payload` is used; every rank returns the root's bytes.
/// If the root's payload is too long, the root returns
/// [`Error::MessageTooLong`] and every other rank [`Error::InvalidLength`].
pub fn broadcast_string<C>(comm: &C, root: i32, payload: &[u8]) -> Result<Vec<u8>>
where
    C: Communicator + ?Sized,
{
    comm.check_rank(root)?;
    let is_root = comm.rank() == root;
    debug!(
        target: "pyina::bcast_string",
        "bcast for root # : {} string = {{{}}}@{}",
        root,
        if is_root { String::from_utf8_lossy(payload) } else { "".into() },
        payload.len()
    );

    let prefix = if is_root { Some(length_prefix(payload)) } else { None };
    let mut len = match prefix {
        Some(Ok(len)) => len,
        Some(Err(_)) => ABORT_LENGTH,
        None => 0,
    };
    comm.bcast_int(&mut len, root)?;
    if let Some(Err(err)) = prefix {
        return Err(err);
    }
    debug!(target: "pyina::bcast_string", "myid={{{}}} got len: {}", comm.rank(), len);

    let mut buf = if is_root {
        with_terminator(payload)
    } else {
        vec![0u8; buffer_size(len)?]
    };
    comm.bcast_chars(&mut buf, root)?;
    buf.truncate(buf.len() - 1);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{local::LocalUniverse, LocalComm};
    use std::thread;
    use std::time::Duration;

    fn universe(size: usize) -> Vec<LocalComm> {
        LocalUniverse::new(size)
            .with_recv_timeout(Duration::from_secs(10))
            .into_comms()
    }

    #[test]
    fn string_roundtrip() {
        let comms = universe(2);
        send_string(&comms[0], 1, 17, b"My message is this: I am node 0").unwrap();
        let received = receive_string(&comms[1], Source::Rank(0), TagSelector::Tag(17)).unwrap();
        assert_eq!(received.as_str().unwrap(), "My message is this: I am node 0");
        assert_eq!(received.status, RecvStatus { source: 0, tag: 17, error: 0 });
        assert_eq!(comms[1].pending_messages(), 0);
    }

    #[test]
    fn embedded_terminator_is_preserved() {
        let comms = universe(2);
        let payload = b"abc\0def\0";
        send_string(&comms[1], 0, 3, payload).unwrap();
        let received = receive_string(&comms[0], Source::Any, TagSelector::Any).unwrap();
        assert_eq!(received.as_bytes(), payload);
        assert_eq!(received.payload.len(), 8);
    }

    #[test]
    fn empty_string_roundtrip() {
        let comms = universe(2);
        send_string(&comms[0], 1, 0, b"").unwrap();
        let received = receive_string(&comms[1], Source::Rank(0), TagSelector::Tag(0)).unwrap();
        assert!(received.payload.is_empty());
    }

    #[test]
    fn wire_format_is_length_then_terminated_payload() {
        let comms = universe(2);
        send_string(&comms[0], 1, 9, b"hi").unwrap();

        let (len, _) = comms[1].recv_int(Source::Rank(0), TagSelector::Tag(9)).unwrap();
        assert_eq!(len, 2);
        let mut buf = [0xffu8; 3];
        let (received, _) = comms[1]
            .recv_chars(&mut buf, Source::Rank(0), TagSelector::Tag(9))
            .unwrap();
        assert_eq!(received, 3);
        assert_eq!(&buf, b"hi\0");
    }

    #[test]
    fn negative_length_is_rejected() {
        let comms = universe(2);
        comms[0].send_int(-4, 1, 0).unwrap();
        let err = receive_string(&comms[1], Source::Any, TagSelector::Any).unwrap_err();
        assert_eq!(err, Error::InvalidLength(-4));
    }

    #[test]
    fn short_payload_is_a_mismatch() {
        let comms = universe(2);
        comms[0].send_int(5, 1, 2).unwrap();
        comms[0].send_chars(b"ab\0", 1, 2).unwrap();
        let err = receive_string(&comms[1], Source::Rank(0), TagSelector::Tag(2)).unwrap_err();
        assert_eq!(err, Error::Mismatch { expected: 6, received: 3 });
        assert_eq!(comms[1].pending_messages(), 0);
    }

    #[test]
    fn wildcard_receive_pairs_payload_with_actual_sender() {
        let comms = universe(3);
        // Rank 2's length arrives first, then rank 1 sends a complete string
        // before rank 2's payload is on its way.
        comms[2].send_int(5, 0, 4).unwrap();
        send_string(&comms[1], 0, 4, b"from one").unwrap();
        comms[2].send_chars(b"two!!\0", 0, 4).unwrap();

        let first = receive_string(&comms[0], Source::Any, TagSelector::Tag(4)).unwrap();
        assert_eq!(first.status.source, 2);
        assert_eq!(first.as_str().unwrap(), "two!!");

        let second = receive_string(&comms[0], Source::Any, TagSelector::Tag(4)).unwrap();
        assert_eq!(second.status.source, 1);
        assert_eq!(second.as_str().unwrap(), "from one");
        assert_eq!(comms[0].pending_messages(), 0);
    }

    #[test]
    fn broadcast_hello_world_to_all_ranks() {
        let handles: Vec<_> = universe(4)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let payload: &[u8] = if comm.rank() == 1 { b"hello world" } else { b"" };
                    broadcast_string(&comm, 1, payload).unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), b"hello world");
        }
    }

    #[test]
    fn broadcast_ignores_non_root_payloads() {
        let handles: Vec<_> = universe(3)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let payload = format!("rank {}", comm.rank());
                    broadcast_string(&comm, 0, payload.as_bytes()).unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), b"rank 0");
        }
    }

    #[test]
    fn oversized_broadcast_fails_on_every_rank() {
        let handles: Vec<_> = universe(3)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let payload = if comm.rank() == 0 {
                        vec![0u8; i32::MAX as usize]
                    } else {
                        vec![]
                    };
                    (comm.rank(), broadcast_string(&comm, 0, &payload))
                })
            })
            .collect();
        for handle in handles {
            let (rank, result) = handle.join().unwrap();
            let expected = if rank == 0 {
                Error::MessageTooLong(i32::MAX as usize)
            } else {
                Error::InvalidLength(-1)
            };
            assert_eq!(result.unwrap_err(), expected);
        }
    }

    #[test]
    fn broadcast_rejects_root_outside_communicator() {
        let comms = universe(2);
        let err = broadcast_string(&comms[0], 5, b"x").unwrap_err();
        assert_eq!(err, Error::InvalidRank { rank: 5, size: 2 });
    }
}
