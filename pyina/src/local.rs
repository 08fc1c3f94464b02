//! In-process communicator: every rank is a thread sharing mailboxes.
//!
//! Matching follows MPI: a receive takes the oldest message in its
//! communicator context whose source and tag match, so messages between a
//! pair of ranks with the same tag are non-overtaking. Broadcasts travel on a
//! separate collective channel and never match point-to-point receives.
use crate::{
    communicator::{Communicator, Group, Source, TagSelector},
    Error, RecvStatus, Result,
};
use log::trace;
use parking_lot::{Condvar, Mutex};
use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Size of an MPI int on the wire.
const INT_SIZE: usize = std::mem::size_of::<i32>();

/// Tags on the collective channel.
const BCAST_TAG: i32 = 0;
const BARRIER_TAG: i32 = 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Channel {
    PointToPoint,
    Collective,
}

/// A message waiting in a mailbox.
#[derive(Debug)]
struct Envelope {
    context: u64,
    channel: Channel,
    source: i32,
    tag: i32,
    data: Vec<u8>,
}

#[derive(Default)]
struct Mailbox {
    queue: Mutex<VecDeque<Envelope>>,
    ready: Condvar,
}

struct Shared {
    mailboxes: Vec<Mailbox>,
    /// (parent context, duplicate sequence number) -> context.
    contexts: Mutex<HashMap<(u64, u64), u64>>,
    next_context: AtomicU64,
    recv_timeout: Option<Duration>,
}

impl Shared {
    fn deliver(&self, dest: i32, envelope: Envelope) {
        let mailbox = &self.mailboxes[dest as usize];
        mailbox.queue.lock().push_back(envelope);
        mailbox.ready.notify_all();
    }

    /// Block until a message matching `pred` is addressed to `rank`.
    fn take<F>(&self, rank: i32, pred: F) -> Result<Envelope>
    where
        F: Fn(&Envelope) -> bool,
    {
        let mailbox = &self.mailboxes[rank as usize];
        let deadline = self.recv_timeout.map(|timeout| Instant::now() + timeout);
        let mut queue = mailbox.queue.lock();
        loop {
            if let Some(envelope) = queue.iter().position(&pred).and_then(|i| queue.remove(i)) {
                return Ok(envelope);
            }
            match deadline {
                Some(deadline) => {
                    if mailbox.ready.wait_until(&mut queue, deadline).timed_out() {
                        return queue
                            .iter()
                            .position(&pred)
                            .and_then(|i| queue.remove(i))
                            .ok_or(Error::Timeout);
                    }
                }
                None => mailbox.ready.wait(&mut queue),
            }
        }
    }
}

/// Builder for a set of in-process communicators.
#[derive(Debug, Clone)]
pub struct LocalUniverse {
    size: usize,
    recv_timeout: Option<Duration>,
}

impl LocalUniverse {
    /// Create a universe of `size` ranks.
    pub fn new(size: usize) -> LocalUniverse {
        assert!(size > 0, "a universe needs at least one rank");
        LocalUniverse {
            size,
            recv_timeout: None,
        }
    }

    /// Bound every blocking receive, returning [`Error::Timeout`] after
    /// `timeout`.
    pub fn with_recv_timeout(mut self, timeout: Duration) -> LocalUniverse {
        self.recv_timeout = Some(timeout);
        self
    }

    /// Create the world communicator of every rank, indexed by rank.
    pub fn into_comms(self) -> Vec<LocalComm> {
        let shared = Arc::new(Shared {
            mailboxes: (0..self.size).map(|_| Mailbox::default()).collect(),
            contexts: Mutex::new(HashMap::new()),
            next_context: AtomicU64::new(1),
            recv_timeout: self.recv_timeout,
        });
        (0..self.size)
            .map(|rank| LocalComm {
                shared: Arc::clone(&shared),
                context: 0,
                rank: rank as i32,
                size: self.size as i32,
                dups: Cell::new(0),
            })
            .collect()
    }
}

/// One rank's view of an in-process communicator.
pub struct LocalComm {
    shared: Arc<Shared>,
    context: u64,
    rank: i32,
    size: i32,
    /// Number of duplicates made from this handle; all ranks duplicate in
    /// the same order, so (context, dups) names the new context everywhere.
    dups: Cell<u64>,
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("context", &self.context)
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl LocalComm {
    /// Context id separating this communicator's messages from its
    /// duplicates'.
    pub fn context_id(&self) -> u64 {
        self.context
    }

    /// Number of messages addressed to this rank that no receive has matched
    /// yet, across all contexts.
    pub fn pending_messages(&self) -> usize {
        self.shared.mailboxes[self.rank as usize].queue.lock().len()
    }

    fn check_tag(tag: i32) -> Result<()> {
        if tag < 0 {
            Err(Error::InvalidTag(tag))
        } else {
            Ok(())
        }
    }

    fn check_selectors(&self, source: Source, tag: TagSelector) -> Result<()> {
        if let Source::Rank(rank) = source {
            self.check_rank(rank)?;
        }
        if let TagSelector::Tag(tag) = tag {
            Self::check_tag(tag)?;
        }
        Ok(())
    }

    fn send(&self, data: Vec<u8>, dest: i32, tag: i32) -> Result<()> {
        self.check_rank(dest)?;
        Self::check_tag(tag)?;
        trace!("rank {} -> {} tag {}: {} bytes", self.rank, dest, tag, data.len());
        self.shared.deliver(
            dest,
            Envelope {
                context: self.context,
                channel: Channel::PointToPoint,
                source: self.rank,
                tag,
                data,
            },
        );
        Ok(())
    }

    fn recv(&self, source: Source, tag: TagSelector) -> Result<Envelope> {
        self.check_selectors(source, tag)?;
        let context = self.context;
        self.shared.take(self.rank, |e| {
            e.context == context
                && e.channel == Channel::PointToPoint
                && source.matches(e.source)
                && tag.matches(e.tag)
        })
    }

    /// Root sends `data` to every other rank; others return what the root
    /// sent.
    fn bcast(&self, data: &[u8], root: i32) -> Result<Option<Vec<u8>>> {
        self.check_rank(root)?;
        if self.rank == root {
            for dest in (0..self.size).filter(|&r| r != root) {
                self.shared.deliver(
                    dest,
                    Envelope {
                        context: self.context,
                        channel: Channel::Collective,
                        source: root,
                        tag: BCAST_TAG,
                        data: data.to_vec(),
                    },
                );
            }
            Ok(None)
        } else {
            let context = self.context;
            let envelope = self.shared.take(self.rank, |e| {
                e.context == context
                    && e.channel == Channel::Collective
                    && e.source == root
                    && e.tag == BCAST_TAG
            })?;
            Ok(Some(envelope.data))
        }
    }
}

impl Communicator for LocalComm {
    type Group = LocalGroup;

    fn size(&self) -> i32 {
        self.size
    }

    fn rank(&self) -> i32 {
        self.rank
    }

    /// Gather to rank 0 then release everyone.
    fn barrier(&self) -> Result<()> {
        let mut token = 0;
        if self.rank == 0 {
            for _ in 1..self.size {
                let context = self.context;
                self.shared.take(0, |e| {
                    e.context == context && e.channel == Channel::Collective && e.tag == BARRIER_TAG
                })?;
            }
        } else {
            self.shared.deliver(
                0,
                Envelope {
                    context: self.context,
                    channel: Channel::Collective,
                    source: self.rank,
                    tag: BARRIER_TAG,
                    data: vec![],
                },
            );
        }
        self.bcast_int(&mut token, 0)
    }

    fn duplicate(&self) -> Result<LocalComm> {
        let seq = self.dups.get();
        self.dups.set(seq + 1);
        let context = *self
            .shared
            .contexts
            .lock()
            .entry((self.context, seq))
            .or_insert_with(|| self.shared.next_context.fetch_add(1, Ordering::SeqCst));
        Ok(LocalComm {
            shared: Arc::clone(&self.shared),
            context,
            rank: self.rank,
            size: self.size,
            dups: Cell::new(0),
        })
    }

    fn group(&self) -> Result<LocalGroup> {
        Ok(LocalGroup {
            size: self.size,
            rank: Some(self.rank),
        })
    }

    fn send_int(&self, value: i32, dest: i32, tag: i32) -> Result<()> {
        self.send(value.to_le_bytes().to_vec(), dest, tag)
    }

    fn recv_int(&self, source: Source, tag: TagSelector) -> Result<(i32, RecvStatus)> {
        let envelope = self.recv(source, tag)?;
        let bytes: [u8; INT_SIZE] = envelope.data[..].try_into().map_err(|_| Error::Mismatch {
            expected: INT_SIZE,
            received: envelope.data.len(),
        })?;
        let status = RecvStatus {
            source: envelope.source,
            tag: envelope.tag,
            error: 0,
        };
        Ok((i32::from_le_bytes(bytes), status))
    }

    fn send_chars(&self, data: &[u8], dest: i32, tag: i32) -> Result<()> {
        self.send(data.to_vec(), dest, tag)
    }

    fn recv_chars(&self, buf: &mut [u8], source: Source, tag: TagSelector) -> Result<(usize, RecvStatus)> {
        let envelope = self.recv(source, tag)?;
        if envelope.data.len() > buf.len() {
            return Err(Error::Truncated {
                expected: buf.len(),
                received: envelope.data.len(),
            });
        }
        buf[..envelope.data.len()].copy_from_slice(&envelope.data);
        let status = RecvStatus {
            source: envelope.source,
            tag: envelope.tag,
            error: 0,
        };
        Ok((envelope.data.len(), status))
    }

    fn bcast_int(&self, value: &mut i32, root: i32) -> Result<()> {
        if let Some(data) = self.bcast(&value.to_le_bytes(), root)? {
            let bytes: [u8; INT_SIZE] = data[..].try_into().map_err(|_| Error::Mismatch {
                expected: INT_SIZE,
                received: data.len(),
            })?;
            *value = i32::from_le_bytes(bytes);
        }
        Ok(())
    }

    fn bcast_chars(&self, buf: &mut [u8], root: i32) -> Result<()> {
        if let Some(data) = self.bcast(buf, root)? {
            if data.len() > buf.len() {
                return Err(Error::Truncated {
                    expected: buf.len(),
                    received: data.len(),
                });
            }
            buf[..data.len()].copy_from_slice(&data);
        }
        Ok(())
    }
}

/// Group of an in-process communicator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LocalGroup {
    size: i32,
    rank: Option<i32>,
}

impl Group for LocalGroup {
    fn size(&self) -> i32 {
        self.size
    }

    fn rank(&self) -> Option<i32> {
        self.rank
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn universe(size: usize) -> Vec<LocalComm> {
        LocalUniverse::new(size)
            .with_recv_timeout(Duration::from_secs(10))
            .into_comms()
    }

    #[test]
    fn int_roundtrip_between_two_ranks() {
        let mut comms = universe(2);
        let comm1 = comms.pop().unwrap();
        let comm0 = comms.pop().unwrap();

        comm0.send_int(42, 1, 7).unwrap();
        let (value, status) = comm1.recv_int(Source::Rank(0), TagSelector::Tag(7)).unwrap();
        assert_eq!(value, 42);
        assert_eq!(status, RecvStatus { source: 0, tag: 7, error: 0 });
        assert_eq!(comm1.pending_messages(), 0);
    }

    #[test]
    fn messages_from_one_sender_do_not_overtake() {
        let comms = universe(2);
        for i in 0..5 {
            comms[0].send_int(i, 1, 3).unwrap();
        }
        for i in 0..5 {
            let (value, _) = comms[1].recv_int(Source::Any, TagSelector::Any).unwrap();
            assert_eq!(value, i);
        }
    }

    #[test]
    fn tag_selects_among_queued_messages() {
        let comms = universe(2);
        comms[0].send_int(1, 1, 10).unwrap();
        comms[0].send_int(2, 1, 20).unwrap();
        let (value, status) = comms[1].recv_int(Source::Rank(0), TagSelector::Tag(20)).unwrap();
        assert_eq!((value, status.tag), (2, 20));
        assert_eq!(comms[1].pending_messages(), 1);
    }

    #[test]
    fn oversized_message_is_truncation_error() {
        let comms = universe(2);
        comms[0].send_chars(b"abcdef", 1, 0).unwrap();
        let mut buf = [0u8; 3];
        let err = comms[1]
            .recv_chars(&mut buf, Source::Rank(0), TagSelector::Tag(0))
            .unwrap_err();
        assert_eq!(err, Error::Truncated { expected: 3, received: 6 });
    }

    #[test]
    fn short_message_reports_received_count() {
        let comms = universe(2);
        comms[0].send_chars(b"ab", 1, 0).unwrap();
        let mut buf = [0xffu8; 5];
        let (received, status) = comms[1]
            .recv_chars(&mut buf, Source::Any, TagSelector::Any)
            .unwrap();
        assert_eq!(received, 2);
        assert_eq!(status.source, 0);
        assert_eq!(&buf[..2], b"ab");
    }

    #[test]
    fn invalid_rank_and_tag_are_rejected() {
        let comms = universe(2);
        assert_eq!(
            comms[0].send_int(1, 2, 0).unwrap_err(),
            Error::InvalidRank { rank: 2, size: 2 }
        );
        assert_eq!(comms[0].send_int(1, 1, -5).unwrap_err(), Error::InvalidTag(-5));
        assert_eq!(comms[1].pending_messages(), 0);
    }

    #[test]
    fn receive_times_out_without_sender() {
        let comms = LocalUniverse::new(2)
            .with_recv_timeout(Duration::from_millis(20))
            .into_comms();
        let err = comms[0].recv_int(Source::Any, TagSelector::Any).unwrap_err();
        assert_eq!(err, Error::Timeout);
    }

    #[test]
    fn duplicate_has_separate_context() {
        let comms = universe(2);
        let dup0 = comms[0].duplicate().unwrap();
        let dup1 = comms[1].duplicate().unwrap();
        assert_eq!(dup0.context_id(), dup1.context_id());
        assert_ne!(dup0.context_id(), comms[0].context_id());
        assert_eq!((dup1.rank(), dup1.size()), (comms[1].rank(), comms[1].size()));

        // A message on the parent is invisible to the duplicate.
        comms[0].send_int(5, 1, 0).unwrap();
        dup0.send_int(6, 1, 0).unwrap();
        let (value, _) = dup1.recv_int(Source::Any, TagSelector::Any).unwrap();
        assert_eq!(value, 6);
        let (value, _) = comms[1].recv_int(Source::Any, TagSelector::Any).unwrap();
        assert_eq!(value, 5);
    }

    #[test]
    fn group_matches_communicator() {
        let comms = universe(3);
        let group = comms[2].group().unwrap();
        assert_eq!(group.size(), 3);
        assert_eq!(group.rank(), Some(2));
    }

    #[test]
    fn bcast_and_barrier_across_threads() {
        let handles: Vec<_> = universe(4)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let mut value = if comm.rank() == 2 { 99 } else { 0 };
                    comm.bcast_int(&mut value, 2).unwrap();
                    comm.barrier().unwrap();
                    value
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 99);
        }
    }
}
