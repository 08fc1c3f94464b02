//! Communicator abstraction shared by the MPI and in-process backends.
use crate::{consts::MpiConstants, Error, RecvStatus, Result};
use std::fmt;

/// Source selector for a receive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// Match a message from any process (MPI_ANY_SOURCE).
    Any,

    /// Match only messages from this rank.
    Rank(i32),
}

impl Source {
    /// Convert a raw host integer, mapping the wildcard sentinel to `Any`.
    pub fn from_raw(raw: i32, consts: &MpiConstants) -> Source {
        if raw == consts.any_source {
            Source::Any
        } else {
            Source::Rank(raw)
        }
    }

    /// Convert back to the raw integer understood by MPI.
    pub fn to_raw(self, consts: &MpiConstants) -> i32 {
        match self {
            Source::Any => consts.any_source,
            Source::Rank(rank) => rank,
        }
    }

    /// Return true if a message from `rank` matches.
    pub fn matches(self, rank: i32) -> bool {
        match self {
            Source::Any => true,
            Source::Rank(r) => r == rank,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Any => write!(f, "any"),
            Source::Rank(rank) => write!(f, "{}", rank),
        }
    }
}

/// Tag selector for a receive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TagSelector {
    /// Match any tag (MPI_ANY_TAG).
    Any,

    /// Match only this tag.
    Tag(i32),
}

impl TagSelector {
    /// Convert a raw host integer, mapping the wildcard sentinel to `Any`.
    pub fn from_raw(raw: i32, consts: &MpiConstants) -> TagSelector {
        if raw == consts.any_tag {
            TagSelector::Any
        } else {
            TagSelector::Tag(raw)
        }
    }

    pub fn to_raw(self, consts: &MpiConstants) -> i32 {
        match self {
            TagSelector::Any => consts.any_tag,
            TagSelector::Tag(tag) => tag,
        }
    }

    pub fn matches(self, tag: i32) -> bool {
        match self {
            TagSelector::Any => true,
            TagSelector::Tag(t) => t == tag,
        }
    }
}

impl fmt::Display for TagSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagSelector::Any => write!(f, "any"),
            TagSelector::Tag(tag) => write!(f, "{}", tag),
        }
    }
}

/// Process group derived from a communicator.
pub trait Group {
    /// Number of processes in the group.
    fn size(&self) -> i32;

    /// Rank of the calling process in the group, if it is a member.
    fn rank(&self) -> Option<i32>;
}

/// Trait implementing the blocking primitives the string protocol is built
/// from.
///
/// Ints travel as one MPI int, chars as MPI chars. Every call blocks until
/// the underlying operation completes.
pub trait Communicator {
    type Group: Group;

    /// Return the number of processes in this communicator.
    fn size(&self) -> i32;

    /// Return the current rank of the process.
    fn rank(&self) -> i32;

    /// Perform a barrier on the processes.
    fn barrier(&self) -> Result<()>;

    /// Duplicate the communicator (collective). The result has the same
    /// membership and rank order but a separate message context.
    fn duplicate(&self) -> Result<Self>
    where
        Self: Sized;

    /// Return the group of this communicator.
    fn group(&self) -> Result<Self::Group>;

    /// Send a single int to `dest`.
    fn send_int(&self, value: i32, dest: i32, tag: i32) -> Result<()>;

    /// Receive a single int.
    fn recv_int(&self, source: Source, tag: TagSelector) -> Result<(i32, RecvStatus)>;

    /// Send `data` as chars to `dest`.
    fn send_chars(&self, data: &[u8], dest: i32, tag: i32) -> Result<()>;

    /// Receive chars into `buf`, returning the number of chars received.
    /// Fails if the message is longer than `buf`.
    fn recv_chars(&self, buf: &mut [u8], source: Source, tag: TagSelector) -> Result<(usize, RecvStatus)>;

    /// Broadcast a single int from `root`.
    fn bcast_int(&self, value: &mut i32, root: i32) -> Result<()>;

    /// Broadcast `buf` from `root`; every rank must pass the same length.
    fn bcast_chars(&self, buf: &mut [u8], root: i32) -> Result<()>;

    /// Check that `rank` names a process of this communicator.
    fn check_rank(&self, rank: i32) -> Result<()> {
        let size = self.size();
        if rank < 0 || rank >= size {
            Err(Error::InvalidRank { rank, size })
        } else {
            Ok(())
        }
    }
}
