//! Host-facing operations taking optional communicators.
//!
//! The host may hand over a null communicator. Every operation here takes an
//! `Option<&C>` and resolves `None` through the configured
//! [`NullCommPolicy`] before any transport call is made.
use crate::{
    communicator::{Communicator, Source, TagSelector},
    config::{Config, NullCommPolicy},
    message::{self, Received},
    Error, Result,
};
use log::debug;

/// Binding operations with a fixed configuration.
#[derive(Clone, Debug, Default)]
pub struct Binding {
    config: Config,
}

impl Binding {
    pub fn new(config: Config) -> Binding {
        Binding { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Apply the null communicator policy.
    fn resolve<'a, C: ?Sized>(&self, comm: Option<&'a C>, target: &str) -> Result<Option<&'a C>> {
        match (comm, self.config.null_comm) {
            (Some(comm), _) => Ok(Some(comm)),
            (None, NullCommPolicy::Ignore) => {
                debug!(target: target, "Null Communicator received");
                Ok(None)
            }
            (None, NullCommPolicy::Reject) => Err(Error::NullCommunicator),
        }
    }

    /// Resolve a possibly null communicator handle under the configured
    /// policy, for callers outside the string operations.
    pub fn resolve_handle<'a, C: ?Sized>(&self, comm: Option<&'a C>) -> Result<Option<&'a C>> {
        self.resolve(comm, "pyina")
    }

    fn check_rank<C>(&self, comm: &C, rank: i32) -> Result<()>
    where
        C: Communicator + ?Sized,
    {
        if self.config.check_ranks {
            comm.check_rank(rank)
        } else {
            Ok(())
        }
    }

    /// Duplicate the communicator (collective).
    pub fn duplicate<C: Communicator>(&self, comm: Option<&C>) -> Result<Option<C>> {
        let Some(comm) = self.resolve(comm, "pyina::comm_dup")? else {
            return Ok(None);
        };
        let dup = comm.duplicate()?;
        debug!(
            target: "pyina::comm_dup",
            "duplicated communicator: rank {} of {}",
            dup.rank(),
            dup.size()
        );
        Ok(Some(dup))
    }

    /// Derive the group of the communicator.
    pub fn derive_group<C: Communicator>(&self, comm: Option<&C>) -> Result<Option<C::Group>> {
        match self.resolve(comm, "pyina::test")? {
            Some(comm) => comm.group().map(Some),
            None => Ok(None),
        }
    }

    pub fn send_string<C>(&self, comm: Option<&C>, dest: i32, tag: i32, payload: &[u8]) -> Result<Option<()>>
    where
        C: Communicator + ?Sized,
    {
        let Some(comm) = self.resolve(comm, "pyina::send_string")? else {
            return Ok(None);
        };
        self.check_rank(comm, dest)?;
        message::send_string(comm, dest, tag, payload).map(Some)
    }

    pub fn receive_string<C>(&self, comm: Option<&C>, source: Source, tag: TagSelector) -> Result<Option<Received>>
    where
        C: Communicator + ?Sized,
    {
        let Some(comm) = self.resolve(comm, "pyina::receive_string")? else {
            return Ok(None);
        };
        if let Source::Rank(rank) = source {
            self.check_rank(comm, rank)?;
        }
        message::receive_string(comm, source, tag).map(Some)
    }

    /// Broadcast a string from `root`; must be called on every rank.
    pub fn broadcast_string<C>(&self, comm: Option<&C>, root: i32, payload: &[u8]) -> Result<Option<Vec<u8>>>
    where
        C: Communicator + ?Sized,
    {
        let Some(comm) = self.resolve(comm, "pyina::bcast_string")? else {
            return Ok(None);
        };
        message::broadcast_string(comm, root, payload).map(Some)
    }
}
