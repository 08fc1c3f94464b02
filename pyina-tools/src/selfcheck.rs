//! Checks of the binding's observable behavior, run collectively on every
//! rank of a communicator with at least two ranks.
use pyina::{
    message::{broadcast_string, receive_string, send_string},
    Binding, Communicator, Error, Group, MpiConstants, Result, Source, TagSelector,
    CONSTANT_NAMES,
};
use std::fmt;

const ROUNDTRIP_TAG: i32 = 11;
const WILDCARD_TAG: i32 = 12;
const BCAST_MESSAGE: &str = "hello world";
const ROUNDTRIP_MESSAGE: &[u8] = b"abc\0def\0 embedded zero bytes";

/// Outcome of one check on one rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: &'static str,
    pub outcome: std::result::Result<(), String>,
}

impl CheckResult {
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Ok(()) => write!(f, "{:<24} ok", self.name),
            Err(msg) => write!(f, "{:<24} FAILED: {}", self.name, msg),
        }
    }
}

fn ensure(cond: bool, msg: impl FnOnce() -> String) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(Error::Internal(msg()))
    }
}

/// Duplication keeps size and rank, and the duplicate carries traffic.
fn duplicate<C: Communicator>(comm: &C, binding: &Binding) -> Result<()> {
    let dup = binding
        .duplicate(Some(comm))?
        .ok_or_else(|| Error::Internal("duplicate returned none".into()))?;
    ensure(dup.size() == comm.size(), || format!("size {} != {}", dup.size(), comm.size()))?;
    ensure(dup.rank() == comm.rank(), || format!("rank {} != {}", dup.rank(), comm.rank()))?;
    let group = binding
        .derive_group(Some(&dup))?
        .ok_or_else(|| Error::Internal("group returned none".into()))?;
    ensure(group.size() == comm.size(), || format!("group size {}", group.size()))?;
    ensure(group.rank() == Some(comm.rank()), || format!("group rank {:?}", group.rank()))?;
    let payload = broadcast_string(&dup, 0, b"dup")?;
    ensure(payload == b"dup", || "broadcast on duplicate failed".into())?;
    dup.barrier()
}

/// Rank 0 sends a payload with embedded zeros to every rank, which echoes it.
fn roundtrip<C: Communicator>(comm: &C) -> Result<()> {
    if comm.rank() == 0 {
        for dest in 1..comm.size() {
            send_string(comm, dest, ROUNDTRIP_TAG, ROUNDTRIP_MESSAGE)?;
        }
        for source in 1..comm.size() {
            let echo = receive_string(comm, Source::Rank(source), TagSelector::Tag(ROUNDTRIP_TAG))?;
            ensure(echo.payload == ROUNDTRIP_MESSAGE, || {
                format!("echo from {} was {:?}", source, echo.payload)
            })?;
        }
    } else {
        let received = receive_string(comm, Source::Rank(0), TagSelector::Tag(ROUNDTRIP_TAG))?;
        ensure(received.payload == ROUNDTRIP_MESSAGE, || {
            format!("received {:?}", received.payload)
        })?;
        ensure(received.status.source == 0, || format!("status {}", received.status))?;
        send_string(comm, 0, ROUNDTRIP_TAG, &received.payload)?;
    }
    comm.barrier()
}

/// Wildcard receives on rank 0 report the actual sender of each payload.
fn wildcard<C: Communicator>(comm: &C) -> Result<()> {
    if comm.rank() == 0 {
        let mut seen = vec![false; comm.size() as usize];
        for _ in 1..comm.size() {
            let received = receive_string(comm, Source::Any, TagSelector::Tag(WILDCARD_TAG))?;
            let sender = received.status.source;
            let expected = format!("I am node {}", sender);
            ensure(received.as_bytes() == expected.as_bytes(), || {
                format!("sender {} delivered {:?}", sender, received.into_string_lossy())
            })?;
            match seen.get_mut(sender as usize) {
                Some(slot) if !*slot && sender != 0 => *slot = true,
                _ => return Err(Error::Internal(format!("unexpected sender {}", sender))),
            }
        }
    } else {
        let msg = format!("I am node {}", comm.rank());
        send_string(comm, 0, WILDCARD_TAG, msg.as_bytes())?;
    }
    comm.barrier()
}

/// Broadcast from the last rank reaches every rank.
fn broadcast<C: Communicator>(comm: &C) -> Result<()> {
    let root = comm.size() - 1;
    let input: &[u8] = if comm.rank() == root { BCAST_MESSAGE.as_bytes() } else { b"" };
    let payload = broadcast_string(comm, root, input)?;
    ensure(payload == BCAST_MESSAGE.as_bytes(), || {
        format!("received {:?}", String::from_utf8_lossy(&payload))
    })
}

/// Null communicators are ignored without touching the transport.
fn null_communicator<C: Communicator>(comm: &C, binding: &Binding) -> Result<()> {
    let none: Option<&C> = None;
    ensure(binding.send_string(none, 0, 0, b"lost")?.is_none(), || "send".into())?;
    ensure(
        binding.receive_string(none, Source::Any, TagSelector::Any)?.is_none(),
        || "receive".into(),
    )?;
    ensure(binding.broadcast_string(none, 0, b"lost")?.is_none(), || "broadcast".into())?;
    ensure(binding.duplicate(none)?.is_none(), || "duplicate".into())?;
    ensure(binding.derive_group(none)?.is_none(), || "group".into())?;
    comm.barrier()
}

fn constants(consts: &MpiConstants) -> Result<()> {
    let map = consts.to_map();
    ensure(map.len() == CONSTANT_NAMES.len(), || format!("{} constants", map.len()))?;
    ensure(consts.any_source < 0, || format!("MPI_ANY_SOURCE = {}", consts.any_source))?;
    ensure(consts.any_tag < 0, || format!("MPI_ANY_TAG = {}", consts.any_tag))?;
    ensure(consts.any_source != consts.root, || "MPI_ANY_SOURCE == MPI_ROOT".into())
}

/// Run every check on this rank. Must be called on all ranks.
pub fn run_all<C: Communicator>(comm: &C, consts: &MpiConstants) -> Result<Vec<CheckResult>> {
    if comm.size() < 2 {
        return Err(Error::WorldTooSmall {
            required: 2,
            actual: comm.size(),
        });
    }
    let binding = Binding::default();
    let record = |name, outcome: Result<()>| CheckResult {
        name,
        outcome: outcome.map_err(|err| err.to_string()),
    };
    Ok(vec![
        record("duplicate", duplicate(comm, &binding)),
        record("roundtrip", roundtrip(comm)),
        record("wildcard source", wildcard(comm)),
        record("broadcast", broadcast(comm)),
        record("null communicator", null_communicator(comm, &binding)),
        record("constants", constants(consts)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyina::LocalUniverse;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn all_checks_pass_in_process() {
        let handles: Vec<_> = LocalUniverse::new(4)
            .with_recv_timeout(Duration::from_secs(20))
            .into_comms()
            .into_iter()
            .map(|comm| thread::spawn(move || run_all(&comm, &MpiConstants::LOCAL).unwrap()))
            .collect();
        for handle in handles {
            for result in handle.join().unwrap() {
                assert!(result.passed(), "{}", result);
            }
        }
    }

    #[test]
    fn single_rank_is_too_small() {
        let comms = LocalUniverse::new(1).into_comms();
        assert_eq!(
            run_all(&comms[0], &MpiConstants::LOCAL).unwrap_err(),
            Error::WorldTooSmall { required: 2, actual: 1 }
        );
    }

    #[test]
    fn report_lines() {
        let ok = CheckResult { name: "roundtrip", outcome: Ok(()) };
        assert!(ok.to_string().ends_with(" ok"));
        let failed = CheckResult { name: "broadcast", outcome: Err("boom".into()) };
        assert!(failed.to_string().ends_with("FAILED: boom"));
    }
}
