//! Scatter-gather map over string messages.
//!
//! The job list is split into contiguous ranges, one per rank. The master
//! broadcasts the jobs, sends every worker its range under [`RANGE_TAG`] and
//! gathers each worker's results, which are sent under the worker's rank.
//! Unless the master is told to compute, it takes an empty range.
use log::debug;
use pyina::{
    message::{broadcast_string, receive_string, send_string},
    Communicator, Error, Result, Source, TagSelector,
};

pub const RANGE_TAG: i32 = 0;

const MASTER: i32 = 0;

/// Index range `[begin, end)` of the jobs run by rank `index` when
/// `popsize` jobs are split over `nproc` ranks. Earlier ranks get the larger
/// shares. A `skip` rank gets an empty range and the others split the jobs.
pub fn get_workload(index: usize, nproc: usize, popsize: usize, skip: Option<usize>) -> (usize, usize) {
    let mut index = index;
    let mut nproc = nproc;
    let mut skipped = false;
    if let Some(skip) = skip.filter(|&skip| skip < nproc) {
        nproc -= 1;
        if index == skip {
            skipped = true;
        } else if index > skip {
            index -= 1;
        }
    }

    let (mut n1, mut n2) = (nproc, popsize);
    let (mut begin, mut end) = (0, 0);
    for i in 0..nproc {
        begin = end;
        let share = n2.div_ceil(n1);
        n2 -= share;
        n1 -= 1;
        end += share;
        if i == index {
            break;
        }
    }

    if skipped {
        return if index < nproc { (begin, begin) } else { (end, end) };
    }
    (begin, end)
}

/// Number of jobs run by every rank, indexed by rank.
pub fn balance_workload(nproc: usize, popsize: usize, skip: Option<usize>) -> Vec<usize> {
    (0..nproc)
        .map(|index| {
            let (begin, end) = get_workload(index, nproc, popsize, skip);
            end - begin
        })
        .collect()
}

fn encode_range((begin, end): (usize, usize)) -> String {
    format!("{}:{}", begin, end)
}

fn decode_range(message: &str) -> Result<(usize, usize)> {
    message
        .split_once(':')
        .and_then(|(begin, end)| Some((begin.parse().ok()?, end.parse().ok()?)))
        .filter(|(begin, end)| begin <= end)
        .ok_or_else(|| Error::Internal(format!("malformed job range {:?}", message)))
}

fn to_yaml(values: &[String]) -> Result<String> {
    serde_yaml::to_string(values).map_err(|err| Error::Internal(err.to_string()))
}

fn from_yaml(message: &str) -> Result<Vec<String>> {
    serde_yaml::from_str(message).map_err(|err| Error::Internal(err.to_string()))
}

/// Map `work` over `jobs` on every rank. `jobs` is only read on the master
/// (rank 0), which returns the results in job order; workers return `None`.
/// With `onall` unset the master computes nothing, so the world needs at
/// least one worker.
pub fn scatter<C, F>(comm: &C, jobs: &[String], onall: bool, work: F) -> Result<Option<Vec<String>>>
where
    C: Communicator,
    F: Fn(&str) -> String,
{
    let size = comm.size();
    if !onall && size < 2 {
        return Err(Error::WorldTooSmall {
            required: 2,
            actual: size,
        });
    }
    let skip = if onall { None } else { Some(MASTER as usize) };
    let nproc = size as usize;

    let shared = if comm.rank() == MASTER {
        to_yaml(jobs)?
    } else {
        String::new()
    };
    let shared = broadcast_string(comm, MASTER, shared.as_bytes())?;
    let jobs = from_yaml(&String::from_utf8_lossy(&shared))?;
    let run = |(begin, end): (usize, usize)| -> Vec<String> {
        jobs[begin..end].iter().map(|job| work(job.as_str())).collect()
    };

    if comm.rank() != MASTER {
        let received = receive_string(comm, Source::Rank(MASTER), TagSelector::Any)?;
        let range = decode_range(&received.into_string_lossy())?;
        if range.1 > jobs.len() {
            return Err(Error::Internal(format!("job range {:?} out of bounds", range)));
        }
        debug!("rank {} running jobs {:?}", comm.rank(), range);
        let results = run(range);
        send_string(comm, MASTER, comm.rank(), to_yaml(&results)?.as_bytes())?;
        return Ok(None);
    }

    for worker in 1..size {
        let range = get_workload(worker as usize, nproc, jobs.len(), skip);
        send_string(comm, worker, RANGE_TAG, encode_range(range).as_bytes())?;
    }

    let mut results = vec![String::new(); jobs.len()];
    let (begin, end) = get_workload(MASTER as usize, nproc, jobs.len(), skip);
    for (slot, value) in results[begin..end].iter_mut().zip(run((begin, end))) {
        *slot = value;
    }

    for _ in 1..size {
        let received = receive_string(comm, Source::Any, TagSelector::Any)?;
        let sender = received.status.source;
        let values = from_yaml(&received.into_string_lossy())?;
        let (begin, end) = get_workload(sender as usize, nproc, jobs.len(), skip);
        if values.len() != end - begin {
            return Err(Error::Mismatch {
                expected: end - begin,
                received: values.len(),
            });
        }
        debug!("rank {} returned jobs {}..{}", sender, begin, end);
        for (slot, value) in results[begin..end].iter_mut().zip(values) {
            *slot = value;
        }
    }
    Ok(Some(results))
}
