//! Master/worker task farm over string messages.
//!
//! The master broadcasts the shared input, hands one job to every worker and
//! replaces each finished job with the next one. Results are collected with
//! wildcard receives, so faster workers take more jobs. A worker stops when
//! it receives a job under [`EXIT_TAG`].
use log::debug;
use pyina::{
    message::{broadcast_string, receive_string, send_string},
    Communicator, Error, Result, Source, TagSelector,
};

pub const WORK_TAG: i32 = 1;
pub const RESULT_TAG: i32 = 2;
pub const EXIT_TAG: i32 = 3;

/// Encode a result as `<job>:<value>`.
fn encode(job: usize, value: &str) -> String {
    format!("{}:{}", job, value)
}

fn decode(message: &str) -> Result<(usize, String)> {
    message
        .split_once(':')
        .and_then(|(job, value)| Some((job.parse().ok()?, value.to_string())))
        .ok_or_else(|| Error::Internal(format!("malformed farm result {:?}", message)))
}

/// Run the farm on every rank. `jobs` is only read on the master (rank 0),
/// which returns the results in job order; workers return `None`.
pub fn farm<C, F>(comm: &C, shared: &str, jobs: &[String], work: F) -> Result<Option<Vec<String>>>
where
    C: Communicator,
    F: Fn(&str, &str) -> String,
{
    let shared = broadcast_string(comm, 0, shared.as_bytes())?;
    let shared = String::from_utf8_lossy(&shared).into_owned();

    if comm.rank() != 0 {
        worker(comm, &shared, work)?;
        return Ok(None);
    }

    let mut results = vec![String::new(); jobs.len()];
    let mut next = 0;
    let mut outstanding = 0;
    for dest in 1..comm.size() {
        if next < jobs.len() {
            send_string(comm, dest, WORK_TAG, encode(next, &jobs[next]).as_bytes())?;
            next += 1;
            outstanding += 1;
        } else {
            send_string(comm, dest, EXIT_TAG, b"")?;
        }
    }
    while outstanding > 0 {
        let received = receive_string(comm, Source::Any, TagSelector::Tag(RESULT_TAG))?;
        outstanding -= 1;
        let sender = received.status.source;
        let (job, value) = decode(&received.into_string_lossy())?;
        debug!("job {} finished on rank {}", job, sender);
        if let Some(slot) = results.get_mut(job) {
            *slot = value;
        }

        if next < jobs.len() {
            send_string(comm, sender, WORK_TAG, encode(next, &jobs[next]).as_bytes())?;
            next += 1;
            outstanding += 1;
        } else {
            send_string(comm, sender, EXIT_TAG, b"")?;
        }
    }
    Ok(Some(results))
}

fn worker<C, F>(comm: &C, shared: &str, work: F) -> Result<()>
where
    C: Communicator,
    F: Fn(&str, &str) -> String,
{
    loop {
        let received = receive_string(comm, Source::Rank(0), TagSelector::Any)?;
        if received.status.tag == EXIT_TAG {
            return Ok(());
        }
        let (job, input) = decode(&received.into_string_lossy())?;
        let output = work(shared, &input);
        send_string(comm, 0, RESULT_TAG, encode(job, &output).as_bytes())?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyina::LocalUniverse;
    use std::thread;
    use std::time::Duration;

    fn scaled_square(shared: &str, input: &str) -> String {
        let scale: i64 = shared.parse().unwrap();
        let x: i64 = input.parse().unwrap();
        (scale * x * x).to_string()
    }

    fn run(size: usize, jobs: usize) -> Vec<String> {
        let handles: Vec<_> = LocalUniverse::new(size)
            .with_recv_timeout(Duration::from_secs(20))
            .into_comms()
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let jobs: Vec<String> = (0..jobs).map(|x| x.to_string()).collect();
                    farm(&comm, "3", &jobs, scaled_square).unwrap()
                })
            })
            .collect();
        let mut results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results[1..].iter().all(Option::is_none));
        results.swap_remove(0).unwrap()
    }

    #[test]
    fn results_are_in_job_order() {
        let expected: Vec<String> = (0..25i64).map(|x| (3 * x * x).to_string()).collect();
        assert_eq!(run(4, 25), expected);
    }

    #[test]
    fn more_workers_than_jobs() {
        assert_eq!(run(5, 2), vec!["0".to_string(), "3".to_string()]);
    }

    #[test]
    fn result_encoding() {
        assert_eq!(decode(&encode(7, "a:b")).unwrap(), (7, "a:b".to_string()));
        assert!(decode("no separator").is_err());
    }
}
