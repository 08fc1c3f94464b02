//! Latency benchmark code
use pyina::{
    message::{receive_string, send_string, TERMINATOR},
    Communicator, Source, TagSelector,
};
use serde::Deserialize;
use std::time::Instant;

#[derive(Debug, Deserialize)]
pub struct LatencyOptions {
    pub iterations: usize,
    pub skip: usize,
    pub warmup_validation: usize,
    pub min_size: usize,
    pub max_size: usize,
}

impl LatencyOptions {
    /// Message sizes to run, doubling from `min_size` up to `max_size`.
    pub fn sizes(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(Some(self.min_size.max(1)), |size| size.checked_mul(2))
            .take_while(|size| *size <= self.max_size)
    }
}

pub trait LatencyBenchmark {
    /// Initialization code (not timed).
    fn init(&mut self, size: usize);

    /// Code of the benchmark being timed.
    fn body(&mut self);
}

/// Generic latency benchmark function. Returns a vec of pairs of the form
/// (size, microseconds).
///
/// Based on the OSU microbenchmarks version for MPI.
pub fn latency(opts: &LatencyOptions, mut benchmark: impl LatencyBenchmark) -> Vec<(usize, f32)> {
    let mut results = vec![];
    for size in opts.sizes() {
        let mut total_time = 0.0;
        // Prepare to run the benchmark code.
        benchmark.init(size);
        for i in 0..opts.iterations + opts.skip {
            for j in 0..=opts.warmup_validation {
                let start = Instant::now();
                // Body of code being benchmarked.
                benchmark.body();
                if i >= opts.skip && j == opts.warmup_validation {
                    total_time += Instant::now().duration_since(start).as_secs_f32();
                }
            }
        }
        let latency = (total_time * 1.0e6) / (2.0 * opts.iterations.max(1) as f32);
        results.push((size, latency));
    }
    results
}

/// One ping-pong message as it goes on the wire: the length prefix counts
/// the payload, the chars carry the payload and its terminator.
#[derive(Debug, Clone)]
pub struct Envelope {
    wire: Vec<u8>,
}

impl Envelope {
    pub fn new(size: usize) -> Envelope {
        let mut wire: Vec<u8> = (0..size).map(|i| b'a' + (i % 26) as u8).collect();
        wire.push(TERMINATOR);
        Envelope { wire }
    }

    pub fn payload(&self) -> &[u8] {
        &self.wire[..self.wire.len() - 1]
    }

    /// Length prefix sent ahead of the chars.
    pub fn length(&self) -> i32 {
        i32::try_from(self.payload().len()).expect("benchmark payload too long")
    }

    /// Payload and terminator.
    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    /// Buffer for the chars announced by a received length prefix.
    pub fn receive_buffer(len: i32) -> Vec<u8> {
        vec![0; usize::try_from(len).expect("negative length prefix") + 1]
    }
}

impl Default for Envelope {
    fn default() -> Envelope {
        Envelope::new(0)
    }
}

/// Ping-pong of length-prefixed strings between ranks 0 and 1.
pub struct StringPingPong<C: Communicator> {
    pub comm: C,
    envelope: Envelope,
}

impl<C: Communicator> StringPingPong<C> {
    pub fn new(comm: C) -> StringPingPong<C> {
        StringPingPong {
            comm,
            envelope: Envelope::default(),
        }
    }
}

impl<C: Communicator> LatencyBenchmark for StringPingPong<C> {
    fn init(&mut self, size: usize) {
        self.envelope = Envelope::new(size);
    }

    fn body(&mut self) {
        let rank = self.comm.rank();
        let peer = (rank + 1) % 2;
        let payload = self.envelope.payload();
        if rank == 0 {
            send_string(&self.comm, peer, 0, payload).expect("failed to send string to rank 1");
            let received = receive_string(&self.comm, Source::Rank(peer), TagSelector::Tag(0))
                .expect("failed to receive string from rank 1");
            assert_eq!(received.payload.len(), payload.len());
        } else {
            let received = receive_string(&self.comm, Source::Rank(peer), TagSelector::Tag(0))
                .expect("failed to receive string from rank 0");
            assert_eq!(received.payload.len(), payload.len());
            send_string(&self.comm, peer, 0, payload).expect("failed to send string to rank 0");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyina::LocalUniverse;
    use std::thread;
    use std::time::Duration;

    fn options(yaml: &str) -> LatencyOptions {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn sizes_double_up_to_max() {
        let opts = options("min_size: 1\nmax_size: 20\niterations: 1\nskip: 0\nwarmup_validation: 0\n");
        assert_eq!(opts.sizes().collect::<Vec<_>>(), vec![1, 2, 4, 8, 16]);
    }

    #[test]
    fn envelope_length_counts_payload_only() {
        let envelope = Envelope::new(30);
        assert_eq!(envelope.length(), 30);
        assert_eq!(envelope.wire().len(), 31);
        assert_eq!(envelope.wire()[30], TERMINATOR);
        assert_eq!(&envelope.payload()[24..28], b"yzab");
        assert_eq!(Envelope::receive_buffer(envelope.length()).len(), envelope.wire().len());
        assert_eq!(Envelope::default().wire(), &[TERMINATOR]);
    }

    #[test]
    fn raw_envelope_is_read_by_receive_string() {
        let comms = LocalUniverse::new(2).into_comms();
        let envelope = Envelope::new(12);
        comms[0].send_int(envelope.length(), 1, 0).unwrap();
        comms[0].send_chars(envelope.wire(), 1, 0).unwrap();
        let received = receive_string(&comms[1], Source::Rank(0), TagSelector::Tag(0)).unwrap();
        assert_eq!(received.as_bytes(), envelope.payload());
    }

    #[test]
    fn ping_pong_over_local_ranks() {
        let handles: Vec<_> = LocalUniverse::new(2)
            .with_recv_timeout(Duration::from_secs(20))
            .into_comms()
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let opts = options("min_size: 4\nmax_size: 64\niterations: 3\nskip: 1\nwarmup_validation: 1\n");
                    latency(&opts, StringPingPong::new(comm))
                })
            })
            .collect();
        for handle in handles {
            let results = handle.join().unwrap();
            let sizes: Vec<_> = results.iter().map(|(size, _)| *size).collect();
            assert_eq!(sizes, vec![4, 8, 16, 32, 64]);
            assert!(results.iter().all(|(_, lat)| *lat >= 0.0));
        }
    }
}
