use clap::Parser;
use mpi::traits::*;
use pyina_tools::{latency, Envelope, LatencyArgs, LatencyBenchmark, LatencyOptions};

/// Length-prefixed ping-pong with rsmpi, as a baseline for the binding.
struct Benchmark<C: Communicator> {
    comm: C,
    rank: i32,
    envelope: Envelope,
    rbuf: Vec<u8>,
}

impl<C: Communicator> Benchmark<C> {
    fn send(&self, rank: i32) {
        let proc = self.comm.process_at_rank(rank);
        proc.send(&self.envelope.length());
        proc.send(self.envelope.wire());
    }

    fn receive(&mut self, rank: i32) {
        let proc = self.comm.process_at_rank(rank);
        let (len, _) = proc.receive::<i32>();
        assert_eq!(len, self.envelope.length());
        let _ = proc.receive_into(&mut self.rbuf[..]);
    }
}

impl<C: Communicator> LatencyBenchmark for Benchmark<C> {
    fn init(&mut self, size: usize) {
        self.envelope = Envelope::new(size);
        self.rbuf = Envelope::receive_buffer(self.envelope.length());
    }

    fn body(&mut self) {
        let peer = (self.rank + 1) % 2;
        if self.rank == 0 {
            self.send(peer);
            self.receive(peer);
        } else {
            self.receive(peer);
            self.send(peer);
        }
    }
}

fn main() {
    env_logger::init();
    let args = LatencyArgs::parse();
    let opts: LatencyOptions = pyina_tools::load_options(args.options_path);
    let universe = mpi::initialize().expect("failed to initialize rsmpi");
    let world = universe.world();
    let size = world.size();
    let rank = world.rank();
    assert_eq!(size, 2);

    let benchmark = Benchmark {
        comm: world,
        rank,
        envelope: Envelope::default(),
        rbuf: vec![],
    };
    let results = latency(&opts, benchmark);
    if rank == 0 {
        pyina_tools::print_latency(&results);
    }
}
