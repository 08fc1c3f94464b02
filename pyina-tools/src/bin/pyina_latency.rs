use clap::Parser;
use pyina::{Communicator, Context};
use pyina_tools::{latency, LatencyArgs, LatencyOptions, StringPingPong};

fn main() {
    env_logger::init();
    let args = LatencyArgs::parse();
    let opts: LatencyOptions = pyina_tools::load_options(&args.options_path);

    let ctx = Context::init().expect("failed to initialize MPI");
    let world = ctx.ensure_size(2).expect("failed to get the world communicator");
    assert_eq!(world.size(), 2);
    let rank = world.rank();

    let results = latency(&opts, StringPingPong::new(world));
    if rank == 0 {
        pyina_tools::print_latency(&results);
    }
}
