use clap::Parser;
use pyina::{Communicator, Context};
use pyina_tools::{farm::farm, scatter::scatter, FarmArgs, Strategy};

fn scaled_square(shared: &str, input: &str) -> String {
    let scale: i64 = shared.parse().expect("invalid scale");
    let x: i64 = input.parse().expect("invalid job");
    (scale * x * x).to_string()
}

fn main() {
    env_logger::init();
    let args = FarmArgs::parse();
    let ctx = Context::init().expect("failed to initialize MPI");
    let required = if args.strategy == Strategy::Scatter && args.onall { 1 } else { 2 };
    let world = ctx
        .ensure_size(required)
        .expect("pyina_farm needs a master and at least one worker");

    let jobs: Vec<String> = (0..args.jobs).map(|x| x.to_string()).collect();
    let scale = args.scale.to_string();
    let results = match args.strategy {
        Strategy::Farm => farm(&world, &scale, &jobs, scaled_square),
        Strategy::Scatter => scatter(&world, &jobs, args.onall, |input| scaled_square(&scale, input)),
    }
    .expect("task farm failed");
    if let Some(results) = results {
        println!(
            "# rank 0 collected {} results from {} ranks ({:?})",
            results.len(),
            world.size(),
            args.strategy
        );
        for (job, result) in jobs.iter().zip(&results) {
            println!("{} {}", job, result);
        }
    }
}
