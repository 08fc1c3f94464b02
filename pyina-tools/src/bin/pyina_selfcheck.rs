use pyina::{Communicator, Context, MpiConstants};
use pyina_tools::selfcheck;

fn main() {
    env_logger::init();
    let ctx = Context::init().expect("failed to initialize MPI");
    let world = ctx.ensure_size(2).expect("pyina_selfcheck needs at least 2 processes");
    let rank = world.rank();

    let results = selfcheck::run_all(&world, &MpiConstants::query()).expect("failed to run checks");
    let failed = results.iter().filter(|result| !result.passed()).count();
    for result in &results {
        println!("[rank {}] {}", rank, result);
    }
    if failed > 0 {
        eprintln!("[rank {}] {} of {} checks failed", rank, failed, results.len());
        drop(world);
        drop(ctx);
        std::process::exit(1);
    }
}
