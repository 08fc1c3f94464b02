use pyina::{Communicator, Context, MpiConstants};

fn main() {
    env_logger::init();
    let ctx = Context::init().expect("failed to initialize MPI");
    let world = ctx.world().expect("failed to get the world communicator");
    println!("{} (rank {} of {})", pyina::hello(), world.rank(), world.size());
    world.barrier().expect("barrier failed");

    if world.rank() == 0 {
        println!("thread level: {:?}", ctx.thread_level());
        println!("wtime: {}", Context::wtime());
        println!("{}", Context::version().expect("failed to query the MPI version"));
        let consts = serde_yaml::to_string(&MpiConstants::query()).expect("failed to serialize constants");
        print!("{}", consts);
    }
}
