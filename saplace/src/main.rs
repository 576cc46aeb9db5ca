use std::process;
use std::time::Duration;

use clap::Parser;
use log::{error, info};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use anaplace::floorplan::HBTree;
use saplace::io::{self, cli::Cli};
use saplace::optimizer::SAOptimizer;
use saplace::watchdog::Watchdog;

/// Exit codes: 0 success, 1 parse/IO error, 2 timeout, 3 infeasible.
fn main() {
    let args = Cli::parse();
    io::init_logger(args.log_level).expect("logger initialization failed");

    let config = io::read_config(args.config_file.as_deref());
    info!("config: {}", serde_json::to_string(&config).unwrap());

    let instance = match io::read_instance(&args.input_file) {
        Ok(instance) => instance,
        Err(err) => {
            error!("failed to parse {}: {err:#}", args.input_file.display());
            process::exit(1);
        }
    };

    let mut tree = HBTree::new();
    let registered = instance
        .modules
        .into_iter()
        .try_for_each(|m| tree.add_module(m))
        .and_then(|()| {
            instance
                .symmetry_groups
                .into_iter()
                .try_for_each(|g| tree.add_symmetry_group(g))
        })
        .and_then(|()| instance.nets.into_iter().try_for_each(|n| tree.add_net(n)));
    if let Err(err) = registered {
        error!("invalid instance: {err:#}");
        process::exit(1);
    }

    if tree.modules().is_empty() {
        info!("instance contains no modules, writing an empty placement");
        if let Err(err) = io::write_placement(&args.output_file, &tree) {
            error!("failed to write output: {err:#}");
            process::exit(1);
        }
        return;
    }

    let rng = match config.prng_seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };
    let watchdog = Watchdog::start(Duration::from_secs(config.time_limit_secs));

    let mut optimizer = match SAOptimizer::new(tree, config, rng) {
        Ok(optimizer) => optimizer,
        Err(err) => {
            error!("infeasible instance: {err:#}");
            process::exit(3);
        }
    };

    let best = optimizer.run(&watchdog);
    info!("final area: {}", best.area());

    if let Err(err) = io::write_placement(&args.output_file, best) {
        error!("failed to write output: {err:#}");
        process::exit(1);
    }

    if watchdog.has_timed_out() {
        process::exit(2);
    }
}
