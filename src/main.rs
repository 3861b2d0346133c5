mod args;
mod replay;

use clap::Parser;
use log::{debug, warn};
use snafu::ErrorCompat;

use crate::args::Args;
use crate::replay::{run_session, InputOverride};

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    debug!("args: {:?}", args);

    let config_path = match args.config.clone() {
        Some(p) => p,
        None => {
            eprintln!("A session description must be provided with --config");
            std::process::exit(2);
        }
    };

    let input = args.input.clone().map(|path| InputOverride {
        path,
        input_type: args.input_type.clone(),
        excel_worksheet_name: args.excel_worksheet_name.clone(),
    });

    let res = run_session(config_path, args.out.clone(), args.reference.clone(), input);
    if let Err(e) = res {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured: {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
