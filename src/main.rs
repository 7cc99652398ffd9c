// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use clap::Parser;
use pose_skeletons::cli::args::{Cli, Commands};
use pose_skeletons::cli::extract::run_extract;

fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Extract(args) => run_extract(args),
    }
}
