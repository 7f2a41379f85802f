//! Topoforge CLI - Generate infrastructure code from network topologies

mod cli;
mod colorizer;
mod table;

use clap::Parser;

fn main() {
    let cli_args = cli::Cli::parse();

    // Logging is initialized in run() once flags and environment are known
    let mut app = cli::TopoforgeApp::new();

    if let Err(e) = app.run(cli_args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
