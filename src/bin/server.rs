//! `bibfed-server` — runs one library server: loads a catalogue, opens its
//! socket, registers with the federation, and serves requests until
//! terminated.

use bibfed::paths;
use bibfed::server::{self, ServerConfig};
use clap::Parser;
use std::path::PathBuf;

/// Runs a federated library-lending server.
#[derive(Parser, Debug)]
#[command(name = "bibfed-server")]
struct Args {
    /// Name this library is known by in the federation registry.
    library_name: String,

    /// Basename of the catalogue record file, under the file-records directory.
    record_basename: String,

    /// Number of worker threads to process requests.
    worker_count: usize,
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    if args.library_name.len() >= paths::MAX_LINE {
        eprintln!("library name is too long");
        std::process::exit(1);
    }
    if args.worker_count == 0 {
        eprintln!("worker count must be a positive integer");
        std::process::exit(1);
    }

    let config = ServerConfig {
        library_name: args.library_name,
        record_path: PathBuf::from(paths::record_path(&args.record_basename)),
        worker_count: args.worker_count,
        bib_conf_path: server::default_bib_conf_path(),
        build_dir: server::default_build_dir(),
    };

    if let Err(err) = server::run(config) {
        eprintln!("bibfed-server failed: {:#}", err);
        std::process::exit(1);
    }
}
