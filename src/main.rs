use std::process;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Resolve a path expression and print every entry found beneath it.
#[derive(Debug, Parser)]
#[command(name = "pathtree", version)]
struct Args {
    /// Path to files: may start with `~` and contain glob wildcards.
    #[arg(long)]
    path: String,

    /// Directory levels to descend.
    #[arg(long, default_value_t = 1)]
    depth: usize,

    /// Also print the resolved root itself.
    #[arg(long)]
    include_root: bool,
}

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let entries = match pathtree::list(&args.path, args.depth, args.include_root, &[]) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    for entry in &entries {
        println!("{entry}");
    }
    eprintln!("number of entries found within this path: {}", entries.len());
}
