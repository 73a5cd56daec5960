//! ipxdb-gen: CLI tool for building and querying xdb files.

use clap::{Parser, Subcommand};
use ipxdb::{IndexPolicy, Maker, Searcher};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "ipxdb-gen")]
#[command(version = "0.1.0")]
#[command(about = "Build and query binary xdb ip region databases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a binary xdb file from sorted segment lines
    Gen {
        /// Source ip text file path (start|end|region lines)
        #[arg(long)]
        src: PathBuf,

        /// Destination binary xdb file path
        #[arg(long)]
        dst: PathBuf,

        /// Index policy: vector or btree
        #[arg(long, default_value = "vector")]
        index: String,
    },

    /// Search an ip in an xdb file
    Search {
        /// Binary xdb file path
        #[arg(long)]
        src: PathBuf,

        /// Ip address to search
        #[arg(long)]
        ip: String,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Gen { src, dst, index } => {
            let policy = IndexPolicy::from_name(&index);
            let mut maker = Maker::new(policy, &src, &dst);
            if let Err(e) = maker.gen() {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
            println!("Successfully generated {:?} -> {:?}", src, dst);
        }
        Commands::Search { src, ip } => {
            let searcher = match Searcher::with_file_only(&src) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                }
            };
            match searcher.search(&ip) {
                Ok(result) => {
                    println!("IP: {}", ip);
                    match result.region {
                        Some(region) => println!("Region: {}", region),
                        None => println!("Region: Not found"),
                    }
                    println!("IO count: {}", result.io_count);
                    println!("Time cost: {}us", result.took.as_micros());
                }
                Err(e) => {
                    eprintln!("Search failed: {}", e);
                    process::exit(1);
                }
            }
        }
    }
}
