use clap::Parser as ClapParser;
use std::{fs, process, sync::Arc};

use reify::{
    ArenaHeap, ByteOrder, CodeSettings, DebugInfoTable, Meta, Value, global_size,
    init_global_data,
};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Chunk files, concatenated in order into one bytecode unit
    #[arg(required = true, help = "The bytecode chunks to load")]
    files: Vec<String>,

    /// The chunks hold big-endian code words
    #[arg(long, help = "Decode code words as big-endian")]
    big_endian: bool,

    /// Grow the global table to at least this many slots
    #[arg(long, value_name = "N")]
    grow_globals: Option<usize>,

    /// Release the unit again before exiting
    #[arg(long)]
    unload: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let chunks: Vec<Vec<u8>> = cli
        .files
        .iter()
        .map(|filename| match fs::read(filename) {
            Ok(bytes) => bytes,
            Err(err) => {
                eprintln!("Error reading file '{}': {}", filename, err);
                process::exit(1);
            }
        })
        .collect();
    let chunks: Vec<&[u8]> = chunks.iter().map(Vec::as_slice).collect();

    let settings = CodeSettings {
        byte_order: if cli.big_endian {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        },
        ..Default::default()
    };
    let debug_info = Arc::new(DebugInfoTable::new());
    let meta = match Meta::new(settings, debug_info) {
        Ok(meta) => meta,
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(1);
        }
    };

    let mut heap = ArenaHeap::new();
    init_global_data(&mut heap, &[]);

    let reified = match meta.reify_bytecode(&mut heap, &chunks, Value::UNBOUND) {
        Ok(reified) => reified,
        Err(err) => {
            eprintln!("Error loading bytecode: {}", err);
            process::exit(1);
        }
    };
    let handle = reified.bytecode;
    println!(
        "loaded [{:#x}, {:#x}) ({} bytes from {} chunks)",
        handle.start,
        handle.end(),
        handle.len,
        chunks.len()
    );
    println!("registered fragments: {}", meta.registry().len());

    if let Some(n) = cli.grow_globals {
        if let Err(err) = meta.realloc_global(&mut heap, n) {
            eprintln!("Error growing globals: {}", err);
            process::exit(1);
        }
        println!("global slots: {}", global_size(&heap));
    }

    if cli.unload {
        if let Err(err) = meta.release_bytecode(handle) {
            eprintln!("Error releasing bytecode: {}", err);
            process::exit(1);
        }
        println!("released; registered fragments: {}", meta.registry().len());
    }
}
