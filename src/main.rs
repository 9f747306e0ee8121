use std::path::PathBuf;
use std::process;

use clap::Parser;
use dbfile_reader::{DbFile, ReaderOptions, Schema};

/// Dump the contents of a client database file.
#[derive(Debug, Parser)]
#[command(name = "dbfile-reader", version, about)]
struct Args {
    /// Path to the .dbc / .db2 file
    file: PathBuf,

    /// Record layout, e.g. "id:u32:key, name:string, flags:u8[4]"
    #[arg(short, long)]
    schema: String,

    /// Dump the string pool
    #[arg(long)]
    strings: bool,

    /// Skip record decoding
    #[arg(long)]
    no_records: bool,

    /// Print at most this many records
    #[arg(short, long)]
    limit: Option<usize>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let schema: Schema = match args.schema.parse() {
        Ok(schema) => schema,
        Err(e) => {
            eprintln!("ERROR: Invalid schema: {}", e);
            process::exit(1);
        }
    };
    let options = ReaderOptions::default()
        .load_records(!args.no_records)
        .load_string_pool(args.strings);

    println!("Reading database file: {}", args.file.display());
    println!("{}", "=".repeat(60));

    let file = match DbFile::open(&args.file, schema, options) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("\nERROR: Failed to read database file");
            eprintln!("  {}", e);
            process::exit(1);
        }
    };

    println!("\nFile Information:");
    println!("  Format: {}", file.format());
    match file.layout() {
        Some(layout) => {
            println!("  Records: {} of {} bytes", layout.record_count, layout.record_size);
            println!("  Fields: {} stored, {} total", layout.field_count, layout.total_field_count);
            println!("  Keys: {}..={}", layout.min_key, layout.max_key);
            println!("  Table hash: {:#010x}, layout hash: {:#010x}", layout.table_hash, layout.layout_hash);
            if layout.build != 0 {
                println!("  Build: {}", layout.build);
            }
            println!("  Variable records: {}", layout.has_variable_records());
            println!("  Index table: {}", layout.index_table.exists);
            println!("  Copies: {}", file.copy_count());
        }
        None => println!("  Empty file"),
    }

    if args.strings {
        println!("\nString Pool:");
        for entry in file.strings() {
            match entry {
                Ok((offset, text)) => println!("  [{:#06x}] {:?}", offset, text),
                Err(e) => {
                    eprintln!("\nERROR: Failed to read string pool");
                    eprintln!("  {}", e);
                    process::exit(1);
                }
            }
        }
    }

    if args.no_records {
        return;
    }

    println!("\nRecords:");
    let limit = args.limit.unwrap_or(usize::MAX);
    let mut printed = 0;
    for entry in file.records().take(limit) {
        match entry {
            Ok((key, record)) => {
                println!("  {}: {}", key, record);
                printed += 1;
            }
            Err(e) => {
                eprintln!("\nERROR: Failed to decode record #{}", printed);
                eprintln!("  {}", e);
                process::exit(1);
            }
        }
    }

    let total = file.record_count() + file.copy_count();
    if total > printed {
        println!("  ... and {} more", total - printed);
    }
}
