use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use strata::common::{StoreConfig, DEFAULT_BUFFER_POOL_SIZE, DEFAULT_PAGE_SIZE};
use strata::tuple::{DataType, Schema, TupleBuilder};
use strata::{Database, Result};

/// Strata - a transactional page store demo
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory
    #[arg(short = 'D', long, default_value = "./strata_data")]
    data_dir: PathBuf,

    /// Number of buffer pool frames
    #[arg(short, long, default_value_t = DEFAULT_BUFFER_POOL_SIZE)]
    pool_size: usize,

    /// Page size in bytes
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Do not flush pages at commit
    #[arg(long)]
    no_force: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Number of rows to insert
    #[arg(short, long, default_value = "10")]
    rows: u32,

    /// Print the log after the demo
    #[arg(long)]
    dump_log: bool,
}

const TABLE_ID: u32 = 1;

fn run(args: &Args) -> Result<()> {
    let config = StoreConfig::new(&args.data_dir)
        .with_buffer_pool_size(args.pool_size)
        .with_page_size(args.page_size)
        .with_force(!args.no_force);

    let db = Database::open(config)?;
    let stats = db.recovery_stats();
    info!(
        "recovery: {} records, {} pages written, {} transactions undone",
        stats.records_scanned, stats.pages_written, stats.losers_undone
    );

    let schema = Schema::builder()
        .column("id", DataType::Integer)
        .column("name", DataType::Char(16))
        .build_arc();
    let table = db.heap_file(TABLE_ID, schema.clone())?;
    let access = db.access();

    let tid = access.begin_transaction();
    for i in 0..args.rows {
        let tuple = TupleBuilder::new(schema.clone())
            .value(i as i32)
            .value(format!("row-{}", i))
            .build();
        table.insert_tuple(tid, tuple)?;
    }
    access.transaction_complete(tid, true)?;
    println!("{} committed {} rows", tid, args.rows);

    let tid = access.begin_transaction();
    let tuple = TupleBuilder::new(schema.clone())
        .value(-1)
        .value("discarded")
        .build();
    table.insert_tuple(tid, tuple)?;
    access.transaction_complete(tid, false)?;
    println!("{} aborted its insert", tid);

    let tid = access.begin_transaction();
    let rows = table.scan(tid)?;
    access.transaction_complete(tid, true)?;
    println!("{} rows in table {} ({} pages):", rows.len(), TABLE_ID, table.num_pages());
    for row in &rows {
        println!("  {}", row);
    }

    if args.dump_log {
        print!("{}", access.log().dump()?);
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
