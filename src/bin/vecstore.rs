use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vecstore::{StoreOptions, VectorDb};

#[derive(Debug, Parser)]
#[command(name = "vecstore")]
#[command(about = "Inspect and edit a vecstore directory", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Args)]
struct StoreArgs {
    /// Store directory; artifacts are named after its last component.
    #[arg(long, global = true, default_value = "db/store")]
    db: PathBuf,
    /// Vector dimension the store was created with.
    #[arg(long, global = true, default_value_t = 300)]
    dim: usize,
    /// Skip fsync on write.
    #[arg(long, global = true)]
    no_fsync: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    Info,
    Keys,
    Insert {
        #[arg(long)]
        key: String,
        /// Comma separated floats.
        #[arg(long)]
        vector: String,
    },
    Get {
        #[arg(long)]
        key: String,
    },
    Nearest {
        #[arg(long)]
        vector: String,
        #[arg(short, long, default_value_t = 1)]
        k: usize,
    },
    Remove {
        #[arg(long = "position", conflicts_with = "key")]
        positions: Vec<usize>,
        #[arg(long)]
        key: Option<String>,
    },
    Check,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("VECSTORE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut db = open(&cli.store)?;
    match cli.cmd {
        Command::Info => info(&db),
        Command::Keys => keys(&db),
        Command::Insert { key, vector } => insert(&mut db, &key, &vector),
        Command::Get { key } => get(&db, &key),
        Command::Nearest { vector, k } => nearest(&db, &vector, k),
        Command::Remove { positions, key } => remove(&mut db, positions, key),
        Command::Check => {
            db.check()?;
            println!("ok: {} entries", db.len());
            Ok(())
        }
    }
}

fn open(args: &StoreArgs) -> anyhow::Result<VectorDb> {
    let options = StoreOptions {
        fsync_writes: !args.no_fsync,
        ..Default::default()
    };
    VectorDb::with_options(&args.db, args.dim, options)?
        .open()
        .with_context(|| format!("open store {}", args.db.display()))
}

fn parse_vector(raw: &str) -> anyhow::Result<Vec<f32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f32>()
                .with_context(|| format!("invalid vector component {s:?}"))
        })
        .collect()
}

fn format_vector(v: &[f32]) -> String {
    v.iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn info(db: &VectorDb) -> anyhow::Result<()> {
    let paths = db.paths();
    println!("path: {}", db.path().display());
    println!("state: {:?}", db.state());
    println!("dim: {}", db.dim());
    println!("entries: {}", db.len());
    println!("index: {}", paths.index.display());
    println!("payload: {}", paths.payload.display());
    println!("invpayload: {}", paths.inv_payload.display());
    Ok(())
}

fn keys(db: &VectorDb) -> anyhow::Result<()> {
    for (position, key) in db.keys()?.iter().enumerate() {
        println!("{position}\t{key}");
    }
    Ok(())
}

fn insert(db: &mut VectorDb, key: &str, raw: &str) -> anyhow::Result<()> {
    let vector = parse_vector(raw)?;
    if db.insert(key, &vector)? {
        db.write()?;
        println!("inserted {key} at {}", db.len() - 1);
    } else {
        println!("exists {key}");
    }
    Ok(())
}

fn get(db: &VectorDb, key: &str) -> anyhow::Result<()> {
    let vector = db.search_vector(key)?;
    if db.contains(key)? {
        println!("{}", format_vector(&vector));
    } else {
        println!("{} (missing)", format_vector(&vector));
    }
    Ok(())
}

fn nearest(db: &VectorDb, raw: &str, k: usize) -> anyhow::Result<()> {
    let query = parse_vector(raw)?;
    for (key, distance) in db.nearest_with_distances(&query, k)? {
        println!("{key}\t{distance}");
    }
    Ok(())
}

fn remove(db: &mut VectorDb, positions: Vec<usize>, key: Option<String>) -> anyhow::Result<()> {
    let removed = match key {
        Some(key) => db.remove_by_key(&key)?,
        None if positions.is_empty() => anyhow::bail!("remove needs --position or --key"),
        None => db.remove(positions)?,
    };
    if removed {
        db.write()?;
    }
    println!("removed={removed} entries={}", db.len());
    Ok(())
}
