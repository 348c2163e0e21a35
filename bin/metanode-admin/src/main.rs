//! Metanode Admin - offline store inspection
//!
//! Opens a metanode's metadata store directly (the metanode must be
//! stopped, the store takes an exclusive lock) and reports on or dumps its
//! contents.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metanode_common::{Config, ROOT_INODE};
use metanode_store::{
    CollectionTag, Dentry, Extend, Inode, MetaSnapshot, MetaStore, Multipart, Record,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "metanode-admin")]
#[command(about = "Metanode store admin tool")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store directory (overrides config)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show apply index and record counts
    Stat,
    /// Print every record of a collection as JSON lines
    Dump {
        /// inode, dentry, extend or multipart
        collection: CollectionTag,
    },
    /// Print one inode as JSON
    GetInode { ino: u64 },
    /// Force a durable commit of buffered writes
    Flush,
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}

fn dump<R: Record>(snapshot: &MetaSnapshot, out: &mut impl Write) -> Result<u64> {
    let mut n = 0u64;
    snapshot.scan::<R, _, anyhow::Error>(|record| {
        serde_json::to_writer(&mut *out, &record)?;
        writeln!(out)?;
        n += 1;
        Ok(true)
    })?;
    Ok(n)
}

fn stat(store: &MetaStore, out: &mut impl Write) -> Result<()> {
    let snapshot = store.new_snapshot()?;
    writeln!(out, "path:          {}", store.path().display())?;
    writeln!(out, "apply index:   {}", store.apply_index())?;
    writeln!(out, "persisted:     {}", store.persisted_apply_index()?)?;
    match store.inodes().get(&ROOT_INODE) {
        Ok(root) => writeln!(out, "root:          {} (nlink {})", root.file_type(), root.nlink)?,
        Err(e) if e.is_not_found() => writeln!(out, "root:          missing")?,
        Err(e) => return Err(e.into()),
    }
    for tag in CollectionTag::ALL {
        writeln!(out, "{:<14} {}", format!("{tag}:"), snapshot.count(tag)?)?;
    }
    snapshot.close();
    Ok(())
}

fn run(store: &MetaStore, command: Commands, out: &mut impl Write) -> Result<()> {
    match command {
        Commands::Stat => stat(store, out)?,
        Commands::Dump { collection } => {
            let snapshot = store.new_snapshot()?;
            let n = match collection {
                CollectionTag::Inode => dump::<Inode>(&snapshot, out)?,
                CollectionTag::Dentry => dump::<Dentry>(&snapshot, out)?,
                CollectionTag::Extend => dump::<Extend>(&snapshot, out)?,
                CollectionTag::Multipart => dump::<Multipart>(&snapshot, out)?,
            };
            debug!("Dumped {} {} records", n, collection);
        }
        Commands::GetInode { ino } => {
            let inode = store.inodes().get(&ino)?;
            serde_json::to_writer_pretty(&mut *out, &inode)?;
            writeln!(out)?;
        }
        Commands::Flush => {
            store.flush()?;
            info!("Flushed store at {}", store.path().display());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(dir) = args.data_dir {
        config.store = config.store.with_data_dir(dir);
    }

    let store = MetaStore::open_with_config(&config.store)
        .with_context(|| format!("failed to open store at {}", config.store.data_dir.display()))?;
    let mut out = io::stdout().lock();
    let result = run(&store, args.command, &mut out);
    store.release();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use metanode_store::DentryId;
    use tempfile::TempDir;

    fn output(store: &MetaStore, command: Commands) -> String {
        let mut buf = Vec::new();
        run(store, command, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_load_config_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metanode.toml");
        std::fs::write(&path, "[store]\ndata_dir = \"/tmp/meta\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.store.data_dir, PathBuf::from("/tmp/meta"));
        assert!(load_config(None).is_ok());
        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_stat_and_dump() {
        let dir = TempDir::new().unwrap();
        let store = MetaStore::open(dir.path(), 1 << 20, 1 << 20).unwrap();
        store.set_apply_index(12);
        store.inodes().put(&Inode::new(1, 0o040_755)).unwrap();
        store.inodes().put(&Inode::new(2, 0o100_644)).unwrap();
        store
            .dentries()
            .put(&Dentry::new(1, "a", 2, 0o100_644))
            .unwrap();

        let stat = output(&store, Commands::Stat);
        assert!(stat.contains("apply index:   12"));
        assert!(stat.contains("inode:"));
        assert!(stat.contains("root:          dir (nlink 2)"));

        let dump = output(
            &store,
            Commands::Dump {
                collection: CollectionTag::Inode,
            },
        );
        assert_eq!(dump.lines().count(), 2);
        let first: serde_json::Value = serde_json::from_str(dump.lines().next().unwrap()).unwrap();
        assert_eq!(first["inode"], 1);

        let dentries = output(
            &store,
            Commands::Dump {
                collection: CollectionTag::Dentry,
            },
        );
        assert!(dentries.contains("\"name\":\"a\""));
        assert!(store.dentries().contains(&DentryId::new(1, "a")).unwrap());
    }

    #[test]
    fn test_stat_reports_missing_root() {
        let dir = TempDir::new().unwrap();
        let store = MetaStore::open(dir.path(), 1 << 20, 1 << 20).unwrap();
        let stat = output(&store, Commands::Stat);
        assert!(stat.contains("root:          missing"));
    }

    #[test]
    fn test_get_missing_inode_fails() {
        let dir = TempDir::new().unwrap();
        let store = MetaStore::open(dir.path(), 1 << 20, 1 << 20).unwrap();
        let mut buf = Vec::new();
        let err = run(&store, Commands::GetInode { ino: 99 }, &mut buf).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
