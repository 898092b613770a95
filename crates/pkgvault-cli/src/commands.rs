use std::fs::File;
use std::io::{self, BufReader, Write};
use std::time::Duration;

use anyhow::Context;
use colored::Colorize;
use pkgvault_store::{layout, BlobStorage, StoreConfig};
use pkgvault_types::BlobId;
use serde_json::json;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = store_config(&cli)?;
    let format = cli.format;
    match cli.command {
        Command::Init => cmd_init(&open_store(&config, true)?, format),
        Command::Add(args) => cmd_add(&open_store(&config, true)?, args, format, false),
        Command::Consume(args) => cmd_add(&open_store(&config, true)?, args, format, true),
        Command::Fetch(args) => cmd_fetch(&open_store(&config, false)?, args),
        Command::Path(args) => cmd_path(&config, args),
        Command::List => cmd_list(&open_store(&config, false)?, format),
        Command::Verify(args) => cmd_verify(&open_store(&config, false)?, args, format),
        Command::Sweep(args) => cmd_sweep(&open_store(&config, false)?, args, format),
    }
}

/// Only commands that write content may create a missing store.
fn open_store(config: &StoreConfig, create: bool) -> anyhow::Result<BlobStorage> {
    let store = if create {
        BlobStorage::open_with_config(config)
    } else {
        BlobStorage::open_existing(config)
    };
    store.with_context(|| format!("opening store at {}", config.root.display()))
}

/// Config file first, then `--root` on top.
fn store_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    Ok(config)
}

fn parse_id(s: &str) -> anyhow::Result<BlobId> {
    s.parse().with_context(|| format!("invalid blob id {s:?}"))
}

fn cmd_init(store: &BlobStorage, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", json!({ "root": store.root() })),
        OutputFormat::Text => println!(
            "{} Blob store ready at {}",
            "✓".green().bold(),
            store.root().display().to_string().bold()
        ),
    }
    Ok(())
}

fn cmd_add(
    store: &BlobStorage,
    args: AddArgs,
    format: OutputFormat,
    consume: bool,
) -> anyhow::Result<()> {
    let mut added = Vec::new();
    for path in &args.paths {
        let id = if consume {
            store.consume_file(path)?
        } else {
            let file = File::open(path).with_context(|| format!("reading {}", path.display()))?;
            store.add_reader(BufReader::new(file))?
        };
        if format == OutputFormat::Text {
            println!("{} {}", id.to_string().yellow(), path.display());
        }
        added.push(json!({ "id": id, "source": path }));
    }
    if format == OutputFormat::Json {
        println!("{}", serde_json::Value::Array(added));
    }
    Ok(())
}

fn cmd_fetch(store: &BlobStorage, args: FetchArgs) -> anyhow::Result<()> {
    let id = parse_id(&args.id)?;
    let mut blob = store.open_blob(&id)?;
    match &args.output {
        Some(path) => {
            let mut out =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            io::copy(&mut blob, &mut out)?;
            out.sync_all()?;
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            io::copy(&mut blob, &mut out)?;
            out.flush()?;
        }
    }
    Ok(())
}

fn cmd_path(config: &StoreConfig, args: IdArgs) -> anyhow::Result<()> {
    let id = parse_id(&args.id)?;
    println!("{}", layout::blob_path(&config.root, &id).display());
    Ok(())
}

fn cmd_list(store: &BlobStorage, format: OutputFormat) -> anyhow::Result<()> {
    let ids = store.list()?;
    match format {
        OutputFormat::Json => println!("{}", json!(ids)),
        OutputFormat::Text => {
            for id in &ids {
                println!("{id}");
            }
        }
    }
    Ok(())
}

fn cmd_verify(store: &BlobStorage, args: VerifyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let ids = if args.ids.is_empty() {
        store.list()?
    } else {
        args.ids.iter().map(|s| parse_id(s)).collect::<anyhow::Result<Vec<_>>>()?
    };
    let mut corrupt = Vec::new();
    for id in &ids {
        if !store.verify(id)? {
            corrupt.push(*id);
        }
    }
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({ "checked": ids.len(), "corrupt": corrupt })
        ),
        OutputFormat::Text => {
            for id in &corrupt {
                println!("{} {}", "✗ corrupt:".red().bold(), id);
            }
            if corrupt.is_empty() {
                println!("{} {} blobs verified", "✓".green().bold(), ids.len());
            }
        }
    }
    if !corrupt.is_empty() {
        anyhow::bail!("{} of {} blobs failed verification", corrupt.len(), ids.len());
    }
    Ok(())
}

fn cmd_sweep(store: &BlobStorage, args: SweepArgs, format: OutputFormat) -> anyhow::Result<()> {
    let report = store.sweep_incoming(Duration::from_secs(args.older_than_secs))?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "removed": report.files_removed,
                "kept": report.files_kept,
                "bytes_freed": report.bytes_freed,
            })
        ),
        OutputFormat::Text => println!(
            "{} Sweep: {} removed, {} kept, {} bytes freed",
            "✓".green(),
            report.files_removed,
            report.files_kept,
            report.bytes_freed
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pkgvault").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn root_flag_overrides_config_file() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("pkgvault.toml");
        std::fs::write(&config_path, "root = \"/from/config\"\nsync_on_commit = false\n").unwrap();
        let cli = parse(&[
            "--config",
            config_path.to_str().unwrap(),
            "--root",
            "/from/flag",
            "list",
        ]);
        let config = store_config(&cli).unwrap();
        assert_eq!(config.root, PathBuf::from("/from/flag"));
        assert!(!config.sync_on_commit);
    }

    #[test]
    fn defaults_without_flags() {
        let config = store_config(&parse(&["list"])).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn parse_id_rejects_garbage() {
        assert!(parse_id("xyz").is_err());
        assert_eq!(
            parse_id("5d41402abc4b2a76b9719d911017c592").unwrap(),
            BlobId::from_bytes(b"hello")
        );
    }

    #[test]
    fn add_then_fetch_to_file() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("store");
        let source = tmp.path().join("pkg.tar.gz");
        std::fs::write(&source, b"tarball bytes").unwrap();

        run_command(parse(&["--root", root.to_str().unwrap(), "add", source.to_str().unwrap()]))
            .unwrap();
        assert!(source.exists());

        let id = BlobId::from_bytes(b"tarball bytes").to_hex();
        let out = tmp.path().join("out");
        run_command(parse(&[
            "--root",
            root.to_str().unwrap(),
            "fetch",
            &id,
            "-o",
            out.to_str().unwrap(),
        ]))
        .unwrap();
        assert_eq!(std::fs::read(out).unwrap(), b"tarball bytes");
    }

    #[test]
    fn consume_moves_file_and_verify_passes() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("store");
        let source = tmp.path().join("upload");
        std::fs::write(&source, b"payload").unwrap();
        let root_arg = root.to_str().unwrap();

        run_command(parse(&["--root", root_arg, "consume", source.to_str().unwrap()])).unwrap();
        assert!(!source.exists());
        run_command(parse(&["--root", root_arg, "verify"])).unwrap();
    }

    #[test]
    fn fetch_unknown_id_creates_no_output() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("store");
        BlobStorage::open(&root).unwrap();
        let out = tmp.path().join("out");
        let id = BlobId::from_bytes(b"never stored").to_hex();
        let result = run_command(parse(&[
            "--root",
            root.to_str().unwrap(),
            "fetch",
            &id,
            "-o",
            out.to_str().unwrap(),
        ]));
        assert!(result.is_err());
        assert!(!out.exists());
    }

    #[test]
    fn read_only_commands_do_not_create_store() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("absent");
        let root_arg = root.to_str().unwrap();
        let id = BlobId::from_bytes(b"hello").to_hex();

        assert!(run_command(parse(&["--root", root_arg, "list"])).is_err());
        assert!(run_command(parse(&["--root", root_arg, "verify"])).is_err());
        assert!(run_command(parse(&["--root", root_arg, "sweep"])).is_err());
        assert!(run_command(parse(&["--root", root_arg, "fetch", &id])).is_err());
        run_command(parse(&["--root", root_arg, "path", &id])).unwrap();
        assert!(!root.exists());

        run_command(parse(&["--root", root_arg, "init"])).unwrap();
        run_command(parse(&["--root", root_arg, "list"])).unwrap();
    }

    #[test]
    fn verify_fails_on_tampered_blob() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("store");
        let store = BlobStorage::open(&root).unwrap();
        let id = store.add("original").unwrap();
        std::fs::write(store.filepath(&id), b"changed").unwrap();
        let result = run_command(parse(&["--root", root.to_str().unwrap(), "verify"]));
        assert!(result.is_err());
    }
}
