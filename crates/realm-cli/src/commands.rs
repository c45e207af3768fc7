use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use bytes::Bytes;
use colored::Colorize;
use realm_assets::{AssetLoader, AssetSource, FileSource, HttpSource, RawParser};
use realm_collections::{CollectionLoader, Manifest};
use realm_server::RealmServer;
use realm_store::{Lookup, StorageManager};

use crate::cli::*;
use crate::config::RealmConfig;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = RealmConfig::load(cli.config.as_deref())?;
    let format = cli.format;
    if let Command::Serve(args) = &cli.command {
        if let Some(bind) = &args.bind {
            config.server.bind_addr = bind.parse().context("invalid --bind address")?;
        }
    }
    let storage = Arc::new(StorageManager::init(&config.storage).await?);

    match cli.command {
        Command::Serve(_) => cmd_serve(config, storage).await,
        Command::Upload(args) => cmd_upload(&storage, args).await,
        Command::Ls => cmd_ls(&storage, format).await,
        Command::Stat(args) => cmd_stat(&storage, &args.name, format).await,
        Command::Rm(args) => cmd_rm(&storage, &args.name).await,
        Command::Presign(args) => cmd_presign(&storage, args).await,
        Command::Collections(args) => cmd_collections(storage, args, format).await,
        Command::Kv(args) => cmd_kv(&storage, args.action, format).await,
        Command::Load(args) => cmd_load(&config, &storage, args).await,
    }
}

async fn cmd_serve(config: RealmConfig, storage: Arc<StorageManager>) -> anyhow::Result<()> {
    let collections = CollectionLoader::new(storage.clone()).load_all().await?;
    for c in &collections {
        println!(
            "  {} {} ({} blueprints)",
            "collection".dimmed(),
            c.id.bold(),
            c.blueprints.len()
        );
    }
    println!(
        "{} Realm server on {} ({} storage, assets at {})",
        "✓".green().bold(),
        config.server.bind_addr.to_string().bold(),
        storage.backend_kind(),
        config.assets_url().blue()
    );
    RealmServer::new(config.server, storage).serve().await?;
    Ok(())
}

async fn cmd_upload(storage: &StorageManager, args: UploadArgs) -> anyhow::Result<()> {
    for path in &args.paths {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (name, url) = storage.upload_content(Bytes::from(data), &filename).await?;
        println!("{} {} → {}", "✓".green(), filename, name.to_string().yellow());
        println!("  {}", url.blue());
    }
    Ok(())
}

async fn cmd_ls(storage: &StorageManager, format: OutputFormat) -> anyhow::Result<()> {
    let names = storage.list_files().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
        OutputFormat::Text if names.is_empty() => println!("No assets."),
        OutputFormat::Text => names.iter().for_each(|n| println!("{n}")),
    }
    Ok(())
}

async fn cmd_stat(storage: &StorageManager, name: &str, format: OutputFormat) -> anyhow::Result<()> {
    let Some(stats) = storage.get_file_stats(name).await? else {
        bail!("{name}: not found");
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => {
            println!("{}", name.yellow().bold());
            println!("  Size:     {} bytes", stats.size);
            println!("  Created:  {}", stats.created_at);
            println!("  Modified: {}", stats.modified_at);
            println!("  URL:      {}", storage.get_public_url(name).blue());
        }
    }
    Ok(())
}

async fn cmd_rm(storage: &StorageManager, name: &str) -> anyhow::Result<()> {
    if storage.delete_file(name).await {
        println!("{} Deleted {}", "✓".green(), name.yellow());
        Ok(())
    } else {
        bail!("could not delete {name}")
    }
}

async fn cmd_presign(storage: &StorageManager, args: PresignArgs) -> anyhow::Result<()> {
    let expires = Duration::from_secs(args.expires);
    let url = if args.download {
        storage.get_presigned_download_url(&args.name, expires).await?
    } else {
        storage.get_presigned_upload_url(&args.name, expires).await?
    };
    println!("{url}");
    Ok(())
}

async fn cmd_collections(
    storage: Arc<StorageManager>,
    args: CollectionsArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let loader = CollectionLoader::new(storage);
    if let Some(CollectionsAction::Import { id, name, bundles }) = args.action {
        return import_collection(&loader, &id, name, &bundles).await;
    }
    let collections = loader.load_all().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&collections)?),
        OutputFormat::Text if collections.is_empty() => println!("No collections."),
        OutputFormat::Text => {
            for c in &collections {
                println!("{} {}", c.id.bold(), format!("({})", c.name).dimmed());
                for bp in &c.blueprints {
                    println!("  {} {}", "•".cyan(), bp.name);
                }
                let skipped = c.manifest.apps.len().saturating_sub(c.blueprints.len());
                if skipped > 0 {
                    println!("  {} {skipped} bundle(s) skipped", "!".yellow());
                }
            }
        }
    }
    Ok(())
}

async fn import_collection(
    loader: &CollectionLoader,
    id: &str,
    name: Option<String>,
    bundles: &[std::path::PathBuf],
) -> anyhow::Result<()> {
    let mut files = Vec::with_capacity(bundles.len());
    let mut apps = Vec::with_capacity(bundles.len());
    for path in bundles {
        let file = bundle_file_name(path)?;
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        apps.push(file.clone());
        files.push((file, Bytes::from(data)));
    }
    let manifest = Manifest {
        name: name.unwrap_or_default(),
        apps,
    };
    loader.publish(id, &manifest, files).await?;
    let collection = loader.load_collection(id).await?;
    println!(
        "{} Imported {} with {} of {} bundles usable",
        "✓".green().bold(),
        id.bold(),
        collection.blueprints.len(),
        manifest.apps.len()
    );
    Ok(())
}

fn bundle_file_name(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .with_context(|| format!("{} has no file name", path.display()))
}

async fn cmd_kv(storage: &StorageManager, action: KvAction, format: OutputFormat) -> anyhow::Result<()> {
    match action {
        KvAction::Get { key } => match storage.get(&key) {
            Lookup::Present(value) => match format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&value)?),
                OutputFormat::Text => println!("{}", serde_json::to_string_pretty(&value)?),
            },
            Lookup::Absent => bail!("{key}: not set"),
            Lookup::NotLoaded => bail!("key-value store not loaded"),
        },
        KvAction::Set { key, value } => {
            let value: serde_json::Value =
                serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
            storage.set(&key, &value)?;
            storage.force_persist().await?;
            println!("{} {} = {}", "✓".green(), key.bold(), value);
        }
        KvAction::Rm { key } => {
            if storage.remove(&key)?.is_none() {
                bail!("{key}: not set");
            }
            storage.force_persist().await?;
            println!("{} Removed {}", "✓".green(), key.bold());
        }
        KvAction::Keys => {
            let keys = storage.keys()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&keys)?),
                OutputFormat::Text => keys.iter().for_each(|k| println!("{k}")),
            }
        }
    }
    Ok(())
}

async fn cmd_load(config: &RealmConfig, storage: &StorageManager, args: LoadArgs) -> anyhow::Result<()> {
    let loader = if args.server {
        let source: Arc<dyn AssetSource> = match storage.local_backend() {
            Some(local) => Arc::new(FileSource::new(local.assets_dir())),
            None => Arc::new(HttpSource::new(config.assets_url())),
        };
        AssetLoader::server(source, Arc::new(RawParser))
    } else {
        AssetLoader::http_client(config.assets_url())
    };
    for reference in &args.references {
        loader.preload(args.asset_type, reference);
    }
    let report = loader.execute_preload().await;
    for reference in &args.references {
        if loader.has(args.asset_type, reference) {
            println!("  {} {}", "✓".green(), reference);
        }
    }
    for (key, err) in &report.failed {
        println!("  {} {} ({})", "✗".red(), key.reference, err);
    }
    println!(
        "{} of {} {} assets loaded",
        report.loaded,
        report.total,
        args.asset_type
    );
    if !report.all_loaded() {
        bail!("{} asset(s) failed to load", report.failed.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn bundle_names_come_from_the_path() {
        assert_eq!(bundle_file_name(&PathBuf::from("out/chair.hyp")).unwrap(), "chair.hyp");
        assert!(bundle_file_name(&PathBuf::from("/")).is_err());
    }

    #[tokio::test]
    async fn kv_set_stores_json_or_string() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = StorageManager::init(&realm_store::StorageConfig::local(dir.path()))
            .await
            .unwrap();
        let set = |key: &str, value: &str| KvAction::Set {
            key: key.to_string(),
            value: value.to_string(),
        };
        cmd_kv(&storage, set("count", "3"), OutputFormat::Text).await.unwrap();
        cmd_kv(&storage, set("title", "My World"), OutputFormat::Text).await.unwrap();
        assert_eq!(storage.get("count"), Lookup::Present(serde_json::json!(3)));
        assert_eq!(storage.get("title"), Lookup::Present(serde_json::json!("My World")));
        assert!(cmd_kv(&storage, KvAction::Rm { key: "nope".into() }, OutputFormat::Text)
            .await
            .is_err());
    }
}
