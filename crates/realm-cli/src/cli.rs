use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "realm",
    about = "Realm: content-addressed asset storage for persistent worlds",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to realm.toml. Defaults to a local world in ./world.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the asset server
    Serve(ServeArgs),
    /// Store files under their content hash
    Upload(UploadArgs),
    /// List hash-named assets
    Ls,
    /// Show size and timestamps of an asset
    Stat(NameArgs),
    /// Delete an asset
    Rm(NameArgs),
    /// Print a presigned URL for an asset (object store only)
    Presign(PresignArgs),
    /// List or import collections
    Collections(CollectionsArgs),
    /// Read or write key-value state
    Kv(KvArgs),
    /// Load assets through the asset loader and report the outcome
    Load(LoadArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Override server.bind_addr
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Args)]
pub struct UploadArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Args)]
pub struct NameArgs {
    pub name: String,
}

#[derive(Args)]
pub struct PresignArgs {
    pub name: String,
    /// Presign a download instead of an upload
    #[arg(long)]
    pub download: bool,
    /// Lifetime in seconds
    #[arg(long, default_value = "3600")]
    pub expires: u64,
}

#[derive(Args)]
pub struct CollectionsArgs {
    #[command(subcommand)]
    pub action: Option<CollectionsAction>,
}

#[derive(Subcommand)]
pub enum CollectionsAction {
    /// Write a collection from bundle files, in the given order
    Import {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(required = true)]
        bundles: Vec<PathBuf>,
    },
}

#[derive(Args)]
pub struct KvArgs {
    #[command(subcommand)]
    pub action: KvAction,
}

#[derive(Subcommand)]
pub enum KvAction {
    Get { key: String },
    /// Value is parsed as JSON, or stored as a string if it is not JSON
    Set { key: String, value: String },
    Rm { key: String },
    Keys,
}

#[derive(Args)]
pub struct LoadArgs {
    /// Asset type: model, emote, avatar, texture, image, hdr, video, audio, script
    #[arg(short = 't', long = "type")]
    pub asset_type: realm_types::AssetType,
    #[arg(required = true)]
    pub references: Vec<String>,
    /// Use the server loader (placeholders, server-side types only)
    #[arg(long)]
    pub server: bool,
}
