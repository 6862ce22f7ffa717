//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use crate::config::Config;
use crate::manager::FeedSyncManager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "feedsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Path to the TOML configuration file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "migrate", about = "Create missing tables and indexes")]
    Migrate,

    #[command(name = "status", about = "Check store connectivity")]
    Status(StatusArgs),

    #[command(name = "user", about = "User operations")]
    User(UserArgs),

    #[command(name = "publish", about = "Publish a video")]
    Publish(PublishArgs),

    #[command(name = "feed", about = "Read one page of the global feed")]
    Feed(FeedArgs),

    #[command(name = "videos", about = "List the videos published by a user")]
    Videos(VideosArgs),

    #[command(name = "comment", about = "Comment operations")]
    Comment(CommentArgs),

    #[command(name = "counts", about = "Get aggregate counts for videos")]
    Counts(CountsArgs),
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    #[arg(short, long, help = "Also print collected metrics")]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum UserSubcommand {
    #[command(about = "Register a user")]
    Create {
        #[arg(help = "Display name")]
        name: String,
    },
    #[command(about = "Show a user profile")]
    Show {
        user_id: u64,
        #[arg(long, help = "Viewer user id")]
        viewer: Option<u64>,
    },
}

#[derive(Parser, Debug)]
pub struct PublishArgs {
    #[arg(long, help = "Author user id")]
    pub user: u64,
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub play_url: String,
    #[arg(long)]
    pub cover_url: String,
}

#[derive(Parser, Debug)]
pub struct FeedArgs {
    #[arg(long, help = "Only videos created before this time (epoch millis)")]
    pub latest_time: Option<i64>,
    #[arg(long, help = "Viewer user id")]
    pub viewer: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct VideosArgs {
    pub user_id: u64,
    #[arg(long, help = "Viewer user id")]
    pub viewer: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct CommentArgs {
    #[command(subcommand)]
    pub command: CommentSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CommentSubcommand {
    #[command(about = "Comment on a video")]
    Add {
        #[arg(long)]
        video: u64,
        #[arg(long)]
        user: u64,
        #[arg(long)]
        text: String,
    },
    #[command(about = "Delete an own comment")]
    Delete {
        #[arg(long)]
        video: u64,
        #[arg(long)]
        user: u64,
        #[arg(long)]
        comment: u64,
    },
    #[command(about = "List the comments of a video")]
    List {
        video: u64,
        #[arg(long, help = "Viewer user id")]
        viewer: Option<u64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum CountArg {
    Comment,
    Favorite,
}

#[derive(Parser, Debug)]
pub struct CountsArgs {
    #[arg(long, value_enum)]
    pub kind: CountArg,
    #[arg(required = true, help = "Video ids")]
    pub video_ids: Vec<u64>,
}

mod read;
mod status;
mod write;

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::telemetry::init_tracing("feedsync", "warn");
    let config = load_config(cli.config.as_ref())?;

    if let Commands::Migrate = cli.command {
        return status::migrate(&config).await;
    }

    let manager = FeedSyncManager::connect(config)
        .await
        .context("Failed to connect stores")?;

    match &cli.command {
        Commands::Migrate => Ok(()),
        Commands::Status(args) => status::execute(&manager, args).await,
        Commands::User(args) => match &args.command {
            UserSubcommand::Create { name } => write::create_user(&manager, name).await,
            UserSubcommand::Show { user_id, viewer } => {
                read::profile(&manager, *user_id, *viewer).await
            }
        },
        Commands::Publish(args) => write::publish(&manager, args).await,
        Commands::Feed(args) => read::feed(&manager, args).await,
        Commands::Videos(args) => read::videos(&manager, args).await,
        Commands::Comment(args) => match &args.command {
            CommentSubcommand::Add { video, user, text } => {
                write::add_comment(&manager, *video, *user, text).await
            }
            CommentSubcommand::Delete {
                video,
                user,
                comment,
            } => write::delete_comment(&manager, *user, *video, *comment).await,
            CommentSubcommand::List { video, viewer } => {
                read::comments(&manager, *video, *viewer).await
            }
        },
        Commands::Counts(args) => read::counts(&manager, args).await,
    }
}
