//! CLI entry point for richdoc-rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use richdoc_rs::content::PostKind;

#[derive(Parser)]
#[command(name = "richdoc-rs")]
#[command(version = "0.1.0")]
#[command(about = "Rich post documents for a small real-estate blog", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new blog site
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        folder: PathBuf,
    },

    /// Create a new post
    New {
        /// Title of the new post
        title: String,

        /// Short summary shown in listings
        #[arg(short, long)]
        excerpt: String,

        /// Category (defaults to the configured one)
        #[arg(short, long)]
        category: Option<String>,

        /// Post type (article, video, gallery)
        #[arg(short = 't', long = "type", default_value = "article")]
        kind: PostKind,
    },

    /// Render posts to static HTML pages
    #[command(alias = "r")]
    Render {
        /// Render only this post
        id: Option<String>,
    },

    /// Rewrite stored post bodies in the current format
    Normalize {
        /// Only report what would change
        #[arg(long)]
        dry_run: bool,
    },

    /// Report stored post bodies that cannot be read
    Check,

    /// Upload an image or video and append it to a post
    Upload {
        /// Post id
        id: String,

        /// File to upload
        file: PathBuf,
    },

    /// Start the blog server
    #[command(alias = "s")]
    Server {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Open browser automatically
        #[arg(short, long)]
        open: bool,
    },

    /// Clean the public folder
    Clean,

    /// List site information
    List {
        /// Type of content to list (post, category)
        #[arg(default_value = "post")]
        r#type: String,
    },

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "richdoc_rs=debug,info"
    } else {
        "richdoc_rs=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Init { folder } => {
            let target_dir = if folder.is_absolute() {
                folder
            } else {
                base_dir.join(folder)
            };
            tracing::info!("Initializing blog site in {:?}", target_dir);
            richdoc_rs::commands::init::init_site(&target_dir)?;
            println!("Initialized blog site in {:?}", target_dir);
        }

        Commands::New {
            title,
            excerpt,
            category,
            kind,
        } => {
            let site = richdoc_rs::Site::new(&base_dir)?;
            tracing::info!("Creating new {} with title: {}", kind.as_str(), title);
            richdoc_rs::commands::new::create_post(
                &site,
                &title,
                &excerpt,
                category.as_deref(),
                kind,
            )?;
        }

        Commands::Render { id } => {
            let site = richdoc_rs::Site::new(&base_dir)?;
            tracing::info!("Rendering posts...");
            let count = richdoc_rs::commands::render::run(&site, id.as_deref())?;
            println!("Rendered {} page(s)", count);
        }

        Commands::Normalize { dry_run } => {
            let site = richdoc_rs::Site::new(&base_dir)?;
            let count = richdoc_rs::commands::normalize::run(&site, dry_run)?;
            println!("{} post(s) normalized", count);
        }

        Commands::Check => {
            let site = richdoc_rs::Site::new(&base_dir)?;
            let failures = richdoc_rs::commands::check::run(&site)?;
            if failures > 0 {
                anyhow::bail!("{} post(s) have unreadable bodies", failures);
            }
        }

        Commands::Upload { id, file } => {
            let site = richdoc_rs::Site::new(&base_dir)?;
            richdoc_rs::commands::upload::run(&site, &id, &file).await?;
        }

        Commands::Server { port, ip, open } => {
            let site = richdoc_rs::Site::new(&base_dir)?;

            // Render first so the public folder matches the store
            tracing::info!("Rendering posts...");
            site.render()?;

            tracing::info!("Starting server at http://{}:{}", ip, port);
            richdoc_rs::server::start(&site, &ip, port, open).await?;
        }

        Commands::Clean => {
            let site = richdoc_rs::Site::new(&base_dir)?;
            tracing::info!("Cleaning public folder...");
            site.clean()?;
            println!("Cleaned successfully!");
        }

        Commands::List { r#type } => {
            let site = richdoc_rs::Site::new(&base_dir)?;
            richdoc_rs::commands::list::run(&site, &r#type)?;
        }

        Commands::Version => {
            println!("richdoc-rs version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
