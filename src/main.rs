//! CLI entry point for gitpress

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gitpress::commands;
use gitpress::config::SiteConfig;

#[derive(Parser)]
#[command(name = "gitpress")]
#[command(version)]
#[command(about = "A blog and course server that reads its content from a GitHub repository", long_about = None)]
struct Cli {
    /// Configuration file (environment variables override it)
    #[arg(short, long, global = true, default_value = "gitpress.yml")]
    config: PathBuf,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server
    #[command(alias = "s")]
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// IP address to bind to
        #[arg(short, long)]
        ip: Option<String>,

        /// Serve a local checkout of the content repository instead of GitHub
        #[arg(short, long)]
        local: Option<PathBuf>,
    },

    /// List site content
    List {
        /// Type of content to list (post, tag, course)
        #[arg(default_value = "post")]
        r#type: String,

        /// Read from a local checkout instead of GitHub
        #[arg(short, long)]
        local: Option<PathBuf>,
    },

    /// Create a new post
    New {
        /// Title of the new post
        title: String,

        /// Commit the post to the content repository instead of writing a file
        #[arg(long)]
        publish: bool,

        /// Directory for the new file
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Publish into a local checkout instead of GitHub
        #[arg(short, long)]
        local: Option<PathBuf>,
    },

    /// Show the GitHub API rate limit
    RateLimit,

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "gitpress=debug,info"
    } else {
        "gitpress=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SiteConfig::resolve(&cli.config)?;

    match cli.command {
        Commands::Serve { port, ip, local } => {
            let ip = ip.unwrap_or_else(|| config.server.ip.clone());
            let port = port.unwrap_or(config.server.port);
            let site = commands::open_site(config, local.as_deref())?;

            tracing::info!("Starting server at http://{}:{}", ip, port);
            gitpress::server::start(site, &ip, port).await?;
        }

        Commands::List { r#type, local } => {
            let site = commands::open_site(config, local.as_deref())?;
            commands::list::run(&site, &r#type).await?;
        }

        Commands::New {
            title,
            publish,
            out,
            local,
        } => {
            if publish {
                let site = commands::open_site(config, local.as_deref())?;
                tracing::info!("Publishing new post: {}", title);
                commands::new::publish(&site, &title).await?;
            } else {
                tracing::info!("Creating new post: {}", title);
                let path = commands::new::create_post(&out, &title, &config.default_author)?;
                println!("Created: {:?}", path);
            }
        }

        Commands::RateLimit => {
            let site = commands::open_site(config, None)?;
            commands::rate_limit::run(&site).await?;
        }

        Commands::Version => {
            println!("gitpress version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
