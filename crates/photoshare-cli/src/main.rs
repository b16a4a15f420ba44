mod config;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use photoshare_client::HttpGateway;
use photoshare_core::gallery::Thumbnail;
use photoshare_core::{
    Controller, Credentials, FileStore, LocalImage, PhotoId, Registration, WorkflowError,
};

use crate::config::Config;

type App = Controller<HttpGateway, FileStore>;

#[derive(Parser)]
#[command(name = "photoshare", about = "Event photo sharing with face matching")]
struct Cli {
    /// Override the service URL for this invocation
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Must repeat the password
        #[arg(long)]
        confirm: String,
    },
    /// Sign in with an existing account
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the saved session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Enroll your face from 3 to 5 photos of yourself
    Enroll {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Upload event photos and match faces in them
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Event name attached to every photo
        #[arg(short, long)]
        event: Option<String>,
    },
    /// Run face matching over photos that are still pending
    Process,
    /// List photos you appear in
    Photos,
    /// Download a photo by ID
    Download {
        id: i64,
        /// Target directory (default: configured download dir)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Show service-wide statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    tracing::debug!(api_url = %config.api_url, data_dir = %config.data_dir.display(), "config loaded");

    let gateway = HttpGateway::with_timeout(&config.api_url, config.timeout())
        .context("failed to build HTTP client")?;
    let app = Controller::new(gateway, FileStore::new(&config.data_dir));

    match cli.command {
        Commands::Register {
            name,
            email,
            password,
            confirm,
        } => {
            let registration = Registration::new(&name, &email, &password, &confirm)?;
            let identity = app.sign_up(registration).await?;
            println!("Registered and signed in as {} (id {})", identity.display_name, identity.subject_id);
            println!("Next: photoshare enroll <3-5 photos of your face>");
        }
        Commands::Login { email, password } => {
            let identity = app.sign_in(Credentials::new(email, password)).await?;
            println!("Signed in as {} (id {})", identity.display_name, identity.subject_id);
            if !identity.has_enrolled_face {
                println!("No face enrolled yet: photoshare enroll <3-5 photos>");
            }
        }
        Commands::Logout => {
            app.sign_out()?;
            println!("Signed out");
        }
        Commands::Whoami => match app.identity() {
            Some(identity) => {
                println!("{} <{}>", identity.display_name, identity.contact_handle);
                println!("  id:            {}", identity.subject_id);
                println!("  face enrolled: {}", if identity.has_enrolled_face { "yes" } else { "no" });
            }
            None => println!("Not signed in"),
        },
        Commands::Enroll { files } => {
            app.select_samples(read_images(&files).await?)?;
            let outcome = app.enroll().await?;
            println!("Enrolled {} face sample(s)", outcome.enrolled_count);
        }
        Commands::Upload { files, event } => upload(&app, &files, event).await?,
        Commands::Process => {
            let outcome = app.retry_processing().await?;
            println!("Processed {} photo(s)", outcome.processed_count);
        }
        Commands::Photos => {
            let photos = app.my_photos().await?;
            if photos.is_empty() {
                println!("No photos found for you yet");
                return Ok(());
            }
            let items = app.gallery_items(&photos).await;
            println!("{:<8} {:<20} {:<10} EVENT", "ID", "UPLOADED", "THUMBNAIL");
            for item in items {
                let uploaded = item
                    .photo
                    .uploaded_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                let thumbnail = match &item.thumbnail {
                    Thumbnail::Image(image) => image.extension(),
                    Thumbnail::Placeholder => "-",
                };
                println!(
                    "{:<8} {:<20} {:<10} {}",
                    item.photo.id,
                    uploaded,
                    thumbnail,
                    item.photo.event_label.as_deref().unwrap_or("")
                );
            }
        }
        Commands::Download { id, out } => {
            let dir = out.unwrap_or(config.download_dir);
            let path = app.download(PhotoId(id), &dir).await?;
            println!("Saved {}", path.display());
        }
        Commands::Stats => {
            let stats = app.stats().await?;
            println!("Users:            {}", stats.total_users);
            println!("Photos:           {}", stats.total_photos);
            println!("  processed:      {}", stats.processed_photos);
            println!("  pending:        {}", stats.pending_photos);
        }
    }

    Ok(())
}

async fn upload(app: &App, files: &[PathBuf], event: Option<String>) -> Result<()> {
    let images = read_images(files).await?;
    match app.upload_and_process(images, event).await {
        Ok(outcome) => {
            println!(
                "Uploaded {} photo(s), processed {}",
                outcome.uploaded.len(),
                outcome.processed_count
            );
            Ok(())
        }
        Err(WorkflowError::ProcessingIncomplete { uploaded, source }) => {
            let ids: Vec<String> = uploaded.iter().map(ToString::to_string).collect();
            eprintln!("Uploaded {} photo(s) [{}] but processing failed: {source}", uploaded.len(), ids.join(", "));
            eprintln!("The photos are stored. Run `photoshare process` to match faces later.");
            bail!("processing incomplete")
        }
        Err(e) => Err(e.into()),
    }
}

async fn read_images(paths: &[PathBuf]) -> Result<Vec<LocalImage>> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        let image = LocalImage::open(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        images.push(image);
    }
    Ok(images)
}
