//! later-draft - Manage scheduled drafts
//!
//! Unix-style tool for authoring drafts and walking the OAuth consent flow
//! for the platforms they publish to.

use clap::{Parser, Subcommand};
use liblatercast::credentials::CredentialManager;
use liblatercast::scheduling::parse_schedule;
use liblatercast::service::{DraftService, MediaUpload};
use liblatercast::types::VideoMimeType;
use liblatercast::{
    Config, Database, Draft, FsMediaStore, LatercastError, NewDraft, OauthClient, Platform,
    PrivacyStatus, Result,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "later-draft")]
#[command(version)]
#[command(about = "Manage scheduled drafts")]
#[command(long_about = "\
later-draft - Manage scheduled drafts

DESCRIPTION:
    later-draft is a Unix-style tool for authoring scheduled drafts in the
    Latercast store. Drafts created here are picked up and published by the
    later-send daemon once their scheduled time passes.

COMMANDS:
    create      Create a draft with a media file and a publish time
    list        List an owner's drafts
    show        Show one draft
    update      Edit a draft that has not been claimed yet
    delete      Delete a draft and its media object
    consent     Print the OAuth consent URL for a platform
    grant       Finish the consent flow with the returned code

USAGE EXAMPLES:
    # Schedule a video for tomorrow afternoon
    later-draft create --owner u1 --media clip.mp4 --title \"Launch\" \\
        --description \"Launch teaser\" --keywords launch,teaser \\
        --category 22 --schedule \"tomorrow 3pm\"

    # List drafts in JSON
    later-draft list --owner u1 --format json

    # Walk the OAuth consent flow
    later-draft consent --owner u1
    later-draft grant --owner u1 --code 4/0Af... --verifier dBjftJeZ...

CONFIGURATION:
    Configuration file: ~/.config/latercast/config.toml
    Database location: ~/.local/share/latercast/drafts.db

    Override with environment variables:
        LATERCAST_CONFIG    - Path to config file

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Credential or configuration error
    3 - Invalid input (bad time format, missing fields, etc.)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a draft
    Create {
        /// Owner uid the draft belongs to
        #[arg(long)]
        owner: String,

        /// Path to the media file
        #[arg(long)]
        media: PathBuf,

        #[arg(long)]
        title: String,

        #[arg(long)]
        description: String,

        /// Comma-separated keywords
        #[arg(long)]
        keywords: String,

        /// Platform category id
        #[arg(long)]
        category: String,

        /// public, unlisted, or private
        #[arg(long, default_value = "private")]
        privacy: String,

        /// Publish time (e.g., "2030-06-01T12:00:00Z", "2h", "tomorrow 3pm")
        #[arg(long)]
        schedule: String,

        /// Target platform
        #[arg(long, default_value = "youtube")]
        platform: String,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List an owner's drafts
    List {
        #[arg(long)]
        owner: String,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show one draft
    Show {
        #[arg(long)]
        owner: String,

        draft_id: String,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Edit a draft that has not been claimed yet
    Update {
        #[arg(long)]
        owner: String,

        draft_id: String,

        /// Replacement media file (optional)
        #[arg(long)]
        media: Option<PathBuf>,

        #[arg(long)]
        title: String,

        #[arg(long)]
        description: String,

        /// Comma-separated keywords
        #[arg(long)]
        keywords: String,

        #[arg(long)]
        category: String,

        /// public, unlisted, or private
        #[arg(long, default_value = "private")]
        privacy: String,

        /// Publish time
        #[arg(long)]
        schedule: String,

        /// Target platform
        #[arg(long, default_value = "youtube")]
        platform: String,
    },

    /// Delete a draft and its media object
    Delete {
        #[arg(long)]
        owner: String,

        draft_id: String,
    },

    /// Print the OAuth consent URL for a platform
    Consent {
        /// Target platform
        #[arg(long, default_value = "youtube")]
        platform: String,
    },

    /// Finish the consent flow with the code from the redirect
    Grant {
        #[arg(long)]
        owner: String,

        /// Target platform
        #[arg(long, default_value = "youtube")]
        platform: String,

        /// Authorization code from the redirect
        #[arg(long)]
        code: String,

        /// PKCE verifier printed by `consent`
        #[arg(long)]
        verifier: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn init_logging(verbose: bool) {
    use liblatercast::logging::{LogFormat, LoggingConfig};

    let level = if verbose { "debug" } else { "error" };
    LoggingConfig::new(LogFormat::Text, level.to_string(), verbose).init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;
    let media_store = Arc::new(FsMediaStore::new(&config.media.root, &config.media.base_url));
    let service = DraftService::new(db.clone(), media_store);

    match cli.command {
        Commands::Create {
            owner,
            media,
            title,
            description,
            keywords,
            category,
            privacy,
            schedule,
            platform,
            format,
        } => {
            let new = build_fields(title, description, keywords, category, privacy, schedule, platform)?;
            let upload = read_media(&media).await?;
            let draft = service.create(&owner, new, upload).await?;
            print_draft(&draft, &format)?;
        }

        Commands::List { owner, format } => {
            let drafts = service.list(&owner).await?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&drafts).unwrap_or_default());
            } else if drafts.is_empty() {
                println!("No drafts found");
            } else {
                for draft in drafts {
                    println!(
                        "{}  {:<9}  {}  {}",
                        draft.draft_id,
                        draft.status.to_string(),
                        draft.scheduled_time.to_rfc3339(),
                        draft.title
                    );
                }
            }
        }

        Commands::Show {
            owner,
            draft_id,
            format,
        } => {
            let draft = service.get(&owner, &draft_id).await?.ok_or_else(|| {
                LatercastError::InvalidInput(format!("Draft not found: {}", draft_id))
            })?;
            print_draft(&draft, &format)?;
        }

        Commands::Update {
            owner,
            draft_id,
            media,
            title,
            description,
            keywords,
            category,
            privacy,
            schedule,
            platform,
        } => {
            let fields = build_fields(title, description, keywords, category, privacy, schedule, platform)?;
            let upload = match media {
                Some(path) => Some(read_media(&path).await?),
                None => None,
            };
            let draft = service.update(&owner, &draft_id, fields, upload).await?;
            print_draft(&draft, "text")?;
        }

        Commands::Delete { owner, draft_id } => {
            service.delete(&owner, &draft_id).await?;
            println!("Deleted draft {}", draft_id);
        }

        Commands::Consent { platform } => {
            parse_platform(&platform)?;
            let oauth = OauthClient::new(config.oauth.clone());
            let request = oauth.authorize_url();
            println!("Visit this URL to grant access:\n{}\n", request.url);
            println!("state:    {}", request.state);
            println!("verifier: {}", request.code_verifier);
            println!("\nThen run: later-draft grant --owner <OWNER> --code <CODE> --verifier {}", request.code_verifier);
        }

        Commands::Grant {
            owner,
            platform,
            code,
            verifier,
        } => {
            let platform = parse_platform(&platform)?;
            let oauth = Arc::new(OauthClient::new(config.oauth.clone()));
            let credentials = CredentialManager::new(db, oauth);
            let credential = credentials
                .complete_consent(&owner, platform, &code, &verifier)
                .await?;
            println!(
                "Credential stored for {} on {} (expires {})",
                owner,
                platform,
                credential.expires_at.to_rfc3339()
            );
        }
    }

    Ok(())
}

fn build_fields(
    title: String,
    description: String,
    keywords: String,
    category: String,
    privacy: String,
    schedule: String,
    platform: String,
) -> Result<NewDraft> {
    let privacy_status = PrivacyStatus::parse(&privacy).ok_or_else(|| {
        LatercastError::InvalidInput(format!(
            "Invalid privacy status: '{}'. Valid options: public, unlisted, private",
            privacy
        ))
    })?;

    let platform = parse_platform(&platform)?;
    let scheduled_time = parse_schedule(&schedule)?;

    let keywords: Vec<String> = keywords
        .split(',')
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();

    Ok(NewDraft {
        title,
        description,
        keywords,
        category,
        privacy_status,
        platform,
        scheduled_time,
    })
}

fn parse_platform(s: &str) -> Result<Platform> {
    Platform::parse(s)
        .ok_or_else(|| LatercastError::InvalidInput(format!("Unknown platform: {}", s)))
}

async fn read_media(path: &Path) -> Result<MediaUpload> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        LatercastError::InvalidInput(format!("Could not read media file {}: {}", path.display(), e))
    })?;

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            LatercastError::InvalidInput(format!("Invalid media path: {}", path.display()))
        })?
        .to_string();

    let content_type = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(VideoMimeType::from_extension)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok(MediaUpload {
        filename,
        content_type,
        bytes,
    })
}

fn print_draft(draft: &Draft, format: &str) -> Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(draft).unwrap_or_default());
    } else {
        println!("id:         {}", draft.draft_id);
        println!("owner:      {}", draft.owner_uid);
        println!("title:      {}", draft.title);
        println!("status:     {}", draft.status);
        println!("platform:   {}", draft.platform);
        println!("privacy:    {}", draft.privacy_status);
        println!("scheduled:  {}", draft.scheduled_time.to_rfc3339());
        println!("media:      {}", draft.media_url);
    }
    Ok(())
}
