mod commands;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tasklock::config::{config_path, RawConfig};
use tasklock::tasks::TaskPriority;

#[derive(Parser)]
#[command(name = "tasklock", about = "Encrypted local to-do list")]
struct Cli {
    /// Configuration file. Defaults to $TASKLOCK_CONFIG, then ./tasklock.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register the local account, replacing any previous one
    Register {
        username: String,
        password: String,
        display_name: String,
    },

    /// Sign in with the registered credentials
    Login { username: String, password: String },

    /// Sign out
    Logout,

    /// Show the registered account and sign-in state
    Whoami,

    /// Add a task for the signed-in user
    Add {
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long, default_value_t = TaskPriority::Medium)]
        priority: TaskPriority,

        #[arg(long, default_value = "")]
        category: String,

        /// Due date, RFC 3339 or YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,

        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// List the signed-in user's tasks, newest first
    List {
        /// Hide completed tasks
        #[arg(long)]
        open: bool,
    },

    /// Show one task in full
    Show { id: String },

    /// Change fields of an existing task
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        priority: Option<TaskPriority>,

        #[arg(long)]
        category: Option<String>,

        /// Due date, RFC 3339 or YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,

        /// Completion percentage, 0-100
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        progress: Option<u8>,
    },

    /// Mark a task done, or not done
    Toggle { id: String },

    /// Delete a task
    Remove { id: String },

    /// Wipe the credential store
    Clear {
        /// Skip the safety check
        #[arg(long, short)]
        yes: bool,
    },

    /// Encrypt a text field with the signed-in user's field key
    EncryptField { text: String },

    /// Decrypt a text field with the signed-in user's field key
    DecryptField {
        text: String,

        /// Print the input unchanged if it cannot be decrypted
        #[arg(long)]
        lenient: bool,
    },

    /// Print a password digest without touching any store
    HashPassword {
        plaintext: String,

        /// Unsalted SHA-256 hex instead of Argon2id
        #[arg(long)]
        legacy: bool,
    },
}

/// RUST_LOG wins, then the config's level, then `info`.
fn init_tracing(configured: Option<&str>) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(configured.unwrap_or("info"))),
        )
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let Cli { config, command } = cli;
    if let Commands::HashPassword { plaintext, legacy } = &command {
        init_tracing(None);
        return commands::fields::run_hash_password(plaintext, *legacy);
    }

    let raw = RawConfig::read(config_path(config))?;
    init_tracing(raw.debug_level.as_deref());
    let mut ctx = commands::Context::open(raw.into_runtime()?)?;

    match command {
        Commands::Register {
            username,
            password,
            display_name,
        } => commands::account::run_register(&mut ctx, &username, &password, &display_name),
        Commands::Login { username, password } => commands::account::run_login(&mut ctx, &username, &password),
        Commands::Logout => commands::account::run_logout(&mut ctx),
        Commands::Whoami => commands::account::run_whoami(&ctx),
        Commands::Clear { yes } => commands::account::run_clear(&mut ctx, yes),
        Commands::Add {
            title,
            description,
            priority,
            category,
            due,
            lat,
            lon,
        } => {
            let draft = commands::tasks::TaskDraft {
                title,
                description,
                priority,
                category,
                due,
                location: lat.zip(lon),
            };
            commands::tasks::run_add(&ctx, draft)
        }
        Commands::List { open } => commands::tasks::run_list(&ctx, open),
        Commands::Show { id } => commands::tasks::run_show(&ctx, &id),
        Commands::Edit {
            id,
            title,
            description,
            priority,
            category,
            due,
            progress,
        } => {
            let changes = commands::tasks::TaskChanges {
                title,
                description,
                priority,
                category,
                due,
                progress,
            };
            commands::tasks::run_edit(&ctx, &id, changes)
        }
        Commands::Toggle { id } => commands::tasks::run_toggle(&ctx, &id),
        Commands::Remove { id } => commands::tasks::run_remove(&ctx, &id),
        Commands::EncryptField { text } => commands::fields::run_encrypt_field(&ctx, &text),
        Commands::DecryptField { text, lenient } => commands::fields::run_decrypt_field(&ctx, &text, lenient),
        Commands::HashPassword { plaintext, legacy } => commands::fields::run_hash_password(&plaintext, legacy),
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
