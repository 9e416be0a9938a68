//! # Command Line
//!
//! `init`, `serve`, `seed`, `create-user` and `status`. Every command opens
//! the redb file named by `--database` and closes it before returning.

use crate::api::{self, ServerConfig};
use crate::error::{AppError, AppResult};
use clap::{Args, Parser, Subcommand};
use menagerie_core::primitives::{DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE, DEFAULT_SESSION_TTL_SECS};
use menagerie_core::validation::{UserForm, validate_new_user};
use menagerie_core::{Role, SeedPlan, SeedReport, StoreStats, Timestamp, User, ZooStore, seed};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;

// =============================================================================
// ARGUMENTS
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "menagerie", version, about = "Zoo management server")]
pub struct Cli {
    /// Path to the redb database file.
    #[arg(long, global = true, env = "MENAGERIE_DB", default_value = "menagerie.redb")]
    pub database: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create an empty database.
    Init {
        /// Replace an existing database file.
        #[arg(long)]
        force: bool,
    },
    /// Run the web server.
    Serve(ServeArgs),
    /// Fill the database with demo data.
    Seed(SeedArgs),
    /// Add an account (any role, including SUPER_ADMIN).
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "STAFF")]
        role: Role,
    },
    /// Print record counts.
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, env = "MENAGERIE_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,
    /// Session lifetime in seconds.
    #[arg(
        long,
        env = "MENAGERIE_SESSION_TTL",
        default_value_t = DEFAULT_SESSION_TTL_SECS,
        value_parser = clap::value_parser!(i64).range(1..)
    )]
    pub session_ttl: i64,
    /// Login attempts allowed per email per minute.
    #[arg(long, env = "MENAGERIE_LOGIN_ATTEMPTS", default_value_t = DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE)]
    pub login_attempts: u32,
}

#[derive(Debug, Args)]
pub struct SeedArgs {
    /// Random accounts to add besides the fixed ones.
    #[arg(long, default_value_t = 10)]
    pub users: usize,
    #[arg(long, default_value_t = 30)]
    pub animals: usize,
    #[arg(long, default_value_t = 50)]
    pub treatments: usize,
    #[arg(long, default_value_t = 120)]
    pub tasks: usize,
    /// Fixed RNG seed for reproducible data.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Wipe existing records first.
    #[arg(long)]
    pub reset: bool,
}

impl SeedArgs {
    fn plan(&self) -> SeedPlan {
        SeedPlan {
            users: self.users,
            animals: self.animals,
            treatments: self.treatments,
            tasks: self.tasks,
        }
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Run the parsed command.
pub async fn run(cli: Cli) -> AppResult<()> {
    match cli.command {
        Commands::Init { force } => cmd_init(&cli.database, force),
        Commands::Serve(args) => cmd_serve(&cli.database, &args).await,
        Commands::Seed(args) => {
            let report = cmd_seed(&cli.database, &args.plan(), args.seed, args.reset)?;
            println!(
                "Seeded {} users, {} habitats, {} animals, {} treatments, {} tasks ({} skipped)",
                report.users,
                report.habitats,
                report.animals,
                report.treatments,
                report.tasks,
                report.skipped
            );
            Ok(())
        }
        Commands::CreateUser {
            name,
            email,
            password,
            role,
        } => {
            let user = cmd_create_user(&cli.database, &name, &email, &password, role)?;
            println!("Created {} <{}> as {}", user.name, user.email, user.role);
            Ok(())
        }
        Commands::Status { json } => cmd_status(&cli.database, json).map(|_| ()),
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Create an empty database, refusing to touch an existing file unless `force`.
pub fn cmd_init(db_path: &Path, force: bool) -> AppResult<()> {
    if db_path.exists() {
        if !force {
            return Err(AppError::Usage(format!(
                "database already exists at {} (use --force to replace it)",
                db_path.display()
            )));
        }
        std::fs::remove_file(db_path)?;
    }
    let store = ZooStore::open(db_path)?;
    drop(store);
    info!(path = %db_path.display(), "database initialized");
    println!("Initialized database at {}", db_path.display());
    Ok(())
}

pub async fn cmd_serve(db_path: &Path, args: &ServeArgs) -> AppResult<()> {
    let store = ZooStore::open(db_path)?;
    let config = ServerConfig {
        bind: args.bind,
        session_ttl_secs: args.session_ttl,
        login_attempts_per_minute: args.login_attempts,
    };
    api::run_server(store, config).await
}

/// Seed demo data. A database that already holds records is only seeded
/// with `reset`, which wipes it first.
pub fn cmd_seed(
    db_path: &Path,
    plan: &SeedPlan,
    rng_seed: Option<u64>,
    reset: bool,
) -> AppResult<SeedReport> {
    let store = ZooStore::open(db_path)?;
    if !store.stats()?.is_empty() {
        if !reset {
            return Err(AppError::Usage(
                "database is not empty (use --reset to wipe it before seeding)".to_string(),
            ));
        }
        store.clear_all()?;
        info!(path = %db_path.display(), "database cleared before seeding");
    }

    let mut rng = match rng_seed {
        Some(value) => StdRng::seed_from_u64(value),
        None => StdRng::from_entropy(),
    };
    let report = seed::run(&store, plan, &mut rng, Timestamp::now())?;
    info!(
        users = report.users,
        habitats = report.habitats,
        animals = report.animals,
        treatments = report.treatments,
        tasks = report.tasks,
        skipped = report.skipped,
        "seed complete"
    );
    Ok(report)
}

/// Add an account. Unlike the web form this accepts every role.
pub fn cmd_create_user(
    db_path: &Path,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> AppResult<User> {
    let form = UserForm {
        name: name.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        // Field rules only; the requested role is applied below.
        role: Role::Staff.to_string(),
    };
    let mut input = validate_new_user(&form).map_err(|errors| {
        let details: Vec<String> = errors
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(", ")))
            .collect();
        AppError::Usage(details.join("; "))
    })?;
    input.role = role;

    let store = ZooStore::open(db_path)?;
    let user = store.create_user(&input, Timestamp::now())?;
    info!(user = user.id.0, role = %user.role, "user created");
    Ok(user)
}

/// Print record counts, as text or pretty JSON.
pub fn cmd_status(db_path: &Path, json: bool) -> AppResult<StoreStats> {
    let store = ZooStore::open(db_path)?;
    let stats = store.stats()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Database:   {}", db_path.display());
        println!("Users:      {}", stats.users);
        println!("Animals:    {}", stats.animals);
        println!("Habitats:   {}", stats.habitats);
        println!("Treatments: {}", stats.treatments);
        println!("Tasks:      {}", stats.tasks);
        println!("Sessions:   {}", stats.sessions);
    }
    Ok(stats)
}
