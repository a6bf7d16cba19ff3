use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use jobtrack_api::seed::{
    generate_resumes, generate_users, load_resumes, load_users, read_samples_from_path,
};
use jobtrack_api::storage::Storage;
use jobtrack_db::Database;
use jobtrack_server::config::IN_MEMORY;

#[derive(Parser, Debug)]
#[command(name = "jobtrack-seed", about = "Fill a jobtrack database with synthetic data", version)]
struct Cli {
    /// SQLite database to seed (defaults to JOBTRACK_DB_PATH, then jobtrack.db)
    #[arg(long)]
    db: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create active accounts with Polish names, phone numbers and cities
    Users(UsersArgs),
    /// Assign résumés drawn from a CSV dataset to random existing accounts
    Resumes(ResumesArgs),
}

#[derive(Args, Debug)]
struct UsersArgs {
    /// Number of users to generate
    total: usize,
    /// RNG seed; the same seed yields the same users
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Print the generated users as JSON instead of writing them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct ResumesArgs {
    /// Number of résumés to create
    total: usize,
    /// CSV with `Category`, `Resume_str` and `Resume_html` columns
    #[arg(long, default_value = "Resume.csv")]
    filepath: PathBuf,
    /// Media directory for the documents (defaults to JOBTRACK_MEDIA_DIR, then ./media)
    #[arg(long)]
    media_dir: Option<PathBuf>,
    /// RNG seed for sampling rows and picking owners
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Print the drawn résumés as JSON instead of writing them
    #[arg(long)]
    dry_run: bool,
}

fn open_database(db_path: &str) -> anyhow::Result<Database> {
    if db_path == IN_MEMORY {
        Database::open_in_memory()
    } else {
        Database::open(&PathBuf::from(db_path))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobtrack=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = cli
        .db
        .or_else(|| std::env::var("JOBTRACK_DB_PATH").ok())
        .unwrap_or_else(|| "jobtrack.db".into());

    match cli.command {
        Command::Users(args) => {
            let mut rng = StdRng::seed_from_u64(args.seed);
            let users = generate_users(&mut rng, args.total)?;

            if args.dry_run {
                println!("{}", serde_json::to_string_pretty(&users)?);
                return Ok(());
            }

            let db = open_database(&db_path)?;
            let created = load_users(&db, &users)?;
            info!("Seeded {} users into {} (seed {})", created, db_path, args.seed);
        }
        Command::Resumes(args) => {
            let mut rng = StdRng::seed_from_u64(args.seed);
            let samples = read_samples_from_path(&args.filepath)?;
            let resumes = generate_resumes(&mut rng, &samples, args.total)?;

            if args.dry_run {
                println!("{}", serde_json::to_string_pretty(&resumes)?);
                return Ok(());
            }

            let media_dir = args
                .media_dir
                .or_else(|| std::env::var("JOBTRACK_MEDIA_DIR").ok().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("./media"));
            let storage = Storage::new(media_dir).await?;
            let db = open_database(&db_path)?;
            let created = load_resumes(&db, &storage, &mut rng, &resumes).await?;
            info!(
                "Seeded {} résumés from {} into {} (seed {})",
                created,
                args.filepath.display(),
                db_path,
                args.seed
            );
        }
    }

    Ok(())
}
