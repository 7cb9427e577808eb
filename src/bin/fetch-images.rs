//! fetch-images: download every image referenced by the blog export
//!
//! Exit codes: 0 on completion (per-image failures included), 1 when the
//! corpus is missing or unreadable, 2 for a bad configuration, 111 when the
//! cookie jar is missing, 112 when the origin rejects the session, 70 for
//! anything else (including an interrupted run).

use blog_image_archiver::{
    Config, ContentScanner, Corpus, Error, Result, SessionContext, ToExitCode, archive_images,
    image_usage, shutdown_signal,
};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fetch-images")]
#[command(about = "Recover the images referenced by a private blog export")]
#[command(version)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Exported posts
    #[arg(long, default_value = "posts.json")]
    corpus: PathBuf,

    /// Netscape cookies.txt of a logged-in browser session
    #[arg(long, env = "COOKIEJAR", default_value = "cookies.txt")]
    cookies: PathBuf,

    /// Decide what would be fetched without touching the network or disk
    #[arg(long, env = "DRYRUN", value_parser = clap::builder::FalseyValueParser::new())]
    dry_run: bool,

    /// Image output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Burn database file
    #[arg(long)]
    burn_db: Option<PathBuf>,

    /// Seed for the processing order
    #[arg(long)]
    seed: Option<u64>,

    /// Only fetch from the blog's own media hosts
    #[arg(long, env = "NO_3P_DOMAINS", value_parser = clap::builder::FalseyValueParser::new())]
    first_party_only: bool,

    /// List images referenced from more than one place, then exit
    #[arg(long)]
    shared_images: bool,

    /// Verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if self.dry_run {
            config.run.dry_run = true;
        }
        if let Some(output) = &self.output {
            config.store.output_dir = output.clone();
        }
        if let Some(burn_db) = &self.burn_db {
            config.burn.database_path = burn_db.clone();
        }
        if self.seed.is_some() {
            config.run.shuffle_seed = self.seed;
        }
        if self.first_party_only {
            config.first_party_only();
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("blog_image_archiver={0},fetch_images={0}", default_level))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_shared_images(config: &Config, corpus: &Corpus) -> Result<()> {
    let scanner = ContentScanner::new(&config.scan)?;
    let usage = image_usage(corpus, &scanner);
    for (url, used) in usage.shared() {
        let posts: Vec<&str> = used.posts.iter().map(String::as_str).collect();
        println!("{} ({} uses): {}", url, used.uses, posts.join(", "));
    }
    println!("{} images, {} shared", usage.len(), usage.shared().count());
    Ok(())
}

async fn run(cli: &Cli) -> Result<()> {
    let config = cli.load_config()?;

    if cli.shared_images {
        let corpus = Corpus::load(&cli.corpus)?;
        return print_shared_images(&config, &corpus);
    }

    let session = SessionContext::load(&cli.cookies)?;
    let corpus = Corpus::load(&cli.corpus)?;

    tracing::info!(
        dry_run = config.run.dry_run,
        output = %config.store.output_dir.display(),
        hashed_rules = config.hashed_rule_count(),
        "starting image acquisition"
    );

    tokio::select! {
        stats = archive_images(&config, &corpus, &session) => {
            println!("{}", stats?);
            println!("All done");
            Ok(())
        }
        _ = shutdown_signal() => {
            Err(Error::Other("interrupted; stored images and burns are kept".into()))
        }
    }
}

fn hint(err: &Error, cli: &Cli) {
    match err {
        Error::SessionMissing { .. } => eprintln!(
            "Need a cookie jar at {} (override with --cookies or COOKIEJAR).\n\
             Log in to the blog in a browser and export its cookies in Netscape cookies.txt format.",
            cli.cookies.display()
        ),
        Error::SessionInvalid { .. } => {
            eprintln!("Can't access the blog's media host; is the cookie jar still valid?")
        }
        Error::CorpusMissing { path } => {
            eprintln!("Need the exported posts at {}, sorry.", path.display())
        }
        _ => {}
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fetch-images failed");
            hint(&e, &cli);
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}
