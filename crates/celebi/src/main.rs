use std::io::{BufRead, Write, stdin, stdout};
use std::path::PathBuf;

use celebi::credentials::Credentials;
use celebi::oauth::client::OAuthClient;
use celebi::oauth::config::ClientConfig;
#[cfg(feature = "loopback")]
use celebi::oauth::loopback::LoopbackConfig;
use celebi::oauth::location::MemoryLocation;
use celebi::oauth::types::AuthorizeOptions;
use celebi::store::{FileStore, MemoryStore};
use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

type Client = OAuthClient<reqwest::Client, FileStore, MemoryStore>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Celebi - log in to a fediverse instance")]
struct Args {
    /// Path to the store file (will be created if missing)
    #[arg(long, global = true, default_value = "/tmp/celebi-store.json")]
    store: PathBuf,

    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in to an instance
    Login {
        /// Instance host, URL or account handle (e.g. @alice@mastodon.social)
        instance: String,

        /// Show the instance's login form even if already signed in there
        #[arg(long)]
        force_login: bool,

        /// Paste the landing URL instead of running a local callback server
        #[arg(long)]
        manual: bool,
    },
    /// Show the current session
    Status,
    /// Print the access token
    Token,
    /// Forget the current session
    Logout,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn login_manual(
    oauth: &Client,
    instance: &str,
    options: AuthorizeOptions,
) -> miette::Result<celebi::Session> {
    let redirect = oauth.start_auth(instance, options).await?;
    println!(
        "To log in to {}, visit:\n{}\n",
        redirect.instance, redirect.url
    );
    print!("Paste the URL you were sent back to: ");
    stdout().lock().flush().into_diagnostic()?;
    let mut line = String::new();
    stdin().lock().read_line(&mut line).into_diagnostic()?;

    let landing = url::Url::parse(line.trim()).into_diagnostic()?;
    let mut location = MemoryLocation::new(landing);
    let session = oauth.handle_callback(&mut location).await?;
    session.ok_or_else(|| miette::miette!("that URL has no `code` parameter"))
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let oauth: Client = OAuthClient::new(
        reqwest::Client::new(),
        FileStore::new(&args.store)?,
        MemoryStore::new(),
        ClientConfig::default(),
    )?;

    match args.command {
        Command::Login {
            instance,
            force_login,
            manual,
        } => {
            let options = AuthorizeOptions { force_login };
            #[cfg(feature = "loopback")]
            let session = if manual {
                login_manual(&oauth, &instance, options).await?
            } else {
                oauth
                    .login_with_local_server(&instance, options, LoopbackConfig::default())
                    .await?
            };
            #[cfg(not(feature = "loopback"))]
            let session = {
                let _ = manual;
                login_manual(&oauth, &instance, options).await?
            };
            println!("logged in to {}", session.instance_url);
        }
        Command::Status => match oauth.session().await {
            Some(session) => {
                println!("state: {}", oauth.state().await);
                println!("instance: {}", session.instance_url);
                println!("api: {}", session.api_url(""));
            }
            None => println!("state: {}", oauth.state().await),
        },
        Command::Token => {
            let token = oauth
                .access_token()
                .await
                .ok_or_else(|| miette::miette!("not logged in"))?;
            println!("{token}");
        }
        Command::Logout => {
            oauth.logout().await?;
            println!("logged out");
        }
    }
    Ok(())
}
