use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use sangyan_session::config::ConfigError;
use sangyan_session::net::TransportError;
use sangyan_session::{ConsoleNotifier, Gateway, GatewayConfig, ProfileUpdate, RegistrationData, SessionUser};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("http client setup failed: {0}")]
    Transport(#[from] TransportError),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("not signed in")]
    NotSignedIn,
    #[error("{0} failed")]
    Failed(&'static str),
}

#[derive(Parser, Debug)]
#[command(name = "sangyan", about = "Sangyan session and account CLI")]
struct Cli {
    /// API root, e.g. `https://sangyan.example/api`.
    #[arg(long, env = "SANGYAN_API_BASE_URL")]
    base_url: Option<String>,

    /// Where the session credential is kept between invocations.
    #[arg(long, env = "SANGYAN_CREDENTIALS_PATH")]
    credentials: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SANGYAN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Register(RegisterArgs),
    Logout,
    Whoami,
    Refresh,
    UpdateProfile(UpdateProfileArgs),
    Credit {
        amount: u64,
        reason: String,
    },
    Debit {
        amount: u64,
        reason: String,
    },
    /// Print the current access token.
    Token,
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    username: String,
    #[arg(long, env = "SANGYAN_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    institute: Option<String>,
    #[arg(long)]
    course: Option<String>,
    #[arg(long)]
    bio: Option<String>,
}

#[derive(Args, Debug)]
struct UpdateProfileArgs {
    #[arg(long)]
    display_name: String,
    #[arg(long)]
    photo_url: Option<String>,
    #[arg(long)]
    institute: Option<String>,
    #[arg(long)]
    course: Option<String>,
    #[arg(long)]
    bio: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    tracing::debug!(base_url = %config.base_url, credentials = %config.credentials_path.display(), "starting");

    let gateway = Gateway::from_config(&config, Arc::new(ConsoleNotifier))?;
    gateway.initialize().await;

    run(&gateway, cli.command).await
}

fn load_config(cli: &Cli) -> Result<GatewayConfig, CliError> {
    let mut config = match &cli.base_url {
        Some(url) => GatewayConfig::from_env_with_base_url(url)?,
        None => GatewayConfig::from_env()?,
    };
    if let Some(path) = &cli.credentials {
        config = config.with_credentials_path(path.clone());
    }
    Ok(config)
}

async fn run(gateway: &Gateway, command: Command) -> Result<(), CliError> {
    match command {
        Command::Login { email, password } => ensure(gateway.login(&email, &password).await, "login"),
        Command::Register(args) => {
            let data = RegistrationData {
                email: args.email,
                username: args.username,
                password: args.password,
                first_name: args.first_name,
                last_name: args.last_name,
                institute: args.institute,
                course: args.course,
                bio: args.bio,
            };
            ensure(gateway.register(&data).await, "registration")
        }
        Command::Logout => {
            if !gateway.logout().await {
                println!("not signed in");
            }
            Ok(())
        }
        Command::Whoami => print_user(gateway.current_user().as_ref()),
        Command::Refresh => {
            if !gateway.is_authenticated() {
                return Err(CliError::NotSignedIn);
            }
            let user = gateway.refresh().await.ok_or(CliError::Failed("refresh"))?;
            print_user(Some(&user))
        }
        Command::UpdateProfile(args) => {
            let update = ProfileUpdate {
                display_name: args.display_name,
                photo_url: args.photo_url,
                institute: args.institute,
                course: args.course,
                bio: args.bio,
            };
            gateway.update_profile(&update).await.map_err(|_| CliError::Failed("profile update"))?;
            Ok(())
        }
        Command::Credit { amount, reason } => ensure(gateway.credit(amount, &reason).await, "credit"),
        Command::Debit { amount, reason } => ensure(gateway.debit(amount, &reason).await, "debit"),
        Command::Token => {
            let token = gateway.auth_token().ok_or(CliError::NotSignedIn)?;
            println!("{token}");
            Ok(())
        }
    }
}

fn ensure(ok: bool, what: &'static str) -> Result<(), CliError> {
    if ok { Ok(()) } else { Err(CliError::Failed(what)) }
}

fn print_user(user: Option<&SessionUser>) -> Result<(), CliError> {
    let user = user.ok_or(CliError::NotSignedIn)?;
    println!("{}", serde_json::to_string_pretty(user)?);
    Ok(())
}
