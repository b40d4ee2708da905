use clap::{Parser, Subcommand};

use iqub_client::app::{App, AppError};
use iqub_client::config::{ClientConfig, ConfigError};
use iqub_client::iqubs::IqubError;
use iqub_client::routes::Screen;
use iqub_client::session::AuthError;
use iqub_client::types::{Credentials, Iqub, Role, SignupRequest};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    App(#[from] AppError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Iqub(#[from] IqubError),
    #[error("not logged in")]
    NotLoggedIn,
}

#[derive(Parser, Debug)]
#[command(name = "iqub", about = "iqub session and navigation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in with phone and password.
    Login {
        #[arg(long)]
        phone: String,
        #[arg(long, env = "IQUB_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and log in as it.
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: String,
        #[arg(long, env = "IQUB_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, value_parser = parse_role)]
        role: Role,
        #[arg(long, default_value = "other")]
        gender: String,
    },
    /// Clear the stored session.
    Logout,
    /// Print the stored session.
    Whoami,
    /// List the iqubs visible to the logged-in user.
    Iqubs,
    /// Show one iqub's details.
    Iqub { id: String },
    /// Run a navigation through the guard and print where it lands.
    Open {
        /// `path[?query]`, e.g. `/collector-dashboard` or `/iqub/7`.
        #[arg(default_value = "/")]
        path: String,
    },
}

fn parse_role(raw: &str) -> Result<Role, String> {
    Role::from_selector(raw).ok_or_else(|| format!("unknown role `{raw}`; expected collector or member"))
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env()?;
    let app = App::from_config(&config)?;
    app.restore().await;

    match cli.command {
        Command::Login { phone, password } => {
            let user = app.session().login(&Credentials { phone, password }).await?;
            println!("logged in as {} ({})", user.name, user.role);
            print_landing(&app)
        }
        Command::Signup { name, email, phone, password, role, gender } => {
            let request = SignupRequest { name, email, phone, password, role, gender };
            let user = app.session().signup(&request).await?;
            println!("signed up as {} ({}) id={}", user.name, user.role, user.id);
            print_landing(&app)
        }
        Command::Logout => {
            app.logout();
            println!("logged out");
            Ok(())
        }
        Command::Whoami => {
            let snapshot = app.session().snapshot();
            let user = snapshot.user.ok_or(CliError::NotLoggedIn)?;
            if snapshot.token.is_none() {
                return Err(CliError::NotLoggedIn);
            }
            println!("{} <{}> role={} id={}", user.name, user.phone, user.role, user.id);
            Ok(())
        }
        Command::Iqubs => {
            for iqub in app.iqubs().fetch_iqubs().await? {
                print_iqub_line(&iqub);
            }
            Ok(())
        }
        Command::Iqub { id } => {
            app.iqubs().fetch_iqubs().await?;
            let navigation = app.open_iqub(&id)?;
            match app.iqubs().selected() {
                Some(iqub) if matches!(navigation.screen, Screen::IqubDetail { .. }) => print_iqub_detail(&iqub),
                _ => println!("redirected to {}", navigation.screen),
            }
            Ok(())
        }
        Command::Open { path } => {
            let navigation = app.navigate(&path)?;
            for decision in &navigation.decisions {
                println!("{decision:?}");
            }
            println!("{}", navigation.screen);
            Ok(())
        }
    }
}

fn print_iqub_line(iqub: &Iqub) {
    let seats = iqub
        .open_seats()
        .map_or_else(|| "?".to_owned(), |seats| seats.to_string());
    println!("{}\t{}\tsaving={} every {}\topen_seats={seats}", iqub.id, iqub.name, iqub.saving_amount, iqub.saving_pattern);
}

fn print_iqub_detail(iqub: &Iqub) {
    print_iqub_line(iqub);
    println!("credit: {} every {}", iqub.credit_amount, iqub.credit_pattern);
    if let Some(date) = &iqub.next_lottery_date {
        println!("next lottery: {date}");
    }
    for member in iqub.members.iter().flatten() {
        println!("  member {} {}", member.user_id, member.name.as_deref().unwrap_or("-"));
    }
}

fn print_landing(app: &App) -> Result<(), CliError> {
    let navigation = app.navigate_home()?;
    println!("landing: {}", navigation.screen);
    Ok(())
}
