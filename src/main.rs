use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use exam_admin::admin::exams::filter_exams;
use exam_admin::admin::practice_tests::filter_tests;
use exam_admin::admin::settings::{PasswordChange, SettingsError};
use exam_admin::admin::statistics::REPORTS_FILE_NAME;
use exam_admin::admin::users::{PAGE_LIMIT, filter_users};
use exam_admin::admin::{AdminError, CrudScreen};
use exam_admin::app::AdminApp;
use exam_admin::config::{ClientConfig, ConfigError};
use exam_admin::net::account::{AccountError, AccountReply, Registration, Role};
use exam_admin::net::api::{ApiError, ApiResponse};
use exam_admin::net::types::{LoginRequest, User};
use exam_admin::resource::{FetchError, ResourceState};
use exam_admin::routes::guard::GuardDecision;
use exam_admin::routes::{LOGIN_PATH, MemoryNavigator, Route};
use exam_admin::state::auth::LoginError;
use exam_admin::state::storage::FileStore;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("{}", .0.message())]
    Login(#[from] LoginError),
    #[error("{}", .0.message())]
    Account(#[from] AccountError),
    #[error(transparent)]
    Admin(#[from] AdminError),
    #[error("{}", .0.message())]
    Settings(#[from] SettingsError),
    #[error("request failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("not logged in; run `exam-admin login --email <EMAIL>` first")]
    NotLoggedIn,
    #[error("missing password; pass --password or set EXAM_ADMIN_PASSWORD")]
    MissingPassword,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("account deletion needs --yes")]
    Unconfirmed,
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "exam-admin", about = "Exam platform admin client")]
struct Cli {
    #[arg(long, env = "EXAM_ADMIN_APP_URL")]
    app_url: Option<String>,

    #[arg(long, env = "EXAM_ADMIN_STATE_DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "EXAM_ADMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    Logout,
    Whoami,
    Users(UsersCommand),
    Exams(CatalogCommand),
    Tests(CatalogCommand),
    Stats {
        /// Download the reports export instead of printing counters.
        #[arg(long, value_name = "FILE", num_args = 0..=1, default_missing_value = REPORTS_FILE_NAME)]
        export: Option<PathBuf>,
    },
    Settings(SettingsCommand),
    Account(AccountCommand),
}

#[derive(Args, Debug)]
struct SettingsCommand {
    #[command(subcommand)]
    command: SettingsSubcommand,
}

#[derive(Subcommand, Debug)]
enum SettingsSubcommand {
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        mobile: Option<String>,
    },
    Password {
        #[arg(long)]
        current_password: String,
        #[arg(long)]
        new_password: String,
        #[arg(long)]
        confirm_password: String,
    },
    DeleteAccount {
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
struct UsersCommand {
    #[command(subcommand)]
    command: UsersSubcommand,
}

#[derive(Subcommand, Debug)]
enum UsersSubcommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = PAGE_LIMIT)]
        limit: usize,
        #[arg(long)]
        search: Option<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        data: String,
    },
}

#[derive(Args, Debug)]
struct CatalogCommand {
    #[command(subcommand)]
    command: CatalogSubcommand,
}

#[derive(Subcommand, Debug)]
enum CatalogSubcommand {
    List {
        #[arg(long)]
        search: Option<String>,
    },
    Create {
        #[arg(long)]
        data: String,
    },
    Update {
        id: String,
        #[arg(long)]
        data: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Args, Debug)]
struct AccountCommand {
    #[command(subcommand)]
    command: AccountSubcommand,
}

#[derive(Subcommand, Debug)]
enum AccountSubcommand {
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        mobile: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
        #[arg(long, default_value_t = false)]
        admin: bool,
    },
    VerifyEmail {
        #[arg(long)]
        email: String,
        #[arg(long)]
        otp: String,
    },
    ResendOtp {
        #[arg(long)]
        email: String,
    },
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
    VerifyResetOtp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        otp: String,
    },
    ResetPassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        otp: String,
        #[arg(long)]
        new_password: String,
        #[arg(long)]
        confirm_password: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.app_url, cli.state_dir)?;
    let navigator = Arc::new(MemoryNavigator::new(LOGIN_PATH));
    let app = AdminApp::new(&config, Arc::new(FileStore::new(&config.state_dir)), navigator)?;
    app.boot().await;

    match cli.command {
        Command::Login { email, password } => run_login(&app, email, password).await,
        Command::Logout => {
            app.logout().await;
            println!("logged out");
            Ok(())
        }
        Command::Whoami => run_whoami(&app),
        Command::Users(users) => run_users(&app, users).await,
        Command::Exams(exams) => run_exams(&app, exams).await,
        Command::Tests(tests) => run_tests(&app, tests).await,
        Command::Stats { export } => run_stats(&app, export).await,
        Command::Settings(settings) => run_settings(&app, settings).await,
        Command::Account(account) => run_account(&app, account).await,
    }
}

fn load_config(app_url: Option<String>, state_dir: Option<PathBuf>) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(app_url) = app_url {
        let overridden = ClientConfig::new(app_url)?;
        config.app_url = overridden.app_url;
    }
    if let Some(state_dir) = state_dir {
        config.state_dir = state_dir;
    }
    Ok(config)
}

async fn run_login(app: &AdminApp, email: String, password: Option<String>) -> Result<(), CliError> {
    let password = password.ok_or(CliError::MissingPassword)?;
    let user = app.login(&LoginRequest::new(email, password)).await?;
    print_json(&json!({ "status": "authenticated", "user": user }))
}

fn run_whoami(app: &AdminApp) -> Result<(), CliError> {
    let session = app.session_store().session();
    print_json(&json!({ "status": session.status, "user": session.identity }))
}

/// Guard a protected screen the way the shell would before rendering it.
async fn enter(app: &AdminApp, route: Route) -> Result<(), CliError> {
    match app.open(route).await {
        GuardDecision::Render => Ok(()),
        GuardDecision::Loading | GuardDecision::Redirect { .. } => Err(CliError::NotLoggedIn),
    }
}

fn settled<T>(state: ResourceState<T>) -> Result<T, CliError> {
    match (state.data, state.error) {
        (_, Some(error)) if error.is_unauthorized() => Err(CliError::NotLoggedIn),
        (Some(data), _) => Ok(data),
        (None, Some(error)) => Err(error.into()),
        (None, None) => Err(CliError::Fetch(FetchError { status: None, message: "no data".to_owned() })),
    }
}

async fn run_users(app: &AdminApp, users: UsersCommand) -> Result<(), CliError> {
    enter(app, Route::Users).await?;
    match users.command {
        UsersSubcommand::List { page, limit, search } => {
            let screen = app.admin().users(page, limit);
            let listing = settled(screen.load().await)?;
            let shown = filter_users(&listing.users, search.as_deref().unwrap_or_default());
            print_json(&json!({ "users": shown, "page": page, "totalPages": listing.total_pages }))
        }
        UsersSubcommand::Update { id, data } => {
            let mut user = serde_json::from_str::<User>(&data)?;
            user.id = Some(id);
            let screen = app.admin().users(1, PAGE_LIMIT);
            print_response(&screen.update(&user).await?)
        }
    }
}

async fn run_crud<T: DeserializeOwned>(
    screen: &CrudScreen<T>,
    command: CatalogSubcommand,
    list: impl FnOnce(&T, &str) -> Value,
) -> Result<(), CliError> {
    match command {
        CatalogSubcommand::List { search } => {
            let data = settled(screen.resource().load().await)?;
            print_json(&list(&data, search.as_deref().unwrap_or_default()))
        }
        CatalogSubcommand::Create { data } => {
            let body = serde_json::from_str::<Value>(&data)?;
            print_response(&screen.create(&body).await?)
        }
        CatalogSubcommand::Update { id, data } => {
            let body = serde_json::from_str::<Value>(&data)?;
            print_response(&screen.update(&id, &body).await?)
        }
        CatalogSubcommand::Delete { id } => print_response(&screen.delete(&id).await?),
    }
}

async fn run_exams(app: &AdminApp, exams: CatalogCommand) -> Result<(), CliError> {
    enter(app, Route::Exams).await?;
    let screen = app.admin().exams();
    run_crud(&screen, exams.command, |list, term| json!(filter_exams(&list.exams, term))).await
}

async fn run_tests(app: &AdminApp, tests: CatalogCommand) -> Result<(), CliError> {
    enter(app, Route::Tests).await?;
    let admin = app.admin();
    let exams = match &tests.command {
        CatalogSubcommand::List { search: Some(_) } => admin.exams().resource().load().await.data.unwrap_or_default(),
        _ => Default::default(),
    };
    let screen = admin.tests();
    run_crud(&screen, tests.command, |list, term| json!(filter_tests(list, &exams.exams, term))).await
}

async fn run_stats(app: &AdminApp, export: Option<PathBuf>) -> Result<(), CliError> {
    enter(app, Route::Statistics).await?;
    let screen = app.admin().statistics();
    let Some(path) = export else {
        return print_json(&settled(screen.load().await)?);
    };
    let report = screen.export_reports().await?;
    std::fs::write(&path, report)?;
    print_json(&json!({ "exported": path }))
}

async fn run_settings(app: &AdminApp, settings: SettingsCommand) -> Result<(), CliError> {
    enter(app, Route::Settings).await?;
    let screen = app.settings();
    match settings.command {
        SettingsSubcommand::Profile { name, email, mobile } => {
            let mut profile = screen.profile();
            profile.name = name.unwrap_or(profile.name);
            profile.email = email.unwrap_or(profile.email);
            profile.mobile = mobile.unwrap_or(profile.mobile);
            let status = screen.update_profile(&profile).await?;
            let session = app.session_store().session();
            print_json(&json!({ "status": status, "user": session.identity }))
        }
        SettingsSubcommand::Password { current_password, new_password, confirm_password } => {
            let change = PasswordChange { current_password, new_password, confirm_password };
            print_response(&screen.change_password(&change).await?)
        }
        SettingsSubcommand::DeleteAccount { yes } => {
            if !yes {
                return Err(CliError::Unconfirmed);
            }
            screen.delete_account().await?;
            println!("account deleted; logged out");
            Ok(())
        }
    }
}

async fn run_account(app: &AdminApp, account: AccountCommand) -> Result<(), CliError> {
    let api = app.account();
    let reply = match account.command {
        AccountSubcommand::Register { name, email, mobile, password, confirm_password, admin } => {
            let role = if admin { Role::Admin } else { Role::User };
            let registration = Registration { name, email, mobile, password, confirm_password, role };
            api.register(&registration).await?
        }
        AccountSubcommand::VerifyEmail { email, otp } => api.verify_email(&email, &otp).await?,
        AccountSubcommand::ResendOtp { email } => api.resend_otp(&email).await?,
        AccountSubcommand::ForgotPassword { email } => api.forgot_password(&email).await?,
        AccountSubcommand::VerifyResetOtp { email, otp } => api.verify_reset_otp(&email, &otp).await?,
        AccountSubcommand::ResetPassword { email, otp, new_password, confirm_password } => {
            api.reset_password(&email, &otp, &new_password, &confirm_password).await?
        }
    };
    print_reply(&reply)
}

fn print_reply(reply: &AccountReply) -> Result<(), CliError> {
    print_json(&json!({
        "status": reply.status,
        "success": reply.success,
        "message": reply.message,
        "verified": reply.token.is_some(),
    }))
}

fn print_response(response: &ApiResponse) -> Result<(), CliError> {
    print_json(&response.body)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
