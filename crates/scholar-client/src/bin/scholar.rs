use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use scholar_client::error::ClientError;
use scholar_client::routes::{Access, Route};
use scholar_client::services::ResultFile;
use scholar_client::signup::{SignupContext, SignupStage};
use scholar_client::state::PreferenceChange;
use scholar_client::state::announcements::DEFAULT_PAGE_SIZE;
use scholar_client::{ClientConfig, Portal};
use scholar_types::api::CompleteProfileRequest;
use scholar_types::{ChatKind, PaymentKind, ProfileUpdate, SessionUser};

#[derive(Parser, Debug)]
#[command(name = "scholar", about = "Scholarship portal command-line client")]
struct Cli {
    #[arg(long, env = "SCHOLAR_API_URL", default_value = scholar_client::config::DEFAULT_API_URL)]
    api_url: String,

    /// Where the session token and cached data are kept between runs.
    #[arg(long, env = "SCHOLAR_STORE_PATH", default_value = ".scholar/session.json")]
    store: PathBuf,

    #[arg(long, env = "SCHOLAR_LOAD_TIMEOUT_SECS", default_value_t = 15)]
    load_timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Signup(SignupCommand),
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SCHOLAR_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    Whoami,
    /// Prefetch everything the dashboard shows and summarize it.
    Dashboard,
    Profile(ProfileCommand),
    Payments(PaymentsCommand),
    Results(ResultsCommand),
    Announcements(AnnouncementsCommand),
    Settings(SettingsCommand),
    Chats(ChatsCommand),
    /// Career guidance articles and resume templates.
    Mentorship(MentorshipCommand),
}

#[derive(Args, Debug)]
struct SignupCommand {
    #[command(subcommand)]
    command: SignupSubcommand,
}

#[derive(Subcommand, Debug)]
enum SignupSubcommand {
    Start {
        email: String,
    },
    Resend {
        #[arg(long)]
        email: String,
    },
    Verify {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
    },
    SetPassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    Complete(CompleteArgs),
}

#[derive(Args, Debug)]
struct CompleteArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    sex: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    university: String,
    #[arg(long)]
    registration_id: String,
    #[arg(long)]
    program: String,
    #[arg(long)]
    enrolled_year: String,
    #[arg(long)]
    batch: u32,
}

#[derive(Args, Debug)]
struct ProfileCommand {
    #[command(subcommand)]
    command: ProfileSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProfileSubcommand {
    Show,
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        sex: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        university: Option<String>,
        #[arg(long)]
        program: Option<String>,
        #[arg(long)]
        enrolled_year: Option<String>,
        #[arg(long)]
        batch: Option<u32>,
    },
}

#[derive(Args, Debug)]
struct PaymentsCommand {
    #[command(subcommand)]
    command: PaymentsSubcommand,
}

#[derive(Subcommand, Debug)]
enum PaymentsSubcommand {
    List,
    Submit {
        /// university or nhif
        #[arg(long)]
        kind: PaymentKind,
        control_number: String,
    },
}

#[derive(Args, Debug)]
struct ResultsCommand {
    #[command(subcommand)]
    command: ResultsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ResultsSubcommand {
    List,
    Upload {
        path: PathBuf,
    },
    Delete {
        file_name: String,
    },
    Download {
        file_name: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct AnnouncementsCommand {
    #[command(subcommand)]
    command: AnnouncementsSubcommand,
}

#[derive(Subcommand, Debug)]
enum AnnouncementsSubcommand {
    List {
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        size: u32,
    },
    Read {
        id: Uuid,
    },
}

#[derive(Args, Debug)]
struct SettingsCommand {
    #[command(subcommand)]
    command: SettingsSubcommand,
}

#[derive(Subcommand, Debug)]
enum SettingsSubcommand {
    Show,
    Set {
        #[arg(long)]
        announcements: Option<bool>,
        #[arg(long)]
        payment_updates: Option<bool>,
        #[arg(long)]
        result_updates: Option<bool>,
    },
    Password {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },
}

#[derive(Args, Debug)]
struct ChatsCommand {
    #[command(subcommand)]
    command: ChatsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ChatsSubcommand {
    List {
        #[arg(long, value_enum)]
        kind: Option<ChatKindArg>,
    },
    Show {
        chat_id: String,
    },
    Send {
        chat_id: String,
        message: String,
    },
}

#[derive(Args, Debug)]
struct MentorshipCommand {
    #[command(subcommand)]
    command: MentorshipSubcommand,
}

#[derive(Subcommand, Debug)]
enum MentorshipSubcommand {
    Articles {
        #[arg(long)]
        category: Option<String>,
    },
    Read {
        id: String,
    },
    Templates,
    Download {
        id: i64,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ChatKindArg {
    Direct,
    Batch,
    All,
}

impl From<ChatKindArg> for ChatKind {
    fn from(arg: ChatKindArg) -> Self {
        match arg {
            ChatKindArg::Direct => ChatKind::Direct,
            ChatKindArg::Batch => ChatKind::Batch,
            ChatKindArg::All => ChatKind::All,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scholar_client=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ClientConfig {
        base_url: cli.api_url,
        load_timeout: Duration::from_secs(cli.load_timeout),
        store_path: Some(cli.store),
        ..ClientConfig::from_env()
    };
    let portal = Portal::new(config).map_err(|e| anyhow::anyhow!(e.user_message()))?;

    run(&portal, cli.command)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))
}

async fn run(portal: &Portal, command: Command) -> Result<(), ClientError> {
    match command {
        Command::Signup(signup) => run_signup(portal, signup.command).await,
        Command::Login { email, password } => {
            let user = portal.session.login(&email, &password).await?;
            println!("Signed in as {} <{}>", user.name, user.email);
            if !user.profile_completed {
                println!("Your profile is incomplete. Finish it with `scholar signup complete`.");
            }
            Ok(())
        }
        Command::Logout => {
            portal.session.logout().await;
            portal.clear_all();
            println!("Signed out");
            Ok(())
        }
        Command::Whoami => {
            let user = signed_in(portal).await?;
            println!("{} <{}> ({})", user.name, user.email, user.role.as_str());
            Ok(())
        }
        Command::Dashboard => run_dashboard(portal).await,
        Command::Profile(profile) => run_profile(portal, profile.command).await,
        Command::Payments(payments) => run_payments(portal, payments.command).await,
        Command::Results(results) => run_results(portal, results.command).await,
        Command::Announcements(a) => run_announcements(portal, a.command).await,
        Command::Settings(settings) => run_settings(portal, settings.command).await,
        Command::Chats(chats) => run_chats(portal, chats.command).await,
        Command::Mentorship(m) => run_mentorship(portal, m.command).await,
    }
}

async fn signed_in(portal: &Portal) -> Result<SessionUser, ClientError> {
    portal
        .session
        .restore()
        .await
        .ok_or(ClientError::MissingSession)
}

/// Open a page the way the front end does: guard first, then load whatever
/// the page shows unless something already has.
async fn open_page(portal: &Portal, route: Route) -> Result<(), ClientError> {
    match portal.open(route, None).await {
        Access::Allow => Ok(()),
        Access::Redirect(_) => Err(ClientError::MissingSession),
    }
}

fn context(email: String, stage: SignupStage) -> SignupContext {
    SignupContext { email, stage }
}

async fn run_signup(portal: &Portal, command: SignupSubcommand) -> Result<(), ClientError> {
    match command {
        SignupSubcommand::Start { email } => {
            let flow = portal.start_signup(&email).await?;
            println!("A verification code was sent to {}", flow.email());
            println!("Next: scholar signup verify --email {} --code <code>", flow.email());
        }
        SignupSubcommand::Resend { email } => {
            let flow = portal.resume_signup(context(email, SignupStage::AwaitingVerification));
            println!("{}", flow.resend_code().await?);
        }
        SignupSubcommand::Verify { email, code } => {
            let mut flow =
                portal.resume_signup(context(email, SignupStage::AwaitingVerification));
            println!("{}", flow.verify(&code).await?);
            println!("Next: scholar signup set-password --email {}", flow.email());
        }
        SignupSubcommand::SetPassword {
            email,
            password,
            confirm,
        } => {
            let mut flow = portal.resume_signup(context(email, SignupStage::EmailVerified));
            println!("{}", flow.set_password(&password, &confirm).await?);
            println!("Next: scholar signup complete --email {} ...", flow.email());
        }
        SignupSubcommand::Complete(args) => {
            let mut flow = portal.resume_signup(context(args.email, SignupStage::PasswordSet));
            let form = CompleteProfileRequest {
                email: String::new(),
                name: args.name,
                sex: args.sex,
                mobile_phone: args.phone,
                university_name: args.university,
                university_registration_id: args.registration_id,
                program_name: args.program,
                enrolled_year: args.enrolled_year,
                batch_number: args.batch,
            };
            println!("{}", flow.complete_profile(form).await?);
            println!("You can now sign in with `scholar login`.");
        }
    }
    Ok(())
}

async fn run_dashboard(portal: &Portal) -> Result<(), ClientError> {
    let user = signed_in(portal).await?;
    let status = portal.on_session_change(Some(&user)).await;
    if let Some(error) = &status.error {
        eprintln!("{}", error);
    }

    println!("Welcome, {}", user.name);
    if let Some(profile) = portal.profile.snapshot().value {
        println!(
            "  {} at {}, batch {} ({})",
            profile.program_name,
            profile.university_name,
            profile.batch_number,
            profile.enrollment_status.as_str()
        );
    }
    println!("  Results uploaded:      {}", portal.results.snapshot().value.len());
    println!("  Payments on record:    {}", portal.payments.snapshot().value.len());
    println!("  Unread announcements:  {}", portal.announcements.unread_count());
    println!("  Unread chat messages:  {}", portal.messaging.total_unread());
    Ok(())
}

async fn run_profile(portal: &Portal, command: ProfileSubcommand) -> Result<(), ClientError> {
    signed_in(portal).await?;
    let profile = match command {
        ProfileSubcommand::Show => {
            open_page(portal, Route::Profile).await?;
            let snap = portal.profile.snapshot();
            snap.value.ok_or_else(|| {
                ClientError::PageLoad(snap.error.unwrap_or_else(|| "Profile not found".into()))
            })?
        }
        ProfileSubcommand::Update {
            name,
            sex,
            phone,
            university,
            program,
            enrolled_year,
            batch,
        } => {
            let update = ProfileUpdate {
                name,
                sex,
                mobile_phone: phone,
                university_name: university,
                program_name: program,
                enrolled_year,
                batch_number: batch,
                ..Default::default()
            };
            if update.is_empty() {
                println!("Nothing to update");
                return Ok(());
            }
            portal.profile.update(&update).await?
        }
    };

    println!("Name:             {}", profile.name);
    println!("Email:            {}", profile.email);
    println!("Sex:              {}", profile.sex);
    println!("Phone:            {}", profile.mobile_phone);
    println!("University:       {}", profile.university_name);
    println!("Registration ID:  {}", profile.university_registration_id);
    println!("Program:          {}", profile.program_name);
    println!("Enrolled:         {}", profile.enrolled_year);
    println!("Batch:            {}", profile.batch_number);
    println!("Status:           {}", profile.enrollment_status.as_str());
    Ok(())
}

async fn run_payments(portal: &Portal, command: PaymentsSubcommand) -> Result<(), ClientError> {
    signed_in(portal).await?;
    match command {
        PaymentsSubcommand::List => {
            open_page(portal, Route::Payments).await?;
            // a failed fetch may still leave cached rows to show
            let snap = portal.payments.snapshot();
            match (&snap.error, snap.value.is_empty()) {
                (Some(error), true) => return Err(ClientError::PageLoad(error.clone())),
                (Some(error), false) => eprintln!("{}", error),
                (None, true) => println!("No payments submitted yet"),
                (None, false) => {}
            }
            for p in &snap.value {
                println!(
                    "{}  {:<15} {}  {}",
                    p.created_at.format("%Y-%m-%d %H:%M"),
                    p.kind.label(),
                    p.control_number,
                    p.status.as_str()
                );
            }
        }
        PaymentsSubcommand::Submit {
            kind,
            control_number,
        } => {
            println!("{}", portal.payments.submit(kind, &control_number).await?);
        }
    }
    Ok(())
}

async fn run_results(portal: &Portal, command: ResultsSubcommand) -> Result<(), ClientError> {
    signed_in(portal).await?;
    match command {
        ResultsSubcommand::List => {
            open_page(portal, Route::Results).await?;
            let snap = portal.results.snapshot();
            if let Some(error) = snap.error {
                return Err(ClientError::PageLoad(error));
            }
            if snap.value.is_empty() {
                println!("No results uploaded yet");
            }
            for r in snap.value {
                println!(
                    "{}  {:>9} bytes  {}  {}",
                    r.upload_date.format("%Y-%m-%d %H:%M"),
                    r.file_size,
                    r.status.as_str(),
                    r.file_name
                );
            }
        }
        ResultsSubcommand::Upload { path } => {
            let file = ResultFile::from_path(&path).await?;
            let uploaded = portal.results.upload(&file).await?;
            println!("Uploaded {}", uploaded.file_name);
        }
        ResultsSubcommand::Delete { file_name } => {
            portal.results.delete(&file_name).await?;
            println!("Deleted {}", file_name);
        }
        ResultsSubcommand::Download { file_name, out } => {
            let bytes = portal.results.download(&file_name).await?;
            let out = out.unwrap_or_else(|| PathBuf::from(&file_name));
            tokio::fs::write(&out, &bytes).await?;
            println!("Saved {} bytes to {}", bytes.len(), out.display());
        }
    }
    Ok(())
}

async fn run_announcements(
    portal: &Portal,
    command: AnnouncementsSubcommand,
) -> Result<(), ClientError> {
    signed_in(portal).await?;
    match command {
        AnnouncementsSubcommand::List { page, size } => {
            if page == 0 && size == DEFAULT_PAGE_SIZE {
                open_page(portal, Route::Announcements).await?;
                if let Some(error) = portal.announcements.snapshot().error {
                    return Err(ClientError::PageLoad(error));
                }
            } else {
                portal.announcements.load_page(page, size).await?;
            }
            let snap = portal.announcements.snapshot().value;
            println!(
                "Page {} ({} total, {} unread here)",
                snap.page,
                snap.total,
                portal.announcements.unread_count()
            );
            for a in snap.announcements {
                let marker = if a.read { " " } else { "*" };
                println!("{} {}  {}  ({})", marker, a.id, a.title, a.sender_name);
                println!("    {}", a.content);
            }
        }
        AnnouncementsSubcommand::Read { id } => {
            // mark_read only knows what has been loaded
            portal.announcements.refresh().await?;
            let on_page = portal
                .announcements
                .snapshot()
                .value
                .announcements
                .iter()
                .any(|a| a.id == id);
            if !on_page {
                return Err(ClientError::NotFound("Announcement".into()));
            }
            portal.announcements.mark_read(id).await?;
            println!("Marked as read");
        }
    }
    Ok(())
}

async fn run_settings(portal: &Portal, command: SettingsSubcommand) -> Result<(), ClientError> {
    signed_in(portal).await?;
    let prefs = match command {
        SettingsSubcommand::Show => portal.settings.refresh().await?,
        SettingsSubcommand::Set {
            announcements,
            payment_updates,
            result_updates,
        } => {
            let change = PreferenceChange {
                receive_announcements: announcements,
                receive_payment_updates: payment_updates,
                receive_result_updates: result_updates,
            };
            let current = portal.settings.refresh().await?;
            if change.is_empty() {
                println!("Nothing to change");
                current
            } else {
                portal.settings.update(change).await?
            }
        }
        SettingsSubcommand::Password {
            current,
            new,
            confirm,
        } => {
            println!(
                "{}",
                portal.settings.change_password(&current, &new, &confirm).await?
            );
            return Ok(());
        }
    };

    println!("Announcements:    {}", on_off(prefs.receive_announcements));
    println!("Payment updates:  {}", on_off(prefs.receive_payment_updates));
    println!("Result updates:   {}", on_off(prefs.receive_result_updates));
    Ok(())
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

async fn run_chats(portal: &Portal, command: ChatsSubcommand) -> Result<(), ClientError> {
    let user = signed_in(portal).await?;
    // no messaging backend: every run starts from the sample inbox
    portal.messaging.seed_for(&user);
    match command {
        ChatsSubcommand::List { kind } => {
            for chat in portal.messaging.chats(kind.map(Into::into)) {
                let last = chat
                    .last_message
                    .as_ref()
                    .map(|m| m.content.as_str())
                    .unwrap_or("No messages yet");
                println!("{:<24} {:<16} ({} unread)  {}", chat.id, chat.name, chat.unread_count, last);
            }
        }
        ChatsSubcommand::Show { chat_id } => {
            for m in portal.messaging.messages(&chat_id)? {
                let who = if m.is_from(user.id) { "You" } else { m.sender_name.as_str() };
                println!("[{}] {}: {}", m.timestamp.format("%H:%M"), who, m.content);
            }
            portal.messaging.mark_chat_read(&chat_id)?;
        }
        ChatsSubcommand::Send { chat_id, message } => {
            let sent = portal.messaging.send_message(&chat_id, &message)?;
            println!("[{}] You: {}", sent.timestamp.format("%H:%M"), sent.content);
        }
    }
    Ok(())
}

async fn run_mentorship(portal: &Portal, command: MentorshipSubcommand) -> Result<(), ClientError> {
    signed_in(portal).await?;
    match command {
        MentorshipSubcommand::Articles { category } => {
            let wanted = |a: &&scholar_types::MentorshipArticle| {
                category
                    .as_deref()
                    .is_none_or(|c| a.category.eq_ignore_ascii_case(c))
            };
            for a in portal.mentorship.articles().iter().filter(wanted) {
                println!(
                    "{:>3}  {:<36} {:<12} {} ({}, {} read)",
                    a.id,
                    a.title,
                    a.category,
                    a.author,
                    a.date.format("%b %-d, %Y"),
                    a.read_time
                );
            }
        }
        MentorshipSubcommand::Read { id } => {
            let a = portal.mentorship.article(&id)?;
            println!("{}", a.title);
            match &a.author_title {
                Some(title) => println!("{}, {}  |  {}", a.author, title, a.date.format("%b %-d, %Y")),
                None => println!("{}  |  {}", a.author, a.date.format("%b %-d, %Y")),
            }
            println!();
            println!("{}", a.content);
        }
        MentorshipSubcommand::Templates => {
            open_page(portal, Route::Mentorship).await?;
            let snap = portal.mentorship.templates();
            if let Some(error) = snap.error {
                return Err(ClientError::PageLoad(error));
            }
            if snap.value.is_empty() {
                println!("No resume templates available yet");
            }
            for d in snap.value {
                println!("{:>4}  {:>9} bytes  {}", d.id, d.file_size, d.file_name);
            }
        }
        MentorshipSubcommand::Download { id, out } => {
            // the listing supplies the saved file name
            open_page(portal, Route::Mentorship).await?;
            let (file_name, bytes) = portal.mentorship.download_template(id).await?;
            let out = out.unwrap_or_else(|| PathBuf::from(&file_name));
            tokio::fs::write(&out, &bytes).await?;
            println!("Saved {} bytes to {}", bytes.len(), out.display());
        }
    }
    Ok(())
}
