use clap::{Parser, Subcommand};
use lib::anchor::AnchorHandle;
use lib::engine::SendOutcome;
use lib::facade::ChatSession;
use lib::session::{Message, Sender};

#[derive(Parser)]
#[command(name = "dashvite")]
#[command(about = "DashVite CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Log in: relay credentials to the backend and store the issued token.
    Login {
        /// Account email.
        email: String,

        /// Config file path (default: DASHVITE_CONFIG_PATH or ~/.dashvite/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Log out: clear stored credentials.
    Logout,

    /// Chat with the assistant (interactive). Type /help for commands.
    Chat {
        /// Config file path (default: DASHVITE_CONFIG_PATH or ~/.dashvite/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Initial query to send automatically, as from a deep link.
        #[arg(long, short, value_name = "TEXT")]
        query: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("dashvite {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Login { email, config }) => {
            if let Err(e) = run_login(email, config).await {
                log::error!("login failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Logout) => {
            if let Err(e) = run_logout() {
                log::error!("logout failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config, query }) => {
            if let Err(e) = run_chat(config, query).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_login(email: String, config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    use lib::backend::{ApiClient, Backend};
    use std::io::Write;

    let (config, _) = lib::config::load_config(config_path)?;

    print!("password: ");
    std::io::stdout().flush()?;
    let mut password = String::new();
    std::io::stdin().read_line(&mut password)?;
    let password = password.trim_end_matches(['\r', '\n']);

    let client = ApiClient::new(Some(config.backend.origin.clone()));
    let issued = client.login(&email, password).await?;
    let creds = lib::storage::StoredCredentials {
        access_token: Some(issued.access_token),
        user_id: Some(issued.user_id),
    };
    creds.save(&lib::storage::default_credentials_path())?;
    println!("logged in as {}", email);
    Ok(())
}

fn run_logout() -> anyhow::Result<()> {
    lib::storage::clear_credentials(&lib::storage::default_credentials_path())?;
    println!("logged out");
    Ok(())
}

fn print_message(msg: &Message) {
    match msg.sender {
        Sender::User => println!("> {}", msg.text),
        Sender::Assistant => println!("< {}", msg.text),
    }
}

/// Print transcript messages not shown yet and register an anchor per
/// printed message so /jump can find them. Returns the new printed count.
async fn print_new_messages(session: &ChatSession, printed: usize) -> usize {
    let transcript = session.transcript().await;
    for (i, msg) in transcript.iter().enumerate().skip(printed) {
        print_message(msg);
        session.anchors().register(msg.id.clone(), AnchorHandle(i as u64)).await;
    }
    transcript.len()
}

async fn run_chat(
    config_path: Option<std::path::PathBuf>,
    query: Option<String>,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, _) = lib::config::load_config(config_path)?;
    let session = ChatSession::from_config(&config);

    session.start(query.as_deref()).await;
    if let Some(err) = session.history_error().await {
        eprintln!("! {} Type /retry to try again.", err);
    }
    let mut printed = print_new_messages(&session, 0).await;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }
        if input.eq_ignore_ascii_case("/help") {
            println!("/history  list past questions");
            println!("/jump N   jump to history entry N");
            println!("/retry    retry loading history");
            println!("/logout   clear credentials and reset the session");
            println!("/exit     quit");
            continue;
        }
        if input.eq_ignore_ascii_case("/history") {
            let index = session.history_index().await;
            if index.is_empty() {
                println!("(no history)");
            }
            for (n, msg) in index.iter().enumerate() {
                println!("{:2}. {}", n + 1, msg.text);
            }
            continue;
        }
        if let Some(arg) = input.strip_prefix("/jump ") {
            let index = session.history_index().await;
            let picked = arg
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|n| index.get(n));
            match picked {
                Some(msg) => match session.select_history_item(&msg.id).await {
                    Some(target) => println!("(jump to message {} at slot {})", target.id, target.handle.0),
                    None => println!("(that message isn't on screen)"),
                },
                None => println!("(no such history entry)"),
            }
            continue;
        }
        if input.eq_ignore_ascii_case("/retry") {
            session.retry_history_load().await;
            match session.history_error().await {
                Some(err) => eprintln!("! {}", err),
                None => println!("(history loaded)"),
            }
            printed = print_new_messages(&session, printed).await;
            continue;
        }
        if input.eq_ignore_ascii_case("/logout") {
            session.logout().await;
            println!("(logged out; continuing as guest)");
            session.start(None).await;
            printed = print_new_messages(&session, 0).await;
            continue;
        }

        match session.send_message(Some(input)).await {
            SendOutcome::Completed { .. } => {
                let transcript = session.transcript().await;
                for (i, msg) in transcript.iter().enumerate().skip(printed) {
                    // The user message was already echoed by the prompt line.
                    if msg.sender == Sender::Assistant {
                        print_message(msg);
                    }
                    session.anchors().register(msg.id.clone(), AnchorHandle(i as u64)).await;
                }
                printed = transcript.len();
            }
            SendOutcome::RejectedBusy => println!("(still waiting on the last reply)"),
            SendOutcome::RejectedEmpty => {}
            // The loop is sequential, so a reset can't race a send here.
            SendOutcome::Superseded => {}
        }
    }

    Ok(())
}
