use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::AsyncBufReadExt;

use client::directory::Directory;
use client::session::Session;
use client::types::{Role, SessionState, UserEntry};
use protocol::Command as RoomCommand;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Session(#[from] client::session::SessionError),
    #[error("failed to read input: {0}")]
    Input(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "estimation-cli", about = "Planning-poker room CLI")]
struct Cli {
    #[arg(long, env = "ESTIMATION_BASE_URL", default_value = "http://127.0.0.1:8090")]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List joinable rooms.
    Rooms,
    /// Show the configured guess catalog.
    Guesses,
    /// Show round and lock state for a room.
    State { room_id: String },
    /// Check whether a name is already taken in a room.
    Exists { room_id: String, name: String },
    /// Join a room and drive the session interactively.
    Join {
        room_id: String,
        name: String,
        #[arg(long, value_enum, default_value = "developer")]
        role: RoleArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RoleArg {
    Developer,
    ProductOwner,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Developer => Self::Developer,
            RoleArg::ProductOwner => Self::ProductOwner,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let directory = Directory::new(cli.base_url.clone());

    match cli.command {
        Command::Rooms => {
            let rooms = directory.fetch_active_rooms().await;
            if rooms.is_empty() {
                println!("no active rooms");
            }
            for room in rooms {
                println!("{} ({} players)", room.id, room.player_count);
            }
            Ok(())
        }
        Command::Guesses => {
            for option in directory.fetch_possible_guesses().await {
                println!("{}: {}", option.guess, option.description);
            }
            Ok(())
        }
        Command::State { room_id } => {
            println!("in progress: {}", directory.round_in_progress(&room_id).await);
            println!("locked: {}", directory.room_is_locked(&room_id).await);
            Ok(())
        }
        Command::Exists { room_id, name } => {
            println!("{}", directory.user_exists(&room_id, &name).await);
            Ok(())
        }
        Command::Join { room_id, name, role } => {
            run_join(&cli.base_url, &room_id, &name, role.into()).await
        }
    }
}

async fn run_join(base_url: &str, room_id: &str, name: &str, role: Role) -> Result<(), CliError> {
    let session = Session::new(base_url);
    session.connect(name, role, room_id).await?;
    session.refresh_permissions().await;
    session.refresh_room_locked().await;

    let mut rx = session.subscribe();
    let printer = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            print_state(&state);
        }
    });

    println!("joined {room_id} as {name}");
    println!("commands: estimate <ticket> | guess <n> | skip | reveal | new-round | lock <password> | open | quit");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }
        match parse_room_command(line, &session.snapshot()) {
            Ok(command) => {
                if let Err(error) = session.send(&command) {
                    eprintln!("{error}");
                    break;
                }
            }
            Err(message) => eprintln!("{message}"),
        }
    }

    session.disconnect().await;
    printer.abort();
    println!("left {room_id}");
    Ok(())
}

fn parse_room_command(line: &str, state: &SessionState) -> Result<RoomCommand, String> {
    let (verb, rest) = match line.split_once(' ') {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    match verb {
        "estimate" if !rest.is_empty() => Ok(RoomCommand::Estimate(rest.to_owned())),
        "estimate" => Err("usage: estimate <ticket>".to_owned()),
        "guess" => rest
            .parse::<i64>()
            .map(RoomCommand::Guess)
            .map_err(|_| "usage: guess <n>".to_owned()),
        "skip" => Ok(RoomCommand::Skip),
        "reveal" => Ok(RoomCommand::Reveal),
        "new-round" => Ok(RoomCommand::NewRound),
        "lock" if !rest.is_empty() => match state.permissions.room.key.clone() {
            Some(key) => Ok(RoomCommand::LockRoom { password: rest.to_owned(), key }),
            None => Err("you have no lock key for this room".to_owned()),
        },
        "lock" => Err("usage: lock <password>".to_owned()),
        "open" => match state.permissions.room.key.clone() {
            Some(key) => Ok(RoomCommand::OpenRoom { key }),
            None => Err("you have no lock key for this room".to_owned()),
        },
        _ => Err(format!("unknown command: {verb}")),
    }
}

fn print_state(state: &SessionState) {
    if !state.connected {
        println!("disconnected");
        return;
    }

    let users = state.users.iter().map(render_user).collect::<Vec<_>>().join(", ");
    let round = &state.round;
    println!(
        "{:?} | ticket: {} | own guess: {}{} | locked: {} | users: [{users}]",
        round.phase,
        if round.ticket.is_empty() { "-" } else { round.ticket.as_str() },
        round.own_guess,
        if round.own_skipped { " (skipped)" } else { "" },
        state.room_locked,
    );
    for revealed in &round.revealed {
        if revealed.do_skip {
            println!("  {}: skipped", revealed.name);
        } else {
            println!("  {}: {}", revealed.name, revealed.guess);
        }
    }
}

fn render_user(user: &UserEntry) -> String {
    match user {
        UserEntry::ProductOwner { name } => format!("{name} (po)"),
        UserEntry::Developer { name, is_done: true } => format!("{name} [done]"),
        UserEntry::Developer { name, is_done: false } => name.clone(),
    }
}
