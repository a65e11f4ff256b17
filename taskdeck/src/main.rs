//! taskdeck — task-management client with live sync.
//!
//! Connects to the task service over REST and a WebSocket live-event
//! channel, then runs an interactive command loop. Configuration via
//! CLI flags, environment variables, or config file
//! (`~/.config/taskdeck/config.toml`).
//!
//! ```bash
//! cargo run --bin taskdeck -- --server-url http://127.0.0.1:8000 \
//!     --token alice-token --user-id 1
//!
//! # Or via environment variables
//! TASKDECK_SERVER=http://127.0.0.1:8000 TASKDECK_TOKEN=t TASKDECK_USER_ID=1 cargo run
//! ```

use std::path::Path;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use taskdeck::config::{CliArgs, ClientConfig};
use taskdeck::net::{self, NetCommand, NetEvent};
use taskdeck::socket::ConnState;
use taskdeck_proto::filter::{FilterCriteria, StatusFilter};
use taskdeck_proto::task::{Priority, Task, TaskDraft, TaskId, TaskPatch};

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!("taskdeck starting");

    let Some(net_config) = config.to_net_config() else {
        eprintln!("Missing --server-url, --token, or --user-id (see --help)");
        std::process::exit(2);
    };

    let (cmd_tx, evt_rx) = match net::spawn_net(net_config).await {
        Ok(handles) => handles,
        Err(e) => {
            eprintln!("Could not connect to the task service: {e}");
            std::process::exit(1);
        }
    };

    run_repl(cmd_tx, evt_rx).await;
    tracing::info!("taskdeck exiting");
}

/// Initialize logging to stderr, or to a file when `--log-file` is given.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown so buffered
/// entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if let Some(log_path) = file_path {
        let log_dir = log_path.parent()?;
        let file_name = log_path.file_name()?.to_str()?;
        let file_appender = tracing_appender::rolling::never(log_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::fmt()
            .with_writer(non_blocking)
            .with_env_filter(env_filter)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .init();
        None
    }
}

/// Interactive loop: commands from stdin, events from the coordinator.
async fn run_repl(cmd_tx: mpsc::Sender<NetCommand>, mut evt_rx: mpsc::Receiver<NetEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    // The latest snapshot, indexed by display position for `mv`/`done`.
    let mut current: Vec<Task> = Vec::new();

    println!("taskdeck ready — type 'help' for commands");
    loop {
        tokio::select! {
            event = evt_rx.recv() => {
                match event {
                    Some(event) => render_event(&event, &mut current),
                    None => {
                        println!("Session ended.");
                        break;
                    }
                }
            }
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                match parse_command(&line, &current) {
                    Ok(Some(cmd)) => {
                        let quitting = matches!(cmd, NetCommand::Shutdown);
                        if cmd_tx.send(cmd).await.is_err() || quitting {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(msg) => println!("{msg}"),
                }
            }
        }
    }
    let _ = cmd_tx.try_send(NetCommand::Shutdown);
}

fn render_event(event: &NetEvent, current: &mut Vec<Task>) {
    match event {
        NetEvent::Snapshot(tasks) => {
            *current = tasks.clone();
            print_tasks(current);
        }
        NetEvent::Notice(notice) => println!("* {notice}"),
        NetEvent::ConnectionStatus(state) => match state {
            ConnState::Connected => println!("* live updates connected"),
            ConnState::Connecting => println!("* connecting..."),
            ConnState::Disconnected => println!("* live updates disconnected"),
        },
        NetEvent::Error(msg) => println!("! {msg}"),
    }
}

fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("(no tasks)");
        return;
    }
    for (index, task) in tasks.iter().enumerate() {
        let mark = if task.completed { "x" } else { " " };
        let category = task
            .category
            .as_deref()
            .map(|c| format!(" [{c}]"))
            .unwrap_or_default();
        let due = task
            .due_date
            .map(|d| format!(" due {d}"))
            .unwrap_or_default();
        println!("{index:>3}. [{mark}] {}{category}{due}", task.title);
    }
}

/// Parses one input line into a command. `Ok(None)` means nothing to
/// send (blank line, local help).
fn parse_command(line: &str, current: &[Task]) -> Result<Option<NetCommand>, String> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((v, r)) => (v, r.trim()),
        None => (line, ""),
    };

    let command = match verb {
        "" => return Ok(None),
        "help" => {
            print_help();
            return Ok(None);
        }
        "list" | "refresh" => NetCommand::Refresh,
        "add" => NetCommand::CreateTask(parse_draft(rest)?),
        "edit" => {
            let (index, title) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "usage: edit <n> <new title>".to_string())?;
            let id = index_to_id(index, current)?;
            NetCommand::UpdateTask {
                id,
                patch: TaskPatch {
                    title: Some(title.trim().to_string()),
                    ..TaskPatch::default()
                },
            }
        }
        "done" => NetCommand::ToggleComplete {
            id: index_to_id(rest, current)?,
        },
        "rm" => NetCommand::DeleteTask(index_to_id(rest, current)?),
        "mv" => {
            let (source, dest) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "usage: mv <from> <to>".to_string())?;
            NetCommand::Move {
                source: parse_index(source)?,
                dest: parse_index(dest.trim())?,
            }
        }
        "filter" => NetCommand::Filter(parse_filter(rest)?),
        "clear" => NetCommand::ClearFilter,
        "quit" | "exit" => NetCommand::Shutdown,
        other => return Err(format!("unknown command '{other}' (try 'help')")),
    };
    Ok(Some(command))
}

fn print_help() {
    println!("commands:");
    println!("  list                     show tasks (re-fetches)");
    println!("  add <title> [cat=C] [due=YYYY-MM-DD] [pri=high|medium|low]");
    println!("  edit <n> <title>         retitle task at display index n");
    println!("  done <n>                 toggle completion");
    println!("  rm <n>                   delete");
    println!("  mv <from> <to>           drag a task to a new slot");
    println!("  filter [search=S] [category=C] [status=complete|incomplete]");
    println!("  clear                    drop all filters");
    println!("  quit");
}

fn parse_index(value: &str) -> Result<usize, String> {
    value
        .parse()
        .map_err(|_| format!("'{value}' is not an index"))
}

fn index_to_id(value: &str, current: &[Task]) -> Result<TaskId, String> {
    let index = parse_index(value)?;
    current
        .get(index)
        .map(|t| t.id)
        .ok_or_else(|| format!("no task at index {index}"))
}

/// Parses an `add` line: title words plus optional trailing
/// `cat=`, `due=`, and `pri=` tokens anywhere in the line.
fn parse_draft(rest: &str) -> Result<TaskDraft, String> {
    let mut draft = TaskDraft::default();
    let mut title_words: Vec<&str> = Vec::new();
    for word in rest.split_whitespace() {
        match word.split_once('=') {
            Some(("cat", v)) => draft.category = Some(v.to_string()),
            Some(("due", v)) => {
                let date = chrono::NaiveDate::parse_from_str(v, "%Y-%m-%d")
                    .map_err(|_| format!("'{v}' is not a date (expected YYYY-MM-DD)"))?;
                draft.due_date = Some(date);
            }
            Some(("pri", v)) => {
                draft.priority = Some(match v.to_ascii_lowercase().as_str() {
                    "high" => Priority::High,
                    "medium" => Priority::Medium,
                    "low" => Priority::Low,
                    other => return Err(format!("'{other}' is not a priority")),
                });
            }
            _ => title_words.push(word),
        }
    }
    if title_words.is_empty() {
        return Err("usage: add <title> [cat=C] [due=YYYY-MM-DD] [pri=high|medium|low]".to_string());
    }
    draft.title = title_words.join(" ");
    Ok(draft)
}

/// Parses `key=value` filter terms; a bare term becomes a search.
fn parse_filter(rest: &str) -> Result<FilterCriteria, String> {
    let mut criteria = FilterCriteria::default();
    for term in rest.split_whitespace() {
        match term.split_once('=') {
            Some(("search", v)) => criteria.search = Some(v.to_string()),
            Some(("category", v)) => criteria.category = Some(v.to_string()),
            Some(("status", v)) => criteria.status = Some(StatusFilter::parse(v)),
            Some((key, _)) => return Err(format!("unknown filter key '{key}'")),
            None => criteria.search = Some(term.to_string()),
        }
    }
    Ok(criteria)
}
