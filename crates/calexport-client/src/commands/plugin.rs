//! Commands that talk to a running daemon.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Local, Utc};

use calexport_core::{EventDraft, Program};
use calexport_protocol::{PluginMenu, Request, Response};
use calexport_server::{EXPORT_MENU_ID, UNMARK_MENU_ID};

use crate::error::{ClientError, ClientResult};
use crate::socket::SocketClient;

/// Reads a program from a JSON file, or from stdin when `path` is `-`.
pub fn read_program(path: &Path) -> ClientResult<Program> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| ClientError::Input(format!("failed to read stdin: {}", e)))?;
        buf
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| ClientError::Input(format!("failed to read {}: {}", path.display(), e)))?
    };

    parse_program(&content)
}

fn parse_program(content: &str) -> ClientResult<Program> {
    let program: Program = serde_json::from_str(content)
        .map_err(|e| ClientError::Input(format!("invalid program JSON: {}", e)))?;
    if program.end < program.start {
        return Err(ClientError::Input(format!(
            "program {} ends before it starts",
            program.id
        )));
    }
    Ok(program)
}

fn unexpected(response: Response) -> ClientError {
    ClientError::UnexpectedResponse(format!("{:?}", response))
}

fn local_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Renders a draft the way `draft` prints it.
pub fn format_draft(draft: &EventDraft) -> String {
    let mut out = format!("title:    {}\n", draft.title);
    if let Some(location) = &draft.location {
        out.push_str(&format!("location: {}\n", location));
    }
    out.push_str(&format!("start:    {}\n", local_time(draft.start)));
    out.push_str(&format!("end:      {}\n", local_time(draft.end)));
    if let Some(description) = &draft.description {
        out.push('\n');
        out.push_str(description);
        out.push('\n');
    }
    out
}

/// Prints the event a program would become.
pub async fn draft(client: &SocketClient, path: &Path) -> ClientResult<()> {
    let program = read_program(path)?;
    match client.call(Request::derive_draft(program)).await? {
        Response::Draft { draft } => {
            print!("{}", format_draft(&draft));
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

/// Prints the context menu entries offered for a program.
pub async fn menu(client: &SocketClient, path: &Path) -> ClientResult<()> {
    let program = read_program(path)?;
    match client.call(Request::context_menu_actions(program)).await? {
        Response::MenuActions { actions } if actions.is_empty() => {
            println!("No actions.");
            Ok(())
        }
        Response::MenuActions { actions } => {
            for action in actions {
                println!("{:>3}  {}", action.id, action.title);
            }
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

async fn select(client: &SocketClient, program: Program, menu_id: i32) -> ClientResult<bool> {
    let menu = PluginMenu::new(menu_id, "");
    match client
        .call(Request::context_menu_selected(program, menu))
        .await?
    {
        Response::Handled { handled } => Ok(handled),
        other => Err(unexpected(other)),
    }
}

/// Exports a program and reports whether it is now marked.
pub async fn export(client: &SocketClient, path: &Path) -> ClientResult<()> {
    let program = read_program(path)?;
    let id = program.id;
    if select(client, program, EXPORT_MENU_ID).await? {
        println!("Exported program {}.", id);
    } else {
        println!("Program {} was not exported.", id);
    }
    Ok(())
}

/// Removes the marking of a program.
pub async fn unmark(client: &SocketClient, path: &Path) -> ClientResult<()> {
    let program = read_program(path)?;
    let id = program.id;
    select(client, program, UNMARK_MENU_ID).await?;

    match client.call(Request::is_marked(id)).await? {
        Response::Marked { marked: false } => println!("Program {} is no longer marked.", id),
        Response::Marked { marked: true } => println!("Program {} is still marked.", id),
        other => return Err(unexpected(other)),
    }
    Ok(())
}

/// Lists marked program ids, one per line.
pub async fn marked(client: &SocketClient) -> ClientResult<()> {
    match client.call(Request::GetMarkedPrograms).await? {
        Response::MarkedPrograms { ids } => {
            for id in ids {
                println!("{}", id);
            }
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

/// Reconciles the ledger against the lowest id the caller still knows.
/// With `persist`, the pruned set is written to the store right away.
pub async fn prune(client: &SocketClient, first_known_id: i64, persist: bool) -> ClientResult<()> {
    match client
        .call(Request::first_known_program_id(first_known_id))
        .await?
    {
        Response::Ok => {}
        other => return Err(unexpected(other)),
    }
    if persist {
        match client.call(Request::FlushMarkings).await? {
            Response::Ok => {}
            other => return Err(unexpected(other)),
        }
    }
    marked(client).await
}

/// Prints plugin metadata.
pub async fn info(client: &SocketClient) -> ClientResult<()> {
    match client.call(Request::GetInfo).await? {
        Response::Info { info } => {
            println!("{} {}", info.name, info.version);
            println!("author:  {}", info.author);
            println!("license: {}", info.license);
            println!("{}", info.description);
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

/// Checks that the daemon answers.
pub async fn ping(client: &SocketClient) -> ClientResult<()> {
    match client.send(Request::Ping).await? {
        Response::Pong => {
            println!("Daemon is running ({}).", client.socket_path().display());
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

/// Asks the daemon to shut down.
pub async fn stop(client: &SocketClient) -> ClientResult<()> {
    match client.call(Request::Shutdown).await? {
        Response::Ok => {
            println!("Daemon stopping.");
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}
