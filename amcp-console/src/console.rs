//! Line-by-line command loop.
//!
//! Every input line is sent as one command; the status line and body are
//! echoed back. A few `:`-prefixed words are handled locally.

use amcp_core::Connection;
use futures::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Send verbatim to the server.
    Command(String),
    /// `:version`: query and pretty-print the server version.
    Version,
    /// `:status`: print the current connectivity.
    Status,
    /// `:quit`, `:exit`
    Quit,
    /// Blank line.
    Empty,
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    match line {
        "" => Input::Empty,
        ":version" => Input::Version,
        ":status" => Input::Status,
        ":quit" | ":exit" => Input::Quit,
        command => Input::Command(command.to_string()),
    }
}

/// Run until `input` is exhausted or the user quits.
pub async fn run<R, W>(conn: &Connection, input: R, mut out: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::Status => {
                let state = if conn.is_connected() { "connected" } else { "disconnected" };
                out.write_all(format!("{} {state}\n", conn.endpoint()).as_bytes()).await?;
            }
            Input::Version => match conn.version().await {
                Ok(version) => out.write_all(format!("version {version}\n").as_bytes()).await?,
                Err(e) => out.write_all(format!("error: {e}\n").as_bytes()).await?,
            },
            Input::Command(command) => execute(conn, &command, &mut out).await?,
        }
        out.flush().await?;
    }
    out.flush().await
}

async fn execute<W>(conn: &Connection, command: &str, out: &mut W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut reply = match conn.send(command).await {
        Ok(reply) => reply,
        Err(e) => return out.write_all(format!("error: {e}\n").as_bytes()).await,
    };

    let status = reply.status().await.unwrap_or_default().to_string();
    out.write_all(format!("{status}\n").as_bytes()).await?;

    while let Some(line) = reply.next().await {
        let text = match line {
            Ok(line) => format!("  {line}\n"),
            Err(e) => format!("error: {e}\n"),
        };
        out.write_all(text.as_bytes()).await?;
    }
    Ok(())
}
