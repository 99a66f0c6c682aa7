//! chathub CLI client
//!
//! A command-line client that talks to the chathub daemon over framed TCP.
//! Plain lines are chat messages; lines starting with `/` are commands.
//! Uses rustyline for readline-style editing and history.

use clap::Parser;
use rmp_serde::decode::Deserializer;
use rmp_serde::encode::Serializer;
use rustyline::Editor;
use rustyline::history::FileHistory;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Message types
#[derive(Debug, Clone, Copy)]
#[repr(u8)]
enum MsgType {
    Request = 0x01,
    RequestAck = 0x02,
    Event = 0x03,
}

/// One conversation turn
#[derive(Debug, Clone, Serialize)]
struct ChatTurn {
    role: String,
    content: String,
}

/// Request payload
#[derive(Debug, Serialize)]
enum ClientCommand {
    Chat {
        model: Option<String>,
        messages: Vec<ChatTurn>,
    },
    Execute {
        language: String,
        code: String,
    },
    CallTool {
        name: String,
        input: String,
    },
    ListTools,
    ListModels,
    ListArtifacts,
    GetArtifact {
        id: String,
    },
    DeleteArtifact {
        id: String,
    },
}

/// Event payload
#[derive(Debug, Deserialize)]
struct EventPayload {
    event: String,
    data: String,
}

/// CLI arguments
#[derive(Debug, Parser)]
#[command(name = "chathub-cli")]
#[command(about = "chathub daemon CLI client")]
struct Args {
    /// Daemon address (e.g., 127.0.0.1:3001)
    #[arg(short, long, default_value = "127.0.0.1:3001")]
    target: SocketAddr,

    /// ACK timeout in seconds
    #[arg(long, default_value = "5")]
    timeout: u64,

    /// Model for chat messages (daemon default if unset)
    #[arg(short, long)]
    model: Option<String>,

    /// History file path
    #[arg(long)]
    history_file: Option<PathBuf>,
}

/// CLI configuration
#[derive(Debug, Clone)]
struct Config {
    target: SocketAddr,
    ack_timeout_secs: u64,
    history_file: PathBuf,
}

impl Config {
    fn from_args(args: &Args) -> Self {
        let history_file = args.history_file.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|p| p.join(".chathub_history"))
                .unwrap_or_else(|| PathBuf::from(".chathub_history"))
        });

        Self {
            target: args.target,
            ack_timeout_secs: args.timeout,
            history_file,
        }
    }
}

/// How long to keep listening for artifact notifications after a chat ends
const TRAILING_EVENT_WINDOW: Duration = Duration::from_millis(1500);

/// Longest wait between two events of one request
const EVENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Largest frame the client accepts
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Main client state
struct Client {
    stream: TcpStream,
    config: Config,
    seq: u32,
    model: Option<String>,
    conversation: Vec<ChatTurn>,
}

impl Client {
    /// Connect to the daemon
    async fn connect(config: Config, model: Option<String>) -> io::Result<Self> {
        let stream = TcpStream::connect(config.target).await?;

        Ok(Self {
            stream,
            config,
            seq: 1,
            model,
            conversation: Vec::new(),
        })
    }

    /// Send a command and print its events until the request is done
    async fn run_command(&mut self, command: ClientCommand) -> io::Result<()> {
        let is_chat = matches!(command, ClientCommand::Chat { .. });
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);

        // Serialize payload
        let mut packet = vec![MsgType::Request as u8];
        packet.extend_from_slice(&seq.to_be_bytes());
        let mut ser = Serializer::new(&mut packet);
        command
            .serialize(&mut ser)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        self.write_frame(&packet).await?;
        self.wait_for_ack(seq).await?;

        let mut reply = String::new();
        loop {
            let Some(event) = self.next_event(seq, EVENT_TIMEOUT).await? else {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "no reply from daemon"));
            };
            match event.event.as_str() {
                "messageResponse" => {
                    let data: serde_json::Value = parse_data(&event.data)?;
                    if let Some(delta) = data["message"]["content"].as_str() {
                        print!("{}", delta);
                        io::stdout().flush()?;
                        reply.push_str(delta);
                    }
                }
                "messageComplete" => {
                    println!();
                    self.conversation.push(ChatTurn {
                        role: "assistant".to_string(),
                        content: std::mem::take(&mut reply),
                    });
                    self.drain_trailing(seq).await?;
                    return Ok(());
                }
                "messageError" | "requestError" => {
                    if !reply.is_empty() {
                        println!();
                    }
                    let data: serde_json::Value = parse_data(&event.data)?;
                    println!("[error] {}", data["error"].as_str().unwrap_or(&event.data));
                    if is_chat {
                        // Drop the unanswered user turn
                        self.conversation.pop();
                    }
                    return Ok(());
                }
                "artifactCreated" => print_artifact_created(&event.data)?,
                _ => {
                    print_event(&event)?;
                    return Ok(());
                }
            }
        }
    }

    /// Print artifact notifications that arrive shortly after a chat ends
    async fn drain_trailing(&mut self, seq: u32) -> io::Result<()> {
        while let Some(event) = self.next_event(seq, TRAILING_EVENT_WINDOW).await? {
            if event.event == "artifactCreated" {
                print_artifact_created(&event.data)?;
            }
        }
        Ok(())
    }

    /// Wait for REQUEST_ACK
    async fn wait_for_ack(&mut self, expected_seq: u32) -> io::Result<()> {
        let wait = Duration::from_secs(self.config.ack_timeout_secs);
        loop {
            let packet = match timeout(wait, self.read_frame()).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "chathub not responding",
                    ));
                }
            };
            let (msg_type, seq) = split_header(&packet)?;
            if msg_type == MsgType::RequestAck as u8 && seq == expected_seq {
                return Ok(());
            }
            // An undecodable request is answered with an event instead of an ack
            if msg_type == MsgType::Event as u8 && seq == expected_seq {
                let event = decode_event(&packet)?;
                let data: serde_json::Value = parse_data(&event.data)?;
                return Err(io::Error::other(
                    data["error"].as_str().unwrap_or(&event.data).to_string(),
                ));
            }
        }
    }

    /// Next event for `expected_seq`, or `None` once `wait` elapses
    async fn next_event(
        &mut self,
        expected_seq: u32,
        wait: Duration,
    ) -> io::Result<Option<EventPayload>> {
        loop {
            let packet = match timeout(wait, self.read_frame()).await {
                Ok(result) => result?,
                Err(_) => return Ok(None),
            };
            let (msg_type, seq) = split_header(&packet)?;
            if msg_type == MsgType::Event as u8 && seq == expected_seq {
                return decode_event(&packet).map(Some);
            }
        }
    }

    async fn write_frame(&mut self, packet: &[u8]) -> io::Result<()> {
        let len = u32::try_from(packet.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "request too large"))?;
        self.stream.write_all(&len.to_be_bytes()).await?;
        self.stream.write_all(packet).await?;
        self.stream.flush().await
    }

    async fn read_frame(&mut self) -> io::Result<Vec<u8>> {
        let len = self.stream.read_u32().await? as usize;
        if len > MAX_FRAME_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame too large: {} bytes", len),
            ));
        }
        let mut packet = vec![0u8; len];
        self.stream.read_exact(&mut packet).await?;
        Ok(packet)
    }
}

fn split_header(packet: &[u8]) -> io::Result<(u8, u32)> {
    if packet.len() < 5 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Packet too short",
        ));
    }
    Ok((
        packet[0],
        u32::from_be_bytes([packet[1], packet[2], packet[3], packet[4]]),
    ))
}

fn decode_event(packet: &[u8]) -> io::Result<EventPayload> {
    let mut de = Deserializer::new(&packet[5..]);
    Deserialize::deserialize(&mut de).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn parse_data(data: &str) -> io::Result<serde_json::Value> {
    serde_json::from_str(data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn print_artifact_created(data: &str) -> io::Result<()> {
    let artifact = parse_data(data)?;
    println!(
        "[artifact] {} ({}, {} bytes) {}",
        artifact["name"].as_str().unwrap_or("?"),
        artifact["mimeType"].as_str().unwrap_or("?"),
        artifact["sizeBytes"].as_u64().unwrap_or(0),
        artifact["publicUrl"].as_str().unwrap_or("")
    );
    Ok(())
}

fn print_event(event: &EventPayload) -> io::Result<()> {
    let data = parse_data(&event.data)?;
    match event.event.as_str() {
        "executionResult" => {
            let output = data["output"].as_str().unwrap_or("");
            if !output.is_empty() {
                print!("{}", output);
                if !output.ends_with('\n') {
                    println!();
                }
            }
            if data["success"].as_bool() != Some(true) {
                println!("[error] {}", data["error"].as_str().unwrap_or("execution failed"));
            }
        }
        "toolResult" => {
            let tag = if data["isError"].as_bool() == Some(true) {
                "[tool error]"
            } else {
                "[tool]"
            };
            println!("{} {}", tag, data["content"].as_str().unwrap_or(""));
        }
        "models" => {
            for model in data["models"].as_array().into_iter().flatten() {
                println!("  {}", model["name"].as_str().unwrap_or("?"));
            }
        }
        "tools" => {
            for tool in data.as_array().into_iter().flatten() {
                println!(
                    "  {} - {}",
                    tool["name"].as_str().unwrap_or("?"),
                    tool["description"].as_str().unwrap_or("")
                );
            }
        }
        "artifacts" => {
            let artifacts = data.as_array().cloned().unwrap_or_default();
            if artifacts.is_empty() {
                println!("  (no artifacts)");
            }
            for artifact in artifacts {
                println!(
                    "  {}  {}  {}",
                    artifact["id"].as_str().unwrap_or("?"),
                    artifact["name"].as_str().unwrap_or("?"),
                    artifact["mimeType"].as_str().unwrap_or("?")
                );
            }
        }
        "artifactDeleted" => {
            if data["deleted"].as_bool() == Some(true) {
                println!("deleted {}", data["id"].as_str().unwrap_or("?"));
            } else {
                println!("no artifact {}", data["id"].as_str().unwrap_or("?"));
            }
        }
        _ => {
            let pretty = serde_json::to_string_pretty(&data)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            println!("{}", pretty);
        }
    }
    Ok(())
}

const HELP: &str = "\
Commands:
  <text>                  send a chat message
  /exec <lang> <code>     run code (python, javascript, bash)
  /tool <name> <json>     call a tool
  /tools                  list tools
  /models                 list models
  /model <name>           switch chat model
  /artifacts              list artifacts
  /artifact <id>          show one artifact
  /delete <id>            delete an artifact
  /reset                  forget the conversation
  /help                   show this help";

/// What to do with one input line
enum Action {
    Send(ClientCommand),
    Local(String),
}

fn parse_line(client: &mut Client, input: &str) -> Action {
    let Some(rest) = input.strip_prefix('/') else {
        client.conversation.push(ChatTurn {
            role: "user".to_string(),
            content: input.to_string(),
        });
        return Action::Send(ClientCommand::Chat {
            model: client.model.clone(),
            messages: client.conversation.clone(),
        });
    };

    let (name, args) = rest.split_once(' ').unwrap_or((rest, ""));
    let args = args.trim();
    match name {
        "exec" => match args.split_once(' ') {
            Some((language, code)) => Action::Send(ClientCommand::Execute {
                language: language.to_string(),
                code: code.replace("\\n", "\n"),
            }),
            None => Action::Local("usage: /exec <lang> <code>".to_string()),
        },
        "tool" => {
            let (tool, input) = args.split_once(' ').unwrap_or((args, "{}"));
            if tool.is_empty() {
                return Action::Local("usage: /tool <name> <json>".to_string());
            }
            Action::Send(ClientCommand::CallTool {
                name: tool.to_string(),
                input: input.to_string(),
            })
        }
        "tools" => Action::Send(ClientCommand::ListTools),
        "models" => Action::Send(ClientCommand::ListModels),
        "artifacts" => Action::Send(ClientCommand::ListArtifacts),
        "artifact" if !args.is_empty() => Action::Send(ClientCommand::GetArtifact {
            id: args.to_string(),
        }),
        "delete" if !args.is_empty() => Action::Send(ClientCommand::DeleteArtifact {
            id: args.to_string(),
        }),
        "model" if !args.is_empty() => {
            client.model = Some(args.to_string());
            Action::Local(format!("model set to {}", args))
        }
        "reset" => {
            client.conversation.clear();
            Action::Local("conversation cleared".to_string())
        }
        "help" => Action::Local(HELP.to_string()),
        _ => Action::Local(format!("unknown command /{} (try /help)", name)),
    }
}

fn main() -> io::Result<()> {
    // Parse arguments
    let args = Args::parse();
    let config = Config::from_args(&args);

    // Check locale
    if let Ok(lang) = std::env::var("LANG")
        && !lang.to_lowercase().contains("utf-8")
        && !lang.to_lowercase().contains("utf8")
    {
        eprintln!(
            "[warning] Terminal locale is not UTF-8. Non-ASCII characters may not display correctly."
        );
    }

    // Build runtime for async network operations
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { run_client(config, args.model).await })
}

async fn run_client(config: Config, model: Option<String>) -> io::Result<()> {
    let mut client = Client::connect(config.clone(), model).await?;

    // Initialize rustyline with history
    let mut rl: Editor<(), FileHistory> = Editor::new().map_err(io::Error::other)?;

    if config.history_file.exists()
        && let Err(e) = rl.load_history(&config.history_file)
    {
        eprintln!("[warning] Failed to load history: {}", e);
    }

    println!("chathub-cli v{}", env!("CARGO_PKG_VERSION"));
    println!("Target: {}", config.target);
    println!("Type a message and press Enter, /help for commands. Ctrl+D to quit.");
    println!();

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(input);

                match parse_line(&mut client, input) {
                    Action::Local(message) => println!("{}", message),
                    Action::Send(command) => {
                        if let Err(e) = client.run_command(command).await {
                            println!("[error] {}", e);
                            if e.kind() == io::ErrorKind::UnexpectedEof {
                                break;
                            }
                        }
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                // Ctrl+C - cancel current input, continue
                println!("^C");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                // Ctrl+D - exit
                break;
            }
            Err(e) => {
                eprintln!("[error] Readline error: {}", e);
                break;
            }
        }
    }

    if let Err(e) = rl.save_history(&config.history_file) {
        eprintln!("[warning] Failed to save history: {}", e);
    }

    println!("\nGoodbye!");
    Ok(())
}
