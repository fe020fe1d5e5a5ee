use anyhow::{Context, Result};
use runstream::api::AssistantsClient;
use runstream::config::{AssistantProfile, Config};
use runstream::error::TurnError;
use runstream::files::UploadError;
use runstream::logging;
use runstream::state::SessionController;
use runstream::tools::default_registry;
use runstream::ui::TerminalRenderer;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
/attach <path>    upload a file and attach it to the next message
/log [comment]    export the chat log with an optional comment
/profile <title>  switch assistant (starts a new conversation)
/profiles         list configured assistants
/reset            clear the chat log (the thread is kept)
/tools            list local tools the assistant may call
/help             show this help
/quit             exit";

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    Reset,
    Profile(&'a str),
    Profiles,
    Attach(&'a str),
    Log(Option<&'a str>),
    Tools,
    Help,
    Unknown(&'a str),
    Message(&'a str),
}

fn parse_command(line: &str) -> Option<Command<'_>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Command::Message(line));
    };
    let (name, argument) = match rest.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (rest, ""),
    };
    let command = match name {
        "quit" | "exit" => Command::Quit,
        "reset" => Command::Reset,
        "profile" => Command::Profile(argument),
        "profiles" => Command::Profiles,
        "attach" => Command::Attach(argument),
        "log" => Command::Log(Some(argument).filter(|comment| !comment.is_empty())),
        "tools" => Command::Tools,
        "help" => Command::Help,
        other => Command::Unknown(other),
    };
    Some(command)
}

fn timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    logging::init()?;

    let config = Config::load()?;
    config.validate()?;

    let transport = Arc::new(AssistantsClient::new(&config));
    let registry = default_registry(config.working_dir.clone())
        .context("failed to build the tool registry")?;
    let mut controller = SessionController::new(transport, registry)
        .with_instructions(config.instructions.clone())
        .with_max_tool_rounds(config.max_tool_rounds);
    let mut renderer = TerminalRenderer::stdout();

    let mut profile: AssistantProfile = config
        .profiles
        .default_profile()
        .cloned()
        .context("no assistant profile configured")?;

    tracing::info!(
        assistant_id = profile.id.as_str(),
        uploads = config.uploads_enabled,
        max_tool_rounds = config.max_tool_rounds,
        "session started"
    );
    renderer.notice(&format!("{} (type /help for commands)", profile.title));
    if config.authentication_required {
        renderer.notice("authentication is expected to be enforced in front of this session");
    }
    if config.uploads_enabled {
        renderer.notice(&format!("{}: /attach <path>", config.upload_message));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = parse_command(&line) else {
            continue;
        };
        match command {
            Command::Quit => break,
            Command::Reset => {
                controller.reset_chat();
                renderer.notice("chat cleared");
            }
            Command::Profiles => {
                for candidate in config.profiles.profiles() {
                    let marker = if candidate.id == profile.id { "*" } else { " " };
                    renderer.notice(&format!("{marker} {}", candidate.title));
                }
            }
            Command::Profile(title) => {
                if !config.profiles.is_multiple() {
                    renderer.notice("only one assistant is configured");
                    continue;
                }
                match config.profiles.find(title) {
                    Some(next) => {
                        profile = next.clone();
                        controller.switch_profile();
                        renderer.notice(&format!("switched to {}", profile.title));
                    }
                    None => renderer.notice(&format!("no assistant titled '{title}'")),
                }
            }
            Command::Attach(path) => {
                if !config.uploads_enabled {
                    renderer.notice(&UploadError::Disabled.to_string());
                    continue;
                }
                if path.is_empty() {
                    renderer.notice("usage: /attach <path>");
                    continue;
                }
                match controller.attach_file(&PathBuf::from(path)).await {
                    Ok(file) => renderer.notice(&format!(
                        "attached {} ({})",
                        file.name.as_deref().unwrap_or(path),
                        file.id
                    )),
                    Err(error) => renderer.notice(&format!("upload failed: {error:#}")),
                }
            }
            Command::Log(comment) => {
                let transcript = controller.transcript(comment);
                if transcript.is_empty() {
                    renderer.notice("nothing to export yet");
                    continue;
                }
                match transcript.write_to_dir(&config.transcript_dir, &timestamp()) {
                    Ok((text, requests)) => renderer.notice(&format!(
                        "log written to {} and {}",
                        text.display(),
                        requests.display()
                    )),
                    Err(error) => renderer.notice(&format!("export failed: {error:#}")),
                }
            }
            Command::Tools => {
                for tool in controller.registry().iter() {
                    renderer.notice(&format!("{}: {}", tool.name(), tool.description()));
                }
            }
            Command::Help => renderer.notice(HELP),
            Command::Unknown(name) => renderer.notice(&format!("unknown command /{name}")),
            Command::Message(text) => {
                match controller.send_message(text, &profile.id, &mut renderer).await {
                    Ok(()) => {}
                    Err(TurnError::Busy) => renderer.notice("a response is still streaming"),
                    // Already rendered as an error entry.
                    Err(_) => {}
                }
            }
        }
    }

    Ok(())
}
