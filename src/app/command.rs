#[cfg(test)]
#[path = "command_test.rs"]
mod tests;

use std::path::PathBuf;

use thiserror::Error;

pub const HELP: &str = r#"Type a message and press Enter to send it. End a line with \ to keep writing.

Commands:
    /new [prefix]       let the bot speak next, optionally continuing prefix
    /cancel             stop the reply being generated
    /remove             remove the last message
    /swipe              drop the last reply and generate another one
    /reset              start over
    /summarize          summarize the conversation
    /upload <path>...   add files to the draft as code blocks
    /copy               copy the last reply to the clipboard
    /reload             reload the conversation from the server
    /help               show this help
    /quit               exit

Start a message with // to send a literal leading /."#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Submit(String),
    New(Option<String>),
    Cancel,
    Remove,
    Swipe,
    Reset,
    Summarize,
    Upload(Vec<PathBuf>),
    Copy,
    Reload,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command /{0}, try /help")]
    Unknown(String),

    #[error("/{command} needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
}

pub fn parse(line: &str) -> Result<UserCommand, CommandError> {
    if let Some(escaped) = line.strip_prefix("//") {
        return Ok(UserCommand::Submit(format!("/{}", escaped)));
    }

    let Some(command) = line.trim_start().strip_prefix('/') else {
        return Ok(UserCommand::Submit(line.to_string()));
    };

    let (name, args) = match command.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (command.trim_end(), ""),
    };

    let cmd = match name {
        "new" | "n" => UserCommand::New(Some(args.to_string()).filter(|a| !a.is_empty())),
        "cancel" | "c" => UserCommand::Cancel,
        "remove" | "rm" => UserCommand::Remove,
        "swipe" | "s" => UserCommand::Swipe,
        "reset" => UserCommand::Reset,
        "summarize" | "sum" => UserCommand::Summarize,
        "upload" | "u" => {
            let paths = args
                .split_whitespace()
                .map(PathBuf::from)
                .collect::<Vec<_>>();
            if paths.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "upload",
                    argument: "at least one path",
                });
            }
            UserCommand::Upload(paths)
        }
        "copy" | "y" => UserCommand::Copy,
        "reload" => UserCommand::Reload,
        "help" | "h" | "?" => UserCommand::Help,
        "quit" | "q" | "exit" => UserCommand::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(cmd)
}
