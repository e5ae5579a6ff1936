use crate::models::{DeviceInfo, Role};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "blobchat")]
#[command(author, version, about = "Chat sessions on a blob store, answered by a local model", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create, inspect and delete sessions
    #[command(subcommand)]
    Session(SessionCommand),

    /// Save, list and delete chat messages
    #[command(subcommand)]
    Message(MessageCommand),

    /// Read or replace per-session metadata
    #[command(subcommand)]
    Metadata(MetadataCommand),

    /// Ask the model a question and record both turns in the session
    Query {
        session_id: String,
        question: String,

        /// Model to use (default: ollama.default_model)
        #[arg(short, long)]
        model: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Start a new session
    Create {
        #[arg(long)]
        user_id: Option<String>,

        /// Device details as a JSON object
        #[arg(long, value_parser = parse_device_info)]
        device_info: Option<DeviceInfo>,
    },

    /// Print one session
    Show { session_id: String },

    /// Change mutable session fields
    Update {
        session_id: String,

        #[arg(long)]
        user_id: Option<String>,

        /// Device details as a JSON object
        #[arg(long, value_parser = parse_device_info)]
        device_info: Option<DeviceInfo>,
    },

    /// Most recently updated sessions
    Recent {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Delete a session with its messages and metadata
    Delete { session_id: String },
}

#[derive(Subcommand)]
pub enum MessageCommand {
    /// Append a message to a session
    Save {
        session_id: String,
        text: String,

        /// user, model or system
        #[arg(short, long, default_value = "user")]
        role: Role,

        #[arg(long)]
        tokens_used: Option<u32>,

        #[arg(long)]
        model_version: Option<String>,
    },

    /// Messages of a session, oldest first
    List {
        session_id: String,

        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(short, long, default_value = "0")]
        offset: usize,
    },

    /// Print one message
    Show {
        session_id: String,
        message_id: String,
    },

    /// Delete one message
    Delete {
        session_id: String,
        message_id: String,
    },

    /// Number of messages stored for a session
    Count { session_id: String },
}

#[derive(Subcommand)]
pub enum MetadataCommand {
    /// Replace the metadata object (omitted fields are cleared)
    Set {
        session_id: String,

        #[arg(long)]
        extension_version: Option<String>,

        #[arg(long)]
        cluster_used: Option<String>,
    },

    /// Print the metadata of a session
    Show { session_id: String },
}

fn parse_device_info(raw: &str) -> Result<DeviceInfo, String> {
    serde_json::from_str(raw).map_err(|e| format!("device info must be a JSON object: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_message_save() {
        let cli = Cli::parse_from([
            "blobchat", "message", "save", "s1", "hello", "--role", "model", "--tokens-used", "9",
        ]);
        match cli.command {
            Commands::Message(MessageCommand::Save {
                session_id,
                text,
                role,
                tokens_used,
                model_version,
            }) => {
                assert_eq!(session_id, "s1");
                assert_eq!(text, "hello");
                assert_eq!(role, Role::Model);
                assert_eq!(tokens_used, Some(9));
                assert!(model_version.is_none());
            }
            _ => panic!("expected message save"),
        }
    }

    #[test]
    fn test_parse_device_info() {
        let cli = Cli::parse_from([
            "blobchat",
            "session",
            "create",
            "--device-info",
            r#"{"os":"linux","ide":"vscode"}"#,
        ]);
        match cli.command {
            Commands::Session(SessionCommand::Create { device_info, .. }) => {
                let device_info = device_info.unwrap();
                assert_eq!(device_info["os"], "linux");
            }
            _ => panic!("expected session create"),
        }

        assert!(parse_device_info("[1,2]").is_err());
    }

    #[test]
    fn test_rejects_unknown_role() {
        let result =
            Cli::try_parse_from(["blobchat", "message", "save", "s1", "x", "--role", "assistant"]);
        assert!(result.is_err());
    }
}
