use anyhow::Result;
use blobchat::cli::{Cli, Commands, MessageCommand, MetadataCommand, SessionCommand};
use blobchat::{utils, AppContext, Page, SessionPatch, Settings, StoreError};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::new()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let context = AppContext::init(settings).await?;

    if let Err(e) = run(&context, cli.command).await {
        match e.downcast_ref::<StoreError>() {
            Some(store_error) if store_error.is_not_found() => {
                utils::print_warning(&store_error.to_string());
            }
            Some(store_error) => utils::print_error(&format!(
                "[{}] {}{}",
                store_error.boundary_status(),
                store_error,
                if store_error.is_retryable() {
                    " (retryable)"
                } else {
                    ""
                }
            )),
            None => utils::print_error(&e.to_string()),
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(context: &AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::Session(command) => handle_session(context, command).await,
        Commands::Message(command) => handle_message(context, command).await,
        Commands::Metadata(command) => handle_metadata(context, command).await,
        Commands::Query {
            session_id,
            question,
            model,
        } => handle_query(context, session_id, question, model).await,
    }
}

async fn handle_session(context: &AppContext, command: SessionCommand) -> Result<()> {
    let service = context.service();

    match command {
        SessionCommand::Create {
            user_id,
            device_info,
        } => {
            let created = service.create_session(user_id, device_info).await?;
            utils::print_json(&created)?;
        }
        SessionCommand::Show { session_id } => {
            let session = service
                .get_session(&session_id)
                .await?
                .ok_or_else(|| StoreError::not_found("session", &session_id))?;
            utils::print_json(&session)?;
        }
        SessionCommand::Update {
            session_id,
            user_id,
            device_info,
        } => {
            let patch = SessionPatch {
                user_id,
                device_info,
            };
            if patch.is_empty() {
                utils::print_warning("No fields given; only updated_at will change");
            }
            let session = service.update_session(&session_id, patch).await?;
            utils::print_json(&session)?;
        }
        SessionCommand::Recent { limit } => {
            let sessions = service.recent_sessions(limit).await?;
            utils::print_json(&sessions)?;
        }
        SessionCommand::Delete { session_id } => {
            service.delete_session(&session_id).await?;
            utils::print_success(&format!("Deleted session {}", session_id));
        }
    }
    Ok(())
}

async fn handle_message(context: &AppContext, command: MessageCommand) -> Result<()> {
    let service = context.service();

    match command {
        MessageCommand::Save {
            session_id,
            text,
            role,
            tokens_used,
            model_version,
        } => {
            let message = service
                .save_message(&session_id, role, &text, tokens_used, model_version)
                .await?;
            utils::print_json(&message)?;
        }
        MessageCommand::List {
            session_id,
            limit,
            offset,
        } => {
            let page = service
                .list_messages(&session_id, Page::new(limit, offset))
                .await?;
            utils::print_json(&page)?;
        }
        MessageCommand::Show {
            session_id,
            message_id,
        } => {
            let message = service
                .get_message(&session_id, &message_id)
                .await?
                .ok_or_else(|| StoreError::not_found("message", &message_id))?;
            utils::print_json(&message)?;
        }
        MessageCommand::Delete {
            session_id,
            message_id,
        } => {
            service.delete_message(&session_id, &message_id).await?;
            utils::print_success(&format!("Deleted message {}", message_id));
        }
        MessageCommand::Count { session_id } => {
            let count = service.message_count(&session_id).await?;
            println!("{}", count);
        }
    }
    Ok(())
}

async fn handle_metadata(context: &AppContext, command: MetadataCommand) -> Result<()> {
    let service = context.service();

    match command {
        MetadataCommand::Set {
            session_id,
            extension_version,
            cluster_used,
        } => {
            let metadata = service
                .upsert_metadata(&session_id, extension_version, cluster_used)
                .await?;
            utils::print_json(&metadata)?;
        }
        MetadataCommand::Show { session_id } => {
            let metadata = service
                .get_metadata(&session_id)
                .await?
                .ok_or_else(|| StoreError::not_found("metadata", &session_id))?;
            utils::print_json(&metadata)?;
        }
    }
    Ok(())
}

async fn handle_query(
    context: &AppContext,
    session_id: String,
    question: String,
    model: Option<String>,
) -> Result<()> {
    utils::print_header(&format!("Session {}", session_id));
    utils::print_info(&format!(
        "Model: {}",
        model
            .as_deref()
            .unwrap_or(context.settings().ollama.default_model.as_str())
    ));

    let reply = context
        .service()
        .submit_query(&session_id, &question, model.as_deref())
        .await?;

    println!("\n{}", reply.response);
    if let Some(tokens) = reply.tokens_used {
        utils::print_info(&format!("\n({} tokens)", tokens));
    }
    Ok(())
}
