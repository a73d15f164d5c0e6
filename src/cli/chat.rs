//! Line-oriented chat

use std::error::Error;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::core::api_client::ApiClient;
use crate::core::chat::{ChatOutcome, ChatSession, ValidationError};

/// Send `message` once, or read messages from stdin until EOF when it is empty.
pub async fn run_chat(
    api: ApiClient,
    context: Option<String>,
    message: Vec<String>,
) -> Result<(), Box<dyn Error>> {
    let persona = api.session().identity();
    let mut chat = ChatSession::new(api);
    chat.set_context(context);

    let message = message.join(" ");
    if !message.trim().is_empty() {
        return send_and_print(&mut chat, &message)
            .await
            .map_err(Into::into);
    }

    eprintln!("💬 Chatting as {persona}. Type a message and press Enter; Ctrl+D to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = send_and_print(&mut chat, &line).await {
            eprintln!("⚠️  {e}");
        }
    }
    Ok(())
}

async fn send_and_print(chat: &mut ChatSession, text: &str) -> Result<(), ValidationError> {
    match chat.send_message(text).await? {
        ChatOutcome::Replied(reply) => println!("{}\n", reply.content),
        ChatOutcome::Degraded(diagnostic) => println!("⚠️  {}\n", diagnostic.content),
    }
    Ok(())
}
