//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod call;
pub mod chat;
pub mod persona_list;
pub mod watch;


use std::error::Error;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::warn;

use crate::cli::call::run_call;
use crate::cli::chat::run_chat;
use crate::cli::persona_list::list_personas;
use crate::cli::watch::run_watch;
use crate::core::api_client::ApiClient;
use crate::core::config::Config;
use crate::core::constants::LOGIN_ROUTE;
use crate::core::events::EventBus;
use crate::core::persona::PersonaRegistry;
use crate::core::session::{
    FileSessionStore, MemorySessionStore, Navigator, SessionManager, SessionStore,
};
use crate::utils::logging::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "jarvis")]
#[command(about = "Terminal client for the JARVIS migration intelligence backend")]
#[command(
    long_about = "jarvis talks to a JARVIS backend over HTTP and WebSocket. Pick a persona \
with 'jarvis login', chat with the assistant, issue raw API calls, or follow a running \
agent's event stream.\n\n\
Environment Variables:\n\
  JARVIS_API_BASE   HTTP API base URL (defaults to http://localhost:8000/api)\n\
  JARVIS_WS_BASE    WebSocket base URL (defaults to ws://localhost:8000/ws)\n\
  JARVIS_LOG        Log filter, e.g. 'debug' or 'jarvis_client=info' (defaults to warn)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the HTTP API base URL
    #[arg(long, global = true, value_name = "URL")]
    pub api_base: Option<String>,

    /// Override the WebSocket base URL
    #[arg(long, global = true, value_name = "URL")]
    pub ws_base: Option<String>,

    /// Session scope; each scope keeps its own signed-in persona
    #[arg(long, global = true, value_name = "NAME", default_value = "default")]
    pub scope: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the available personas
    Personas,
    /// Sign in as a persona
    Login {
        /// Persona id, e.g. 'migration'
        persona: String,
    },
    /// Sign out of the current scope
    Logout,
    /// Show the signed-in persona
    Whoami,
    /// Check that the backend is up
    Health,
    /// Issue a raw API request and print the JSON response
    Call {
        /// HTTP method, e.g. GET or POST
        method: String,
        /// Path relative to the API base, e.g. /apps
        path: String,
        /// JSON request body
        #[arg(long, value_name = "JSON")]
        body: Option<String>,
    },
    /// Chat with the assistant; reads messages from stdin when none is given
    Chat {
        /// Describe what you are looking at, sent along with each message
        #[arg(long, value_name = "TEXT")]
        context: Option<String>,
        /// Message to send
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
    /// Follow a running agent's event stream until it completes
    Watch {
        /// Run identifier
        run_id: String,
    },
}

/// Reports navigation requests on the terminal.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, route: &str) {
        if route == LOGIN_ROUTE {
            eprintln!("🔒 Not signed in. Run 'jarvis login <persona>' to choose a persona.");
        } else {
            eprintln!("➡️  {route}");
        }
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let mut config = Config::load()?;
    config.apply_overrides(args.api_base.clone(), args.ws_base.clone());

    let events = Arc::new(EventBus::new());
    let session = Arc::new(SessionManager::new(
        Arc::new(PersonaRegistry::builtin()),
        session_store(&args.scope),
        Arc::new(TerminalNavigator),
        Arc::clone(&events),
    ));

    match args.command {
        Commands::Personas => {
            let current = session.persona().map(|s| s.persona.id);
            list_personas(session.registry(), current.as_deref());
            Ok(())
        }
        Commands::Login { persona } => match session.set_persona(&persona) {
            Ok(signed_in) => {
                println!(
                    "✅ Signed in as {} ({}); home view {}",
                    signed_in.persona.label, signed_in.persona.id, signed_in.persona.route
                );
                Ok(())
            }
            Err(e) => {
                eprintln!("❌ {e}");
                std::process::exit(1);
            }
        },
        Commands::Logout => {
            session.logout();
            println!("✅ Signed out");
            Ok(())
        }
        Commands::Whoami => {
            if !session.require_auth() {
                std::process::exit(1);
            }
            if let Some(current) = session.persona() {
                println!("{} ({})", current.persona.label, current.persona.id);
                println!("  Home view:    {}", current.persona.route);
                println!("  Capabilities: {}", current.persona.capabilities.join(", "));
                println!(
                    "  Signed in:    {}",
                    current.created_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
            Ok(())
        }
        Commands::Health => {
            let api = ApiClient::new(&config, session);
            match api.health().await {
                Ok(health) => {
                    let service = health.service.as_deref().unwrap_or("backend");
                    println!("✅ {service}: {}", health.status);
                    Ok(())
                }
                Err(e) => {
                    eprintln!("❌ {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Call { method, path, body } => {
            let api = ApiClient::new(&config, session);
            run_call(&api, &method, &path, body.as_deref()).await
        }
        Commands::Chat { context, message } => {
            apply_default_persona(&session, &config);
            let api = ApiClient::new(&config, session);
            run_chat(api, context, message).await
        }
        Commands::Watch { run_id } => run_watch(&config, events, &run_id).await,
    }
}

fn session_store(scope: &str) -> Box<dyn SessionStore> {
    match FileSessionStore::for_scope(scope) {
        Some(store) => Box::new(store),
        None => {
            warn!("no session directory available; sign-in will not persist");
            Box::new(MemorySessionStore::new())
        }
    }
}

/// Sign in as the configured default persona when nobody is signed in.
fn apply_default_persona(session: &SessionManager, config: &Config) {
    if session.persona().is_some() {
        return;
    }
    if let Some(default) = config.default_persona.as_deref() {
        if let Err(e) = session.set_persona(default) {
            warn!(error = %e, "ignoring configured default persona");
        }
    }
}
