// Linkauth — CLI Command Handlers
//
// Each function handles one CLI subcommand. The entry point owns the
// credential manager for the whole run and closes its broker connection
// before returning, whether the command succeeded or not.

use std::sync::Arc;

use serde_json::Value;

use crate::config::Settings;
use crate::error::{LinkauthError, Result};
use crate::gateway::GatewayServer;
use crate::messenger::{AmqpConnector, Messenger};
use crate::store::{
    CredentialManager, NewUser, RedisStore, UserChanges, PASSWORD_FIELD, USERNAME_FIELD,
};

use super::{Cli, Commands};

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli) -> Result<()> {
    let settings = cli.settings()?;
    let manager = Arc::new(open_manager(&settings).await?);

    let result = match cli.command {
        Commands::Serve => cmd_serve(&settings, Arc::clone(&manager)).await,
        Commands::Add {
            username,
            password,
            encrypted,
            system,
            fields,
        } => cmd_add(&manager, username, password, encrypted, system, fields).await,
        Commands::List => cmd_list(&manager).await,
        Commands::Get { username } => cmd_get(&manager, &username).await,
        Commands::Field { username, field } => cmd_field(&manager, &username, &field).await,
        Commands::Modify {
            username,
            password,
            encrypted,
            system,
            fields,
        } => cmd_modify(&manager, username, password, encrypted, system, fields).await,
        Commands::Delete { username } => cmd_delete(&manager, &username).await,
        Commands::Exists { username } => cmd_exists(&manager, &username).await,
        Commands::Authenticate {
            username,
            password,
            system,
        } => cmd_authenticate(&manager, &username, &password, system).await,
    };

    if let Err(e) = manager.shutdown().await {
        tracing::warn!(error = %e, "Failed to close broker connection");
    }
    result
}

// ─── Serve ───────────────────────────────────────────────────────────────────

async fn cmd_serve(settings: &Settings, manager: Arc<CredentialManager>) -> Result<()> {
    let server = GatewayServer::new(manager, settings.bind, &settings.realm);
    server.run(shutdown_signal()).await?;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown requested");
}

// ─── Add / Modify ────────────────────────────────────────────────────────────

async fn cmd_add(
    manager: &CredentialManager,
    username: String,
    password: String,
    encrypted: bool,
    system: bool,
    fields: Vec<(String, String)>,
) -> Result<()> {
    let mut user = NewUser::new(username, password)
        .encrypted(encrypted)
        .system(system);
    for (name, value) in fields {
        user = user.field(name, Value::String(value));
    }

    let username = manager.add(user).await?;
    println!("✓ User added");
    println!("  Username: {}", username);
    println!("  System:   {}", system);

    Ok(())
}

async fn cmd_modify(
    manager: &CredentialManager,
    username: String,
    password: Option<String>,
    encrypted: bool,
    system: Option<bool>,
    fields: Vec<(String, String)>,
) -> Result<()> {
    manager.ensure_exists(&username).await?;

    let mut changes = UserChanges::for_user(username.clone()).encrypted(encrypted);
    if let Some(password) = password {
        changes = changes.password(password);
    }
    if let Some(system) = system {
        changes = changes.system(system);
    }
    for (name, value) in fields {
        if name == USERNAME_FIELD {
            return Err(LinkauthError::Other("Cannot change username".to_string()));
        }
        changes = changes.field(name, Value::String(value));
    }

    manager.modify(changes).await?;
    println!("✓ User {} updated", username);

    Ok(())
}

// ─── Reads ───────────────────────────────────────────────────────────────────

async fn cmd_list(manager: &CredentialManager) -> Result<()> {
    let users = manager.list_users().await?;

    if users.is_empty() {
        println!("No users stored yet.");
        println!("Add one with: linkauth add <username> --password <password>");
        return Ok(());
    }

    println!("Users ({}):\n", users.len());
    for user in &users {
        println!("  {}", user);
    }

    Ok(())
}

async fn cmd_get(manager: &CredentialManager, username: &str) -> Result<()> {
    match manager.get(username).await? {
        Some(user) => {
            println!("User details:\n");
            for (name, value) in user.fields() {
                if name == PASSWORD_FIELD {
                    println!("  {:12} [REDACTED]", name); // Never print the hash
                } else {
                    println!("  {:12} {}", name, value.as_deref().unwrap_or("-"));
                }
            }
        }
        None => {
            println!("User not found: {}", username);
        }
    }

    Ok(())
}

async fn cmd_field(manager: &CredentialManager, username: &str, field: &str) -> Result<()> {
    manager.ensure_exists(username).await?;

    match manager.get_one_field(username, field).await? {
        Some(value) => println!("{}", value),
        None => println!("Field not found: {}", field),
    }

    Ok(())
}

async fn cmd_exists(manager: &CredentialManager, username: &str) -> Result<()> {
    if manager.exists(username).await? {
        println!("✓ User {} exists", username);
    } else {
        println!("User not found: {}", username);
    }

    Ok(())
}

// ─── Delete / Authenticate ───────────────────────────────────────────────────

async fn cmd_delete(manager: &CredentialManager, username: &str) -> Result<()> {
    if manager.delete(username).await? > 0 {
        println!("✓ User {} deleted", username);
    } else {
        println!("User not found: {}", username);
    }

    Ok(())
}

async fn cmd_authenticate(
    manager: &CredentialManager,
    username: &str,
    password: &str,
    system: bool,
) -> Result<()> {
    if manager.authenticate(username, password, system).await? {
        println!("✓ Authenticated {}", username);
        Ok(())
    } else {
        Err(LinkauthError::Other(format!("Authentication failed for {}", username)))
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Connect to the keyed store and the broker.
async fn open_manager(settings: &Settings) -> Result<CredentialManager> {
    let store = RedisStore::connect(&settings.redis_url).await?;
    let messenger = Messenger::open(
        Box::new(AmqpConnector::new(settings.rabbit_url.clone())),
        settings.topology.clone(),
        settings.retry,
    )
    .await?;

    Ok(CredentialManager::new(Arc::new(store), messenger))
}
