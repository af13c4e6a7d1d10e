//! CLI session command handlers.

use chrono::{DateTime, Utc};

use crate::config::StorefrontConfig;
use crate::session::{RefreshOutcome, SessionSnapshot, SessionStore};
use crate::storage::{load_session, FileStateStorage, StateStorageConfig};
use crate::types::{Credentials, CustomerWithToken, Expiry};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Handle `storefront-session status`. Reads the state file only.
pub async fn handle_status() -> CliResult {
    let path = StorefrontConfig::state_path_from_env();
    let storage = FileStateStorage::open(StateStorageConfig::new(path.clone()))?;

    println!("🛒 Storefront session ({})\n", path.display());
    match load_session(&storage)? {
        Some(session) => print_session(&session),
        None => println!("  ❌ No persisted session"),
    }
    Ok(())
}

/// Handle `storefront-session login <email>`.
pub async fn handle_login(config: &StorefrontConfig, email: &str, password: &str) -> CliResult {
    let store = SessionStore::from_config(config)?;
    let result = store.log_in(&Credentials::new(email, password)).await;
    store.shutdown();
    match result {
        Ok(()) => {
            println!("✅ Logged in as {email}");
            Ok(())
        }
        Err(e) if e.is_invalid_credentials() => {
            eprintln!("❌ Wrong email or password");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Handle `storefront-session logout`.
pub async fn handle_logout(config: &StorefrontConfig) -> CliResult {
    let store = SessionStore::from_config(config)?;
    store.log_out()?;
    println!("✅ Logged out");
    Ok(())
}

/// Handle `storefront-session refresh`.
pub async fn handle_refresh(config: &StorefrontConfig) -> CliResult {
    let store = SessionStore::from_config(config)?;
    let outcome = store.refresh().await;
    store.shutdown();
    match outcome? {
        RefreshOutcome::Refreshed => println!("✅ Token refreshed"),
        RefreshOutcome::Demoted => {
            println!("⚠️  Refresh rejected; continuing as an anonymous session")
        }
        RefreshOutcome::Skipped(reason) => println!("⏭️  Nothing refreshed ({reason:?})"),
    }
    if let Some(session) = store.session() {
        print_session(&session);
    }
    Ok(())
}

/// Handle `storefront-session watch`.
pub async fn handle_watch(config: &StorefrontConfig) -> CliResult {
    let store = SessionStore::from_config(config)?;
    let mut updates = store.subscribe();
    let identity = store.initialize().await?;
    println!("👀 Watching {identity} session (Ctrl-C to stop)");
    report(&store.snapshot(), &store);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                report(&snapshot, &store);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    store.shutdown();
    Ok(())
}

fn report(snapshot: &SessionSnapshot, store: &SessionStore) {
    let next = store
        .pending_refresh()
        .map(|p| format_epoch_ms(p.due_at_ms))
        .unwrap_or_else(|| "none".to_string());
    println!(
        "  {} (authorized: {}) next refresh: {next}",
        snapshot.identity(),
        snapshot.is_authorized
    );
}

fn print_session(session: &CustomerWithToken) {
    match &session.user {
        Some(customer) => println!("  Customer: {} <{}>", customer.full_name(), customer.email),
        None => println!("  Customer: anonymous"),
    }
    if let Some(cart) = &session.cart {
        println!("  Cart: {} ({} line items)", cart.id, cart.line_items.len());
    }
    let expiry = match session.token.expiry() {
        Expiry::At(ms) => format_epoch_ms(ms),
        Expiry::Missing => "unknown".to_string(),
    };
    println!("  Token expires: {expiry}");
    let refresh = if session.token.refresh_token.is_some() {
        "yes"
    } else {
        "no"
    };
    println!("  Refresh token: {refresh}");
}

fn format_epoch_ms(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}
