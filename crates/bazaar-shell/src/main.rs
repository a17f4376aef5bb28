//! Headless storefront shell: signs in (registering on first run), then
//! streams toast notifications and badge changes to stdout as JSON lines
//! until interrupted. Useful for watching the live messaging pipeline
//! against a shared database file.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use bazaar_client::Storefront;
use bazaar_store::Store;
use bazaar_types::models::UserType;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("BAZAAR_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("BAZAAR_DB_PATH").unwrap_or_else(|_| "bazaar.db".into());
    let email = std::env::var("BAZAAR_EMAIL").unwrap_or_else(|_| "asha@example.com".into());
    let password = std::env::var("BAZAAR_PASSWORD").unwrap_or_else(|_| "password123".into());
    let full_name = std::env::var("BAZAAR_NAME").unwrap_or_else(|_| "Asha Devi".into());

    let store = Arc::new(Store::open(&PathBuf::from(&db_path), jwt_secret)?);
    let front = Storefront::new(store);

    let session = match front.sign_in(&email, &password).await {
        Ok(session) => session,
        Err(_) => {
            info!("no account for {}, registering", email);
            front
                .sign_up(&email, &password, &full_name, UserType::Buyer)
                .await?
        }
    };
    info!("signed in as {} ({})", session.email(), session.user_id());

    let mut toasts = session.hub().toasts();
    let mut unread = session.hub().unread_badge();
    let mut cart = session.hub().cart_badge();

    println!(
        "{}",
        serde_json::json!({
            "event": "session_started",
            "user_id": session.user_id(),
            "unread": *unread.borrow_and_update(),
            "cart": *cart.borrow_and_update(),
        })
    );

    loop {
        tokio::select! {
            toast = toasts.recv() => {
                if let Ok(toast) = toast {
                    println!("{}", serde_json::json!({
                        "event": "toast",
                        "from": toast.sender_name,
                        "preview": toast.preview,
                    }));
                }
            }
            changed = unread.changed() => {
                if changed.is_ok() {
                    println!("{}", serde_json::json!({
                        "event": "unread_badge",
                        "count": *unread.borrow_and_update(),
                    }));
                }
            }
            changed = cart.changed() => {
                if changed.is_ok() {
                    println!("{}", serde_json::json!({
                        "event": "cart_badge",
                        "count": *cart.borrow_and_update(),
                    }));
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.sign_out();
    info!("signed out");
    Ok(())
}
