//! Terminal front end for a self-expiring temporary mailbox.
//!
//! Restores the mailbox from the previous run when it is still live, otherwise
//! creates one, then shows the countdown and polls the inbox until expiry.
//!
//! Flags:
//! - `--new`           discard the current mailbox and create another
//! - `--toggle-theme`  flip between the light and dark palette
//!
//! State is kept in `$TEMPMAIL_STATE` (default `tempmail-state.json`).
//! Logging follows `RUST_LOG` (default `warn`).

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tempmail_session::{
    format_remaining, Client, FileStore, SessionConfig, SessionEvent, SessionManager, Theme,
};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

enum Step {
    Tick(Option<u64>),
    Poll,
    Quit,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let path = std::env::var("TEMPMAIL_STATE").unwrap_or_else(|_| "tempmail-state.json".into());
    let store = Arc::new(FileStore::open(&path)?);

    let mut theme = Theme::load(store.as_ref())?;
    if args.iter().any(|a| a == "--toggle-theme") {
        theme = theme.toggled();
        theme.save(store.as_ref())?;
    }
    let (accent, reset) = match theme {
        Theme::Dark => ("\x1b[96m", "\x1b[0m"),
        Theme::Light => ("\x1b[34m", "\x1b[0m"),
    };

    let mut manager = SessionManager::new(Client::new()?, store.clone(), SessionConfig::default());

    let mut events = manager.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Restored(s)) => println!("\n🔁 Restored {}", s.address()),
                Ok(SessionEvent::Created(s)) => println!("\n✅ Created {}", s.address()),
                Ok(SessionEvent::Expired) => println!("\n⏳ Temporary mailbox expired"),
                Ok(SessionEvent::CreationFailed(msg)) => eprintln!("\n❌ {msg}"),
                Ok(SessionEvent::InboxRefreshFailed(msg)) => eprintln!("\n❌ {msg}"),
                Ok(SessionEvent::InboxUpdated { .. } | SessionEvent::Tick(_)) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let restored = manager.restore();
    let session = match restored {
        Some(_) if args.iter().any(|a| a == "--new") => manager.discard_and_recreate().await?,
        Some(session) => session,
        None => {
            let used = manager.check_rate_limit()?;
            println!(
                "📬 Creating mailbox ({used} of {} used in the last 30 minutes)...",
                manager.config().quota()
            );
            manager.create().await?
        }
    };

    println!("{accent}📧 {}{reset}", session.address());
    println!("   Send an email to it; Ctrl-C to leave (the mailbox keeps running).");

    let mut poll = tokio::time::interval(Duration::from_secs(5));
    let mut shown: HashSet<String> = HashSet::new();

    loop {
        let step = tokio::select! {
            remaining = manager.next_tick() => Step::Tick(remaining),
            _ = poll.tick() => Step::Poll,
            _ = tokio::signal::ctrl_c() => Step::Quit,
        };

        match step {
            Step::Tick(Some(remaining)) => {
                print!("\r{accent}⏱️  Expires in {}{reset}   ", format_remaining(remaining));
                std::io::stdout().flush().ok();
            }
            Step::Tick(None) | Step::Quit => break,
            Step::Poll => {
                let Ok(inbox) = manager.refresh_inbox().await else {
                    continue;
                };
                let new: Vec<String> = inbox
                    .iter()
                    .filter(|m| !shown.contains(&m.id))
                    .map(|m| m.id.clone())
                    .collect();

                for id in new {
                    if let Ok(Some(details)) = manager.open_message(&id).await {
                        shown.insert(id);
                        println!("\n{}", "-".repeat(50));
                        println!("Subject: {}", details.subject);
                        let preview: String = details.body().chars().take(500).collect();
                        for line in preview.lines().take(10) {
                            println!("   {line}");
                        }
                    }
                }
            }
        }
    }

    println!();
    Ok(())
}
