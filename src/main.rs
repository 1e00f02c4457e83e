use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studio_notify::api::{ListQuery, NotificationApi};
use studio_notify::auth::{CredentialProvider, IdpCredentialProvider, StaticCredentialProvider};
use studio_notify::config;
use studio_notify::models::Notification;
use studio_notify::store::NotificationState;
use studio_notify::sync::SyncSession;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studio_notify=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = config::load()?;
    let credentials = build_credentials(&config)?;
    let cancel = CancellationToken::new();

    match cli.command {
        Commands::Watch => watch(&config, credentials).await?,
        Commands::List {
            page,
            size,
            sort_by,
            sort_direction,
            unread,
        } => {
            let api = NotificationApi::new(config.api_base_url.clone(), config.tenant_id.clone(), credentials);
            let query = ListQuery {
                page,
                size: size.unwrap_or(config.page_size),
                sort_by,
                sort_direction: sort_direction.into(),
                is_read: if unread { Some(false) } else { None },
            };
            let (items, pagination) = api.list(&query, &cancel).await?;
            for n in &items {
                print_notification(n);
            }
            if let Some(p) = pagination {
                println!(
                    "-- page {}/{} ({} total)",
                    p.page + 1,
                    p.total_pages,
                    p.total_elements
                );
            }
        }
        Commands::Recent { limit } => {
            let api = NotificationApi::new(config.api_base_url.clone(), config.tenant_id.clone(), credentials);
            for n in &api.recent(limit, &cancel).await? {
                print_notification(n);
            }
        }
        Commands::UnreadCount => {
            let api = NotificationApi::new(config.api_base_url.clone(), config.tenant_id.clone(), credentials);
            println!("{}", api.unread_count(&cancel).await?);
        }
        Commands::MarkRead { id } => {
            let api = NotificationApi::new(config.api_base_url.clone(), config.tenant_id.clone(), credentials);
            let updated = api.mark_read(id, &cancel).await?;
            println!("marked read: {}", updated.id);
        }
        Commands::MarkAllRead { yes } => {
            if !yes && !confirm("Mark every notification as read?")? {
                return Ok(());
            }
            let api = NotificationApi::new(config.api_base_url.clone(), config.tenant_id.clone(), credentials);
            api.mark_all_read(&cancel).await?;
            println!("all notifications marked read");
        }
        Commands::Delete { id, yes } => {
            if !yes && !confirm(&format!("Delete notification {}?", id))? {
                return Ok(());
            }
            let api = NotificationApi::new(config.api_base_url.clone(), config.tenant_id.clone(), credentials);
            api.delete(id, &cancel).await?;
            println!("deleted: {}", id);
        }
    }

    Ok(())
}

/// Prefer a pre-issued token; fall back to the IdP password grant.
fn build_credentials(config: &config::Config) -> anyhow::Result<Arc<dyn CredentialProvider>> {
    if let Ok(token) = std::env::var("STUDIO_TOKEN") {
        return Ok(Arc::new(StaticCredentialProvider::new(token)));
    }

    let username = std::env::var("STUDIO_USERNAME")
        .map_err(|_| anyhow::anyhow!("set STUDIO_TOKEN, or STUDIO_USERNAME and STUDIO_PASSWORD"))?;
    let password = std::env::var("STUDIO_PASSWORD")
        .map_err(|_| anyhow::anyhow!("STUDIO_PASSWORD is not set"))?;
    Ok(Arc::new(IdpCredentialProvider::new(config, username, password)))
}

/// Run a live session and render feed changes until interrupted.
async fn watch(
    config: &config::Config,
    credentials: Arc<dyn CredentialProvider>,
) -> anyhow::Result<()> {
    let mut session = SyncSession::new(config, credentials);
    let store = session.store();
    let mut updates = store.subscribe();

    session.start().await;

    let mut last = store.snapshot();
    println!(
        "{} notifications loaded, {} unread; watching (ctrl-c to quit)",
        last.items.len(),
        last.unread_count
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = updates.borrow_and_update().clone();
                render_transition(&last, &next);
                last = next;
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

fn render_transition(prev: &NotificationState, next: &NotificationState) {
    if next.connection != prev.connection {
        println!("[{}]", next.connection);
    }
    if let Some(error) = &next.error {
        if prev.error.as_deref() != Some(error) {
            println!("error: {}", error);
        }
    }

    // New entries show up at the head of the list.
    for n in &next.items {
        if prev.items.iter().any(|p| p.id == n.id) {
            break;
        }
        print_notification(n);
    }

    if next.unread_count != prev.unread_count {
        println!("-- {} unread", next.unread_count);
    }
}

fn print_notification(n: &Notification) {
    let marker = if n.is_read { " " } else { "*" };
    let video = n.video_id.as_deref().unwrap_or("-");
    println!(
        "{} {} [{}] {}: {} (video: {})",
        marker,
        n.created_at.format("%Y-%m-%d %H:%M"),
        n.kind.as_str(),
        n.title,
        n.message,
        video
    );
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
