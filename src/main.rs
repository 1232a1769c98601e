use inbox_priority::{config::Config, InboxSnapshot, PreferenceStore, PriorityInbox};
use std::fs;
use std::path::Path;
use tokio::time::{interval, Duration};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration: {:?}", config);

    let store = open_store(&config.database_url)?;

    let mut inbox = PriorityInbox::from_rules(config.rules.clone());
    inbox.set_priority_mode(config.priority_mode);

    if config.watch_interval_secs == 0 {
        return score_snapshot(&config, &store, &inbox);
    }

    info!(
        "Watching {} every {}s",
        config.snapshot_path.display(),
        config.watch_interval_secs
    );
    let mut ticker = interval(Duration::from_secs(config.watch_interval_secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = score_snapshot(&config, &store, &inbox) {
                    error!("Scoring pass failed: {:#}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn open_store(database_url: &str) -> anyhow::Result<PreferenceStore> {
    if database_url != ":memory:" {
        if let Some(parent) = Path::new(database_url).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
    }
    let store = PreferenceStore::new(database_url)?;
    store.execute_init()?;
    Ok(store)
}

fn score_snapshot(
    config: &Config,
    store: &PreferenceStore,
    inbox: &PriorityInbox,
) -> anyhow::Result<()> {
    let mut snapshot = InboxSnapshot::load(&config.snapshot_path)?;
    if let Some(user_id) = &config.user_id {
        snapshot.user_id = user_id.clone();
    }
    store.apply_mutes(&mut snapshot)?;
    store.apply_stars(&mut snapshot)?;

    let view = inbox.view(&snapshot);
    println!("{}", view.render());
    Ok(())
}
