//! Connect to a node, search a track and play it in one guild
//!
//! ```text
//! OBSIDIAN_PASSWORD=secret OBSIDIAN_USER_ID=1234 \
//!     cargo run --example basic -- <guild id> <channel id> <query>
//! ```

use async_trait::async_trait;
use obsidian_client::{
    ConnectOptions, EventKind, NodeConfig, NodeEvent, NodeRegistry, PlayOptions, PlayerEvent,
    Result, SearchOptions, Source, VoiceGateway,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Gateway that only logs; a real bot sends opcode 4 through its chat
/// gateway and feeds the answers back into the session.
struct LoggingGateway;

#[async_trait]
impl VoiceGateway for LoggingGateway {
    async fn join(&self, guild_id: u64, channel_id: u64, options: ConnectOptions) -> Result<()> {
        tracing::info!("would join {channel_id} in {guild_id} ({options:?})");
        Ok(())
    }

    async fn leave(&self, guild_id: u64) -> Result<()> {
        tracing::info!("would leave voice in {guild_id}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let guild_id: u64 = args.next().ok_or("missing guild id")?.parse()?;
    let channel_id: u64 = args.next().ok_or("missing channel id")?.parse()?;
    let query = args.collect::<Vec<_>>().join(" ");
    if query.is_empty() {
        return Err("missing query".into());
    }

    let registry = NodeRegistry::new(Arc::new(LoggingGateway));
    let node = registry.initiate(NodeConfig::from_env()?).await?;

    node.subscribe(EventKind::TrackStart, |session, event| async move {
        if let PlayerEvent::TrackStart(start) = event {
            tracing::info!("guild {} started {}", session.guild_id(), start.track_id);
        }
    });

    let session = node.get_or_create_session(guild_id);
    session.connect(channel_id, ConnectOptions::default()).await?;

    let options = SearchOptions::default().source(Source::Youtube);
    match node.search_track(&query, &options).await? {
        Some(found) => {
            let track = session.play(found, PlayOptions::default()).await?;
            println!("Playing {} by {}", track.title(), track.author());
        }
        None => println!("Nothing found for {query:?}"),
    }

    let mut events = node.subscribe_events();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event? {
                NodeEvent::Player { guild_id, event } => println!("{guild_id}: {:?}", event.kind()),
                other => println!("{other:?}"),
            },
        }
    }

    registry.destroy_all(true).await?;
    Ok(())
}
