use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use courier_core::app::{PubSub, PubSubConfig};
use courier_core::domain::Publication;
use courier_core::impls::{InMemoryMessageStore, LogSubscriber};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const IDLE_TIMEOUT_ENV: &str = "COURIER_IDLE_TIMEOUT_MS";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 設定: 第 1 引数の JSON ファイル（任意）→ 環境変数で上書き
fn load_config() -> anyhow::Result<PubSubConfig> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {path}"))?;
            PubSubConfig::from_json_str(&json)?
        }
        None => PubSubConfig::default(),
    };

    if let Ok(raw) = std::env::var(IDLE_TIMEOUT_ENV) {
        let ms: u64 = raw
            .parse()
            .with_context(|| format!("{IDLE_TIMEOUT_ENV} must be milliseconds, got {raw:?}"))?;
        config.idle_timeout_ms = ms;
        config.validate()?;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = load_config()?;

    // (A) ストアと PubSub を用意
    let store = Arc::new(InMemoryMessageStore::new());
    let pubsub = Arc::new(PubSub::builder(store.clone()).config(config).build());

    // (B) 購読者を登録（3 つとも topic1）
    for id in ["subscriber1", "subscriber2", "subscriber3"] {
        pubsub.subscribe(Arc::new(LogSubscriber::new(id, "topic1")));
    }

    // (C) dispatcher を起動
    let cancel = CancellationToken::new();
    let dispatcher = tokio::spawn({
        let pubsub = pubsub.clone();
        let cancel = cancel.clone();
        async move { pubsub.run(cancel).await }
    });

    // (D) publish（topic3 には購読者がいないので 0 件）
    for (topic, body) in [("topic1", "hoge"), ("topic1", "fuga"), ("topic3", "hoge")] {
        let receipt = pubsub.publish(Publication::new(topic, body)).await?;
        tracing::info!(topic, fan_out = receipt.fan_out(), "published");
    }

    // (E) 全件配送されるか Ctrl-C まで待つ
    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
        drained = wait_until_drained(&pubsub, Duration::from_secs(5)) => drained?,
    }

    let counts = pubsub.status_counts().await?;
    println!("counts: {}", serde_json::to_string(&counts)?);

    cancel.cancel();
    dispatcher
        .await
        .context("dispatcher task panicked")?
        .context("dispatcher stopped with an error")?;

    Ok(())
}

async fn wait_until_drained(pubsub: &PubSub, limit: Duration) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        let counts = pubsub.status_counts().await?;
        if counts.pending == 0 {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("{} messages still pending after {limit:?}", counts.pending);
        }
        sleep(Duration::from_millis(50)).await;
    }
}
