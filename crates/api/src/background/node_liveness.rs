//! Periodic sweep that marks silent nodes inactive.
//!
//! An `active` node whose `last_seen_at` is older than the configured window
//! is flipped to `inactive`, which removes it from dispatch. Its next
//! capability report or registration brings it back.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cynode_db::{DbError, Store};
use tokio_util::sync::CancellationToken;

/// Upper bound on the sweep interval.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Mark nodes unseen for longer than `stale_after` as inactive.
pub async fn sweep_once(store: &dyn Store, stale_after: Duration) -> Result<u64, DbError> {
    let window = chrono::Duration::from_std(stale_after)
        .unwrap_or_else(|_| chrono::Duration::days(36_500));
    let cutoff = Utc::now() - window;
    store.mark_stale_nodes_inactive(cutoff).await
}

/// Run the liveness sweep until `cancel` is triggered.
///
/// A zero `stale_after` disables the sweep.
pub async fn run(store: Arc<dyn Store>, stale_after: Duration, cancel: CancellationToken) {
    if stale_after.is_zero() {
        tracing::info!("Node liveness sweep disabled");
        return;
    }

    let every = (stale_after / 4).clamp(Duration::from_secs(1), MAX_SWEEP_INTERVAL);
    tracing::info!(
        stale_after_secs = stale_after.as_secs(),
        interval_secs = every.as_secs(),
        "Node liveness sweep started"
    );

    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Node liveness sweep stopping");
                break;
            }
            _ = interval.tick() => {
                match sweep_once(store.as_ref(), stale_after).await {
                    Ok(0) => tracing::debug!("Node liveness: all nodes fresh"),
                    Ok(marked) => tracing::info!(marked, "Node liveness: marked stale nodes inactive"),
                    Err(e) => tracing::error!(error = %e, "Node liveness sweep failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cynode_core::status::NodeStatus;
    use cynode_db::models::node::CreateNode;
    use cynode_db::{MemoryStore, NodeStore};

    #[tokio::test]
    async fn stale_active_node_becomes_inactive() {
        let store = MemoryStore::new();
        let node = store
            .create_node(&CreateNode {
                node_slug: "n1".into(),
                status: NodeStatus::Active,
                config_version: None,
            })
            .await
            .unwrap();
        store.set_node_last_seen(node.id, Utc::now() - chrono::Duration::minutes(10));

        let marked = sweep_once(&store, Duration::from_secs(60)).await.unwrap();
        assert_eq!(marked, 1);
        let node = store.find_node_by_id(node.id).await.unwrap().unwrap();
        assert_eq!(node.status, NodeStatus::Inactive);
    }

    #[tokio::test]
    async fn zero_window_returns_immediately() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        tokio::time::timeout(
            Duration::from_secs(1),
            run(store, Duration::ZERO, CancellationToken::new()),
        )
        .await
        .expect("disabled sweep should return");
    }
}
