use crate::player::Player;
use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Periodic follow task run while playing. Ticks that arrive late are skipped
/// rather than replayed, so the renderer only ever sees the latest clock
/// position.
pub(crate) fn spawn_follower(player: Weak<Player>, interval_ms: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(player) = player.upgrade() else {
                break;
            };
            if !player.follow_tick() {
                break;
            }
        }
        tracing::trace!("cursor follower exited");
    })
}
