pub mod dashboard;
pub mod login;
pub mod tasks;

pub use dashboard::*;
pub use login::*;
pub use tasks::*;

use std::sync::Arc;

use infrastructure::{Backend, ChangeFeed, Subscription, SubscriptionTopic};
use shared::Session;
use tracing::warn;

/// 画面表示中の変更通知を購読する。失敗時はリアルタイム更新なしで続行する
async fn subscribe_owned(
    backend: &Arc<dyn Backend>,
    session: &Session,
    collection: &str,
) -> Option<Subscription> {
    let topic = SubscriptionTopic::collection(collection).owned_by(session.user_id());
    match backend.subscribe(session, &topic).await {
        Ok(subscription) => Some(subscription),
        Err(e) => {
            warn!(
                collection = %collection,
                error = %e,
                code = e.code(),
                "Realtime subscription failed, live updates disabled"
            );
            None
        }
    }
}
