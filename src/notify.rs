//! Report delivery to subscribers.
//!
//! The [`Notifier`] trait is the seam between report generation and any
//! messaging surface. Delivery errors split into transient failures and
//! irrecoverable rejections (the user blocked the bot, the chat is gone);
//! only the latter deactivates a subscription.

use std::future::Future;

use thiserror::Error;

use crate::report::ReportBuilder;
use crate::store::SubscriberStore;
use crate::types::Appointment;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Delivery refused for this recipient; retrying will not help.
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// Delivers one formatted report to one user.
pub trait Notifier {
    fn send_message(
        &self,
        chat_id: i64,
        text: &str,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Telegram Bot API notifier (`sendMessage` with Markdown parse mode).
pub struct TelegramNotifier {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramNotifier {
    pub fn new(token: &str) -> Result<Self, NotifyError> {
        Self::with_base_url(token, TELEGRAM_API_BASE)
    }

    /// Notifier with a custom API base URL (for testing against a mock server).
    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }
}

impl Notifier for TelegramNotifier {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "Markdown",
            }))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            // Blocked by the user; the subscription is dead. Other 4xx
            // (notably 429 during a broadcast) are transient and must not
            // deactivate anyone.
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!("{}: {}", status, body)));
        }
        response.error_for_status()?;
        Ok(())
    }
}

/// Outcome counters for one broadcast pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub sent: usize,
    pub failed: usize,
    pub deactivated: usize,
}

/// Build and deliver a report for every active subscriber.
///
/// Each subscriber gets an independent pipeline invocation against the same
/// immutable record set. Delivery is sequential; any outbound rate limiting
/// stays the channel's concern. A [`NotifyError::Rejected`] deactivates the
/// subscription, a transient failure is logged and skipped.
pub async fn broadcast_reports<N: Notifier>(
    records: &[Appointment],
    store: &SubscriberStore,
    builder: &ReportBuilder<'_>,
    notifier: &N,
) -> BroadcastSummary {
    let mut summary = BroadcastSummary::default();

    for subscriber in store.active_subscribers() {
        let report = builder.build(records, &subscriber.query());
        match notifier.send_message(subscriber.id, &report).await {
            Ok(()) => summary.sent += 1,
            Err(NotifyError::Rejected(reason)) => {
                tracing::warn!(
                    subscriber = subscriber.id,
                    %reason,
                    "delivery rejected, deactivating subscription"
                );
                match store.set_active(subscriber.id, false) {
                    Ok(_) => summary.deactivated += 1,
                    Err(error) => {
                        tracing::error!(subscriber = subscriber.id, %error, "failed to deactivate");
                        summary.failed += 1;
                    }
                }
            }
            Err(error) => {
                tracing::warn!(subscriber = subscriber.id, %error, "delivery failed");
                summary.failed += 1;
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::geo::Coordinate;
    use crate::store::Subscriber;
    use crate::zipcode::ZipcodeIndex;

    /// Records every message; rejects chat ids listed in `reject`.
    struct FakeNotifier {
        sent: Mutex<Vec<(i64, String)>>,
        reject: Vec<i64>,
    }

    impl FakeNotifier {
        fn new(reject: Vec<i64>) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                reject,
            }
        }
    }

    impl Notifier for FakeNotifier {
        async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
            if self.reject.contains(&chat_id) {
                return Err(NotifyError::Rejected("403: bot blocked".to_string()));
            }
            self.sent
                .lock()
                .expect("lock")
                .push((chat_id, text.to_string()));
            Ok(())
        }
    }

    fn test_index() -> ZipcodeIndex {
        ZipcodeIndex::from_entries([(
            "94124".to_string(),
            Coordinate::new(-122.3880, 37.7309),
        )])
    }

    fn active_subscriber(id: i64) -> Subscriber {
        Subscriber {
            id,
            zipcode: "94124".to_string(),
            range_miles: 50.0,
            active: true,
        }
    }

    #[tokio::test]
    async fn test_broadcast_sends_to_active_subscribers_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SubscriberStore::open(dir.path().join("db.json")).expect("open store");
        store.upsert(active_subscriber(1)).expect("upsert");
        store.upsert(Subscriber::with_defaults(2)).expect("upsert"); // inactive

        let index = test_index();
        let builder = ReportBuilder::new(&index);
        let notifier = FakeNotifier::new(vec![]);

        let summary = broadcast_reports(&[], &store, &builder, &notifier).await;
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.deactivated, 0);

        let sent = notifier.sent.lock().expect("lock");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 1);
        assert!(sent[0].1.contains("no appointments available"));
    }

    #[tokio::test]
    async fn test_rejected_delivery_deactivates_subscription() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SubscriberStore::open(dir.path().join("db.json")).expect("open store");
        store.upsert(active_subscriber(1)).expect("upsert");
        store.upsert(active_subscriber(2)).expect("upsert");

        let index = test_index();
        let builder = ReportBuilder::new(&index);
        let notifier = FakeNotifier::new(vec![2]);

        let summary = broadcast_reports(&[], &store, &builder, &notifier).await;
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.deactivated, 1);
        assert_eq!(summary.failed, 0);

        assert!(store.get(1).expect("sub 1").active);
        assert!(!store.get(2).expect("sub 2").active);
    }
}
