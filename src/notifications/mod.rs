use async_trait::async_trait;
use tracing::info;

/// Outbound notification fan-out, invoked by the alert engine for
/// high-severity alerts. Implementations talk to mail/SMS gateways; errors
/// are logged and swallowed by the caller, never propagated to the
/// triggering mutation.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, recipients: &[String], subject: &str, body: &str)
        -> anyhow::Result<()>;
}

/// Default dispatcher: logs the rendered message. Deployments wire a real
/// gateway behind the same trait.
#[derive(Debug, Default, Clone)]
pub struct LoggingDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingDispatcher {
    async fn dispatch(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> anyhow::Result<()> {
        info!(
            recipients = recipients.len(),
            subject, body, "Notification dispatched"
        );
        Ok(())
    }
}

pub mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Captures dispatched messages, optionally failing every call to
    /// exercise the swallow-and-continue path.
    #[derive(Default, Clone)]
    pub struct RecordingDispatcher {
        pub sent: Arc<Mutex<Vec<(usize, String)>>>,
        pub fail: bool,
    }

    #[async_trait]
    impl NotificationDispatcher for RecordingDispatcher {
        async fn dispatch(
            &self,
            recipients: &[String],
            subject: &str,
            _body: &str,
        ) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("dispatcher offline");
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipients.len(), subject.to_string()));
            Ok(())
        }
    }
}
