//! Line-oriented push source.
//!
//! Reads one JSON message per line on a dedicated OS thread, standing in for
//! the external delivery thread that calls into ingress. A line of the form
//! `{"newToken":"..."}` is a registration-token refresh; anything else is a
//! push payload.

use std::io::BufRead;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::ingress::IngressAdapter;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct TokenRefresh {
    new_token: String,
}

/// Counters reported when the source reaches end of input.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SourceStats {
    pub messages: usize,
    pub token_refreshes: usize,
}

/// Spawn the source thread. It exits at end of input or on a read error and
/// then sends its stats on the returned channel.
///
/// The thread is detached: a caller that stops waiting (e.g. on a shutdown
/// signal) is never blocked by a read that has not returned. If the thread
/// panics the channel closes without a value.
pub fn spawn_line_source<R>(
    reader: R,
    ingress: Arc<IngressAdapter>,
) -> std::io::Result<oneshot::Receiver<SourceStats>>
where
    R: BufRead + Send + 'static,
{
    let (done_tx, done_rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("push-source".into())
        .spawn(move || {
            let stats = read_lines(reader, &ingress);
            let _ = done_tx.send(stats);
        })?;
    Ok(done_rx)
}

fn read_lines(reader: impl BufRead, ingress: &IngressAdapter) -> SourceStats {
    let mut stats = SourceStats::default();

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Push source read failed, stopping");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Ok(refresh) = serde_json::from_str::<TokenRefresh>(line) {
            ingress.on_new_token(&refresh.new_token);
            stats.token_refreshes += 1;
        } else {
            ingress.on_raw_message(line);
            stats.messages += 1;
        }
    }

    info!(
        messages = stats.messages,
        token_refreshes = stats.token_refreshes,
        "Push source finished"
    );
    stats
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::io::Cursor;
    use std::sync::mpsc;

    use super::*;
    use crate::relay::EventRelay;

    #[test]
    fn feeds_each_line_to_ingress() {
        let relay = Arc::new(EventRelay::new());
        let (tx, rx) = mpsc::channel();
        relay.subscribe(Box::new(move |e| {
            let _ = tx.send(e.id().to_string());
        }));
        let ingress = Arc::new(IngressAdapter::new(Arc::clone(&relay)));

        let input = concat!(
            r#"{"messageId":"m1","notification":{"title":"A"}}"#,
            "\n\n",
            r#"{"newToken":"abcdef0123456789"}"#,
            "\n",
            "not json\n",
            r#"{"messageId":"m2"}"#,
            "\n",
        );

        let stats = spawn_line_source(Cursor::new(input), ingress)
            .unwrap()
            .blocking_recv()
            .unwrap();

        assert_eq!(stats.messages, 3);
        assert_eq!(stats.token_refreshes, 1);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec!["m1", "m2"]);
    }
}
