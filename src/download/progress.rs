//! Download progress events and their console consumer
//!
//! The pipeline pushes `(downloaded, total)` events into an unbounded
//! channel; whoever holds the receiver decides how to present them.

use crate::logging::Logger;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// 0 when the server sent no content-length
    pub total: u64,
}

impl DownloadProgress {
    pub fn percentage(&self) -> Option<f64> {
        (self.total > 0).then(|| (self.downloaded as f64 / self.total as f64 * 100.0).min(100.0))
    }
}

pub type ProgressSender = UnboundedSender<DownloadProgress>;
pub type ProgressReceiver = UnboundedReceiver<DownloadProgress>;

pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Drain `events` into a redrawing progress bar until every sender is gone.
///
/// Resolves to the last event seen, if any.
pub fn spawn_console_renderer(
    output: Logger,
    label: String,
    mut events: ProgressReceiver,
) -> JoinHandle<Option<DownloadProgress>> {
    tokio::spawn(async move {
        let mut last = None;
        // Redraw only when the bar moves by a tenth of a percent; unknown
        // totals redraw on every event.
        let mut drawn_step = None;
        while let Some(event) = events.recv().await {
            let step = event.percentage().map(|p| (p * 10.0) as u64);
            if step.is_none() || step != drawn_step {
                output.progress_bar(&label, event.downloaded, event.total);
                drawn_step = step;
            }
            last = Some(event);
        }
        if last.is_some() {
            output.progress_done();
        }
        last
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        let half = DownloadProgress { downloaded: 1024, total: 2048 };
        assert_eq!(half.percentage(), Some(50.0));
        let unknown = DownloadProgress { downloaded: 1024, total: 0 };
        assert_eq!(unknown.percentage(), None);
    }

    #[tokio::test]
    async fn test_renderer_reports_last_event() {
        let (tx, rx) = progress_channel();
        let renderer = spawn_console_renderer(Logger::new_quiet(), "foo".to_string(), rx);

        tx.send(DownloadProgress { downloaded: 10, total: 20 }).unwrap();
        tx.send(DownloadProgress { downloaded: 20, total: 20 }).unwrap();
        drop(tx);

        let last = renderer.await.unwrap();
        assert_eq!(last, Some(DownloadProgress { downloaded: 20, total: 20 }));
    }
}
