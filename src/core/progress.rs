// ─── Progress Events ───
// Long-running operations report `(current, total, label)` through a channel.
// The consumer decides how (or whether) to render them.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// A single progress tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub current: u64,
    pub total: u64,
    pub label: String,
}

pub type ProgressSender = UnboundedSender<ProgressEvent>;

/// Emit an event if a sender is attached. A closed receiver is ignored.
pub fn emit(sender: Option<&ProgressSender>, current: u64, total: u64, label: &str) {
    if let Some(tx) = sender {
        let _ = tx.send(ProgressEvent {
            current,
            total,
            label: label.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_sender_is_noop() {
        emit(None, 1, 2, "noop");
    }

    #[test]
    fn emit_forwards_event() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        emit(Some(&tx), 3, 10, "Backing up");
        let event = rx.try_recv().unwrap();
        assert_eq!(
            event,
            ProgressEvent {
                current: 3,
                total: 10,
                label: "Backing up".into()
            }
        );
    }
}
