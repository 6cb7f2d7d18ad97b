//! Internal plumbing for combine-latest change propagation.
//!
//! Every stateful control in this crate keeps its state in a
//! [`tokio::sync::watch`] channel: multicast, latest-value, with replay of
//! the current value to late subscribers. The frame driver needs to react
//! to "any of N heterogeneous sources changed", so receivers are erased
//! into unit change streams and merged with
//! [`futures::stream::SelectAll`]. Values are *not* carried through the
//! streams; after a wake-up the driver re-reads every source, which is what
//! gives combine-latest semantics and lets synchronous bursts coalesce.

use futures::{
    StreamExt,
    stream::{BoxStream, SelectAll},
};
use tokio::sync::watch;

/// A merged stream that yields `()` whenever any registered source changes.
pub type ChangeStream = SelectAll<BoxStream<'static, ()>>;

/// Erases a watch receiver into a unit stream of its future changes.
///
/// The current value counts as seen; the stream only yields for changes
/// after this call. The stream ends when the sender side is dropped.
pub fn changes_of<T: Send + Sync + 'static>(
    receiver: watch::Receiver<T>,
) -> BoxStream<'static, ()> {
    futures::stream::unfold(receiver, |mut receiver| async move {
        receiver.changed().await.ok().map(|()| ((), receiver))
    })
    .boxed()
}

/// Merges erased change streams into a single wake-up source.
pub fn merge_changes(streams: Vec<BoxStream<'static, ()>>) -> ChangeStream {
    let mut merged = SelectAll::new();
    for stream in streams {
        merged.push(stream);
    }
    merged
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use tokio::sync::watch;

    use super::{changes_of, merge_changes};

    #[tokio::test]
    async fn yields_once_per_change_and_skips_current_value() {
        let (tx, rx) = watch::channel(0u32);
        let mut changes = changes_of(rx);

        tx.send(1).unwrap();
        assert_eq!(changes.next().await, Some(()));

        tx.send(2).unwrap();
        assert_eq!(changes.next().await, Some(()));

        drop(tx);
        assert_eq!(changes.next().await, None);
    }

    #[tokio::test]
    async fn merged_stream_wakes_for_any_source() {
        let (tx_a, rx_a) = watch::channel(0u32);
        let (tx_b, rx_b) = watch::channel(String::new());
        let mut merged = merge_changes(vec![changes_of(rx_a), changes_of(rx_b)]);

        tx_b.send("hello".to_string()).unwrap();
        assert_eq!(merged.next().await, Some(()));

        tx_a.send(7).unwrap();
        assert_eq!(merged.next().await, Some(()));
    }
}
