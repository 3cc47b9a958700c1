use anyhow::anyhow;
use tokio::sync::{mpsc, Mutex};

/// Fully loaded, closed queue of addresses shared by every worker.
pub struct WorkQueue {
    rx: Mutex<mpsc::Receiver<String>>,
    len: usize,
}

impl WorkQueue {
    pub async fn load(addresses: Vec<String>) -> anyhow::Result<Self> {
        let len = addresses.len();
        let (tx, rx) = mpsc::channel(len.max(1));
        for address in addresses {
            tx.send(address)
                .await
                .map_err(|_| anyhow!("work queue closed while loading"))?;
        }
        drop(tx);

        Ok(Self {
            rx: Mutex::new(rx),
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `None` once the queue is drained.
    pub async fn next(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drains_in_order_then_reports_exhaustion() {
        let queue = WorkQueue::load(vec!["a".into(), "b".into(), "a".into()])
            .await
            .unwrap();
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.next().await.as_deref(), Some("a"));
        assert_eq!(queue.next().await.as_deref(), Some("b"));
        assert_eq!(queue.next().await.as_deref(), Some("a"));
        assert_eq!(queue.next().await, None);
        assert_eq!(queue.next().await, None);
    }

    #[tokio::test]
    async fn empty_queue_is_closed_immediately() {
        let queue = WorkQueue::load(Vec::new()).await.unwrap();
        assert!(queue.is_empty());
        assert_eq!(queue.next().await, None);
    }
}
