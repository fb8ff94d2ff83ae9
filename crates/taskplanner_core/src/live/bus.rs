//! In-process change bus backed by a `tokio::sync::broadcast` channel.

use tokio::sync::broadcast;

/// Entity collections that a mutation can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Categories,
    Tasks,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Categories => "categories",
            Self::Tasks => "tasks",
        }
    }
}

/// Notice for one committed mutation.
///
/// A single mutation that touches several tables (e.g. a category delete
/// that nulls task references) produces one notice naming all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    tables: &'static [Table],
}

impl Change {
    pub fn new(tables: &'static [Table]) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &'static [Table] {
        self.tables
    }

    /// Returns whether this notice affects any of `watched`.
    pub fn touches(&self, watched: &[Table]) -> bool {
        self.tables.iter().any(|table| watched.contains(table))
    }
}

/// Fan-out hub for [`Change`] notices.
pub struct ChangeBus {
    sender: broadcast::Sender<Change>,
}

impl ChangeBus {
    /// Creates a bus with a specific channel capacity.
    ///
    /// Receivers that fall more than `capacity` notices behind observe
    /// `RecvError::Lagged` and must re-query.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a notice to all current subscribers.
    pub fn publish(&self, change: Change) {
        // Zero receivers is not an error.
        let _ = self.sender.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.sender.subscribe()
    }

    /// Number of live receivers, one per running live-query driver plus
    /// any direct subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::{Change, ChangeBus, Table};

    #[test]
    fn touches_matches_any_watched_table() {
        let change = Change::new(&[Table::Categories, Table::Tasks]);
        assert!(change.touches(&[Table::Tasks]));
        assert!(change.touches(&[Table::Users, Table::Categories]));
        assert!(!change.touches(&[Table::Users]));
        assert!(!change.touches(&[]));
    }

    #[tokio::test]
    async fn every_subscriber_receives_each_notice() {
        let bus = ChangeBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(Change::new(&[Table::Users]));

        assert_eq!(first.recv().await.unwrap().tables(), &[Table::Users]);
        assert_eq!(second.recv().await.unwrap().tables(), &[Table::Users]);
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = ChangeBus::new(1);
        bus.publish(Change::new(&[Table::Tasks]));
    }

    #[test]
    fn receiver_count_tracks_dropped_receivers() {
        let bus = ChangeBus::new(4);
        let first = bus.subscribe();
        let _second = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);
        drop(first);
        assert_eq!(bus.receiver_count(), 1);
    }
}
