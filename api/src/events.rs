//! In-process bus for task change events.

use tokio::sync::broadcast;

/// Published after a task change is committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    Created { task_id: i64 },
    /// The task row or one of its relations (assignees, labels, reminders,
    /// positions) changed
    Updated { task_id: i64 },
    Deleted { task_id: i64 },
}

impl TaskEvent {
    pub fn task_id(&self) -> i64 {
        match self {
            TaskEvent::Created { task_id }
            | TaskEvent::Updated { task_id }
            | TaskEvent::Deleted { task_id } => *task_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TaskEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of subscribers reached. Having none is not an
    /// error: the periodic resync catches up.
    pub fn publish(&self, event: TaskEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!("No subscribers for {:?}", event);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        assert_eq!(bus.publish(TaskEvent::Created { task_id: 3 }), 1);

        let received = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("timeout")
            .expect("recv");
        assert_eq!(received, TaskEvent::Created { task_id: 3 });
        assert_eq!(received.task_id(), 3);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(TaskEvent::Deleted { task_id: 1 }), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(TaskEvent::Updated { task_id: 9 });

        assert_eq!(rx1.recv().await.expect("recv1").task_id(), 9);
        assert_eq!(rx2.recv().await.expect("recv2").task_id(), 9);
    }
}
