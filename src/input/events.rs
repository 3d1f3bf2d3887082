use crate::core::geo::LatLng;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Events delivered by the map
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MapEvent {
    /// Style and canvas are ready; fired once per map
    Load,
    /// Click/tap at a geographic position
    Click { lng_lat: LatLng },
    /// Pointer moved over the canvas
    PointerMove { lng_lat: LatLng },
    /// Pointer left the canvas
    PointerLeave,
}

/// Unbounded FIFO of map events.
///
/// Senders can be handed to whatever drives the map; the controller drains
/// the queue in arrival order.
pub struct EventQueue {
    tx: Sender<MapEvent>,
    rx: Receiver<MapEvent>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<MapEvent> {
        self.tx.clone()
    }

    pub fn push(&self, event: MapEvent) {
        // The receiver lives as long as `self`, so sending cannot fail here
        let _ = self.tx.send(event);
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Takes every queued event, oldest first
    pub fn drain(&self) -> Vec<MapEvent> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_arrival_order() {
        let queue = EventQueue::new();
        let sender = queue.sender();

        queue.push(MapEvent::Load);
        sender
            .send(MapEvent::Click {
                lng_lat: LatLng::new(28.6, 77.2),
            })
            .unwrap();
        queue.push(MapEvent::PointerLeave);

        assert_eq!(queue.len(), 3);
        let events = queue.drain();
        assert_eq!(events[0], MapEvent::Load);
        assert!(matches!(events[1], MapEvent::Click { .. }));
        assert_eq!(events[2], MapEvent::PointerLeave);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_senders_work_across_threads() {
        let queue = EventQueue::new();
        let sender = queue.sender();
        std::thread::spawn(move || {
            for _ in 0..5 {
                sender.send(MapEvent::PointerLeave).unwrap();
            }
        })
        .join()
        .unwrap();

        assert_eq!(queue.drain().len(), 5);
    }
}
