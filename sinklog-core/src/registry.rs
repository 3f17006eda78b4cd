use std::fmt;

use crate::{
    error::{Error, Result},
    sink::Sink,
};

pub const DEFAULT_CAPACITY: usize = 32;

/// Index of the slot a sink was registered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub usize);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ordered, bounded table of sinks. Registration past capacity fails.
///
/// `capacity` is only a bound; slots are allocated as sinks arrive.
pub struct Registry {
    slots: Vec<Sink>,
    capacity: usize,
}

impl Registry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
        }
    }

    pub fn register(&mut self, sink: Sink) -> Result<SlotId> {
        if self.slots.len() >= self.capacity {
            return Err(Error::RegistryFull {
                capacity: self.capacity,
            });
        }
        self.slots.push(sink);
        Ok(SlotId(self.slots.len() - 1))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot: SlotId) -> Option<&Sink> {
        self.slots.get(slot.0)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotId, &mut Sink)> {
        self.slots
            .iter_mut()
            .enumerate()
            .map(|(index, sink)| (SlotId(index), sink))
    }

    /// Empties the table in registration order.
    pub fn drain(&mut self) -> impl Iterator<Item = (SlotId, Sink)> + '_ {
        self.slots
            .drain(..)
            .enumerate()
            .map(|(index, sink)| (SlotId(index), sink))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{level::Level, sink::SinkKind};
    use crossbeam_channel::unbounded;

    #[test]
    fn test_register_until_full() {
        let (sender, _receiver) = unbounded();
        let mut registry = Registry::with_capacity(3);
        for (i, level) in [Level::Trace, Level::Info, Level::Fatal].into_iter().enumerate() {
            let slot = registry
                .register(Sink::new(SinkKind::Channel(sender.clone()), level))
                .unwrap();
            assert_eq!(slot, SlotId(i));
        }
        let err = registry
            .register(Sink::new(SinkKind::Channel(sender), Level::Warn))
            .unwrap_err();
        assert!(matches!(err, Error::RegistryFull { capacity: 3 }));
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get(SlotId(0)).unwrap().level(), Level::Trace);
        assert_eq!(registry.get(SlotId(2)).unwrap().level(), Level::Fatal);
    }

    #[test]
    fn test_huge_capacity_is_only_a_bound() {
        let (sender, _receiver) = unbounded();
        let mut registry = Registry::with_capacity(usize::MAX);
        assert_eq!(registry.capacity(), usize::MAX);
        assert_eq!(
            registry
                .register(Sink::new(SinkKind::Channel(sender), Level::Info))
                .unwrap(),
            SlotId(0)
        );
    }

    #[test]
    fn test_drain_empties_in_order() {
        let (sender, _receiver) = unbounded();
        let mut registry = Registry::default();
        registry
            .register(Sink::new(SinkKind::Channel(sender.clone()), Level::Debug))
            .unwrap();
        registry
            .register(Sink::new(SinkKind::Channel(sender), Level::Error))
            .unwrap();
        let levels: Vec<_> = registry.drain().map(|(_, sink)| sink.level()).collect();
        assert_eq!(levels, vec![Level::Debug, Level::Error]);
        assert!(registry.is_empty());
    }
}
