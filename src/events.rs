use crate::copy::PasteOptions;
use crate::skeleton::{BoneId, SkeletonId};
use crate::skinning::{SkinningMode, SpriteId};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum RigEvent {
    CopyPerformed,
    PastePerformed(PasteOptions),
    BoneSelectionChanged,
    SkeletonTopologyChanged { skeleton: SkeletonId },
    SkeletonPoseChanged { skeleton: SkeletonId },
    SkeletonBindPoseChanged { skeleton: SkeletonId },
    MeshChanged { sprite: SpriteId },
    CharacterPartChanged { sprite: SpriteId },
    BoneColorChanged { bone: BoneId },
    BoneNameChanged { bone: BoneId },
    SkinningModeChanged { mode: SkinningMode },
}

impl fmt::Display for RigEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RigEvent::CopyPerformed => write!(f, "CopyPerformed"),
            RigEvent::PastePerformed(options) => write!(
                f,
                "PastePerformed bones={} mesh={} flip_x={} flip_y={}",
                options.bones, options.mesh, options.flip_x, options.flip_y
            ),
            RigEvent::BoneSelectionChanged => write!(f, "BoneSelectionChanged"),
            RigEvent::SkeletonTopologyChanged { skeleton } => {
                write!(f, "SkeletonTopologyChanged skeleton={skeleton}")
            }
            RigEvent::SkeletonPoseChanged { skeleton } => {
                write!(f, "SkeletonPoseChanged skeleton={skeleton}")
            }
            RigEvent::SkeletonBindPoseChanged { skeleton } => {
                write!(f, "SkeletonBindPoseChanged skeleton={skeleton}")
            }
            RigEvent::MeshChanged { sprite } => write!(f, "MeshChanged sprite={sprite}"),
            RigEvent::CharacterPartChanged { sprite } => write!(f, "CharacterPartChanged sprite={sprite}"),
            RigEvent::BoneColorChanged { bone } => write!(f, "BoneColorChanged bone={bone}"),
            RigEvent::BoneNameChanged { bone } => write!(f, "BoneNameChanged bone={bone}"),
            RigEvent::SkinningModeChanged { mode } => write!(f, "SkinningModeChanged mode={}", mode.label()),
        }
    }
}

pub trait RigEventListener {
    fn on_event(&mut self, event: &RigEvent);
}

#[derive(Default)]
pub struct EventBus {
    events: Vec<RigEvent>,
}

impl EventBus {
    pub fn push(&mut self, event: RigEvent) {
        log::trace!("[events] {event}");
        self.events.push(event);
    }

    pub fn pending(&self) -> &[RigEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> Vec<RigEvent> {
        self.events.drain(..).collect()
    }

    /// Drains queued events and hands each one, in order, to every listener.
    pub fn dispatch(&mut self, listeners: &mut [&mut dyn RigEventListener]) -> Vec<RigEvent> {
        let events = self.drain();
        for event in &events {
            for listener in listeners.iter_mut() {
                listener.on_event(event);
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<String>,
    }

    impl RigEventListener for Recorder {
        fn on_event(&mut self, event: &RigEvent) {
            self.seen.push(event.to_string());
        }
    }

    #[test]
    fn dispatch_fans_out_in_order_and_empties_the_queue() {
        let mut bus = EventBus::default();
        bus.push(RigEvent::CopyPerformed);
        bus.push(RigEvent::BoneSelectionChanged);

        let mut first = Recorder::default();
        let mut second = Recorder::default();
        let drained = bus.dispatch(&mut [&mut first, &mut second]);

        assert_eq!(drained.len(), 2);
        assert!(bus.is_empty());
        assert_eq!(first.seen, vec!["CopyPerformed", "BoneSelectionChanged"]);
        assert_eq!(first.seen, second.seen);
    }
}
