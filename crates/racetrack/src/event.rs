//! Events delivered by the instrumentation engine.
//!
//! Each event names its acting thread. Events of one thread arrive in that
//! thread's program order; events of different threads may interleave
//! arbitrarily. The serde form (`{"kind": "acquire", "thread": 1, "lock": 7}`)
//! is what the CLI replays from JSON lines.

use std::fmt::{self, Display};

use racetrack_types::{BarrierId, ClassId, FieldId, LockId, ObjectId, SiteId, ThreadId, VolatileId};
use serde::{Deserialize, Serialize};

// ============================================================================
// Memory Locations
// ============================================================================

/// The memory location an access touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessTarget {
    /// A field. `object` is `None` for static fields, whose state belongs to
    /// the declaring class `owner`.
    Field {
        object: Option<ObjectId>,
        owner: ClassId,
        field: FieldId,
    },
    /// One element of an array.
    Array { array: ObjectId, index: u32 },
}

impl AccessTarget {
    pub fn instance_field(object: ObjectId, owner: ClassId, field: FieldId) -> Self {
        Self::Field {
            object: Some(object),
            owner,
            field,
        }
    }

    pub fn static_field(owner: ClassId, field: FieldId) -> Self {
        Self::Field {
            object: None,
            owner,
            field,
        }
    }

    pub fn array(array: ObjectId, index: u32) -> Self {
        Self::Array { array, index }
    }

    /// The shadow-table key for this target.
    pub fn location(&self) -> Location {
        match *self {
            Self::Field {
                object: Some(object),
                field,
                ..
            } => Location::InstanceField { object, field },
            Self::Field {
                object: None,
                owner,
                field,
            } => Location::StaticField { class: owner, field },
            Self::Array { array, index } => Location::ArrayElement { array, index },
        }
    }

    /// Class whose initialization must be observed before this access.
    pub fn static_owner(&self) -> Option<ClassId> {
        match *self {
            Self::Field {
                object: None,
                owner,
                ..
            } => Some(owner),
            _ => None,
        }
    }
}

/// Identity of one shadowed memory location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    StaticField { class: ClassId, field: FieldId },
    InstanceField { object: ObjectId, field: FieldId },
    ArrayElement { array: ObjectId, index: u32 },
}

impl Location {
    /// Object the location lives in, if any.
    pub fn object(&self) -> Option<ObjectId> {
        match *self {
            Self::StaticField { .. } => None,
            Self::InstanceField { object, .. } => Some(object),
            Self::ArrayElement { array, .. } => Some(array),
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaticField { class, field } => write!(f, "{class}.{field} (static)"),
            Self::InstanceField { object, field } => write!(f, "{object}.{field}"),
            Self::ArrayElement { array, index } => write!(f, "{array}[{index}]"),
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// A plain (non-volatile) field or array access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub thread: ThreadId,
    pub target: AccessTarget,
    pub is_write: bool,
    pub site: SiteId,
}

impl AccessEvent {
    pub fn read(thread: ThreadId, target: AccessTarget, site: SiteId) -> Self {
        Self {
            thread,
            target,
            is_write: false,
            site,
        }
    }

    pub fn write(thread: ThreadId, target: AccessTarget, site: SiteId) -> Self {
        Self {
            thread,
            target,
            is_write: true,
            site,
        }
    }
}

/// Everything the detector can be told.
///
/// Volatile accesses have their own variant: they are synchronization, not
/// shadowed data accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Event {
    /// First scheduling of `thread`. Optional: any other event for an unseen
    /// thread creates it implicitly.
    ThreadCreated { thread: ThreadId },
    /// `thread` forks `child` (delivered before the child runs).
    ThreadStart { thread: ThreadId, child: ThreadId },
    /// `thread` terminated. Its id may be reused afterwards.
    ThreadStop { thread: ThreadId },
    /// `thread` observed the termination of `joined`.
    Join { thread: ThreadId, joined: ThreadId },
    Acquire { thread: ThreadId, lock: LockId },
    Release { thread: ThreadId, lock: LockId },
    /// Monitor wait begins (releases the monitor).
    PreWait { thread: ThreadId, lock: LockId },
    /// Monitor wait returns (reacquires the monitor).
    PostWait { thread: ThreadId, lock: LockId },
    VolatileAccess {
        thread: ThreadId,
        volatile: VolatileId,
        is_write: bool,
    },
    Access(AccessEvent),
    BarrierEnter { thread: ThreadId, barrier: BarrierId },
    BarrierExit { thread: ThreadId, barrier: BarrierId },
    /// `thread` finished static initialization of `class`.
    ClassInitialized { thread: ThreadId, class: ClassId },
    /// `thread` touched `class` after its initialization.
    ClassAccessed { thread: ThreadId, class: ClassId },
}

impl Event {
    /// The acting thread.
    pub fn thread(&self) -> ThreadId {
        match *self {
            Self::ThreadCreated { thread }
            | Self::ThreadStart { thread, .. }
            | Self::ThreadStop { thread }
            | Self::Join { thread, .. }
            | Self::Acquire { thread, .. }
            | Self::Release { thread, .. }
            | Self::PreWait { thread, .. }
            | Self::PostWait { thread, .. }
            | Self::VolatileAccess { thread, .. }
            | Self::BarrierEnter { thread, .. }
            | Self::BarrierExit { thread, .. }
            | Self::ClassInitialized { thread, .. }
            | Self::ClassAccessed { thread, .. } => thread,
            Self::Access(access) => access.thread,
        }
    }
}

impl From<AccessEvent> for Event {
    fn from(access: AccessEvent) -> Self {
        Self::Access(access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_target_field_is_static() {
        let target = AccessTarget::static_field(ClassId::new(3), FieldId::new(1));
        assert_eq!(target.static_owner(), Some(ClassId::new(3)));
        assert_eq!(
            target.location(),
            Location::StaticField {
                class: ClassId::new(3),
                field: FieldId::new(1)
            }
        );
        assert_eq!(target.location().object(), None);
    }

    #[test]
    fn instance_field_and_array_have_no_static_owner() {
        let field = AccessTarget::instance_field(ObjectId::new(9), ClassId::new(3), FieldId::new(1));
        let elem = AccessTarget::array(ObjectId::new(9), 4);
        assert_eq!(field.static_owner(), None);
        assert_eq!(elem.static_owner(), None);
        assert_ne!(field.location(), elem.location());
        assert_eq!(elem.location().to_string(), "obj#9[4]");
    }

    #[test]
    fn events_parse_from_json_lines() {
        let event: Event =
            serde_json::from_str(r#"{"kind":"acquire","thread":1,"lock":7}"#).unwrap();
        assert_eq!(
            event,
            Event::Acquire {
                thread: ThreadId::new(1),
                lock: LockId::new(7)
            }
        );

        let access: Event = serde_json::from_str(
            r#"{"kind":"access","thread":2,"target":{"array":{"array":5,"index":0}},"is_write":true,"site":11}"#,
        )
        .unwrap();
        assert_eq!(access.thread(), ThreadId::new(2));
        assert!(matches!(access, Event::Access(AccessEvent { is_write: true, .. })));
    }

    #[test]
    fn static_field_serializes_null_object() {
        let event = Event::from(AccessEvent::read(
            ThreadId::new(0),
            AccessTarget::static_field(ClassId::new(2), FieldId::new(5)),
            SiteId::new(1),
        ));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""object":null"#), "{json}");
    }
}
