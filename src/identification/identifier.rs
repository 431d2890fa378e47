use std::time::Instant;

use crate::core::config::{IdentificationConfig, IdentifierKind};
use crate::identification::binary::BinaryObjectIdentifier;
use crate::identification::model::TactileObject;

/// 每帧对全部追踪物体调用一次，原地推进识别状态
pub trait Identify {
    /// Must leave Detected objects untouched.
    fn recognize_object_ids(
        &mut self,
        objects: &mut [TactileObject],
        config: &IdentificationConfig,
        now: Instant,
    );
}

impl Identify for BinaryObjectIdentifier {
    fn recognize_object_ids(
        &mut self,
        objects: &mut [TactileObject],
        config: &IdentificationConfig,
        now: Instant,
    ) {
        self.recognize_object_ids_at(objects, config, now);
    }
}

/// Identification strategy, chosen once from [`IdentifierKind`].
#[derive(Debug, Clone)]
pub enum ObjectIdentifier {
    Binary(BinaryObjectIdentifier),
}

impl ObjectIdentifier {
    pub fn from_kind(kind: IdentifierKind) -> Self {
        match kind {
            IdentifierKind::Binary => ObjectIdentifier::Binary(BinaryObjectIdentifier::new()),
        }
    }

    pub fn kind(&self) -> IdentifierKind {
        match self {
            ObjectIdentifier::Binary(_) => IdentifierKind::Binary,
        }
    }
}

impl Default for ObjectIdentifier {
    fn default() -> Self {
        Self::from_kind(IdentifierKind::default())
    }
}

impl Identify for ObjectIdentifier {
    fn recognize_object_ids(
        &mut self,
        objects: &mut [TactileObject],
        config: &IdentificationConfig,
        now: Instant,
    ) {
        match self {
            ObjectIdentifier::Binary(binary) => {
                Identify::recognize_object_ids(binary, objects, config, now)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identification::state_machine::IdentifierPhase;

    #[test]
    fn test_from_kind() {
        let identifier = ObjectIdentifier::from_kind(IdentifierKind::Binary);
        assert_eq!(identifier.kind(), IdentifierKind::Binary);
        assert_eq!(ObjectIdentifier::default().kind(), IdentifierKind::Binary);
    }

    #[test]
    fn test_dispatch_advances_phases() {
        let mut identifier = ObjectIdentifier::default();
        let mut objects = vec![TactileObject::new(1), TactileObject::new(2)];
        objects[1].identification.request();

        identifier.recognize_object_ids(&mut objects, &IdentificationConfig::default(), Instant::now());

        assert!(objects
            .iter()
            .all(|o| o.identification.phase() == IdentifierPhase::Sampling));
    }
}
