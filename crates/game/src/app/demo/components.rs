use std::any::Any;
use std::collections::BTreeSet;

use rewind_engine::{FieldMap, SavableComponent, SnapshotError};

/// Sticky pad left behind by the player; remembers which objects it holds
/// by name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct StickyPad {
    connected: BTreeSet<String>,
}

impl StickyPad {
    pub(crate) const TAG: &'static str = "StickyPad";

    pub(crate) fn stick(&mut self, name: impl Into<String>) -> bool {
        self.connected.insert(name.into())
    }

    pub(crate) fn len(&self) -> usize {
        self.connected.len()
    }
}

impl SavableComponent for StickyPad {
    fn type_tag(&self) -> &'static str {
        Self::TAG
    }

    fn capture(&self) -> Result<FieldMap, SnapshotError> {
        let mut fields = FieldMap::new();
        fields.insert_list("connected", self.connected.iter().map(String::as_str))?;
        Ok(fields)
    }

    fn restore(&mut self, fields: &FieldMap) -> Result<(), SnapshotError> {
        self.connected = fields.get_list::<String>("connected")?.into_iter().collect();
        Ok(())
    }

    // Pads re-attach what they hold, so everything else must be in place.
    fn priority(&self) -> i32 {
        -1
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct CrackedPiece {
    pub(crate) cracked: bool,
}

impl CrackedPiece {
    pub(crate) const TAG: &'static str = "CrackedPiece";
}

impl SavableComponent for CrackedPiece {
    fn type_tag(&self) -> &'static str {
        Self::TAG
    }

    fn capture(&self) -> Result<FieldMap, SnapshotError> {
        let mut fields = FieldMap::new();
        fields.insert("cracked", self.cracked)?;
        Ok(fields)
    }

    fn restore(&mut self, fields: &FieldMap) -> Result<(), SnapshotError> {
        self.cracked = fields.get("cracked")?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Level clock. Rewinding winds it back along with everything else.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct LevelTimer {
    pub(crate) elapsed_seconds: f32,
    pub(crate) checkpoints: i64,
}

impl LevelTimer {
    pub(crate) const TAG: &'static str = "LevelTimer";

    pub(crate) fn advance(&mut self, seconds: f32) {
        self.elapsed_seconds += seconds;
    }
}

impl SavableComponent for LevelTimer {
    fn type_tag(&self) -> &'static str {
        Self::TAG
    }

    fn capture(&self) -> Result<FieldMap, SnapshotError> {
        let mut fields = FieldMap::new();
        fields.insert("elapsed_seconds", self.elapsed_seconds)?;
        fields.insert("checkpoints", self.checkpoints)?;
        Ok(fields)
    }

    fn restore(&mut self, fields: &FieldMap) -> Result<(), SnapshotError> {
        self.elapsed_seconds = fields.get("elapsed_seconds")?;
        self.checkpoints = fields.get("checkpoints")?;
        Ok(())
    }

    fn priority(&self) -> i32 {
        1
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sticky_pad_round_trips_its_connections() {
        let mut pad = StickyPad::default();
        pad.stick("crate_21");
        pad.stick("crate_22");
        let fields = pad.capture().expect("capture");

        let mut restored = StickyPad::default();
        restored.restore(&fields).expect("restore");
        assert_eq!(restored, pad);
        assert!(restored.connected.contains("crate_22"));
    }

    #[test]
    fn sticking_the_same_object_twice_is_ignored() {
        let mut pad = StickyPad::default();
        assert!(pad.stick("crate_21"));
        assert!(!pad.stick("crate_21"));
        assert_eq!(pad.len(), 1);
    }

    #[test]
    fn timer_restore_rejects_wrong_field_types() {
        let mut fields = FieldMap::new();
        fields.insert("elapsed_seconds", "soon").expect("insert");
        fields.insert("checkpoints", 1i64).expect("insert");

        let err = LevelTimer::default().restore(&fields).expect_err("type mismatch");
        assert!(matches!(err, SnapshotError::FieldType { .. }));
    }
}
