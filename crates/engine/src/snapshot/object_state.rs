use serde::{Deserialize, Serialize};

use crate::math::{Quat, Vec2, Vec3};
use crate::world::{Body, Entity, ObjectId, SceneId, SpawnInfo};

use super::catalog::TypeCatalog;
use super::savable::SavableObject;
use super::SnapshotError;

/// One entity's snapshot inside a [`super::GameState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectState {
    pub object_id: ObjectId,
    pub name: String,
    pub scene: SceneId,
    pub position: Vec3,
    pub scale: Vec3,
    pub rotation: Quat,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn: Option<SpawnInfo>,
    pub savables: Vec<SavableObject>,
    /// Max over the entity's component priorities; higher loads first.
    #[serde(default)]
    pub priority: i32,
}

fn default_active() -> bool {
    true
}

impl ObjectState {
    pub fn capture(entity: &Entity) -> Result<Self, SnapshotError> {
        let mut savables = Vec::new();
        let mut priority = None::<i32>;
        for slot in entity.components() {
            savables.push(SavableObject::capture(
                slot.component.as_ref(),
                entity.spawn.as_ref(),
                slot.spawned_script,
            )?);
            let component_priority = slot.component.priority();
            priority = Some(priority.map_or(component_priority, |p| p.max(component_priority)));
        }

        Ok(Self {
            object_id: entity.id,
            name: entity.name.clone(),
            scene: entity.scene,
            position: entity.transform.position,
            scale: entity.transform.scale,
            rotation: entity.transform.rotation,
            active: entity.active,
            body: entity.body,
            spawn: entity.spawn.clone(),
            savables,
            priority: priority.unwrap_or(0),
        })
    }

    pub fn position2(&self) -> Vec2 {
        self.position.truncate()
    }

    pub fn is_spawned(&self) -> bool {
        self.spawn.is_some()
    }

    /// Checks every type tag resolves in `catalog`.
    pub fn validate(&self, catalog: &TypeCatalog) -> Result<(), SnapshotError> {
        for savable in &self.savables {
            catalog.resolve(&savable.type_tag)?;
        }
        Ok(())
    }

    /// Fails with the error [`Self::restore`] would hit, without touching
    /// `entity`.
    pub fn check(&self, entity: &Entity, catalog: &TypeCatalog) -> Result<(), SnapshotError> {
        self.check_fields(catalog)?;
        for savable in &self.savables {
            if entity.component(&savable.type_tag).is_none() && !savable.is_spawned_script {
                return Err(SnapshotError::MissingComponent {
                    object: entity.name.clone(),
                    tag: savable.type_tag.clone(),
                });
            }
        }
        Ok(())
    }

    /// Decodes every saved component into a scratch instance from `catalog`.
    pub fn check_fields(&self, catalog: &TypeCatalog) -> Result<(), SnapshotError> {
        for savable in &self.savables {
            catalog.create(&savable.type_tag)?.restore(&savable.fields)?;
        }
        Ok(())
    }

    /// Applies this snapshot onto `entity`.
    ///
    /// Missing components that were attached at runtime are recreated from
    /// `catalog`; any other missing component is an error. Everything is
    /// checked before the entity is touched.
    pub fn restore(&self, entity: &mut Entity, catalog: &TypeCatalog) -> Result<(), SnapshotError> {
        self.check(entity, catalog)?;
        let mut recreated = Vec::new();
        for savable in &self.savables {
            if entity.component(&savable.type_tag).is_none() {
                recreated.push(catalog.create(&savable.type_tag)?);
            }
        }
        for component in recreated {
            entity.add_component(component, true);
        }

        entity.transform.position = self.position;
        entity.transform.scale = self.scale;
        entity.transform.rotation = self.rotation;
        if let (Some(live), Some(saved)) = (entity.body.as_mut(), self.body) {
            *live = saved;
        }
        entity.active = self.active;

        for savable in &self.savables {
            if let Some(component) = entity.component_mut(&savable.type_tag) {
                component.restore(&savable.fields)?;
            }
        }
        Ok(())
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.scale.is_finite()
            && self.rotation.is_finite()
            && self
                .body
                .map_or(true, |body| body.velocity.is_finite() && body.angular_velocity.is_finite())
            && self.savables.iter().all(SavableObject::is_finite)
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::snapshot::{FieldMap, SavableComponent};
    use crate::world::Transform;

    #[derive(Debug, Default)]
    struct StickyList {
        connected: Vec<String>,
    }

    impl SavableComponent for StickyList {
        fn type_tag(&self) -> &'static str {
            "StickyList"
        }

        fn capture(&self) -> Result<FieldMap, SnapshotError> {
            let mut fields = FieldMap::new();
            fields.insert_list("connected", self.connected.iter().cloned())?;
            Ok(fields)
        }

        fn restore(&mut self, fields: &FieldMap) -> Result<(), SnapshotError> {
            self.connected = fields.get_list("connected")?;
            Ok(())
        }

        fn priority(&self) -> i32 {
            3
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn catalog() -> TypeCatalog {
        let mut catalog = TypeCatalog::default();
        catalog
            .register("StickyList", || Box::new(StickyList::default()))
            .expect("register");
        catalog
    }

    fn sample_entity() -> Entity {
        Entity::new(ObjectId(2), "pad", SceneId(1))
            .with_transform(Transform {
                position: Vec3::new(1.0, 2.0, 0.0),
                scale: Vec3::new(2.0, 1.0, 1.0),
                rotation: Quat::from_rotation_z(0.5),
            })
            .with_body(Body {
                velocity: Vec2::new(3.0, -1.0),
                angular_velocity: 0.25,
            })
            .with_component(Box::new(StickyList {
                connected: vec!["crate_1".to_string()],
            }))
    }

    #[test]
    fn restore_after_capture_is_identity() {
        let mut entity = sample_entity();
        let state = ObjectState::capture(&entity).expect("capture");
        assert_eq!(state.priority, 3);

        state.restore(&mut entity, &catalog()).expect("restore");
        let again = ObjectState::capture(&entity).expect("capture again");
        assert_eq!(again, state);
    }

    #[test]
    fn restore_rewinds_mutations() {
        let mut entity = sample_entity();
        let state = ObjectState::capture(&entity).expect("capture");

        entity.transform.position = Vec3::new(9.0, 9.0, 0.0);
        entity.body = Some(Body::default());
        entity
            .component_as_mut::<StickyList>()
            .expect("sticky")
            .connected
            .clear();

        state.restore(&mut entity, &catalog()).expect("restore");
        assert_eq!(entity.transform.position, Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(entity.body.expect("body").velocity, Vec2::new(3.0, -1.0));
        assert_eq!(
            entity.component_as::<StickyList>().expect("sticky").connected,
            vec!["crate_1".to_string()]
        );
    }

    #[test]
    fn restore_skips_body_fields_on_bodiless_entity() {
        let entity = sample_entity();
        let state = ObjectState::capture(&entity).expect("capture");
        let mut bodiless =
            Entity::new(ObjectId(2), "pad", SceneId(1)).with_component(Box::new(StickyList::default()));
        state.restore(&mut bodiless, &catalog()).expect("restore");
        assert!(bodiless.body.is_none());
    }

    #[test]
    fn missing_spawned_script_is_recreated() {
        let mut source = Entity::new(ObjectId(2), "pad", SceneId(1));
        source.add_component(
            Box::new(StickyList {
                connected: vec!["merky".to_string()],
            }),
            true,
        );
        let state = ObjectState::capture(&source).expect("capture");
        assert!(state.savables[0].is_spawned_script);

        let mut target = Entity::new(ObjectId(2), "pad", SceneId(1));
        state.restore(&mut target, &catalog()).expect("restore");
        let sticky = target.component_as::<StickyList>().expect("recreated");
        assert_eq!(sticky.connected, vec!["merky".to_string()]);
    }

    #[test]
    fn missing_authored_component_is_fatal_and_leaves_entity_untouched() {
        let state = ObjectState::capture(&sample_entity()).expect("capture");
        let mut target = Entity::new(ObjectId(2), "pad", SceneId(1));
        let err = state.restore(&mut target, &catalog()).expect_err("missing");
        assert!(matches!(err, SnapshotError::MissingComponent { .. }));
        assert_eq!(target.transform, Transform::default());
    }

    #[test]
    fn badly_typed_field_is_caught_before_the_entity_changes() {
        let mut state = ObjectState::capture(&sample_entity()).expect("capture");
        state.savables[0].fields = FieldMap::new();
        state.savables[0]
            .fields
            .insert("connected", 4i64)
            .expect("insert");

        let mut target = sample_entity();
        target.transform.position = Vec3::new(7.0, 7.0, 0.0);
        assert!(matches!(
            state.check(&target, &catalog()),
            Err(SnapshotError::FieldType { .. })
        ));
        assert!(state.restore(&mut target, &catalog()).is_err());
        assert_eq!(target.transform.position, Vec3::new(7.0, 7.0, 0.0));
        assert_eq!(
            target.component_as::<StickyList>().expect("sticky").connected,
            vec!["crate_1".to_string()]
        );
    }

    #[test]
    fn unknown_tag_fails_validation() {
        let state = ObjectState::capture(&sample_entity()).expect("capture");
        let empty = TypeCatalog::default();
        assert!(matches!(
            state.validate(&empty),
            Err(SnapshotError::UnknownTypeTag { .. })
        ));
    }
}
