use std::collections::BTreeMap;
use std::fmt;

use crate::world::{Body, Entity, ObjectId, SceneId, SpawnInfo};

use super::savable::SavableComponent;
use super::SnapshotError;

type ComponentFactory = Box<dyn Fn() -> Box<dyn SavableComponent>>;
type PrefabFactory = Box<dyn Fn() -> PrefabInstance>;

/// Maps savable type tags to constructors. Tags are validated when they are
/// registered; an unknown tag at load time is an error.
#[derive(Default)]
pub struct TypeCatalog {
    factories: BTreeMap<String, ComponentFactory>,
}

impl fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCatalog")
            .field("tags", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TypeCatalog {
    pub fn register<F>(&mut self, tag: impl Into<String>, factory: F) -> Result<(), SnapshotError>
    where
        F: Fn() -> Box<dyn SavableComponent> + 'static,
    {
        let tag = tag.into();
        if self.factories.contains_key(&tag) {
            return Err(SnapshotError::DuplicateTypeTag { tag });
        }
        self.factories.insert(tag, Box::new(factory));
        Ok(())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    pub fn resolve(&self, tag: &str) -> Result<(), SnapshotError> {
        if self.contains(tag) {
            Ok(())
        } else {
            Err(SnapshotError::UnknownTypeTag {
                tag: tag.to_string(),
            })
        }
    }

    pub fn create(&self, tag: &str) -> Result<Box<dyn SavableComponent>, SnapshotError> {
        let factory = self
            .factories
            .get(tag)
            .ok_or_else(|| SnapshotError::UnknownTypeTag {
                tag: tag.to_string(),
            })?;
        let component = factory();
        if component.type_tag() != tag {
            return Err(SnapshotError::TagMismatch {
                expected: component.type_tag().to_string(),
                actual: tag.to_string(),
            });
        }
        Ok(component)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

/// What a prefab produces before it is given an id and a scene.
#[derive(Debug, Default)]
pub struct PrefabInstance {
    pub body: Option<Body>,
    pub components: Vec<Box<dyn SavableComponent>>,
}

#[derive(Default)]
pub struct PrefabCatalog {
    prefabs: BTreeMap<String, PrefabFactory>,
}

impl fmt::Debug for PrefabCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefabCatalog")
            .field("prefabs", &self.prefabs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PrefabCatalog {
    pub fn register<F>(
        &mut self,
        prefab: impl Into<String>,
        factory: F,
    ) -> Result<(), SnapshotError>
    where
        F: Fn() -> PrefabInstance + 'static,
    {
        let prefab = prefab.into();
        if self.prefabs.contains_key(&prefab) {
            return Err(SnapshotError::DuplicatePrefab { prefab });
        }
        self.prefabs.insert(prefab, Box::new(factory));
        Ok(())
    }

    pub fn contains(&self, prefab: &str) -> bool {
        self.prefabs.contains_key(prefab)
    }

    /// Builds a spawned entity named `{prefab}{spawn_tag}`.
    pub fn instantiate(
        &self,
        prefab: &str,
        spawn_tag: &str,
        id: ObjectId,
        scene: SceneId,
    ) -> Result<Entity, SnapshotError> {
        let factory = self
            .prefabs
            .get(prefab)
            .ok_or_else(|| SnapshotError::UnknownPrefab {
                prefab: prefab.to_string(),
            })?;
        let instance = factory();
        let mut entity = Entity::new(id, format!("{prefab}{spawn_tag}"), scene).with_spawn(
            SpawnInfo {
                prefab: prefab.to_string(),
                spawn_tag: spawn_tag.to_string(),
            },
        );
        entity.body = instance.body;
        for component in instance.components {
            entity.add_component(component, false);
        }
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::snapshot::FieldMap;

    #[derive(Debug, Default)]
    struct Counter {
        value: i64,
    }

    impl SavableComponent for Counter {
        fn type_tag(&self) -> &'static str {
            "Counter"
        }

        fn capture(&self) -> Result<FieldMap, SnapshotError> {
            let mut fields = FieldMap::new();
            fields.insert("value", self.value)?;
            Ok(fields)
        }

        fn restore(&mut self, fields: &FieldMap) -> Result<(), SnapshotError> {
            self.value = fields.get("value")?;
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut catalog = TypeCatalog::default();
        catalog
            .register("Counter", || Box::new(Counter::default()))
            .expect("register");
        let err = catalog
            .register("Counter", || Box::new(Counter::default()))
            .expect_err("duplicate");
        assert_eq!(
            err,
            SnapshotError::DuplicateTypeTag {
                tag: "Counter".to_string()
            }
        );
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let catalog = TypeCatalog::default();
        assert!(matches!(
            catalog.create("Missing"),
            Err(SnapshotError::UnknownTypeTag { .. })
        ));
    }

    #[test]
    fn factory_tag_must_match_registration() {
        let mut catalog = TypeCatalog::default();
        catalog
            .register("Timer", || Box::new(Counter::default()))
            .expect("register");
        assert!(matches!(
            catalog.create("Timer"),
            Err(SnapshotError::TagMismatch { .. })
        ));
    }

    #[test]
    fn prefab_instance_is_named_with_spawn_tag() {
        let mut prefabs = PrefabCatalog::default();
        prefabs
            .register("crate", || PrefabInstance {
                body: Some(Body::default()),
                components: vec![Box::new(Counter::default())],
            })
            .expect("register");

        let entity = prefabs
            .instantiate("crate", "_3", ObjectId(40), SceneId(1))
            .expect("instantiate");
        assert_eq!(entity.name, "crate_3");
        assert!(entity.is_spawned());
        assert!(entity.component("Counter").is_some());
    }
}
