use crate::error::MapperError;
use crate::model::{FieldDef, FieldRole, Registry};
use crate::value::DeclaredKind;
use std::any::TypeId;
use std::sync::Arc;

/// Field-classification oracle consulted by the object translator. Role
/// decisions live here, never in the translator tree, so alternative
/// classification schemes slot in without touching encode or decode.
pub trait Configuration: Send + Sync {
    fn stored(&self, field: &FieldDef) -> bool;

    fn indexed(&self, field: &FieldDef, session_default: bool) -> bool;

    fn name<'a>(&self, field: &'a FieldDef) -> &'a str;

    fn declared<'a>(&self, field: &'a FieldDef) -> &'a DeclaredKind;

    fn id(&self, field: &FieldDef) -> bool;

    fn key(&self, field: &FieldDef) -> bool;

    fn parent(&self, field: &FieldDef) -> bool;

    fn child(&self, field: &FieldDef) -> bool;

    /// True when the field's referent is itself a registered entity type.
    fn entity(&self, field: &FieldDef) -> bool;

    fn embed(&self, field: &FieldDef) -> bool;

    fn polymorphic(&self, field: &FieldDef) -> bool;

    /// Depth to decode this field's subtree at, given the current depth.
    fn activation_depth(&self, field: &FieldDef, current: i32) -> i32;

    fn type_to_kind(&self, type_id: TypeId) -> Result<String, MapperError>;

    fn kind_to_type(&self, kind: &str) -> Result<TypeId, MapperError>;

    /// Whether null field values are written as Null properties.
    fn null_stored(&self) -> bool {
        false
    }
}

/// Default configuration answering from field roles and the registry.
pub struct ModelConfiguration {
    registry: Arc<Registry>,
}

impl ModelConfiguration {
    pub fn new(registry: Arc<Registry>) -> ModelConfiguration {
        ModelConfiguration { registry }
    }

    fn target_is_entity(&self, declared: &DeclaredKind) -> bool {
        match declared {
            DeclaredKind::Object(type_id) => self.registry.contains_type(*type_id),
            DeclaredKind::List(inner) | DeclaredKind::Map(inner) => self.target_is_entity(inner),
            _ => false,
        }
    }
}

impl Configuration for ModelConfiguration {
    fn stored(&self, field: &FieldDef) -> bool {
        field.role != FieldRole::Transient
    }

    fn indexed(&self, field: &FieldDef, session_default: bool) -> bool {
        field.indexed.unwrap_or(session_default)
    }

    fn name<'a>(&self, field: &'a FieldDef) -> &'a str {
        &field.name
    }

    fn declared<'a>(&self, field: &'a FieldDef) -> &'a DeclaredKind {
        &field.declared
    }

    fn id(&self, field: &FieldDef) -> bool {
        field.role == FieldRole::Id
    }

    fn key(&self, field: &FieldDef) -> bool {
        field.role == FieldRole::Key
    }

    fn parent(&self, field: &FieldDef) -> bool {
        field.role == FieldRole::Parent
    }

    fn child(&self, field: &FieldDef) -> bool {
        field.role == FieldRole::Child
    }

    fn entity(&self, field: &FieldDef) -> bool {
        matches!(
            field.role,
            FieldRole::Parent | FieldRole::Child | FieldRole::Independent
        ) && self.target_is_entity(&field.declared)
    }

    fn embed(&self, field: &FieldDef) -> bool {
        matches!(
            field.role,
            FieldRole::Embedded | FieldRole::PolymorphicEmbedded
        )
    }

    fn polymorphic(&self, field: &FieldDef) -> bool {
        field.role == FieldRole::PolymorphicEmbedded
    }

    fn activation_depth(&self, field: &FieldDef, current: i32) -> i32 {
        match field.activation {
            Some(depth) => depth.min(current),
            None => current,
        }
    }

    fn type_to_kind(&self, type_id: TypeId) -> Result<String, MapperError> {
        Ok(self.registry.model_for_type(type_id)?.kind.clone())
    }

    fn kind_to_type(&self, kind: &str) -> Result<TypeId, MapperError> {
        Ok(self.registry.model_for_kind(kind)?.type_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeModel;
    use crate::value::{Obj, ScalarKind, Value};

    #[derive(Clone, Default)]
    struct Thing {
        n: i64,
    }

    fn registry() -> Arc<Registry> {
        let model = TypeModel::new::<Thing>("Thing")
            .constructed_by(|| Obj::new(Thing::default()))
            .with_field(FieldDef::new::<Thing>(
                "n",
                FieldRole::Default,
                DeclaredKind::Scalar(ScalarKind::I64),
                |t| Value::I64(t.n),
                |t, v| {
                    t.n = v.as_i64().unwrap_or(0);
                    Ok(())
                },
            ))
            .with_field(
                FieldDef::new::<Thing>(
                    "other",
                    FieldRole::Independent,
                    DeclaredKind::object::<Thing>(),
                    |_| Value::Null,
                    |_, _| Ok(()),
                )
                .activation(1),
            );
        Arc::new(Registry::builder().register(model).build().unwrap())
    }

    #[test]
    fn roles_drive_classification() {
        let registry = registry();
        let config = ModelConfiguration::new(Arc::clone(&registry));
        let model = registry.model_for_kind("Thing").unwrap();
        let plain = model.field("n").unwrap();
        let relation = model.field("other").unwrap();
        assert!(config.stored(plain));
        assert!(!config.entity(plain));
        assert!(config.entity(relation));
        assert!(!config.parent(relation));
    }

    #[test]
    fn activation_override_caps_the_current_depth() {
        let registry = registry();
        let config = ModelConfiguration::new(Arc::clone(&registry));
        let model = registry.model_for_kind("Thing").unwrap();
        let relation = model.field("other").unwrap();
        assert_eq!(config.activation_depth(relation, 5), 1);
        assert_eq!(config.activation_depth(relation, 0), 0);
        let plain = model.field("n").unwrap();
        assert_eq!(config.activation_depth(plain, 5), 5);
    }

    #[test]
    fn field_accessors_borrow_from_the_field_not_the_config() {
        let registry = registry();
        let model = registry.model_for_kind("Thing").unwrap();
        let field = model.field("n").unwrap();
        // the returned references must outlive the configuration
        let (name, declared) = {
            let config = ModelConfiguration::new(Arc::clone(&registry));
            (config.name(field), config.declared(field))
        };
        assert_eq!(name, "n");
        assert_eq!(*declared, DeclaredKind::Scalar(ScalarKind::I64));
    }

    #[test]
    fn kind_mapping_round_trips() {
        let registry = registry();
        let config = ModelConfiguration::new(registry);
        let type_id = config.kind_to_type("Thing").unwrap();
        assert_eq!(config.type_to_kind(type_id).unwrap(), "Thing");
        assert!(config.kind_to_type("Nope").is_err());
    }
}
