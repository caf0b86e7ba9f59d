use crate::error::MapperError;
use crate::value::{DeclaredKind, Obj, Value};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// How a field participates in storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldRole {
    /// Plain stored field.
    Default,
    /// Holds the numeric id or name that completes the instance key.
    Id,
    /// Holds the full native key; mutually exclusive with `Id`.
    Key,
    /// Relation whose target becomes the key ancestor.
    Parent,
    /// Relation keyed under this instance.
    Child,
    /// Relation stored as a key-valued property.
    Independent,
    /// Nested record flattened into prefixed properties.
    Embedded,
    /// Embedded slot whose concrete type varies per instance.
    PolymorphicEmbedded,
    /// Never stored.
    Transient,
}

type Getter = Box<dyn Fn(&Obj) -> Result<Value, MapperError> + Send + Sync>;
type Setter = Box<dyn Fn(&Obj, Value) -> Result<(), MapperError> + Send + Sync>;

/// One field of a registered type: its stored name, role, declared shape
/// and erased accessors into the live instance.
pub struct FieldDef {
    pub name: String,
    pub role: FieldRole,
    /// Per-field index override; falls back to the session default.
    pub indexed: Option<bool>,
    pub declared: DeclaredKind,
    /// Per-field activation depth override for relation fields.
    pub activation: Option<i32>,
    get: Getter,
    set: Setter,
}

impl FieldDef {
    pub fn new<T: 'static>(
        name: impl Into<String>,
        role: FieldRole,
        declared: DeclaredKind,
        get: fn(&T) -> Value,
        set: fn(&mut T, Value) -> Result<(), MapperError>,
    ) -> FieldDef {
        let name = name.into();
        let get_name = name.clone();
        let set_name = name.clone();
        FieldDef {
            name,
            role,
            indexed: None,
            declared,
            activation: None,
            get: Box::new(move |obj: &Obj| {
                let cell = obj.cell::<T>().ok_or_else(|| MapperError::Assignment {
                    at: get_name.clone(),
                    reason: "wrong instance type".into(),
                })?;
                Ok(get(&cell.borrow()))
            }),
            set: Box::new(move |obj: &Obj, value: Value| {
                let cell = obj.cell::<T>().ok_or_else(|| MapperError::Assignment {
                    at: set_name.clone(),
                    reason: "wrong instance type".into(),
                })?;
                set(&mut cell.borrow_mut(), value)
            }),
        }
    }

    pub fn unindexed(mut self) -> FieldDef {
        self.indexed = Some(false);
        self
    }

    pub fn indexed(mut self) -> FieldDef {
        self.indexed = Some(true);
        self
    }

    /// Limits how deep decoding follows this relation.
    pub fn activation(mut self, depth: i32) -> FieldDef {
        self.activation = Some(depth);
        self
    }

    pub fn get(&self, obj: &Obj) -> Result<Value, MapperError> {
        (self.get)(obj)
    }

    pub fn set(&self, obj: &Obj, value: Value) -> Result<(), MapperError> {
        (self.set)(obj, value)
    }
}

impl std::fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("declared", &self.declared)
            .finish()
    }
}

/// Everything the mapper knows about one registered type. Fields are kept
/// sorted by stored name so encode emits properties in path order and
/// decode can walk them with a single property cursor.
pub struct TypeModel {
    pub kind: String,
    pub type_name: &'static str,
    pub type_id: TypeId,
    fields: Vec<FieldDef>,
    construct: Option<fn() -> Obj>,
}

impl TypeModel {
    pub fn new<T: 'static>(kind: impl Into<String>) -> TypeModel {
        TypeModel {
            kind: kind.into(),
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            fields: Vec::new(),
            construct: None,
        }
    }

    pub fn with_field(mut self, field: FieldDef) -> TypeModel {
        let at = self.fields.partition_point(|f| f.name < field.name);
        self.fields.insert(at, field);
        self
    }

    /// Registers the constructor decoding uses to build fresh instances.
    pub fn constructed_by(mut self, construct: fn() -> Obj) -> TypeModel {
        self.construct = Some(construct);
        self
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_with_role(&self, role: FieldRole) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.role == role)
    }

    pub fn id_field(&self) -> Option<&FieldDef> {
        self.field_with_role(FieldRole::Id)
    }

    pub fn key_field(&self) -> Option<&FieldDef> {
        self.field_with_role(FieldRole::Key)
    }

    pub fn parent_field(&self) -> Option<&FieldDef> {
        self.field_with_role(FieldRole::Parent)
    }

    pub fn construct(&self) -> Result<Obj, MapperError> {
        let make = self.construct.ok_or(MapperError::MissingConstructor(self.type_name))?;
        Ok(make())
    }
}

impl std::fmt::Debug for TypeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeModel")
            .field("kind", &self.kind)
            .field("type_name", &self.type_name)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Immutable registry of every type a session can map. Built once and
/// shared; lookups are by TypeId or by stored kind.
#[derive(Debug, Default)]
pub struct Registry {
    by_type: HashMap<TypeId, Arc<TypeModel>>,
    by_kind: HashMap<String, TypeId>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder { models: Vec::new() }
    }

    pub fn model_for_type(&self, type_id: TypeId) -> Result<&Arc<TypeModel>, MapperError> {
        self.by_type
            .get(&type_id)
            .ok_or_else(|| MapperError::UnregisteredType(format!("{type_id:?}")))
    }

    pub fn model_for_kind(&self, kind: &str) -> Result<&Arc<TypeModel>, MapperError> {
        self.by_kind
            .get(kind)
            .and_then(|id| self.by_type.get(id))
            .ok_or_else(|| MapperError::UnregisteredKind(kind.to_string()))
    }

    pub fn contains_type(&self, type_id: TypeId) -> bool {
        self.by_type.contains_key(&type_id)
    }

    pub fn kind_of(&self, type_id: TypeId) -> Option<&str> {
        self.by_type.get(&type_id).map(|m| m.kind.as_str())
    }
}

pub struct RegistryBuilder {
    models: Vec<TypeModel>,
}

impl RegistryBuilder {
    pub fn register(mut self, model: TypeModel) -> RegistryBuilder {
        self.models.push(model);
        self
    }

    pub fn build(self) -> Result<Registry, MapperError> {
        let mut registry = Registry::default();
        for model in self.models {
            if model.id_field().is_some() && model.key_field().is_some() {
                return Err(MapperError::InvalidModel(format!(
                    "{} declares both an id field and a key field",
                    model.type_name
                )));
            }
            if registry.by_kind.contains_key(&model.kind) {
                return Err(MapperError::DuplicateKind(model.kind));
            }
            if registry.by_type.contains_key(&model.type_id) {
                return Err(MapperError::InvalidModel(format!(
                    "{} is registered twice",
                    model.type_name
                )));
            }
            registry.by_kind.insert(model.kind.clone(), model.type_id);
            registry.by_type.insert(model.type_id, Arc::new(model));
        }
        Ok(registry)
    }
}
