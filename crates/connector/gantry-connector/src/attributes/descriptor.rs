//! Connected attribute descriptors

use crate::entity::EntityType;
use crate::feature::{FeatureOptions, DESCRIPTION_OPTION, DISPLAY_NAME_OPTION};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use uuid::Uuid;

/// Default descriptor class for attributes built without an explicit one
pub const DEFAULT_ATTRIBUTE_CLASS: &str = "attribute";

/// Read/write capability of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeAccess {
    /// Readable only
    Read,
    /// Writable only
    Write,
    /// Readable and writable
    ReadWrite,
}

impl AttributeAccess {
    /// Whether reads are allowed
    #[must_use]
    pub fn is_readable(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// Whether writes are allowed
    #[must_use]
    pub fn is_writable(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// Metadata of one connected attribute.
///
/// Immutable once connected, except for the entity type, which is detected at
/// most once and then cached. Two descriptors are equal iff they share the same
/// class and identity token.
pub struct AttributeDescriptor {
    id: String,
    name: String,
    display_name: String,
    description: String,
    access: AttributeAccess,
    cacheable: bool,
    options: FeatureOptions,
    class: &'static str,
    token: Uuid,
    entity_type: OnceCell<EntityType>,
    extension: Option<Arc<dyn Any + Send + Sync>>,
}

impl AttributeDescriptor {
    /// Start building a descriptor for the connector-side attribute `name`
    pub fn builder(name: impl Into<String>) -> AttributeDescriptorBuilder {
        AttributeDescriptorBuilder::new(name)
    }

    /// Stamp the registry id; only the registry does this, before publishing
    pub(crate) fn bind(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Id the attribute is connected under
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Connector-side attribute name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display name
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Access capability
    pub fn access(&self) -> AttributeAccess {
        self.access
    }

    /// Whether reads are allowed
    pub fn is_readable(&self) -> bool {
        self.access.is_readable()
    }

    /// Whether writes are allowed
    pub fn is_writable(&self) -> bool {
        self.access.is_writable()
    }

    /// Whether consumers may cache read results
    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    /// Options the attribute was connected with
    pub fn options(&self) -> &FeatureOptions {
        &self.options
    }

    /// Descriptor class, part of the identity
    pub fn class(&self) -> &'static str {
        self.class
    }

    /// Opaque identity token
    pub fn token(&self) -> Uuid {
        self.token
    }

    /// The entity type, if already known
    pub fn entity_type(&self) -> Option<&EntityType> {
        self.entity_type.get()
    }

    /// The entity type, running `detect` only if it has never been determined
    pub fn entity_type_or_init<F>(&self, detect: F) -> &EntityType
    where
        F: FnOnce() -> EntityType,
    {
        self.entity_type.get_or_init(detect)
    }

    /// Connector-specific payload attached at resolution time
    pub fn extension<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.extension.as_deref().and_then(|ext| ext.downcast_ref::<T>())
    }
}

impl PartialEq for AttributeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.token == other.token
    }
}

impl Eq for AttributeDescriptor {}

impl Hash for AttributeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.class.hash(state);
        self.token.hash(state);
    }
}

impl fmt::Debug for AttributeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("access", &self.access)
            .field("class", &self.class)
            .field("token", &self.token)
            .field("entity_type", &self.entity_type.get().map(EntityType::name))
            .finish_non_exhaustive()
    }
}

/// Builder for [`AttributeDescriptor`]
pub struct AttributeDescriptorBuilder {
    name: String,
    display_name: Option<String>,
    description: Option<String>,
    access: AttributeAccess,
    cacheable: bool,
    options: FeatureOptions,
    class: &'static str,
    token: Option<Uuid>,
    entity_type: Option<EntityType>,
    extension: Option<Arc<dyn Any + Send + Sync>>,
}

impl AttributeDescriptorBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            access: AttributeAccess::ReadWrite,
            cacheable: false,
            options: FeatureOptions::new(),
            class: DEFAULT_ATTRIBUTE_CLASS,
            token: None,
            entity_type: None,
            extension: None,
        }
    }

    /// Display name; defaults to the `displayName` option, then to the name
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Description; defaults to the `description` option
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Access capability (default read/write)
    pub fn access(mut self, access: AttributeAccess) -> Self {
        self.access = access;
        self
    }

    /// Allow consumers to cache reads
    pub fn cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    /// Options the attribute is connected with
    pub fn options(mut self, options: FeatureOptions) -> Self {
        self.options = options;
        self
    }

    /// Descriptor class, part of the identity
    pub fn class(mut self, class: &'static str) -> Self {
        self.class = class;
        self
    }

    /// Identity token; a random one is generated otherwise
    pub fn token(mut self, token: Uuid) -> Self {
        self.token = Some(token);
        self
    }

    /// Known entity type, skipping detection
    pub fn entity_type(mut self, ty: EntityType) -> Self {
        self.entity_type = Some(ty);
        self
    }

    /// Attach a connector-specific payload
    pub fn extension<T: Any + Send + Sync>(mut self, extension: T) -> Self {
        self.extension = Some(Arc::new(extension));
        self
    }

    /// Finish the descriptor
    pub fn build(self) -> AttributeDescriptor {
        let display_name = self
            .display_name
            .or_else(|| self.options.get(DISPLAY_NAME_OPTION).map(str::to_string))
            .unwrap_or_else(|| self.name.clone());
        let description = self
            .description
            .or_else(|| self.options.get(DESCRIPTION_OPTION).map(str::to_string))
            .unwrap_or_default();
        let entity_type = OnceCell::new();
        if let Some(ty) = self.entity_type {
            let _ = entity_type.set(ty);
        }

        AttributeDescriptor {
            id: String::new(),
            name: self.name,
            display_name,
            description,
            access: self.access,
            cacheable: self.cacheable,
            options: self.options,
            class: self.class,
            token: self.token.unwrap_or_else(Uuid::new_v4),
            entity_type,
            extension: self.extension,
        }
    }
}
