use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::MetadataError;
use crate::kind;
use crate::object::ObjectDefinition;
use crate::seed::SeedData;

type Content = Arc<dyn Any + Send + Sync>;

/// Storage envelope. Callers only ever see `content`.
#[derive(Clone)]
pub struct MetadataEntry {
    kind: String,
    id: String,
    package: Option<String>,
    content: Content,
}

impl MetadataEntry {
    #[must_use]
    pub fn new<T: Any + Send + Sync>(kind: impl Into<String>, id: impl Into<String>, content: T) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            package: None,
            content: Arc::new(content),
        }
    }

    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }
}

impl fmt::Debug for MetadataEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataEntry")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("package", &self.package)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, HashMap<String, MetadataEntry>>,
    /// package -> (kind, id) registered under it
    packages: HashMap<String, HashSet<(String, String)>>,
}

impl Inner {
    fn forget_membership(&mut self, entry: &MetadataEntry) {
        if let Some(pkg) = &entry.package
            && let Some(members) = self.packages.get_mut(pkg)
        {
            members.remove(&(entry.kind.clone(), entry.id.clone()));
            if members.is_empty() {
                self.packages.remove(pkg);
            }
        }
    }
}

/// Typed metadata store keyed by `(kind, id)`.
///
/// Every mutation happens under a single write lock, so readers never see a
/// half-applied registration or package removal. Registry operations never fail.
#[derive(Default)]
pub struct MetadataRegistry {
    inner: RwLock<Inner>,
}

impl MetadataRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry at `(entry.kind, entry.id)`.
    pub fn register(&self, entry: MetadataEntry) {
        tracing::debug!(
            kind = %entry.kind,
            id = %entry.id,
            package = ?entry.package,
            "registering metadata"
        );
        let mut inner = self.inner.write();
        let slot = inner.entries.entry(entry.kind.clone()).or_default();
        let previous = slot.insert(entry.id.clone(), entry.clone());
        if let Some(previous) = previous {
            inner.forget_membership(&previous);
        }
        if let Some(pkg) = &entry.package {
            inner
                .packages
                .entry(pkg.clone())
                .or_default()
                .insert((entry.kind.clone(), entry.id.clone()));
        }
    }

    /// Remove one entry. No-op when absent.
    pub fn unregister(&self, kind: &str, id: &str) {
        let mut inner = self.inner.write();
        let removed = inner.entries.get_mut(kind).and_then(|slot| slot.remove(id));
        if let Some(removed) = removed {
            inner.forget_membership(&removed);
        }
    }

    /// Remove every entry registered under `package`, across all kinds.
    ///
    /// Returns the number of entries removed.
    pub fn unregister_package(&self, package: &str) -> usize {
        let mut inner = self.inner.write();
        let Some(members) = inner.packages.remove(package) else {
            return 0;
        };
        let mut removed = 0;
        for (kind, id) in members {
            if let Some(slot) = inner.entries.get_mut(&kind)
                && slot.remove(&id).is_some()
            {
                removed += 1;
            }
        }
        tracing::info!(package, removed, "unregistered metadata package");
        removed
    }

    /// Content at `(kind, id)`, if present and of type `T`.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, kind: &str, id: &str) -> Option<Arc<T>> {
        let content = {
            let inner = self.inner.read();
            Arc::clone(&inner.entries.get(kind)?.get(id)?.content)
        };
        content.downcast::<T>().ok()
    }

    /// Every content of `kind` that is a `T`. Order is unspecified.
    #[must_use]
    pub fn list<T: Any + Send + Sync>(&self, kind: &str) -> Vec<Arc<T>> {
        let contents: Vec<Content> = {
            let inner = self.inner.read();
            inner
                .entries
                .get(kind)
                .map(|slot| slot.values().map(|e| Arc::clone(&e.content)).collect())
                .unwrap_or_default()
        };
        contents
            .into_iter()
            .filter_map(|c| c.downcast::<T>().ok())
            .collect()
    }

    /// Package an entry was registered under.
    #[must_use]
    pub fn package_of(&self, kind: &str, id: &str) -> Option<String> {
        let inner = self.inner.read();
        inner.entries.get(kind)?.get(id)?.package.clone()
    }

    /// Register an object definition after naming every field after its key.
    pub fn register_object(&self, object: ObjectDefinition, package: Option<&str>) {
        let object = object.normalized();
        let mut entry = MetadataEntry::new(kind::OBJECT, object.name.clone(), object);
        if let Some(pkg) = package {
            entry = entry.with_package(pkg);
        }
        self.register(entry);
    }

    #[must_use]
    pub fn object(&self, name: &str) -> Option<Arc<ObjectDefinition>> {
        self.get(kind::OBJECT, name)
    }

    #[must_use]
    pub fn objects(&self) -> Vec<Arc<ObjectDefinition>> {
        self.list(kind::OBJECT)
    }

    /// Separately registered seed records for `object`.
    #[must_use]
    pub fn seed_data(&self, object: &str) -> Option<Arc<SeedData>> {
        self.get(kind::DATA, object)
    }

    /// Resolve the object a reference field points at.
    ///
    /// Targets are checked here rather than at registration, since objects may
    /// be registered in any order.
    ///
    /// # Errors
    /// [`MetadataError::UnknownField`] if `object` has no such field,
    /// [`MetadataError::NotAReference`] if the field is not a lookup, and
    /// [`MetadataError::ReferenceNotFound`] if the target is not registered.
    pub fn resolve_reference(
        &self,
        object: &ObjectDefinition,
        field: &str,
    ) -> Result<Arc<ObjectDefinition>, MetadataError> {
        let def = object
            .get_field(field)
            .ok_or_else(|| MetadataError::UnknownField {
                object: object.name.clone(),
                field: field.to_owned(),
            })?;
        if !def.field_type.is_reference() {
            return Err(MetadataError::NotAReference {
                object: object.name.clone(),
                field: field.to_owned(),
            });
        }
        let target = def.reference_to.clone().unwrap_or_default();
        self.object(&target)
            .ok_or_else(|| MetadataError::ReferenceNotFound {
                object: object.name.clone(),
                field: field.to_owned(),
                target,
            })
    }
}

impl fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MetadataRegistry")
            .field(
                "kinds",
                &inner
                    .entries
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.len()))
                    .collect::<HashMap<_, _>>(),
            )
            .field("packages", &inner.packages.len())
            .finish()
    }
}
