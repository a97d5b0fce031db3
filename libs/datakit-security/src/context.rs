/// `SecurityContext` carries who is calling and which engine guarantees the call may skip.
///
/// Built by the front door (HTTP/RPC layer, bootstrap code) once per logical
/// operation and handed to the engine when creating an execution context.
/// Values are immutable; derived contexts are produced with [`SecurityContext::elevated`]
/// and the `with_*` helpers, never by mutating an existing one.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SecurityContext {
    /// Authenticated user, if any. Used for bookkeeping fields and row-level restrictions.
    user_id: Option<String>,
    /// Space (tenant) the call is scoped to.
    space_id: Option<String>,
    /// Roles asserted for the user.
    #[serde(default)]
    roles: Vec<String>,
    /// System calls bypass restrictions injected by listeners.
    #[serde(default)]
    is_system: bool,
    /// Skip every listener for calls made with this context.
    #[serde(default)]
    ignore_triggers: bool,
}

impl SecurityContext {
    /// Create a new `SecurityContext` builder
    #[must_use]
    pub fn builder() -> SecurityContextBuilder {
        SecurityContextBuilder::default()
    }

    /// Context with no user, no space and no bypass flags.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Context used by bootstrap code: no user, `is_system` set.
    #[must_use]
    pub fn system() -> Self {
        SecurityContextBuilder::default().system(true).build()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    #[must_use]
    pub fn space_id(&self) -> Option<&str> {
        self.space_id.as_deref()
    }

    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        self.is_system
    }

    #[must_use]
    pub fn ignore_triggers(&self) -> bool {
        self.ignore_triggers
    }

    /// Copy of this context with `is_system` set. Everything else is preserved.
    #[must_use]
    pub fn elevated(&self) -> Self {
        Self {
            is_system: true,
            ..self.clone()
        }
    }

    /// Copy of this context with `ignore_triggers` replaced.
    #[must_use]
    pub fn with_ignore_triggers(&self, ignore_triggers: bool) -> Self {
        Self {
            ignore_triggers,
            ..self.clone()
        }
    }
}

#[derive(Default)]
pub struct SecurityContextBuilder {
    user_id: Option<String>,
    space_id: Option<String>,
    roles: Vec<String>,
    is_system: bool,
    ignore_triggers: bool,
}

impl SecurityContextBuilder {
    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn space_id(mut self, space_id: impl Into<String>) -> Self {
        self.space_id = Some(space_id.into());
        self
    }

    #[must_use]
    pub fn roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    #[must_use]
    pub fn system(mut self, is_system: bool) -> Self {
        self.is_system = is_system;
        self
    }

    #[must_use]
    pub fn ignore_triggers(mut self, ignore_triggers: bool) -> Self {
        self.ignore_triggers = ignore_triggers;
        self
    }

    #[must_use]
    pub fn build(self) -> SecurityContext {
        SecurityContext {
            user_id: self.user_id,
            space_id: self.space_id,
            roles: self.roles,
            is_system: self.is_system,
            ignore_triggers: self.ignore_triggers,
        }
    }
}
