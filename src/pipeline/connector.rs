//! Connector patterns and declarations.
//!
//! A node type declares its plugs (inputs) and sockets (outputs) through
//! [`ConnectorDecl`] lists. The patterns inside are shared by every connector
//! instance materialized from them and decide whether a plug may be linked to
//! a socket.

use crate::registration::registration_match;
use std::fmt;
use std::sync::Arc;

/// Whether a connector consumes (plug) or provides (socket) data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ConnectorRole {
    Plug,
    Socket,
}

impl ConnectorRole {
    pub fn opposite(self) -> Self {
        match self {
            ConnectorRole::Plug => ConnectorRole::Socket,
            ConnectorRole::Socket => ConnectorRole::Plug,
        }
    }
}

impl fmt::Display for ConnectorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorRole::Plug => write!(f, "plug"),
            ConnectorRole::Socket => write!(f, "socket"),
        }
    }
}

/// Extra acceptance test run after the type paths agreed.
///
/// Receives the candidate socket pattern first, then the plug pattern.
pub trait RefineFn: Send + Sync {
    fn refine(&self, socket: &ConnectorPattern, plug: &ConnectorPattern) -> bool;
}

impl<F> RefineFn for F
where
    F: Fn(&ConnectorPattern, &ConnectorPattern) -> bool + Send + Sync,
{
    fn refine(&self, socket: &ConnectorPattern, plug: &ConnectorPattern) -> bool {
        self(socket, plug)
    }
}

/// Immutable connector capability: type path, role, nick and refinement.
#[derive(Clone)]
pub struct ConnectorPattern {
    type_path: String,
    role: ConnectorRole,
    nick: String,
    refine: Option<Arc<dyn RefineFn>>,
}

impl ConnectorPattern {
    pub fn plug(type_path: impl Into<String>) -> Self {
        Self::new(type_path, ConnectorRole::Plug)
    }

    pub fn socket(type_path: impl Into<String>) -> Self {
        Self::new(type_path, ConnectorRole::Socket)
    }

    pub fn new(type_path: impl Into<String>, role: ConnectorRole) -> Self {
        let type_path = type_path.into();
        let nick = crate::registration::registration_key(&type_path).to_string();
        Self {
            type_path,
            role,
            nick,
            refine: None,
        }
    }

    pub fn with_nick(mut self, nick: impl Into<String>) -> Self {
        self.nick = nick.into();
        self
    }

    pub fn with_refine(mut self, refine: impl RefineFn + 'static) -> Self {
        self.refine = Some(Arc::new(refine));
        self
    }

    pub fn role(&self) -> ConnectorRole {
        self.role
    }

    pub fn type_path(&self) -> &str {
        &self.type_path
    }

    /// Short name used in debug output and for selecting connectors.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Whether `self` may be linked to `other`.
    ///
    /// Exactly one side must be a plug. The plug's type path is used as the
    /// pattern against the socket's, and the socket's refinement predicate
    /// gets the final word.
    pub fn matches(&self, other: &ConnectorPattern) -> bool {
        if self.role == other.role {
            return false;
        }
        let (socket, plug) = match self.role {
            ConnectorRole::Socket => (self, other),
            ConnectorRole::Plug => (other, self),
        };
        if registration_match(&socket.type_path, &plug.type_path) == 0 {
            return false;
        }
        match &socket.refine {
            Some(refine) => refine.refine(socket, plug),
            None => true,
        }
    }

    /// Whether this pattern answers to a connector selector.
    ///
    /// A selector is compared against the nick first, then used as a type
    /// path pattern.
    pub fn selected_by(&self, selector: &str) -> bool {
        self.nick == selector || registration_match(&self.type_path, selector) > 0
    }
}

impl fmt::Debug for ConnectorPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorPattern")
            .field("type_path", &self.type_path)
            .field("role", &self.role)
            .field("nick", &self.nick)
            .field("refine", &self.refine.is_some())
            .finish()
    }
}

/// One entry of a node type's plug or socket list.
///
/// Only the last entry of a list may be [`ConnectorDecl::RepeatLast`].
#[derive(Debug, Clone)]
pub enum ConnectorDecl {
    /// Exactly one slot.
    Fixed(Arc<ConnectorPattern>),
    /// One or more slots sharing a pattern; `max` of `None` means unbounded.
    RepeatLast {
        pattern: Arc<ConnectorPattern>,
        max: Option<usize>,
    },
}

impl ConnectorDecl {
    pub fn fixed(pattern: ConnectorPattern) -> Self {
        ConnectorDecl::Fixed(Arc::new(pattern))
    }

    pub fn repeat(pattern: ConnectorPattern) -> Self {
        ConnectorDecl::RepeatLast {
            pattern: Arc::new(pattern),
            max: None,
        }
    }

    pub fn repeat_up_to(pattern: ConnectorPattern, max: usize) -> Self {
        ConnectorDecl::RepeatLast {
            pattern: Arc::new(pattern),
            max: Some(max.max(1)),
        }
    }

    pub fn pattern(&self) -> &Arc<ConnectorPattern> {
        match self {
            ConnectorDecl::Fixed(p) => p,
            ConnectorDecl::RepeatLast { pattern, .. } => pattern,
        }
    }

    pub fn is_repeatable(&self) -> bool {
        matches!(self, ConnectorDecl::RepeatLast { .. })
    }

    /// Number of slots this entry provides, `None` when unbounded.
    pub fn slot_count(&self) -> Option<usize> {
        match self {
            ConnectorDecl::Fixed(_) => Some(1),
            ConnectorDecl::RepeatLast { max, .. } => *max,
        }
    }
}

/// Slot layout derived from a declaration list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    /// Slots before the repeat group.
    pub fixed: usize,
    /// Size of the repeat group, `None` when unbounded; `Some(0)` when there is none.
    pub repeat: Option<usize>,
}

impl Arity {
    pub fn of(decls: &[ConnectorDecl]) -> Self {
        match decls.last() {
            Some(ConnectorDecl::RepeatLast { max, .. }) => Arity {
                fixed: decls.len() - 1,
                repeat: *max,
            },
            _ => Arity {
                fixed: decls.len(),
                repeat: Some(0),
            },
        }
    }

    /// Total slots, `None` when unbounded.
    pub fn total(&self) -> Option<usize> {
        self.repeat.map(|r| self.fixed.saturating_add(r))
    }

    pub fn is_bounded(&self) -> bool {
        self.repeat.is_some()
    }

    pub fn contains(&self, position: usize) -> bool {
        match self.total() {
            Some(total) => position < total,
            None => true,
        }
    }
}

/// Declaration that governs slot `position`.
pub fn decl_for_position(decls: &[ConnectorDecl], position: usize) -> Option<&ConnectorDecl> {
    let arity = Arity::of(decls);
    if !arity.contains(position) {
        return None;
    }
    if position < arity.fixed {
        decls.get(position)
    } else {
        decls.last()
    }
}

/// Check that repeat groups only appear last.
pub fn validate_decls(decls: &[ConnectorDecl]) -> Result<(), String> {
    let len = decls.len();
    for (i, decl) in decls.iter().enumerate() {
        if decl.is_repeatable() && i + 1 != len {
            return Err(format!(
                "repeatable connector '{}' must be declared last",
                decl.pattern().type_path()
            ));
        }
    }
    Ok(())
}
