//! External services consulted during graph construction.
//!
//! The graph core stays target-agnostic by reaching generators through
//! two narrow traits: [`Generator`] resolves implementations and owns the
//! target's [`Syntax`], which legalizes identifiers for emission.

use crate::context::ContextId;
use crate::node::Node;
use shellac_doc::NodeDef;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Opaque handle to a node implementation owned by the generator's
/// registry.
pub type ImplHandle = Arc<dyn NodeImplementation>;

/// A node-implementation entry resolved per (target, language).
pub trait NodeImplementation: Send + Sync {
    /// Identifier of the implementation, for diagnostics.
    fn name(&self) -> &str;
}

/// Target-language services the graph core consults while building.
pub trait Generator {
    /// Target identifier implementations are registered under.
    fn target(&self) -> &str;

    /// Shading language the generator emits.
    fn language(&self) -> &str;

    /// Resolves the implementation for a nodedef, or `None` when the
    /// (target, language) pair has none.
    fn implementation(&self, def: &NodeDef) -> Option<ImplHandle>;

    /// Generation contexts the node participates in.
    fn context_ids(&self, node: &Node) -> Vec<ContextId> {
        let _ = node;
        vec![ContextId::DEFAULT]
    }

    /// Identifier syntax of the target language.
    fn syntax(&self) -> &dyn Syntax;
}

/// Highest numeric suffix handed out per base identifier.
pub type UniqueNameMap = HashMap<String, usize>;

/// Identifier legality and uniqueness for a target language.
pub trait Syntax {
    /// Rewrites `name` in place into a legal identifier unique within
    /// `unique`, recording the result.
    fn make_unique(&self, name: &mut String, unique: &mut UniqueNameMap);
}

/// Basic `[A-Za-z_][A-Za-z0-9_]*` identifier syntax with numeric
/// de-duplication suffixes.
#[derive(Debug, Default)]
pub struct IdentifierSyntax {
    reserved: HashSet<String>,
}

impl IdentifierSyntax {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds reserved words identifiers must not collide with.
    pub fn with_reserved<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reserved: words.into_iter().map(Into::into).collect(),
        }
    }

    fn legalize(&self, name: &str) -> String {
        let mut legal: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if legal.is_empty() || legal.starts_with(|c: char| c.is_ascii_digit()) {
            legal.insert(0, '_');
        }
        if self.reserved.contains(&legal) {
            legal.push('_');
        }
        legal
    }
}

impl Syntax for IdentifierSyntax {
    fn make_unique(&self, name: &mut String, unique: &mut UniqueNameMap) {
        let base = self.legalize(name);
        let mut counter = unique.get(&base).copied().unwrap_or(0);
        let mut candidate = base.clone();
        while unique.contains_key(&candidate) {
            counter += 1;
            candidate = format!("{base}{counter}");
        }
        unique.insert(base, counter);
        if counter > 0 {
            unique.insert(candidate.clone(), 0);
        }
        *name = candidate;
    }
}
