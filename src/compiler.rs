//! Property map compiler and the registry that owns compiled maps.
//!
//! `compile(class)` flattens a class's parent chain, its imports and its own
//! declarations into one [`SchemaMap`]:
//!
//! - start from a copy of the parent's compiled fields,
//! - merge each import in declared order; a name already present is kept
//!   (first writer wins across the accumulated set),
//! - own declarations then replace anything inherited or imported.
//!
//! Each class gets a publish-once slot. Its result (map *or* error) is computed
//! by exactly one thread and then served to everyone; failures are permanent
//! until [`PropertyMapRegistry::clear_cache`].
//!
//! Cycles are found by walking declarations *before* any dependency slot is
//! entered, so a thread never waits on a slot further up its own chain.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::decl::{ClassDecl, ClassId};
use crate::error::{FieldProblem, MalformedTypeError, MapperError, Result};
use crate::schema::{FieldDefinition, SchemaMap};
use crate::types::TypeDescriptor;

type Compiled = Result<Arc<SchemaMap>>;

#[derive(Default)]
pub struct PropertyMapRegistry {
    declarations: RwLock<HashMap<ClassId, Arc<ClassDecl>>>,
    compiled: RwLock<HashMap<ClassId, Arc<OnceCell<Compiled>>>>,
    compile_passes: AtomicUsize,
}

impl std::fmt::Debug for PropertyMapRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyMapRegistry")
            .field("declared", &self.declarations.read().len())
            .field("compiled", &self.compiled.read().len())
            .field("compile_passes", &self.compile_count())
            .finish()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DECLARATIONS
// ————————————————————————————————————————————————————————————————————————————

impl PropertyMapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn register(&self, decl: ClassDecl) -> Result<ClassId> {
        let id = ClassId::new(&decl.name)?;
        let mut declarations = self.declarations.write();
        if declarations.contains_key(&id) {
            return Err(MapperError::DuplicateClass(id));
        }
        trace!(class = %id, "registered declaration");
        declarations.insert(id.clone(), Arc::new(decl));
        Ok(id)
    }

    pub fn register_all<I>(&self, decls: I) -> Result<Vec<ClassId>>
    where
        I: IntoIterator<Item = ClassDecl>,
    {
        decls.into_iter().map(|decl| self.register(decl)).collect()
    }

    pub fn declaration(&self, id: &ClassId) -> Option<Arc<ClassDecl>> {
        self.declarations.read().get(id).cloned()
    }

    pub fn is_registered(&self, id: &ClassId) -> bool {
        self.declarations.read().contains_key(id)
    }

    /// Registered classes, sorted.
    pub fn class_ids(&self) -> Vec<ClassId> {
        let mut ids: Vec<_> = self.declarations.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Resolve a class reference written inside `from`'s declaration:
    /// namespace-relative first, then global. Absolute references (`::a::B`) skip the first step.
    pub fn resolve_reference(&self, from: &ClassId, reference: &str) -> Option<ClassId> {
        let declarations = self.declarations.read();
        from.candidates_for(reference)
            .into_iter()
            .filter_map(|candidate| ClassId::new(&candidate).ok())
            .find(|candidate| declarations.contains_key(candidate))
    }

    /// Parse one field's type string in the scope of `class`.
    pub fn parse_type(&self, class: &ClassId, field: &str, type_string: &str) -> Result<TypeDescriptor> {
        Ok(self.parse_field_type(class, field, type_string)?)
    }

    fn parse_field_type(
        &self,
        class: &ClassId,
        field: &str,
        type_string: &str,
    ) -> std::result::Result<TypeDescriptor, MalformedTypeError> {
        TypeDescriptor::parse(type_string, |token| self.resolve_reference(class, token)).map_err(|reason| {
            MalformedTypeError {
                class: class.clone(),
                field: field.to_string(),
                type_string: type_string.to_string(),
                reason,
            }
        })
    }

    /// True when `child` is `ancestor` or extends it through its parent chain.
    pub fn is_subclass_of(&self, child: &ClassId, ancestor: &ClassId) -> bool {
        let mut seen = HashSet::new();
        let mut current = child.clone();
        loop {
            if &current == ancestor {
                return true;
            }
            if !seen.insert(current.clone()) {
                return false;
            }
            let parent = self
                .declaration(&current)
                .and_then(|decl| decl.extends.clone())
                .and_then(|parent| self.resolve_reference(&current, &parent));
            match parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// COMPILATION
// ————————————————————————————————————————————————————————————————————————————

impl PropertyMapRegistry {
    /// Compiled map for `id`, computing it on first use.
    pub fn compile(&self, id: &ClassId) -> Result<Arc<SchemaMap>> {
        if !self.is_registered(id) {
            return Err(MapperError::NotRegistered(id.to_string()));
        }
        let slot = self.slot(id);
        slot.get_or_init(|| self.build(id)).clone()
    }

    pub fn compile_named(&self, path: &str) -> Result<Arc<SchemaMap>> {
        self.compile(&ClassId::new(path)?)
    }

    /// Number of compilation passes run so far (cache hits don't count).
    pub fn compile_count(&self) -> usize {
        self.compile_passes.load(Ordering::Acquire)
    }

    pub fn is_compiled(&self, id: &ClassId) -> bool {
        matches!(self.compiled.read().get(id).and_then(|slot| slot.get()), Some(Ok(_)))
    }

    /// Forget every compiled map and cached failure. Live instances keep theirs.
    pub fn clear_cache(&self) {
        self.compiled.write().clear();
    }

    fn slot(&self, id: &ClassId) -> Arc<OnceCell<Compiled>> {
        if let Some(slot) = self.compiled.read().get(id) {
            return Arc::clone(slot);
        }
        Arc::clone(self.compiled.write().entry(id.clone()).or_default())
    }

    fn build(&self, id: &ClassId) -> Compiled {
        self.compile_passes.fetch_add(1, Ordering::AcqRel);
        let result = self.assemble(id);
        match &result {
            Ok(map) => debug!(class = %id, fields = map.len(), "compiled property map"),
            Err(error) => warn!(class = %id, %error, "property map compilation failed"),
        }
        result
    }

    fn assemble(&self, id: &ClassId) -> Compiled {
        let decl = self
            .declaration(id)
            .ok_or_else(|| MapperError::NotRegistered(id.to_string()))?;
        self.detect_cycle(id)?;

        // 1) parent chain
        let mut fields: IndexMap<String, FieldDefinition> = match &decl.extends {
            Some(parent) => {
                let parent = self.resolve_dependency(id, parent)?;
                self.compile_dependency(id, &parent)?.field_map().clone()
            }
            None => IndexMap::new(),
        };

        // 2) imports, first writer wins
        for import in &decl.imports {
            let import = self.resolve_dependency(id, import)?;
            let imported = self.compile_dependency(id, &import)?;
            for (name, def) in imported.field_map() {
                if !fields.contains_key(name) {
                    fields.insert(name.clone(), def.clone());
                }
            }
        }

        // 3) own declarations always win
        let mut problems = Vec::new();
        for (name, type_string) in &decl.properties {
            if name.is_empty() {
                problems.push(FieldProblem::EmptyName);
                continue;
            }
            match self.parse_field_type(id, name, type_string) {
                Ok(ty) => {
                    fields.insert(name.clone(), FieldDefinition::new(name.clone(), ty, id.clone()));
                }
                Err(malformed) => problems.push(malformed.into()),
            }
        }

        // 4) required list may name own, inherited or imported fields
        for name in &decl.required {
            match fields.get_mut(name) {
                Some(def) => def.required = true,
                None if decl.properties.contains_key(name) => {} // already reported as malformed
                None => problems.push(FieldProblem::UndeclaredRequired { field: name.clone() }),
            }
        }

        if !problems.is_empty() {
            return Err(MapperError::BadPropertyMap { class: id.clone(), problems });
        }
        Ok(Arc::new(SchemaMap::new(id.clone(), fields)))
    }

    fn resolve_dependency(&self, from: &ClassId, reference: &str) -> Result<ClassId> {
        self.resolve_reference(from, reference).ok_or_else(|| MapperError::UnknownClass {
            reference: reference.to_string(),
            referenced_by: from.clone(),
        })
    }

    /// A dependency's failure becomes the dependent's failure, naming both.
    fn compile_dependency(&self, from: &ClassId, dependency: &ClassId) -> Result<Arc<SchemaMap>> {
        self.compile(dependency).map_err(|cause| MapperError::DependencyFailed {
            class: from.clone(),
            dependency: dependency.clone(),
            cause: Box::new(cause),
        })
    }

    /// Depth-first walk over parent/import edges. The in-progress chain is local
    /// to this call, so unrelated concurrent compilations never see it.
    fn detect_cycle(&self, root: &ClassId) -> Result<()> {
        let mut chain = vec![root.clone()];
        let mut finished = HashSet::new();
        self.walk_dependencies(root, &mut chain, &mut finished)
    }

    fn walk_dependencies(
        &self,
        class: &ClassId,
        chain: &mut Vec<ClassId>,
        finished: &mut HashSet<ClassId>,
    ) -> Result<()> {
        // unknown classes are reported by `assemble`
        let Some(decl) = self.declaration(class) else {
            return Ok(());
        };
        for reference in decl.dependencies() {
            let Some(dep) = self.resolve_reference(class, reference) else {
                continue;
            };
            if chain.contains(&dep) {
                let mut cycle = chain.clone();
                cycle.push(dep.clone());
                return Err(MapperError::CircularPropertyMap {
                    class_a: class.clone(),
                    class_b: dep,
                    chain: cycle,
                });
            }
            if finished.contains(&dep) || self.is_compiled(&dep) {
                continue;
            }
            chain.push(dep.clone());
            self.walk_dependencies(&dep, chain, finished)?;
            chain.pop();
            finished.insert(dep);
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
