//! `Scope` — a stack of name→value bindings with a parent pointer
//! (spec.md §3, §4.3).

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use amm_ir::{Microstatement, Name};

use crate::operator::Operator;
use crate::ordered_map::OrderedMap;
use crate::type_kind::Type;

/// Key for per-scope solidification interning: the original type's
/// identity plus the replacement list's identities (spec.md §9: "Key
/// solidified types on `(originalType-id, replacement-type-id-list)`").
pub type SolidifyKey = (usize, Vec<usize>);

/// Anything bindable under a name in a `UserFunction` overload set: a
/// function value. Defined as a trait rather than a concrete struct so
/// `amm_types` never needs to depend on the lowering crate that owns the
/// full `UserFunction` (statement list, closure scope, inlining logic) —
/// `amm_lower::UserFunction` implements this trait, and code that needs
/// the concrete type downcasts via `as_any`.
pub trait Callable: Any {
    fn name(&self) -> Name;
    fn arg_types(&self) -> &[Type];
    fn return_type(&self) -> &Type;
    fn is_pure(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
}

/// A value a `Scope` can bind a name to.
#[derive(Clone)]
pub enum Value {
    Type(Type),
    /// An overload set. Shared + interior-mutable so "Function bindings
    /// merge by concatenation when the destination already has an entry"
    /// (spec.md §4.4) can append in place.
    Function(Rc<RefCell<Vec<Rc<dyn Callable>>>>),
    /// An operator's precedence list, one entry per `(token, isPrefix)`
    /// pair colliding on the same token (spec.md §4.4 "push onto any
    /// existing Operator list under the same operator token").
    Operator(Rc<RefCell<Vec<Operator>>>),
    Scope(ScopeRef),
    /// A resolved constant binding (module-level `const`, or a captured
    /// closure-scope value) — the microstatement that produced it.
    Const(Box<Microstatement>),
    /// A structured namespace value, enabling `deepGet`'s dotted-path walk
    /// through "an object with the named field" (spec.md §4.3) for
    /// non-Scope, non-Type groupings such as opcode-table namespaces.
    /// Shared + interior-mutable so `deep_put_path` can update a field in
    /// place rather than silently mutating a disconnected clone.
    Instance(Rc<RefCell<OrderedMap<Name, Value>>>),
}

pub type ScopeRef = Rc<RefCell<Scope>>;

/// A stack of name→value bindings with a parent pointer.
pub struct Scope {
    vals: OrderedMap<Name, Value>,
    par: Option<ScopeRef>,
    solidify_cache: RefCell<FxHashMap<SolidifyKey, Type>>,
}

impl Scope {
    pub fn new(parent: Option<ScopeRef>) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            vals: OrderedMap::new(),
            par: parent,
            solidify_cache: RefCell::new(FxHashMap::default()),
        }))
    }

    /// Look up a previously-interned solidification, or `None` on first
    /// request for this `(original, replacements)` pair.
    pub(crate) fn solidify_cache_get(&self, key: &SolidifyKey) -> Option<Type> {
        self.solidify_cache.borrow().get(key).cloned()
    }

    pub(crate) fn solidify_cache_insert(&self, key: SolidifyKey, ty: Type) {
        self.solidify_cache.borrow_mut().insert(key, ty);
    }

    /// Insert in the receiver only.
    pub fn put(&mut self, name: Name, value: Value) {
        self.vals.insert(name, value);
    }

    /// Shallow lookup — never consults the parent.
    pub fn shallow_get(&self, name: Name) -> Option<Value> {
        self.vals.get(&name).cloned()
    }

    /// Every binding in the receiver only, in declaration order — the scan
    /// `populateModule`'s interface-import pulling needs over a source
    /// module's export scope (spec.md §4.4).
    pub fn shallow_iter(&self) -> impl Iterator<Item = (&Name, &Value)> {
        self.vals.iter().map(|(k, v)| (k, v))
    }

    /// Identical to `shallow_get` per spec.md §4.3 ("`get` returns a
    /// shallow lookup").
    pub fn get(&self, name: Name) -> Option<Value> {
        self.shallow_get(name)
    }

    /// Walk the parent chain.
    pub fn deep_get(&self, name: Name) -> Option<Value> {
        if let Some(v) = self.shallow_get(name) {
            return Some(v);
        }
        let mut cursor = self.par.clone();
        while let Some(scope) = cursor {
            let borrow = scope.borrow();
            if let Some(v) = borrow.shallow_get(name) {
                return Some(v);
            }
            cursor = borrow.par.clone();
        }
        None
    }

    /// Dotted-path form of `deep_get`: each segment after the first walks
    /// through a sub-scope (`Value::Scope`) or a structured instance
    /// (`Value::Instance`) yielded by the previous segment.
    pub fn deep_get_path(&self, path: &[Name]) -> Option<Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.deep_get(*first)?;
        for segment in rest {
            current = match current {
                Value::Scope(scope) => scope.borrow().shallow_get(*segment)?,
                Value::Instance(fields) => fields.borrow().get(segment)?.clone(),
                _ => return None,
            };
        }
        Some(current)
    }

    /// Updates the leaf-owning scope in place, for exports and type-instance
    /// field writes. Walks the same way `deep_get_path` does, but the final
    /// segment assigns rather than reads.
    pub fn deep_put_path(&mut self, path: &[Name], value: Value) -> bool {
        if path.len() == 1 {
            self.put(path[0], value);
            return true;
        }
        let Some((last, prefix)) = path.split_last() else { return false };
        let Some((first, middle)) = prefix.split_first() else { return false };
        let Some(mut current) = self.deep_get(*first) else { return false };
        for segment in middle {
            current = match current {
                Value::Scope(scope) => {
                    let Some(next) = scope.borrow().shallow_get(*segment) else { return false };
                    next
                }
                Value::Instance(ref fields) => {
                    let Some(next) = fields.borrow().get(segment).cloned() else { return false };
                    next
                }
                _ => return false,
            };
        }
        match current {
            Value::Scope(scope) => {
                scope.borrow_mut().put(*last, value);
                true
            }
            Value::Instance(fields) => {
                fields.borrow_mut().insert(*last, value);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amm_ir::StringInterner;

    fn name(interner: &StringInterner, s: &str) -> Name {
        interner.intern(s)
    }

    #[test]
    fn shallow_get_never_consults_parent() {
        let interner = StringInterner::new();
        let x = name(&interner, "x");
        let parent = Scope::new(None);
        parent.borrow_mut().put(x, Value::Instance(Rc::new(RefCell::new(OrderedMap::new()))));
        let child = Scope::new(Some(parent));
        assert!(child.borrow().shallow_get(x).is_none());
        assert!(child.borrow().deep_get(x).is_some());
    }

    #[test]
    fn dotted_path_walks_through_subscope() {
        let interner = StringInterner::new();
        let root = Scope::new(None);
        let sub = Scope::new(Some(root.clone()));
        let foo = name(&interner, "foo");
        let bar = name(&interner, "bar");
        sub.borrow_mut().put(bar, Value::Instance(Rc::new(RefCell::new(OrderedMap::new()))));
        root.borrow_mut().put(foo, Value::Scope(sub));

        let found = root.borrow().deep_get_path(&[foo, bar]);
        assert!(matches!(found, Some(Value::Instance(_))));
    }

    #[test]
    fn dotted_path_walks_through_instance_fields() {
        let interner = StringInterner::new();
        let root = Scope::new(None);
        let obj = name(&interner, "obj");
        let field = name(&interner, "field");
        let mut fields = OrderedMap::new();
        fields.insert(field, Value::Instance(Rc::new(RefCell::new(OrderedMap::new()))));
        root.borrow_mut().put(obj, Value::Instance(Rc::new(RefCell::new(fields))));

        let found = root.borrow().deep_get_path(&[obj, field]);
        assert!(matches!(found, Some(Value::Instance(_))));
    }

    #[test]
    fn deep_put_path_updates_leaf_scope() {
        let interner = StringInterner::new();
        let root = Scope::new(None);
        let sub = Scope::new(Some(root.clone()));
        let mod_name = name(&interner, "m");
        let export = name(&interner, "e");
        root.borrow_mut().put(mod_name, Value::Scope(sub.clone()));

        root.borrow_mut().deep_put_path(&[mod_name, export], Value::Instance(Rc::new(RefCell::new(OrderedMap::new()))));
        assert!(sub.borrow().shallow_get(export).is_some());
    }
}
