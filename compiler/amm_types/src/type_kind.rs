//! `Type` — nominal types, structural generics, unions, interfaces, and
//! solidification (spec.md §3, §4.1).

use std::rc::Rc;

use amm_diagnostic::{Diagnostic, ErrorCode};
use amm_ir::{Name, Span, StringInterner};

use crate::interface::Interface;
use crate::ordered_map::OrderedMap;
use crate::scope::{Scope, ScopeRef, Value};

/// `Type` is reference-counted: types are "shared freely by reference
/// (lifetime = process)" per spec.md §5. There is no separate arena —
/// a `Type`'s `properties` are themselves `Type` values, forming a shared
/// object graph rather than a flat index table.
pub type Type = Rc<TypeData>;

#[derive(Debug)]
pub struct TypeData {
    pub typename: String,
    pub built_in: bool,
    pub is_generic_standin: bool,
    /// Set only when `is_generic_standin`: this standin's position in its
    /// declaring type's generic parameter list, used to pick the right
    /// entry out of `solidify`'s positional `replacements` slice.
    pub generic_index: Option<usize>,
    pub properties: OrderedMap<Name, Type>,
    pub generics: OrderedMap<Name, usize>,
    pub original_type: Option<Type>,
    pub union_types: Option<Vec<Type>>,
    pub iface: Option<Interface>,
    pub alias: Option<Type>,
}

/// Free functions rather than inherent methods on the `Rc` alias, so
/// `amm_types::type_kind::new_nominal` &c. read the same way whether or
/// not the caller is holding a `Type` or building one fresh.
pub fn new_nominal(
    typename: impl Into<String>,
    properties: OrderedMap<Name, Type>,
    generics: OrderedMap<Name, usize>,
) -> Type {
    Rc::new(TypeData {
        typename: typename.into(),
        built_in: false,
        is_generic_standin: false,
        generic_index: None,
        properties,
        generics,
        original_type: None,
        union_types: None,
        iface: None,
        alias: None,
    })
}

pub fn new_builtin(typename: impl Into<String>) -> Type {
    Rc::new(TypeData {
        typename: typename.into(),
        built_in: true,
        is_generic_standin: false,
        generic_index: None,
        properties: OrderedMap::new(),
        generics: OrderedMap::new(),
        original_type: None,
        union_types: None,
        iface: None,
        alias: None,
    })
}

/// A generic standin at position `index` in its declaring type's
/// generic parameter list (e.g. `V` in `Array<V>` at index 0).
pub fn new_generic_standin(typename: impl Into<String>, index: usize) -> Type {
    Rc::new(TypeData {
        typename: typename.into(),
        built_in: false,
        is_generic_standin: true,
        generic_index: Some(index),
        properties: OrderedMap::new(),
        generics: OrderedMap::new(),
        original_type: None,
        union_types: None,
        iface: None,
        alias: None,
    })
}

pub fn new_union(typename: impl Into<String>, members: Vec<Type>) -> Type {
    Rc::new(TypeData {
        typename: typename.into(),
        built_in: false,
        is_generic_standin: false,
        generic_index: None,
        properties: OrderedMap::new(),
        generics: OrderedMap::new(),
        original_type: None,
        union_types: Some(members),
        iface: None,
        alias: None,
    })
}

pub fn new_alias(typename: impl Into<String>, target: Type) -> Type {
    Rc::new(TypeData {
        typename: typename.into(),
        built_in: false,
        is_generic_standin: false,
        generic_index: None,
        properties: OrderedMap::new(),
        generics: OrderedMap::new(),
        original_type: None,
        union_types: None,
        iface: None,
        alias: Some(target),
    })
}

pub fn new_interface_type(typename: impl Into<String>, iface: Interface) -> Type {
    Rc::new(TypeData {
        typename: typename.into(),
        built_in: false,
        is_generic_standin: false,
        generic_index: None,
        properties: OrderedMap::new(),
        generics: OrderedMap::new(),
        original_type: None,
        union_types: None,
        iface: Some(iface),
        alias: None,
    })
}

/// Extension methods on `Type` (i.e. on `Rc<TypeData>`), callable via
/// `Deref` the same as any inherent method on `TypeData`.
impl TypeData {
    pub fn property(&self, name: Name) -> Option<Type> {
        self.properties.get(&name).cloned()
    }

    pub fn original_type(&self) -> Option<Type> {
        self.original_type.clone()
    }

    pub fn interface(&self) -> Option<Interface> {
        self.iface.clone()
    }

    /// Resolve through an `alias` chain to the concrete underlying type,
    /// or `self` if this type is not an alias.
    pub fn resolve_alias(self: &Type) -> Type {
        let mut current = self.clone();
        while let Some(target) = current.alias.clone() {
            current = target;
        }
        current
    }

    /// Identity-first equality: the same `Rc` (covers built-ins and
    /// already-interned solidifications), falling back to nominal
    /// typename equality for types built identically without going
    /// through the intern table.
    pub fn same_type(self: &Type, other: &Type) -> bool {
        Rc::ptr_eq(self, other) || self.typename == other.typename
    }

    /// spec.md §4.1 `castable`: true iff both are integer widths, both are
    /// float widths, or the receiver is float and `other` is integer.
    pub fn castable(&self, other: &TypeData) -> bool {
        let self_int = is_int_width(&self.typename);
        let self_float = is_float_width(&self.typename);
        let other_int = is_int_width(&other.typename);
        let other_float = is_float_width(&other.typename);
        (self_int && other_int) || (self_float && other_float) || (self_float && other_int)
    }

    /// spec.md §4.1 `solidify`: produce (or return the interned) solidified
    /// instance of this generic type with `replacements` substituted for
    /// each generic standin, by positional index. The solidified name is
    /// interned through `interner` — the same `StringInterner` that produced
    /// every other `Name` in `scope`'s chain — so the binding `solidify`
    /// installs is reachable by the same lookups as any user-written name.
    pub fn solidify(self: &Type, replacements: &[Type], scope: &ScopeRef, interner: &StringInterner) -> Result<Type, Diagnostic> {
        if replacements.len() != self.generics.len() {
            return Err(Diagnostic::new(
                ErrorCode::E2004GenericArgNotType,
                format!(
                    "type `{}` takes {} generic argument(s), got {}",
                    self.typename,
                    self.generics.len(),
                    replacements.len()
                ),
                Span::DUMMY,
            ));
        }

        let key = (
            Rc::as_ptr(self) as usize,
            replacements.iter().map(|r| Rc::as_ptr(r) as usize).collect(),
        );
        if let Some(cached) = scope.borrow().solidify_cache_get(&key) {
            return Ok(cached);
        }

        let new_name = format!(
            "{}<{}>",
            self.typename,
            replacements.iter().map(|r| r.typename.clone()).collect::<Vec<_>>().join(", ")
        );

        let mut new_properties = OrderedMap::new();
        for (prop_name, prop_type) in self.properties.iter() {
            let substituted = substitute_generic(prop_type, replacements);
            new_properties.insert(*prop_name, substituted);
        }

        let solidified = Rc::new(TypeData {
            typename: new_name.clone(),
            built_in: self.built_in,
            is_generic_standin: false,
            properties: new_properties,
            generics: OrderedMap::new(),
            original_type: Some(self.clone()),
            union_types: self.union_types.clone(),
            iface: self.iface.clone(),
            alias: None,
        });

        scope.borrow().solidify_cache_insert(key, solidified.clone());
        let interned_name = interner.intern(&new_name);
        scope.borrow_mut().put(interned_name, Value::Type(solidified.clone()));

        Ok(solidified)
    }
}

/// If `prop_type` is a generic standin, substitute the replacement at its
/// `generic_index`; otherwise leave it untouched. Does not recurse into
/// nested generic containers — spec.md's examples only exercise one level
/// of substitution per solidify call, with container types (`Array<V>`)
/// themselves solidified by a further top-level `solidify` call.
fn substitute_generic(prop_type: &Type, replacements: &[Type]) -> Type {
    match prop_type.generic_index {
        Some(idx) if prop_type.is_generic_standin && idx < replacements.len() => replacements[idx].clone(),
        _ => prop_type.clone(),
    }
}

fn is_int_width(name: &str) -> bool {
    matches!(name, "int8" | "int16" | "int32" | "int64")
}

fn is_float_width(name: &str) -> bool {
    matches!(name, "float32" | "float64")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BuiltinTypes;
    use amm_ir::StringInterner;

    #[test]
    fn castable_covers_int_and_float_widths() {
        let interner = StringInterner::new();
        let b = BuiltinTypes::new(&interner);
        assert!(b.int32.castable(&b.int64));
        assert!(b.float32.castable(&b.float64));
        assert!(b.float64.castable(&b.int64));
        assert!(!b.int64.castable(&b.float64));
        assert!(!b.int64.castable(&b.string));
    }

    #[test]
    fn solidify_is_idempotent_and_interned() {
        let interner = StringInterner::new();
        let scope = Scope::new(None);
        let b = BuiltinTypes::new(&interner);

        let v = interner.intern("V");
        let mut generics = OrderedMap::new();
        generics.insert(v, 0);
        let mut properties = OrderedMap::new();
        let elem_name = interner.intern("elem");
        properties.insert(elem_name, new_generic_standin("V", 0));
        let array = new_nominal("Array", properties, generics);

        let first = array.solidify(&[b.int64.clone()], &scope, &interner).expect("solidify");
        let second = array.solidify(&[b.int64.clone()], &scope, &interner).expect("solidify");
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.typename, "Array<int64>");
        assert!(Rc::ptr_eq(&first.original_type().unwrap(), &array));
    }

    #[test]
    fn solidify_substitutes_generic_properties() {
        let interner = StringInterner::new();
        let scope = Scope::new(None);
        let b = BuiltinTypes::new(&interner);

        let v = interner.intern("V");
        let mut generics = OrderedMap::new();
        generics.insert(v, 0);
        let mut properties = OrderedMap::new();
        let elem_name = interner.intern("elem");
        properties.insert(elem_name, new_generic_standin("V", 0));
        let box_type = new_nominal("Box", properties, generics);

        let solidified = box_type.solidify(&[b.string.clone()], &scope, &interner).expect("solidify");
        let prop = solidified.property(elem_name).expect("elem property");
        assert!(Rc::ptr_eq(&prop, &b.string));
    }

    #[test]
    fn solidify_rejects_wrong_arity() {
        let interner = StringInterner::new();
        let scope = Scope::new(None);
        let b = BuiltinTypes::new(&interner);
        let array = new_nominal("Array", OrderedMap::new(), OrderedMap::new());
        let err = array.solidify(&[b.int64.clone()], &scope, &interner).unwrap_err();
        assert_eq!(err.code, ErrorCode::E2004GenericArgNotType);
    }
}
