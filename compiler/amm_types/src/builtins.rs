//! The built-in type table (spec.md §3): every type name available without
//! an explicit `type` declaration anywhere in a module.

use amm_ir::StringInterner;

use crate::ordered_map::OrderedMap;
use crate::type_kind::{new_builtin, new_generic_standin, new_nominal, Type};

/// Owns one `Type` handle per built-in, interned once per compilation
/// (spec.md §9 calls out avoiding a process-wide singleton — this struct
/// is constructed by the driver and threaded through explicitly rather
/// than reached for via a `static`).
pub struct BuiltinTypes {
    pub void: Type,
    pub int8: Type,
    pub int16: Type,
    pub int32: Type,
    pub int64: Type,
    pub float32: Type,
    pub float64: Type,
    pub bool_: Type,
    pub string: Type,
    pub error: Type,
    pub array: Type,
    pub map: Type,
    pub keyval: Type,
    pub function: Type,
    pub operator: Type,
    pub event: Type,
    pub type_: Type,
    pub scope: Type,
    pub microstatement: Type,
}

impl BuiltinTypes {
    pub fn new(interner: &StringInterner) -> Self {
        let v = interner.intern("V");
        let k = interner.intern("K");
        let e = interner.intern("E");

        let mut array_generics = OrderedMap::new();
        array_generics.insert(v, 0);
        let mut array_properties = OrderedMap::new();
        let elem = interner.intern("value");
        array_properties.insert(elem, new_generic_standin("V", 0));

        let mut map_generics = OrderedMap::new();
        map_generics.insert(k, 0);
        map_generics.insert(v, 1);
        let mut map_properties = OrderedMap::new();
        let key = interner.intern("key");
        let value = interner.intern("value");
        map_properties.insert(key, new_generic_standin("K", 0));
        map_properties.insert(value, new_generic_standin("V", 1));

        let mut keyval_generics = OrderedMap::new();
        keyval_generics.insert(k, 0);
        keyval_generics.insert(v, 1);
        let mut keyval_properties = OrderedMap::new();
        keyval_properties.insert(key, new_generic_standin("K", 0));
        keyval_properties.insert(value, new_generic_standin("V", 1));

        let mut event_generics = OrderedMap::new();
        event_generics.insert(e, 0);
        let mut event_properties = OrderedMap::new();
        let carried = interner.intern("carried");
        event_properties.insert(carried, new_generic_standin("E", 0));

        BuiltinTypes {
            void: new_builtin("void"),
            int8: new_builtin("int8"),
            int16: new_builtin("int16"),
            int32: new_builtin("int32"),
            int64: new_builtin("int64"),
            float32: new_builtin("float32"),
            float64: new_builtin("float64"),
            bool_: new_builtin("bool"),
            string: new_builtin("string"),
            error: new_builtin("Error"),
            array: new_nominal("Array", array_properties, array_generics),
            map: new_nominal("Map", map_properties, map_generics),
            keyval: new_nominal("KeyVal", keyval_properties, keyval_generics),
            function: new_builtin("function"),
            operator: new_builtin("operator"),
            event: new_nominal("Event", event_properties, event_generics),
            type_: new_builtin("type"),
            scope: new_builtin("scope"),
            microstatement: new_builtin("microstatement"),
        }
    }

    /// Look up a built-in by its surface name, for resolving an
    /// unqualified type reference before falling back to module scope.
    pub fn by_name(&self, name: &str) -> Option<Type> {
        Some(match name {
            "void" => self.void.clone(),
            "int8" => self.int8.clone(),
            "int16" => self.int16.clone(),
            "int32" => self.int32.clone(),
            "int64" => self.int64.clone(),
            "float32" => self.float32.clone(),
            "float64" => self.float64.clone(),
            "bool" => self.bool_.clone(),
            "string" => self.string.clone(),
            "Error" => self.error.clone(),
            "Array" => self.array.clone(),
            "Map" => self.map.clone(),
            "KeyVal" => self.keyval.clone(),
            "function" => self.function.clone(),
            "operator" => self.operator.clone(),
            "Event" => self.event.clone(),
            "type" => self.type_.clone(),
            "scope" => self.scope.clone(),
            "microstatement" => self.microstatement.clone(),
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_round_trips_through_by_name() {
        let interner = StringInterner::new();
        let b = BuiltinTypes::new(&interner);
        for name in [
            "void", "int8", "int16", "int32", "int64", "float32", "float64", "bool", "string", "Error", "Array",
            "Map", "KeyVal", "function", "operator", "Event", "type", "scope", "microstatement",
        ] {
            assert!(b.by_name(name).is_some(), "missing builtin: {name}");
        }
        assert!(b.by_name("NotARealType").is_none());
    }

    #[test]
    fn integer_and_float_widths_are_marked_built_in() {
        let interner = StringInterner::new();
        let b = BuiltinTypes::new(&interner);
        assert!(b.int64.built_in);
        assert!(b.float64.built_in);
        assert!(!b.array.built_in);
    }
}
