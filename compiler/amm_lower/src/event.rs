//! Events and the event table (spec.md §3, §4.4): `Event` records a
//! carried type and the handlers bound to it; `EventTable` is the ordered
//! "all events" list a `DriverContext` owns for the run.

use std::cell::RefCell;
use std::rc::Rc;

use amm_types::{Callable, Type};

use amm_ir::{Name, StringInterner, SynthNamer};

/// One declared or built-in event (spec.md §4.4 "Events"): a name, its
/// carried payload type, whether it is a built-in (`start`, `__conn`, ...),
/// and the handlers bound to it so far.
///
/// Handlers bind by argument-type compatibility at `populateModule` time
/// rather than by explicit registration syntax — a function becomes a
/// handler for an event when declared `on <event> fn(arg: T) { ... }` and
/// `T` is compatible with the event's carried type (spec.md §4.4
/// "Handlers").
#[derive(Clone)]
pub struct Event {
    pub name: Name,
    pub carried_type: Type,
    pub built_in: bool,
    pub handlers: Vec<Rc<dyn Callable>>,
}

impl Event {
    pub fn new(name: Name, carried_type: Type, built_in: bool) -> Self {
        Event { name, carried_type, built_in, handlers: Vec::new() }
    }

    pub fn add_handler(&mut self, handler: Rc<dyn Callable>) {
        self.handlers.push(handler);
    }
}

/// The ordered set of every event known to a compilation run — the
/// `allEvents` list spec.md §4.7 walks when serializing: "non-built-in
/// events with at least one user-bound handler" get an EVENT line.
///
/// Owned by `DriverContext`, one per run, rather than reached for through a
/// process-wide singleton (spec.md §9 "no global mutable state").
#[derive(Default)]
pub struct EventTable {
    events: RefCell<Vec<Event>>,
}

impl EventTable {
    pub fn new() -> Self {
        EventTable { events: RefCell::new(Vec::new()) }
    }

    /// Registers `event`. If its name is already present — a genuine
    /// collision, not a re-registration of the same declaration — the
    /// duplicate is kept under a UUID-derived suffixed name rather than
    /// merged into the existing entry (spec.md:304-306, SPEC_FULL.md "Driver"
    /// section): the first registration under a name always keeps the plain
    /// name, and every later collision mints `<name>_<suffix>` via `synth`.
    /// Returns the index the event actually ended up at.
    pub fn register(&self, event: Event, interner: &StringInterner, synth: &SynthNamer) -> usize {
        let mut events = self.events.borrow_mut();
        if events.iter().any(|e| e.name == event.name) {
            let suffixed = format!("{}_{}", interner.resolve(event.name), synth.next_suffix());
            let mut renamed = event;
            renamed.name = interner.intern(&suffixed);
            events.push(renamed);
            return events.len() - 1;
        }
        events.push(event);
        events.len() - 1
    }

    pub fn add_handler(&self, name: Name, handler: Rc<dyn Callable>) -> bool {
        let mut events = self.events.borrow_mut();
        match events.iter_mut().find(|e| e.name == name) {
            Some(event) => {
                event.add_handler(handler);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: Name) -> Option<Event> {
        self.events.borrow().iter().find(|e| e.name == name).cloned()
    }

    /// Events worth emitting an EVENT line for: non-built-in, with at least
    /// one bound handler (spec.md §4.7).
    pub fn user_visible(&self) -> Vec<Event> {
        self.events.borrow().iter().filter(|e| !e.built_in && !e.handlers.is_empty()).cloned().collect()
    }

    pub fn all(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amm_ir::StringInterner;
    use amm_types::BuiltinTypes;

    #[test]
    fn register_suffixes_a_duplicate_name_instead_of_merging() {
        let interner = StringInterner::new();
        let builtins = BuiltinTypes::new(&interner);
        let synth = SynthNamer::new();
        let table = EventTable::new();
        let name = interner.intern("tick");
        let first = table.register(Event::new(name, builtins.int64.clone(), false), &interner, &synth);
        let second = table.register(Event::new(name, builtins.int64.clone(), false), &interner, &synth);
        assert_ne!(first, second);
        assert_eq!(table.all().len(), 2);

        let all = table.all();
        assert_eq!(all[first].name, name);
        assert_ne!(all[second].name, name);
        assert!(interner.resolve(all[second].name).starts_with("tick_"));
    }

    #[test]
    fn user_visible_excludes_built_ins_and_handlerless_events() {
        let interner = StringInterner::new();
        let builtins = BuiltinTypes::new(&interner);
        let synth = SynthNamer::new();
        let table = EventTable::new();
        let start = interner.intern("start");
        let tick = interner.intern("tick");
        let quiet = interner.intern("quiet");
        table.register(Event::new(start, builtins.void.clone(), true), &interner, &synth);
        table.register(Event::new(tick, builtins.int64.clone(), false), &interner, &synth);
        table.register(Event::new(quiet, builtins.int64.clone(), false), &interner, &synth);

        struct Dummy(Name, Type);
        impl Callable for Dummy {
            fn name(&self) -> Name {
                self.0
            }
            fn arg_types(&self) -> &[Type] {
                &[]
            }
            fn return_type(&self) -> &Type {
                &self.1
            }
            fn is_pure(&self) -> bool {
                false
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }
        let handler_name = interner.intern("onTick");
        table.add_handler(tick, Rc::new(Dummy(handler_name, builtins.void.clone())));

        let visible: Vec<Name> = table.user_visible().iter().map(|e| e.name).collect();
        assert_eq!(visible, vec![tick]);
    }
}
