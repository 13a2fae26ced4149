//! Shared fixtures for the composite store integration tests.

#![allow(dead_code, unused_macros)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata::backends::{MemoryEngine, RedbEngine};
use strata::{
    Collection, Item, Key, MemberVisitor, RootPolicy, Schema, Separator, Singleton,
    StoreResult, StorageEngine, Transaction, DEFAULT_TABLE,
};

/// Install a test subscriber once so `RUST_LOG` shows store traces.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn redb_engine() -> RedbEngine {
    init_tracing();
    RedbEngine::in_memory().expect("failed to create in-memory redb engine")
}

pub fn memory_engine() -> MemoryEngine {
    init_tracing();
    MemoryEngine::new()
}

/// Generate one `#[test]` per backend for each listed generic test function.
macro_rules! backend_tests {
    ($($name:ident),* $(,)?) => {
        mod redb_backend {
            $(
                #[test]
                fn $name() {
                    super::$name(&crate::common::redb_engine());
                }
            )*
        }

        mod memory_backend {
            $(
                #[test]
                fn $name() {
                    super::$name(&crate::common::memory_engine());
                }
            )*
        }
    };
}

// ============================================================================
// Person: u64 identity, root always kept, one singleton, one collection
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    pub id: u64,
    pub name: String,
    pub email: Option<String>,
    pub phones: Option<BTreeMap<String, Option<Phone>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phone {
    pub number: String,
    pub mobile: bool,
}

#[derive(Serialize, Deserialize)]
pub struct PersonRoot {
    pub name: String,
}

pub struct PersonSchema;
pub struct Email;
pub struct Phones;

impl Schema for PersonSchema {
    type Id = u64;
    type Value = Person;
    type Root = PersonRoot;

    const NAME: &'static str = "Person";
    const KEY_BASE_NAME: &'static str = "per";
    const ROOT_POLICY: RootPolicy = RootPolicy::AlwaysKeepRoot;

    fn create() -> Person {
        Person::default()
    }

    fn identifier(person: &Person) -> u64 {
        person.id
    }

    fn set_identifier(person: &mut Person, id: u64) {
        person.id = id;
    }

    fn root(person: &Person) -> PersonRoot {
        PersonRoot { name: person.name.clone() }
    }

    fn set_root(person: &mut Person, root: PersonRoot) {
        person.name = root.name;
    }

    fn members<V: MemberVisitor<Self>>(visitor: &mut V) -> StoreResult<()> {
        visitor.visit_singleton::<Email>()?;
        visitor.visit_collection::<Phones>()
    }
}

impl Singleton for Email {
    type Schema = PersonSchema;
    type Value = String;
    const TAG: &'static str = "email";

    fn get(person: &Person) -> Option<&String> {
        person.email.as_ref()
    }

    fn set(person: &mut Person, email: String) {
        person.email = Some(email);
    }
}

/// Items mapped to `None` are deleted on write.
impl Collection for Phones {
    type Schema = PersonSchema;
    type Item = Phone;
    type Container = BTreeMap<String, Option<Phone>>;
    const TAG: &'static str = "phones";

    fn create() -> Self::Container {
        BTreeMap::new()
    }

    fn get(person: &Person) -> Option<&Self::Container> {
        person.phones.as_ref()
    }

    fn get_mut(person: &mut Person) -> Option<&mut Self::Container> {
        person.phones.as_mut()
    }

    fn set(person: &mut Person, phones: Self::Container) {
        person.phones = Some(phones);
    }

    fn items(phones: &Self::Container) -> Vec<(String, Option<&Phone>)> {
        phones.iter().map(|(id, phone)| (id.clone(), phone.as_ref())).collect()
    }

    fn collect(phones: &mut Self::Container, item: Item<Phone>) {
        phones.insert(item.identifier, Some(item.value));
    }
}

pub fn phone(number: &str, mobile: bool) -> Phone {
    Phone { number: number.to_string(), mobile }
}

pub fn person(id: u64, name: &str) -> Person {
    Person { id, name: name.to_string(), ..Person::default() }
}

/// A person with an email and three phones `p1`, `p2`, `p3`.
pub fn full_person(id: u64) -> Person {
    Person {
        id,
        name: format!("person-{id}"),
        email: Some(format!("p{id}@example.com")),
        phones: Some(BTreeMap::from([
            ("p1".to_string(), Some(phone("555-0101", false))),
            ("p2".to_string(), Some(phone("555-0102", true))),
            ("p3".to_string(), Some(phone("555-0103", true))),
        ])),
    }
}

pub fn person_key(id: u64) -> Key {
    PersonSchema::identifier_key(&id)
}

// ============================================================================
// Label: string identity, root only written when no member is set
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Label {
    pub id: String,
    pub color: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct LabelRoot {}

pub struct LabelSchema;
pub struct Color;

impl Schema for LabelSchema {
    type Id = String;
    type Value = Label;
    type Root = LabelRoot;

    const NAME: &'static str = "Label";
    const KEY_BASE_NAME: &'static str = "lbl";

    fn create() -> Label {
        Label::default()
    }

    fn identifier(label: &Label) -> String {
        label.id.clone()
    }

    fn set_identifier(label: &mut Label, id: String) {
        label.id = id;
    }

    fn root(_: &Label) -> LabelRoot {
        LabelRoot {}
    }

    fn set_root(_: &mut Label, _: LabelRoot) {}

    fn members<V: MemberVisitor<Self>>(visitor: &mut V) -> StoreResult<()> {
        visitor.visit_singleton::<Color>()
    }
}

impl Singleton for Color {
    type Schema = LabelSchema;
    type Value = String;
    const TAG: &'static str = "color";

    fn get(label: &Label) -> Option<&String> {
        label.color.as_ref()
    }

    fn set(label: &mut Label, color: String) {
        label.color = Some(color);
    }
}

pub fn label(id: &str, color: Option<&str>) -> Label {
    Label { id: id.to_string(), color: color.map(str::to_string) }
}

// ============================================================================
// Raw row helpers
// ============================================================================

/// Overwrite a row with raw bytes, bypassing the value pipeline.
pub fn put_raw<E: StorageEngine>(engine: &E, key: &Key, bytes: &[u8]) {
    let raw = key.to_bytes(Separator::default()).expect("failed to encode key");
    let mut tx = engine.begin_write().expect("failed to begin write");
    tx.put(DEFAULT_TABLE, &raw, bytes).expect("failed to put raw row");
    tx.commit().expect("failed to commit");
}

/// Read a row's raw bytes, bypassing the value pipeline.
pub fn get_raw<E: StorageEngine>(engine: &E, key: &Key) -> Option<Vec<u8>> {
    let raw = key.to_bytes(Separator::default()).expect("failed to encode key");
    let tx = engine.begin_read().expect("failed to begin read");
    tx.get(DEFAULT_TABLE, &raw).expect("failed to get raw row")
}

/// Every key in the store table, decoded, in storage order.
pub fn all_keys<E: StorageEngine>(engine: &E) -> Vec<String> {
    use std::ops::Bound;
    use strata::Cursor;

    let tx = engine.begin_read().expect("failed to begin read");
    let mut cursor =
        tx.range(DEFAULT_TABLE, Bound::Unbounded, Bound::Unbounded).expect("failed to open range");
    let mut keys = Vec::new();
    while let Some((raw, _)) = cursor.next().expect("failed to advance cursor") {
        let key = Key::from_bytes(&raw, Separator::default()).expect("failed to parse key");
        keys.push(key.to_string());
    }
    keys
}

