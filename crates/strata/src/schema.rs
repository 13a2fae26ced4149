//! Schema descriptors.
//!
//! A [`Schema`] describes how one composite type maps onto rows: where its
//! identity lives, what its root row holds, and which [`Singleton`] and
//! [`Collection`] members it has. Schemas and members are implemented on
//! marker types, so every lookup is resolved at compile time.
//!
//! Members are declared by [`Schema::members`], which hands each member type
//! to a [`MemberVisitor`]. Entry derivation, tag lookup and row injection are
//! all visitors over that declaration.
//!
//! # Example
//!
//! ```ignore
//! struct PersonSchema;
//! struct Email;
//!
//! impl Singleton for Email {
//!     type Schema = PersonSchema;
//!     type Value = String;
//!     const TAG: &'static str = "email";
//!
//!     fn get(person: &Person) -> Option<&String> { person.email.as_ref() }
//!     fn set(person: &mut Person, email: String) { person.email = Some(email) }
//! }
//!
//! impl Schema for PersonSchema {
//!     type Id = u64;
//!     type Value = Person;
//!     type Root = PersonRoot;
//!     const NAME: &'static str = "Person";
//!     const KEY_BASE_NAME: &'static str = "per";
//!     // create, identifier, set_identifier, root, set_root ...
//!
//!     fn members<V: MemberVisitor<Self>>(visitor: &mut V) -> StoreResult<()> {
//!         visitor.visit_singleton::<Email>()
//!     }
//! }
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use strata_core::{Codec, Filtering, Identifier, Key, KeyError, Marshaling, Tag};

use crate::error::StoreResult;
use crate::types::{Entry, Item, MemberKind};

/// The composite value type of a schema.
pub type ValueOf<S> = <S as Schema>::Value;

/// Whether the root row is written when members are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootPolicy {
    /// Always write the root row.
    AlwaysKeepRoot,
    /// Write the root row only when no member row is present. Schemas whose
    /// root carries data beyond the identity should keep the root.
    #[default]
    KeepRootIfNoMembers,
}

/// Describes how a composite type maps onto key-value rows.
pub trait Schema: Sized + 'static {
    /// The identity type.
    type Id: Identifier;
    /// The composite value type.
    type Value;
    /// The part of the value stored in the root row.
    type Root: Serialize + DeserializeOwned;

    /// Human readable name, used in diagnostics.
    const NAME: &'static str;
    /// Base name of every key of this schema.
    const KEY_BASE_NAME: &'static str;
    /// Root row policy.
    const ROOT_POLICY: RootPolicy = RootPolicy::KeepRootIfNoMembers;

    /// Create an empty value.
    fn create() -> Self::Value;

    /// Extract the identity of a value.
    fn identifier(value: &Self::Value) -> Self::Id;

    /// Set the identity of a value.
    fn set_identifier(value: &mut Self::Value, id: Self::Id);

    /// Extract the root row contents of a value.
    fn root(value: &Self::Value) -> Self::Root;

    /// Apply decoded root row contents to a value.
    fn set_root(value: &mut Self::Value, root: Self::Root);

    /// Declare the members of this schema to `visitor`.
    ///
    /// # Errors
    ///
    /// Returns the first error returned by the visitor.
    fn members<V: MemberVisitor<Self>>(visitor: &mut V) -> StoreResult<()> {
        let _ = visitor;
        Ok(())
    }

    /// The key of the root row of `id`. Every other row of the composite
    /// extends this key.
    fn identifier_key(id: &Self::Id) -> Key {
        Key::from_parts(Self::KEY_BASE_NAME, id.to_key_segments())
    }

    /// The identity a key belongs to. Exact inverse of
    /// [`Schema::identifier_key`]; the tag of `key` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidIdentifier`] if the key has another base
    /// name or the wrong number of identity segments.
    fn key_identifier(key: &Key) -> Result<Self::Id, KeyError> {
        if key.base() != Self::KEY_BASE_NAME {
            return Err(KeyError::InvalidIdentifier(format!(
                "key {key} does not belong to {} (base name {:?})",
                Self::NAME,
                Self::KEY_BASE_NAME
            )));
        }
        if key.identifiers().len() != Self::Id::ARITY {
            return Err(KeyError::InvalidIdentifier(format!(
                "key {key} has {} identity segment(s), {} expects {}",
                key.identifiers().len(),
                Self::NAME,
                Self::Id::ARITY
            )));
        }
        Self::Id::from_key_segments(key.identifiers())
    }

    /// The witness key of the composite `key` belongs to.
    fn witness_key(key: &Key) -> Key {
        key.witness()
    }

    /// Whether `key` is a witness key of this schema.
    fn is_witness_key(key: &Key) -> bool {
        key.is_witness()
            && key.base() == Self::KEY_BASE_NAME
            && key.identifiers().len() == Self::Id::ARITY
    }
}

/// A named optional scalar member of a composite.
///
/// Stored under the identity key tagged with [`Singleton::TAG`]. An unset
/// member has no row.
pub trait Singleton: 'static {
    /// The schema this member belongs to.
    type Schema: Schema;
    /// The member value type.
    type Value: Serialize + DeserializeOwned;

    /// The member tag. Must be non-empty and unique within the schema.
    const TAG: &'static str;

    /// The member value, if set.
    fn get(composite: &ValueOf<Self::Schema>) -> Option<&Self::Value>;

    /// Set the member value.
    fn set(composite: &mut ValueOf<Self::Schema>, value: Self::Value);
}

/// A named repeated member of a composite.
///
/// Each item is stored under the identity key tagged with
/// [`Collection::TAG`] and the item identifier, and items are read back in
/// identifier byte order.
pub trait Collection: 'static {
    /// The schema this member belongs to.
    type Schema: Schema;
    /// The item value type.
    type Item: Serialize + DeserializeOwned;
    /// The in-memory container holding the items.
    type Container;

    /// The member tag. Must be non-empty and unique within the schema.
    const TAG: &'static str;

    /// Create an empty container.
    fn create() -> Self::Container;

    /// The container, if the composite has one.
    fn get(composite: &ValueOf<Self::Schema>) -> Option<&Self::Container>;

    /// The container for in-place updates, if the composite has one.
    fn get_mut(composite: &mut ValueOf<Self::Schema>) -> Option<&mut Self::Container>;

    /// Replace the container.
    fn set(composite: &mut ValueOf<Self::Schema>, container: Self::Container);

    /// The items of a container. An item without a value is deleted on write.
    fn items(container: &Self::Container) -> Vec<(String, Option<&Self::Item>)>;

    /// Add a decoded item to a container.
    fn collect(container: &mut Self::Container, item: Item<Self::Item>);
}

/// Receives the member declarations of a schema.
pub trait MemberVisitor<S: Schema> {
    /// Visit a singleton member.
    ///
    /// # Errors
    ///
    /// Visitor specific.
    fn visit_singleton<M: Singleton<Schema = S>>(&mut self) -> StoreResult<()>;

    /// Visit a collection member.
    ///
    /// # Errors
    ///
    /// Visitor specific.
    fn visit_collection<M: Collection<Schema = S>>(&mut self) -> StoreResult<()>;
}

/// The key of a singleton row.
///
/// # Errors
///
/// Returns [`KeyError::ReservedTag`] if the member tag is empty.
pub fn singleton_key<M: Singleton>(identity: &Key) -> Result<Key, KeyError> {
    Ok(identity.base_key().with_tag(Tag::member(M::TAG, None)?))
}

/// The key prefix of every item row of a collection.
///
/// # Errors
///
/// Returns [`KeyError::ReservedTag`] if the member tag is empty.
pub fn collection_key<M: Collection>(identity: &Key) -> Result<Key, KeyError> {
    Ok(identity.base_key().with_tag(Tag::member(M::TAG, None)?))
}

/// The key of one collection item row.
///
/// # Errors
///
/// Returns [`KeyError::ReservedTag`] if the member tag is empty.
pub fn collection_item_key<M: Collection>(identity: &Key, item: &str) -> Result<Key, KeyError> {
    Ok(identity.base_key().with_tag(Tag::member(M::TAG, Some(item.to_string()))?))
}

/// The root row entry of a value.
///
/// # Errors
///
/// Returns an error if the root cannot be encoded.
pub fn root_entry<S, M, F>(codec: &Codec<M, F>, value: &S::Value) -> StoreResult<Entry>
where
    S: Schema,
    M: Marshaling,
    F: Filtering,
{
    let key = S::identifier_key(&S::identifier(value));
    Ok(Entry::present(key, codec.encode(&S::root(value))?))
}

/// The witness row entry of an identity.
///
/// # Errors
///
/// Returns an error if the witness marker cannot be encoded.
pub fn witness_entry<S, M, F>(codec: &Codec<M, F>, id: &S::Id) -> StoreResult<Entry>
where
    S: Schema,
    M: Marshaling,
    F: Filtering,
{
    let key = S::witness_key(&S::identifier_key(id));
    Ok(Entry::present(key, codec.encode(&true)?))
}

/// One entry per singleton member; unset members yield absent entries.
///
/// # Errors
///
/// Returns an error if a member tag is invalid or a value cannot be encoded.
pub fn singletons_entries<S, M, F>(codec: &Codec<M, F>, value: &S::Value) -> StoreResult<Vec<Entry>>
where
    S: Schema,
    M: Marshaling,
    F: Filtering,
{
    let mut visitor = SingletonEntries::<S, M, F> {
        codec,
        value,
        identity: S::identifier_key(&S::identifier(value)),
        entries: Vec::new(),
    };
    S::members(&mut visitor)?;
    Ok(visitor.entries)
}

/// One entry per item of every collection member the value holds.
///
/// Collections without a container yield no entries.
///
/// # Errors
///
/// Returns an error if a member tag or item identifier is invalid, or an item
/// cannot be encoded.
pub fn collections_entries<S, M, F>(codec: &Codec<M, F>, value: &S::Value) -> StoreResult<Vec<Entry>>
where
    S: Schema,
    M: Marshaling,
    F: Filtering,
{
    let mut visitor = CollectionEntries::<S, M, F> {
        codec,
        value,
        identity: S::identifier_key(&S::identifier(value)),
        entries: Vec::new(),
    };
    S::members(&mut visitor)?;
    Ok(visitor.entries)
}

/// One entry per item of a single collection container.
///
/// # Errors
///
/// Returns an error if the member tag or an item identifier is invalid, or an
/// item cannot be encoded.
pub fn collection_entries<C, M, F>(
    codec: &Codec<M, F>,
    identity: &Key,
    container: &C::Container,
) -> StoreResult<Vec<Entry>>
where
    C: Collection,
    M: Marshaling,
    F: Filtering,
{
    C::items(container)
        .into_iter()
        .map(|(id, item)| -> StoreResult<Entry> {
            let key = collection_item_key::<C>(identity, &id)?;
            Ok(match item {
                Some(item) => Entry::present(key, codec.encode(item)?),
                None => Entry::absent(key),
            })
        })
        .collect()
}

/// The kind of the member declared with `tag`, if any.
pub fn member_kind<S: Schema>(tag: &str) -> Option<MemberKind> {
    let mut lookup = TagLookup { tag, found: None };
    // TagLookup never fails
    S::members(&mut lookup).ok()?;
    lookup.found
}

/// Whether the schema declares a singleton member with `tag`.
pub fn has_singleton<S: Schema>(tag: &str) -> bool {
    member_kind::<S>(tag) == Some(MemberKind::Singleton)
}

/// Whether the schema declares a collection member with `tag`.
pub fn has_collection<S: Schema>(tag: &str) -> bool {
    member_kind::<S>(tag) == Some(MemberKind::Collection)
}

/// Check that the schema's base name and member tags can be encoded.
///
/// # Errors
///
/// Returns [`KeyError::InvalidKeySegment`] for an empty base name or a name
/// holding separator bytes, [`KeyError::ReservedTag`] for an empty member
/// tag, and [`KeyError::Malformed`] for a tag declared twice.
pub fn validate<S: Schema>(separator: strata_core::Separator) -> StoreResult<()> {
    Key::new(S::KEY_BASE_NAME).validate(separator)?;
    let mut tags = TagCheck { separator, seen: Vec::new() };
    S::members(&mut tags)
}

struct SingletonEntries<'a, S: Schema, M, F> {
    codec: &'a Codec<M, F>,
    value: &'a S::Value,
    identity: Key,
    entries: Vec<Entry>,
}

impl<S: Schema, M: Marshaling, F: Filtering> MemberVisitor<S> for SingletonEntries<'_, S, M, F> {
    fn visit_singleton<T: Singleton<Schema = S>>(&mut self) -> StoreResult<()> {
        let key = singleton_key::<T>(&self.identity)?;
        let entry = match T::get(self.value) {
            Some(member) => Entry::present(key, self.codec.encode(member)?),
            None => Entry::absent(key),
        };
        self.entries.push(entry);
        Ok(())
    }

    fn visit_collection<T: Collection<Schema = S>>(&mut self) -> StoreResult<()> {
        Ok(())
    }
}

struct CollectionEntries<'a, S: Schema, M, F> {
    codec: &'a Codec<M, F>,
    value: &'a S::Value,
    identity: Key,
    entries: Vec<Entry>,
}

impl<S: Schema, M: Marshaling, F: Filtering> MemberVisitor<S> for CollectionEntries<'_, S, M, F> {
    fn visit_singleton<T: Singleton<Schema = S>>(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn visit_collection<T: Collection<Schema = S>>(&mut self) -> StoreResult<()> {
        if let Some(container) = T::get(self.value) {
            let entries = collection_entries::<T, M, F>(self.codec, &self.identity, container)?;
            self.entries.extend(entries);
        }
        Ok(())
    }
}

struct TagLookup<'a> {
    tag: &'a str,
    found: Option<MemberKind>,
}

impl<S: Schema> MemberVisitor<S> for TagLookup<'_> {
    fn visit_singleton<T: Singleton<Schema = S>>(&mut self) -> StoreResult<()> {
        if self.found.is_none() && T::TAG == self.tag {
            self.found = Some(MemberKind::Singleton);
        }
        Ok(())
    }

    fn visit_collection<T: Collection<Schema = S>>(&mut self) -> StoreResult<()> {
        if self.found.is_none() && T::TAG == self.tag {
            self.found = Some(MemberKind::Collection);
        }
        Ok(())
    }
}

struct TagCheck {
    separator: strata_core::Separator,
    seen: Vec<&'static str>,
}

impl TagCheck {
    fn check(&mut self, tag: &'static str) -> StoreResult<()> {
        let key = Key::new("schema").with_tag(Tag::member(tag, None)?);
        key.validate(self.separator)?;
        if self.seen.contains(&tag) {
            return Err(KeyError::Malformed(format!("member tag {tag:?} is declared twice")).into());
        }
        self.seen.push(tag);
        Ok(())
    }
}

impl<S: Schema> MemberVisitor<S> for TagCheck {
    fn visit_singleton<T: Singleton<Schema = S>>(&mut self) -> StoreResult<()> {
        self.check(T::TAG)
    }

    fn visit_collection<T: Collection<Schema = S>>(&mut self) -> StoreResult<()> {
        self.check(T::TAG)
    }
}
