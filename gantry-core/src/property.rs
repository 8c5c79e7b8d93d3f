//! The property value model: the canonical in-memory representation of
//! resource state, including values that are not known yet because the
//! expression or resource that produces them has not been evaluated.

use std::collections::{btree_map, BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use crate::tokens::{Name, Urn};

/// The name of a property.
pub type PropertyKey = Name;

/// A set of property keys, e.g. the unknown keys reported by marshaling.
pub type PropertySet = BTreeSet<PropertyKey>;

/// The value of a property, limited to a closed set of "JSON-like" kinds
/// plus the resource reference and not-yet-known kinds.
///
/// A value holds exactly one kind at a time. Reading it as a different kind
/// through one of the `*_value` accessors is a bug at the call site, not a
/// recoverable condition; check the matching `is_*` predicate first, or match
/// on the enum directly.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// The absence of a value.
    Null,
    Bool(bool),
    /// Double-precision number, the only numeric kind on the wire.
    Number(f64),
    String(String),
    /// Ordered sequence of values.
    Array(Vec<PropertyValue>),
    /// Nested property map.
    Object(PropertyMap),
    /// A reference to another resource, by its durable URN. The
    /// provider-assigned ID is substituted at marshal time.
    Resource(Urn),
    /// A value that will be computed by evaluating an expression at some
    /// point in the future.
    Computed(Computed),
    /// A value that the resource provider will produce once the resource has
    /// actually been provisioned.
    Output(Output),
}

/// Stands in for a property value that will be computed at some point in the
/// future. It carries a value describing the expected shape of the eventual
/// result, never the result itself, which does not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Computed {
    eventual: Box<PropertyValue>,
}

impl Computed {
    pub fn new(eventual: PropertyValue) -> Self {
        Computed {
            eventual: Box::new(eventual),
        }
    }

    /// The expected shape of the value once it resolves.
    pub fn eventual(&self) -> &PropertyValue {
        &self.eventual
    }
}

/// Stands in for a property value that the resource provider will produce
/// when the resource is created. Encountering one means the resource has not
/// been created yet. An output is a special case of [`Computed`], but carries
/// the additional meaning that resolution is bound to provisioning rather
/// than evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    eventual: Box<PropertyValue>,
}

impl Output {
    pub fn new(eventual: PropertyValue) -> Self {
        Output {
            eventual: Box::new(eventual),
        }
    }

    /// The expected shape of the value once the provider produces it.
    pub fn eventual(&self) -> &PropertyValue {
        &self.eventual
    }
}

impl PropertyValue {
    /// Wraps `eventual` as a computed value.
    pub fn computed(eventual: PropertyValue) -> Self {
        PropertyValue::Computed(Computed::new(eventual))
    }

    /// Wraps `eventual` as an output value.
    pub fn output(eventual: PropertyValue) -> Self {
        PropertyValue::Output(Output::new(eventual))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }
    pub fn is_bool(&self) -> bool {
        matches!(self, PropertyValue::Bool(_))
    }
    pub fn is_number(&self) -> bool {
        matches!(self, PropertyValue::Number(_))
    }
    pub fn is_string(&self) -> bool {
        matches!(self, PropertyValue::String(_))
    }
    pub fn is_array(&self) -> bool {
        matches!(self, PropertyValue::Array(_))
    }
    pub fn is_object(&self) -> bool {
        matches!(self, PropertyValue::Object(_))
    }
    pub fn is_resource(&self) -> bool {
        matches!(self, PropertyValue::Resource(_))
    }
    pub fn is_computed(&self) -> bool {
        matches!(self, PropertyValue::Computed(_))
    }
    pub fn is_output(&self) -> bool {
        matches!(self, PropertyValue::Output(_))
    }

    pub fn bool_value(&self) -> bool {
        match self {
            PropertyValue::Bool(b) => *b,
            other => panic!("value is not a bool ({})", other.type_label()),
        }
    }

    pub fn number_value(&self) -> f64 {
        match self {
            PropertyValue::Number(n) => *n,
            other => panic!("value is not a number ({})", other.type_label()),
        }
    }

    pub fn string_value(&self) -> &str {
        match self {
            PropertyValue::String(s) => s,
            other => panic!("value is not a string ({})", other.type_label()),
        }
    }

    pub fn array_value(&self) -> &[PropertyValue] {
        match self {
            PropertyValue::Array(elems) => elems,
            other => panic!("value is not an array ({})", other.type_label()),
        }
    }

    pub fn object_value(&self) -> &PropertyMap {
        match self {
            PropertyValue::Object(map) => map,
            other => panic!("value is not an object ({})", other.type_label()),
        }
    }

    pub fn resource_value(&self) -> &Urn {
        match self {
            PropertyValue::Resource(urn) => urn,
            other => panic!("value is not a resource ({})", other.type_label()),
        }
    }

    pub fn computed_value(&self) -> &Computed {
        match self {
            PropertyValue::Computed(c) => c,
            other => panic!("value is not a computed value ({})", other.type_label()),
        }
    }

    pub fn output_value(&self) -> &Output {
        match self {
            PropertyValue::Output(o) => o,
            other => panic!("value is not an output value ({})", other.type_label()),
        }
    }

    /// A human-readable tag for the kind of value, used in diagnostics.
    /// Computed and output values render the expected shape of their eventual
    /// value, e.g. `computed<string>`.
    pub fn type_label(&self) -> String {
        match self {
            PropertyValue::Null => "null".to_string(),
            PropertyValue::Bool(_) => "bool".to_string(),
            PropertyValue::Number(_) => "number".to_string(),
            PropertyValue::String(_) => "string".to_string(),
            PropertyValue::Array(_) => "[]".to_string(),
            PropertyValue::Object(_) => "object".to_string(),
            PropertyValue::Resource(_) => "resource".to_string(),
            PropertyValue::Computed(c) => format!("computed<{}>", c.eventual().type_label()),
            PropertyValue::Output(o) => format!("output<{}>", o.eventual().type_label()),
        }
    }

    /// Projects the value into a plain JSON value, suitable for
    /// deserialization into native structures.
    ///
    /// This is only defined for the JSON-like kinds. Resource references must
    /// be marshaled (so the URN can be resolved), and computed/output values
    /// have no value to project; hitting one here is a bug at the call site.
    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::Null => Value::Null,
            PropertyValue::Bool(b) => Value::Bool(*b),
            PropertyValue::Number(n) => Value::Number(
                serde_json::Number::from_f64(*n)
                    .unwrap_or_else(|| panic!("non-finite number {} has no JSON form", n)),
            ),
            PropertyValue::String(s) => Value::String(s.clone()),
            PropertyValue::Array(elems) => {
                Value::Array(elems.iter().map(PropertyValue::to_json).collect())
            }
            PropertyValue::Object(map) => Value::Object(map.to_json()),
            other => panic!("a {} value has no JSON form", other.type_label()),
        }
    }

    /// Finds all resource URNs, transitively throughout the value.
    pub fn all_resources(&self) -> BTreeSet<Urn> {
        let mut urns = BTreeSet::new();
        self.collect_resources(&mut urns);
        urns
    }

    fn collect_resources(&self, urns: &mut BTreeSet<Urn>) {
        match self {
            PropertyValue::Resource(urn) => {
                urns.insert(urn.clone());
            }
            PropertyValue::Array(elems) => {
                for elem in elems {
                    elem.collect_resources(urns);
                }
            }
            PropertyValue::Object(map) => map.collect_resources(urns),
            _ => {}
        }
    }

    /// Rebuilds the value with every resource URN passed through `updater`,
    /// leaving everything else untouched. Used during replacement-style
    /// updates to point references at the replacing resource.
    pub fn replace_resources<F>(&self, mut updater: F) -> Self
    where
        F: FnMut(&Urn) -> Urn,
    {
        self.replace_resources_dyn(&mut updater)
    }

    fn replace_resources_dyn(&self, updater: &mut dyn FnMut(&Urn) -> Urn) -> Self {
        match self {
            PropertyValue::Resource(urn) => PropertyValue::Resource(updater(urn)),
            PropertyValue::Array(elems) => PropertyValue::Array(
                elems
                    .iter()
                    .map(|elem| elem.replace_resources_dyn(updater))
                    .collect(),
            ),
            PropertyValue::Object(map) => PropertyValue::Object(map.replace_resources_dyn(updater)),
            other => other.clone(),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Number(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<Urn> for PropertyValue {
    fn from(v: Urn) -> Self {
        PropertyValue::Resource(v)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(v: Vec<PropertyValue>) -> Self {
        PropertyValue::Array(v)
    }
}

impl From<PropertyMap> for PropertyValue {
    fn from(v: PropertyMap) -> Self {
        PropertyValue::Object(v)
    }
}

impl From<Computed> for PropertyValue {
    fn from(v: Computed) -> Self {
        PropertyValue::Computed(v)
    }
}

impl From<Output> for PropertyValue {
    fn from(v: Output) -> Self {
        PropertyValue::Output(v)
    }
}

/// An absent value is null.
impl<T: Into<PropertyValue>> From<Option<T>> for PropertyValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => PropertyValue::Null,
        }
    }
}

/// Converts an arbitrary JSON value, recursively. This is the generic entry
/// point for turning already-deserialized data into property values; for
/// native structures see [`PropertyMap::from_serializable`].
impl From<Value> for PropertyValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => PropertyValue::Null,
            Value::Bool(b) => PropertyValue::Bool(b),
            Value::Number(n) => {
                PropertyValue::Number(n.as_f64().expect("number does not fit a double"))
            }
            Value::String(s) => PropertyValue::String(s),
            Value::Array(elems) => {
                PropertyValue::Array(elems.into_iter().map(PropertyValue::from).collect())
            }
            Value::Object(fields) => PropertyValue::Object(PropertyMap::from(fields)),
        }
    }
}

/// Converts a JSON object, recursively; the counterpart of
/// [`PropertyMap::to_json`] for plain data.
impl From<serde_json::Map<String, Value>> for PropertyMap {
    fn from(fields: serde_json::Map<String, Value>) -> Self {
        fields
            .into_iter()
            .map(|(k, v)| (PropertyKey::new(k), PropertyValue::from(v)))
            .collect()
    }
}

/// A map from property name to property value. Iteration order is
/// deterministic (lexicographic on the key), which keeps marshaled output,
/// traversals and diagnostics reproducible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap(BTreeMap<PropertyKey, PropertyValue>);

impl PropertyMap {
    pub fn new() -> Self {
        PropertyMap(BTreeMap::new())
    }

    /// Converts any serializable structure into a property map, using the
    /// structure's serde attributes to determine naming. The fallback rules
    /// are the obvious ones: unit/`None` becomes null, sequences become
    /// arrays, maps and structs become objects.
    ///
    /// Panics if the structure does not serialize, or serializes to
    /// something other than an object; that is a programming error, not
    /// input validation.
    pub fn from_serializable<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(Value::Object(fields)) => PropertyMap::from(fields),
            Ok(other) => panic!(
                "cannot build a property map from a non-object value: {}",
                other
            ),
            Err(err) => panic!("value does not serialize to a property map: {}", err),
        }
    }

    pub fn insert(&mut self, key: PropertyKey, value: PropertyValue) -> Option<PropertyValue> {
        self.0.insert(key, value)
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, PropertyKey, PropertyValue> {
        self.0.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, PropertyKey, PropertyValue> {
        self.0.keys()
    }

    /// Projects the map into a plain JSON object; see
    /// [`PropertyValue::to_json`] for the kinds this is defined for.
    pub fn to_json(&self) -> serde_json::Map<String, Value> {
        self.iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_json()))
            .collect()
    }

    /// Finds all resource URNs, transitively throughout the map.
    pub fn all_resources(&self) -> BTreeSet<Urn> {
        let mut urns = BTreeSet::new();
        self.collect_resources(&mut urns);
        urns
    }

    fn collect_resources(&self, urns: &mut BTreeSet<Urn>) {
        for (_, v) in self.iter() {
            v.collect_resources(urns);
        }
    }

    /// Rebuilds the map with every resource URN passed through `updater`;
    /// see [`PropertyValue::replace_resources`].
    pub fn replace_resources<F>(&self, mut updater: F) -> Self
    where
        F: FnMut(&Urn) -> Urn,
    {
        self.replace_resources_dyn(&mut updater)
    }

    fn replace_resources_dyn(&self, updater: &mut dyn FnMut(&Urn) -> Urn) -> Self {
        self.iter()
            .map(|(k, v)| (k.clone(), v.replace_resources_dyn(updater)))
            .collect()
    }
}

impl FromIterator<(PropertyKey, PropertyValue)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (PropertyKey, PropertyValue)>>(iter: I) -> Self {
        PropertyMap(iter.into_iter().collect())
    }
}

impl Extend<(PropertyKey, PropertyValue)> for PropertyMap {
    fn extend<I: IntoIterator<Item = (PropertyKey, PropertyValue)>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

impl IntoIterator for PropertyMap {
    type Item = (PropertyKey, PropertyValue);
    type IntoIter = btree_map::IntoIter<PropertyKey, PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PropertyMap {
    type Item = (&'a PropertyKey, &'a PropertyValue);
    type IntoIter = btree_map::Iter<'a, PropertyKey, PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
