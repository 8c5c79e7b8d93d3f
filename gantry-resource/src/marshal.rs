//! Conversion between property maps and the wire-level struct exchanged with
//! resource providers and state storage.
//!
//! The wire format is "JSON-like": null, bool, double, string, ordered list
//! and string-keyed struct, i.e. exactly [`serde_json::Value`]. Resource
//! references are resolved to provider identifiers on the way out, and any
//! value derived from a not-yet-known (computed or output) value taints its
//! property key as unknown so callers can tell settled state from partially
//! resolved state.

use anyhow::Result;
use serde_json::{Map, Number, Value};

use gantry_core::property::{PropertyKey, PropertyMap, PropertySet, PropertyValue};
use gantry_core::tokens::Urn;

use crate::context::ResourceResolver;

/// Controls the marshaling of property maps.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarshalOptions {
    /// Permit URNs of resources known only to the prior deployment, e.g.
    /// when marshaling state ahead of an update that replaces them.
    pub permit_olds: bool,
    /// Marshal URNs as their raw text instead of resolving them; used while
    /// planning, when identifier mappings are not known yet.
    pub raw_urns: bool,
}

/// Marshals a property map into its wire struct. Resource URNs are replaced
/// by provider identifiers; it is an error to marshal a reference to a
/// resource without one. The returned key set names every property whose
/// value derived from a not-yet-known value; such properties carry their
/// placeholder shape in the struct, so the set is essential for interpreting
/// the result.
///
/// Output-valued entries are skipped entirely: outputs only become observable
/// once the resource exists.
pub fn marshal_properties_with_unknowns(
    ctx: Option<&dyn ResourceResolver>,
    props: &PropertyMap,
    opts: &MarshalOptions,
) -> (Map<String, Value>, PropertySet) {
    let mut fields = Map::new();
    let mut unknowns = PropertySet::new();
    for (key, v) in props.iter() {
        if v.is_output() {
            continue;
        }
        let (mv, known) = marshal_property_value(ctx, v, opts);
        fields.insert(key.as_str().to_string(), mv);
        if !known {
            // an unknown property taints the whole object
            unknowns.insert(key.clone());
        }
    }
    (fields, unknowns)
}

/// Marshals a property map whose values the caller has already fully
/// resolved, e.g. final settled state. Panics if an unknown value remains.
pub fn marshal_properties(
    ctx: Option<&dyn ResourceResolver>,
    props: &PropertyMap,
    opts: &MarshalOptions,
) -> Map<String, Value> {
    let (fields, unknowns) = marshal_properties_with_unknowns(ctx, props, opts);
    assert!(
        unknowns.is_empty(),
        "unexpected unknown properties during final marshaling: {:?}",
        unknowns
    );
    fields
}

/// Marshals a single property value. The boolean half of the result is
/// whether the value was known: computed and output values marshal their
/// eventual placeholder shape and report unknown, and a list or struct is
/// only known if everything inside it is.
pub fn marshal_property_value(
    ctx: Option<&dyn ResourceResolver>,
    v: &PropertyValue,
    opts: &MarshalOptions,
) -> (Value, bool) {
    match v {
        PropertyValue::Null => (Value::Null, true),
        PropertyValue::Bool(b) => (Value::Bool(*b), true),
        PropertyValue::Number(n) => (
            Value::Number(
                Number::from_f64(*n)
                    .unwrap_or_else(|| panic!("non-finite number {} has no wire form", n)),
            ),
            true,
        ),
        PropertyValue::String(s) => (Value::String(s.clone()), true),
        PropertyValue::Array(elems) => {
            let mut known = true;
            let mut values = Vec::with_capacity(elems.len());
            for elem in elems {
                let (ev, elem_known) = marshal_property_value(ctx, elem, opts);
                known = known && elem_known;
                values.push(ev);
            }
            (Value::Array(values), known)
        }
        PropertyValue::Object(map) => {
            let (fields, unknowns) = marshal_properties_with_unknowns(ctx, map, opts);
            (Value::Object(fields), unknowns.is_empty())
        }
        PropertyValue::Resource(urn) => (Value::String(resolve_urn(ctx, urn, opts)), true),
        PropertyValue::Computed(c) => (marshal_property_value(ctx, c.eventual(), opts).0, false),
        PropertyValue::Output(o) => (marshal_property_value(ctx, o.eventual(), opts).0, false),
    }
}

/// Resolves a resource reference to its wire string: the raw URN text in raw
/// mode, otherwise the provider identifier of the referenced resource,
/// falling back to its prior-deployment identifier when permitted. A
/// reference that cannot be resolved, or resolves to an unassigned
/// identifier, is a broken precondition in the caller's sequencing.
fn resolve_urn(ctx: Option<&dyn ResourceResolver>, urn: &Urn, opts: &MarshalOptions) -> String {
    let wire = if opts.raw_urns {
        urn.as_str().to_string()
    } else {
        let ctx = ctx.unwrap_or_else(|| {
            panic!(
                "resource '{}' encountered without a resolver; its URN is not recoverable",
                urn
            )
        });
        let id = match ctx.resource(urn) {
            Some(res) => res.id.clone(),
            None => match ctx.old_id(urn) {
                Some(old) if opts.permit_olds => old.clone(),
                _ => panic!("expected resource '{}' to exist at marshal time", urn),
            },
        };
        assert!(
            !id.is_empty(),
            "expected resource '{}' to have an ID at marshal time",
            urn
        );
        id.as_str().to_string()
    };
    tracing::trace!(urn = %urn, id = %wire, raw = opts.raw_urns, "serializing resource reference");
    wire
}

/// Unmarshals a wire struct back into a property map; a missing struct is an
/// empty map. Struct keys are BTree-ordered, so conversion (and any
/// diagnostics it produces) is deterministic regardless of how the wire
/// encoding ordered them.
pub fn unmarshal_properties(fields: Option<&Map<String, Value>>) -> PropertyMap {
    let Some(fields) = fields else {
        return PropertyMap::new();
    };
    fields
        .iter()
        .map(|(k, v)| (PropertyKey::new(k.clone()), unmarshal_property_value(v)))
        .collect()
}

/// Unmarshals a single wire value into its property form. The wire has no
/// representation distinguishing a resolved resource reference, a computed
/// placeholder, or an output placeholder from the plain kind it was encoded
/// as, so those variants are never reconstructed: a marshaled resource
/// reference comes back as a plain string.
// TODO: tag resource identifiers on the wire so this can reconstruct the
// resource variant instead of a plain string.
pub fn unmarshal_property_value(v: &Value) -> PropertyValue {
    match v {
        Value::Null => PropertyValue::Null,
        Value::Bool(b) => PropertyValue::Bool(*b),
        Value::Number(n) => {
            PropertyValue::Number(n.as_f64().expect("number does not fit a double"))
        }
        Value::String(s) => PropertyValue::String(s.clone()),
        Value::Array(elems) => {
            PropertyValue::Array(elems.iter().map(unmarshal_property_value).collect())
        }
        Value::Object(fields) => PropertyValue::Object(unmarshal_properties(Some(fields))),
    }
}

/// Facade for transports that carry the wire struct as JSON text.
pub fn properties_to_json(fields: &Map<String, Value>) -> Result<String> {
    serde_json::to_string(fields).map_err(|e| e.into())
}

/// Facade for transports that carry the wire struct as JSON text.
pub fn properties_from_json(s: &str) -> Result<PropertyMap> {
    let fields: Map<String, Value> = serde_json::from_str(s)?;
    Ok(unmarshal_properties(Some(&fields)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{DeploymentContext, ResourceState};
    use gantry_core::tokens::ResourceId;
    use serde_json::json;

    fn key(s: &str) -> PropertyKey {
        PropertyKey::new(s)
    }

    fn db_urn() -> Urn {
        Urn::new("urn:gantry:prod::db")
    }

    fn ctx_with_db(id: &str) -> DeploymentContext {
        let mut ctx = DeploymentContext::new();
        ctx.insert_resource(
            db_urn(),
            ResourceState {
                type_: "aws:rds/instance".to_string(),
                id: ResourceId::new(id),
                properties: PropertyMap::new(),
            },
        );
        ctx
    }

    fn plain_map() -> PropertyMap {
        [
            (key("enabled"), PropertyValue::from(true)),
            (key("count"), PropertyValue::from(2.0)),
            (key("name"), PropertyValue::from("web")),
            (key("none"), PropertyValue::Null),
            (
                key("tags"),
                PropertyValue::Array(vec![
                    PropertyValue::from("a"),
                    PropertyValue::Object(
                        [(key("k"), PropertyValue::from("v"))].into_iter().collect(),
                    ),
                ]),
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_pure_data_round_trips() {
        let m = plain_map();
        let (fields, unknowns) = marshal_properties_with_unknowns(None, &m, &Default::default());
        assert!(unknowns.is_empty());
        assert_eq!(
            Value::Object(fields.clone()),
            json!({
                "enabled": true,
                "count": 2.0,
                "name": "web",
                "none": null,
                "tags": ["a", { "k": "v" }],
            })
        );
        assert_eq!(unmarshal_properties(Some(&fields)), m);
    }

    #[test]
    fn test_empty_map_yields_a_struct() {
        let (fields, unknowns) =
            marshal_properties_with_unknowns(None, &PropertyMap::new(), &Default::default());
        assert!(fields.is_empty());
        assert!(unknowns.is_empty());
        assert!(unmarshal_properties(None).is_empty());
    }

    #[test]
    fn test_nested_computed_taints_the_top_level_key() {
        let m: PropertyMap = [(
            key("config"),
            PropertyValue::Array(vec![PropertyValue::Object(
                [(
                    key("endpoint"),
                    PropertyValue::computed(PropertyValue::from("")),
                )]
                .into_iter()
                .collect(),
            )]),
        )]
        .into_iter()
        .collect();

        let (fields, unknowns) = marshal_properties_with_unknowns(None, &m, &Default::default());
        assert_eq!(unknowns, [key("config")].into_iter().collect());
        // the placeholder shape is still marshaled
        assert_eq!(
            Value::Object(fields),
            json!({ "config": [{ "endpoint": "" }] })
        );
    }

    #[test]
    fn test_computed_marshals_placeholder_and_reports_unknown() {
        let v = PropertyValue::computed(PropertyValue::from(0.0));
        let (mv, known) = marshal_property_value(None, &v, &Default::default());
        assert!(!known);
        assert_eq!(mv, json!(0.0));
    }

    #[test]
    fn test_top_level_outputs_are_omitted_entirely() {
        let m: PropertyMap = [
            (key("name"), PropertyValue::from("web")),
            (
                key("address"),
                PropertyValue::output(PropertyValue::from("")),
            ),
        ]
        .into_iter()
        .collect();

        let (fields, unknowns) = marshal_properties_with_unknowns(None, &m, &Default::default());
        assert!(unknowns.is_empty());
        assert_eq!(Value::Object(fields), json!({ "name": "web" }));
    }

    #[test]
    fn test_output_inside_an_array_marshals_as_unknown() {
        let m: PropertyMap = [(
            key("addresses"),
            PropertyValue::Array(vec![PropertyValue::output(PropertyValue::from(""))]),
        )]
        .into_iter()
        .collect();

        let (fields, unknowns) = marshal_properties_with_unknowns(None, &m, &Default::default());
        assert_eq!(unknowns, [key("addresses")].into_iter().collect());
        assert_eq!(Value::Object(fields), json!({ "addresses": [""] }));
    }

    #[test]
    fn test_final_marshal_of_settled_state() {
        let fields = marshal_properties(None, &plain_map(), &Default::default());
        assert_eq!(fields.len(), plain_map().len());
    }

    #[test]
    #[should_panic(expected = "unexpected unknown properties during final marshaling")]
    fn test_final_marshal_panics_on_unknowns() {
        let m: PropertyMap = [(
            key("endpoint"),
            PropertyValue::computed(PropertyValue::from("")),
        )]
        .into_iter()
        .collect();
        marshal_properties(None, &m, &Default::default());
    }

    #[test]
    fn test_resource_resolves_to_provider_id() {
        let m: PropertyMap = [(key("x"), PropertyValue::from(db_urn()))]
            .into_iter()
            .collect();
        let ctx = ctx_with_db("i-123");
        let fields = marshal_properties(Some(&ctx), &m, &Default::default());
        assert_eq!(Value::Object(fields), json!({ "x": "i-123" }));
    }

    #[test]
    fn test_raw_urns_bypass_resolution() {
        let m: PropertyMap = [(key("x"), PropertyValue::from(db_urn()))]
            .into_iter()
            .collect();
        let opts = MarshalOptions {
            raw_urns: true,
            ..Default::default()
        };
        // no resolver needed in raw mode
        let fields = marshal_properties(None, &m, &opts);
        assert_eq!(Value::Object(fields), json!({ "x": "urn:gantry:prod::db" }));
    }

    #[test]
    fn test_permit_olds_falls_back_to_prior_id() {
        let m: PropertyMap = [(key("x"), PropertyValue::from(db_urn()))]
            .into_iter()
            .collect();
        let mut ctx = DeploymentContext::new();
        ctx.insert_old_id(db_urn(), ResourceId::new("i-old"));

        let opts = MarshalOptions {
            permit_olds: true,
            ..Default::default()
        };
        let fields = marshal_properties(Some(&ctx), &m, &opts);
        assert_eq!(Value::Object(fields), json!({ "x": "i-old" }));
    }

    #[test]
    #[should_panic(expected = "to exist at marshal time")]
    fn test_old_id_requires_permit_olds() {
        let m: PropertyMap = [(key("x"), PropertyValue::from(db_urn()))]
            .into_iter()
            .collect();
        let mut ctx = DeploymentContext::new();
        ctx.insert_old_id(db_urn(), ResourceId::new("i-old"));
        marshal_properties(Some(&ctx), &m, &Default::default());
    }

    #[test]
    #[should_panic(expected = "to have an ID at marshal time")]
    fn test_unassigned_id_is_fatal() {
        let m: PropertyMap = [(key("x"), PropertyValue::from(db_urn()))]
            .into_iter()
            .collect();
        let ctx = ctx_with_db("");
        marshal_properties(Some(&ctx), &m, &Default::default());
    }

    #[test]
    #[should_panic(expected = "without a resolver")]
    fn test_missing_resolver_is_fatal() {
        let m: PropertyMap = [(key("x"), PropertyValue::from(db_urn()))]
            .into_iter()
            .collect();
        marshal_properties(None, &m, &Default::default());
    }

    #[test]
    fn test_resource_reference_comes_back_as_a_string() {
        let m: PropertyMap = [(key("x"), PropertyValue::from(db_urn()))]
            .into_iter()
            .collect();
        let ctx = ctx_with_db("i-123");
        let fields = marshal_properties(Some(&ctx), &m, &Default::default());
        let back = unmarshal_properties(Some(&fields));
        assert_eq!(back.get("x").unwrap(), &PropertyValue::from("i-123"));
    }

    #[test]
    fn test_json_facades() {
        let m = plain_map();
        let fields = marshal_properties(None, &m, &Default::default());
        let text = properties_to_json(&fields).unwrap();
        assert_eq!(properties_from_json(&text).unwrap(), m);
    }
}
