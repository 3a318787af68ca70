//! Normalising tool parameter schemas.
//!
//! Tools describe their input with JSON schemas, usually generated by
//! schemars. Only flat objects are accepted, whose properties are strings,
//! integers or string enums, since this is what every supported backend
//! handles reliably.

use serde_json::{Map, Value, json};

use crate::Error;

// Bounds `$ref` chains, which may be cyclic.
const MAX_DEPTH: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Kind {
    String,
    Integer,
    Enum(Vec<String>),
}

#[derive(Default)]
struct Param {
    kind: Option<Kind>,
    nullable: bool,
    has_default: bool,
    description: Option<String>,
}

impl Param {
    fn add_kind(&mut self, kind: Kind) -> Option<()> {
        self.kind = Some(match (self.kind.take(), kind) {
            (None, kind) => kind,
            (Some(Kind::Enum(mut variants)), Kind::Enum(more)) => {
                variants.extend(more);
                Kind::Enum(variants)
            }
            (Some(kind), other) if kind == other => kind,
            _ => return None,
        });
        Some(())
    }

    fn add_type(&mut self, ty: &str) -> Option<()> {
        match ty {
            "string" => self.add_kind(Kind::String),
            "integer" => self.add_kind(Kind::Integer),
            "null" => {
                self.nullable = true;
                Some(())
            }
            _ => None,
        }
    }

    fn merge(&mut self, other: Param) -> Option<()> {
        self.nullable |= other.nullable;
        self.has_default |= other.has_default;
        match other.kind {
            Some(kind) => self.add_kind(kind),
            None => Some(()),
        }
    }

    fn to_schema(&self) -> Option<Value> {
        let mut schema = match self.kind.as_ref()? {
            Kind::String => json!({ "type": "string" }),
            Kind::Integer => json!({ "type": "integer" }),
            Kind::Enum(variants) => json!({ "type": "string", "enum": variants }),
        };
        if let Some(description) = &self.description {
            schema["description"] = Value::String(description.clone());
        }
        Some(schema)
    }
}

fn parse(schema: &Value, root: &Value, depth: usize) -> Option<Param> {
    if depth > MAX_DEPTH {
        return None;
    }
    let mut param = Param {
        description: schema
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_owned),
        has_default: schema.get("default").is_some(),
        ..Default::default()
    };

    if let Some(reference) = schema.get("$ref") {
        let pointer = reference.as_str()?.strip_prefix('#')?;
        let target = parse(root.pointer(pointer)?, root, depth + 1)?;
        if param.description.is_none() {
            param.description = target.description.clone();
        }
        param.merge(target)?;
        return Some(param);
    }

    if let Some(value) = schema.get("const") {
        param.add_kind(Kind::Enum(vec![value.as_str()?.to_owned()]))?;
        return Some(param);
    }

    if let Some(values) = schema.get("enum") {
        let mut variants = vec![];
        for value in values.as_array()? {
            match value {
                Value::String(variant) => variants.push(variant.clone()),
                Value::Null => param.nullable = true,
                _ => return None,
            }
        }
        param.add_kind(Kind::Enum(variants))?;
        return Some(param);
    }

    match schema.get("type") {
        Some(Value::String(ty)) => param.add_type(ty)?,
        Some(Value::Array(types)) => {
            for ty in types {
                param.add_type(ty.as_str()?)?;
            }
        }
        Some(_) => return None,
        None => {}
    }

    for key in ["anyOf", "oneOf"] {
        let Some(variants) = schema.get(key) else {
            continue;
        };
        for variant in variants.as_array()? {
            param.merge(parse(variant, root, depth + 1)?)?;
        }
    }
    Some(param)
}

/// Normalises the parameter schema of `tool`.
///
/// A parameter is required if it is listed as such, is not nullable and
/// has no default value.
pub(crate) fn normalize(tool: &str, schema: &Value) -> Result<Value, Error> {
    if schema.get("type").and_then(Value::as_str) != Some("object") {
        return Err(Error::Registration(format!(
            "{tool}: parameters must be an object"
        )));
    }
    let listed: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut properties = Map::new();
    let mut required = vec![];
    let empty = Map::new();
    let declared = schema
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    for (name, prop) in declared {
        let Some((param, prop_schema)) = parse(prop, schema, 0)
            .and_then(|param| param.to_schema().map(|s| (param, s)))
        else {
            return Err(Error::Registration(format!(
                "{tool}.{name}: unsupported parameter type"
            )));
        };
        if listed.contains(&name.as_str())
            && !param.nullable
            && !param.has_default
        {
            required.push(name.clone());
        }
        properties.insert(name.clone(), prop_schema);
    }

    Ok(json!({
        "type": "object",
        "properties": properties,
        "required": required,
    }))
}

#[cfg(test)]
mod tests {
    use schemars::{JsonSchema, schema_for};
    use serde::Deserialize;

    use super::*;

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    #[serde(rename_all = "lowercase")]
    enum Unit {
        Celsius,
        Fahrenheit,
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct WeatherParameters {
        #[schemars(description = "The city, e.g. Boston, MA")]
        location: String,
        unit: Option<Unit>,
        days: u32,
        #[serde(default)]
        note: String,
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Nested {
        inner: WeatherParameters,
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Float {
        ratio: f64,
    }

    #[test]
    fn test_derived_schema() {
        let schema = schema_for!(WeatherParameters).to_value();
        let normalized = normalize("get_weather", &schema).unwrap();

        let properties = &normalized["properties"];
        assert_eq!(
            properties["location"],
            json!({ "type": "string", "description": "The city, e.g. Boston, MA" })
        );
        assert_eq!(
            properties["unit"],
            json!({ "type": "string", "enum": ["celsius", "fahrenheit"] })
        );
        assert_eq!(properties["days"]["type"], "integer");
        assert_eq!(properties["note"]["type"], "string");
        assert_eq!(normalized["required"], json!(["location", "days"]));
    }

    #[test]
    fn test_const_variants_and_type_arrays() {
        let schema = json!({
            "type": "object",
            "properties": {
                "mode": {
                    "oneOf": [
                        { "const": "fast", "description": "Quick" },
                        { "const": "slow" },
                        { "type": "null" }
                    ]
                },
                "name": { "type": ["string", "null"] }
            },
            "required": ["mode", "name"]
        });
        let normalized = normalize("tune", &schema).unwrap();
        assert_eq!(
            normalized["properties"]["mode"],
            json!({ "type": "string", "enum": ["fast", "slow"] })
        );
        assert_eq!(normalized["properties"]["name"], json!({ "type": "string" }));
        assert_eq!(normalized["required"], json!([]));
    }

    #[test]
    fn test_unsupported_types() {
        let err = normalize("nested", &schema_for!(Nested).to_value()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to register tool: nested.inner: unsupported parameter type"
        );

        let err = normalize("float", &schema_for!(Float).to_value()).unwrap_err();
        assert!(err.to_string().contains("float.ratio"));

        let err = normalize("plain", &json!({ "type": "string" })).unwrap_err();
        assert!(matches!(err, Error::Registration(_)));
    }

    #[test]
    fn test_no_parameters() {
        let normalized = normalize("now", &json!({ "type": "object" })).unwrap();
        assert_eq!(
            normalized,
            json!({ "type": "object", "properties": {}, "required": [] })
        );
    }
}
