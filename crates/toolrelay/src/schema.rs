//! Parameter schema parsing and argument validation.
//!
//! Tool backends describe their inputs with JSON Schema. Only the subset that
//! matters for calling a tool is understood here: property types, `required`,
//! `default`, `anyOf`/`oneOf` unions and `null` members. Everything else in the
//! schema is ignored for validation but still forwarded to the model.

use serde_json::{Map, Number, Value};

use crate::types::{ParamSpec, ParamType};

/// Parse a tool input schema into ordered parameter specs.
///
/// Returns a description of the problem when the schema is malformed.
pub fn parse_input_schema(schema: &Value) -> Result<Vec<(String, ParamSpec)>, String> {
    let obj = schema
        .as_object()
        .ok_or_else(|| "input schema is not a JSON object".to_string())?;

    if let Some(ty) = obj.get("type") {
        if ty.as_str() != Some("object") {
            return Err(format!("input schema type must be \"object\", got {}", ty));
        }
    }

    let required: Vec<&str> = match obj.get("required") {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .ok_or_else(|| format!("required entry {} is not a string", v))
            })
            .collect::<Result<_, _>>()?,
        Some(other) => return Err(format!("required must be an array, got {}", other)),
    };

    let properties = match obj.get("properties") {
        None => return Ok(Vec::new()),
        Some(Value::Object(props)) => props,
        Some(other) => return Err(format!("properties must be an object, got {}", other)),
    };

    let mut params = Vec::with_capacity(properties.len());
    for (name, def) in properties {
        let def = def
            .as_object()
            .ok_or_else(|| format!("property '{}' is not an object", name))?;
        let (ty, nullable) =
            parse_type(def).map_err(|e| format!("property '{}': {}", name, e))?;

        params.push((
            name.clone(),
            ParamSpec {
                ty,
                required: required.contains(&name.as_str()),
                nullable,
                default: def.get("default").cloned(),
            },
        ));
    }

    Ok(params)
}

/// Returns the declared type and whether `null` is allowed.
fn parse_type(def: &Map<String, Value>) -> Result<(ParamType, bool), String> {
    match def.get("type") {
        Some(Value::String(name)) => type_from_names(&[name.as_str()]),
        Some(Value::Array(names)) => {
            let names: Vec<&str> = names
                .iter()
                .map(|n| n.as_str().ok_or_else(|| format!("type entry {} is not a string", n)))
                .collect::<Result<_, _>>()?;
            type_from_names(&names)
        }
        Some(other) => Err(format!("type must be a string or array, got {}", other)),
        None => {
            let Some(members) = def.get("anyOf").or_else(|| def.get("oneOf")) else {
                return Ok((ParamType::Any, false));
            };
            let members = members
                .as_array()
                .ok_or_else(|| "anyOf must be an array".to_string())?;

            let mut types = Vec::new();
            let mut nullable = false;
            for member in members {
                let member = member
                    .as_object()
                    .ok_or_else(|| "anyOf member is not an object".to_string())?;
                if member.get("type").and_then(Value::as_str) == Some("null") {
                    nullable = true;
                    continue;
                }
                let (ty, member_nullable) = parse_type(member)?;
                nullable |= member_nullable;
                types.push(ty);
            }
            Ok((collapse(types), nullable))
        }
    }
}

fn type_from_names(names: &[&str]) -> Result<(ParamType, bool), String> {
    let mut types = Vec::new();
    let mut nullable = false;
    for name in names {
        if *name == "null" {
            nullable = true;
            continue;
        }
        let ty = ParamType::from_json_name(name)
            .ok_or_else(|| format!("unknown type \"{}\"", name))?;
        types.push(ty);
    }
    Ok((collapse(types), nullable))
}

fn collapse(mut types: Vec<ParamType>) -> ParamType {
    match types.len() {
        0 => ParamType::Any,
        1 => types.remove(0),
        _ => ParamType::Union(types),
    }
}

/// Validate and coerce `arguments` against `params`.
///
/// The result is an object holding declared parameters in declaration order,
/// with defaults filled in. All problems are reported together.
pub fn validate_arguments(
    params: &[(String, ParamSpec)],
    arguments: &Value,
) -> Result<Map<String, Value>, String> {
    let mut supplied = match arguments {
        Value::Null => Map::new(),
        Value::Object(map) => map.clone(),
        Value::String(raw) if raw.trim().is_empty() => Map::new(),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            _ => return Err("arguments must be a JSON object".to_string()),
        },
        _ => return Err("arguments must be a JSON object".to_string()),
    };

    // Schemas without properties accept arguments as-is
    if params.is_empty() {
        return Ok(supplied);
    }

    let mut validated = Map::new();
    let mut problems = Vec::new();

    for (name, spec) in params {
        let value = supplied.remove(name).filter(|v| !v.is_null() || spec.nullable);
        match value {
            Some(value) => match coerce(&value, &spec.ty, spec.nullable) {
                Some(coerced) => {
                    validated.insert(name.clone(), coerced);
                }
                None => problems.push(format!(
                    "parameter '{}' expects {}, got {}",
                    name,
                    spec.ty,
                    describe(&value)
                )),
            },
            None if spec.required => {
                problems.push(format!("missing required parameter '{}'", name));
            }
            None => {
                if let Some(default) = &spec.default {
                    validated.insert(name.clone(), default.clone());
                }
            }
        }
    }

    if !supplied.is_empty() {
        let extra: Vec<&String> = supplied.keys().collect();
        tracing::debug!(?extra, "Dropping undeclared arguments");
    }

    if problems.is_empty() {
        Ok(validated)
    } else {
        Err(problems.join("; "))
    }
}

/// Coerce a single value to `ty`. At most one conversion is attempted.
pub fn coerce(value: &Value, ty: &ParamType, nullable: bool) -> Option<Value> {
    if value.is_null() {
        return nullable.then_some(Value::Null);
    }
    if matches_exactly(value, ty) {
        return Some(value.clone());
    }
    convert(value, ty)
}

fn matches_exactly(value: &Value, ty: &ParamType) -> bool {
    match ty {
        ParamType::String => value.is_string(),
        ParamType::Integer => value.is_i64() || value.is_u64(),
        ParamType::Number => value.is_number(),
        ParamType::Boolean => value.is_boolean(),
        ParamType::Array => value.is_array(),
        ParamType::Object => value.is_object(),
        ParamType::Any => true,
        ParamType::Union(members) => members.iter().any(|m| matches_exactly(value, m)),
    }
}

fn convert(value: &Value, ty: &ParamType) -> Option<Value> {
    match (ty, value) {
        (ParamType::Integer, Value::String(s)) => parse_integer(s.trim()),
        (ParamType::Integer, Value::Number(n)) => n.as_f64().and_then(whole_to_integer),
        (ParamType::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        (ParamType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ParamType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (ParamType::Boolean, Value::String(s)) => {
            match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(Value::Bool(true)),
                "false" | "no" | "0" => Some(Value::Bool(false)),
                _ => None,
            }
        }
        (ParamType::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(0) => Some(Value::Bool(false)),
            Some(1) => Some(Value::Bool(true)),
            _ => None,
        },
        (ParamType::Array, Value::String(s)) => match serde_json::from_str(s) {
            Ok(v @ Value::Array(_)) => Some(v),
            _ => None,
        },
        (ParamType::Object, Value::String(s)) => match serde_json::from_str(s) {
            Ok(v @ Value::Object(_)) => Some(v),
            _ => None,
        },
        (ParamType::Union(members), _) => members.iter().find_map(|m| convert(value, m)),
        _ => None,
    }
}

fn parse_integer(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    s.parse::<f64>().ok().and_then(whole_to_integer)
}

fn whole_to_integer(f: f64) -> Option<Value> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(Value::from(f as i64))
    } else {
        None
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string {:?}", s),
        Value::Array(_) => "an array".to_string(),
        Value::Object(_) => "an object".to_string(),
    }
}
