use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

/// Two integer operands.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MathArgs {
    #[schemars(description = "Left operand")]
    pub a: i64,
    #[schemars(description = "Right operand")]
    pub b: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Add,
    Multiply,
    Subtract,
    Divide,
    Power,
}

impl MathOp {
    /// Integer results stay integers; `divide` and negative powers return floats.
    pub fn apply(self, a: i64, b: i64) -> Result<Value, String> {
        let overflow = || format!("Result of {:?}({}, {}) overflows", self, a, b);

        match self {
            Self::Add => a.checked_add(b).map(Value::from).ok_or_else(overflow),
            Self::Multiply => a.checked_mul(b).map(Value::from).ok_or_else(overflow),
            Self::Subtract => a.checked_sub(b).map(Value::from).ok_or_else(overflow),
            Self::Divide => {
                if b == 0 {
                    return Err("Division by zero is not allowed.".to_string());
                }
                float(a as f64 / b as f64)
            }
            Self::Power => {
                if b >= 0 {
                    let exp = u32::try_from(b).map_err(|_| overflow())?;
                    a.checked_pow(exp).map(Value::from).ok_or_else(overflow)
                } else if a == 0 {
                    Err("Zero cannot be raised to a negative power.".to_string())
                } else {
                    let exp = i32::try_from(b).map_err(|_| overflow())?;
                    float((a as f64).powi(exp))
                }
            }
        }
    }
}

fn float(value: f64) -> Result<Value, String> {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| format!("Result {} is not a finite number", value))
}
