//! The opcode set and stack machine that executes a compiled program.

use crate::context::Context;
use crate::error::SaeError;
use splot_core::{Value, ValueType};
use std::collections::BTreeMap;

/// A single compiled instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Opcode {
    /// Push a numeric literal.
    PushNum(f64),
    /// Push a text literal (`:name` syntax).
    PushText(String),
    /// Build an array from the top `n` stack values (`[]`, `[1]`..`[4]`)
    /// and push it. Elements come off the stack in reverse, so the array
    /// preserves left-to-right push order.
    BuildArray(usize),
    /// Build an empty map and push it.
    BuildMap,
    /// Push a bound variable (`v`, `v_l`, `c`, or an `rtc.*` field).
    PushVar(Var),
    /// Stack shuffling: `DUP DROP SWAP OVER ROT`.
    Stack(StackOp),
    /// Arithmetic, including unary `NEG ABS FLOOR CEIL ROUND`.
    Arith(ArithOp),
    /// Trigonometric functions, argument/result in turns (`0..1` per cycle).
    Trig(TrigOp),
    /// Relational comparison, pushing a `Bool`.
    Cmp(CmpOp),
    /// Boolean combinators.
    Logic(LogicOp),
    /// Horner's-method polynomial evaluation, degree 2 or 3. Coefficients
    /// are popped constant-term-first, with `x` beneath them.
    Poly(u8),
    /// Unit conversions to seconds (`H>S`, `D>S`).
    Conv(ConvOp),
    /// Collection manipulation (`POP PUSH GET PUT`).
    Collection(CollOp),
    /// Pop a bool; if false, jump to the given instruction index.
    JumpIfFalse(usize),
    /// Unconditionally jump to the given instruction index.
    Jump(usize),
    /// Discard the entire stack (the `STOP` keyword). Combined with the
    /// empty-stack-at-end rule, this forces the program to yield `STOP`
    /// regardless of what was computed so far.
    ClearStack,
}

/// Bound variable names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Var {
    /// Current propagated value.
    V,
    /// Previous propagated value.
    VLast,
    /// Fire count.
    C,
    /// `rtc.y` — calendar year.
    RtcYear,
    /// `rtc.dow` — day of week, 0=Monday.
    RtcDayOfWeek,
    /// `rtc.dom` — day of month, 0-based.
    RtcDayOfMonth,
    /// `rtc.tod` — time of day, fractional hours.
    RtcTimeOfDay,
    /// `rtc.moy` — month of year, 0=January.
    RtcMonthOfYear,
    /// `rtc.awm` — aligned week of month.
    RtcAlignedWeekOfMonth,
    /// `rtc.wom` — week of month.
    RtcWeekOfMonth,
    /// `rtc.woy` — ISO week of year.
    RtcWeekOfYear,
}

/// Stack-shuffling operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOp {
    /// Duplicate the top value.
    Dup,
    /// Discard the top value.
    Drop,
    /// Swap the top two values.
    Swap,
    /// Copy the second-from-top value onto the top.
    Over,
    /// Rotate the top three values: `a b c -> b c a`.
    Rot,
}

/// Binary/unary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// `a b -> a + b`
    Add,
    /// `a b -> a - b`
    Sub,
    /// `a b -> a * b`
    Mul,
    /// `a b -> a / b`
    Div,
    /// `a b -> a % b`
    Rem,
    /// `a b -> a ^ b`
    Pow,
    /// `a -> -a`
    Neg,
    /// `a -> |a|`
    Abs,
    /// `a -> floor(a)`
    Floor,
    /// `a -> ceil(a)`
    Ceil,
    /// `a -> round(a)`
    Round,
}

/// Trigonometric operators. Arguments and results are in turns, not
/// radians: `0.25` is a quarter turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrigOp {
    /// sine
    Sin,
    /// cosine
    Cos,
    /// tangent
    Tan,
    /// arcsine
    Asin,
    /// arccosine
    Acos,
    /// arctangent
    Atan,
}

/// Relational operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// Boolean combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    /// `&&`
    And,
    /// `||`
    Or,
    /// `!`
    Not,
}

/// Unit-conversion operators, both producing seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvOp {
    /// Hours to seconds.
    HoursToSeconds,
    /// Days to seconds.
    DaysToSeconds,
}

/// Collection operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollOp {
    /// Pop an array, remove its last element, push the shortened array
    /// then the element (so the element ends up on top, with the leftover
    /// array cleared via `SWAP DROP`).
    Pop,
    /// Pop a value then an array, append the value, push the array.
    Push,
    /// Pop a key then a map, push the value stored at that key.
    Get,
    /// Pop a key, a value, then a map; push the map with that entry set.
    Put,
}

const TURN: f64 = std::f64::consts::TAU;

/// Run a compiled program to completion against `input` and `ctx`.
///
/// The stack starts with `input` as its only element. If the stack is
/// empty when the program ends, execution yields the `STOP` sentinel
/// rather than an error — this is how a program signals "suppress this
/// propagation."
pub fn run(program: &[Opcode], input: Value, ctx: &Context) -> Result<Value, SaeError> {
    let mut stack: Vec<Value> = vec![input];
    let mut pc = 0usize;

    while pc < program.len() {
        let op = &program[pc];
        let mut next_pc = pc + 1;

        match op {
            Opcode::PushNum(n) => stack.push(Value::Float(*n)),
            Opcode::PushText(s) => stack.push(Value::Text(s.clone())),
            Opcode::BuildArray(n) => {
                let mut elems = pop_n(&mut stack, *n)?;
                elems.reverse();
                stack.push(Value::Array(elems));
            }
            Opcode::BuildMap => stack.push(Value::Map(BTreeMap::new())),
            Opcode::PushVar(var) => stack.push(read_var(*var, ctx)),
            Opcode::Stack(op) => exec_stack(op, &mut stack)?,
            Opcode::Arith(op) => exec_arith(op, &mut stack)?,
            Opcode::Trig(op) => exec_trig(op, &mut stack)?,
            Opcode::Cmp(op) => exec_cmp(op, &mut stack)?,
            Opcode::Logic(op) => exec_logic(op, &mut stack)?,
            Opcode::Poly(degree) => exec_poly(*degree, &mut stack)?,
            Opcode::Conv(op) => exec_conv(op, &mut stack)?,
            Opcode::Collection(op) => exec_collection(op, &mut stack)?,
            Opcode::JumpIfFalse(target) => {
                let cond = pop(&mut stack)?.as_bool()?;
                if !cond {
                    next_pc = *target;
                }
            }
            Opcode::Jump(target) => next_pc = *target,
            Opcode::ClearStack => stack.clear(),
        }

        pc = next_pc;
    }

    Ok(stack.pop().unwrap_or_else(Value::stop))
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, SaeError> {
    stack.pop().ok_or(SaeError::StackUnderflow)
}

fn pop_n(stack: &mut Vec<Value>, n: usize) -> Result<Vec<Value>, SaeError> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(pop(stack)?);
    }
    Ok(out)
}

fn read_var(var: Var, ctx: &Context) -> Value {
    match var {
        Var::V => ctx.v.clone(),
        Var::VLast => ctx.v_l.clone(),
        Var::C => Value::Float(ctx.c),
        Var::RtcYear => Value::Float(ctx.rtc.year as f64),
        Var::RtcDayOfWeek => Value::Float(ctx.rtc.day_of_week as f64),
        Var::RtcDayOfMonth => Value::Float(ctx.rtc.day_of_month as f64),
        Var::RtcTimeOfDay => Value::Float(ctx.rtc.time_of_day),
        Var::RtcMonthOfYear => Value::Float(ctx.rtc.month_of_year as f64),
        Var::RtcAlignedWeekOfMonth => Value::Float(ctx.rtc.aligned_week_of_month as f64),
        Var::RtcWeekOfMonth => Value::Float(ctx.rtc.week_of_month as f64),
        Var::RtcWeekOfYear => Value::Float(ctx.rtc.week_of_year as f64),
    }
}

fn exec_stack(op: &StackOp, stack: &mut Vec<Value>) -> Result<(), SaeError> {
    match op {
        StackOp::Dup => {
            let top = stack.last().cloned().ok_or(SaeError::StackUnderflow)?;
            stack.push(top);
        }
        StackOp::Drop => {
            pop(stack)?;
        }
        StackOp::Swap => {
            let b = pop(stack)?;
            let a = pop(stack)?;
            stack.push(b);
            stack.push(a);
        }
        StackOp::Over => {
            if stack.len() < 2 {
                return Err(SaeError::StackUnderflow);
            }
            let second = stack[stack.len() - 2].clone();
            stack.push(second);
        }
        StackOp::Rot => {
            let c = pop(stack)?;
            let b = pop(stack)?;
            let a = pop(stack)?;
            stack.push(b);
            stack.push(c);
            stack.push(a);
        }
    }
    Ok(())
}

fn exec_arith(op: &ArithOp, stack: &mut Vec<Value>) -> Result<(), SaeError> {
    let result = if matches!(op, ArithOp::Neg | ArithOp::Abs | ArithOp::Floor | ArithOp::Ceil | ArithOp::Round) {
        let a = pop(stack)?.as_f64()?;
        match op {
            ArithOp::Neg => -a,
            ArithOp::Abs => a.abs(),
            ArithOp::Floor => a.floor(),
            ArithOp::Ceil => a.ceil(),
            ArithOp::Round => a.round(),
            _ => unreachable!(),
        }
    } else {
        let b = pop(stack)?.as_f64()?;
        let a = pop(stack)?.as_f64()?;
        match op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            ArithOp::Rem => a % b,
            ArithOp::Pow => a.powf(b),
            _ => unreachable!(),
        }
    };
    stack.push(Value::Float(result));
    Ok(())
}

fn exec_trig(op: &TrigOp, stack: &mut Vec<Value>) -> Result<(), SaeError> {
    let a = pop(stack)?.as_f64()?;
    let radians = a * TURN;
    let result = match op {
        TrigOp::Sin => radians.sin(),
        TrigOp::Cos => radians.cos(),
        TrigOp::Tan => radians.tan(),
        TrigOp::Asin => a.asin() / TURN,
        TrigOp::Acos => a.acos() / TURN,
        TrigOp::Atan => a.atan() / TURN,
    };
    stack.push(Value::Float(result));
    Ok(())
}

fn exec_cmp(op: &CmpOp, stack: &mut Vec<Value>) -> Result<(), SaeError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    let result = match op {
        CmpOp::Eq => values_numerically_equal(&a, &b)?,
        CmpOp::Ne => !values_numerically_equal(&a, &b)?,
        CmpOp::Lt => a.as_f64()? < b.as_f64()?,
        CmpOp::Le => a.as_f64()? <= b.as_f64()?,
        CmpOp::Gt => a.as_f64()? > b.as_f64()?,
        CmpOp::Ge => a.as_f64()? >= b.as_f64()?,
    };
    stack.push(Value::Bool(result));
    Ok(())
}

fn values_numerically_equal(a: &Value, b: &Value) -> Result<bool, SaeError> {
    if let (Ok(af), Ok(bf)) = (a.as_f64(), b.as_f64()) {
        Ok(af == bf)
    } else {
        Ok(a == b)
    }
}

fn exec_logic(op: &LogicOp, stack: &mut Vec<Value>) -> Result<(), SaeError> {
    let result = match op {
        LogicOp::Not => !pop(stack)?.as_bool()?,
        LogicOp::And => {
            let b = pop(stack)?.as_bool()?;
            let a = pop(stack)?.as_bool()?;
            a && b
        }
        LogicOp::Or => {
            let b = pop(stack)?.as_bool()?;
            let a = pop(stack)?.as_bool()?;
            a || b
        }
    };
    stack.push(Value::Bool(result));
    Ok(())
}

fn exec_poly(degree: u8, stack: &mut Vec<Value>) -> Result<(), SaeError> {
    let n_coeffs = degree as usize + 1;
    let coeffs = pop_n(stack, n_coeffs)?; // coeffs[0] = c0 (constant term), ascending degree
    let x = pop(stack)?.as_f64()?;
    let mut acc = 0.0;
    for c in coeffs.iter().rev() {
        acc = acc * x + c.as_f64()?;
    }
    stack.push(Value::Float(acc));
    Ok(())
}

fn exec_conv(op: &ConvOp, stack: &mut Vec<Value>) -> Result<(), SaeError> {
    let a = pop(stack)?.as_f64()?;
    let result = match op {
        ConvOp::HoursToSeconds => a * 3600.0,
        ConvOp::DaysToSeconds => a * 86400.0,
    };
    stack.push(Value::Float(result));
    Ok(())
}

fn exec_collection(op: &CollOp, stack: &mut Vec<Value>) -> Result<(), SaeError> {
    match op {
        CollOp::Pop => {
            let arr = pop(stack)?;
            let mut arr = match arr {
                Value::Array(a) => a,
                other => {
                    return Err(SaeError::InvalidTypeForOperator {
                        operator: "POP".to_owned(),
                        message: format!("expected array, got {other:?}"),
                    })
                }
            };
            let elem = arr.pop().ok_or_else(|| SaeError::InvalidTypeForOperator {
                operator: "POP".to_owned(),
                message: "array is empty".to_owned(),
            })?;
            stack.push(Value::Array(arr));
            stack.push(elem);
        }
        CollOp::Push => {
            let value = pop(stack)?;
            let arr = pop(stack)?;
            let mut arr = match arr {
                Value::Array(a) => a,
                other => {
                    return Err(SaeError::InvalidTypeForOperator {
                        operator: "PUSH".to_owned(),
                        message: format!("expected array, got {other:?}"),
                    })
                }
            };
            arr.push(value);
            stack.push(Value::Array(arr));
        }
        CollOp::Get => {
            let key = pop(stack)?.coerce(ValueType::Text)?;
            let key = match key {
                Value::Text(s) => s,
                _ => unreachable!(),
            };
            let map = pop(stack)?;
            let map = match map {
                Value::Map(m) => m,
                other => {
                    return Err(SaeError::InvalidTypeForOperator {
                        operator: "GET".to_owned(),
                        message: format!("expected map, got {other:?}"),
                    })
                }
            };
            let value = map.get(&key).cloned().unwrap_or(Value::Null);
            stack.push(value);
        }
        CollOp::Put => {
            let key = pop(stack)?.coerce(ValueType::Text)?;
            let key = match key {
                Value::Text(s) => s,
                _ => unreachable!(),
            };
            let value = pop(stack)?;
            let map = pop(stack)?;
            let mut map = match map {
                Value::Map(m) => m,
                other => {
                    return Err(SaeError::InvalidTypeForOperator {
                        operator: "PUT".to_owned(),
                        message: format!("expected map, got {other:?}"),
                    })
                }
            };
            map.insert(key, value);
            stack.push(Value::Map(map));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use splot_core::RtcSnapshot;

    fn ctx() -> Context {
        Context::new(
            Value::Float(0.0),
            Value::Float(0.0),
            0.0,
            RtcSnapshot {
                year: 2026,
                day_of_week: 0,
                day_of_month: 0,
                time_of_day: 0.0,
                month_of_year: 0,
                aligned_week_of_month: 0,
                week_of_month: 0,
                week_of_year: 0,
            },
        )
    }

    #[test]
    fn square_via_poly_exponent() {
        let program = vec![Opcode::PushNum(2.0), Opcode::Arith(ArithOp::Pow)];
        let out = run(&program, Value::Float(3.0), &ctx()).unwrap();
        assert_eq!(out.as_f64().unwrap(), 9.0);
    }

    #[test]
    fn empty_stack_yields_stop() {
        let program = vec![Opcode::Stack(StackOp::Drop)];
        let out = run(&program, Value::Float(1.0), &ctx()).unwrap();
        assert!(out.is_stop());
    }

    #[test]
    fn poly3_matches_horner_expansion() {
        // x=2, coefficients (deg3..deg0) 1 2 3 4 => x^3 + 2x^2 + 3x + 4 = 8+8+6+4=26
        let program = vec![
            Opcode::PushNum(2.0),
            Opcode::PushNum(1.0),
            Opcode::PushNum(2.0),
            Opcode::PushNum(3.0),
            Opcode::PushNum(4.0),
            Opcode::Poly(3),
        ];
        let out = run(&program, Value::Null, &ctx()).unwrap();
        assert_eq!(out.as_f64().unwrap(), 26.0);
    }

    #[test]
    fn pop_then_swap_drop_clears_leftover_array() {
        let program = vec![
            Opcode::Collection(CollOp::Pop),
            Opcode::Stack(StackOp::Swap),
            Opcode::Stack(StackOp::Drop),
        ];
        let input = Value::Array(vec![Value::Float(1.0), Value::Float(2.0)]);
        let out = run(&program, input, &ctx()).unwrap();
        assert_eq!(out.as_f64().unwrap(), 2.0);
    }

    #[test]
    fn if_else_endif_selects_branch() {
        // v >= 0.5 ? 1 : 0
        let program = vec![
            Opcode::PushVar(Var::V),
            Opcode::PushNum(0.5),
            Opcode::Cmp(CmpOp::Ge),
            Opcode::JumpIfFalse(5),
            Opcode::PushNum(1.0),
            Opcode::Jump(7),
            Opcode::PushNum(0.0),
        ];
        let mut c = ctx();
        c.v = Value::Float(1.0);
        let out = run(&program, Value::Null, &c).unwrap();
        assert_eq!(out.as_f64().unwrap(), 1.0);
        c.v = Value::Float(0.0);
        let out = run(&program, Value::Null, &c).unwrap();
        assert_eq!(out.as_f64().unwrap(), 0.0);
    }
}
