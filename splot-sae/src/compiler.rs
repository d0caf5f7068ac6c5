//! Compiles tokenized SAE source into a linear opcode vector in a single
//! pass, resolving `IF`/`ELSE`/`ENDIF` via backpatched jump targets.

use crate::error::SaeError;
use crate::lexer::{tokenize, Token};
use crate::vm::{ArithOp, CmpOp, CollOp, ConvOp, LogicOp, Opcode, StackOp, TrigOp, Var};

enum Pending {
    If(usize),
    Else(usize),
}

/// Compile SAE source into a program ready for [`crate::vm::run`].
pub fn compile(source: &str) -> Result<Vec<Opcode>, SaeError> {
    let tokens = tokenize(source);
    let mut program = Vec::with_capacity(tokens.len());
    let mut control = Vec::new();

    for token in &tokens {
        compile_token(token, &mut program, &mut control)?;
    }

    match control.pop() {
        None => Ok(program),
        Some(_) => Err(SaeError::Compile {
            token: "<end>".to_owned(),
            position: tokens.len(),
        }),
    }
}

fn compile_token(
    token: &Token,
    program: &mut Vec<Opcode>,
    control: &mut Vec<Pending>,
) -> Result<(), SaeError> {
    let text = token.text.as_str();

    if let Ok(n) = text.parse::<f64>() {
        program.push(Opcode::PushNum(n));
        return Ok(());
    }
    if let Some(rest) = text.strip_prefix(':') {
        program.push(Opcode::PushText(rest.to_owned()));
        return Ok(());
    }

    let opcode = match text {
        "[]" => Opcode::BuildArray(0),
        "[1]" => Opcode::BuildArray(1),
        "[2]" => Opcode::BuildArray(2),
        "[3]" => Opcode::BuildArray(3),
        "[4]" => Opcode::BuildArray(4),
        "{}" => Opcode::BuildMap,

        "IF" => {
            control.push(Pending::If(program.len()));
            program.push(Opcode::JumpIfFalse(usize::MAX));
            return Ok(());
        }
        "ELSE" => {
            let if_idx = match control.pop() {
                Some(Pending::If(idx)) => idx,
                _ => {
                    return Err(SaeError::Compile {
                        token: text.to_owned(),
                        position: token.position,
                    })
                }
            };
            let else_idx = program.len();
            program.push(Opcode::Jump(usize::MAX));
            patch_jump_if_false(program, if_idx, else_idx + 1);
            control.push(Pending::Else(else_idx));
            return Ok(());
        }
        "ENDIF" => {
            match control.pop() {
                Some(Pending::Else(else_idx)) => patch_jump(program, else_idx, program.len()),
                Some(Pending::If(if_idx)) => patch_jump_if_false(program, if_idx, program.len()),
                None => {
                    return Err(SaeError::Compile {
                        token: text.to_owned(),
                        position: token.position,
                    })
                }
            }
            return Ok(());
        }

        "v" => Opcode::PushVar(Var::V),
        "v_l" => Opcode::PushVar(Var::VLast),
        "c" => Opcode::PushVar(Var::C),
        "rtc.y" => Opcode::PushVar(Var::RtcYear),
        "rtc.dow" => Opcode::PushVar(Var::RtcDayOfWeek),
        "rtc.dom" => Opcode::PushVar(Var::RtcDayOfMonth),
        "rtc.tod" => Opcode::PushVar(Var::RtcTimeOfDay),
        "rtc.moy" => Opcode::PushVar(Var::RtcMonthOfYear),
        "rtc.awm" => Opcode::PushVar(Var::RtcAlignedWeekOfMonth),
        "rtc.wom" => Opcode::PushVar(Var::RtcWeekOfMonth),
        "rtc.woy" => Opcode::PushVar(Var::RtcWeekOfYear),

        "DUP" => Opcode::Stack(StackOp::Dup),
        "DROP" => Opcode::Stack(StackOp::Drop),
        "SWAP" => Opcode::Stack(StackOp::Swap),
        "OVER" => Opcode::Stack(StackOp::Over),
        "ROT" => Opcode::Stack(StackOp::Rot),

        "+" => Opcode::Arith(ArithOp::Add),
        "-" => Opcode::Arith(ArithOp::Sub),
        "*" => Opcode::Arith(ArithOp::Mul),
        "/" => Opcode::Arith(ArithOp::Div),
        "%" => Opcode::Arith(ArithOp::Rem),
        "^" => Opcode::Arith(ArithOp::Pow),
        "NEG" => Opcode::Arith(ArithOp::Neg),
        "ABS" => Opcode::Arith(ArithOp::Abs),
        "FLOOR" => Opcode::Arith(ArithOp::Floor),
        "CEIL" => Opcode::Arith(ArithOp::Ceil),
        "ROUND" => Opcode::Arith(ArithOp::Round),

        "SIN" => Opcode::Trig(TrigOp::Sin),
        "COS" => Opcode::Trig(TrigOp::Cos),
        "TAN" => Opcode::Trig(TrigOp::Tan),
        "ASIN" => Opcode::Trig(TrigOp::Asin),
        "ACOS" => Opcode::Trig(TrigOp::Acos),
        "ATAN" => Opcode::Trig(TrigOp::Atan),

        "==" => Opcode::Cmp(CmpOp::Eq),
        "!=" => Opcode::Cmp(CmpOp::Ne),
        "<" => Opcode::Cmp(CmpOp::Lt),
        "<=" => Opcode::Cmp(CmpOp::Le),
        ">" => Opcode::Cmp(CmpOp::Gt),
        ">=" => Opcode::Cmp(CmpOp::Ge),

        "&&" => Opcode::Logic(LogicOp::And),
        "||" => Opcode::Logic(LogicOp::Or),
        "!" => Opcode::Logic(LogicOp::Not),

        "POLY2" => Opcode::Poly(2),
        "POLY3" => Opcode::Poly(3),

        "H>S" => Opcode::Conv(ConvOp::HoursToSeconds),
        "D>S" => Opcode::Conv(ConvOp::DaysToSeconds),

        "POP" => Opcode::Collection(CollOp::Pop),
        "PUSH" => Opcode::Collection(CollOp::Push),
        "GET" => Opcode::Collection(CollOp::Get),
        "PUT" => Opcode::Collection(CollOp::Put),

        "STOP" => Opcode::ClearStack,

        _ => {
            return Err(SaeError::Compile {
                token: text.to_owned(),
                position: token.position,
            })
        }
    };

    program.push(opcode);
    Ok(())
}

fn patch_jump_if_false(program: &mut [Opcode], idx: usize, target: usize) {
    program[idx] = Opcode::JumpIfFalse(target);
}

fn patch_jump(program: &mut [Opcode], idx: usize, target: usize) {
    program[idx] = Opcode::Jump(target);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::vm::run;
    use splot_core::{RtcSnapshot, Value};

    fn ctx(v: f64) -> Context {
        Context::new(
            Value::Float(v),
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
    fn compiles_simple_arithmetic() {
        let program = compile("2 ^").unwrap();
        let out = run(&program, Value::Float(3.0), &ctx(0.0)).unwrap();
        assert_eq!(out.as_f64().unwrap(), 9.0);
    }

    #[test]
    fn compiles_if_without_else() {
        let program = compile("v 0.5 >= IF 1 ENDIF").unwrap();
        let out = run(&program, Value::Null, &ctx(1.0)).unwrap();
        assert_eq!(out.as_f64().unwrap(), 1.0);

        let out = run(&program, Value::Null, &ctx(0.0)).unwrap();
        assert!(out.is_stop());
    }

    #[test]
    fn compiles_if_else_endif() {
        let program = compile("v 0.5 >= IF 1 ELSE 0 ENDIF").unwrap();
        assert_eq!(
            run(&program, Value::Null, &ctx(1.0)).unwrap().as_f64().unwrap(),
            1.0
        );
        assert_eq!(
            run(&program, Value::Null, &ctx(0.0)).unwrap().as_f64().unwrap(),
            0.0
        );
    }

    #[test]
    fn unknown_token_fails_with_position() {
        let err = compile("1 FROBNICATE").unwrap_err();
        match err {
            SaeError::Compile { token, position } => {
                assert_eq!(token, "FROBNICATE");
                assert_eq!(position, 1);
            }
            other => panic!("expected Compile error, got {other:?}"),
        }
    }

    #[test]
    fn unmatched_else_fails() {
        assert!(compile("1 ELSE").is_err());
    }

    #[test]
    fn unterminated_if_fails() {
        assert!(compile("v IF 1").is_err());
    }

    #[test]
    fn cct_transform_matches_mccamy_polynomial() {
        let program = compile(
            "POP 0.1858 - SWAP POP 0.3320 - SWAP DROP SWAP / -449 3525 -6823.3 5520.33 POLY3",
        )
        .unwrap();
        let input = Value::Array(vec![Value::Float(0.4), Value::Float(0.35)]);
        let out = run(&program, input, &ctx(0.0)).unwrap();
        let cct = out.as_f64().unwrap();

        let n = (0.4_f64 - 0.3320) / (0.35 - 0.1858);
        let expected = -449.0 * n.powi(3) + 3525.0 * n.powi(2) - 6823.3 * n + 5520.33;
        assert!((cct - expected).abs() < 1.0, "cct={cct} expected={expected}");
    }
}
