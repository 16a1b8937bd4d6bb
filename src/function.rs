//! PDF function evaluation (ISO 32000-1 §7.10): Types 0 (sampled), 2
//! (exponential interpolation), 3 (stitching), and 4 (PostScript
//! calculator), each a pure R^m -> R^n map.

use crate::dictionary::Dictionary;
use crate::error::{FunctionError, Result};
use crate::object::Object;

#[derive(Debug, Clone)]
pub enum Function {
    Sampled(Sampled),
    Exponential(Exponential),
    Stitching(Stitching),
    PostScript(PostScript),
}

#[derive(Debug, Clone)]
pub struct Sampled {
    domain: Vec<(f64, f64)>,
    range: Vec<(f64, f64)>,
    size: Vec<usize>,
    bits_per_sample: u32,
    encode: Vec<(f64, f64)>,
    decode: Vec<(f64, f64)>,
    samples: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Exponential {
    domain: Vec<(f64, f64)>,
    range: Option<Vec<(f64, f64)>>,
    c0: Vec<f64>,
    c1: Vec<f64>,
    n: f64,
}

#[derive(Debug, Clone)]
pub struct Stitching {
    domain: (f64, f64),
    range: Option<Vec<(f64, f64)>>,
    functions: Vec<Function>,
    bounds: Vec<f64>,
    encode: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct PostScript {
    domain: Vec<(f64, f64)>,
    range: Vec<(f64, f64)>,
    program: Vec<Token>,
}

#[derive(Debug, Clone)]
enum Token {
    Number(f64),
    Op(String),
    /// A `{ ... }` procedure block, indices into `PostScript::program`.
    Proc(Vec<Token>),
}

fn pairs(obj: &Object) -> Result<Vec<(f64, f64)>> {
    let arr = obj.as_array()?;
    if arr.len() % 2 != 0 {
        return Err(FunctionError::PostScriptSyntax("Domain/Range/Encode/Decode length must be even".into()).into());
    }
    let mut out = Vec::with_capacity(arr.len() / 2);
    for chunk in arr.chunks_exact(2) {
        out.push((chunk[0].as_f64()?, chunk[1].as_f64()?));
    }
    Ok(out)
}

fn clip(x: f64, (lo, hi): (f64, f64)) -> f64 {
    x.max(lo.min(hi)).min(lo.max(hi))
}

fn interpolate(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    if (x1 - x0).abs() < f64::EPSILON {
        y0
    } else {
        y0 + (x - x0) * (y1 - y0) / (x1 - x0)
    }
}

impl Function {
    /// Build a `Function` from a function dictionary (or a function
    /// stream, for Type 0/4). `resolve` dereferences indirect children
    /// (Type 3's `Functions` array may hold indirect references).
    pub fn parse(obj: &Object, resolve: &dyn Fn(&Object) -> Result<Object>) -> Result<Function> {
        let resolved = resolve(obj)?;
        let dict = match &resolved {
            Object::Dictionary(d) => d,
            Object::Stream(s) => &s.dict,
            _ => return Err(FunctionError::UnsupportedType(-1).into()),
        };
        let function_type = dict.get(b"FunctionType").and_then(|o| o.as_i64())?;
        let domain = dict
            .get(b"Domain")
            .ok()
            .map(pairs)
            .transpose()?
            .ok_or(FunctionError::MissingDomain)?;
        let range = dict.get(b"Range").ok().map(pairs).transpose()?;

        match function_type {
            0 => {
                let stream = resolved.as_stream()?;
                let size: Vec<usize> = stream
                    .dict
                    .get(b"Size")
                    .and_then(|o| o.as_array())
                    .map_err(|_| FunctionError::MissingSampledField("Size"))?
                    .iter()
                    .map(|o| o.as_i64().map(|v| v as usize))
                    .collect::<Result<_>>()?;
                let bits_per_sample = stream
                    .dict
                    .get(b"BitsPerSample")
                    .and_then(|o| o.as_i64())
                    .map_err(|_| FunctionError::MissingSampledField("BitsPerSample"))? as u32;
                let range = range.ok_or(FunctionError::MissingSampledField("Range"))?;
                let encode = stream
                    .dict
                    .get(b"Encode")
                    .ok()
                    .map(pairs)
                    .transpose()?
                    .unwrap_or_else(|| size.iter().map(|&s| (0.0, (s.max(1) - 1) as f64)).collect());
                let decode = stream
                    .dict
                    .get(b"Decode")
                    .ok()
                    .map(pairs)
                    .transpose()?
                    .unwrap_or_else(|| range.clone());
                let samples = stream.decompressed_content()?;
                Ok(Function::Sampled(Sampled { domain, range, size, bits_per_sample, encode, decode, samples }))
            }
            2 => {
                let c0 = dict
                    .get(b"C0")
                    .and_then(|o| o.as_array())
                    .map(|a| a.iter().map(|o| o.as_f64().unwrap_or(0.0)).collect())
                    .unwrap_or_else(|_| vec![0.0]);
                let c1 = dict
                    .get(b"C1")
                    .and_then(|o| o.as_array())
                    .map(|a| a.iter().map(|o| o.as_f64().unwrap_or(1.0)).collect())
                    .unwrap_or_else(|_| vec![1.0]);
                let n = dict.get(b"N").and_then(|o| o.as_f64())?;
                Ok(Function::Exponential(Exponential { domain, range, c0, c1, n }))
            }
            3 => {
                let functions_obj = dict.get(b"Functions")?.as_array()?;
                let functions = functions_obj.iter().map(|f| Function::parse(f, resolve)).collect::<Result<_>>()?;
                let bounds: Vec<f64> = dict
                    .get(b"Bounds")
                    .and_then(|o| o.as_array())
                    .map(|a| a.iter().map(|o| o.as_f64().unwrap_or(0.0)).collect())
                    .unwrap_or_default();
                let encode = dict
                    .get(b"Encode")
                    .ok()
                    .map(pairs)
                    .transpose()?
                    .ok_or(FunctionError::MissingEncode)?;
                if encode.len() != functions_obj.len() || bounds.len() + 1 != functions_obj.len() {
                    return Err(FunctionError::StitchingLengthMismatch.into());
                }
                Ok(Function::Stitching(Stitching { domain: domain[0], range, functions, bounds, encode }))
            }
            4 => {
                let stream = resolved.as_stream()?;
                let source = stream.decompressed_content()?;
                let text = String::from_utf8_lossy(&source);
                let program = tokenize(&text)?;
                let range = range.ok_or(FunctionError::MissingSampledField("Range"))?;
                Ok(Function::PostScript(PostScript { domain, range, program }))
            }
            other => Err(FunctionError::UnsupportedType(other).into()),
        }
    }

    pub fn domain(&self) -> &[(f64, f64)] {
        match self {
            Function::Sampled(f) => &f.domain,
            Function::Exponential(f) => &f.domain,
            Function::Stitching(f) => std::slice::from_ref(&f.domain),
            Function::PostScript(f) => &f.domain,
        }
    }

    /// Evaluate the function at `input`, clipping to `Domain` and (when
    /// present) `Range`.
    pub fn eval(&self, input: &[f64]) -> Result<Vec<f64>> {
        match self {
            Function::Sampled(f) => f.eval(input),
            Function::Exponential(f) => f.eval(input),
            Function::Stitching(f) => f.eval(input),
            Function::PostScript(f) => f.eval(input),
        }
    }
}

impl Sampled {
    fn eval(&self, input: &[f64]) -> Result<Vec<f64>> {
        if input.len() != self.domain.len() {
            return Err(FunctionError::ArityMismatch { expected: self.domain.len(), got: input.len() }.into());
        }
        let m = self.domain.len();
        let n = self.range.len();

        // Encode each input into a continuous sample-grid coordinate.
        let mut e = vec![0.0f64; m];
        for i in 0..m {
            let x = clip(input[i], self.domain[i]);
            let encoded = interpolate(x, self.domain[i].0, self.domain[i].1, self.encode[i].0, self.encode[i].1);
            e[i] = encoded.max(0.0).min((self.size[i].max(1) - 1) as f64);
        }

        // Multilinear interpolation over the 2^m corners of the grid cell
        // containing `e`.
        let mut out = vec![0.0f64; n];
        for corner in 0..(1usize << m) {
            let mut weight = 1.0f64;
            let mut index = vec![0usize; m];
            for i in 0..m {
                let floor = e[i].floor();
                let frac = e[i] - floor;
                let bit = (corner >> i) & 1;
                let size_i = self.size[i].max(1);
                let idx = if bit == 1 {
                    weight *= frac;
                    (floor as usize + 1).min(size_i - 1)
                } else {
                    weight *= 1.0 - frac;
                    floor as usize
                };
                index[i] = idx;
            }
            if weight == 0.0 {
                continue;
            }
            let sample_index = self.flatten_index(&index);
            for j in 0..n {
                let raw = self.read_sample(sample_index, j) as f64;
                let max_sample = ((1u64 << self.bits_per_sample.min(63)) - 1) as f64;
                let decoded = interpolate(raw, 0.0, max_sample, self.decode[j].0, self.decode[j].1);
                out[j] += weight * decoded;
            }
        }
        for (j, v) in out.iter_mut().enumerate() {
            *v = clip(*v, self.range[j]);
        }
        Ok(out)
    }

    fn flatten_index(&self, index: &[usize]) -> usize {
        let mut flat = 0usize;
        let mut stride = 1usize;
        for (i, &idx) in index.iter().enumerate() {
            flat += idx * stride;
            stride *= self.size[i].max(1);
        }
        flat
    }

    fn read_sample(&self, sample_index: usize, output: usize) -> u64 {
        let n = self.range.len();
        let bit_offset = (sample_index * n + output) as u64 * self.bits_per_sample as u64;
        let mut value = 0u64;
        for b in 0..self.bits_per_sample as u64 {
            let bit_pos = bit_offset + b;
            let byte = (bit_pos / 8) as usize;
            let shift = 7 - (bit_pos % 8);
            let bit = self.samples.get(byte).map(|&b| (b >> shift) & 1).unwrap_or(0);
            value = (value << 1) | bit as u64;
        }
        value
    }
}

impl Exponential {
    fn eval(&self, input: &[f64]) -> Result<Vec<f64>> {
        if input.len() != 1 {
            return Err(FunctionError::ArityMismatch { expected: 1, got: input.len() }.into());
        }
        let x = clip(input[0], self.domain[0]);
        let mut out: Vec<f64> =
            self.c0.iter().zip(self.c1.iter()).map(|(&c0, &c1)| c0 + x.powf(self.n) * (c1 - c0)).collect();
        if let Some(range) = &self.range {
            for (v, r) in out.iter_mut().zip(range.iter()) {
                *v = clip(*v, *r);
            }
        }
        Ok(out)
    }
}

impl Stitching {
    fn eval(&self, input: &[f64]) -> Result<Vec<f64>> {
        if input.len() != 1 {
            return Err(FunctionError::ArityMismatch { expected: 1, got: input.len() }.into());
        }
        let x = clip(input[0], self.domain);
        let k = self.bounds.iter().position(|&b| x < b).unwrap_or(self.functions.len() - 1);
        let low = if k == 0 { self.domain.0 } else { self.bounds[k - 1] };
        let high = if k == self.bounds.len() { self.domain.1 } else { self.bounds[k] };
        let encoded = interpolate(x, low, high, self.encode[k].0, self.encode[k].1);
        let mut out = self.functions[k].eval(&[encoded])?;
        if let Some(range) = &self.range {
            for (v, r) in out.iter_mut().zip(range.iter()) {
                *v = clip(*v, *r);
            }
        }
        Ok(out)
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens: Vec<Vec<Token>> = vec![Vec::new()];
    let mut seen_outer_braces = 0i32;
    for word in text.replace('{', " { ").replace('}', " } ").split_whitespace() {
        match word {
            "{" => {
                tokens.push(Vec::new());
                seen_outer_braces += 1;
            }
            "}" => {
                let block = tokens.pop().ok_or_else(|| FunctionError::PostScriptSyntax("unbalanced }".into()))?;
                seen_outer_braces -= 1;
                tokens
                    .last_mut()
                    .ok_or_else(|| FunctionError::PostScriptSyntax("unbalanced }".into()))?
                    .push(Token::Proc(block));
            }
            num if num.parse::<f64>().is_ok() => {
                tokens.last_mut().unwrap().push(Token::Number(num.parse().unwrap()));
            }
            op => {
                tokens.last_mut().unwrap().push(Token::Op(op.to_string()));
            }
        }
    }
    if seen_outer_braces != 0 || tokens.len() != 1 {
        return Err(FunctionError::PostScriptSyntax("unbalanced braces".into()).into());
    }
    let body = tokens.pop().unwrap();
    // The top-level program is itself wrapped in one `{ ... }` block per
    // ISO 32000-1 §7.10.5.
    match body.as_slice() {
        [Token::Proc(inner)] => Ok(inner.clone()),
        _ => Ok(body),
    }
}

impl PostScript {
    fn eval(&self, input: &[f64]) -> Result<Vec<f64>> {
        if input.len() != self.domain.len() {
            return Err(FunctionError::ArityMismatch { expected: self.domain.len(), got: input.len() }.into());
        }
        let mut stack: Vec<f64> = input.iter().zip(self.domain.iter()).map(|(&x, d)| clip(x, *d)).collect();
        run(&self.program, &mut stack)?;
        let n = self.range.len();
        if stack.len() < n {
            return Err(FunctionError::StackUnderflow.into());
        }
        let mut out = stack.split_off(stack.len() - n);
        for (v, r) in out.iter_mut().zip(self.range.iter()) {
            *v = clip(*v, *r);
        }
        Ok(out)
    }
}

fn pop(stack: &mut Vec<f64>) -> Result<f64> {
    stack.pop().ok_or_else(|| FunctionError::StackUnderflow.into())
}

fn run(program: &[Token], stack: &mut Vec<f64>) -> Result<()> {
    let mut i = 0;
    while i < program.len() {
        match &program[i] {
            Token::Number(n) => stack.push(*n),
            Token::Proc(_) => {
                // A bare procedure is only meaningful as an operand to
                // `if`/`ifelse`, handled by peeking ahead below.
            }
            Token::Op(op) => run_op(op, program, &mut i, stack)?,
        }
        i += 1;
    }
    Ok(())
}

fn run_op(op: &str, program: &[Token], i: &mut usize, stack: &mut Vec<f64>) -> Result<()> {
    match op {
        "add" => {
            let b = pop(stack)?;
            let a = pop(stack)?;
            stack.push(a + b);
        }
        "sub" => {
            let b = pop(stack)?;
            let a = pop(stack)?;
            stack.push(a - b);
        }
        "mul" => {
            let b = pop(stack)?;
            let a = pop(stack)?;
            stack.push(a * b);
        }
        "div" => {
            let b = pop(stack)?;
            let a = pop(stack)?;
            stack.push(a / b);
        }
        "idiv" => {
            let b = pop(stack)? as i64;
            let a = pop(stack)? as i64;
            stack.push((a / b) as f64);
        }
        "mod" => {
            let b = pop(stack)? as i64;
            let a = pop(stack)? as i64;
            stack.push((a % b) as f64);
        }
        "neg" => {
            let a = pop(stack)?;
            stack.push(-a);
        }
        "abs" => {
            let a = pop(stack)?;
            stack.push(a.abs());
        }
        "ceiling" => {
            let a = pop(stack)?;
            stack.push(a.ceil());
        }
        "floor" => {
            let a = pop(stack)?;
            stack.push(a.floor());
        }
        "round" => {
            let a = pop(stack)?;
            stack.push(a.round());
        }
        "truncate" => {
            let a = pop(stack)?;
            stack.push(a.trunc());
        }
        "sqrt" => {
            let a = pop(stack)?;
            stack.push(a.sqrt());
        }
        "sin" => {
            let a = pop(stack)?;
            stack.push(a.to_radians().sin());
        }
        "cos" => {
            let a = pop(stack)?;
            stack.push(a.to_radians().cos());
        }
        "atan" => {
            let den = pop(stack)?;
            let num = pop(stack)?;
            let mut deg = num.atan2(den).to_degrees();
            if deg < 0.0 {
                deg += 360.0;
            }
            stack.push(deg);
        }
        "exp" => {
            let exponent = pop(stack)?;
            let base = pop(stack)?;
            stack.push(base.powf(exponent));
        }
        "ln" => {
            let a = pop(stack)?;
            stack.push(a.ln());
        }
        "log" => {
            let a = pop(stack)?;
            stack.push(a.log10());
        }
        "eq" => bool_op(stack, |a, b| a == b)?,
        "ne" => bool_op(stack, |a, b| a != b)?,
        "gt" => bool_op(stack, |a, b| a > b)?,
        "ge" => bool_op(stack, |a, b| a >= b)?,
        "lt" => bool_op(stack, |a, b| a < b)?,
        "le" => bool_op(stack, |a, b| a <= b)?,
        "and" => int_op(stack, |a, b| a & b)?,
        "or" => int_op(stack, |a, b| a | b)?,
        "xor" => int_op(stack, |a, b| a ^ b)?,
        "not" => {
            let a = pop(stack)?;
            stack.push(if a == 0.0 { 1.0 } else { 0.0 });
        }
        "bitshift" => {
            let shift = pop(stack)? as i64;
            let a = pop(stack)? as i64;
            let shifted = if shift >= 0 { a << shift.min(63) } else { a >> (-shift).min(63) };
            stack.push(shifted as f64);
        }
        "true" => stack.push(1.0),
        "false" => stack.push(0.0),
        "pop" => {
            pop(stack)?;
        }
        "exch" => {
            let b = pop(stack)?;
            let a = pop(stack)?;
            stack.push(b);
            stack.push(a);
        }
        "dup" => {
            let a = *stack.last().ok_or(FunctionError::StackUnderflow)?;
            stack.push(a);
        }
        "copy" => {
            let n = pop(stack)? as usize;
            if n > stack.len() {
                return Err(FunctionError::StackUnderflow.into());
            }
            let start = stack.len() - n;
            let copied: Vec<f64> = stack[start..].to_vec();
            stack.extend(copied);
        }
        "index" => {
            let n = pop(stack)? as usize;
            let pos = stack.len().checked_sub(n + 1).ok_or(FunctionError::StackUnderflow)?;
            stack.push(stack[pos]);
        }
        "roll" => {
            let j = pop(stack)? as i64;
            let n = pop(stack)? as usize;
            if n > stack.len() {
                return Err(FunctionError::StackUnderflow.into());
            }
            let start = stack.len() - n;
            let slice = &mut stack[start..];
            let j = j.rem_euclid(n.max(1) as i64) as usize;
            slice.rotate_right(j);
        }
        "if" => {
            let proc = match program.get(*i - 1) {
                Some(Token::Proc(p)) => p.clone(),
                _ => return Err(FunctionError::PostScriptSyntax("if without procedure".into()).into()),
            };
            let cond = pop(stack)?;
            if cond != 0.0 {
                run(&proc, stack)?;
            }
        }
        "ifelse" => {
            let (proc2, proc1) = match (program.get(*i - 1), program.get(i.wrapping_sub(2))) {
                (Some(Token::Proc(p2)), Some(Token::Proc(p1))) => (p2.clone(), p1.clone()),
                _ => return Err(FunctionError::PostScriptSyntax("ifelse without two procedures".into()).into()),
            };
            let cond = pop(stack)?;
            if cond != 0.0 {
                run(&proc1, stack)?;
            } else {
                run(&proc2, stack)?;
            }
        }
        other => return Err(FunctionError::PostScriptSyntax(format!("unknown operator {other}")).into()),
    }
    Ok(())
}

fn bool_op(stack: &mut Vec<f64>, f: impl Fn(f64, f64) -> bool) -> Result<()> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    stack.push(if f(a, b) { 1.0 } else { 0.0 });
    Ok(())
}

fn int_op(stack: &mut Vec<f64>, f: impl Fn(i64, i64) -> i64) -> Result<()> {
    let b = pop(stack)? as i64;
    let a = pop(stack)? as i64;
    stack.push(f(a, b) as f64);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict_function(pairs: &[(&str, Object)]) -> Object {
        let mut d = Dictionary::new();
        for (k, v) in pairs {
            d.set(*k, v.clone());
        }
        Object::Dictionary(d)
    }

    fn identity(obj: &Object) -> Result<Object> {
        Ok(obj.clone())
    }

    #[test]
    fn exponential_linear() {
        let obj = dict_function(&[
            ("FunctionType", Object::integer(2)),
            ("Domain", Object::Array(vec![Object::integer(0), Object::integer(1)])),
            ("C0", Object::Array(vec![Object::Number(0.0, false)])),
            ("C1", Object::Array(vec![Object::Number(1.0, false)])),
            ("N", Object::Number(1.0, false)),
        ]);
        let f = Function::parse(&obj, &identity).unwrap();
        let y = f.eval(&[0.5]).unwrap();
        assert!((y[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn postscript_stack_ops() {
        let mut d = Dictionary::new();
        d.set("FunctionType", 4i64);
        d.set("Domain", Object::Array(vec![Object::integer(0), Object::integer(1)]));
        d.set("Range", Object::Array(vec![Object::integer(0), Object::integer(10)]));
        let program = b"{ 2 mul }".to_vec();
        let stream = crate::object::Stream::new(d, program);
        let obj = Object::Stream(stream);
        let f = Function::parse(&obj, &identity).unwrap();
        let y = f.eval(&[3.0]).unwrap();
        assert_eq!(y[0], 6.0);
    }

    #[test]
    fn postscript_ifelse() {
        let mut d = Dictionary::new();
        d.set("FunctionType", 4i64);
        d.set("Domain", Object::Array(vec![Object::integer(-10), Object::integer(10)]));
        d.set("Range", Object::Array(vec![Object::integer(0), Object::integer(1)]));
        let program = b"{ dup 0 lt { pop 0 } { pop 1 } ifelse }".to_vec();
        let stream = crate::object::Stream::new(d, program);
        let obj = Object::Stream(stream);
        let f = Function::parse(&obj, &identity).unwrap();
        assert_eq!(f.eval(&[-5.0]).unwrap()[0], 0.0);
        assert_eq!(f.eval(&[5.0]).unwrap()[0], 1.0);
    }
}
