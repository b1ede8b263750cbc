// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, HashMap};

use analysis_engine_model::{
    AssignmentTarget, BinaryOp, Closure, ClosureContract, ClosureExpression, ClosureStatement,
    UnaryOp,
};

use crate::{Error, Labels, RuntimeServices, Value};

/// A closure lifted into its own compiled callable. The callable is
/// immutable after construction; every run gets a fresh variable scope, so
/// one instance may run concurrently on disjoint inputs.
#[derive(Debug, Clone)]
pub struct CompiledClosure {
    contract: ClosureContract,
    closure: Closure,
}

impl CompiledClosure {
    pub fn new(contract: ClosureContract, closure: Closure) -> Result<CompiledClosure, Error> {
        let expected_params: &[usize] = match contract {
            ClosureContract::TagRewrite
            | ClosureContract::FilterPredicate
            | ClosureContract::Decorate
            | ClosureContract::PropertiesExtractor => &[1],
            ClosureContract::PerElement => &[2],
        };

        if !expected_params.contains(&closure.get_params().len()) {
            return Err(Error::ClosureContract(format!(
                "{:?} closures take {} parameter(s), found {}",
                contract,
                expected_params[0],
                closure.get_params().len()
            )));
        }

        Ok(Self { contract, closure })
    }

    pub fn get_contract(&self) -> ClosureContract {
        self.contract
    }

    pub fn get_closure(&self) -> &Closure {
        &self.closure
    }

    /// Run a tag-rewrite closure: the parameter is bound to the tag map and
    /// the (possibly mutated) map is the result, whether or not the body
    /// returned early.
    pub fn run_tag_rewrite(
        &self,
        services: &RuntimeServices,
        tags: &Labels,
    ) -> Result<Labels, Error> {
        debug_assert_eq!(ClosureContract::TagRewrite, self.contract);

        let param = self.closure.get_params()[0].clone();
        let mut interpreter = Interpreter::new(services);
        interpreter.bind(&param, Value::from_labels(tags));
        interpreter.run(self.closure.get_body())?;

        interpreter
            .read_var(&param)
            .and_then(|v| v.to_labels())
            .ok_or_else(|| {
                Error::ClosureContract("tag-rewrite closure replaced its tag map".into())
            })
    }

    /// Run a filter-predicate closure over a tag map.
    pub fn run_predicate(
        &self,
        services: &RuntimeServices,
        tags: &Labels,
    ) -> Result<bool, Error> {
        debug_assert_eq!(ClosureContract::FilterPredicate, self.contract);

        let param = self.closure.get_params()[0].clone();
        let mut interpreter = Interpreter::new(services);
        interpreter.bind(&param, Value::from_labels(tags));
        let result = interpreter.run(self.closure.get_body())?;

        Ok(result.is_truthy())
    }

    /// Run a per-element closure with one element of an array label and a
    /// mutable copy of the sample's labels; the mutated labels are returned.
    pub fn run_per_element(
        &self,
        services: &RuntimeServices,
        element: &str,
        tags: &Labels,
    ) -> Result<Labels, Error> {
        debug_assert_eq!(ClosureContract::PerElement, self.contract);

        let element_param = self.closure.get_params()[0].clone();
        let tags_param = self.closure.get_params()[1].clone();

        let mut interpreter = Interpreter::new(services);
        interpreter.bind(&element_param, Value::Str(element.into()));
        interpreter.bind(&tags_param, Value::from_labels(tags));
        interpreter.run(self.closure.get_body())?;

        interpreter
            .read_var(&tags_param)
            .and_then(|v| v.to_labels())
            .ok_or_else(|| {
                Error::ClosureContract("per-element closure replaced its tag map".into())
            })
    }

    /// Run a decorate closure against the bound meter entity. Writes back
    /// into the entity map.
    pub fn run_decorate(
        &self,
        services: &RuntimeServices,
        entity: &mut BTreeMap<String, Value>,
    ) -> Result<(), Error> {
        debug_assert_eq!(ClosureContract::Decorate, self.contract);

        let param = self.closure.get_params()[0].clone();
        let mut interpreter = Interpreter::new(services);
        interpreter.bind(&param, Value::Map(entity.clone()));
        interpreter.run(self.closure.get_body())?;

        match interpreter.read_var(&param) {
            Some(Value::Map(updated)) => {
                *entity = updated.clone();
                Ok(())
            }
            _ => Err(Error::ClosureContract(
                "decorate closure replaced its entity".into(),
            )),
        }
    }

    /// Run a properties-extractor closure over an arbitrary value, yielding
    /// the map it returns.
    pub fn run_properties_extractor(
        &self,
        services: &RuntimeServices,
        input: &Value,
    ) -> Result<BTreeMap<String, Value>, Error> {
        debug_assert_eq!(ClosureContract::PropertiesExtractor, self.contract);

        let param = self.closure.get_params()[0].clone();
        let mut interpreter = Interpreter::new(services);
        interpreter.bind(&param, input.clone());
        let result = interpreter.run(self.closure.get_body())?;

        match result {
            Value::Map(map) => Ok(map),
            other => Err(Error::ClosureContract(format!(
                "properties-extractor closure returned {other} instead of a map"
            ))),
        }
    }
}

enum Flow {
    Normal,
    Return(Option<Value>),
}

/// One run of a closure body. Variables live here; nothing escapes the run.
pub(crate) struct Interpreter<'a> {
    services: &'a RuntimeServices,
    vars: HashMap<Box<str>, Value>,
    last_value: Value,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(services: &'a RuntimeServices) -> Interpreter<'a> {
        Self {
            services,
            vars: HashMap::new(),
            last_value: Value::Null,
        }
    }

    pub(crate) fn bind(&mut self, name: &str, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub(crate) fn read_var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Execute a statement list and produce the result value: an explicit
    /// `return` value, or the value of the last expression statement.
    pub(crate) fn run(&mut self, body: &[ClosureStatement]) -> Result<Value, Error> {
        match self.run_block(body)? {
            Flow::Return(value) => Ok(value.unwrap_or(Value::Null)),
            Flow::Normal => Ok(std::mem::replace(&mut self.last_value, Value::Null)),
        }
    }

    fn run_block(&mut self, body: &[ClosureStatement]) -> Result<Flow, Error> {
        for statement in body {
            match statement {
                ClosureStatement::Declare { name, value, .. } => {
                    let value = self.eval(value)?;
                    self.vars.insert(name.clone(), value);
                }
                ClosureStatement::Assign { target, value, .. } => {
                    let value = self.eval(value)?;
                    self.assign(target, value)?;
                }
                ClosureStatement::Return { value, .. } => {
                    let value = match value {
                        Some(v) => Some(self.eval(v)?),
                        None => None,
                    };
                    return Ok(Flow::Return(value));
                }
                ClosureStatement::If {
                    branches,
                    else_body,
                    ..
                } => {
                    let mut taken = false;
                    for branch in branches {
                        if self.eval(branch.get_condition())?.is_truthy() {
                            if let Flow::Return(v) = self.run_block(branch.get_body())? {
                                return Ok(Flow::Return(v));
                            }
                            taken = true;
                            break;
                        }
                    }
                    if !taken
                        && let Flow::Return(v) = self.run_block(else_body)?
                    {
                        return Ok(Flow::Return(v));
                    }
                }
                ClosureStatement::Expression { value, .. } => {
                    self.last_value = self.eval(value)?;
                }
            }
        }

        Ok(Flow::Normal)
    }

    pub(crate) fn eval(&mut self, expression: &ClosureExpression) -> Result<Value, Error> {
        match expression {
            ClosureExpression::Null => Ok(Value::Null),
            ClosureExpression::Boolean(b) => Ok(Value::Boolean(*b)),
            ClosureExpression::Integer(i) => Ok(Value::Integer(*i)),
            ClosureExpression::Double(d) => Ok(Value::Double(*d)),
            ClosureExpression::Str(s) => Ok(Value::Str(s.to_string())),
            ClosureExpression::Identifier(name) => self
                .vars
                .get(name.as_ref())
                .cloned()
                .ok_or_else(|| Error::UnknownIdentifier(name.clone())),
            ClosureExpression::Property {
                receiver,
                name,
                null_safe,
            } => {
                // `Layer.X` and `K8sRetagType.X` are enum namespaces, not
                // runtime values.
                if let ClosureExpression::Identifier(recv_name) = receiver.as_ref()
                    && (recv_name.as_ref() == "Layer" || recv_name.as_ref() == "K8sRetagType")
                    && !self.vars.contains_key(recv_name.as_ref())
                {
                    return Ok(Value::Str(name.to_string()));
                }

                let receiver = self.eval(receiver)?;
                self.read_member(&receiver, name, *null_safe)
            }
            ClosureExpression::Index { receiver, key } => {
                let key = self.eval(key)?.to_string();
                let receiver = self.eval(receiver)?;
                self.read_member(&receiver, &key, false)
            }
            ClosureExpression::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Boolean(!operand.is_truthy())),
                    UnaryOp::Negate => match operand {
                        Value::Integer(i) => Ok(Value::Integer(-i)),
                        Value::Double(d) => Ok(Value::Double(-d)),
                        other => Err(Error::TypeMismatch(format!("cannot negate {other}"))),
                    },
                }
            }
            ClosureExpression::Binary { op, left, right } => self.eval_binary(*op, left, right),
            ClosureExpression::Ternary {
                condition,
                if_true,
                if_false,
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.eval(if_true)
                } else {
                    self.eval(if_false)
                }
            }
            ClosureExpression::MethodCall {
                receiver,
                method,
                args,
                null_safe,
            } => self.eval_method_call(receiver, method, args, *null_safe),
            ClosureExpression::StaticCall {
                type_name,
                method,
                args,
            } => self.eval_static_call(type_name, method, args),
        }
    }

    fn read_member(&self, receiver: &Value, name: &str, null_safe: bool) -> Result<Value, Error> {
        match receiver {
            Value::Null if null_safe => Ok(Value::Null),
            Value::Null => Err(Error::NullDereference(name.into())),
            Value::Map(entries) => Ok(entries.get(name).cloned().unwrap_or(Value::Null)),
            other => Err(Error::TypeMismatch(format!(
                "cannot read member '{name}' of {other}"
            ))),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &ClosureExpression,
        right: &ClosureExpression,
    ) -> Result<Value, Error> {
        // Short-circuit forms first.
        match op {
            BinaryOp::And => {
                let left = self.eval(left)?;
                if !left.is_truthy() {
                    return Ok(Value::Boolean(false));
                }
                let right = self.eval(right)?;
                return Ok(Value::Boolean(right.is_truthy()));
            }
            BinaryOp::Or => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    return Ok(Value::Boolean(true));
                }
                let right = self.eval(right)?;
                return Ok(Value::Boolean(right.is_truthy()));
            }
            _ => {}
        }

        let left = self.eval(left)?;
        let right = self.eval(right)?;

        match op {
            BinaryOp::Add => match (&left, &right) {
                (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a + b)),
                (Value::Str(_), _) | (_, Value::Str(_)) => {
                    Ok(Value::Str(format!("{left}{right}")))
                }
                _ => self.numeric_op(&left, &right, |a, b| a + b),
            },
            BinaryOp::Subtract => match (&left, &right) {
                (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a - b)),
                _ => self.numeric_op(&left, &right, |a, b| a - b),
            },
            BinaryOp::Multiply => match (&left, &right) {
                (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a * b)),
                _ => self.numeric_op(&left, &right, |a, b| a * b),
            },
            BinaryOp::Divide => {
                self.numeric_op(&left, &right, |a, b| if b == 0.0 { f64::NAN } else { a / b })
            }
            BinaryOp::Equal => Ok(Value::Boolean(values_equal(&left, &right))),
            BinaryOp::NotEqual => Ok(Value::Boolean(!values_equal(&left, &right))),
            BinaryOp::GreaterThan => compare(&left, &right).map(|o| Value::Boolean(o > 0)),
            BinaryOp::GreaterThanOrEqual => {
                compare(&left, &right).map(|o| Value::Boolean(o >= 0))
            }
            BinaryOp::LessThan => compare(&left, &right).map(|o| Value::Boolean(o < 0)),
            BinaryOp::LessThanOrEqual => compare(&left, &right).map(|o| Value::Boolean(o <= 0)),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn numeric_op(
        &self,
        left: &Value,
        right: &Value,
        op: impl Fn(f64, f64) -> f64,
    ) -> Result<Value, Error> {
        match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => Ok(Value::Double(op(a, b))),
            _ => Err(Error::TypeMismatch(format!(
                "cannot apply arithmetic to {left} and {right}"
            ))),
        }
    }

    fn eval_method_call(
        &mut self,
        receiver: &ClosureExpression,
        method: &str,
        args: &[ClosureExpression],
        null_safe: bool,
    ) -> Result<Value, Error> {
        // Mutating map methods resolve the receiver variable in place.
        if (method == "put" || method == "remove")
            && let ClosureExpression::Identifier(var) = receiver
        {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(self.eval(arg)?);
            }

            let Some(Value::Map(entries)) = self.vars.get_mut(var.as_ref()) else {
                return Err(Error::UnsupportedMethod(method.into()));
            };

            return match (method, evaluated.as_slice()) {
                ("put", [key, value]) => {
                    Ok(entries.insert(key.to_string(), value.clone()).unwrap_or(Value::Null))
                }
                ("remove", [key]) => {
                    Ok(entries.remove(&key.to_string()).unwrap_or(Value::Null))
                }
                _ => Err(Error::UnsupportedMethod(method.into())),
            };
        }

        let receiver = self.eval(receiver)?;
        if receiver == Value::Null {
            if null_safe {
                return Ok(Value::Null);
            }
            return Err(Error::NullDereference(method.into()));
        }

        let mut evaluated = Vec::with_capacity(args.len());
        for arg in args {
            evaluated.push(self.eval(arg)?);
        }

        call_value_method(&receiver, method, &evaluated)
    }

    fn eval_static_call(
        &mut self,
        type_name: &str,
        method: &str,
        args: &[ClosureExpression],
    ) -> Result<Value, Error> {
        let mut evaluated = Vec::with_capacity(args.len());
        for arg in args {
            evaluated.push(self.eval(arg)?.to_string());
        }

        if type_name != "ProcessRegistry" {
            return Err(Error::UnsupportedStaticCall(type_name.into(), method.into()));
        }

        let registry = self.services.get_process_registry();
        match (method, evaluated.as_slice()) {
            ("generateVirtualLocalProcess", [service, instance]) => Ok(Value::Str(
                registry.generate_virtual_local_process(service, instance),
            )),
            ("generateVirtualRemoteProcess", [service, instance, address]) => Ok(Value::Str(
                registry.generate_virtual_remote_process(service, instance, address),
            )),
            _ => Err(Error::UnsupportedStaticCall(type_name.into(), method.into())),
        }
    }

    fn assign(&mut self, target: &AssignmentTarget, value: Value) -> Result<(), Error> {
        match target {
            AssignmentTarget::Variable { name } => {
                self.vars.insert(name.clone(), value);
                Ok(())
            }
            AssignmentTarget::Index { receiver, key } => {
                let key = self.eval(key)?.to_string();
                self.assign_member(receiver, key, value)
            }
            AssignmentTarget::Property { receiver, name } => {
                self.assign_member(receiver, name.to_string(), value)
            }
        }
    }

    fn assign_member(
        &mut self,
        receiver: &ClosureExpression,
        key: String,
        value: Value,
    ) -> Result<(), Error> {
        let (root, mut segments) = self.path_segments(receiver)?;
        segments.push(key);

        let mut current = self
            .vars
            .get_mut(root.as_ref())
            .ok_or_else(|| Error::UnknownIdentifier(root.clone()))?;

        for segment in &segments[..segments.len() - 1] {
            let Value::Map(entries) = current else {
                return Err(Error::InvalidAssignment(format!(
                    "'{segment}' is not reachable through a map"
                )));
            };
            current = entries
                .get_mut(segment)
                .ok_or_else(|| Error::NullDereference(segment.clone()))?;
        }

        let Value::Map(entries) = current else {
            return Err(Error::InvalidAssignment(
                "assignment target is not a map".into(),
            ));
        };
        entries.insert(segments.pop().expect("at least one segment"), value);
        Ok(())
    }

    /// Flatten a variable-rooted access path into its root identifier and
    /// string segments, evaluating index keys along the way.
    fn path_segments(
        &mut self,
        expression: &ClosureExpression,
    ) -> Result<(Box<str>, Vec<String>), Error> {
        match expression {
            ClosureExpression::Identifier(name) => Ok((name.clone(), Vec::new())),
            ClosureExpression::Property { receiver, name, .. } => {
                let (root, mut segments) = self.path_segments(receiver)?;
                segments.push(name.to_string());
                Ok((root, segments))
            }
            ClosureExpression::Index { receiver, key } => {
                let key = self.eval(key)?.to_string();
                let (root, mut segments) = self.path_segments(receiver)?;
                segments.push(key);
                Ok((root, segments))
            }
            _ => Err(Error::InvalidAssignment(
                "assignment target must be a variable path".into(),
            )),
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Integer(a), Value::Integer(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        _ => {
            if (left.is_numeric() || right.is_numeric())
                && let (Some(a), Some(b)) = (left.as_number(), right.as_number())
            {
                return a == b;
            }
            left == right
        }
    }
}

fn compare(left: &Value, right: &Value) -> Result<i8, Error> {
    if left.is_numeric() || right.is_numeric() {
        if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
            return Ok(if a < b {
                -1
            } else if a > b {
                1
            } else {
                0
            });
        }
    }

    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return Ok(match a.cmp(b) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        });
    }

    Err(Error::TypeMismatch(format!(
        "cannot compare {left} with {right}"
    )))
}

fn call_value_method(receiver: &Value, method: &str, args: &[Value]) -> Result<Value, Error> {
    match receiver {
        Value::Str(s) => match (method, args) {
            ("length" | "size", []) => Ok(Value::Integer(s.len() as i64)),
            ("isEmpty", []) => Ok(Value::Boolean(s.is_empty())),
            ("contains", [needle]) => Ok(Value::Boolean(s.contains(&needle.to_string()))),
            ("startsWith", [prefix]) => Ok(Value::Boolean(s.starts_with(&prefix.to_string()))),
            ("endsWith", [suffix]) => Ok(Value::Boolean(s.ends_with(&suffix.to_string()))),
            ("toUpperCase", []) => Ok(Value::Str(s.to_uppercase())),
            ("toLowerCase", []) => Ok(Value::Str(s.to_lowercase())),
            ("trim", []) => Ok(Value::Str(s.trim().to_string())),
            ("replace", [from, to]) => {
                Ok(Value::Str(s.replace(&from.to_string(), &to.to_string())))
            }
            ("toString", []) => Ok(receiver.clone()),
            ("toInteger", []) => s
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| Error::TypeMismatch(format!("'{s}' is not an integer"))),
            ("toDouble", []) => s
                .trim()
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| Error::TypeMismatch(format!("'{s}' is not a number"))),
            _ => Err(Error::UnsupportedMethod(method.into())),
        },
        Value::Map(entries) => match (method, args) {
            ("containsKey", [key]) => {
                Ok(Value::Boolean(entries.contains_key(&key.to_string())))
            }
            ("get", [key]) => Ok(entries
                .get(&key.to_string())
                .cloned()
                .unwrap_or(Value::Null)),
            ("isEmpty", []) => Ok(Value::Boolean(entries.is_empty())),
            ("size", []) => Ok(Value::Integer(entries.len() as i64)),
            _ => Err(Error::UnsupportedMethod(method.into())),
        },
        Value::Integer(_) | Value::Double(_) => match (method, args) {
            ("toString", []) => Ok(Value::Str(receiver.to_string())),
            ("toInteger", []) => Ok(Value::Integer(receiver.as_number().unwrap_or(0.0) as i64)),
            ("toDouble", []) => Ok(Value::Double(receiver.as_number().unwrap_or(0.0))),
            _ => Err(Error::UnsupportedMethod(method.into())),
        },
        _ => Err(Error::UnsupportedMethod(method.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::test_support::labels;

    fn tag_rewrite(source: &str) -> CompiledClosure {
        let closure = parse(source);
        CompiledClosure::new(ClosureContract::TagRewrite, closure).unwrap()
    }

    fn predicate(source: &str) -> CompiledClosure {
        let closure = parse(source);
        CompiledClosure::new(ClosureContract::FilterPredicate, closure).unwrap()
    }

    fn parse(source: &str) -> Closure {
        analysis_engine_mal_parser::MalParser::parse_filter("test.yaml", source).unwrap()
    }

    #[test]
    fn test_tag_rewrite_inserts_and_removes() {
        let closure = tag_rewrite("{ tags -> tags['region'] = 'eu' ; tags.remove('junk') }");
        let services = RuntimeServices::new();

        let result = closure
            .run_tag_rewrite(&services, &labels(&[("junk", "x"), ("host", "a")]))
            .unwrap();

        assert_eq!(labels(&[("host", "a"), ("region", "eu")]), result);
    }

    #[test]
    fn test_pure_read_rewrite_is_identity() {
        let closure = tag_rewrite("{ tags -> def h = tags['host'] }");
        let services = RuntimeServices::new();
        let input = labels(&[("host", "a"), ("region", "eu")]);

        assert_eq!(input, closure.run_tag_rewrite(&services, &input).unwrap());
    }

    #[test]
    fn test_predicate_short_circuit_and_truthiness() {
        let services = RuntimeServices::new();

        let keep = predicate("{ tags -> tags['job'] == 'vm' }");
        assert!(keep.run_predicate(&services, &labels(&[("job", "vm")])).unwrap());
        assert!(!keep.run_predicate(&services, &labels(&[("job", "db")])).unwrap());

        // Missing key yields null, which is falsy on the left of &&, so the
        // right side must not be evaluated.
        let guarded = predicate("{ tags -> tags['missing'] && tags['missing'].length() > 3 }");
        assert!(!guarded.run_predicate(&services, &labels(&[("job", "vm")])).unwrap());
    }

    #[test]
    fn test_early_return_still_yields_tag_map() {
        let closure = tag_rewrite(
            "{ tags -> if (tags['skip'] == 'yes') { return } tags['seen'] = 'true' }",
        );
        let services = RuntimeServices::new();

        let skipped = closure
            .run_tag_rewrite(&services, &labels(&[("skip", "yes")]))
            .unwrap();
        assert_eq!(labels(&[("skip", "yes")]), skipped);

        let processed = closure
            .run_tag_rewrite(&services, &labels(&[("skip", "no")]))
            .unwrap();
        assert_eq!(labels(&[("skip", "no"), ("seen", "true")]), processed);
    }
}
