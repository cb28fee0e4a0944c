//! Tree-walking evaluator for parsed programs.

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use beacon_types::{ToolCall, ToolCallId, ToolResult};

use super::builtins::{self, loosely_equal, truthy};
use super::parser::{BinaryOp, Expr, Program, Stmt, UnaryOp};
use super::{ProgramError, ToolBridge};
use crate::types::ToolFailurePolicy;

/// Why evaluation stopped early.
enum Interrupt {
    /// A runtime error `try/catch` can handle.
    Raise(String),
    /// Ends the program regardless of `try`.
    Abort(ProgramError),
}

enum Flow {
    Next,
    Return(Value),
}

type Eval<T> = std::result::Result<T, Interrupt>;

pub(crate) struct Interpreter<'b> {
    bridge: &'b dyn ToolBridge,
    policy: ToolFailurePolicy,
    max_steps: u64,
    steps: u64,
    trace: Arc<Mutex<Vec<ToolResult>>>,
    scopes: Vec<HashMap<String, Value>>,
}

impl<'b> Interpreter<'b> {
    pub(crate) fn new(
        bridge: &'b dyn ToolBridge,
        policy: ToolFailurePolicy,
        max_steps: u64,
        trace: Arc<Mutex<Vec<ToolResult>>>,
    ) -> Self {
        Self {
            bridge,
            policy,
            max_steps,
            steps: 0,
            trace,
            scopes: Vec::new(),
        }
    }

    /// Run the program to its return value (`null` if it never returns).
    pub(crate) async fn run(mut self, program: &Program) -> Result<Value, ProgramError> {
        match self.exec_block(&program.statements, None).await {
            Ok(Flow::Return(value)) => Ok(value),
            Ok(Flow::Next) => Ok(Value::Null),
            Err(Interrupt::Raise(message)) => Err(ProgramError::Runtime(message)),
            Err(Interrupt::Abort(e)) => Err(e),
        }
    }

    fn tick(&mut self) -> Eval<()> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(Interrupt::Abort(ProgramError::StepLimit(self.max_steps)));
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────

    /// Run statements in a fresh scope, optionally seeded with one binding.
    fn exec_block<'a>(
        &'a mut self,
        statements: &'a [Stmt],
        binding: Option<(String, Value)>,
    ) -> BoxFuture<'a, Eval<Flow>> {
        async move {
            let mut scope = HashMap::new();
            if let Some((name, value)) = binding {
                scope.insert(name, value);
            }
            self.scopes.push(scope);
            let result = self.exec_statements(statements).await;
            self.scopes.pop();
            result
        }
        .boxed()
    }

    async fn exec_statements(&mut self, statements: &[Stmt]) -> Eval<Flow> {
        for statement in statements {
            self.tick()?;
            match statement {
                Stmt::Let { name, value } => {
                    let value = self.eval(value).await?;
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.insert(name.clone(), value);
                    }
                }
                Stmt::Assign { name, value } => {
                    let value = self.eval(value).await?;
                    match self
                        .scopes
                        .iter_mut()
                        .rev()
                        .find_map(|scope| scope.get_mut(name))
                    {
                        Some(slot) => *slot = value,
                        None => {
                            return Err(Interrupt::Raise(format!(
                                "assignment to undeclared variable '{}'",
                                name
                            )));
                        }
                    }
                }
                Stmt::Return(expr) => return Ok(Flow::Return(self.eval(expr).await?)),
                Stmt::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    let branch = if truthy(&self.eval(cond).await?) {
                        then
                    } else {
                        otherwise
                    };
                    if let Flow::Return(value) = self.exec_block(branch, None).await? {
                        return Ok(Flow::Return(value));
                    }
                }
                Stmt::For {
                    binding,
                    iterable,
                    body,
                } => {
                    let items = match self.eval(iterable).await? {
                        Value::Array(items) => items,
                        other => {
                            return Err(Interrupt::Raise(format!(
                                "cannot loop over {}",
                                builtins::kind(&other)
                            )));
                        }
                    };
                    for item in items {
                        let flow = self.exec_block(body, Some((binding.clone(), item))).await?;
                        if let Flow::Return(value) = flow {
                            return Ok(Flow::Return(value));
                        }
                    }
                }
                Stmt::Try {
                    body,
                    binding,
                    handler,
                } => {
                    let flow = match self.exec_block(body, None).await {
                        Err(Interrupt::Raise(message)) => {
                            self.exec_block(handler, Some((binding.clone(), Value::String(message))))
                                .await?
                        }
                        other => other?,
                    };
                    if let Flow::Return(value) = flow {
                        return Ok(Flow::Return(value));
                    }
                }
                Stmt::Expr(expr) => {
                    self.eval(expr).await?;
                }
            }
        }
        Ok(Flow::Next)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────

    fn eval<'a>(&'a mut self, expr: &'a Expr) -> BoxFuture<'a, Eval<Value>> {
        async move {
            self.tick()?;
            match expr {
                Expr::Literal(value) => Ok(value.clone()),
                Expr::Array(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        values.push(self.eval(item).await?);
                    }
                    Ok(Value::Array(values))
                }
                Expr::Object(fields) => {
                    let mut map = Map::new();
                    for (key, value) in fields {
                        let value = self.eval(value).await?;
                        map.insert(key.clone(), value);
                    }
                    Ok(Value::Object(map))
                }
                Expr::Var(name) => self
                    .scopes
                    .iter()
                    .rev()
                    .find_map(|scope| scope.get(name))
                    .cloned()
                    .ok_or_else(|| Interrupt::Raise(format!("undefined variable '{}'", name))),
                Expr::Field(target, field) => match self.eval(target).await? {
                    Value::Object(mut map) => Ok(map.remove(field).unwrap_or(Value::Null)),
                    other => Err(Interrupt::Raise(format!(
                        "cannot read field '{}' of {}",
                        field,
                        builtins::kind(&other)
                    ))),
                },
                Expr::Index(target, index) => {
                    let target = self.eval(target).await?;
                    let index = self.eval(index).await?;
                    index_value(target, &index).map_err(Interrupt::Raise)
                }
                Expr::Unary(op, operand) => {
                    let value = self.eval(operand).await?;
                    match op {
                        UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                        UnaryOp::Neg => match value.as_f64() {
                            Some(n) => builtins::number(-n).map_err(Interrupt::Raise),
                            None => Err(Interrupt::Raise(format!(
                                "cannot negate {}",
                                builtins::kind(&value)
                            ))),
                        },
                    }
                }
                Expr::Binary(BinaryOp::And, left, right) => {
                    let left = self.eval(left).await?;
                    if !truthy(&left) {
                        return Ok(left);
                    }
                    self.eval(right).await
                }
                Expr::Binary(BinaryOp::Or, left, right) => {
                    let left = self.eval(left).await?;
                    if truthy(&left) {
                        return Ok(left);
                    }
                    self.eval(right).await
                }
                Expr::Binary(op, left, right) => {
                    let left = self.eval(left).await?;
                    let right = self.eval(right).await?;
                    binary(*op, left, right).map_err(Interrupt::Raise)
                }
                Expr::Call { name, args } => self.eval_call(name, args).await,
            }
        }
        .boxed()
    }

    async fn eval_call(&mut self, name: &str, args: &[Expr]) -> Eval<Value> {
        match name {
            "call" => {
                let call = self.build_call(args).await?;
                self.call_tool(call).await
            }
            "parallel" => self.call_parallel(args).await,
            "error" => {
                let message = match args.first() {
                    Some(arg) => builtins::to_text(&self.eval(arg).await?),
                    None => "error() called".to_string(),
                };
                Err(Interrupt::Raise(message))
            }
            _ => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg).await?);
                }
                builtins::apply(name, values).map_err(Interrupt::Raise)
            }
        }
    }

    /// Evaluate the arguments of `call(name, params?)` into a [`ToolCall`].
    async fn build_call(&mut self, args: &[Expr]) -> Eval<ToolCall> {
        if args.is_empty() || args.len() > 2 {
            return Err(Interrupt::Raise(format!(
                "call() takes a tool name and optional parameters, got {} argument(s)",
                args.len()
            )));
        }
        let tool_name = match self.eval(&args[0]).await? {
            Value::String(name) => name,
            other => {
                return Err(Interrupt::Raise(format!(
                    "call() expects a tool name string, got {}",
                    builtins::kind(&other)
                )));
            }
        };
        let params = match args.get(1) {
            Some(expr) => match self.eval(expr).await? {
                params @ Value::Object(_) => params,
                other => {
                    return Err(Interrupt::Raise(format!(
                        "call() expects parameters as an object, got {}",
                        builtins::kind(&other)
                    )));
                }
            },
            None => Value::Object(Map::new()),
        };
        Ok(ToolCall::program(tool_name, params))
    }

    async fn call_tool(&mut self, call: ToolCall) -> Eval<Value> {
        let result = self.bridge.call(call).await.map_err(Interrupt::Abort)?;
        self.trace.lock().push(result.clone());
        self.tool_value(result)
    }

    /// Issue every `call(...)` argument concurrently and return their values
    /// in argument order.
    async fn call_parallel(&mut self, args: &[Expr]) -> Eval<Value> {
        let mut calls = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Expr::Call { name, args } if name == "call" => {
                    calls.push(self.build_call(args).await?);
                }
                _ => {
                    return Err(Interrupt::Raise(
                        "parallel() arguments must be call(...) expressions".to_string(),
                    ));
                }
            }
        }

        let bridge = self.bridge;
        let outcomes = join_all(calls.iter().cloned().map(|call| bridge.call(call))).await;

        let mut by_id: HashMap<ToolCallId, ToolResult> = HashMap::with_capacity(calls.len());
        let mut fatal = None;
        for outcome in outcomes {
            match outcome {
                Ok(result) => {
                    self.trace.lock().push(result.clone());
                    by_id.insert(result.call_id.clone(), result);
                }
                Err(e) => {
                    fatal.get_or_insert(e);
                }
            }
        }
        if let Some(e) = fatal {
            return Err(Interrupt::Abort(e));
        }

        let mut values = Vec::with_capacity(calls.len());
        for call in &calls {
            let result = by_id.remove(&call.id).ok_or_else(|| {
                Interrupt::Abort(ProgramError::Runtime(format!(
                    "no result for call {} to '{}'",
                    call.id, call.tool_name
                )))
            })?;
            values.push(self.tool_value(result)?);
        }
        Ok(Value::Array(values))
    }

    fn tool_value(&self, result: ToolResult) -> Eval<Value> {
        if result.is_success() {
            return Ok(result.value.unwrap_or(Value::Null));
        }
        let message = result.error.unwrap_or_else(|| "tool failed".to_string());
        match self.policy {
            ToolFailurePolicy::Abort => Err(Interrupt::Abort(ProgramError::ToolFailed {
                tool: result.tool_name,
                message,
            })),
            ToolFailurePolicy::Catch => Err(Interrupt::Raise(format!(
                "{} failed: {}",
                result.tool_name, message
            ))),
        }
    }
}

fn index_value(target: Value, index: &Value) -> Result<Value, String> {
    match (target, index) {
        (Value::Array(mut items), Value::Number(n)) => {
            let len = items.len() as i64;
            let i = n
                .as_i64()
                .ok_or_else(|| format!("array index must be an integer, got {}", n))?;
            let i = if i < 0 { len + i } else { i };
            if (0..len).contains(&i) {
                Ok(items.swap_remove(i as usize))
            } else {
                Ok(Value::Null)
            }
        }
        (Value::Object(mut map), Value::String(key)) => Ok(map.remove(key).unwrap_or(Value::Null)),
        (Value::String(s), Value::Number(n)) => Ok(n
            .as_u64()
            .and_then(|i| s.chars().nth(i as usize))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null)),
        (target, index) => Err(format!(
            "cannot index {} with {}",
            builtins::kind(&target),
            builtins::kind(index)
        )),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, String> {
    use std::cmp::Ordering;

    match op {
        BinaryOp::Eq => return Ok(Value::Bool(loosely_equal(&left, &right))),
        BinaryOp::NotEq => return Ok(Value::Bool(!loosely_equal(&left, &right))),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => a
                    .as_f64()
                    .zip(b.as_f64())
                    .and_then(|(a, b)| a.partial_cmp(&b)),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => None,
            }
            .ok_or_else(|| {
                format!(
                    "cannot compare {} with {}",
                    builtins::kind(&left),
                    builtins::kind(&right)
                )
            })?;
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::LtEq => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            return Ok(Value::Bool(result));
        }
        _ => {}
    }

    match (op, left, right) {
        (BinaryOp::Add, Value::String(a), b) => Ok(Value::String(a + &builtins::to_text(&b))),
        (BinaryOp::Add, a, Value::String(b)) => Ok(Value::String(builtins::to_text(&a) + &b)),
        (BinaryOp::Add, Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Ok(Value::Array(a))
        }
        (op, Value::Number(a), Value::Number(b)) => {
            let (a, b) = a
                .as_f64()
                .zip(b.as_f64())
                .ok_or_else(|| "invalid number".to_string())?;
            let n = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div if b == 0.0 => return Err("division by zero".to_string()),
                BinaryOp::Div => a / b,
                BinaryOp::Rem if b == 0.0 => return Err("modulo by zero".to_string()),
                BinaryOp::Rem => a % b,
                _ => return Err("unsupported operator".to_string()),
            };
            builtins::number(n)
        }
        (op, left, right) => Err(format!(
            "unsupported operands for {:?}: {} and {}",
            op,
            builtins::kind(&left),
            builtins::kind(&right)
        )),
    }
}
