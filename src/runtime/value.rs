// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runtime values and their built-in methods

use super::host::Journal;
use super::{Fault, GeneratorInstance};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
    List(Rc<Vec<Value>>),
    /// Stateful cursor; copies of the value share the position
    Iter(Rc<RefCell<Sequence>>),
    Exception(Rc<Exception>),
    Resource(Rc<Resource>),
}

/// Source behind an iterator value
pub enum Sequence {
    List { items: Rc<Vec<Value>>, position: usize },
    Range { next: i64, end: i64 },
    Generator(Box<GeneratorInstance>),
}

impl Sequence {
    pub fn has_next(&mut self) -> Result<bool, Fault> {
        match self {
            Sequence::List { items, position } => Ok(*position < items.len()),
            Sequence::Range { next, end } => Ok(next < end),
            Sequence::Generator(generator) => generator.has_next(),
        }
    }

    pub fn next_value(&mut self) -> Result<Value, Fault> {
        match self {
            Sequence::List { items, position } => match items.get(*position) {
                Some(item) => {
                    *position += 1;
                    Ok(item.clone())
                }
                None => Err(no_such_element()),
            },
            Sequence::Range { next, end } => {
                if next < end {
                    let value = *next;
                    *next += 1;
                    Ok(Value::Int(value))
                } else {
                    Err(no_such_element())
                }
            }
            Sequence::Generator(generator) => generator.next_value(),
        }
    }
}

fn no_such_element() -> Fault {
    Fault::Thrown(Value::exception(
        "NoSuchElementException",
        "iterator is exhausted",
    ))
}

/// A thrown object
#[derive(Debug)]
pub struct Exception {
    pub class: String,
    pub message: String,
    suppressed: RefCell<Vec<Value>>,
}

impl Exception {
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
            suppressed: RefCell::new(Vec::new()),
        }
    }

    pub fn add_suppressed(&self, failure: Value) {
        self.suppressed.borrow_mut().push(failure);
    }

    pub fn suppressed(&self) -> Vec<Value> {
        self.suppressed.borrow().clone()
    }

    /// There is no class hierarchy: `Throwable` and `Exception` match every
    /// exception, any other name matches its class exactly.
    pub fn is_instance_of(&self, type_name: &str) -> bool {
        matches!(type_name, "Throwable" | "Exception" | "Object") || type_name == self.class
    }
}

/// A closeable handle; closing is recorded in the host journal
#[derive(Debug)]
pub struct Resource {
    pub name: String,
    fail_on_close: bool,
    closed: Cell<bool>,
    journal: Journal,
}

impl Resource {
    pub fn new(name: impl Into<String>, fail_on_close: bool, journal: Journal) -> Self {
        Self {
            name: name.into(),
            fail_on_close,
            closed: Cell::new(false),
            journal,
        }
    }

    /// Close once; later calls do nothing
    pub fn close(&self) -> Result<(), Fault> {
        if self.closed.replace(true) {
            return Ok(());
        }
        self.journal.record(format!("close {}", self.name));
        if self.fail_on_close {
            return Err(Fault::Thrown(Value::exception(
                "IOException",
                format!("failed to close {}", self.name),
            )));
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

impl Value {
    pub fn str(text: &str) -> Value {
        Value::Str(Rc::from(text))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(items))
    }

    pub fn iter(sequence: Sequence) -> Value {
        Value::Iter(Rc::new(RefCell::new(sequence)))
    }

    pub fn exception(class: &str, message: impl Into<String>) -> Value {
        Value::Exception(Rc::new(Exception::new(class, message)))
    }

    /// Iterator value driving another generator
    pub fn generator(instance: GeneratorInstance) -> Value {
        Value::iter(Sequence::Generator(Box::new(instance)))
    }

    /// Parse a command-line argument: `null`, `true`, `false`, an integer,
    /// or else a string
    pub fn parse_arg(text: &str) -> Value {
        match text {
            "null" => Value::Null,
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => match text.parse::<i64>() {
                Ok(value) => Value::Int(value),
                Err(_) => Value::str(text),
            },
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "int",
            Value::Str(_) => "String",
            Value::List(_) => "List",
            Value::Iter(_) => "Iterator",
            Value::Exception(_) => "Exception",
            Value::Resource(_) => "Resource",
        }
    }

    pub fn as_int(&self) -> Result<i64, Fault> {
        match self {
            Value::Int(value) => Ok(*value),
            other => Err(Fault::Type(format!("expected int, found {}", other.kind_name()))),
        }
    }

    pub fn as_bool(&self) -> Result<bool, Fault> {
        match self {
            Value::Bool(value) => Ok(*value),
            other => Err(Fault::Type(format!(
                "expected boolean, found {}",
                other.kind_name()
            ))),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn call_method(&self, method: &str, args: &[Value]) -> Result<Value, Fault> {
        match (self, method) {
            (Value::Null, _) => Err(Fault::Thrown(Value::exception(
                "NullPointerException",
                format!("cannot invoke `{}` on null", method),
            ))),
            (_, "equals") => {
                expect_args(method, args, 1)?;
                Ok(Value::Bool(self == &args[0]))
            }
            (_, "toString") => {
                expect_args(method, args, 0)?;
                Ok(Value::str(&self.to_string()))
            }

            (Value::List(items), "iterator") => {
                expect_args(method, args, 0)?;
                Ok(Value::iter(Sequence::List {
                    items: Rc::clone(items),
                    position: 0,
                }))
            }
            (Value::List(items), "size") => {
                expect_args(method, args, 0)?;
                Ok(Value::Int(items.len() as i64))
            }
            (Value::List(items), "isEmpty") => {
                expect_args(method, args, 0)?;
                Ok(Value::Bool(items.is_empty()))
            }
            (Value::List(items), "get") => {
                expect_args(method, args, 1)?;
                let index = args[0].as_int()?;
                usize::try_from(index)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .ok_or_else(|| {
                        Fault::Thrown(Value::exception(
                            "IndexOutOfBoundsException",
                            format!("index {} out of bounds for length {}", index, items.len()),
                        ))
                    })
            }

            (Value::Iter(_), "iterator") => {
                expect_args(method, args, 0)?;
                Ok(self.clone())
            }
            (Value::Iter(sequence), "hasNext") => {
                expect_args(method, args, 0)?;
                let mut sequence = sequence.try_borrow_mut().map_err(|_| reentered())?;
                Ok(Value::Bool(sequence.has_next()?))
            }
            (Value::Iter(sequence), "next") => {
                expect_args(method, args, 0)?;
                let mut sequence = sequence.try_borrow_mut().map_err(|_| reentered())?;
                sequence.next_value()
            }

            (Value::Str(text), "length") => {
                expect_args(method, args, 0)?;
                Ok(Value::Int(text.chars().count() as i64))
            }
            (Value::Str(text), "isEmpty") => {
                expect_args(method, args, 0)?;
                Ok(Value::Bool(text.is_empty()))
            }

            (Value::Exception(exception), "getMessage") => {
                expect_args(method, args, 0)?;
                Ok(Value::str(&exception.message))
            }
            (Value::Exception(exception), "getSuppressed") => {
                expect_args(method, args, 0)?;
                Ok(Value::list(exception.suppressed()))
            }
            (Value::Exception(exception), "addSuppressed") => {
                expect_args(method, args, 1)?;
                exception.add_suppressed(args[0].clone());
                Ok(Value::Null)
            }

            (Value::Resource(resource), "close") => {
                expect_args(method, args, 0)?;
                resource.close()?;
                Ok(Value::Null)
            }
            (Value::Resource(resource), "getName") => {
                expect_args(method, args, 0)?;
                Ok(Value::str(&resource.name))
            }
            (Value::Resource(resource), "isClosed") => {
                expect_args(method, args, 0)?;
                Ok(Value::Bool(resource.is_closed()))
            }

            _ => Err(Fault::UnknownMethod {
                receiver: self.kind_name().to_string(),
                method: method.to_string(),
            }),
        }
    }
}

fn reentered() -> Fault {
    Fault::Internal("iterator re-entered while it is advancing".to_string())
}

pub(crate) fn expect_args(name: &str, args: &[Value], expected: usize) -> Result<(), Fault> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(Fault::Arity {
            name: name.to_string(),
            expected,
            found: args.len(),
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Iter(a), Value::Iter(b)) => Rc::ptr_eq(a, b),
            (Value::Exception(a), Value::Exception(b)) => Rc::ptr_eq(a, b),
            (Value::Resource(a), Value::Resource(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(value) => write!(f, "{}", value),
            Value::Int(value) => write!(f, "{}", value),
            Value::Str(text) => write!(f, "{}", text),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Iter(_) => write!(f, "<iterator>"),
            Value::Exception(exception) => write!(f, "{}: {}", exception.class, exception.message),
            Value::Resource(resource) => write!(f, "resource({})", resource.name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(text) => write!(f, "{:?}", text),
            other => write!(f, "{}", other),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::str(text)
    }
}
