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

//! Host environment: free functions callable from generator bodies

use super::value::{expect_args, Resource, Sequence, Value};
use super::{Fault, GeneratorInstance};
use crate::builder::GeneratorClass;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub type NativeFn = Rc<dyn Fn(&Host, &[Value]) -> Result<Value, Fault>>;

/// Ordered record of observable side effects (`open`, `close`, `trace`)
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Rc<RefCell<Vec<String>>>,
}

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

#[derive(Clone)]
pub struct Host {
    functions: HashMap<String, NativeFn>,
    journal: Journal,
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Host")
            .field("functions", &names)
            .field("journal", &self.journal.len())
            .finish()
    }
}

impl Host {
    /// Host with the built-in functions installed
    pub fn new() -> Self {
        let mut host = Self::empty();
        host.install_builtins();
        host
    }

    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
            journal: Journal::default(),
        }
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        function: impl Fn(&Host, &[Value]) -> Result<Value, Fault> + 'static,
    ) {
        self.functions.insert(name.into(), Rc::new(function));
    }

    /// Make a lowered generator callable by its procedure name, so bodies
    /// can delegate to it with the emit-all marker
    pub fn register_generator(&mut self, class: Rc<GeneratorClass>) {
        let name = class.procedure.clone();
        self.register(name, move |host, args| {
            let instance = GeneratorInstance::new(Rc::clone(&class), args.to_vec(), host.clone())?;
            Ok(Value::generator(instance))
        });
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, Fault> {
        let function = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| Fault::UnknownFunction(name.to_string()))?;
        function(self, args)
    }

    fn install_builtins(&mut self) {
        self.register("list", |_, args| Ok(Value::list(args.to_vec())));

        self.register("range", |_, args| {
            expect_args("range", args, 2)?;
            Ok(Value::iter(Sequence::Range {
                next: args[0].as_int()?,
                end: args[1].as_int()?,
            }))
        });

        self.register("error", |_, args| match args {
            [message] => Ok(Value::exception("RuntimeException", message.to_string())),
            [class, message] => Ok(Value::exception(&class.to_string(), message.to_string())),
            _ => Err(Fault::Arity {
                name: "error".to_string(),
                expected: 1,
                found: args.len(),
            }),
        });

        self.register("resource", |host, args| open_resource(host, args, false));
        self.register("failingResource", |host, args| open_resource(host, args, true));

        self.register("trace", |host, args| {
            let line: Vec<String> = args.iter().map(Value::to_string).collect();
            host.journal.record(format!("trace {}", line.join(" ")));
            Ok(Value::Null)
        });

        self.register("print", |_, args| {
            let line: Vec<String> = args.iter().map(Value::to_string).collect();
            println!("{}", line.join(" "));
            Ok(Value::Null)
        });
    }
}

fn open_resource(host: &Host, args: &[Value], fail_on_close: bool) -> Result<Value, Fault> {
    expect_args("resource", args, 1)?;
    let name = args[0].to_string();
    host.journal.record(format!("open {}", name));
    Ok(Value::Resource(Rc::new(Resource::new(
        name,
        fail_on_close,
        host.journal.clone(),
    ))))
}
