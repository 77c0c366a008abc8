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

#![allow(dead_code)]

use genlower::pipeline::{lower_procedure, parse_unit};
use genlower::runtime::{Fault, GeneratorInstance, Host, Value};
use genlower::{GeneratorClass, LoweringConfig};
use std::rc::Rc;

/// Lower the first procedure of `source`
pub fn lower(source: &str) -> GeneratorClass {
    let unit = parse_unit(source, "test.java").expect("source should parse");
    let procedure = unit.procedures.first().expect("source has a procedure");
    lower_procedure(procedure, &LoweringConfig::default()).expect("procedure should lower")
}

/// Lower every procedure of `source` and register each with a fresh host
pub fn host_for(source: &str) -> Host {
    let unit = parse_unit(source, "test.java").expect("source should parse");
    let mut host = Host::new();
    for procedure in &unit.procedures {
        let class = lower_procedure(procedure, &LoweringConfig::default()).expect("procedure should lower");
        host.register_generator(Rc::new(class));
    }
    host
}

pub fn instantiate(source: &str, args: Vec<Value>) -> GeneratorInstance {
    GeneratorInstance::new(Rc::new(lower(source)), args, Host::new()).expect("arguments should match")
}

pub fn run(source: &str, args: Vec<Value>) -> Result<Vec<Value>, Fault> {
    instantiate(source, args).collect()
}

pub fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Int).collect()
}
