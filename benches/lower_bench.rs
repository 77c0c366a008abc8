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

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use genlower::pipeline::{lower_procedure, lower_unit, parse_unit};
use genlower::runtime::{GeneratorInstance, Host, Value};
use genlower::LoweringConfig;
use std::rc::Rc;

const NESTED: &str = "
Iterator<Integer> nested(int n) {
    outer: for (int i = 0; i < n; i++) {
        try (Res r = resource(\"r\")) {
            for (int j = 0; j < n; j++) {
                if (j > i) continue outer;
                switch (j % 3) {
                    case 0: step(i * j); break;
                    case 1: stepAll(range(0, j));
                    default: step(-1);
                }
            }
        } catch (Exception e) {
            step(0);
        } finally {
            trace(i);
        }
    }
}
";

fn unit_source(procedures: usize) -> String {
    (0..procedures)
        .map(|i| NESTED.replace("nested(", &format!("nested{}(", i)))
        .collect()
}

fn bench_lowering(c: &mut Criterion) {
    let config = LoweringConfig::default();
    let unit = parse_unit(NESTED, "bench.java").expect("bench source parses");
    let procedure = &unit.procedures[0];

    c.bench_function("lower_procedure", |b| {
        b.iter(|| lower_procedure(black_box(procedure), &config))
    });

    let wide = parse_unit(&unit_source(64), "bench.java").expect("bench source parses");
    c.bench_function("lower_unit_64", |b| b.iter(|| lower_unit(black_box(&wide), &config)));
}

fn bench_runtime(c: &mut Criterion) {
    let config = LoweringConfig::default();
    let unit = parse_unit(NESTED, "bench.java").expect("bench source parses");
    let class = Rc::new(lower_procedure(&unit.procedures[0], &config).expect("bench source lowers"));

    c.bench_function("drain_nested_12", |b| {
        b.iter(|| {
            let generator = GeneratorInstance::new(Rc::clone(&class), vec![Value::Int(12)], Host::new())
                .expect("arity matches");
            generator.count()
        })
    });
}

criterion_group!(benches, bench_lowering, bench_runtime);
criterion_main!(benches);
