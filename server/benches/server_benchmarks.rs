//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Benchmarks for command dispatch and metrics recording

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use telbbs_credentials::MemoryCredentialStore;
use telbbs_server::{ProtocolHandler, ServerMetrics, SessionState};

fn handler() -> ProtocolHandler {
    ProtocolHandler::new(
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(ServerMetrics::new()),
    )
}

fn bench_dispatch(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let handler = &handler();
    let mut group = c.benchmark_group("dispatch");

    let cases = [
        ("unauthenticated", SessionState::Unauthenticated, "help"),
        ("prompt", SessionState::Unauthenticated, "login"),
        (
            "authenticated",
            SessionState::Authenticated {
                nickname: "alice".to_string(),
            },
            "help",
        ),
        (
            "unknown_command",
            SessionState::Authenticated {
                nickname: "alice".to_string(),
            },
            "dance",
        ),
    ];

    for (name, state, line) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), &line, |b, line| {
            b.to_async(&runtime).iter(|| {
                let mut state = state.clone();
                async move { black_box(handler.handle_line(&mut state, line).await) }
            });
        });
    }

    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let metrics = ServerMetrics::new();

    c.bench_function("metrics_line_received", |b| {
        b.iter(|| metrics.line_received());
    });

    c.bench_function("metrics_snapshot", |b| {
        b.iter(|| black_box(metrics.snapshot()));
    });
}

criterion_group!(benches, bench_dispatch, bench_metrics);
criterion_main!(benches);
