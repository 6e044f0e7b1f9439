// Shared fixtures for integration tests
//
// Builds a small findings export with known monotone relationships:
// for artifact n in 1..=8
// - Code Quality / DEAD_CODE: n findings
// - Injection / SQLI: 2n findings
// - Crypto / WEAK_HASH: 9 - n findings
// - Weak_Config / MISSING_TLS: n % 3 + 1 findings
//
// Job 9 re-analyzes the content of job 1 with more failures and job 10 never
// finished an analysis; selection drops both.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const ARTIFACTS: u64 = 8;

fn findings(n: u64) -> Vec<Value> {
    let mut findings = Vec::new();
    let mut push = |category: &str, issue: &str, count: u64| {
        for _ in 0..count {
            findings.push(json!({ "category": category, "type": issue }));
        }
    };
    push("Code Quality", "DEAD_CODE", n);
    push("Injection", "SQLI", 2 * n);
    push("Crypto", "WEAK_HASH", 9 - n);
    push("Weak_Config", "MISSING_TLS", n % 3 + 1);
    findings
}

pub fn export() -> Value {
    let mut jobs: Vec<Value> = (1..=ARTIFACTS)
        .map(|n| {
            json!({
                "id": n,
                "sha256": format!("sha-{n}"),
                "finished_analyses": 4,
                "failed_analyses": 0,
                "finish_date": 1_700_000_000u64 + n,
                "findings": findings(n),
            })
        })
        .collect();
    jobs.push(json!({
        "id": 9,
        "sha256": "sha-1",
        "finished_analyses": 4,
        "failed_analyses": 3,
        "finish_date": 1_700_000_100u64,
    }));
    jobs.push(json!({
        "id": 10,
        "sha256": "sha-10",
        "finished_analyses": 0,
        "failed_analyses": 0,
    }));
    json!({ "jobs": jobs })
}

/// Write the fixture export into `dir` and return its path
pub fn write_export(dir: &Path) -> PathBuf {
    let path = dir.join("jobs.json");
    fs::write(&path, serde_json::to_string_pretty(&export()).unwrap()).unwrap();
    path
}
