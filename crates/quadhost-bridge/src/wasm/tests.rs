//! Tests for the guest runtime.

use super::*;
use crate::bridge::BridgeConfig;

#[test]
fn test_wasm_config_default() {
    let config = WasmConfig::default();
    assert_eq!(config.max_memory, 256 * 1024 * 1024);
    assert!(config.enable_simd);
    assert!(config.capabilities.stdout);
}

#[test]
fn test_wasm_config_minimal() {
    let config = WasmConfig::minimal();
    assert_eq!(config.max_memory, 64 * 1024 * 1024);
    assert!(config.fuel_limit.is_some());
    assert!(!config.capabilities.stdout);
}

#[test]
fn test_wasm_config_development() {
    let config = WasmConfig::development();
    assert_eq!(config.optimization_level, 0);
    assert!(config.capabilities.stdin);
}

#[test]
fn test_wasi_capabilities_none() {
    let caps = WasiCapabilities::none();
    assert!(!caps.stdin);
    assert!(!caps.stdout);
    assert!(!caps.stderr);
    assert_eq!(
        WasiCapabilities::console(),
        WasiCapabilities::none().stdout(true).stderr(true)
    );
}

#[test]
fn test_wasi_capabilities_builder() {
    let caps = WasiCapabilities::none().stdin(true).stdout(true).stderr(true);

    assert!(caps.stdin);
    assert!(caps.stdout);
    assert!(caps.stderr);
}

#[test]
fn test_wasi_capabilities_ignore_unknown_fields() {
    // older configs may still list directories or env vars; they are ignored
    let caps: WasiCapabilities =
        serde_json::from_str(r#"{ "stdout": true, "preopened_dirs_ro": ["/tmp"] }"#).unwrap();
    assert_eq!(caps, WasiCapabilities::none().stdout(true));
}

#[test]
fn test_wasm_config_builder_chain() {
    let config = WasmConfig::default()
        .max_memory(128 * 1024 * 1024)
        .fuel_limit(500_000_000)
        .simd(false)
        .optimize(3);

    assert_eq!(config.max_memory, 128 * 1024 * 1024);
    assert_eq!(config.fuel_limit, Some(500_000_000));
    assert!(!config.enable_simd);
    assert_eq!(config.optimization_level, 2);
}

#[test]
fn test_host_config_partial_json() {
    let json = r#"{
        "wasm": { "fuel_limit": 1000 },
        "bridge": { "initial_url": "https://example.com/play?level=3" }
    }"#;
    let config: HostConfig = serde_json::from_str(json).unwrap();

    assert_eq!(config.wasm.fuel_limit, Some(1000));
    assert_eq!(config.wasm.max_memory, 256 * 1024 * 1024);
    assert_eq!(config.bridge.initial_url, "https://example.com/play?level=3");
    assert!(!config.bridge.inverted_have_field);
}

#[test]
fn test_host_config_from_file() {
    let path = std::env::temp_dir().join(format!("quadhost-config-{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "bridge": { "inverted_have_field": true } }"#).unwrap();

    let config = HostConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert!(config.bridge.inverted_have_field);
    assert_eq!(config.bridge.initial_url, BridgeConfig::default().initial_url);
}

#[test]
fn test_host_config_bad_json() {
    let path = std::env::temp_dir().join(format!("quadhost-bad-{}.json", std::process::id()));
    std::fs::write(&path, "{ not json").unwrap();

    let err = HostConfig::from_file(&path).unwrap_err();
    std::fs::remove_file(&path).ok();

    assert!(matches!(err, crate::BridgeError::ConfigError(_)));
}

#[test]
fn test_host_creation() {
    let host = QuadHost::new(WasmConfig::default());
    assert!(host.is_ok());
}

#[test]
fn test_bridge_imports_are_unique() {
    let mut names: Vec<&str> = BRIDGE_IMPORTS.to_vec();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), BRIDGE_IMPORTS.len());
    assert_eq!(BRIDGE_IMPORTS.len(), 34);
}

#[test]
fn test_frame_stats_empty() {
    let stats = FrameStats::new();
    assert_eq!(stats.count(), 0);
    assert_eq!(stats.mean_us(), 0.0);
    assert_eq!(stats.p50_us(), 0);
    assert_eq!(stats.p99_us(), 0);
}

#[test]
fn test_frame_stats_samples() {
    let mut stats = FrameStats::new();
    stats.record(100);
    stats.record(200);
    stats.record(300);

    assert_eq!(stats.count(), 3);
    assert_eq!(stats.min_us(), 100);
    assert_eq!(stats.max_us(), 300);
    assert!((stats.mean_us() - 200.0).abs() < 0.001);
}

#[test]
fn test_frame_stats_percentiles() {
    let mut stats = FrameStats::new();
    for i in 1..=100 {
        stats.record(i);
    }

    assert_eq!(stats.count(), 100);
    // index 50 of the sorted samples
    assert_eq!(stats.p50_us(), 51);
    assert_eq!(stats.p99_us(), 100);
}

#[test]
fn test_frame_stats_summary() {
    let mut stats = FrameStats::new();
    stats.record(10);
    stats.record(20);

    let summary = stats.summary();
    assert!(summary.contains("n=2"));
    assert!(summary.contains("min=10us"));
    assert!(summary.contains("max=20us"));
}
