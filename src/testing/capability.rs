//! Capability detection and gating
//!
//! A scenario that needs a GPU or optional features the environment lacks
//! is skipped before its script runs.

use std::collections::BTreeSet;
use std::process::Stdio;

use serde::Serialize;
use tokio::process::Command as TokioCommand;

use super::executor::ExecutionConfiguration;
use crate::common::config::{EnvironmentConfig, GpuSetting};
use crate::common::{Error, Result};

/// Tools whose presence on PATH indicates a usable GPU
const GPU_PROBES: &[&str] = &["nvidia-smi", "rocm-smi"];

/// What the current environment can run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Capabilities {
    pub gpu: bool,
    pub features: BTreeSet<String>,
}

/// Outcome of the capability gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Open,
    Closed(String),
}

/// Detect capabilities from configuration and probes
pub async fn detect(env: &EnvironmentConfig) -> Result<Capabilities> {
    let gpu = match env.gpu {
        GpuSetting::Available => true,
        GpuSetting::Unavailable => false,
        GpuSetting::Auto => GPU_PROBES.iter().any(|tool| which::which(tool).is_ok()),
    };
    tracing::debug!(gpu, setting = ?env.gpu, "GPU capability");

    let mut features: BTreeSet<String> = env.features.iter().cloned().collect();

    if let Some(command) = &env.features_command {
        let probed = probe_features(command).await?;
        tracing::debug!(count = probed.len(), "Probed features");
        features.extend(probed);
    }

    Ok(Capabilities { gpu, features })
}

/// Run the feature probe command and split its stdout into feature names
async fn probe_features(command: &str) -> Result<Vec<String>> {
    let output = TokioCommand::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::CapabilityProbe(format!("'{}' failed to execute: {}", command, e)))?;

    if !output.status.success() {
        return Err(Error::CapabilityProbe(format!(
            "'{}' exited with code {:?}: {}",
            command,
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .map(str::to_string)
        .collect())
}

/// Decide whether a configured tutorial can run here
pub fn evaluate(config: &ExecutionConfiguration, caps: &Capabilities) -> Gate {
    let mut missing = Vec::new();

    if config.gpu() && !caps.gpu {
        missing.push("GPU".to_string());
    }

    missing.extend(
        config
            .requires_features()
            .iter()
            .filter(|f| !caps.features.contains(*f))
            .cloned(),
    );

    if missing.is_empty() {
        Gate::Open
    } else {
        Gate::Closed(format!("missing {}", missing.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(gpu: bool, features: &[&str]) -> ExecutionConfiguration {
        ExecutionConfiguration::builder(PathBuf::from("tutorial.py"))
            .gpu(gpu)
            .requires_features(features.iter().map(|f| f.to_string()).collect())
            .build()
    }

    fn caps(gpu: bool, features: &[&str]) -> Capabilities {
        Capabilities {
            gpu,
            features: features.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn test_gate_open_without_requirements() {
        assert_eq!(evaluate(&config(false, &[]), &caps(false, &[])), Gate::Open);
    }

    #[test]
    fn test_gate_closed_without_gpu() {
        let gate = evaluate(&config(true, &[]), &caps(false, &[]));
        assert_eq!(gate, Gate::Closed("missing GPU".to_string()));
    }

    #[test]
    fn test_gate_lists_missing_features() {
        let gate = evaluate(
            &config(true, &["LENNARD_JONES", "ELECTROSTATICS", "DPD"]),
            &caps(false, &["LENNARD_JONES"]),
        );
        assert_eq!(
            gate,
            Gate::Closed("missing GPU, ELECTROSTATICS, DPD".to_string())
        );
    }

    #[test]
    fn test_gate_open_with_everything_present() {
        let gate = evaluate(
            &config(true, &["LENNARD_JONES"]),
            &caps(true, &["LENNARD_JONES", "DPD"]),
        );
        assert_eq!(gate, Gate::Open);
    }

    #[tokio::test]
    async fn test_detect_from_static_config() {
        let env = EnvironmentConfig {
            gpu: GpuSetting::Unavailable,
            features: vec!["LENNARD_JONES".to_string()],
            features_command: None,
        };
        let detected = detect(&env).await.unwrap();
        assert!(!detected.gpu);
        assert!(detected.features.contains("LENNARD_JONES"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_detect_merges_probe_output() {
        let env = EnvironmentConfig {
            gpu: GpuSetting::Available,
            features: vec!["A".to_string()],
            features_command: Some("printf 'B C\\nD\\n'".to_string()),
        };
        let detected = detect(&env).await.unwrap();
        assert!(detected.gpu);
        let names: Vec<&str> = detected.features.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_probe_is_an_error() {
        let env = EnvironmentConfig {
            gpu: GpuSetting::Unavailable,
            features: Vec::new(),
            features_command: Some("exit 3".to_string()),
        };
        let err = detect(&env).await.unwrap_err();
        assert!(matches!(err, Error::CapabilityProbe(_)));
    }
}
