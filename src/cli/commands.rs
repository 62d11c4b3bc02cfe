//! Command implementations.
//!
//! `serve` is the long-running mode: the engine evaluates candidate
//! batches arriving on stdin while the WebSocket server pushes governed
//! events to consumers. `check-config` and `evaluate` are one-shots.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::errors::{CliError, CliResult};
use crate::audit::{AuditLog, FileAuditLog};
use crate::config::EngineConfig;
use crate::disclosure::CandidateDisclosure;
use crate::engine::Engine;
use crate::observability::Logger;
use crate::realtime::{WebSocketConfig, WebSocketServer};
use crate::tier::Tier;

/// Parse one stdin line into a candidate batch. An array is a cycle, a
/// bare object a one-candidate cycle.
fn parse_batch(line: &str) -> CliResult<Vec<CandidateDisclosure>> {
    let value: Value = serde_json::from_str(line)?;
    let batch = match value {
        Value::Array(_) => serde_json::from_value(value)?,
        Value::Object(_) => vec![serde_json::from_value(value)?],
        other => {
            return Err(CliError::Runtime(format!(
                "expected a JSON array or object, got {other}"
            )))
        }
    };
    Ok(batch)
}

fn build_engine(config: EngineConfig) -> CliResult<Engine> {
    let audit: Arc<dyn AuditLog> = Arc::new(FileAuditLog::open(&config.audit_log_path)?);
    Ok(Engine::new(config, audit)?)
}

/// Validate a configuration file and report its effective settings.
pub fn check_config(config_path: &Path) -> CliResult<()> {
    let config = EngineConfig::load(config_path)?;
    let profile = config.profile()?;
    Logger::info(
        "config_ok",
        &[
            ("areas", &config.areas.len().to_string()),
            ("bind_addr", &config.bind_addr),
            ("profile", &profile.name),
            ("rate_cap_per_min", &config.rate_cap_per_min.to_string()),
        ],
    );
    Ok(())
}

/// Evaluate one candidate batch and print area views as JSON.
pub fn evaluate(config_path: &Path, candidates_path: Option<&PathBuf>) -> CliResult<()> {
    let config = EngineConfig::load(config_path)?;
    let engine = build_engine(config)?;

    let input = match candidates_path {
        Some(path) => std::fs::read_to_string(path)?,
        None => std::io::read_to_string(std::io::stdin())?,
    };
    let batch: Vec<CandidateDisclosure> = serde_json::from_str(input.trim())?;

    let now = Utc::now();
    let report = engine.run_cycle(batch, now)?;

    let output = json!({
        "report": {
            "evaluated": report.evaluated,
            "passed": report.passed,
            "blocked": report.blocked,
            "rejected": report.rejected,
            "superseded": report.superseded,
            "transitions": report.transitions,
        },
        "areas": engine.snapshots(Tier::Moderator)?,
        "silence": engine.silence_views()?,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Boot the engine, serve WebSocket consumers, and evaluate candidate
/// batches from stdin until EOF.
pub fn serve(config_path: &Path) -> CliResult<()> {
    let config = EngineConfig::load(config_path)?;
    let ws_config = WebSocketConfig {
        bind_addr: config.bind_addr.clone(),
        handshake_timeout_secs: config.handshake_timeout_secs,
        write_timeout_secs: config.write_timeout_secs,
    };
    let engine = Arc::new(build_engine(config)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    runtime.block_on(async {
        let server = Arc::new(WebSocketServer::new(
            ws_config,
            engine.dispatcher(),
        ));

        let server_task = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.run().await })
        };

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    let batch = match parse_batch(&line) {
                        Ok(batch) => batch,
                        Err(e) => {
                            Logger::error("bad_input_line", &[("error", &e.to_string())]);
                            continue;
                        }
                    };
                    // Evaluation is synchronous and short; keep it off the
                    // reader only if batches grow past a cycle's worth.
                    if let Err(e) = engine.run_cycle(batch, Utc::now()) {
                        Logger::error("cycle_failed", &[("error", &e.to_string())]);
                    }
                }
                Ok(None) => break,
                Err(e) => return Err(CliError::Io(e)),
            }
        }

        Logger::info("input_closed", &[]);
        server.shutdown();
        server_task
            .await
            .map_err(|e| CliError::Runtime(e.to_string()))??;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_batch_array() {
        let now = Utc::now();
        let line = serde_json::to_string(&vec![
            json!({
                "area_key": "10115",
                "size": 5,
                "source_count": 3,
                "volume_score": 1.5,
                "earliest_signal_time": now - chrono::Duration::hours(72),
                "latest_signal_time": now - chrono::Duration::hours(48),
                "summary_text": "road closures",
            }),
        ])
        .unwrap();
        let batch = parse_batch(&line).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].area_key, "10115");
    }

    #[test]
    fn test_parse_batch_single_object() {
        let now = Utc::now();
        let line = json!({
            "area_key": "10115",
            "size": 5,
            "source_count": 3,
            "volume_score": 1.5,
            "earliest_signal_time": now - chrono::Duration::hours(72),
            "latest_signal_time": now - chrono::Duration::hours(48),
            "summary_text": "road closures",
        })
        .to_string();
        let batch = parse_batch(&line).unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_parse_batch_rejects_scalars() {
        assert!(parse_batch("42").is_err());
        assert!(parse_batch("not json").is_err());
    }

    #[test]
    fn test_check_config_happy_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"areas": ["10115"]}"#).unwrap();
        check_config(&path).unwrap();
    }

    #[test]
    fn test_check_config_rejects_bad_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"areas": []}"#).unwrap();
        assert!(check_config(&path).is_err());
    }
}
