use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::error::{JudgeError, Result};
use crate::protocol::AdminRequest;
use crate::scheduler::{SchedulerContext, SchedulerSnapshot};

/// A validated admin subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    GetInfo { json: bool },
    SetMaxTasks(usize),
    SetMaxWorkers(usize),
}

impl AdminCommand {
    pub fn parse(subcommand: &str, argument: Option<&str>) -> Result<Self> {
        match subcommand {
            "GET_INFO" => match argument.map(str::to_ascii_lowercase).as_deref() {
                None | Some("") | Some("text") => Ok(AdminCommand::GetInfo { json: false }),
                Some("json") => Ok(AdminCommand::GetInfo { json: true }),
                Some(other) => Err(JudgeError::AdminValue(format!(
                    "unknown GET_INFO format {:?} (expected text or json)",
                    other
                ))),
            },
            "SET_MAX_TASKS" => {
                let value = parse_count("SET_MAX_TASKS", argument)?;
                if value < 1 {
                    return Err(JudgeError::AdminValue(
                        "MAX_TASKS must be >= 1".to_string(),
                    ));
                }
                Ok(AdminCommand::SetMaxTasks(value))
            }
            // SET_MAX_SLAVES is the name older clients send.
            "SET_MAX_SLAVES" | "SET_MAX_WORKERS" => {
                parse_count(subcommand, argument).map(AdminCommand::SetMaxWorkers)
            }
            "" => Err(JudgeError::AdminValue(
                "missing ADMIN subcommand".to_string(),
            )),
            other => Err(JudgeError::AdminValue(format!(
                "unknown ADMIN subcommand: {}",
                other
            ))),
        }
    }
}

fn parse_count(name: &str, argument: Option<&str>) -> Result<usize> {
    let raw = argument
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| JudgeError::AdminValue(format!("missing value for {}", name)))?;
    let value: i64 = raw.parse().map_err(|_| {
        JudgeError::AdminValue(format!(
            "invalid value for {}: {:?} (integer expected)",
            name, raw
        ))
    })?;
    usize::try_from(value)
        .map_err(|_| JudgeError::AdminValue(format!("value for {} must be >= 0", name)))
}

/// Reads and mutates runtime configuration on behalf of authorized callers.
#[derive(Debug, Clone)]
pub struct AdminConsole {
    context: Arc<SchedulerContext>,
}

impl AdminConsole {
    pub fn new(context: Arc<SchedulerContext>) -> Self {
        Self { context }
    }

    /// Handle one admin request and return its response text.
    pub fn handle(&self, request: &AdminRequest, peer: SocketAddr) -> String {
        match self.try_handle(request, peer) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(peer = %peer, subcommand = %request.subcommand, error = %e, "Admin request rejected");
                e.to_response()
            }
        }
    }

    fn try_handle(&self, request: &AdminRequest, peer: SocketAddr) -> Result<String> {
        self.authorize(request, peer.ip())?;
        let command = AdminCommand::parse(&request.subcommand, request.argument.as_deref())?;

        match command {
            AdminCommand::GetInfo { json } => {
                let snapshot = self.context.snapshot();
                if json {
                    serde_json::to_string_pretty(&snapshot)
                        .map(|text| text + "\n")
                        .map_err(|e| JudgeError::AdminValue(e.to_string()))
                } else {
                    Ok(render_info(&snapshot))
                }
            }
            AdminCommand::SetMaxTasks(value) => {
                self.context.set_max_tasks(value)?;
                tracing::info!(peer = %peer, max_tasks = value, "MAX_TASKS updated");
                Ok(format!("OK: MAX_TASKS is now {}.\n", value))
            }
            AdminCommand::SetMaxWorkers(value) => {
                self.context.set_max_workers(value);
                tracing::info!(peer = %peer, max_workers = value, "MAX_WORKERS updated");
                Ok(format!("OK: MAX_WORKERS is now {}.\n", value))
            }
        }
    }

    /// Loopback peers are always allowed; anyone else needs the configured
    /// secret, and an empty secret denies them outright.
    fn authorize(&self, request: &AdminRequest, ip: IpAddr) -> Result<()> {
        if is_loopback(ip) {
            return Ok(());
        }
        let secret = self.context.admin_secret();
        match &request.token {
            Some(token) if !secret.is_empty() && *token == secret => Ok(()),
            _ => Err(JudgeError::AdminUnauthorized(ip)),
        }
    }
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback()),
    }
}

fn render_info(snapshot: &SchedulerSnapshot) -> String {
    format!(
        "INFO:\n - running tasks: {}\n - MAX_TASKS: {}\n - MAX_WORKERS: {}\n - active workers: {}\n - pending workers: {}\n",
        snapshot.running_tasks,
        snapshot.max_tasks,
        snapshot.max_workers,
        snapshot.active_workers,
        snapshot.pending_workers,
    )
}
