//! The fixed tool catalog: definitions, input schemas and dispatch onto the
//! coordination managers. Every failure crossing this boundary becomes the
//! structured error envelope, never a raw error.

use agent_coord_common::error::{CoordError, Result};
use agent_coord_common::keys::normalize_file_path;
use agent_coord_common::types::{AgentStatus, TaskStatus};
use agent_coord_coordination::Coordination;
use chrono::Utc;
use serde_json::{json, Value};

use crate::schema::{Field, InputSchema};

pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: InputSchema,
}

/// Named, schema-validated operations over the coordination core.
pub struct ToolRegistry {
    coordination: Coordination,
    defs: Vec<ToolDef>,
}

impl ToolRegistry {
    pub fn new(coordination: Coordination) -> Self {
        Self {
            coordination,
            defs: tool_definitions(),
        }
    }

    pub fn definitions(&self) -> &[ToolDef] {
        &self.defs
    }

    /// `tools/list` payload.
    pub fn tool_list(&self) -> Value {
        let tools: Vec<Value> = self
            .defs
            .iter()
            .map(|def| {
                json!({
                    "name": def.name,
                    "description": def.description,
                    "inputSchema": def.schema.to_json(),
                })
            })
            .collect();
        json!(tools)
    }

    /// Validate and dispatch one call. Business-rule and validation
    /// failures both surface as `Err`; `handle` converts them to the
    /// error envelope.
    pub async fn call(&self, name: &str, args: &Value) -> Result<Value> {
        let def = self
            .defs
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| CoordError::validation(format!("unknown tool: {name}")))?;
        def.schema.validate(args)?;

        let c = &self.coordination;
        match name {
            "agent_register" => {
                let info = c
                    .registry
                    .register(
                        req_str(args, "agentId")?,
                        str_vec(args, "capabilities"),
                        opt_string(args, "currentTask"),
                    )
                    .await?;
                Ok(json!({"success": true, "agent": info}))
            }
            "agent_update_status" => {
                let status = parse_agent_status(req_str(args, "status")?)?;
                let info = c
                    .registry
                    .update_status(
                        req_str(args, "agentId")?,
                        status,
                        opt_string(args, "currentTask"),
                        opt_u8(args, "progress"),
                    )
                    .await?;
                Ok(json!({"success": true, "agent": info}))
            }
            "agent_list_agents" => {
                let agents = c.registry.list_agents(opt_bool(args, "includeInactive")).await?;
                Ok(json!({"agents": agents, "count": agents.len()}))
            }
            "agent_get_status" => {
                let info = c.registry.get_status(req_str(args, "agentId")?).await?;
                Ok(json!({"found": info.is_some(), "agent": info}))
            }
            "agent_claim_task" => {
                let outcome = c
                    .tasks
                    .claim_task(
                        req_str(args, "taskId")?,
                        req_str(args, "agentId")?,
                        &str_vec(args, "files"),
                        opt_str(args, "description").unwrap_or(""),
                    )
                    .await?;
                Ok(json!({
                    "success": true,
                    "task": outcome.task,
                    "conflicts": outcome.conflicts,
                }))
            }
            "agent_release_task" => {
                let task = c
                    .tasks
                    .release_task(req_str(args, "taskId")?, req_str(args, "agentId")?)
                    .await?;
                Ok(json!({"success": true, "task": task}))
            }
            "agent_list_tasks" => {
                let status = parse_task_filter(opt_str(args, "status"))?;
                let list = c
                    .tasks
                    .list_tasks(status, opt_str(args, "agentId"))
                    .await?;
                Ok(json!({"tasks": list.tasks, "counts": list.counts}))
            }
            "agent_update_task_progress" => {
                let progress = req_u8(args, "progress")?;
                let task = c
                    .tasks
                    .update_task_progress(
                        req_str(args, "taskId")?,
                        req_str(args, "agentId")?,
                        progress,
                        opt_str(args, "message").unwrap_or(""),
                    )
                    .await?;
                Ok(json!({"success": true, "task": task}))
            }
            "agent_complete_task" => {
                let task = c
                    .tasks
                    .complete_task(req_str(args, "taskId")?, req_str(args, "agentId")?)
                    .await?;
                Ok(json!({"success": true, "task": task}))
            }
            "agent_lock_file" => {
                let lock = c
                    .locks
                    .lock_file(
                        req_str(args, "file")?,
                        req_str(args, "agentId")?,
                        opt_str(args, "reason").unwrap_or(""),
                        opt_u64(args, "ttl"),
                    )
                    .await?;
                Ok(json!({"success": true, "lock": lock}))
            }
            "agent_unlock_file" => {
                let outcome = c
                    .locks
                    .unlock_file(req_str(args, "file")?, req_str(args, "agentId")?)
                    .await?;
                Ok(json!({
                    "success": true,
                    "file": outcome.file,
                    "wasLocked": outcome.was_locked,
                }))
            }
            "agent_lock_files" => {
                let outcome = c
                    .locks
                    .lock_files(
                        &str_vec(args, "files"),
                        req_str(args, "agentId")?,
                        opt_str(args, "reason").unwrap_or(""),
                        opt_u64(args, "ttl"),
                    )
                    .await?;
                Ok(json!({
                    "success": outcome.failed.is_empty(),
                    "locked": outcome.locked,
                    "failed": outcome.failed,
                }))
            }
            "agent_unlock_files" => {
                let outcome = c
                    .locks
                    .unlock_files(&str_vec(args, "files"), req_str(args, "agentId")?)
                    .await?;
                Ok(json!({
                    "success": outcome.failed.is_empty(),
                    "unlocked": outcome.unlocked,
                    "failed": outcome.failed,
                }))
            }
            "agent_check_file_lock" => {
                let file = req_str(args, "file")?;
                let lock = c.locks.check_file_lock(file).await?;
                Ok(json!({
                    "file": normalize_file_path(file),
                    "locked": lock.is_some(),
                    "lock": lock,
                }))
            }
            "agent_list_locked_files" => {
                let locks = c.locks.list_locked_files(opt_str(args, "agentId")).await?;
                Ok(json!({"locks": locks, "count": locks.len()}))
            }
            "agent_detect_conflicts" => {
                let check = c
                    .conflicts
                    .detect_conflicts(req_str(args, "agentId")?, &str_vec(args, "files"))
                    .await?;
                Ok(serde_json::to_value(check)?)
            }
            "agent_check_file_overlap" => {
                let check = c
                    .conflicts
                    .check_file_overlap(req_str(args, "agentId")?, &str_vec(args, "files"))
                    .await?;
                Ok(serde_json::to_value(check)?)
            }
            "agent_suggest_coordination" => {
                let advice = c
                    .advisor
                    .suggest_coordination(
                        req_str(args, "agentId")?,
                        &str_vec(args, "capabilities"),
                        &str_vec(args, "preferredFiles"),
                    )
                    .await?;
                Ok(serde_json::to_value(advice)?)
            }
            "agent_get_workload_distribution" => {
                let distribution = c.advisor.get_workload_distribution().await?;
                Ok(serde_json::to_value(distribution)?)
            }
            "agent_find_available_work" => {
                let tasks = c
                    .advisor
                    .find_available_work(req_str(args, "agentId")?, &str_vec(args, "capabilities"))
                    .await?;
                Ok(json!({"tasks": tasks, "count": tasks.len()}))
            }
            _ => Err(CoordError::validation(format!("unknown tool: {name}"))),
        }
    }

    /// Like `call`, but errors come back as the structured envelope so
    /// nothing propagates across the RPC boundary.
    pub async fn handle(&self, name: &str, args: &Value) -> Value {
        match self.call(name, args).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "tool call failed");
                json!({
                    "error": e.to_string(),
                    "tool": name,
                    "timestamp": Utc::now().to_rfc3339(),
                })
            }
        }
    }
}

fn tool_definitions() -> Vec<ToolDef> {
    vec![
        // Agent registration
        ToolDef {
            name: "agent_register",
            description: "Register an agent with the coordination server",
            schema: InputSchema::new(vec![
                Field::string("agentId", "Unique agent identifier").required(),
                Field::string_array("capabilities", "Agent capabilities (free-text tags)"),
                Field::string("currentTask", "Current task ID (optional)"),
            ]),
        },
        ToolDef {
            name: "agent_update_status",
            description: "Update agent status (idle, working, blocked, completed)",
            schema: InputSchema::new(vec![
                Field::string("agentId", "Agent identifier").required(),
                Field::string("status", "Agent status")
                    .one_of(&["idle", "working", "blocked", "completed"])
                    .required(),
                Field::string("currentTask", "Current task ID (optional)"),
                Field::number("progress", "Task progress percentage (0-100)").range(0.0, 100.0),
            ]),
        },
        ToolDef {
            name: "agent_list_agents",
            description: "List all active agents and their status",
            schema: InputSchema::new(vec![Field::boolean(
                "includeInactive",
                "Include agents not seen in the last 5 minutes",
            )]),
        },
        ToolDef {
            name: "agent_get_status",
            description: "Get status of a specific agent",
            schema: InputSchema::new(vec![
                Field::string("agentId", "Agent identifier").required()
            ]),
        },
        // Task management
        ToolDef {
            name: "agent_claim_task",
            description: "Claim a task for exclusive work by an agent",
            schema: InputSchema::new(vec![
                Field::string("taskId", "Unique task identifier").required(),
                Field::string("agentId", "Agent identifier").required(),
                Field::string_array("files", "Files that will be modified"),
                Field::string("description", "Task description"),
            ]),
        },
        ToolDef {
            name: "agent_release_task",
            description: "Release a claimed task",
            schema: InputSchema::new(vec![
                Field::string("taskId", "Task identifier").required(),
                Field::string("agentId", "Agent identifier (must be the claimant)").required(),
            ]),
        },
        ToolDef {
            name: "agent_list_tasks",
            description: "List all tasks (available, claimed, completed)",
            schema: InputSchema::new(vec![
                Field::string("status", "Filter by task status")
                    .one_of(&["all", "available", "claimed", "completed"]),
                Field::string("agentId", "Filter tasks by agent (optional)"),
            ]),
        },
        ToolDef {
            name: "agent_update_task_progress",
            description: "Update task progress",
            schema: InputSchema::new(vec![
                Field::string("taskId", "Task identifier").required(),
                Field::string("agentId", "Agent identifier").required(),
                Field::number("progress", "Progress percentage (0-100)")
                    .range(0.0, 100.0)
                    .required(),
                Field::string("message", "Progress message (optional)"),
            ]),
        },
        ToolDef {
            name: "agent_complete_task",
            description: "Mark a task as complete",
            schema: InputSchema::new(vec![
                Field::string("taskId", "Task identifier").required(),
                Field::string("agentId", "Agent identifier").required(),
            ]),
        },
        // File locking
        ToolDef {
            name: "agent_lock_file",
            description: "Lock a file for exclusive editing",
            schema: InputSchema::new(vec![
                Field::string("file", "File path (relative to project root)").required(),
                Field::string("agentId", "Agent identifier").required(),
                Field::string("reason", "Reason for locking"),
                Field::number("ttl", "Lock TTL in seconds (default: 3600)").range(1.0, 86400.0),
            ]),
        },
        ToolDef {
            name: "agent_unlock_file",
            description: "Release a file lock",
            schema: InputSchema::new(vec![
                Field::string("file", "File path").required(),
                Field::string("agentId", "Agent identifier (must be the holder)").required(),
            ]),
        },
        ToolDef {
            name: "agent_lock_files",
            description: "Lock multiple files for exclusive editing (batch)",
            schema: InputSchema::new(vec![
                Field::string_array("files", "File paths (relative to project root)").required(),
                Field::string("agentId", "Agent identifier").required(),
                Field::string("reason", "Reason for locking"),
                Field::number("ttl", "Lock TTL in seconds (default: 3600)").range(1.0, 86400.0),
            ]),
        },
        ToolDef {
            name: "agent_unlock_files",
            description: "Release multiple file locks (batch)",
            schema: InputSchema::new(vec![
                Field::string_array("files", "File paths").required(),
                Field::string("agentId", "Agent identifier (must be the holder)").required(),
            ]),
        },
        ToolDef {
            name: "agent_check_file_lock",
            description: "Check if a file is locked",
            schema: InputSchema::new(vec![Field::string("file", "File path").required()]),
        },
        ToolDef {
            name: "agent_list_locked_files",
            description: "List all currently locked files",
            schema: InputSchema::new(vec![Field::string("agentId", "Filter by agent (optional)")]),
        },
        // Conflict detection
        ToolDef {
            name: "agent_detect_conflicts",
            description: "Detect potential conflicts with other agents",
            schema: InputSchema::new(vec![
                Field::string("agentId", "Agent identifier").required(),
                Field::string_array("files", "Files to check for conflicts").required(),
            ]),
        },
        ToolDef {
            name: "agent_check_file_overlap",
            description: "Check if files overlap with other agents' work",
            schema: InputSchema::new(vec![
                Field::string("agentId", "Agent identifier").required(),
                Field::string_array("files", "Files to check").required(),
            ]),
        },
        // Coordination advice
        ToolDef {
            name: "agent_suggest_coordination",
            description: "Get coordination suggestions for safe parallel work",
            schema: InputSchema::new(vec![
                Field::string("agentId", "Agent identifier").required(),
                Field::string_array("capabilities", "Agent capabilities"),
                Field::string_array("preferredFiles", "Preferred files to work on"),
            ]),
        },
        ToolDef {
            name: "agent_get_workload_distribution",
            description: "Get workload distribution across all agents",
            schema: InputSchema::new(Vec::new()),
        },
        ToolDef {
            name: "agent_find_available_work",
            description: "Find unclaimed tasks that match agent capabilities",
            schema: InputSchema::new(vec![
                Field::string("agentId", "Agent identifier").required(),
                Field::string_array("capabilities", "Agent capabilities"),
            ]),
        },
    ]
}

fn parse_agent_status(raw: &str) -> Result<AgentStatus> {
    match raw {
        "idle" => Ok(AgentStatus::Idle),
        "working" => Ok(AgentStatus::Working),
        "blocked" => Ok(AgentStatus::Blocked),
        "completed" => Ok(AgentStatus::Completed),
        other => Err(CoordError::validation(format!("invalid status: {other}"))),
    }
}

fn parse_task_filter(raw: Option<&str>) -> Result<Option<TaskStatus>> {
    match raw {
        None | Some("all") => Ok(None),
        Some("available") => Ok(Some(TaskStatus::Available)),
        Some("claimed") => Ok(Some(TaskStatus::Claimed)),
        Some("completed") => Ok(Some(TaskStatus::Completed)),
        Some(other) => Err(CoordError::validation(format!("invalid status: {other}"))),
    }
}

fn req_str<'a>(args: &'a Value, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| CoordError::validation(format!("missing required field: {name}")))
}

fn req_u8(args: &Value, name: &str) -> Result<u8> {
    args.get(name)
        .and_then(Value::as_f64)
        .map(|n| n.clamp(0.0, 100.0) as u8)
        .ok_or_else(|| CoordError::validation(format!("missing required field: {name}")))
}

fn opt_str<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}

fn opt_string(args: &Value, name: &str) -> Option<String> {
    opt_str(args, name).map(str::to_string)
}

fn opt_u8(args: &Value, name: &str) -> Option<u8> {
    args.get(name)
        .and_then(Value::as_f64)
        .map(|n| n.clamp(0.0, 100.0) as u8)
}

fn opt_u64(args: &Value, name: &str) -> Option<u64> {
    args.get(name).and_then(Value::as_f64).map(|n| n as u64)
}

fn opt_bool(args: &Value, name: &str) -> bool {
    args.get(name).and_then(Value::as_bool).unwrap_or(false)
}

fn str_vec(args: &Value, name: &str) -> Vec<String> {
    args.get(name)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
