//! JSONL request scripts.
//!
//! ```text
//! {"save_as": "client", "request": {"op": "open_account", "display_name": "Ada"}}
//! {"actor": "$client", "save_as": "p1", "request": {"op": "create_project", "project": {...}}}
//! {"actor": "$freelancer", "idempotency_key": "bid-1", "request": {"op": "place_bid", "project_id": "$p1", "terms": {...}}}
//! ```
//!
//! Lines that are blank or start with `#` are skipped.

use std::collections::HashMap;
use std::io::BufRead;

use anyhow::{anyhow, Context};
use bazaar_core::AccountId;
use bazaar_engine::{ApiResponse, Marketplace, Request};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

/// One script line.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptLine {
    #[serde(default)]
    actor: Option<String>,
    #[serde(default)]
    idempotency_key: Option<String>,
    #[serde(default)]
    save_as: Option<String>,
    request: Value,
}

/// Result of one executed line.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    /// 1-based line number in the script.
    pub line: usize,
    /// Operation name.
    pub op: String,
    /// Engine response.
    pub response: ApiResponse,
}

/// Runs script lines against a marketplace, tracking `$alias` bindings.
pub struct Replayer<'a> {
    market: &'a Marketplace,
    bindings: HashMap<String, String>,
}

impl<'a> Replayer<'a> {
    /// Creates a replayer; `$admin` is bound to the first administrator.
    pub fn new(market: &'a Marketplace) -> Self {
        let mut bindings = HashMap::new();
        if let Some(admin) = market.config().administrators.first() {
            bindings.insert("admin".to_string(), admin.to_string());
        }
        Self { market, bindings }
    }

    /// The ID saved under `alias`, if any.
    pub fn binding(&self, alias: &str) -> Option<&str> {
        self.bindings.get(alias).map(String::as_str)
    }

    /// Runs every line of `reader`.
    ///
    /// `on_outcome` sees each result as it is produced and returns whether
    /// to keep going.
    pub fn run<R, F>(&mut self, reader: R, mut on_outcome: F) -> anyhow::Result<Vec<Outcome>>
    where
        R: BufRead,
        F: FnMut(&Outcome) -> bool,
    {
        let mut outcomes = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let number = index + 1;
            let line = line.with_context(|| format!("failed to read line {number}"))?;
            let Some(outcome) = self.run_line(number, &line)? else {
                continue;
            };
            let keep_going = on_outcome(&outcome);
            outcomes.push(outcome);
            if !keep_going {
                break;
            }
        }
        Ok(outcomes)
    }

    /// Runs one line. Returns `None` for blank and comment lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is malformed or refers to an unknown
    /// alias. Engine failures are not errors; they are in the outcome.
    pub fn run_line(&mut self, number: usize, line: &str) -> anyhow::Result<Option<Outcome>> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }

        let mut script: ScriptLine = serde_json::from_str(trimmed)
            .with_context(|| format!("line {number}: malformed script line"))?;
        self.substitute(&mut script.request)
            .with_context(|| format!("line {number}"))?;

        let op = script
            .request
            .get("op")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let actor = match script.actor {
            Some(actor) => self
                .resolve(&actor)
                .and_then(|id| id.parse::<AccountId>().map_err(anyhow::Error::from))
                .with_context(|| format!("line {number}: bad actor"))?,
            None => AccountId::from_uuid(Uuid::nil()),
        };
        let request: Request = serde_json::from_value(script.request)
            .with_context(|| format!("line {number}: malformed {op} request"))?;

        debug!(line = number, op = %op, actor = %actor, "replaying request");
        let response = self
            .market
            .dispatch(actor, request, script.idempotency_key.as_deref());

        if let Some(alias) = script.save_as {
            self.save(number, alias, &response);
        }
        Ok(Some(Outcome {
            line: number,
            op,
            response,
        }))
    }

    fn save(&mut self, number: usize, alias: String, response: &ApiResponse) {
        if !response.success {
            return;
        }
        match response
            .data
            .as_ref()
            .and_then(|data| data.get("id"))
            .and_then(Value::as_str)
        {
            Some(id) => {
                self.bindings.insert(alias, id.to_string());
            }
            None => warn!(line = number, alias = %alias, "response has no id to save"),
        }
    }

    fn resolve(&self, text: &str) -> anyhow::Result<String> {
        match text.strip_prefix('$') {
            Some(alias) => self
                .bindings
                .get(alias)
                .cloned()
                .ok_or_else(|| anyhow!("unknown alias ${alias}")),
            None => Ok(text.to_string()),
        }
    }

    fn substitute(&self, value: &mut Value) -> anyhow::Result<()> {
        match value {
            Value::String(text) if text.starts_with('$') => {
                *text = self.resolve(text)?;
            }
            Value::Array(items) => {
                for item in items {
                    self.substitute(item)?;
                }
            }
            Value::Object(fields) => {
                for field in fields.values_mut() {
                    self.substitute(field)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}
