// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event Sink Contract (spec §4, §6): typed events emitted by long-running
//! core operations for an external broadcaster. Delivery is best-effort —
//! a sink failure is logged, never propagated as a database error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// The lifecycle stage an [`LdmEvent`] reports (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
	Started,
	Progress,
	Completed,
	Failed,
	CellUpdated,
}

/// A single structured event emitted by an orchestrated operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdmEvent {
	pub kind: EventKind,
	pub operation_id: String,
	pub user_id: i64,
	pub tool: String,
	pub function: String,
	#[serde(default)]
	pub fields: BTreeMap<String, Json>,
}

impl LdmEvent {
	pub fn new(kind: EventKind, operation_id: impl Into<String>, user_id: i64, tool: impl Into<String>, function: impl Into<String>) -> Self {
		Self {
			kind,
			operation_id: operation_id.into(),
			user_id,
			tool: tool.into(),
			function: function.into(),
			fields: BTreeMap::new(),
		}
	}

	pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Json>) -> Self {
		self.fields.insert(key.into(), value.into());
		self
	}
}

/// Pluggable destination for [`LdmEvent`]s. Implementations are owned by the
/// caller (HTTP layer, progress broadcaster) — the core only ever publishes.
///
/// Event loss does not affect database correctness (spec §6): `publish`
/// returning `Err` is the sink's own failure to report and the orchestrator
/// does not roll back on account of it.
#[async_trait]
pub trait EventSink: Send + Sync {
	async fn publish(&self, event: LdmEvent);
}

/// Default [`EventSink`] that logs through `tracing`. Used by tests and any
/// caller that has not wired up a real broadcaster — mirrors the teacher's
/// tracing-backed sink variant.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
	async fn publish(&self, event: LdmEvent) {
		tracing::info!(
			kind = ?event.kind,
			operation_id = %event.operation_id,
			user_id = event.user_id,
			tool = %event.tool,
			function = %event.function,
			"ldm event"
		);
	}
}

/// An [`EventSink`] that silently discards everything, for tests that don't
/// care about event traffic at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
	async fn publish(&self, _event: LdmEvent) {}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn tracing_sink_accepts_every_kind() {
		let sink = TracingEventSink;
		for kind in [
			EventKind::Started,
			EventKind::Progress,
			EventKind::Completed,
			EventKind::Failed,
			EventKind::CellUpdated,
		] {
			sink
				.publish(LdmEvent::new(kind, "op-1", 7, "pretranslate", "run"))
				.await;
		}
	}
}
