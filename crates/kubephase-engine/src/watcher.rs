use std::fmt;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::cluster::ReadinessWatcher;
use crate::error::WatchError;

/// A resource declared in a rendered manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub api_version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceRef {
    /// The `kubectl get` argument naming this resource, qualified with its API
    /// group so custom kinds resolve unambiguously.
    #[must_use]
    pub fn kubectl_target(&self) -> String {
        match self.api_version.split_once('/') {
            Some((group, version)) => {
                format!("{}.{version}.{group}/{}", self.kind, self.name)
            }
            None => format!("{}/{}", self.kind, self.name),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(formatter, "{}/{} in {namespace}", self.kind, self.name),
            None => write!(formatter, "{}/{}", self.kind, self.name),
        }
    }
}

fn string_field(object: &Value, pointer: &str) -> Option<String> {
    object
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn collect_resources(
    index: usize,
    document: &Value,
    out: &mut Vec<ResourceRef>,
) -> std::result::Result<(), WatchError> {
    if !document.is_object() {
        return Err(WatchError::NotAMapping { index });
    }
    let kind = string_field(document, "/kind").ok_or(WatchError::MissingField {
        index,
        field: "kind",
    })?;

    if kind == "List" {
        let items = document
            .get("items")
            .and_then(Value::as_array)
            .ok_or(WatchError::MissingField {
                index,
                field: "items",
            })?;
        for item in items {
            collect_resources(index, item, out)?;
        }
        return Ok(());
    }

    let name = string_field(document, "/metadata/name").ok_or(WatchError::MissingField {
        index,
        field: "metadata.name",
    })?;
    out.push(ResourceRef {
        api_version: string_field(document, "/apiVersion").unwrap_or_default(),
        kind,
        namespace: string_field(document, "/metadata/namespace"),
        name,
    });
    Ok(())
}

/// Extract every resource declared across the YAML documents of `content`.
///
/// Empty documents are skipped.
///
/// # Errors
///
/// Returns an error for invalid YAML, non-mapping documents, or documents
/// missing `kind` or `metadata.name`.
pub fn parse_resources(content: &str) -> std::result::Result<Vec<ResourceRef>, WatchError> {
    let mut resources = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
        let value =
            Value::deserialize(document).map_err(|source| WatchError::Yaml { index, source })?;
        if value.is_null() {
            continue;
        }
        collect_resources(index, &value, &mut resources)?;
    }
    Ok(resources)
}

fn count(object: &Value, pointer: &str) -> Option<u64> {
    object.pointer(pointer).and_then(Value::as_u64)
}

fn has_true_condition(object: &Value, condition: &str) -> bool {
    object
        .pointer("/status/conditions")
        .and_then(Value::as_array)
        .is_some_and(|conditions| {
            conditions.iter().any(|entry| {
                entry.get("type").and_then(Value::as_str) == Some(condition)
                    && entry.get("status").and_then(Value::as_str) == Some("True")
            })
        })
}

fn replicas_ready(object: &Value) -> bool {
    let desired = count(object, "/spec/replicas").unwrap_or(1);
    let generation = count(object, "/metadata/generation").unwrap_or(0);
    let observed = count(object, "/status/observedGeneration").unwrap_or(0);
    let ready = count(object, "/status/readyReplicas").unwrap_or(0);
    observed >= generation && ready >= desired
}

/// Decide from a fetched object whether a resource of `kind` is ready.
#[must_use]
pub fn resource_ready(kind: &str, object: &Value) -> bool {
    match kind {
        "Deployment" | "StatefulSet" | "ReplicaSet" => replicas_ready(object),
        "DaemonSet" => match (
            count(object, "/status/desiredNumberScheduled"),
            count(object, "/status/numberReady"),
        ) {
            (Some(desired), Some(ready)) => ready >= desired,
            (Some(0), None) => true,
            _ => false,
        },
        "Pod" => {
            has_true_condition(object, "Ready")
                || object.pointer("/status/phase").and_then(Value::as_str) == Some("Succeeded")
        }
        "Job" => count(object, "/status/succeeded").unwrap_or(0) >= 1,
        "Namespace" => object.pointer("/status/phase").and_then(Value::as_str) == Some("Active"),
        "CustomResourceDefinition" => has_true_condition(object, "Established"),
        "Service" => {
            if object.pointer("/spec/type").and_then(Value::as_str) == Some("LoadBalancer") {
                object
                    .pointer("/status/loadBalancer/ingress")
                    .and_then(Value::as_array)
                    .is_some_and(|ingress| !ingress.is_empty())
            } else {
                true
            }
        }
        _ => true,
    }
}

/// Bound a single `kubectl get` by the time left before `deadline`, rounded up
/// to whole seconds and never below one.
#[must_use]
pub fn request_timeout_arg(deadline: Instant, now: Instant) -> String {
    let remaining = deadline.saturating_duration_since(now);
    let mut secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs += 1;
    }
    format!("--request-timeout={}s", secs.max(1))
}

/// Readiness watcher that polls the cluster with `kubectl get`.
#[derive(Debug)]
pub struct KubectlWatcher {
    binary: String,
    poll_interval: Duration,
    pending: Vec<ResourceRef>,
}

impl KubectlWatcher {
    #[must_use]
    pub fn new(binary: String, poll_interval: Duration) -> Self {
        Self {
            binary,
            poll_interval,
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub fn pending(&self) -> &[ResourceRef] {
        &self.pending
    }

    fn is_ready(
        &self,
        resource: &ResourceRef,
        deadline: Option<Instant>,
    ) -> std::result::Result<bool, WatchError> {
        let mut command = Command::new(&self.binary);
        command.arg("get").arg(resource.kubectl_target());
        if let Some(namespace) = &resource.namespace {
            command.arg("-n").arg(namespace);
        }
        command.args(["-o", "json"]);
        if let Some(deadline) = deadline {
            command.arg(request_timeout_arg(deadline, Instant::now()));
        }
        let output = command
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|source| WatchError::CommandSpawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            debug!(resource = %resource, "not found yet");
            return Ok(false);
        }
        let Ok(object) = serde_json::from_slice::<Value>(&output.stdout) else {
            debug!(resource = %resource, "unreadable status");
            return Ok(false);
        };
        Ok(resource_ready(&resource.kind, &object))
    }
}

impl ReadinessWatcher for KubectlWatcher {
    fn scan(&mut self, rendered: &Path) -> std::result::Result<(), WatchError> {
        let content = fs::read_to_string(rendered).map_err(|source| WatchError::Read { source })?;
        let resources = parse_resources(&content)?;
        debug!(
            file = %rendered.display(),
            count = resources.len(),
            "registered resources"
        );
        self.pending.extend(resources);
        Ok(())
    }

    fn wait(&mut self, timeout: Duration) -> std::result::Result<bool, WatchError> {
        // Too large to represent as an instant: wait without a deadline.
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let mut still_pending = Vec::new();
            for resource in std::mem::take(&mut self.pending) {
                if self.is_ready(&resource, deadline)? {
                    info!("{resource} ready");
                } else {
                    still_pending.push(resource);
                }
            }
            self.pending = still_pending;

            if self.pending.is_empty() {
                return Ok(true);
            }
            let now = Instant::now();
            let Some(deadline) = deadline else {
                thread::sleep(self.poll_interval);
                continue;
            };
            if now >= deadline {
                for resource in &self.pending {
                    info!("{resource} not ready");
                }
                return Ok(false);
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }
}
