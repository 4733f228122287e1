//! Execution planner - groups resources into ordered chains

use crate::resource::{BoxedResource, Resource};

/// Resources that must be applied in order; a failure ends the chain
pub struct Chain {
    pub name: String,
    pub resources: Vec<BoxedResource>,
}

impl Chain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
        }
    }

    /// Append a resource after everything already in the chain
    pub fn then(mut self, resource: impl Resource + 'static) -> Self {
        self.resources.push(Box::new(resource));
        self
    }

    pub fn push(&mut self, resource: BoxedResource) {
        self.resources.push(resource);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// An execution plan: chains run one after another, in insertion order
#[derive(Default)]
pub struct ExecutionPlan {
    pub chains: Vec<Chain>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_chain(&mut self, chain: Chain) {
        if !chain.is_empty() {
            self.chains.push(chain);
        }
    }

    /// Add a resource as its own single-step chain
    pub fn add_resource(&mut self, resource: BoxedResource) {
        let name = resource.id();
        self.chains.push(Chain {
            name,
            resources: vec![resource],
        });
    }

    /// Filter plan to only include resources matching a predicate
    ///
    /// Chains left empty are dropped.
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn Resource) -> bool,
    {
        Self {
            chains: self
                .chains
                .into_iter()
                .map(|chain| Chain {
                    name: chain.name,
                    resources: chain
                        .resources
                        .into_iter()
                        .filter(|r| predicate(r.as_ref()))
                        .collect(),
                })
                .filter(|chain| !chain.is_empty())
                .collect(),
        }
    }

    /// Filter plan to only include resources matching a target pattern
    ///
    /// Target format: "type" or "type.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, name) = parse_target(t);
                self.filter(|r| matches_filter(r, resource_type.as_deref(), name.as_deref()))
            }
        }
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.chains.iter().map(Chain::len).sum()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.chains.iter().all(Chain::is_empty)
    }
}

/// Parse a target string like "type.name" into (type, name)
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        None => (Some(target.to_string()), None),
        Some((rt, name)) if !rt.is_empty() => (Some(rt.to_string()), Some(name.to_string())),
        Some(_) => (None, Some(target.to_string())),
    }
}

/// Check if a resource matches the filter criteria
fn matches_filter(resource: &dyn Resource, resource_type: Option<&str>, name: Option<&str>) -> bool {
    if let Some(rt) = resource_type {
        // Allow common aliases
        let matches_type = match rt {
            "connections" => resource.resource_type() == "connection",
            "search" => resource.resource_type().starts_with("search_"),
            "rai" => resource.resource_type().starts_with("rai_"),
            _ => resource.resource_type() == rt,
        };
        if !matches_type {
            return false;
        }
    }

    if let Some(n) = name
        && !resource.id().contains(n)
    {
        return false;
    }

    true
}
