//! Dependency resolution for registry components.
//!
//! [`DependencyResolver::resolve`] computes the transitive closure of a requested component:
//! every registry component it needs (one chosen version per name) and the merged set of
//! third-party package ranges.
//!
//! # Algorithm
//!
//! Breadth-first, one level at a time. Each pending request carries the path of ancestors
//! that led to it. For every level:
//!
//! 1. **Plan** (sequential, in traversal order): a request whose name is already on its own
//!    ancestor path is a cycle and fails immediately. A request for a name that is already
//!    resolved, or already scheduled earlier in this level, becomes an edge plus a conflict
//!    check. Everything else is scheduled for fetching.
//! 2. **Fetch** (concurrent): scheduled manifests are fetched through an order-preserving
//!    bounded stream, each wrapped in the [`RetryPolicy`]. Completion order does not matter.
//! 3. **Apply** (sequential, in traversal order): chosen versions, graph edges, conflict
//!    records and package merges are applied in the order the plan produced.
//!
//! All bookkeeping happens on the resolving task, so the only concurrency is inside step 2
//! and the outcome depends on declaration order alone.
//!
//! # Version Conflicts
//!
//! When a name is requested again with a different pinned version, the first resolved
//! version wins and a [`VersionConflict`] is recorded ([`ConflictPolicy::FirstResolved`]).
//! Under [`ConflictPolicy::Strict`] the conflict is fatal. Requests for `latest` accept
//! whatever version was chosen and never conflict.
//!
//! # Package Merging
//!
//! Package ranges requested by several components are intersected with
//! [`PackageRange::merge`]. Provably disjoint ranges fail with
//! [`CompkitError::IncompatiblePackageVersions`].

mod graph;

pub use graph::ResolutionGraph;

use futures::{StreamExt, stream};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::constants::default_max_parallel;
use crate::core::{CompkitError, Result};
use crate::models::{ComponentManifest, ComponentRef};
use crate::registry::{RegistrySource, RetryPolicy};
use crate::version::PackageRange;

/// What to do when one component is requested at two different versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Keep the version resolved first in traversal order and record a warning.
    #[default]
    FirstResolved,
    /// Fail with [`CompkitError::VersionConflict`].
    Strict,
}

/// A version request that lost to an earlier resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConflict {
    /// Component name
    pub name: String,
    /// Version that was kept
    pub chosen: String,
    /// Version that was requested later
    pub requested: String,
    /// Component that made the later request
    pub requested_by: String,
}

/// One component in the resolution tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionNode {
    /// The chosen reference
    pub reference: ComponentRef,
    /// Its manifest
    pub manifest: Arc<ComponentManifest>,
    /// Direct dependencies, in declaration order
    pub children: Vec<ResolutionNode>,
    /// Distance from the root (root is 0)
    pub depth: usize,
}

impl ResolutionNode {
    /// Number of nodes in this subtree, shared dependencies counted once per path.
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Self::size).sum::<usize>()
    }
}

/// Everything needed to install a component.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionResult {
    /// Tree rooted at the requested component
    pub root: ResolutionNode,
    /// Chosen reference for every component, by name
    pub flattened_components: BTreeMap<String, ComponentRef>,
    /// Merged third-party package ranges, by package name
    pub npm_packages: BTreeMap<String, String>,
    /// Conflicting requests resolved by the first-resolved policy, in traversal order
    pub conflicts: Vec<VersionConflict>,
    manifests: BTreeMap<String, Arc<ComponentManifest>>,
    install_order: Vec<ComponentRef>,
}

impl ResolutionResult {
    /// Manifest of the chosen version of `name`.
    #[must_use]
    pub fn manifest(&self, name: &str) -> Option<&ComponentManifest> {
        self.manifests.get(name).map(AsRef::as_ref)
    }

    /// Components with dependencies before dependents.
    #[must_use]
    pub fn install_order(&self) -> &[ComponentRef] {
        &self.install_order
    }

    /// Manifests in install order.
    pub fn manifests(&self) -> impl Iterator<Item = &ComponentManifest> {
        self.install_order.iter().filter_map(|r| self.manifest(&r.name))
    }
}

/// A component request waiting to be resolved.
#[derive(Debug, Clone)]
struct Pending {
    request: ComponentRef,
    /// Names from the root down to the requester
    ancestors: Vec<String>,
}

impl Pending {
    fn requested_by(&self) -> Option<&str> {
        self.ancestors.last().map(String::as_str)
    }
}

/// What the plan phase decided for one pending request.
enum Step {
    /// Apply the fetch result at this index.
    Fetched(usize),
    /// The name is (or will be, earlier in this level) resolved already.
    Duplicate(Pending),
}

/// Packages merged so far: current range plus every component that asked.
#[derive(Debug, Default)]
struct PackageBook {
    entries: BTreeMap<String, (PackageRange, Vec<(String, PackageRange)>)>,
}

impl PackageBook {
    fn add(&mut self, package: &str, raw: &str, component: &str) -> Result<()> {
        let range = PackageRange::parse(raw);
        if !self.entries.contains_key(package) {
            self.entries.insert(
                package.to_string(),
                (range.clone(), vec![(component.to_string(), range)]),
            );
            return Ok(());
        }
        let Some((current, requesters)) = self.entries.get_mut(package) else {
            return Ok(());
        };

        match current.merge(&range) {
            Some(merged) => {
                if merged != *current {
                    debug!("Narrowed {package} from {current} to {merged} for {component}");
                }
                *current = merged;
                requesters.push((component.to_string(), range));
                Ok(())
            }
            None => {
                let (first_component, first_range) = requesters
                    .iter()
                    .find(|(_, earlier)| earlier.merge(&range).is_none())
                    .or_else(|| requesters.first())
                    .map(|(c, r)| (c.clone(), r.to_string()))
                    .unwrap_or_default();
                Err(CompkitError::IncompatiblePackageVersions {
                    package: package.to_string(),
                    first_component,
                    first_range,
                    second_component: component.to_string(),
                    second_range: range.to_string(),
                })
            }
        }
    }

    fn into_map(self) -> BTreeMap<String, String> {
        self.entries.into_iter().map(|(name, (range, _))| (name, range.to_string())).collect()
    }
}

/// Resolves component requests against a registry.
pub struct DependencyResolver {
    registry: Arc<dyn RegistrySource>,
    retry: RetryPolicy,
    max_parallel: usize,
    policy: ConflictPolicy,
}

impl DependencyResolver {
    /// Create a resolver with the default retry policy, parallelism and conflict policy.
    pub fn new(registry: Arc<dyn RegistrySource>) -> Self {
        Self {
            registry,
            retry: RetryPolicy::default(),
            max_parallel: default_max_parallel(),
            policy: ConflictPolicy::default(),
        }
    }

    /// Use `retry` for every fetch.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Limit concurrent fetches per level.
    #[must_use]
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Use `policy` for version conflicts.
    #[must_use]
    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn fetch(&self, request: &ComponentRef) -> Result<ComponentManifest> {
        let label = request.to_string();
        self.retry
            .run(&label, || self.registry.fetch_manifest(&request.name, request.pinned()))
            .await
    }

    /// Resolve `root` and its transitive dependencies.
    ///
    /// # Errors
    ///
    /// Registry errors once retries are exhausted, [`CompkitError::CyclicDependency`],
    /// [`CompkitError::IncompatiblePackageVersions`], and [`CompkitError::VersionConflict`]
    /// under the strict policy.
    pub async fn resolve(&self, root: &ComponentRef) -> Result<ResolutionResult> {
        info!("Resolving {root} from {}", self.registry.location());

        let mut graph = ResolutionGraph::new();
        let mut manifests: BTreeMap<String, Arc<ComponentManifest>> = BTreeMap::new();
        let mut packages = PackageBook::default();
        let mut conflicts = Vec::new();

        let mut level = vec![Pending {
            request: root.clone(),
            ancestors: Vec::new(),
        }];
        let mut depth = 0;

        while !level.is_empty() {
            // Plan
            let mut steps = Vec::with_capacity(level.len());
            let mut scheduled: Vec<Pending> = Vec::new();
            for pending in level {
                let name = &pending.request.name;
                if let Some(start) = pending.ancestors.iter().position(|a| a == name) {
                    let mut cycle = pending.ancestors[start..].to_vec();
                    cycle.push(name.clone());
                    return Err(CompkitError::CyclicDependency { cycle });
                }
                if graph.get(name).is_some() || scheduled.iter().any(|s| &s.request.name == name)
                {
                    steps.push(Step::Duplicate(pending));
                } else {
                    steps.push(Step::Fetched(scheduled.len()));
                    scheduled.push(pending);
                }
            }

            // Fetch
            debug!("Fetching {} manifest(s) at depth {depth}", scheduled.len());
            let fetched: Vec<Result<ComponentManifest>> = stream::iter(&scheduled)
                .map(|pending| self.fetch(&pending.request))
                .buffered(self.max_parallel)
                .collect()
                .await;
            let mut fetched: Vec<Option<Result<ComponentManifest>>> =
                fetched.into_iter().map(Some).collect();

            // Apply
            let mut next = Vec::new();
            for step in steps {
                match step {
                    Step::Fetched(index) => {
                        let pending = &scheduled[index];
                        let manifest = fetched[index].take().unwrap_or_else(|| {
                            Err(CompkitError::Other {
                                message: format!("{} was applied twice", pending.request),
                            })
                        })?;
                        let chosen = manifest.reference();
                        debug!("Resolved {} to {chosen}", pending.request);

                        graph.insert(chosen.clone());
                        if let Some(parent) = pending.requested_by() {
                            graph.add_dependency(parent, &chosen.name);
                        }
                        for (package, range) in &manifest.dependencies.packages {
                            packages.add(package, range, &chosen.name)?;
                        }

                        let mut ancestors = pending.ancestors.clone();
                        ancestors.push(chosen.name.clone());
                        next.extend(manifest.dependencies.components.iter().map(|child| {
                            Pending {
                                request: child.clone(),
                                ancestors: ancestors.clone(),
                            }
                        }));
                        manifests.insert(chosen.name.clone(), Arc::new(manifest));
                    }
                    Step::Duplicate(pending) => {
                        let name = &pending.request.name;
                        let Some(chosen) = graph.get(name).cloned() else {
                            continue;
                        };
                        if let Some(parent) = pending.requested_by() {
                            graph.add_dependency(parent, name);
                        }
                        if let Some(requested) = pending.request.pinned()
                            && requested != chosen.version
                        {
                            let conflict = VersionConflict {
                                name: name.clone(),
                                chosen: chosen.version.clone(),
                                requested: requested.to_string(),
                                requested_by: pending.requested_by().unwrap_or_default().to_string(),
                            };
                            if self.policy == ConflictPolicy::Strict {
                                return Err(CompkitError::VersionConflict {
                                    name: conflict.name,
                                    chosen: conflict.chosen,
                                    requested: conflict.requested,
                                    requested_by: conflict.requested_by,
                                });
                            }
                            warn!(
                                "Version conflict for '{}': {} requires {} but {} was already chosen, keeping {}",
                                conflict.name,
                                conflict.requested_by,
                                conflict.requested,
                                conflict.chosen,
                                conflict.chosen
                            );
                            conflicts.push(conflict);
                        }
                    }
                }
            }

            level = next;
            depth += 1;
        }

        // Cycles closing across sibling branches never sit on a single ancestor path
        graph.detect_cycles()?;
        let install_order = graph.install_order()?;

        let root = build_tree(&root.name, &graph, &manifests, 0)?;

        let flattened_components: BTreeMap<String, ComponentRef> =
            install_order.iter().map(|r| (r.name.clone(), r.clone())).collect();
        info!(
            "Resolved {} component(s) and {} package(s)",
            flattened_components.len(),
            packages.entries.len()
        );

        Ok(ResolutionResult {
            root,
            flattened_components,
            npm_packages: packages.into_map(),
            conflicts,
            manifests,
            install_order,
        })
    }
}

fn build_tree(
    name: &str,
    graph: &ResolutionGraph,
    manifests: &BTreeMap<String, Arc<ComponentManifest>>,
    depth: usize,
) -> Result<ResolutionNode> {
    let (Some(reference), Some(manifest)) = (graph.get(name), manifests.get(name)) else {
        return Err(CompkitError::Other {
            message: format!("'{name}' is missing from the resolution graph"),
        });
    };
    let children = graph
        .dependencies(name)
        .into_iter()
        .map(|child| build_tree(&child.name, graph, manifests, depth + 1))
        .collect::<Result<Vec<_>>>()?;
    Ok(ResolutionNode {
        reference: reference.clone(),
        manifest: Arc::clone(manifest),
        children,
        depth,
    })
}
