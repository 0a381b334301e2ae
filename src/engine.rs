//! Reconciliation of managed object-groups against resolved domain lists.
//!
//! A run goes through three steps:
//!
//! 1. [`discover`] picks the groups whose name starts with the configured
//!    prefix and folds `<base>-N` split groups into one [`LogicalList`].
//! 2. [`plan_sync`] resolves each list's domains, splits them into chunks of
//!    at most `max_entries_per_group` and diffs every chunk against the group
//!    that holds it.
//! 3. The resulting [`SyncPlan`] is printed or applied by the caller.
//!
//! [`plan_drop`] is the teardown path: it removes every managed group and
//! route without touching the list source.

use std::collections::HashSet;

use crate::command::Command;
use crate::config::SyncConfig;
use crate::domain_list::{DomainListResolver, ResolvedDomainSet};
use crate::fetch::TextFetcher;
use crate::report::Report;
use crate::running_config::{ObjectGroup, ParseWarning, ParsedConfig, RouteBinding};
use crate::slug::slugify;
use crate::util::{chunk, split_group_name};

/// An existing object-group that belongs to a managed list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedGroup {
    /// Object-group name.
    pub name: String,
    /// Description as found in the configuration.
    pub description: String,
    /// 0 for the base group, `N - 1` for a `<base>-N` group.
    pub split_index: usize,
    /// Current members.
    pub members: Vec<String>,
    /// Routes bound to this group, on any interface.
    pub routes: Vec<RouteBinding>,
}

impl ManagedGroup {
    /// Disable flag of the route through `interface`, if such a route exists.
    #[must_use]
    pub fn route_disabled(&self, interface: &str) -> Option<bool> {
        self.routes
            .iter()
            .find(|r| r.interface == interface)
            .map(|r| r.disabled)
    }
}

/// One remote domain list spread over one or more object-groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalList {
    /// Name of the base group; chunk `i > 0` lives in `<base_name>-<i + 1>`.
    pub base_name: String,
    /// Description of the base group (or the seed it was created from).
    pub description: String,
    /// Remote list key.
    pub slug: String,
    /// Existing groups ordered by split index. Empty for seeded lists.
    pub groups: Vec<ManagedGroup>,
}

impl LogicalList {
    /// The existing group holding chunk `index`.
    #[must_use]
    pub fn chunk(&self, index: usize) -> Option<&ManagedGroup> {
        self.groups.iter().find(|g| g.split_index == index)
    }

    /// Returns `true` if the list was synthesized from an initial seed.
    #[must_use]
    pub fn is_seeded(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Final state of one list (or skipped group) after planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListState {
    /// Commands were planned for `groups` groups holding `domains` domains.
    Synced {
        /// Resolved domain count.
        domains: usize,
        /// Number of object-groups the list now spans.
        groups: usize,
    },
    /// The group was left out during discovery.
    Skipped {
        /// Why it was left out.
        reason: String,
    },
    /// Resolution failed; membership was left untouched.
    Errored {
        /// Failure message.
        message: String,
    },
}

/// Planning result for a single list or group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOutcome {
    /// Base group name (or the skipped group's name).
    pub name: String,
    /// Terminal state.
    pub state: ListState,
}

/// Everything a run decided to do, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Commands to print or apply.
    pub commands: Vec<Command>,
    /// User-facing log.
    pub report: Report,
    /// Per-list results in discovery order.
    pub outcomes: Vec<ListOutcome>,
}

impl SyncPlan {
    /// Rendered command lines.
    #[must_use]
    pub fn command_lines(&self) -> Vec<String> {
        self.commands.iter().map(ToString::to_string).collect()
    }

    /// Number of lists that failed to resolve.
    #[must_use]
    pub fn errored(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, ListState::Errored { .. }))
            .count()
    }
}

/// Splits `<base>-N` (N >= 2) into `(base, N - 1)` when `base` is itself a
/// managed name longer than `prefix`.
fn split_suffix<'a>(name: &'a str, prefix: &str) -> Option<(&'a str, usize)> {
    let (base, number) = name.rsplit_once('-')?;
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number: usize = number.parse().ok()?;
    (number >= 2 && base.len() > prefix.len() && base.starts_with(prefix))
        .then_some((base, number - 1))
}

/// Finds the managed lists in `parsed`, or synthesizes them from the seed.
///
/// Groups with an unusable description and split groups without a base are
/// reported and recorded as skipped in `outcomes`.
pub fn discover(
    parsed: &ParsedConfig,
    config: &SyncConfig,
    report: &mut Report,
    outcomes: &mut Vec<ListOutcome>,
) -> Vec<LogicalList> {
    let prefix = config.prefix.as_str();
    let mut warnings = Vec::new();
    let mut valid = Vec::new();

    for group in parsed.groups.iter().filter(|g| g.name.starts_with(prefix)) {
        let slug = group.description().map(slugify).unwrap_or_default();
        if slug.is_empty() {
            warnings.push(format!(
                "[discover:warn] skip {}: empty or invalid description",
                group.name
            ));
            outcomes.push(ListOutcome {
                name: group.name.clone(),
                state: ListState::Skipped {
                    reason: "empty or invalid description".into(),
                },
            });
            continue;
        }
        let duplicated = ParseWarning::MultipleDescriptions {
            group: group.name.clone(),
        };
        if parsed.warnings.contains(&duplicated) {
            warnings.push(format!("[discover:warn] multiple descriptions for {}", group.name));
        }
        valid.push((group, slug));
    }

    report.info(format!(
        "[discover] found {} group(s) with prefix \"{prefix}\"",
        valid.len()
    ));
    for warning in warnings {
        report.warn(warning);
    }

    for route in &parsed.routes {
        if route.disabled && route.group.starts_with(prefix) {
            report.info(format!("[routes] disabled: {}::{}", route.group, route.interface));
        }
    }

    let managed = |group: &ObjectGroup, split_index: usize| ManagedGroup {
        name: group.name.clone(),
        description: group.description().unwrap_or_default().to_string(),
        split_index,
        members: group.members.clone(),
        routes: parsed.routes_for(&group.name).cloned().collect(),
    };

    let base_names: HashSet<&str> = valid
        .iter()
        .filter(|(g, _)| split_suffix(&g.name, prefix).is_none())
        .map(|(g, _)| g.name.as_str())
        .collect();

    let mut lists: Vec<LogicalList> = Vec::new();
    for &(group, ref slug) in &valid {
        match split_suffix(&group.name, prefix) {
            Some((base, index)) if base_names.contains(base) => {
                if let Some(list) = lists.iter_mut().find(|l| l.base_name == base) {
                    list.groups.push(managed(group, index));
                } else {
                    // Split group declared before its base; the base picks it up below.
                    lists.push(LogicalList {
                        base_name: base.to_string(),
                        description: String::new(),
                        slug: String::new(),
                        groups: vec![managed(group, index)],
                    });
                }
            }
            Some((base, _)) => {
                report.warn(format!(
                    "[discover:warn] orphan split group {}: base group {base} not found",
                    group.name
                ));
                outcomes.push(ListOutcome {
                    name: group.name.clone(),
                    state: ListState::Skipped {
                        reason: format!("base group {base} not found"),
                    },
                });
            }
            None => {
                let description = group.description().unwrap_or_default().to_string();
                if let Some(list) = lists.iter_mut().find(|l| l.base_name == group.name) {
                    list.description = description;
                    list.slug.clone_from(slug);
                    list.groups.push(managed(group, 0));
                } else {
                    lists.push(LogicalList {
                        base_name: group.name.clone(),
                        description,
                        slug: slug.clone(),
                        groups: vec![managed(group, 0)],
                    });
                }
            }
        }
    }

    for list in &mut lists {
        list.groups.sort_by_key(|g| g.split_index);
    }

    if lists.is_empty() {
        lists = seed_lists(parsed, config, report);
    }
    lists
}

fn seed_lists(parsed: &ParsedConfig, config: &SyncConfig, report: &mut Report) -> Vec<LogicalList> {
    let mut lists = Vec::new();
    for (index, seed) in config.initial_domains.iter().enumerate() {
        let name = format!("{}{index}", config.prefix);
        if parsed.group(&name).is_some() {
            report.warn(format!("[init:warn] skip {name}: group already exists"));
            continue;
        }
        let slug = slugify(seed);
        if slug.is_empty() {
            report.warn(format!("[init:warn] skip {name}: seed {seed:?} has no usable key"));
            continue;
        }
        report.info(format!("[init] add {name} ({seed} -> {slug})"));
        lists.push(LogicalList {
            base_name: name,
            description: seed.trim().to_string(),
            slug,
            groups: Vec::new(),
        });
    }
    lists
}

/// Plans the commands that bring every managed list in line with its
/// remote domain list.
///
/// A list that fails to resolve is reported and left as is; the remaining
/// lists are still planned.
pub async fn plan_sync<F: TextFetcher + ?Sized>(
    parsed: &ParsedConfig,
    config: &SyncConfig,
    fetcher: &F,
) -> SyncPlan {
    let mut plan = SyncPlan::default();
    let lists = discover(parsed, config, &mut plan.report, &mut plan.outcomes);
    if lists.is_empty() {
        plan.report.info("No lists to sync");
        return plan;
    }

    let resolver = DomainListResolver::new(fetcher, config);
    let interface = config.route_interface();

    for list in &lists {
        match resolver.resolve(&list.slug).await {
            Ok(resolved) => {
                let groups = plan_membership(list, &resolved, parsed, config, &mut plan);
                if let Some(interface) = interface {
                    plan_routes(list, 0..groups, interface, &mut plan.commands);
                }
                plan.outcomes.push(ListOutcome {
                    name: list.base_name.clone(),
                    state: ListState::Synced {
                        domains: resolved.len(),
                        groups,
                    },
                });
            }
            Err(e) => {
                plan.report
                    .error(format!("[error] failed to load {}: {e}", list.slug));
                if let Some(interface) = interface {
                    let existing = list.groups.iter().map(|g| g.split_index);
                    plan_routes(list, existing, interface, &mut plan.commands);
                }
                plan.outcomes.push(ListOutcome {
                    name: list.base_name.clone(),
                    state: ListState::Errored {
                        message: e.to_string(),
                    },
                });
            }
        }
    }

    plan
}

/// Emits membership commands for `list`; returns the number of chunks.
fn plan_membership(
    list: &LogicalList,
    resolved: &ResolvedDomainSet,
    parsed: &ParsedConfig,
    config: &SyncConfig,
    plan: &mut SyncPlan,
) -> usize {
    let domains = resolved.to_vec();
    let chunks = chunk(&domains, config.max_entries_per_group);
    let count = chunks.len();

    let mut summary = format!(
        "[sync] {} <= {}: {} domain(s)",
        list.base_name,
        list.slug,
        domains.len()
    );
    if count > 1 {
        summary.push_str(&format!(" [split into {count} groups]"));
    }
    plan.report.info(summary);
    tracing::debug!(
        list = %list.slug,
        skipped_keyword = resolved.stats.skipped_keyword,
        skipped_regexp = resolved.stats.skipped_regexp,
        includes = resolved.stats.include_count,
        rules = resolved.stats.total_rules,
        "Resolved domain list"
    );

    for (index, members) in chunks.iter().enumerate() {
        let group = split_group_name(&list.base_name, index);
        let description = if index == 0 {
            list.description.clone()
        } else {
            format!("{} {}", list.slug, index + 1)
        };

        // A group skipped during discovery may still occupy the chunk's name.
        let existing = list
            .chunk(index)
            .map(|g| (g.description.as_str(), g.members.as_slice()))
            .or_else(|| {
                parsed
                    .group(&group)
                    .map(|g| (g.description().unwrap_or_default(), g.members.as_slice()))
            });

        match existing {
            None => {
                plan.commands.push(Command::CreateGroup {
                    group: group.clone(),
                });
                plan.commands.push(Command::SetDescription {
                    group: group.clone(),
                    description,
                });
            }
            Some((current_description, current_members)) => {
                if index > 0 && current_description != description {
                    plan.commands.push(Command::SetDescription {
                        group: group.clone(),
                        description,
                    });
                }
                let wanted: HashSet<&str> = members.iter().map(String::as_str).collect();
                for stale in current_members.iter().filter(|m| !wanted.contains(m.as_str())) {
                    plan.commands.push(Command::Exclude {
                        group: group.clone(),
                        domain: stale.clone(),
                    });
                }
            }
        }

        for domain in members {
            plan.commands.push(Command::Include {
                group: group.clone(),
                domain: domain.clone(),
            });
        }
    }

    for surplus in list.groups.iter().filter(|g| g.split_index >= count) {
        plan.report.info(format!("[sync] remove {}", surplus.name));
        remove_group(surplus.name.as_str(), &surplus.routes, &mut plan.commands);
    }

    count
}

/// Emits route commands for the chunks at `indices` of `list`.
///
/// A chunk without a route inherits the disable flag of the chunk before
/// it; the first chunk defaults to enabled.
fn plan_routes(
    list: &LogicalList,
    indices: impl IntoIterator<Item = usize>,
    interface: &str,
    commands: &mut Vec<Command>,
) {
    let mut previous = None;
    for index in indices {
        let disabled = list
            .chunk(index)
            .and_then(|g| g.route_disabled(interface))
            .or(previous)
            .unwrap_or(false);
        previous = Some(disabled);

        let group = split_group_name(&list.base_name, index);
        commands.push(Command::Route {
            group: group.clone(),
            interface: interface.to_string(),
        });
        if disabled {
            commands.push(Command::DisableRoute {
                group,
                interface: interface.to_string(),
            });
        }
    }
}

fn remove_group(name: &str, routes: &[RouteBinding], commands: &mut Vec<Command>) {
    for route in routes {
        commands.push(Command::RemoveRoute {
            group: route.group.clone(),
            interface: route.interface.clone(),
        });
    }
    commands.push(Command::RemoveGroup {
        group: name.to_string(),
    });
}

/// Plans removal of every managed group and every route bound to one.
///
/// Never contacts the list source.
#[must_use]
pub fn plan_drop(parsed: &ParsedConfig, prefix: &str) -> SyncPlan {
    let mut plan = SyncPlan::default();
    let managed: Vec<_> = parsed
        .groups
        .iter()
        .filter(|g| g.name.starts_with(prefix))
        .collect();

    plan.report
        .info(format!("[drop] prefix={prefix}, groups={}", managed.len()));

    for group in managed {
        let routes: Vec<RouteBinding> = parsed.routes_for(&group.name).cloned().collect();
        remove_group(&group.name, &routes, &mut plan.commands);
    }
    plan
}
