//! Walk every device-group rulebase and build one [`RuleDocument`] per rule.
//!
//! Device groups are visited in document order; inside each group the three
//! rulebases are visited as `pre-rules`, `rules`, `post-rules`. Positions are
//! 1-based, count every rule entry in the rulebase (including skipped ones)
//! and restart for each (device group, rulebase) pair.

pub mod document;
pub mod extract;

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::{debug, warn};
use xml_tree_core::XmlNode;

use crate::catalog::builder::DEVICE_GROUP_ENTRIES;
use crate::resolve::outcome::dedup_strings;
use crate::resolve::{Outcome, Resolver, ANY};

pub use document::{
    rule_uid, ExpandedSection, Meta, OrigSection, Profiles, RuleDocument, Targets,
};
pub use extract::{extract_rule, RawRule, SkipReason};

/// Literal service value meaning "whatever the application defines".
pub const APPLICATION_DEFAULT: &str = "application-default";

const RULE_ENTRIES: &str = "security/rules/entry";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rulebase {
    Pre,
    Local,
    Post,
}

impl Rulebase {
    pub const ALL: [Rulebase; 3] = [Rulebase::Pre, Rulebase::Local, Rulebase::Post];

    /// Container element under the device-group entry.
    pub fn container(self) -> &'static str {
        match self {
            Self::Pre => "pre-rulebase",
            Self::Local => "rulebase",
            Self::Post => "post-rulebase",
        }
    }

    /// Label written to `rulebase` in the output document.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pre => "pre-rules",
            Self::Local => "rules",
            Self::Post => "post-rules",
        }
    }
}

/// Values stamped on every document of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub tenant: String,
    pub snapshot_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRule {
    pub device_group: String,
    pub rulebase: &'static str,
    pub position: usize,
    pub reason: SkipReason,
}

/// Processed and skipped tallies for one walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkReport {
    pub processed: usize,
    pub skipped: Vec<SkippedRule>,
}

pub struct RuleWalker<'a> {
    root: &'a XmlNode,
    resolver: &'a Resolver<'a>,
    context: &'a RunContext,
}

impl<'a> RuleWalker<'a> {
    pub fn new(root: &'a XmlNode, resolver: &'a Resolver<'a>, context: &'a RunContext) -> Self {
        Self {
            root,
            resolver,
            context,
        }
    }

    /// Build every document and hand it to `emit` as soon as it is ready.
    ///
    /// Only errors returned by `emit` stop the walk.
    pub fn walk<E>(
        &self,
        mut emit: impl FnMut(&RuleDocument) -> Result<(), E>,
    ) -> Result<WalkReport, E> {
        let mut report = WalkReport::default();
        let mut seen: BTreeSet<&str> = BTreeSet::new();

        for group in self.root.find_all(DEVICE_GROUP_ENTRIES) {
            let name = group.attr_or("name", "").trim();
            if name.is_empty() {
                continue;
            }
            if !seen.insert(name) {
                warn!(device_group = name, "duplicate device group; rules walked once");
                continue;
            }

            for rulebase in Rulebase::ALL {
                let entries = group
                    .get_child(rulebase.container())
                    .map(|container| container.find_all(RULE_ENTRIES))
                    .unwrap_or_default();
                debug!(
                    device_group = name,
                    rulebase = rulebase.label(),
                    rules = entries.len(),
                    "walking rulebase"
                );

                for (index, entry) in entries.into_iter().enumerate() {
                    let position = index + 1;
                    match extract_rule(entry) {
                        Ok(raw) => {
                            let document = self.build_document(name, rulebase, position, raw);
                            emit(&document)?;
                            report.processed += 1;
                        }
                        Err(reason) => {
                            warn!(
                                device_group = name,
                                rulebase = rulebase.label(),
                                position,
                                %reason,
                                "skipping rule"
                            );
                            report.skipped.push(SkippedRule {
                                device_group: name.to_string(),
                                rulebase: rulebase.label(),
                                position,
                                reason,
                            });
                        }
                    }
                }
            }
        }

        Ok(report)
    }

    /// Walk everything into memory.
    pub fn collect(&self) -> (Vec<RuleDocument>, WalkReport) {
        let mut documents = Vec::new();
        let report = match self.walk(|document| {
            documents.push(document.clone());
            Ok::<(), std::convert::Infallible>(())
        }) {
            Ok(report) => report,
            Err(never) => match never {},
        };
        (documents, report)
    }

    pub fn build_document(
        &self,
        device_group: &str,
        rulebase: Rulebase,
        position: usize,
        raw: RawRule,
    ) -> RuleDocument {
        let resolver = self.resolver;
        let expanded_services = self.expand_services(device_group, &raw.services);
        let expanded = ExpandedSection {
            from_zones: resolver.resolve_zones(device_group, &raw.from_zones),
            to_zones: resolver.resolve_zones(device_group, &raw.to_zones),
            src_addresses: resolver.expand_addresses(device_group, &raw.sources),
            dst_addresses: resolver.expand_addresses(device_group, &raw.destinations),
            applications: resolver.expand_applications(device_group, &raw.applications),
            ports: derive_ports(&expanded_services),
            services: expanded_services,
            users: dedup_strings(raw.users.iter().cloned()),
            tags: dedup_strings(raw.tags.iter().cloned()),
        };
        let meta = Meta::from_expanded(&expanded);
        let device_group_path = resolver
            .catalog()
            .device_group(device_group)
            .map(|group| group.path.clone())
            .unwrap_or_else(|| vec![device_group.to_string()]);

        RuleDocument {
            panorama_tenant: self.context.tenant.clone(),
            snapshot_date: self.context.snapshot_date.format("%Y-%m-%d").to_string(),
            device_group: device_group.to_string(),
            device_group_path,
            rulebase: rulebase.label().to_string(),
            rule_uid: rule_uid(device_group, rulebase.label(), position, &raw.name),
            rule_name: raw.name,
            position,
            action: raw.action,
            disabled: raw.disabled,
            targets: raw.targets,
            orig: OrigSection {
                from_zones: raw.from_zones,
                to_zones: raw.to_zones,
                sources: raw.sources,
                destinations: raw.destinations,
                applications: raw.applications,
                services: raw.services,
                users: raw.users,
                tags: raw.tags,
                profiles: raw.profiles,
                comments: raw.description,
            },
            expanded,
            meta,
        }
    }

    /// `application-default` is kept in place; every other name is expanded.
    fn expand_services(&self, device_group: &str, services: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        for name in services {
            if name == APPLICATION_DEFAULT {
                out.push(name.clone());
            } else {
                out.extend(
                    self.resolver
                        .expand_services(device_group, std::slice::from_ref(name)),
                );
            }
        }
        dedup_strings(out)
    }
}

/// Port part of each expanded service. `any` and `application-default` pass
/// through; markers and protocol-only services contribute nothing.
pub fn derive_ports(services: &[String]) -> Vec<String> {
    dedup_strings(services.iter().filter_map(|service| {
        if service == ANY || service == APPLICATION_DEFAULT {
            return Some(service.clone());
        }
        if Outcome::parse(service).is_marker() {
            return None;
        }
        service
            .split_once('/')
            .map(|(_, port)| port.to_string())
            .filter(|port| !port.is_empty())
    }))
}
