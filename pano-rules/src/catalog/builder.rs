//! Catalog construction from a parsed Panorama export.
//!
//! Walks the tree once and fills the three lookup structures the resolver
//! consumes: the device-group hierarchy, per-scope object tables, and the zone
//! table.
//!
//! ## Sources
//!
//! - Shared objects: `shared/<category>/entry`
//! - Device groups: `devices/entry/device-group/entry`
//! - Parent links: `readonly/devices/entry/device-group/entry/parent-dg`, the
//!   older `readonly/dg-meta-data/dg-info/entry/parent-dg`, or a `parent-dg`
//!   child of the device-group entry
//! - Zones: template and template-stack vsys zones, with a broad rescan when
//!   the primary pattern finds fewer than `zone_fallback_threshold` zones
//!
//! Every malformed entry is recorded in the [`BuildReport`] and either skipped
//! (no name) or stored with a safe default; construction itself never fails.

use std::collections::BTreeMap;

use serde::Serialize;
use xml_tree_core::XmlNode;

use super::hierarchy::build_hierarchy;
use super::{
    Address, AddressGroup, AddressKind, Application, Catalog, CatalogIssue, IssueKind,
    MemberGroup, ObjectCategory, ScopeObjects, Service, ServiceProto, Zone, SHARED,
};
use crate::settings::Settings;

pub(crate) const DEVICE_GROUP_ENTRIES: &str = "devices/entry/device-group/entry";
const PARENT_SOURCES: [&str; 2] = [
    "readonly/devices/entry/device-group/entry",
    "readonly/dg-meta-data/dg-info/entry",
];
const TEMPLATE_CONTAINERS: [&str; 2] = ["devices/entry/template/entry", "devices/entry/template-stack/entry"];
const TEMPLATE_ZONES: &str = "config/devices/entry/vsys/entry/zone/entry";

/// Recoverable findings from one catalog build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub issues: Vec<CatalogIssue>,
    /// True when the broad zone rescan was needed.
    pub zone_fallback_used: bool,
}

impl BuildReport {
    /// Number of distinct scopes with at least one issue.
    pub fn affected_scopes(&self) -> usize {
        let mut scopes: Vec<&str> = self.issues.iter().map(|i| i.scope.as_str()).collect();
        scopes.sort_unstable();
        scopes.dedup();
        scopes.len()
    }
}

/// Build the catalog for one configuration snapshot.
pub fn build_catalog(root: &XmlNode, settings: &Settings) -> (Catalog, BuildReport) {
    let mut report = BuildReport::default();
    let mut catalog = Catalog::default();

    let mut shared = root
        .get_child("shared")
        .map(|node| load_scope_objects(node, SHARED, &mut report.issues))
        .unwrap_or_default();
    add_predefined(&mut shared, settings);
    catalog.objects.insert(SHARED.to_string(), shared);

    let declared_parents = declared_parents(root);
    let mut declared = Vec::new();
    for entry in root.find_all(DEVICE_GROUP_ENTRIES) {
        let name = entry.attr_or("name", "").trim();
        if name.is_empty() {
            report.issues.push(CatalogIssue {
                scope: SHARED.to_string(),
                category: ObjectCategory::DeviceGroup,
                name: String::new(),
                kind: IssueKind::MissingName,
            });
            continue;
        }
        if catalog.objects.contains_key(name) {
            report.issues.push(CatalogIssue {
                scope: name.to_string(),
                category: ObjectCategory::DeviceGroup,
                name: name.to_string(),
                kind: IssueKind::DuplicateName,
            });
            continue;
        }

        let parent = declared_parents.get(name).cloned().or_else(|| {
            entry
                .get_child("parent-dg")
                .map(|p| p.text_or("").to_string())
                .filter(|p| !p.is_empty())
        });
        declared.push((name.to_string(), parent));
        catalog.objects.insert(
            name.to_string(),
            load_scope_objects(entry, name, &mut report.issues),
        );
    }

    let (groups, hierarchy_issues) = build_hierarchy(&declared);
    catalog.device_groups = groups;
    report.issues.extend(hierarchy_issues);

    let (zones, fallback_used) = collect_zones(root, settings.zone_fallback_threshold);
    catalog.zones = zones;
    report.zone_fallback_used = fallback_used;

    (catalog, report)
}

/// Parent names declared in the read-only metadata, keyed by group name.
fn declared_parents(root: &XmlNode) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for source in PARENT_SOURCES {
        for entry in root.find_all(source) {
            let name = entry.attr_or("name", "").trim();
            let Some(parent) = entry.get_child("parent-dg").map(|p| p.text_or("")) else {
                continue;
            };
            if name.is_empty() || parent.is_empty() {
                continue;
            }
            out.entry(name.to_string())
                .or_insert_with(|| parent.to_string());
        }
    }
    out
}

fn load_scope_objects(node: &XmlNode, scope: &str, issues: &mut Vec<CatalogIssue>) -> ScopeObjects {
    let mut objects = ScopeObjects::default();
    let mut loader = EntryLoader { node, scope, issues };

    loader.load(ObjectCategory::Address, &mut objects.address, parse_address, Address::unknown);
    loader.load(
        ObjectCategory::AddressGroup,
        &mut objects.address_group,
        parse_address_group,
        || AddressGroup::Static { members: Vec::new() },
    );
    loader.load(ObjectCategory::Service, &mut objects.service, parse_service, || Service {
        proto: None,
        ports: Vec::new(),
    });
    loader.load(
        ObjectCategory::ServiceGroup,
        &mut objects.service_group,
        parse_member_group,
        MemberGroup::default,
    );
    loader.load(
        ObjectCategory::Application,
        &mut objects.application,
        |_| Ok(Application),
        Application::default,
    );
    loader.load(
        ObjectCategory::ApplicationFilter,
        &mut objects.application,
        |_| Ok(Application),
        Application::default,
    );
    loader.load(
        ObjectCategory::ApplicationGroup,
        &mut objects.application_group,
        parse_member_group,
        MemberGroup::default,
    );

    objects
}

struct EntryLoader<'a> {
    node: &'a XmlNode,
    scope: &'a str,
    issues: &'a mut Vec<CatalogIssue>,
}

impl EntryLoader<'_> {
    /// Load every `<category>/entry` under the scope node into `table`.
    ///
    /// Nameless entries are skipped; entries whose parser fails are stored as
    /// `fallback()`. The first definition of a name wins.
    fn load<T>(
        &mut self,
        category: ObjectCategory,
        table: &mut BTreeMap<String, T>,
        parse: impl Fn(&XmlNode) -> Result<T, IssueKind>,
        fallback: impl Fn() -> T,
    ) {
        let Some(container) = self.node.get_child(category.as_str()) else {
            return;
        };
        for entry in container.children.iter().filter(|c| c.tag == "entry") {
            let name = entry.attr_or("name", "").trim();
            if name.is_empty() {
                self.record(category, "", IssueKind::MissingName);
                continue;
            }
            if table.contains_key(name) {
                self.record(category, name, IssueKind::DuplicateName);
                continue;
            }
            let value = match parse(entry) {
                Ok(value) => value,
                Err(kind) => {
                    self.record(category, name, kind);
                    fallback()
                }
            };
            table.insert(name.to_string(), value);
        }
    }

    fn record(&mut self, category: ObjectCategory, name: &str, kind: IssueKind) {
        self.issues.push(CatalogIssue {
            scope: self.scope.to_string(),
            category,
            name: name.to_string(),
            kind,
        });
    }
}

fn parse_address(entry: &XmlNode) -> Result<Address, IssueKind> {
    if let Some(value) = entry.get_child("ip-netmask").map(|n| n.text_or("")) {
        let kind = if value.contains('/') {
            AddressKind::Cidr
        } else {
            AddressKind::Ip
        };
        return Ok(Address {
            kind,
            value: value.to_string(),
        });
    }
    if let Some(value) = entry.get_child("ip-range").map(|n| n.text_or("")) {
        return Ok(Address {
            kind: AddressKind::Range,
            value: value.to_string(),
        });
    }
    if let Some(value) = entry.get_child("fqdn").map(|n| n.text_or("")) {
        return Ok(Address {
            kind: AddressKind::Fqdn,
            value: value.to_string(),
        });
    }
    if let Some(value) = entry.get_child("ip-wildcard").map(|n| n.text_or("")) {
        return Ok(Address {
            kind: AddressKind::Unknown,
            value: value.to_string(),
        });
    }
    Err(IssueKind::UnrecognizedAddress)
}

fn parse_address_group(entry: &XmlNode) -> Result<AddressGroup, IssueKind> {
    if let Some(dynamic) = entry.get_child("dynamic") {
        let filter = dynamic
            .get_child("filter")
            .map(|f| f.text_or("").to_string())
            .filter(|f| !f.is_empty());
        return Ok(AddressGroup::Dynamic { filter });
    }
    if let Some(members) = entry.get_child("static") {
        return Ok(AddressGroup::Static {
            members: members.member_texts(),
        });
    }
    Err(IssueKind::MissingMembers)
}

fn parse_service(entry: &XmlNode) -> Result<Service, IssueKind> {
    let proto_node = entry
        .get_child("protocol")
        .and_then(|p| p.children.first())
        .ok_or(IssueKind::MissingProtocol)?;
    let ports = proto_node
        .get_child("port")
        .map(|p| split_ports(p.text_or("")))
        .unwrap_or_default();
    Ok(Service {
        proto: Some(ServiceProto::from_tag(&proto_node.tag)),
        ports,
    })
}

fn parse_member_group(entry: &XmlNode) -> Result<MemberGroup, IssueKind> {
    entry
        .get_child("members")
        .map(XmlNode::member_texts)
        .or_else(|| {
            let direct = entry.member_texts();
            (!direct.is_empty()).then_some(direct)
        })
        .map(|members| MemberGroup { members })
        .ok_or(IssueKind::MissingMembers)
}

fn split_ports(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Insert vendor built-ins that never appear in an export. Configured objects
/// with the same name take precedence.
fn add_predefined(shared: &mut ScopeObjects, settings: &Settings) {
    for svc in &settings.predefined_services {
        shared
            .service
            .entry(svc.name.clone())
            .or_insert_with(|| Service {
                proto: Some(ServiceProto::from_tag(&svc.protocol)),
                ports: svc.ports.clone(),
            });
    }
    for app in &settings.predefined_applications {
        shared.application.entry(app.clone()).or_default();
    }
}

/// Collect zones from template vsys definitions, rescanning the whole tree
/// when fewer than `threshold` zones were found.
fn collect_zones(root: &XmlNode, threshold: usize) -> (BTreeMap<String, Zone>, bool) {
    let mut zones: BTreeMap<String, Zone> = BTreeMap::new();
    for container in TEMPLATE_CONTAINERS {
        for template in root.find_all(container) {
            let template_name = template.attr_or("name", "").trim();
            for entry in template.find_all(TEMPLATE_ZONES) {
                let name = entry.attr_or("name", "").trim();
                if name.is_empty() {
                    continue;
                }
                let zone = zones.entry(name.to_string()).or_default();
                if !template_name.is_empty() {
                    zone.templates.insert(template_name.to_string());
                }
            }
        }
    }

    if zones.len() >= threshold {
        return (zones, false);
    }

    for zone_node in root.descendants("zone") {
        for entry in zone_node.children.iter().filter(|c| c.tag == "entry") {
            let name = entry.attr_or("name", "").trim();
            if !name.is_empty() {
                zones.entry(name.to_string()).or_default();
            }
        }
    }
    (zones, true)
}

#[cfg(test)]
mod tests {
    use xml_tree_core::parse;

    use super::build_catalog;
    use crate::catalog::{
        Address, AddressGroup, AddressKind, IssueKind, ObjectCategory, ServiceProto, SHARED,
    };
    use crate::settings::Settings;

    fn settings() -> Settings {
        Settings {
            predefined_services: Vec::new(),
            predefined_applications: Vec::new(),
            ..Settings::default()
        }
    }

    #[test]
    fn loads_shared_and_device_group_objects() {
        let root = parse(
            br#"<config>
                <shared>
                  <address>
                    <entry name="h1"><ip-netmask>10.0.0.1</ip-netmask></entry>
                    <entry name="n1"><ip-netmask>10.0.0.0/24</ip-netmask></entry>
                    <entry name="r1"><ip-range>10.0.0.1-10.0.0.9</ip-range></entry>
                    <entry name="f1"><fqdn>example.com</fqdn></entry>
                  </address>
                  <address-group>
                    <entry name="g1"><static><member>h1</member><member>n1</member></static></entry>
                    <entry name="d1"><dynamic><filter>'prod'</filter></dynamic></entry>
                  </address-group>
                  <service>
                    <entry name="s1"><protocol><tcp><port>80, 443</port></tcp></protocol></entry>
                    <entry name="s2"><protocol><sctp><port>9</port></sctp></protocol></entry>
                  </service>
                </shared>
                <devices><entry name="localhost.localdomain"><device-group>
                  <entry name="DG"><address><entry name="h1"><ip-netmask>172.16.0.1</ip-netmask></entry></address></entry>
                </device-group></entry></devices>
            </config>"#,
        )
        .expect("parse");

        let (catalog, report) = build_catalog(&root, &settings());
        assert!(report.issues.is_empty(), "{:?}", report.issues);

        let shared = catalog.scope(SHARED).expect("shared scope");
        assert_eq!(shared.address["h1"].kind, AddressKind::Ip);
        assert_eq!(shared.address["n1"].kind, AddressKind::Cidr);
        assert_eq!(shared.address["r1"].kind, AddressKind::Range);
        assert_eq!(shared.address["f1"].kind, AddressKind::Fqdn);
        assert_eq!(
            shared.address_group["g1"],
            AddressGroup::Static {
                members: vec!["h1".to_string(), "n1".to_string()]
            }
        );
        assert_eq!(
            shared.address_group["d1"],
            AddressGroup::Dynamic {
                filter: Some("'prod'".to_string())
            }
        );
        assert_eq!(shared.service["s1"].ports, vec!["80", "443"]);
        assert_eq!(
            shared.service["s2"].proto,
            Some(ServiceProto::Other("sctp".to_string()))
        );

        let dg = catalog.scope("DG").expect("dg scope");
        assert_eq!(dg.address["h1"].value, "172.16.0.1");
        assert_eq!(catalog.device_group("DG").map(|g| g.path.clone()), Some(vec!["DG".to_string()]));
    }

    #[test]
    fn malformed_entries_degrade_with_issues() {
        let root = parse(
            br#"<config><shared>
                <address>
                  <entry><ip-netmask>10.0.0.1</ip-netmask></entry>
                  <entry name="weird"><description>no value</description></entry>
                </address>
                <address-group><entry name="empty-group"/></address-group>
                <service><entry name="no-proto"><description>x</description></entry></service>
            </shared></config>"#,
        )
        .expect("parse");

        let (catalog, report) = build_catalog(&root, &settings());
        let shared = catalog.scope(SHARED).expect("shared");
        assert_eq!(shared.address["weird"], Address::unknown());
        assert_eq!(
            shared.address_group["empty-group"],
            AddressGroup::Static { members: vec![] }
        );
        assert_eq!(shared.service["no-proto"].proto, None);

        let kinds: Vec<&IssueKind> = report.issues.iter().map(|i| &i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &IssueKind::MissingName,
                &IssueKind::UnrecognizedAddress,
                &IssueKind::MissingMembers,
                &IssueKind::MissingProtocol,
            ]
        );
        assert_eq!(report.issues[1].category, ObjectCategory::Address);
        assert_eq!(report.affected_scopes(), 1);
    }

    #[test]
    fn reads_parents_from_readonly_and_inline() {
        let root = parse(
            br#"<config>
                <devices><entry><device-group>
                  <entry name="Root"/>
                  <entry name="Child"/>
                  <entry name="Inline"><parent-dg>Child</parent-dg></entry>
                </device-group></entry></devices>
                <readonly><devices><entry><device-group>
                  <entry name="Child"><parent-dg>Root</parent-dg></entry>
                </device-group></entry></devices></readonly>
            </config>"#,
        )
        .expect("parse");

        let (catalog, _) = build_catalog(&root, &settings());
        assert_eq!(
            catalog.device_group("Inline").map(|g| g.path.clone()),
            Some(vec!["Root".to_string(), "Child".to_string(), "Inline".to_string()])
        );
    }

    #[test]
    fn zone_rescan_respects_threshold() {
        let xml = br#"<config><devices><entry>
            <template><entry name="T1"><config><devices><entry><vsys><entry name="vsys1">
              <zone><entry name="trust"/></zone>
            </entry></vsys></entry></devices></config></entry></template>
            <vsys><entry><zone><entry name="legacy"/></zone></entry></vsys>
        </entry></devices></config>"#;
        let root = parse(xml).expect("parse");

        let (catalog, report) = build_catalog(&root, &settings());
        assert!(!report.zone_fallback_used);
        assert!(catalog.has_zone("trust"));
        assert!(!catalog.has_zone("legacy"));
        assert!(catalog.zones["trust"].templates.contains("T1"));

        let wide = Settings {
            zone_fallback_threshold: 5,
            ..settings()
        };
        let (catalog, report) = build_catalog(&root, &wide);
        assert!(report.zone_fallback_used);
        assert!(catalog.has_zone("trust"));
        assert!(catalog.has_zone("legacy"));
    }

    #[test]
    fn application_filters_share_the_application_table() {
        let root = parse(
            br#"<config><shared>
                <application><entry name="crm"/></application>
                <application-filter>
                  <entry name="risky"><risk><member>5</member></risk></entry>
                  <entry name="crm"/>
                </application-filter>
            </shared></config>"#,
        )
        .expect("parse");

        let (catalog, report) = build_catalog(&root, &settings());
        let shared = catalog.scope(SHARED).expect("shared");
        assert_eq!(
            shared.application.keys().collect::<Vec<_>>(),
            vec!["crm", "risky"]
        );
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].category, ObjectCategory::ApplicationFilter);
        assert_eq!(report.issues[0].kind, IssueKind::DuplicateName);
    }

    #[test]
    fn predefined_objects_do_not_override_configured_ones() {
        let root = parse(
            br#"<config><shared><service>
                <entry name="service-http"><protocol><tcp><port>8000</port></tcp></protocol></entry>
            </service></shared></config>"#,
        )
        .expect("parse");

        let (catalog, _) = build_catalog(&root, &Settings::default());
        let shared = catalog.scope(SHARED).expect("shared");
        assert_eq!(shared.service["service-http"].ports, vec!["8000"]);
        assert_eq!(shared.service["service-https"].ports, vec!["443"]);
        assert!(shared.application.contains_key("ssl"));
    }
}
