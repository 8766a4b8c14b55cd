//! In-memory catalog of device groups, scoped objects, and zones.
//!
//! The catalog is produced once per run by [`builder::build_catalog`] and is
//! read-only afterwards. Every lookup the resolver performs goes through the
//! tables defined here.
//!
//! ## Scopes
//!
//! A scope is either [`SHARED`] or a device-group name. Each scope owns six
//! independent name → object tables. Names are unique inside one
//! (scope, category) table but the same name may appear in several scopes;
//! the resolver picks the closest one.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub mod builder;
pub mod hierarchy;

pub use builder::{build_catalog, BuildReport};

/// Name of the global fallback scope.
pub const SHARED: &str = "Shared";

/// One node of the device-group hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceGroup {
    pub name: String,
    /// Declared parent, or `None` for roots and groups whose parent is missing.
    pub parent: Option<String>,
    pub children: BTreeSet<String>,
    /// Ancestors from the outermost resolved root down to and including `name`.
    pub path: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Ip,
    Cidr,
    Range,
    Fqdn,
    Unknown,
}

/// Leaf address object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub kind: AddressKind,
    pub value: String,
}

impl Address {
    /// Placeholder stored for entries whose value element was not recognised.
    pub fn unknown() -> Self {
        Self {
            kind: AddressKind::Unknown,
            value: String::new(),
        }
    }
}

/// Address group, either an enumerated member list or a tag filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AddressGroup {
    Static { members: Vec<String> },
    Dynamic { filter: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceProto {
    Tcp,
    Udp,
    Ip,
    /// Any other protocol element, keeping its tag (`sctp`, ...).
    Other(String),
}

impl ServiceProto {
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "tcp" => Self::Tcp,
            "udp" => Self::Udp,
            "ip" => Self::Ip,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Ip => "ip",
            Self::Other(tag) => tag,
        }
    }
}

/// Leaf service object. `proto` is `None` when the entry had no usable
/// protocol element; such a service expands to nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    pub proto: Option<ServiceProto>,
    pub ports: Vec<String>,
}

/// Member-list group used for service groups and application groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemberGroup {
    pub members: Vec<String>,
}

/// Application or application-filter object. Both resolve to their own name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Application;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Zone {
    /// Templates the zone was declared in; empty when found by the broad scan.
    pub templates: BTreeSet<String>,
}

/// The six object tables owned by one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScopeObjects {
    pub address: BTreeMap<String, Address>,
    pub address_group: BTreeMap<String, AddressGroup>,
    pub service: BTreeMap<String, Service>,
    pub service_group: BTreeMap<String, MemberGroup>,
    pub application: BTreeMap<String, Application>,
    pub application_group: BTreeMap<String, MemberGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Catalog {
    pub device_groups: BTreeMap<String, DeviceGroup>,
    pub objects: BTreeMap<String, ScopeObjects>,
    pub zones: BTreeMap<String, Zone>,
}

impl Catalog {
    pub fn device_group(&self, name: &str) -> Option<&DeviceGroup> {
        self.device_groups.get(name)
    }

    pub fn scope(&self, name: &str) -> Option<&ScopeObjects> {
        self.objects.get(name)
    }

    pub fn has_zone(&self, name: &str) -> bool {
        self.zones.contains_key(name)
    }
}

/// Table a catalog issue was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectCategory {
    DeviceGroup,
    Address,
    AddressGroup,
    Service,
    ServiceGroup,
    Application,
    ApplicationFilter,
    ApplicationGroup,
    Zone,
}

impl ObjectCategory {
    /// Container tag used in the configuration export.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeviceGroup => "device-group",
            Self::Address => "address",
            Self::AddressGroup => "address-group",
            Self::Service => "service",
            Self::ServiceGroup => "service-group",
            Self::Application => "application",
            Self::ApplicationFilter => "application-filter",
            Self::ApplicationGroup => "application-group",
            Self::Zone => "zone",
        }
    }
}

impl fmt::Display for ObjectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recoverable problem met while parsing one catalog entry.
///
/// Entry parsers return `Result<T, IssueKind>`; the builder records the issue
/// and either skips the entry or stores a safe default.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    #[error("entry has no name attribute")]
    MissingName,
    #[error("duplicate entry name; first definition kept")]
    DuplicateName,
    #[error("address has no ip-netmask, ip-range, or fqdn value")]
    UnrecognizedAddress,
    #[error("group has neither static members nor a dynamic filter")]
    MissingMembers,
    #[error("service has no protocol element")]
    MissingProtocol,
    #[error("declared parent '{parent}' does not exist; treated as root")]
    MissingParent { parent: String },
    #[error("parent chain loops back to '{revisited}'; path truncated")]
    ParentCycle { revisited: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogIssue {
    pub scope: String,
    pub category: ObjectCategory,
    pub name: String,
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl fmt::Display for CatalogIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scope={} {}='{}': {}",
            self.scope, self.category, self.name, self.kind
        )
    }
}
