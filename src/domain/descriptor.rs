//! Point-in-time domain snapshots.
//!
//! A [`DomainDescriptor`] is assembled from two hypervisor calls made on the
//! same handle: the descriptor markup (identity, resources, devices, boot
//! configuration) and the current run-state code. It reflects the hypervisor
//! at the instant it was built and is never cached.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::state::DomainState;
use crate::error::{Error, Result};
use crate::hypervisor::DomainHandle;

/// Snapshot of one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DomainDescriptor {
    /// Virtualization type (e.g. "kvm").
    #[serde(rename = "type")]
    pub kind: String,
    /// Domain UUID.
    pub uuid: String,
    /// Domain name.
    pub name: String,
    /// Maximum memory, in the unit the hypervisor reports (KiB by default).
    pub memory: u64,
    /// Virtual CPU count.
    #[serde(rename = "vpcu")]
    pub vcpu: u32,
    /// Attached devices.
    pub devices: Devices,
    /// Boot configuration.
    pub os: Os,
    /// Run-state at snapshot time.
    pub state: DomainState,
}

/// Disk and network devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Devices {
    pub disks: Vec<Disk>,
    pub interfaces: Vec<Interface>,
}

/// A disk device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Disk {
    /// Backing type ("file", "block", ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Guest-visible device kind ("disk", "cdrom", ...).
    pub device: String,
    pub driver: DiskDriver,
    pub source: DiskSource,
    pub target: DiskTarget,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DiskDriver {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Where disk contents come from: a file or a host block device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DiskSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DiskTarget {
    pub dev: String,
    pub bus: String,
}

/// A network interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Interface {
    /// Connection type ("network", "bridge", ...).
    #[serde(rename = "type")]
    pub kind: String,
    pub source: InterfaceSource,
    pub mac: InterfaceMac,
    pub model: InterfaceModel,
    pub filterref: FilterRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InterfaceSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InterfaceMac {
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InterfaceModel {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Network filter reference. Empty when the interface has none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FilterRef {
    pub filter: String,
    pub parameters: Vec<FilterParameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FilterParameter {
    pub name: String,
    pub value: String,
}

/// Operating system and boot configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Os {
    #[serde(rename = "type")]
    pub kind: OsType,
    pub boot: OsBoot,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OsType {
    /// Guest type ("hvm", "linux", ...).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OsBoot {
    /// First boot device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev: Option<String>,
}

/// Descriptor fields that come from the markup alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainConfig {
    pub kind: String,
    pub uuid: String,
    pub name: String,
    pub memory: u64,
    pub vcpu: u32,
    pub devices: Devices,
    pub os: Os,
}

impl DomainConfig {
    /// Parse descriptor markup.
    pub fn parse(markup: &str) -> std::result::Result<Self, quick_xml::DeError> {
        let doc: markup::Domain = quick_xml::de::from_str(markup)?;
        Ok(doc.into())
    }

    /// Attach a run-state to form a complete snapshot.
    pub fn with_state(self, state: DomainState) -> DomainDescriptor {
        DomainDescriptor {
            kind: self.kind,
            uuid: self.uuid,
            name: self.name,
            memory: self.memory,
            vcpu: self.vcpu,
            devices: self.devices,
            os: self.os,
            state,
        }
    }
}

/// Build a snapshot from a live handle.
///
/// Fetches the markup, parses it, then queries and maps the run-state. Nothing
/// is retried; any failure yields an error and no partial descriptor.
pub fn build(handle: &dyn DomainHandle) -> Result<DomainDescriptor> {
    let label = handle.name().unwrap_or_else(|_| "<unknown>".to_string());

    let markup = handle
        .xml_desc()
        .map_err(|e| Error::descriptor(&label, format!("failed to fetch markup: {}", e)))?;
    let config = DomainConfig::parse(&markup)
        .map_err(|e| Error::descriptor(&label, format!("failed to parse markup: {}", e)))?;

    let code = handle
        .state()
        .map_err(|e| Error::hypervisor("query domain state", e))?;
    let state = DomainState::from_code(code).map_err(|_| Error::StateMapping {
        domain: config.name.clone(),
        code,
    })?;

    tracing::trace!(domain = %config.name, state = %state, "built descriptor");
    Ok(config.with_state(state))
}

/// Serde shapes mirroring the descriptor markup.
mod markup {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct Domain {
        #[serde(rename = "@type")]
        pub kind: String,
        pub uuid: String,
        pub name: String,
        pub memory: Scalar<u64>,
        pub vcpu: Scalar<u32>,
        #[serde(default)]
        pub devices: Devices,
        #[serde(default)]
        pub os: Os,
    }

    /// Element whose text is a number; attributes such as `unit` are ignored.
    #[derive(Debug, Deserialize)]
    pub struct Scalar<T> {
        #[serde(rename = "$text")]
        pub value: T,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct Devices {
        #[serde(rename = "disk", default)]
        pub disks: Vec<Disk>,
        #[serde(rename = "interface", default)]
        pub interfaces: Vec<Interface>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Disk {
        #[serde(rename = "@type", default)]
        pub kind: String,
        #[serde(rename = "@device", default)]
        pub device: String,
        #[serde(default)]
        pub driver: DiskDriver,
        #[serde(default)]
        pub source: DiskSource,
        #[serde(default)]
        pub target: DiskTarget,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct DiskDriver {
        #[serde(rename = "@name", default)]
        pub name: String,
        #[serde(rename = "@type", default)]
        pub kind: String,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct DiskSource {
        #[serde(rename = "@file")]
        pub file: Option<String>,
        #[serde(rename = "@dev")]
        pub dev: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct DiskTarget {
        #[serde(rename = "@dev", default)]
        pub dev: String,
        #[serde(rename = "@bus", default)]
        pub bus: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct Interface {
        #[serde(rename = "@type", default)]
        pub kind: String,
        #[serde(default)]
        pub source: InterfaceSource,
        #[serde(default)]
        pub mac: InterfaceMac,
        #[serde(default)]
        pub model: InterfaceModel,
        #[serde(default)]
        pub filterref: FilterRef,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct InterfaceSource {
        #[serde(rename = "@network")]
        pub network: Option<String>,
        #[serde(rename = "@bridge")]
        pub bridge: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct InterfaceMac {
        #[serde(rename = "@address", default)]
        pub address: String,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct InterfaceModel {
        #[serde(rename = "@type")]
        pub kind: Option<String>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct FilterRef {
        #[serde(rename = "@filter", default)]
        pub filter: String,
        #[serde(rename = "parameter", default)]
        pub parameters: Vec<FilterParameter>,
    }

    #[derive(Debug, Deserialize)]
    pub struct FilterParameter {
        #[serde(rename = "@name", default)]
        pub name: String,
        #[serde(rename = "@value", default)]
        pub value: String,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct Os {
        #[serde(rename = "type", default)]
        pub kind: OsType,
        #[serde(default)]
        pub boot: Vec<OsBoot>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct OsType {
        #[serde(rename = "$text", default)]
        pub kind: String,
        #[serde(rename = "@arch")]
        pub arch: Option<String>,
        #[serde(rename = "@machine")]
        pub machine: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct OsBoot {
        #[serde(rename = "@dev")]
        pub dev: Option<String>,
    }
}

impl From<markup::Domain> for DomainConfig {
    fn from(d: markup::Domain) -> Self {
        Self {
            kind: d.kind,
            uuid: d.uuid,
            name: d.name,
            memory: d.memory.value,
            vcpu: d.vcpu.value,
            devices: Devices {
                disks: d.devices.disks.into_iter().map(Into::into).collect(),
                interfaces: d.devices.interfaces.into_iter().map(Into::into).collect(),
            },
            os: Os {
                kind: OsType {
                    kind: d.os.kind.kind,
                    arch: d.os.kind.arch,
                    machine: d.os.kind.machine,
                },
                // Only the primary boot device is reported.
                boot: OsBoot {
                    dev: d.os.boot.into_iter().find_map(|b| b.dev),
                },
            },
        }
    }
}

impl From<markup::Disk> for Disk {
    fn from(d: markup::Disk) -> Self {
        Self {
            kind: d.kind,
            device: d.device,
            driver: DiskDriver {
                name: d.driver.name,
                kind: d.driver.kind,
            },
            source: DiskSource {
                file: d.source.file,
                device: d.source.dev,
            },
            target: DiskTarget {
                dev: d.target.dev,
                bus: d.target.bus,
            },
        }
    }
}

impl From<markup::Interface> for Interface {
    fn from(i: markup::Interface) -> Self {
        Self {
            kind: i.kind,
            source: InterfaceSource {
                network: i.source.network,
                bridge: i.source.bridge,
            },
            mac: InterfaceMac {
                address: i.mac.address,
            },
            model: InterfaceModel { kind: i.model.kind },
            filterref: FilterRef {
                filter: i.filterref.filter,
                parameters: i
                    .filterref
                    .parameters
                    .into_iter()
                    .map(|p| FilterParameter {
                        name: p.name,
                        value: p.value,
                    })
                    .collect(),
            },
        }
    }
}
