//! The data model (spec §3): Container, Image, Volume, VM instance, and the
//! identifiers that tie them together.

mod container;
mod id;
mod image;
mod vm;
mod volume;

pub use container::{
    Container, ContainerSpec, ContainerStatus, NetworkMode, PortMapping, PortProtocol,
    ResourceLimits, VolumeBinding,
};
pub use id::{generate_container_id, resolve_prefix, PrefixMatch};
pub use image::{split_tag_ref, Image, ImageConfig};
pub use vm::{ProviderKind, VmInstance, VmStatus};
pub use volume::Volume;
