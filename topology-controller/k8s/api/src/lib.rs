#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod ebpf;
pub mod gitops;
pub mod mesh;

pub use k8s_openapi::api::{
    self,
    apps::v1::{DaemonSet, Deployment},
    core::v1::{Namespace, Pod, PodSpec, PodStatus, Service, ServiceAccount, ServiceSpec},
    networking::v1::{Ingress, NetworkPolicy},
    rbac::v1::{ClusterRoleBinding, RoleBinding},
};
pub use kube::api::{ObjectMeta, ResourceExt};
