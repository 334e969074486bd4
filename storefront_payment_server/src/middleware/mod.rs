mod acl;
mod signature;

pub use acl::{AclMiddlewareFactory, AclMiddlewareService};
pub use signature::{SignatureMiddlewareFactory, SignatureMiddlewareService};
