//! Controller owner references
//!
//! Every operand carries exactly one controller reference back to its `Minio`.
//! The cluster garbage collector deletes the operand when the owner goes away,
//! so the reconciler never deletes anything itself.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};

use crate::crd::Minio;
use crate::Error;

/// Build the controller owner reference pointing at `minio`
///
/// Fails when the resource has no uid, i.e. it was not read back from the API server.
pub fn controller_reference(minio: &Minio) -> Result<OwnerReference, Error> {
    minio.controller_owner_ref(&()).ok_or_else(|| {
        Error::validation(format!(
            "Minio {} has no uid; cannot own dependents",
            minio.name_any()
        ))
    })
}

/// The controller reference of an object, if it has one
pub fn controller_of(meta: &ObjectMeta) -> Option<&OwnerReference> {
    meta.owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find(|r| r.controller == Some(true))
}

/// Install `owner` as the controller of the object described by `meta`
///
/// A reference to the same owner is replaced in place so repeated calls leave
/// the list unchanged. Fails with [`Error::AlreadyOwned`] when another
/// controller already owns the object.
pub fn set_controller_reference(
    owner: &OwnerReference,
    meta: &mut ObjectMeta,
    kind: &str,
) -> Result<(), Error> {
    if let Some(current) = controller_of(meta) {
        if current.uid != owner.uid {
            return Err(Error::AlreadyOwned {
                kind: kind.to_string(),
                name: meta.name.clone().unwrap_or_default(),
                owner: format!("{}/{}", current.kind, current.name),
            });
        }
    }

    let refs = meta.owner_references.get_or_insert_with(Vec::new);
    match refs.iter_mut().find(|r| same_owner(r, owner)) {
        Some(existing) => *existing = owner.clone(),
        None => refs.push(owner.clone()),
    }
    Ok(())
}

fn same_owner(a: &OwnerReference, b: &OwnerReference) -> bool {
    a.uid == b.uid || (a.api_version == b.api_version && a.kind == b.kind && a.name == b.name)
}
