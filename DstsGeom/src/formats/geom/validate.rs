//! Consistency checks run while reading a document.
//!
//! Each pass recomputes a derived value from authoritative data and compares
//! it with what the file stores. A mismatch beyond the tolerance is an error.

use glam::{Mat4, Vec3};

use super::bounds::Bounds;
use super::header::IBPM_SIZE;
use super::mesh::Mesh;
use super::skeleton::Skeleton;
use super::transform::{Transform, invert_affine, matrices_approx_eq};
use super::vertex::VertexSchema;
use crate::error::{Error, Result};
use crate::utils::name_hash;

/// Stored inverse bind poses against the skeleton's world matrices.
///
/// Effect bones are skipped. `table_pos` is the source position of the first
/// stored matrix.
pub(crate) fn check_bind_poses(
    skeleton: &Skeleton,
    stored: &[Mat4],
    table_pos: u64,
    tolerance: f32,
) -> Result<()> {
    if stored.len() != skeleton.len() {
        return Err(Error::inconsistent(
            Some(table_pos),
            format!(
                "{} inverse bind poses for {} bones",
                stored.len(),
                skeleton.len()
            ),
        ));
    }

    let world = skeleton.world_matrices()?;
    for (index, ((bone, world), stored)) in skeleton.bones.iter().zip(&world).zip(stored).enumerate() {
        if bone.is_effect_bone() {
            continue;
        }
        let entry_pos = Some(table_pos + IBPM_SIZE * index as u64);

        let recomposed = Transform::from_matrix(world).to_matrix();
        if !matrices_approx_eq(&recomposed, world, tolerance) {
            return Err(Error::inconsistent(
                entry_pos,
                format!("world matrix of bone {index} does not survive decomposition"),
            ));
        }

        let expected = invert_affine(world)?;
        if !matrices_approx_eq(&expected, stored, tolerance) {
            return Err(Error::inconsistent(
                entry_pos,
                format!(
                    "inverse bind pose of bone {index} ({:#010x}) differs from its world transform",
                    bone.name_hash
                ),
            ));
        }
    }
    tracing::debug!("Validated {} inverse bind poses", stored.len());
    Ok(())
}

/// Name hash, attribute layout and bounds of one decoded mesh.
pub(crate) fn check_mesh(
    mesh: &Mesh,
    stored_schema: &VertexSchema,
    stored_bounds: &Bounds,
    header_pos: u64,
    tolerance: f32,
) -> Result<()> {
    if let Some(name) = &mesh.name {
        let hash = name_hash(name);
        if hash != mesh.name_hash {
            return Err(Error::inconsistent(
                Some(header_pos + 0x34),
                format!(
                    "mesh {name:?} hashes to {hash:#010x}, header stores {:#010x}",
                    mesh.name_hash
                ),
            ));
        }
    }

    if let Some(first) = mesh.vertices.first() {
        let derived = VertexSchema::derive(first)?;
        // Slots are unique, so sorting by slot compares the descriptors as a set.
        let signature = |schema: &VertexSchema| {
            let mut signature = schema
                .attributes
                .iter()
                .map(|d| (d.slot, d.count, d.element_type))
                .collect::<Vec<_>>();
            signature.sort_unstable_by_key(|&(slot, ..)| slot);
            signature
        };
        if signature(&derived) != signature(stored_schema) {
            return Err(Error::inconsistent(
                Some(header_pos + 0x20),
                "stored attribute descriptors differ from the first vertex",
            ));
        }
        for (index, vertex) in mesh.vertices.iter().enumerate() {
            stored_schema.check(vertex, index)?;
        }
    }

    let computed = mesh.bounds();
    if !computed.approx_eq(stored_bounds, tolerance) {
        return Err(Error::inconsistent(
            Some(header_pos + 0x54),
            format!(
                "mesh bounds recompute to centre {} extents {} radius {}, stored centre {} extents {} radius {}",
                computed.centre,
                computed.half_extents,
                computed.radius,
                stored_bounds.centre,
                stored_bounds.half_extents,
                stored_bounds.radius
            ),
        ));
    }
    Ok(())
}

/// Document bounds against the header. The sphere radius takes no part.
pub(crate) fn check_document_bounds(
    computed: &Bounds,
    centre: Vec3,
    extents: Vec3,
    field_pos: u64,
    tolerance: f32,
) -> Result<()> {
    let stored = Bounds {
        centre,
        half_extents: extents,
        ..Bounds::default()
    };
    if !computed.without_radius().approx_eq(&stored, tolerance) {
        return Err(Error::inconsistent(
            Some(field_pos),
            format!(
                "document bounds recompute to centre {} extents {}, header stores centre {centre} extents {extents}",
                computed.centre, computed.half_extents
            ),
        ));
    }
    Ok(())
}
