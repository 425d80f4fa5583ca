//! # DstsGeom
//!
//! A pure-Rust reader and writer for the `.geom` model containers used by
//! Digimon Story Time Stranger.
//!
//! ## Supported Content
//!
//! - **Skeleton** - bone hierarchy with local transforms and name hashes
//! - **Meshes** - self-describing vertex buffers, triangle lists and strips, skinning palettes
//! - **Materials** - shader names, float and texture uniforms, opaque settings
//! - **Colour lookup** - carried through unchanged
//!
//! Reading checks every stored derived value (bounding boxes, inverse bind
//! poses, name hashes, attribute layouts) against the data it comes from and
//! fails with a located error when they disagree. Writing regenerates all of
//! them, so an edited document always serialises consistently.
//!
//! ## Quick Start
//!
//! ```no_run
//! use dstsgeom::prelude::*;
//!
//! let dict = ParameterDictionary::from_json_str(
//!     r#"[{"id": 16, "name": "DiffuseMap"}]"#,
//! )?;
//! let mut doc = GeomDocument::read_file("chr000.geom", &dict)?;
//! println!("{} bones, {} meshes", doc.skeleton.len(), doc.meshes.len());
//!
//! doc.materials[0].set_name("chr000_body");
//! doc.write_file("chr000_edited.geom")?;
//! # Ok::<(), dstsgeom::Error>(())
//! ```
//!
//! ### Using the Prelude
//!
//! ```
//! use dstsgeom::prelude::*;
//!
//! let mut skeleton = Skeleton::new();
//! let root = skeleton.push_bone(Bone::new("root"));
//! skeleton.push_bone(Bone::new("ef_spark").with_parent(root));
//! assert!(skeleton.bones[1].is_effect);
//! ```

pub mod error;
pub mod formats;
pub mod utils;

// Re-exports for convenience
pub use error::{Error, ErrorKind, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::formats::geom::{
        AttributeSlot, AttributeValue, Bone, Bounds, CodecOptions, ElementType, GeomDocument,
        GeomInfo, Material, Mesh, ParameterDictionary, ShaderName, ShaderSetting, ShaderUniform,
        Skeleton, Topology, Transform, UniformValue, Vertex, VertexSchema,
    };

    // Batch operations
    pub use crate::formats::geom::{
        BatchVerifyResult, batch_verify, find_geom_files, inspect_geom,
    };

    pub use crate::utils::name_hash;
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
