//! DSTS `.geom` model container support
//!
//! A geom document bundles a bone hierarchy, skinned meshes and shader
//! materials. Reading validates every derived value the file stores (bounds,
//! inverse bind poses, name hashes, attribute layouts) against the data it is
//! derived from. Writing recomputes all of them.

pub mod batch;
pub mod bounds;
pub mod dictionary;
pub mod document;
pub mod header;
pub mod inspect;
pub mod material;
pub mod mesh;
pub mod options;
pub mod shader_name;
pub mod skeleton;
pub mod string_table;
pub mod transform;
pub mod vertex;

mod stream;
mod validate;

// Public API exports
pub use batch::{BatchVerifyResult, batch_verify, find_geom_files, verify_round_trip};
pub use bounds::Bounds;
pub use dictionary::{ParameterDictionary, ParameterEntry};
pub use document::GeomDocument;
pub use header::{ColorLookup, GEOM_VERSION};
pub use inspect::{BoneInfo, GeomInfo, MaterialInfo, MeshInfo, inspect_geom};
pub use material::{Material, ShaderSetting, ShaderUniform, UniformValue};
pub use mesh::{BoneInfluence, Mesh, MeshFlags, Topology};
pub use options::{CodecOptions, DEFAULT_TOLERANCE};
pub use shader_name::ShaderName;
pub use skeleton::{Bone, ParentPair, Skeleton};
pub use string_table::StringTable;
pub use transform::Transform;
pub use vertex::{
    AttributeDescriptor, AttributeSlot, AttributeValue, ElementType, Vertex, VertexSchema,
};
