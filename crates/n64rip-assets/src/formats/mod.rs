//! Built-in asset kinds.
//!
//! Each module owns one kind's byte layout: its [`Factory`] and the
//! exporters for the forms it supports.

mod bk64_anim;
mod bk64_demo;
mod bk64_model;
mod raw;
mod sf64_anim;
mod vtx;

pub use bk64_anim::{AnimElement, AnimKey, Bk64AnimFactory, Bk64Animation};
pub use bk64_demo::{ControllerInput, DemoInput, DemoInputFactory};
pub use bk64_model::{ModelFactory, ModelSummary};
pub use raw::{Blob, BlobFactory, CType, Texture, TextureFactory, TextureFormat};
pub use sf64_anim::{JointKey, Sf64AnimFactory, Sf64Animation};
pub use vtx::{Vertex, VertexList, VtxFactory, VTX_SIZE};

use crate::search_table::Placement;
use crate::{AssetDescriptor, Dispatcher, RunContext};

pub(crate) const TAB: &str = "    ";

/// Register every built-in factory.
pub fn register_builtin(dispatcher: &mut Dispatcher) {
    dispatcher.register_factory(VtxFactory);
    dispatcher.register_factory(Sf64AnimFactory);
    dispatcher.register_factory(Bk64AnimFactory);
    dispatcher.register_factory(DemoInputFactory);
    dispatcher.register_factory(ModelFactory);
    dispatcher.register_factory(TextureFactory);
    dispatcher.register_factory(BlobFactory);
}

/// Placement of an asset written as a row of a merged array.
pub(crate) fn merged_placement<'a>(ctx: &'a RunContext, descriptor: &AssetDescriptor) -> Option<Placement<'a>> {
    ctx.search_table
        .placement(descriptor.kind, descriptor.offset)
        .filter(Placement::is_merged)
}
