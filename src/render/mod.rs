mod backend;
mod buffer;
mod camera;
mod context;
mod gpu;
mod kernel;
mod pipeline;
mod renderer;
mod uniform;

pub use backend::*;
pub use camera::*;
pub use context::*;
pub use gpu::*;
pub use kernel::*;
pub use pipeline::*;
pub use renderer::*;
pub use uniform::*;
