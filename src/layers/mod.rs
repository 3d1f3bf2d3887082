pub mod catalog;
pub mod registry;
pub mod style;

pub use catalog::{ConcreteLayerSpec, GeometryKind, LayerCategory, LayerDescriptor, RenderType};
pub use registry::LayerRegistry;
pub use style::{PaintProperty, PaintValue, Rgba};
