//! Value types for device identity and light control parameters.

mod brightness;
mod color;
mod kelvin;
mod power;
mod version;

pub use brightness::Brightness;
pub use color::Color;
pub(crate) use kelvin::deserialize_optional_kelvin;
pub use kelvin::ColorKelvin;
pub use power::PowerState;
pub use version::Version;
