pub mod parameters;
pub mod population;
pub mod trajectory;

pub use parameters::{MergePolicy, Parameter, ParameterSet};
pub use population::{CompartmentFraction, InitialValues};
pub use trajectory::{TIME_RESOLUTION, TimeKey, Trajectory};
