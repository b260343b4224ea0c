pub mod layout;
pub mod plan;

pub use layout::{DeviceLayout, LoaderLayout};
pub use plan::{plan_install, plan_removal, CopyPlan, RemovalPlan, RetainedLibrary};
