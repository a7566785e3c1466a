/// 业务服务层

pub mod power_manager;
mod task_processor;

#[cfg(test)]
pub(crate) mod testing;

pub use power_manager::{PowerManager, TrackedVm};
