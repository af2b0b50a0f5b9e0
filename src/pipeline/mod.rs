pub mod driver;
pub mod scheduler;

pub use driver::PipelineDriver;
pub use scheduler::WindowScheduler;
