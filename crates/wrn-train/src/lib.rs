pub mod scheduler;
pub mod timing;

pub use scheduler::{lr_schedule_rn, lr_schedule_wrn, MultiStepLR};
pub use timing::{hms_string, Timer};
