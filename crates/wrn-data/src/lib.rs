pub mod augment;

pub use augment::{cutout_region, get_random_cutout, RandomCutout, Transform};
