pub mod sysfs;
