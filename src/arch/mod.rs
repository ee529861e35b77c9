//! Architecture-specific context records and the switch primitive.

#[cfg(target_arch = "x86_64")]
mod x86_64;
#[cfg(target_arch = "x86_64")]
pub use x86_64::{Context, context_switch};
#[cfg(target_arch = "x86_64")]
pub(crate) use x86_64::thread_start;

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "aarch64")]
pub use aarch64::{Context, context_switch};
#[cfg(target_arch = "aarch64")]
pub(crate) use aarch64::thread_start;

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!("uthread supports only x86_64 and aarch64 targets");
