//! Typed property groups.
//!
//! Each group wraps a [`Scope`](crate::registry::Scope) and exposes the
//! documented entries of its namespace as methods. Groups implement
//! [`Fetch`](crate::traits::Fetch) themselves, so undocumented entries stay
//! reachable by name.

/// Declare a group struct over a [`Scope`](crate::registry::Scope).
macro_rules! scoped_group {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name<'f, F> {
            scope: $crate::registry::Scope<'f, F>,
        }

        impl<'f, F: $crate::traits::Fetch> $name<'f, F> {
            pub fn from_scope(scope: $crate::registry::Scope<'f, F>) -> Self {
                Self { scope }
            }

            pub fn scope(&self) -> &$crate::registry::Scope<'f, F> {
                &self.scope
            }
        }

        impl<F: $crate::traits::Fetch> $crate::traits::Fetch for $name<'_, F> {
            const FIXED_WIDTH: bool = F::FIXED_WIDTH;

            fn get_string(&self, name: &str) -> hwprobe_core::ProbeResult<String> {
                $crate::traits::Fetch::get_string(&self.scope, name)
            }

            fn get_integer<T: $crate::traits::Integer>(
                &self,
                name: &str,
            ) -> hwprobe_core::ProbeResult<T> {
                $crate::traits::Fetch::get_integer(&self.scope, name)
            }
        }
    };
}

/// Declare read-only accessors for named entries.
macro_rules! properties {
    ($($(#[$meta:meta])* $method:ident: $kind:tt = $key:literal;)*) => {
        $(properties!(@one $(#[$meta])* $method: $kind = $key);)*
    };
    (@one $(#[$meta:meta])* $method:ident: String = $key:literal) => {
        $(#[$meta])*
        pub fn $method(&self) -> hwprobe_core::ProbeResult<String> {
            $crate::traits::Fetch::get_string(self, $key)
        }
    };
    (@one $(#[$meta:meta])* $method:ident: bool = $key:literal) => {
        $(#[$meta])*
        pub fn $method(&self) -> hwprobe_core::ProbeResult<bool> {
            $crate::traits::Fetch::get_bool(self, $key)
        }
    };
    (@one $(#[$meta:meta])* $method:ident: $int:ty = $key:literal) => {
        $(#[$meta])*
        pub fn $method(&self) -> hwprobe_core::ProbeResult<$int> {
            $crate::traits::Fetch::get_integer::<$int>(self, $key)
        }
    };
}

mod filesystem;
mod system;

pub use filesystem::{CpuEntry, Proc, SysCpu, Topology};
pub use system::{
    read_size, CacheSizes, CpuInfo, Hardware, Kernel, MachdepCpu, Perflevel, SysctlProc,
};
