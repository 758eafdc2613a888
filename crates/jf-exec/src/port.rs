//! Typed port handles returned by name lookups.

use core::fmt;
use core::marker::PhantomData;

use jf_core::{InputId, OutputId};

macro_rules! typed_port {
    ($(#[$meta:meta])* $name:ident, $id:ty) => {
        $(#[$meta])*
        pub struct $name<T> {
            id: $id,
            _marker: PhantomData<fn() -> T>,
        }

        impl<T> $name<T> {
            pub(crate) fn new(id: $id) -> Self {
                Self {
                    id,
                    _marker: PhantomData,
                }
            }

            pub fn id(self) -> $id {
                self.id
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> PartialEq for $name<T> {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }

        impl<T> Eq for $name<T> {}

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:?}", self.id)
            }
        }
    };
}

typed_port!(
    /// An input port known to carry `T`.
    Input,
    InputId
);
typed_port!(
    /// An output port known to carry `T`.
    Output,
    OutputId
);
