//! A nested data-parallel language, compiled to streaming vector code.
//!
//! Programs are parsed into the [surface language], elaborated into the typed
//! [core language], and then flattened into [vector code] that is executed by
//! a [streaming runtime]. The core language also has a direct [reference
//! interpreter], which is useful for checking the output of the runtime.
//!
//! [surface language]: lang::surface
//! [core language]: lang::core
//! [vector code]: lang::svcode
//! [streaming runtime]: runtime
//! [reference interpreter]: lang::core::semantics

#![allow(clippy::new_without_default)]

pub mod lang;
pub mod pass;
pub mod reporting;
pub mod runtime;
