//! Collaborator contract for the fallback chain.
//!
//! Concrete data-source clients (CDC, FDA, WHO, FHIR, ...) live outside this
//! crate. They plug into the fallback chain by implementing [`DataSource`]
//! and being registered in a [`Collaborators`] set for a call.

mod collaborators;
mod traits;

pub use collaborators::Collaborators;
pub use traits::DataSource;
