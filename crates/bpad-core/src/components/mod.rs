//! Components shipped with bpad.
//!
//! - `noop`: takes part in no phase.
//! - `scripts`: runs `<phase>.sh` from the component directory.
//! - `kubectl_manifests`: applies every manifest in the component directory on deploy.

pub mod manifests;
pub mod noop;
pub mod scripts;

pub use manifests::KubectlManifests;
pub use noop::Noop;
pub use scripts::Scripts;
