//! Wheelwright installer library.
//!
//! This crate installs resolved Python packages into an environment. Wheels
//! are extracted directly into the environment's scheme directories; every
//! other kind of source (source distributions, project directories,
//! editable installs, URLs) is handed to the environment's own `pip`.
//!
//! # Modules
//!
//! - [`command`] - External command execution
//! - [`destination`] - Scheme path resolution and file materialization
//! - [`environment`] - The Python environment being installed into
//! - [`error`] - Semantic error types
//! - [`hashing`] - Streaming digests and executable bits
//! - [`install`] - Archive-to-filesystem installation procedure
//! - [`pip`] - The pip subprocess fallback
//! - [`record`] - RECORD rows, hashes and CSV handling
//! - [`scheme`] - Install schemes and scheme maps
//! - [`scripts`] - Entry-point launchers and shebang strategies
//! - [`settings`] - Environment-variable driven toggles
//! - [`wheel`] - Wheel archive access and RECORD validation
//! - [`wheel_installer`] - Direct wheel installation with an invalid-wheel ledger

pub mod command;
pub mod destination;
pub mod environment;
pub mod error;
pub mod hashing;
pub mod install;
pub mod pip;
pub mod record;
pub mod scheme;
pub mod scripts;
pub mod settings;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod wheel;
pub mod wheel_installer;
