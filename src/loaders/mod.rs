//! loaders
//!
//! Ready-made [`Loader`] implementations.
//!
//! # Modules
//!
//! - [`catalog`]: in-memory units and data, answered synchronously
//! - [`fs`]: data files under a root directory (JSON, TOML, text)
//! - [`mock`]: scripted loader that records requests, for tests
//!
//! A loader only performs the physical fetch; deduplication and routing of
//! the results are handled by the container.
//!
//! # Example
//!
//! ```
//! use wireloom::Container;
//! use wireloom::core::value::json;
//! use wireloom::engine::Declaration;
//! use wireloom::loaders::CatalogLoader;
//!
//! let catalog = CatalogLoader::new().with_unit(
//!     "db",
//!     vec![Declaration::new("db", &[], |_, _| Ok(Some(json!("sqlite"))))],
//! );
//!
//! let mut container = Container::new();
//! container.set_loader(catalog);
//! container.declare("app", &["db"], |_, args| Ok(Some(args[0].clone())))?;
//! container.start()?;
//!
//! assert_eq!(container.value("app"), Some(&json!("sqlite")));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod catalog;
pub mod fs;
pub mod mock;

pub use crate::engine::fetch::Loader;
pub use catalog::CatalogLoader;
pub use fs::FsLoader;
pub use mock::MockLoader;
