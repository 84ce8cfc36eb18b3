//! Formsmith - schema-driven form and grid configurator
//!
//! Enriches a data service's column metadata into editable field records,
//! exports them as a portable configuration document, and renders record
//! forms and grids from that document.

pub mod admin;
pub mod dropdown;
pub mod editor;
pub mod enrich;
pub mod export;
pub mod field;
pub mod form;
pub mod grid;
pub mod schema;
pub mod settings;
