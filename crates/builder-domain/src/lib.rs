//! Builder-domain entities (§3 Builder domain): `Site`, `Page`,
//! `PageContent`, `SiteVersion`, `BuildJob`, `Manifest`, and the page
//! content section schema (§6).

pub mod content;
pub mod manifest;
pub mod model;
pub mod validation;
