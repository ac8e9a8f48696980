// Shared helpers for the tag-container parsers and archive documents
pub mod encoding;
pub mod hjson;
pub mod io;
