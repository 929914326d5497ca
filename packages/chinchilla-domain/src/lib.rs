pub mod conversation;
pub mod document;
pub mod filter;
pub mod location;
pub mod merge;
pub mod pattern;
pub mod profile;
pub mod quality;
pub mod text;
