//! Use-case services on top of the record model.

pub mod editor;
