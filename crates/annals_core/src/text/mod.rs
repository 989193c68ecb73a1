//! Text scanning and the label-tag record grammar.

pub mod label_tag;
pub mod tokenizer;
