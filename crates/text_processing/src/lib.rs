//! Text processing for the counselor
//!
//! - [`field_parsers`]: free-form answers to typed field values
//! - [`update_instruction`]: field-change requests embedded in AI replies

pub mod field_parsers;
pub mod update_instruction;

pub use field_parsers::{
    parse_age, parse_currency, parse_dependents, parse_field, parse_marital_status, parse_name,
    parse_text, parse_value,
};
pub use update_instruction::{
    extract_instruction, parse_update_instruction, strip_update_block, UpdateInstruction,
    UpdateOutcome, ValidatedUpdate, UPDATE_HEADER, UPDATE_TERMINATOR,
};
